//! Configuration for feedlab
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Feedlab - backend for a simulated social-media feed study
#[derive(Parser, Debug, Clone)]
#[command(name = "feedlab")]
#[command(about = "Simulated feed study backend: condition assignment, interaction logging, export")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "feedlab")]
    pub mongodb_db: String,

    /// Enable development mode (synthetic participant ids, MongoDB optional)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// API key for the admin surface (required in production)
    #[arg(long, env = "API_KEY_ADMIN")]
    pub api_key_admin: Option<String>,

    /// Engagement synthesis strategy: "gaussian" or "multiplier"
    #[arg(long, env = "ENGAGEMENT_STRATEGY", default_value = "gaussian")]
    pub engagement_strategy: String,

    /// Fixed RNG seed for reproducible pilot runs (random when unset)
    #[arg(long, env = "RNG_SEED")]
    pub rng_seed: Option<u64>,

    /// Minimum dwell before a simulation section may advance, in milliseconds
    #[arg(long, env = "SECTION_DELAY_MS", default_value = "10000")]
    pub section_delay_ms: u64,

    /// Downstream survey URL for the completion redirect
    #[arg(
        long,
        env = "REDIRECT_URL",
        default_value = "https://app.prolific.com/submissions/complete"
    )]
    pub redirect_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Whether the factorial (valence x support) design is active
    ///
    /// The multiplier strategy manipulates social support; the Gaussian
    /// strategy is valence-only.
    pub fn factorial_design(&self) -> bool {
        self.engagement_strategy == "multiplier"
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.api_key_admin.is_none() {
            return Err("API_KEY_ADMIN is required in production mode".to_string());
        }

        match self.engagement_strategy.as_str() {
            "gaussian" | "multiplier" => {}
            other => {
                return Err(format!(
                    "ENGAGEMENT_STRATEGY must be 'gaussian' or 'multiplier', got '{}'",
                    other
                ));
            }
        }

        if self.section_delay_ms > 60_000 {
            return Err("SECTION_DELAY_MS above 60s would stall every session".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["feedlab", "--dev-mode"])
    }

    #[test]
    fn dev_mode_does_not_require_admin_key() {
        let args = base_args();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn production_requires_admin_key() {
        let args = Args::parse_from(["feedlab"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn rejects_unknown_strategy() {
        let mut args = base_args();
        args.engagement_strategy = "bimodal".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn gaussian_strategy_is_valence_only() {
        let args = base_args();
        assert!(!args.factorial_design());
    }
}
