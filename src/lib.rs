//! Feedlab - backend for a simulated social-media feed study
//!
//! Serves a controlled feed to research participants, assigns each one an
//! experimental condition (post valence, optionally crossed with engagement
//! magnitude), records every interaction, and exports the dataset for
//! analysis.
//!
//! ## Pieces
//!
//! - **Session API**: landing, consent, surveys, feed, event capture
//! - **Study logic**: condition draw, engagement synthesis, stimulus catalog
//! - **Store**: participant records in MongoDB with in-memory degraded mode
//! - **Export**: flat CSV, SPSS import syntax, nested JSON records

pub mod config;
pub mod db;
pub mod export;
pub mod routes;
pub mod server;
pub mod store;
pub mod study;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{FeedlabError, Result};
