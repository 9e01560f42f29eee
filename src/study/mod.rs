//! Study logic: conditions, engagement synthesis, stimulus content, the
//! interaction log, and the session pipeline

pub mod condition;
pub mod content;
pub mod engagement;
pub mod interactions;
pub mod rng;
pub mod session;

pub use condition::{ExperimentalCondition, SupportLevel, Valence};
pub use engagement::{EngagementStats, EngagementStrategy};
pub use interactions::{EventKind, InteractionEvent, ItemInteractions, Summary, UserComment};
pub use rng::StudyRng;
pub use session::{Stage, SurveyPage};
