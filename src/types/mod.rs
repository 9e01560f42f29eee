//! Shared types for feedlab

pub mod error;

pub use error::{FeedlabError, Result};
