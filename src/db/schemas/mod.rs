//! Database schemas for feedlab
//!
//! Defines MongoDB document structures for participants.

mod metadata;
mod participant;

pub use metadata::Metadata;
pub use participant::{
    ParticipantDoc, PlatformParams, SurveyResponses, PARTICIPANT_COLLECTION, SCHEMA_VERSION,
};
