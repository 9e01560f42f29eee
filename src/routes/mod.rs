//! HTTP routes for Feedlab

pub mod admin;
pub mod health;
pub mod session;

pub use admin::{
    handle_delete_participant, handle_export_csv, handle_export_spss, handle_list_participants,
    handle_wipe,
};
pub use health::{health_check, readiness_check, version_info};
pub use session::{
    handle_advance, handle_begin, handle_complete, handle_consent, handle_events, handle_feed,
    handle_get_session, handle_land, handle_survey,
};
