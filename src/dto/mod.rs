use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Users and decks.
pub mod catalog;
/// Health payload.
pub mod health;
/// Invitation requests and views.
pub mod invitation;
/// Quiz requests and views.
pub mod quiz;
/// Server-sent event payloads.
pub mod sse;
/// Statistics views.
pub mod statistics;
/// Custom validators.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
