use std::time::SystemTime;

use time::{
    OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339, macros::format_description,
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod public;
pub mod quiz;
pub mod sse;
pub mod validation;
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Wall-clock time of day with millisecond precision, e.g. `14:03:07.125`.
fn format_clock(time: SystemTime, offset: UtcOffset) -> String {
    let format = format_description!("[hour]:[minute]:[second].[subsecond digits:3]");
    OffsetDateTime::from(time)
        .to_offset(offset)
        .format(&format)
        .unwrap_or_else(|_| "N/A".into())
}
