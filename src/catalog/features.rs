//! Well-known feature keys.
//!
//! Feature flags gate whole capabilities per company, independent of the
//! permission graph. Callers that guard a feature-scoped action must check
//! the flag and the permission separately; the engine never combines them.

pub const MONTHLY_NEWSLETTER: &str = "monthly_newsletter";
pub const HARDWARE_REQUESTS: &str = "hardware_requests";
pub const MARKETING_REQUESTS: &str = "marketing_requests";
pub const DIRECTORY_SYNC: &str = "directory_sync";
pub const TEAM_CALENDAR: &str = "team_calendar";

pub const ALL: &[&str] = &[
    MONTHLY_NEWSLETTER,
    HARDWARE_REQUESTS,
    MARKETING_REQUESTS,
    DIRECTORY_SYNC,
    TEAM_CALENDAR,
];
