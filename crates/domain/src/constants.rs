//! Domain constants

/// Prefix of the origin tag optionally embedded into chat event descriptions.
/// The full tag is `[cal-id:<calendar event id>]`.
pub const ORIGIN_MARKER_PREFIX: &str = "[cal-id:";

/// Closing delimiter of the origin tag.
pub const ORIGIN_MARKER_SUFFIX: &str = "]";

/// Dedup token prefix for calendar push notifications.
pub const NOTIFICATION_TOKEN_PREFIX: &str = "goog";

/// Lower bound enforced on the configured dedup capacity.
pub const DEDUP_CAPACITY_FLOOR: usize = 100;

/// Build the origin tag for a calendar event id.
pub fn origin_marker(calendar_event_id: &str) -> String {
    format!("{ORIGIN_MARKER_PREFIX}{calendar_event_id}{ORIGIN_MARKER_SUFFIX}")
}
