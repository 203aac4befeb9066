//! Deadline arithmetic for caller-supplied spans.

use std::time::Duration;

use tokio::time::Instant;

/// Longest span honored before a deadline is treated as "never".
/// Matches the horizon tokio clamps `sleep` to.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + span`, saturating at roughly thirty years out.
///
/// Callers pass `Duration::MAX` to mean "no deadline"; plain addition
/// would overflow the instant and panic.
pub(crate) fn instant_after(start: Instant, span: Duration) -> Instant {
    start + span.min(FAR_FUTURE)
}
