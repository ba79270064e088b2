use chrono::{DateTime, Timelike, Utc};
use signal_core::{Session, SessionWindow};

/// Whether a trading session window is open at the given instant.
///
/// Session hours are defined in local exchange time as a fixed UTC
/// offset, so the check is a plain hour translation with no timezone
/// database involved. Windows whose open hour is later than their
/// close hour wrap across midnight.
pub fn window_active(window: &SessionWindow, now: DateTime<Utc>) -> bool {
    let local_hour = (now.hour() as i32 + window.utc_offset_hours).rem_euclid(24) as u32;
    if window.open_hour <= window.close_hour {
        window.open_hour <= local_hour && local_hour < window.close_hour
    } else {
        local_hour >= window.open_hour || local_hour < window.close_hour
    }
}

/// First configured session open at the given instant, if any.
pub fn active_session(windows: &[SessionWindow], now: DateTime<Utc>) -> Option<Session> {
    windows
        .iter()
        .find(|w| window_active(w, now))
        .map(|w| w.session)
}
