//! Full-state-reset navigation after authentication changes.
//!
//! Login and logout never switch views in place: the host reloads at the
//! target location so everything derived from the auth state is rebuilt
//! from scratch. `Navigator` is where the host plugs that reload in.

use std::sync::{Mutex, MutexGuard};

use tracing::info;

/// Where a successful login lands.
pub const LANDING_ROUTE: &str = "/chat";
pub const LOGIN_ROUTE: &str = "/login";

pub trait Navigator: Send + Sync {
    /// Reload the application at `location`, discarding in-memory state.
    fn hard_navigate(&self, location: &str);
}

/// Default navigator for hosts without a reload hook: records intent in the log.
#[derive(Debug, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn hard_navigate(&self, location: &str) {
        info!(location, "full reload requested");
    }
}

/// Keeps every requested location, most recent last.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn history(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.lock().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn hard_navigate(&self, location: &str) {
        self.lock().push(location.to_string());
    }
}

/// Logout target: login route with a logout marker and cache buster.
pub fn logout_location() -> String {
    format!(
        "{LOGIN_ROUTE}?logout=true&_t={}",
        chrono::Utc::now().timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_navigator_keeps_order() {
        let nav = RecordingNavigator::new();
        nav.hard_navigate("/chat");
        nav.hard_navigate("/login");
        assert_eq!(nav.history(), vec!["/chat", "/login"]);
        assert_eq!(nav.last().as_deref(), Some("/login"));
    }

    #[test]
    fn logout_location_has_marker_and_timestamp() {
        let location = logout_location();
        assert!(location.starts_with("/login?logout=true&_t="));
        let ts = location.rsplit('=').next().unwrap();
        assert!(ts.parse::<i64>().is_ok());
    }
}
