//! Scoped access to GDAL.
//!
//! The first live session registers the drivers and switches off PAM
//! (`.aux.xml` sidecar files); dropping the last live session restores the
//! previous configuration. GDAL configuration is process-wide, so sessions
//! are reference counted.

use std::sync::Mutex;

use gdal::{config, DriverManager};
use tracing::{debug, warn};

use crate::error::Result;

const PAM_OPTION: &str = "GDAL_PAM_ENABLED";

struct SessionState {
    active: usize,
    previous_pam: String,
}

static STATE: Mutex<SessionState> = Mutex::new(SessionState {
    active: 0,
    previous_pam: String::new(),
});

/// Held for the duration of a stage run.
#[derive(Debug)]
pub struct GdalSession {
    _private: (),
}

impl GdalSession {
    pub fn acquire() -> Result<Self> {
        let mut state = STATE.lock().unwrap_or_else(|e| e.into_inner());

        if state.active == 0 {
            DriverManager::register_all();
            DriverManager::get_driver_by_name("GTiff")?;
            state.previous_pam = config::get_config_option(PAM_OPTION, "")?;
            config::set_config_option(PAM_OPTION, "NO")?;
            debug!(
                "GDAL session acquired ({})",
                gdal::version::version_info("RELEASE_NAME")
            );
        }
        state.active += 1;

        Ok(GdalSession { _private: () })
    }
}

impl Drop for GdalSession {
    fn drop(&mut self) {
        let mut state = STATE.lock().unwrap_or_else(|e| e.into_inner());
        state.active = state.active.saturating_sub(1);
        if state.active > 0 {
            return;
        }

        let restored = if state.previous_pam.is_empty() {
            config::clear_config_option(PAM_OPTION)
        } else {
            config::set_config_option(PAM_OPTION, &state.previous_pam)
        };
        match restored {
            Ok(()) => debug!("GDAL session released"),
            Err(e) => warn!("Failed to restore {}: {}", PAM_OPTION, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_sets_and_restores_pam() {
        let first = match GdalSession::acquire() {
            Ok(session) => session,
            Err(e) => {
                eprintln!("Skipping test: GDAL unavailable ({})", e);
                return;
            }
        };
        assert_eq!(config::get_config_option(PAM_OPTION, "").unwrap(), "NO");
        assert!(STATE.lock().unwrap().active >= 1);

        let second = GdalSession::acquire().unwrap();
        drop(first);
        assert_eq!(config::get_config_option(PAM_OPTION, "").unwrap(), "NO");
        drop(second);
    }
}
