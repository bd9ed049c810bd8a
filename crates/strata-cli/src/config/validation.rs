use crate::config::BuildConfig;
use crate::error::{ConfigError, Result};

impl BuildConfig {
    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "debounce_ms".to_string(),
                value: "0".to_string(),
                hint: "Use a debounce window of at least 1 ms (default 200)".to_string(),
            }
            .into());
        }

        if self.watch_ignore.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "watch_ignore".to_string(),
                value: "\"\"".to_string(),
                hint: "Remove empty entries from watch_ignore".to_string(),
            }
            .into());
        }

        self.jsx_options()
            .validate()
            .map_err(ConfigError::from)?;

        Ok(())
    }
}
