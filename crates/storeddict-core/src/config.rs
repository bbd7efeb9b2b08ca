//! Configuration for a StoredDict
//!
//! Provides the defaults used by the metadata store and builder-style
//! setters for the rest.

use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Title written at the top of the backing file when none is given.
pub const DEFAULT_TITLE: &str = "Written by StoredDict.";

/// Quiet period before a mutation is written to disk when none is given.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Longest accepted debounce delay.
const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// StoredDict configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Quiet period since the last mutation before the cache is written
    pub delay: Duration,
    /// Comment written on the first line of the backing file
    pub title: Option<String>,
    /// Reject values that do not survive a YAML round trip
    pub validate_serializable: bool,
    /// Skip every disk write (documentation builds, read-only previews)
    pub dry_run: bool,
    /// Fsync the temporary file and its directory around the rename
    pub durable: bool,
}

impl StoreConfig {
    /// Set the debounce delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the debounce delay in (fractional) seconds. Negative values and
    /// NaN clamp to zero; values past the maximum (including infinity) are
    /// kept out of range so `validate()` rejects them.
    pub fn with_delay_secs(mut self, secs: f64) -> Self {
        self.delay = if secs.is_nan() || secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(secs.min(MAX_DELAY.as_secs_f64() + 1.0))
        };
        self
    }

    /// Set the header title. An empty title suppresses the title line.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_serializable = validate;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Title that goes into the header, if any.
    pub fn header_title(&self) -> Option<&str> {
        match self.title.as_deref() {
            Some("") => None,
            Some(title) => Some(title),
            None => Some(DEFAULT_TITLE),
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StoreResult<()> {
        if self.delay > MAX_DELAY {
            return Err(StoreError::InvalidConfig(format!(
                "delay must be <= {}s, got {:.3}s",
                MAX_DELAY.as_secs(),
                self.delay.as_secs_f64()
            )));
        }
        if let Some(title) = &self.title {
            if title.contains('\n') || title.contains('\r') {
                return Err(StoreError::InvalidConfig("title must be a single line".into()));
            }
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            title: None,
            validate_serializable: true,
            dry_run: false,
            durable: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delay, Duration::from_secs(5));
        assert!(config.validate_serializable);
        assert_eq!(config.header_title(), Some(DEFAULT_TITLE));
    }

    #[test]
    fn test_negative_delay_clamps_to_zero() {
        let config = StoreConfig::default().with_delay_secs(-3.0);
        assert_eq!(config.delay, Duration::ZERO);

        let config = StoreConfig::default().with_delay_secs(f64::NAN);
        assert_eq!(config.delay, Duration::ZERO);

        let config = StoreConfig::default().with_delay_secs(0.25);
        assert_eq!(config.delay, Duration::from_millis(250));
    }

    #[test]
    fn test_empty_title_suppresses_header_line() {
        let config = StoreConfig::default().with_title("");
        assert_eq!(config.header_title(), None);

        let config = StoreConfig::default().with_title("metadata");
        assert_eq!(config.header_title(), Some("metadata"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = StoreConfig::default().with_title("two\nlines");
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));

        let config = StoreConfig::default().with_delay(Duration::from_secs(7 * 24 * 3600));
        assert!(config.validate().is_err());

        let config = StoreConfig::default().with_delay_secs(1e12);
        assert!(config.validate().is_err());

        let config = StoreConfig::default().with_delay_secs(f64::INFINITY);
        assert!(config.delay > Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
