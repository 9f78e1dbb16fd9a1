//! Bot configuration.
//!
//! All behaviour knobs live in [`BotConfig`], built via
//! [`BotConfigBuilder`]. The defaults give a
//! five-minute idle window and two-document merges.

use crate::error::BotError;
use std::path::PathBuf;
use std::time::Duration;

/// Default reply to the "about" command.
pub const DEFAULT_ABOUT_TEXT: &str =
    "PDF Bot created by Aryan. Version 2.0\nType \"menu\" to see available commands.";

/// Configuration for a [`crate::bot::PdfBot`].
///
/// # Example
/// ```rust
/// use pdfbot::BotConfig;
/// use std::time::Duration;
///
/// let config = BotConfig::builder()
///     .idle_timeout(Duration::from_secs(120))
///     .merge_max_inputs(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.merge_min_inputs, 2);
/// ```
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Inactivity after which a session is discarded. Default: 5 minutes.
    pub idle_timeout: Duration,

    /// Buffered PDFs at which a merge runs without waiting for "done". Default: 2.
    pub merge_max_inputs: usize,

    /// Fewest PDFs "done" will merge. Default: 2.
    pub merge_min_inputs: usize,

    /// Send a "working on it" notice before each processor call. Default: false.
    pub progress_notices: bool,

    /// Reply to command "4".
    pub about_text: String,

    /// Explicit libpdfium location. If None, the system library is used.
    pub pdfium_library_path: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(5 * 60),
            merge_max_inputs: 2,
            merge_min_inputs: 2,
            progress_notices: false,
            about_text: DEFAULT_ABOUT_TEXT.to_string(),
            pdfium_library_path: None,
        }
    }
}

impl BotConfig {
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BotConfig`].
#[derive(Debug)]
pub struct BotConfigBuilder {
    config: BotConfig,
}

impl BotConfigBuilder {
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn merge_max_inputs(mut self, n: usize) -> Self {
        self.config.merge_max_inputs = n;
        self
    }

    pub fn merge_min_inputs(mut self, n: usize) -> Self {
        self.config.merge_min_inputs = n;
        self
    }

    pub fn progress_notices(mut self, v: bool) -> Self {
        self.config.progress_notices = v;
        self
    }

    pub fn about_text(mut self, text: impl Into<String>) -> Self {
        self.config.about_text = text.into();
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BotConfig, BotError> {
        let c = &self.config;
        if c.idle_timeout.is_zero() {
            return Err(BotError::InvalidConfig(
                "Idle timeout must be greater than zero".into(),
            ));
        }
        if c.merge_min_inputs < 2 {
            return Err(BotError::InvalidConfig(format!(
                "Merge minimum must be ≥ 2, got {}",
                c.merge_min_inputs
            )));
        }
        if c.merge_max_inputs < c.merge_min_inputs {
            return Err(BotError::InvalidConfig(format!(
                "Merge maximum ({}) must be ≥ minimum ({})",
                c.merge_max_inputs, c.merge_min_inputs
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = BotConfig::default();
        assert_eq!(c.idle_timeout, Duration::from_secs(300));
        assert_eq!(c.merge_max_inputs, 2);
        assert_eq!(c.merge_min_inputs, 2);
        assert!(!c.progress_notices);
        assert!(c.pdfium_library_path.is_none());
        assert!(c.about_text.starts_with("PDF Bot created by Aryan. Version 2.0"));
    }

    #[test]
    fn builder_sets_fields() {
        let c = BotConfig::builder()
            .idle_timeout(Duration::from_secs(60))
            .merge_max_inputs(4)
            .merge_min_inputs(3)
            .progress_notices(true)
            .about_text("hi")
            .pdfium_library_path("/opt/pdfium/libpdfium.so")
            .build()
            .unwrap();
        assert_eq!(c.idle_timeout, Duration::from_secs(60));
        assert_eq!(c.merge_max_inputs, 4);
        assert_eq!(c.merge_min_inputs, 3);
        assert!(c.progress_notices);
        assert_eq!(c.about_text, "hi");
        assert!(c.pdfium_library_path.is_some());
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = BotConfig::builder()
            .idle_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Idle timeout"));
    }

    #[test]
    fn merge_bounds_validated() {
        assert!(BotConfig::builder().merge_min_inputs(1).build().is_err());
        assert!(BotConfig::builder().merge_max_inputs(1).build().is_err());
        assert!(BotConfig::builder()
            .merge_min_inputs(3)
            .merge_max_inputs(3)
            .build()
            .is_ok());
    }
}
