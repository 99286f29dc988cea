//! Resume PDF pipeline
//!
//! Renders structured resume data to HTML and exports it to PDF through a
//! headless Chrome instance driven over the DevTools protocol.
//!
//! # Features
//!
//! - **Template rendering**: deterministic, escaped HTML from resume JSON
//! - **CDP Backend** (default): one headless Chrome per conversion, launched
//!   with bounded retries and always released
//! - **Swappable engines**: the pipeline talks to [`engine::EngineLauncher`],
//!   so tests and alternative backends can stand in for Chrome
//!
//! # Example
//!
//! ```no_run
//! use resume_pdf::{ConversionRequest, EngineConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = resume_pdf::new_converter(EngineConfig::default())?;
//! let request: ConversionRequest = serde_json::from_value(serde_json::json!({
//!     "templateId": "modern",
//!     "templateData": { "personalInfo": { "name": "Jane Doe" }, "summary": "Engineer." }
//! }))?;
//! let pdf = converter.convert(request).await?;
//! std::fs::write(&pdf.filename, &pdf.bytes)?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod error;
pub use error::{ConversionFailure, Error, ErrorKind, Result};

pub mod merge;
pub mod print;
pub mod template;

pub mod engine;
pub mod convert;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async facade over the blocking CDP driver (one worker thread per engine)
#[cfg(feature = "cdp")]
pub mod async_api;

pub use convert::{ConversionRequest, Converter, PdfDocument};
pub use print::PrintOptions;
pub use template::{render, Customization, RenderedMarkup};

#[cfg(feature = "cdp")]
pub use async_api::CdpLauncher;

/// Configuration for launching and driving rendering engines
///
/// One value is built at startup and shared read-only by every conversion.
/// The defaults target constrained container hosts: sandboxing, GPU and
/// `/dev/shm` usage are disabled and font hinting is turned off so glyph
/// metrics match between screen and print.
///
/// # Examples
///
/// ```
/// let cfg = resume_pdf::EngineConfig::default();
/// assert_eq!(cfg.max_launch_attempts, 3);
/// assert_eq!(cfg.viewport.width, 794);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Chrome/Chromium executable; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Run without a visible window
    pub headless: bool,
    /// Pass `--no-sandbox --disable-setuid-sandbox`
    pub disable_sandbox: bool,
    /// Pass `--disable-gpu`
    pub disable_gpu: bool,
    /// Pass `--disable-dev-shm-usage` (use /tmp instead of shared memory)
    pub disable_dev_shm_usage: bool,
    /// Window size and device pixel ratio
    pub viewport: Viewport,
    /// Value of `--font-render-hinting`
    pub font_rendering: FontRenderHinting,
    /// Additional command-line flags appended verbatim
    pub extra_args: Vec<String>,
    /// Launch attempts before giving up with `Error::EngineLaunch`
    pub max_launch_attempts: u32,
    /// Linear backoff unit after a "resource busy" launch failure (ms)
    pub busy_backoff_ms: u64,
    /// Fixed backoff after any other launch failure (ms)
    pub retry_backoff_ms: u64,
    /// Per-stage timeout ceilings
    pub timeouts: StageTimeouts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            disable_sandbox: true,
            disable_gpu: true,
            disable_dev_shm_usage: true,
            viewport: Viewport::default(),
            font_rendering: FontRenderHinting::None,
            extra_args: Vec::new(),
            max_launch_attempts: 3,
            busy_backoff_ms: 1000,
            retry_backoff_ms: 500,
            timeouts: StageTimeouts::default(),
        }
    }
}

impl EngineConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_launch_attempts == 0 {
            return Err(Error::ConfigError("maxLaunchAttempts must be at least 1".into()));
        }
        self.viewport.validate()?;
        self.timeouts.validate()
    }

    /// Command-line flags for the engine process, excluding the sandbox
    /// switch which the launcher sets itself.
    pub fn engine_args(&self) -> Vec<String> {
        let mut args = vec![
            "--disable-extensions".to_string(),
            "--disable-sync".to_string(),
            "--no-first-run".to_string(),
            "--hide-scrollbars".to_string(),
        ];
        if self.disable_sandbox {
            args.push("--disable-setuid-sandbox".to_string());
            args.push("--no-zygote".to_string());
        }
        if self.disable_gpu {
            args.push("--disable-gpu".to_string());
        }
        if self.disable_dev_shm_usage {
            args.push("--disable-dev-shm-usage".to_string());
        }
        args.push(format!("--font-render-hinting={}", self.font_rendering.as_str()));
        args.push(format!(
            "--force-device-scale-factor={}",
            self.viewport.device_scale_factor
        ));
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Viewport dimensions
///
/// Defaults to an A4 page at 96 DPI rendered at 1.5x density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 794,
            height: 1123,
            device_scale_factor: 1.5,
        }
    }
}

impl Viewport {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidParameter("viewport must be non-empty".into()));
        }
        if !(self.device_scale_factor > 0.0 && self.device_scale_factor <= 4.0) {
            return Err(Error::InvalidParameter(format!(
                "deviceScaleFactor must be in (0, 4], got {}",
                self.device_scale_factor
            )));
        }
        Ok(())
    }
}

/// Font rasterization hinting mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontRenderHinting {
    None,
    Slight,
    Medium,
    Full,
}

impl FontRenderHinting {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontRenderHinting::None => "none",
            FontRenderHinting::Slight => "slight",
            FontRenderHinting::Medium => "medium",
            FontRenderHinting::Full => "full",
        }
    }
}

/// Timeout ceilings for each pipeline stage, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageTimeouts {
    /// One launch attempt
    pub launch_ms: u64,
    /// Markup load up to DOMContentLoaded
    pub load_ms: u64,
    /// Best-effort wait for web fonts
    pub fonts_ms: u64,
    /// Upper bound for the export; requests may ask for less
    pub export_ms: u64,
    /// Engine shutdown during release
    pub close_ms: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            launch_ms: 30_000,
            load_ms: 30_000,
            fonts_ms: 5_000,
            export_ms: 60_000,
            close_ms: 10_000,
        }
    }
}

impl StageTimeouts {
    pub fn launch(&self) -> Duration {
        Duration::from_millis(self.launch_ms)
    }

    pub fn load(&self) -> Duration {
        Duration::from_millis(self.load_ms)
    }

    pub fn fonts(&self) -> Duration {
        Duration::from_millis(self.fonts_ms)
    }

    pub fn close(&self) -> Duration {
        Duration::from_millis(self.close_ms)
    }

    /// Export limit for a request asking for `requested_ms`.
    pub fn export(&self, requested_ms: u64) -> Duration {
        Duration::from_millis(requested_ms.min(self.export_ms))
    }

    fn validate(&self) -> Result<()> {
        let all = [
            ("launchMs", self.launch_ms),
            ("loadMs", self.load_ms),
            ("fontsMs", self.fonts_ms),
            ("exportMs", self.export_ms),
            ("closeMs", self.close_ms),
        ];
        match all.iter().find(|(_, ms)| *ms == 0) {
            Some((name, _)) => Err(Error::ConfigError(format!("timeouts.{} must be positive", name))),
            None => Ok(()),
        }
    }
}

/// Create a converter backed by headless Chrome.
#[cfg(feature = "cdp")]
pub fn new_converter(config: EngineConfig) -> Result<Converter<CdpLauncher>> {
    Converter::new(CdpLauncher, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.viewport.width, 794);
        assert_eq!(config.viewport.height, 1123);
        assert_eq!(config.timeouts.load_ms, 30_000);
        assert_eq!(config.timeouts.fonts_ms, 5_000);
        assert_eq!(config.timeouts.export_ms, 60_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn engine_args_reflect_flags() {
        let config = EngineConfig {
            disable_gpu: false,
            font_rendering: FontRenderHinting::Slight,
            extra_args: vec!["--lang=en-US".into()],
            ..Default::default()
        };
        let args = config.engine_args();
        assert!(!args.contains(&"--disable-gpu".to_string()));
        assert!(args.contains(&"--disable-dev-shm-usage".to_string()));
        assert!(args.contains(&"--font-render-hinting=slight".to_string()));
        assert!(args.contains(&"--force-device-scale-factor=1.5".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--lang=en-US"));
    }

    #[test]
    fn partial_config_files_keep_defaults() {
        let config = merge::merge_typed(
            &EngineConfig::default(),
            &serde_json::json!({"maxLaunchAttempts": 5, "viewport": {"width": 800}}),
        )
        .unwrap();
        assert_eq!(config.max_launch_attempts, 5);
        // The viewport object is replaced, its missing fields fall back to defaults.
        assert_eq!(config.viewport.width, 800);
        assert_eq!(config.viewport.height, 1123);
        assert_eq!(config.timeouts, StageTimeouts::default());
    }

    #[test]
    fn export_limit_is_capped() {
        let t = StageTimeouts::default();
        assert_eq!(t.export(10_000), Duration::from_millis(10_000));
        assert_eq!(t.export(600_000), Duration::from_millis(60_000));
    }

    #[test]
    fn zero_attempts_is_a_config_error() {
        let config = EngineConfig {
            max_launch_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }
}
