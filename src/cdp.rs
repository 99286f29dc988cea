//! Chrome DevTools Protocol driver (uses the `headless_chrome` crate)

use crate::print::PrintOptions;
use crate::{EngineConfig, Error, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use std::ffi::{OsStr, OsString};
use std::sync::Arc;
use std::time::Duration;

const DOM_CONTENT_LOADED: &str = "document.readyState !== 'loading' || new Promise(resolve => document.addEventListener('DOMContentLoaded', () => resolve(true)))";

/// Blocking headless Chrome instance with one tab.
///
/// Every call blocks the current thread; [`crate::async_api::CdpSession`]
/// owns one of these on a dedicated worker thread.
pub struct CdpEngine {
    browser: Browser,
    tab: Arc<Tab>,
    config: EngineConfig,
}

impl CdpEngine {
    /// Launch Chrome and open the rendering tab.
    pub fn launch(config: EngineConfig) -> Result<Self> {
        let args: Vec<OsString> = config.engine_args().into_iter().map(OsString::from).collect();
        let arg_refs: Vec<&OsStr> = args.iter().map(|a| a.as_os_str()).collect();

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(!config.disable_sandbox)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .path(config.chrome_path.clone())
            .args(arg_refs)
            .idle_browser_timeout(idle_timeout(&config))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        Ok(Self { browser, tab, config })
    }

    /// Replace the tab's document with `html` and wait for DOMContentLoaded.
    ///
    /// The markup is pushed with `Page.setDocumentContent` into a blank page,
    /// so its size is not bounded by Chrome's URL length limit.
    pub fn load_markup(&self, html: &str) -> Result<()> {
        let load_timeout = self.config.timeouts.load();
        self.tab.set_default_timeout(load_timeout);
        debug!("Loading {} bytes of markup", html.len());

        let as_load_error = |what: &str, e: anyhow::Error| {
            if is_timeout(&e) {
                Error::LoadTimeout(load_timeout.as_millis() as u64)
            } else {
                Error::LoadError(format!("{}: {}", what, e))
            }
        };

        self.tab
            .navigate_to("about:blank")
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| as_load_error("Navigation failed", e))?;

        let frame_id = self
            .tab
            .call_method(Page::GetFrameTree(None))
            .map_err(|e| as_load_error("Frame lookup failed", e))?
            .frame_tree
            .frame
            .id;

        self.tab
            .call_method(Page::SetDocumentContent {
                frame_id,
                html: html.to_string(),
            })
            .map_err(|e| as_load_error("Setting document content failed", e))?;

        let loaded = self
            .tab
            .evaluate(DOM_CONTENT_LOADED, true)
            .map_err(|e| as_load_error("Waiting for DOMContentLoaded failed", e))?;
        if loaded.value.and_then(|v| v.as_bool()) != Some(true) {
            return Err(Error::LoadError("document did not finish parsing".into()));
        }

        Ok(())
    }

    /// Race `document.fonts.ready` against an in-page timer.
    pub fn fonts_ready(&self, timeout: Duration) -> Result<bool> {
        let script = format!(
            "Promise.race([document.fonts.ready.then(() => true), new Promise(resolve => setTimeout(() => resolve(false), {}))])",
            timeout.as_millis()
        );
        let result = self.tab.evaluate(&script, true)?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// Export the current document.
    pub fn print_pdf(&self, options: &PrintOptions) -> Result<Vec<u8>> {
        self.tab.set_default_timeout(Duration::from_millis(options.timeout));
        self.tab
            .print_to_pdf(Some(to_cdp_options(options)))
            .map_err(|e| Error::ExportError(format!("printToPDF failed: {}", e)))
    }

    /// Close the tab and terminate the browser process.
    pub fn close(self) -> Result<()> {
        let closed = self.tab.close(false);
        // Dropping the browser kills the child process even if the tab
        // refused to close.
        drop(self.tab);
        drop(self.browser);
        closed
            .map(|_| ())
            .map_err(|e| Error::CdpError(format!("Failed to close tab: {}", e)))
    }
}

/// Translate print options into `Page.printToPDF` parameters (inches).
pub fn to_cdp_options(options: &PrintOptions) -> PrintToPdfOptions {
    let (width, height) = options.format.size_inches();
    PrintToPdfOptions {
        landscape: Some(options.landscape),
        print_background: Some(options.print_background),
        scale: Some(options.scale),
        paper_width: Some(width),
        paper_height: Some(height),
        margin_top: Some(options.margin.top.to_inches()),
        margin_right: Some(options.margin.right.to_inches()),
        margin_bottom: Some(options.margin.bottom.to_inches()),
        margin_left: Some(options.margin.left.to_inches()),
        page_ranges: options.page_ranges.clone(),
        prefer_css_page_size: Some(options.prefer_css_page_size),
        ..Default::default()
    }
}

// The browser must outlive the slowest stage it may be asked to run.
fn idle_timeout(config: &EngineConfig) -> Duration {
    let t = &config.timeouts;
    Duration::from_millis(t.load_ms.max(t.export_ms).max(t.fonts_ms) + t.close_ms)
}

fn is_timeout(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("timed out") || msg.contains("timeout") || msg.contains("never came")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::{Length, LengthUnit, Margins, PageFormat};

    #[test]
    fn print_options_map_to_inches() {
        let options = PrintOptions {
            format: PageFormat::Letter,
            margin: Margins::uniform(Length::new(25.4, LengthUnit::Mm)),
            scale: 0.8,
            landscape: true,
            page_ranges: Some("1-2".into()),
            ..Default::default()
        };
        let cdp = to_cdp_options(&options);
        assert_eq!(cdp.paper_width, Some(8.5));
        assert_eq!(cdp.paper_height, Some(11.0));
        assert_eq!(cdp.margin_left, Some(1.0));
        assert_eq!(cdp.scale, Some(0.8));
        assert_eq!(cdp.landscape, Some(true));
        assert_eq!(cdp.page_ranges.as_deref(), Some("1-2"));
        assert_eq!(cdp.prefer_css_page_size, Some(true));
    }

    #[test]
    fn idle_timeout_covers_every_stage() {
        let config = EngineConfig::default();
        assert_eq!(idle_timeout(&config), Duration::from_millis(70_000));
    }

    #[test]
    fn test_cdp_engine_launch() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        match CdpEngine::launch(EngineConfig::default()) {
            Ok(engine) => {
                if let Err(e) = engine.close() {
                    eprintln!("Closing the test engine failed: {}", e);
                }
            }
            Err(e) => eprintln!(
                "Skipping CDP launch test because Chrome is not available or failed to launch: {}",
                e
            ),
        }
    }
}
