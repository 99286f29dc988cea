//! Document conversion orchestrator.
//!
//! A conversion runs one strictly ordered pipeline:
//!
//! ```text
//! Idle -> Acquiring -> Loading -> AwaitingReady -> Printing -> Releasing -> Done
//!             |           |                          |
//!             +-----------+--------> Failed ---------+--> Releasing (if an engine was acquired)
//! ```
//!
//! Request validation and markup rendering happen before `Acquiring`, so bad
//! input never costs an engine launch. Once an engine is acquired it is
//! released on every path before the result is returned.

use crate::engine::{EngineHandle, EngineLauncher, EngineSession, ProcessManager};
use crate::merge::merge_typed;
use crate::print::PrintOptions;
use crate::template::{self, Customization, RenderedMarkup};
use crate::{EngineConfig, Error, Result};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;
use tokio::time::timeout;

/// Media type of conversion output.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

const DEFAULT_FILENAME: &str = "resume.pdf";

/// Load ceiling for [`ConversionRequest::self_test`] conversions.
pub const SELF_TEST_LOAD_TIMEOUT_MS: u64 = 20_000;

const SELF_TEST_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<style>
  body { font-family: Arial, sans-serif; margin: 20px; font-size: 12px; }
  h1 { font-size: 16px; }
</style>
</head>
<body>
<h1>PDF Test</h1>
<p>Basic PDF test.</p>
</body>
</html>
"#;

/// A conversion (or preview) request as sent by callers.
///
/// Exactly one of `html_content` and `template_id` must be set for a
/// conversion. Empty strings count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub html_content: Option<String>,
    pub template_id: Option<String>,
    pub template_data: Option<Value>,
    pub customization: Option<Customization>,
    /// Overrides merged onto the default print options
    #[serde(alias = "pdfOptions")]
    pub print_options: Option<Value>,
    /// Overrides merged onto the configured viewport for this request's engine
    pub viewport: Option<Value>,
    /// Suggested output filename
    pub filename: Option<String>,
}

impl ConversionRequest {
    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            html_content: Some(html.into()),
            ..Default::default()
        }
    }

    pub fn from_template(template_id: impl Into<String>, template_data: Option<Value>) -> Self {
        Self {
            template_id: Some(template_id.into()),
            template_data,
            ..Default::default()
        }
    }

    /// Minimal built-in page used to check that the engine can export at all.
    pub fn self_test() -> Self {
        Self {
            print_options: Some(serde_json::json!({
                "format": "a4",
                "printBackground": true,
                "margin": {"top": "10mm", "right": "10mm", "bottom": "10mm", "left": "10mm"},
                "scale": 0.8,
                "timeout": 30_000
            })),
            filename: Some("test.pdf".into()),
            ..Self::from_html(SELF_TEST_HTML)
        }
    }
}

/// A finished PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfDocument {
    pub bytes: Vec<u8>,
    /// Suggested filename; carries no meaning for the pipeline
    pub filename: String,
}

impl PdfDocument {
    pub fn media_type(&self) -> &'static str {
        PDF_MEDIA_TYPE
    }
}

/// Everything a conversion needs once the request has been validated.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub markup: String,
    pub template_id: Option<String>,
    pub print_options: PrintOptions,
    pub engine_config: EngineConfig,
    pub filename: String,
}

/// Pipeline position of one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    Idle,
    Acquiring,
    Loading,
    AwaitingReady,
    Printing,
    Releasing,
    Done,
    Failed,
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversionState::Idle => "idle",
            ConversionState::Acquiring => "acquiring",
            ConversionState::Loading => "loading",
            ConversionState::AwaitingReady => "awaiting-ready",
            ConversionState::Printing => "printing",
            ConversionState::Releasing => "releasing",
            ConversionState::Done => "done",
            ConversionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct Progress<'a> {
    label: &'a str,
    state: ConversionState,
}

impl<'a> Progress<'a> {
    fn new(label: &'a str) -> Self {
        Self {
            label,
            state: ConversionState::Idle,
        }
    }

    fn enter(&mut self, next: ConversionState) {
        debug!("{}: {} -> {}", self.label, self.state, next);
        self.state = next;
    }
}

/// Render markup for preview without touching the engine.
pub fn preview(request: &ConversionRequest) -> Result<RenderedMarkup> {
    let template_id = non_empty(request.template_id.as_deref())
        .ok_or_else(|| Error::MissingParameter("templateId".into()))?;
    let customization = request.customization.clone().unwrap_or_default();
    Ok(template::render(
        template_id,
        request.template_data.as_ref(),
        &customization,
    ))
}

/// Top-level entry point for conversions.
pub struct Converter<L: EngineLauncher> {
    manager: ProcessManager<L>,
    config: EngineConfig,
    print_defaults: PrintOptions,
}

impl<L: EngineLauncher> Converter<L> {
    /// `config` is validated here and never changes afterwards.
    pub fn new(launcher: L, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            manager: ProcessManager::new(launcher, &config),
            config,
            print_defaults: PrintOptions::default(),
        })
    }

    /// Replace the print options requests are merged onto.
    pub fn with_print_defaults(mut self, defaults: PrintOptions) -> Result<Self> {
        defaults.validate()?;
        self.print_defaults = defaults;
        Ok(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn manager(&self) -> &ProcessManager<L> {
        &self.manager
    }

    /// Validate a request, render its markup and resolve its options.
    pub fn prepare(&self, request: ConversionRequest) -> Result<PreparedJob> {
        let ConversionRequest {
            html_content,
            template_id,
            template_data,
            customization,
            print_options,
            viewport,
            filename,
        } = request;

        let html_content = html_content.filter(|s| !s.is_empty());
        let template_id = template_id.filter(|s| !s.is_empty());

        let (markup, defaults, default_name) = match (html_content, template_id.as_deref()) {
            (Some(html), None) => (html, self.print_defaults.clone(), DEFAULT_FILENAME.to_string()),
            (None, Some(id)) => {
                let customization = customization.unwrap_or_default();
                let markup = template::render(id, template_data.as_ref(), &customization);
                let mut defaults = self.print_defaults.clone();
                // 0 and NaN fall back to the configured default
                if let Some(scale) = customization.scale.filter(|s| *s != 0.0 && !s.is_nan()) {
                    defaults.scale = scale;
                }
                (markup.into_string(), defaults, format!("{}-resume.pdf", id))
            }
            (Some(_), Some(_)) => {
                return Err(Error::MissingParameter(
                    "htmlContent or templateId (not both)".into(),
                ))
            }
            (None, None) => {
                return Err(Error::MissingParameter("htmlContent or templateId".into()))
            }
        };

        let print_options = defaults.with_overrides(print_options.as_ref().unwrap_or(&Value::Null))?;

        let mut engine_config = self.config.clone();
        if let Some(overrides) = viewport {
            engine_config.viewport = merge_typed(&engine_config.viewport, &overrides)?;
            engine_config.viewport.validate()?;
        }

        Ok(PreparedJob {
            markup,
            template_id,
            print_options,
            engine_config,
            filename: sanitize_filename(filename.as_deref().unwrap_or(&default_name)),
        })
    }

    /// Convert a request to PDF.
    pub async fn convert(&self, request: ConversionRequest) -> Result<PdfDocument> {
        let job = self.prepare(request)?;
        self.convert_prepared(job).await
    }

    /// Run the engine pipeline for an already prepared job.
    pub async fn convert_prepared(&self, job: PreparedJob) -> Result<PdfDocument> {
        let started = Instant::now();
        let label = match &job.template_id {
            Some(id) => format!("conversion[{}]", id),
            None => "conversion[html]".to_string(),
        };
        let mut progress = Progress::new(&label);

        progress.enter(ConversionState::Acquiring);
        let mut handle = match self.manager.acquire(&job.engine_config).await {
            Ok(handle) => handle,
            Err(err) => {
                progress.enter(ConversionState::Failed);
                warn!("{}: {}", label, err);
                return Err(err);
            }
        };

        let outcome = self.run_stages(&mut handle, &job, &mut progress).await;
        if let Err(err) = &outcome {
            progress.enter(ConversionState::Failed);
            warn!("{}: {}", label, err);
            handle.mark_failed();
        }

        progress.enter(ConversionState::Releasing);
        self.manager.release(&mut handle).await;

        let bytes = outcome?;
        progress.enter(ConversionState::Done);
        info!(
            "{}: {} bytes in {}ms",
            label,
            bytes.len(),
            started.elapsed().as_millis()
        );
        Ok(PdfDocument {
            bytes,
            filename: job.filename,
        })
    }

    /// Convert many requests, at most `parallelism` at a time, each with its
    /// own engine. Results keep the input order.
    pub async fn convert_all(
        &self,
        requests: Vec<ConversionRequest>,
        parallelism: usize,
    ) -> Vec<Result<PdfDocument>> {
        stream::iter(requests)
            .map(|request| self.convert(request))
            .buffered(parallelism.max(1))
            .collect()
            .await
    }

    async fn run_stages(
        &self,
        handle: &mut EngineHandle<L::Session>,
        job: &PreparedJob,
        progress: &mut Progress<'_>,
    ) -> Result<Vec<u8>> {
        let timeouts = &self.config.timeouts;
        let session = handle.session_mut()?;

        progress.enter(ConversionState::Loading);
        match timeout(timeouts.load(), session.load_markup(&job.markup)).await {
            Ok(Ok(())) => {}
            Ok(Err(err @ (Error::LoadTimeout(_) | Error::LoadError(_)))) => return Err(err),
            Ok(Err(err)) => return Err(Error::LoadError(err.to_string())),
            Err(_) => return Err(Error::LoadTimeout(timeouts.load_ms)),
        }

        progress.enter(ConversionState::AwaitingReady);
        await_fonts(session, timeouts.fonts(), progress.label).await;

        progress.enter(ConversionState::Printing);
        let limit = timeouts.export(job.print_options.timeout);
        let bytes = match timeout(limit, session.print_pdf(&job.print_options)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err @ Error::ExportError(_))) => return Err(err),
            Ok(Err(err)) => return Err(Error::ExportError(err.to_string())),
            Err(_) => {
                return Err(Error::ExportError(format!(
                    "export timed out after {}ms",
                    limit.as_millis()
                )))
            }
        };

        if !bytes.starts_with(b"%PDF-") {
            return Err(Error::ExportError(format!(
                "engine returned {} bytes that are not a PDF document",
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

/// Best-effort font wait; never fails the conversion.
async fn await_fonts<S: EngineSession>(session: &mut S, limit: std::time::Duration, label: &str) {
    match timeout(limit, session.fonts_ready(limit)).await {
        Ok(Ok(true)) => debug!("{}: fonts ready", label),
        Ok(Ok(false)) | Err(_) => warn!(
            "{}: fonts not ready after {}ms, continuing",
            label,
            limit.as_millis()
        ),
        Ok(Err(err)) => warn!("{}: font readiness check failed ({}), continuing", label, err),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Restrict a suggested filename to a safe character set ending in `.pdf`.
pub fn sanitize_filename(name: &str) -> String {
    let mut stem = name.trim();
    while let Some(rest) = strip_pdf_extension(stem) {
        stem = rest;
    }
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '-');
    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        format!("{}.pdf", cleaned)
    }
}

fn strip_pdf_extension(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(4)?;
    match name.get(split..) {
        Some(ext) if ext.eq_ignore_ascii_case(".pdf") => name.get(..split),
        _ => None,
    }
}

/// Make suggested filenames unique within one batch.
///
/// Later duplicates (compared case-insensitively) get `-2`, `-3`, ...
/// appended to their stem; the first occurrence keeps its name.
pub fn unique_filenames<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let stem = strip_pdf_extension(name).unwrap_or(name);
            let mut candidate = name.to_string();
            let mut n = 1;
            while !taken.insert(candidate.to_ascii_lowercase()) {
                n += 1;
                candidate = format!("{}-{}.pdf", stem, n);
            }
            candidate
        })
        .collect()
}
