//! resume-pdf: render resume templates and convert them to PDF from the shell.
//!
//! Requests are the same JSON objects the library accepts. Failures are
//! reported on stderr as `{"error": <kind>, "details": <message>}`.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;
use resume_pdf::convert::{self, ConversionRequest, SELF_TEST_LOAD_TIMEOUT_MS};
use resume_pdf::{merge, Customization, EngineConfig, Error, ErrorKind, PdfDocument};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "resume-pdf", version, about = "Render resumes to HTML and PDF")]
struct Cli {
    /// JSON file with engine settings merged over the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chrome/Chromium executable to launch
    #[arg(long, global = true)]
    chrome: Option<PathBuf>,

    /// Launch attempts before reporting the engine as busy
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a template to HTML without starting a browser
    Render(TemplateArgs),
    /// Convert one request (or an HTML file) to PDF
    Convert(ConvertArgs),
    /// Convert several request files concurrently
    Batch(BatchArgs),
    /// Export a minimal built-in page to check that Chrome works
    Selftest(SelftestArgs),
}

#[derive(Args, Debug)]
struct TemplateArgs {
    /// JSON request carrying templateId, templateData and customization
    #[arg(long, conflicts_with_all = ["template_id", "data", "customization"])]
    request: Option<PathBuf>,
    /// Template identifier
    #[arg(long)]
    template_id: Option<String>,
    /// JSON file with the resume data
    #[arg(long)]
    data: Option<PathBuf>,
    /// JSON file with layout customization
    #[arg(long)]
    customization: Option<PathBuf>,
    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// JSON conversion request
    #[arg(long, conflicts_with = "html")]
    request: Option<PathBuf>,
    /// HTML file to convert as-is
    #[arg(long)]
    html: Option<PathBuf>,
    /// JSON file with print option overrides
    #[arg(long)]
    print_options: Option<PathBuf>,
    /// Output file (defaults to the suggested filename)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// JSON conversion requests
    #[arg(required = true)]
    requests: Vec<PathBuf>,
    /// Directory for the generated PDFs
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Conversions in flight at once (defaults to the CPU count)
    #[arg(short, long)]
    jobs: Option<usize>,
}

#[derive(Args, Debug)]
struct SelftestArgs {
    /// Output file
    #[arg(short, long, default_value = "test.pdf")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => report(&err),
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Render(args) => render(args),
        Command::Convert(args) => convert_one(config, args).await,
        Command::Batch(args) => batch(config, args).await,
        Command::Selftest(args) => selftest(config, args).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => merge::merge_typed(&EngineConfig::default(), &read_json(path)?)?,
        None => EngineConfig::default(),
    };
    if let Some(chrome) = &cli.chrome {
        config.chrome_path = Some(chrome.clone());
    }
    if let Some(n) = cli.max_attempts {
        config.max_launch_attempts = n;
    }
    config.validate()?;
    Ok(config)
}

fn render(args: TemplateArgs) -> anyhow::Result<ExitCode> {
    let request = match &args.request {
        Some(path) => parse_request(path)?,
        None => {
            let customization: Customization = match &args.customization {
                Some(path) => parse_json(&read_text(path)?, path)?,
                None => Customization::default(),
            };
            ConversionRequest {
                template_id: args.template_id.clone(),
                template_data: args.data.as_deref().map(read_json).transpose()?,
                customization: Some(customization),
                ..Default::default()
            }
        }
    };

    let markup = convert::preview(&request)?;
    info!("Rendered {} bytes (sha256 {})", markup.len(), markup.digest());

    match args.output {
        Some(path) => std::fs::write(&path, markup.as_str())
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", markup),
    }
    Ok(ExitCode::SUCCESS)
}

async fn convert_one(config: EngineConfig, args: ConvertArgs) -> anyhow::Result<ExitCode> {
    let mut request = match (&args.request, &args.html) {
        (Some(path), _) => parse_request(path)?,
        (None, Some(path)) => ConversionRequest::from_html(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        (None, None) => ConversionRequest::default(),
    };
    if let Some(path) = &args.print_options {
        request.print_options = Some(read_json(path)?);
    }

    let converter = resume_pdf::new_converter(config)?;
    let pdf = converter.convert(request).await?;

    let output = args.output.unwrap_or_else(|| PathBuf::from(&pdf.filename));
    std::fs::write(&output, &pdf.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!("Wrote {} ({} bytes, {})", output.display(), pdf.bytes.len(), pdf.media_type());
    Ok(ExitCode::SUCCESS)
}

async fn batch(config: EngineConfig, args: BatchArgs) -> anyhow::Result<ExitCode> {
    let requests = args
        .requests
        .iter()
        .map(|path| parse_request(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let jobs = args.jobs.unwrap_or_else(num_cpus::get);
    let converter = resume_pdf::new_converter(config)?;
    let results = converter.convert_all(requests, jobs).await;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let outputs = output_paths(&args.out_dir, &results);
    let mut failed = 0usize;
    for ((path, result), output) in args.requests.iter().zip(results).zip(outputs) {
        match (result, output) {
            (Ok(pdf), Some(output)) => {
                std::fs::write(&output, &pdf.bytes)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                info!("{} -> {}", path.display(), output.display());
            }
            (Ok(_), None) => {
                failed += 1;
                eprintln!("{}: no output path assigned", path.display());
            }
            (Err(err), _) => {
                failed += 1;
                eprintln!(
                    "{}: {}",
                    path.display(),
                    serde_json::to_string(&err.to_failure()).unwrap_or_else(|_| err.to_string())
                );
            }
        }
    }

    if failed == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn selftest(mut config: EngineConfig, args: SelftestArgs) -> anyhow::Result<ExitCode> {
    config.timeouts.load_ms = config.timeouts.load_ms.min(SELF_TEST_LOAD_TIMEOUT_MS);
    let converter = resume_pdf::new_converter(config)?;
    let pdf = converter.convert(ConversionRequest::self_test()).await?;
    std::fs::write(&args.output, &pdf.bytes)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("Self test passed: {} ({} bytes)", args.output.display(), pdf.bytes.len());
    Ok(ExitCode::SUCCESS)
}

/// Output path per batch result; successful conversions never share a path.
fn output_paths(out_dir: &Path, results: &[resume_pdf::Result<PdfDocument>]) -> Vec<Option<PathBuf>> {
    let mut names = convert::unique_filenames(
        results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|pdf| pdf.filename.as_str()),
    )
    .into_iter();
    results
        .iter()
        .map(|r| match r {
            Ok(_) => names.next().map(|name| out_dir.join(name)),
            Err(_) => None,
        })
        .collect()
}

fn parse_request(path: &Path) -> anyhow::Result<ConversionRequest> {
    Ok(parse_json(&read_text(path)?, path)?)
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    Ok(parse_json(&read_text(path)?, path)?)
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Malformed caller JSON is invalid input, not an internal fault.
fn parse_json<T: DeserializeOwned>(text: &str, origin: &Path) -> resume_pdf::Result<T> {
    serde_json::from_str(text)
        .map_err(|e| Error::InvalidParameter(format!("{}: {}", origin.display(), e)))
}

fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<Error>() {
        Some(err) => {
            let failure = err.to_failure();
            eprintln!(
                "{}",
                serde_json::to_string(&failure).unwrap_or_else(|_| failure.details.clone())
            );
        }
        None => {
            eprintln!("{}", serde_json::json!({"error": "internal", "details": format!("{:#}", err)}));
        }
    }
    ExitCode::from(exit_status(err))
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>().map(Error::kind) {
        Some(kind) if kind.is_caller_error() => 2,
        Some(ErrorKind::EngineBusy) => 75,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn origin() -> &'static Path {
        Path::new("request.json")
    }

    #[test]
    fn malformed_requests_exit_as_invalid_input() {
        for text in [
            "{not json",
            r#"{"templateId": "modern", "customization": {"sectionOrder": {"layout": "grid"}}}"#,
            r#"{"templateId": "modern", "customization": {"scale": "0.9"}}"#,
        ] {
            let err: anyhow::Error = parse_json::<ConversionRequest>(text, origin())
                .unwrap_err()
                .into();
            assert_eq!(exit_status(&err), 2, "{text}");
            assert_eq!(err.downcast_ref::<Error>().unwrap().kind(), ErrorKind::InvalidParameter);
        }
    }

    #[test]
    fn exit_status_by_kind() {
        let busy = anyhow::Error::from(Error::EngineLaunch {
            attempts: 3,
            cause: "ETXTBSY".into(),
        });
        assert_eq!(exit_status(&busy), 75);
        let missing = anyhow::Error::from(Error::MissingParameter("templateId".into()));
        assert_eq!(exit_status(&missing), 2);
        let export = anyhow::Error::from(Error::ExportError("boom".into()));
        assert_eq!(exit_status(&export), 1);
        let io = anyhow::anyhow!("failed to read request.json");
        assert_eq!(exit_status(&io), 1);
    }

    #[test]
    fn batch_outputs_do_not_collide() {
        let pdf = |name: &str| -> resume_pdf::Result<PdfDocument> {
            Ok(PdfDocument {
                bytes: b"%PDF-1.4".to_vec(),
                filename: name.to_string(),
            })
        };
        let results = vec![
            pdf("modern-resume.pdf"),
            Err(Error::MissingParameter("templateId".into())),
            pdf("modern-resume.pdf"),
            pdf("resume.pdf"),
        ];
        let outputs = output_paths(Path::new("out"), &results);
        assert_eq!(
            outputs,
            [
                Some(PathBuf::from("out/modern-resume.pdf")),
                None,
                Some(PathBuf::from("out/modern-resume-2.pdf")),
                Some(PathBuf::from("out/resume.pdf")),
            ]
        );
    }

    #[test]
    fn request_files_parse() {
        let text = json!({"templateId": "modern", "pdfOptions": {"scale": 0.5}}).to_string();
        let request: ConversionRequest = parse_json(&text, origin()).unwrap();
        assert_eq!(request.template_id.as_deref(), Some("modern"));
    }
}
