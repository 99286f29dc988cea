//! End-to-end conversions through headless Chrome

#![cfg(feature = "cdp")]

use resume_pdf::{ConversionRequest, EngineConfig, ErrorKind};
use serde_json::json;

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_template_to_pdf() {
    let converter = resume_pdf::new_converter(EngineConfig::default()).unwrap();
    let request: ConversionRequest = serde_json::from_value(json!({
        "templateId": "modern",
        "templateData": {
            "personalInfo": {"name": "Jane Doe", "title": "Engineer"},
            "summary": "Builds things.",
            "skills": ["Rust", "Go"]
        },
        "customization": {"scale": 0.9}
    }))
    .unwrap();

    let pdf = converter.convert(request).await.unwrap();
    assert!(pdf.bytes.starts_with(b"%PDF-"));
    assert!(pdf.bytes.len() > 1000);
    assert_eq!(pdf.filename, "modern-resume.pdf");
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_html_to_pdf_with_options() {
    let converter = resume_pdf::new_converter(EngineConfig::default()).unwrap();
    let mut request = ConversionRequest::from_html(
        "<!DOCTYPE html><html><body><h1>Hello</h1><p>One page.</p></body></html>",
    );
    request.print_options = Some(json!({"format": "letter", "landscape": true, "margin": {"top": "10mm"}}));

    let pdf = converter.convert(request).await.unwrap();
    assert!(pdf.bytes.starts_with(b"%PDF-"));
    assert_eq!(pdf.filename, "resume.pdf");
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_concurrent_conversions() {
    let converter = resume_pdf::new_converter(EngineConfig::default()).unwrap();
    let requests = (0..3)
        .map(|_| ConversionRequest::from_template("modern", None))
        .collect();
    for result in converter.convert_all(requests, 3).await {
        assert!(result.unwrap().bytes.starts_with(b"%PDF-"));
    }
}

#[tokio::test]
async fn test_missing_chrome_reports_busy() {
    let config = EngineConfig {
        chrome_path: Some("/nonexistent/chrome".into()),
        max_launch_attempts: 2,
        retry_backoff_ms: 1,
        busy_backoff_ms: 1,
        ..Default::default()
    };
    let converter = resume_pdf::new_converter(config).unwrap();
    let err = converter
        .convert(ConversionRequest::from_html("<p>x</p>"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineBusy);
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_large_document_to_pdf() {
    // Inline image data pushes the markup past Chrome's 2 MiB URL ceiling.
    let payload = "A".repeat(2_500_000);
    let html = format!(
        "<!DOCTYPE html><html><body><h1>Large</h1><img alt=\"photo\" src=\"data:image/png;base64,{}\"><p id=\"tail\">end of document</p></body></html>",
        payload
    );
    assert!(html.len() > 2 * 1024 * 1024);

    let converter = resume_pdf::new_converter(EngineConfig::default()).unwrap();
    let pdf = converter
        .convert(ConversionRequest::from_html(html))
        .await
        .unwrap();
    assert!(pdf.bytes.starts_with(b"%PDF-"));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_self_test_document() {
    let converter = resume_pdf::new_converter(EngineConfig::default()).unwrap();
    let pdf = converter.convert(ConversionRequest::self_test()).await.unwrap();
    assert!(pdf.bytes.starts_with(b"%PDF-"));
    assert_eq!(pdf.filename, "test.pdf");
}
