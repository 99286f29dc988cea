//! Resume template renderer.
//!
//! Turns structured resume data plus layout customization into a single
//! self-contained HTML document. Rendering is a pure function of its inputs:
//! the same `(template_id, template_data, customization)` triple always yields
//! byte-identical markup, and missing optional fields are replaced by
//! placeholders instead of producing errors.

mod sections;
mod styles;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

pub use styles::{BASE_STYLES, PRINT_STYLES};

/// Media type of rendered markup.
pub const HTML_MEDIA_TYPE: &str = "text/html; charset=utf-8";

/// Section order used when the caller does not supply one.
pub const DEFAULT_SECTIONS: [&str; 4] = ["summary", "experience", "education", "skills"];

/// Caller-supplied layout preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customization {
    pub section_order: Option<SectionOrder>,
    /// Default print scale for documents rendered from this customization
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionOrder {
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub layout: Option<ColumnLayout>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnLayout {
    #[serde(rename = "one-column")]
    OneColumn,
    #[serde(rename = "two-column")]
    TwoColumn,
}

impl SectionOrder {
    /// Section keys in render order.
    ///
    /// Only an explicit one-column layout drops the right column; every other
    /// layout renders left then right.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let right: &[String] = match self.layout {
            Some(ColumnLayout::OneColumn) => &[],
            _ => &self.right,
        };
        self.left.iter().chain(right.iter()).map(String::as_str)
    }
}

/// Name, title and contact details shown in the resume header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalInfo {
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
}

impl PersonalInfo {
    fn from_value(value: Option<&Value>) -> Self {
        let empty = Map::new();
        let obj = value.and_then(Value::as_object).unwrap_or(&empty);
        Self {
            name: sections::field(obj, "name"),
            title: sections::field(obj, "title"),
            email: sections::field(obj, "email"),
            phone: sections::field(obj, "phone"),
            location: sections::field(obj, "location"),
        }
    }
}

/// Structured resume: header details plus raw section values keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeDocument {
    pub personal_info: PersonalInfo,
    pub sections: Map<String, Value>,
    pub customization: Customization,
}

impl ResumeDocument {
    /// Build from caller JSON. Anything that is not an object is treated as
    /// an empty resume.
    pub fn from_template_data(data: &Value, customization: Customization) -> Self {
        let mut sections = data.as_object().cloned().unwrap_or_default();
        let personal_info = PersonalInfo::from_value(sections.remove("personalInfo").as_ref());
        Self {
            personal_info,
            sections,
            customization,
        }
    }

    /// Sections that will be rendered, in order, with their values.
    pub fn ordered_sections(&self) -> Vec<(&str, &Value)> {
        let keys: Vec<&str> = match &self.customization.section_order {
            Some(order) => order.keys().collect(),
            None => DEFAULT_SECTIONS.to_vec(),
        };
        keys.into_iter()
            .filter_map(|key| {
                self.sections
                    .get(key)
                    .filter(|value| is_present(value))
                    .map(|value| (key, value))
            })
            .collect()
    }
}

/// Immutable rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMarkup {
    html: String,
    template_id: String,
}

impl RenderedMarkup {
    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// Length of the markup in bytes
    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    /// Hex SHA-256 of the markup, stable across renders of the same input.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.html.as_bytes()))
    }

    pub fn into_string(self) -> String {
        self.html
    }
}

impl AsRef<str> for RenderedMarkup {
    fn as_ref(&self) -> &str {
        &self.html
    }
}

impl fmt::Display for RenderedMarkup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html)
    }
}

/// Render a resume template to HTML.
///
/// Without `template_data` (or with JSON `null`) a placeholder resume is
/// produced so previews always show a complete page.
pub fn render(
    template_id: &str,
    template_data: Option<&Value>,
    customization: &Customization,
) -> RenderedMarkup {
    let mut html = String::with_capacity(4096);
    open_document(&mut html, template_id);

    match template_data.filter(|data| !data.is_null()) {
        Some(data) => {
            let doc = ResumeDocument::from_template_data(data, customization.clone());
            sections::personal_info(&mut html, &doc.personal_info);
            for (key, value) in doc.ordered_sections() {
                sections::section(&mut html, key, value);
            }
        }
        None => html.push_str(PLACEHOLDER_RESUME),
    }

    close_document(&mut html);
    RenderedMarkup {
        html,
        template_id: template_id.to_string(),
    }
}

fn open_document(out: &mut String, template_id: &str) {
    let id = escape_html(template_id);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    out.push_str("<meta charset=\"UTF-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    out.push_str(&format!("<title>Resume - {}</title>\n", id));
    out.push_str("<style>");
    out.push_str(BASE_STYLES);
    out.push_str(PRINT_STYLES);
    out.push_str("</style>\n</head>\n<body>\n");
    out.push_str(&format!(
        "<div class=\"resume-container\" data-template=\"{}\">\n",
        id
    ));
    out.push_str("<div class=\"resume-page\" data-page=\"1\">\n");
}

fn close_document(out: &mut String) {
    out.push_str("</div>\n</div>\n</body>\n</html>\n");
}

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// JSON truthiness: null, false, 0 and "" mean "no section".
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

const PLACEHOLDER_RESUME: &str = "<div class=\"section personal-info\">
<h1 class=\"name\">John Doe</h1>
<p class=\"title\">Software Engineer</p>
<div class=\"contact\"><span>john.doe@example.com</span><span>(123) 456-7890</span><span>New York, NY</span></div>
</div>
<div class=\"section summary-section\">
<div class=\"section-title\">Professional Summary</div>
<div class=\"section-content\">Experienced software engineer with a passion for developing innovative solutions.</div>
</div>
<div class=\"section experience-section\">
<div class=\"section-title\">Work Experience</div>
<div class=\"section-content\">
<div class=\"entry\">
<div class=\"entry-title\">Senior Software Engineer</div>
<div class=\"entry-subtitle\">Tech Company Inc.</div>
<div class=\"entry-date\">Jan 2020 - Present</div>
<div class=\"entry-description\">Led development of key features for the company's main product.</div>
</div>
</div>
</div>
";
