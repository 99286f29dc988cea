//! Markup writers for the individual resume blocks.

use super::{escape_html, PersonalInfo};
use serde_json::{Map, Value};

/// Header block with name, title and contact line.
pub(crate) fn personal_info(out: &mut String, info: &PersonalInfo) {
    let name = info.name.as_deref().unwrap_or("Your Name");
    let title = info.title.as_deref().unwrap_or("Professional Title");

    out.push_str("<div class=\"section personal-info\">\n");
    out.push_str(&format!("<h1 class=\"name\">{}</h1>\n", escape_html(name)));
    out.push_str(&format!("<p class=\"title\">{}</p>\n", escape_html(title)));
    out.push_str("<div class=\"contact\">");
    for item in [&info.email, &info.phone, &info.location].into_iter().flatten() {
        out.push_str(&format!("<span>{}</span>", escape_html(item)));
    }
    out.push_str("</div>\n</div>\n");
}

/// Dispatch on the section key; unknown keys get the generic block.
pub(crate) fn section(out: &mut String, key: &str, value: &Value) {
    match key {
        "summary" => summary(out, value),
        "experience" => entries(out, "experience", "Work Experience", value, experience_entry),
        "education" => entries(out, "education", "Education", value, education_entry),
        "skills" => skills(out, value),
        _ => generic(out, key, value),
    }
}

fn open_section(out: &mut String, class: &str, title: &str) {
    out.push_str(&format!("<div class=\"section {}-section\">\n", class));
    out.push_str(&format!(
        "<div class=\"section-title\">{}</div>\n",
        escape_html(title)
    ));
}

fn summary(out: &mut String, value: &Value) {
    open_section(out, "summary", "Professional Summary");
    out.push_str(&format!(
        "<div class=\"section-content\">{}</div>\n</div>\n",
        escape_html(&display_value(value))
    ));
}

struct Entry {
    title: String,
    subtitle: String,
    dates: String,
    description: String,
}

fn experience_entry(job: &Map<String, Value>) -> Entry {
    Entry {
        title: field(job, "title").unwrap_or_default(),
        subtitle: field(job, "company").unwrap_or_default(),
        dates: format!(
            "{} - {}",
            field(job, "startDate").unwrap_or_default(),
            field(job, "endDate").unwrap_or_else(|| "Present".to_string())
        ),
        description: field(job, "description").unwrap_or_default(),
    }
}

fn education_entry(edu: &Map<String, Value>) -> Entry {
    Entry {
        title: field(edu, "degree").unwrap_or_default(),
        subtitle: field(edu, "school").unwrap_or_default(),
        dates: format!(
            "{} - {}",
            field(edu, "startDate").unwrap_or_default(),
            field(edu, "endDate").unwrap_or_default()
        ),
        description: field(edu, "description").unwrap_or_default(),
    }
}

fn entries(
    out: &mut String,
    class: &str,
    title: &str,
    value: &Value,
    to_entry: fn(&Map<String, Value>) -> Entry,
) {
    open_section(out, class, title);
    out.push_str("<div class=\"section-content\">\n");

    // Non-array values keep the section heading but list nothing.
    let empty = Map::new();
    for item in value.as_array().into_iter().flatten() {
        let entry = to_entry(item.as_object().unwrap_or(&empty));
        out.push_str("<div class=\"entry\">\n");
        out.push_str(&format!(
            "<div class=\"entry-title\">{}</div>\n",
            escape_html(&entry.title)
        ));
        out.push_str(&format!(
            "<div class=\"entry-subtitle\">{}</div>\n",
            escape_html(&entry.subtitle)
        ));
        out.push_str(&format!(
            "<div class=\"entry-date\">{}</div>\n",
            escape_html(&entry.dates)
        ));
        out.push_str(&format!(
            "<div class=\"entry-description\">{}</div>\n",
            escape_html(&entry.description)
        ));
        out.push_str("</div>\n");
    }

    out.push_str("</div>\n</div>\n");
}

fn skills(out: &mut String, value: &Value) {
    open_section(out, "skills", "Skills");
    out.push_str("<div class=\"section-content\">\n");
    if let Some(items) = value.as_array() {
        out.push_str("<ul class=\"skills-list\">");
        for skill in items {
            let label = match skill {
                Value::Object(obj) => field(obj, "name").unwrap_or_else(|| skill.to_string()),
                other => display_value(other),
            };
            out.push_str(&format!("<li>{}</li>", escape_html(&label)));
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</div>\n</div>\n");
}

fn generic(out: &mut String, key: &str, value: &Value) {
    open_section(out, &css_ident(key), &capitalize(key));
    out.push_str(&format!(
        "<div class=\"section-content\">{}</div>\n</div>\n",
        escape_html(&value.to_string())
    ));
}

/// Text of a scalar field; empty strings and nulls count as missing.
pub(crate) fn field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn css_ident(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
