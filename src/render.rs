//! Public-facing entry point: renders the selected template's index
//! document with the site settings substituted for its placeholders.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::Result;
use crate::server::AppState;
use crate::templates::{resolve_template, sanitize_template_name};
use crate::types::SiteSettings;

#[derive(Debug, Deserialize)]
pub struct RenderQuery {
    /// Sanitized template override for previewing, e.g. `/?tpl=t2`.
    #[serde(default)]
    pub tpl: String,
}

pub async fn home(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RenderQuery>,
) -> Response {
    let settings = state.store.read_settings();

    let override_name = sanitize_template_name(&query.tpl);
    let selected = sanitize_template_name(&settings.selected_template);
    let name = if !override_name.is_empty() {
        override_name
    } else if !selected.is_empty() {
        selected
    } else {
        state.default_template.clone()
    };

    match render_page(&state.template_dir, &name, &settings) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Cannot render template '{name}': {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(error_page())).into_response()
        }
    }
}

fn render_page(template_dir: &Path, name: &str, settings: &SiteSettings) -> Result<String> {
    let index = resolve_template(template_dir, name)?;
    let html = fs::read_to_string(&index)?;
    Ok(substitute_placeholders(&html, settings))
}

/// Replaces the `{$admin.*}` placeholders with HTML-escaped settings values.
fn substitute_placeholders(html: &str, settings: &SiteSettings) -> String {
    html.replace("{$admin.site_name}", &html_escape(&settings.site_name))
        .replace(
            "{$admin.site_keywords}",
            &html_escape(&settings.site_keywords),
        )
        .replace(
            "{$admin.site_description}",
            &html_escape(&settings.site_description),
        )
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Generic failure page. Deliberately says nothing about paths or causes.
fn error_page() -> String {
    "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>500 Internal Server Error</title></head>\n<body><h1>500 Internal Server Error</h1><p>The site cannot be rendered right now.</p></body>\n</html>\n"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings() -> SiteSettings {
        SiteSettings {
            site_name: "My <Site> & Co".to_string(),
            site_keywords: "a,b".to_string(),
            site_description: "it's \"fine\"".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_substitution_escapes_values() {
        let html = "<title>{$admin.site_name}</title>\
                    <meta name=\"keywords\" content=\"{$admin.site_keywords}\">\
                    <meta name=\"description\" content=\"{$admin.site_description}\">";
        let out = substitute_placeholders(html, &settings());

        assert!(out.contains("<title>My &lt;Site&gt; &amp; Co</title>"));
        assert!(out.contains("content=\"a,b\""));
        assert!(out.contains("it&#39;s &quot;fine&quot;"));
        assert!(!out.contains("{$admin."));
    }

    #[test]
    fn test_unknown_placeholders_left_alone() {
        let out = substitute_placeholders("{$admin.other} stays", &settings());
        assert_eq!(out, "{$admin.other} stays");
    }

    #[test]
    fn test_render_page_reads_index() {
        let dir = TempDir::new().unwrap();
        let tpl = dir.path().join("t1");
        fs::create_dir_all(&tpl).unwrap();
        fs::write(tpl.join("index.html"), "<h1>{$admin.site_name}</h1>").unwrap();

        let out = render_page(dir.path(), "t1", &settings()).unwrap();
        assert_eq!(out, "<h1>My &lt;Site&gt; &amp; Co</h1>");
    }

    #[test]
    fn test_render_page_missing_template_fails() {
        let dir = TempDir::new().unwrap();
        assert!(render_page(dir.path(), "nope", &settings()).is_err());
    }
}
