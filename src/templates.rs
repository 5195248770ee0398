use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::TemplateDescriptor;

const INDEX_FILE: &str = "index.html";

/// Template names are directory names restricted to `[A-Za-z0-9_-]+`, which
/// also rules out path traversal.
#[must_use]
pub fn is_valid_template_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_valid_name_char)
}

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Strips every character outside the allowed set. Used for the public
/// `?tpl=` override, where a bad name falls back rather than erroring.
#[must_use]
pub fn sanitize_template_name(name: &str) -> String {
    name.chars().filter(|c| is_valid_name_char(*c)).collect()
}

/// Lists template directories under `root`, sorted by name. Entries with
/// invalid names are skipped; a missing root reads as an empty catalog.
pub fn list_templates(root: &Path) -> Result<Vec<TemplateDescriptor>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut templates = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_valid_template_name(&name) {
            continue;
        }
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        templates.push(TemplateDescriptor {
            has_index: path.join(INDEX_FILE).is_file(),
            name,
        });
    }

    templates.sort_unstable_by(|a, b| a.name.cmp(&b.name));
    Ok(templates)
}

/// Resolves a template name to its index document. `Validation` for a bad
/// name (checked before touching the filesystem), `NotFound` when the
/// directory or its index is missing.
pub fn resolve_template(root: &Path, name: &str) -> Result<PathBuf> {
    if !is_valid_template_name(name) {
        return Err(Error::Validation("Invalid template name".to_string()));
    }

    let dir = root.join(name);
    let index = dir.join(INDEX_FILE);
    if !dir.is_dir() || !index.is_file() {
        return Err(Error::NotFound);
    }
    Ok(index)
}
