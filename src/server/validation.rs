use super::response::ApiError;

pub const MAX_SITE_NAME_LEN: usize = 100;
pub const MAX_KEYWORDS_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 300;

/// Collapses every run of CR/LF characters into a single space and trims
/// the result. Settings fields are single-line by contract.
#[must_use]
pub fn collapse_newlines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_break = false;
    for c in s.chars() {
        if c == '\r' || c == '\n' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }
    out.trim().to_string()
}

/// Drops literal angle brackets. Keywords and descriptions end up inside
/// meta tags verbatim in older templates, so markup is stripped at intake
/// on top of the escaping the renderer does.
#[must_use]
pub fn strip_angle_brackets(s: &str) -> String {
    s.chars().filter(|c| *c != '<' && *c != '>').collect()
}

/// Length limits count characters, not bytes, so multibyte text gets the
/// same budget as ASCII.
pub fn check_max_len(value: &str, max: usize, field: &str) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}
