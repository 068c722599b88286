use std::path::Path;
use validator::Validate;

use crate::services::storage::remote_join;

/// Category used when the client sends fewer labels than files
pub const DEFAULT_CATEGORY: &str = "container";

/// Keeps letters (accented ones included), digits and hyphens.
///
/// Used for district names and category labels.
pub fn sanitize_segment(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect()
}

/// Keeps ASCII digits only.
pub fn sanitize_precinct(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Extension of the client supplied file name, reduced to `.` + ASCII alphanumerics.
/// Empty when the name has no usable extension.
pub fn sanitize_extension(original_name: &str) -> String {
    let ext: String = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    if ext.is_empty() {
        ext
    } else {
        format!(".{}", ext.to_lowercase())
    }
}

/// Sanitized routing tags of a request (district + precinct code)
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct RoutingTags {
    #[validate(length(min = 1, message = "bezirk is missing or invalid"))]
    pub district: String,
    #[validate(length(min = 1, message = "bkz is missing or invalid"))]
    pub precinct: String,
}

impl RoutingTags {
    pub fn sanitized(district: &str, precinct: &str) -> Self {
        Self {
            district: sanitize_segment(district),
            precinct: sanitize_precinct(precinct),
        }
    }

    /// `<base>/<district>/<precinct>`
    pub fn folder_under(&self, base_path: &str) -> String {
        remote_join(base_path, &[&self.district, &self.precinct])
    }

    /// Category label for the file at `index`, sanitized, with the default as fallback
    pub fn category(labels: &[String], index: usize) -> String {
        labels
            .get(index)
            .map(|l| sanitize_segment(l))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
    }
}
