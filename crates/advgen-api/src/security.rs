//! Input validation and sanitization shared across handlers.

use advgen_models::AspectRatio;

/// Maximum ad brief prompt length.
pub const MAX_PROMPT_LENGTH: usize = 5000;

/// Maximum title length.
pub const MAX_TITLE_LENGTH: usize = 500;

/// Maximum side-effects disclosure text length.
pub const MAX_SIDE_EFFECTS_TEXT_LENGTH: usize = 2000;

/// Aspect ratios the rendering pipeline accepts.
const ALLOWED_ASPECT_RATIOS: [AspectRatio; 3] = [
    AspectRatio::LANDSCAPE,
    AspectRatio::PORTRAIT,
    AspectRatio::SQUARE,
];

/// Sanitize a user-provided string for safe logging and storage: drop control
/// characters (keep newline/tab) and cap length.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(MAX_PROMPT_LENGTH)
        .collect()
}

/// Sanitize a title for safe storage.
pub fn sanitize_title(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.len() > MAX_TITLE_LENGTH {
        trimmed.chars().take(MAX_TITLE_LENGTH).collect()
    } else {
        trimmed.to_string()
    }
}

/// Validate job ID format to prevent injection via path parameters.
///
/// Valid format: alphanumeric characters and hyphens only, 8-64 chars (this
/// covers both `JobId`'s UUID rendering and any future opaque ID scheme).
pub fn is_valid_job_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 64 || id.len() < 8 {
        return false;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Validate an asset store object key supplied by a client (e.g. a product
/// image uploaded ahead of job submission). Blocks path traversal and keys
/// outside the caller's own prefix.
pub fn is_valid_asset_key(key: &str, owner_id: &str) -> bool {
    if key.is_empty() || key.len() > 1024 {
        return false;
    }
    if key.contains("..") || key.starts_with('/') {
        return false;
    }
    let expected_prefix = format!("uploads/{}/", owner_id);
    key.starts_with(&expected_prefix)
}

/// Check that a requested clip duration is one the rendering pipeline can
/// actually produce: a positive multiple of one of the adapter's supported
/// scene clip sizes, within the 10-60s admission window.
pub fn validate_duration(duration_s: u32, allowed_clip_sizes: &[u32]) -> bool {
    if duration_s < 10 || duration_s > 60 {
        return false;
    }
    allowed_clip_sizes
        .iter()
        .any(|size| *size > 0 && duration_s % size == 0)
}

/// Check that an aspect ratio is one the Composer supports.
pub fn validate_aspect_ratio(ratio: &AspectRatio) -> bool {
    ALLOWED_ASPECT_RATIOS.contains(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_job_ids() {
        assert!(is_valid_job_id("12345678"));
        assert!(is_valid_job_id("abc12345"));
        assert!(is_valid_job_id("abc-1234-def"));
    }

    #[test]
    fn test_invalid_job_ids() {
        assert!(!is_valid_job_id(""));
        assert!(!is_valid_job_id("short"));
        assert!(!is_valid_job_id("has space"));
        assert!(!is_valid_job_id("has_underscore"));
        assert!(!is_valid_job_id(&"a".repeat(65)));
    }

    #[test]
    fn test_asset_key_scoped_to_owner() {
        assert!(is_valid_asset_key("uploads/owner-1/product.png", "owner-1"));
        assert!(!is_valid_asset_key("uploads/owner-2/product.png", "owner-1"));
        assert!(!is_valid_asset_key("uploads/owner-1/../owner-2/x.png", "owner-1"));
        assert!(!is_valid_asset_key("/etc/passwd", "owner-1"));
    }

    #[test]
    fn test_duration_must_divide_a_clip_size() {
        assert!(validate_duration(30, &[5, 10]));
        assert!(validate_duration(24, &[4, 6, 8]));
        assert!(!validate_duration(25, &[4, 6, 8]));
        assert!(!validate_duration(5, &[5, 10]));
        assert!(!validate_duration(90, &[5, 10]));
    }

    #[test]
    fn test_aspect_ratio_allowlist() {
        assert!(validate_aspect_ratio(&AspectRatio::LANDSCAPE));
        assert!(validate_aspect_ratio(&AspectRatio::PORTRAIT));
        assert!(validate_aspect_ratio(&AspectRatio::SQUARE));
        assert!(!validate_aspect_ratio(&AspectRatio { width: 4, height: 3 }));
    }
}
