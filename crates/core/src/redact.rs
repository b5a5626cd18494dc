//! PHI redaction for audit details, log output, and error text.
//!
//! Redaction is conservative and idempotent: a value that has already been
//! through here passes through unchanged, and when in doubt a pattern is
//! masked rather than preserved. Both the audit path and the error path use
//! this module, so nothing regulated reaches a log line or a client body in
//! the clear.

use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Replacement for anything the redactor removes. Contains no digits, so a
/// second pass over redacted output finds nothing to match.
pub const MASK: &str = "[REDACTED]";

/// Keys whose values are masked wholesale wherever they appear, at any
/// nesting depth. Matched case-insensitively as substrings of the key.
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passcode",
    "otp",
    "token",
    "secret",
    "authorization",
    "credential",
    "cookie",
    "api_key",
    "private_key",
    "fingerprint",
    "ssn",
    "social_security",
    "dob",
    "date_of_birth",
    "mrn",
    "medical_record",
];

/// Dashed SSN form: 123-45-6789.
static SSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid regex"));

/// Compact nine-digit identifier. Broad, intentionally: an SSN with the
/// dashes stripped is indistinguishable from any other nine-digit run.
static SSN_COMPACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{9}\b").expect("valid regex"));

/// Medical record number, e.g. `MRN-0012345` or `mrn 8675309`.
static MRN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bMRN[-: ]?\d{6,10}\b").expect("valid regex"));

/// Bare ISO date (2031-04-09). Does not match inside RFC 3339 timestamps:
/// the trailing `T` removes the word boundary, and event timestamps must
/// survive redaction.
static DATE_ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid regex"));

/// Slash or dash short-date forms (4/9/2031, 04-09-31).
static DATE_SLASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b").expect("valid regex"));

// ---------------------------------------------------------------------------
// Free-text redaction
// ---------------------------------------------------------------------------

/// Mask structural PHI patterns in free text.
///
/// Applied in order from most to least specific so a dashed SSN is consumed
/// before the short-date pattern can take a bite out of it.
pub fn redact_text(text: &str) -> String {
    let pass = SSN_RE.replace_all(text, MASK);
    let pass = MRN_RE.replace_all(&pass, MASK);
    let pass = SSN_COMPACT_RE.replace_all(&pass, MASK);
    let pass = DATE_ISO_RE.replace_all(&pass, MASK);
    let pass = DATE_SLASH_RE.replace_all(&pass, MASK);
    pass.into_owned()
}

/// True when a key matches the sensitive-key deny-list.
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|k| lower.contains(k))
}

// ---------------------------------------------------------------------------
// Structured redaction
// ---------------------------------------------------------------------------

/// Redact a JSON value recursively.
///
/// Any map value under a sensitive key is replaced with [`MASK`] regardless
/// of its type or depth; every surviving string leaf additionally goes
/// through [`redact_text`]. Returns a new value; the input is not mutated.
pub fn redact_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) {
                    redacted.insert(key.clone(), serde_json::Value::String(MASK.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_value(val));
                }
            }
            serde_json::Value::Object(redacted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(redact_value).collect())
        }
        serde_json::Value::String(s) => serde_json::Value::String(redact_text(s)),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Error redaction
// ---------------------------------------------------------------------------

/// Flatten an error chain to a single redacted string.
///
/// Walks `source()` to the root so a wrapped driver error cannot smuggle an
/// unredacted message past the top-level display impl.
pub fn redact_error(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    redact_text(&parts.join(": "))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Free text ---------------------------------------------------------

    #[test]
    fn masks_dashed_ssn() {
        assert_eq!(redact_text("ssn 123-45-6789 on file"), format!("ssn {MASK} on file"));
    }

    #[test]
    fn masks_compact_nine_digit_run() {
        assert_eq!(redact_text("id 123456789."), format!("id {MASK}."));
    }

    #[test]
    fn masks_mrn_codes() {
        assert_eq!(redact_text("chart MRN-0012345 pulled"), format!("chart {MASK} pulled"));
        assert_eq!(redact_text("see mrn 86753090"), format!("see {MASK}"));
    }

    #[test]
    fn masks_bare_iso_date() {
        assert_eq!(redact_text("born 1984-02-29"), format!("born {MASK}"));
    }

    #[test]
    fn masks_slash_dates() {
        assert_eq!(redact_text("dob 2/29/1984"), format!("dob {MASK}"));
    }

    #[test]
    fn leaves_rfc3339_timestamps_alone() {
        let text = "at 2031-04-09T10:30:00Z the chart was opened";
        assert_eq!(redact_text(text), text);
    }

    #[test]
    fn leaves_ordinary_text_alone() {
        let text = "updated allergy list, 3 entries";
        assert_eq!(redact_text(text), text);
    }

    #[test]
    fn redact_text_is_idempotent() {
        let once = redact_text("ssn 123-45-6789, dob 1984-02-29, MRN-0012345");
        assert_eq!(redact_text(&once), once);
    }

    // -- Sensitive keys ----------------------------------------------------

    #[test]
    fn key_match_is_case_insensitive_substring() {
        assert!(is_sensitive_key("password"));
        assert!(is_sensitive_key("Session_Token"));
        assert!(is_sensitive_key("patientSSN"));
        assert!(!is_sensitive_key("status_code"));
        assert!(!is_sensitive_key("description"));
    }

    // -- Structured values -------------------------------------------------

    #[test]
    fn masks_sensitive_keys_at_any_depth() {
        let input = serde_json::json!({
            "actor": "dr-lin",
            "request": { "csrf_token": "abc123", "path": "/records/7" }
        });
        let out = redact_value(&input);
        assert_eq!(out["actor"], "dr-lin");
        assert_eq!(out["request"]["csrf_token"], MASK);
        assert_eq!(out["request"]["path"], "/records/7");
    }

    #[test]
    fn masks_patterns_inside_string_leaves() {
        let input = serde_json::json!({ "note": "patient ssn 123-45-6789" });
        let out = redact_value(&input);
        assert_eq!(out["note"], format!("patient ssn {MASK}"));
    }

    #[test]
    fn walks_arrays() {
        let input = serde_json::json!([{ "password": "hunter2" }, { "note": "ok" }]);
        let out = redact_value(&input);
        assert_eq!(out[0]["password"], MASK);
        assert_eq!(out[1]["note"], "ok");
    }

    #[test]
    fn masks_non_string_values_under_sensitive_keys() {
        let input = serde_json::json!({ "ssn": 123456789 });
        let out = redact_value(&input);
        assert_eq!(out["ssn"], MASK);
    }

    #[test]
    fn redact_value_is_idempotent() {
        let input = serde_json::json!({
            "password": "hunter2",
            "note": "ssn 123-45-6789, dob 1984-02-29",
            "nested": { "mrn": "MRN-0012345", "list": ["4/9/2031"] }
        });
        let once = redact_value(&input);
        let twice = redact_value(&once);
        assert_eq!(once, twice);
    }

    // -- Errors ------------------------------------------------------------

    #[test]
    fn flattens_and_redacts_error_chains() {
        #[derive(Debug)]
        struct Leaf;
        impl std::fmt::Display for Leaf {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "row for ssn 123-45-6789 missing")
            }
        }
        impl std::error::Error for Leaf {}

        #[derive(Debug)]
        struct Outer(Leaf);
        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "lookup failed")
            }
        }
        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let flat = redact_error(&Outer(Leaf));
        assert_eq!(flat, format!("lookup failed: row for ssn {MASK} missing"));
    }
}
