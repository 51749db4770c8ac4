//! Canonical JSON emission.

use anyhow::{Context, Result};
use serde::Serialize;

/// Emit a value as JCS-canonical JSON (RFC 8785).
///
/// This is the single way JSON leaves the system: persisted run records,
/// `status --json`, `list --json` and `config --json` all go through it, so
/// the same record always produces the same bytes regardless of struct field
/// ordering.
///
/// # Example
///
/// ```rust
/// use contentflow_utils::canonical::emit_jcs;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Out {
///     zeta: u8,
///     alpha: &'static str,
/// }
///
/// let json = emit_jcs(&Out { zeta: 1, alpha: "a" }).unwrap();
/// assert_eq!(json, r#"{"alpha":"a","zeta":1}"#);
/// ```
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}
