//! Input validation primitives.
//!
//! Command builders fail fast on malformed input instead of emitting a
//! nonsensical command:
//! - Validating non-empty strings
//! - Rejecting values containing NUL or line breaks

use crate::error::{Error, Result};

/// Require a string to be non-empty after trimming.
///
/// Returns the value untrimmed: paths may legitimately carry surrounding
/// spaces and the caller's exact text is what lands in the command.
pub fn require_non_empty<'a>(value: &'a str, field: &str, message: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        Err(Error::validation_invalid_argument(field, message, None, None))
    } else {
        Ok(value)
    }
}

/// Require a path argument: non-empty and free of NUL and line breaks.
///
/// No filesystem or shell can represent a NUL in a path, and a newline would
/// split a rendered command into two commands on some transports.
pub fn require_path<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    require_non_empty(value, field, "Path must not be empty")?;
    if value.contains(['\0', '\n', '\r']) {
        return Err(Error::validation_invalid_argument(
            field,
            "Path must not contain NUL or line break characters",
            Some(value.escape_debug().to_string()),
            None,
        ));
    }
    Ok(value)
}
