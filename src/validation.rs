//! Input validation shared by the store and the HTTP layer.

use crate::error::{Result, TodoError};
use crate::model::TodoPatch;

/// Trim a title and reject it if nothing is left.
///
/// # Errors
///
/// Returns [`TodoError::Validation`] when the title is empty or all whitespace.
pub fn normalize_title(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TodoError::validation("title", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Check a title the store is about to persist.
///
/// The store does not rewrite titles; it only refuses blank ones.
///
/// # Errors
///
/// Returns [`TodoError::Validation`] when the title is empty or all whitespace.
pub fn ensure_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(TodoError::validation("title", "must not be empty"));
    }
    Ok(())
}

/// Reject patches that would not change anything, and blank titles.
///
/// # Errors
///
/// Returns [`TodoError::EmptyPatch`] or [`TodoError::Validation`].
pub fn ensure_patch(patch: &TodoPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(TodoError::EmptyPatch);
    }
    if let Some(title) = &patch.title {
        ensure_title(title)?;
    }
    Ok(())
}
