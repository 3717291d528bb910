//! Player display name handling
//!
//! This module validates client-chosen display names and generates a
//! fallback name for players who join without one. Names are cosmetic; the
//! connection id stays the authoritative player identity within a room.

use heck::ToTitleCase;
use rustrict::CensorStr;
use serde::Serialize;
use thiserror::Error;

use crate::constants::name::MAX_LENGTH;

/// Errors that can occur during display name validation
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
}

/// Validates a client-chosen display name
///
/// Surrounding whitespace is trimmed before the checks.
///
/// # Errors
///
/// Returns [`Error::Empty`] for a blank name, [`Error::TooLong`] when the
/// trimmed name exceeds the limit, and [`Error::Sinful`] when the content
/// filter rejects it.
pub fn validate(requested: &str) -> Result<String, Error> {
    let name = requested.trim();

    if name.is_empty() {
        return Err(Error::Empty);
    }
    if name.len() > MAX_LENGTH {
        return Err(Error::TooLong);
    }
    if name.is_inappropriate() {
        return Err(Error::Sinful);
    }

    Ok(name.to_owned())
}

/// Generates a fallback display name (adjective + animal)
pub fn generate() -> String {
    loop {
        if let Some(name) = petname::petname(2, " ") {
            return name.to_title_case();
        }
    }
}

/// Resolves an optional client-chosen name into a usable display name
///
/// A missing name gets a generated one; a present name must validate.
///
/// # Errors
///
/// Propagates the validation error for a present but unusable name.
pub fn resolve(requested: Option<&str>) -> Result<String, Error> {
    match requested {
        Some(name) => validate(name),
        None => Ok(generate()),
    }
}
