//! Domain identifier types with validation
//!
//! Patients are identified by an opaque `client_idcode` string. The newtype keeps
//! it from being mixed up with document or concept identifiers, and rejects values
//! that cannot be used as a cache file stem.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Patient identifier newtype wrapper
///
/// # Examples
///
/// ```
/// use sextant::domain::ids::PatientId;
/// use std::str::FromStr;
///
/// let id = PatientId::from_str("V12345").unwrap();
/// assert_eq!(id.as_str(), "V12345");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatientId(String);

impl PatientId {
    /// Creates a new PatientId from a string
    ///
    /// Surrounding whitespace is trimmed. Empty ids and ids containing path
    /// separators are rejected, since the id doubles as a cache file name.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let id = id.trim();
        if id.is_empty() {
            return Err("Patient ID cannot be empty".to_string());
        }
        if id.contains('/') || id.contains('\\') || id == "." || id == ".." {
            return Err(format!("Patient ID cannot be used as a file name: {id}"));
        }
        Ok(Self(id.to_string()))
    }

    /// Returns the patient ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PatientId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
