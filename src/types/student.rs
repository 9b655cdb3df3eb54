//! Student identity types for the Registrar Ledger
//!
//! This module defines the validated student identifier and the student
//! master record as loaded from the student table.

use crate::types::RegistrarError;
use std::fmt;
use std::str::FromStr;

/// Length of a student identifier: three-digit prefix plus four digits
pub const STUDENT_ID_LEN: usize = 7;

/// Validated student identifier
///
/// A `StudentId` is a seven-character numeric string: a three-digit prefix
/// (batch/year code) followed by four digits. Construction goes through
/// [`StudentId::parse`] or [`FromStr`], which reject anything that is not
/// exactly seven ASCII digits.
///
/// An id that parses is *well-formed*, not necessarily *known*: a lookup for
/// a well-formed but absent id yields a not-found result, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StudentId(String);

impl StudentId {
    /// Parse and validate a student identifier
    ///
    /// # Arguments
    ///
    /// * `raw` - The candidate identifier string
    ///
    /// # Returns
    ///
    /// * `Ok(StudentId)` if `raw` is exactly seven ASCII digits
    /// * `Err(RegistrarError::InvalidIdentifier)` otherwise
    pub fn parse(raw: &str) -> Result<Self, RegistrarError> {
        let raw = raw.trim();
        if raw.len() != STUDENT_ID_LEN || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RegistrarError::invalid_identifier(raw));
        }
        Ok(StudentId(raw.to_string()))
    }

    /// Build an identifier from a three-digit prefix and a four-digit suffix
    ///
    /// Used by account creation, which retries random suffixes until the
    /// resulting id is unique against the live cache.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Three-digit batch prefix (e.g. "226")
    /// * `suffix` - Serial number, rendered zero-padded to four digits
    ///
    /// # Returns
    ///
    /// * `Ok(StudentId)` if the prefix is three ASCII digits and the suffix
    ///   fits in four
    /// * `Err(RegistrarError::InvalidIdentifier)` otherwise
    pub fn compose(prefix: &str, suffix: u16) -> Result<Self, RegistrarError> {
        if prefix.len() != 3 || !prefix.bytes().all(|b| b.is_ascii_digit()) || suffix > 9999 {
            return Err(RegistrarError::invalid_identifier(&format!(
                "{}{:04}",
                prefix, suffix
            )));
        }
        Ok(StudentId(format!("{}{:04}", prefix, suffix)))
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StudentId {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StudentId::parse(s)
    }
}

/// Student master record
///
/// One line of the student table. Owned by the cache once loaded; mutated
/// only through the explicit update operations (password change, profile
/// attachment), which write through the store and refresh the cache entry
/// in the same critical section.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    /// The validated student identifier
    pub id: StudentId,

    /// Last name
    pub last_name: String,

    /// First name
    pub first_name: String,

    /// Middle name (may be empty)
    pub middle_name: String,

    /// Date-of-birth string, stored verbatim as written by the enrolment form
    pub date_of_birth: String,

    /// Login credential
    pub password: String,

    /// Optional profile blob, carried after a `|` in the password field on disk
    ///
    /// The blob is pass-through text owned by the presentation layer; the
    /// core only round-trips it.
    pub profile: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("2260001")]
    #[case::all_nines("9999999")]
    #[case::leading_zero_suffix("1010000")]
    #[case::surrounding_whitespace("  2260001  ")]
    fn test_parse_accepts_well_formed(#[case] raw: &str) {
        let id = StudentId::parse(raw).unwrap();
        assert_eq!(id.as_str(), raw.trim());
    }

    #[rstest]
    #[case::too_short("226001")]
    #[case::too_long("22600001")]
    #[case::alphabetic("22A0001")]
    #[case::empty("")]
    #[case::embedded_space("226 001")]
    fn test_parse_rejects_malformed(#[case] raw: &str) {
        let result = StudentId::parse(raw);
        assert!(matches!(
            result.unwrap_err(),
            RegistrarError::InvalidIdentifier { .. }
        ));
    }

    #[test]
    fn test_compose_zero_pads_suffix() {
        let id = StudentId::compose("226", 7).unwrap();
        assert_eq!(id.as_str(), "2260007");
    }

    #[rstest]
    #[case::prefix_too_short("26", 1)]
    #[case::prefix_not_numeric("2a6", 1)]
    fn test_compose_rejects_bad_prefix(#[case] prefix: &str, #[case] suffix: u16) {
        assert!(StudentId::compose(prefix, suffix).is_err());
    }

    #[test]
    fn test_from_str_round_trip() {
        let id: StudentId = "2260001".parse().unwrap();
        assert_eq!(id.to_string(), "2260001");
    }
}
