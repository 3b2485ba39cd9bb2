//! Origin-relative name transforms.
//!
//! A server is scoped to a zone by stripping its origin from every question
//! name; a resolver qualifies relative names by appending one.

use crate::errors::{DomainError, OriginError};
use hickory_proto::rr::Name;
use std::str::FromStr;

pub trait NameOriginExt {
    /// Appends the labels of `origin` and marks the result absolute.
    fn with_origin(&self, origin: &Name) -> Result<Name, DomainError>;

    /// Strips `origin` from the end of the name and marks the result relative.
    fn without_origin(&self, origin: &Name) -> Result<Name, OriginError>;

    /// Returns an absolute copy without touching the labels.
    fn to_absolute(&self) -> Name;
}

impl NameOriginExt for Name {
    fn with_origin(&self, origin: &Name) -> Result<Name, DomainError> {
        let labels: Vec<&[u8]> = self.iter().chain(origin.iter()).collect();
        Name::from_labels(labels).map_err(|e| {
            DomainError::InvalidName(format!("{} with origin {}: {}", self, origin, e))
        })
    }

    fn without_origin(&self, origin: &Name) -> Result<Name, OriginError> {
        let labels: Vec<&[u8]> = self.iter().collect();
        let suffix: Vec<&[u8]> = origin.iter().collect();

        let mismatch = || OriginError {
            name: self.to_string(),
            origin: origin.to_string(),
        };

        if suffix.len() > labels.len() {
            return Err(mismatch());
        }

        let keep = labels.len() - suffix.len();
        let matches = labels[keep..]
            .iter()
            .zip(suffix.iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b));
        if !matches {
            return Err(mismatch());
        }

        let mut relative = Name::from_labels(labels[..keep].to_vec()).map_err(|_| mismatch())?;
        relative.set_fqdn(false);
        Ok(relative)
    }

    fn to_absolute(&self) -> Name {
        let mut name = self.clone();
        name.set_fqdn(true);
        name
    }
}

/// Parses a presentation-format name; a trailing dot makes it absolute.
pub fn parse_name(text: &str) -> Result<Name, DomainError> {
    Name::from_str(text).map_err(|e| DomainError::InvalidName(format!("{}: {}", text, e)))
}

/// Number of separators between labels, ignoring a trailing root dot.
pub fn dot_count(name: &Name) -> usize {
    name.iter().count().saturating_sub(1)
}
