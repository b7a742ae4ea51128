//! Certificate subject introspection.
//!
//! The external toolkit emits a human-readable subject line for a certificate
//! or request. This module parses that text into a typed attribute map rather
//! than assuming well-formed output; the Common Name is the attribute the
//! rest of the system cares about.

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

/// Parsed subject attributes of a certificate or request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    attributes: BTreeMap<String, String>,
}

impl Subject {
    /// Parse toolkit output containing a `subject=` line.
    ///
    /// Both attribute syntaxes emitted by common toolkit versions are
    /// accepted: comma-separated (`subject=CN = alice, O = Example`) and
    /// slash-separated (`subject= /C=US/CN=alice`).
    ///
    /// Fails when no `subject` line is present or when the line carries no
    /// `key=value` attributes at all.
    pub fn parse(output: &str) -> Result<Self> {
        let line = output
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with("subject"))
            .ok_or_else(|| anyhow!("no 'subject' line found in toolkit output"))?;

        let rest = line
            .split_once('=')
            .map(|(_, rest)| rest.trim())
            .ok_or_else(|| anyhow!("malformed subject line: {}", line))?;

        let mut attributes = BTreeMap::new();
        let parts: Vec<&str> = if let Some(stripped) = rest.strip_prefix('/') {
            stripped.split('/').collect()
        } else {
            rest.split(',').collect()
        };

        for part in parts {
            if let Some((key, value)) = part.split_once('=') {
                attributes.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        if attributes.is_empty() {
            return Err(anyhow!("subject line carries no attributes: {}", line));
        }

        Ok(Self { attributes })
    }

    /// Look up one subject attribute by name (e.g. `CN`, `O`).
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(String::as_str)
    }

    /// The Common Name, required by every consumer in this system.
    pub fn common_name(&self) -> Result<&str> {
        self.get("CN")
            .ok_or_else(|| anyhow!("subject has no CN attribute: {:?}", self.attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_form() {
        let subject = Subject::parse("subject=CN = alice, O = Example Org, C = US\n").unwrap();
        assert_eq!(subject.common_name().unwrap(), "alice");
        assert_eq!(subject.get("O"), Some("Example Org"));
        assert_eq!(subject.get("C"), Some("US"));
    }

    #[test]
    fn test_parse_slash_form() {
        let subject = Subject::parse("subject= /C=US/O=Example/CN=vpnserver").unwrap();
        assert_eq!(subject.common_name().unwrap(), "vpnserver");
    }

    #[test]
    fn test_subject_line_among_other_output() {
        let output = "Certificate:\n    Data:\nsubject=CN = bob\nnotAfter=...\n";
        let subject = Subject::parse(output).unwrap();
        assert_eq!(subject.common_name().unwrap(), "bob");
    }

    #[test]
    fn test_missing_subject_line() {
        let err = Subject::parse("issuer=CN = ca\n").unwrap_err();
        assert!(err.to_string().contains("subject"));
    }

    #[test]
    fn test_missing_cn_attribute() {
        let subject = Subject::parse("subject=O = Example, C = US").unwrap();
        assert!(subject.common_name().is_err());
    }

    #[test]
    fn test_no_attributes_at_all() {
        assert!(Subject::parse("subject=\n").is_err());
    }
}
