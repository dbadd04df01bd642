use std::fmt;
use std::str::FromStr;

use super::ParseError;

/// Maximum length of a single label (RFC 1035 2.3.4)
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum length of a name in wire format, including the root label
pub const MAX_NAME_LEN: usize = 255;

/// A fully qualified domain name.
///
/// Labels are stored lower-cased, left to right, without the empty root
/// label, so equality and hashing are case-insensitive by construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainName {
    labels: Vec<String>,
}

impl DomainName {
    /// The root name "."
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    /// Build a name from labels ordered left to right.
    pub fn from_labels<I, S>(labels: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        let mut wire_len = 1;
        for label in labels {
            let label = label.as_ref();
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(ParseError::InvalidLabel(label.to_string()));
            }
            wire_len += label.len() + 1;
            out.push(label.to_ascii_lowercase());
        }
        if wire_len > MAX_NAME_LEN {
            return Err(ParseError::NameTooLong);
        }
        Ok(Self { labels: out })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of labels, not counting the root label
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rightmost label, e.g. `tld` for `example.tld.`
    pub fn tld(&self) -> Option<&str> {
        self.labels.last().map(String::as_str)
    }

    /// True when `self` is an ancestor of `other` and not equal to it.
    pub fn is_strict_parent_of(&self, other: &DomainName) -> bool {
        self.labels.len() < other.labels.len() && other.labels.ends_with(&self.labels)
    }

    /// True when `self` equals `other` or is one of its ancestors.
    pub fn is_ancestor_or_self(&self, other: &DomainName) -> bool {
        self == other || self.is_strict_parent_of(other)
    }

    /// Drop `count` labels from the left: `_443._tcp.a.tld.` -> `a.tld.`
    pub fn strip_left(&self, count: usize) -> Option<DomainName> {
        if count > self.labels.len() {
            return None;
        }
        Some(Self {
            labels: self.labels[count..].to_vec(),
        })
    }

    /// Keep only the rightmost `count` labels.
    pub fn suffix(&self, count: usize) -> Option<DomainName> {
        let skip = self.labels.len().checked_sub(count)?;
        self.strip_left(skip)
    }

    /// Append the uncompressed wire form (lower-cased) to `out`.
    pub fn write_wire(&self, out: &mut Vec<u8>) {
        for label in &self.labels {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
    }

    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }
}

impl FromStr for DomainName {
    type Err = ParseError;

    /// Parses presentation form. A trailing dot is optional; "." and "" are
    /// the root.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_suffix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        Self::from_labels(trimmed.split('.'))
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            write!(f, "{}.", label)?;
        }
        Ok(())
    }
}
