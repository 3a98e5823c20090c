//! Composite identifiers
//!
//! A resource identified by several remote ids (a VPN connection is addressed
//! by its gateway and customer gateway, for example) is stored under one string
//! with the parts joined by a separator.

use crate::error::{CloudError, Result};

/// Separator for multi-part resource ids
pub const FIELD_SEPARATOR: char = '#';

/// Separator for ids that hold a list of remote ids
pub const COMMA_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCodec {
    separator: char,
}

impl Default for IdCodec {
    fn default() -> Self {
        Self::field()
    }
}

impl IdCodec {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    pub fn field() -> Self {
        Self::new(FIELD_SEPARATOR)
    }

    pub fn comma() -> Self {
        Self::new(COMMA_SEPARATOR)
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Join `parts` into one id.
    ///
    /// Fails if there are no parts or a part contains the separator, since the
    /// result could not be decoded back into the same parts.
    pub fn encode<S: AsRef<str>>(&self, parts: &[S]) -> Result<String> {
        if parts.is_empty() {
            return Err(CloudError::InvalidId {
                id: String::new(),
                reason: "no components to encode".to_string(),
            });
        }

        let mut id = String::new();
        for (i, part) in parts.iter().enumerate() {
            let part = part.as_ref();
            if part.contains(self.separator) {
                return Err(CloudError::InvalidId {
                    id: part.to_string(),
                    reason: format!("component contains separator '{}'", self.separator),
                });
            }
            if i > 0 {
                id.push(self.separator);
            }
            id.push_str(part);
        }
        Ok(id)
    }

    /// Split `id` and require exactly `arity` parts
    pub fn decode(&self, id: &str, arity: usize) -> Result<Vec<String>> {
        let parts: Vec<String> = id.split(self.separator).map(str::to_string).collect();
        if parts.len() != arity {
            return Err(CloudError::InvalidId {
                id: id.to_string(),
                reason: format!(
                    "expected {} components separated by '{}', found {}",
                    arity,
                    self.separator,
                    parts.len()
                ),
            });
        }
        Ok(parts)
    }

    pub fn decode_array<const N: usize>(&self, id: &str) -> Result<[String; N]> {
        let parts = self.decode(id, N)?;
        parts.try_into().map_err(|_| CloudError::InvalidId {
            id: id.to_string(),
            reason: format!("expected {} components", N),
        })
    }
}

/// Join with [`FIELD_SEPARATOR`]
pub fn encode<S: AsRef<str>>(parts: &[S]) -> Result<String> {
    IdCodec::field().encode(parts)
}

/// Split on [`FIELD_SEPARATOR`] and check the arity
pub fn decode(id: &str, arity: usize) -> Result<Vec<String>> {
    IdCodec::field().decode(id, arity)
}
