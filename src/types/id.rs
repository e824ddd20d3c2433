use std::fmt;
use std::str::FromStr;

use mti::prelude::{MagicTypeId, MagicTypeIdExt, V7};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A TypeID-based identifier, prefix `"doc"`. Backs the built-in `Id`
/// `SchemaType`'s default-value generator (§3: `CUID`/`Id` — "globally
/// unique, lexicographically sortable string ids").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(MagicTypeId);

const PREFIX: &str = "doc";

impl DocumentId {
    /// Generates a new random id using UUIDv7, so ids sort roughly by
    /// creation time.
    pub fn new() -> Self {
        Self(PREFIX.create_type_id::<V7>())
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let id = MagicTypeId::from_str(s).map_err(|e| format!("{e}"))?;
        if id.prefix().as_str() != PREFIX {
            return Err(format!(
                "expected prefix '{PREFIX}', got '{}'",
                id.prefix().as_str()
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_has_correct_prefix() {
        let id = DocumentId::new();
        assert!(id.as_str().starts_with("doc_"));
    }

    #[test]
    fn parse_valid() {
        let id = DocumentId::new();
        let parsed = DocumentId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_wrong_prefix() {
        let wrong = "entity_01h455vb4pex5vsknk084sn02q";
        assert!(DocumentId::parse(wrong).is_err());
    }

    #[test]
    fn display_matches_as_str() {
        let id = DocumentId::new();
        assert_eq!(id.to_string(), id.as_str());
    }
}
