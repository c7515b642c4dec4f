//! Process-level configuration, loaded once and handed to the serializer builder.
//!
//! ```json
//! {
//!   "type_map": { "user": "app::User", "product": "app::Product" },
//!   "lazy_loading": true,
//!   "sequence_mode": "mutable",
//!   "serialization_context": { "skip_null_values": true },
//!   "deserialization_context": {}
//! }
//! ```

use crate::context::Context;
use crate::error::{OdmError, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Which handle a tagged JSON array is read into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMode {
    /// [`LazySequence`](crate::LazySequence): per-element materialization, in-place mutation.
    #[default]
    Mutable,
    /// [`PersistentSequence`](crate::PersistentSequence): whole-array materialization,
    /// mutations return new handles.
    Persistent,
}

/// The `type_map` table: `alias -> type identity` pairs in definition order.
///
/// Order matters when a type is listed under several aliases: the last one is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMap(Vec<(String, String)>);

impl TypeMap {
    /// Type identity configured for `alias`. A repeated alias resolves to its last entry.
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(a, _)| a == alias)
            .map(|(_, ty)| ty.as_str())
    }

    /// Appends a pair.
    pub fn insert(&mut self, alias: impl Into<String>, type_name: impl Into<String>) {
        self.0.push((alias.into(), type_name.into()));
    }

    /// Pairs in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(alias, ty)| (alias.as_str(), ty.as_str()))
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no alias is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<A: Into<String>, T: Into<String>> FromIterator<(A, T)> for TypeMap {
    fn from_iter<I: IntoIterator<Item = (A, T)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(alias, ty)| (alias.into(), ty.into()))
                .collect(),
        )
    }
}

impl Serialize for TypeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (alias, ty) in &self.0 {
            map.serialize_entry(alias, ty)?;
        }
        map.end()
    }
}

struct TypeMapVisitor;

impl<'de> Visitor<'de> for TypeMapVisitor {
    type Value = TypeMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of alias to type identity")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> std::result::Result<TypeMap, M::Error> {
        let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(pair) = access.next_entry::<String, String>()? {
            pairs.push(pair);
        }
        Ok(TypeMap(pairs))
    }
}

impl<'de> Deserialize<'de> for TypeMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(TypeMapVisitor)
    }
}

/// Configuration for a [`DocumentSerializer`](crate::DocumentSerializer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OdmConfig {
    /// Storage alias -> fully qualified type identity.
    pub type_map: TypeMap,
    /// Hand out lazy handles on read. When `false`, reads decode immediately.
    pub lazy_loading: bool,
    /// Handle used for tagged arrays.
    pub sequence_mode: SequenceMode,
    /// Defaults merged under every write-path context.
    pub serialization_context: Context,
    /// Defaults merged under every read-path context.
    pub deserialization_context: Context,
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            type_map: TypeMap::default(),
            lazy_loading: true,
            sequence_mode: SequenceMode::default(),
            serialization_context: Context::default(),
            deserialization_context: Context::default(),
        }
    }
}

impl OdmConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| OdmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Rejects empty aliases and empty type identities.
    pub fn validate(&self) -> Result<()> {
        for (alias, type_name) in self.type_map.iter() {
            if alias.is_empty() {
                return Err(OdmError::Config(format!(
                    "empty alias for type '{type_name}'"
                )));
            }
            if type_name.is_empty() {
                return Err(OdmError::Config(format!(
                    "alias '{alias}' maps to an empty type"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_lazy_loading() {
        let config = OdmConfig::from_json_str("{}").unwrap();
        assert!(config.lazy_loading);
        assert_eq!(config.sequence_mode, SequenceMode::Mutable);
        assert!(config.type_map.is_empty());
    }

    #[test]
    fn parses_full_document() {
        let config = OdmConfig::from_json_str(
            r#"{
                "type_map": {"u": "app::User"},
                "lazy_loading": false,
                "sequence_mode": "persistent",
                "serialization_context": {"skip_null_values": true}
            }"#,
        )
        .unwrap();
        assert_eq!(config.type_map.get("u"), Some("app::User"));
        assert!(!config.lazy_loading);
        assert_eq!(config.sequence_mode, SequenceMode::Persistent);
        assert!(config.serialization_context.flag("skip_null_values"));
    }

    #[test]
    fn type_map_keeps_definition_order() {
        let config =
            OdmConfig::from_json_str(r#"{"type_map": {"zz": "app::User", "aa": "app::User"}}"#)
                .unwrap();
        let aliases: Vec<_> = config.type_map.iter().map(|(alias, _)| alias).collect();
        assert_eq!(aliases, ["zz", "aa"]);

        let text = serde_json::to_string(&config.type_map).unwrap();
        assert_eq!(text, r#"{"zz":"app::User","aa":"app::User"}"#);
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(matches!(
            OdmConfig::from_json_str(r#"{"type_map": {"": "app::User"}}"#),
            Err(OdmError::Config(_))
        ));
        assert!(matches!(
            OdmConfig::from_json_str(r#"{"lazy_strategy": "ghost"}"#),
            Err(OdmError::Config(_))
        ));
    }
}
