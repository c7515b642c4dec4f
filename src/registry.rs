//! Type alias registry and the closed table of decodable types.
//!
//! [`AliasMap`] is the bidirectional `alias <-> type identity` table. Both directions are
//! total: an unmapped key maps to itself.
//!
//! [`TypeRegistry`] pairs the aliases with a [`TypeBinding`] per registered type. A tag
//! can only be materialized into a type that was registered at startup; there is no
//! instantiation by name.
//!
//! Both are immutable once built and shared behind `Arc` by every handle.

use crate::codec::TaggedCodec;
use crate::document::{Document, DocumentType};
use crate::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Immutable bidirectional mapping between storage aliases and type identities.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    by_alias: HashMap<String, String>,
    by_type: HashMap<String, String>,
}

impl AliasMap {
    /// Builds the map from ordered `(alias, type)` pairs.
    ///
    /// If a type appears under several aliases, the last-defined alias is the one
    /// [`alias_for`](Self::alias_for) returns.
    pub fn new<I, A, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, T)>,
        A: Into<String>,
        T: Into<String>,
    {
        let mut by_alias = HashMap::new();
        let mut by_type = HashMap::new();
        for (alias, type_name) in pairs {
            let (alias, type_name) = (alias.into(), type_name.into());
            by_type.insert(type_name.clone(), alias.clone());
            by_alias.insert(alias, type_name);
        }
        Self { by_alias, by_type }
    }

    /// Alias stored for `type_name`, or `type_name` itself when none is configured.
    pub fn alias_for<'a>(&'a self, type_name: &'a str) -> &'a str {
        self.by_type.get(type_name).map_or(type_name, String::as_str)
    }

    /// Type identity for `alias`, or `alias` itself when none is configured.
    pub fn type_for<'a>(&'a self, alias: &'a str) -> &'a str {
        self.by_alias.get(alias).map_or(alias, String::as_str)
    }

    /// Returns `true` if an alias is configured for `type_name`.
    pub fn has_alias_for_type(&self, type_name: &str) -> bool {
        self.by_type.contains_key(type_name)
    }

    /// Returns `true` if `alias` maps to a configured type.
    pub fn has_type_for_alias(&self, alias: &str) -> bool {
        self.by_alias.contains_key(alias)
    }

    /// All configured `(alias, type)` pairs, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_alias
            .iter()
            .map(|(alias, ty)| (alias.as_str(), ty.as_str()))
    }

    /// Number of configured aliases.
    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    /// Returns `true` if no alias is configured.
    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }
}

type DecodeFn = fn(Value) -> serde_json::Result<Box<dyn Document>>;
type UntagFn = fn(&mut Value, &TaggedCodec, &str) -> Result<()>;

fn decode_into<T: DocumentType>(data: Value) -> serde_json::Result<Box<dyn Document>> {
    serde_json::from_value::<T>(data).map(|value| Box::new(value) as Box<dyn Document>)
}

fn untag_into<T: DocumentType>(data: &mut Value, codec: &TaggedCodec, path: &str) -> Result<()> {
    match data {
        Value::Object(fields) => T::untag_embedded(fields, codec, path),
        _ => Ok(()),
    }
}

/// The decode entry for one registered type.
#[derive(Clone, Copy)]
pub struct TypeBinding {
    type_name: &'static str,
    decode: DecodeFn,
    untag: UntagFn,
}

impl TypeBinding {
    /// Binding for `T`.
    pub fn of<T: DocumentType>() -> Self {
        Self {
            type_name: T::TYPE_NAME,
            decode: decode_into::<T>,
            untag: untag_into::<T>,
        }
    }

    /// The bound type identity.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Denormalizes `data` into the bound type.
    pub fn decode(&self, data: Value) -> serde_json::Result<Box<dyn Document>> {
        (self.decode)(data)
    }

    /// Strips the envelopes of nested documents in `data` ahead of [`decode`](Self::decode).
    pub fn untag_embedded(&self, data: &mut Value, codec: &TaggedCodec, path: &str) -> Result<()> {
        (self.untag)(data, codec, path)
    }
}

impl fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeBinding({})", self.type_name)
    }
}

/// Aliases plus the closed set of types that tags may resolve to.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    aliases: AliasMap,
    bindings: HashMap<&'static str, TypeBinding>,
}

impl TypeRegistry {
    /// Creates a registry over `aliases` with only the fallback type registered.
    pub fn new(aliases: AliasMap) -> Self {
        let mut registry = Self {
            aliases,
            bindings: HashMap::new(),
        };
        registry.register::<Value>();
        registry
    }

    /// Registers `T` as a decodable type.
    pub fn register<T: DocumentType>(&mut self) {
        self.insert_binding(TypeBinding::of::<T>());
    }

    /// Adds a prepared binding, replacing any binding for the same type identity.
    pub fn insert_binding(&mut self, binding: TypeBinding) {
        self.bindings.insert(binding.type_name(), binding);
    }

    /// The alias table.
    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    /// See [`AliasMap::alias_for`].
    pub fn alias_for<'a>(&'a self, type_name: &'a str) -> &'a str {
        self.aliases.alias_for(type_name)
    }

    /// See [`AliasMap::type_for`].
    pub fn type_for<'a>(&'a self, alias: &'a str) -> &'a str {
        self.aliases.type_for(alias)
    }

    /// Decode entry for a type identity, if registered.
    pub fn binding(&self, type_name: &str) -> Option<&TypeBinding> {
        self.bindings.get(type_name)
    }

    /// Returns `true` if `type_name` is registered.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.bindings.contains_key(type_name)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(AliasMap::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::document::FALLBACK_TYPE;

    #[test]
    fn lookups_are_total() {
        let map = AliasMap::new([("u", "app::User")]);
        assert_eq!(map.alias_for("app::User"), "u");
        assert_eq!(map.type_for("u"), "app::User");
        assert_eq!(map.alias_for("unmapped.Type"), "unmapped.Type");
        assert_eq!(map.type_for("unmapped-alias"), "unmapped-alias");
        assert!(map.has_alias_for_type("app::User"));
        assert!(!map.has_type_for_alias("unmapped-alias"));
    }

    #[test]
    fn duplicate_type_keeps_last_alias() {
        let map = AliasMap::new([("old", "app::User"), ("new", "app::User")]);
        assert_eq!(map.alias_for("app::User"), "new");
        assert_eq!(map.type_for("old"), "app::User");
        assert_eq!(map.type_for("new"), "app::User");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn fallback_type_is_always_bound() {
        let registry = TypeRegistry::default();
        let binding = registry.binding(FALLBACK_TYPE).unwrap();
        let decoded = binding.decode(serde_json::json!({"k": true})).unwrap();
        assert_eq!(decoded.type_name(), FALLBACK_TYPE);
        assert!(registry.binding("app::Missing").is_none());
    }
}
