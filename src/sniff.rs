//! Cheap type-tag extraction from raw JSON text.
//!
//! The sniffer drives `serde_json`'s tokenizer with visitors that look at top-level keys
//! only. Every value it does not need is consumed as [`IgnoredAny`], so nested structure
//! is validated but never allocated. This is what keeps lazy handle construction cheap.

use crate::codec::TYPE_KEY;
use crate::error::{OdmError, Result};
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::value::RawValue;
use std::fmt;

/// Top-level shape of a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootShape {
    /// `null`, a boolean, a number or a string.
    Scalar,
    /// An array. `first_tag` is the `#type` of element 0, if it has one.
    Array {
        /// Tag of the first element.
        first_tag: Option<String>,
    },
    /// An object carrying a string `#type`.
    TaggedObject(String),
    /// An object without a string `#type`.
    UntaggedObject,
}

/// Classifies the root of `json` and picks up the tags needed to choose a lazy handle.
///
/// # Errors
/// [`OdmError::InvalidPayload`] if `json` is not well-formed.
pub fn classify_root(json: &str) -> Result<RootShape> {
    run(json, ShapeVisitor)
}

/// Returns the top-level `#type` of `json`, or `None` if absent or the root is not an object.
pub fn sniff_envelope_tag(json: &str) -> Result<Option<String>> {
    run(json, TagVisitor)
}

/// Returns the `#type` of the first element of a JSON array, or `None`.
pub fn sniff_first_element_tag(json: &str) -> Result<Option<String>> {
    Ok(match classify_root(json)? {
        RootShape::Array { first_tag } => first_tag,
        _ => None,
    })
}

/// Splits a JSON array into the raw text of each element without decoding any of them.
pub fn split_elements(json: &str) -> Result<Vec<Box<RawValue>>> {
    serde_json::from_str(json).map_err(|e| OdmError::invalid_payload(json, e))
}

fn run<'de, V: Visitor<'de>>(json: &'de str, visitor: V) -> Result<V::Value> {
    let mut de = serde_json::Deserializer::from_str(json);
    let value = (&mut de)
        .deserialize_any(visitor)
        .and_then(|value| de.end().map(|()| value))
        .map_err(|e| OdmError::invalid_payload(json, e))?;
    Ok(value)
}

/// Consumes the rest of an object, remembering the last string `#type` seen.
fn scan_for_tag<'de, A: MapAccess<'de>>(mut map: A) -> std::result::Result<Option<String>, A::Error> {
    let mut tag = None;
    while let Some(is_tag) = map.next_key_seed(KeyIsTag)? {
        if is_tag {
            tag = map.next_value::<TagValue>()?.0;
        } else {
            map.next_value::<IgnoredAny>()?;
        }
    }
    Ok(tag)
}

fn drain_seq<'de, A: SeqAccess<'de>>(mut seq: A) -> std::result::Result<(), A::Error> {
    while seq.next_element::<IgnoredAny>()?.is_some() {}
    Ok(())
}

struct ShapeVisitor;

impl<'de> Visitor<'de> for ShapeVisitor {
    type Value = RootShape;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<RootShape, E> {
        Ok(RootShape::Scalar)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<RootShape, E> {
        Ok(RootShape::Scalar)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<RootShape, E> {
        Ok(RootShape::Scalar)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<RootShape, E> {
        Ok(RootShape::Scalar)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<RootShape, E> {
        Ok(RootShape::Scalar)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<RootShape, E> {
        Ok(RootShape::Scalar)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<RootShape, A::Error> {
        let first_tag = seq.next_element_seed(TagSeed)?.flatten();
        drain_seq(seq)?;
        Ok(RootShape::Array { first_tag })
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<RootShape, A::Error> {
        Ok(match scan_for_tag(map)? {
            Some(tag) => RootShape::TaggedObject(tag),
            None => RootShape::UntaggedObject,
        })
    }
}

/// Yields the `#type` of an object and `None` for every other value.
struct TagVisitor;

impl<'de> Visitor<'de> for TagVisitor {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> std::result::Result<Self::Value, A::Error> {
        drain_seq(seq)?;
        Ok(None)
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<Self::Value, A::Error> {
        scan_for_tag(map)
    }
}

struct TagSeed;

impl<'de> DeserializeSeed<'de> for TagSeed {
    type Value = Option<String>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_any(TagVisitor)
    }
}

/// Compares an object key against `#type` without allocating.
struct KeyIsTag;

impl<'de> DeserializeSeed<'de> for KeyIsTag {
    type Value = bool;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<bool, D::Error> {
        deserializer.deserialize_str(self)
    }
}

impl<'de> Visitor<'de> for KeyIsTag {
    type Value = bool;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object key")
    }

    fn visit_str<E: de::Error>(self, key: &str) -> std::result::Result<bool, E> {
        Ok(key == TYPE_KEY)
    }
}

/// The value under `#type`: kept only when it is a string.
struct TagValue(Option<String>);

impl<'de> de::Deserialize<'de> for TagValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TagValueVisitor;

        impl<'de> Visitor<'de> for TagValueVisitor {
            type Value = TagValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("any JSON value")
            }

            fn visit_str<E: de::Error>(self, tag: &str) -> std::result::Result<TagValue, E> {
                Ok(TagValue(Some(tag.to_owned())))
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<TagValue, E> {
                Ok(TagValue(None))
            }

            fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<TagValue, E> {
                Ok(TagValue(None))
            }

            fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<TagValue, E> {
                Ok(TagValue(None))
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<TagValue, E> {
                Ok(TagValue(None))
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<TagValue, E> {
                Ok(TagValue(None))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> std::result::Result<TagValue, A::Error> {
                drain_seq(seq)?;
                Ok(TagValue(None))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<TagValue, A::Error> {
                while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
                Ok(TagValue(None))
            }
        }

        deserializer.deserialize_any(TagValueVisitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_root_shape() {
        assert_eq!(classify_root("42").unwrap(), RootShape::Scalar);
        assert_eq!(classify_root(" null ").unwrap(), RootShape::Scalar);
        assert_eq!(classify_root(r#""text""#).unwrap(), RootShape::Scalar);
        assert_eq!(
            classify_root(r##"{"#type":"u","name":"Jane"}"##).unwrap(),
            RootShape::TaggedObject("u".into())
        );
        assert_eq!(
            classify_root(r##"{"name":{"#type":"nested"}}"##).unwrap(),
            RootShape::UntaggedObject
        );
        assert_eq!(
            classify_root(r##"[{"#type":"a"},{"#type":"b"}]"##).unwrap(),
            RootShape::Array {
                first_tag: Some("a".into())
            }
        );
        assert_eq!(
            classify_root("[1,2]").unwrap(),
            RootShape::Array { first_tag: None }
        );
        assert_eq!(classify_root("[]").unwrap(), RootShape::Array { first_tag: None });
    }

    #[test]
    fn tag_may_appear_after_other_keys() {
        let json = r##"{"items":[1,{"x":[]}],"#type":"late","n":null}"##;
        assert_eq!(sniff_envelope_tag(json).unwrap(), Some("late".into()));
    }

    #[test]
    fn escaped_key_still_matches() {
        let json = r#"{"\u0023type":"escaped"}"#;
        assert_eq!(sniff_envelope_tag(json).unwrap(), Some("escaped".into()));
    }

    #[test]
    fn non_string_tag_is_ignored() {
        assert_eq!(sniff_envelope_tag(r##"{"#type":{"a":1}}"##).unwrap(), None);
        assert_eq!(sniff_envelope_tag("[1]").unwrap(), None);
    }

    #[test]
    fn first_element_tag() {
        assert_eq!(
            sniff_first_element_tag(r##"[{"#type":"u"},{"#type":"v"}]"##).unwrap(),
            Some("u".into())
        );
        assert_eq!(
            sniff_first_element_tag(r##"[{"x":1},{"#type":"v"}]"##).unwrap(),
            None
        );
        assert_eq!(sniff_first_element_tag(r##"{"#type":"u"}"##).unwrap(), None);
    }

    #[test]
    fn malformed_input_is_invalid_payload() {
        for bad in ["", "{", r##"{"#type":"u""##, "[1,]", "{} trailing"] {
            assert!(matches!(
                sniff_envelope_tag(bad),
                Err(OdmError::InvalidPayload { .. })
            ));
        }
    }

    #[test]
    fn split_keeps_raw_text() {
        let parts = split_elements(r##"[ {"#type":"u","n":1} , 2 ]"##).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].get(), r##"{"#type":"u","n":1}"##);
        assert_eq!(parts[1].get(), "2");
    }
}
