//! Boundary to the generic object <-> primitive normalization engine.
//!
//! The tagged codec never walks fields itself. It asks a [`Normalizer`] to turn a document
//! into its field mapping and back. [`SerdeNormalizer`] delegates to `serde_json`; other
//! implementations (instrumented test doubles, engines with extra field policies) plug in
//! through [`DocumentSerializerBuilder::normalizer`](crate::DocumentSerializerBuilder::normalizer).

use crate::context::{Context, SKIP_NULL_VALUES};
use crate::document::Document;
use crate::error::{OdmError, Result};
use crate::registry::TypeBinding;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Location reported for failures at the top level of a payload.
pub const ROOT_PATH: &str = "$";

/// The generic normalization engine.
pub trait Normalizer: Send + Sync + fmt::Debug {
    /// Converts `value` into its normalized form (usually a field mapping).
    fn normalize(&self, value: &dyn Document, ctx: &Context) -> Result<Value>;

    /// Rebuilds a value of the bound type from its normalized form.
    fn denormalize(
        &self,
        data: Value,
        binding: &TypeBinding,
        ctx: &Context,
    ) -> Result<Box<dyn Document>>;
}

/// `serde_json`-backed engine. Understands the [`SKIP_NULL_VALUES`] context flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeNormalizer;

impl Normalizer for SerdeNormalizer {
    fn normalize(&self, value: &dyn Document, ctx: &Context) -> Result<Value> {
        let mut normalized = value
            .to_value()
            .map_err(|e| OdmError::Serialization(format!("{}: {e}", value.type_name())))?;
        if ctx.flag(SKIP_NULL_VALUES) {
            strip_nulls(&mut normalized);
        }
        Ok(normalized)
    }

    fn denormalize(
        &self,
        data: Value,
        binding: &TypeBinding,
        _ctx: &Context,
    ) -> Result<Box<dyn Document>> {
        binding
            .decode(data)
            .map_err(|cause| OdmError::FieldDecodeFailure {
                type_name: binding.type_name().to_owned(),
                path: ROOT_PATH.to_owned(),
                cause: Arc::new(cause),
            })
    }
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skip_null_values_is_recursive() {
        let doc: Box<dyn Document> = Box::new(json!({"a": null, "b": {"c": null, "d": 1}, "e": [null]}));
        let ctx = Context::new().with(SKIP_NULL_VALUES, true);
        let out = SerdeNormalizer.normalize(doc.as_ref(), &ctx).unwrap();
        assert_eq!(out, json!({"b": {"d": 1}, "e": [null]}));

        let kept = SerdeNormalizer.normalize(doc.as_ref(), &Context::new()).unwrap();
        assert_eq!(kept["a"], Value::Null);
    }

    #[test]
    fn denormalize_failure_names_type_and_path() {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Point {
            x: i32,
        }
        impl crate::DocumentType for Point {
            const TYPE_NAME: &'static str = "test::Point";
        }

        let err = SerdeNormalizer
            .denormalize(json!({"x": "nope"}), &TypeBinding::of::<Point>(), &Context::new())
            .unwrap_err();
        match err {
            OdmError::FieldDecodeFailure { type_name, path, .. } => {
                assert_eq!(type_name, "test::Point");
                assert_eq!(path, ROOT_PATH);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
