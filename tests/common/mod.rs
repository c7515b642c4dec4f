// tests/common/mod.rs
//
// Shared fixtures for the integration tests.

#![allow(dead_code)]

use jsonodm::{
    Context, Document, DocumentSerializer, DocumentSerializerBuilder, Normalizer, Result,
    SerdeNormalizer, TypeBinding,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// --- DOCUMENTS ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Document)]
#[document(name = "app::User")]
pub struct User {
    pub name: String,
    pub age: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[document(embed)]
    pub email: Option<Email>,
    #[serde(default)]
    #[document(embed)]
    pub address: Option<Address>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    #[document(skip)]
    pub tags: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Document)]
#[document(name = "app::Address")]
pub struct Address {
    pub city: String,
    pub zip: Option<String>,
}

// Newtype: normalizes to a bare string, so it travels under `#scalar`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Document)]
#[document(name = "app::Email")]
pub struct Email(pub String);

// Embeds a renamed field and a list of documents.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Document)]
#[document(name = "app::Team")]
pub struct Team {
    pub title: String,
    #[serde(rename = "lead")]
    #[document(embed)]
    pub leader: User,
    #[serde(default)]
    #[document(embed)]
    pub members: Vec<User>,
}

// Default identity: `module_path!()::Status`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Document)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Active,
    Suspended,
    Banned,
}

pub fn user(name: &str, age: u32) -> User {
    User {
        name: name.into(),
        age,
        email: None,
        address: None,
        status: Status::Active,
        tags: Vec::new(),
    }
}

// --- SERIALIZERS ---

pub fn builder() -> DocumentSerializerBuilder {
    DocumentSerializer::builder()
        .register_as::<User>("u")
        .register_as::<Address>("address")
        .register_as::<Email>("email")
        .register_as::<Team>("team")
        .register::<Status>()
}

pub fn serializer() -> Arc<DocumentSerializer> {
    builder().build()
}

/// A serializer whose engine counts denormalize calls.
pub fn counting_serializer() -> (Arc<DocumentSerializer>, Arc<CountingNormalizer>) {
    counting_with(builder())
}

pub fn counting_with(
    builder: DocumentSerializerBuilder,
) -> (Arc<DocumentSerializer>, Arc<CountingNormalizer>) {
    let counter = Arc::new(CountingNormalizer::default());
    let serializer = builder.normalizer(counter.clone()).build();
    (serializer, counter)
}

#[derive(Debug, Default)]
pub struct CountingNormalizer {
    inner: SerdeNormalizer,
    decodes: AtomicUsize,
}

impl CountingNormalizer {
    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl Normalizer for CountingNormalizer {
    fn normalize(&self, value: &dyn Document, ctx: &Context) -> Result<Value> {
        self.inner.normalize(value, ctx)
    }

    fn denormalize(
        &self,
        data: Value,
        binding: &TypeBinding,
        ctx: &Context,
    ) -> Result<Box<dyn Document>> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.denormalize(data, binding, ctx)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
