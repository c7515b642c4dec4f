// tests/lazy_object_tests.rs

#![allow(missing_docs)]

mod common;

use common::{User, UserFields, counting_serializer, serializer, user};
use jsonodm::{Context, DocumentType, OdmError, Payload};
use std::sync::Barrier;

const JANE: &str = r##"{"#type":"u","name":"Jane","age":25}"##;

#[test]
fn test_jane_is_pending_until_a_field_is_read() {
    common::init_tracing();
    let serializer = serializer();

    let payload = serializer.deserialize(JANE, &Context::new()).unwrap();
    let lazy = payload.as_object().expect("tagged object should be lazy");

    assert!(!lazy.is_materialized());
    assert_eq!(lazy.alias(), "u");
    assert_eq!(lazy.type_name(), User::TYPE_NAME);
    assert!(lazy.is::<User>());
    assert!(!lazy.is_materialized());

    assert_eq!(lazy.name().unwrap(), "Jane");
    assert!(lazy.is_materialized());
    assert_eq!(*lazy.age().unwrap(), 25);
}

#[test]
fn test_construction_never_decodes() {
    let (serializer, counter) = counting_serializer();

    let payload = serializer.deserialize(JANE, &Context::new()).unwrap();
    assert!(matches!(payload, Payload::Object(_)));
    assert_eq!(counter.decodes(), 0);

    let lazy = payload.into_object().unwrap();
    lazy.observe().unwrap();
    assert_eq!(counter.decodes(), 1);
}

#[test]
fn test_materialization_happens_exactly_once() {
    let (serializer, counter) = counting_serializer();
    let payload = serializer.deserialize(JANE, &Context::new()).unwrap();
    let lazy = payload.as_object().unwrap();

    let first = lazy.observe().unwrap();
    let second = lazy.observe().unwrap();
    let _ = lazy.name().unwrap();
    let _ = lazy.get::<User>().unwrap();

    assert!(std::ptr::addr_eq(first, second));
    assert_eq!(counter.decodes(), 1);
}

#[test]
fn test_racing_observers_share_one_decode() {
    let (serializer, counter) = counting_serializer();
    let payload = serializer.deserialize(JANE, &Context::new()).unwrap();
    let lazy = payload.as_object().unwrap();

    let threads = 8;
    let barrier = Barrier::new(threads);
    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                barrier.wait();
                assert_eq!(lazy.name().unwrap(), "Jane");
            });
        }
    });

    assert_eq!(counter.decodes(), 1);
}

#[test]
fn test_failure_is_cached_and_replayed() {
    let (serializer, counter) = counting_serializer();
    let payload = serializer
        .deserialize(r##"{"#type":"u","name":"Jane","age":"old"}"##, &Context::new())
        .unwrap();
    let lazy = payload.as_object().unwrap();
    assert!(!lazy.is_failed());

    let first = lazy.observe().unwrap_err();
    let second = lazy.name().unwrap_err();

    assert!(lazy.is_failed());
    assert!(!lazy.is_materialized());
    assert_eq!(counter.decodes(), 1);
    assert_eq!(first.to_string(), second.to_string());
    assert!(matches!(
        first,
        OdmError::MaterializationFailure { ref target, .. } if target == "object"
    ));
    assert!(matches!(
        first.root_cause(),
        OdmError::FieldDecodeFailure { .. }
    ));
}

#[test]
fn test_unresolvable_tag_surfaces_on_first_observation() {
    let serializer = serializer();
    let payload = serializer
        .deserialize(r##"{"#type":"ghost","x":1}"##, &Context::new())
        .unwrap();
    let lazy = payload.as_object().unwrap();

    assert_eq!(lazy.type_name(), "ghost");
    let err = lazy.observe().unwrap_err();
    match err.root_cause() {
        OdmError::UnresolvableType { alias, .. } => assert_eq!(alias, "ghost"),
        other => panic!("expected UnresolvableType, got {other:?}"),
    }
}

#[test]
fn test_malformed_json_fails_immediately() {
    let serializer = serializer();
    let err = serializer
        .deserialize(r##"{"#type":"u","name":"#Jane"##, &Context::new())
        .unwrap_err();
    assert!(matches!(err, OdmError::InvalidPayload { .. }));
}

#[test]
fn test_eager_mode_returns_materialized_handles() {
    let (serializer, counter) = common::counting_with(common::builder().lazy_loading(false));

    let payload = serializer.deserialize(JANE, &Context::new()).unwrap();
    assert!(payload.as_object().unwrap().is_materialized());
    assert_eq!(counter.decodes(), 1);

    // Decode failures are no longer deferred.
    let err = serializer
        .deserialize(r##"{"#type":"u","name":7,"age":1}"##, &Context::new())
        .unwrap_err();
    assert!(matches!(err, OdmError::MaterializationFailure { .. }));
}

#[test]
fn test_untouched_handle_writes_back_its_raw_text() {
    let (serializer, counter) = counting_serializer();
    let stored = r##"{"#type":"u", "age":25, "name":"Jane"}"##;

    let payload = serializer.deserialize(stored, &Context::new()).unwrap();
    let written = serializer
        .serialize_payload(&payload, &Context::new())
        .unwrap();

    assert_eq!(written, stored);
    assert_eq!(counter.decodes(), 0);
}

#[test]
fn test_mutations_through_accessors_are_persisted() {
    let serializer = serializer();
    let mut payload = serializer.deserialize(JANE, &Context::new()).unwrap();
    let lazy = payload.as_object_mut().unwrap();

    *lazy.age_mut().unwrap() += 1;
    lazy.name_mut().unwrap().push_str(" Doe");

    let written = serializer
        .serialize_payload(&payload, &Context::new())
        .unwrap();
    let back: User = serializer.deserialize_as(&written, &Context::new()).unwrap();
    assert_eq!(back.name, "Jane Doe");
    assert_eq!(back.age, 26);
}

#[test]
fn test_typed_access_rejects_the_wrong_type() {
    let serializer = serializer();
    let payload = serializer.deserialize(JANE, &Context::new()).unwrap();
    let lazy = payload.as_object().unwrap();

    let err = lazy.get::<common::Address>().unwrap_err();
    assert!(matches!(err, OdmError::UnexpectedType { .. }));
}

#[test]
fn test_from_document_and_into_inner() {
    let serializer = serializer();
    let lazy = jsonodm::LazyObject::from_document(
        Box::new(user("Bob", 41)),
        serializer.clone(),
        &Context::new(),
    )
    .unwrap();

    assert!(lazy.is_materialized());
    assert_eq!(lazy.alias(), "u");
    assert!(lazy.raw().contains(r#""name":"Bob""#));

    let inner = lazy.into_inner().unwrap();
    assert_eq!(inner.downcast_ref::<User>().unwrap(), &user("Bob", 41));
}
