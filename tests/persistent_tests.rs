// tests/persistent_tests.rs

#![allow(missing_docs)]

mod common;

use common::{User, counting_with, user};
use jsonodm::{Context, Document, OdmError, PersistentSequence, SequenceMode};
use std::sync::Arc;

const TRIO: &str = r##"[{"#type":"u","name":"C","age":3},{"#type":"u","name":"A","age":1},{"#type":"u","name":"B","age":2}]"##;

fn names(sequence: &PersistentSequence) -> Vec<String> {
    sequence
        .iter()
        .unwrap()
        .map(|item| item.downcast_ref::<User>().unwrap().name.clone())
        .collect()
}

#[test]
fn test_whole_array_materializes_on_first_touch() {
    let (serializer, counter) =
        counting_with(common::builder().sequence_mode(SequenceMode::Persistent));

    let payload = serializer.deserialize(TRIO, &Context::new()).unwrap();
    let sequence = payload.as_persistent().expect("persistent mode");
    assert!(!sequence.is_materialized());
    assert_eq!(counter.decodes(), 0);

    assert_eq!(sequence.len().unwrap(), 3);
    assert!(sequence.is_materialized());
    assert_eq!(counter.decodes(), 3);

    // Cached: no further decoding.
    assert_eq!(names(sequence), ["C", "A", "B"]);
    assert_eq!(counter.decodes(), 3);
}

#[test]
fn test_updates_return_new_handles() {
    let (serializer, _) =
        counting_with(common::builder().sequence_mode(SequenceMode::Persistent));
    let original = serializer
        .deserialize(TRIO, &Context::new())
        .unwrap()
        .into_persistent()
        .unwrap();

    let appended = original.append(Arc::new(user("D", 4))).unwrap();
    let sorted = appended
        .sort_by(|a, b| {
            let a = a.downcast_ref::<User>().unwrap();
            let b = b.downcast_ref::<User>().unwrap();
            a.age.cmp(&b.age)
        })
        .unwrap();
    let updated = sorted.update(0, Arc::new(user("Z", 26))).unwrap();

    assert_eq!(names(&original), ["C", "A", "B"]);
    assert_eq!(names(&appended), ["C", "A", "B", "D"]);
    assert_eq!(names(&sorted), ["A", "B", "C", "D"]);
    assert_eq!(names(&updated), ["Z", "B", "C", "D"]);

    // Elements are shared, not copied.
    assert!(Arc::ptr_eq(
        &original.items().unwrap()[0],
        &appended.items().unwrap()[0]
    ));
}

#[test]
fn test_remove_variants() {
    let serializer = common::builder()
        .sequence_mode(SequenceMode::Persistent)
        .build();
    let original = serializer
        .deserialize(TRIO, &Context::new())
        .unwrap()
        .into_persistent()
        .unwrap();

    let without_a = original.remove(&user("A", 1)).unwrap().unwrap();
    assert_eq!(names(&without_a), ["C", "B"]);
    assert!(original.remove(&user("Q", 0)).unwrap().is_none());

    let without_first = original.remove_at(0).unwrap();
    assert_eq!(names(&without_first), ["A", "B"]);
    assert!(matches!(
        original.remove_at(3),
        Err(OdmError::IndexOutOfRange { index: 3, len: 3 })
    ));
}

#[test]
fn test_write_back() {
    let serializer = common::builder()
        .sequence_mode(SequenceMode::Persistent)
        .build();
    let payload = serializer.deserialize(TRIO, &Context::new()).unwrap();

    // Read from storage: written back verbatim.
    assert_eq!(
        serializer.serialize_payload(&payload, &Context::new()).unwrap(),
        TRIO
    );

    // Derived: re-encoded and readable again.
    let shorter = payload.as_persistent().unwrap().remove_at(0).unwrap();
    let json = shorter.to_json(&Context::new()).unwrap();
    let reread = serializer
        .deserialize(&json, &Context::new())
        .unwrap()
        .into_persistent()
        .unwrap();
    assert_eq!(names(&reread), ["A", "B"]);
}

#[test]
fn test_failure_names_the_element() {
    let serializer = common::builder()
        .sequence_mode(SequenceMode::Persistent)
        .build();
    let sequence = serializer
        .deserialize(
            r##"[{"#type":"u","name":"A","age":1},{"#type":"u","name":false,"age":2}]"##,
            &Context::new(),
        )
        .unwrap()
        .into_persistent()
        .unwrap();

    let err = sequence.get(0).unwrap_err();
    match &err {
        OdmError::MaterializationFailure { target, cause } => {
            assert_eq!(target, "sequence");
            assert!(matches!(
                &**cause,
                OdmError::MaterializationFailure { target, .. } if target == "element 1"
            ));
        }
        other => panic!("expected MaterializationFailure, got {other:?}"),
    }
    assert!(matches!(err.root_cause(), OdmError::FieldDecodeFailure { .. }));
    assert_eq!(sequence.len().unwrap_err().to_string(), err.to_string());
}

#[test]
fn test_built_from_documents() {
    let serializer = common::serializer();
    let sequence = PersistentSequence::from_documents(
        vec![Arc::new(user("A", 1)) as Arc<dyn Document>],
        serializer,
        Default::default(),
    );

    assert!(sequence.is_materialized());
    assert_eq!(sequence.item_alias(), Some("u"));
    let json = sequence.to_json(&Context::new()).unwrap();
    assert!(json.starts_with(r##"[{"#type":"u","name":"A""##));
}
