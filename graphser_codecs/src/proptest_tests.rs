//! Property-based round trips for property bags and their sharing.

#![allow(clippy::expect_used, clippy::float_cmp)]

use std::sync::Arc;

use graphser_core::{from_bytes, to_bytes, ReadContext, WriteContext};
use proptest::prelude::*;
use proptest::sample::Index;

use crate::{default_registry, PropertyBag, PropertyValue};

/// Strategy for any value a bag can hold.
fn arb_value() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        ".*".prop_map(PropertyValue::Text),
        any::<bool>().prop_map(PropertyValue::Bool),
        any::<i64>().prop_map(PropertyValue::Int),
        any::<u64>().prop_map(PropertyValue::UInt),
        // NaN != NaN
        any::<f64>().prop_filter("not NaN", |f| !f.is_nan()).prop_map(PropertyValue::Float),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(PropertyValue::Bytes),
    ]
}

proptest! {
    #[test]
    fn string_bag_roundtrip(entries in prop::collection::hash_map(".*", ".*", 0..32)) {
        let registry = default_registry().expect("registry should build");
        let original: PropertyBag = entries.clone().into_iter().collect();

        let bytes = to_bytes(&registry, &Arc::new(original.clone())).expect("encoding should succeed");
        let decoded: Arc<PropertyBag> = from_bytes(&registry, &bytes).expect("decoding should succeed");

        prop_assert_eq!(&*decoded, &original);
        prop_assert_eq!(decoded.len(), entries.len());
        for (name, value) in &entries {
            prop_assert_eq!(decoded.find(name), Some(value.as_str()));
        }
    }

    #[test]
    fn non_ascii_names_roundtrip(entries in prop::collection::hash_map("[é☃日本語\u{1F980}a-z.]{0,12}", "\\PC*", 0..16)) {
        let registry = default_registry().expect("registry should build");
        let original: PropertyBag = entries.into_iter().collect();

        let bytes = to_bytes(&registry, &Arc::new(original.clone())).expect("encoding should succeed");
        let decoded: Arc<PropertyBag> = from_bytes(&registry, &bytes).expect("decoding should succeed");
        prop_assert_eq!(&*decoded, &original);
    }

    #[test]
    fn mixed_bag_roundtrip(entries in prop::collection::btree_map(".*", arb_value(), 0..16)) {
        let registry = default_registry().expect("registry should build");
        let original: PropertyBag = entries.into_iter().collect();

        let bytes = to_bytes(&registry, &Arc::new(original.clone())).expect("encoding should succeed");
        let decoded: Arc<PropertyBag> = from_bytes(&registry, &bytes).expect("decoding should succeed");
        prop_assert_eq!(&*decoded, &original);

        let again = to_bytes(&registry, &decoded).expect("re-encoding should succeed");
        prop_assert_eq!(again, bytes);
    }

    #[test]
    fn sharing_pattern_roundtrip(
        pool in prop::collection::vec(prop::collection::hash_map("[a-z.]{1,12}", ".*", 0..4), 1..6),
        picks in prop::collection::vec(any::<Index>(), 0..24),
    ) {
        let registry = default_registry().expect("registry should build");
        let bags: Vec<Arc<PropertyBag>> = pool
            .into_iter()
            .map(|entries| Arc::new(entries.into_iter().collect()))
            .collect();
        let handles: Vec<Arc<PropertyBag>> = picks
            .iter()
            .map(|pick| Arc::clone(&bags[pick.index(bags.len())]))
            .collect();

        let mut buf = Vec::new();
        let mut ctx = WriteContext::new(&mut buf, &registry);
        ctx.write_seq(&handles).expect("encoding should succeed");
        let written = ctx.finish().expect("write pass should finish");

        let mut ctx = ReadContext::from_slice(&buf, &registry);
        let decoded = ctx.read_seq::<Arc<PropertyBag>>().expect("decoding should succeed");
        let read = ctx.finish().expect("read pass should finish");

        prop_assert_eq!(decoded.len(), handles.len());
        prop_assert_eq!(read.identities, written.identities);
        for (i, left) in handles.iter().enumerate() {
            prop_assert_eq!(&*decoded[i], &**left);
            for (j, right) in handles.iter().enumerate() {
                prop_assert_eq!(
                    Arc::ptr_eq(&decoded[i], &decoded[j]),
                    Arc::ptr_eq(left, right),
                    "handles {} and {}", i, j
                );
            }
        }
    }
}
