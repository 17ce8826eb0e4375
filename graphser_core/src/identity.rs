//! Identity tables for shared-reference preservation.
//!
//! The write side keys objects by the address of their `Arc` allocation, so
//! two handles to one allocation share an id while equal-but-distinct values
//! do not. The read side mirrors the id sequence slot by slot.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};

/// A shared handle that can be bound before its contents are decoded.
///
/// Values reached through a `ForwardRef` may form cycles: the handle is
/// published to the identity table as soon as its slot is reserved, and
/// the contents are set once the payload has been read.
pub type ForwardRef<T> = Arc<OnceLock<T>>;

/// Encode-side identity table.
#[derive(Default)]
pub struct WriteIdentities {
    ids: HashMap<usize, u32>,
    // Holding a clone pins every registered allocation until the pass ends,
    // so an address can't be freed and handed to a different object.
    retained: Vec<Box<dyn Any>>,
}

impl WriteIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `value` by identity, allocating the next id if it is unseen.
    ///
    /// Returns the id and whether it was freshly allocated.
    pub fn reserve<T: ?Sized + 'static>(&mut self, value: &Arc<T>) -> (u32, bool) {
        let key = Arc::as_ptr(value) as *const () as usize;
        if let Some(&id) = self.ids.get(&key) {
            return (id, false);
        }
        let id = self.ids.len() as u32;
        self.ids.insert(key, id);
        self.retained.push(Box::new(Arc::clone(value)));
        (id, true)
    }

    /// Number of ids allocated so far.
    pub fn len(&self) -> u32 {
        self.ids.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

enum Slot {
    Reserved,
    Bound {
        value: Box<dyn Any>,
        type_name: &'static str,
    },
}

/// Decode-side identity table.
#[derive(Default)]
pub struct ReadIdentities {
    slots: Vec<Slot>,
}

impl ReadIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id. Slots are handed out in the same order the
    /// encoder allocated ids.
    pub fn begin_slot(&mut self) -> u32 {
        let id = self.slots.len() as u32;
        self.slots.push(Slot::Reserved);
        id
    }

    /// Populate a slot reserved by [`begin_slot`](Self::begin_slot).
    pub fn bind<T: ?Sized + 'static>(&mut self, id: u32, value: Arc<T>) {
        debug_assert!((id as usize) < self.slots.len(), "bind of unreserved id {id}");
        if let Some(slot) = self.slots.get_mut(id as usize) {
            *slot = Slot::Bound {
                value: Box::new(value),
                type_name: type_name::<Arc<T>>(),
            };
        }
    }

    /// Resolve a back-reference to the instance bound under `id`.
    pub fn resolve<T: ?Sized + 'static>(&self, id: u32) -> Result<Arc<T>> {
        match self.slots.get(id as usize) {
            None => Err(Error::UnknownReference {
                id,
                allocated: self.len(),
            }),
            Some(Slot::Reserved) => Err(Error::UnboundReference { id }),
            Some(Slot::Bound { value, type_name: found }) => value
                .downcast_ref::<Arc<T>>()
                .cloned()
                .ok_or(Error::TypeMismatch {
                    expected: type_name::<Arc<T>>(),
                    found: *found,
                }),
        }
    }

    /// Number of ids allocated so far.
    pub fn len(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_allocation_reuses_id() {
        let mut ids = WriteIdentities::new();
        let a = Arc::new(String::from("a"));
        let a2 = Arc::clone(&a);
        assert_eq!(ids.reserve(&a), (0, true));
        assert_eq!(ids.reserve(&a2), (0, false));
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn equal_values_get_distinct_ids() {
        let mut ids = WriteIdentities::new();
        let a = Arc::new(String::from("same"));
        let b = Arc::new(String::from("same"));
        assert_eq!(ids.reserve(&a), (0, true));
        assert_eq!(ids.reserve(&b), (1, true));
    }

    #[test]
    fn retained_allocation_is_not_recycled() {
        let mut ids = WriteIdentities::new();
        let first = Arc::new(7u64);
        let (first_id, _) = ids.reserve(&first);
        drop(first);
        let second = Arc::new(7u64);
        let (second_id, is_new) = ids.reserve(&second);
        assert!(is_new);
        assert_ne!(first_id, second_id);
    }

    #[test]
    fn slot_lifecycle() {
        let mut slots = ReadIdentities::new();
        let id = slots.begin_slot();
        assert!(matches!(
            slots.resolve::<String>(id),
            Err(Error::UnboundReference { id: 0 })
        ));
        let value = Arc::new(String::from("x"));
        slots.bind(id, Arc::clone(&value));
        let resolved = slots.resolve::<String>(id).unwrap();
        assert!(Arc::ptr_eq(&resolved, &value));
    }

    #[test]
    fn resolve_unknown_and_mistyped_ids() {
        let mut slots = ReadIdentities::new();
        assert!(matches!(
            slots.resolve::<String>(3),
            Err(Error::UnknownReference { id: 3, allocated: 0 })
        ));
        let id = slots.begin_slot();
        slots.bind(id, Arc::new(1u32));
        assert!(matches!(
            slots.resolve::<String>(id),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
