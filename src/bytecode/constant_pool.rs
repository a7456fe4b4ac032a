use crate::lang::name::Name;
use crate::lang::value::{HeapObject, Object};
use std::collections::HashMap;
use std::sync::Arc;

/// Identity of a pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConstantKey {
    Smi(i32),
    Heap(usize),
    Name(usize),
}

/// Insertion-ordered constant pool with identity-based deduplication.
///
/// Entries own their handles, so an address used as a key cannot be reused
/// while the pool is alive.
#[derive(Debug, Default)]
pub struct ConstantPoolBuilder {
    entries: Vec<Object>,
    index: HashMap<ConstantKey, usize>,
}

impl ConstantPoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `value`, adding it on first use.
    ///
    /// Panics for singletons: they have dedicated load bytecodes.
    pub fn insert(&mut self, value: Object) -> usize {
        let key = match &value {
            Object::Smi(v) => ConstantKey::Smi(*v),
            Object::Heap(handle) => ConstantKey::Heap(Arc::as_ptr(handle) as usize),
            singleton => panic!(
                "{} has a dedicated bytecode and never enters the constant pool",
                singleton
            ),
        };
        self.insert_keyed(key, value)
    }

    /// Returns the index of a string entry for `name`, keyed by the name's
    /// identity.
    pub fn insert_name(&mut self, name: &Name) -> usize {
        let key = ConstantKey::Name(name.addr());
        if let Some(&index) = self.index.get(&key) {
            return index;
        }
        let value = Object::Heap(Arc::new(HeapObject::String(name.clone())));
        self.insert_keyed(key, value)
    }

    fn insert_keyed(&mut self, key: ConstantKey, value: Object) -> usize {
        if let Some(&index) = self.index.get(&key) {
            return index;
        }
        let index = self.entries.len();
        self.entries.push(value);
        self.index.insert(key, index);
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Object> {
        self.entries.get(index)
    }

    pub fn into_entries(self) -> Vec<Object> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::name::NameTable;

    #[test]
    fn test_same_handle_shares_slot() {
        let mut pool = ConstantPoolBuilder::new();
        let number = Object::new_heap_number(1.5);
        for _ in 0..5 {
            assert_eq!(pool.insert(number.clone()), 0);
        }
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_equal_content_different_handles() {
        let mut pool = ConstantPoolBuilder::new();
        let a = pool.insert(Object::new_heap_number(1.5));
        let b = pool.insert(Object::new_heap_number(1.5));
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_smis_dedup_by_value() {
        let mut pool = ConstantPoolBuilder::new();
        assert_eq!(pool.insert(Object::Smi(300)), pool.insert(Object::Smi(300)));
        assert_ne!(pool.insert(Object::Smi(300)), pool.insert(Object::Smi(301)));
    }

    #[test]
    fn test_names_dedup_by_identity() {
        let names = NameTable::new();
        let mut pool = ConstantPoolBuilder::new();
        let x = pool.insert_name(&names.intern("x"));
        assert_eq!(pool.insert_name(&names.intern("x")), x);
        assert_ne!(pool.insert_name(&Name::new_uninterned("x")), x);
        assert!(pool.get(x).is_some_and(|o| o.is_string()));
    }

    #[test]
    #[should_panic(expected = "dedicated bytecode")]
    fn test_singletons_rejected() {
        ConstantPoolBuilder::new().insert(Object::Undefined);
    }
}
