use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An interned string.
///
/// Two names are equal only if they are the same handle. Content equality is
/// available through [`Name::content_eq`] but lookups never use it.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(Arc<str>);

impl Name {
    /// Creates a name that belongs to no table. It only compares equal to its
    /// own clones.
    pub fn new_uninterned(s: &str) -> Self {
        Name(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn content_eq(&self, other: &Name) -> bool {
        *self.0 == *other.0
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<u8>() as usize
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl std::fmt::Debug for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compiler-internal names are hidden from introspection: the empty name,
/// anything starting with `.`, and the receiver `this`.
pub fn is_synthetic_name(name: &str) -> bool {
    name.is_empty() || name.starts_with('.') || name == "this"
}

/// Interned names shared by every compilation in a process.
#[derive(Default)]
pub struct NameTable {
    names: RwLock<HashSet<Arc<str>>>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, s: &str) -> Name {
        {
            let names = self.names.read();
            if let Some(existing) = names.get(s) {
                return Name(Arc::clone(existing));
            }
        }

        let mut names = self.names.write();
        // another thread may have won the race between the two locks
        if let Some(existing) = names.get(s) {
            return Name(Arc::clone(existing));
        }
        let interned: Arc<str> = Arc::from(s);
        names.insert(Arc::clone(&interned));
        Name(interned)
    }

    /// Returns this table's handle for `name`'s content.
    pub fn intern_name(&self, name: &Name) -> Name {
        self.intern(name.as_str())
    }

    pub fn this_string(&self) -> Name {
        self.intern("this")
    }

    pub fn empty_string(&self) -> Name {
        self.intern("")
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for NameTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameTable").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_same_handle() {
        let table = NameTable::new();
        let a = table.intern("answer");
        let b = table.intern("answer");
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_uninterned_names_compare_by_identity() {
        let table = NameTable::new();
        let interned = table.intern("x");
        let loose = Name::new_uninterned("x");
        assert_ne!(interned, loose);
        assert!(interned.content_eq(&loose));
        assert_eq!(loose.clone(), loose);
    }

    #[test]
    fn test_intern_name_maps_foreign_handle() {
        let table = NameTable::new();
        let loose = Name::new_uninterned("y");
        assert_eq!(table.intern_name(&loose), table.intern("y"));
    }

    #[test]
    fn test_synthetic_names() {
        assert!(is_synthetic_name(""));
        assert!(is_synthetic_name(".result"));
        assert!(is_synthetic_name("this"));
        assert!(!is_synthetic_name("thisValue"));
        assert!(!is_synthetic_name("a.b"));
    }

    #[test]
    fn test_concurrent_interning_agrees() {
        let table = NameTable::new();
        let handles: Vec<Name> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..4).map(|_| s.spawn(|| table.intern("shared"))).collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        assert!(handles.windows(2).all(|w| w[0] == w[1]));
    }
}
