use crate::lang::name::{Name, NameTable};
use crate::lang::scope::{ModuleDescriptor, ModuleEntry};
use serde::{Deserialize, Serialize};

/// Serialized form of one import/export record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfoEntry {
    pub export_name: Option<Name>,
    pub local_name: Option<Name>,
    pub import_name: Option<Name>,
    pub module_request: i32,
    pub cell_index: i32,
    pub beg_pos: i32,
    pub end_pos: i32,
}

impl ModuleInfoEntry {
    pub fn new(entry: &ModuleEntry) -> Self {
        Self {
            export_name: entry.export_name.clone(),
            local_name: entry.local_name.clone(),
            import_name: entry.import_name.clone(),
            module_request: entry.module_request,
            cell_index: entry.cell_index,
            beg_pos: entry.beg_pos,
            end_pos: entry.end_pos,
        }
    }

    fn reintern(&self, names: &NameTable) -> Self {
        let map = |n: &Option<Name>| n.as_ref().map(|n| names.intern_name(n));
        Self {
            export_name: map(&self.export_name),
            local_name: map(&self.local_name),
            import_name: map(&self.import_name),
            ..self.clone()
        }
    }
}

/// Exports of a module scope, attached to its scope info.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    special_exports: Vec<ModuleInfoEntry>,
    /// Ordered by local name.
    regular_exports: Vec<ModuleInfoEntry>,
}

impl ModuleInfo {
    pub fn new(descriptor: &ModuleDescriptor) -> Self {
        let special_exports = descriptor
            .special_exports()
            .iter()
            .map(ModuleInfoEntry::new)
            .collect();

        let mut regular_exports: Vec<ModuleInfoEntry> = descriptor
            .regular_exports()
            .iter()
            .map(ModuleInfoEntry::new)
            .collect();
        regular_exports.sort_by(|a, b| {
            a.local_name
                .as_ref()
                .map(Name::as_str)
                .cmp(&b.local_name.as_ref().map(Name::as_str))
        });

        Self {
            special_exports,
            regular_exports,
        }
    }

    pub fn special_exports(&self) -> &[ModuleInfoEntry] {
        &self.special_exports
    }

    pub fn regular_exports(&self) -> &[ModuleInfoEntry] {
        &self.regular_exports
    }

    /// Regular exports whose local binding is `local_name`.
    pub fn exports_of<'a>(&'a self, local_name: &'a Name) -> impl Iterator<Item = &'a ModuleInfoEntry> {
        self.regular_exports
            .iter()
            .filter(move |e| e.local_name.as_ref() == Some(local_name))
    }

    pub(crate) fn reintern(&self, names: &NameTable) -> Self {
        Self {
            special_exports: self.special_exports.iter().map(|e| e.reintern(names)).collect(),
            regular_exports: self.regular_exports.iter().map(|e| e.reintern(names)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_exports_sorted_by_local_name() {
        let names = NameTable::new();
        let mut descriptor = ModuleDescriptor::new();
        descriptor.add_regular_export(ModuleEntry::local_export(names.intern("zeta"), names.intern("z"), 1));
        descriptor.add_regular_export(ModuleEntry::local_export(names.intern("alpha"), names.intern("a"), 2));
        descriptor.add_regular_export(ModuleEntry::local_export(names.intern("alpha"), names.intern("b"), 2));
        descriptor.add_special_export(ModuleEntry::star_export(0));
        descriptor.add_special_export(ModuleEntry::indirect_export(names.intern("x"), names.intern("y"), 1));

        let info = ModuleInfo::new(&descriptor);
        let locals: Vec<_> = info
            .regular_exports()
            .iter()
            .map(|e| e.export_name.as_ref().map(|n| n.as_str().to_owned()))
            .collect();
        assert_eq!(locals, vec![Some("a".into()), Some("b".into()), Some("z".into())]);
        assert_eq!(info.special_exports().len(), 2);
        assert_eq!(info.special_exports()[0].module_request, 0);

        let alpha = names.intern("alpha");
        assert_eq!(info.exports_of(&alpha).count(), 2);
    }

    #[test]
    fn test_regular_exports_sort_by_content_not_identity() {
        let names = NameTable::new();
        let mut descriptor = ModuleDescriptor::new();
        for (local, export) in [("ab", "e1"), ("b", "e2"), ("a", "e3"), ("aa", "e4")] {
            descriptor.add_regular_export(ModuleEntry::local_export(
                Name::new_uninterned(local),
                names.intern(export),
                1,
            ));
        }

        let info = ModuleInfo::new(&descriptor);
        let locals: Vec<&str> = info
            .regular_exports()
            .iter()
            .filter_map(|e| e.local_name.as_ref().map(Name::as_str))
            .collect();
        assert_eq!(locals, vec!["a", "aa", "ab", "b"]);
    }
}
