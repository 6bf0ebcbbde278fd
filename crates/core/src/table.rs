use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::diag::{Diagnostic, ErrorKind};
use crate::span::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetEntry {
    pub label: String,
    pub table: String,
}

/// Every `(label, table)` offset declaration of an artifact, in discovery order.
///
/// The position of a label's first declaration is its index; the linearizer
/// orders records by it. The first table declared is the main table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    entries: Vec<OffsetEntry>,
    tables: IndexMap<String, Vec<usize>>,
    first_index: FxHashMap<String, usize>,
}

impl OffsetTable {
    pub fn entries(&self) -> &[OffsetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn main_table(&self) -> Option<&str> {
        self.tables.keys().next().map(String::as_str)
    }

    /// The label every table may reference, if any table exists.
    pub fn shared_root(&self) -> Option<&str> {
        self.entries.first().map(|entry| entry.label.as_str())
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Labels of `table` in declaration order.
    pub fn table_labels<'a>(&'a self, table: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.tables
            .get(table)
            .into_iter()
            .flatten()
            .map(|&index| self.entries[index].label.as_str())
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.first_index.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.first_index.contains_key(label)
    }

    pub fn label_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|entry| entry.label.as_str())
    }
}

/// Accumulates offset declarations while an artifact is in table mode.
#[derive(Debug, Default)]
pub(crate) struct OffsetTableBuilder {
    table: OffsetTable,
    declared_at: FxHashMap<String, Span>,
}

impl OffsetTableBuilder {
    pub(crate) fn contains(&self, label: &str) -> bool {
        self.table.contains(label)
    }

    pub(crate) fn push(&mut self, label: String, table: String, span: Span) -> Result<(), Diagnostic> {
        if let Some(&first) = self.declared_at.get(&label) {
            if !self.is_shared_root_alias(&label, &table) {
                return Err(Diagnostic::error(
                    span,
                    ErrorKind::DuplicateLabel { label },
                )
                .with_label(first, "first declared here")
                .with_note(
                    "only the main table's first label may appear again, and only in another table",
                ));
            }
        } else {
            self.declared_at.insert(label.clone(), span);
        }

        let index = self.table.entries.len();
        self.table.first_index.entry(label.clone()).or_insert(index);
        self.table.tables.entry(table.clone()).or_default().push(index);
        self.table.entries.push(OffsetEntry { label, table });
        Ok(())
    }

    fn is_shared_root_alias(&self, label: &str, table: &str) -> bool {
        self.table.main_table() != Some(table) && self.table.shared_root() == Some(label)
    }

    pub(crate) fn finish(self) -> OffsetTable {
        self.table
    }
}
