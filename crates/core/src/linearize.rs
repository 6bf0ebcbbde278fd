use thiserror::Error;

use crate::parser::ParseResult;
use crate::record::Record;
use crate::table::{OffsetEntry, OffsetTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexOrder {
    /// Indices follow the concatenated table order.
    #[default]
    Sequential,
    /// Indices are read record-major across parallel tables.
    Interleaved,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinearizeError {
    #[error("label '{label}' is not declared in the target offset table")]
    UnknownLabel { label: String },
    #[error(
        "cannot interleave {labels} offset entries across {tables} tables: the tables differ in length"
    )]
    UnevenInterleave { labels: usize, tables: usize },
}

/// A distinct record and the target offset-table positions that carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement<'a> {
    pub record: &'a Record,
    /// Raw target positions, ascending; these name the record's labels.
    pub indices: Vec<usize>,
    /// Emission rank: the smallest position after the index order is applied.
    pub sort_key: usize,
}

/// Maps an index of a `table_count x records_per_table` table-major layout to
/// its record-major position.
pub fn interleave_index(index: usize, table_count: usize, records_per_table: usize) -> usize {
    index / table_count + (index % table_count) * records_per_table
}

struct IndexMapper {
    order: IndexOrder,
    table_count: usize,
    records_per_table: usize,
}

impl IndexMapper {
    fn new(target: &OffsetTable, order: IndexOrder) -> Result<Self, LinearizeError> {
        let table_count = target.table_count();
        if order == IndexOrder::Interleaved && table_count > 0 && target.len() % table_count != 0 {
            return Err(LinearizeError::UnevenInterleave {
                labels: target.len(),
                tables: table_count,
            });
        }

        Ok(Self {
            order,
            table_count,
            records_per_table: target.len().checked_div(table_count).unwrap_or(0),
        })
    }

    fn map(&self, index: usize) -> usize {
        match self.order {
            IndexOrder::Sequential => index,
            IndexOrder::Interleaved => {
                interleave_index(index, self.table_count, self.records_per_table)
            }
        }
    }
}

/// Places every distinct record of `source` onto `target`'s offset table and
/// returns the placements in emission order.
///
/// Each source label is looked up by name in the target table, so both
/// artifacts must name the same logical positions. A source label that the
/// target does not declare is rejected rather than guessed at. The index
/// order only decides where a record is emitted, never which labels it gets.
pub fn linearize<'a>(
    source: &'a ParseResult,
    target: &OffsetTable,
    order: IndexOrder,
) -> Result<Vec<Placement<'a>>, LinearizeError> {
    let mapper = IndexMapper::new(target, order)?;
    let mut placements = Vec::with_capacity(source.record_count());

    for (record, labels) in source.records() {
        let mut indices = Vec::with_capacity(labels.len());
        for label in labels {
            let index = target
                .index_of(label)
                .ok_or_else(|| LinearizeError::UnknownLabel {
                    label: label.clone(),
                })?;
            indices.push(index);
        }
        indices.sort_unstable();
        indices.dedup();

        // Every label set is non-empty, so a record always has a position.
        let Some(sort_key) = indices.iter().map(|&index| mapper.map(index)).min() else {
            continue;
        };
        placements.push(Placement {
            record,
            indices,
            sort_key,
        });
    }

    placements.sort_by_key(|placement| placement.sort_key);
    for entry in uncovered_entries(target, &placements) {
        tracing::warn!(
            "offset entry '{}-{}' has no record in the source artifact",
            entry.label,
            entry.table
        );
    }
    Ok(placements)
}

/// Target offset entries whose label no placement carries.
///
/// A repeated shared-root entry counts as covered when its first declaration is.
pub fn uncovered_entries<'t>(
    target: &'t OffsetTable,
    placements: &[Placement<'_>],
) -> Vec<&'t OffsetEntry> {
    let mut covered = vec![false; target.len()];
    for index in placements.iter().flat_map(|placement| &placement.indices) {
        covered[*index] = true;
    }

    target
        .entries()
        .iter()
        .filter(|entry| {
            !target
                .index_of(&entry.label)
                .is_some_and(|first| covered[first])
        })
        .collect()
}
