mod reader;

use std::collections::BTreeSet;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::diag::{Diagnostic, ErrorKind};
use crate::lexer::{Body, Directive, LabelDecl, OperandWidth, lex_line};
use crate::record::Record;
use crate::span::{Lines, SourceId, Span};
use crate::table::{OffsetTable, OffsetTableBuilder};

use self::reader::RecordReader;

/// Payload words per repetition count for sprite mapping pieces.
pub const MAPPINGS_ENTRY_SIZE: usize = 3;
/// Payload words per repetition count for DPLC requests.
pub const DPLC_ENTRY_SIZE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Payload words per unit of a record's repetition count.
    pub entry_size: usize,
}

impl ParseOptions {
    pub const fn new(entry_size: usize) -> Self {
        Self { entry_size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Table,
    Data,
}

impl Mode {
    /// Mode after declaring a label. Table mode ends for good the first time
    /// a label the offset table already references is declared.
    pub fn after_label(self, declared_in_offset_table: bool) -> Self {
        match self {
            Self::Table if declared_in_offset_table => Self::Data,
            mode => mode,
        }
    }
}

/// A fully parsed artifact: its offset table and its distinct records, each
/// with the labels that point at it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    offset_table: OffsetTable,
    records: IndexMap<Record, BTreeSet<String>>,
}

impl ParseResult {
    pub fn offset_table(&self) -> &OffsetTable {
        &self.offset_table
    }

    /// Distinct records in first-seen order.
    pub fn records(&self) -> impl Iterator<Item = (&Record, &BTreeSet<String>)> {
        self.records.iter()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn label_count(&self) -> usize {
        self.records.values().map(BTreeSet::len).sum()
    }

    pub fn labels_of(&self, record: &Record) -> Option<&BTreeSet<String>> {
        self.records.get(record)
    }

    pub fn record_of(&self, label: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|(_, labels)| labels.contains(label))
            .map(|(record, _)| record)
    }
}

/// Labels declared since the last record; they all name the next one.
#[derive(Debug, Default)]
struct PendingLabels {
    labels: Vec<LabelDecl>,
}

impl PendingLabels {
    fn push(&mut self, label: LabelDecl) {
        self.labels.push(label);
    }

    fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn len(&self) -> usize {
        self.labels.len()
    }
}

impl IntoIterator for PendingLabels {
    type Item = LabelDecl;
    type IntoIter = std::vec::IntoIter<LabelDecl>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.into_iter()
    }
}

struct ArtifactBuilder {
    options: ParseOptions,
    mode: Mode,
    offsets: OffsetTableBuilder,
    records: IndexMap<Record, BTreeSet<String>>,
    owners: FxHashMap<String, (usize, Span)>,
    pending: PendingLabels,
}

impl ArtifactBuilder {
    fn new(options: ParseOptions) -> Self {
        Self {
            options,
            mode: Mode::Table,
            offsets: OffsetTableBuilder::default(),
            records: IndexMap::new(),
            owners: FxHashMap::default(),
            pending: PendingLabels::default(),
        }
    }

    fn declare(&mut self, label: LabelDecl) {
        let next = self.mode.after_label(self.offsets.contains(&label.name));
        if next != self.mode {
            tracing::debug!(
                "label '{}' is referenced by the offset table, switching to record data",
                label.name
            );
            self.mode = next;
            // Labels seen so far were table headers.
            self.pending = PendingLabels::default();
        }
        self.pending.push(label);
    }

    fn directive(&mut self, directive: Directive, lines: &mut Lines<'_>) -> Result<(), Diagnostic> {
        match self.mode {
            Mode::Table => self.offset_directive(directive),
            Mode::Data => {
                let span = directive.span;
                let record =
                    RecordReader::new(directive, lines).read_record(self.options.entry_size)?;
                self.complete_record(record, span)
            }
        }
    }

    fn offset_directive(&mut self, directive: Directive) -> Result<(), Diagnostic> {
        if directive.width == OperandWidth::Byte {
            return Err(Diagnostic::error(
                directive.span,
                ErrorKind::MalformedDirective {
                    detail: "byte operands are not allowed in an offset table".to_string(),
                },
            )
            .with_help("declare offsets with dc.w <label>-<table>"));
        }

        for operand in &directive.operands {
            let (label, table) = operand.table_ref()?;
            self.offsets.push(label, table, operand.span)?;
        }
        Ok(())
    }

    fn complete_record(&mut self, record: Record, span: Span) -> Result<(), Diagnostic> {
        let labels = std::mem::take(&mut self.pending);
        if labels.is_empty() {
            return Err(Diagnostic::error(span, ErrorKind::UnlabelledRecord)
                .with_help("declare a label in column 0 before the record"));
        }

        let existing = self.records.get_index_of(&record);
        for label in &labels.labels {
            if let Some(&(owner, first)) = self.owners.get(&label.name)
                && Some(owner) != existing
            {
                return Err(Diagnostic::error(
                    label.span,
                    ErrorKind::DuplicateLabel {
                        label: label.name.clone(),
                    },
                )
                .with_label(first, "already bound to a different record here"));
            }
        }

        let slot = match existing {
            Some(slot) => slot,
            None => self.records.insert_full(record, BTreeSet::new()).0,
        };
        for label in labels {
            self.owners
                .entry(label.name.clone())
                .or_insert((slot, label.span));
            self.records[slot].insert(label.name);
        }
        Ok(())
    }

    fn finish(self) -> ParseResult {
        if !self.pending.is_empty() && self.mode == Mode::Data {
            tracing::debug!(
                "dropping {} trailing label(s) without a record",
                self.pending.len()
            );
        }

        ParseResult {
            offset_table: self.offsets.finish(),
            records: self.records,
        }
    }
}

/// Parses one artifact top to bottom.
///
/// Parsing stops at the first `even` sentinel or at the end of the text. Any
/// error aborts the whole artifact; no partial result is returned.
pub fn parse_artifact(
    source_id: SourceId,
    text: &str,
    options: ParseOptions,
) -> Result<ParseResult, Diagnostic> {
    let mut lines = Lines::new(source_id, text);
    let mut builder = ArtifactBuilder::new(options);

    while let Some(raw) = lines.next() {
        let line = lex_line(raw)?;
        if let Some(label) = line.label {
            builder.declare(label);
        }

        match line.body {
            Body::Empty => {}
            Body::Sentinel => break,
            Body::Directive(directive) => builder.directive(directive, &mut lines)?,
        }
    }

    Ok(builder.finish())
}
