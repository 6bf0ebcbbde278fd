use thiserror::Error;

use crate::diag::{Diagnostic, ErrorKind, RenderOptions, render_diagnostic_with_options};
use crate::lexer::OperandWidth;
use crate::linearize::{IndexOrder, LinearizeError, linearize, uncovered_entries};
use crate::parser::{ParseOptions, ParseResult, parse_artifact};
use crate::serialize::serialize;
use crate::span::SourceMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinifyOptions {
    pub entry_size: usize,
    /// Operand width used for record payloads in the output.
    pub payload: OperandWidth,
    pub order: IndexOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinifyOutput {
    pub text: String,
    pub stats: MinifyStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinifyStats {
    pub tables: usize,
    pub offset_entries: usize,
    pub source_labels: usize,
    pub distinct_records: usize,
    /// Target offset entries no source record covers.
    pub uncovered_entries: usize,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{artifact}:{line}: {kind}")]
    Parse {
        artifact: String,
        line: usize,
        kind: ErrorKind,
        diagnostic: Box<Diagnostic>,
        rendered: String,
    },
    #[error(transparent)]
    Linearize(#[from] LinearizeError),
}

impl CodecError {
    /// Human-readable report: the annotated source excerpt for parse errors,
    /// the plain message otherwise.
    pub fn rendered(&self) -> String {
        match self {
            Self::Parse { rendered, .. } => rendered.clone(),
            Self::Linearize(error) => format!("error: {error}"),
        }
    }

    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Self::Parse { kind, .. } => Some(kind),
            Self::Linearize(_) => None,
        }
    }
}

pub fn parse_source(
    artifact: &str,
    text: &str,
    options: ParseOptions,
) -> Result<ParseResult, CodecError> {
    parse_source_with_options(artifact, text, options, RenderOptions::plain())
}

pub fn parse_source_with_options(
    artifact: &str,
    text: &str,
    options: ParseOptions,
    render: RenderOptions,
) -> Result<ParseResult, CodecError> {
    let mut source_map = SourceMap::default();
    let source_id = source_map.add_source(artifact, text);
    parse_artifact(source_id, text, options)
        .map_err(|diagnostic| fail_with_rendered(&source_map, diagnostic, render))
}

/// Re-emits `target` with the record contents of `source`, one body per
/// distinct record.
pub fn minify(
    source: &ParseResult,
    target: &ParseResult,
    options: MinifyOptions,
) -> Result<MinifyOutput, CodecError> {
    let placements = linearize(source, target.offset_table(), options.order)?;
    let text = serialize(target.offset_table(), &placements, options.payload);
    let offsets = target.offset_table();

    Ok(MinifyOutput {
        text,
        stats: MinifyStats {
            tables: offsets.table_count(),
            offset_entries: offsets.len(),
            source_labels: source.label_count(),
            distinct_records: placements.len(),
            uncovered_entries: uncovered_entries(offsets, &placements).len(),
        },
    })
}

/// Parses a source/target pair and minifies it.
pub fn minify_sources(
    source: (&str, &str),
    target: (&str, &str),
    options: MinifyOptions,
    render: RenderOptions,
) -> Result<MinifyOutput, CodecError> {
    let parse_options = ParseOptions::new(options.entry_size);
    let (source_name, source_text) = source;
    let (target_name, target_text) = target;

    let source = parse_source_with_options(source_name, source_text, parse_options, render)?;
    let target = parse_source_with_options(target_name, target_text, parse_options, render)?;
    minify(&source, &target, options)
}

fn fail_with_rendered(
    source_map: &SourceMap,
    diagnostic: Diagnostic,
    render: RenderOptions,
) -> CodecError {
    let rendered = render_diagnostic_with_options(source_map, &diagnostic, render);
    let (artifact, line) = source_map
        .get(diagnostic.primary.source_id)
        .map(|file| (file.name.clone(), file.line_col(diagnostic.primary.start).0))
        .unwrap_or_default();

    CodecError::Parse {
        artifact,
        line,
        kind: diagnostic.kind.clone(),
        diagnostic: Box::new(diagnostic),
        rendered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "\
T:
\t\tdc.w Label1-T, Label2-T, Label3-T
Label1:\tdc.w 0
Label2:\tdc.w 0
Label3:\tdc.w 0
";

    const SOURCE: &str = "\
T:
\t\tdc.w Label1-T, Label2-T, Label3-T
Label1:\tdc.w 0
Label2:\tdc.w 0
Label3:\tdc.w 1
\t\tdc.w 7
";

    fn word_options() -> MinifyOptions {
        MinifyOptions {
            entry_size: 1,
            payload: OperandWidth::Word,
            order: IndexOrder::Sequential,
        }
    }

    #[test]
    fn merges_equal_records_end_to_end() {
        let output = minify_sources(
            ("source.asm", SOURCE),
            ("target.asm", TARGET),
            word_options(),
            RenderOptions::plain(),
        )
        .expect("minify");

        assert_eq!(
            output.text,
            "T:\n\
             \t\tdc.w Label1-T\n\
             \t\tdc.w Label2-T\n\
             \t\tdc.w Label3-T\n\
             Label1:\n\
             Label2:\n\
             \t\tdc.w 0\n\
             Label3:\n\
             \t\tdc.w 1\n\
             \t\tdc.w 7\n"
        );
        assert_eq!(
            output.stats,
            MinifyStats {
                tables: 1,
                offset_entries: 3,
                source_labels: 3,
                distinct_records: 2,
                uncovered_entries: 0,
            }
        );
    }

    #[test]
    fn output_parses_back_to_the_same_records_and_table() {
        let options = MinifyOptions {
            entry_size: 3,
            payload: OperandWidth::Byte,
            order: IndexOrder::Sequential,
        };
        let source_text = "\
Map:
\t\tdc.w F0-Map, F1-Map, F2-Map, F3-Map
F0:\tdc.w 0
F1:\tdc.w 1
\t\tdc.b $EC, $0F, $00, $00, $FF, $F0
F2:\tdc.w 2
\t\tdc.w $F805, $0010, $FFF8
\t\tdc.w $0005, $0A10, $0000
F3:\tdc.w 1
\t\tdc.b $EC, $0F, $00, $00, $FF, $F0
";
        let parse_options = ParseOptions::new(options.entry_size);
        let source = parse_source("source.asm", source_text, parse_options).expect("source");
        let output = minify(&source, &source, options).expect("minify");
        let reparsed = parse_source("output.asm", &output.text, parse_options).expect("reparse");

        assert_eq!(reparsed.offset_table(), source.offset_table());
        let records = |result: &ParseResult| {
            let mut records: Vec<_> = result.records().map(|(record, _)| record.clone()).collect();
            records.sort();
            records
        };
        assert_eq!(records(&reparsed), records(&source));
        assert_eq!(reparsed.record_count(), 3);
    }

    #[test]
    fn duplicate_label_fails_without_output() {
        let source = format!("{SOURCE}Label1:\tdc.w 1, 8\n");
        let err = minify_sources(
            ("source.asm", &source),
            ("target.asm", TARGET),
            word_options(),
            RenderOptions::plain(),
        )
        .expect_err("expected duplicate label");

        assert!(matches!(
            err.kind(),
            Some(ErrorKind::DuplicateLabel { label }) if label == "Label1"
        ));
        assert_eq!(err.to_string(), "source.asm:7: duplicate label 'Label1'");
        assert!(err.rendered().contains("already bound to a different record here"));
    }

    #[test]
    fn counts_target_entries_without_a_source_record() {
        let source = "T:\n\t\tdc.w Label2-T\nLabel2:\tdc.w 1, 4\n";
        let output = minify_sources(
            ("source.asm", source),
            ("target.asm", TARGET),
            word_options(),
            RenderOptions::plain(),
        )
        .expect("minify");
        assert_eq!(output.stats.uncovered_entries, 2);
        assert_eq!(output.stats.distinct_records, 1);
    }

    #[test]
    fn linearize_errors_pass_through() {
        let target = "T:\n\t\tdc.w Label1-T\nLabel1:\tdc.w 0\n";
        let err = minify_sources(
            ("source.asm", SOURCE),
            ("target.asm", target),
            word_options(),
            RenderOptions::plain(),
        )
        .expect_err("expected unknown label");
        assert!(matches!(err, CodecError::Linearize(LinearizeError::UnknownLabel { .. })));
    }
}
