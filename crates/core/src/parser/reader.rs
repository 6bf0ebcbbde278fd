use crate::diag::{Diagnostic, ErrorKind};
use crate::lexer::{Body, Directive, Operand, OperandWidth, lex_line};
use crate::record::Record;
use crate::span::{Lines, Span};

/// Pulls record words from a directive's operands, continuing onto the
/// following physical lines until the record is complete.
pub(super) struct RecordReader<'l, 'a> {
    lines: &'l mut Lines<'a>,
    width: OperandWidth,
    operands: std::vec::IntoIter<Operand>,
    last_span: Span,
}

/// High byte waiting for its partner.
#[derive(Clone, Copy)]
struct HalfWord {
    high: u8,
    span: Span,
}

impl<'l, 'a> RecordReader<'l, 'a> {
    pub(super) fn new(directive: Directive, lines: &'l mut Lines<'a>) -> Self {
        Self {
            lines,
            width: directive.width,
            last_span: directive.span,
            operands: directive.operands.into_iter(),
        }
    }

    /// Reads a header word and the `header * entry_size` payload words behind it.
    pub(super) fn read_record(mut self, entry_size: usize) -> Result<Record, Diagnostic> {
        let mut words = Vec::new();
        self.fill(&mut words, 1)?;

        let header = words[0];
        let count = usize::try_from(header).map_err(|_| {
            Diagnostic::error(self.last_span, ErrorKind::InvalidRecordCount { count: header })
                .with_help("the first word of a record is its repetition count")
        })?;

        let expected = Record::expected_len(count, entry_size).ok_or_else(|| {
            Diagnostic::error(self.last_span, ErrorKind::InvalidRecordCount { count: header })
                .with_note(format!(
                    "{count} entries of {entry_size} words do not fit in a record"
                ))
        })?;
        self.fill(&mut words, expected)?;
        self.finish()?;
        Ok(Record::from_words(words))
    }

    fn fill(&mut self, words: &mut Vec<i16>, expected: usize) -> Result<(), Diagnostic> {
        let mut pending: Option<HalfWord> = None;

        while words.len() < expected {
            let Some(operand) = self.operands.next() else {
                self.next_directive(pending, expected, words.len())?;
                continue;
            };
            self.last_span = operand.span;

            match self.width {
                OperandWidth::Byte => {
                    let byte = operand.byte()?;
                    match pending.take() {
                        Some(half) => words.push(i16::from_be_bytes([half.high, byte])),
                        None => {
                            pending = Some(HalfWord {
                                high: byte,
                                span: operand.span,
                            })
                        }
                    }
                }
                OperandWidth::Word => {
                    if let Some(half) = pending {
                        return Err(unbalanced(half)
                            .with_label(operand.span, "word operand starts here")
                            .with_note("a byte pair cannot be completed by a word operand"));
                    }
                    words.push(operand.word()?);
                }
            }
        }

        Ok(())
    }

    /// Moves to the next directive line, skipping blank and comment-only lines.
    fn next_directive(
        &mut self,
        pending: Option<HalfWord>,
        expected: usize,
        read: usize,
    ) -> Result<(), Diagnostic> {
        loop {
            let Some(raw) = self.lines.next() else {
                return Err(match pending {
                    Some(half) => unbalanced(half).with_note("the artifact ends mid-word"),
                    None => Diagnostic::error(
                        self.last_span,
                        ErrorKind::TruncatedRecord { expected, read },
                    )
                    .with_note("the artifact ends before the record is complete"),
                });
            };

            let line = lex_line(raw)?;
            let interrupted = line.label.is_some() || line.body == Body::Sentinel;
            if interrupted {
                let diagnostic = match pending {
                    Some(half) => unbalanced(half),
                    None => Diagnostic::error(
                        self.last_span,
                        ErrorKind::TruncatedRecord { expected, read },
                    ),
                };
                return Err(diagnostic.with_label(line.span, "record interrupted here"));
            }

            if let Body::Directive(directive) = line.body {
                self.width = directive.width;
                self.operands = directive.operands.into_iter();
                return Ok(());
            }
        }
    }

    fn finish(self) -> Result<(), Diagnostic> {
        let rest: Vec<Operand> = self.operands.collect();
        let (Some(first), Some(last)) = (rest.first(), rest.last()) else {
            return Ok(());
        };
        let span = Span::new(first.span.source_id, first.span.start, last.span.end);
        Err(
            Diagnostic::error(span, ErrorKind::TrailingOperands { count: rest.len() })
                .with_label(self.last_span, "record ends here")
                .with_help("move these operands to their own record or remove them"),
        )
    }
}

fn unbalanced(half: HalfWord) -> Diagnostic {
    Diagnostic::error(half.span, ErrorKind::UnbalancedByteOperands)
        .with_help("byte operands pair up high byte first; add the missing low byte")
}
