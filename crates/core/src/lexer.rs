use std::ops::RangeInclusive;

use logos::Logos;

use crate::diag::{Diagnostic, ErrorKind};
use crate::span::{RawLine, Span};

pub const COMMENT_MARKER: char = ';';
pub const SENTINEL: &str = "even";

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
pub enum TokenKind {
    #[token("-")]
    Minus,

    #[regex(r"\$[0-9a-fA-F]+|[0-9]+", parse_number)]
    Number(i64),

    #[regex(r"[A-Za-z_.@?][A-Za-z0-9_.@?]*", parse_ident)]
    Ident(String),
}

fn parse_number(lex: &mut logos::Lexer<TokenKind>) -> Option<i64> {
    let slice = lex.slice();
    if let Some(hex) = slice.strip_prefix('$') {
        return i64::from_str_radix(hex, 16).ok();
    }
    slice.parse::<i64>().ok()
}

fn parse_ident(lex: &mut logos::Lexer<TokenKind>) -> String {
    lex.slice().to_string()
}

/// Lexes a whole operand; `None` if any part of it is not a token.
fn lex_operand(text: &str) -> Option<Vec<TokenKind>> {
    TokenKind::lexer(text).collect::<Result<Vec<_>, _>>().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandWidth {
    Byte,
    Word,
}

impl OperandWidth {
    pub fn from_directive(token: &str) -> Option<Self> {
        match token {
            "dc.b" => Some(Self::Byte),
            "dc.w" => Some(Self::Word),
            _ => None,
        }
    }

    pub fn directive(self) -> &'static str {
        match self {
            Self::Byte => "dc.b",
            Self::Word => "dc.w",
        }
    }

    /// Accepted literal values; negative values are stored two's complement.
    fn bounds(self) -> RangeInclusive<i64> {
        match self {
            Self::Byte => -0x80..=0xFF,
            Self::Word => -0x8000..=0xFFFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub text: String,
    pub span: Span,
}

impl Operand {
    fn literal(&self) -> Result<i64, Diagnostic> {
        let value = match lex_operand(&self.text).as_deref() {
            Some([TokenKind::Number(value)]) => Some(*value),
            Some([TokenKind::Minus, TokenKind::Number(value)]) => Some(-*value),
            _ => None,
        };
        value.ok_or_else(|| self.malformed_literal())
    }

    fn malformed_literal(&self) -> Diagnostic {
        Diagnostic::error(
            self.span,
            ErrorKind::MalformedLiteral {
                text: self.text.clone(),
            },
        )
    }

    fn bounded(&self, width: OperandWidth) -> Result<i64, Diagnostic> {
        let value = self.literal()?;
        let bounds = width.bounds();
        if !bounds.contains(&value) {
            return Err(self.malformed_literal().with_help(format!(
                "{} operands must lie in {}..={}",
                width.directive(),
                bounds.start(),
                bounds.end()
            )));
        }
        Ok(value)
    }

    pub fn byte(&self) -> Result<u8, Diagnostic> {
        Ok(self.bounded(OperandWidth::Byte)? as u8)
    }

    pub fn word(&self) -> Result<i16, Diagnostic> {
        Ok(self.bounded(OperandWidth::Word)? as u16 as i16)
    }

    /// Resolves a `<label>-<table>` offset declaration.
    pub fn table_ref(&self) -> Result<(String, String), Diagnostic> {
        match lex_operand(&self.text) {
            Some(tokens) => match <[TokenKind; 3]>::try_from(tokens) {
                Ok([TokenKind::Ident(label), TokenKind::Minus, TokenKind::Ident(table)]) => {
                    Ok((label, table))
                }
                _ => Err(self.malformed_table_entry()),
            },
            None => Err(self.malformed_table_entry()),
        }
    }

    fn malformed_table_entry(&self) -> Diagnostic {
        Diagnostic::error(
            self.span,
            ErrorKind::MalformedTableEntry {
                text: self.text.clone(),
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub width: OperandWidth,
    pub operands: Vec<Operand>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Sentinel,
    Directive(Directive),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDecl {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub span: Span,
    pub label: Option<LabelDecl>,
    pub body: Body,
}

impl Line {
    pub fn is_blank(&self) -> bool {
        self.label.is_none() && self.body == Body::Empty
    }
}

pub fn strip_comment(line: &str) -> &str {
    match line.find(COMMENT_MARKER) {
        Some(index) => &line[..index],
        None => line,
    }
}

/// Byte offset of `part` inside `base`; `part` must be a subslice of `base`.
fn offset_in(base: &str, part: &str) -> usize {
    part.as_ptr() as usize - base.as_ptr() as usize
}

pub fn lex_line(raw: RawLine<'_>) -> Result<Line, Diagnostic> {
    let content = strip_comment(raw.text).trim_end();
    let body_text = content.trim_start();
    let mut line = Line {
        number: raw.number,
        span: raw.span,
        label: None,
        body: Body::Empty,
    };

    if body_text.is_empty() {
        return Ok(line);
    }

    let is_label_line = body_text.len() == content.len() && body_text != SENTINEL;
    let body_text = if is_label_line {
        let Some((name, rest)) = content.split_once(':') else {
            return Err(Diagnostic::error(
                raw.span.sub(0..content.len()),
                ErrorKind::MalformedLabel {
                    text: content.to_string(),
                },
            )
            .with_help("label declarations start in column 0 and end with ':'")
            .with_note("indent directives that do not declare a label"));
        };
        line.label = Some(lex_label(raw, name)?);
        rest.trim_start()
    } else {
        body_text
    };

    line.body = if body_text.is_empty() {
        Body::Empty
    } else if body_text == SENTINEL {
        Body::Sentinel
    } else {
        Body::Directive(lex_directive(raw, body_text)?)
    };
    Ok(line)
}

fn lex_label(raw: RawLine<'_>, name: &str) -> Result<LabelDecl, Diagnostic> {
    let name = name.trim_end();
    let span = raw.span.sub(0..name.len());
    match lex_operand(name).as_deref() {
        Some([TokenKind::Ident(ident)]) if ident == name => Ok(LabelDecl {
            name: ident.clone(),
            span,
        }),
        _ => Err(Diagnostic::error(
            span,
            ErrorKind::MalformedLabel {
                text: name.to_string(),
            },
        )),
    }
}

fn lex_directive(raw: RawLine<'_>, text: &str) -> Result<Directive, Diagnostic> {
    let start = offset_in(raw.text, text);
    let span = raw.span.sub(start..start + text.len());
    let (token, operands) = text
        .split_once(|ch: char| ch.is_whitespace())
        .unwrap_or((text, ""));

    let Some(width) = OperandWidth::from_directive(token) else {
        return Err(Diagnostic::error(
            span.sub(0..token.len()),
            ErrorKind::MalformedDirective {
                detail: format!("unrecognized size directive '{token}'"),
            },
        )
        .with_help("expected dc.b or dc.w"));
    };

    if operands.trim().is_empty() {
        return Err(Diagnostic::error(
            span,
            ErrorKind::MalformedDirective {
                detail: format!("'{token}' has no operands"),
            },
        ));
    }

    let operands = operands
        .split(',')
        .map(|piece| {
            let trimmed = piece.trim();
            let start = if trimmed.is_empty() {
                offset_in(raw.text, piece)
            } else {
                offset_in(raw.text, trimmed)
            };
            Operand {
                text: trimmed.to_string(),
                span: raw.span.sub(start..start + trimmed.len()),
            }
        })
        .collect();

    Ok(Directive {
        width,
        operands,
        span,
    })
}
