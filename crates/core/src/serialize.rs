use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::lexer::OperandWidth;
use crate::linearize::Placement;
use crate::table::OffsetTable;

const INDENT: &str = "\t\t";
const BYTES_PER_LINE: usize = 6;
const BYTE_COLUMN_WIDTH: usize = 4;

/// Renders a word in decimal when its decimal and upper-case hex spellings
/// are identical, and as `$`-prefixed hex otherwise.
///
/// The only values that print in decimal are 0 to 9. Existing artifacts were
/// produced with this rule, so it is kept as is to avoid churn in diffs.
pub fn format_word(value: i16) -> String {
    format_value(&value.to_string(), format!("{:X}", value as u16))
}

/// Byte counterpart of [`format_word`], right-aligned in a fixed column.
pub fn format_byte(value: u8) -> String {
    let text = format_value(&value.to_string(), format!("{value:X}"));
    format!("{text:>BYTE_COLUMN_WIDTH$}")
}

fn format_value(decimal: &str, hex: String) -> String {
    if decimal == hex { hex } else { format!("${hex}") }
}

/// Writes the target's offset tables followed by one body per placement.
pub fn serialize(target: &OffsetTable, placements: &[Placement<'_>], payload: OperandWidth) -> String {
    let mut out = String::new();
    write_tables(&mut out, target);
    for placement in placements {
        write_record(&mut out, target, placement, payload);
    }
    out
}

fn write_tables(out: &mut String, target: &OffsetTable) {
    for table in target.table_names() {
        let _ = writeln!(out, "{table}:");
        for label in target.table_labels(table) {
            let _ = writeln!(out, "{INDENT}dc.w {label}-{table}");
        }
    }
}

fn write_record(
    out: &mut String,
    target: &OffsetTable,
    placement: &Placement<'_>,
    payload: OperandWidth,
) {
    let labels: BTreeSet<&str> = placement
        .indices
        .iter()
        .filter_map(|&index| target.label_at(index))
        .collect();
    for label in labels {
        let _ = writeln!(out, "{label}:");
    }

    let record = placement.record;
    let _ = writeln!(out, "{INDENT}dc.w {}", format_word(record.header()));

    match payload {
        OperandWidth::Word => {
            for &word in record.payload() {
                let _ = writeln!(out, "{INDENT}dc.w {}", format_word(word));
            }
        }
        OperandWidth::Byte => {
            let bytes: Vec<u8> = record
                .payload()
                .iter()
                .flat_map(|word| word.to_be_bytes())
                .collect();
            for chunk in bytes.chunks(BYTES_PER_LINE) {
                let line = chunk
                    .iter()
                    .map(|&byte| format_byte(byte))
                    .collect::<Vec<_>>()
                    .join(",");
                let _ = writeln!(out, "{INDENT}dc.b {line}");
            }
        }
    }
}
