pub mod diag;
pub mod driver;
pub mod lexer;
pub mod linearize;
pub mod parser;
pub mod record;
pub mod serialize;
pub mod span;
pub mod table;

pub use diag::{ErrorKind, RenderOptions};
pub use driver::{
    CodecError, MinifyOptions, MinifyOutput, MinifyStats, minify, minify_sources, parse_source,
    parse_source_with_options,
};
pub use lexer::OperandWidth;
pub use linearize::{IndexOrder, LinearizeError};
pub use parser::{DPLC_ENTRY_SIZE, MAPPINGS_ENTRY_SIZE, ParseOptions, ParseResult};
pub use record::Record;
pub use table::{OffsetEntry, OffsetTable};
