//! xlsxnative - Pure-Rust minimal XLSX reader and writer with streaming rows
//!
//! This crate reads and writes single-sheet OOXML spreadsheets (`.xlsx`) by working
//! directly with the zip container and its XML parts. Rows are decoded lazily, one at
//! a time, and written through a spooled buffer, so very large sheets never need to be
//! held in memory.
//!
//! Numeric cells are resolved against the workbook's style table: values whose number
//! format is a date or time format come back as `Cell::Date`, `Cell::DateTime` or
//! `Cell::Time`, everything else as a lossless decimal string.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xlsxnative::{ReaderBuilder, WriterBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let writer = WriterBuilder::new().with_creator("me").build()?;
//!     writer.write_file(
//!         vec![
//!             vec!["fname", "sname", "email"],
//!             vec!["john", "doe", "john.doe@example.com"],
//!         ],
//!         "people.xlsx",
//!     )?;
//!
//!     let reader = ReaderBuilder::new().with_assoc(true).build()?;
//!     for row in reader.read_file("people.xlsx") {
//!         let row = row?;
//!         let record = row.record().expect("assoc mode yields records");
//!         println!("{:?}", record.get("email"));
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! For in-memory round trips, use `write_to_vec` and `read_bytes`:
//!
//! ```rust
//! use xlsxnative::{Cell, ReaderBuilder, Row, WriterBuilder};
//!
//! # fn main() -> Result<(), xlsxnative::XlsxNativeError> {
//! let bytes = WriterBuilder::new()
//!     .with_stream(true)
//!     .build()?
//!     .write_to_vec(vec![vec![Cell::from("total"), Cell::from(42i64)]])?;
//!
//! let rows = ReaderBuilder::new().build()?.read_bytes(bytes).collect_rows()?;
//! assert_eq!(
//!     rows,
//!     vec![Row::Cells(vec![Cell::from("total"), Cell::Number("42".to_string())])]
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Reading is lazy: a missing or corrupt package is reported by the first call to
//! `next()` on the returned `Rows`, not by `read_file` itself.

mod api;
mod builder;
mod container;
mod error;
mod formatter;
mod parser;
mod reader;
mod security;
mod types;
mod writer;

// 公開API
pub use api::{NativeXlsx, SpreadBackend};
pub use builder::{ReadOptions, ReaderBuilder, WriteOptions, WriterBuilder};
pub use error::XlsxNativeError;
pub use formatter::{DateCodec, DateSystem};
pub use parser::shared_strings::SharedStringTable;
pub use parser::styles::{is_date_time_format, NumberFormatKind, StyleTable};
pub use reader::{Rows, XlsxReader};
pub use types::{Cell, Record, Row};
pub use writer::XlsxWriter;
