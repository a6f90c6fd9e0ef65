//! `datagator-importer` converts tabular files into canonical `datagator#Matrix` JSON
//! documents, streaming one atom at a time from source to sink.
//!
//! The primary entrypoint is [`convert::convert_path`], which picks a tokenizer from the file
//! extension (or a forced format key in [`convert::ConvertOptions`]) and writes one document
//! per input file.
//!
//! ## What you can convert
//!
//! **Formats (selected by extension through a [`extract::FormatRegistry`]):**
//!
//! - **Delimited text**: `.csv`, `.tsv`
//! - **Workbooks** (requires the Cargo feature `excel`): `.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`
//!   (first sheet)
//!
//! **Cell types:**
//!
//! Delimited cells are typed by inspection, see [`types::Scalar::infer`]:
//!
//! - integer text becomes [`types::Scalar::Integer`] (or [`types::Scalar::BigInteger`] beyond
//!   64 bits, exact)
//! - decimal text becomes [`types::Scalar::Float`] (or [`types::Scalar::Decimal`] when it does
//!   not fit an `f64`, exact)
//! - empty fields become [`types::Scalar::Null`]
//! - everything else stays [`types::Scalar::Text`]
//!
//! ## Quick example: convert a file
//!
//! ```no_run
//! use datagator_importer::convert::{convert_path, ConvertOptions};
//! use datagator_importer::types::Layout;
//!
//! # fn main() -> Result<(), datagator_importer::ImportError> {
//! let opts = ConvertOptions {
//!     // First row is a header row.
//!     layout: Layout::new(1, 0),
//!     ..Default::default()
//! };
//! let stdout = std::io::stdout();
//! convert_path("people.csv", stdout.lock(), &opts)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Reading documents back
//!
//! ```rust
//! use datagator_importer::matrix::{Matrix, Projection};
//!
//! let doc = r#"{"kind":"datagator#Matrix","columnHeaders":1,"rowHeaders":0,
//!              "rows":[["id"],[1],[2]],"rowsCount":3,"columnsCount":1}"#;
//! let headers = Matrix::from_json_str(doc, Projection::Headers).unwrap();
//! assert_eq!(headers.rows().len(), 1);
//! assert!(!headers.is_complete());
//! ```
//!
//! ## Modules
//!
//! - [`extract`]: atom streams, tokenizers and the file-source assembler
//! - [`matrix`]: the matrix model, streaming emitter and JSON styles
//! - [`buffer`]: memory/disk spooled row buffer
//! - [`convert`]: unified entrypoints and observers
//! - [`types`]: scalars, rows and header layout
//! - [`error`]: error types used across the crate

pub mod buffer;
pub mod convert;
pub mod error;
pub mod extract;
pub mod matrix;
pub mod types;

pub use error::{ImportError, ImportResult};
