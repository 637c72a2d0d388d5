//! This crate sorts text files composed of lines or line records in place, using bounded memory.
//! For example CSV, TSV or the data section of a
//! [pg_dump](https://www.postgresql.org/docs/current/app-pgdump.html) file.
//!
//! The order is defined by a key function supplied by the caller, which derives a comparable key
//! from each line. Parsing the records is left to the key function, so any field layout or type
//! can be sorted on.
//!
//! The sort is an external merge sort. The file is read in blocks of a configured size, each
//! block is sorted in memory and written to a spill file, then all spill files are merged in a
//! single pass into a staging file that atomically replaces the original. The original file is
//! never modified unless the sort completes, and spill and staging files are removed on every
//! path.
//!
//! # Examples
//! ```
//! use std::path::PathBuf;
//! use line_extsort::sort::{sort_in_place, DEFAULT_BLOCK_SIZE_BYTES};
//!
//! // sort a TSV file by its second field, an integer, then by its first field
//! fn sort_records(path: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let key_fn = |line: &str| -> Result<(i64, String), anyhow::Error> {
//!         let mut fields = line.split('\t');
//!         let name = fields.next().unwrap_or_default().to_string();
//!         let id = fields.next().unwrap_or_default().trim().parse::<i64>()?;
//!         Ok((id, name))
//!     };
//!
//!     // set the directory for spill files. The default is the system temp dir -
//!     // std::env::temp_dir(), however, for large files it is recommended to provide a dedicated
//!     // directory for spill files.
//!     sort_in_place(&path, key_fn, DEFAULT_BLOCK_SIZE_BYTES, Some(tmp))?;
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod block_reader;
pub(crate) mod config;
pub(crate) mod line_record;
pub(crate) mod merger;
pub(crate) mod nofile_limit;
pub(crate) mod sorted_block;
pub(crate) mod spill_cursor;
pub(crate) mod spill_file;

pub mod error;
pub mod key;
pub mod sort;
