//! Statpipe Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging and error handling for the statpipe workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Logging**: explicit subscriber initialization returning a flushable [`logging::LogGuard`]
//! - **Types**: output format selectors shared by the core and the CLI
//!
//! # Example
//!
//! ```no_run
//! use statpipe_common::types::{ReportFormat, SaveFileType};
//!
//! let save: SaveFileType = "excel".parse().unwrap();
//! assert_eq!(save.extension(), "xlsx");
//! assert_eq!(ReportFormat::Markdown.extension(), "md");
//! ```

pub mod error;
pub mod logging;
pub mod types;

pub use error::{CommonError, Result};
