//! Statpipe Core
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Extract, transform and load statistical datasets.
//!
//! A pipeline is three ordered lists of units:
//!
//! - [`extract::ExtractionUnit`] wraps an [`extract::Extractor`] and downloads
//!   its links concurrently
//! - [`transform::TransformationUnit`] wraps a [`transform::Transformer`] and
//!   rewrites every extracted file on a bounded worker pool
//! - [`load::LoadingUnit`] wraps a [`load::Loader`] and merges the transformed
//!   files into one table
//!
//! [`pipeline::Pipeline::run`] executes the phases in order and returns a
//! [`metric::Report`], which [`report`] renders as text, Markdown, JSON, CSV
//! or XML.
//!
//! # Example
//!
//! ```no_run
//! use statpipe_common::types::ReportFormat;
//! use statpipe_core::pipeline::{Pipeline, PipelineConfig};
//! use statpipe_core::{report, CancellationToken};
//!
//! # async fn run() -> statpipe_core::Result<()> {
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! println!("{}", pipeline.outline());
//!
//! let report = pipeline.run(&CancellationToken::new()).await;
//! println!("{}", report::render(&report, ReportFormat::Text)?);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod dirs;
pub mod error;
pub mod extract;
pub mod frame;
pub mod io;
pub mod load;
pub mod merge;
pub mod metric;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod transform;
pub mod unit;

pub use async_trait::async_trait;
pub use dirs::{StageDirs, UnitOptions};
pub use error::{ErrorKind, EtlError, Result};
pub use frame::{Cell, Frame};
pub use io::DatasetEntry;
pub use metric::{Metric, Phase, ProcessMetric, Report};
pub use tokio_util::sync::CancellationToken;
