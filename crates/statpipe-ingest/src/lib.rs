//! Statpipe Ingest
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Concrete data sources for the statpipe ETL core and the `statpipe` binary.
//!
//! # Supported Data Sources
//!
//! - **GTI**: Global Terrorism Index yearly scores ([`gti`])
//! - **UNCTADstat**: UNCTAD bulk statistics ([`unctadstat`])
//!
//! Source loaders write into a shared `loaded` directory under the data root,
//! which [`generic::GenericMergeLoader`] merges into one table.
//!
//! # Example
//!
//! ```no_run
//! use statpipe_core::CancellationToken;
//! use statpipe_ingest::{build_pipeline, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load()?;
//!     let pipeline = build_pipeline(&config)?;
//!     let report = pipeline.run(&CancellationToken::new()).await;
//!     println!("{} failed units", report.failed_units().len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod generic;
pub mod gti;
pub mod sources;
pub mod unctadstat;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use sources::{build_pipeline, Source};

/// Directory, relative to the data root, shared by the source loaders
pub const LOADED_DIR: &str = "loaded";

/// Output directory of the cross-source merge
pub const MERGED_DIR: &str = "merged";
