//! Loading stage
//!
//! A [`LoadingUnit`] reads every transformed file of its input directory and
//! hands the frames to a [`Loader`], which merges them and writes the result
//! through a [`LoadSink`]. Loaders must sort on the natural key after every
//! merge or concatenation (see [`crate::merge`]) so the output does not depend
//! on directory listing order.

use statpipe_common::types::SaveFileType;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::dirs::{StageKind, UnitOptions};
use crate::error::{EtlError, Result};
use crate::frame::Frame;
use crate::io::{fetch_all_files, write_frame};
use crate::metric::{keys, Metric};
use crate::unit::UnitContext;

pub trait Loader: Send + Sync {
    fn name(&self) -> &str;

    /// Merge `dataset` and write the result through `sink`
    fn load(&self, dataset: Vec<Frame>, sink: &mut LoadSink<'_>) -> Result<()>;

    fn default_data_dir(&self) -> Option<PathBuf> {
        None
    }

    fn default_save_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// Output side of a loader: writes frames and records the operations applied
#[derive(Debug)]
pub struct LoadSink<'a> {
    dir: &'a Path,
    file_type: SaveFileType,
    written: Vec<PathBuf>,
    operations: Vec<String>,
}

impl<'a> LoadSink<'a> {
    pub fn new(dir: &'a Path, file_type: SaveFileType) -> Self {
        Self {
            dir,
            file_type,
            written: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Write `frame` as `{save_dir}/{name}.{ext}`
    pub fn write(&mut self, name: &str, frame: &Frame) -> Result<PathBuf> {
        let path = write_frame(self.dir, name, frame, self.file_type)?;
        self.written.push(path.clone());
        Ok(path)
    }

    /// Append an operation tag such as `"merge"` or `"sorting"`
    pub fn record_operation(&mut self, tag: impl Into<String>) {
        self.operations.push(tag.into());
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn operations(&self) -> &[String] {
        &self.operations
    }
}

pub struct LoadingUnit {
    loader: Arc<dyn Loader>,
    context: UnitContext,
}

impl std::fmt::Debug for LoadingUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingUnit")
            .field("name", &self.context.name())
            .field("dirs", self.context.dirs())
            .finish()
    }
}

impl LoadingUnit {
    pub fn new<L>(loader: L, options: &UnitOptions) -> Result<Self>
    where
        L: Loader + 'static,
    {
        Self::from_arc(Arc::new(loader), options)
    }

    pub fn from_arc(loader: Arc<dyn Loader>, options: &UnitOptions) -> Result<Self> {
        let context = UnitContext::new(
            StageKind::Loader,
            loader.name(),
            options,
            loader.default_data_dir(),
            loader.default_save_dir(),
        )?;
        Ok(Self { loader, context })
    }

    pub fn name(&self) -> &str {
        self.context.name()
    }

    pub fn context(&self) -> &UnitContext {
        &self.context
    }

    /// Read, merge and write. Blocks the calling thread.
    pub fn load_data(&self, cancel: &CancellationToken) -> Result<Metric> {
        let outcome = self.run(cancel);
        self.context.conclude(outcome)
    }

    fn run(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(EtlError::Cancelled);
        }

        let data_dir = self.context.data_dir();
        let entries = fetch_all_files(data_dir).map_err(|err| {
            error!(
                unit = %self.name(),
                data_dir = %data_dir.display(),
                error = %err,
                "Failed to read loader input"
            );
            err
        })?;
        self.context.record(keys::NUMBER_OF_FILES_READ, entries.len());

        let mut sink = LoadSink::new(self.context.save_dir(), self.context.save_file_type());
        let outcome = if entries.is_empty() {
            info!(unit = %self.name(), "No input files, nothing to load");
            Ok(())
        } else {
            let dataset = entries.into_iter().map(|entry| entry.frame).collect();
            self.loader.load(dataset, &mut sink)
        };

        self.context
            .record(keys::NUMBER_OF_FILES_WRITTEN, sink.written().len());
        self.context
            .record(keys::OPERATIONS, sink.operations().to_vec());

        outcome?;
        info!(
            unit = %self.name(),
            written = sink.written().len(),
            operations = ?sink.operations(),
            "Loading finished"
        );
        Ok(())
    }
}
