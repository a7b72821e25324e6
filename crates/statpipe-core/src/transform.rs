//! Transformation stage
//!
//! A [`TransformationUnit`] reads every file of its input directory, applies the
//! [`Transformer`] to each entry on a bounded rayon pool and writes one output
//! file per entry. Entries are independent: one failing or panicking entry is
//! recorded under `failed_entries` and the rest carry on. Failing to read the
//! input directory fails the whole unit.

use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dirs::{slug, StageKind, UnitOptions};
use crate::error::{EtlError, Result};
use crate::io::{count_files, fetch_all_files, write_frame, DatasetEntry};
use crate::metric::{keys, Metric};
use crate::unit::{panic_message, UnitContext};

pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    /// Transform one entry; the returned entry is written under its own name
    fn transform(&self, entry: DatasetEntry) -> Result<DatasetEntry>;

    /// Combine all transformed entries into one extra output
    ///
    /// Called once after every entry has been written. `None` skips the merge.
    fn merge(&self, _entries: Vec<DatasetEntry>) -> Result<Option<DatasetEntry>> {
        Ok(None)
    }

    fn default_data_dir(&self) -> Option<PathBuf> {
        None
    }

    fn default_save_dir(&self) -> Option<PathBuf> {
        None
    }
}

pub struct TransformationUnit {
    transformer: Arc<dyn Transformer>,
    context: UnitContext,
}

impl std::fmt::Debug for TransformationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationUnit")
            .field("name", &self.context.name())
            .field("dirs", self.context.dirs())
            .finish()
    }
}

impl TransformationUnit {
    pub fn new<T>(transformer: T, options: &UnitOptions) -> Result<Self>
    where
        T: Transformer + 'static,
    {
        Self::from_arc(Arc::new(transformer), options)
    }

    pub fn from_arc(transformer: Arc<dyn Transformer>, options: &UnitOptions) -> Result<Self> {
        let context = UnitContext::new(
            StageKind::Transformer,
            transformer.name(),
            options,
            transformer.default_data_dir(),
            transformer.default_save_dir(),
        )?;
        Ok(Self {
            transformer,
            context,
        })
    }

    pub fn name(&self) -> &str {
        self.context.name()
    }

    pub fn context(&self) -> &UnitContext {
        &self.context
    }

    /// Transform every input file with up to `workers` threads
    ///
    /// `None` uses one worker per logical CPU. Blocks the calling thread.
    pub fn run_transformation(
        &self,
        workers: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Metric> {
        let outcome = self.run(workers, cancel);
        self.context.conclude(outcome)
    }

    fn run(&self, workers: Option<usize>, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(EtlError::Cancelled);
        }

        let data_dir = self.context.data_dir();
        let entries = fetch_all_files(data_dir).map_err(|err| {
            error!(
                unit = %self.name(),
                data_dir = %data_dir.display(),
                error = %err,
                "Failed to read transformation input"
            );
            err
        })?;
        self.context.record(keys::NUMBER_OF_FILES_READ, entries.len());

        let workers = workers.unwrap_or_else(num_cpus::get).max(1);
        self.context.record(keys::WORKERS, workers);
        info!(unit = %self.name(), files = entries.len(), workers, "Starting transformation");

        let prefix = slug(self.name());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |index| format!("{}-transform-{}", prefix, index))
            .build()
            .map_err(|e| EtlError::WorkerPool(e.to_string()))?;

        let outcomes: Vec<(String, Result<DatasetEntry>)> = pool.install(|| {
            entries
                .into_par_iter()
                .map(|entry| {
                    let name = entry.name.clone();
                    if cancel.is_cancelled() {
                        return (name, Err(EtlError::Cancelled));
                    }
                    let outcome = catch_unwind(AssertUnwindSafe(|| self.transform_one(entry)))
                        .unwrap_or_else(|payload| {
                            Err(EtlError::WorkerPool(panic_message(payload.as_ref())))
                        });
                    (name, outcome)
                })
                .collect()
        });

        let mut transformed = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(entry) => transformed.push(entry),
                Err(EtlError::Cancelled) => failed.push(name),
                Err(err) => {
                    warn!(unit = %self.name(), entry = %name, error = %err, "Entry failed");
                    failed.push(name);
                },
            }
        }
        failed.sort();
        self.context.record(keys::FAILED_ENTRIES, failed.clone());

        if cancel.is_cancelled() {
            return Err(EtlError::Cancelled);
        }

        let written = count_files(self.context.save_dir());
        self.context.record(keys::NUMBER_OF_FILES_WRITTEN, written);

        // Nothing transformed, nothing to merge
        if !transformed.is_empty() {
            transformed.sort_by(|a, b| a.name.cmp(&b.name));
            if let Some(merged) = self.transformer.merge(transformed)? {
                let path = write_frame(
                    self.context.save_dir(),
                    &merged.name,
                    &merged.frame,
                    self.context.save_file_type(),
                )?;
                self.context.record(keys::MERGED_FILE, path.as_path());
            }
        }

        info!(
            unit = %self.name(),
            written,
            failed = failed.len(),
            "Transformation finished"
        );
        Ok(())
    }

    fn transform_one(&self, entry: DatasetEntry) -> Result<DatasetEntry> {
        let transformed = self.transformer.transform(entry)?;
        let path = write_frame(
            self.context.save_dir(),
            &transformed.name,
            &transformed.frame,
            self.context.save_file_type(),
        )?;
        debug!(unit = %self.name(), path = %path.display(), "Wrote transformed entry");
        Ok(transformed)
    }
}
