//! Shared state of a stage unit
//!
//! Extraction, transformation and loading units all wrap one [`UnitContext`]:
//! the unit's name, its resolved directories, its output format and its
//! [`Metric`]. The context is created once, when the unit is constructed.

use statpipe_common::types::SaveFileType;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::dirs::{resolve_stage_dirs, StageDirs, StageKind, UnitOptions};
use crate::error::{EtlError, Result};
use crate::metric::{keys, Metric, MetricValue, UnitStatus};

#[derive(Debug)]
pub struct UnitContext {
    name: String,
    kind: StageKind,
    dirs: StageDirs,
    save_file_type: SaveFileType,
    metric: Mutex<Metric>,
}

impl UnitContext {
    /// Resolve directories and start the unit's metric
    ///
    /// Fails with a configuration error when the save directory is not writable.
    pub fn new(
        kind: StageKind,
        name: impl Into<String>,
        options: &UnitOptions,
        default_data: Option<PathBuf>,
        default_save: Option<PathBuf>,
    ) -> Result<Self> {
        let name = name.into();
        let dirs = resolve_stage_dirs(kind, &name, options, default_data, default_save)?;

        let mut metric = Metric::new(name.clone());
        metric
            .add(keys::DATA_DIRECTORY, dirs.data_dir.as_path())
            .add(keys::SAVE_DIRECTORY, dirs.save_dir.as_path());

        Ok(Self {
            name,
            kind,
            dirs,
            save_file_type: options.save_file_type,
            metric: Mutex::new(metric),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn dirs(&self) -> &StageDirs {
        &self.dirs
    }

    pub fn data_dir(&self) -> &Path {
        &self.dirs.data_dir
    }

    pub fn save_dir(&self) -> &Path {
        &self.dirs.save_dir
    }

    pub fn save_file_type(&self) -> SaveFileType {
        self.save_file_type
    }

    // A panicking unit must not hide the metrics it recorded so far
    fn lock(&self) -> MutexGuard<'_, Metric> {
        self.metric.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, key: &str, value: impl Into<MetricValue>) {
        self.lock().add(key, value);
    }

    /// Copy of the metric as recorded so far
    pub fn snapshot(&self) -> Metric {
        self.lock().clone()
    }

    fn finish(&self, status: UnitStatus) -> Metric {
        let mut metric = self.lock();
        metric.status = status;
        metric.clone()
    }

    pub fn succeed(&self) -> Metric {
        self.finish(UnitStatus::Succeeded)
    }

    pub fn fail(&self, error: &EtlError) -> Metric {
        self.finish(UnitStatus::Failed {
            error: error.to_string(),
        })
    }

    pub fn fail_with(&self, message: impl Into<String>) -> Metric {
        self.finish(UnitStatus::Failed {
            error: message.into(),
        })
    }

    pub fn cancel(&self) -> Metric {
        self.finish(UnitStatus::Cancelled)
    }

    /// Finish the metric from the outcome of a run and hand the outcome back
    pub fn conclude(&self, outcome: Result<()>) -> Result<Metric> {
        match outcome {
            Ok(()) => Ok(self.succeed()),
            Err(EtlError::Cancelled) => {
                self.cancel();
                Err(EtlError::Cancelled)
            },
            Err(err) => {
                self.fail(&err);
                Err(err)
            },
        }
    }
}

/// Text of a caught panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
