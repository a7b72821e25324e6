//! Pipeline orchestration
//!
//! A [`Pipeline`] holds ordered lists of extraction, transformation and loading
//! units and runs them phase by phase:
//!
//! - **Extraction**: units run as tokio tasks, at most `extractor_workers` at a time
//! - **Transformation**: one unit at a time on the blocking pool, each with its own
//!   bounded rayon pool
//! - **Loading**: one unit at a time on the blocking pool, in configured order
//!
//! A phase starts only when every unit of the previous phase has finished. A unit
//! that errors or panics is recorded as failed in the [`Report`]; its siblings and
//! the following phases still run. Cancellation is checked before every unit and
//! passed down to the units themselves.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{EtlError, Result};
use crate::extract::ExtractionUnit;
use crate::load::LoadingUnit;
use crate::metric::{Metric, Phase, ProcessMetric, Report};
use crate::progress::phase_bar;
use crate::transform::TransformationUnit;
use crate::unit::{panic_message, UnitContext};

/// Keys accepted by [`Pipeline::add`]
pub const EXTRACTORS_KEY: &str = "extractors";
pub const TRANSFORMERS_KEY: &str = "transformers";
pub const LOADERS_KEY: &str = "loaders";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Extraction units running at the same time
    pub extractor_workers: usize,
    /// Threads per transformation unit, `None` for one per logical CPU
    pub transform_workers: Option<usize>,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extractor_workers: num_cpus::get().max(1),
            transform_workers: None,
            show_progress: false,
        }
    }
}

/// Any unit that can be added to a pipeline
#[derive(Debug, Clone)]
pub enum StageUnit {
    Extraction(Arc<ExtractionUnit>),
    Transformation(Arc<TransformationUnit>),
    Loading(Arc<LoadingUnit>),
}

impl StageUnit {
    pub fn phase(&self) -> Phase {
        match self {
            StageUnit::Extraction(_) => Phase::Extraction,
            StageUnit::Transformation(_) => Phase::Transformation,
            StageUnit::Loading(_) => Phase::Loading,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StageUnit::Extraction(unit) => unit.name(),
            StageUnit::Transformation(unit) => unit.name(),
            StageUnit::Loading(unit) => unit.name(),
        }
    }
}

impl From<ExtractionUnit> for StageUnit {
    fn from(unit: ExtractionUnit) -> Self {
        StageUnit::Extraction(Arc::new(unit))
    }
}

impl From<TransformationUnit> for StageUnit {
    fn from(unit: TransformationUnit) -> Self {
        StageUnit::Transformation(Arc::new(unit))
    }
}

impl From<LoadingUnit> for StageUnit {
    fn from(unit: LoadingUnit) -> Self {
        StageUnit::Loading(Arc::new(unit))
    }
}

#[derive(Debug, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    extractors: Vec<Arc<ExtractionUnit>>,
    transformers: Vec<Arc<TransformationUnit>>,
    loaders: Vec<Arc<LoadingUnit>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Append units under `key` (`extractors`, `transformers` or `loaders`)
    ///
    /// An unknown key, or a unit that does not belong to the key's phase, is a
    /// configuration error and nothing is added.
    pub fn add<I>(&mut self, key: &str, units: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = StageUnit>,
    {
        let phase = match key {
            EXTRACTORS_KEY => Phase::Extraction,
            TRANSFORMERS_KEY => Phase::Transformation,
            LOADERS_KEY => Phase::Loading,
            other => {
                return Err(EtlError::config(format!(
                    "unknown pipeline key '{}', expected one of: {}, {}, {}",
                    other, EXTRACTORS_KEY, TRANSFORMERS_KEY, LOADERS_KEY
                )))
            },
        };

        let units: Vec<StageUnit> = units.into_iter().collect();
        if let Some(unit) = units.iter().find(|unit| unit.phase() != phase) {
            return Err(EtlError::config(format!(
                "unit '{}' belongs to {} and cannot be added under '{}'",
                unit.name(),
                unit.phase(),
                key
            )));
        }

        for unit in units {
            match unit {
                StageUnit::Extraction(unit) => self.extractors.push(unit),
                StageUnit::Transformation(unit) => self.transformers.push(unit),
                StageUnit::Loading(unit) => self.loaders.push(unit),
            }
        }
        Ok(self)
    }

    pub fn add_extractor(&mut self, unit: ExtractionUnit) -> &mut Self {
        self.extractors.push(Arc::new(unit));
        self
    }

    pub fn add_transformer(&mut self, unit: TransformationUnit) -> &mut Self {
        self.transformers.push(Arc::new(unit));
        self
    }

    pub fn add_loader(&mut self, unit: LoadingUnit) -> &mut Self {
        self.loaders.push(Arc::new(unit));
        self
    }

    pub fn extractors(&self) -> &[Arc<ExtractionUnit>] {
        &self.extractors
    }

    pub fn transformers(&self) -> &[Arc<TransformationUnit>] {
        &self.transformers
    }

    pub fn loaders(&self) -> &[Arc<LoadingUnit>] {
        &self.loaders
    }

    /// Remove every configured unit
    pub fn clear(&mut self) {
        self.extractors.clear();
        self.transformers.clear();
        self.loaders.clear();
    }

    /// Tree of the configured units
    ///
    /// ```text
    /// ETL Pipeline
    /// ├── Extractors
    /// │   └── GTI
    /// ├── Transformers
    /// │   └── GTI
    /// └── Loaders
    ///     └── (none)
    /// ```
    pub fn outline(&self) -> String {
        let groups: [(&str, Vec<&str>); 3] = [
            ("Extractors", self.extractors.iter().map(|u| u.name()).collect()),
            ("Transformers", self.transformers.iter().map(|u| u.name()).collect()),
            ("Loaders", self.loaders.iter().map(|u| u.name()).collect()),
        ];

        let mut out = String::from("ETL Pipeline\n");
        for (group_index, (title, names)) in groups.iter().enumerate() {
            let last_group = group_index == groups.len() - 1;
            out.push_str(if last_group { "└── " } else { "├── " });
            out.push_str(title);
            out.push('\n');

            let indent = if last_group { "    " } else { "│   " };
            let names: &[&str] = if names.is_empty() { &["(none)"] } else { names };
            for (index, name) in names.iter().enumerate() {
                out.push_str(indent);
                out.push_str(if index == names.len() - 1 { "└── " } else { "├── " });
                out.push_str(name);
                out.push('\n');
            }
        }
        out
    }

    /// Run all phases and collect one [`ProcessMetric`] per phase
    pub async fn run(&self, cancel: &CancellationToken) -> Report {
        let mut report = Report::new();
        info!(
            run_id = %report.run_id,
            extractors = self.extractors.len(),
            transformers = self.transformers.len(),
            loaders = self.loaders.len(),
            "Starting pipeline"
        );

        report.processes.push(self.run_extraction(cancel).await);
        report.processes.push(self.run_transformation(cancel).await);
        report.processes.push(self.run_loading(cancel).await);
        report.finished_at = Some(Utc::now());

        let failed = report.failed_units().len();
        if failed > 0 {
            warn!(run_id = %report.run_id, failed, "Pipeline finished with failed units");
        } else {
            info!(run_id = %report.run_id, "Pipeline finished");
        }
        report
    }

    async fn run_extraction(&self, cancel: &CancellationToken) -> ProcessMetric {
        let progress = phase_bar(
            Phase::Extraction,
            self.extractors.len(),
            self.config.show_progress,
        );

        let objects: Vec<Metric> = stream::iter(self.extractors.iter().cloned())
            .map(|unit| {
                let cancel = cancel.clone();
                let progress = progress.clone();
                async move {
                    let task = tokio::spawn({
                        let unit = Arc::clone(&unit);
                        async move { unit.extract(&cancel).await }
                    });
                    let metric = settle(unit.context(), Phase::Extraction, task.await);
                    progress.inc(1);
                    metric
                }
            })
            .buffered(self.config.extractor_workers.max(1))
            .collect()
            .await;

        progress.finish_and_clear();
        ProcessMetric {
            process: Phase::Extraction,
            objects,
        }
    }

    async fn run_transformation(&self, cancel: &CancellationToken) -> ProcessMetric {
        let progress = phase_bar(
            Phase::Transformation,
            self.transformers.len(),
            self.config.show_progress,
        );
        let mut process = ProcessMetric::new(Phase::Transformation);

        for unit in &self.transformers {
            let task = {
                let unit = Arc::clone(unit);
                let cancel = cancel.clone();
                let workers = self.config.transform_workers;
                tokio::task::spawn_blocking(move || unit.run_transformation(workers, &cancel))
            };
            process
                .objects
                .push(settle(unit.context(), Phase::Transformation, task.await));
            progress.inc(1);
        }

        progress.finish_and_clear();
        process
    }

    async fn run_loading(&self, cancel: &CancellationToken) -> ProcessMetric {
        let progress = phase_bar(Phase::Loading, self.loaders.len(), self.config.show_progress);
        let mut process = ProcessMetric::new(Phase::Loading);

        for unit in &self.loaders {
            let task = {
                let unit = Arc::clone(unit);
                let cancel = cancel.clone();
                tokio::task::spawn_blocking(move || unit.load_data(&cancel))
            };
            process
                .objects
                .push(settle(unit.context(), Phase::Loading, task.await));
            progress.inc(1);
        }

        progress.finish_and_clear();
        process
    }
}

/// Turn the joined outcome of one unit into its final metric
fn settle(
    context: &UnitContext,
    phase: Phase,
    joined: std::result::Result<Result<Metric>, JoinError>,
) -> Metric {
    match joined {
        Ok(Ok(metric)) => metric,
        Ok(Err(EtlError::Cancelled)) => {
            info!(unit = %context.name(), phase = %phase, "Unit cancelled");
            context.snapshot()
        },
        Ok(Err(err)) => {
            error!(
                unit = %context.name(),
                phase = %phase,
                kind = ?err.kind(),
                error = %err,
                "Unit failed"
            );
            context.snapshot()
        },
        Err(join_err) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic().as_ref());
            error!(unit = %context.name(), phase = %phase, error = %message, "Unit panicked");
            context.fail_with(message)
        },
        Err(join_err) => {
            warn!(unit = %context.name(), phase = %phase, error = %join_err, "Unit task aborted");
            context.cancel()
        },
    }
}
