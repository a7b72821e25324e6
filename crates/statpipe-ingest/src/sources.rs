//! Available data sources and pipeline assembly

use statpipe_core::extract::{ExtractionUnit, ExtractorOptions};
use statpipe_core::load::LoadingUnit;
use statpipe_core::pipeline::{Pipeline, PipelineConfig};
use statpipe_core::transform::TransformationUnit;
use statpipe_core::UnitOptions;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::generic::GenericMergeLoader;
use crate::gti::{GtiExtractor, GtiLoader, GtiTransformer};
use crate::unctadstat::{UnctadStatExtractor, UnctadStatLoader, UnctadStatTransformer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Gti,
    UnctadStat,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Gti, Source::UnctadStat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Gti => "gti",
            Source::UnctadStat => "unctadstat",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gti" => Ok(Source::Gti),
            "unctadstat" | "unctad" => Ok(Source::UnctadStat),
            other => Err(IngestError::UnknownSource(other.to_string())),
        }
    }
}

/// Parse a comma separated source list, dropping duplicates
pub fn parse_sources(list: &str) -> Result<Vec<Source>> {
    let mut sources = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let source: Source = item.parse()?;
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    Ok(sources)
}

/// Build the pipeline for every configured source
///
/// Each source contributes one extractor, one transformer and one loader. With
/// `merge_sources` set, a [`GenericMergeLoader`] runs after the source loaders.
pub fn build_pipeline(config: &IngestConfig) -> Result<Pipeline> {
    let units = UnitOptions::new()
        .data_root(&config.data_root)
        .save_file_type(config.save_file_type);
    let http = ExtractorOptions::default()
        .request_timeout(Duration::from_secs(config.http_timeout_secs))
        .max_concurrent_requests(config.max_concurrent_requests);

    let mut pipeline = Pipeline::new(PipelineConfig {
        extractor_workers: config.extractor_workers,
        transform_workers: config.transform_workers,
        show_progress: config.show_progress,
    });

    for source in &config.sources {
        debug!(source = %source, "Adding source units");
        match source {
            Source::Gti => {
                let extractor = GtiExtractor::new(
                    config.gti.upload_year,
                    config.gti.start_year,
                    config.gti.end_year,
                );
                pipeline
                    .add_extractor(ExtractionUnit::new(extractor, &units, http.clone())?)
                    .add_transformer(TransformationUnit::new(GtiTransformer, &units)?)
                    .add_loader(LoadingUnit::new(GtiLoader, &units)?);
            },
            Source::UnctadStat => {
                let extractor = UnctadStatExtractor::new(config.unctad_variables.clone());
                pipeline
                    .add_extractor(ExtractionUnit::new(extractor, &units, http.clone())?)
                    .add_transformer(TransformationUnit::new(UnctadStatTransformer, &units)?)
                    .add_loader(LoadingUnit::new(UnctadStatLoader, &units)?);
            },
        }
    }

    if config.merge_sources {
        pipeline.add_loader(LoadingUnit::new(GenericMergeLoader, &units)?);
    }

    Ok(pipeline)
}
