//! Cross-source merge of loaded tables

use statpipe_core::frame::Frame;
use statpipe_core::load::{LoadSink, Loader};
use statpipe_core::merge::{merge_all, sort_by_key, JoinKind, NATURAL_KEY};
use statpipe_core::Result;
use std::path::PathBuf;

/// Outer-merges every loaded table on the natural key into `merged`
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericMergeLoader;

impl Loader for GenericMergeLoader {
    fn name(&self) -> &str {
        "Merged"
    }

    fn load(&self, dataset: Vec<Frame>, sink: &mut LoadSink<'_>) -> Result<()> {
        let merged_inputs = dataset.len() > 1;
        let Some(mut merged) = merge_all(dataset, &NATURAL_KEY, JoinKind::Outer)? else {
            return Ok(());
        };
        if merged_inputs {
            sink.record_operation("merge");
        }
        sort_by_key(&mut merged)?;
        sink.record_operation("sorting");
        sink.write("merged", &merged)?;
        Ok(())
    }

    fn default_data_dir(&self) -> Option<PathBuf> {
        Some(PathBuf::from(crate::LOADED_DIR))
    }

    fn default_save_dir(&self) -> Option<PathBuf> {
        Some(PathBuf::from(crate::MERGED_DIR))
    }
}
