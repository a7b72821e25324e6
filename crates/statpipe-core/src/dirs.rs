//! Input/output directory resolution for stage units
//!
//! Each unit owns exactly one [`StageDirs`], resolved once when the unit is
//! constructed. Resolution order for each directory:
//!
//! 1. the path given in [`UnitOptions`]
//! 2. the unit's own default, relative to the data root
//! 3. a convention derived from the unit name:
//!
//! | Unit | data_dir | save_dir |
//! |---|---|---|
//! | extractor | `{root}/{name}/staging` | `{root}/{name}/extracted` |
//! | transformer | `{root}/{name}/extracted` | `{root}/{name}/transformed` |
//! | loader | `{root}/{name}/transformed` | `{root}/{name}/loaded` |
//!
//! The save directory is created and probed for writability during resolution,
//! so a misconfigured output location fails before any phase runs.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use statpipe_common::types::SaveFileType;
use tracing::debug;

use crate::error::{EtlError, Result};

/// Root used when a unit is not given one
pub const DEFAULT_DATA_ROOT: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Extractor,
    Transformer,
    Loader,
}

impl StageKind {
    /// Conventional `(data, save)` sub-directory names
    fn conventional_dirs(self) -> (&'static str, &'static str) {
        match self {
            StageKind::Extractor => ("staging", "extracted"),
            StageKind::Transformer => ("extracted", "transformed"),
            StageKind::Loader => ("transformed", "loaded"),
        }
    }
}

/// Per-unit directory and output settings
#[derive(Debug, Clone, Default)]
pub struct UnitOptions {
    pub data_root: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub save_dir: Option<PathBuf>,
    pub save_file_type: SaveFileType,
}

impl UnitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = Some(root.into());
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    pub fn save_file_type(mut self, save_file_type: SaveFileType) -> Self {
        self.save_file_type = save_file_type;
        self
    }

    fn root(&self) -> PathBuf {
        self.data_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT))
    }
}

/// Resolved input and output directories of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDirs {
    pub data_dir: PathBuf,
    pub save_dir: PathBuf,
}

/// Lower-case a unit name into a directory component
pub fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    let trimmed = slug.trim_end_matches('_');
    if trimmed.is_empty() {
        "unit".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Resolve and validate the directories of one unit
///
/// `default_data` and `default_save` are the unit's own defaults; relative
/// paths are joined onto the data root.
pub fn resolve_stage_dirs(
    kind: StageKind,
    name: &str,
    options: &UnitOptions,
    default_data: Option<PathBuf>,
    default_save: Option<PathBuf>,
) -> Result<StageDirs> {
    let root = options.root();
    let (conventional_data, conventional_save) = kind.conventional_dirs();
    let unit_dir = root.join(slug(name));

    let data_dir = options
        .data_dir
        .clone()
        .or_else(|| default_data.map(|dir| root.join(dir)))
        .unwrap_or_else(|| unit_dir.join(conventional_data));

    let save_dir = options
        .save_dir
        .clone()
        .or_else(|| default_save.map(|dir| root.join(dir)))
        .unwrap_or_else(|| unit_dir.join(conventional_save));

    ensure_writable(&save_dir)?;

    debug!(
        unit = %name,
        data_dir = %data_dir.display(),
        save_dir = %save_dir.display(),
        "Resolved stage directories"
    );

    Ok(StageDirs { data_dir, save_dir })
}

/// Create `dir` if needed and prove a file can be written in it
pub fn ensure_writable(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        EtlError::config(format!(
            "save directory {} cannot be created: {}",
            dir.display(),
            e
        ))
    })?;

    let probe = dir.join(format!(".statpipe-probe-{}", uuid::Uuid::new_v4()));
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .map_err(|e| {
            EtlError::config(format!(
                "save directory {} is not writable: {}",
                dir.display(),
                e
            ))
        })?;
    std::fs::remove_file(&probe).map_err(|e| {
        EtlError::config(format!(
            "save directory {} is not writable: {}",
            dir.display(),
            e
        ))
    })?;

    Ok(())
}
