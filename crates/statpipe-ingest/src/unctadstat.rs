//! UNCTADstat bulk downloads
//!
//! Every variable is served as a 7-zip archive holding one CSV file. Archives
//! land in the extractor's staging directory and are unpacked into its save
//! directory.

use async_trait::async_trait;
use statpipe_core::archive::extract_7z;
use statpipe_core::extract::{write_download, Download, Extractor, Link};
use statpipe_core::frame::Frame;
use statpipe_core::io::DatasetEntry;
use statpipe_core::load::{LoadSink, Loader};
use statpipe_core::merge::{merge_all, sort_by_key, JoinKind, NATURAL_KEY};
use statpipe_core::transform::Transformer;
use statpipe_core::{Result, StageDirs};
use std::path::PathBuf;
use tracing::info;

pub const UNCTAD_BULK_URL: &str = "https://unctadstat-api.unctad.org/bulkdownload";

/// Productive capacities index, total GDP and total population
pub const DEFAULT_VARIABLES: [&str; 3] = ["US.PCI", "US.GDPTotal", "US.PopTotal"];

const UNIT_NAME: &str = "UNCTADstat";

const REQUEST_HEADERS: [(&str, &str); 8] = [
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("DNT", "1"),
    ("Sec-GPC", "1"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
];

/// Columns that are always kept, in this order
const REQUIRED_COLUMNS: [&str; 2] = ["economy_label", "year"];

/// Code columns duplicated by their `_label` counterparts
const CODE_COLUMNS: [&str; 2] = ["category", "economy"];

const DROPPED_SUFFIXES: [&str; 2] = ["_footnote", "_missing_value"];

const COLUMN_NAMES: [(&str, &str); 2] = [
    ("economy_label", "Country Name"),
    ("category_label", "category"),
];

const COUNTRY_NAMES: [(&str, &str); 4] = [
    ("Congo, Dem. Rep. of the", "Congo, Dem. Rep."),
    ("Congo", "Congo, Rep."),
    ("Côte d'Ivoire", "Cote d'Ivoire"),
    ("Türkiye", "Turkiye"),
];

#[derive(Debug, Clone)]
pub struct UnctadStatExtractor {
    variables: Vec<String>,
    base_url: String,
}

impl UnctadStatExtractor {
    pub fn new<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
            base_url: UNCTAD_BULK_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `US.PCI` is served from `{base}/US.PCI/US_PCI`
    pub fn url_for(&self, variable: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            variable,
            variable.replacen('.', "_", 1)
        )
    }
}

/// Archive file name of a variable: `US.PCI` becomes `US_PCI.7z`
pub fn archive_name(variable: &str) -> String {
    format!("{}.7z", variable.replace('.', "_"))
}

#[async_trait]
impl Extractor for UnctadStatExtractor {
    fn name(&self) -> &str {
        UNIT_NAME
    }

    async fn links(&self, _client: &reqwest::Client) -> Result<Vec<Link>> {
        Ok(self
            .variables
            .iter()
            .map(|variable| {
                Link::new(self.url_for(variable), archive_name(variable))
                    .binary()
                    .headers(REQUEST_HEADERS)
            })
            .collect())
    }

    fn persist(&self, download: &Download, dirs: &StageDirs) -> Result<()> {
        let archive = write_download(&dirs.data_dir, download)?;
        extract_7z(&archive, &dirs.save_dir)?;
        info!(unit = UNIT_NAME, archive = %download.name, path = %dirs.save_dir.display(), "Unpacked download");
        Ok(())
    }
}

fn snake_case(column: &str) -> String {
    column.trim().to_lowercase().replace(' ', "_")
}

fn is_value_column(column: &str) -> bool {
    !REQUIRED_COLUMNS.contains(&column)
        && !CODE_COLUMNS.contains(&column)
        && !DROPPED_SUFFIXES.iter().any(|suffix| column.ends_with(suffix))
}

/// Normalises column names, drops code and footnote columns, sorts on the natural key
#[derive(Debug, Clone, Copy, Default)]
pub struct UnctadStatTransformer;

impl Transformer for UnctadStatTransformer {
    fn name(&self) -> &str {
        UNIT_NAME
    }

    fn transform(&self, entry: DatasetEntry) -> Result<DatasetEntry> {
        let mut source = entry.frame;
        source.rename_with(|column| Some(snake_case(column)));

        let mut keep: Vec<&str> = REQUIRED_COLUMNS.to_vec();
        keep.extend(
            source
                .columns()
                .iter()
                .map(String::as_str)
                .filter(|column| is_value_column(column)),
        );

        let mut frame = source.select(&keep)?;
        frame.rename(&COLUMN_NAMES);
        frame.replace_values(NATURAL_KEY[0], &COUNTRY_NAMES)?;
        sort_by_key(&mut frame)?;
        Ok(DatasetEntry::new(entry.name, frame))
    }
}

/// Left-merges every variable into one `unctadstat` table
#[derive(Debug, Clone, Copy, Default)]
pub struct UnctadStatLoader;

impl Loader for UnctadStatLoader {
    fn name(&self) -> &str {
        UNIT_NAME
    }

    fn load(&self, dataset: Vec<Frame>, sink: &mut LoadSink<'_>) -> Result<()> {
        let merged_inputs = dataset.len() > 1;
        let Some(mut merged) = merge_all(dataset, &NATURAL_KEY, JoinKind::Left)? else {
            return Ok(());
        };
        if merged_inputs {
            sink.record_operation("merge");
        }
        sort_by_key(&mut merged)?;
        sink.record_operation("sorting");
        sink.write("unctadstat", &merged)?;
        Ok(())
    }

    fn default_save_dir(&self) -> Option<PathBuf> {
        Some(PathBuf::from(crate::LOADED_DIR))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use statpipe_common::types::SaveFileType;
    use statpipe_core::extract::{ContentKind, DownloadContent};
    use statpipe_core::frame::Cell;

    fn bulk_frame() -> Frame {
        Frame::from_rows(
            [
                "Year",
                "Economy",
                "Economy Label",
                "Category",
                "Category Label",
                "Index",
                "Index Footnote",
                "Index Missing value",
            ],
            vec![
                vec![2021.into(), "180".into(), "Congo, Dem. Rep. of the".into(), "1".into(), "Total".into(), 18.2.into(), Cell::Empty, Cell::Empty],
                vec![2020.into(), "384".into(), "Côte d'Ivoire".into(), "1".into(), "Total".into(), 22.5.into(), "est.".into(), Cell::Empty],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_links() {
        let extractor = UnctadStatExtractor::new(["US.PCI"]);
        assert_eq!(
            extractor.url_for("US.PCI"),
            "https://unctadstat-api.unctad.org/bulkdownload/US.PCI/US_PCI"
        );
        assert_eq!(archive_name("US.Trade.Merch"), "US_Trade_Merch.7z");
        assert_eq!(
            UnctadStatExtractor::new(["US.A.B"]).url_for("US.A.B"),
            "https://unctadstat-api.unctad.org/bulkdownload/US.A.B/US_A.B"
        );
    }

    #[tokio::test]
    async fn test_links_are_binary() {
        let links = UnctadStatExtractor::new(DEFAULT_VARIABLES)
            .links(&reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(links.len(), 3);
        assert!(links.iter().all(|link| link.content == ContentKind::Binary));
        assert_eq!(links[0].name, "US_PCI.7z");
    }

    #[test]
    fn test_corrupt_archive_is_kept_in_staging() {
        let root = tempfile::tempdir().unwrap();
        let dirs = StageDirs {
            data_dir: root.path().join("staging"),
            save_dir: root.path().join("extracted"),
        };
        let download = Download {
            name: "US_PCI.7z".into(),
            content: DownloadContent::Text("not an archive".into()),
        };

        assert!(UnctadStatExtractor::new(["US.PCI"]).persist(&download, &dirs).is_err());
        assert!(dirs.data_dir.join("US_PCI.7z").is_file());
    }

    #[test]
    fn test_transform_columns() {
        let transformed = UnctadStatTransformer
            .transform(DatasetEntry::new("us_pci", bulk_frame()))
            .unwrap();

        assert_eq!(
            transformed.frame.columns(),
            ["Country Name", "year", "category", "index"]
        );
        // Sorted on the natural key after harmonising country names
        assert_eq!(transformed.frame.cell(0, "Country Name"), Some(&Cell::text("Congo, Dem. Rep.")));
        assert_eq!(transformed.frame.cell(1, "Country Name"), Some(&Cell::text("Cote d'Ivoire")));
    }

    #[test]
    fn test_load_merges_variables() {
        let dir = tempfile::tempdir().unwrap();
        let pci = Frame::from_rows(
            ["Country Name", "year", "pci"],
            vec![
                vec!["Mali".into(), 2020.into(), 20.into()],
                vec!["Chad".into(), 2020.into(), 18.into()],
            ],
        )
        .unwrap();
        let gdp = Frame::from_rows(
            ["Country Name", "year", "gdp"],
            vec![vec!["Chad".into(), 2020.into(), 11.into()]],
        )
        .unwrap();

        let mut sink = LoadSink::new(dir.path(), SaveFileType::Csv);
        UnctadStatLoader.load(vec![pci, gdp], &mut sink).unwrap();

        assert_eq!(sink.operations(), ["merge", "sorting"]);
        assert_eq!(sink.written(), [dir.path().join("unctadstat.csv")]);
    }
}
