//! Global Terrorism Index
//!
//! Yearly CSV files published by the Institute for Economics & Peace. Each
//! file holds one row per country with the overall index and its components.

use async_trait::async_trait;
use statpipe_core::extract::{Extractor, Link};
use statpipe_core::frame::Frame;
use statpipe_core::io::DatasetEntry;
use statpipe_core::load::{LoadSink, Loader};
use statpipe_core::merge::{sort_by_key, NATURAL_KEY};
use statpipe_core::transform::Transformer;
use statpipe_core::Result;
use std::path::PathBuf;

pub const GTI_ROOT_URL: &str = "https://www.visionofhumanity.org/wp-content/uploads";

pub const DEFAULT_UPLOAD_YEAR: i32 = 2024;
pub const DEFAULT_START_YEAR: i32 = 2011;
pub const DEFAULT_END_YEAR: i32 = 2023;

const UNIT_NAME: &str = "GTI";

/// The download server rejects requests that do not look like a browser
const BROWSER_HEADERS: [(&str, &str); 8] = [
    (
        "User-Agent",
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    ),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Sec-Fetch-User", "?1"),
];

const INDEX_PREFIX: &str = "index";

const COLUMN_NAMES: [(&str, &str); 7] = [
    ("code", "Country Code"),
    ("name", "Country Name"),
    ("index_over", "overall"),
    ("index_inci", "inci"),
    ("index_fat", "fat"),
    ("index_inj", "inj"),
    ("index_prop", "prop"),
];

const COUNTRY_NAMES: [(&str, &str); 4] = [
    ("Egypt, Arab Rep.", "Egypt"),
    ("Democratic Republic of the Congo", "Congo, Dem. Rep."),
    ("Republic of the Congo", "Congo, Rep."),
    ("Cote d' Ivoire", "Cote d'Ivoire"),
];

#[derive(Debug, Clone)]
pub struct GtiExtractor {
    upload_year: i32,
    start_year: i32,
    end_year: i32,
    root_url: String,
}

impl GtiExtractor {
    pub fn new(upload_year: i32, start_year: i32, end_year: i32) -> Self {
        Self {
            upload_year,
            start_year,
            end_year,
            root_url: GTI_ROOT_URL.to_string(),
        }
    }

    pub fn with_root_url(mut self, root_url: impl Into<String>) -> Self {
        self.root_url = root_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `{root}/{upload}/02/GTI_{year}_{upload % 100}.csv`
    pub fn url_for(&self, year: i32) -> String {
        format!(
            "{}/{}/02/GTI_{}_{:02}.csv",
            self.root_url,
            self.upload_year,
            year,
            self.upload_year % 100
        )
    }
}

impl Default for GtiExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_YEAR, DEFAULT_START_YEAR, DEFAULT_END_YEAR)
    }
}

#[async_trait]
impl Extractor for GtiExtractor {
    fn name(&self) -> &str {
        UNIT_NAME
    }

    async fn links(&self, _client: &reqwest::Client) -> Result<Vec<Link>> {
        Ok((self.start_year..=self.end_year)
            .map(|year| {
                Link::new(self.url_for(year), format!("GTI_{}.csv", year)).headers(BROWSER_HEADERS)
            })
            .collect())
    }
}

/// Keeps the identifying columns and the index components under harmonised names
#[derive(Debug, Clone, Copy, Default)]
pub struct GtiTransformer;

impl Transformer for GtiTransformer {
    fn name(&self) -> &str {
        UNIT_NAME
    }

    fn transform(&self, entry: DatasetEntry) -> Result<DatasetEntry> {
        let mut keep = vec!["name", "code", "year"];
        keep.extend(
            entry
                .frame
                .columns()
                .iter()
                .map(String::as_str)
                .filter(|column| column.starts_with(INDEX_PREFIX)),
        );

        let mut frame = entry.frame.select(&keep)?;
        frame.rename(&COLUMN_NAMES);
        frame.replace_values(NATURAL_KEY[0], &COUNTRY_NAMES)?;
        Ok(DatasetEntry::new(entry.name, frame))
    }
}

/// Stacks every yearly file into one `gti` table
#[derive(Debug, Clone, Copy, Default)]
pub struct GtiLoader;

impl Loader for GtiLoader {
    fn name(&self) -> &str {
        UNIT_NAME
    }

    fn load(&self, dataset: Vec<Frame>, sink: &mut LoadSink<'_>) -> Result<()> {
        let stacked = dataset.len() > 1;
        let mut combined = Frame::concat(dataset);
        if stacked {
            sink.record_operation("concatenation");
        }
        sort_by_key(&mut combined)?;
        sink.record_operation("sorting");
        sink.write("gti", &combined)?;
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
    use statpipe_core::frame::Cell;
    use statpipe_core::EtlError;

    fn yearly(year: i64) -> Frame {
        Frame::from_rows(
            ["code", "name", "year", "index_over", "index_fat", "rank"],
            vec![
                vec!["EGY".into(), "Egypt, Arab Rep.".into(), year.into(), 5.2.into(), 3.1.into(), 20.into()],
                vec!["CIV".into(), "Cote d' Ivoire".into(), year.into(), 1.5.into(), 0.4.into(), 71.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_url_for_year() {
        let extractor = GtiExtractor::default();
        assert_eq!(
            extractor.url_for(2019),
            "https://www.visionofhumanity.org/wp-content/uploads/2024/02/GTI_2019_24.csv"
        );

        let extractor = GtiExtractor::new(2009, 2008, 2008).with_root_url("http://localhost:9/");
        assert_eq!(extractor.url_for(2008), "http://localhost:9/2009/02/GTI_2008_09.csv");
    }

    #[tokio::test]
    async fn test_one_link_per_year() {
        let links = GtiExtractor::default()
            .links(&reqwest::Client::new())
            .await
            .unwrap();

        assert_eq!(links.len(), 13);
        assert_eq!(links[0].name, "GTI_2011.csv");
        assert_eq!(links[12].name, "GTI_2023.csv");
        assert!(links[0].headers.iter().any(|(k, _)| k == "User-Agent"));
    }

    #[test]
    fn test_transform_selects_and_renames() {
        let entry = DatasetEntry::new("gti_2020", yearly(2020));

        let transformed = GtiTransformer.transform(entry).unwrap();

        assert_eq!(transformed.name, "gti_2020");
        assert_eq!(
            transformed.frame.columns(),
            ["Country Name", "Country Code", "year", "overall", "fat"]
        );
        assert_eq!(transformed.frame.cell(0, "Country Name"), Some(&Cell::text("Egypt")));
        assert_eq!(transformed.frame.cell(1, "Country Name"), Some(&Cell::text("Cote d'Ivoire")));
    }

    #[test]
    fn test_transform_requires_identifying_columns() {
        let frame = Frame::from_rows(["name", "index_over"], vec![vec!["Chad".into(), 1.into()]]).unwrap();
        let err = GtiTransformer
            .transform(DatasetEntry::new("gti_2011", frame))
            .unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { ref column, .. } if column == "code"));
    }

    #[test]
    fn test_load_stacks_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<Frame> = [2021, 2020]
            .into_iter()
            .map(|year| GtiTransformer.transform(DatasetEntry::new("gti", yearly(year))).unwrap().frame)
            .collect();

        let mut sink = LoadSink::new(dir.path(), statpipe_common::types::SaveFileType::Csv);
        GtiLoader.load(frames, &mut sink).unwrap();

        assert_eq!(sink.operations(), ["concatenation", "sorting"]);
        let written = statpipe_core::io::read_frame(&sink.written()[0]).unwrap();
        assert_eq!(written.height(), 4);
        assert_eq!(written.cell(0, "Country Name"), Some(&Cell::text("Cote d'Ivoire")));
        assert_eq!(written.cell(0, "year"), Some(&Cell::Int(2020)));
        assert_eq!(written.cell(1, "year"), Some(&Cell::Int(2021)));
    }
}
