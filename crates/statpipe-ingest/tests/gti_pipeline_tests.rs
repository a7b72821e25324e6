//! Runs the GTI units end to end against a mocked download server

use statpipe_common::types::SaveFileType;
use statpipe_core::extract::{ExtractionUnit, ExtractorOptions};
use statpipe_core::frame::Cell;
use statpipe_core::io::read_frame;
use statpipe_core::load::LoadingUnit;
use statpipe_core::metric::{keys, UnitStatus};
use statpipe_core::pipeline::{Pipeline, PipelineConfig};
use statpipe_core::transform::TransformationUnit;
use statpipe_core::{CancellationToken, UnitOptions};
use statpipe_ingest::gti::{GtiExtractor, GtiLoader, GtiTransformer};
use tempfile::TempDir;
use wiremock::{
    matchers::{header_exists, method, path},
    Mock, MockServer, ResponseTemplate,
};

const GTI_2019: &str = "\
code,name,year,rank,index_over,index_inci,index_fat,index_inj,index_prop
EGY,\"Egypt, Arab Rep.\",2019,12,5.9,4.1,3.2,2.5,1.1
ML,Mali,2019,8,7.1,6.0,5.5,4.2,0.9
";

const GTI_2020: &str = "\
code,name,year,rank,index_over,index_inci,index_fat,index_inj,index_prop
ML,Mali,2020,7,7.4,6.3,5.8,4.4,1.0
";

#[tokio::test]
async fn test_gti_units_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2024/02/GTI_2019_24.csv"))
        .and(header_exists("Sec-Fetch-Mode"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GTI_2019))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2024/02/GTI_2020_24.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GTI_2020))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let options = UnitOptions::new()
        .data_root(root.path())
        .save_file_type(SaveFileType::Csv);
    let extractor = GtiExtractor::new(2024, 2019, 2021).with_root_url(server.uri());

    let mut pipeline = Pipeline::new(PipelineConfig::default());
    pipeline
        .add_extractor(ExtractionUnit::new(extractor, &options, ExtractorOptions::default()).unwrap())
        .add_transformer(TransformationUnit::new(GtiTransformer, &options).unwrap())
        .add_loader(LoadingUnit::new(GtiLoader, &options).unwrap());

    let report = pipeline.run(&CancellationToken::new()).await;
    assert!(!report.has_failures(), "{:?}", report.failed_units());

    let extraction = &report.processes[0].objects[0];
    assert_eq!(extraction.get_int(keys::NUMBER_OF_LINKS), Some(3));
    assert_eq!(extraction.get_int(keys::NUMBER_OF_FILES_DOWNLOADED), Some(2));
    assert_eq!(
        extraction.get(keys::FAILED_LINKS).and_then(|v| v.as_list()),
        Some(&["GTI_2021.csv".to_string()][..])
    );

    let transformation = &report.processes[1].objects[0];
    assert_eq!(transformation.status, UnitStatus::Succeeded);
    assert_eq!(transformation.get_int(keys::NUMBER_OF_FILES_WRITTEN), Some(2));

    let loading = &report.processes[2].objects[0];
    assert_eq!(
        loading.get(keys::OPERATIONS).and_then(|v| v.as_list()),
        Some(&["concatenation".to_string(), "sorting".to_string()][..])
    );

    let loaded = read_frame(&root.path().join("loaded").join("gti.csv")).unwrap();
    assert_eq!(
        loaded.columns(),
        ["Country Name", "Country Code", "year", "overall", "inci", "fat", "inj", "prop"]
    );
    assert_eq!(loaded.height(), 3);
    assert_eq!(loaded.cell(0, "Country Name"), Some(&Cell::text("Egypt")));
    assert_eq!(loaded.cell(1, "year"), Some(&Cell::Int(2019)));
    assert_eq!(loaded.cell(2, "year"), Some(&Cell::Int(2020)));
}
