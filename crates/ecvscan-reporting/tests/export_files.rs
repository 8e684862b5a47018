use calamine::{Data, Reader, open_workbook_auto};
use ecvscan_core::{Corpus, Document, PatternSet, Vocabulary, group_by_tag, scan};
use ecvscan_reporting::{ExportFormat, export_workbook, matrix_workbook};

fn workbook() -> ecvscan_reporting::Workbook {
    let vocabulary =
        Vocabulary::from_json_str(r#"{"ozone": ["O3"], "snow cover": []}"#).unwrap();
    let patterns = PatternSet::compile(&vocabulary).unwrap();
    let corpus = Corpus::from_documents(vec![
        Document::inline("wg1_ch2.txt", "Ozone (O3) trends."),
        Document::inline("wg2_ch1.txt", "Snow cover declines."),
        Document::inline("spm.txt", "ozone"),
    ]);
    let outcome = scan(&corpus, &patterns);
    let groups = group_by_tag(corpus.documents(), &["wg1", "wg2"]);
    matrix_workbook(&outcome.matrix, &groups, None)
}

#[test]
fn csv_export_writes_one_file_per_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("reports").join("matrix.csv");
    let written = export_workbook(&workbook(), ExportFormat::Csv, &target).unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["matrix_other.csv", "matrix_wg1.csv", "matrix_wg2.csv"]);

    let wg1 = std::fs::read_to_string(&written[1]).unwrap();
    assert_eq!(wg1, "Term,wg1_ch2\nozone,2\nsnow cover,0\n");
}

#[test]
fn json_export_is_a_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("matrix.json");
    let written = export_workbook(&workbook(), ExportFormat::Json, &target).unwrap();
    assert_eq!(written, vec![target.clone()]);

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(value["wg2"][1]["Term"], "snow cover");
    assert_eq!(value["wg2"][1]["wg2_ch1"], 1);
    assert_eq!(value["other"][0]["spm"], 1);
}

#[test]
fn xlsx_export_has_one_worksheet_per_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("matrix.xlsx");
    let written = export_workbook(&workbook(), ExportFormat::Xlsx, &target).unwrap();
    assert_eq!(written, vec![target.clone()]);

    let mut xlsx = open_workbook_auto(&target).unwrap();
    assert_eq!(xlsx.sheet_names(), vec!["other", "wg1", "wg2"]);

    let wg1 = xlsx.worksheet_range("wg1").unwrap();
    let rows: Vec<Vec<Data>> = wg1.rows().map(|r| r.to_vec()).collect();
    assert_eq!(
        rows[0],
        vec![Data::String("Term".into()), Data::String("wg1_ch2".into())]
    );
    assert_eq!(
        rows[1],
        vec![Data::String("ozone".into()), Data::Float(2.0)]
    );
}
