use std::fs;

use ecvscan_core::{OTHER_TAG, PatternSet, ScanConfig, Vocabulary, scan_directory};

fn write_vocabulary(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("ecv_aliases.json");
    fs::write(
        &path,
        r#"{"ozone": ["O3"], "carbon dioxide": ["CO2", "CO₂"], "permafrost": []}"#,
    )
    .unwrap();
    path
}

#[test]
fn scans_and_groups_a_corpus_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("txt");
    fs::create_dir(&corpus).unwrap();
    fs::write(corpus.join("wg1_ch1.txt"), "Ozone levels rose. O3 concentration...").unwrap();
    fs::write(corpus.join("wg1_ch10.txt"), "CO2 rose. Carbon dioxide. CO₂.").unwrap();
    fs::write(corpus.join("wg2_ch3.txt"), "No mention.").unwrap();
    fs::write(corpus.join("glossary.txt"), "permafrost").unwrap();
    fs::write(corpus.join("notes.md"), "ozone ozone ozone").unwrap();

    let vocabulary = Vocabulary::load(&write_vocabulary(tmp.path())).unwrap();
    let patterns = PatternSet::compile(&vocabulary).unwrap();
    let config = ScanConfig {
        tags: vec!["wg1".into(), "wg2".into()],
        ..Default::default()
    };

    let result = scan_directory(&corpus, &patterns, &config).unwrap();
    let matrix = &result.outcome.matrix;

    assert_eq!(matrix.documents().len(), 4);
    assert_eq!(matrix.count("ozone", "wg1_ch1"), Some(2));
    assert_eq!(matrix.count("carbon dioxide", "wg1_ch10"), Some(3));
    assert_eq!(matrix.count("ozone", "wg2_ch3"), Some(0));
    assert_eq!(matrix.count("permafrost", "glossary"), Some(1));
    assert_eq!(matrix.count("ozone", "notes"), None);

    let tags: Vec<&str> = result.groups.iter().map(|g| g.tag.as_str()).collect();
    assert_eq!(tags, vec![OTHER_TAG, "wg1", "wg2"]);
    let wg1 = result.groups.iter().find(|g| g.tag == "wg1").unwrap();
    assert_eq!(wg1.documents, vec!["wg1_ch1", "wg1_ch10"]);
}

#[test]
fn single_group_when_grouping_disabled() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), "ozone").unwrap();
    fs::write(tmp.path().join("b.txt"), "O3").unwrap();
    let vocabulary = Vocabulary::from_json_str(r#"{"ozone": ["O3"]}"#).unwrap();
    let patterns = PatternSet::compile(&vocabulary).unwrap();
    let config = ScanConfig {
        group_by_tag: false,
        ..Default::default()
    };

    let result = scan_directory(tmp.path(), &patterns, &config).unwrap();
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].documents, vec!["a", "b"]);
}

#[test]
fn missing_corpus_directory_is_fatal() {
    let patterns = PatternSet::default();
    let err = scan_directory(
        std::path::Path::new("/nonexistent/corpus"),
        &patterns,
        &ScanConfig::default(),
    );
    assert!(err.is_err());
}
