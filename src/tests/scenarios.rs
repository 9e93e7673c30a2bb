// End-to-end scenarios through the public pipeline

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::config::{AnalysisRequest, RevealConfig};
use crate::extractors::manager::Reveal;
use crate::rules::RuleFilter;
use crate::slicer::SliceRequest;

fn reveal() -> Reveal {
    let mut config = RevealConfig::default();
    config.rules.enable_user_rules = false;
    Reveal::new(config)
}

fn write(dir: &Path, relative: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_nested_function_outline() {
    let temp = TempDir::new().unwrap();
    let path = write(
        temp.path(),
        "nested.py",
        "\
def outer(items):
    def middle(item):
        def inner(value):
            return value * 2
        return inner(item)
    return [middle(i) for i in items]
",
    );

    let analysis = reveal()
        .analyze(&path, &AnalysisRequest::new().with_outline())
        .unwrap();
    let outline = analysis.outline.unwrap();
    assert_eq!(outline.len(), 1);
    assert_eq!(outline[0].element.name, "outer");
    assert_eq!(outline[0].children.len(), 1);
    assert_eq!(outline[0].children[0].element.name, "middle");
    assert_eq!(outline[0].children[0].children[0].element.name, "inner");
}

fn fifty_sections() -> String {
    (1..=50)
        .map(|i| format!("[section{}]\nvalue = {}\n\n", i, i))
        .collect()
}

fn section_names(reveal: &Reveal, path: &Path, slice: SliceRequest) -> Vec<String> {
    let analysis = reveal
        .analyze(path, &AnalysisRequest::new().with_slice(slice))
        .unwrap();
    analysis
        .structure
        .get("sections")
        .iter()
        .map(|s| s.name.clone())
        .collect()
}

#[test]
fn test_head_tail_range_over_config_sections() {
    let temp = TempDir::new().unwrap();
    let path = write(temp.path(), "settings.ini", &fifty_sections());
    let reveal = reveal();

    let names = |range: std::ops::RangeInclusive<u32>| -> Vec<String> {
        range.map(|i| format!("section{}", i)).collect()
    };
    assert_eq!(section_names(&reveal, &path, SliceRequest::head(5)), names(1..=5));
    assert_eq!(section_names(&reveal, &path, SliceRequest::tail(5)), names(46..=50));
    assert_eq!(
        section_names(&reveal, &path, SliceRequest::range(10, 15)),
        names(10..=15)
    );

    let analysis = reveal
        .analyze(&path, &AnalysisRequest::new().with_slice(SliceRequest::head(5)))
        .unwrap();
    let (category, summary) = analysis
        .slices
        .iter()
        .find(|(category, _)| category == "sections")
        .unwrap();
    assert_eq!(category, "sections");
    assert_eq!((summary.total, summary.selected, summary.omitted_after), (50, 5, 45));
}

#[test]
fn test_multibyte_character_before_function_keeps_name_intact() {
    let temp = TempDir::new().unwrap();
    let path = write(
        temp.path(),
        "money.rs",
        "const SIGN: &str = \"€\";fn convert_amount(cents: u64) -> u64 {\n    cents\n}\n",
    );

    let analysis = reveal()
        .analyze(
            &path,
            &AnalysisRequest::new().with_element("functions", "convert_amount"),
        )
        .unwrap();
    let names: Vec<&str> = analysis
        .structure
        .get("functions")
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["convert_amount"]);
    let element = analysis.element.unwrap();
    assert_eq!((element.start_line, element.end_line), (1, 3));
    assert!(element.source_text.starts_with("const SIGN: &str = \"€\";fn convert_amount"));
}

#[test]
fn test_category_filter_drops_security_findings() {
    let temp = TempDir::new().unwrap();
    let path = write(temp.path(), "Dockerfile", "FROM ubuntu:latest\nRUN apt-get update\n");
    let reveal = reveal();

    let unfiltered = reveal
        .analyze(&path, &AnalysisRequest::new().with_detection(RuleFilter::default()))
        .unwrap();
    assert!(unfiltered
        .detections
        .unwrap()
        .findings
        .iter()
        .any(|f| f.rule_id == "S701"));

    let complexity_only = reveal
        .analyze(
            &path,
            &AnalysisRequest::new().with_detection(RuleFilter::categories(&["complexity"])),
        )
        .unwrap();
    let report = complexity_only.detections.unwrap();
    assert!(report.findings.iter().all(|f| f.rule_id != "S701"));
}

#[test]
fn test_nginx_directory_convention_beats_conf_extension() {
    let temp = TempDir::new().unwrap();
    let site = write(
        temp.path(),
        "etc/nginx/sites/app.conf",
        "server {\n    listen 80;\n    server_name app.local;\n}\n",
    );
    let plain = write(temp.path(), "etc/app/app.conf", "[main]\nname = app\n");
    let reveal = reveal();

    let analysis = reveal.analyze(&site, &AnalysisRequest::new()).unwrap();
    assert_eq!(analysis.extractor, "nginx");
    assert_eq!(analysis.structure.get("servers")[0].name, "app.local");

    let analysis = reveal.analyze(&plain, &AnalysisRequest::new()).unwrap();
    assert_eq!(analysis.extractor, "ini");
}

#[test]
fn test_project_config_ignore_applies_to_detection() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "reveal.toml",
        "[rules]\nignore = [\"E501\"]\nenable_user_rules = false\n",
    );
    let long_line = format!("VALUE = \"{}\"\n", "x".repeat(120));
    let path = write(temp.path(), "pkg/settings.py", &long_line);

    let request = AnalysisRequest::new().with_detection(RuleFilter::default());
    let configured = Reveal::discover(&path).unwrap();
    let report = configured.analyze(&path, &request).unwrap().detections.unwrap();
    assert!(report.findings.iter().all(|f| f.rule_id != "E501"));

    // Without the project file the same line is reported
    let report = reveal().analyze(&path, &request).unwrap().detections.unwrap();
    assert!(report.findings.iter().any(|f| f.rule_id == "E501"));
}
