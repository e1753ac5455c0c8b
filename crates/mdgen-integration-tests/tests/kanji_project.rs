//! Integration test: a small kanji-game project on disk.
//!
//! Writes `mdgen.toml`, a schema with a root type and two nested
//! namespaces, an id registry and authored records into a temp dir, then
//! drives the generate and validate pipelines the way the command line
//! does.

use std::fs;
use std::path::{Path, PathBuf};

use mdgen_core::registry::SchemaError;
use mdgen_core::validation::DiscrepancyKind;
use mdgen_data::config::Config;
use mdgen_data::pipeline::{self, PipelineError};
use mdgen_data::DataLoadError;

const CONFIG: &str = r#"
[path]
root = "assets"
output = "generated"
"#;

const SCHEMA: &str = r#"
[masterdata.md_Setting]
data_type_name = "Setting"
field = { key = "string:PKey", value = "int" }

[masterdata.kanji.md_KanjiParam]
data_type_name = "KanjiParam"
[masterdata.kanji.md_KanjiParam.field]
id = "Kanji:ID:PKey"
character = "string"
strokes = "int"
radical = "Radical:ID"

[masterdata.kanji.radical.md_Radical]
data_type_name = "Radical"
[masterdata.kanji.radical.md_Radical.field]
id = "Radical:ID:PKey"
name = "string"
"#;

const IDS: &str = r#"
[id.kanji]
name = "Kanji"
begin = 0
end = 9999

[id.radical]
name = "Radical"
begin = 10000
end = 10299
"#;

struct Project {
    dir: PathBuf,
    config: Config,
}

impl Project {
    fn new(suffix: &str, schema: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "mdgen_integration_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        let assets = dir.join("assets");
        fs::create_dir_all(assets.join("schema/master")).unwrap();
        fs::write(dir.join("mdgen.toml"), CONFIG).unwrap();
        fs::write(assets.join("schema/master/masterdata.toml"), schema).unwrap();
        fs::write(assets.join("schema/master/id.toml"), IDS).unwrap();
        let config = Config::load(&dir.join("mdgen.toml")).unwrap();
        Self { dir, config }
    }

    fn write_records(&self, relative: &str, text: &str) {
        let path = self.config.records_dir().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn output(&self, relative: &str) -> String {
        fs::read_to_string(self.config.output_dir().join(relative)).unwrap()
    }

    fn output_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_files(&self.config.output_dir(), &self.config.output_dir(), &mut files);
        files.sort();
        files
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else {
            out.push(path.strip_prefix(root).unwrap().to_path_buf());
        }
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

#[test]
fn generate_lays_out_every_namespace() {
    let project = Project::new("layout", SCHEMA);
    let summary = pipeline::generate(&project.config).unwrap();
    assert_eq!(summary.data_types, 3);
    assert_eq!(summary.files.len(), 9);

    let expected: Vec<PathBuf> = [
        "class/MasterSetting.hpp",
        "class/kanji/MasterKanjiParam.hpp",
        "class/kanji/radical/MasterRadical.hpp",
        "repository/MasterSettingRepository.cpp",
        "repository/MasterSettingRepository.hpp",
        "repository/kanji/MasterKanjiParamRepository.cpp",
        "repository/kanji/MasterKanjiParamRepository.hpp",
        "repository/kanji/radical/MasterRadicalRepository.cpp",
        "repository/kanji/radical/MasterRadicalRepository.hpp",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    assert_eq!(project.output_files(), expected);
}

#[test]
fn generated_value_class_follows_declaration() {
    let project = Project::new("value_class", SCHEMA);
    pipeline::generate(&project.config).unwrap();

    let text = project.output("class/kanji/MasterKanjiParam.hpp");
    assert!(text.starts_with("// This file is generated from masterdata.toml (kanji/KanjiParam)\n"));
    assert!(text.contains(
        "    MasterKanjiParam(KanjiID id, const s3d::String& character, int strokes, RadicalID radical) :\n"
    ));
    let id = text.find("KanjiID id() const").unwrap();
    let character = text.find("const s3d::String& character() const").unwrap();
    let strokes = text.find("int strokes() const").unwrap();
    let radical = text.find("RadicalID radical() const").unwrap();
    assert!(id < character && character < strokes && strokes < radical);
}

#[test]
fn nested_namespace_wraps_repository() {
    let project = Project::new("nested", SCHEMA);
    pipeline::generate(&project.config).unwrap();

    let text = project.output("repository/kanji/radical/MasterRadicalRepository.hpp");
    assert!(text.contains("namespace kanji {\nnamespace md {\nnamespace kanji {\nnamespace radical {\n"));
    assert!(text.contains("    public dx::md::MasterDataRepository<RadicalID, MasterRadical>,\n"));
    assert!(text.ends_with("};\n\n}\n}\n}\n}\n"));

    let root = project.output("repository/MasterSettingRepository.cpp");
    assert!(root.starts_with("// This file is generated from masterdata.toml (Setting)\n"));
    assert!(root.contains("            toml_value[U\"key\"].get<s3d::String>(),\n"));
}

#[test]
fn regeneration_is_byte_identical() {
    let project = Project::new("regen", SCHEMA);
    let first = pipeline::generate(&project.config).unwrap();
    let before: Vec<String> = first.files.iter().map(|f| project.output(&f.to_string_lossy())).collect();

    let second = pipeline::generate(&project.config).unwrap();
    let after: Vec<String> = second.files.iter().map(|f| project.output(&f.to_string_lossy())).collect();

    assert_eq!(first.files, second.files);
    assert_eq!(before, after);
}

#[test]
fn stale_output_is_wiped() {
    let project = Project::new("stale", SCHEMA);
    let stale = project.config.output_dir().join("class/removed/MasterGone.hpp");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "// left over").unwrap();

    pipeline::generate(&project.config).unwrap();
    assert!(!stale.exists());
    assert!(!project.config.output_dir().join("class/removed").exists());
    assert_eq!(project.output_files().len(), 9);
}

#[test]
fn failing_schema_writes_nothing() {
    let broken = SCHEMA.replace("strokes = \"int\"", "strokes = \"int:PKey\"");
    let project = Project::new("broken", &broken);

    let err = pipeline::generate(&project.config).unwrap_err();
    let msg = err.to_string();
    assert!(matches!(err, PipelineError::Schema { .. }));
    assert!(msg.contains("KanjiParam"), "got: {msg}");
    assert!(!project.config.output_dir().exists());
}

#[test]
fn unknown_base_type_is_fatal() {
    let broken = SCHEMA.replace("name = \"string\"", "name = \"text\"");
    let project = Project::new("unknown_base", &broken);

    let err = pipeline::generate(&project.config).unwrap_err();
    let chain = format!("{err} / {:?}", err);
    assert!(chain.contains("text"), "got: {chain}");
}

#[test]
fn parent_dir_namespace_writes_nothing() {
    let escaping = format!(
        "{SCHEMA}\n[masterdata.\"..\".\"..\".\"..\".md_Escape]\ndata_type_name = \"Escape\"\nfield = {{ id = \"int:PKey\" }}\n"
    );
    let project = Project::new("parent_dir", &escaping);

    let err = pipeline::generate(&project.config).unwrap_err();
    assert!(
        matches!(err, PipelineError::Schema { source: SchemaError::InvalidIdentifier { .. }, .. }),
        "got: {err:?}"
    );
    assert!(!project.config.output_dir().exists());
    assert!(!project.dir.join("MasterEscape.hpp").exists());
    assert!(!project.dir.join("assets/MasterEscape.hpp").exists());
}

#[test]
fn output_dir_over_inputs_is_refused() {
    let mut project = Project::new("overlap", SCHEMA);
    project.config.path.output = PathBuf::from(".");

    let err = pipeline::generate(&project.config).unwrap_err();
    assert!(matches!(err, PipelineError::Load(DataLoadError::Config { .. })));
    assert!(project.config.schema_path().is_file());
    assert!(project.config.id_registry_path().is_file());
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn clean_records_validate() {
    let project = Project::new("validate_clean", SCHEMA);
    project.write_records("Setting.toml", "[masterdata.volume]\nkey = \"volume\"\nvalue = 3\n");
    project.write_records(
        "kanji/KanjiParam.toml",
        r#"
[masterdata.yama]
id = 0
character = "山"
strokes = 3
radical = 10001
"#,
    );
    project.write_records(
        "kanji/radical/Radical.json",
        r#"{"masterdata": {"yamahen": {"id": 10001, "name": "yama"}}}"#,
    );

    let report = pipeline::validate(&project.config).unwrap();
    assert!(report.is_clean(), "{:?}", report.discrepancies);
    assert_eq!(report.buckets.len(), 3);
    assert_eq!(report.record_count(), 3);
}

#[test]
fn validate_collects_every_discrepancy() {
    let project = Project::new("validate_dirty", SCHEMA);
    project.write_records(
        "kanji/KanjiParam.toml",
        r#"
[masterdata.yama]
id = 0
character = "山"
radical = 10001

[masterdata.kawa]
id = 1
character = "川"
strokes = 3
radical = 10002
meaning = "river"

[masterdata.ki]
id = 2
character = "木"
strokes = 4
radical = 10003
"#,
    );

    let report = pipeline::validate(&project.config).unwrap();
    let found: Vec<(&str, &str, DiscrepancyKind)> = report
        .discrepancies
        .iter()
        .map(|d| (d.record_key.as_str(), d.field.as_str(), d.kind))
        .collect();
    assert_eq!(
        found,
        [
            ("yama", "strokes", DiscrepancyKind::Missing),
            ("kawa", "meaning", DiscrepancyKind::Unnecessary),
        ]
    );
    assert_eq!(report.buckets[0].offending_records, ["yama", "kawa"]);
    assert_eq!(report.buckets[0].record_count, 3);
}

#[test]
fn validate_does_not_write_output() {
    let project = Project::new("validate_readonly", SCHEMA);
    project.write_records("Setting.toml", "[masterdata]\n");
    pipeline::validate(&project.config).unwrap();
    assert!(!project.config.output_dir().exists());
}

#[test]
fn validate_without_records_dir_fails() {
    let project = Project::new("validate_no_records", SCHEMA);
    let err = pipeline::validate(&project.config).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Load(DataLoadError::MissingDirectory { .. })
    ));
}

// ---------------------------------------------------------------------------
// id registry
// ---------------------------------------------------------------------------

#[test]
fn id_registry_answers_both_queries() {
    let project = Project::new("ids", SCHEMA);
    let ids = mdgen_data::loader::load_id_registry(&project.config.id_registry_path()).unwrap();
    assert_eq!(ids.search_by_value(10_100).unwrap().name, "Radical");
    let kanji = ids.search_by_name("Kanji").unwrap();
    assert_eq!((kanji.begin, kanji.end), (0, 9_999));
    assert!(ids.search_by_value(50_000).is_none());
}
