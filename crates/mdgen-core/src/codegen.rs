//! C++ source generation for one resolved data type.
//!
//! Every artifact is five fragments joined in a fixed order: provenance,
//! preamble, namespace open, body, namespace close. Only the preamble and
//! the body differ per [`ArtifactKind`]; the other three are shared.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::registry::{DataType, TypeRegistry};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Names and layout of the generated code. Defaults match the game client.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Schema file name quoted in the provenance line.
    pub source_name: String,
    pub indent: String,
    /// Outer C++ namespaces; namespace path segments are nested inside.
    pub namespaces: Vec<String>,
    /// Prefix of every generated class name.
    pub class_prefix: String,
    pub ids_header: String,
    /// Underlying integer type an identifier is read as.
    pub id_value_type: String,
    pub repository_header: String,
    pub repository_base: String,
    /// Header declaring [`instance_base`](Self::instance_base).
    pub instance_header: String,
    /// Class template every repository also derives from, instantiated with
    /// the repository itself (`RegistryEntry<MasterKanjiParamRepository>`).
    ///
    /// The generated code emits no static accessor of its own. The template
    /// must make the repository reachable through a registry object owned by
    /// the application's composition root, keyed by the repository's type
    /// (for example `registry.get<MasterKanjiParamRepository>()`), so that at
    /// most one instance per data type exists per registry. Repositories are
    /// default-constructible and load their records in the constructor.
    pub instance_base: String,
    pub record_source_header: String,
    pub record_source_type: String,
    pub record_key_type: String,
    /// Top-level key of a persisted record file.
    pub record_root_key: String,
    /// Header included by a value class for each base type that needs one.
    pub type_headers: HashMap<String, String>,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            source_name: "masterdata.toml".to_string(),
            indent: "    ".to_string(),
            namespaces: vec!["kanji".to_string(), "md".to_string()],
            class_prefix: "Master".to_string(),
            ids_header: "IDs.hpp".to_string(),
            id_value_type: "int".to_string(),
            repository_header: "MasterDataRepository.hpp".to_string(),
            repository_base: "dx::md::MasterDataRepository".to_string(),
            instance_header: "RepositoryRegistry.hpp".to_string(),
            instance_base: "dx::md::RegistryEntry".to_string(),
            record_source_header: "TomlAsset.hpp".to_string(),
            record_source_type: "dx::toml::TomlAsset".to_string(),
            record_key_type: "dx::toml::TomlKey".to_string(),
            record_root_key: "masterdata".to_string(),
            type_headers: HashMap::new(),
        }
    }
}

impl CodegenOptions {
    /// `MasterKanjiParam`
    pub fn value_class_name(&self, data_type: &DataType) -> String {
        format!("{}{}", self.class_prefix, data_type.name())
    }

    /// `MasterKanjiParamRepository`
    pub fn repository_name(&self, data_type: &DataType) -> String {
        format!("{}{}Repository", self.class_prefix, data_type.name())
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// The three files generated per data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    ValueClass,
    RepositoryDeclaration,
    RepositoryDefinition,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::ValueClass,
        ArtifactKind::RepositoryDeclaration,
        ArtifactKind::RepositoryDefinition,
    ];

    /// Output path relative to the destination root.
    pub fn relative_path(self, data_type: &DataType, options: &CodegenOptions) -> PathBuf {
        let (dir, file) = match self {
            ArtifactKind::ValueClass => (
                "class",
                format!("{}.hpp", options.value_class_name(data_type)),
            ),
            ArtifactKind::RepositoryDeclaration => (
                "repository",
                format!("{}.hpp", options.repository_name(data_type)),
            ),
            ArtifactKind::RepositoryDefinition => (
                "repository",
                format!("{}.cpp", options.repository_name(data_type)),
            ),
        };
        PathBuf::from(dir)
            .join(data_type.namespace().to_dir())
            .join(file)
    }
}

/// One rendered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub text: String,
}

/// Render one artifact.
pub fn generate(data_type: &DataType, kind: ArtifactKind, options: &CodegenOptions) -> String {
    let mut out = provenance(data_type, options);
    out.push_str(&preamble(kind, data_type, options));
    out.push('\n');
    out.push_str(&namespace_open(data_type, options));
    out.push('\n');
    out.push_str(&body(kind, data_type, options));
    out.push('\n');
    out.push_str(&namespace_close(data_type, options));
    out
}

/// Render all three artifacts of a data type. Nothing is written here, so a
/// caller either has all three or none.
pub fn generate_all(data_type: &DataType, options: &CodegenOptions) -> [Artifact; 3] {
    ArtifactKind::ALL.map(|kind| Artifact {
        kind,
        path: kind.relative_path(data_type, options),
        text: generate(data_type, kind, options),
    })
}

/// Render every data type in the registry, in schema order.
#[cfg(not(feature = "parallel"))]
pub fn generate_registry(registry: &TypeRegistry, options: &CodegenOptions) -> Vec<[Artifact; 3]> {
    registry
        .data_types()
        .iter()
        .map(|dt| generate_all(dt, options))
        .collect()
}

/// Render every data type in the registry, in schema order.
#[cfg(feature = "parallel")]
pub fn generate_registry(registry: &TypeRegistry, options: &CodegenOptions) -> Vec<[Artifact; 3]> {
    use rayon::prelude::*;

    registry
        .data_types()
        .par_iter()
        .map(|dt| generate_all(dt, options))
        .collect()
}

// ---------------------------------------------------------------------------
// Shared fragments
// ---------------------------------------------------------------------------

fn provenance(data_type: &DataType, options: &CodegenOptions) -> String {
    let namespace = data_type.namespace();
    if namespace.is_root() {
        format!(
            "// This file is generated from {} ({})\n",
            options.source_name,
            data_type.name()
        )
    } else {
        format!(
            "// This file is generated from {} ({}/{})\n",
            options.source_name,
            namespace,
            data_type.name()
        )
    }
}

fn namespace_names<'a>(data_type: &'a DataType, options: &'a CodegenOptions) -> impl Iterator<Item = &'a String> {
    options
        .namespaces
        .iter()
        .chain(data_type.namespace().segments())
}

fn namespace_open(data_type: &DataType, options: &CodegenOptions) -> String {
    namespace_names(data_type, options)
        .map(|ns| format!("namespace {ns} {{\n"))
        .collect()
}

fn namespace_close(data_type: &DataType, options: &CodegenOptions) -> String {
    namespace_names(data_type, options).map(|_| "}\n").collect()
}

fn include(header: &str) -> String {
    format!("#include \"{header}\"\n")
}

// ---------------------------------------------------------------------------
// Per-kind fragments
// ---------------------------------------------------------------------------

fn preamble(kind: ArtifactKind, data_type: &DataType, options: &CodegenOptions) -> String {
    match kind {
        ArtifactKind::ValueClass => {
            let mut out = String::from("#pragma once\n");
            if data_type.has_id_field() {
                out.push_str(&include(&options.ids_header));
            }
            for base in data_type.includes() {
                if let Some(header) = options.type_headers.get(base) {
                    out.push_str(&include(header));
                }
            }
            out
        }
        ArtifactKind::RepositoryDeclaration => {
            let mut out = String::from("#pragma once\n");
            out.push_str(&include(&options.repository_header));
            out.push_str(&include(&options.instance_header));
            out.push_str(&include(&format!(
                "{}.hpp",
                options.value_class_name(data_type)
            )));
            if data_type.has_id_field() {
                out.push_str(&include(&options.ids_header));
            }
            out
        }
        ArtifactKind::RepositoryDefinition => {
            let mut out = include(&format!("{}.hpp", options.repository_name(data_type)));
            out.push_str(&include(&options.record_source_header));
            out
        }
    }
}

fn body(kind: ArtifactKind, data_type: &DataType, options: &CodegenOptions) -> String {
    match kind {
        ArtifactKind::ValueClass => value_class_body(data_type, options),
        ArtifactKind::RepositoryDeclaration => repository_declaration_body(data_type, options),
        ArtifactKind::RepositoryDefinition => repository_definition_body(data_type, options),
    }
}

fn value_class_body(data_type: &DataType, options: &CodegenOptions) -> String {
    let i = &options.indent;
    let class = options.value_class_name(data_type);

    // One pass feeds accessors, members and constructor together so the
    // three can never disagree on order.
    let mut getters = String::new();
    let mut members = String::new();
    let mut params = Vec::with_capacity(data_type.fields().len());
    let mut inits = Vec::with_capacity(data_type.fields().len());
    for field in data_type.fields() {
        let member = field.member_name();
        getters.push_str(&format!(
            "{i}{} {}() const {{ return {member}; }}\n",
            field.call_type,
            field.accessor_name()
        ));
        members.push_str(&format!("{i}{} {member};\n", field.storage_type));
        params.push(format!("{} {}", field.call_type, field.name));
        inits.push(format!("{i}{i}{member}({})", field.name));
    }

    let mut out = format!("class {class} {{\n");
    out.push_str("public: // public getter\n");
    out.push_str(&getters);
    out.push_str("private: // field\n");
    out.push_str(&members);
    out.push_str("public: // ctor\n");
    out.push_str(&format!("{i}{class}({}) :\n", params.join(", ")));
    out.push_str(&inits.join(",\n"));
    out.push_str(" {}\n");
    out.push_str("};\n");
    out
}

fn repository_declaration_body(data_type: &DataType, options: &CodegenOptions) -> String {
    let i = &options.indent;
    let class = options.value_class_name(data_type);
    let repository = options.repository_name(data_type);
    let key_type = &data_type.primary_key().storage_type;

    let mut out = format!("class {repository} :\n");
    out.push_str(&format!(
        "{i}public {}<{key_type}, {class}>,\n",
        options.repository_base
    ));
    out.push_str(&format!(
        "{i}public {}<{repository}> {{\n",
        options.instance_base
    ));
    out.push_str("protected: // protected function\n");
    out.push_str(&format!("{i}void initialize();\n"));
    out.push_str("public: // ctor\n");
    out.push_str(&format!("{i}{repository}() {{ initialize(); }}\n"));
    out.push_str("};\n");
    out
}

fn repository_definition_body(data_type: &DataType, options: &CodegenOptions) -> String {
    let i = &options.indent;
    let class = options.value_class_name(data_type);
    let repository = options.repository_name(data_type);

    let read = |name: &str, storage: &str, is_id: bool| {
        if is_id {
            format!(
                "{storage}(toml_value[U\"{name}\"].get<{}>())",
                options.id_value_type
            )
        } else {
            format!("toml_value[U\"{name}\"].get<{storage}>()")
        }
    };
    let pk = data_type.primary_key();
    let args: Vec<String> = data_type
        .fields()
        .iter()
        .map(|f| format!("{i}{i}{i}{i}{}", read(&f.name, &f.storage_type, f.is_id)))
        .collect();

    let mut out = format!("void {repository}::initialize() {{\n");
    out.push_str(&format!(
        "{i}const {} toml(U\"{}\");\n",
        options.record_source_type,
        data_type.name()
    ));
    out.push_str(&format!(
        "{i}const {} key(U\"{}\");\n",
        options.record_key_type, options.record_root_key
    ));
    out.push_str(&format!(
        "{i}s3d::TOMLTableView table = toml[key].tableView();\n"
    ));
    out.push_str(&format!(
        "{i}for (const s3d::TOMLTableMember& table_member : table) {{\n"
    ));
    out.push_str(&format!("{i}{i}const auto& toml_value = table_member.value;\n"));
    out.push_str(&format!("{i}{i}m_data.insert(std::make_pair(\n"));
    out.push_str(&format!(
        "{i}{i}{i}{},\n",
        read(&pk.name, &pk.storage_type, pk.is_id)
    ));
    out.push_str(&format!("{i}{i}{i}std::make_unique<{class}>(\n"));
    out.push_str(&args.join(",\n"));
    out.push_str(")));\n");
    out.push_str(&format!("{i}}}\n"));
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ResolverRules;
    use crate::namespace::NamespacePath;

    fn kanji_param() -> DataType {
        DataType::new(
            "KanjiParam",
            NamespacePath::parse("kanji"),
            [
                ("id", "int:ID:PKey"),
                ("character", "string"),
                ("strokes", "int"),
            ],
            &ResolverRules::default(),
        )
        .unwrap()
    }

    fn setting() -> DataType {
        DataType::new(
            "Setting",
            NamespacePath::root(),
            [("key", "string:PKey"), ("value", "int")],
            &ResolverRules::default(),
        )
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // Full artifacts
    // -----------------------------------------------------------------------

    #[test]
    fn value_class_text() {
        let text = generate(&kanji_param(), ArtifactKind::ValueClass, &CodegenOptions::default());
        let expected = "\
// This file is generated from masterdata.toml (kanji/KanjiParam)
#pragma once
#include \"IDs.hpp\"

namespace kanji {
namespace md {
namespace kanji {

class MasterKanjiParam {
public: // public getter
    intID id() const { return m_id; }
    const s3d::String& character() const { return m_character; }
    int strokes() const { return m_strokes; }
private: // field
    intID m_id;
    s3d::String m_character;
    int m_strokes;
public: // ctor
    MasterKanjiParam(intID id, const s3d::String& character, int strokes) :
        m_id(id),
        m_character(character),
        m_strokes(strokes) {}
};

}
}
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn repository_declaration_text() {
        let text = generate(
            &kanji_param(),
            ArtifactKind::RepositoryDeclaration,
            &CodegenOptions::default(),
        );
        let expected = "\
// This file is generated from masterdata.toml (kanji/KanjiParam)
#pragma once
#include \"MasterDataRepository.hpp\"
#include \"RepositoryRegistry.hpp\"
#include \"MasterKanjiParam.hpp\"
#include \"IDs.hpp\"

namespace kanji {
namespace md {
namespace kanji {

class MasterKanjiParamRepository :
    public dx::md::MasterDataRepository<intID, MasterKanjiParam>,
    public dx::md::RegistryEntry<MasterKanjiParamRepository> {
protected: // protected function
    void initialize();
public: // ctor
    MasterKanjiParamRepository() { initialize(); }
};

}
}
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn repository_definition_text() {
        let text = generate(
            &kanji_param(),
            ArtifactKind::RepositoryDefinition,
            &CodegenOptions::default(),
        );
        let expected = "\
// This file is generated from masterdata.toml (kanji/KanjiParam)
#include \"MasterKanjiParamRepository.hpp\"
#include \"TomlAsset.hpp\"

namespace kanji {
namespace md {
namespace kanji {

void MasterKanjiParamRepository::initialize() {
    const dx::toml::TomlAsset toml(U\"KanjiParam\");
    const dx::toml::TomlKey key(U\"masterdata\");
    s3d::TOMLTableView table = toml[key].tableView();
    for (const s3d::TOMLTableMember& table_member : table) {
        const auto& toml_value = table_member.value;
        m_data.insert(std::make_pair(
            intID(toml_value[U\"id\"].get<int>()),
            std::make_unique<MasterKanjiParam>(
                intID(toml_value[U\"id\"].get<int>()),
                toml_value[U\"character\"].get<s3d::String>(),
                toml_value[U\"strokes\"].get<int>())));
    }
}

}
}
}
";
        assert_eq!(text, expected);
    }

    // -----------------------------------------------------------------------
    // Fragments
    // -----------------------------------------------------------------------

    #[test]
    fn root_type_has_no_namespace_segment() {
        let opts = CodegenOptions::default();
        let text = generate(&setting(), ArtifactKind::ValueClass, &opts);
        assert!(text.starts_with("// This file is generated from masterdata.toml (Setting)\n"));
        assert!(text.contains("namespace kanji {\nnamespace md {\n\nclass MasterSetting"));
        assert!(text.ends_with("};\n\n}\n}\n"));
    }

    #[test]
    fn ids_header_only_with_id_fields() {
        let opts = CodegenOptions::default();
        let text = generate(&setting(), ArtifactKind::ValueClass, &opts);
        assert!(!text.contains("IDs.hpp"));
        let text = generate(&setting(), ArtifactKind::RepositoryDeclaration, &opts);
        assert!(!text.contains("IDs.hpp"));
        assert!(text.contains("#include \"MasterSetting.hpp\"\n"));
    }

    #[test]
    fn plain_primary_key_read_as_declared_type() {
        let text = generate(
            &setting(),
            ArtifactKind::RepositoryDefinition,
            &CodegenOptions::default(),
        );
        assert!(text.contains("            toml_value[U\"key\"].get<s3d::String>(),\n"));
        let decl = generate(
            &setting(),
            ArtifactKind::RepositoryDeclaration,
            &CodegenOptions::default(),
        );
        assert!(decl.contains("MasterDataRepository<s3d::String, MasterSetting>"));
    }

    #[test]
    fn type_headers_follow_include_order() {
        let mut opts = CodegenOptions::default();
        opts.type_headers
            .insert("string".to_string(), "Siv3D/String.hpp".to_string());
        let text = generate(&kanji_param(), ArtifactKind::ValueClass, &opts);
        assert!(text.contains("#include \"IDs.hpp\"\n#include \"Siv3D/String.hpp\"\n"));
    }

    #[test]
    fn configured_names_are_used() {
        let opts = CodegenOptions {
            source_name: "schema.toml".to_string(),
            indent: "\t".to_string(),
            namespaces: vec!["game".to_string()],
            class_prefix: "Md".to_string(),
            instance_base: "dx::cmp::Singleton".to_string(),
            ..CodegenOptions::default()
        };
        let text = generate(&kanji_param(), ArtifactKind::RepositoryDeclaration, &opts);
        assert!(text.starts_with("// This file is generated from schema.toml (kanji/KanjiParam)\n"));
        assert!(text.contains("namespace game {\nnamespace kanji {\n"));
        assert!(text.contains("class MdKanjiParamRepository :\n"));
        assert!(text.contains("\tpublic dx::cmp::Singleton<MdKanjiParamRepository> {\n"));
    }

    #[test]
    fn repository_registers_under_its_own_type() {
        let text = generate(
            &setting(),
            ArtifactKind::RepositoryDeclaration,
            &CodegenOptions::default(),
        );
        assert!(text.contains("#include \"RepositoryRegistry.hpp\"\n"));
        assert!(text.contains(
            "    public dx::md::RegistryEntry<MasterSettingRepository> {\n"
        ));
        assert!(!text.contains("static"));
        assert!(text.contains("    MasterSettingRepository() { initialize(); }\n"));
    }

    // -----------------------------------------------------------------------
    // Order and determinism
    // -----------------------------------------------------------------------

    #[test]
    fn accessor_member_and_parameter_order_agree() {
        let dt = DataType::new(
            "Ordered",
            NamespacePath::root(),
            [
                ("zeta", "int"),
                ("alpha", "string"),
                ("mid_value", "float"),
                ("id", "int:PKey"),
            ],
            &ResolverRules::default(),
        )
        .unwrap();
        let text = generate(&dt, ArtifactKind::ValueClass, &CodegenOptions::default());
        let pos = |needle: &str| text.find(needle).unwrap_or_else(|| panic!("missing {needle}"));

        assert!(pos("zeta()") < pos("alpha()"));
        assert!(pos("alpha()") < pos("midValue()"));
        assert!(pos("midValue()") < pos("id()"));
        assert!(pos("int m_zeta;") < pos("s3d::String m_alpha;"));
        assert!(pos("s3d::String m_alpha;") < pos("float m_mid_value;"));
        assert!(text.contains(
            "MasterOrdered(int zeta, const s3d::String& alpha, float mid_value, int id) :"
        ));
    }

    #[test]
    fn regeneration_is_byte_identical() {
        let opts = CodegenOptions::default();
        let first = generate_all(&kanji_param(), &opts);
        let second = generate_all(&kanji_param(), &opts);
        assert_eq!(first, second);
    }

    #[test]
    fn artifact_paths_follow_namespace() {
        let opts = CodegenOptions::default();
        let paths: Vec<PathBuf> = generate_all(&kanji_param(), &opts)
            .into_iter()
            .map(|a| a.path)
            .collect();
        assert_eq!(
            paths,
            [
                PathBuf::from("class/kanji/MasterKanjiParam.hpp"),
                PathBuf::from("repository/kanji/MasterKanjiParamRepository.hpp"),
                PathBuf::from("repository/kanji/MasterKanjiParamRepository.cpp"),
            ]
        );
        let root = ArtifactKind::ValueClass.relative_path(&setting(), &opts);
        assert_eq!(root, PathBuf::from("class/MasterSetting.hpp"));
    }
}
