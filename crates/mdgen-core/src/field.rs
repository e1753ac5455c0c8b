//! Field type tokens and their resolution into storage and call-site types.
//!
//! A token has the shape `base[:attr]*`, e.g. `string`, `Kanji:ID` or
//! `int:ID:PKey`. Resolution is pure: the same token under the same
//! [`ResolverRules`] always yields the same [`ResolvedField`].

use convert_case::{Case, Casing};
use std::collections::{HashMap, HashSet};

use crate::registry::SchemaError;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// The fixed vocabulary a token is resolved against.
#[derive(Debug, Clone)]
pub struct ResolverRules {
    /// Base types accepted without an identifier tag.
    pub allowed_types: HashSet<String>,
    /// Base types passed by const reference at call sites.
    pub heavy_types: HashSet<String>,
    /// Library-backed base types and the type they are stored as.
    pub substitutions: HashMap<String, String>,
    pub id_tag: String,
    pub primary_key_tag: String,
    /// Appended to the base of an identifier field, `Kanji` -> `KanjiID`.
    pub id_suffix: String,
}

impl Default for ResolverRules {
    fn default() -> Self {
        let allowed = [
            "int", "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64",
            "float", "double", "bool", "string",
        ];
        Self {
            allowed_types: allowed.iter().map(|s| s.to_string()).collect(),
            heavy_types: HashSet::from(["string".to_string()]),
            substitutions: HashMap::from([("string".to_string(), "s3d::String".to_string())]),
            id_tag: "ID".to_string(),
            primary_key_tag: "PKey".to_string(),
            id_suffix: "ID".to_string(),
        }
    }
}

impl ResolverRules {
    /// Whether values of this base type need an auxiliary include in the
    /// generated value class. Library-backed types do, builtins don't.
    pub fn needs_include(&self, base: &str) -> bool {
        self.substitutions.contains_key(base)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// C++ keywords and alternative operator tokens.
const RESERVED_WORDS: &[&str] = &[
    "alignas", "alignof", "and", "and_eq", "asm", "auto", "bitand", "bitor", "bool", "break",
    "case", "catch", "char", "char8_t", "char16_t", "char32_t", "class", "compl", "concept",
    "const", "consteval", "constexpr", "constinit", "const_cast", "continue", "co_await",
    "co_return", "co_yield", "decltype", "default", "delete", "do", "double", "dynamic_cast",
    "else", "enum", "explicit", "export", "extern", "false", "float", "for", "friend", "goto",
    "if", "inline", "int", "long", "mutable", "namespace", "new", "noexcept", "not", "not_eq",
    "nullptr", "operator", "or", "or_eq", "private", "protected", "public", "register",
    "reinterpret_cast", "requires", "return", "short", "signed", "sizeof", "static",
    "static_assert", "static_cast", "struct", "switch", "template", "this", "thread_local",
    "throw", "true", "try", "typedef", "typeid", "typename", "union", "unsigned", "using",
    "virtual", "void", "volatile", "wchar_t", "while", "xor", "xor_eq",
];

/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// Accept `name` only if it can be emitted as a C++ name.
pub(crate) fn check_identifier(location: &str, name: &str) -> Result<(), SchemaError> {
    if !is_identifier(name) {
        return Err(SchemaError::InvalidIdentifier {
            location: location.to_string(),
            name: name.to_string(),
        });
    }
    if is_reserved_word(name) {
        return Err(SchemaError::ReservedWord {
            location: location.to_string(),
            name: name.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A parsed `name = "base[:attr]*"` entry, before type resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeclaration {
    pub name: String,
    pub base: String,
    pub is_id: bool,
    pub is_primary_key: bool,
}

impl FieldDeclaration {
    /// Split a token into its base type and attribute tags.
    pub fn parse(name: &str, token: &str, rules: &ResolverRules) -> Result<Self, SchemaError> {
        let malformed = |reason: &'static str| SchemaError::MalformedToken {
            field: name.to_string(),
            token: token.to_string(),
            reason,
        };

        check_identifier("field", name)?;

        let mut parts = token.split(':');
        let base = parts.next().unwrap_or_default().trim();
        if base.is_empty() {
            return Err(malformed("empty base type"));
        }

        let mut is_id = false;
        let mut is_primary_key = false;
        for attr in parts {
            let attr = attr.trim();
            if attr.is_empty() {
                return Err(malformed("empty attribute"));
            } else if attr == rules.id_tag {
                is_id = true;
            } else if attr == rules.primary_key_tag {
                if is_primary_key {
                    return Err(malformed("primary-key tag repeated"));
                }
                is_primary_key = true;
            } else {
                return Err(SchemaError::UnknownAttribute {
                    field: name.to_string(),
                    attribute: attr.to_string(),
                });
            }
        }

        if !is_id && !rules.allowed_types.contains(base) {
            return Err(SchemaError::UnknownBaseType {
                field: name.to_string(),
                base: base.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            base: base.to_string(),
            is_id,
            is_primary_key,
        })
    }
}

// ---------------------------------------------------------------------------
// Resolved fields
// ---------------------------------------------------------------------------

/// A field with its storage and call-site representations fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    pub name: String,
    pub base: String,
    /// Type of the private member in the value class.
    pub storage_type: String,
    /// Type used for the accessor return and constructor parameter.
    pub call_type: String,
    pub is_id: bool,
    pub is_primary_key: bool,
}

impl ResolvedField {
    pub fn from_declaration(decl: FieldDeclaration, rules: &ResolverRules) -> Self {
        let storage_type = if decl.is_id {
            format!("{}{}", decl.base, rules.id_suffix)
        } else {
            rules
                .substitutions
                .get(&decl.base)
                .cloned()
                .unwrap_or_else(|| decl.base.clone())
        };
        let call_type = if rules.heavy_types.contains(&decl.base) {
            format!("const {storage_type}&")
        } else {
            storage_type.clone()
        };

        Self {
            name: decl.name,
            base: decl.base,
            storage_type,
            call_type,
            is_id: decl.is_id,
            is_primary_key: decl.is_primary_key,
        }
    }

    /// Accessor name: `stroke_count` -> `strokeCount`.
    pub fn accessor_name(&self) -> String {
        self.name.from_case(Case::Snake).to_case(Case::Camel)
    }

    /// Private member name in the value class.
    pub fn member_name(&self) -> String {
        format!("m_{}", self.name)
    }

    pub fn by_reference(&self) -> bool {
        self.call_type != self.storage_type
    }
}

/// Resolve one `name = token` entry.
pub fn resolve(name: &str, token: &str, rules: &ResolverRules) -> Result<ResolvedField, SchemaError> {
    let decl = FieldDeclaration::parse(name, token, rules)?;
    Ok(ResolvedField::from_declaration(decl, rules))
}
