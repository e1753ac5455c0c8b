use crate::field::{ResolvedField, ResolverRules, check_identifier, resolve};
use crate::id::DataTypeId;
use crate::namespace::NamespacePath;
use std::collections::HashMap;
use tracing::{debug, error};

/// Key holding the type name inside a declaration table.
pub const DATA_TYPE_NAME_KEY: &str = "data_type_name";

/// Key holding the `name = "token"` table inside a declaration table.
pub const FIELD_KEY: &str = "field";

/// How the schema tree is read.
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// Keys starting with this prefix are data type declarations; every
    /// other key is a namespace segment.
    pub declaration_marker: String,
    pub resolver: ResolverRules,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            declaration_marker: "md_".to_string(),
            resolver: ResolverRules::default(),
        }
    }
}

/// A declared data type with its fields resolved.
#[derive(Debug, Clone)]
pub struct DataType {
    name: String,
    namespace: NamespacePath,
    fields: Vec<ResolvedField>,
    primary_key: usize,
    includes: Vec<String>,
}

impl DataType {
    /// Resolve `fields` (in declaration order) and enforce the single
    /// primary key. The type name and every accessor must be usable as C++
    /// names, and no two fields may share an accessor.
    pub fn new<'a, I>(
        name: &str,
        namespace: NamespacePath,
        fields: I,
        rules: &ResolverRules,
    ) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let in_type = |source: SchemaError| SchemaError::InDataType {
            data_type: name.to_string(),
            namespace: namespace.clone(),
            source: Box::new(source),
        };

        check_identifier("data type", name)?;

        let resolved = fields
            .into_iter()
            .map(|(field, token)| resolve(field, token, rules))
            .collect::<Result<Vec<_>, _>>()
            .map_err(in_type)?;

        let mut accessors: HashMap<String, &str> = HashMap::with_capacity(resolved.len());
        for field in &resolved {
            let accessor = field.accessor_name();
            check_identifier(&format!("accessor of field '{}'", field.name), &accessor)
                .map_err(in_type)?;
            if let Some(first) = accessors.insert(accessor.clone(), &field.name) {
                return Err(SchemaError::AccessorCollision {
                    data_type: name.to_string(),
                    namespace,
                    accessor,
                    fields: vec![first.to_string(), field.name.clone()],
                });
            }
        }

        let keys: Vec<usize> = resolved
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_primary_key)
            .map(|(i, _)| i)
            .collect();
        let primary_key = match keys.as_slice() {
            [single] => *single,
            [] => {
                return Err(SchemaError::MissingPrimaryKey {
                    data_type: name.to_string(),
                    namespace,
                });
            }
            _ => {
                return Err(SchemaError::MultiplePrimaryKeys {
                    data_type: name.to_string(),
                    namespace,
                    fields: keys.iter().map(|&i| resolved[i].name.clone()).collect(),
                });
            }
        };

        let mut includes: Vec<String> = Vec::new();
        for field in &resolved {
            if rules.needs_include(&field.base) && !includes.contains(&field.base) {
                includes.push(field.base.clone());
            }
        }

        Ok(Self {
            name: name.to_string(),
            namespace,
            fields: resolved,
            primary_key,
            includes,
        })
    }

    /// Build from a declaration table: `data_type_name` plus a `field` table.
    pub fn from_declaration(
        key: &str,
        table: &toml::Table,
        namespace: &NamespacePath,
        rules: &ResolverRules,
    ) -> Result<Self, SchemaError> {
        let name = table
            .get(DATA_TYPE_NAME_KEY)
            .ok_or_else(|| SchemaError::MissingKey {
                declaration: key.to_string(),
                key: DATA_TYPE_NAME_KEY,
            })?
            .as_str()
            .ok_or_else(|| SchemaError::InvalidValue {
                location: format!("{key}.{DATA_TYPE_NAME_KEY}"),
                expected: "a string",
            })?;

        let field_table = table
            .get(FIELD_KEY)
            .ok_or_else(|| SchemaError::MissingKey {
                declaration: key.to_string(),
                key: FIELD_KEY,
            })?
            .as_table()
            .ok_or_else(|| SchemaError::InvalidValue {
                location: format!("{key}.{FIELD_KEY}"),
                expected: "a table",
            })?;

        let mut fields = Vec::with_capacity(field_table.len());
        for (field, token) in field_table {
            let token = token.as_str().ok_or_else(|| SchemaError::InvalidValue {
                location: format!("{key}.{FIELD_KEY}.{field}"),
                expected: "a type token string",
            })?;
            fields.push((field.as_str(), token));
        }

        Self::new(name, namespace.clone(), fields, rules)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &NamespacePath {
        &self.namespace
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&ResolvedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key(&self) -> &ResolvedField {
        &self.fields[self.primary_key]
    }

    pub fn has_id_field(&self) -> bool {
        self.fields.iter().any(|f| f.is_id)
    }

    /// Base types needing an auxiliary include, first occurrence first.
    pub fn includes(&self) -> &[String] {
        &self.includes
    }
}

/// Collects data types while the schema is walked. Consumed by [`build`](Self::build).
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    data_types: Vec<DataType>,
    index: HashMap<NamespacePath, HashMap<String, DataTypeId>>,
}

impl TypeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data type. Returns its ID.
    pub fn register(&mut self, data_type: DataType) -> Result<DataTypeId, SchemaError> {
        let bucket = self.index.entry(data_type.namespace.clone()).or_default();
        if bucket.contains_key(&data_type.name) {
            return Err(SchemaError::DuplicateDataType {
                data_type: data_type.name,
                namespace: data_type.namespace,
            });
        }
        let id = DataTypeId(self.data_types.len() as u32);
        bucket.insert(data_type.name.clone(), id);
        debug!(
            data_type = %data_type.name,
            namespace = %data_type.namespace,
            fields = data_type.fields.len(),
            "registered data type"
        );
        self.data_types.push(data_type);
        Ok(id)
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            data_types: self.data_types,
            index: self.index,
        }
    }
}

/// Immutable registry of every declared data type, grouped by namespace.
/// Frozen after [`load`](Self::load). Thread-safe to share.
#[derive(Debug)]
pub struct TypeRegistry {
    data_types: Vec<DataType>,
    index: HashMap<NamespacePath, HashMap<String, DataTypeId>>,
}

impl TypeRegistry {
    /// Walk the schema tree (the table under the schema file's root key).
    pub fn load(tree: &toml::Table, options: &SchemaOptions) -> Result<Self, SchemaError> {
        let mut builder = TypeRegistryBuilder::new();
        walk(tree, &NamespacePath::root(), options, &mut builder).inspect_err(|e| {
            error!("schema rejected: {e}");
        })?;
        Ok(builder.build())
    }

    /// Direct lookup of one data type.
    pub fn at(&self, type_name: &str, namespace: &NamespacePath) -> Result<&DataType, LookupError> {
        let bucket = self
            .index
            .get(namespace)
            .ok_or_else(|| LookupError::UnknownNamespace(namespace.clone()))?;
        let id = bucket
            .get(type_name)
            .ok_or_else(|| LookupError::UnknownDataType {
                namespace: namespace.clone(),
                data_type: type_name.to_string(),
            })?;
        Ok(&self.data_types[id.0 as usize])
    }

    pub fn get(&self, id: DataTypeId) -> Option<&DataType> {
        self.data_types.get(id.0 as usize)
    }

    /// All data types in schema declaration order.
    pub fn data_types(&self) -> &[DataType] {
        &self.data_types
    }

    /// Namespace paths that hold at least one data type, sorted.
    pub fn namespaces(&self) -> Vec<&NamespacePath> {
        let mut paths: Vec<_> = self.index.keys().collect();
        paths.sort();
        paths
    }

    /// Number of data types declared directly in `namespace`.
    pub fn count_in(&self, namespace: &NamespacePath) -> usize {
        self.index.get(namespace).map_or(0, HashMap::len)
    }

    pub fn len(&self) -> usize {
        self.data_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_types.is_empty()
    }
}

fn walk(
    table: &toml::Table,
    path: &NamespacePath,
    options: &SchemaOptions,
    builder: &mut TypeRegistryBuilder,
) -> Result<(), SchemaError> {
    for (key, value) in table {
        let Some(child) = value.as_table() else {
            return Err(SchemaError::InvalidValue {
                location: format!("{path}: {key}"),
                expected: "a namespace or declaration table",
            });
        };
        if key.starts_with(options.declaration_marker.as_str()) {
            let data_type = DataType::from_declaration(key, child, path, &options.resolver)?;
            builder.register(data_type)?;
        } else {
            check_identifier(&format!("namespace under {path}"), key)?;
            walk(child, &path.child(key), options, builder)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural problems in the schema. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("malformed type token '{token}' for field '{field}': {reason}")]
    MalformedToken {
        field: String,
        token: String,
        reason: &'static str,
    },
    #[error("field '{field}' has unknown base type '{base}'")]
    UnknownBaseType { field: String, base: String },
    #[error("field '{field}' has unknown attribute '{attribute}'")]
    UnknownAttribute { field: String, attribute: String },
    #[error("data type '{data_type}' in {namespace} has no primary key")]
    MissingPrimaryKey {
        data_type: String,
        namespace: NamespacePath,
    },
    #[error("data type '{data_type}' in {namespace} has multiple primary keys: {fields:?}")]
    MultiplePrimaryKeys {
        data_type: String,
        namespace: NamespacePath,
        fields: Vec<String>,
    },
    #[error("{location}: '{name}' is not a valid identifier")]
    InvalidIdentifier { location: String, name: String },
    #[error("{location}: '{name}' is a reserved word")]
    ReservedWord { location: String, name: String },
    #[error("data type '{data_type}' in {namespace}: fields {fields:?} share accessor '{accessor}'")]
    AccessorCollision {
        data_type: String,
        namespace: NamespacePath,
        accessor: String,
        fields: Vec<String>,
    },
    #[error("data type '{data_type}' declared twice in {namespace}")]
    DuplicateDataType {
        data_type: String,
        namespace: NamespacePath,
    },
    #[error("declaration '{declaration}' is missing '{key}'")]
    MissingKey {
        declaration: String,
        key: &'static str,
    },
    #[error("{location}: expected {expected}")]
    InvalidValue {
        location: String,
        expected: &'static str,
    },
    #[error("in data type '{data_type}' ({namespace}): {source}")]
    InDataType {
        data_type: String,
        namespace: NamespacePath,
        #[source]
        source: Box<SchemaError>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("unknown namespace: {0}")]
    UnknownNamespace(NamespacePath),
    #[error("unknown data type '{data_type}' in {namespace}")]
    UnknownDataType {
        namespace: NamespacePath,
        data_type: String,
    },
}
