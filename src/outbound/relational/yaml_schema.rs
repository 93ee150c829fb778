//! YAML-declared schema relational adapter.
//!
//! The backend is the same PostgreSQL executor as raw mode; the difference
//! is where schema comes from. A declarative table description is loaded
//! from configuration (inline YAML or a file), validated, and materialized
//! as `CREATE TABLE IF NOT EXISTS` statements when the adapter is built.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::config::{BackendDescriptor, BackendKind};
use crate::domain::ports::{
    AdapterLifecycle, BackendUnavailableError, DrainOutcome, ProbeError, Record, RelationalError,
    RelationalStore, SqlText,
};

use super::raw::SqlxExecutor;

/// Failures validating a declared schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The YAML document did not parse.
    #[error("schema declaration is not valid YAML: {message}")]
    Parse { message: String },

    /// A table or column name is not a safe SQL identifier.
    #[error("'{identifier}' is not a valid identifier (lowercase letters, digits, underscores)")]
    InvalidIdentifier { identifier: String },

    /// A column declared a type outside the supported set.
    #[error("column '{column}': unsupported type '{declared}'")]
    UnsupportedType { column: String, declared: String },

    /// A table declared no columns.
    #[error("table '{table}' declares no columns")]
    EmptyTable { table: String },
}

/// Declarative description of the tables an adapter owns.
#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredSchema {
    #[serde(default)]
    tables: Vec<DeclaredTable>,
}

#[derive(Debug, Clone, Deserialize)]
struct DeclaredTable {
    name: String,
    columns: Vec<DeclaredColumn>,
}

#[derive(Debug, Clone, Deserialize)]
struct DeclaredColumn {
    name: String,
    #[serde(rename = "type")]
    column_type: String,
    #[serde(default)]
    primary_key: bool,
    #[serde(default = "default_nullable")]
    nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl DeclaredSchema {
    /// Parse and validate a YAML schema declaration.
    pub fn from_yaml(document: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_yaml::from_str(document).map_err(|e| SchemaError::Parse {
            message: e.to_string(),
        })?;
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for table in &self.tables {
            check_identifier(&table.name)?;
            if table.columns.is_empty() {
                return Err(SchemaError::EmptyTable {
                    table: table.name.clone(),
                });
            }
            for column in &table.columns {
                check_identifier(&column.name)?;
                sql_type(&column.column_type).ok_or_else(|| SchemaError::UnsupportedType {
                    column: column.name.clone(),
                    declared: column.column_type.clone(),
                })?;
            }
        }
        Ok(())
    }

    /// Render one `CREATE TABLE IF NOT EXISTS` statement per declared
    /// table.
    pub fn to_ddl(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|table| {
                let columns: Vec<String> = table
                    .columns
                    .iter()
                    .map(|column| {
                        let mut definition = format!(
                            "{} {}",
                            column.name,
                            sql_type(&column.column_type).unwrap_or_default()
                        );
                        if column.primary_key {
                            definition.push_str(" PRIMARY KEY");
                        } else if !column.nullable {
                            definition.push_str(" NOT NULL");
                        }
                        definition
                    })
                    .collect();
                format!(
                    "CREATE TABLE IF NOT EXISTS {} ({})",
                    table.name,
                    columns.join(", ")
                )
            })
            .collect()
    }

    /// Names of the declared tables, in declaration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Identifiers are restricted the same way schema names are sanitized in
/// operational tooling: lowercase alphanumerics and underscores, not
/// starting with a digit.
fn check_identifier(identifier: &str) -> Result<(), SchemaError> {
    let mut chars = identifier.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

fn sql_type(declared: &str) -> Option<&'static str> {
    let mapped = match declared {
        "serial" => "SERIAL",
        "bigserial" => "BIGSERIAL",
        "smallint" => "SMALLINT",
        "int" | "integer" => "INTEGER",
        "bigint" => "BIGINT",
        "real" => "REAL",
        "double" => "DOUBLE PRECISION",
        "text" => "TEXT",
        "boolean" => "BOOLEAN",
        "timestamptz" => "TIMESTAMPTZ",
        "uuid" => "UUID",
        "jsonb" => "JSONB",
        _ => return None,
    };
    Some(mapped)
}

/// Relational adapter whose schema is declared in configuration.
pub struct YamlSchemaRelationalAdapter {
    executor: SqlxExecutor,
}

impl YamlSchemaRelationalAdapter {
    /// Build the pool and materialize the declared tables.
    ///
    /// The declaration comes from the `schema` parameter (inline YAML) or
    /// the `schema_file` parameter (path to a YAML file).
    pub async fn connect(
        descriptor: &BackendDescriptor,
    ) -> Result<Self, BackendUnavailableError> {
        let document = load_schema_document(descriptor)?;
        let schema = DeclaredSchema::from_yaml(&document)
            .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;

        let executor = SqlxExecutor::connect(descriptor).await?;
        for ddl in schema.to_ddl() {
            let statement = SqlText::new(ddl)
                .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;
            executor
                .write(&statement)
                .await
                .map_err(|e| BackendUnavailableError::new(descriptor, e.to_string()))?;
        }
        info!(
            logical_name = descriptor.logical_name(),
            tables = ?schema.table_names(),
            "declared schema materialized"
        );

        Ok(Self { executor })
    }
}

fn load_schema_document(
    descriptor: &BackendDescriptor,
) -> Result<String, BackendUnavailableError> {
    if let Some(inline) = descriptor.param("schema") {
        return Ok(inline.to_string());
    }
    let path = descriptor
        .param("schema_file")
        .ok_or_else(|| BackendUnavailableError::new(descriptor, "missing 'schema' declaration"))?;
    std::fs::read_to_string(path)
        .map_err(|e| BackendUnavailableError::new(descriptor, format!("cannot read {path}: {e}")))
}

#[async_trait]
impl RelationalStore for YamlSchemaRelationalAdapter {
    async fn read(&self, query: &SqlText) -> Result<Vec<Record>, RelationalError> {
        self.executor.read(query).await
    }

    async fn write(&self, statement: &SqlText) -> Result<u64, RelationalError> {
        self.executor.write(statement).await
    }

    async fn transaction(&self, statements: &[SqlText]) -> Result<(), RelationalError> {
        self.executor.transaction(statements).await
    }
}

#[async_trait]
impl AdapterLifecycle for YamlSchemaRelationalAdapter {
    fn logical_name(&self) -> &str {
        self.executor.logical_name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::RelationalYamlSchema
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        self.executor.probe().await
    }

    async fn close(&self, drain: Duration) -> DrainOutcome {
        self.executor.close(drain).await
    }
}
