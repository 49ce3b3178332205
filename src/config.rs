use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ast::Expression;
use crate::error::{CompileError, CompileResult};
use crate::value::{AnyScalar, FieldType};

static FIELD_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z_0-9]*$").unwrap());
static TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z_]+$").unwrap());

pub fn is_valid_field_name(s: &str) -> bool {
    FIELD_NAME_RE.is_match(s)
}

pub fn is_valid_table_name(s: &str) -> bool {
    TABLE_NAME_RE.is_match(s)
}

#[derive(Debug, Clone, PartialEq, Eq, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    Postgresql,
    SqliteMinimal,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgresql => "postgresql",
            Dialect::SqliteMinimal => "sqlite-minimal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub field: String,
}

/// A field as it appears in the user-facing config, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<Expression>,
    #[serde(default, rename = "foreignKey")]
    pub foreign_key: Option<ForeignKey>,
}

/// A field as it appears in the normalized config: no inline foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTableConfig {
    #[serde(rename = "allowedFields")]
    pub allowed_fields: Vec<RawField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(rename = "allowedFields")]
    pub allowed_fields: Vec<Field>,
}

impl TableConfig {
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.allowed_fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub table: String,
    pub field: String,
    #[serde(rename = "toTable")]
    pub to_table: String,
    #[serde(rename = "toField")]
    pub to_field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub table: String,
    #[serde(rename = "dataField")]
    pub data_field: String,
    #[serde(rename = "tableField")]
    pub table_field: String,
}

/// The config as a library consumer supplies it: tables may carry inline
/// `foreignKey`s on fields and `relationships` may be absent entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConfig {
    pub tables: BTreeMap<String, RawTableConfig>,
    #[serde(default)]
    pub variables: BTreeMap<String, AnyScalar>,
    #[serde(default)]
    pub relationships: Option<Vec<Relationship>>,
    pub dialect: Dialect,
    #[serde(default, rename = "dataTable")]
    pub data_table: Option<DataTable>,
}

/// The internal shape every compiler component consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub tables: BTreeMap<String, TableConfig>,
    pub variables: BTreeMap<String, AnyScalar>,
    pub relationships: Vec<Relationship>,
    pub dialect: Dialect,
    #[serde(default, rename = "dataTable")]
    pub data_table: Option<DataTable>,
}

impl Config {
    pub fn table(&self, name: &str) -> CompileResult<&TableConfig> {
        self.tables
            .get(name)
            .ok_or_else(|| CompileError::TableNotAllowed(name.to_string()))
    }

    /// Finds the relationship connecting `table` and `to_table`, in either
    /// declared direction.
    pub fn find_relationship(&self, table: &str, to_table: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| {
            (r.table == table && r.to_table == to_table) || (r.to_table == table && r.table == to_table)
        })
    }

    pub fn validate_identifiers(&self) -> CompileResult<()> {
        for (table_name, table) in &self.tables {
            if !is_valid_table_name(table_name) {
                return Err(CompileError::InvalidConfig(format!(
                    "table name '{table_name}' does not match the allowed pattern"
                )));
            }
            for field in &table.allowed_fields {
                if !is_valid_field_name(&field.name) {
                    return Err(CompileError::InvalidConfig(format!(
                        "field name '{}.{}' does not match the allowed pattern",
                        table_name, field.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Rewrites a user-facing config (fields carrying inline `foreignKey`) into
/// the internal shape every component consumes: foreign keys are stripped
/// from fields and collected into a flat `relationships` list.
///
/// Idempotent: a config whose `relationships` is already populated (i.e.
/// was produced by a previous call, or authored directly in the normalized
/// shape) is returned with fields stripped of any lingering `foreignKey` but
/// otherwise unchanged, and re-running this function against its own output
/// is a no-op.
pub fn normalize_config(raw: RawConfig) -> CompileResult<Config> {
    if let Some(relationships) = raw.relationships {
        // Already normalized upstream: trust the supplied relationships,
        // just make sure fields carry no foreign_key leftovers.
        let tables = raw
            .tables
            .into_iter()
            .map(|(name, table)| (name, strip_fields(table)))
            .collect();
        return Ok(Config {
            tables,
            variables: raw.variables,
            relationships,
            dialect: raw.dialect,
            data_table: raw.data_table,
        });
    }

    let mut relationships = Vec::new();
    let mut tables = BTreeMap::new();
    for (table_name, table) in raw.tables {
        let mut fields = Vec::with_capacity(table.allowed_fields.len());
        for field in table.allowed_fields {
            if let Some(fk) = field.foreign_key {
                relationships.push(Relationship {
                    table: table_name.clone(),
                    field: field.name.clone(),
                    to_table: fk.table,
                    to_field: fk.field,
                });
            }
            fields.push(Field {
                name: field.name,
                field_type: field.field_type,
                nullable: field.nullable,
                default: field.default,
            });
        }
        tables.insert(table_name, TableConfig { allowed_fields: fields });
    }

    let config = Config {
        tables,
        variables: raw.variables,
        relationships,
        dialect: raw.dialect,
        data_table: raw.data_table,
    };
    config.validate_identifiers()?;
    Ok(config)
}

fn strip_fields(table: RawTableConfig) -> TableConfig {
    TableConfig {
        allowed_fields: table
            .allowed_fields
            .into_iter()
            .map(|f| Field {
                name: f.name,
                field_type: f.field_type,
                nullable: f.nullable,
                default: f.default,
            })
            .collect(),
    }
}
