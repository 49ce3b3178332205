use crate::config::{Config, Relationship};
use crate::dialect::emit_cast;
use crate::error::{CompileError, CompileResult};

use super::emit::emit_field_column;
use crate::field_path::resolve_field_path;

/// §4.9 — emits a `LEFT JOIN ... ON ...` clause for `(table, toTable)`
/// joined by `relationship`, casting both sides to their resolved SQL
/// types.
pub fn emit_join(config: &Config, table: &str, to_table: &str, relationship: &Relationship) -> CompileResult<String> {
    let (left_table, left_field, right_table, right_field) =
        if relationship.table == table && relationship.to_table == to_table {
            (&relationship.table, &relationship.field, &relationship.to_table, &relationship.to_field)
        } else if relationship.to_table == table && relationship.table == to_table {
            (&relationship.to_table, &relationship.to_field, &relationship.table, &relationship.field)
        } else {
            return Err(CompileError::InvalidConfig(format!(
                "relationship does not connect '{table}' and '{to_table}'"
            )));
        };

    let left_resolved = resolve_field_path(&format!("{left_table}.{left_field}"), left_table, config)?;
    let right_resolved = resolve_field_path(&format!("{right_table}.{right_field}"), right_table, config)?;

    let left_column = emit_field_column(&left_resolved, config);
    let right_column = emit_field_column(&right_resolved, config);

    let left_cast = emit_cast(config.dialect, &left_column, left_resolved.field_config.field_type);
    let right_cast = emit_cast(config.dialect, &right_column, right_resolved.field_config.field_type);

    let to_table_sql = match &config.data_table {
        Some(dt) => format!("{} AS \"{}\"", dt.table, to_table),
        None => format!("\"{to_table}\""),
    };

    Ok(format!("LEFT JOIN {to_table_sql} ON {left_cast} = {right_cast}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{normalize_config, Dialect, RawConfig, RawField, RawTableConfig};
    use crate::value::FieldType;
    use std::collections::BTreeMap;

    fn config() -> Config {
        let mut tables = BTreeMap::new();
        tables.insert(
            "posts".to_string(),
            RawTableConfig {
                allowed_fields: vec![RawField {
                    name: "author_id".to_string(),
                    field_type: FieldType::Number,
                    nullable: false,
                    default: None,
                    foreign_key: None,
                }],
            },
        );
        tables.insert(
            "users".to_string(),
            RawTableConfig {
                allowed_fields: vec![RawField {
                    name: "id".to_string(),
                    field_type: FieldType::Number,
                    nullable: false,
                    default: None,
                    foreign_key: None,
                }],
            },
        );
        normalize_config(RawConfig {
            tables,
            variables: BTreeMap::new(),
            relationships: Some(vec![Relationship {
                table: "posts".to_string(),
                field: "author_id".to_string(),
                to_table: "users".to_string(),
                to_field: "id".to_string(),
            }]),
            dialect: Dialect::Postgresql,
            data_table: None,
        })
        .unwrap()
    }

    #[test]
    fn emits_left_join_with_casts() {
        let cfg = config();
        let sql = emit_join(&cfg, "posts", "users", &cfg.relationships[0]).unwrap();
        assert_eq!(
            sql,
            "LEFT JOIN \"users\" ON (posts.author_id)::FLOAT = (users.id)::FLOAT"
        );
    }
}
