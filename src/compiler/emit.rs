use crate::config::Config;
use crate::dialect::emit_cast;
use crate::field_path::ResolvedField;
use crate::value::{ExpressionType, FieldType};

/// §4.7 — turns a resolved field path into the SQL-level column reference,
/// accounting for data-table mode (the logical field name becomes the first
/// JSON segment, and the physical column is `<table>.<dataField>`).
pub fn emit_field_column(resolved: &ResolvedField, config: &Config) -> String {
    let physical_column = match &config.data_table {
        Some(dt) => format!("{}.{}", resolved.table, dt.data_field),
        None => format!("{}.{}", resolved.table, resolved.field),
    };

    let segments: Vec<&str> = match &config.data_table {
        Some(_) => std::iter::once(resolved.field.as_str())
            .chain(resolved.json_access.iter().map(String::as_str))
            .collect(),
        None => resolved.json_access.iter().map(String::as_str).collect(),
    };

    emit_json_path(&physical_column, &segments, resolved.json_extract_text)
}

/// §4.7 JSON access emission: zero segments returns the column unchanged;
/// otherwise chains `->` for every segment but the last, using `->>` or
/// `->` on the last depending on `extract_text`.
pub fn emit_json_path(column: &str, segments: &[&str], extract_text: bool) -> String {
    if segments.is_empty() {
        return column.to_string();
    }
    let mut out = column.to_string();
    for (i, seg) in segments.iter().enumerate() {
        let is_last = i == segments.len() - 1;
        let op = if is_last && extract_text { "->>" } else { "->" };
        out.push_str(op);
        out.push('\'');
        out.push_str(seg);
        out.push('\'');
    }
    out
}

/// §4.7 alias generation: the logical path (`table.field`, or bare `field`
/// when `table == rootTable`) with any JSON path appended via `->`, quotes
/// stripped.
pub fn field_alias(resolved: &ResolvedField, root_table: &str) -> String {
    let mut alias = if resolved.table == root_table {
        resolved.field.clone()
    } else {
        format!("{}.{}", resolved.table, resolved.field)
    };
    for seg in &resolved.json_access {
        alias.push_str("->");
        alias.push_str(seg);
    }
    alias
}

/// §4.8 — wraps `column_sql` in a cast to `target_type` iff it differs from
/// the field's effective native type under data-table / JSON-access rules.
pub fn apply_cast(
    config: &Config,
    resolved: &ResolvedField,
    column_sql: String,
    target_type: Option<ExpressionType>,
) -> String {
    let target = match target_type.and_then(ExpressionType::as_field_type) {
        Some(t) => t,
        None => {
            // `any`/absent: no cast, except in data-table mode where JSON
            // extraction always yields text for non-string/object types.
            if config.data_table.is_some() {
                match resolved.field_config.field_type {
                    FieldType::String | FieldType::Object => return column_sql,
                    natural => natural,
                }
            } else {
                return column_sql;
            }
        }
    };

    let in_json_or_data_table = config.data_table.is_some() || resolved.has_json_access();
    if in_json_or_data_table {
        if matches!(target, FieldType::String | FieldType::Object) {
            return column_sql;
        }
    } else if target == resolved.field_config.field_type {
        return column_sql;
    }

    emit_cast(config.dialect, &column_sql, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{normalize_config, Dialect, RawConfig, RawField, RawTableConfig};
    use crate::field_path::resolve_field_path;
    use crate::value::FieldType as FT;
    use std::collections::BTreeMap;

    fn config_with_data_table() -> Config {
        let mut tables = BTreeMap::new();
        tables.insert(
            "sales".to_string(),
            RawTableConfig {
                allowed_fields: vec![
                    RawField { name: "amount".to_string(), field_type: FT::Number, nullable: false, default: None, foreign_key: None },
                    RawField { name: "region".to_string(), field_type: FT::String, nullable: false, default: None, foreign_key: None },
                ],
            },
        );
        normalize_config(RawConfig {
            tables,
            variables: BTreeMap::new(),
            relationships: None,
            dialect: Dialect::Postgresql,
            data_table: Some(crate::config::DataTable {
                table: "raw_data".to_string(),
                data_field: "data".to_string(),
                table_field: "table_name".to_string(),
            }),
        })
        .unwrap()
    }

    #[test]
    fn data_table_amount_emits_extract_text() {
        let cfg = config_with_data_table();
        let resolved = resolve_field_path("sales.amount", "sales", &cfg).unwrap();
        let col = emit_field_column(&resolved, &cfg);
        assert_eq!(col, "sales.data->>'amount'");
    }

    #[test]
    fn data_table_number_field_casts_even_without_target() {
        let cfg = config_with_data_table();
        let resolved = resolve_field_path("sales.amount", "sales", &cfg).unwrap();
        let col = emit_field_column(&resolved, &cfg);
        let cast = apply_cast(&cfg, &resolved, col, None);
        assert_eq!(cast, "(sales.data->>'amount')::FLOAT");
    }
}
