use crate::config::Dialect;
use crate::value::FieldType;

/// The SQL type name a `FieldType` casts to under a given dialect (§3).
pub fn sql_type_name(dialect: Dialect, field_type: FieldType) -> &'static str {
    match dialect {
        Dialect::Postgresql => match field_type {
            FieldType::String => "TEXT",
            FieldType::Number => "FLOAT",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Object => "JSONB",
            FieldType::Date => "DATE",
            FieldType::Datetime => "TIMESTAMP",
            FieldType::Uuid => "UUID",
        },
        Dialect::SqliteMinimal => match field_type {
            FieldType::String => "TEXT",
            FieldType::Number => "REAL",
            FieldType::Boolean => "INTEGER",
            FieldType::Object => "TEXT",
            FieldType::Date => "TEXT",
            FieldType::Datetime => "TEXT",
            FieldType::Uuid => "TEXT",
        },
    }
}

/// Wraps `expr` in the dialect's cast syntax for `field_type`.
pub fn emit_cast(dialect: Dialect, expr: &str, field_type: FieldType) -> String {
    let sql_type = sql_type_name(dialect, field_type);
    match dialect {
        Dialect::Postgresql => format!("({expr})::{sql_type}"),
        Dialect::SqliteMinimal => format!("CAST({expr} AS {sql_type})"),
    }
}
