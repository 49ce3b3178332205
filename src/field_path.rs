use crate::config::{is_valid_field_name, Config, Field};
use crate::error::{CompileError, CompileResult};
use crate::json_access::{parse_json_access, JsonAccess};
use crate::value::FieldType;

/// A field reference resolved against a `Config`: which table and field it
/// names, the field's declared config, and any JSON-path tail.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub table: String,
    pub field: String,
    pub field_config: Field,
    pub json_access: Vec<String>,
    pub json_extract_text: bool,
}

impl ResolvedField {
    pub fn has_json_access(&self) -> bool {
        !self.json_access.is_empty()
    }
}

/// Resolves a dotted, possibly JSON-augmented field path (`table.field`,
/// `field`, or either with a `->`/`->>` tail) against the root table and
/// config.
pub fn resolve_field_path(path: &str, root_table: &str, config: &Config) -> CompileResult<ResolvedField> {
    let (table, rest) = match path.find('.') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => (root_table, path),
    };

    if table.is_empty() || rest.is_empty() {
        return Err(CompileError::InvalidConfig(format!(
            "malformed field path '{path}'"
        )));
    }

    let table_config = config.table(table)?;

    let (field_name, json_tail) = match rest.find("->") {
        Some(idx) => (&rest[..idx], Some(&rest[idx..])),
        None => (rest, None),
    };

    if !is_valid_field_name(field_name) {
        return Err(CompileError::InvalidConfig(format!(
            "field name '{field_name}' does not match the allowed pattern"
        )));
    }

    let field_config = table_config
        .find_field(field_name)
        .cloned()
        .ok_or_else(|| CompileError::FieldNotAllowed {
            table: table.to_string(),
            field: field_name.to_string(),
        })?;

    let (json_access, json_extract_text) = match json_tail {
        None => (Vec::new(), false),
        Some(tail) => {
            if field_config.field_type != FieldType::Object {
                return Err(CompileError::JsonAccessTypeError {
                    table: table.to_string(),
                    field: field_name.to_string(),
                });
            }
            let JsonAccess { segments, extract_text } = parse_json_access(tail)?;
            (segments, extract_text)
        }
    };

    Ok(ResolvedField {
        table: table.to_string(),
        field: field_name.to_string(),
        field_config,
        json_access,
        json_extract_text,
    })
}
