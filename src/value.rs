use serde::{Deserialize, Serialize};

/// The closed set of field types a configured column may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Date,
    Datetime,
    Uuid,
}

/// `FieldType` plus the two values an expression's inferred type can take
/// that a declared field never can: a type-agnostic wildcard, or "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionType {
    String,
    Number,
    Boolean,
    Object,
    Date,
    Datetime,
    Uuid,
    Any,
}

impl From<FieldType> for ExpressionType {
    fn from(t: FieldType) -> Self {
        match t {
            FieldType::String => ExpressionType::String,
            FieldType::Number => ExpressionType::Number,
            FieldType::Boolean => ExpressionType::Boolean,
            FieldType::Object => ExpressionType::Object,
            FieldType::Date => ExpressionType::Date,
            FieldType::Datetime => ExpressionType::Datetime,
            FieldType::Uuid => ExpressionType::Uuid,
        }
    }
}

impl ExpressionType {
    pub fn as_field_type(self) -> Option<FieldType> {
        match self {
            ExpressionType::String => Some(FieldType::String),
            ExpressionType::Number => Some(FieldType::Number),
            ExpressionType::Boolean => Some(FieldType::Boolean),
            ExpressionType::Object => Some(FieldType::Object),
            ExpressionType::Date => Some(FieldType::Date),
            ExpressionType::Datetime => Some(FieldType::Datetime),
            ExpressionType::Uuid => Some(FieldType::Uuid),
            ExpressionType::Any => None,
        }
    }
}

/// An untagged scalar payload. `Null` has no type of its own; tagged
/// variants disambiguate what would otherwise be an ambiguous string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnyScalar {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(TaggedDate),
    Timestamp(TaggedTimestamp),
    Uuid(TaggedUuid),
    Jsonb(TaggedJsonb),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedDate {
    #[serde(rename = "$date")]
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedTimestamp {
    #[serde(rename = "$timestamp")]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedUuid {
    #[serde(rename = "$uuid")]
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedJsonb {
    #[serde(rename = "$jsonb")]
    pub jsonb: serde_json::Value,
}

impl AnyScalar {
    /// The `ExpressionType` a literal scalar, taken at face value, carries.
    /// `Null` has none: it unifies with whatever its context demands.
    pub fn inferred_type(&self) -> Option<ExpressionType> {
        match self {
            AnyScalar::Null => None,
            AnyScalar::Bool(_) => Some(ExpressionType::Boolean),
            AnyScalar::Number(_) => Some(ExpressionType::Number),
            AnyScalar::String(_) => Some(ExpressionType::String),
            AnyScalar::Date(_) => Some(ExpressionType::Date),
            AnyScalar::Timestamp(_) => Some(ExpressionType::Datetime),
            AnyScalar::Uuid(_) => Some(ExpressionType::Uuid),
            AnyScalar::Jsonb(_) => Some(ExpressionType::Object),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AnyScalar::Null)
    }
}

/// Single-quote and double embedded quotes, the one path every literal
/// string must go through before reaching SQL text.
pub fn quote_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

pub fn format_number(n: f64) -> String {
    format!("{n}")
}
