use thiserror::Error;

use crate::value::{ExpressionType, FieldType};

/// Every error the compiler can raise. Compilation is all-or-nothing: no
/// partial SQL is ever returned once one of these is raised (see the
/// propagation policy in the source spec).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("table '{0}' is not allowed")]
    TableNotAllowed(String),

    #[error("field '{table}.{field}' is not allowed")]
    FieldNotAllowed { table: String, field: String },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("invalid aggregation operator '{0}'")]
    InvalidAggregationOperator(String),

    #[error("invalid JSON access: bad format in '{0}'")]
    InvalidJsonAccessFormat(String),

    #[error("invalid JSON access: unterminated quote in '{0}'")]
    InvalidJsonAccessQuote(String),

    #[error("JSON access on non-object field '{table}.{field}'")]
    JsonAccessTypeError { table: String, field: String },

    #[error("invalid {kind} scalar: {value}")]
    InvalidScalar { kind: &'static str, value: String },

    #[error("function '{name}' expects {expected} argument(s) (variadic={variadic}), got {got}")]
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
        variadic: bool,
    },

    #[error("function '{name}' expected argument of type {expected:?}, got {actual:?}")]
    FunctionTypeMismatch {
        name: String,
        expected: ExpressionType,
        actual: ExpressionType,
    },

    #[error("comparison '{op}' on field '{field}' expected {expected:?}, got {got:?}")]
    ComparisonTypeMismatch {
        op: String,
        field: String,
        expected: FieldType,
        got: ExpressionType,
    },

    #[error("conditional branches have incompatible types")]
    ConditionalTypeMismatch,

    #[error("array operator '{0}' received a mix of types")]
    MixedTypeArray(String),

    #[error("field condition has conflicting inferred types")]
    MixedFieldConditionTypes,

    #[error("'{0}' requires a non-empty array")]
    EmptyLogicalArray(&'static str),

    #[error("'{0}' requires a non-empty array")]
    EmptyArrayOperator(&'static str),

    #[error("operator '{0}' does not accept null")]
    OperatorNullMisuse(String),

    #[error("$regex is not supported under this dialect")]
    RegexUnsupported,

    #[error("function '{name}' is not supported under dialect {dialect}")]
    DialectUnsupportedFunction { name: String, dialect: &'static str },

    #[error("division by a literal zero")]
    DivisionByZero,

    #[error("square root of a negative number")]
    SqrtOfNegative,

    #[error("aggregated field is missing")]
    MissingAggregationField,

    #[error("COUNT(*) may only be used with the COUNT operator")]
    CountStarWithNonCount,

    #[error("field '{0}' has no default and is not nullable")]
    MissingDefault(String),

    #[error("circular defaults among fields: {0:?}")]
    CircularDefault(Vec<String>),

    #[error("field on the root table cannot be referenced as an existing row during INSERT")]
    ForbiddenExistingRowOnInsert,

    #[error("expression/condition nesting exceeded the maximum depth")]
    DepthExceeded,
}

pub type CompileResult<T> = Result<T, CompileError>;
