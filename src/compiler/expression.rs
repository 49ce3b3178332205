use crate::ast::Expression;
use crate::dialect::emit_cast;
use crate::error::{CompileError, CompileResult};
use crate::field_path::resolve_field_path;
use crate::registry::functions::lookup;
use crate::scalar::{validate_date, validate_jsonb, validate_timestamp, validate_uuid};
use crate::sql_builder::ParserState;
use crate::value::{quote_literal, AnyScalar, ExpressionType, FieldType};

use super::condition;
use super::emit::{apply_cast, emit_field_column};
use super::functions::emit_function_sql;

/// The inferred type of a compiled expression: `None` means "absent /
/// unknown", the wildcard case described in §3.
pub type InferredType = Option<ExpressionType>;

/// §4.4 — recursively compiles an `Expression` into a SQL fragment,
/// returning the fragment along with its inferred type.
pub fn compile_expression(state: &mut ParserState, expr: &Expression) -> CompileResult<(String, InferredType)> {
    let mut _guard = state.enter()?;

    match expr {
        Expression::Scalar(scalar) => compile_scalar(&_guard, scalar),
        Expression::Field { field } => compile_field(&mut *_guard, field),
        Expression::Var { var } => compile_var(&_guard, var),
        Expression::Func { func } => compile_func(&mut *_guard, func),
        Expression::Cond { cond } => compile_cond(&mut *_guard, cond),
    }
}

fn compile_scalar(state: &ParserState, scalar: &AnyScalar) -> CompileResult<(String, InferredType)> {
    let dialect = state.dialect();
    match scalar {
        AnyScalar::Null => Ok(("NULL".to_string(), None)),
        AnyScalar::Bool(b) => Ok(((if *b { "TRUE" } else { "FALSE" }).to_string(), Some(ExpressionType::Boolean))),
        AnyScalar::Number(n) => Ok((crate::value::format_number(*n), Some(ExpressionType::Number))),
        AnyScalar::String(s) => Ok((quote_literal(s), Some(ExpressionType::String))),
        AnyScalar::Date(d) => {
            validate_date(&d.date)?;
            Ok((emit_cast(dialect, &quote_literal(&d.date), FieldType::Date), Some(ExpressionType::Date)))
        }
        AnyScalar::Timestamp(t) => {
            validate_timestamp(&t.timestamp)?;
            Ok((emit_cast(dialect, &quote_literal(&t.timestamp), FieldType::Datetime), Some(ExpressionType::Datetime)))
        }
        AnyScalar::Uuid(u) => {
            validate_uuid(&u.uuid)?;
            Ok((emit_cast(dialect, &quote_literal(&u.uuid), FieldType::Uuid), Some(ExpressionType::Uuid)))
        }
        AnyScalar::Jsonb(j) => {
            validate_jsonb(&j.jsonb)?;
            Ok((emit_cast(dialect, &quote_literal(&j.jsonb.to_string()), FieldType::Object), Some(ExpressionType::Object)))
        }
    }
}

fn compile_field(state: &mut ParserState, field: &str) -> CompileResult<(String, InferredType)> {
    let resolved = resolve_field_path(field, &state.root_table, state.config)?;
    let column = emit_field_column(&resolved, state.config);
    let column = apply_cast(state.config, &resolved, column, None);
    Ok((column, Some(resolved.field_config.field_type.into())))
}

fn compile_var(state: &ParserState, var: &str) -> CompileResult<(String, InferredType)> {
    let value = state
        .config
        .variables
        .get(var)
        .ok_or_else(|| CompileError::UnknownVariable(var.to_string()))?
        .clone();
    compile_scalar(state, &value)
}

fn compile_func(
    state: &mut ParserState,
    func: &std::collections::BTreeMap<String, Vec<Expression>>,
) -> CompileResult<(String, InferredType)> {
    let (name, args) = func
        .iter()
        .next()
        .map(|(n, a)| (n.as_str(), a.as_slice()))
        .ok_or_else(|| CompileError::InvalidConfig("$func requires exactly one entry".to_string()))?;

    let sig = lookup(name).ok_or_else(|| CompileError::UnknownFunction(name.to_string()))?;

    if sig.unsupported_dialects.contains(&state.dialect()) {
        return Err(CompileError::DialectUnsupportedFunction {
            name: name.to_string(),
            dialect: dialect_name(state.dialect()),
        });
    }

    if args.len() < sig.argument_types.len() || (!sig.variadic && args.len() != sig.argument_types.len()) {
        return Err(CompileError::ArgumentCount {
            name: name.to_string(),
            expected: sig.argument_types.len(),
            got: args.len(),
            variadic: sig.variadic,
        });
    }

    let mut compiled_args = Vec::with_capacity(args.len());
    for (idx, arg) in args.iter().enumerate() {
        let expected = sig
            .argument_types
            .get(idx)
            .copied()
            .unwrap_or(*sig.argument_types.last().unwrap());
        let (sql, actual) = compile_expression(state, arg)?;
        let sql = reconcile_arg_type(name, expected, actual, sql)?;
        compiled_args.push(sql);
    }

    if name == "DIVIDE" {
        if let Expression::Scalar(AnyScalar::Number(n)) = &args[1] {
            if *n == 0.0 {
                return Err(CompileError::DivisionByZero);
            }
        }
    }

    let sql = emit_function_sql(state.dialect(), name, &compiled_args, None)?;
    Ok((sql, Some(sig.return_type)))
}

fn reconcile_arg_type(
    name: &str,
    expected: ExpressionType,
    actual: InferredType,
    sql: String,
) -> CompileResult<String> {
    if expected == ExpressionType::Any {
        return Ok(sql);
    }
    match actual {
        None => Ok(sql),
        Some(a) if a == expected => Ok(sql),
        Some(_a) if expected == ExpressionType::String => {
            Ok(format!("({sql})::TEXT"))
        }
        Some(a) => Err(CompileError::FunctionTypeMismatch {
            name: name.to_string(),
            expected,
            actual: a,
        }),
    }
}

fn compile_cond(state: &mut ParserState, cond: &crate::ast::CondExpr) -> CompileResult<(String, InferredType)> {
    let cond_sql = condition::compile_condition(state, &cond.if_)?;
    let (then_sql, then_type) = compile_expression(state, &cond.then)?;
    let (else_sql, else_type) = compile_expression(state, &cond.else_)?;

    let unified = match (then_type, else_type) {
        (Some(a), Some(b)) if a != b => return Err(CompileError::ConditionalTypeMismatch),
        (Some(a), _) => Some(a),
        (None, b) => b,
    };

    Ok((format!("(CASE WHEN {cond_sql} THEN {then_sql} ELSE {else_sql} END)"), unified))
}

fn dialect_name(d: crate::config::Dialect) -> &'static str {
    match d {
        crate::config::Dialect::Postgresql => "postgresql",
        crate::config::Dialect::SqliteMinimal => "sqlite-minimal",
    }
}
