//! §4.11 — the partial evaluator: a fixed-point folder that resolves
//! computed column defaults for INSERT/UPDATE against a row being
//! assembled. Shares the scalar/tagged-scalar validation and the function
//! registry with the compiler, but never emits SQL text.

mod functions;

use indexmap::IndexMap;

use crate::ast::{
    CondExpr, ComparisonOp, Condition, Expression, FieldCondition, FieldOp, NEW_ROW,
};
use crate::config::{is_valid_field_name, Config};
use crate::error::{CompileError, CompileResult};
use crate::json_access::parse_json_access;
use crate::value::{AnyScalar, TaggedJsonb};

pub use functions::eval_function;

/// Whether defaults are being resolved for a brand-new row or one being
/// patched in place. Only affects whether a field reference to the root
/// table (as opposed to the `NEW_ROW` sentinel) is permitted (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Insert,
    Update,
}

/// Either a fully-resolved value, or an expression/condition that could not
/// be folded any further this pass (a "residual", per the GLOSSARY).
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T, R> {
    Value(T),
    Residual(R),
}

pub type ExprResolved = Resolved<AnyScalar, Expression>;
pub type CondResolved = Resolved<bool, Condition>;

struct EvalCtx<'a> {
    config: &'a Config,
    table: &'a str,
    mutation_type: MutationType,
    row: &'a IndexMap<String, AnyScalar>,
}

/// §4.11 — resolves every missing field's default against `supplied`,
/// iterating to a fixed point so defaults may reference other defaults.
#[tracing::instrument(skip(config, supplied), fields(table = %table))]
pub fn resolve_defaults(
    config: &Config,
    table: &str,
    mutation_type: MutationType,
    supplied: IndexMap<String, AnyScalar>,
) -> CompileResult<IndexMap<String, AnyScalar>> {
    let table_config = config.table(table)?;

    let mut row = supplied;
    let mut pending: Vec<(String, Expression)> = Vec::new();

    for field in &table_config.allowed_fields {
        if row.contains_key(&field.name) {
            continue;
        }
        match &field.default {
            Some(expr) => pending.push((field.name.clone(), expr.clone())),
            None if field.nullable => {
                row.insert(field.name.clone(), AnyScalar::Null);
            }
            None => return Err(CompileError::MissingDefault(field.name.clone())),
        }
    }

    loop {
        if pending.is_empty() {
            break;
        }
        let prev_len = pending.len();
        let mut still_pending = Vec::with_capacity(pending.len());

        for (name, expr) in pending {
            let ctx = EvalCtx { config, table, mutation_type, row: &row };
            match evaluate_expression(&ctx, &expr)? {
                Resolved::Value(scalar) => {
                    row.insert(name, scalar);
                }
                Resolved::Residual(residual) => still_pending.push((name, residual)),
            }
        }

        pending = still_pending;
        if pending.len() == prev_len {
            break;
        }
    }

    if !pending.is_empty() {
        return Err(CompileError::CircularDefault(pending.into_iter().map(|(n, _)| n).collect()));
    }

    tracing::debug!(resolved = row.len(), "resolved defaults to a fixed point");
    Ok(row)
}

fn evaluate_expression(ctx: &EvalCtx, expr: &Expression) -> CompileResult<ExprResolved> {
    match expr {
        Expression::Scalar(scalar) => Ok(Resolved::Value(revalidate_scalar(scalar)?)),
        Expression::Field { field } => evaluate_field(ctx, field),
        Expression::Var { var } => {
            let value = ctx
                .config
                .variables
                .get(var)
                .ok_or_else(|| CompileError::UnknownVariable(var.clone()))?
                .clone();
            Ok(Resolved::Value(value))
        }
        Expression::Func { func } => evaluate_func(ctx, func),
        Expression::Cond { cond } => evaluate_cond(ctx, cond),
    }
}

fn revalidate_scalar(scalar: &AnyScalar) -> CompileResult<AnyScalar> {
    match scalar {
        AnyScalar::Date(d) => crate::scalar::validate_date(&d.date)?,
        AnyScalar::Timestamp(t) => crate::scalar::validate_timestamp(&t.timestamp)?,
        AnyScalar::Uuid(u) => crate::scalar::validate_uuid(&u.uuid)?,
        AnyScalar::Jsonb(j) => crate::scalar::validate_jsonb(&j.jsonb)?,
        AnyScalar::Null | AnyScalar::Bool(_) | AnyScalar::Number(_) | AnyScalar::String(_) => {}
    }
    Ok(scalar.clone())
}

fn evaluate_field(ctx: &EvalCtx, path: &str) -> CompileResult<ExprResolved> {
    let (table, rest) = match path.find('.') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => (ctx.table, path),
    };

    if table != NEW_ROW {
        if ctx.mutation_type == MutationType::Insert {
            return Err(CompileError::ForbiddenExistingRowOnInsert);
        }
        // Updates may reference the pre-mutation row, which this pure
        // compiler library never has access to; leave it residual for a
        // caller with access to the existing row to fold later.
        return Ok(Resolved::Residual(Expression::Field { field: path.to_string() }));
    }

    let (field_name, json_tail) = match rest.find("->") {
        Some(idx) => (&rest[..idx], Some(&rest[idx..])),
        None => (rest, None),
    };

    if !is_valid_field_name(field_name) {
        return Err(CompileError::InvalidConfig(format!(
            "field name '{field_name}' does not match the allowed pattern"
        )));
    }

    let base = match ctx.row.get(field_name) {
        Some(v) => v.clone(),
        None => return Ok(Resolved::Residual(Expression::Field { field: path.to_string() })),
    };

    let segments = match json_tail {
        None => return Ok(Resolved::Value(base)),
        Some(tail) => parse_json_access(tail)?.segments,
    };

    let json = match base {
        AnyScalar::Jsonb(TaggedJsonb { jsonb }) => jsonb,
        AnyScalar::Null => return Ok(Resolved::Value(AnyScalar::Null)),
        other => other_as_json(&other),
    };

    Ok(Resolved::Value(walk_json(&json, &segments)))
}

fn other_as_json(scalar: &AnyScalar) -> serde_json::Value {
    match scalar {
        AnyScalar::String(s) => serde_json::Value::String(s.clone()),
        AnyScalar::Number(n) => serde_json::json!(n),
        AnyScalar::Bool(b) => serde_json::Value::Bool(*b),
        _ => serde_json::Value::Null,
    }
}

fn walk_json(value: &serde_json::Value, segments: &[String]) -> AnyScalar {
    let mut cur = value;
    for seg in segments {
        match cur.as_object().and_then(|m| m.get(seg)) {
            Some(next) => cur = next,
            None => return AnyScalar::Null,
        }
    }
    json_value_to_scalar(cur)
}

fn json_value_to_scalar(v: &serde_json::Value) -> AnyScalar {
    match v {
        serde_json::Value::Null => AnyScalar::Null,
        serde_json::Value::Bool(b) => AnyScalar::Bool(*b),
        serde_json::Value::Number(n) => AnyScalar::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => AnyScalar::String(s.clone()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            AnyScalar::Jsonb(TaggedJsonb { jsonb: v.clone() })
        }
    }
}

fn evaluate_func(ctx: &EvalCtx, func: &std::collections::BTreeMap<String, Vec<Expression>>) -> CompileResult<ExprResolved> {
    let (name, args) = func
        .iter()
        .next()
        .map(|(n, a)| (n.as_str(), a.as_slice()))
        .ok_or_else(|| CompileError::InvalidConfig("$func requires exactly one entry".to_string()))?;

    let mut resolved_args = Vec::with_capacity(args.len());
    let mut any_residual = false;
    let mut partial_args = Vec::with_capacity(args.len());

    for arg in args {
        match evaluate_expression(ctx, arg)? {
            Resolved::Value(v) => {
                partial_args.push(Expression::Scalar(v.clone()));
                resolved_args.push(v);
            }
            Resolved::Residual(r) => {
                any_residual = true;
                partial_args.push(r);
            }
        }
    }

    if any_residual {
        let mut map = std::collections::BTreeMap::new();
        map.insert(name.to_string(), partial_args);
        return Ok(Resolved::Residual(Expression::Func { func: map }));
    }

    Ok(Resolved::Value(eval_function(name, &resolved_args)?))
}

fn evaluate_cond(ctx: &EvalCtx, cond: &CondExpr) -> CompileResult<ExprResolved> {
    match evaluate_condition(ctx, &cond.if_)? {
        Resolved::Value(true) => evaluate_expression(ctx, &cond.then),
        Resolved::Value(false) => evaluate_expression(ctx, &cond.else_),
        Resolved::Residual(residual_if) => {
            let then_r = partially_evaluate_expr(ctx, &cond.then)?;
            let else_r = partially_evaluate_expr(ctx, &cond.else_)?;
            Ok(Resolved::Residual(Expression::Cond {
                cond: Box::new(CondExpr { if_: residual_if, then: then_r, else_: else_r }),
            }))
        }
    }
}

fn partially_evaluate_expr(ctx: &EvalCtx, expr: &Expression) -> CompileResult<Expression> {
    Ok(match evaluate_expression(ctx, expr)? {
        Resolved::Value(v) => Expression::Scalar(v),
        Resolved::Residual(r) => r,
    })
}

fn evaluate_condition(ctx: &EvalCtx, cond: &Condition) -> CompileResult<CondResolved> {
    match cond {
        Condition::Bool(b) => Ok(Resolved::Value(*b)),

        Condition::Expr(expr) => match evaluate_expression(ctx, expr)? {
            Resolved::Value(AnyScalar::Bool(b)) => Ok(Resolved::Value(b)),
            Resolved::Value(_) => Err(CompileError::InvalidConfig("condition expression must be boolean".to_string())),
            Resolved::Residual(r) => Ok(Resolved::Residual(Condition::Expr(r))),
        },

        Condition::Not { not } => match evaluate_condition(ctx, not)? {
            Resolved::Value(b) => Ok(Resolved::Value(!b)),
            Resolved::Residual(r) => Ok(Resolved::Residual(Condition::Not { not: Box::new(r) })),
        },

        Condition::And { and } => {
            if and.is_empty() {
                return Err(CompileError::EmptyLogicalArray("$and"));
            }
            let mut residuals = Vec::new();
            for child in and {
                match evaluate_condition(ctx, child)? {
                    Resolved::Value(false) => return Ok(Resolved::Value(false)),
                    Resolved::Value(true) => {}
                    Resolved::Residual(r) => residuals.push(r),
                }
            }
            if residuals.is_empty() {
                Ok(Resolved::Value(true))
            } else {
                Ok(Resolved::Residual(Condition::And { and: residuals }))
            }
        }

        Condition::Or { or } => {
            if or.is_empty() {
                return Err(CompileError::EmptyLogicalArray("$or"));
            }
            let mut residuals = Vec::new();
            for child in or {
                match evaluate_condition(ctx, child)? {
                    Resolved::Value(true) => return Ok(Resolved::Value(true)),
                    Resolved::Value(false) => {}
                    Resolved::Residual(r) => residuals.push(r),
                }
            }
            if residuals.is_empty() {
                Ok(Resolved::Value(false))
            } else {
                Ok(Resolved::Residual(Condition::Or { or: residuals }))
            }
        }

        // Requires data this pure compiler library never has access to.
        Condition::Exists { .. } => Ok(Resolved::Residual(cond.clone())),

        Condition::FieldMap(map) => evaluate_field_map(ctx, map),
    }
}

fn evaluate_field_map(ctx: &EvalCtx, map: &IndexMap<String, FieldCondition>) -> CompileResult<CondResolved> {
    let mut residual = IndexMap::new();

    for (field_name, field_cond) in map {
        match evaluate_one_field_condition(ctx, field_name, field_cond)? {
            Resolved::Value(false) => return Ok(Resolved::Value(false)),
            Resolved::Value(true) => {}
            Resolved::Residual(r) => {
                residual.insert(field_name.clone(), r);
            }
        }
    }

    if residual.is_empty() {
        Ok(Resolved::Value(true))
    } else {
        Ok(Resolved::Residual(Condition::FieldMap(residual)))
    }
}

fn evaluate_one_field_condition(ctx: &EvalCtx, field_name: &str, cond: &FieldCondition) -> CompileResult<Resolved<bool, FieldCondition>> {
    let field_value_expr = Expression::Field { field: qualify(ctx, field_name) };

    let ops: Vec<(ComparisonOp, Option<&Expression>, FieldOpKind)> = match cond {
        FieldCondition::Implicit(expr) => vec![(ComparisonOp::Eq, Some(expr), FieldOpKind::Comparison)],
        FieldCondition::Ops(ops) => ops
            .iter_ops()
            .into_iter()
            .map(|op| match op {
                FieldOp::Comparison(c, e) => (c, Some(e), FieldOpKind::Comparison),
                FieldOp::In(_) | FieldOp::NotIn(_) | FieldOp::Like(_) | FieldOp::Ilike(_) | FieldOp::Regex(_) => {
                    (ComparisonOp::Eq, None, FieldOpKind::Other)
                }
            })
            .collect(),
    };

    // Non-comparison operators ($in/$nin/$like/$ilike/$regex) require
    // per-value traversal beyond simple equality folding; since defaults
    // rarely gate on them and this library has no execution context to
    // verify string matching against, they are left residual.
    if ops.iter().any(|(_, _, kind)| *kind == FieldOpKind::Other) {
        return Ok(Resolved::Residual(cond.clone()));
    }

    let mut any_residual = false;
    for (op, operand, _) in &ops {
        let operand = operand.expect("comparison ops always carry an operand");
        let field_outcome = evaluate_expression(ctx, &field_value_expr)?;
        let operand_outcome = evaluate_expression(ctx, operand)?;
        match (field_outcome, operand_outcome) {
            (Resolved::Value(lhs), Resolved::Value(rhs)) => {
                if !compare(*op, &lhs, &rhs)? {
                    return Ok(Resolved::Value(false));
                }
            }
            _ => any_residual = true,
        }
    }

    if any_residual {
        Ok(Resolved::Residual(cond.clone()))
    } else {
        Ok(Resolved::Value(true))
    }
}

#[derive(PartialEq)]
enum FieldOpKind {
    Comparison,
    Other,
}

/// Field-condition maps name bare fields (§4.5); in the evaluator's context
/// those refer to the row under construction, so they're qualified against
/// the `NEW_ROW` sentinel rather than the configured table.
fn qualify(_ctx: &EvalCtx, field_name: &str) -> String {
    format!("{NEW_ROW}.{field_name}")
}

fn compare(op: ComparisonOp, lhs: &AnyScalar, rhs: &AnyScalar) -> CompileResult<bool> {
    if lhs.is_null() || rhs.is_null() {
        return match op {
            ComparisonOp::Eq => Ok(lhs.is_null() && rhs.is_null()),
            ComparisonOp::Ne => Ok(!(lhs.is_null() && rhs.is_null())),
            _ => Err(CompileError::OperatorNullMisuse(format!("{op:?}"))),
        };
    }
    match op {
        ComparisonOp::Eq => Ok(lhs == rhs),
        ComparisonOp::Ne => Ok(lhs != rhs),
        ComparisonOp::Gt | ComparisonOp::Gte | ComparisonOp::Lt | ComparisonOp::Lte => {
            let ordering = numeric_compare(lhs, rhs)?;
            Ok(match op {
                ComparisonOp::Gt => ordering.is_gt(),
                ComparisonOp::Gte => ordering.is_ge(),
                ComparisonOp::Lt => ordering.is_lt(),
                ComparisonOp::Lte => ordering.is_le(),
                _ => unreachable!(),
            })
        }
    }
}

fn numeric_compare(lhs: &AnyScalar, rhs: &AnyScalar) -> CompileResult<std::cmp::Ordering> {
    match (lhs, rhs) {
        (AnyScalar::Number(a), AnyScalar::Number(b)) => {
            a.partial_cmp(b).ok_or_else(|| CompileError::InvalidConfig("NaN is not orderable".to_string()))
        }
        (AnyScalar::String(a), AnyScalar::String(b)) => Ok(a.cmp(b)),
        _ => Err(CompileError::MixedTypeArray("ordering comparison".to_string())),
    }
}
