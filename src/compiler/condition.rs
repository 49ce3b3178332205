use crate::ast::{ComparisonOp, Condition, Expression, FieldCondition, FieldOp};
use crate::dialect::emit_cast;
use crate::error::{CompileError, CompileResult};
use crate::field_path::{resolve_field_path, ResolvedField};
use crate::sql_builder::ParserState;
use crate::value::{AnyScalar, ExpressionType, FieldType};

use super::emit::{apply_cast, emit_field_column};
use super::expression::compile_expression;

/// §4.5 — compiles a `Condition` into a SQL boolean expression.
pub fn compile_condition(state: &mut ParserState, cond: &Condition) -> CompileResult<String> {
    let mut _guard = state.enter()?;

    match cond {
        Condition::Bool(b) => Ok((if *b { "TRUE" } else { "FALSE" }).to_string()),

        Condition::Expr(expr) => {
            let (sql, ty) = compile_expression(&mut *_guard, expr)?;
            if ty != Some(ExpressionType::Boolean) {
                return Err(CompileError::InvalidConfig(
                    "condition expression must be boolean".to_string(),
                ));
            }
            Ok(sql)
        }

        Condition::Not { not } => Ok(format!("NOT ({})", compile_condition(&mut *_guard, not)?)),

        Condition::And { and } => {
            if and.is_empty() {
                return Err(CompileError::EmptyLogicalArray("$and"));
            }
            join_conditions(&mut *_guard, and, "AND")
        }

        Condition::Or { or } => {
            if or.is_empty() {
                return Err(CompileError::EmptyLogicalArray("$or"));
            }
            join_conditions(&mut *_guard, or, "OR")
        }

        Condition::Exists { exists } => {
            let sub = compile_condition(&mut *_guard, &exists.condition)?;
            Ok(format!("EXISTS (SELECT 1 FROM {} WHERE {sub})", exists.table))
        }

        Condition::FieldMap(map) => {
            let mut fragments = Vec::with_capacity(map.len());
            for (field_name, field_cond) in map {
                fragments.push(compile_field_condition_entry(&mut *_guard, field_name, field_cond)?);
            }
            Ok(fragments.join(" AND "))
        }
    }
}

fn join_conditions(state: &mut ParserState, items: &[Condition], op: &str) -> CompileResult<String> {
    let parts: Vec<String> = items
        .iter()
        .map(|c| compile_condition(state, c))
        .collect::<CompileResult<_>>()?;
    if parts.len() == 1 {
        Ok(parts.into_iter().next().unwrap())
    } else {
        Ok(format!("({})", parts.join(&format!(" {op} "))))
    }
}

/// Resolves one `field -> FieldCondition` map entry into `(<field> <op1>) AND
/// (<field> <op2>) ...`, per §4.5/§4.6.
fn compile_field_condition_entry(
    state: &mut ParserState,
    field_name: &str,
    field_cond: &FieldCondition,
) -> CompileResult<String> {
    let resolved = resolve_field_path(field_name, &state.root_table, state.config)?;
    let mut forced = resolved.clone();
    forced.json_extract_text = true;

    let ops: Vec<OwnedFieldOp> = match field_cond {
        FieldCondition::Implicit(expr) => vec![OwnedFieldOp::Comparison(ComparisonOp::Eq, expr.clone())],
        FieldCondition::Ops(ops) => ops
            .iter_ops()
            .into_iter()
            .map(OwnedFieldOp::from)
            .collect(),
    };

    let mut unified: Option<ExpressionType> = None;
    let mut fragments = Vec::with_capacity(ops.len());

    for op in &ops {
        let (fragment_tail, op_type) = compile_one_field_op(state, &resolved, op)?;
        if let Some(t) = op_type {
            match unified {
                None => unified = Some(t),
                Some(u) if u == t => {}
                Some(_) => return Err(CompileError::MixedFieldConditionTypes),
            }
        }
        fragments.push(fragment_tail);
    }

    let field_sql = emit_field_column(&forced, state.config);
    let field_sql = apply_cast(state.config, &forced, field_sql, unified);

    Ok(fragments
        .into_iter()
        .map(|tail| format!("({field_sql} {tail})"))
        .collect::<Vec<_>>()
        .join(" AND "))
}

enum OwnedFieldOp {
    Comparison(ComparisonOp, Expression),
    In(Vec<Expression>),
    NotIn(Vec<Expression>),
    Like(Expression),
    Ilike(Expression),
    Regex(Expression),
}

impl<'a> From<FieldOp<'a>> for OwnedFieldOp {
    fn from(op: FieldOp<'a>) -> Self {
        match op {
            FieldOp::Comparison(c, e) => OwnedFieldOp::Comparison(c, e.clone()),
            FieldOp::In(items) => OwnedFieldOp::In(items.to_vec()),
            FieldOp::NotIn(items) => OwnedFieldOp::NotIn(items.to_vec()),
            FieldOp::Like(e) => OwnedFieldOp::Like(e.clone()),
            FieldOp::Ilike(e) => OwnedFieldOp::Ilike(e.clone()),
            FieldOp::Regex(e) => OwnedFieldOp::Regex(e.clone()),
        }
    }
}

/// Emits the `<op> <value>` tail (without the field itself) for one
/// sub-operator, and returns the type it contributes toward the field's
/// unified cast target.
fn compile_one_field_op(
    state: &mut ParserState,
    resolved: &ResolvedField,
    op: &OwnedFieldOp,
) -> CompileResult<(String, Option<ExpressionType>)> {
    match op {
        OwnedFieldOp::Comparison(c, expr) => compile_comparison(state, resolved, *c, expr),
        OwnedFieldOp::In(items) => compile_array_op(state, resolved, items, false),
        OwnedFieldOp::NotIn(items) => compile_array_op(state, resolved, items, true),
        OwnedFieldOp::Like(e) => compile_string_op(state, resolved, "LIKE", e),
        OwnedFieldOp::Ilike(e) => compile_ilike(state, resolved, e),
        OwnedFieldOp::Regex(e) => compile_regex(state, resolved, e),
    }
}

fn emit_operand(state: &mut ParserState, expr: &Expression) -> CompileResult<(String, Option<ExpressionType>)> {
    let (sql, ty) = compile_expression(state, expr)?;
    if let Expression::Scalar(scalar) = expr {
        if !scalar.is_null() {
            return Ok((state.emit_literal(scalar.clone()), ty));
        }
    }
    Ok((sql, ty))
}

fn check_scalar_against_field(
    scalar: &AnyScalar,
    field_type: FieldType,
    field_name: &str,
    op: &str,
) -> CompileResult<()> {
    if field_type == FieldType::Object {
        return Ok(());
    }
    match scalar.inferred_type() {
        None => Ok(()),
        Some(t) if t == ExpressionType::from(field_type) => Ok(()),
        Some(got) => Err(CompileError::ComparisonTypeMismatch {
            op: op.to_string(),
            field: field_name.to_string(),
            expected: field_type,
            got,
        }),
    }
}

fn compile_comparison(
    state: &mut ParserState,
    resolved: &ResolvedField,
    op: ComparisonOp,
    expr: &Expression,
) -> CompileResult<(String, Option<ExpressionType>)> {
    let is_null = matches!(expr, Expression::Scalar(AnyScalar::Null));

    if is_null {
        if !matches!(op, ComparisonOp::Eq | ComparisonOp::Ne) {
            return Err(CompileError::OperatorNullMisuse(format!("{op:?}")));
        }
        let tail = if matches!(op, ComparisonOp::Eq) { "IS NULL" } else { "IS NOT NULL" };
        return Ok((tail.to_string(), None));
    }

    if let Expression::Scalar(scalar) = expr {
        check_scalar_against_field(scalar, resolved.field_config.field_type, &resolved.field, op.as_sql())?;
    }

    let (operand_sql, operand_type) = emit_operand(state, expr)?;
    Ok((format!("{} {operand_sql}", op.as_sql()), operand_type))
}

fn compile_array_op(
    state: &mut ParserState,
    resolved: &ResolvedField,
    items: &[Expression],
    negate: bool,
) -> CompileResult<(String, Option<ExpressionType>)> {
    let op_name = if negate { "$nin" } else { "$in" };
    if items.is_empty() {
        return Err(CompileError::EmptyArrayOperator(op_name));
    }

    let mut unified: Option<ExpressionType> = None;
    let mut compiled = Vec::with_capacity(items.len());
    for item in items {
        if let Expression::Scalar(scalar) = item {
            check_scalar_against_field(scalar, resolved.field_config.field_type, &resolved.field, op_name)?;
        }
        let (sql, ty) = emit_operand(state, item)?;
        if let Some(t) = ty {
            match unified {
                None => unified = Some(t),
                Some(u) if u == t => {}
                Some(_) => return Err(CompileError::MixedTypeArray(op_name.to_string())),
            }
        }
        compiled.push(sql);
    }

    let keyword = if negate { "NOT IN" } else { "IN" };
    Ok((format!("{keyword} ({})", compiled.join(", ")), unified))
}

fn compile_string_op(
    state: &mut ParserState,
    resolved: &ResolvedField,
    keyword: &str,
    expr: &Expression,
) -> CompileResult<(String, Option<ExpressionType>)> {
    if matches!(expr, Expression::Scalar(AnyScalar::Null)) {
        return Err(CompileError::OperatorNullMisuse(keyword.to_string()));
    }
    if !matches!(resolved.field_config.field_type, FieldType::String | FieldType::Object) {
        return Err(CompileError::ComparisonTypeMismatch {
            op: keyword.to_string(),
            field: resolved.field.clone(),
            expected: FieldType::String,
            got: ExpressionType::from(resolved.field_config.field_type),
        });
    }

    let (mut sql, ty) = emit_operand(state, expr)?;
    if !matches!(expr, Expression::Scalar(AnyScalar::String(_))) {
        if !matches!(ty, Some(ExpressionType::String) | None) {
            sql = emit_cast(state.dialect(), &sql, FieldType::String);
        }
    }
    Ok((format!("{keyword} {sql}"), Some(ExpressionType::String)))
}

fn compile_ilike(
    state: &mut ParserState,
    resolved: &ResolvedField,
    expr: &Expression,
) -> CompileResult<(String, Option<ExpressionType>)> {
    match state.dialect() {
        crate::config::Dialect::Postgresql => compile_string_op(state, resolved, "ILIKE", expr),
        crate::config::Dialect::SqliteMinimal => compile_string_op(state, resolved, "LIKE", expr),
    }
}

fn compile_regex(
    state: &mut ParserState,
    resolved: &ResolvedField,
    expr: &Expression,
) -> CompileResult<(String, Option<ExpressionType>)> {
    if state.dialect() == crate::config::Dialect::SqliteMinimal {
        return Err(CompileError::RegexUnsupported);
    }
    compile_string_op(state, resolved, "~", expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{normalize_config, Dialect as Dlct, RawConfig, RawField, RawTableConfig};
    use std::collections::BTreeMap;

    fn config() -> crate::config::Config {
        let mut tables = BTreeMap::new();
        tables.insert(
            "users".to_string(),
            RawTableConfig {
                allowed_fields: vec![
                    RawField { name: "age".to_string(), field_type: FieldType::Number, nullable: true, default: None, foreign_key: None },
                    RawField { name: "name".to_string(), field_type: FieldType::String, nullable: false, default: None, foreign_key: None },
                ],
            },
        );
        normalize_config(RawConfig {
            tables,
            variables: BTreeMap::new(),
            relationships: None,
            dialect: Dlct::Postgresql,
            data_table: None,
        })
        .unwrap()
    }

    #[test]
    fn implicit_equality_parameterizes_value() {
        let cfg = config();
        let mut state = ParserState::new(&cfg, "users");
        let mut map = indexmap::IndexMap::new();
        map.insert("name".to_string(), FieldCondition::Implicit(Expression::Scalar(AnyScalar::String("Alice".to_string()))));
        let sql = compile_condition(&mut state, &Condition::FieldMap(map)).unwrap();
        assert_eq!(sql, "(users.name = $1)");
        assert_eq!(state.params, vec![AnyScalar::String("Alice".to_string())]);
    }

    #[test]
    fn null_eq_emits_is_null() {
        let cfg = config();
        let mut state = ParserState::new(&cfg, "users");
        let mut ops = crate::ast::FieldConditionOps::default();
        ops.eq = Some(Expression::Scalar(AnyScalar::Null));
        let mut map = indexmap::IndexMap::new();
        map.insert("age".to_string(), FieldCondition::Ops(ops));
        let sql = compile_condition(&mut state, &Condition::FieldMap(map)).unwrap();
        assert_eq!(sql, "(users.age IS NULL)");
    }

    #[test]
    fn gt_with_null_errors() {
        let cfg = config();
        let mut state = ParserState::new(&cfg, "users");
        let mut ops = crate::ast::FieldConditionOps::default();
        ops.gt = Some(Expression::Scalar(AnyScalar::Null));
        let mut map = indexmap::IndexMap::new();
        map.insert("age".to_string(), FieldCondition::Ops(ops));
        let err = compile_condition(&mut state, &Condition::FieldMap(map)).unwrap_err();
        assert!(matches!(err, CompileError::OperatorNullMisuse(_)));
    }

    #[test]
    fn empty_in_array_errors() {
        let cfg = config();
        let mut state = ParserState::new(&cfg, "users");
        let mut ops = crate::ast::FieldConditionOps::default();
        ops.in_ = Some(vec![]);
        let mut map = indexmap::IndexMap::new();
        map.insert("age".to_string(), FieldCondition::Ops(ops));
        let err = compile_condition(&mut state, &Condition::FieldMap(map)).unwrap_err();
        assert!(matches!(err, CompileError::EmptyArrayOperator("$in")));
    }

    #[test]
    fn empty_and_errors() {
        let cfg = config();
        let mut state = ParserState::new(&cfg, "users");
        let err = compile_condition(&mut state, &Condition::And { and: vec![] }).unwrap_err();
        assert!(matches!(err, CompileError::EmptyLogicalArray("$and")));
    }

    #[test]
    fn regex_unsupported_under_sqlite() {
        let mut cfg = config();
        cfg.dialect = Dlct::SqliteMinimal;
        let mut state = ParserState::new(&cfg, "users");
        let mut ops = crate::ast::FieldConditionOps::default();
        ops.regex = Some(Expression::Scalar(AnyScalar::String("^a".to_string())));
        let mut map = indexmap::IndexMap::new();
        map.insert("name".to_string(), FieldCondition::Ops(ops));
        let err = compile_condition(&mut state, &Condition::FieldMap(map)).unwrap_err();
        assert_eq!(err, CompileError::RegexUnsupported);
    }

    #[test]
    fn single_child_and_is_unwrapped() {
        let cfg = config();
        let mut state = ParserState::new(&cfg, "users");
        let sql = compile_condition(&mut state, &Condition::And { and: vec![Condition::Bool(true)] }).unwrap();
        assert_eq!(sql, "TRUE");
    }
}
