use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::AnyScalar;

/// Sentinel root-table name the partial evaluator uses for `$field`
/// references into the row currently being assembled.
pub const NEW_ROW: &str = "NEW_ROW";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expression {
    Scalar(AnyScalar),
    Field {
        #[serde(rename = "$field")]
        field: String,
    },
    Var {
        #[serde(rename = "$var")]
        var: String,
    },
    Func {
        #[serde(rename = "$func")]
        func: BTreeMap<String, Vec<Expression>>,
    },
    Cond {
        #[serde(rename = "$cond")]
        cond: Box<CondExpr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondExpr {
    #[serde(rename = "if")]
    pub if_: Condition,
    #[serde(rename = "then")]
    pub then: Expression,
    #[serde(rename = "else")]
    pub else_: Expression,
}

impl Expression {
    /// Decompose a single-entry `$func` map into its name and arguments.
    /// The query-document shape requires exactly one entry; callers that
    /// parsed JSON are trusted to have enforced that already, but we guard
    /// it here too since hand-built documents may not have.
    pub fn as_func(&self) -> Option<(&str, &[Expression])> {
        match self {
            Expression::Func { func } => func
                .iter()
                .next()
                .map(|(name, args)| (name.as_str(), args.as_slice())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldCondition {
    Implicit(Expression),
    Ops(FieldConditionOps),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldConditionOps {
    #[serde(rename = "$eq", default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<Expression>,
    #[serde(rename = "$ne", default, skip_serializing_if = "Option::is_none")]
    pub ne: Option<Expression>,
    #[serde(rename = "$gt", default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Expression>,
    #[serde(rename = "$gte", default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Expression>,
    #[serde(rename = "$lt", default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Expression>,
    #[serde(rename = "$lte", default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Expression>,
    #[serde(rename = "$in", default, skip_serializing_if = "Option::is_none")]
    pub in_: Option<Vec<Expression>>,
    #[serde(rename = "$nin", default, skip_serializing_if = "Option::is_none")]
    pub nin: Option<Vec<Expression>>,
    #[serde(rename = "$like", default, skip_serializing_if = "Option::is_none")]
    pub like: Option<Expression>,
    #[serde(rename = "$ilike", default, skip_serializing_if = "Option::is_none")]
    pub ilike: Option<Expression>,
    #[serde(rename = "$regex", default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<Expression>,
}

/// One `(operator, operand)` pair pulled out of a `FieldConditionOps` (or the
/// single implicit `$eq` of a bare value), in a uniform shape the field
/// condition sub-parser can iterate over in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
        }
    }
}

pub enum FieldOp<'a> {
    Comparison(ComparisonOp, &'a Expression),
    In(&'a [Expression]),
    NotIn(&'a [Expression]),
    Like(&'a Expression),
    Ilike(&'a Expression),
    Regex(&'a Expression),
}

impl FieldConditionOps {
    /// Iterate `(op, operand)` pairs in the declaration order spelled out in
    /// §4.6: `$eq,$ne,$gt,$gte,$lt,$lte,$in,$nin,$like,$ilike,$regex`.
    pub fn iter_ops(&self) -> Vec<FieldOp<'_>> {
        let mut ops = Vec::new();
        if let Some(e) = &self.eq {
            ops.push(FieldOp::Comparison(ComparisonOp::Eq, e));
        }
        if let Some(e) = &self.ne {
            ops.push(FieldOp::Comparison(ComparisonOp::Ne, e));
        }
        if let Some(e) = &self.gt {
            ops.push(FieldOp::Comparison(ComparisonOp::Gt, e));
        }
        if let Some(e) = &self.gte {
            ops.push(FieldOp::Comparison(ComparisonOp::Gte, e));
        }
        if let Some(e) = &self.lt {
            ops.push(FieldOp::Comparison(ComparisonOp::Lt, e));
        }
        if let Some(e) = &self.lte {
            ops.push(FieldOp::Comparison(ComparisonOp::Lte, e));
        }
        if let Some(e) = &self.in_ {
            ops.push(FieldOp::In(e));
        }
        if let Some(e) = &self.nin {
            ops.push(FieldOp::NotIn(e));
        }
        if let Some(e) = &self.like {
            ops.push(FieldOp::Like(e));
        }
        if let Some(e) = &self.ilike {
            ops.push(FieldOp::Ilike(e));
        }
        if let Some(e) = &self.regex {
            ops.push(FieldOp::Regex(e));
        }
        ops
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsCondition {
    pub table: String,
    pub condition: Box<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Bool(bool),
    And {
        #[serde(rename = "$and")]
        and: Vec<Condition>,
    },
    Or {
        #[serde(rename = "$or")]
        or: Vec<Condition>,
    },
    Not {
        #[serde(rename = "$not")]
        not: Box<Condition>,
    },
    Exists {
        #[serde(rename = "$exists")]
        exists: ExistsCondition,
    },
    /// An expression evaluating to boolean, or a field-name -> FieldCondition
    /// map. These overlap structurally (both are JSON objects without the
    /// dollar-prefixed keys above), so the condition compiler disambiguates
    /// by checking for `$field`/`$func`/`$cond`/`$var` keys first.
    Expr(Expression),
    /// `IndexMap` (rather than a sorted map) so the declaration order of
    /// field-condition entries survives into the emitted `AND` chain.
    FieldMap(IndexMap<String, FieldCondition>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    CountDistinct,
    StringAgg,
    Stddev,
    Variance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregatedFieldSource {
    Star(String),
    FieldName(String),
    Expr(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedField {
    pub operator: AggregationOp,
    pub field: AggregatedFieldSource,
    #[serde(default)]
    pub separator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationQuery {
    pub table: String,
    #[serde(rename = "groupBy", default)]
    pub group_by: Vec<String>,
    /// `IndexMap` so output column order follows declaration order, as S1/S2
    /// in the source spec's worked examples assume.
    #[serde(rename = "aggregatedFields", default)]
    pub aggregated_fields: IndexMap<String, AggregatedField>,
}

/// The supplemented plain SELECT pipeline (SPEC_FULL §B): projection over a
/// table plus optional relational joins and a filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    pub table: String,
    pub fields: Vec<String>,
    /// Target table names; each is resolved against `Config.relationships`
    /// via `Config::find_relationship` and emitted as a `LEFT JOIN`.
    #[serde(default)]
    pub joins: Vec<String>,
    #[serde(default)]
    pub condition: Option<Condition>,
}
