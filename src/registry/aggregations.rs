use crate::ast::AggregationOp;
use crate::value::ExpressionType;

/// Static description of one aggregation operator's expected argument type
/// (§4.10's aggregation registry).
pub struct AggregationSignature {
    pub op: AggregationOp,
    pub argument_type: ExpressionType,
}

pub static REGISTRY: &[AggregationSignature] = &[
    AggregationSignature { op: AggregationOp::Count, argument_type: ExpressionType::Any },
    AggregationSignature { op: AggregationOp::Sum, argument_type: ExpressionType::Number },
    AggregationSignature { op: AggregationOp::Avg, argument_type: ExpressionType::Number },
    AggregationSignature { op: AggregationOp::Min, argument_type: ExpressionType::Number },
    AggregationSignature { op: AggregationOp::Max, argument_type: ExpressionType::Number },
    AggregationSignature { op: AggregationOp::CountDistinct, argument_type: ExpressionType::Any },
    AggregationSignature { op: AggregationOp::StringAgg, argument_type: ExpressionType::String },
    AggregationSignature { op: AggregationOp::Stddev, argument_type: ExpressionType::Number },
    AggregationSignature { op: AggregationOp::Variance, argument_type: ExpressionType::Number },
];

pub fn lookup(op: AggregationOp) -> &'static AggregationSignature {
    REGISTRY
        .iter()
        .find(|a| a.op == op)
        .expect("AggregationOp is a closed enum covered above")
}
