use crate::ast::{AggregatedFieldSource, AggregationOp, AggregationQuery};
use crate::error::{CompileError, CompileResult};
use crate::field_path::resolve_field_path;
use crate::registry::aggregations;
use crate::sql_builder::ParserState;
use crate::value::AnyScalar;

use super::emit::{apply_cast, emit_field_column, field_alias};
use super::expression::compile_expression;
use super::functions::{emit_function_sql, strip_outer_parens};

/// The compiled form every entry point returns: the full SQL string plus
/// the ordered parameter list (only ever non-empty under PostgreSQL).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<AnyScalar>,
}

/// §4.10 — compiles a `GROUP BY` + aggregated-fields query.
#[tracing::instrument(skip(config), fields(table = %query.table))]
pub fn compile_aggregation(config: &crate::config::Config, query: &AggregationQuery) -> CompileResult<CompiledQuery> {
    if query.group_by.is_empty() && query.aggregated_fields.is_empty() {
        return Err(CompileError::InvalidConfig(
            "aggregation query must have at least one groupBy entry or aggregated field".to_string(),
        ));
    }
    config.table(&query.table)?;

    let mut state = ParserState::new(config, query.table.clone());

    let mut projections = Vec::new();
    let mut group_bys = Vec::new();

    for path in &query.group_by {
        let resolved = resolve_field_path(path, &state.root_table, state.config)?;
        let column = emit_field_column(&resolved, state.config);
        let column = apply_cast(state.config, &resolved, column, None);
        let alias = field_alias(&resolved, &state.root_table);
        projections.push(format!("{column} AS \"{alias}\""));
        group_bys.push(column);
    }

    for (alias, agg) in &query.aggregated_fields {
        let projection = compile_aggregated_field(&mut state, agg)?;
        projections.push(format!("{projection} AS \"{alias}\""));
    }

    let from = match &config.data_table {
        Some(dt) => format!("{} AS \"{}\"", dt.table, query.table),
        None => query.table.clone(),
    };

    let mut sql = format!("SELECT {} FROM {from}", projections.join(", "));
    if !group_bys.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&group_bys.join(", "));
    }

    tracing::debug!(sql = %sql, "compiled aggregation query");
    Ok(CompiledQuery { sql, params: state.params })
}

fn compile_aggregated_field(
    state: &mut ParserState,
    agg: &crate::ast::AggregatedField,
) -> CompileResult<String> {
    let sig = aggregations::lookup(agg.operator);

    let expr_sql = match &agg.field {
        AggregatedFieldSource::Star(s) if s == "*" => {
            if agg.operator != AggregationOp::Count {
                return Err(CompileError::CountStarWithNonCount);
            }
            return Ok("COUNT(*)".to_string());
        }
        AggregatedFieldSource::Star(other) => {
            return Err(CompileError::InvalidConfig(format!(
                "'{other}' is not a valid aggregated field source; only \"*\" is special-cased"
            )))
        }
        AggregatedFieldSource::FieldName(name) => {
            let resolved = resolve_field_path(name, &state.root_table, state.config)?;
            let column = emit_field_column(&resolved, state.config);
            apply_cast(state.config, &resolved, column, Some(sig.argument_type))
        }
        AggregatedFieldSource::Expr(expr) => {
            let (sql, _ty) = compile_expression(state, expr)?;
            sql
        }
    };

    emit_aggregation_sql(state.dialect(), agg.operator, &expr_sql, agg.separator.as_deref())
}

fn emit_aggregation_sql(
    dialect: crate::config::Dialect,
    op: AggregationOp,
    expr_sql: &str,
    separator: Option<&str>,
) -> CompileResult<String> {
    let expr_sql = strip_outer_parens(expr_sql);
    Ok(match op {
        AggregationOp::Count => format!("COUNT({expr_sql})"),
        AggregationOp::Sum => format!("SUM({expr_sql})"),
        AggregationOp::Avg => format!("AVG({expr_sql})"),
        AggregationOp::Min => format!("MIN({expr_sql})"),
        AggregationOp::Max => format!("MAX({expr_sql})"),
        AggregationOp::CountDistinct => format!("COUNT(DISTINCT {expr_sql})"),
        AggregationOp::StringAgg => {
            emit_function_sql(dialect, "STRING_AGG", &[expr_sql.to_string()], separator)?
        }
        AggregationOp::Stddev => emit_function_sql(dialect, "STDDEV", &[expr_sql.to_string()], None)?,
        AggregationOp::Variance => emit_function_sql(dialect, "VARIANCE", &[expr_sql.to_string()], None)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AggregatedField;
    use crate::config::{normalize_config, DataTable, Dialect as Dlct, RawConfig, RawField, RawTableConfig};
    use crate::value::FieldType;
    use std::collections::BTreeMap;

    fn data_table_config() -> crate::config::Config {
        let mut tables = BTreeMap::new();
        tables.insert(
            "sales".to_string(),
            RawTableConfig {
                allowed_fields: vec![
                    RawField { name: "amount".to_string(), field_type: FieldType::Number, nullable: false, default: None, foreign_key: None },
                    RawField { name: "region".to_string(), field_type: FieldType::String, nullable: false, default: None, foreign_key: None },
                ],
            },
        );
        normalize_config(RawConfig {
            tables,
            variables: BTreeMap::new(),
            relationships: None,
            dialect: Dlct::Postgresql,
            data_table: Some(DataTable {
                table: "raw_data".to_string(),
                data_field: "data".to_string(),
                table_field: "table_name".to_string(),
            }),
        })
        .unwrap()
    }

    #[test]
    fn s1_aggregation_over_data_table_json() {
        let cfg = data_table_config();
        let mut aggregated_fields = indexmap::IndexMap::new();
        aggregated_fields.insert(
            "total_sales".to_string(),
            AggregatedField {
                operator: AggregationOp::Sum,
                field: AggregatedFieldSource::FieldName("sales.amount".to_string()),
                separator: None,
            },
        );
        aggregated_fields.insert(
            "count".to_string(),
            AggregatedField {
                operator: AggregationOp::Count,
                field: AggregatedFieldSource::Star("*".to_string()),
                separator: None,
            },
        );
        let query = AggregationQuery {
            table: "sales".to_string(),
            group_by: vec!["sales.region".to_string()],
            aggregated_fields,
        };
        let compiled = compile_aggregation(&cfg, &query).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT sales.data->>'region' AS \"region\", SUM((sales.data->>'amount')::FLOAT) AS \"total_sales\", COUNT(*) AS \"count\" FROM raw_data AS \"sales\" GROUP BY sales.data->>'region'"
        );
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn count_star_with_non_count_errors() {
        let cfg = data_table_config();
        let mut aggregated_fields = indexmap::IndexMap::new();
        aggregated_fields.insert(
            "bad".to_string(),
            AggregatedField {
                operator: AggregationOp::Sum,
                field: AggregatedFieldSource::Star("*".to_string()),
                separator: None,
            },
        );
        let query = AggregationQuery {
            table: "sales".to_string(),
            group_by: vec![],
            aggregated_fields,
        };
        let err = compile_aggregation(&cfg, &query).unwrap_err();
        assert!(matches!(err, CompileError::CountStarWithNonCount));
    }

    #[test]
    fn empty_query_rejected() {
        let cfg = data_table_config();
        let query = AggregationQuery {
            table: "sales".to_string(),
            group_by: vec![],
            aggregated_fields: indexmap::IndexMap::new(),
        };
        assert!(compile_aggregation(&cfg, &query).is_err());
    }
}
