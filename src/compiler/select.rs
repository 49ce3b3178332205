use crate::ast::SelectQuery;
use crate::error::{CompileError, CompileResult};
use crate::field_path::resolve_field_path;
use crate::sql_builder::ParserState;

use super::aggregate::CompiledQuery;
use super::condition::compile_condition;
use super::emit::{apply_cast, emit_field_column, field_alias};
use super::join::emit_join;

/// SPEC_FULL §B — compiles a plain projection query: field list plus
/// optional relational joins and a filter condition, reusing the same
/// field-path resolution and expression/condition machinery as the
/// aggregation pipeline.
#[tracing::instrument(skip(config), fields(table = %query.table))]
pub fn compile_select(config: &crate::config::Config, query: &SelectQuery) -> CompileResult<CompiledQuery> {
    config.table(&query.table)?;

    if query.fields.is_empty() {
        return Err(CompileError::InvalidConfig(
            "select query must project at least one field".to_string(),
        ));
    }

    let mut state = ParserState::new(config, query.table.clone());

    let mut projections = Vec::with_capacity(query.fields.len());
    for path in &query.fields {
        let resolved = resolve_field_path(path, &state.root_table, state.config)?;
        let column = emit_field_column(&resolved, state.config);
        let column = apply_cast(state.config, &resolved, column, None);
        let alias = field_alias(&resolved, &state.root_table);
        projections.push(format!("{column} AS \"{alias}\""));
    }

    let from = match &config.data_table {
        Some(dt) => format!("{} AS \"{}\"", dt.table, query.table),
        None => query.table.clone(),
    };

    let mut sql = format!("SELECT {} FROM {from}", projections.join(", "));

    for to_table in &query.joins {
        let relationship = config
            .find_relationship(&query.table, to_table)
            .ok_or_else(|| CompileError::InvalidConfig(format!(
                "no relationship connects '{}' and '{to_table}'",
                query.table
            )))?;
        let join_sql = emit_join(config, &query.table, to_table, relationship)?;
        sql.push(' ');
        sql.push_str(&join_sql);
    }

    if let Some(condition) = &query.condition {
        let cond_sql = compile_condition(&mut state, condition)?;
        sql.push_str(" WHERE ");
        sql.push_str(&cond_sql);
    }

    tracing::debug!(sql = %sql, "compiled select query");
    Ok(CompiledQuery { sql, params: state.params })
}
