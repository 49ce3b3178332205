use crate::config::{Config, Dialect};
use crate::value::{quote_literal, AnyScalar};

/// Per-query mutable workspace threaded through a single compile call:
/// the config being compiled against, the query's root table, the ordered
/// parameter list (PostgreSQL only — SQLite-minimal inlines literals), and
/// the current recursion depth guard.
///
/// Never shared across queries; never long-lived (§3 ParserState).
pub struct ParserState<'a> {
    pub config: &'a Config,
    pub root_table: String,
    pub params: Vec<AnyScalar>,
    depth: usize,
}

/// Suggested maximum nesting depth for expressions/conditions (§5).
pub const MAX_DEPTH: usize = 256;

impl<'a> ParserState<'a> {
    pub fn new(config: &'a Config, root_table: impl Into<String>) -> Self {
        ParserState {
            config,
            root_table: root_table.into(),
            params: Vec::new(),
            depth: 0,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    /// Pushes a scope guard that increments depth on entry and decrements
    /// on drop, so every recursive compile call can simply do
    /// `let _guard = state.enter()?;` at its top.
    pub fn enter(&mut self) -> Result<DepthGuard<'_, 'a>, crate::error::CompileError> {
        if self.depth >= MAX_DEPTH {
            return Err(crate::error::CompileError::DepthExceeded);
        }
        self.depth += 1;
        Ok(DepthGuard { state: self })
    }

    /// Emits a literal scalar as either a PostgreSQL parameter placeholder
    /// or, under SQLite-minimal, the directly quoted/formatted literal.
    pub fn emit_literal(&mut self, scalar: AnyScalar) -> String {
        match self.dialect() {
            Dialect::Postgresql => {
                self.params.push(scalar);
                format!("${}", self.params.len())
            }
            Dialect::SqliteMinimal => format_inline_literal(&scalar),
        }
    }
}

pub struct DepthGuard<'s, 'a> {
    state: &'s mut ParserState<'a>,
}

impl<'s, 'a> std::ops::Deref for DepthGuard<'s, 'a> {
    type Target = ParserState<'a>;
    fn deref(&self) -> &Self::Target {
        self.state
    }
}

impl<'s, 'a> std::ops::DerefMut for DepthGuard<'s, 'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.state
    }
}

impl<'s, 'a> Drop for DepthGuard<'s, 'a> {
    fn drop(&mut self) {
        self.state.depth -= 1;
    }
}

fn format_inline_literal(scalar: &AnyScalar) -> String {
    match scalar {
        AnyScalar::Null => "NULL".to_string(),
        AnyScalar::Bool(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        AnyScalar::Number(n) => crate::value::format_number(*n),
        AnyScalar::String(s) => quote_literal(s),
        AnyScalar::Date(d) => quote_literal(&d.date),
        AnyScalar::Timestamp(t) => quote_literal(&t.timestamp),
        AnyScalar::Uuid(u) => quote_literal(&u.uuid),
        AnyScalar::Jsonb(j) => quote_literal(&j.jsonb.to_string()),
    }
}
