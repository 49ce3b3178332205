use crate::config::Dialect;
use crate::value::ExpressionType;

/// Static description of one registry function's signature. Emission and
/// JS-evaluation semantics live in `emit_sql`/`eval::evaluate_function`
/// respectively — dispatch stays a `match` over the name, per the design
/// note against building a dynamic-dispatch hierarchy for a closed set.
pub struct FunctionSignature {
    pub name: &'static str,
    pub return_type: ExpressionType,
    pub argument_types: &'static [ExpressionType],
    pub variadic: bool,
    pub unsupported_dialects: &'static [Dialect],
}

macro_rules! sig {
    ($name:expr, $ret:expr, [$($arg:expr),* $(,)?], variadic: $variadic:expr, unsupported: [$($d:expr),* $(,)?]) => {
        FunctionSignature {
            name: $name,
            return_type: $ret,
            argument_types: &[$($arg),*],
            variadic: $variadic,
            unsupported_dialects: &[$($d),*],
        }
    };
}

use ExpressionType::*;

pub static REGISTRY: &[FunctionSignature] = &[
    sig!("AND", Boolean, [Boolean, Boolean], variadic: false, unsupported: []),
    sig!("OR", Boolean, [Boolean, Boolean], variadic: false, unsupported: []),
    sig!("NOT", Boolean, [Boolean], variadic: false, unsupported: []),
    sig!("ADD", Number, [Number, Number], variadic: false, unsupported: []),
    sig!("SUBTRACT", Number, [Number, Number], variadic: false, unsupported: []),
    sig!("MULTIPLY", Number, [Number, Number], variadic: false, unsupported: []),
    sig!("DIVIDE", Number, [Number, Number], variadic: false, unsupported: []),
    sig!("MOD", Number, [Number, Number], variadic: false, unsupported: []),
    sig!("POW", Number, [Number, Number], variadic: false, unsupported: [Dialect::SqliteMinimal]),
    sig!("ABS", Number, [Number], variadic: false, unsupported: []),
    sig!("SQRT", Number, [Number], variadic: false, unsupported: [Dialect::SqliteMinimal]),
    sig!("CEIL", Number, [Number], variadic: false, unsupported: [Dialect::SqliteMinimal]),
    sig!("FLOOR", Number, [Number], variadic: false, unsupported: [Dialect::SqliteMinimal]),
    sig!("UPPER", String, [String], variadic: false, unsupported: []),
    sig!("LOWER", String, [String], variadic: false, unsupported: []),
    sig!("LENGTH", Number, [String], variadic: false, unsupported: []),
    sig!("CONCAT", String, [String], variadic: true, unsupported: []),
    sig!("SUBSTR", String, [String, Number, Number], variadic: false, unsupported: []),
    sig!("REPLACE", String, [String, String, String], variadic: false, unsupported: []),
    sig!("NOW", Datetime, [], variadic: false, unsupported: []),
    sig!("CURRENT_DATE", Date, [], variadic: false, unsupported: []),
    sig!("EXTRACT_YEAR", Number, [Datetime], variadic: false, unsupported: []),
    sig!("EXTRACT_MONTH", Number, [Datetime], variadic: false, unsupported: []),
    sig!("EXTRACT_DAY", Number, [Datetime], variadic: false, unsupported: []),
    sig!("EXTRACT_HOUR", Number, [Datetime], variadic: false, unsupported: []),
    sig!("EXTRACT_MINUTE", Number, [Datetime], variadic: false, unsupported: []),
    sig!("EXTRACT_EPOCH", Number, [Datetime], variadic: false, unsupported: []),
    sig!("GEN_RANDOM_UUID", Uuid, [], variadic: false, unsupported: [Dialect::SqliteMinimal]),
    sig!("GREATEST_STRING", String, [String], variadic: true, unsupported: []),
    sig!("GREATEST_NUMBER", Number, [Number], variadic: true, unsupported: []),
    sig!("LEAST_STRING", String, [String], variadic: true, unsupported: []),
    sig!("LEAST_NUMBER", Number, [Number], variadic: true, unsupported: []),
    sig!("COALESCE_STRING", String, [String], variadic: true, unsupported: []),
    sig!("COALESCE_NUMBER", Number, [Number], variadic: true, unsupported: []),
    sig!("COALESCE_BOOLEAN", Boolean, [Boolean], variadic: true, unsupported: []),
    sig!("STDDEV", Number, [Number], variadic: false, unsupported: []),
    sig!("VARIANCE", Number, [Number], variadic: false, unsupported: []),
];

pub fn lookup(name: &str) -> Option<&'static FunctionSignature> {
    REGISTRY.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_is_unique() {
        let mut names: Vec<_> = REGISTRY.iter().map(|f| f.name).collect();
        names.sort_unstable();
        let mut dedup = names.clone();
        dedup.dedup();
        assert_eq!(names.len(), dedup.len());
    }

    #[test]
    fn lookup_finds_known_function() {
        assert!(lookup("CONCAT").is_some());
        assert!(lookup("NOPE").is_none());
    }
}
