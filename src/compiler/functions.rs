use crate::config::Dialect;
use crate::error::{CompileError, CompileResult};

pub(crate) fn strip_outer_parens(s: &str) -> &str {
    if s.starts_with('(') && s.ends_with(')') {
        let inner = &s[1..s.len() - 1];
        let mut depth = 0i32;
        for (i, c) in inner.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return s;
                    }
                }
                _ => {}
            }
            let _ = i;
        }
        if depth == 0 {
            return inner;
        }
    }
    s
}

fn plain_call(name: &str, args: &[String]) -> String {
    let cleaned: Vec<&str> = args.iter().map(|a| strip_outer_parens(a)).collect();
    format!("{name}({})", cleaned.join(", "))
}

/// Emits the SQL for a `$func` call, applying dialect-specific lowering for
/// the entries §6 calls out by name. `separator` only applies to
/// `STRING_AGG`.
pub fn emit_function_sql(
    dialect: Dialect,
    name: &str,
    args: &[String],
    separator: Option<&str>,
) -> CompileResult<String> {
    use Dialect::*;

    if matches!(
        (dialect, name),
        (SqliteMinimal, "POW")
            | (SqliteMinimal, "SQRT")
            | (SqliteMinimal, "CEIL")
            | (SqliteMinimal, "FLOOR")
            | (SqliteMinimal, "GEN_RANDOM_UUID")
    ) {
        return Err(CompileError::DialectUnsupportedFunction {
            name: name.to_string(),
            dialect: "sqlite-minimal",
        });
    }

    Ok(match name {
        "AND" => format!("({} AND {})", args[0], args[1]),
        "OR" => format!("({} OR {})", args[0], args[1]),
        "NOT" => format!("(NOT {})", args[0]),

        "ADD" => format!("({} + {})", args[0], args[1]),
        "SUBTRACT" => format!("({} - {})", args[0], args[1]),
        "MULTIPLY" => format!("({} * {})", args[0], args[1]),
        "DIVIDE" => format!("({} / {})", args[0], args[1]),
        "MOD" => plain_call("MOD", args),
        "POW" => plain_call("POWER", args),
        "ABS" => plain_call("ABS", args),
        "SQRT" => plain_call("SQRT", args),
        "CEIL" => plain_call("CEIL", args),
        "FLOOR" => plain_call("FLOOR", args),

        "UPPER" => plain_call("UPPER", args),
        "LOWER" => plain_call("LOWER", args),
        "LENGTH" => plain_call("LENGTH", args),
        "CONCAT" => plain_call("CONCAT", args),
        "SUBSTR" => plain_call("SUBSTR", args),
        "REPLACE" => plain_call("REPLACE", args),

        "NOW" => match dialect {
            Postgresql => "NOW()".to_string(),
            SqliteMinimal => "DATETIME('now','subsec')".to_string(),
        },
        "CURRENT_DATE" => match dialect {
            Postgresql => "CURRENT_DATE".to_string(),
            SqliteMinimal => "DATE()".to_string(),
        },
        "EXTRACT_YEAR" => extract(dialect, "YEAR", "%Y", &args[0]),
        "EXTRACT_MONTH" => extract(dialect, "MONTH", "%m", &args[0]),
        "EXTRACT_DAY" => extract(dialect, "DAY", "%d", &args[0]),
        "EXTRACT_HOUR" => extract(dialect, "HOUR", "%H", &args[0]),
        "EXTRACT_MINUTE" => extract(dialect, "MINUTE", "%M", &args[0]),
        "EXTRACT_EPOCH" => extract(dialect, "EPOCH", "%s", &args[0]),

        "GEN_RANDOM_UUID" => "GEN_RANDOM_UUID()".to_string(),

        "GREATEST_STRING" | "GREATEST_NUMBER" => match dialect {
            Postgresql => plain_call("GREATEST", args),
            SqliteMinimal => plain_call("MAX", args),
        },
        "LEAST_STRING" | "LEAST_NUMBER" => match dialect {
            Postgresql => plain_call("LEAST", args),
            SqliteMinimal => plain_call("MIN", args),
        },
        "COALESCE_STRING" | "COALESCE_NUMBER" | "COALESCE_BOOLEAN" => plain_call("COALESCE", args),

        "STDDEV" => match dialect {
            Postgresql => plain_call("STDDEV", args),
            SqliteMinimal => stddev_closed_form(&args[0]),
        },
        "VARIANCE" => match dialect {
            Postgresql => plain_call("VARIANCE", args),
            SqliteMinimal => variance_closed_form(&args[0]),
        },

        "STRING_AGG" => {
            let sep = separator.unwrap_or(",");
            format!("STRING_AGG({}, '{sep}')", args[0])
        }

        other => return Err(CompileError::UnknownFunction(other.to_string())),
    })
}

fn extract(dialect: Dialect, part: &str, strftime_fmt: &str, arg: &str) -> String {
    match dialect {
        Dialect::Postgresql => format!("EXTRACT({part} FROM {arg})"),
        Dialect::SqliteMinimal => {
            format!("CAST(STRFTIME('{strftime_fmt}', {arg}) AS INTEGER)")
        }
    }
}

fn variance_closed_form(arg: &str) -> String {
    format!("(AVG({arg} * {arg}) - AVG({arg}) * AVG({arg}))")
}

fn stddev_closed_form(arg: &str) -> String {
    format!("SQRT({})", variance_closed_form(arg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_extract_year_lowers_to_strftime() {
        let sql = emit_function_sql(Dialect::SqliteMinimal, "EXTRACT_YEAR", &["x".to_string()], None).unwrap();
        assert_eq!(sql, "CAST(STRFTIME('%Y', x) AS INTEGER)");
    }

    #[test]
    fn sqlite_gen_random_uuid_unsupported() {
        let err = emit_function_sql(Dialect::SqliteMinimal, "GEN_RANDOM_UUID", &[], None).unwrap_err();
        assert!(matches!(err, CompileError::DialectUnsupportedFunction { .. }));
    }

    #[test]
    fn postgres_now_is_native() {
        assert_eq!(emit_function_sql(Dialect::Postgresql, "NOW", &[], None).unwrap(), "NOW()");
    }

    #[test]
    fn strips_redundant_outer_parens_in_plain_call() {
        assert_eq!(plain_call("ABS", &["(x + 1)".to_string()]), "ABS(x + 1)");
    }
}
