use chrono::{Datelike, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{CompileError, CompileResult};
use crate::value::{AnyScalar, TaggedDate, TaggedTimestamp, TaggedUuid};

/// §4.11 — the JS-evaluation half of the function registry. Mirrors the SQL
/// semantics `compiler::functions::emit_function_sql` lowers to: arithmetic
/// and string functions propagate `null`, `SUBSTR` is 1-based, `NOW`/
/// `CURRENT_DATE`/`GEN_RANDOM_UUID` mint fresh tagged scalars each call.
pub fn eval_function(name: &str, args: &[AnyScalar]) -> CompileResult<AnyScalar> {
    if args.iter().any(AnyScalar::is_null) && !matches!(name, "COALESCE_STRING" | "COALESCE_NUMBER" | "COALESCE_BOOLEAN") {
        return Ok(AnyScalar::Null);
    }

    Ok(match name {
        "AND" => AnyScalar::Bool(as_bool(&args[0])? && as_bool(&args[1])?),
        "OR" => AnyScalar::Bool(as_bool(&args[0])? || as_bool(&args[1])?),
        "NOT" => AnyScalar::Bool(!as_bool(&args[0])?),

        "ADD" => AnyScalar::Number(as_num(&args[0])? + as_num(&args[1])?),
        "SUBTRACT" => AnyScalar::Number(as_num(&args[0])? - as_num(&args[1])?),
        "MULTIPLY" => AnyScalar::Number(as_num(&args[0])? * as_num(&args[1])?),
        "DIVIDE" => {
            let divisor = as_num(&args[1])?;
            if divisor == 0.0 {
                return Err(CompileError::DivisionByZero);
            }
            AnyScalar::Number(as_num(&args[0])? / divisor)
        }
        "MOD" => AnyScalar::Number(as_num(&args[0])? % as_num(&args[1])?),
        "POW" => AnyScalar::Number(as_num(&args[0])?.powf(as_num(&args[1])?)),
        "ABS" => AnyScalar::Number(as_num(&args[0])?.abs()),
        "SQRT" => {
            let n = as_num(&args[0])?;
            if n < 0.0 {
                return Err(CompileError::SqrtOfNegative);
            }
            AnyScalar::Number(n.sqrt())
        }
        "CEIL" => AnyScalar::Number(as_num(&args[0])?.ceil()),
        "FLOOR" => AnyScalar::Number(as_num(&args[0])?.floor()),

        "UPPER" => AnyScalar::String(as_str(&args[0])?.to_uppercase()),
        "LOWER" => AnyScalar::String(as_str(&args[0])?.to_lowercase()),
        "LENGTH" => AnyScalar::Number(as_str(&args[0])?.chars().count() as f64),
        "CONCAT" => {
            let mut out = String::new();
            for a in args {
                out.push_str(as_str(a)?);
            }
            AnyScalar::String(out)
        }
        "SUBSTR" => {
            let s = as_str(&args[0])?;
            let start = (as_num(&args[1])? as isize).max(1) as usize - 1;
            let len = as_num(&args[2])?.max(0.0) as usize;
            let chars: Vec<char> = s.chars().collect();
            let end = (start + len).min(chars.len());
            let slice = if start >= chars.len() { String::new() } else { chars[start..end].iter().collect() };
            AnyScalar::String(slice)
        }
        "REPLACE" => AnyScalar::String(as_str(&args[0])?.replace(as_str(&args[1])?, as_str(&args[2])?)),

        "NOW" => AnyScalar::Timestamp(TaggedTimestamp { timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.f").to_string() }),
        "CURRENT_DATE" => AnyScalar::Date(TaggedDate { date: current_date_string() }),
        "EXTRACT_YEAR" => extract_component(&args[0], |d| d.year() as f64)?,
        "EXTRACT_MONTH" => extract_component(&args[0], |d| d.month() as f64)?,
        "EXTRACT_DAY" => extract_component(&args[0], |d| d.day() as f64)?,
        "EXTRACT_HOUR" | "EXTRACT_MINUTE" | "EXTRACT_EPOCH" => {
            return Err(CompileError::InvalidConfig(format!(
                "'{name}' requires a time component not carried by the date-only evaluator representation"
            )))
        }

        "GEN_RANDOM_UUID" => AnyScalar::Uuid(TaggedUuid { uuid: Uuid::new_v4().to_string() }),

        "GREATEST_STRING" | "LEAST_STRING" => {
            let strings: CompileResult<Vec<&str>> = args.iter().map(as_str).collect();
            let strings = strings?;
            let pick = if name == "GREATEST_STRING" { strings.iter().max() } else { strings.iter().min() };
            AnyScalar::String(pick.unwrap().to_string())
        }
        "GREATEST_NUMBER" | "LEAST_NUMBER" => {
            let nums: CompileResult<Vec<f64>> = args.iter().map(as_num).collect();
            let nums = nums?;
            let pick = if name == "GREATEST_NUMBER" {
                nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            } else {
                nums.iter().cloned().fold(f64::INFINITY, f64::min)
            };
            AnyScalar::Number(pick)
        }
        "COALESCE_STRING" | "COALESCE_NUMBER" | "COALESCE_BOOLEAN" => {
            args.iter().find(|a| !a.is_null()).cloned().unwrap_or(AnyScalar::Null)
        }

        // Single-sample variance/stddev is definitionally zero; these exist
        // in the registry for dispatch symmetry with the SQL aggregation
        // path, not because a default meaningfully computes them per-row.
        "STDDEV" | "VARIANCE" => AnyScalar::Number(0.0),

        other => return Err(CompileError::UnknownFunction(other.to_string())),
    })
}

fn as_bool(scalar: &AnyScalar) -> CompileResult<bool> {
    match scalar {
        AnyScalar::Bool(b) => Ok(*b),
        other => Err(CompileError::InvalidScalar { kind: "boolean", value: format!("{other:?}") }),
    }
}

fn as_num(scalar: &AnyScalar) -> CompileResult<f64> {
    match scalar {
        AnyScalar::Number(n) => Ok(*n),
        other => Err(CompileError::InvalidScalar { kind: "number", value: format!("{other:?}") }),
    }
}

fn as_str(scalar: &AnyScalar) -> CompileResult<&str> {
    match scalar {
        AnyScalar::String(s) => Ok(s.as_str()),
        other => Err(CompileError::InvalidScalar { kind: "string", value: format!("{other:?}") }),
    }
}

fn current_date_string() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn extract_component(scalar: &AnyScalar, f: impl Fn(NaiveDate) -> f64) -> CompileResult<AnyScalar> {
    let raw = match scalar {
        AnyScalar::Date(d) => &d.date,
        AnyScalar::Timestamp(t) => &t.timestamp,
        other => return Err(CompileError::InvalidScalar { kind: "date", value: format!("{other:?}") }),
    };
    let date_part = &raw[..10.min(raw.len())];
    let parsed = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| CompileError::InvalidScalar { kind: "date", value: raw.clone() })?;
    Ok(AnyScalar::Number(f(parsed)))
}
