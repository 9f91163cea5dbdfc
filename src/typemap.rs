//! # Type Mapping Tables
//!
//! Fixed mappings from abstract descriptor types to TypeScript types,
//! zod schema expressions, SQL column types, and default-value literals.

use crate::descriptor::{FieldType, StatePrimitive, StateValueType};

/// TypeScript type for a scalar field type.
pub fn ts_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String | FieldType::Date | FieldType::Datetime | FieldType::Uuid => "string",
        FieldType::Number => "number",
        FieldType::Boolean => "boolean",
        FieldType::Json => "unknown",
    }
}

/// Base zod expression for a scalar field type, before constraint folding.
pub fn zod_expr(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String => "z.string()",
        FieldType::Number => "z.number()",
        FieldType::Boolean => "z.boolean()",
        FieldType::Date => "z.string().date()",
        FieldType::Datetime => "z.string().datetime()",
        FieldType::Json => "z.unknown()",
        FieldType::Uuid => "z.string().uuid()",
    }
}

/// SQL column type for a scalar field type.
pub fn sql_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String => "TEXT",
        FieldType::Number => "NUMERIC",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Date => "DATE",
        FieldType::Datetime => "TIMESTAMPTZ",
        FieldType::Json => "JSONB",
        FieldType::Uuid => "UUID",
    }
}

fn primitive_ts(p: StatePrimitive) -> &'static str {
    match p {
        StatePrimitive::String => "string",
        StatePrimitive::Number => "number",
        StatePrimitive::Boolean => "boolean",
    }
}

/// TypeScript type for a state value type. Entity lists reference the
/// structural types emitted by the Table Compiler.
pub fn state_ts_type(ty: &StateValueType) -> String {
    match ty {
        StateValueType::Primitive(p) => primitive_ts(*p).to_string(),
        StateValueType::List { list } => {
            let inner = state_ts_type(list);
            if inner.contains('|') {
                format!("({inner})[]")
            } else {
                format!("{inner}[]")
            }
        }
        StateValueType::EntityList { array_of } => format!("{array_of}[]"),
        StateValueType::Record { record } => {
            let (key, value) = record;
            format!("Record<{}, {}>", primitive_ts(*key), state_ts_type(value))
        }
        StateValueType::Nullable { nullable } => format!("{} | null", state_ts_type(nullable)),
    }
}

/// Type-table default for a state value type when the descriptor gives
/// no explicit default: `"" / 0 / false / [] / {} / null`.
pub fn state_default_literal(ty: &StateValueType) -> &'static str {
    match ty {
        StateValueType::Primitive(StatePrimitive::String) => "\"\"",
        StateValueType::Primitive(StatePrimitive::Number) => "0",
        StateValueType::Primitive(StatePrimitive::Boolean) => "false",
        StateValueType::List { .. } | StateValueType::EntityList { .. } => "[]",
        StateValueType::Record { .. } => "{}",
        StateValueType::Nullable { .. } => "null",
    }
}

/// Render a JSON value as a TypeScript literal. JSON literal syntax is a
/// subset of TypeScript expression syntax, so this is a direct encode.
pub fn ts_literal(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Render a JSON value as a SQL literal for DDL `DEFAULT` clauses.
pub fn sql_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(true) => "TRUE".to_string(),
        serde_json::Value::Bool(false) => "FALSE".to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// Format a constraint bound without a trailing `.0` for whole numbers.
pub fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_tables_are_consistent() {
        assert_eq!(ts_type(FieldType::Uuid), "string");
        assert_eq!(zod_expr(FieldType::Datetime), "z.string().datetime()");
        assert_eq!(sql_type(FieldType::Json), "JSONB");
    }

    #[test]
    fn state_defaults_follow_the_type_table() {
        let nullable = StateValueType::Nullable {
            nullable: Box::new(StateValueType::Primitive(StatePrimitive::String)),
        };
        assert_eq!(state_default_literal(&nullable), "null");
        assert_eq!(state_ts_type(&nullable), "string | null");

        let list = StateValueType::List {
            list: Box::new(nullable),
        };
        assert_eq!(state_default_literal(&list), "[]");
        assert_eq!(state_ts_type(&list), "(string | null)[]");
    }

    #[test]
    fn literals_escape_correctly() {
        assert_eq!(ts_literal(&json!("it's")), "\"it's\"");
        assert_eq!(sql_literal(&json!("it's")), "'it''s'");
        assert_eq!(sql_literal(&json!(false)), "FALSE");
        assert_eq!(fmt_number(10.0), "10");
        assert_eq!(fmt_number(0.5), "0.5");
    }
}
