//! # Naming Rules and the Generated Naming Contract
//!
//! Identifier predicates used by descriptor validation, plus the name
//! derivations other layers rely on (`select<Name>` for pure selectors,
//! `use<Name>` for hook selectors, qualified container accessors).

use heck::{ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};

/// True if `s` is a plain identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// True if `s` is a PascalCase identifier (table names).
pub fn is_pascal_case(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_uppercase()) && is_identifier(s)
}

/// True if `s` is a lowerCamel identifier (container and collection names).
pub fn is_lower_camel(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_lowercase()) && is_identifier(s)
}

/// True if `s` matches the cross-source selector convention
/// `select` followed by an uppercase letter: `^select[A-Z]\w*$`.
pub fn is_selector_name(s: &str) -> bool {
    match s.strip_prefix("select") {
        Some(rest) => rest.starts_with(|c: char| c.is_ascii_uppercase()) && is_identifier(rest),
        None => false,
    }
}

/// Exported accessor for a container-local selector: `select<Container><Selector>`.
///
/// Foreign containers reference each other only through this name, never
/// through a raw state path.
pub fn container_selector_accessor(container: &str, selector: &str) -> String {
    format!(
        "select{}{}",
        container.to_upper_camel_case(),
        selector.to_upper_camel_case()
    )
}

/// Exported factory for a parameterized container selector.
pub fn parameterized_selector_factory(container: &str, selector: &str) -> String {
    format!(
        "makeSelect{}{}",
        container.to_upper_camel_case(),
        selector.to_upper_camel_case()
    )
}

/// Hook name for a reactive-hook derivation: `selectActiveOrders` -> `useActiveOrders`.
pub fn hook_name(selector_name: &str) -> String {
    let stem = selector_name.strip_prefix("select").unwrap_or(selector_name);
    format!("use{stem}")
}

/// File stem for a cross-source selector: `selectActiveOrders` -> `activeOrders`.
pub fn selector_file_stem(selector_name: &str) -> String {
    let stem = selector_name.strip_prefix("select").unwrap_or(selector_name);
    stem.to_lower_camel_case()
}

/// File stem for a table: `OrderItem` -> `orderItem`.
pub fn table_file_stem(table_name: &str) -> String {
    table_name.to_lower_camel_case()
}

/// SQL table name for a table descriptor: `OrderItem` -> `order_item`.
pub fn sql_table_name(table_name: &str) -> String {
    table_name.to_snake_case()
}

/// DDL constant name for a table: `OrderItem` -> `ORDER_ITEM_TABLE_SQL`.
pub fn sql_const_name(table_name: &str) -> String {
    format!("{}_TABLE_SQL", table_name.to_shouty_snake_case())
}

/// Pascal-case a name for use inside derived identifiers.
pub fn pascal(name: &str) -> String {
    name.to_upper_camel_case()
}
