//! SQL quoting helpers for the statements the engine builds itself
//!
//! Migration files are executed verbatim; only the version-table statements
//! interpolate values, and they go through these helpers.

/// Quote a SQL identifier, doubling embedded double quotes.
///
/// # Examples
/// ```
/// use tm_core::sql_utils::quote_ident;
/// assert_eq!(quote_ident("_database_version"), r#""_database_version""#);
/// assert_eq!(quote_ident(r#"my"table"#), r#""my""table""#);
/// ```
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Render `value` as a single-quoted SQL string literal.
///
/// # Examples
/// ```
/// use tm_core::sql_utils::quote_literal;
/// assert_eq!(quote_literal("acme"), "'acme'");
/// assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
#[path = "sql_utils_test.rs"]
mod tests;
