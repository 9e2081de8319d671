//! SQL-family connectors: dialects that accept a direct `query(sql, params)`
//! call against a pooled connection.

pub mod bigquery;
pub mod clickhouse;
pub mod databricks;
pub mod duckdb;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod rest;
pub mod snowflake;
pub mod trino;

use dqe_db::models::DatasourceType;

use crate::error::{Error, Result};

/// Table and column names cannot be bound as query parameters in any SQL
/// dialect, so every connector validates them against this identifier
/// grammar before interpolating them into SQL text (dotted for
/// `schema.table`). Mirrors the view compiler's identifier check.
pub fn validate_table_ident(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty()
                && part.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::Invalid(format!("invalid table identifier: {name:?}")))
    }
}

/// The positional-parameter placeholder style for one dialect (see the
/// parameter placeholder rule). REST-family dialects that express queries as
/// JSON request bodies rather than driver-bound parameters, and every
/// lakehouse/object-storage dialect, have no placeholder syntax at all.
pub fn placeholder(kind: DatasourceType, index: usize) -> Result<String> {
    match kind {
        DatasourceType::Postgresql | DatasourceType::Duckdb => Ok(format!("${}", index + 1)),
        DatasourceType::Mysql | DatasourceType::Clickhouse => Ok("?".to_owned()),
        DatasourceType::SqlServer => Ok(format!("@p{}", index + 1)),
        DatasourceType::Oracle => Ok(format!(":{}", index + 1)),
        other => Err(Error::Unsupported(format!("{other} has no positional-parameter placeholder syntax"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_styles_match_dialect() {
        assert_eq!(placeholder(DatasourceType::Postgresql, 0).unwrap(), "$1");
        assert_eq!(placeholder(DatasourceType::Mysql, 0).unwrap(), "?");
        assert_eq!(placeholder(DatasourceType::SqlServer, 2).unwrap(), "@p3");
        assert_eq!(placeholder(DatasourceType::Oracle, 1).unwrap(), ":2");
    }

    #[test]
    fn placeholder_is_unsupported_for_rest_and_lakehouse_dialects() {
        assert!(placeholder(DatasourceType::Snowflake, 0).is_err());
        assert!(placeholder(DatasourceType::Iceberg, 0).is_err());
    }

    #[test]
    fn table_ident_accepts_plain_and_schema_qualified() {
        assert!(validate_table_ident("orders").is_ok());
        assert!(validate_table_ident("public.orders").is_ok());
        assert!(validate_table_ident("_hidden").is_ok());
    }

    #[test]
    fn table_ident_rejects_injection_attempts() {
        assert!(validate_table_ident("orders; DROP TABLE users").is_err());
        assert!(validate_table_ident("orders--").is_err());
        assert!(validate_table_ident("").is_err());
        assert!(validate_table_ident("1orders").is_err());
    }
}
