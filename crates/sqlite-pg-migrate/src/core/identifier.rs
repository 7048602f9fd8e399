//! Identifier validation and quoting for dynamically built SQL.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! statement that names a table or column is built with these helpers. Both
//! SQLite and PostgreSQL quote identifiers with double quotes.

use crate::error::{MigrateError, Result};

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier declared in configuration.
///
/// Rejects empty names, names containing null bytes and names PostgreSQL
/// would silently truncate.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Validate a column type definition declared in configuration.
///
/// Column definitions are pasted into `CREATE TABLE`, so anything that could
/// end the statement or comment out the rest of it is rejected.
pub fn validate_column_type(definition: &str) -> Result<()> {
    if definition.trim().is_empty() {
        return Err(MigrateError::Config("Column type cannot be empty".to_string()));
    }

    if definition.contains(';') {
        return Err(MigrateError::Config(format!(
            "Column type contains semicolon: {:?}",
            definition
        )));
    }

    if definition.contains("--") || definition.contains("/*") || definition.contains("*/") {
        return Err(MigrateError::Config(format!(
            "Column type contains SQL comment markers: {:?}",
            definition
        )));
    }

    Ok(())
}

/// Quote an identifier with double quotes, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with its schema.
pub fn qualify(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("matches"), "\"matches\"");
        assert_eq!(quote_ident("cross"), "\"cross\"");
        assert_eq!(quote_ident("table\"name"), "\"table\"\"name\"");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("public", "players"), "\"public\".\"players\"");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("home_player_1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("bad\0name").is_err());
        assert!(validate_identifier(&"x".repeat(64)).is_err());
        assert!(validate_identifier(&"x".repeat(63)).is_ok());
    }

    #[test]
    fn test_validate_column_type() {
        assert!(validate_column_type("NUMERIC").is_ok());
        assert!(validate_column_type("SERIAL PRIMARY KEY").is_ok());
        assert!(validate_column_type("").is_err());
        assert!(validate_column_type("TEXT; DROP TABLE players").is_err());
        assert!(validate_column_type("TEXT -- trailing").is_err());
        assert!(validate_column_type("TEXT /* c */").is_err());
    }
}
