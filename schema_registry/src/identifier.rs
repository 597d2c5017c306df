//! Identifier validation
//!
//! Validated SQL identifiers for table, column, and alias names.

use std::fmt;

use thiserror::Error;

/// Validation errors for database identifiers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdentifierError {
    #[error("invalid characters in identifier '{0}': only alphanumeric characters and underscores are allowed")]
    InvalidCharacters(String),

    #[error("identifier '{name}' is too long: {length} characters (max {max_length})")]
    TooLong {
        name: String,
        length: usize,
        max_length: usize,
    },

    #[error("identifier cannot be empty")]
    Empty,

    #[error("identifier '{0}' must start with a letter or underscore")]
    InvalidStartCharacter(String),

    #[error("identifier '{0}' is a reserved SQL keyword")]
    ReservedKeyword(String),
}

/// Reserved words that would require quoting tricks or read ambiguously
/// in generated SQL. Deliberately a short list of the common offenders,
/// not the full PostgreSQL grammar.
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "and", "any", "as", "asc", "between", "by", "case", "check", "column", "constraint",
    "create", "cross", "default", "delete", "desc", "distinct", "drop", "else", "end", "except",
    "exists", "foreign", "from", "full", "group", "having", "in", "inner", "insert", "intersect",
    "into", "is", "join", "left", "like", "limit", "not", "null", "offset", "on", "or", "order",
    "outer", "primary", "references", "right", "select", "set", "table", "then", "union",
    "unique", "update", "using", "values", "when", "where",
];

/// A validated SQL identifier that is safe to embed in generated SQL.
///
/// Validation enforces the PostgreSQL 63-character limit, the
/// letter-or-underscore start rule, and an alphanumeric/underscore
/// charset; the quoted form is emitted with surrounding double quotes
/// so reserved-adjacent spellings stay unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SqlIdentifier(String);

impl SqlIdentifier {
    /// PostgreSQL identifier length limit
    const MAX_LENGTH: usize = 63;

    pub fn new(name: &str) -> Result<Self, IdentifierError> {
        if name.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if name.len() > Self::MAX_LENGTH {
            return Err(IdentifierError::TooLong {
                name: name.to_string(),
                length: name.len(),
                max_length: Self::MAX_LENGTH,
            });
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(IdentifierError::InvalidCharacters(name.to_string()));
        }
        let first = name.chars().next().ok_or(IdentifierError::Empty)?;
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(IdentifierError::InvalidStartCharacter(name.to_string()));
        }
        if RESERVED_KEYWORDS.contains(&name.to_ascii_lowercase().as_str()) {
            return Err(IdentifierError::ReservedKeyword(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for use in SQL text.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for SqlIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(SqlIdentifier::new("users").is_ok());
        assert!(SqlIdentifier::new("_private").is_ok());
        assert!(SqlIdentifier::new("blog_post_2").is_ok());
    }

    #[test]
    fn test_empty_identifier() {
        assert_eq!(SqlIdentifier::new(""), Err(IdentifierError::Empty));
    }

    #[test]
    fn test_invalid_characters() {
        assert!(matches!(
            SqlIdentifier::new("users; DROP TABLE"),
            Err(IdentifierError::InvalidCharacters(_))
        ));
        assert!(matches!(
            SqlIdentifier::new("user-name"),
            Err(IdentifierError::InvalidCharacters(_))
        ));
    }

    #[test]
    fn test_invalid_start_character() {
        assert!(matches!(
            SqlIdentifier::new("1users"),
            Err(IdentifierError::InvalidStartCharacter(_))
        ));
    }

    #[test]
    fn test_too_long() {
        let long = "a".repeat(64);
        assert!(matches!(
            SqlIdentifier::new(&long),
            Err(IdentifierError::TooLong { length: 64, .. })
        ));
        assert!(SqlIdentifier::new(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_reserved_keyword() {
        assert!(matches!(
            SqlIdentifier::new("select"),
            Err(IdentifierError::ReservedKeyword(_))
        ));
        assert!(matches!(
            SqlIdentifier::new("TABLE"),
            Err(IdentifierError::ReservedKeyword(_))
        ));
    }

    #[test]
    fn test_quoted() {
        let id = SqlIdentifier::new("email").unwrap();
        assert_eq!(id.quoted(), "\"email\"");
        assert_eq!(id.as_str(), "email");
    }
}
