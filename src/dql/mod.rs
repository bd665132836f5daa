//! Offline DQL syntax validation.
//!
//! Used by the `/validate/*` routes; nothing here talks to a database node.
//!
//! # Data Flow
//! ```text
//! text
//!     → lexer.rs (tokens with line/column)
//!     → query.rs | mutation.rs | schema.rs (recursive descent checks)
//!     → Validation (what the text turned out to be) or a located SyntaxError
//! ```

pub mod lexer;
pub mod mutation;
pub mod query;
pub mod schema;

use thiserror::Error;

pub use lexer::SyntaxError;

/// What a DQL document was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Query,
    Mutation,
}

impl Validation {
    /// Label used in validation replies.
    pub fn label(&self) -> &'static str {
        match self {
            Validation::Query => "dql",
            Validation::Mutation => "mutation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DqlError {
    #[error("Failed to parse DQL. Query error: {query}. Mutation error: {mutation}")]
    Unparsable {
        query: SyntaxError,
        mutation: SyntaxError,
    },

    #[error("{0}")]
    Schema(SyntaxError),

    #[error("schema defines no predicates")]
    NoPredicates,
}

/// Check `text` as a query first, then as a mutation.
pub fn validate_dql(text: &str) -> Result<Validation, DqlError> {
    let query = match query::parse_query(text) {
        Ok(_) => return Ok(Validation::Query),
        Err(e) => e,
    };
    match mutation::parse_mutation(text) {
        Ok(_) => Ok(Validation::Mutation),
        Err(mutation) => Err(DqlError::Unparsable { query, mutation }),
    }
}

/// Check a schema; at least one predicate definition is required.
pub fn validate_schema(text: &str) -> Result<schema::SchemaSummary, DqlError> {
    let summary = schema::parse_schema(text).map_err(DqlError::Schema)?;
    if summary.predicates.is_empty() {
        return Err(DqlError::NoPredicates);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_recognised() {
        assert_eq!(validate_dql("{ me(func: has(name)) { uid name } }"), Ok(Validation::Query));
    }

    #[test]
    fn mutation_is_recognised() {
        assert_eq!(validate_dql("{ set { _:a <name> \"x\" . } }"), Ok(Validation::Mutation));
    }

    #[test]
    fn garbage_reports_both_errors() {
        let err = validate_dql(r#"<0x1> name = "bad syntax""#).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Failed to parse DQL. Query error: "));
        assert!(message.contains("Mutation error: "));
    }

    #[test]
    fn schema_needs_predicates() {
        assert_eq!(validate_schema("type Person { name }"), Err(DqlError::NoPredicates));
        assert!(validate_schema("name: string .").is_ok());
        assert!(matches!(validate_schema("name string ."), Err(DqlError::Schema(_))));
    }
}
