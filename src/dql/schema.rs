//! Schema syntax check.
//!
//! Predicate definitions look like `name: string @index(exact) @lang .`;
//! type definitions like `type Person { name age }`.

use crate::dql::lexer::{tokenize, Cursor, SyntaxError, Token};

const SCALAR_TYPES: &[&str] = &[
    "default", "int", "float", "string", "bool", "datetime", "geo", "password", "uid", "bigfloat",
    "float32vector",
];

const PREDICATE_DIRECTIVES: &[&str] = &[
    "index", "reverse", "count", "upsert", "lang", "noconflict", "unique",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSummary {
    pub predicates: Vec<String>,
    pub types: Vec<String>,
}

/// Check a schema document.
pub fn parse_schema(input: &str) -> Result<SchemaSummary, SyntaxError> {
    let tokens = tokenize(input)?;
    let mut cursor = Cursor::new(&tokens);
    let mut summary = SchemaSummary::default();

    while !cursor.at_end() {
        if cursor.is_keyword("type") && matches!(cursor.peek_at(1), Some(Token::Name(_))) {
            cursor.bump();
            summary.types.push(type_definition(&mut cursor)?);
        } else {
            summary.predicates.push(predicate_definition(&mut cursor)?);
        }
    }
    Ok(summary)
}

/// `name: [type] @directive(...)* .`
fn predicate_definition(cursor: &mut Cursor<'_>) -> Result<String, SyntaxError> {
    let name = match cursor.peek() {
        Some(Token::Name(name)) | Some(Token::Iri(name)) => name.clone(),
        _ => return Err(cursor.error("expected predicate name or 'type'")),
    };
    cursor.bump();
    cursor.expect(&Token::Colon)?;

    let list = cursor.eat(&Token::LBracket);
    let scalar = cursor.expect_name("predicate type")?;
    if !SCALAR_TYPES.contains(&scalar) {
        return Err(cursor.error(format!("unknown type '{}' for predicate '{}'", scalar, name)));
    }
    if list {
        cursor.expect(&Token::RBracket)?;
    }

    while cursor.eat(&Token::At) {
        let directive = cursor.expect_name("directive name")?;
        if !PREDICATE_DIRECTIVES.contains(&directive) {
            return Err(cursor.error(format!("unknown directive '@{}' on predicate '{}'", directive, name)));
        }
        if cursor.peek() == Some(&Token::LParen) {
            cursor.skip_group()?;
        }
    }

    cursor.expect(&Token::Dot)?;
    Ok(name)
}

/// `Name { field [: type] ... }` after the `type` keyword.
fn type_definition(cursor: &mut Cursor<'_>) -> Result<String, SyntaxError> {
    let name = cursor.expect_name("type name")?.to_string();
    cursor.expect(&Token::LBrace)?;
    while !cursor.eat(&Token::RBrace) {
        match cursor.peek() {
            Some(Token::Name(_)) | Some(Token::Iri(_)) => {
                cursor.bump();
            }
            _ => return Err(cursor.error(format!("expected field name in type '{}'", name))),
        }
        if cursor.eat(&Token::Colon) {
            let list = cursor.eat(&Token::LBracket);
            cursor.expect_name("field type")?;
            if list {
                cursor.expect(&Token::RBracket)?;
            }
        }
        cursor.eat(&Token::Comma);
    }
    Ok(name)
}
