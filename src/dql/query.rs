//! Query syntax check.
//!
//! Accepts `{ block ... }`, `query name($v: type) { block ... }`,
//! `schema {}` / `schema(...) { ... }` and `fragment` definitions. Every root
//! block must call a root function through `func:`.

use crate::dql::lexer::{tokenize, Cursor, SyntaxError, Token};

/// What a successfully checked query contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySummary {
    /// Root block names in source order (`var` blocks included).
    pub blocks: Vec<String>,
    /// Number of schema requests.
    pub schema_requests: usize,
}

impl QuerySummary {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.schema_requests == 0
    }
}

/// Check a full query document.
pub fn parse_query(input: &str) -> Result<QuerySummary, SyntaxError> {
    let tokens = tokenize(input)?;
    let mut cursor = Cursor::new(&tokens);
    let mut summary = QuerySummary::default();

    if cursor.at_end() {
        return Err(cursor.error("empty query"));
    }

    while !cursor.at_end() {
        if cursor.eat_keyword("schema") {
            schema_request(&mut cursor)?;
            summary.schema_requests += 1;
        } else if cursor.eat_keyword("fragment") {
            cursor.expect_name("fragment name")?;
            selection_set(&mut cursor)?;
        } else if cursor.eat_keyword("query") {
            if matches!(cursor.peek(), Some(Token::Name(_))) {
                cursor.bump();
            }
            if cursor.peek() == Some(&Token::LParen) {
                cursor.skip_group()?;
            }
            root_blocks(&mut cursor, &mut summary.blocks)?;
        } else if cursor.peek() == Some(&Token::LBrace) {
            root_blocks(&mut cursor, &mut summary.blocks)?;
        } else {
            return Err(cursor.error("expected '{', 'query' or 'schema'"));
        }
    }

    if summary.is_empty() {
        return Err(SyntaxError::new("query has no blocks", 1, 1));
    }
    Ok(summary)
}

/// `{ block ... }` at the root of a query or inside an upsert.
pub(crate) fn root_blocks(cursor: &mut Cursor<'_>, names: &mut Vec<String>) -> Result<(), SyntaxError> {
    cursor.expect(&Token::LBrace)?;
    let before = names.len();
    while !cursor.eat(&Token::RBrace) {
        if cursor.at_end() {
            return Err(cursor.error("expected '}'"));
        }
        names.push(root_block(cursor)?);
        cursor.eat(&Token::Comma);
    }
    if names.len() == before {
        return Err(cursor.error("query block is empty"));
    }
    Ok(())
}

/// `[var as] name(func: f(...), first: n) @directive(...) { fields }`
fn root_block(cursor: &mut Cursor<'_>) -> Result<String, SyntaxError> {
    let mut name = cursor.expect_name("block name")?.to_string();
    if cursor.eat_keyword("as") {
        name = cursor.expect_name("block name after 'as'")?.to_string();
    }

    cursor.expect(&Token::LParen)?;
    let mut has_func = false;
    loop {
        let key = cursor.expect_name("argument name")?;
        cursor.expect(&Token::Colon)?;
        if key == "func" {
            has_func = true;
            function_call(cursor)?;
        } else {
            argument_value(cursor)?;
        }
        if cursor.eat(&Token::RParen) {
            break;
        }
        cursor.expect(&Token::Comma)?;
    }
    if !has_func {
        return Err(cursor.error(format!("root block '{}' is missing func:", name)));
    }

    directives(cursor)?;
    selection_set(cursor)?;
    Ok(name)
}

/// `name(args...)`
fn function_call(cursor: &mut Cursor<'_>) -> Result<(), SyntaxError> {
    cursor.expect_name("function name")?;
    if cursor.peek() != Some(&Token::LParen) {
        return Err(cursor.error("expected '(' after function name"));
    }
    cursor.skip_group()
}

/// A single argument value up to the next `,` or `)` at this level.
fn argument_value(cursor: &mut Cursor<'_>) -> Result<(), SyntaxError> {
    let mut consumed = false;
    loop {
        match cursor.peek() {
            None => return Err(cursor.error("unterminated argument list")),
            Some(Token::Comma) | Some(Token::RParen) if consumed => return Ok(()),
            Some(Token::Comma) | Some(Token::RParen) => return Err(cursor.error("expected argument value")),
            Some(Token::LParen) | Some(Token::LBracket) | Some(Token::LBrace) => cursor.skip_group()?,
            Some(Token::RBrace) | Some(Token::RBracket) => return Err(cursor.error("unbalanced brackets")),
            Some(_) => {
                cursor.bump();
            }
        }
        consumed = true;
    }
}

/// Zero or more `@name` / `@name(...)`.
fn directives(cursor: &mut Cursor<'_>) -> Result<(), SyntaxError> {
    while cursor.eat(&Token::At) {
        cursor.expect_name("directive name")?;
        if cursor.peek() == Some(&Token::LParen) {
            cursor.skip_group()?;
        }
    }
    Ok(())
}

/// `{ field ... }`
fn selection_set(cursor: &mut Cursor<'_>) -> Result<(), SyntaxError> {
    cursor.expect(&Token::LBrace)?;
    cursor.descend()?;
    while !cursor.eat(&Token::RBrace) {
        if cursor.at_end() {
            return Err(cursor.error("expected '}'"));
        }
        field(cursor)?;
        cursor.eat(&Token::Comma);
    }
    cursor.ascend();
    Ok(())
}

/// `[var as] [alias :] predicate[@lang] [(args) | @directive...] [{ fields }]`
fn field(cursor: &mut Cursor<'_>) -> Result<(), SyntaxError> {
    if cursor.peek() == Some(&Token::Dot) {
        // fragment spread: `...name`
        while cursor.eat(&Token::Dot) {}
        cursor.expect_name("fragment name")?;
        return Ok(());
    }

    if matches!(cursor.peek(), Some(Token::Name(_))) && matches!(cursor.peek_at(1), Some(Token::Name(n)) if n == "as") {
        cursor.bump();
        cursor.bump();
    }
    if matches!(cursor.peek(), Some(Token::Name(_))) && cursor.peek_at(1) == Some(&Token::Colon) {
        cursor.bump();
        cursor.bump();
    }

    match cursor.peek() {
        Some(Token::Name(_)) | Some(Token::Iri(_)) => {
            cursor.bump();
        }
        _ => return Err(cursor.error("expected predicate")),
    }

    if cursor.peek() == Some(&Token::At) && matches!(cursor.peek_at(1), Some(Token::Name(n)) if is_language_tag(n)) {
        cursor.bump();
        cursor.bump();
        while cursor.eat(&Token::Colon) {
            if !cursor.eat(&Token::Dot) {
                cursor.expect_name("language tag")?;
            }
        }
    }
    loop {
        match cursor.peek() {
            Some(Token::LParen) => cursor.skip_group()?,
            Some(Token::At) => directives(cursor)?,
            _ => break,
        }
    }
    if cursor.peek() == Some(&Token::LBrace) {
        selection_set(cursor)?;
    }
    Ok(())
}

/// Directive names that can follow a predicate; anything else after `@` is a language tag.
const FIELD_DIRECTIVES: &[&str] = &[
    "filter", "facets", "cascade", "normalize", "recurse", "groupby", "ignorereflex", "lang",
];

fn is_language_tag(name: &str) -> bool {
    !FIELD_DIRECTIVES.contains(&name)
}

/// `schema {}` / `schema(pred: [a, b]) { type index }` after the keyword.
fn schema_request(cursor: &mut Cursor<'_>) -> Result<(), SyntaxError> {
    if cursor.peek() == Some(&Token::LParen) {
        cursor.skip_group()?;
    }
    cursor.expect(&Token::LBrace)?;
    while !cursor.eat(&Token::RBrace) {
        cursor.expect_name("schema field")?;
        cursor.eat(&Token::Comma);
    }
    Ok(())
}
