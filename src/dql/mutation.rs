//! Mutation syntax check.
//!
//! Accepts `{ set {…} delete {…} }` blocks, the same sections without the
//! outer braces, `upsert { query {…} mutation [@if(…)] {…} }`, and bare
//! N-Quads.

use crate::dql::lexer::{tokenize, Cursor, SyntaxError, Token};
use crate::dql::query::root_blocks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Block,
    Upsert,
    NQuads,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSummary {
    pub kind: MutationKind,
    pub set_quads: usize,
    pub delete_quads: usize,
}

#[derive(Default)]
struct Counts {
    set: usize,
    delete: usize,
}

/// Check a mutation document.
pub fn parse_mutation(input: &str) -> Result<MutationSummary, SyntaxError> {
    let tokens = tokenize(input)?;
    let mut cursor = Cursor::new(&tokens);
    let mut counts = Counts::default();

    if cursor.at_end() {
        return Err(cursor.error("empty mutation"));
    }

    let kind = if cursor.eat_keyword("upsert") {
        upsert(&mut cursor, &mut counts)?;
        MutationKind::Upsert
    } else if cursor.peek() == Some(&Token::LBrace) && starts_section(&cursor, 1) {
        section_block(&mut cursor, &mut counts)?;
        MutationKind::Block
    } else if starts_section(&cursor, 0) {
        while starts_section(&cursor, 0) {
            section(&mut cursor, &mut counts)?;
        }
        MutationKind::Block
    } else {
        counts.set = nquads(&mut cursor, false)?;
        MutationKind::NQuads
    };

    if !cursor.at_end() {
        return Err(cursor.error("unexpected trailing input"));
    }
    if counts.set + counts.delete == 0 {
        return Err(SyntaxError::new("mutation has no N-Quads", 1, 1));
    }

    Ok(MutationSummary {
        kind,
        set_quads: counts.set,
        delete_quads: counts.delete,
    })
}

fn starts_section(cursor: &Cursor<'_>, offset: usize) -> bool {
    matches!(cursor.peek_at(offset), Some(Token::Name(n)) if n == "set" || n == "delete")
        && cursor.peek_at(offset + 1) == Some(&Token::LBrace)
}

/// `{ set {…} delete {…} }`
fn section_block(cursor: &mut Cursor<'_>, counts: &mut Counts) -> Result<(), SyntaxError> {
    cursor.expect(&Token::LBrace)?;
    while !cursor.eat(&Token::RBrace) {
        if !starts_section(cursor, 0) {
            return Err(cursor.error("expected 'set {' or 'delete {'"));
        }
        section(cursor, counts)?;
    }
    Ok(())
}

fn section(cursor: &mut Cursor<'_>, counts: &mut Counts) -> Result<(), SyntaxError> {
    let is_set = cursor.eat_keyword("set");
    if !is_set {
        cursor.expect_name("'set' or 'delete'")?;
    }
    cursor.expect(&Token::LBrace)?;
    let n = nquads(cursor, true)?;
    cursor.expect(&Token::RBrace)?;
    if is_set {
        counts.set += n;
    } else {
        counts.delete += n;
    }
    Ok(())
}

/// `upsert { query {…} mutation [@if(…)] { set {…} } … }` after the keyword.
fn upsert(cursor: &mut Cursor<'_>, counts: &mut Counts) -> Result<(), SyntaxError> {
    cursor.expect(&Token::LBrace)?;
    let mut queries = 0;
    let mut mutations = 0;

    while !cursor.eat(&Token::RBrace) {
        if cursor.eat_keyword("query") {
            let mut names = Vec::new();
            root_blocks(cursor, &mut names)?;
            queries += 1;
        } else if cursor.eat_keyword("mutation") {
            if cursor.eat(&Token::At) {
                if !cursor.eat_keyword("if") {
                    return Err(cursor.error("expected '@if'"));
                }
                if cursor.peek() != Some(&Token::LParen) {
                    return Err(cursor.error("expected '(' after '@if'"));
                }
                cursor.skip_group()?;
            }
            section_block(cursor, counts)?;
            mutations += 1;
        } else {
            return Err(cursor.error("expected 'query' or 'mutation' in upsert block"));
        }
    }

    if queries != 1 {
        return Err(cursor.error("upsert block needs exactly one query"));
    }
    if mutations == 0 {
        return Err(cursor.error("upsert block needs at least one mutation"));
    }
    Ok(())
}

/// N-Quads until end of input, or until `}` when `inside_braces`.
fn nquads(cursor: &mut Cursor<'_>, inside_braces: bool) -> Result<usize, SyntaxError> {
    let mut count = 0;
    loop {
        match cursor.peek() {
            None => break,
            Some(Token::RBrace) if inside_braces => break,
            _ => {
                nquad(cursor)?;
                count += 1;
            }
        }
    }
    Ok(count)
}

/// `subject predicate object [label] [(facets)] .`
fn nquad(cursor: &mut Cursor<'_>) -> Result<(), SyntaxError> {
    match cursor.peek() {
        Some(Token::Iri(_)) | Some(Token::BlankNode(_)) => {
            cursor.bump();
        }
        Some(Token::Name(n)) if n == "uid" => {
            cursor.bump();
            variable_ref(cursor)?;
        }
        _ => return Err(cursor.error("expected subject (IRI, blank node or uid(var))")),
    }

    match cursor.peek() {
        Some(Token::Iri(_)) | Some(Token::Symbol('*')) => {
            cursor.bump();
        }
        _ => return Err(cursor.error("expected predicate IRI or '*'")),
    }

    match cursor.peek() {
        Some(Token::Iri(_)) | Some(Token::BlankNode(_)) | Some(Token::Symbol('*')) => {
            cursor.bump();
        }
        Some(Token::Str(_)) => {
            cursor.bump();
            if cursor.eat(&Token::DataType) {
                match cursor.peek() {
                    Some(Token::Iri(_)) => {
                        cursor.bump();
                    }
                    _ => return Err(cursor.error("expected datatype IRI after '^^'")),
                }
            } else if cursor.eat(&Token::At) {
                cursor.expect_name("language tag")?;
            }
        }
        Some(Token::Name(n)) if n == "uid" || n == "val" => {
            cursor.bump();
            variable_ref(cursor)?;
        }
        _ => return Err(cursor.error("expected object (IRI, blank node, literal, uid(var) or val(var))")),
    }

    if matches!(cursor.peek(), Some(Token::Iri(_))) {
        cursor.bump();
    }
    if cursor.peek() == Some(&Token::LParen) {
        cursor.skip_group()?;
    }
    cursor.expect(&Token::Dot)
}

/// `(name)` after `uid` / `val`.
fn variable_ref(cursor: &mut Cursor<'_>) -> Result<(), SyntaxError> {
    cursor.expect(&Token::LParen)?;
    cursor.expect_name("variable name")?;
    cursor.expect(&Token::RParen)
}
