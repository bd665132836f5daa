//! Tokenizer shared by the query, mutation and schema checkers.

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, take_till, take_while1};
use nom::character::complete::{anychar, char, multispace1, satisfy};
use nom::combinator::{cut, map, opt, recognize, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{IResult, Parser};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Dot,
    At,
    /// `^^` before a literal's datatype IRI.
    DataType,
    /// Any other single punctuation character (`*`, `=`, `+`, ...).
    Symbol(char),
    Name(String),
    /// `<...>` without the angle brackets.
    Iri(String),
    /// Quoted literal, unescaped.
    Str(String),
    Number(String),
    /// `_:label` without the prefix.
    BlankNode(String),
    /// `$name` without the sigil.
    Variable(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Colon => write!(f, "':'"),
            Token::Comma => write!(f, "','"),
            Token::Dot => write!(f, "'.'"),
            Token::At => write!(f, "'@'"),
            Token::DataType => write!(f, "'^^'"),
            Token::Symbol(c) => write!(f, "'{}'", c),
            Token::Name(n) => write!(f, "name '{}'", n),
            Token::Iri(i) => write!(f, "IRI <{}>", i),
            Token::Str(s) => write!(f, "string {:?}", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::BlankNode(b) => write!(f, "blank node _:{}", b),
            Token::Variable(v) => write!(f, "variable ${}", v),
        }
    }
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line} column {column}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

type Lex<'a, T> = IResult<&'a str, T>;

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '~'
}

/// Whitespace and `#` comments running to end of line.
fn trivia(input: &str) -> Lex<'_, ()> {
    value(
        (),
        many0(alt((multispace1, preceded(char('#'), take_till(|c: char| c == '\n'))))),
    )
    .parse(input)
}

/// Quoted literal; once the opening quote is seen, anything but a closing
/// quote on the same line is an unterminated string.
fn quoted<'a>(
    quote: char,
    stop: &'static str,
) -> impl Parser<&'a str, Output = Token, Error = nom::error::Error<&'a str>> {
    map(
        preceded(
            char(quote),
            cut(terminated(
                opt(escaped_transform(
                    is_not(stop),
                    '\\',
                    alt((
                        value('\n', char('n')),
                        value('\t', char('t')),
                        value('\r', char('r')),
                        anychar,
                    )),
                )),
                char(quote),
            )),
        ),
        |text: Option<String>| Token::Str(text.unwrap_or_default()),
    )
}

fn string_literal(input: &str) -> Lex<'_, Token> {
    alt((quoted('"', "\\\"\n"), quoted('\'', "\\'\n"))).parse(input)
}

fn iri(input: &str) -> Lex<'_, Token> {
    map(
        delimited(char('<'), take_while1(|c: char| c != '>' && !c.is_whitespace()), char('>')),
        |iri: &str| Token::Iri(iri.to_string()),
    )
    .parse(input)
}

fn blank_node(input: &str) -> Lex<'_, Token> {
    map(
        preceded(tag("_:"), cut(take_while1(|c: char| is_name_char(c) || c == '-'))),
        |label: &str| Token::BlankNode(label.to_string()),
    )
    .parse(input)
}

fn variable(input: &str) -> Lex<'_, Token> {
    map(preceded(char('$'), cut(take_while1(is_name_char))), |name: &str| {
        Token::Variable(name.to_string())
    })
    .parse(input)
}

/// Digits first; then alphanumerics (`0x1f`) and `.` only when a digit follows.
fn number(input: &str) -> Lex<'_, Token> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_digit()),
            many0(alt((
                take_while1(|c: char| c.is_ascii_alphanumeric()),
                recognize(pair(char('.'), satisfy(|c| c.is_ascii_digit()))),
            ))),
        )),
        |n: &str| Token::Number(n.to_string()),
    )
    .parse(input)
}

/// Names may be dotted (`dgraph.type`) but never end in a dot.
fn name(input: &str) -> Lex<'_, Token> {
    map(
        recognize(pair(
            take_while1(is_name_char),
            many0(alt((
                take_while1(is_name_char),
                recognize(pair(char('.'), satisfy(is_name_char))),
            ))),
        )),
        |n: &str| Token::Name(n.to_string()),
    )
    .parse(input)
}

fn punctuation(input: &str) -> Lex<'_, Token> {
    map(satisfy(|c| c.is_ascii_punctuation()), |c| match c {
        '{' => Token::LBrace,
        '}' => Token::RBrace,
        '(' => Token::LParen,
        ')' => Token::RParen,
        '[' => Token::LBracket,
        ']' => Token::RBracket,
        ':' => Token::Colon,
        ',' => Token::Comma,
        '.' => Token::Dot,
        '@' => Token::At,
        other => Token::Symbol(other),
    })
    .parse(input)
}

fn any_token(input: &str) -> Lex<'_, Token> {
    alt((
        value(Token::DataType, tag("^^")),
        string_literal,
        iri,
        blank_node,
        variable,
        number,
        name,
        punctuation,
    ))
    .parse(input)
}

/// 1-based line and column of the next unread character.
#[derive(Debug, Clone, Copy)]
struct Position {
    line: usize,
    column: usize,
}

impl Position {
    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

fn lex_error(rest: &str, at: Position) -> SyntaxError {
    let message = match rest.chars().next() {
        Some('"' | '\'') => "unterminated string".to_string(),
        Some('_') if rest.starts_with("_:") => "empty blank node label".to_string(),
        Some('$') => "empty variable name".to_string(),
        Some(other) => format!("unexpected character {:?}", other),
        None => "unexpected end of input".to_string(),
    };
    SyntaxError::new(message, at.line, at.column)
}

/// Split DQL text into tokens. `#` starts a comment running to end of line.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut at = Position { line: 1, column: 1 };
    let mut rest = input;

    loop {
        let after = trivia(rest).map_or(rest, |(after, ())| after);
        at.advance(&rest[..rest.len() - after.len()]);
        if after.is_empty() {
            return Ok(tokens);
        }

        let (next, token) = any_token(after).map_err(|_| lex_error(after, at))?;
        tokens.push(Spanned {
            token,
            line: at.line,
            column: at.column,
        });
        at.advance(&after[..after.len() - next.len()]);
        rest = next;
    }
}

/// Read position over a token list, with the helpers every checker needs.
#[derive(Debug)]
pub struct Cursor<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

/// Deepest selection nesting a checker will follow.
pub const MAX_NESTING: usize = 256;

impl<'a> Cursor<'a> {
    pub fn new(tokens: &'a [Spanned]) -> Self {
        Self { tokens, pos: 0, depth: 0 }
    }

    /// Enter one nested level; fails past [`MAX_NESTING`].
    pub fn descend(&mut self) -> Result<(), SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    pub fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    pub fn bump(&mut self) -> Option<&'a Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// True (and consumed) when the next token equals `token`.
    pub fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// True (and consumed) when the next token is the keyword `word`.
    pub fn eat_keyword(&mut self, word: &str) -> bool {
        if self.is_keyword(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == word)
    }

    pub fn expect(&mut self, token: &Token) -> Result<(), SyntaxError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", token)))
        }
    }

    pub fn expect_name(&mut self, what: &str) -> Result<&'a str, SyntaxError> {
        match self.peek() {
            Some(Token::Name(name)) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected {}", what))),
        }
    }

    /// Consume a bracketed group starting at the current opening token,
    /// including everything nested inside it.
    pub fn skip_group(&mut self) -> Result<(), SyntaxError> {
        let mut stack: Vec<Token> = Vec::new();
        loop {
            let Some(token) = self.peek() else {
                return Err(self.error("unbalanced brackets"));
            };
            match token {
                Token::LParen => stack.push(Token::RParen),
                Token::LBrace => stack.push(Token::RBrace),
                Token::LBracket => stack.push(Token::RBracket),
                Token::RParen | Token::RBrace | Token::RBracket => {
                    if stack.pop().as_ref() != Some(token) {
                        return Err(self.error(format!("unexpected {}", token)));
                    }
                }
                _ if stack.is_empty() => return Err(self.error(format!("expected a group, found {}", token))),
                _ => {}
            }
            self.pos += 1;
            if stack.is_empty() {
                return Ok(());
            }
        }
    }

    /// Error located at the current token (or the end of input).
    pub fn error(&self, message: impl Into<String>) -> SyntaxError {
        let message = message.into();
        match self.tokens.get(self.pos) {
            Some(s) => SyntaxError::new(format!("{}, found {}", message, s.token), s.line, s.column),
            None => {
                let (line, column) = self
                    .tokens
                    .last()
                    .map(|s| (s.line, s.column))
                    .unwrap_or((1, 1));
                SyntaxError::new(format!("{}, found end of input", message), line, column)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn nquad_tokens() {
        assert_eq!(
            kinds(r#"_:a <name> "Al\"ice"@en . # trailing"#),
            vec![
                Token::BlankNode("a".into()),
                Token::Iri("name".into()),
                Token::Str("Al\"ice".into()),
                Token::At,
                Token::Name("en".into()),
                Token::Dot,
            ]
        );
    }

    #[test]
    fn dotted_names_and_terminators() {
        assert_eq!(
            kinds("dgraph.type: [string] ."),
            vec![
                Token::Name("dgraph.type".into()),
                Token::Colon,
                Token::LBracket,
                Token::Name("string".into()),
                Token::RBracket,
                Token::Dot,
            ]
        );
        assert_eq!(kinds("0x1f 1.5"), vec![Token::Number("0x1f".into()), Token::Number("1.5".into())]);
    }

    #[test]
    fn datatypes_variables_and_symbols() {
        assert_eq!(
            kinds(r#""5"^^<xs:int> $v * ="#),
            vec![
                Token::Str("5".into()),
                Token::DataType,
                Token::Iri("xs:int".into()),
                Token::Variable("v".into()),
                Token::Symbol('*'),
                Token::Symbol('='),
            ]
        );
    }

    #[test]
    fn positions_and_errors() {
        let tokens = tokenize("{\n  me").unwrap();
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));

        let err = tokenize("\"open").unwrap_err();
        assert_eq!((err.line, err.column), (1, 1));
        assert!(err.to_string().contains("unterminated string"));

        let err = tokenize("x\n  _: <name>").unwrap_err();
        assert_eq!((err.line, err.column, err.message.as_str()), (2, 3, "empty blank node label"));
        assert_eq!(tokenize("$ ").unwrap_err().message, "empty variable name");
        assert_eq!(kinds("''"), vec![Token::Str(String::new())]);
    }

    #[test]
    fn skip_group_balances_nesting() {
        let tokens = tokenize("(a, [b], {c(d)}) rest").unwrap();
        let mut cursor = Cursor::new(&tokens);
        cursor.skip_group().unwrap();
        assert!(cursor.is_keyword("rest"));

        let tokens = tokenize("(a]").unwrap();
        assert!(Cursor::new(&tokens).skip_group().is_err());
    }
}
