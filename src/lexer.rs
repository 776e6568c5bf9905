//! Template lexer.
//!
//! Splits directive template text into top-level tokens (literal SQL runs,
//! `@name` references and `{{ ... }}` blocks) and the contents of each block
//! into untyped fragments.
//!
//! ```text
//! select * from @table {{where}} {{if id > 0}} and id = @id {{end}} {{end}}
//! ───────┬───── ──┬─── ────┬──── ──────┬───── ─────┬──── ─┬─ ────┬────────
//!        │        │        │           │           │      │      └── Block [end] [end]
//!        │        │        │           │           │      └── Param id
//!        │        │        │           │           └── Sql
//!        │        │        │           └── Block [if] [id] [>] [0]
//!        │        │        └── Block [where]
//!        │        └── Param table
//!        └── Sql
//! ```

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped, is_not, tag, take_while1},
    character::complete::{anychar, char, multispace1, none_of, one_of},
    combinator::{map, not, opt, peek, recognize, value},
    multi::{many0, many1},
    sequence::{delimited, pair, terminated},
};

use crate::ast::{Fragment, ParamRef};
use crate::error::{CrudgenError, CrudgenResult};

/// Top-level token of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal SQL text with whitespace runs coalesced to one space
    Sql(String),
    /// `@name` or `@@name`
    Param(ParamRef),
    /// Contents of a `{{ ... }}` block
    Block {
        source: String,
        fragments: Vec<Fragment>,
    },
}

/// Characters allowed in a parameter name.
pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

// ========================================================================
// Shared parsers
// ========================================================================

/// Parse a double-quoted string, quotes included. A backslash escapes the
/// following character.
pub fn quoted(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('"'),
        opt(escaped(none_of("\\\""), '\\', anychar)),
        char('"'),
    ))(input)
}

/// Parse a parameter name after its sigil.
fn param_name(input: &str) -> IResult<&str, &str> {
    take_while1(is_ident_char)(input)
}

/// Parse an `@name` or `@@name` reference.
pub fn reference(input: &str) -> IResult<&str, ParamRef> {
    map(
        pair(alt((tag("@@"), tag("@"))), param_name),
        |(sigil, name): (&str, &str)| ParamRef {
            name: name.to_string(),
            raw: sigil == "@@",
        },
    )(input)
}

/// Parse a comparison operator, two-character forms first.
fn comparison_operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag(">="),
        tag("<="),
        tag("=="),
        tag("!="),
        recognize(one_of("><=!")),
    ))(input)
}

// ========================================================================
// Top level
// ========================================================================

enum Lexeme<'a> {
    Text(&'a str),
    Quoted(&'a str),
    Param(ParamRef),
    Block(&'a str),
}

/// Literal text up to the next string, reference or `{{` / `}}`.
fn literal(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((
        is_not("\"{}@"),
        terminated(tag("{"), not(char('{'))),
        terminated(tag("}"), not(char('}'))),
    ))))(input)
}

/// Body of a block: anything but `}}`, strings skipped whole.
fn block_body(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((
        quoted,
        is_not("\"}"),
        terminated(tag("}"), not(char('}'))),
    ))))(input)
}

fn block(input: &str) -> IResult<&str, &str> {
    delimited(tag("{{"), block_body, tag("}}"))(input)
}

fn lexeme(input: &str) -> IResult<&str, Lexeme<'_>> {
    alt((
        map(quoted, Lexeme::Quoted),
        map(block, Lexeme::Block),
        map(reference, Lexeme::Param),
        map(literal, Lexeme::Text),
    ))(input)
}

/// Report why no token could be read at `rest`.
fn lex_error(input: &str, rest: &str) -> CrudgenError {
    let pos = input.len() - rest.len();
    if let Some(body) = rest.strip_prefix("{{") {
        if let Ok((after, _)) = block_body(body) {
            if after.starts_with('"') {
                return CrudgenError::lex(input.len() - after.len(), "unterminated string");
            }
        }
        return CrudgenError::lex(pos, "unterminated template block");
    }
    if rest.starts_with("}}") {
        return CrudgenError::lex(pos, "unmatched '}}'");
    }
    if rest.starts_with('"') {
        return CrudgenError::lex(pos, "unterminated string");
    }
    if rest.starts_with('@') {
        let sigil = if rest.starts_with("@@") { "@@" } else { "@" };
        return CrudgenError::lex(pos, format!("missing parameter name after '{}'", sigil));
    }
    CrudgenError::lex(pos, "unexpected input")
}

/// Accumulates literal SQL text.
#[derive(Default)]
struct SqlBuffer(String);

impl SqlBuffer {
    fn write(&mut self, text: &str) {
        for c in text.chars() {
            if is_blank(c) {
                if !self.0.ends_with(' ') {
                    self.0.push(' ');
                }
            } else {
                self.0.push(c);
            }
        }
    }

    fn write_verbatim(&mut self, text: &str) {
        self.0.push_str(text);
    }

    fn flush_into(&mut self, tokens: &mut Vec<Token>) {
        if !self.0.is_empty() {
            tokens.push(Token::Sql(std::mem::take(&mut self.0)));
        }
    }
}

/// Tokenize a complete template.
pub fn tokenize(input: &str) -> CrudgenResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut buf = SqlBuffer::default();
    let mut rest = input;

    while !rest.is_empty() {
        let pos = input.len() - rest.len();
        let (remaining, lexeme) = lexeme(rest).map_err(|_| lex_error(input, rest))?;
        match lexeme {
            Lexeme::Text(text) => buf.write(text),
            Lexeme::Quoted(text) => buf.write_verbatim(text),
            Lexeme::Param(param) => {
                buf.flush_into(&mut tokens);
                tokens.push(Token::Param(param));
            }
            Lexeme::Block(body) => {
                buf.flush_into(&mut tokens);
                tokens.push(Token::Block {
                    source: body.trim().to_string(),
                    fragments: split_block(body, pos + 2)?,
                });
            }
        }
        rest = remaining;
    }
    buf.flush_into(&mut tokens);
    Ok(tokens)
}

// ========================================================================
// Block fragments
// ========================================================================

/// A single `&` or `|` inside a word. One at the very end is left for the
/// dangling operator check.
fn lone_connective_char(input: &str) -> IResult<&str, &str> {
    recognize(alt((
        terminated(char('&'), peek(none_of("&"))),
        terminated(char('|'), peek(none_of("|"))),
    )))(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((
        is_not(" \t\r\n\"><=!&|"),
        lone_connective_char,
    ))))(input)
}

/// One fragment, or `None` for a whitespace run.
fn fragment(input: &str) -> IResult<&str, Option<Fragment>> {
    alt((
        value(None, multispace1),
        map(quoted, |s| Some(Fragment::string_literal(s))),
        map(alt((tag("&&"), tag("||"))), |s| Some(Fragment::logical(s))),
        map(comparison_operator, |s| Some(Fragment::unresolved(s))),
        map(word, |s| Some(Fragment::unresolved(s))),
    ))(input)
}

/// Split the contents of a `{{ ... }}` block into untyped fragments.
///
/// `offset` is the position of `source` inside the whole template and is only
/// used for error positions.
pub fn split_block(source: &str, offset: usize) -> CrudgenResult<Vec<Fragment>> {
    let mut fragments = Vec::new();
    let mut rest = source;

    while !rest.is_empty() {
        let pos = offset + source.len() - rest.len();
        if let [c @ (b'>' | b'<' | b'=' | b'!' | b'&' | b'|')] = rest.as_bytes() {
            return Err(CrudgenError::lex(
                pos,
                format!("dangling operator '{}'", *c as char),
            ));
        }
        let (remaining, fragment) = fragment(rest).map_err(|_| {
            if rest.starts_with('"') {
                CrudgenError::lex(pos, "unterminated string")
            } else {
                CrudgenError::lex(pos, "unexpected input")
            }
        })?;
        fragments.extend(fragment);
        rest = remaining;
    }
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FragmentKind;

    fn values(fragments: &[Fragment]) -> Vec<&str> {
        fragments.iter().map(|f| f.value.as_str()).collect()
    }

    #[test]
    fn test_plain_sql_coalesces_whitespace() {
        let tokens = tokenize("select *\n\tfrom   users").unwrap();
        assert_eq!(tokens, vec![Token::Sql("select * from users".to_string())]);
    }

    #[test]
    fn test_param_references() {
        let tokens = tokenize("id = @id and name = @@user.name").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Sql("id = ".to_string()),
                Token::Param(ParamRef { name: "id".into(), raw: false }),
                Token::Sql(" and name = ".to_string()),
                Token::Param(ParamRef { name: "user.name".into(), raw: true }),
            ]
        );
    }

    #[test]
    fn test_string_span_kept_verbatim() {
        let tokens = tokenize(r#"name = "a  \"b\"  c""#).unwrap();
        assert_eq!(tokens, vec![Token::Sql(r#"name = "a  \"b\"  c""#.to_string())]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize(r#"name = "abc"#).unwrap_err();
        assert!(matches!(err, CrudgenError::Lex { position: 7, .. }));
    }

    #[test]
    fn test_block_fragments() {
        let tokens = tokenize(r#"{{if id>=10 && name != "x}}"}}"#).unwrap();
        match &tokens[0] {
            Token::Block { fragments, .. } => {
                assert_eq!(
                    values(fragments),
                    vec!["if", "id", ">=", "10", "&&", "name", "!=", r#""x}}""#]
                );
                assert_eq!(fragments[4].kind, FragmentKind::Logical);
                assert_eq!(fragments[7].kind, FragmentKind::String);
                assert_eq!(fragments[1].kind, FragmentKind::Unresolved);
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_single_ampersand_is_literal() {
        let fragments = split_block("a&b || c", 0).unwrap();
        assert_eq!(values(&fragments), vec!["a&b", "||", "c"]);
    }

    #[test]
    fn test_unterminated_block() {
        let err = tokenize("select {{if a > 0").unwrap_err();
        assert!(matches!(err, CrudgenError::Lex { position: 7, .. }));
    }

    #[test]
    fn test_unmatched_close() {
        assert!(matches!(
            tokenize("select }} x").unwrap_err(),
            CrudgenError::Lex { .. }
        ));
    }

    #[test]
    fn test_dangling_operator() {
        assert!(matches!(
            split_block("if a >", 0).unwrap_err(),
            CrudgenError::Lex { position: 5, .. }
        ));
        assert!(matches!(
            split_block("if a &", 0).unwrap_err(),
            CrudgenError::Lex { .. }
        ));
    }

    #[test]
    fn test_missing_param_name() {
        assert!(matches!(
            tokenize("id = @ ").unwrap_err(),
            CrudgenError::Lex { position: 5, .. }
        ));
        assert_eq!(
            tokenize("id = @@").unwrap_err().to_string(),
            "Lex error at position 5: missing parameter name after '@@'"
        );
    }

    #[test]
    fn test_unterminated_string_in_block() {
        assert_eq!(
            tokenize(r#"a {{if name == "x}}"#).unwrap_err().to_string(),
            "Lex error at position 15: unterminated string"
        );
    }

    #[test]
    fn test_single_braces_are_literal() {
        let tokens = tokenize("select '{' || x || '}'").unwrap();
        assert_eq!(tokens, vec![Token::Sql("select '{' || x || '}'".to_string())]);
    }
}
