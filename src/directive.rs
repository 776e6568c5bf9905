//! Method directives.
//!
//! Extracts the directive text from a method's doc comment and parses the
//! annotations it carries:
//!
//! ```text
//! @Sql(select * from @table {{where}} {{if id > 0}} id = @id {{end}} {{end}})
//! @Where(status = @status)
//! @AddParam(pattern, "%" + @name + "%")
//! @Result(users)
//! @RowsAffected(count)
//! @Create(user)
//! @UpdateOrCreate(update)
//! ```
//!
//! `@Where` and `@AddParam` templates are compiled on the spot, so names
//! introduced by `@AddParam` are visible to every later template.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, digit1, multispace0},
    combinator::{map, map_res, opt, recognize},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, tuple},
};
use serde::Serialize;

use crate::ast::ParameterDescriptor;
use crate::classifier::{resolve_reference, unquote, ParamScope, Resolved};
use crate::error::{CrudgenError, CrudgenResult};
use crate::lexer::{is_ident_char, quoted, reference, tokenize, Token};
use crate::plan::{pieces_to_string, Piece, ValueExpr, ValueTerm};

/// Where a `@Result` destination lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultPosition {
    Argument,
    Return,
}

/// Row fetch mode implied by the destination type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    One,
    Many,
}

/// Query output destination bound by `@Result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultBinding {
    pub param: ParameterDescriptor,
    pub position: ResultPosition,
    pub fetch: FetchMode,
}

impl ResultBinding {
    fn new(param: ParameterDescriptor, position: ResultPosition) -> Self {
        let fetch = if param.is_array {
            FetchMode::Many
        } else {
            FetchMode::One
        };
        Self {
            param,
            position,
            fetch,
        }
    }

    /// A returned pointer or map must be allocated before scanning into it.
    pub fn needs_allocation(&self) -> bool {
        self.position == ResultPosition::Return
            && !self.param.is_array
            && (self.param.is_pointer || self.param.is_map())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    Param,
    Str,
    Number,
}

/// Typed argument of `@Create` / `@UpdateOrCreate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveArg {
    pub kind: ArgKind,
    pub value: String,
}

/// Operation shape synthesized for a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// `@Sql` with a `@Result` binding
    Raw,
    /// `@Sql` without a `@Result` binding
    Exec,
    Create { arg: DirectiveArg },
    UpdateOrCreate { arg: DirectiveArg },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Raw => "Raw",
            Operation::Exec => "Exec",
            Operation::Create { .. } => "Create",
            Operation::UpdateOrCreate { .. } => "UpdateOrCreate",
        }
    }
}

/// Compiled `@Where` condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhereFilter {
    pub template: String,
    pub pieces: Vec<Piece>,
}

impl std::fmt::Display for WhereFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", pieces_to_string(&self.pieces).trim())
    }
}

/// Bound parameter introduced by `@AddParam`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddedParam {
    pub name: String,
    pub value: ValueExpr,
}

/// Resolved directives of one method.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectiveSet {
    pub operation: Option<Operation>,
    /// Body of `@Sql`, quotes stripped
    pub sql: Option<String>,
    pub result: Option<ResultBinding>,
    pub rows_affected: Option<ParameterDescriptor>,
    pub filters: Vec<WhereFilter>,
    pub added_params: Vec<AddedParam>,
}

impl DirectiveSet {
    /// All `@Where` conditions, parenthesized and joined with `and`.
    pub fn filter_sql(&self) -> String {
        self.filters
            .iter()
            .map(|f| format!("({})", f))
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

// ========================================================================
// Doc text
// ========================================================================

/// Extract the directive part of a doc comment.
///
/// When the doc has a blank line, the half that does not mention the method
/// name holds the directives. A leading method name is stripped.
pub fn directive_text(doc: &str, method: &str) -> String {
    let doc = doc.replace("\r\n", "\n");
    let mut text = doc.trim();
    if let Some(index) = text.find("\n\n") {
        let (head, tail) = (&text[..index], &text[index + 2..]);
        text = if !method.is_empty() && tail.contains(method) {
            head
        } else {
            tail
        };
    }
    if let Some(rest) = text.strip_prefix(method) {
        if !rest.starts_with(is_ident_char) {
            text = rest;
        }
    }
    text.trim().to_string()
}

fn annotation_name(input: &str) -> IResult<&str, &str> {
    preceded(
        char('@'),
        take_while1(|c: char| c.is_ascii_alphabetic() || c == ' '),
    )(input)
}

/// Split `@Name(args)` into its name and raw argument text.
pub fn parse_annotation(line: &str) -> Option<(&str, &str)> {
    let (rest, name) = annotation_name(line).ok()?;
    let args = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some((name.trim(), args))
}

/// Parentheses left open in `text`. Quoted spans are skipped.
fn open_parens(text: &str) -> i32 {
    let mut depth = 0;
    let mut quote = None;
    for c in text.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// Strip `@Sql(` ... `)` and one pair of surrounding quotes.
fn sql_body(directive: &str) -> CrudgenResult<String> {
    let body = directive
        .strip_prefix("@Sql(")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| CrudgenError::directive("incomplete @Sql directive: missing ')'"))?
        .trim();
    for quote in ['"', '`'] {
        if body.len() >= 2 && body.starts_with(quote) && body.ends_with(quote) {
            return Ok(body[1..body.len() - 1].to_string());
        }
    }
    Ok(body.to_string())
}

// ========================================================================
// @AddParam values
// ========================================================================

fn string_term(input: &str) -> IResult<&str, ValueTerm> {
    map(quoted, |s: &str| ValueTerm::Str(unquote(s)))(input)
}

fn number_term(input: &str) -> IResult<&str, ValueTerm> {
    map_res(
        recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1))))),
        |s: &str| {
            if s.contains('.') {
                s.parse().map(ValueTerm::Float).map_err(|_| ())
            } else {
                s.parse().map(ValueTerm::Int).map_err(|_| ())
            }
        },
    )(input)
}

fn reference_term(input: &str) -> IResult<&str, ValueTerm> {
    map(reference, ValueTerm::Param)(input)
}

/// `term ('+' term)*` where a term is a string, a number or a reference.
fn value_expr(input: &str) -> IResult<&str, Vec<ValueTerm>> {
    separated_list1(
        delimited(multispace0, char('+'), multispace0),
        alt((string_term, number_term, reference_term)),
    )(input)
}

fn parse_add_param(args: &str, scope: &ParamScope<'_>) -> CrudgenResult<AddedParam> {
    let Some((name, value)) = args.split_once(',') else {
        return Err(CrudgenError::directive(
            "@AddParam expects a name and a value",
        ));
    };
    let name = name.trim();
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err(CrudgenError::directive(format!(
            "invalid @AddParam name: '{}'",
            name
        )));
    }
    if let Some(Resolved::Exact(_) | Resolved::Field(_) | Resolved::Added) = scope.resolve(name) {
        return Err(CrudgenError::directive(format!(
            "@AddParam name '{}' is already defined",
            name
        )));
    }

    let value = value.trim();
    let terms = match value_expr(value) {
        Ok((rest, terms)) if rest.trim().is_empty() => terms,
        _ => {
            return Err(CrudgenError::directive(format!(
                "invalid @AddParam value: {}",
                value
            )));
        }
    };
    let terms = terms
        .into_iter()
        .map(|term| match term {
            ValueTerm::Param(param) => match scope.resolve(&param.name) {
                Some(Resolved::Exact(_) | Resolved::Field(_) | Resolved::Added) => {
                    Ok(ValueTerm::Param(param))
                }
                Some(Resolved::Table) => Ok(ValueTerm::Str(scope.table().to_string())),
                Some(Resolved::MaxId) => Ok(ValueTerm::Int(scope.config().max_id)),
                None => Err(CrudgenError::unknown_parameter(&param.name)),
            },
            other => Ok(other),
        })
        .collect::<CrudgenResult<Vec<_>>>()
        .map_err(|e| e.in_template(value))?;

    Ok(AddedParam {
        name: name.to_string(),
        value: ValueExpr { terms },
    })
}

// ========================================================================
// Directive parsing
// ========================================================================

/// Compile a `@Where` template: literal text and references, no blocks.
fn compile_filter(template: &str, scope: &ParamScope<'_>) -> CrudgenResult<WhereFilter> {
    let compile = || -> CrudgenResult<Vec<Piece>> {
        let mut pieces = Vec::new();
        for token in tokenize(template)? {
            match token {
                Token::Sql(text) => pieces.push(Piece::Text(text)),
                Token::Param(param) => pieces.push(resolve_reference(&param, scope)?.into()),
                Token::Block { source, .. } => {
                    return Err(CrudgenError::directive(format!(
                        "@Where takes a single expression, found {{{{{}}}}}",
                        source
                    )));
                }
            }
        }
        Ok(pieces)
    };
    if template.trim().is_empty() {
        return Err(CrudgenError::directive("empty @Where condition"));
    }
    let pieces = compile().map_err(|e| e.in_template(template))?;
    Ok(WhereFilter {
        template: template.to_string(),
        pieces,
    })
}

fn find_param<'p>(
    name: &str,
    params: &'p [ParameterDescriptor],
    results: &'p [ParameterDescriptor],
) -> Option<(&'p ParameterDescriptor, ResultPosition)> {
    results
        .iter()
        .find(|p| p.name == name)
        .map(|p| (p, ResultPosition::Return))
        .or_else(|| {
            params
                .iter()
                .find(|p| p.name == name)
                .map(|p| (p, ResultPosition::Argument))
        })
}

/// Resolve the named destination of `@Result` / `@RowsAffected`.
fn binding_target<'p>(
    directive: &str,
    args: &str,
    params: &'p [ParameterDescriptor],
    results: &'p [ParameterDescriptor],
) -> CrudgenResult<(&'p ParameterDescriptor, ResultPosition)> {
    let target = args.trim();
    if target.is_empty() || !target.chars().all(is_ident_char) {
        return Err(CrudgenError::directive(format!(
            "@{} expects a parameter or result name, found '{}'",
            directive, target
        )));
    }
    find_param(target, params, results).ok_or_else(|| {
        CrudgenError::directive(format!("@{} target not found: {}", directive, target))
    })
}

/// Type a `@Create` / `@UpdateOrCreate` argument list; exactly one is allowed.
fn single_argument(
    directive: &str,
    args: &str,
    scope: &ParamScope<'_>,
) -> CrudgenResult<DirectiveArg> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let [arg] = parts.as_slice() else {
        return Err(CrudgenError::directive(format!(
            "@{} takes exactly one argument, found {}",
            directive,
            parts.len()
        )));
    };
    let kind = if scope.params().iter().any(|p| p.name == *arg) {
        ArgKind::Param
    } else if arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"') {
        ArgKind::Str
    } else if !arg.is_empty() && arg.parse::<f64>().is_ok() {
        ArgKind::Number
    } else {
        return Err(CrudgenError::directive(format!(
            "invalid argument '{}' for @{}",
            arg, directive
        )));
    };
    Ok(DirectiveArg {
        kind,
        value: arg.to_string(),
    })
}

/// Parse every directive in a method's doc comment.
///
/// `scope` receives the names declared by `@AddParam`. The `@Sql` body is
/// returned uncompiled in [`DirectiveSet::sql`].
pub fn parse_directives(
    doc: &str,
    method: &str,
    results: &[ParameterDescriptor],
    scope: &mut ParamScope<'_>,
) -> CrudgenResult<DirectiveSet> {
    let text = directive_text(doc, method);
    let mut set = DirectiveSet::default();
    let mut operations = Vec::new();
    let mut sql: Option<String> = None;

    for line in text.lines().map(str::trim) {
        if let Some(body) = sql.as_mut().filter(|body| open_parens(body) > 0) {
            body.push('\n');
            body.push_str(line);
            continue;
        }
        if line.starts_with("@Sql(") {
            if sql.is_some() {
                return Err(CrudgenError::directive("duplicate @Sql directive"));
            }
            sql = Some(line.to_string());
            continue;
        }
        let Some((name, args)) = parse_annotation(line) else {
            if !line.is_empty() {
                tracing::trace!(line, "skipping doc text");
            }
            continue;
        };

        match name {
            "Result" => {
                if set.result.is_some() {
                    return Err(CrudgenError::directive("conflicting @Result bindings"));
                }
                let (param, position) = binding_target(name, args, scope.params(), results)?;
                set.result = Some(ResultBinding::new(param.clone(), position));
            }
            "RowsAffected" => {
                if set.rows_affected.is_some() {
                    return Err(CrudgenError::directive("duplicate @RowsAffected binding"));
                }
                let (param, _) = binding_target(name, args, scope.params(), results)?;
                if param.ty != "int64" {
                    return Err(CrudgenError::directive(format!(
                        "@RowsAffected target must be int64, {} is {}",
                        param.name,
                        param.full_type()
                    )));
                }
                set.rows_affected = Some(param.clone());
            }
            "Where" => set.filters.push(compile_filter(args.trim(), scope)?),
            "AddParam" => {
                let added = parse_add_param(args, scope)?;
                scope.add(added.name.clone());
                set.added_params.push(added);
            }
            "Create" => operations.push(Operation::Create {
                arg: single_argument(name, args, scope)?,
            }),
            "UpdateOrCreate" => operations.push(Operation::UpdateOrCreate {
                arg: single_argument(name, args, scope)?,
            }),
            other => {
                return Err(CrudgenError::directive(format!(
                    "unknown directive: @{}",
                    other
                )));
            }
        }
    }

    if let Some(directive) = sql {
        set.sql = Some(sql_body(&directive)?);
        operations.push(if set.result.is_some() {
            Operation::Raw
        } else {
            Operation::Exec
        });
    }

    if operations.len() > 1 {
        let names: Vec<&str> = operations.iter().map(Operation::name).collect();
        return Err(CrudgenError::directive(format!(
            "conflicting operations: {}",
            names.join(", ")
        )));
    }
    set.operation = operations.pop();

    match &set.operation {
        None if set.filters.is_empty() => {
            return Err(CrudgenError::directive("undefined notation"));
        }
        Some(Operation::UpdateOrCreate { .. }) => {
            if set.result.is_none() {
                return Err(CrudgenError::directive(
                    "@UpdateOrCreate requires a @Result binding",
                ));
            }
            if set.filters.is_empty() {
                return Err(CrudgenError::directive(
                    "@UpdateOrCreate requires at least one @Where",
                ));
            }
        }
        _ => {}
    }
    Ok(set)
}
