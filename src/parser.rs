//! Clause parser.
//!
//! Checks classified block fragments for operand compatibility, turns each
//! block into a control [`Statement`], and builds the clause tree with a
//! recursive-descent parser over the statement stream.
//!
//! # Grammar
//!
//! ```text
//! template    := clause*
//! clause      := literalSQL | ifClause | whereClause | setClause
//! ifClause    := IF cond clause* (ELSEIF cond clause*)* (ELSE clause*)? END
//! whereClause := WHERE (literalSQL | ifClause)* END
//! setClause   := SET (literalSQL | ifClause)* END
//!
//! cond        := and ("||" and)*
//! and         := compare ("&&" compare)*
//! compare     := operand (OP operand)?
//! ```

use crate::ast::*;
use crate::classifier::{to_operand, ParamScope};
use crate::error::{CrudgenError, CrudgenResult};

/// Explicit position over a token slice.
#[derive(Debug, Clone)]
pub struct Cursor<'a, T> {
    items: &'a [T],
    pos: usize,
}

impl<'a, T> Cursor<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self { items, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'a T> {
        self.items.get(self.pos)
    }

    pub fn advance(&mut self) -> Option<&'a T> {
        let item = self.items.get(self.pos)?;
        self.pos += 1;
        Some(item)
    }

    /// Step back over the last advanced item.
    pub fn rewind(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.items.len()
    }
}

// ========================================================================
// Fragment checks
// ========================================================================

/// Check every `operand OP operand` window of a classified block.
///
/// The leading keyword is skipped, and so is a `BOOL` operand, which is only
/// ever a truth test. Operands compare when their kinds are equal or either
/// is `UNCERTAIN`; `nil` only compares with arrays and `UNCERTAIN` values.
pub fn validate_fragments(list: &[Fragment]) -> CrudgenResult<()> {
    let mut i = 1;
    while i < list.len() {
        let fragment = &list[i];
        match fragment.kind {
            FragmentKind::If
            | FragmentKind::Else
            | FragmentKind::ElseIf
            | FragmentKind::End
            | FragmentKind::Logical
            | FragmentKind::Where
            | FragmentKind::Set
            | FragmentKind::Bool => {}
            kind if kind.is_operand() => {
                if i + 2 < list.len() {
                    let window = &list[i..i + 3];
                    if !is_comparison_valid(window) {
                        return Err(CrudgenError::TypeMismatch(format!(
                            "condition type not match: {}",
                            fragments_to_string(window)
                        )));
                    }
                    i += 2;
                }
            }
            _ => {
                return Err(CrudgenError::structural(format!(
                    "unknown fragment: {}",
                    fragment.value
                )));
            }
        }
        i += 1;
    }
    Ok(())
}

fn is_comparison_valid(expr: &[Fragment]) -> bool {
    let [lhs, op, rhs] = expr else {
        return false;
    };
    if op.kind != FragmentKind::Expression {
        return false;
    }
    let uncertain = lhs.kind == FragmentKind::Uncertain || rhs.kind == FragmentKind::Uncertain;
    if lhs.kind == FragmentKind::Nil || rhs.kind == FragmentKind::Nil {
        return lhs.is_array || rhs.is_array || uncertain;
    }
    lhs.kind == rhs.kind || uncertain
}

/// Turn a checked block into its control statement.
pub fn block_statement(fragments: &[Fragment], scope: &ParamScope<'_>) -> CrudgenResult<Statement> {
    let syntax_error = || {
        CrudgenError::structural(format!("syntax error: {}", fragments_to_string(fragments)))
    };
    let Some(first) = fragments.first() else {
        return Err(CrudgenError::structural("empty template block"));
    };
    let rest = &fragments[1..];
    match first.kind {
        FragmentKind::If if !rest.is_empty() => Ok(Statement::If(parse_condition(rest, scope)?)),
        FragmentKind::ElseIf if !rest.is_empty() => {
            Ok(Statement::ElseIf(parse_condition(rest, scope)?))
        }
        FragmentKind::Else if rest.is_empty() => Ok(Statement::Else),
        FragmentKind::Where if rest.is_empty() => Ok(Statement::Where),
        FragmentKind::Set if rest.is_empty() => Ok(Statement::Set),
        FragmentKind::End if rest.is_empty() => Ok(Statement::End),
        _ => Err(syntax_error()),
    }
}

// ========================================================================
// Conditions
// ========================================================================

/// Parse the fragments after `if` / `else if` into a condition.
pub fn parse_condition(fragments: &[Fragment], scope: &ParamScope<'_>) -> CrudgenResult<Condition> {
    let mut cursor = Cursor::new(fragments);
    let expr = parse_or(&mut cursor, scope)?;
    if let Some(extra) = cursor.peek() {
        return Err(CrudgenError::structural(format!(
            "unexpected '{}' in condition: {}",
            extra.value,
            fragments_to_string(fragments)
        )));
    }
    Ok(Condition {
        text: fragments_to_string(fragments),
        expr,
    })
}

fn is_connective(cursor: &Cursor<'_, Fragment>, symbol: &str) -> bool {
    cursor
        .peek()
        .is_some_and(|f| f.kind == FragmentKind::Logical && f.value == symbol)
}

fn parse_or(cursor: &mut Cursor<'_, Fragment>, scope: &ParamScope<'_>) -> CrudgenResult<CondExpr> {
    let mut lhs = parse_and(cursor, scope)?;
    while is_connective(cursor, "||") {
        cursor.advance();
        let rhs = parse_and(cursor, scope)?;
        lhs = CondExpr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_and(cursor: &mut Cursor<'_, Fragment>, scope: &ParamScope<'_>) -> CrudgenResult<CondExpr> {
    let mut lhs = parse_compare(cursor, scope)?;
    while is_connective(cursor, "&&") {
        cursor.advance();
        let rhs = parse_compare(cursor, scope)?;
        lhs = CondExpr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_compare(cursor: &mut Cursor<'_, Fragment>, scope: &ParamScope<'_>) -> CrudgenResult<CondExpr> {
    let lhs = parse_operand(cursor, scope)?;
    match cursor.peek() {
        Some(f) if f.kind == FragmentKind::Expression => {
            cursor.advance();
            let op = CmpOp::from_symbol(&f.value).ok_or_else(|| {
                CrudgenError::structural(format!("unknown operator: {}", f.value))
            })?;
            let rhs = parse_operand(cursor, scope)?;
            Ok(CondExpr::Compare { lhs, op, rhs })
        }
        _ => Ok(CondExpr::Test(lhs)),
    }
}

fn parse_operand(cursor: &mut Cursor<'_, Fragment>, scope: &ParamScope<'_>) -> CrudgenResult<Operand> {
    match cursor.advance() {
        Some(f) if f.kind.is_operand() => to_operand(f, scope),
        Some(f) => Err(CrudgenError::structural(format!(
            "expected operand, found '{}'",
            f.value
        ))),
        None => Err(CrudgenError::structural("condition ends without an operand")),
    }
}

// ========================================================================
// Clauses
// ========================================================================

/// How a clause body ended.
enum Terminator {
    End,
    Else,
    ElseIf(Condition),
}

/// Parse a complete statement stream into clause nodes.
pub fn parse_statements(statements: &[Statement]) -> CrudgenResult<Vec<ClauseNode>> {
    let mut cursor = Cursor::new(statements);
    let mut nodes = Vec::new();
    while let Some(statement) = cursor.peek() {
        match statement {
            Statement::Text(_) | Statement::Param(_) => nodes.extend(parse_literal(&mut cursor)),
            Statement::If(_) => nodes.push(parse_if(&mut cursor)?),
            Statement::Where | Statement::Set => nodes.push(parse_keyword_clause(&mut cursor)?),
            Statement::Else | Statement::ElseIf(_) | Statement::End => {
                return Err(CrudgenError::structural(format!(
                    "unbalanced clause: {} has no opening block",
                    statement.describe()
                )));
            }
        }
    }
    Ok(nodes)
}

/// Collect consecutive text and parameter statements into one run.
///
/// Whitespace-only text between blocks yields no node.
fn parse_literal(cursor: &mut Cursor<'_, Statement>) -> Option<ClauseNode> {
    let mut run = SqlRun::default();
    while let Some(statement) = cursor.advance() {
        match statement {
            Statement::Text(text) => run.pieces.push(SqlPiece::Text(text.clone())),
            Statement::Param(param) => run.pieces.push(SqlPiece::Param(param.clone())),
            _ => {
                cursor.rewind();
                break;
            }
        }
    }
    let blank = run.pieces.iter().all(|p| match p {
        SqlPiece::Text(text) => text.trim().is_empty(),
        SqlPiece::Param(_) => false,
    });
    if blank {
        None
    } else {
        Some(ClauseNode::SqlLiteral(run))
    }
}

/// Parse clauses until a terminator.
///
/// `nested_blocks` allows `where`/`set` in the body; `opener` names the
/// enclosing block for diagnostics.
fn parse_body(
    cursor: &mut Cursor<'_, Statement>,
    nested_blocks: bool,
    opener: &str,
) -> CrudgenResult<(Vec<ClauseNode>, Terminator)> {
    let mut nodes = Vec::new();
    while let Some(statement) = cursor.peek() {
        match statement {
            Statement::Text(_) | Statement::Param(_) => nodes.extend(parse_literal(cursor)),
            Statement::If(_) => nodes.push(parse_if(cursor)?),
            Statement::Where | Statement::Set if nested_blocks => {
                nodes.push(parse_keyword_clause(cursor)?)
            }
            Statement::Where | Statement::Set => {
                return Err(CrudgenError::structural(format!(
                    "{} is not allowed inside {}",
                    statement.describe(),
                    opener
                )));
            }
            Statement::End => {
                cursor.advance();
                return Ok((nodes, Terminator::End));
            }
            Statement::Else => {
                cursor.advance();
                return Ok((nodes, Terminator::Else));
            }
            Statement::ElseIf(cond) => {
                cursor.advance();
                return Ok((nodes, Terminator::ElseIf(cond.clone())));
            }
        }
    }
    Err(CrudgenError::structural(format!(
        "incomplete clause: {} is never closed with {{{{end}}}}",
        opener
    )))
}

fn parse_if(cursor: &mut Cursor<'_, Statement>) -> CrudgenResult<ClauseNode> {
    let Some(Statement::If(condition)) = cursor.advance() else {
        return Err(CrudgenError::structural("expected {{if}}"));
    };
    let opener = format!("{{{{if {}}}}}", condition.text);
    let (body, mut terminator) = parse_body(cursor, true, &opener)?;
    let mut clause = IfClause {
        condition: condition.clone(),
        body,
        else_ifs: Vec::new(),
        else_body: None,
    };

    loop {
        match terminator {
            Terminator::End => break,
            Terminator::ElseIf(condition) => {
                if clause.else_body.is_some() {
                    return Err(CrudgenError::structural(format!(
                        "{{{{else if {}}}}} follows {{{{else}}}} in {}",
                        condition.text, opener
                    )));
                }
                let (body, next) = parse_body(cursor, true, &opener)?;
                clause.else_ifs.push(ElseIf { condition, body });
                terminator = next;
            }
            Terminator::Else => {
                if clause.else_body.is_some() {
                    return Err(CrudgenError::structural(format!(
                        "duplicate {{{{else}}}} in {}",
                        opener
                    )));
                }
                let (body, next) = parse_body(cursor, true, &opener)?;
                clause.else_body = Some(body);
                terminator = next;
            }
        }
    }
    Ok(ClauseNode::If(clause))
}

/// Parse a `where` or `set` block.
fn parse_keyword_clause(cursor: &mut Cursor<'_, Statement>) -> CrudgenResult<ClauseNode> {
    let opener = match cursor.advance() {
        Some(Statement::Where) => Statement::Where,
        Some(Statement::Set) => Statement::Set,
        _ => return Err(CrudgenError::structural("expected {{where}} or {{set}}")),
    };
    let (body, terminator) = parse_body(cursor, false, &opener.describe())?;
    if !matches!(terminator, Terminator::End) {
        return Err(CrudgenError::structural(format!(
            "{{{{else}}}} outside of an if block in {}",
            opener.describe()
        )));
    }
    Ok(match opener {
        Statement::Where => ClauseNode::Where(body),
        _ => ClauseNode::Set(body),
    })
}
