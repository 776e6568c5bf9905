//! Fragment classifier.
//!
//! Assigns semantic types to block fragments and resolves `@name`
//! references against the method's parameter table.

use crate::ast::{Fragment, FragmentKind, Operand, ParamRef, ParameterDescriptor, SqlPiece};
use crate::config::CompilerConfig;
use crate::error::{CrudgenError, CrudgenResult};

/// How a name resolved against a [`ParamScope`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    /// Exact parameter name
    Exact(&'a ParameterDescriptor),
    /// Field path below a parameter, `user.name` against `user`
    Field(&'a ParameterDescriptor),
    /// Name introduced by `@AddParam`
    Added,
    Table,
    MaxId,
}

/// Names visible to the templates of one method.
#[derive(Debug, Clone)]
pub struct ParamScope<'a> {
    params: &'a [ParameterDescriptor],
    added: Vec<String>,
    table: &'a str,
    config: &'a CompilerConfig,
}

impl<'a> ParamScope<'a> {
    pub fn new(params: &'a [ParameterDescriptor], table: &'a str, config: &'a CompilerConfig) -> Self {
        Self {
            params,
            added: Vec::new(),
            table,
            config,
        }
    }

    /// Make an `@AddParam` name visible to later references.
    pub fn add(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.added.contains(&name) {
            self.added.push(name);
        }
    }

    pub fn params(&self) -> &'a [ParameterDescriptor] {
        self.params
    }

    pub fn table(&self) -> &str {
        self.table
    }

    pub fn config(&self) -> &CompilerConfig {
        self.config
    }

    /// Resolve a parameter or builtin name.
    ///
    /// Parameters shadow added names, which shadow builtins.
    pub fn resolve(&self, name: &str) -> Option<Resolved<'a>> {
        if let Some(p) = self.params.iter().find(|p| p.name == name) {
            return Some(Resolved::Exact(p));
        }
        let head = name.split('.').next().unwrap_or(name);
        if head != name {
            if let Some(p) = self.params.iter().find(|p| p.name == head) {
                return Some(Resolved::Field(p));
            }
        }
        if self.added.iter().any(|a| a == name) {
            return Some(Resolved::Added);
        }
        if name == self.config.table_ident {
            return Some(Resolved::Table);
        }
        if name == self.config.max_id_ident {
            return Some(Resolved::MaxId);
        }
        None
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Fragment kind for a parameter's declared type.
fn kind_of(param: &ParameterDescriptor) -> FragmentKind {
    match param.ty.as_str() {
        "bool" => FragmentKind::Bool,
        "int" => FragmentKind::Int,
        "string" => FragmentKind::String,
        "Time" => FragmentKind::Time,
        _ => FragmentKind::Other,
    }
}

/// Kind of a keyword, literal or operator, if `value` is one.
fn keyword_kind(value: &str) -> Option<FragmentKind> {
    if is_digits(value) {
        return Some(FragmentKind::Int);
    }
    let kind = match value.to_lowercase().as_str() {
        "&&" | "||" => FragmentKind::Logical,
        ">" | "<" | ">=" | "<=" | "==" | "!=" => FragmentKind::Expression,
        "if" => FragmentKind::If,
        "else" => FragmentKind::Else,
        "end" => FragmentKind::End,
        "where" => FragmentKind::Where,
        "set" => FragmentKind::Set,
        "true" | "false" => FragmentKind::Bool,
        "nil" => FragmentKind::Nil,
        _ => return None,
    };
    Some(kind)
}

/// Classify a single fragment in place. Already typed fragments are kept.
pub fn classify(fragment: &mut Fragment, scope: &ParamScope<'_>) -> CrudgenResult<()> {
    if fragment.kind != FragmentKind::Unresolved {
        return Ok(());
    }
    if let Some(kind) = keyword_kind(&fragment.value) {
        fragment.kind = kind;
        return Ok(());
    }
    let (kind, is_array) = match scope.resolve(&fragment.value) {
        Some(Resolved::Exact(p)) => (kind_of(p), p.is_array),
        Some(Resolved::Field(_)) => (FragmentKind::Uncertain, false),
        Some(Resolved::Table) => (FragmentKind::String, false),
        Some(Resolved::MaxId) => (FragmentKind::Int, false),
        Some(Resolved::Added) => {
            return Err(CrudgenError::Classification(format!(
                "added parameter '{}' is not a valid condition operand",
                fragment.value
            )));
        }
        None => return Err(CrudgenError::unknown_parameter(&fragment.value)),
    };
    fragment.kind = kind;
    fragment.is_array = is_array;
    Ok(())
}

/// Classify every fragment of a block.
///
/// A leading `else if` pair is merged into one `ELSEIF` fragment.
pub fn classify_all(mut fragments: Vec<Fragment>, scope: &ParamScope<'_>) -> CrudgenResult<Vec<Fragment>> {
    for fragment in &mut fragments {
        classify(fragment, scope)?;
    }
    if let [first, second, ..] = fragments.as_slice() {
        if first.kind == FragmentKind::Else && second.kind == FragmentKind::If {
            let merged = Fragment {
                kind: FragmentKind::ElseIf,
                value: format!("{} {}", first.value, second.value),
                is_array: false,
            };
            fragments.remove(1);
            fragments[0] = merged;
        }
    }
    Ok(fragments)
}

/// Resolve a top-level `@name` reference to SQL.
///
/// Parameters and added names become placeholders; `@table` and the
/// upper-bound constant are inlined.
pub fn resolve_reference(param: &ParamRef, scope: &ParamScope<'_>) -> CrudgenResult<SqlPiece> {
    match scope.resolve(&param.name) {
        Some(Resolved::Exact(_) | Resolved::Field(_) | Resolved::Added) => {
            Ok(SqlPiece::Param(param.clone()))
        }
        Some(Resolved::Table) => Ok(SqlPiece::Text(scope.table().to_string())),
        Some(Resolved::MaxId) => Ok(SqlPiece::Text(scope.config().max_id.to_string())),
        None => Err(CrudgenError::unknown_parameter(&param.name)),
    }
}

/// Strip the quotes of a string literal and undo backslash escapes.
pub fn unquote(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Turn a classified operand fragment into a condition operand.
pub fn to_operand(fragment: &Fragment, scope: &ParamScope<'_>) -> CrudgenResult<Operand> {
    match fragment.kind {
        FragmentKind::String if fragment.is_string_literal() => {
            return Ok(Operand::Str(unquote(&fragment.value)));
        }
        FragmentKind::Int if is_digits(&fragment.value) => {
            return fragment.value.parse().map(Operand::Int).map_err(|_| {
                CrudgenError::structural(format!("integer literal out of range: {}", fragment.value))
            });
        }
        FragmentKind::Bool => match fragment.value.to_lowercase().as_str() {
            "true" => return Ok(Operand::Bool(true)),
            "false" => return Ok(Operand::Bool(false)),
            _ => {}
        },
        FragmentKind::Nil => return Ok(Operand::Nil),
        _ => {}
    }
    match scope.resolve(&fragment.value) {
        Some(Resolved::Exact(_) | Resolved::Field(_)) => Ok(Operand::Param(fragment.value.clone())),
        Some(Resolved::Table) => Ok(Operand::Str(scope.table().to_string())),
        Some(Resolved::MaxId) => Ok(Operand::Int(scope.config().max_id)),
        Some(Resolved::Added) | None => Err(CrudgenError::structural(format!(
            "'{}' is not an operand",
            fragment.value
        ))),
    }
}
