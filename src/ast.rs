//! Syntax tree for directive templates.
//!
//! This module defines the data structures shared by the lexer, the
//! classifier and the clause parser: parameter descriptors, fragments,
//! resolved statements and the clause tree.

use serde::{Deserialize, Serialize};

/// A method parameter or result, as handed over by the source extractor.
///
/// `(users []*model.User)` becomes `name = "users"`, `ty = "User"`,
/// `package = Some("model")`, `is_array`, `is_pointer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Parameter name; unnamed results carry an empty name
    #[serde(default)]
    pub name: String,
    /// Declared type without package qualifier
    #[serde(rename = "type")]
    pub ty: String,
    /// Foreign package qualifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_pointer: bool,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            package: None,
            is_array: false,
            is_pointer: false,
        }
    }

    /// Mark this parameter as a slice.
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Mark this parameter as a pointer.
    pub fn pointer(mut self) -> Self {
        self.is_pointer = true;
        self
    }

    /// Qualify the type with a foreign package.
    pub fn in_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Type including its package qualifier, e.g. `model.User`.
    pub fn full_type(&self) -> String {
        match &self.package {
            Some(pkg) if !pkg.is_empty() => format!("{}.{}", pkg, self.ty),
            _ => self.ty.clone(),
        }
    }

    pub fn is_map(&self) -> bool {
        self.ty.starts_with("map[")
    }

    pub fn is_error(&self) -> bool {
        self.ty == "error"
    }

    pub fn is_time(&self) -> bool {
        self.ty == "Time" && self.package.as_deref() == Some("time")
    }
}

/// Semantic type of a template fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentKind {
    /// Lexed but not yet classified
    Unresolved,
    Int,
    String,
    Bool,
    Time,
    Other,
    /// Field access below a parameter; compares with anything
    Uncertain,
    Nil,
    Logical,
    Expression,
    If,
    Else,
    ElseIf,
    End,
    Where,
    Set,
}

impl FragmentKind {
    /// Kinds that may stand on either side of a comparison.
    pub fn is_operand(self) -> bool {
        matches!(
            self,
            FragmentKind::Int
                | FragmentKind::String
                | FragmentKind::Bool
                | FragmentKind::Time
                | FragmentKind::Other
                | FragmentKind::Uncertain
                | FragmentKind::Nil
        )
    }
}

impl std::fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FragmentKind::Unresolved => "UNRESOLVED",
            FragmentKind::Int => "INT",
            FragmentKind::String => "STRING",
            FragmentKind::Bool => "BOOL",
            FragmentKind::Time => "TIME",
            FragmentKind::Other => "OTHER",
            FragmentKind::Uncertain => "UNCERTAIN",
            FragmentKind::Nil => "NIL",
            FragmentKind::Logical => "LOGICAL",
            FragmentKind::Expression => "EXPRESSION",
            FragmentKind::If => "IF",
            FragmentKind::Else => "ELSE",
            FragmentKind::ElseIf => "ELSEIF",
            FragmentKind::End => "END",
            FragmentKind::Where => "WHERE",
            FragmentKind::Set => "SET",
        };
        write!(f, "{}", name)
    }
}

/// A single token from inside a `{{ ... }}` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub value: String,
    pub is_array: bool,
}

impl Fragment {
    /// An unclassified word or operator.
    pub fn unresolved(value: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Unresolved,
            value: value.into(),
            is_array: false,
        }
    }

    /// A double-quoted string literal, quotes included.
    pub fn string_literal(value: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::String,
            value: value.into(),
            is_array: false,
        }
    }

    /// A `&&` or `||` connective.
    pub fn logical(value: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Logical,
            value: value.into(),
            is_array: false,
        }
    }

    pub fn is_string_literal(&self) -> bool {
        self.value.starts_with('"')
    }
}

/// Join fragment values with single spaces, as they appear in diagnostics.
pub fn fragments_to_string(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(|f| f.value.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A `@name` or `@@name` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamRef {
    pub name: String,
    /// `@@name`: raw variable reference
    pub raw: bool,
}

impl std::fmt::Display for ParamRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.raw {
            write!(f, "@@{}", self.name)
        } else {
            write!(f, "@{}", self.name)
        }
    }
}

/// Piece of a literal SQL run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SqlPiece {
    Text(String),
    Param(ParamRef),
}

/// Consecutive literal text and parameter references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SqlRun {
    pub pieces: Vec<SqlPiece>,
}

impl std::fmt::Display for SqlRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for piece in &self.pieces {
            match piece {
                SqlPiece::Text(text) => write!(f, "{}", text)?,
                SqlPiece::Param(param) => write!(f, "{}", param)?,
            }
        }
        Ok(())
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            ">" => Some(CmpOp::Gt),
            ">=" => Some(CmpOp::Gte),
            "<" => Some(CmpOp::Lt),
            "<=" => Some(CmpOp::Lte),
            _ => None,
        }
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CmpOp::Eq => write!(f, "=="),
            CmpOp::Ne => write!(f, "!="),
            CmpOp::Gt => write!(f, ">"),
            CmpOp::Gte => write!(f, ">="),
            CmpOp::Lt => write!(f, "<"),
            CmpOp::Lte => write!(f, "<="),
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Operand {
    /// Parameter name or dotted field path
    Param(String),
    Int(i64),
    Str(String),
    Bool(bool),
    Nil,
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Param(path) => write!(f, "{}", path),
            Operand::Int(n) => write!(f, "{}", n),
            Operand::Str(s) => write!(f, "{:?}", s),
            Operand::Bool(b) => write!(f, "{}", b),
            Operand::Nil => write!(f, "nil"),
        }
    }
}

/// A parsed block condition. `&&` binds tighter than `||`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CondExpr {
    Compare {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    /// A bare boolean operand
    Test(Operand),
    And(Box<CondExpr>, Box<CondExpr>),
    Or(Box<CondExpr>, Box<CondExpr>),
}

impl std::fmt::Display for CondExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CondExpr::Compare { lhs, op, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            CondExpr::Test(operand) => write!(f, "{}", operand),
            CondExpr::And(a, b) => write!(f, "{} && {}", a, b),
            CondExpr::Or(a, b) => write!(f, "{} || {}", a, b),
        }
    }
}

/// Condition of an `if` or `else if` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    /// Source text, fragments joined by single spaces
    pub text: String,
    pub expr: CondExpr,
}

/// Effective guard of one branch in a conditional chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Guard {
    When(CondExpr),
    Not(Box<Guard>),
    /// Disjunction of the inner guards
    Any(Vec<Guard>),
    /// Conjunction of the inner guards
    All(Vec<Guard>),
}

impl Guard {
    fn is_disjunction(&self) -> bool {
        match self {
            Guard::When(CondExpr::Or(..)) => true,
            Guard::Any(guards) => guards.len() > 1,
            _ => false,
        }
    }
}

impl std::fmt::Display for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Guard::When(expr) => write!(f, "{}", expr),
            Guard::Not(inner) => write!(f, "!({})", inner),
            Guard::Any(guards) => {
                for (i, g) in guards.iter().enumerate() {
                    if i > 0 {
                        write!(f, " || ")?;
                    }
                    write!(f, "{}", g)?;
                }
                Ok(())
            }
            Guard::All(guards) => {
                for (i, g) in guards.iter().enumerate() {
                    if i > 0 {
                        write!(f, " && ")?;
                    }
                    if g.is_disjunction() {
                        write!(f, "({})", g)?;
                    } else {
                        write!(f, "{}", g)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Template token after classification, as consumed by the clause parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Statement {
    /// Literal SQL text
    Text(String),
    /// Bound parameter reference
    Param(ParamRef),
    If(Condition),
    ElseIf(Condition),
    Else,
    Where,
    Set,
    End,
}

impl Statement {
    /// Short form used in structural diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Statement::Text(text) => format!("'{}'", text.trim()),
            Statement::Param(param) => param.to_string(),
            Statement::If(cond) => format!("{{{{if {}}}}}", cond.text),
            Statement::ElseIf(cond) => format!("{{{{else if {}}}}}", cond.text),
            Statement::Else => "{{else}}".to_string(),
            Statement::Where => "{{where}}".to_string(),
            Statement::Set => "{{set}}".to_string(),
            Statement::End => "{{end}}".to_string(),
        }
    }
}

/// Structural unit of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ClauseNode {
    SqlLiteral(SqlRun),
    If(IfClause),
    Where(Vec<ClauseNode>),
    Set(Vec<ClauseNode>),
}

/// An `if` chain with its `else if` and `else` branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IfClause {
    pub condition: Condition,
    pub body: Vec<ClauseNode>,
    pub else_ifs: Vec<ElseIf>,
    pub else_body: Option<Vec<ClauseNode>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElseIf {
    pub condition: Condition,
    pub body: Vec<ClauseNode>,
}

/// A branch of an `if` chain paired with its mutually exclusive guard.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch<'a> {
    pub guard: Guard,
    pub body: &'a [ClauseNode],
}

impl IfClause {
    /// Branches in source order with their effective guards.
    ///
    /// An `else if` is guarded by `!(prior) && cond` and the trailing `else`
    /// by `!(prior)`, so at most one branch holds for any input.
    pub fn branches(&self) -> Vec<Branch<'_>> {
        let mut prior = vec![Guard::When(self.condition.expr.clone())];
        let mut branches = vec![Branch {
            guard: Guard::When(self.condition.expr.clone()),
            body: &self.body,
        }];

        for else_if in &self.else_ifs {
            let own = Guard::When(else_if.condition.expr.clone());
            branches.push(Branch {
                guard: Guard::All(vec![
                    Guard::Not(Box::new(Guard::Any(prior.clone()))),
                    own.clone(),
                ]),
                body: &else_if.body,
            });
            prior.push(own);
        }

        if let Some(body) = &self.else_body {
            branches.push(Branch {
                guard: Guard::Not(Box::new(Guard::Any(prior))),
                body,
            });
        }
        branches
    }
}
