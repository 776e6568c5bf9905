//! Build-plan IR.
//!
//! A [`BuildPlan`] is an ordered list of [`BuildStep`]s describing how to
//! assemble a SQL string and its bound-parameter map. It is renderer
//! agnostic: a code emitter for a target language walks the steps and
//! produces equivalent source, and [`crate::engine`] interprets them
//! directly.
//!
//! ```text
//! let where_0 = strings()
//! let if_cond_0 = conditions()
//! if_cond_0 += when id > 0 => "and id = @id"
//! where_0 += if_cond_0
//! where_0 = join(where_0, WHERE, " ")
//! ```

use serde::Serialize;

use crate::ast::{Guard, ParamRef, SqlPiece};

/// Piece of literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Piece {
    Text(String),
    /// Rendered as a named placeholder and added to the parameter map
    Param(ParamRef),
}

impl From<SqlPiece> for Piece {
    fn from(piece: SqlPiece) -> Self {
        match piece {
            SqlPiece::Text(text) => Piece::Text(text),
            SqlPiece::Param(param) => Piece::Param(param),
        }
    }
}

/// Render pieces with `@name` placeholders.
pub fn pieces_to_string(pieces: &[Piece]) -> String {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Param(param) => {
                out.push('@');
                out.push_str(&param.name);
            }
        }
    }
    out
}

/// One contribution inside a branch body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Segment {
    Literal(Vec<Piece>),
    /// Result of a previously declared accumulator
    Clause(String),
}

/// Text production of a branch body.
///
/// Segments are trimmed, empty ones dropped, the rest joined by one space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Producer {
    pub segments: Vec<Segment>,
}

impl std::fmt::Display for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "\"\"");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            match segment {
                Segment::Literal(pieces) => write!(f, "{:?}", pieces_to_string(pieces).trim())?,
                Segment::Clause(name) => write!(f, "{}", name)?,
            }
        }
        Ok(())
    }
}

/// Keyword prefixed to a non-empty joined clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClauseKeyword {
    Where,
    Set,
}

impl std::fmt::Display for ClauseKeyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClauseKeyword::Where => write!(f, "WHERE"),
            ClauseKeyword::Set => write!(f, "SET"),
        }
    }
}

/// How child contributions are normalized before joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrimRule {
    /// Trim surrounding whitespace only
    Whitespace,
    /// Prefix bare conditions with `AND`, strip the leading connective
    Condition,
    /// Trim commas, strip the leading comma
    Assignment,
}

/// Parameters of a `FinalizeJoin` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinRule {
    pub keyword: Option<ClauseKeyword>,
    pub separator: String,
    pub trim: TrimRule,
}

const CONNECTIVES: [&str; 3] = ["and ", "or ", "xor "];

fn has_connective(value: &str) -> bool {
    let lower = value.to_lowercase();
    CONNECTIVES.iter().any(|c| lower.starts_with(c))
}

/// Strip one leading `AND `/`OR `/`XOR `/`,` connective.
pub fn strip_connective(input: &str) -> &str {
    let input = input.trim_matches(' ');
    let lower = input.to_lowercase();
    for c in CONNECTIVES {
        if lower.starts_with(c) {
            return &input[c.len()..];
        }
    }
    input.strip_prefix(',').unwrap_or(input)
}

impl JoinRule {
    /// Top-level template and branch bodies.
    pub fn plain() -> Self {
        Self {
            keyword: None,
            separator: " ".to_string(),
            trim: TrimRule::Whitespace,
        }
    }

    pub fn where_clause() -> Self {
        Self {
            keyword: Some(ClauseKeyword::Where),
            separator: " ".to_string(),
            trim: TrimRule::Condition,
        }
    }

    pub fn set_clause() -> Self {
        Self {
            keyword: Some(ClauseKeyword::Set),
            separator: ",".to_string(),
            trim: TrimRule::Assignment,
        }
    }

    /// Normalize one child contribution. Empty results are dropped by the join.
    pub fn normalize(&self, part: &str) -> String {
        match self.trim {
            TrimRule::Whitespace => part.trim().to_string(),
            TrimRule::Condition => {
                let value = part.trim();
                if value.is_empty() || has_connective(value) {
                    value.to_string()
                } else {
                    format!("AND {}", value)
                }
            }
            TrimRule::Assignment => part.trim_matches(|c| c == ',' || c == ' ').to_string(),
        }
    }

    /// Finish joined text: strip the leading connective and add the keyword.
    pub fn finish(&self, joined: &str) -> String {
        let body = match self.trim {
            TrimRule::Whitespace => joined.trim(),
            TrimRule::Condition | TrimRule::Assignment => strip_connective(joined),
        };
        match self.keyword {
            Some(keyword) if !body.is_empty() => format!("{} {}", keyword, body),
            _ => body.to_string(),
        }
    }

    /// Join child contributions. A pure function of `parts`.
    pub fn apply<S: AsRef<str>>(&self, parts: &[S]) -> String {
        let normalized: Vec<String> = parts
            .iter()
            .map(|p| self.normalize(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        self.finish(&normalized.join(&self.separator))
    }
}

/// One IR instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BuildStep {
    /// Start a list of guarded branch productions
    DeclareConditionList { name: String },
    AppendCondition {
        target: String,
        guard: Guard,
        producer: Producer,
    },
    DeclareStringAccumulator { name: String },
    AppendLiteral { target: String, pieces: Vec<Piece> },
    /// Append the result of a finished accumulator
    AppendClause { target: String, source: String },
    FinalizeJoin { target: String, rule: JoinRule },
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStep::DeclareConditionList { name } => write!(f, "let {} = conditions()", name),
            BuildStep::AppendCondition {
                target,
                guard,
                producer,
            } => write!(f, "{} += when {} => {}", target, guard, producer),
            BuildStep::DeclareStringAccumulator { name } => write!(f, "let {} = strings()", name),
            BuildStep::AppendLiteral { target, pieces } => {
                write!(f, "{} += {:?}", target, pieces_to_string(pieces))
            }
            BuildStep::AppendClause { target, source } => write!(f, "{} += {}", target, source),
            BuildStep::FinalizeJoin { target, rule } => match rule.keyword {
                Some(keyword) => write!(
                    f,
                    "{} = join({}, {}, {:?})",
                    target, target, keyword, rule.separator
                ),
                None => write!(f, "{} = join({}, {:?})", target, target, rule.separator),
            },
        }
    }
}

/// Ordered build steps of one template. `root` holds the final SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub root: String,
    pub steps: Vec<BuildStep>,
}

impl BuildPlan {
    /// Every parameter placeholder the plan can emit, in first-use order.
    pub fn placeholders(&self) -> Vec<&ParamRef> {
        fn collect<'a>(pieces: &'a [Piece], out: &mut Vec<&'a ParamRef>) {
            for piece in pieces {
                if let Piece::Param(p) = piece {
                    if !out.iter().any(|seen| seen.name == p.name) {
                        out.push(p);
                    }
                }
            }
        }

        let mut out = Vec::new();
        for step in &self.steps {
            match step {
                BuildStep::AppendLiteral { pieces, .. } => collect(pieces, &mut out),
                BuildStep::AppendCondition { producer, .. } => {
                    for segment in &producer.segments {
                        if let Segment::Literal(pieces) = segment {
                            collect(pieces, &mut out);
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }
}

/// Term of an `@AddParam` value expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ValueTerm {
    Str(String),
    Int(i64),
    Float(f64),
    Param(ParamRef),
}

/// `+`-joined terms. A single term keeps its type; several concatenate as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueExpr {
    pub terms: Vec<ValueTerm>,
}

impl std::fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            match term {
                ValueTerm::Str(s) => write!(f, "{:?}", s)?,
                ValueTerm::Int(n) => write!(f, "{}", n)?,
                ValueTerm::Float(n) => write!(f, "{}", n)?,
                ValueTerm::Param(p) => write!(f, "{}", p)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_trim_rule() {
        let rule = JoinRule::where_clause();
        assert_eq!(rule.apply(&["", "AND a = 1", "OR b = 2"]), "WHERE a = 1 OR b = 2");
    }

    #[test]
    fn test_where_prefixes_bare_conditions() {
        let rule = JoinRule::where_clause();
        assert_eq!(rule.apply(&["a = 1", "b = 2", "or c = 3"]), "WHERE a = 1 AND b = 2 or c = 3");
        assert_eq!(rule.apply(&[" xor a = 1 "]), "WHERE a = 1");
    }

    #[test]
    fn test_empty_join_has_no_keyword() {
        assert_eq!(JoinRule::where_clause().apply(&["", "  "]), "");
        assert_eq!(JoinRule::set_clause().apply::<&str>(&[]), "");
    }

    #[test]
    fn test_set_trim_rule() {
        let rule = JoinRule::set_clause();
        assert_eq!(rule.apply(&["name = @name,", "", ", age = @age"]), "SET name = @name,age = @age");
    }

    #[test]
    fn test_join_depends_only_on_parts() {
        let rule = JoinRule::where_clause();
        let parts = ["", "and a = 1", "b = 2"];
        assert_eq!(rule.apply(&parts), "WHERE a = 1 AND b = 2");
        assert_eq!(rule.apply(&parts), rule.apply(&parts));

        let rule = JoinRule::set_clause();
        assert_eq!(rule.apply(&["a = 1,", "b = 2"]), "SET a = 1,b = 2");
    }

    #[test]
    fn test_keyword_named_columns_keep_prefix() {
        assert_eq!(JoinRule::set_clause().apply(&["set = @a,"]), "SET set = @a");
        assert_eq!(JoinRule::where_clause().apply(&["where_id = 1"]), "WHERE where_id = 1");
        assert_eq!(JoinRule::where_clause().apply(&["and where = 1"]), "WHERE where = 1");
    }

    #[test]
    fn test_connective_needs_word_boundary() {
        assert_eq!(strip_connective("order_id = 1"), "order_id = 1");
        assert_eq!(strip_connective("AND order_id = 1"), "order_id = 1");
        assert_eq!(strip_connective(",a = 1"), "a = 1");
    }

    #[test]
    fn test_step_display() {
        let step = BuildStep::FinalizeJoin {
            target: "where_0".to_string(),
            rule: JoinRule::where_clause(),
        };
        assert_eq!(step.to_string(), "where_0 = join(where_0, WHERE, \" \")");
    }
}
