//! Build-plan emitter.
//!
//! Lowers a clause tree into [`BuildStep`]s. Every `if` chain becomes a
//! condition list holding one guarded producer per branch, every
//! `where`/`set` block a string accumulator finished by a join. Nested
//! clauses are emitted before the step that consumes them.

use crate::ast::{ClauseNode, IfClause, SqlRun};
use crate::plan::{BuildPlan, BuildStep, JoinRule, Piece, Producer, Segment};

/// Name of the accumulator holding the final SQL.
pub const ROOT: &str = "sql";

/// Per-method name counters, so declared names never collide.
#[derive(Debug, Default)]
pub struct PlanContext {
    if_count: usize,
    where_count: usize,
    set_count: usize,
}

impl PlanContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_if(&mut self) -> String {
        let name = format!("if_cond_{}", self.if_count);
        self.if_count += 1;
        name
    }

    fn next_where(&mut self) -> String {
        let name = format!("where_{}", self.where_count);
        self.where_count += 1;
        name
    }

    fn next_set(&mut self) -> String {
        let name = format!("set_{}", self.set_count);
        self.set_count += 1;
        name
    }
}

fn pieces(run: &SqlRun) -> Vec<Piece> {
    run.pieces.iter().cloned().map(Piece::from).collect()
}

struct Emitter<'c> {
    ctx: &'c mut PlanContext,
    steps: Vec<BuildStep>,
}

impl Emitter<'_> {
    /// Emit the steps for a branch body and return its producer.
    fn body(&mut self, nodes: &[ClauseNode]) -> Producer {
        let mut producer = Producer::default();
        for node in nodes {
            let segment = match node {
                ClauseNode::SqlLiteral(run) => Segment::Literal(pieces(run)),
                ClauseNode::If(clause) => Segment::Clause(self.if_clause(clause)),
                ClauseNode::Where(children) => {
                    let name = self.ctx.next_where();
                    Segment::Clause(self.accumulate(name, children, JoinRule::where_clause()))
                }
                ClauseNode::Set(children) => {
                    let name = self.ctx.next_set();
                    Segment::Clause(self.accumulate(name, children, JoinRule::set_clause()))
                }
            };
            producer.segments.push(segment);
        }
        producer
    }

    fn if_clause(&mut self, clause: &IfClause) -> String {
        let name = self.ctx.next_if();
        self.steps.push(BuildStep::DeclareConditionList { name: name.clone() });
        for branch in clause.branches() {
            let producer = self.body(branch.body);
            self.steps.push(BuildStep::AppendCondition {
                target: name.clone(),
                guard: branch.guard,
                producer,
            });
        }
        name
    }

    /// Declare a string accumulator, append one contribution per child and
    /// finish it with `rule`.
    fn accumulate(&mut self, name: String, children: &[ClauseNode], rule: JoinRule) -> String {
        self.steps.push(BuildStep::DeclareStringAccumulator { name: name.clone() });
        for child in children {
            let step = match child {
                ClauseNode::SqlLiteral(run) => BuildStep::AppendLiteral {
                    target: name.clone(),
                    pieces: pieces(run),
                },
                ClauseNode::If(clause) => {
                    let source = self.if_clause(clause);
                    BuildStep::AppendClause {
                        target: name.clone(),
                        source,
                    }
                }
                ClauseNode::Where(nested) => {
                    let inner = self.ctx.next_where();
                    let source = self.accumulate(inner, nested, JoinRule::where_clause());
                    BuildStep::AppendClause {
                        target: name.clone(),
                        source,
                    }
                }
                ClauseNode::Set(nested) => {
                    let inner = self.ctx.next_set();
                    let source = self.accumulate(inner, nested, JoinRule::set_clause());
                    BuildStep::AppendClause {
                        target: name.clone(),
                        source,
                    }
                }
            };
            self.steps.push(step);
        }
        self.steps.push(BuildStep::FinalizeJoin {
            target: name.clone(),
            rule,
        });
        name
    }
}

/// Lower a template's clause tree into a build plan rooted at [`ROOT`].
pub fn emit_plan(nodes: &[ClauseNode], ctx: &mut PlanContext) -> BuildPlan {
    let mut emitter = Emitter {
        ctx,
        steps: Vec::new(),
    };
    let root = emitter.accumulate(ROOT.to_string(), nodes, JoinRule::plain());
    tracing::trace!(steps = emitter.steps.len(), "emitted build plan");
    BuildPlan {
        root,
        steps: emitter.steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CmpOp, CondExpr, Condition, ElseIf, Guard, Operand, ParamRef, SqlPiece};

    fn lit(text: &str) -> ClauseNode {
        ClauseNode::SqlLiteral(SqlRun {
            pieces: vec![SqlPiece::Text(text.to_string())],
        })
    }

    fn gt(name: &str, n: i64) -> Condition {
        Condition {
            text: format!("{} > {}", name, n),
            expr: CondExpr::Compare {
                lhs: Operand::Param(name.to_string()),
                op: CmpOp::Gt,
                rhs: Operand::Int(n),
            },
        }
    }

    fn rendered(plan: &BuildPlan) -> Vec<String> {
        plan.steps.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_literal_only() {
        let plan = emit_plan(&[lit("select 1")], &mut PlanContext::new());
        assert_eq!(plan.root, "sql");
        assert_eq!(
            rendered(&plan),
            vec!["let sql = strings()", "sql += \"select 1\"", "sql = join(sql, \" \")"]
        );
    }

    #[test]
    fn test_where_with_if() {
        let nodes = vec![
            lit("select * from users "),
            ClauseNode::Where(vec![ClauseNode::If(IfClause {
                condition: gt("id", 0),
                body: vec![ClauseNode::SqlLiteral(SqlRun {
                    pieces: vec![
                        SqlPiece::Text(" and id = ".to_string()),
                        SqlPiece::Param(ParamRef { name: "id".into(), raw: false }),
                    ],
                })],
                else_ifs: vec![],
                else_body: None,
            })]),
        ];
        let plan = emit_plan(&nodes, &mut PlanContext::new());
        assert_eq!(
            rendered(&plan),
            vec![
                "let sql = strings()",
                "sql += \"select * from users \"",
                "let where_0 = strings()",
                "let if_cond_0 = conditions()",
                "if_cond_0 += when id > 0 => \"and id = @id\"",
                "where_0 += if_cond_0",
                "where_0 = join(where_0, WHERE, \" \")",
                "sql += where_0",
                "sql = join(sql, \" \")",
            ]
        );
        assert_eq!(plan.placeholders().len(), 1);
    }

    #[test]
    fn test_chain_guards_are_exclusive() {
        let nodes = vec![ClauseNode::If(IfClause {
            condition: gt("a", 0),
            body: vec![lit("x")],
            else_ifs: vec![ElseIf {
                condition: gt("b", 0),
                body: vec![lit("y")],
            }],
            else_body: Some(vec![lit("z")]),
        })];
        let plan = emit_plan(&nodes, &mut PlanContext::new());
        let guards: Vec<&Guard> = plan
            .steps
            .iter()
            .filter_map(|s| match s {
                BuildStep::AppendCondition { guard, .. } => Some(guard),
                _ => None,
            })
            .collect();
        assert_eq!(guards.len(), 3);
        assert_eq!(guards[1].to_string(), "!(a > 0) && b > 0");
        assert_eq!(guards[2].to_string(), "!(a > 0 || b > 0)");
    }

    #[test]
    fn test_names_are_unique_within_method() {
        let inner = ClauseNode::If(IfClause {
            condition: gt("b", 0),
            body: vec![lit("inner")],
            else_ifs: vec![],
            else_body: None,
        });
        let nodes = vec![
            ClauseNode::If(IfClause {
                condition: gt("a", 0),
                body: vec![lit("outer"), inner],
                else_ifs: vec![],
                else_body: None,
            }),
            ClauseNode::Set(vec![lit("a = 1")]),
            ClauseNode::Set(vec![lit("b = 1")]),
        ];
        let mut ctx = PlanContext::new();
        let plan = emit_plan(&nodes, &mut ctx);
        let declared: Vec<&str> = plan
            .steps
            .iter()
            .filter_map(|s| match s {
                BuildStep::DeclareConditionList { name }
                | BuildStep::DeclareStringAccumulator { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(declared, vec!["sql", "if_cond_0", "if_cond_1", "set_0", "set_1"]);
    }

    #[test]
    fn test_nested_clause_declared_before_use() {
        let nodes = vec![ClauseNode::If(IfClause {
            condition: gt("a", 0),
            body: vec![ClauseNode::Where(vec![lit("a = 1")])],
            else_ifs: vec![],
            else_body: None,
        })];
        let plan = emit_plan(&nodes, &mut PlanContext::new());
        let finalize = plan
            .steps
            .iter()
            .position(|s| matches!(s, BuildStep::FinalizeJoin { target, .. } if target == "where_0"));
        let consume = plan
            .steps
            .iter()
            .position(|s| matches!(s, BuildStep::AppendCondition { .. }));
        assert!(finalize < consume);
    }
}
