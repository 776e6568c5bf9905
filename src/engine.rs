//! Plan executor.
//!
//! Interprets a [`BuildPlan`] against runtime parameter values and yields
//! the SQL text together with the parameters it binds. This is the
//! reference semantics a generated data-access method follows; nothing is
//! sent to a database.
//!
//! ```rust,ignore
//! let bindings = Bindings::new().bind("id", 5).bind("name", "");
//! let query = execute(&plan, &bindings)?;
//! assert_eq!(query.sql, "WHERE id = @id");
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::ast::{CmpOp, CondExpr, Guard, Operand};
use crate::error::{CrudgenError, CrudgenResult};
use crate::plan::{BuildPlan, BuildStep, JoinRule, Piece, Producer, Segment, ValueExpr, ValueTerm};
use crate::router::MethodCompilationUnit;

/// Dynamic value type for parameter bindings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Time(DateTime<Utc>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Time(_) => "time",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Struct(
                fields.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

/// Runtime values of a method's parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value (auto-detect type from common types).
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Bindings from a JSON object, one key per parameter.
    pub fn from_json(json: serde_json::Value) -> CrudgenResult<Self> {
        match json {
            serde_json::Value::Object(fields) => Ok(Self {
                values: fields.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
            other => Err(CrudgenError::evaluation(format!(
                "bindings must be a JSON object, found {}",
                other
            ))),
        }
    }

    /// Look up a parameter or a dotted field path below one.
    ///
    /// Missing fields and fields below `nil` read as `nil`.
    pub fn lookup(&self, path: &str) -> CrudgenResult<Value> {
        let mut segments = path.split('.');
        let head = segments.next().unwrap_or(path);
        let mut current = self.values.get(head).ok_or_else(|| {
            CrudgenError::evaluation(format!("no binding for parameter '{}'", head))
        })?;
        for field in segments {
            current = match current {
                Value::Struct(fields) => match fields.get(field) {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                },
                Value::Null => return Ok(Value::Null),
                other => {
                    return Err(CrudgenError::evaluation(format!(
                        "cannot access field '{}' of {} value in '{}'",
                        field,
                        other.type_name(),
                        path
                    )));
                }
            };
        }
        Ok(current.clone())
    }
}

/// SQL text with the parameters bound by it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedQuery {
    pub sql: String,
    /// `@Where` conditions, `(c1) and (c2)`
    pub filter: String,
    pub params: BTreeMap<String, Value>,
}

/// Text of one accumulator entry and the parameters it carries.
#[derive(Debug, Clone, Default)]
struct Rendered {
    text: String,
    params: BTreeMap<String, Value>,
}

fn render_pieces(pieces: &[Piece], bindings: &Bindings) -> CrudgenResult<Rendered> {
    let mut out = Rendered::default();
    for piece in pieces {
        match piece {
            Piece::Text(text) => out.text.push_str(text),
            Piece::Param(param) => {
                out.text.push('@');
                out.text.push_str(&param.name);
                let value = bindings.lookup(&param.name)?;
                out.params.insert(param.name.clone(), value);
            }
        }
    }
    Ok(out)
}

/// Join contributions; only non-empty ones keep their parameters.
fn join(rule: &JoinRule, parts: Vec<Rendered>) -> Rendered {
    let mut params = BTreeMap::new();
    let mut texts = Vec::new();
    for part in parts {
        let text = rule.normalize(&part.text);
        if text.is_empty() {
            continue;
        }
        params.extend(part.params);
        texts.push(text);
    }
    Rendered {
        text: rule.finish(&texts.join(&rule.separator)),
        params,
    }
}

fn parse_time(s: &str) -> CrudgenResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CrudgenError::evaluation(format!("invalid time '{}': {}", s, e)))
}

/// Compare two values the way the generated code would.
pub fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> CrudgenResult<bool> {
    let unordered = || {
        CrudgenError::evaluation(format!(
            "operator {} is not defined for {} and {}",
            op,
            lhs.type_name(),
            rhs.type_name()
        ))
    };

    if lhs.is_null() || rhs.is_null() {
        let same = lhs.is_null() && rhs.is_null();
        return match op {
            CmpOp::Eq => Ok(same),
            CmpOp::Ne => Ok(!same),
            _ => Err(unordered()),
        };
    }

    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::String(b)) => Some(a.cmp(&parse_time(b)?)),
        (Value::String(a), Value::Time(b)) => Some(parse_time(a)?.cmp(b)),
        (Value::Bool(_), Value::Bool(_))
        | (Value::Array(_), Value::Array(_))
        | (Value::Struct(_), Value::Struct(_)) => {
            return match op {
                CmpOp::Eq => Ok(lhs == rhs),
                CmpOp::Ne => Ok(lhs != rhs),
                _ => Err(unordered()),
            };
        }
        _ => {
            return Err(CrudgenError::evaluation(format!(
                "cannot compare {} with {}",
                lhs.type_name(),
                rhs.type_name()
            )));
        }
    };

    // NaN
    let Some(ordering) = ordering else {
        return Ok(op == CmpOp::Ne);
    };
    Ok(match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Gte => ordering != Ordering::Less,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Lte => ordering != Ordering::Greater,
    })
}

/// Evaluate an `@AddParam` value. Several terms concatenate as text.
pub fn evaluate_value(expr: &ValueExpr, bindings: &Bindings) -> CrudgenResult<Value> {
    let term_value = |term: &ValueTerm| -> CrudgenResult<Value> {
        Ok(match term {
            ValueTerm::Str(s) => Value::String(s.clone()),
            ValueTerm::Int(n) => Value::Int(*n),
            ValueTerm::Float(n) => Value::Float(*n),
            ValueTerm::Param(p) => bindings.lookup(&p.name)?,
        })
    };
    match expr.terms.as_slice() {
        [single] => term_value(single),
        terms => {
            let mut out = String::new();
            for term in terms {
                out.push_str(&term_value(term)?.to_string());
            }
            Ok(Value::String(out))
        }
    }
}

enum Slot<'p> {
    Conditions(Vec<(&'p Guard, &'p Producer)>),
    Strings(Vec<Rendered>),
    Done(Rendered),
}

struct Executor<'p, 'b> {
    bindings: &'b Bindings,
    slots: HashMap<&'p str, Slot<'p>>,
}

impl<'p> Executor<'p, '_> {
    fn undeclared(name: &str) -> CrudgenError {
        CrudgenError::evaluation(format!("'{}' is not declared", name))
    }

    fn strings(&mut self, name: &str) -> CrudgenResult<&mut Vec<Rendered>> {
        match self.slots.get_mut(name) {
            Some(Slot::Strings(parts)) => Ok(parts),
            _ => Err(CrudgenError::evaluation(format!(
                "'{}' is not an open string accumulator",
                name
            ))),
        }
    }

    fn step(&mut self, step: &'p BuildStep) -> CrudgenResult<()> {
        match step {
            BuildStep::DeclareConditionList { name } => {
                self.slots.insert(name, Slot::Conditions(Vec::new()));
            }
            BuildStep::AppendCondition {
                target,
                guard,
                producer,
            } => match self.slots.get_mut(target.as_str()) {
                Some(Slot::Conditions(list)) => list.push((guard, producer)),
                _ => return Err(Self::undeclared(target)),
            },
            BuildStep::DeclareStringAccumulator { name } => {
                self.slots.insert(name, Slot::Strings(Vec::new()));
            }
            BuildStep::AppendLiteral { target, pieces } => {
                let rendered = render_pieces(pieces, self.bindings)?;
                self.strings(target)?.push(rendered);
            }
            BuildStep::AppendClause { target, source } => {
                let rendered = self.value(source)?;
                self.strings(target)?.push(rendered);
            }
            BuildStep::FinalizeJoin { target, rule } => {
                let Some(Slot::Strings(parts)) = self.slots.remove(target.as_str()) else {
                    return Err(Self::undeclared(target));
                };
                self.slots.insert(target, Slot::Done(join(rule, parts)));
            }
        }
        Ok(())
    }

    /// Current text of a finished accumulator or a condition list.
    fn value(&self, name: &str) -> CrudgenResult<Rendered> {
        match self.slots.get(name) {
            Some(Slot::Done(rendered)) => Ok(rendered.clone()),
            Some(Slot::Conditions(branches)) => {
                for (guard, producer) in branches {
                    if self.guard(guard)? {
                        return self.produce(producer);
                    }
                }
                Ok(Rendered::default())
            }
            Some(Slot::Strings(_)) => Err(CrudgenError::evaluation(format!(
                "'{}' is used before it is joined",
                name
            ))),
            None => Err(Self::undeclared(name)),
        }
    }

    fn produce(&self, producer: &Producer) -> CrudgenResult<Rendered> {
        let parts = producer
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(pieces) => render_pieces(pieces, self.bindings),
                Segment::Clause(name) => self.value(name),
            })
            .collect::<CrudgenResult<Vec<_>>>()?;
        Ok(join(&JoinRule::plain(), parts))
    }

    fn guard(&self, guard: &Guard) -> CrudgenResult<bool> {
        match guard {
            Guard::When(expr) => self.condition(expr),
            Guard::Not(inner) => Ok(!self.guard(inner)?),
            Guard::Any(guards) => {
                for g in guards {
                    if self.guard(g)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Guard::All(guards) => {
                for g in guards {
                    if !self.guard(g)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn condition(&self, expr: &CondExpr) -> CrudgenResult<bool> {
        match expr {
            CondExpr::Compare { lhs, op, rhs } => {
                compare(&self.operand(lhs)?, *op, &self.operand(rhs)?)
            }
            CondExpr::Test(operand) => match self.operand(operand)? {
                Value::Bool(b) => Ok(b),
                Value::Null => Ok(false),
                other => Err(CrudgenError::evaluation(format!(
                    "condition '{}' is {}, not bool",
                    operand,
                    other.type_name()
                ))),
            },
            CondExpr::And(a, b) => Ok(self.condition(a)? && self.condition(b)?),
            CondExpr::Or(a, b) => Ok(self.condition(a)? || self.condition(b)?),
        }
    }

    fn operand(&self, operand: &Operand) -> CrudgenResult<Value> {
        Ok(match operand {
            Operand::Param(path) => self.bindings.lookup(path)?,
            Operand::Int(n) => Value::Int(*n),
            Operand::Str(s) => Value::String(s.clone()),
            Operand::Bool(b) => Value::Bool(*b),
            Operand::Nil => Value::Null,
        })
    }
}

/// Execute a build plan.
pub fn execute(plan: &BuildPlan, bindings: &Bindings) -> CrudgenResult<RenderedQuery> {
    tracing::trace!(steps = plan.steps.len(), "executing plan");
    let mut executor = Executor {
        bindings,
        slots: HashMap::new(),
    };
    for step in &plan.steps {
        executor.step(step)?;
    }
    let rendered = executor.value(&plan.root)?;
    Ok(RenderedQuery {
        sql: rendered.text,
        filter: String::new(),
        params: rendered.params,
    })
}

/// Execute everything a method binds: added parameters, the `@Sql` plan and
/// the `@Where` filter.
///
/// Added parameters are always part of the parameter map.
pub fn execute_unit(unit: &MethodCompilationUnit, bindings: &Bindings) -> CrudgenResult<RenderedQuery> {
    let mut bindings = bindings.clone();
    let mut added = BTreeMap::new();
    for param in &unit.directives.added_params {
        let value = evaluate_value(&param.value, &bindings)?;
        bindings.insert(param.name.clone(), value.clone());
        added.insert(param.name.clone(), value);
    }

    let mut query = match &unit.plan {
        Some(plan) => execute(plan, &bindings)?,
        None => RenderedQuery::default(),
    };

    let mut conditions = Vec::with_capacity(unit.directives.filters.len());
    for filter in &unit.directives.filters {
        let rendered = render_pieces(&filter.pieces, &bindings)?;
        conditions.push(format!("({})", rendered.text.trim()));
        query.params.extend(rendered.params);
    }
    query.filter = conditions.join(" and ");
    query.params.extend(added);

    tracing::debug!(
        interface = %unit.interface,
        method = %unit.name,
        params = query.params.len(),
        "rendered method"
    );
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ParamRef, ParameterDescriptor};
    use crate::classifier::ParamScope;
    use crate::config::CompilerConfig;
    use crate::emitter::PlanContext;
    use crate::router::compile_template;

    fn params() -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::new("a", "int"),
            ParameterDescriptor::new("b", "int"),
            ParameterDescriptor::new("id", "int"),
            ParameterDescriptor::new("name", "string"),
            ParameterDescriptor::new("ids", "int").array(),
            ParameterDescriptor::new("active", "bool"),
            ParameterDescriptor::new("since", "Time").in_package("time"),
            ParameterDescriptor::new("user", "User").in_package("model").pointer(),
        ]
    }

    fn plan(template: &str) -> BuildPlan {
        let params = params();
        let config = CompilerConfig::default();
        let scope = ParamScope::new(&params, "users", &config);
        compile_template(template, &scope, &mut PlanContext::new()).unwrap()
    }

    fn sql(template: &str, bindings: &Bindings) -> String {
        execute(&plan(template), bindings).unwrap().sql
    }

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from("hello"), Value::String("hello".to_string()));
        assert_eq!(Value::from(vec![1i64, 2]), Value::Array(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(
            Value::from(serde_json::json!({"a": [1.5, null]})),
            Value::Struct(BTreeMap::from([(
                "a".to_string(),
                Value::Array(vec![Value::Float(1.5), Value::Null])
            )]))
        );
    }

    #[test]
    fn test_lookup_paths() {
        let bindings = Bindings::from_json(serde_json::json!({
            "user": {"name": "bob", "tags": null},
            "id": 3
        }))
        .unwrap();
        assert_eq!(bindings.lookup("user.name").unwrap(), Value::from("bob"));
        assert_eq!(bindings.lookup("user.missing").unwrap(), Value::Null);
        assert_eq!(bindings.lookup("user.tags.first").unwrap(), Value::Null);
        assert!(bindings.lookup("id.x").is_err());
        assert!(bindings.lookup("ghost").is_err());
    }

    #[test]
    fn test_branch_exclusivity_truth_table() {
        let p = plan("{{if a > 0}} first {{else if b > 0}} second {{else}} third {{end}}");
        for a in [-1i64, 1] {
            for b in [-1i64, 1] {
                let got = execute(&p, &Bindings::new().bind("a", a).bind("b", b)).unwrap().sql;
                let expected = if a > 0 {
                    "first"
                } else if b > 0 {
                    "second"
                } else {
                    "third"
                };
                assert_eq!(got, expected, "a = {}, b = {}", a, b);
            }
        }
    }

    #[test]
    fn test_no_branch_yields_empty() {
        let p = plan("select 1 {{if a > 0}} x {{else if b > 0}} y {{end}}");
        let got = execute(&p, &Bindings::new().bind("a", 0).bind("b", 0)).unwrap();
        assert_eq!(got.sql, "select 1");
    }

    #[test]
    fn test_where_scenario() {
        let template =
            r#"{{where}} {{if id > 0}} and id = @id {{end}} {{if name != ""}} and name = @name {{end}} {{end}}"#;
        let got = execute(&plan(template), &Bindings::new().bind("id", 5).bind("name", "")).unwrap();
        assert_eq!(got.sql, "WHERE id = @id");
        assert_eq!(got.params, BTreeMap::from([("id".to_string(), Value::Int(5))]));

        let got = execute(&plan(template), &Bindings::new().bind("id", 0).bind("name", "")).unwrap();
        assert_eq!(got.sql, "");
        assert!(got.params.is_empty());
    }

    #[test]
    fn test_set_block() {
        let template = "update @table {{set}} {{if name != \"\"}} name = @name, {{end}} {{if active}} active = @active {{end}} {{end}} where id = @id";
        let bindings = Bindings::new().bind("name", "bob").bind("active", false).bind("id", 1);
        assert_eq!(
            sql(template, &bindings),
            "update users SET name = @name where id = @id"
        );
    }

    #[test]
    fn test_nested_if() {
        let template = "{{if a > 0}} a = @a {{if b > 0}} and b = @b {{end}} {{end}}";
        let bindings = Bindings::new().bind("a", 1).bind("b", 1);
        assert_eq!(sql(template, &bindings), "a = @a and b = @b");
        let bindings = Bindings::new().bind("a", 1).bind("b", 0);
        let got = execute(&plan(template), &bindings).unwrap();
        assert_eq!(got.sql, "a = @a");
        assert!(!got.params.contains_key("b"));
    }

    #[test]
    fn test_nil_and_field_conditions() {
        let template = "{{if ids != nil}} id in @ids {{end}} {{if user.name == \"bob\"}} or owner = @user.name {{end}}";
        let bindings = Bindings::from_json(serde_json::json!({
            "ids": [1, 2],
            "user": {"name": "bob"}
        }))
        .unwrap();
        assert_eq!(sql(template, &bindings), "id in @ids or owner = @user.name");

        let bindings = Bindings::from_json(serde_json::json!({"ids": null, "user": null})).unwrap();
        assert_eq!(sql(template, &bindings), "");
    }

    #[test]
    fn test_compare() {
        assert!(compare(&Value::Int(2), CmpOp::Gt, &Value::Float(1.5)).unwrap());
        assert!(compare(&Value::from("a"), CmpOp::Lt, &Value::from("b")).unwrap());
        assert!(compare(&Value::Null, CmpOp::Eq, &Value::Null).unwrap());
        assert!(compare(&Value::from(vec![1i64]), CmpOp::Ne, &Value::Null).unwrap());
        assert!(compare(&Value::Null, CmpOp::Gt, &Value::Int(1)).is_err());
        assert!(compare(&Value::Bool(true), CmpOp::Gt, &Value::Bool(false)).is_err());
        assert!(compare(&Value::Int(1), CmpOp::Eq, &Value::from("1")).is_err());

        let t = parse_time("2024-01-02T00:00:00Z").unwrap();
        assert!(compare(&Value::Time(t), CmpOp::Gte, &Value::from("2024-01-01T00:00:00Z")).unwrap());
    }

    #[test]
    fn test_missing_binding() {
        let err = execute(&plan("{{if a > 0}} x {{end}}"), &Bindings::new()).unwrap_err();
        assert_eq!(err.to_string(), "Evaluation error: no binding for parameter 'a'");
    }

    #[test]
    fn test_evaluate_value() {
        let bindings = Bindings::new().bind("name", "bob");
        let expr = ValueExpr {
            terms: vec![
                ValueTerm::Str("%".into()),
                ValueTerm::Param(ParamRef { name: "name".into(), raw: false }),
                ValueTerm::Str("%".into()),
            ],
        };
        assert_eq!(evaluate_value(&expr, &bindings).unwrap(), Value::from("%bob%"));

        let single = ValueExpr { terms: vec![ValueTerm::Int(7)] };
        assert_eq!(evaluate_value(&single, &bindings).unwrap(), Value::Int(7));
    }
}
