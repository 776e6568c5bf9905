//! Directive router.
//!
//! Top-level driver: walks interfaces and methods in order, resolves each
//! method's directives and runs embedded templates through
//! lexer → classifier → clause parser → emitter. The first error aborts the
//! run, annotated with the interface, the method and the template text.

use serde::Serialize;

use crate::ast::{fragments_to_string, ClauseNode, ParameterDescriptor, SqlPiece, Statement};
use crate::classifier::{classify_all, resolve_reference, ParamScope};
use crate::config::CompilerConfig;
use crate::directive::{parse_directives, DirectiveSet};
use crate::emitter::{emit_plan, PlanContext};
use crate::error::CrudgenResult;
use crate::lexer::{tokenize, Token};
use crate::parser::{block_statement, parse_statements, validate_fragments};
use crate::plan::BuildPlan;
use crate::schema::{InterfaceDefinition, MethodDefinition};

/// Everything a renderer needs to generate one method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodCompilationUnit {
    pub interface: String,
    pub table: String,
    pub name: String,
    pub params: Vec<ParameterDescriptor>,
    pub results: Vec<ParameterDescriptor>,
    pub directives: DirectiveSet,
    /// Compiled `@Sql` template
    pub plan: Option<BuildPlan>,
}

impl MethodCompilationUnit {
    pub fn has_error_result(&self) -> bool {
        self.results.iter().any(|p| p.is_error())
    }

    /// Name of the `error` result, `err` when unnamed or absent.
    pub fn error_result_name(&self) -> &str {
        self.results
            .iter()
            .find(|p| p.is_error() && !p.name.is_empty())
            .map(|p| p.name.as_str())
            .unwrap_or("err")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledInterface {
    pub name: String,
    pub table: String,
    pub methods: Vec<MethodCompilationUnit>,
}

/// Turn a template into control statements.
///
/// Top-level references are resolved (builtins inlined) and every block is
/// classified and type-checked.
pub fn template_statements(template: &str, scope: &ParamScope<'_>) -> CrudgenResult<Vec<Statement>> {
    let mut statements = Vec::new();
    for token in tokenize(template)? {
        let statement = match token {
            Token::Sql(text) => Statement::Text(text),
            Token::Param(param) => match resolve_reference(&param, scope)? {
                SqlPiece::Text(text) => Statement::Text(text),
                SqlPiece::Param(param) => Statement::Param(param),
            },
            Token::Block { source, fragments } => {
                let fragments = classify_all(fragments, scope)?;
                tracing::trace!(block = %source, fragments = %fragments_to_string(&fragments), "classified");
                validate_fragments(&fragments)?;
                block_statement(&fragments, scope)?
            }
        };
        statements.push(statement);
    }
    Ok(statements)
}

/// Parse a template into its clause tree.
pub fn parse_template(template: &str, scope: &ParamScope<'_>) -> CrudgenResult<Vec<ClauseNode>> {
    let statements = template_statements(template, scope)?;
    parse_statements(&statements)
}

/// Compile a template into a build plan.
pub fn compile_template(
    template: &str,
    scope: &ParamScope<'_>,
    ctx: &mut PlanContext,
) -> CrudgenResult<BuildPlan> {
    let nodes = parse_template(template, scope).map_err(|e| e.in_template(template))?;
    Ok(emit_plan(&nodes, ctx))
}

/// Batch compiler over interface definitions.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile every interface. Interfaces without a table are skipped.
    pub fn compile(&self, interfaces: &[InterfaceDefinition]) -> CrudgenResult<Vec<CompiledInterface>> {
        let mut compiled = Vec::with_capacity(interfaces.len());
        for interface in interfaces {
            if let Some(unit) = self.compile_interface(interface)? {
                compiled.push(unit);
            }
        }
        Ok(compiled)
    }

    pub fn compile_interface(
        &self,
        interface: &InterfaceDefinition,
    ) -> CrudgenResult<Option<CompiledInterface>> {
        let Some(table) = interface.table_name() else {
            tracing::debug!(interface = %interface.name, "no table name, skipping");
            return Ok(None);
        };
        tracing::info!(interface = %interface.name, table, methods = interface.methods.len(), "compiling interface");

        let methods = interface
            .methods
            .iter()
            .map(|m| self.compile_method(&interface.name, table, m))
            .collect::<CrudgenResult<Vec<_>>>()?;
        Ok(Some(CompiledInterface {
            name: interface.name.clone(),
            table: table.to_string(),
            methods,
        }))
    }

    pub fn compile_method(
        &self,
        interface: &str,
        table: &str,
        method: &MethodDefinition,
    ) -> CrudgenResult<MethodCompilationUnit> {
        tracing::debug!(interface, method = %method.name, "compiling method");
        self.compile_method_inner(table, method)
            .map(|(directives, plan)| MethodCompilationUnit {
                interface: interface.to_string(),
                table: table.to_string(),
                name: method.name.clone(),
                params: method.params.clone(),
                results: method.results.clone(),
                directives,
                plan,
            })
            .map_err(|e| e.in_method(interface, &method.name))
    }

    fn compile_method_inner(
        &self,
        table: &str,
        method: &MethodDefinition,
    ) -> CrudgenResult<(DirectiveSet, Option<BuildPlan>)> {
        method.validate()?;
        let mut scope = ParamScope::new(&method.params, table, &self.config);
        let directives = parse_directives(&method.doc, &method.name, &method.results, &mut scope)?;
        let mut ctx = PlanContext::new();
        let plan = directives
            .sql
            .as_deref()
            .map(|template| compile_template(template, &scope, &mut ctx))
            .transpose()?;
        if let (Some(op), Some(plan)) = (&directives.operation, &plan) {
            tracing::debug!(operation = op.name(), steps = plan.steps.len(), "compiled template");
        }
        Ok((directives, plan))
    }
}

/// Compile a single method outside of a schema, for tooling and tests.
pub fn compile_method(
    interface: &str,
    table: &str,
    method: &MethodDefinition,
    config: &CompilerConfig,
) -> CrudgenResult<MethodCompilationUnit> {
    Compiler::new(config.clone()).compile_method(interface, table, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::Operation;
    use crate::error::CrudgenError;
    use crate::plan::{pieces_to_string, BuildStep};

    fn method(name: &str, doc: &str, params: Vec<ParameterDescriptor>) -> MethodDefinition {
        MethodDefinition {
            name: name.to_string(),
            params,
            results: vec![
                ParameterDescriptor::new("users", "User").in_package("model").array(),
                ParameterDescriptor::new("", "error"),
            ],
            doc: doc.to_string(),
        }
    }

    fn user_params() -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::new("id", "int"),
            ParameterDescriptor::new("name", "string"),
        ]
    }

    #[test]
    fn test_compile_method_with_plan() {
        let m = method(
            "FindUsers",
            "FindUsers\n@Sql(select * from @table {{where}} {{if id > 0}} and id = @id {{end}} {{end}})\n@Result(users)",
            user_params(),
        );
        let unit = compile_method("UserMapper", "users", &m, &CompilerConfig::default()).unwrap();
        assert_eq!(unit.directives.operation, Some(Operation::Raw));
        assert_eq!(unit.error_result_name(), "err");
        assert!(unit.has_error_result());

        let plan = unit.plan.unwrap();
        match &plan.steps[1] {
            BuildStep::AppendLiteral { target, pieces } => {
                assert_eq!(target, "sql");
                assert_eq!(pieces_to_string(pieces), "select * from users ");
            }
            other => panic!("expected literal, got {:?}", other),
        }
    }

    #[test]
    fn test_errors_carry_context() {
        let m = method("FindUsers", "@Sql(select * from t where a = @bogus)", user_params());
        let err = compile_method("UserMapper", "users", &m, &CompilerConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "UserMapper.FindUsers: Classification error: unknown parameter: bogus \
             (template: `select * from t where a = @bogus`)"
        );
    }

    #[test]
    fn test_table_less_interface_skipped() {
        let interfaces = vec![
            InterfaceDefinition {
                name: "Helper".to_string(),
                table: None,
                methods: vec![method("Broken", "@Sql({{if}})", vec![])],
            },
            InterfaceDefinition {
                name: "UserMapper".to_string(),
                table: Some("users".to_string()),
                methods: vec![method("All", "@Sql(select * from @table)\n@Result(users)", vec![])],
            },
        ];
        let compiled = Compiler::default().compile(&interfaces).unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].name, "UserMapper");
    }

    #[test]
    fn test_first_error_aborts() {
        let interfaces = vec![InterfaceDefinition {
            name: "UserMapper".to_string(),
            table: Some("users".to_string()),
            methods: vec![
                method("Ok", "@Where(id = @id)", user_params()),
                method("Bad", "@Sql({{if id > 0}} and id = @id)", user_params()),
            ],
        }];
        let err = Compiler::default().compile(&interfaces).unwrap_err();
        assert!(matches!(err.root(), CrudgenError::Structural(_)));
        assert!(err.to_string().starts_with("UserMapper.Bad: "));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut m = method("Find", "@Sql(select 1)\n@Result(users)", user_params());
        m.results[0].name = "id".to_string();
        let err = compile_method("UserMapper", "users", &m, &CompilerConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "UserMapper.Find: Schema error: duplicate parameter name 'id'"
        );
        assert!(matches!(err.root(), CrudgenError::Schema(_)));
    }

    #[test]
    fn test_named_error_result() {
        let mut m = method("Count", "@Where(id = @id)", user_params());
        m.results = vec![ParameterDescriptor::new("failure", "error")];
        let unit = compile_method("UserMapper", "users", &m, &CompilerConfig::default()).unwrap();
        assert_eq!(unit.error_result_name(), "failure");
        assert!(unit.plan.is_none());
    }
}
