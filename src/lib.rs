//! # crudgen: annotation-driven data-access compiler
//!
//! > **Write the SQL once, in the doc comment. Get a build plan back.**
//!
//! crudgen reads interface method descriptions (parameters, results and a
//! doc comment carrying directives) and compiles every embedded SQL
//! template into a renderer-agnostic build plan.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use crudgen::prelude::*;
//!
//! let schema = Schema::from_file("mappers.json".as_ref())?;
//! let compiled = crudgen::compile(&schema, &CompilerConfig::default())?;
//!
//! let unit = &compiled[0].methods[0];
//! let query = execute_unit(unit, &Bindings::new().bind("id", 5).bind("name", ""))?;
//! // => "select * from users WHERE id = @id", {id: 5}
//! ```
//!
//! ## Template Syntax
//!
//! | Syntax                 | Meaning                                   |
//! |------------------------|-------------------------------------------|
//! | `@name`                | Bound parameter, `@a.b` for a field       |
//! | `@@name`               | Raw variable reference                    |
//! | `@table`               | Interface table name, inlined             |
//! | `{{if cond}}`          | Conditional, with `else if` / `else`      |
//! | `{{where}}`            | Condition list, `WHERE` prefix            |
//! | `{{set}}`              | Assignment list, `SET` prefix             |
//! | `{{end}}`              | Closes the innermost block                |
//!
//! ## Pipeline
//!
//! ```text
//! doc ─► directive ─► lexer ─► classifier ─► parser ─► emitter ─► BuildPlan
//! ```

pub mod ast;
pub mod classifier;
pub mod config;
pub mod directive;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod plan;
pub mod router;
pub mod schema;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::CompilerConfig;
    pub use crate::directive::{DirectiveSet, Operation, ResultBinding};
    pub use crate::engine::{execute, execute_unit, Bindings, RenderedQuery, Value};
    pub use crate::error::*;
    pub use crate::plan::{BuildPlan, BuildStep, JoinRule};
    pub use crate::router::{compile_template, CompiledInterface, Compiler, MethodCompilationUnit};
    pub use crate::schema::{InterfaceDefinition, MethodDefinition, Schema};
}

/// Compile every interface of a schema.
///
/// # Example
///
/// ```
/// use crudgen::config::CompilerConfig;
/// use crudgen::schema::Schema;
///
/// let schema = Schema::from_json(r#"{"interfaces": [{
///     "name": "UserMapper",
///     "table": "users",
///     "methods": [{
///         "name": "FindByID",
///         "params": [{"name": "id", "type": "int"}],
///         "results": [{"name": "user", "type": "User", "is_pointer": true}],
///         "doc": "@Sql(select * from @table where id = @id)\n@Result(user)"
///     }]
/// }]}"#).unwrap();
///
/// let compiled = crudgen::compile(&schema, &CompilerConfig::default()).unwrap();
/// assert_eq!(compiled[0].methods[0].name, "FindByID");
/// ```
pub fn compile(
    schema: &schema::Schema,
    config: &config::CompilerConfig,
) -> Result<Vec<router::CompiledInterface>, error::CrudgenError> {
    router::Compiler::new(config.clone()).compile(&schema.interfaces)
}
