//! The crudgen CLI
//!
//! Compiles directive schemas into build plans and helps debug templates.
//!
//! # Usage
//!
//! ```bash
//! # Compile a schema to JSON for a renderer
//! crudgen compile mappers.json --output plans.json
//!
//! # Explain a template
//! crudgen explain '{{where}} {{if id > 0}} id = @id {{end}} {{end}}' --param id:int
//!
//! # Render one method against sample bindings
//! crudgen render mappers.json UserMapper.FindUsers --bind sample.json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use crudgen::classifier::{classify_all, ParamScope};
use crudgen::emitter::{emit_plan, PlanContext};
use crudgen::lexer::{tokenize, Token};
use crudgen::parser::parse_statements;
use crudgen::prelude::*;
use crudgen::router::{compile_method, template_statements};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crudgen")]
#[command(version)]
#[command(about = "Annotation-driven data-access compiler", long_about = None)]
#[command(after_help = "EXAMPLES:
    crudgen compile mappers.json --format pretty
    crudgen explain '{{if id > 0}} and id = @id {{end}}' --param id:int
    crudgen render mappers.json UserMapper.FindUsers --bind sample.json")]
struct Cli {
    /// Compiler configuration file
    #[arg(short, long, global = true, env = "CRUDGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every interface of a schema
    Compile {
        /// Schema file (.json or .toml)
        schema: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show fragments, clause tree and build steps of a template
    Explain {
        /// The template to explain
        template: String,

        /// Parameter declarations, e.g. `id:int`, `ids:[]int`, `user:*model.User`
        #[arg(short, long, value_delimiter = ',')]
        param: Vec<String>,

        /// Table name for `@table`
        #[arg(short, long, default_value = "table_name")]
        table: String,
    },
    /// Execute one method's plan against JSON bindings
    Render {
        /// Schema file (.json or .toml)
        schema: PathBuf,

        /// Method as `Interface.method`
        target: String,

        /// JSON object with one key per parameter
        #[arg(short, long)]
        bind: Option<PathBuf>,
    },
    /// Show the template syntax reference
    Symbols,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "crudgen=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = CompilerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    match &cli.command {
        Commands::Compile {
            schema,
            format,
            output,
        } => compile_schema(schema, format, output.as_deref(), &config),
        Commands::Explain {
            template,
            param,
            table,
        } => explain_template(template, param, table, &config),
        Commands::Render {
            schema,
            target,
            bind,
        } => render_method(schema, target, bind.as_deref(), &config),
        Commands::Symbols => {
            show_symbols();
            Ok(())
        }
    }
}

fn compile_schema(
    path: &Path,
    format: &OutputFormat,
    output: Option<&Path>,
    config: &CompilerConfig,
) -> Result<()> {
    let schema = Schema::from_file(path)?;
    let compiled = crudgen::compile(&schema, config)?;

    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&compiled)?,
        OutputFormat::Pretty => pretty(&compiled),
    };

    match output {
        Some(out) => {
            std::fs::write(out, text).with_context(|| format!("writing {}", out.display()))?;
            let methods: usize = compiled.iter().map(|i| i.methods.len()).sum();
            println!(
                "{} Compiled {} method(s) in {} interface(s) to {}",
                "✓".green(),
                methods,
                compiled.len(),
                out.display().to_string().cyan()
            );
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn pretty(compiled: &[CompiledInterface]) -> String {
    let mut out = String::new();
    for interface in compiled {
        out.push_str(&format!(
            "{} {}\n",
            interface.name.cyan().bold(),
            format!("({})", interface.table).dimmed()
        ));
        for unit in &interface.methods {
            let op = unit
                .directives
                .operation
                .as_ref()
                .map(Operation::name)
                .unwrap_or("Where");
            out.push_str(&format!("  {} {}\n", unit.name.white().bold(), op.yellow()));
            if let Some(result) = &unit.directives.result {
                out.push_str(&format!(
                    "    {} {} ({:?}, {:?})\n",
                    "result:".dimmed(),
                    result.param.name,
                    result.position,
                    result.fetch
                ));
            }
            if !unit.directives.filters.is_empty() {
                out.push_str(&format!(
                    "    {} {}\n",
                    "filter:".dimmed(),
                    unit.directives.filter_sql()
                ));
            }
            for added in &unit.directives.added_params {
                out.push_str(&format!("    {} {} = {}\n", "param:".dimmed(), added.name, added.value));
            }
            if let Some(plan) = &unit.plan {
                for step in &plan.steps {
                    out.push_str(&format!("    {}\n", step));
                }
            }
        }
    }
    out
}

/// Parse `name:type`, where type is `[]`? `*`? `pkg.`? `Type`.
fn parse_param_spec(spec: &str) -> Result<ParameterDescriptor> {
    let Some((name, ty)) = spec.split_once(':') else {
        bail!("invalid parameter '{}', expected name:type", spec);
    };
    let mut ty = ty.trim();
    let is_array = ty.starts_with("[]");
    if is_array {
        ty = &ty[2..];
    }
    let is_pointer = ty.starts_with('*');
    if is_pointer {
        ty = &ty[1..];
    }
    let mut param = match ty.rsplit_once('.') {
        Some((pkg, base)) => ParameterDescriptor::new(name.trim(), base).in_package(pkg),
        None => ParameterDescriptor::new(name.trim(), ty),
    };
    param.is_array = is_array;
    param.is_pointer = is_pointer;
    Ok(param)
}

fn explain_template(template: &str, specs: &[String], table: &str, config: &CompilerConfig) -> Result<()> {
    let params = specs
        .iter()
        .map(|s| parse_param_spec(s))
        .collect::<Result<Vec<_>>>()?;
    let scope = ParamScope::new(&params, table, config);

    println!("{}", "crudgen Template Explanation".cyan().bold());
    println!();
    println!("{} {}", "Template:".dimmed(), template.yellow());
    println!();

    println!("{}", "Tokens:".green().bold());
    for token in tokenize(template)? {
        match token {
            Token::Sql(text) => println!("  {} {:?}", "sql".dimmed(), text),
            Token::Param(param) => println!("  {} {}", "ref".dimmed(), param.to_string().cyan()),
            Token::Block { source, fragments } => {
                let fragments = classify_all(fragments, &scope)?;
                let typed: Vec<String> = fragments
                    .iter()
                    .map(|f| {
                        let array = if f.is_array { "[]" } else { "" };
                        format!("{}:{}{}", f.value, array, f.kind)
                    })
                    .collect();
                println!("  {} {{{{{}}}}}  {}", "blk".dimmed(), source.white(), typed.join(" ").yellow());
            }
        }
    }
    println!();

    let statements = template_statements(template, &scope)?;
    let nodes = parse_statements(&statements)?;
    println!("{}", "Clause Tree:".green().bold());
    print_nodes(&nodes, 1);
    println!();

    let plan = emit_plan(&nodes, &mut PlanContext::new());
    println!("{}", "Build Steps:".green().bold());
    for (i, step) in plan.steps.iter().enumerate() {
        println!("  {} {}", format!("{:>3}", i).dimmed(), step.to_string().white());
    }
    Ok(())
}

fn print_nodes(nodes: &[ClauseNode], depth: usize) {
    let pad = "  ".repeat(depth);
    for node in nodes {
        match node {
            ClauseNode::SqlLiteral(run) => println!("{}{} {:?}", pad, "•".dimmed(), run.to_string().trim()),
            ClauseNode::If(clause) => {
                for branch in clause.branches() {
                    println!("{}{} {}", pad, "when".cyan(), branch.guard);
                    print_nodes(branch.body, depth + 1);
                }
            }
            ClauseNode::Where(children) => {
                println!("{}{}", pad, "WHERE".cyan());
                print_nodes(children, depth + 1);
            }
            ClauseNode::Set(children) => {
                println!("{}{}", pad, "SET".cyan());
                print_nodes(children, depth + 1);
            }
        }
    }
}

fn render_method(path: &Path, target: &str, bind: Option<&Path>, config: &CompilerConfig) -> Result<()> {
    let schema = Schema::from_file(path)?;
    let Some((interface, method)) = target.split_once('.') else {
        bail!("invalid target '{}', expected Interface.method", target);
    };
    let Some((def, method_def)) = schema.method(interface, method) else {
        bail!("method {} not found in {}", target, path.display());
    };
    let Some(table) = def.table_name() else {
        bail!("interface {} has no table name", interface);
    };

    let bindings = match bind {
        Some(file) => {
            let content =
                std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
            Bindings::from_json(serde_json::from_str(&content)?)?
        }
        None => Bindings::new(),
    };

    let unit = compile_method(&def.name, table, method_def, config)?;
    let query = execute_unit(&unit, &bindings)?;

    if let Some(op) = &unit.directives.operation {
        println!("{} {}", "Operation:".dimmed(), op.name().yellow());
    }
    if !query.sql.is_empty() {
        println!("{}", "SQL:".green().bold());
        println!("  {}", query.sql.white());
    }
    if !query.filter.is_empty() {
        println!("{}", "Filter:".green().bold());
        println!("  {}", query.filter.white());
    }
    println!("{}", "Params:".cyan());
    if query.params.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (name, value) in &query.params {
        println!("  @{} = {}", name, serde_json::to_string(value)?.yellow());
    }
    Ok(())
}

fn show_symbols() {
    println!("{}", "crudgen Template Reference".cyan().bold());
    println!();

    let symbols = [
        ("@name", "Param", "Bound parameter", "named placeholder"),
        ("@a.b", "Field", "Field of a struct parameter", "named placeholder"),
        ("@@name", "Raw", "Raw variable reference", "named placeholder"),
        ("@table", "Table", "Interface table name", "inlined"),
        ("@maxId", "Max id", "Reserved upper bound", "inlined"),
        ("{{if c}}", "If", "Conditional branch", "first true branch"),
        ("{{else if c}}", "Else if", "Chained branch", "!(prior) && c"),
        ("{{else}}", "Else", "Fallback branch", "!(prior)"),
        ("{{where}}", "Where", "Condition list", "WHERE c1 AND c2"),
        ("{{set}}", "Set", "Assignment list", "SET a = 1,b = 2"),
        ("{{end}}", "End", "Closes a block", ""),
        ("&& ||", "Logical", "Condition connectives", "&& binds tighter"),
        ("== != > >= < <=", "Compare", "Comparison operators", ""),
    ];

    println!(
        "{:18} {:10} {:30} {}",
        "Syntax".white().bold(),
        "Name".white().bold(),
        "Function".white().bold(),
        "Effect".white().bold()
    );
    println!("{}", "─".repeat(80).dimmed());

    for (syntax, name, function, effect) in symbols {
        println!(
            "{:18} {:10} {:30} {}",
            syntax.cyan().bold(),
            name.yellow(),
            function.white(),
            effect.dimmed()
        );
    }

    println!();
    println!("{}", "Directives:".white().bold());
    for line in [
        "@Sql(template)            Raw with @Result, Exec otherwise",
        "@Where(expr)              Filter condition, AND-joined",
        "@AddParam(name, value)    Extra parameter: \"%\" + @name + \"%\"",
        "@Result(name)             Query output destination",
        "@RowsAffected(name)       int64 affected-row count",
        "@Create(arg)              Insert",
        "@UpdateOrCreate(arg)      Upsert, needs @Result and @Where",
    ] {
        println!("  {}", line);
    }
}
