use crudgen::prelude::*;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

const SCHEMA: &str = r#"{
    "interfaces": [{
        "name": "UserMapper",
        "table": "users",
        "methods": [
            {
                "name": "FindUsers",
                "params": [
                    { "name": "id", "type": "int" },
                    { "name": "name", "type": "string" }
                ],
                "results": [
                    { "name": "users", "type": "User", "package": "model", "is_array": true },
                    { "type": "error" }
                ],
                "doc": "FindUsers lists users.\n@Sql(select * from @table {{where}} {{if id > 0}} and id = @id {{end}} {{if name != \"\"}} and name = @name {{end}} {{end}})\n@Result(users)"
            },
            {
                "name": "SearchByName",
                "params": [{ "name": "name", "type": "string" }],
                "results": [{ "name": "users", "type": "User", "package": "model", "is_array": true }],
                "doc": "@AddParam(pattern, \"%\" + @name + \"%\")\n@Where(name like @pattern)\n@Result(users)"
            },
            {
                "name": "Rename",
                "params": [
                    { "name": "id", "type": "int" },
                    { "name": "name", "type": "string" }
                ],
                "results": [
                    { "name": "n", "type": "int64" },
                    { "name": "err", "type": "error" }
                ],
                "doc": "@Sql(update @table {{set}} {{if name != \"\"}} name = @name, {{end}} {{end}} where id = @id)\n@RowsAffected(n)"
            }
        ]
    }, {
        "name": "Helpers",
        "methods": []
    }]
}"#;

fn compiled() -> Vec<CompiledInterface> {
    let schema = Schema::from_json(SCHEMA).expect("schema parses");
    crudgen::compile(&schema, &CompilerConfig::default()).expect("schema compiles")
}

fn unit<'a>(compiled: &'a [CompiledInterface], name: &str) -> &'a MethodCompilationUnit {
    compiled[0]
        .methods
        .iter()
        .find(|m| m.name == name)
        .expect("method compiled")
}

fn compile_one(doc: &str, params: Vec<ParameterDescriptor>) -> Result<MethodCompilationUnit, CrudgenError> {
    let method = MethodDefinition {
        name: "M".to_string(),
        params,
        results: vec![ParameterDescriptor::new("out", "User").pointer()],
        doc: doc.to_string(),
    };
    Compiler::default().compile_method("Mapper", "items", &method)
}

#[test]
fn test_table_less_interfaces_are_skipped() {
    let compiled = compiled();
    assert_eq!(compiled.len(), 1);
    assert_eq!(compiled[0].name, "UserMapper");
    assert_eq!(compiled[0].methods.len(), 3);
}

#[test]
fn test_where_block_end_to_end() {
    let compiled = compiled();
    let unit = unit(&compiled, "FindUsers");
    assert_eq!(unit.directives.operation, Some(Operation::Raw));

    let query = execute_unit(unit, &Bindings::new().bind("id", 5).bind("name", "")).unwrap();
    assert_eq!(query.sql, "select * from users WHERE id = @id");
    assert_eq!(query.params, BTreeMap::from([("id".to_string(), Value::Int(5))]));

    let query = execute_unit(unit, &Bindings::new().bind("id", 0).bind("name", "bob")).unwrap();
    assert_eq!(query.sql, "select * from users WHERE name = @name");

    let query = execute_unit(unit, &Bindings::new().bind("id", 0).bind("name", "")).unwrap();
    assert_eq!(query.sql, "select * from users");
    assert!(query.params.is_empty());
}

#[test]
fn test_added_param_feeds_filter() {
    let compiled = compiled();
    let unit = unit(&compiled, "SearchByName");
    assert!(unit.plan.is_none());
    assert_eq!(unit.directives.added_params[0].name, "pattern");

    let query = execute_unit(unit, &Bindings::new().bind("name", "bo")).unwrap();
    assert_eq!(query.sql, "");
    assert_eq!(query.filter, "(name like @pattern)");
    assert_eq!(
        query.params,
        BTreeMap::from([("pattern".to_string(), Value::from("%bo%"))])
    );
}

#[test]
fn test_set_block_end_to_end() {
    let compiled = compiled();
    let unit = unit(&compiled, "Rename");
    assert_eq!(unit.directives.operation, Some(Operation::Exec));
    assert_eq!(unit.directives.rows_affected.as_ref().map(|p| p.name.as_str()), Some("n"));
    assert_eq!(unit.error_result_name(), "err");

    let query = execute_unit(unit, &Bindings::new().bind("id", 7).bind("name", "ann")).unwrap();
    assert_eq!(query.sql, "update users SET name = @name where id = @id");
    assert_eq!(
        query.params,
        BTreeMap::from([
            ("id".to_string(), Value::Int(7)),
            ("name".to_string(), Value::from("ann")),
        ])
    );
}

#[test]
fn test_unknown_reference_is_classification_error() {
    let err = compile_one(
        "@Sql(select * from t where a = @bogus)\n@Result(out)",
        vec![ParameterDescriptor::new("a", "int")],
    )
    .unwrap_err();
    assert!(matches!(err.root(), CrudgenError::Classification(_)));
    assert!(err.to_string().starts_with("Mapper.M: "));
}

#[test]
fn test_unclosed_if_is_structural_error() {
    let err = compile_one(
        "@Sql({{if a > 0}} and a = @a)\n@Result(out)",
        vec![ParameterDescriptor::new("a", "int")],
    )
    .unwrap_err();
    assert!(matches!(err.root(), CrudgenError::Structural(_)));
}

#[test]
fn test_string_compared_with_nil_is_type_mismatch() {
    let err = compile_one(
        "@Sql({{if name == nil}} x {{end}})\n@Result(out)",
        vec![ParameterDescriptor::new("name", "string")],
    )
    .unwrap_err();
    assert!(matches!(err.root(), CrudgenError::TypeMismatch(_)));
}

#[test]
fn test_update_or_create_needs_where() {
    let err = compile_one(
        "@UpdateOrCreate(item)\n@Result(out)",
        vec![ParameterDescriptor::new("item", "Item").pointer()],
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Mapper.M: Directive error: @UpdateOrCreate requires at least one @Where"
    );
}

#[test]
fn test_compiled_output_serializes() {
    let json = serde_json::to_value(compiled()).unwrap();
    let steps = &json[0]["methods"][0]["plan"]["steps"];
    assert_eq!(steps[0]["op"], "declare_string_accumulator");
    assert_eq!(json[0]["methods"][1]["plan"], serde_json::Value::Null);
}

#[test]
fn test_toml_schema() {
    let schema = Schema::from_toml(
        r#"
        [[interfaces]]
        name = "AuditLog"
        table = "audit_log"

        [[interfaces.methods]]
        name = "Insert"
        doc = "@Create(entry)"
        params = [{ name = "entry", type = "Entry", package = "model", is_pointer = true }]
        "#,
    )
    .unwrap();
    let compiled = crudgen::compile(&schema, &CompilerConfig::default()).unwrap();
    let unit = &compiled[0].methods[0];
    assert_eq!(compiled[0].table, "audit_log");
    assert!(matches!(unit.directives.operation, Some(Operation::Create { .. })));
}

#[test]
fn test_max_id_from_config() {
    let config = CompilerConfig::builder().max_id(500).build();
    let method = MethodDefinition {
        name: "Recent".to_string(),
        params: vec![],
        results: vec![ParameterDescriptor::new("ids", "int").array()],
        doc: "@Sql(select id from @table where id < @maxId)\n@Result(ids)".to_string(),
    };
    let unit = Compiler::new(config).compile_method("Ids", "events", &method).unwrap();
    let query = execute_unit(&unit, &Bindings::new()).unwrap();
    assert_eq!(query.sql, "select id from events where id < 500");
}

#[test]
fn test_raw_reference_renders_as_placeholder() {
    let unit = compile_one(
        "@Sql(select * from @table where name = @@name)\n@Result(out)",
        vec![ParameterDescriptor::new("name", "string")],
    )
    .unwrap();
    let query = execute_unit(&unit, &Bindings::new().bind("name", "bob")).unwrap();
    assert_eq!(query.sql, "select * from items where name = @name");
    assert_eq!(
        query.params,
        BTreeMap::from([("name".to_string(), Value::from("bob"))])
    );
}

#[test]
fn test_unknown_raw_reference_is_classification_error() {
    let err = compile_one(
        "@Sql(select * from t where a = @@bogus)\n@Result(out)",
        vec![ParameterDescriptor::new("a", "int")],
    )
    .unwrap_err();
    assert!(matches!(err.root(), CrudgenError::Classification(_)));
    assert!(err.to_string().contains("unknown parameter: bogus"));
}

#[test]
fn test_column_named_set_keeps_keyword() {
    let unit = compile_one(
        "@Sql(update t {{set}} {{if a > 0}} set = @a, {{end}} {{end}})",
        vec![ParameterDescriptor::new("a", "int")],
    )
    .unwrap();
    let query = execute_unit(&unit, &Bindings::new().bind("a", 5)).unwrap();
    assert_eq!(query.sql, "update t SET set = @a");
}

#[test]
fn test_bool_compared_with_operator_is_structural_error() {
    for template in ["{{if active == true}} x {{end}}", "{{if active == 1}} x {{end}}"] {
        let err = compile_one(
            &format!("@Sql({})\n@Result(out)", template),
            vec![ParameterDescriptor::new("active", "bool")],
        )
        .unwrap_err();
        assert!(
            matches!(err.root(), CrudgenError::Structural(_)),
            "{}: {}",
            template,
            err
        );
    }
}

#[test]
fn test_empty_result_target_is_rejected() {
    let method = MethodDefinition {
        name: "M".to_string(),
        params: vec![],
        results: vec![
            ParameterDescriptor::new("out", "User").pointer(),
            ParameterDescriptor::new("", "error"),
        ],
        doc: "@Sql(select 1)\n@Result()".to_string(),
    };
    let err = Compiler::default().compile_method("Mapper", "items", &method).unwrap_err();
    assert!(matches!(err.root(), CrudgenError::Directive(_)));
}

#[test]
fn test_duplicate_names_rejected_outside_schema() {
    let err = compile_one(
        "@Sql(select 1)\n@Result(out)",
        vec![ParameterDescriptor::new("out", "int")],
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Mapper.M: Schema error: duplicate parameter name 'out'"
    );
}
