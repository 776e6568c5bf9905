//! Input schema.
//!
//! The compiler never inspects source code. An external extractor hands
//! over interfaces, their table name and, per method, the ordered
//! parameters, results and raw doc text:
//!
//! ```json
//! {
//!   "interfaces": [{
//!     "name": "UserMapper",
//!     "table": "users",
//!     "methods": [{
//!       "name": "FindByID",
//!       "params": [{ "name": "id", "type": "int" }],
//!       "results": [
//!         { "name": "user", "type": "User", "package": "model", "is_pointer": true },
//!         { "name": "err", "type": "error" }
//!       ],
//!       "doc": "FindByID\n@Sql(select * from @table where id = @id)\n@Result(user)"
//!     }]
//!   }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::ast::ParameterDescriptor;
use crate::error::{CrudgenError, CrudgenResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDefinition {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub results: Vec<ParameterDescriptor>,
    /// Raw doc comment, comment markers removed
    #[serde(default)]
    pub doc: String,
}

impl MethodDefinition {
    /// Names must be unique across parameters and results.
    pub fn validate(&self) -> CrudgenResult<()> {
        let mut seen = HashSet::new();
        let named = self
            .params
            .iter()
            .chain(&self.results)
            .filter(|p| !p.name.is_empty());
        for param in named {
            if !seen.insert(param.name.as_str()) {
                return Err(CrudgenError::Schema(format!(
                    "duplicate parameter name '{}'",
                    param.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    /// Interfaces without a table are not compiled
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodDefinition>,
}

impl InterfaceDefinition {
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
}

impl Schema {
    pub fn from_json(content: &str) -> CrudgenResult<Self> {
        let schema: Self =
            serde_json::from_str(content).map_err(|e| CrudgenError::Schema(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_toml(content: &str) -> CrudgenResult<Self> {
        let schema: Self =
            toml::from_str(content).map_err(|e| CrudgenError::Schema(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load a schema file, TOML for `.toml`, JSON otherwise.
    pub fn from_file(path: &Path) -> CrudgenResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
        let parsed = if is_toml {
            Self::from_toml(&content)
        } else {
            Self::from_json(&content)
        };
        parsed.map_err(|e| match e {
            CrudgenError::Schema(msg) => {
                CrudgenError::Schema(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Validate every method, see [`MethodDefinition::validate`].
    pub fn validate(&self) -> CrudgenResult<()> {
        for interface in &self.interfaces {
            for method in &interface.methods {
                method.validate().map_err(|e| match e {
                    CrudgenError::Schema(msg) => {
                        CrudgenError::Schema(format!("{}.{}: {}", interface.name, method.name, msg))
                    }
                    other => other,
                })?;
            }
        }
        Ok(())
    }

    /// Find a method by interface and method name.
    pub fn method(&self, interface: &str, method: &str) -> Option<(&InterfaceDefinition, &MethodDefinition)> {
        let def = self.interfaces.iter().find(|i| i.name == interface)?;
        let m = def.methods.iter().find(|m| m.name == method)?;
        Some((def, m))
    }
}
