//! Compiler configuration.
//!
//! Looked up in order: an explicit path, `./crudgen.toml`, then
//! `<config_dir>/crudgen/config.toml`. Missing files fall back to defaults.
//!
//! ```toml
//! max_id = 1000
//! max_id_ident = "maxId"
//! table_ident = "table"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CrudgenError, CrudgenResult};

const LOCAL_CONFIG: &str = "crudgen.toml";

/// Settings shared by every method compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Value of the reserved upper-bound constant
    pub max_id: i64,
    /// Identifier that refers to `max_id` inside templates
    pub max_id_ident: String,
    /// Identifier that refers to the interface's table name
    pub table_ident: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_id: 1000,
            max_id_ident: "maxId".to_string(),
            table_ident: "table".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Create a new configuration builder
    pub fn builder() -> CompilerConfigBuilder {
        CompilerConfigBuilder::default()
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> CrudgenResult<Self> {
        toml::from_str(content).map_err(|e| CrudgenError::Config(e.to_string()))
    }

    /// Read configuration from a TOML file.
    pub fn from_file(path: &Path) -> CrudgenResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CrudgenError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load from `explicit`, the working directory or the user config dir.
    pub fn load(explicit: Option<&Path>) -> CrudgenResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::discover() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading compiler config");
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("crudgen").join("config.toml"))
            .filter(|path| path.exists())
    }
}

/// Builder for CompilerConfig
#[derive(Debug, Default)]
pub struct CompilerConfigBuilder {
    config: CompilerConfig,
}

impl CompilerConfigBuilder {
    /// Set the reserved upper-bound constant
    pub fn max_id(mut self, value: i64) -> Self {
        self.config.max_id = value;
        self
    }

    /// Set the identifier naming the upper-bound constant
    pub fn max_id_ident(mut self, ident: impl Into<String>) -> Self {
        self.config.max_id_ident = ident.into();
        self
    }

    /// Set the identifier naming the table
    pub fn table_ident(mut self, ident: impl Into<String>) -> Self {
        self.config.table_ident = ident.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> CompilerConfig {
        self.config
    }
}
