// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<MaxRowConfig> = OnceLock::new();

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static MaxRowConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = path.as_ref().to_path_buf();
    let cfg = MaxRowConfig::load_from_file(&path)?;
    let _ = CONFIG.set(cfg);
    CONFIG.get().ok_or_else(|| anyhow!("config not initialized"))
}

pub fn init_from_env_or_default() -> Result<&'static MaxRowConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let cfg = match config_path_from_env_or_default() {
        Some(path) => MaxRowConfig::load_from_file(&path)?,
        None => MaxRowConfig::default(),
    };
    let _ = CONFIG.set(cfg);
    CONFIG.get().ok_or_else(|| anyhow!("config not initialized"))
}

pub fn config() -> Result<&'static MaxRowConfig> {
    init_from_env_or_default()
}

fn config_path_from_env_or_default() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("MAXROW_CONFIG") {
        if !p.trim().is_empty() {
            return Some(PathBuf::from(p.trim()));
        }
    }
    let local = PathBuf::from("maxrow.toml");
    local.exists().then_some(local)
}

#[derive(Clone, Debug, Deserialize)]
pub struct MaxRowConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "maxrow=trace"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub agg: AggConfig,
}

impl MaxRowConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        let cfg: MaxRowConfig =
            toml::from_str(&s).with_context(|| format!("parse toml: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn effective_log_filter(&self) -> &str {
        self.log_filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(self.log_level.as_str())
    }
}

impl Default for MaxRowConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            agg: AggConfig::default(),
        }
    }
}

/// How partial results travel between aggregation stages.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntermediateEncoding {
    /// Same struct as the final output.
    #[default]
    Struct,
    /// One self-describing binary cell per row, decoded field by field on merge.
    Binary,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AggConfig {
    #[serde(default)]
    pub intermediate_encoding: IntermediateEncoding,
    /// Reject batch input columns whose types differ from the negotiated schema.
    #[serde(default = "default_validate_input_types")]
    pub validate_input_types: bool,
}

fn default_validate_input_types() -> bool {
    true
}

impl Default for AggConfig {
    fn default() -> Self {
        Self {
            intermediate_encoding: IntermediateEncoding::default(),
            validate_input_types: default_validate_input_types(),
        }
    }
}
