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
//! Common utilities and helpers for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::DataType;
use tempfile::TempDir;

use maxrow::maxrow_config;
use maxrow::maxrow_logging;
use maxrow::{AggMode, AggOptions, AggScalarValue, MaxRowAggregator, MaxRowFunction, Tuple};

/// Test configuration for integration tests.
pub struct TestConfig {
    /// Temporary directory for test artifacts
    pub temp_dir: TempDir,
    /// Test config path
    pub config_path: PathBuf,
}

impl TestConfig {
    /// Create a new test configuration with default settings.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_encoding("struct")
    }

    pub fn with_encoding(encoding: &str) -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("test_maxrow.toml");

        let config_content = format!(
            r#"
log_level = "debug"

[agg]
intermediate_encoding = "{encoding}"
validate_input_types = true
"#
        );

        std::fs::write(&config_path, config_content)?;

        Ok(Self {
            temp_dir,
            config_path,
        })
    }

    /// Initialize logging for tests.
    pub fn init_logging(&self) {
        match self.load() {
            Ok(cfg) => maxrow_logging::init_from_config(&cfg),
            Err(_) => maxrow_logging::init_with_level("debug"),
        }
    }

    /// Parse the test configuration without touching the process-wide config.
    pub fn load(&self) -> anyhow::Result<maxrow_config::MaxRowConfig> {
        maxrow_config::MaxRowConfig::load_from_file(&self.config_path)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new().expect("Failed to create test config")
    }
}

pub fn raw_types() -> Vec<DataType> {
    vec![DataType::Int64, DataType::Utf8]
}

pub fn aggregator(mode: AggMode, options: AggOptions) -> MaxRowAggregator {
    MaxRowFunction::resolve(&raw_types())
        .expect("resolve max_row")
        .with_options(options)
        .initialize(mode, &raw_types())
        .expect("initialize max_row")
}

/// Merge-level instance fed with the struct a leaf built from `raw_types()`.
pub fn merge_aggregator(mode: AggMode, options: AggOptions) -> MaxRowAggregator {
    let leaf = aggregator(AggMode::RawPartial, options);
    MaxRowFunction::resolve(&raw_types())
        .expect("resolve max_row")
        .with_options(options)
        .initialize(mode, &[leaf.output_type().clone()])
        .expect("initialize max_row merge")
}

pub fn row(key: i64, payload: &str) -> Tuple {
    vec![
        Some(AggScalarValue::Int64(key)),
        Some(AggScalarValue::Utf8(payload.to_string())),
    ]
}

pub fn columns(rows: &[(i64, &str)]) -> Vec<ArrayRef> {
    vec![
        Arc::new(Int64Array::from(
            rows.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            rows.iter().map(|(_, p)| *p).collect::<Vec<_>>(),
        )),
    ]
}

/// Assert that a result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}
