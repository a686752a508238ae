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
use arrow::datatypes::{DataType, Field, Fields};

use super::error::{MaxRowError, Result};
use super::types::{is_comparable_type, is_supported_type, normalize_fields, normalize_type};

/// Which step of a multi-stage aggregation an instance runs.
///
/// Assigned by the host's plan. The schema path is chosen from the input shape, not from
/// the mode; the mode only tells the aggregator what to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggMode {
    /// Raw rows in, final result out (single-stage aggregation).
    RawComplete,
    /// Raw rows in, partial out (leaf of the merge tree).
    RawPartial,
    /// Partials in, partial out (interior merge node).
    MergePartial,
    /// Partials in, final result out (root of the merge tree).
    MergeFinal,
}

impl AggMode {
    pub fn consumes_raw(self) -> bool {
        matches!(self, Self::RawComplete | Self::RawPartial)
    }

    pub fn emits_partial(self) -> bool {
        matches!(self, Self::RawPartial | Self::MergePartial)
    }
}

/// How the input side of an instance was interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputLayout {
    /// Several typed argument columns, key first.
    RawColumns,
    /// One struct column holding a previously emitted tuple.
    Composite,
}

/// Negotiated descriptors, fixed for the lifetime of an aggregator instance.
#[derive(Clone, Debug, PartialEq)]
pub struct MaxRowSchema {
    layout: InputLayout,
    input_types: Vec<DataType>,
    output_types: Vec<DataType>,
    output_fields: Fields,
    output_type: DataType,
}

/// Synthetic output field name. Argument names are not known at this layer.
pub fn field_name(idx: usize) -> String {
    format!("col{idx}")
}

/// Checks the argument list the way the function front door does: the key must be
/// orderable and every column must have a value representation.
pub fn validate_arg_types(arg_types: &[DataType]) -> Result<()> {
    let key = arg_types
        .first()
        .ok_or_else(|| MaxRowError::type_validation(0, "max_row expects at least one argument"))?;
    if !is_comparable_type(key) {
        return Err(MaxRowError::type_validation(
            0,
            format!(
                "cannot support comparison of map type or complex type containing map: {:?}",
                key
            ),
        ));
    }
    for (position, data_type) in arg_types.iter().enumerate().skip(1) {
        if !is_supported_type(data_type) {
            return Err(MaxRowError::type_validation(
                position,
                format!("unsupported column type {:?}", data_type),
            ));
        }
    }
    Ok(())
}

impl MaxRowSchema {
    /// Picks the raw or composite path from the input shape alone.
    pub fn negotiate(input_types: &[DataType]) -> Result<Self> {
        match input_types {
            [DataType::Struct(fields)] => Self::from_composite(fields),
            _ => Self::from_raw_columns(input_types),
        }
    }

    pub fn from_raw_columns(input_types: &[DataType]) -> Result<Self> {
        validate_arg_types(input_types)?;
        let output_types: Vec<DataType> = input_types.iter().map(normalize_type).collect();
        let fields: Fields = output_types
            .iter()
            .enumerate()
            .map(|(idx, dt)| Field::new(field_name(idx), dt.clone(), true))
            .collect::<Vec<_>>()
            .into();
        Ok(Self {
            layout: InputLayout::RawColumns,
            input_types: input_types.to_vec(),
            output_types,
            output_type: DataType::Struct(fields.clone()),
            output_fields: fields,
        })
    }

    pub fn from_composite(fields: &Fields) -> Result<Self> {
        let input_types: Vec<DataType> = fields.iter().map(|f| f.data_type().clone()).collect();
        validate_arg_types(&input_types)?;
        let output_types = input_types.iter().map(normalize_type).collect();
        let output_fields = normalize_fields(fields);
        Ok(Self {
            layout: InputLayout::Composite,
            input_types,
            output_types,
            output_type: DataType::Struct(output_fields.clone()),
            output_fields,
        })
    }

    pub fn layout(&self) -> InputLayout {
        self.layout
    }

    pub fn width(&self) -> usize {
        self.input_types.len()
    }

    pub fn input_types(&self) -> &[DataType] {
        &self.input_types
    }

    pub fn output_types(&self) -> &[DataType] {
        &self.output_types
    }

    pub fn output_type(&self) -> &DataType {
        &self.output_type
    }

    pub fn output_fields(&self) -> &Fields {
        &self.output_fields
    }

    /// True when `mode` is the one this layout normally runs under.
    pub fn matches_mode(&self, mode: AggMode) -> bool {
        match self.layout {
            InputLayout::RawColumns => mode.consumes_raw(),
            InputLayout::Composite => !mode.consumes_raw(),
        }
    }
}
