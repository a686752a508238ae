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
use std::cmp::Ordering;
use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryBuilder};
use arrow::datatypes::DataType;

use crate::common::app_config::{AggConfig, IntermediateEncoding};
use crate::common::logging::{debug, trace, warn};

use super::codec::encode_tuple;
use super::error::{MaxRowError, Result};
use super::scalar::{
    AggScalarValue, Tuple, build_scalar_array, check_optional_scalar_type,
    compare_optional_scalar_values,
};
use super::schema::{AggMode, MaxRowSchema, validate_arg_types};
use super::source::{PartialValue, TupleSource};
use super::state::MaxRowState;
use super::views::{MaxRowInputView, build_input_view, build_merge_view, check_partial_struct};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AggOptions {
    pub intermediate_encoding: IntermediateEncoding,
    pub validate_input_types: bool,
}

impl Default for AggOptions {
    fn default() -> Self {
        Self::from_config(&AggConfig::default())
    }
}

impl AggOptions {
    pub fn from_config(cfg: &AggConfig) -> Self {
        Self {
            intermediate_encoding: cfg.intermediate_encoding,
            validate_input_types: cfg.validate_input_types,
        }
    }
}

/// Function front door: validates argument types before any instance exists.
pub struct MaxRowFunction;

impl MaxRowFunction {
    pub const NAME: &'static str = "max_row";

    pub fn resolve(arg_types: &[DataType]) -> Result<MaxRowEvaluator> {
        validate_arg_types(arg_types)?;
        Ok(MaxRowEvaluator {
            arg_types: arg_types.to_vec(),
            options: AggOptions::default(),
        })
    }
}

/// A validated but not yet initialized instance. The host clones one per plan stage.
#[derive(Clone, Debug)]
pub struct MaxRowEvaluator {
    arg_types: Vec<DataType>,
    options: AggOptions,
}

impl MaxRowEvaluator {
    pub fn with_options(mut self, options: AggOptions) -> Self {
        self.options = options;
        self
    }

    pub fn arg_types(&self) -> &[DataType] {
        &self.arg_types
    }

    /// Negotiates the schema for one instance.
    ///
    /// `input_types` are the raw argument types at a leaf, or the single struct emitted
    /// by a lower level at a merge node. The path is picked from that shape; `mode` only
    /// decides what the instance emits.
    pub fn initialize(self, mode: AggMode, input_types: &[DataType]) -> Result<MaxRowAggregator> {
        let schema = MaxRowSchema::negotiate(input_types)?;
        if !schema.matches_mode(mode) {
            warn!(
                "max_row input layout {:?} is unusual for mode {:?}",
                schema.layout(),
                mode
            );
        }
        debug!(
            "max_row initialized: mode={:?} layout={:?} width={} output_type={:?}",
            mode,
            schema.layout(),
            schema.width(),
            schema.output_type()
        );
        Ok(MaxRowAggregator {
            mode,
            schema: Arc::new(schema),
            options: self.options,
        })
    }
}

/// What [`MaxRowAggregator::emit`] hands back, depending on the mode.
#[derive(Clone, Debug, PartialEq)]
pub enum MaxRowOutput {
    Partial(PartialValue),
    Final(Tuple),
}

/// An initialized instance. Holds only read-only schema data; all mutable state lives
/// in the [`MaxRowState`] buffers the host owns per group.
#[derive(Clone, Debug)]
pub struct MaxRowAggregator {
    mode: AggMode,
    schema: Arc<MaxRowSchema>,
    options: AggOptions,
}

impl MaxRowAggregator {
    pub fn mode(&self) -> AggMode {
        self.mode
    }

    pub fn schema(&self) -> &MaxRowSchema {
        &self.schema
    }

    pub fn options(&self) -> AggOptions {
        self.options
    }

    pub fn output_type(&self) -> &DataType {
        self.schema.output_type()
    }

    /// Physical type of the partial column produced by `build_array(.., true)`.
    pub fn intermediate_type(&self) -> DataType {
        match self.options.intermediate_encoding {
            IntermediateEncoding::Struct => self.schema.output_type().clone(),
            IntermediateEncoding::Binary => DataType::Binary,
        }
    }

    pub fn new_state(&self) -> MaxRowState {
        MaxRowState::Empty
    }

    pub fn reset(&self, state: &mut MaxRowState) {
        state.reset();
    }

    /// Folds one tuple into `state`. Raw rows and unpacked partials go through the same
    /// rule: the candidate replaces the held tuple only when its key is strictly greater,
    /// so the first of several equal maxima is kept. Every copied field must fit its
    /// normalized column type; a mismatch leaves `state` untouched.
    pub fn accumulate<S>(&self, state: &mut MaxRowState, source: Option<&S>) -> Result<()>
    where
        S: TupleSource + ?Sized,
    {
        let Some(source) = source else {
            return Ok(());
        };
        let width = self.schema.width();
        if source.len() != width {
            return Err(MaxRowError::Representation(format!(
                "tuple has {} fields, expected {}",
                source.len(),
                width
            )));
        }

        let candidate_key = source.field_at(0)?;
        self.check_field(0, &candidate_key)?;
        let is_max = match state.key() {
            None => true,
            Some(current) => {
                compare_optional_scalar_values(current, &candidate_key)
                    .map_err(MaxRowError::Representation)?
                    == Ordering::Less
            }
        };
        if !is_max {
            return Ok(());
        }

        let mut tuple = Vec::with_capacity(width);
        tuple.push(candidate_key);
        for idx in 1..width {
            let value = source.field_at(idx)?;
            self.check_field(idx, &value)?;
            tuple.push(value);
        }
        trace!("max_row new maximum key={:?}", tuple[0]);
        state.replace(tuple);
        Ok(())
    }

    fn check_field(&self, idx: usize, value: &Option<AggScalarValue>) -> Result<()> {
        check_optional_scalar_type(value, &self.schema.output_types()[idx])
            .map_err(|e| MaxRowError::Representation(format!("field {idx} type mismatch: {e}")))
    }

    /// Merges a partial emitted by another instance. Equivalent to unpacking it and
    /// calling [`Self::accumulate`].
    pub fn accumulate_partial(
        &self,
        state: &mut MaxRowState,
        partial: Option<&PartialValue>,
    ) -> Result<()> {
        let Some(partial) = partial else {
            return Ok(());
        };
        let source = partial.as_source()?;
        self.accumulate(state, Some(&source))
    }

    pub fn merge_states(&self, target: &mut MaxRowState, other: &MaxRowState) -> Result<()> {
        let partial = self.emit_partial(other)?;
        self.accumulate_partial(target, partial.as_ref())
    }

    pub fn emit_partial(&self, state: &MaxRowState) -> Result<Option<PartialValue>> {
        let Some(tuple) = state.tuple() else {
            return Ok(None);
        };
        match self.options.intermediate_encoding {
            IntermediateEncoding::Struct => Ok(Some(PartialValue::Plain(tuple.clone()))),
            IntermediateEncoding::Binary => PartialValue::encode(tuple).map(Some),
        }
    }

    pub fn emit_final(&self, state: &MaxRowState) -> Option<Tuple> {
        state.tuple().cloned()
    }

    pub fn emit(&self, state: &MaxRowState) -> Result<Option<MaxRowOutput>> {
        if self.mode.emits_partial() {
            Ok(self.emit_partial(state)?.map(MaxRowOutput::Partial))
        } else {
            Ok(self.emit_final(state).map(MaxRowOutput::Final))
        }
    }

    /// Batch form of [`Self::accumulate`]: row `i` of `columns` goes to
    /// `states[group_ids[i]]`.
    pub fn update_batch(
        &self,
        states: &mut [MaxRowState],
        group_ids: &[usize],
        columns: &[ArrayRef],
    ) -> Result<()> {
        let view = build_input_view(&self.schema, columns, self.options.validate_input_types)?;
        self.fold_view(states, group_ids, &view)
    }

    /// Batch form of [`Self::accumulate_partial`] over a struct or binary partial column.
    pub fn merge_batch(
        &self,
        states: &mut [MaxRowState],
        group_ids: &[usize],
        partials: &ArrayRef,
    ) -> Result<()> {
        let view = build_merge_view(&self.schema, partials)?;
        if let (MaxRowInputView::Struct(array), true) = (&view, self.options.validate_input_types) {
            check_partial_struct(&self.schema, array)?;
        }
        self.fold_view(states, group_ids, &view)
    }

    fn fold_view(
        &self,
        states: &mut [MaxRowState],
        group_ids: &[usize],
        view: &MaxRowInputView<'_>,
    ) -> Result<()> {
        if group_ids.len() != view.num_rows() {
            return Err(MaxRowError::Representation(format!(
                "{} group ids for {} rows",
                group_ids.len(),
                view.num_rows()
            )));
        }
        let num_states = states.len();
        for (row, &group) in group_ids.iter().enumerate() {
            let state = states.get_mut(group).ok_or_else(|| {
                MaxRowError::Representation(format!(
                    "group {} out of range for {} states",
                    group, num_states
                ))
            })?;
            if let Some(source) = view.row(row)? {
                self.accumulate(state, Some(&source))?;
            }
        }
        Ok(())
    }

    /// One output row per state. Empty states become NULL.
    pub fn build_array(&self, states: &[MaxRowState], output_intermediate: bool) -> Result<ArrayRef> {
        if output_intermediate && self.options.intermediate_encoding == IntermediateEncoding::Binary
        {
            let mut builder = BinaryBuilder::new();
            for state in states {
                match state.tuple() {
                    Some(tuple) => {
                        let bytes = encode_tuple(tuple).map_err(MaxRowError::Output)?;
                        builder.append_value(&bytes);
                    }
                    None => builder.append_null(),
                }
            }
            return Ok(Arc::new(builder.finish()));
        }

        let values = states
            .iter()
            .map(|state| state.tuple().cloned().map(AggScalarValue::Struct))
            .collect();
        build_scalar_array(self.schema.output_type(), values).map_err(MaxRowError::Output)
    }

    /// `build_array` with the intermediate flag taken from the mode.
    pub fn build_output(&self, states: &[MaxRowState]) -> Result<ArrayRef> {
        self.build_array(states, self.mode.emits_partial())
    }
}
