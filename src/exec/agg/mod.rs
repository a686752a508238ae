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
//! `max_row(key, col1, ...)`: returns the whole row with the greatest key as a struct.
//!
//! The same instance type runs at every level of a partial/final aggregation tree. Leaf
//! instances see raw argument columns; merge instances see the struct a lower level
//! emitted. Both go through one compare-and-replace rule, so merging partials in any
//! grouping or order yields the row a single pass would have picked.
mod codec;
mod error;
mod max_row;
mod scalar;
mod schema;
mod source;
mod state;
mod types;
mod views;

pub use codec::{BinaryStructView, encode_tuple};
pub use error::{MaxRowError, Result};
pub use max_row::{AggOptions, MaxRowAggregator, MaxRowEvaluator, MaxRowFunction, MaxRowOutput};
pub use scalar::{
    AggScalarValue, Tuple, build_scalar_array, check_optional_scalar_type, check_scalar_type,
    compare_optional_scalar_values, compare_scalar_values, scalar_from_array,
};
pub use schema::{AggMode, InputLayout, MaxRowSchema, field_name, validate_arg_types};
pub use source::{ArrayRowSource, PartialSource, PartialValue, TupleSource};
pub use state::MaxRowState;
pub use types::{is_comparable_type, is_supported_type, normalize_type};
pub use views::{MaxRowInputView, RowSource, build_input_view, build_merge_view};
