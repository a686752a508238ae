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
use arrow::array::{Array, ArrayRef, BinaryArray, StructArray};
use arrow::datatypes::DataType;

use super::codec::BinaryStructView;
use super::error::{MaxRowError, Result};
use super::scalar::AggScalarValue;
use super::schema::{InputLayout, MaxRowSchema};
use super::source::{ArrayRowSource, TupleSource};

/// A batch of incoming tuples, already checked against the negotiated schema.
#[derive(Debug)]
pub enum MaxRowInputView<'a> {
    /// Raw argument columns, key first.
    Columns(&'a [ArrayRef]),
    /// Struct-encoded tuples (composite input or plain partials).
    Struct(&'a StructArray),
    /// Binary-encoded partials.
    Binary(&'a BinaryArray),
}

/// One row of a [`MaxRowInputView`].
pub enum RowSource<'a> {
    Row(ArrayRowSource<'a>),
    Encoded(BinaryStructView<'a>),
}

impl TupleSource for RowSource<'_> {
    fn len(&self) -> usize {
        match self {
            Self::Row(row) => row.len(),
            Self::Encoded(view) => view.len(),
        }
    }

    fn field_at(&self, idx: usize) -> Result<Option<AggScalarValue>> {
        match self {
            Self::Row(row) => row.field_at(idx),
            Self::Encoded(view) => TupleSource::field_at(view, idx),
        }
    }
}

impl<'a> MaxRowInputView<'a> {
    pub fn num_rows(&self) -> usize {
        match self {
            Self::Columns(columns) => columns.first().map(|c| c.len()).unwrap_or(0),
            Self::Struct(array) => array.len(),
            Self::Binary(array) => array.len(),
        }
    }

    /// Returns `None` for a NULL partial, which callers skip.
    pub fn row(&self, row: usize) -> Result<Option<RowSource<'a>>> {
        match *self {
            Self::Columns(columns) => Ok(Some(RowSource::Row(ArrayRowSource::new(columns, row)))),
            Self::Struct(array) => {
                if array.is_null(row) {
                    return Ok(None);
                }
                Ok(Some(RowSource::Row(ArrayRowSource::new(array.columns(), row))))
            }
            Self::Binary(array) => {
                if array.is_null(row) {
                    return Ok(None);
                }
                BinaryStructView::try_new(array.value(row))
                    .map(|view| Some(RowSource::Encoded(view)))
                    .map_err(|e| MaxRowError::Representation(format!("row {row}: {e}")))
            }
        }
    }
}

fn check_type(position: usize, expected: &DataType, actual: &DataType) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(MaxRowError::Representation(format!(
        "column {} type mismatch: expected {:?}, got {:?}",
        position, expected, actual
    )))
}

/// Checks the children of a struct partial. A child may carry either the declared input
/// type or its normalized form, since lower levels emit normalized structs.
pub(crate) fn check_partial_struct(schema: &MaxRowSchema, array: &StructArray) -> Result<()> {
    for (idx, child) in array.columns().iter().enumerate() {
        if child.data_type() == &schema.output_types()[idx] {
            continue;
        }
        check_type(idx, &schema.input_types()[idx], child.data_type())?;
    }
    Ok(())
}

/// View over the argument columns of an update call.
///
/// Raw layouts expect one column per schema field; composite layouts expect a single
/// partial column and route through [`build_merge_view`].
pub fn build_input_view<'a>(
    schema: &MaxRowSchema,
    columns: &'a [ArrayRef],
    validate_types: bool,
) -> Result<MaxRowInputView<'a>> {
    match schema.layout() {
        InputLayout::RawColumns => {
            if columns.len() != schema.width() {
                return Err(MaxRowError::Representation(format!(
                    "expected {} argument columns, got {}",
                    schema.width(),
                    columns.len()
                )));
            }
            let rows = columns[0].len();
            for (idx, column) in columns.iter().enumerate() {
                if column.len() != rows {
                    return Err(MaxRowError::Representation(format!(
                        "column {} has {} rows, expected {}",
                        idx,
                        column.len(),
                        rows
                    )));
                }
                if validate_types {
                    check_type(idx, &schema.input_types()[idx], column.data_type())?;
                }
            }
            Ok(MaxRowInputView::Columns(columns))
        }
        InputLayout::Composite => {
            let [column] = columns else {
                return Err(MaxRowError::Representation(format!(
                    "expected a single partial column, got {}",
                    columns.len()
                )));
            };
            let view = build_merge_view(schema, column)?;
            if let (MaxRowInputView::Struct(array), true) = (&view, validate_types) {
                check_partial_struct(schema, array)?;
            }
            Ok(view)
        }
    }
}

/// View over a partial column. Accepts struct partials and binary partials; any other
/// physical type is rejected with the offending type in the message.
pub fn build_merge_view<'a>(
    schema: &MaxRowSchema,
    array: &'a ArrayRef,
) -> Result<MaxRowInputView<'a>> {
    match array.data_type() {
        DataType::Struct(fields) => {
            if fields.len() != schema.width() {
                return Err(MaxRowError::Representation(format!(
                    "partial struct has {} fields, expected {}",
                    fields.len(),
                    schema.width()
                )));
            }
            let arr = array
                .as_any()
                .downcast_ref::<StructArray>()
                .ok_or_else(|| {
                    MaxRowError::Representation("failed to downcast to StructArray".to_string())
                })?;
            Ok(MaxRowInputView::Struct(arr))
        }
        DataType::Binary => {
            let arr = array
                .as_any()
                .downcast_ref::<BinaryArray>()
                .ok_or_else(|| {
                    MaxRowError::Representation("failed to downcast to BinaryArray".to_string())
                })?;
            Ok(MaxRowInputView::Binary(arr))
        }
        other => Err(MaxRowError::Representation(format!(
            "unsupported partial encoding: {:?}",
            other
        ))),
    }
}
