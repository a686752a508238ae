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
use arrow::array::ArrayRef;

use super::codec::{BinaryStructView, encode_tuple};
use super::error::{MaxRowError, Result};
use super::scalar::{AggScalarValue, Tuple, scalar_from_array};

/// Positional access to one incoming tuple, whatever its physical encoding.
///
/// `field_at` must hand back an owned value: the caller may overwrite the backing
/// storage as soon as the accumulate call returns.
pub trait TupleSource {
    fn len(&self) -> usize;

    fn field_at(&self, idx: usize) -> Result<Option<AggScalarValue>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TupleSource for [Option<AggScalarValue>] {
    fn len(&self) -> usize {
        <[Option<AggScalarValue>]>::len(self)
    }

    fn field_at(&self, idx: usize) -> Result<Option<AggScalarValue>> {
        self.get(idx).cloned().ok_or_else(|| {
            MaxRowError::Representation(format!(
                "field {} out of range for tuple of {} fields",
                idx,
                <[Option<AggScalarValue>]>::len(self)
            ))
        })
    }
}

impl TupleSource for Vec<Option<AggScalarValue>> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn field_at(&self, idx: usize) -> Result<Option<AggScalarValue>> {
        self.as_slice().field_at(idx)
    }
}

/// One row across a set of equally long columns: raw argument columns, or the child
/// columns of a struct partial.
#[derive(Clone, Copy)]
pub struct ArrayRowSource<'a> {
    columns: &'a [ArrayRef],
    row: usize,
}

impl<'a> ArrayRowSource<'a> {
    pub fn new(columns: &'a [ArrayRef], row: usize) -> Self {
        Self { columns, row }
    }
}

impl TupleSource for ArrayRowSource<'_> {
    fn len(&self) -> usize {
        self.columns.len()
    }

    fn field_at(&self, idx: usize) -> Result<Option<AggScalarValue>> {
        let column = self.columns.get(idx).ok_or_else(|| {
            MaxRowError::Representation(format!(
                "column {} out of range for {} columns",
                idx,
                self.columns.len()
            ))
        })?;
        scalar_from_array(column, self.row).map_err(MaxRowError::Representation)
    }
}

impl TupleSource for BinaryStructView<'_> {
    fn len(&self) -> usize {
        BinaryStructView::len(self)
    }

    fn field_at(&self, idx: usize) -> Result<Option<AggScalarValue>> {
        self.field(idx).map_err(MaxRowError::Representation)
    }
}

/// A partial result as handed from one aggregation level to the next.
#[derive(Clone, Debug, PartialEq)]
pub enum PartialValue {
    /// Plain ordered field list.
    Plain(Tuple),
    /// Binary struct bytes, see [`super::codec`].
    Encoded(Vec<u8>),
}

impl PartialValue {
    pub fn encode(tuple: &[Option<AggScalarValue>]) -> Result<Self> {
        encode_tuple(tuple)
            .map(Self::Encoded)
            .map_err(MaxRowError::Representation)
    }

    pub fn as_source(&self) -> Result<PartialSource<'_>> {
        match self {
            Self::Plain(tuple) => Ok(PartialSource::Plain(tuple.as_slice())),
            Self::Encoded(bytes) => BinaryStructView::try_new(bytes)
                .map(PartialSource::Encoded)
                .map_err(MaxRowError::Representation),
        }
    }

    /// Materializes every field as an ordered list.
    pub fn unpack(&self) -> Result<Tuple> {
        match self {
            Self::Plain(tuple) => Ok(tuple.clone()),
            Self::Encoded(bytes) => BinaryStructView::try_new(bytes)
                .and_then(|view| view.fields_as_list())
                .map_err(MaxRowError::Representation),
        }
    }
}

pub enum PartialSource<'a> {
    Plain(&'a [Option<AggScalarValue>]),
    Encoded(BinaryStructView<'a>),
}

impl TupleSource for PartialSource<'_> {
    fn len(&self) -> usize {
        match self {
            Self::Plain(tuple) => tuple.len(),
            Self::Encoded(view) => view.len(),
        }
    }

    fn field_at(&self, idx: usize) -> Result<Option<AggScalarValue>> {
        match self {
            Self::Plain(tuple) => tuple.field_at(idx),
            Self::Encoded(view) => TupleSource::field_at(view, idx),
        }
    }
}
