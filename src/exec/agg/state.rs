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
use super::scalar::{AggScalarValue, Tuple};

/// Per-group aggregation buffer: nothing seen yet, or the best tuple so far.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum MaxRowState {
    #[default]
    Empty,
    Holding(Tuple),
}

impl MaxRowState {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn tuple(&self) -> Option<&Tuple> {
        match self {
            Self::Empty => None,
            Self::Holding(tuple) => Some(tuple),
        }
    }

    pub fn key(&self) -> Option<&Option<AggScalarValue>> {
        self.tuple().and_then(|t| t.first())
    }

    pub(crate) fn replace(&mut self, tuple: Tuple) {
        *self = Self::Holding(tuple);
    }

    pub fn reset(&mut self) {
        *self = Self::Empty;
    }
}
