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
use std::fmt;

/// Failures raised by the max-row aggregate.
///
/// `TypeValidation` is raised while resolving or initializing the function and is never
/// retryable. `Representation` aborts the current accumulate/merge call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaxRowError {
    #[error("argument {position} type error: {message}")]
    TypeValidation { position: usize, message: String },
    #[error("invalid max_row input representation: {0}")]
    Representation(String),
    #[error("max_row output build failed: {0}")]
    Output(String),
}

impl MaxRowError {
    pub(crate) fn type_validation(position: usize, message: impl fmt::Display) -> Self {
        Self::TypeValidation {
            position,
            message: message.to_string(),
        }
    }

    pub fn is_type_validation(&self) -> bool {
        matches!(self, Self::TypeValidation { .. })
    }

    pub fn is_representation(&self) -> bool {
        matches!(self, Self::Representation(_))
    }
}

pub type Result<T> = std::result::Result<T, MaxRowError>;
