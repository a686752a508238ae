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
//! Column descriptor helpers: which Arrow types the aggregate can hold, which of them
//! can order rows, and the normalized form every stored value is copied into.
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields};

/// Returns true when values of `data_type` have an owned scalar representation.
pub fn is_supported_type(data_type: &DataType) -> bool {
    match data_type {
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::Float32
        | DataType::Float64
        | DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Binary
        | DataType::LargeBinary
        | DataType::FixedSizeBinary(_)
        | DataType::Date32
        | DataType::Timestamp(_, _)
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => true,
        DataType::List(item) | DataType::LargeList(item) | DataType::FixedSizeList(item, _) => {
            is_supported_type(item.data_type())
        }
        DataType::Struct(fields) => fields.iter().all(|f| is_supported_type(f.data_type())),
        DataType::Map(entries, _) => is_supported_type(entries.data_type()),
        DataType::Dictionary(_, value) => is_supported_type(value),
        _ => false,
    }
}

/// Returns true when two values of `data_type` can be ordered.
///
/// Maps have no ordering, and neither does any nested type that contains one.
pub fn is_comparable_type(data_type: &DataType) -> bool {
    match data_type {
        DataType::Map(_, _) => false,
        DataType::List(item) | DataType::LargeList(item) | DataType::FixedSizeList(item, _) => {
            is_comparable_type(item.data_type())
        }
        DataType::Struct(fields) => fields.iter().all(|f| is_comparable_type(f.data_type())),
        DataType::Dictionary(_, value) => is_comparable_type(value),
        other => is_supported_type(other),
    }
}

/// Maps a column descriptor onto the representation stored in aggregation state and
/// produced in output arrays. All nested fields become nullable.
pub fn normalize_type(data_type: &DataType) -> DataType {
    match data_type {
        DataType::LargeUtf8 => DataType::Utf8,
        DataType::LargeBinary | DataType::FixedSizeBinary(_) => DataType::Binary,
        DataType::Dictionary(_, value) => normalize_type(value),
        DataType::List(item) | DataType::LargeList(item) | DataType::FixedSizeList(item, _) => {
            DataType::List(Arc::new(normalize_field(item)))
        }
        DataType::Struct(fields) => DataType::Struct(normalize_fields(fields)),
        DataType::Map(entries, sorted) => {
            let normalized_entries = match entries.data_type() {
                DataType::Struct(kv) if kv.len() == 2 => {
                    let key = Field::new(kv[0].name(), normalize_type(kv[0].data_type()), false);
                    let value = normalize_field(&kv[1]);
                    Field::new(
                        entries.name(),
                        DataType::Struct(Fields::from(vec![key, value])),
                        false,
                    )
                }
                other => Field::new(entries.name(), normalize_type(other), false),
            };
            DataType::Map(Arc::new(normalized_entries), *sorted)
        }
        other => other.clone(),
    }
}

fn normalize_field(field: &Field) -> Field {
    Field::new(field.name(), normalize_type(field.data_type()), true)
}

pub(crate) fn normalize_fields(fields: &Fields) -> Fields {
    fields
        .iter()
        .map(|f| normalize_field(f))
        .collect::<Vec<_>>()
        .into()
}
