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

use arrow::array::{
    Array, ArrayRef, BinaryArray, BinaryBuilder, BooleanArray, BooleanBuilder, Date32Array,
    Decimal128Array, Decimal256Array, FixedSizeBinaryArray, FixedSizeListArray, Float32Array,
    Float32Builder, Float64Array, Float64Builder, Int8Array, Int8Builder, Int16Array,
    Int16Builder, Int32Array, Int32Builder, Int64Array, Int64Builder, LargeBinaryArray,
    LargeListArray, LargeStringArray, ListArray, MapArray, StringArray, StringBuilder,
    StructArray, TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray, UInt8Array, UInt8Builder, UInt16Array, UInt16Builder, UInt32Array,
    UInt32Builder,
};
use arrow::datatypes::{DataType, TimeUnit};
use arrow_buffer::{NullBufferBuilder, OffsetBuffer, i256};

/// Owned, engine-independent copy of one Arrow value.
///
/// Every integer width is widened to `Int64` and `Float32` to `Float64`; the column
/// descriptor keeps the original width for output.
#[derive(Clone, Debug, PartialEq)]
pub enum AggScalarValue {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Binary(Vec<u8>),
    Date32(i32),
    Timestamp(i64),
    Decimal128(i128),
    Decimal256(i256),
    Struct(Vec<Option<AggScalarValue>>),
    Map(Vec<(Option<AggScalarValue>, Option<AggScalarValue>)>),
    List(Vec<Option<AggScalarValue>>),
}

/// One row: key at index 0, payload columns after it.
pub type Tuple = Vec<Option<AggScalarValue>>;

fn downcast<'a, T: 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T, String> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| format!("failed to downcast to {name}"))
}

fn list_items(values: &ArrayRef) -> Result<Vec<Option<AggScalarValue>>, String> {
    let mut out = Vec::with_capacity(values.len());
    for idx in 0..values.len() {
        out.push(scalar_from_array(values, idx)?);
    }
    Ok(out)
}

/// Copies `array[row]` out of the (possibly reused) Arrow buffers.
pub fn scalar_from_array(array: &ArrayRef, row: usize) -> Result<Option<AggScalarValue>, String> {
    if row >= array.len() {
        return Err(format!(
            "row {} out of bounds for array of length {}",
            row,
            array.len()
        ));
    }
    if array.is_null(row) {
        return Ok(None);
    }
    let value = match array.data_type() {
        DataType::Boolean => {
            AggScalarValue::Bool(downcast::<BooleanArray>(array, "BooleanArray")?.value(row))
        }
        DataType::Int8 => {
            AggScalarValue::Int64(downcast::<Int8Array>(array, "Int8Array")?.value(row) as i64)
        }
        DataType::Int16 => {
            AggScalarValue::Int64(downcast::<Int16Array>(array, "Int16Array")?.value(row) as i64)
        }
        DataType::Int32 => {
            AggScalarValue::Int64(downcast::<Int32Array>(array, "Int32Array")?.value(row) as i64)
        }
        DataType::Int64 => {
            AggScalarValue::Int64(downcast::<Int64Array>(array, "Int64Array")?.value(row))
        }
        DataType::UInt8 => {
            AggScalarValue::Int64(downcast::<UInt8Array>(array, "UInt8Array")?.value(row) as i64)
        }
        DataType::UInt16 => AggScalarValue::Int64(
            downcast::<UInt16Array>(array, "UInt16Array")?.value(row) as i64,
        ),
        DataType::UInt32 => AggScalarValue::Int64(
            downcast::<UInt32Array>(array, "UInt32Array")?.value(row) as i64,
        ),
        DataType::Float32 => AggScalarValue::Float64(
            downcast::<Float32Array>(array, "Float32Array")?.value(row) as f64,
        ),
        DataType::Float64 => {
            AggScalarValue::Float64(downcast::<Float64Array>(array, "Float64Array")?.value(row))
        }
        DataType::Utf8 => AggScalarValue::Utf8(
            downcast::<StringArray>(array, "StringArray")?
                .value(row)
                .to_string(),
        ),
        DataType::LargeUtf8 => AggScalarValue::Utf8(
            downcast::<LargeStringArray>(array, "LargeStringArray")?
                .value(row)
                .to_string(),
        ),
        DataType::Binary => AggScalarValue::Binary(
            downcast::<BinaryArray>(array, "BinaryArray")?
                .value(row)
                .to_vec(),
        ),
        DataType::LargeBinary => AggScalarValue::Binary(
            downcast::<LargeBinaryArray>(array, "LargeBinaryArray")?
                .value(row)
                .to_vec(),
        ),
        DataType::FixedSizeBinary(_) => AggScalarValue::Binary(
            downcast::<FixedSizeBinaryArray>(array, "FixedSizeBinaryArray")?
                .value(row)
                .to_vec(),
        ),
        DataType::Date32 => {
            AggScalarValue::Date32(downcast::<Date32Array>(array, "Date32Array")?.value(row))
        }
        DataType::Timestamp(unit, _) => {
            let v = match unit {
                TimeUnit::Second => {
                    downcast::<TimestampSecondArray>(array, "TimestampSecondArray")?.value(row)
                }
                TimeUnit::Millisecond => downcast::<TimestampMillisecondArray>(
                    array,
                    "TimestampMillisecondArray",
                )?
                .value(row),
                TimeUnit::Microsecond => downcast::<TimestampMicrosecondArray>(
                    array,
                    "TimestampMicrosecondArray",
                )?
                .value(row),
                TimeUnit::Nanosecond => downcast::<TimestampNanosecondArray>(
                    array,
                    "TimestampNanosecondArray",
                )?
                .value(row),
            };
            AggScalarValue::Timestamp(v)
        }
        DataType::Decimal128(_, _) => AggScalarValue::Decimal128(
            downcast::<Decimal128Array>(array, "Decimal128Array")?.value(row),
        ),
        DataType::Decimal256(_, _) => AggScalarValue::Decimal256(
            downcast::<Decimal256Array>(array, "Decimal256Array")?.value(row),
        ),
        DataType::List(_) => {
            let arr = downcast::<ListArray>(array, "ListArray")?;
            AggScalarValue::List(list_items(&arr.value(row))?)
        }
        DataType::LargeList(_) => {
            let arr = downcast::<LargeListArray>(array, "LargeListArray")?;
            AggScalarValue::List(list_items(&arr.value(row))?)
        }
        DataType::FixedSizeList(_, _) => {
            let arr = downcast::<FixedSizeListArray>(array, "FixedSizeListArray")?;
            AggScalarValue::List(list_items(&arr.value(row))?)
        }
        DataType::Struct(_) => {
            let arr = downcast::<StructArray>(array, "StructArray")?;
            let mut out = Vec::with_capacity(arr.num_columns());
            for col in arr.columns() {
                out.push(scalar_from_array(col, row)?);
            }
            AggScalarValue::Struct(out)
        }
        DataType::Map(_, _) => {
            let arr = downcast::<MapArray>(array, "MapArray")?;
            let offsets = arr.value_offsets();
            let start = offsets[row] as usize;
            let end = offsets[row + 1] as usize;
            let keys = arr.keys();
            let values = arr.values();
            let mut out = Vec::with_capacity(end.saturating_sub(start));
            for idx in start..end {
                out.push((
                    scalar_from_array(keys, idx)?,
                    scalar_from_array(values, idx)?,
                ));
            }
            AggScalarValue::Map(out)
        }
        DataType::Dictionary(_, value_type) => {
            let decoded = arrow::compute::cast(&array.slice(row, 1), value_type)
                .map_err(|e| format!("dictionary decode failed: {e}"))?;
            return scalar_from_array(&decoded, 0);
        }
        other => return Err(format!("unsupported scalar type: {:?}", other)),
    };
    Ok(Some(value))
}

/// Total order over two scalars of the same normalized type.
///
/// NULL sorts below every value inside nested types; floats use IEEE total order so NaN
/// never makes the comparison fail. Maps carry no order.
pub fn compare_scalar_values(
    left: &AggScalarValue,
    right: &AggScalarValue,
) -> Result<Ordering, String> {
    match (left, right) {
        (AggScalarValue::Bool(l), AggScalarValue::Bool(r)) => Ok(l.cmp(r)),
        (AggScalarValue::Int64(l), AggScalarValue::Int64(r)) => Ok(l.cmp(r)),
        (AggScalarValue::Float64(l), AggScalarValue::Float64(r)) => Ok(l.total_cmp(r)),
        (AggScalarValue::Utf8(l), AggScalarValue::Utf8(r)) => Ok(l.cmp(r)),
        (AggScalarValue::Binary(l), AggScalarValue::Binary(r)) => Ok(l.cmp(r)),
        (AggScalarValue::Date32(l), AggScalarValue::Date32(r)) => Ok(l.cmp(r)),
        (AggScalarValue::Timestamp(l), AggScalarValue::Timestamp(r)) => Ok(l.cmp(r)),
        (AggScalarValue::Decimal128(l), AggScalarValue::Decimal128(r)) => Ok(l.cmp(r)),
        (AggScalarValue::Decimal256(l), AggScalarValue::Decimal256(r)) => Ok(l.cmp(r)),
        (AggScalarValue::Struct(l), AggScalarValue::Struct(r))
        | (AggScalarValue::List(l), AggScalarValue::List(r)) => {
            for (lv, rv) in l.iter().zip(r.iter()) {
                let ord = compare_optional_scalar_values(lv, rv)?;
                if !ord.is_eq() {
                    return Ok(ord);
                }
            }
            Ok(l.len().cmp(&r.len()))
        }
        (AggScalarValue::Map(_), AggScalarValue::Map(_)) => {
            Err("map values are not comparable".to_string())
        }
        (l, r) => Err(format!(
            "scalar comparison type mismatch: {} vs {}",
            scalar_kind(l),
            scalar_kind(r)
        )),
    }
}

pub fn compare_optional_scalar_values(
    left: &Option<AggScalarValue>,
    right: &Option<AggScalarValue>,
) -> Result<Ordering, String> {
    match (left, right) {
        (None, None) => Ok(Ordering::Equal),
        (None, Some(_)) => Ok(Ordering::Less),
        (Some(_), None) => Ok(Ordering::Greater),
        (Some(l), Some(r)) => compare_scalar_values(l, r),
    }
}

pub(crate) fn scalar_kind(value: &AggScalarValue) -> &'static str {
    match value {
        AggScalarValue::Bool(_) => "bool",
        AggScalarValue::Int64(_) => "int64",
        AggScalarValue::Float64(_) => "float64",
        AggScalarValue::Utf8(_) => "utf8",
        AggScalarValue::Binary(_) => "binary",
        AggScalarValue::Date32(_) => "date32",
        AggScalarValue::Timestamp(_) => "timestamp",
        AggScalarValue::Decimal128(_) => "decimal128",
        AggScalarValue::Decimal256(_) => "decimal256",
        AggScalarValue::Struct(_) => "struct",
        AggScalarValue::Map(_) => "map",
        AggScalarValue::List(_) => "list",
    }
}

/// Checks that `value` can be written into a column of the normalized `data_type`.
///
/// Integer columns of every width hold `Int64` scalars and both float widths hold
/// `Float64`, matching what [`scalar_from_array`] produces.
pub fn check_scalar_type(value: &AggScalarValue, data_type: &DataType) -> Result<(), String> {
    let matches = match (value, data_type) {
        (AggScalarValue::Bool(_), DataType::Boolean) => true,
        (
            AggScalarValue::Int64(_),
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32,
        ) => true,
        (AggScalarValue::Float64(_), DataType::Float32 | DataType::Float64) => true,
        (AggScalarValue::Utf8(_), DataType::Utf8) => true,
        (AggScalarValue::Binary(_), DataType::Binary) => true,
        (AggScalarValue::Date32(_), DataType::Date32) => true,
        (AggScalarValue::Timestamp(_), DataType::Timestamp(_, _)) => true,
        (AggScalarValue::Decimal128(_), DataType::Decimal128(_, _)) => true,
        (AggScalarValue::Decimal256(_), DataType::Decimal256(_, _)) => true,
        (AggScalarValue::Struct(items), DataType::Struct(fields)) => {
            if items.len() != fields.len() {
                return Err(format!(
                    "struct has {} fields, expected {}",
                    items.len(),
                    fields.len()
                ));
            }
            for (item, field) in items.iter().zip(fields.iter()) {
                check_optional_scalar_type(item, field.data_type())?;
            }
            true
        }
        (AggScalarValue::List(items), DataType::List(item_field)) => {
            for item in items {
                check_optional_scalar_type(item, item_field.data_type())?;
            }
            true
        }
        (AggScalarValue::Map(entries), DataType::Map(entries_field, _)) => {
            let DataType::Struct(kv) = entries_field.data_type() else {
                return Err(format!("malformed map type {:?}", data_type));
            };
            if kv.len() != 2 {
                return Err(format!("malformed map type {:?}", data_type));
            }
            for (key, value) in entries {
                let Some(key) = key else {
                    return Err("map key must not be null".to_string());
                };
                check_scalar_type(key, kv[0].data_type())?;
                check_optional_scalar_type(value, kv[1].data_type())?;
            }
            true
        }
        _ => false,
    };
    if matches {
        Ok(())
    } else {
        Err(format!(
            "expected {:?}, got {}",
            data_type,
            scalar_kind(value)
        ))
    }
}

pub fn check_optional_scalar_type(
    value: &Option<AggScalarValue>,
    data_type: &DataType,
) -> Result<(), String> {
    match value {
        None => Ok(()),
        Some(v) => check_scalar_type(v, data_type),
    }
}

macro_rules! build_int_array {
    ($builder:ty, $native:ty, $name:literal, $values:expr) => {{
        let mut builder = <$builder>::new();
        for value in $values {
            match value {
                Some(AggScalarValue::Int64(v)) => {
                    let v = <$native>::try_from(v)
                        .map_err(|_| format!("{} overflow: {}", $name, v))?;
                    builder.append_value(v);
                }
                None => builder.append_null(),
                _ => return Err(format!("scalar output type mismatch for {}", $name)),
            }
        }
        Ok(Arc::new(builder.finish()) as ArrayRef)
    }};
}

/// Builds an array of `output_type` (a normalized descriptor) from owned scalars.
pub fn build_scalar_array(
    output_type: &DataType,
    values: Vec<Option<AggScalarValue>>,
) -> Result<ArrayRef, String> {
    match output_type {
        DataType::Boolean => {
            let mut builder = BooleanBuilder::new();
            for value in values {
                match value {
                    Some(AggScalarValue::Bool(v)) => builder.append_value(v),
                    None => builder.append_null(),
                    _ => return Err("scalar output type mismatch for Boolean".to_string()),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Int8 => build_int_array!(Int8Builder, i8, "Int8", values),
        DataType::Int16 => build_int_array!(Int16Builder, i16, "Int16", values),
        DataType::Int32 => build_int_array!(Int32Builder, i32, "Int32", values),
        DataType::Int64 => build_int_array!(Int64Builder, i64, "Int64", values),
        DataType::UInt8 => build_int_array!(UInt8Builder, u8, "UInt8", values),
        DataType::UInt16 => build_int_array!(UInt16Builder, u16, "UInt16", values),
        DataType::UInt32 => build_int_array!(UInt32Builder, u32, "UInt32", values),
        DataType::Float32 => {
            let mut builder = Float32Builder::new();
            for value in values {
                match value {
                    Some(AggScalarValue::Float64(v)) => builder.append_value(v as f32),
                    None => builder.append_null(),
                    _ => return Err("scalar output type mismatch for Float32".to_string()),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::new();
            for value in values {
                match value {
                    Some(AggScalarValue::Float64(v)) => builder.append_value(v),
                    None => builder.append_null(),
                    _ => return Err("scalar output type mismatch for Float64".to_string()),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::new();
            for value in values {
                match value {
                    Some(AggScalarValue::Utf8(v)) => builder.append_value(v),
                    None => builder.append_null(),
                    _ => return Err("scalar output type mismatch for Utf8".to_string()),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Binary => {
            let mut builder = BinaryBuilder::new();
            for value in values {
                match value {
                    Some(AggScalarValue::Binary(v)) => builder.append_value(v),
                    None => builder.append_null(),
                    _ => return Err("scalar output type mismatch for Binary".to_string()),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Date32 => {
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Some(AggScalarValue::Date32(v)) => out.push(Some(v)),
                    None => out.push(None),
                    _ => return Err("scalar output type mismatch for Date32".to_string()),
                }
            }
            Ok(Arc::new(Date32Array::from(out)))
        }
        DataType::Timestamp(unit, tz) => {
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Some(AggScalarValue::Timestamp(v)) => out.push(Some(v)),
                    None => out.push(None),
                    _ => return Err("scalar output type mismatch for Timestamp".to_string()),
                }
            }
            let tz = tz.clone();
            let array: ArrayRef = match unit {
                TimeUnit::Second => Arc::new(TimestampSecondArray::from(out).with_timezone_opt(tz)),
                TimeUnit::Millisecond => {
                    Arc::new(TimestampMillisecondArray::from(out).with_timezone_opt(tz))
                }
                TimeUnit::Microsecond => {
                    Arc::new(TimestampMicrosecondArray::from(out).with_timezone_opt(tz))
                }
                TimeUnit::Nanosecond => {
                    Arc::new(TimestampNanosecondArray::from(out).with_timezone_opt(tz))
                }
            };
            Ok(array)
        }
        DataType::Decimal128(precision, scale) => {
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Some(AggScalarValue::Decimal128(v)) => out.push(Some(v)),
                    None => out.push(None),
                    _ => return Err("scalar output type mismatch for Decimal128".to_string()),
                }
            }
            let array = Decimal128Array::from(out)
                .with_precision_and_scale(*precision, *scale)
                .map_err(|e| e.to_string())?;
            Ok(Arc::new(array))
        }
        DataType::Decimal256(precision, scale) => {
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Some(AggScalarValue::Decimal256(v)) => out.push(Some(v)),
                    None => out.push(None),
                    _ => return Err("scalar output type mismatch for Decimal256".to_string()),
                }
            }
            let array = Decimal256Array::from(out)
                .with_precision_and_scale(*precision, *scale)
                .map_err(|e| e.to_string())?;
            Ok(Arc::new(array))
        }
        DataType::List(item) => {
            let mut flat_values = Vec::new();
            let mut offsets = Vec::with_capacity(values.len() + 1);
            offsets.push(0_i32);
            let mut nulls = NullBufferBuilder::new(values.len());
            let mut current: i64 = 0;
            for value in values {
                match value {
                    Some(AggScalarValue::List(items)) => {
                        current += i64::try_from(items.len())
                            .map_err(|_| "list item length overflow".to_string())?;
                        if current > i32::MAX as i64 {
                            return Err("list offset overflow".to_string());
                        }
                        flat_values.extend(items);
                        offsets.push(current as i32);
                        nulls.append_non_null();
                    }
                    None => {
                        offsets.push(current as i32);
                        nulls.append_null();
                    }
                    _ => return Err("scalar output type mismatch for List".to_string()),
                }
            }
            let child = build_scalar_array(item.data_type(), flat_values)?;
            let out = ListArray::try_new(
                item.clone(),
                OffsetBuffer::new(offsets.into()),
                child,
                nulls.finish(),
            )
            .map_err(|e| format!("list output build failed: {}", e))?;
            Ok(Arc::new(out))
        }
        DataType::Struct(fields) => {
            let mut field_values: Vec<Vec<Option<AggScalarValue>>> =
                vec![Vec::with_capacity(values.len()); fields.len()];
            let mut nulls = NullBufferBuilder::new(values.len());
            for value in values {
                match value {
                    Some(AggScalarValue::Struct(items)) => {
                        if items.len() != fields.len() {
                            return Err(format!(
                                "scalar output struct field count mismatch: expected {} got {}",
                                fields.len(),
                                items.len()
                            ));
                        }
                        nulls.append_non_null();
                        for (idx, item) in items.into_iter().enumerate() {
                            field_values[idx].push(item);
                        }
                    }
                    None => {
                        nulls.append_null();
                        for values in field_values.iter_mut() {
                            values.push(None);
                        }
                    }
                    _ => return Err("scalar output type mismatch for Struct".to_string()),
                }
            }
            let mut columns = Vec::with_capacity(fields.len());
            for (field, values) in fields.iter().zip(field_values.into_iter()) {
                columns.push(build_scalar_array(field.data_type(), values)?);
            }
            let out = StructArray::try_new(fields.clone(), columns, nulls.finish())
                .map_err(|e| format!("struct output build failed: {}", e))?;
            Ok(Arc::new(out))
        }
        DataType::Map(field, ordered) => {
            let DataType::Struct(entry_fields) = field.data_type() else {
                return Err("scalar output MAP entries type must be STRUCT".to_string());
            };
            if entry_fields.len() != 2 {
                return Err("scalar output MAP entries must have 2 fields".to_string());
            }
            let mut key_values = Vec::<Option<AggScalarValue>>::new();
            let mut value_values = Vec::<Option<AggScalarValue>>::new();
            let mut offsets = Vec::with_capacity(values.len() + 1);
            offsets.push(0_i32);
            let mut current: i64 = 0;
            let mut nulls = NullBufferBuilder::new(values.len());

            for value in values {
                match value {
                    Some(AggScalarValue::Map(items)) => {
                        nulls.append_non_null();
                        for (k, v) in items {
                            key_values.push(k);
                            value_values.push(v);
                            current += 1;
                            if current > i32::MAX as i64 {
                                return Err("map offset overflow".to_string());
                            }
                        }
                        offsets.push(current as i32);
                    }
                    None => {
                        nulls.append_null();
                        offsets.push(current as i32);
                    }
                    _ => return Err("scalar output type mismatch for Map".to_string()),
                }
            }

            let keys = build_scalar_array(entry_fields[0].data_type(), key_values)?;
            let values = build_scalar_array(entry_fields[1].data_type(), value_values)?;
            let entries = StructArray::try_new(entry_fields.clone(), vec![keys, values], None)
                .map_err(|e| format!("map entries build failed: {}", e))?;
            let out = MapArray::try_new(
                field.clone(),
                OffsetBuffer::new(offsets.into()),
                entries,
                nulls.finish(),
                *ordered,
            )
            .map_err(|e| format!("map output build failed: {}", e))?;
            Ok(Arc::new(out))
        }
        other => Err(format!("unsupported scalar output type: {:?}", other)),
    }
}
