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
//! Self-describing binary encoding for partial results.
//!
//! Layout of one encoded tuple (all integers little endian):
//!
//! ```text
//! u32 field_count | u32 field_end[field_count] | field payloads...
//! ```
//!
//! `field_end[i]` is the end offset of field `i` relative to the start of the payload
//! area, so any single field can be decoded without touching the others.
use arrow_buffer::i256;

use super::scalar::{AggScalarValue, Tuple};

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT64: u8 = 2;
const TAG_FLOAT64: u8 = 3;
const TAG_UTF8: u8 = 4;
const TAG_DATE32: u8 = 5;
const TAG_TIMESTAMP: u8 = 6;
const TAG_DECIMAL128: u8 = 7;
const TAG_BINARY: u8 = 8;
const TAG_STRUCT: u8 = 9;
const TAG_LIST: u8 = 10;
const TAG_DECIMAL256: u8 = 11;
const TAG_MAP: u8 = 12;

/// Deepest struct/list/map nesting a decoded field may have.
const MAX_NESTING_DEPTH: usize = 64;

fn put_len(len: usize, buf: &mut Vec<u8>) -> Result<(), String> {
    let len = u32::try_from(len).map_err(|_| "encoded length too large".to_string())?;
    buf.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn encode_scalar(value: &Option<AggScalarValue>, buf: &mut Vec<u8>) -> Result<(), String> {
    match value {
        None => buf.push(TAG_NULL),
        Some(AggScalarValue::Bool(v)) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*v));
        }
        Some(AggScalarValue::Int64(v)) => {
            buf.push(TAG_INT64);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Some(AggScalarValue::Float64(v)) => {
            buf.push(TAG_FLOAT64);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Some(AggScalarValue::Utf8(v)) => {
            buf.push(TAG_UTF8);
            put_len(v.len(), buf)?;
            buf.extend_from_slice(v.as_bytes());
        }
        Some(AggScalarValue::Binary(v)) => {
            buf.push(TAG_BINARY);
            put_len(v.len(), buf)?;
            buf.extend_from_slice(v);
        }
        Some(AggScalarValue::Date32(v)) => {
            buf.push(TAG_DATE32);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Some(AggScalarValue::Timestamp(v)) => {
            buf.push(TAG_TIMESTAMP);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Some(AggScalarValue::Decimal128(v)) => {
            buf.push(TAG_DECIMAL128);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Some(AggScalarValue::Decimal256(v)) => {
            buf.push(TAG_DECIMAL256);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Some(AggScalarValue::Struct(items)) => {
            buf.push(TAG_STRUCT);
            put_len(items.len(), buf)?;
            for item in items {
                encode_scalar(item, buf)?;
            }
        }
        Some(AggScalarValue::List(items)) => {
            buf.push(TAG_LIST);
            put_len(items.len(), buf)?;
            for item in items {
                encode_scalar(item, buf)?;
            }
        }
        Some(AggScalarValue::Map(entries)) => {
            buf.push(TAG_MAP);
            put_len(entries.len(), buf)?;
            for (k, v) in entries {
                encode_scalar(k, buf)?;
                encode_scalar(v, buf)?;
            }
        }
    }
    Ok(())
}

fn take<'a>(input: &mut &'a [u8], n: usize, what: &str) -> Result<&'a [u8], String> {
    if input.len() < n {
        return Err(format!(
            "{what} decode failed: need {n} bytes, {} left",
            input.len()
        ));
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

fn take_array<const N: usize>(input: &mut &[u8], what: &str) -> Result<[u8; N], String> {
    let bytes = take(input, N, what)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

fn take_len(input: &mut &[u8], what: &str) -> Result<usize, String> {
    Ok(u32::from_le_bytes(take_array::<4>(input, what)?) as usize)
}

fn decode_scalar(input: &mut &[u8], depth: usize) -> Result<Option<AggScalarValue>, String> {
    let [tag] = take_array::<1>(input, "scalar tag")?;
    if matches!(tag, TAG_STRUCT | TAG_LIST | TAG_MAP) && depth >= MAX_NESTING_DEPTH {
        return Err(format!(
            "nested decode failed: more than {MAX_NESTING_DEPTH} levels"
        ));
    }
    let value = match tag {
        TAG_NULL => return Ok(None),
        TAG_BOOL => {
            let [v] = take_array::<1>(input, "bool")?;
            AggScalarValue::Bool(v != 0)
        }
        TAG_INT64 => AggScalarValue::Int64(i64::from_le_bytes(take_array(input, "int64")?)),
        TAG_FLOAT64 => {
            AggScalarValue::Float64(f64::from_le_bytes(take_array(input, "float64")?))
        }
        TAG_UTF8 => {
            let len = take_len(input, "utf8 length")?;
            let bytes = take(input, len, "utf8")?;
            let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
            AggScalarValue::Utf8(text.to_string())
        }
        TAG_BINARY => {
            let len = take_len(input, "binary length")?;
            AggScalarValue::Binary(take(input, len, "binary")?.to_vec())
        }
        TAG_DATE32 => AggScalarValue::Date32(i32::from_le_bytes(take_array(input, "date32")?)),
        TAG_TIMESTAMP => {
            AggScalarValue::Timestamp(i64::from_le_bytes(take_array(input, "timestamp")?))
        }
        TAG_DECIMAL128 => {
            AggScalarValue::Decimal128(i128::from_le_bytes(take_array(input, "decimal128")?))
        }
        TAG_DECIMAL256 => {
            AggScalarValue::Decimal256(i256::from_le_bytes(take_array(input, "decimal256")?))
        }
        TAG_STRUCT | TAG_LIST => {
            let count = take_len(input, "nested length")?;
            // Every item takes at least one tag byte.
            if count > input.len() {
                return Err("nested decode failed: item count exceeds buffer".to_string());
            }
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_scalar(input, depth + 1)?);
            }
            if tag == TAG_STRUCT {
                AggScalarValue::Struct(items)
            } else {
                AggScalarValue::List(items)
            }
        }
        TAG_MAP => {
            let count = take_len(input, "map length")?;
            if count.saturating_mul(2) > input.len() {
                return Err("map decode failed: entry count exceeds buffer".to_string());
            }
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let k = decode_scalar(input, depth + 1)?;
                let v = decode_scalar(input, depth + 1)?;
                entries.push((k, v));
            }
            AggScalarValue::Map(entries)
        }
        other => return Err(format!("scalar decode failed: unknown tag {other}")),
    };
    Ok(Some(value))
}

/// Encodes a whole tuple into the binary struct layout.
pub fn encode_tuple(tuple: &[Option<AggScalarValue>]) -> Result<Vec<u8>, String> {
    let mut payload = Vec::new();
    let mut ends = Vec::with_capacity(tuple.len());
    for field in tuple {
        encode_scalar(field, &mut payload)?;
        ends.push(u32::try_from(payload.len()).map_err(|_| "tuple too large".to_string())?);
    }
    let mut out = Vec::with_capacity(4 + 4 * ends.len() + payload.len());
    put_len(tuple.len(), &mut out)?;
    for end in ends {
        out.extend_from_slice(&end.to_le_bytes());
    }
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Read-only view over one encoded tuple. Only the header is checked up front; field
/// payloads are decoded on access.
#[derive(Clone, Copy, Debug)]
pub struct BinaryStructView<'a> {
    ends: &'a [u8],
    payload: &'a [u8],
    len: usize,
}

impl<'a> BinaryStructView<'a> {
    pub fn try_new(bytes: &'a [u8]) -> Result<Self, String> {
        let mut input = bytes;
        let len = take_len(&mut input, "field count")?;
        let header_len = len
            .checked_mul(4)
            .ok_or_else(|| "field count overflow".to_string())?;
        let ends = take(&mut input, header_len, "field offsets")?;
        let payload = input;

        let mut prev = 0usize;
        for idx in 0..len {
            let end = read_end(ends, idx);
            if end < prev || end > payload.len() {
                return Err(format!(
                    "field {idx} offset {end} out of range (previous {prev}, payload {})",
                    payload.len()
                ));
            }
            prev = end;
        }
        if prev != payload.len() {
            return Err(format!(
                "trailing bytes after last field: {} of {}",
                payload.len() - prev,
                payload.len()
            ));
        }
        Ok(Self { ends, payload, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn field(&self, idx: usize) -> Result<Option<AggScalarValue>, String> {
        if idx >= self.len {
            return Err(format!("field {idx} out of range for {} fields", self.len));
        }
        let start = if idx == 0 {
            0
        } else {
            read_end(self.ends, idx - 1)
        };
        let end = read_end(self.ends, idx);
        let mut slice = &self.payload[start..end];
        let value = decode_scalar(&mut slice, 0)?;
        if !slice.is_empty() {
            return Err(format!("field {idx} has {} undecoded bytes", slice.len()));
        }
        Ok(value)
    }

    pub fn fields_as_list(&self) -> Result<Tuple, String> {
        (0..self.len).map(|idx| self.field(idx)).collect()
    }
}

fn read_end(ends: &[u8], idx: usize) -> usize {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&ends[idx * 4..idx * 4 + 4]);
    u32::from_le_bytes(raw) as usize
}
