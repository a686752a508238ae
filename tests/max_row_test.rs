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
mod common;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BinaryArray, Float64Array, Int64Array, StringArray, StructArray};
use arrow::datatypes::{DataType, Field, Fields};

use common::{TestConfig, aggregator, columns, merge_aggregator, row};
use maxrow::exec::agg::{InputLayout, MaxRowOutput, build_merge_view};
use maxrow::maxrow_config::IntermediateEncoding;
use maxrow::{
    AggMode, AggOptions, AggScalarValue, MaxRowError, MaxRowFunction, MaxRowState, PartialValue,
};

fn struct_row(out: &ArrayRef, idx: usize) -> Option<(i64, String)> {
    let out = out
        .as_any()
        .downcast_ref::<StructArray>()
        .expect("struct output");
    if out.is_null(idx) {
        return None;
    }
    let keys = out
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("int64 key");
    let payloads = out
        .column(1)
        .as_any()
        .downcast_ref::<StringArray>()
        .expect("utf8 payload");
    Some((keys.value(idx), payloads.value(idx).to_string()))
}

/// Two leaves aggregate one partition each, a root merges their intermediate column.
fn run_two_phase(
    options: AggOptions,
    part1: &[(i64, &str)],
    part2: &[(i64, &str)],
) -> Option<(i64, String)> {
    let leaf = aggregator(AggMode::RawPartial, options);
    let mut leaf_states = vec![leaf.new_state(), leaf.new_state()];
    let cols1 = columns(part1);
    let cols2 = columns(part2);
    leaf.update_batch(&mut leaf_states, &vec![0; part1.len()], &cols1)
        .unwrap();
    leaf.update_batch(&mut leaf_states, &vec![1; part2.len()], &cols2)
        .unwrap();

    // Build intermediate outputs (one row per partition state).
    let intermediate = leaf.build_output(&leaf_states).unwrap();
    assert_eq!(intermediate.data_type(), &leaf.intermediate_type());

    let root = merge_aggregator(AggMode::MergeFinal, options);
    assert_eq!(root.schema().layout(), InputLayout::Composite);
    let mut root_states = vec![root.new_state()];
    root.merge_batch(&mut root_states, &vec![0; intermediate.len()], &intermediate)
        .unwrap();

    let out = root.build_output(&root_states).unwrap();
    assert_eq!(out.data_type(), root.output_type());
    struct_row(&out, 0)
}

#[test]
fn test_scenario_max_of_three() {
    let agg = aggregator(AggMode::RawComplete, AggOptions::default());
    let mut state = agg.new_state();
    for tuple in [row(3, "a"), row(7, "b"), row(5, "c")] {
        agg.accumulate(&mut state, Some(&tuple)).unwrap();
    }
    assert_eq!(agg.emit_final(&state), Some(row(7, "b")));
}

#[test]
fn test_scenario_first_maximum_wins() {
    let agg = aggregator(AggMode::RawComplete, AggOptions::default());
    let mut state = agg.new_state();
    agg.accumulate(&mut state, Some(&row(7, "x"))).unwrap();
    agg.accumulate(&mut state, Some(&row(7, "y"))).unwrap();
    assert_eq!(agg.emit_final(&state), Some(row(7, "x")));
}

#[test]
fn test_scenario_merge_keeps_larger() {
    let leaf = aggregator(AggMode::RawPartial, AggOptions::default());
    let mut a = leaf.new_state();
    let mut b = leaf.new_state();
    leaf.accumulate(&mut a, Some(&row(9, "p"))).unwrap();
    leaf.accumulate(&mut b, Some(&row(4, "q"))).unwrap();

    let root = merge_aggregator(AggMode::MergeFinal, AggOptions::default());
    let mut merged = root.new_state();
    for partial in [leaf.emit_partial(&a).unwrap(), leaf.emit_partial(&b).unwrap()] {
        root.accumulate_partial(&mut merged, partial.as_ref()).unwrap();
    }
    assert_eq!(root.emit_final(&merged), Some(row(9, "p")));
    assert_eq!(
        root.emit(&merged).unwrap(),
        Some(MaxRowOutput::Final(row(9, "p")))
    );
}

#[test]
fn test_merge_states_directly() {
    let agg = aggregator(AggMode::RawComplete, AggOptions::default());
    let mut a = agg.new_state();
    let mut b = agg.new_state();
    agg.accumulate(&mut a, Some(&row(4, "q"))).unwrap();
    agg.accumulate(&mut b, Some(&row(9, "p"))).unwrap();
    agg.merge_states(&mut a, &b).unwrap();
    assert_eq!(agg.emit_final(&a), Some(row(9, "p")));

    let empty = agg.new_state();
    agg.merge_states(&mut a, &empty).unwrap();
    assert_eq!(agg.emit_final(&a), Some(row(9, "p")));
}

#[test]
fn test_empty_and_reset_emit_nothing() {
    let agg = aggregator(AggMode::RawComplete, AggOptions::default());
    let mut state = agg.new_state();
    assert_eq!(agg.emit_final(&state), None);
    assert_eq!(agg.emit(&state).unwrap(), None);

    agg.accumulate(&mut state, Some(&row(1, "a"))).unwrap();
    agg.reset(&mut state);
    assert_eq!(state, MaxRowState::Empty);
    assert_eq!(agg.emit_final(&state), None);
}

#[test]
fn test_partial_round_trip_feeds_back_identically() {
    for encoding in [IntermediateEncoding::Struct, IntermediateEncoding::Binary] {
        let options = AggOptions {
            intermediate_encoding: encoding,
            validate_input_types: true,
        };
        let agg = aggregator(AggMode::RawPartial, options);
        let mut state = agg.new_state();
        agg.accumulate(&mut state, Some(&row(5, "live"))).unwrap();

        let partial = agg.emit_partial(&state).unwrap().expect("partial");
        assert_eq!(partial.unpack().unwrap(), row(5, "live"));

        let mut fresh = agg.new_state();
        agg.accumulate_partial(&mut fresh, Some(&partial)).unwrap();
        assert_eq!(fresh, state);

        // An equal key coming back must not displace the held tuple.
        agg.accumulate(&mut fresh, Some(&row(5, "other"))).unwrap();
        assert_eq!(agg.emit_final(&fresh), Some(row(5, "live")));
    }
}

#[test]
fn test_two_phase_struct_intermediate() {
    let out = run_two_phase(
        AggOptions::default(),
        &[(3, "a"), (7, "b")],
        &[(5, "c"), (7, "d")],
    );
    assert_eq!(out, Some((7, "b".to_string())));
}

#[test]
fn test_two_phase_binary_intermediate() {
    let options = AggOptions {
        intermediate_encoding: IntermediateEncoding::Binary,
        validate_input_types: true,
    };
    let out = run_two_phase(options, &[(1, "x")], &[(10, "y"), (2, "z")]);
    assert_eq!(out, Some((10, "y".to_string())));
}

#[test]
fn test_two_phase_with_empty_partition() {
    let out = run_two_phase(AggOptions::default(), &[], &[(2, "only")]);
    assert_eq!(out, Some((2, "only".to_string())));

    let out = run_two_phase(AggOptions::default(), &[], &[]);
    assert_eq!(out, None);
}

#[test]
fn test_multi_level_merge_tree() {
    let options = AggOptions::default();
    let leaf = aggregator(AggMode::RawPartial, options);
    let mid = merge_aggregator(AggMode::MergePartial, options);
    let root = merge_aggregator(AggMode::MergeFinal, options);

    let partitions: [&[(i64, &str)]; 4] = [
        &[(1, "a"), (8, "b")],
        &[(7, "c")],
        &[(3, "d"), (-2, "e")],
        &[(8, "f")],
    ];
    let mut leaf_states: Vec<MaxRowState> = partitions.iter().map(|_| leaf.new_state()).collect();
    for (idx, part) in partitions.iter().enumerate() {
        leaf.update_batch(&mut leaf_states, &vec![idx; part.len()], &columns(part))
            .unwrap();
    }
    let leaf_out = leaf.build_output(&leaf_states).unwrap();
    assert_eq!(leaf_out.len(), 4);

    // Interior nodes: partitions {0, 1} and {2, 3}.
    let mut mid_states = vec![mid.new_state(), mid.new_state()];
    mid.merge_batch(&mut mid_states, &[0, 0, 1, 1], &leaf_out)
        .unwrap();
    let mid_out = mid.build_output(&mid_states).unwrap();

    // The root sees the second subtree first, so its (8, "f") arrives before (8, "b").
    let mut reordered = vec![root.new_state()];
    let second_first = arrow::compute::concat(&[
        mid_out.slice(1, 1).as_ref(),
        mid_out.slice(0, 1).as_ref(),
    ])
    .unwrap();
    root.merge_batch(&mut reordered, &[0, 0], &second_first)
        .unwrap();
    let out = root.build_output(&reordered).unwrap();
    assert_eq!(struct_row(&out, 0), Some((8, "f".to_string())));

    let mut in_order = vec![root.new_state()];
    root.merge_batch(&mut in_order, &[0, 0], &mid_out).unwrap();
    let out = root.build_output(&in_order).unwrap();
    assert_eq!(struct_row(&out, 0), Some((8, "b".to_string())));
}

#[test]
fn test_null_partial_rows_are_skipped() {
    let options = AggOptions {
        intermediate_encoding: IntermediateEncoding::Binary,
        validate_input_types: true,
    };
    let root = merge_aggregator(AggMode::MergeFinal, options);
    let encoded = PartialValue::encode(&row(3, "kept")).unwrap();
    let PartialValue::Encoded(bytes) = encoded else {
        panic!("expected encoded partial");
    };
    let partials =
        Arc::new(BinaryArray::from(vec![None, Some(bytes.as_slice()), None])) as ArrayRef;
    let mut states = vec![root.new_state()];
    root.merge_batch(&mut states, &[0, 0, 0], &partials).unwrap();
    assert_eq!(root.emit_final(&states[0]), Some(row(3, "kept")));
}

#[test]
fn test_unknown_partial_encoding_is_rejected() {
    let root = merge_aggregator(AggMode::MergeFinal, AggOptions::default());
    let bogus = Arc::new(Float64Array::from(vec![1.0])) as ArrayRef;
    let err = crate::assert_err!(build_merge_view(root.schema(), &bogus));
    assert!(err.is_representation());

    let mut states = vec![root.new_state()];
    let err = root.merge_batch(&mut states, &[0], &bogus).unwrap_err();
    assert!(matches!(err, MaxRowError::Representation(msg) if msg.contains("Float64")));
}

#[test]
fn test_corrupt_binary_partial_is_rejected() {
    let root = merge_aggregator(AggMode::MergeFinal, AggOptions::default());
    let partials = Arc::new(BinaryArray::from(vec![Some(&[9u8, 9, 9][..])])) as ArrayRef;
    let mut states = vec![root.new_state()];
    let err = root.merge_batch(&mut states, &[0], &partials).unwrap_err();
    assert!(err.is_representation());
    assert!(states[0].is_empty());
}

#[test]
fn test_map_key_fails_before_any_buffer() {
    let entries = Field::new(
        "entries",
        DataType::Struct(Fields::from(vec![
            Field::new("key", DataType::Utf8, false),
            Field::new("value", DataType::Int64, true),
        ])),
        false,
    );
    let map = DataType::Map(Arc::new(entries), false);
    let err = MaxRowFunction::resolve(&[map.clone(), DataType::Utf8]).unwrap_err();
    assert!(matches!(err, MaxRowError::TypeValidation { position: 0, .. }));

    let nested = DataType::Struct(Fields::from(vec![Field::new("m", map, true)]));
    let err = MaxRowFunction::resolve(&[nested, DataType::Utf8]).unwrap_err();
    assert!(err.is_type_validation());
}

#[test]
fn test_payload_columns_are_copied_with_normalized_types() {
    let types = vec![DataType::Int32, DataType::LargeUtf8, DataType::Float32];
    let agg = MaxRowFunction::resolve(&types)
        .unwrap()
        .initialize(AggMode::RawComplete, &types)
        .unwrap();
    let cols: Vec<ArrayRef> = vec![
        Arc::new(arrow::array::Int32Array::from(vec![Some(2), Some(11), None])),
        Arc::new(arrow::array::LargeStringArray::from(vec!["lo", "hi", "null"])),
        Arc::new(arrow::array::Float32Array::from(vec![0.5, 1.5, 2.5])),
    ];
    let mut states = vec![agg.new_state()];
    agg.update_batch(&mut states, &[0, 0, 0], &cols).unwrap();
    drop(cols);

    assert_eq!(
        agg.emit_final(&states[0]),
        Some(vec![
            Some(AggScalarValue::Int64(11)),
            Some(AggScalarValue::Utf8("hi".to_string())),
            Some(AggScalarValue::Float64(1.5)),
        ])
    );
    let out = agg.build_output(&states).unwrap();
    let DataType::Struct(fields) = out.data_type() else {
        panic!("expected struct output");
    };
    assert_eq!(fields[1].data_type(), &DataType::Utf8);
    assert_eq!(fields[2].name(), "col2");
}

#[test]
fn test_options_from_config_file() {
    let cfg = TestConfig::with_encoding("binary").unwrap();
    cfg.init_logging();
    let loaded = cfg.load().unwrap();
    let options = AggOptions::from_config(&loaded.agg);
    assert_eq!(options.intermediate_encoding, IntermediateEncoding::Binary);

    let agg = aggregator(AggMode::RawPartial, options);
    assert_eq!(agg.intermediate_type(), DataType::Binary);
}

fn swapped_tuple() -> Vec<Option<AggScalarValue>> {
    vec![
        Some(AggScalarValue::Utf8("x".to_string())),
        Some(AggScalarValue::Int64(1)),
    ]
}

fn swapped_struct_partial() -> ArrayRef {
    Arc::new(StructArray::from(vec![
        (
            Arc::new(Field::new("col0", DataType::Utf8, true)),
            Arc::new(StringArray::from(vec!["x"])) as ArrayRef,
        ),
        (
            Arc::new(Field::new("col1", DataType::Int64, true)),
            Arc::new(Int64Array::from(vec![1])) as ArrayRef,
        ),
    ]))
}

#[test]
fn test_mistyped_first_tuple_is_rejected() {
    let agg = aggregator(AggMode::RawComplete, AggOptions::default());
    let mut state = agg.new_state();
    let err = agg.accumulate(&mut state, Some(&swapped_tuple())).unwrap_err();
    assert!(err.is_representation());
    assert!(state.is_empty());

    agg.accumulate(&mut state, Some(&row(5, "good"))).unwrap();
    let out = agg.build_output(&[state]).unwrap();
    assert_eq!(struct_row(&out, 0), Some((5, "good".to_string())));
}

#[test]
fn test_mistyped_struct_partial_is_rejected() {
    for validate_input_types in [true, false] {
        let options = AggOptions {
            intermediate_encoding: IntermediateEncoding::Struct,
            validate_input_types,
        };
        let root = merge_aggregator(AggMode::MergeFinal, options);
        let mut states = vec![root.new_state()];
        let err = root
            .merge_batch(&mut states, &[0], &swapped_struct_partial())
            .unwrap_err();
        assert!(err.is_representation(), "{err}");
        assert!(states[0].is_empty());

        let out = root.build_output(&states).unwrap();
        assert_eq!(struct_row(&out, 0), None);
    }
}

#[test]
fn test_mistyped_binary_partial_is_rejected() {
    let root = merge_aggregator(AggMode::MergeFinal, AggOptions::default());
    let partial = PartialValue::encode(&swapped_tuple()).unwrap();

    let mut state = root.new_state();
    let err = root.accumulate_partial(&mut state, Some(&partial)).unwrap_err();
    assert!(err.is_representation());
    assert!(state.is_empty());

    let PartialValue::Encoded(bytes) = partial else {
        panic!("expected encoded partial");
    };
    let partials = Arc::new(BinaryArray::from(vec![Some(bytes.as_slice())])) as ArrayRef;
    let mut states = vec![root.new_state()];
    assert!(root.merge_batch(&mut states, &[0], &partials).is_err());
    assert!(states[0].is_empty());
}

#[test]
fn test_deeply_nested_binary_partial_is_rejected() {
    const LIST_TAG: u8 = 10;
    const NULL_TAG: u8 = 0;
    let levels = 100_000usize;

    let mut payload = Vec::with_capacity(levels * 5 + 2 + 9);
    for _ in 0..levels {
        payload.push(LIST_TAG);
        payload.extend_from_slice(&1u32.to_le_bytes());
    }
    payload.push(NULL_TAG);
    let key_end = payload.len() as u32;
    payload.push(NULL_TAG);
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&key_end.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&payload);

    let root = merge_aggregator(AggMode::MergeFinal, AggOptions::default());
    let mut state = root.new_state();
    let err = root
        .accumulate_partial(&mut state, Some(&PartialValue::Encoded(bytes)))
        .unwrap_err();
    assert!(err.is_representation());
    assert!(state.is_empty());
}
