use std::path::Path;

use glb_subsample::container::{POINT_CLOUD_NODE, assemble_point_cloud};
use glb_subsample::reader::{AccessorReader, Array2, TypedArray};
use glb_subsample::{
    COLOR_0, Container, Error, POSITION, RateSelector, Selector, SubsampleConfig, subsample_file,
    writer,
};

fn grid(n: usize) -> Array2<f32> {
    let rows: Vec<[f32; 3]> = (0..n).map(|i| [i as f32, (i % 10) as f32, -(i as f32)]).collect();
    Array2::from_rows(&rows)
}

fn write_positions_only_glb(path: &Path, n: usize) {
    let positions = TypedArray::F32(grid(n));
    let packed = writer::write(&[(POSITION, &positions)]).unwrap();
    assemble_point_cloud(packed).unwrap().save(path).unwrap();
}

#[test]
fn hundred_points_at_fifth_rate() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("cloud.glb");
    let dst = dir.path().join("out/cloud_small.glb");
    write_positions_only_glb(&src, 100);

    let seed = 2024;
    let expected = RateSelector::new(0.2, Some(seed))
        .select(100)
        .into_iter()
        .filter(|k| *k)
        .count()
        .max(1);

    let mut selector = RateSelector::new(0.2, Some(seed));
    let retained = subsample_file(&src, &dst, &mut selector).unwrap();
    assert_eq!(retained, expected);

    let out = Container::open(&dst).unwrap();
    assert_eq!(out.root.nodes[0].name.as_deref(), Some(POINT_CLOUD_NODE));
    assert!(out.root.buffers.iter().all(|b| b.uri.is_none()));

    let mut reader = AccessorReader::new(&out, None);
    let positions = reader.read(0).unwrap();
    let colors = reader.read(1).unwrap().to_f32();
    assert_eq!(positions.rows(), expected);
    assert_eq!(colors.rows(), expected);
    assert!(colors.iter_rows().all(|c| c == [1.0, 1.0, 1.0]));

    // every kept point comes from the source grid, in source order
    let source = grid(100);
    let kept = positions.to_f32();
    let mut cursor = 0;
    for row in kept.iter_rows() {
        let found = (cursor..100).find(|&i| source.row(i) == row).unwrap();
        cursor = found + 1;
    }
}

#[test]
fn configured_run_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("cloud.glb");
    write_positions_only_glb(&src, 500);

    let config = SubsampleConfig::from_json_str(r#"{ "rate": 0.1, "seed": 9 }"#).unwrap();
    let a = dir.path().join("a.glb");
    let b = dir.path().join("b.glb");
    subsample_file(&src, &a, &mut config.selector().unwrap()).unwrap();
    subsample_file(&src, &b, &mut config.selector().unwrap()).unwrap();
    assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
}

#[test]
fn external_buffer_next_to_gltf() {
    let dir = tempfile::tempdir().unwrap();
    let positions: Vec<f32> = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
    let colors: Vec<u16> = vec![65535, 0, 0, 0, 65535, 0];
    let mut bin: Vec<u8> = bytemuck::cast_slice(&positions).to_vec();
    bin.extend_from_slice(bytemuck::cast_slice(&colors));
    std::fs::write(dir.path().join("cloud.bin"), &bin).unwrap();

    let gltf = serde_json::json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0, "COLOR_0": 1 }, "mode": 0 }] }],
        "buffers": [{ "byteLength": bin.len(), "uri": "cloud.bin" }],
        "bufferViews": [
            { "buffer": 0, "byteLength": 24 },
            { "buffer": 0, "byteOffset": 24, "byteLength": 12 },
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3" },
            { "bufferView": 1, "componentType": 5123, "normalized": true, "count": 2, "type": "VEC3" },
        ],
    });
    let src = dir.path().join("cloud.gltf");
    std::fs::write(&src, serde_json::to_vec(&gltf).unwrap()).unwrap();

    // without a directory the external file cannot be found
    let source = Container::open(&src).unwrap();
    let mut all = |n: usize| vec![true; n];
    let err = glb_subsample::subsample(&source, None, &mut all).unwrap_err();
    assert!(matches!(err, Error::MissingSourceDirectory { buffer: 0, .. }));

    let dst = dir.path().join("cloud.glb");
    assert_eq!(subsample_file(&src, &dst, &mut all).unwrap(), 2);
    let out = Container::open(&dst).unwrap();
    let colors = AccessorReader::new(&out, None).read(1).unwrap();
    assert_eq!(
        colors,
        TypedArray::F32(Array2::from_rows(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]))
    );
}

#[test]
fn failed_run_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("no_position.gltf");
    let gltf = serde_json::json!({
        "asset": { "version": "2.0" },
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": [{ "attributes": { "NORMAL": 0 } }] }],
        "accessors": [{ "componentType": 5126, "count": 1, "type": "VEC3" }],
    });
    std::fs::write(&src, serde_json::to_vec(&gltf).unwrap()).unwrap();

    let dst = dir.path().join("out.glb");
    let mut all = |n: usize| vec![true; n];
    let err = subsample_file(&src, &dst, &mut all).unwrap_err();
    assert!(matches!(err, Error::NoPositionAttribute));
    assert!(!dst.exists());
}

#[test]
fn colors_survive_with_their_points() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("colored.glb");
    let positions = TypedArray::F32(grid(4));
    let colors = TypedArray::F32(Array2::from_rows(&[
        [0.0, 0.0, 0.0, 0.5],
        [0.1, 0.1, 0.1, 0.5],
        [0.2, 0.2, 0.2, 0.5],
        [0.3, 0.3, 0.3, 0.5],
    ]));
    let packed = writer::write(&[(POSITION, &positions), (COLOR_0, &colors)]).unwrap();
    assemble_point_cloud(packed).unwrap().save(&src).unwrap();

    let dst = dir.path().join("odd.glb");
    let mut odd = |n: usize| (0..n).map(|i| i % 2 == 1).collect::<Vec<_>>();
    assert_eq!(subsample_file(&src, &dst, &mut odd).unwrap(), 2);

    let out = Container::open(&dst).unwrap();
    let mut reader = AccessorReader::new(&out, None);
    assert_eq!(
        reader.read(0).unwrap(),
        TypedArray::F32(Array2::from_rows(&[[1.0, 1.0, -1.0], [3.0, 3.0, -3.0]]))
    );
    assert_eq!(
        reader.read(1).unwrap(),
        TypedArray::F32(Array2::from_rows(&[[0.1, 0.1, 0.1, 0.5], [0.3, 0.3, 0.3, 0.5]]))
    );
    assert_eq!(
        out.root.accessors[0].max,
        Some(serde_json::json!([3.0, 3.0, -1.0]))
    );
}
