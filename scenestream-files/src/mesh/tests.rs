use crate::common::reader::parse_object;
use crate::common::types::{Vector3f, AABB};
use crate::common::version::UnityVersion;
use crate::fixtures::{context, encode_mesh, pack_bits, DEFAULT_VERSION};
use crate::mesh::types::{
    unpack_bits, ChannelInfo, IndexFormat, PackedFloatVector, PackedIntVector, SubMesh, UnityMesh, VertexData,
    VertexFormat,
};

#[test]
fn unpacks_odd_bit_widths() {
    let values = [0u32, 5, 127, 64, 1, 99, 33];
    let data = pack_bits(&values, 7);
    assert_eq!(data.len(), 7);
    assert_eq!(unpack_bits(&data, 7, values.len()), values);

    let wide = [0x1FFFFu32, 3, 0x10001];
    assert_eq!(unpack_bits(&pack_bits(&wide, 17), 17, 3), wide);
}

#[test]
fn zero_bit_vectors_repeat_the_start() {
    let vector = PackedFloatVector {
        num_items: 3,
        range: 10.0,
        start: -1.5,
        data: Vec::new(),
        bit_size: 0,
    };
    assert_eq!(vector.unpack(), vec![-1.5, -1.5, -1.5]);
}

#[test]
fn packed_floats_are_rescaled() {
    let vector = PackedFloatVector {
        num_items: 3,
        range: 2.0,
        start: -1.0,
        data: pack_bits(&[0, 128, 255], 8),
        bit_size: 8,
    };
    let unpacked = vector.unpack();
    assert_eq!(unpacked[0], -1.0);
    assert!((unpacked[1] - 0.003_921_628).abs() < 1e-6);
    assert_eq!(unpacked[2], 1.0);

    let ints = PackedIntVector {
        num_items: 4,
        data: pack_bits(&[3, 0, 2, 1], 2),
        bit_size: 2,
    };
    assert_eq!(ints.unpack(), vec![3, 0, 2, 1]);
}

#[test]
fn vertex_formats_before_2019_are_shifted() {
    let old = UnityVersion::new(2018, 4, 0);
    let new = UnityVersion::new(2019, 4, 0);

    assert_eq!(VertexFormat::from_raw(0, &old), Some(VertexFormat::Float));
    assert_eq!(VertexFormat::from_raw(1, &old), Some(VertexFormat::Float16));
    assert_eq!(VertexFormat::from_raw(2, &old), Some(VertexFormat::UNorm8));
    assert_eq!(VertexFormat::from_raw(3, &old), Some(VertexFormat::UNorm8));
    assert_eq!(VertexFormat::from_raw(11, &old), Some(VertexFormat::UInt32));

    assert_eq!(VertexFormat::from_raw(3, &new), Some(VertexFormat::SNorm8));
    assert_eq!(VertexFormat::from_raw(11, &new), Some(VertexFormat::SInt32));
    assert_eq!(VertexFormat::from_raw(12, &new), None);
    assert_eq!(VertexFormat::Float16.byte_size(), 2);
}

#[test]
fn unused_channels_have_no_components() {
    let unused = ChannelInfo {
        stream: 0,
        offset: 0,
        format: 0,
        dimension: 0,
    };
    assert!(!unused.is_used());

    // the high nibble carries flags and does not count
    let normal = ChannelInfo {
        stream: 0,
        offset: 12,
        format: 0,
        dimension: 0x13,
    };
    assert_eq!(normal.component_count(), 3);
}

#[test]
fn parses_uncompressed_mesh() -> Result<(), anyhow::Error> {
    let mesh = UnityMesh {
        name: "Cube".to_string(),
        sub_meshes: vec![SubMesh {
            first_byte: 0,
            index_count: 3,
            topology: 0,
            base_vertex: 0,
            first_vertex: 0,
            vertex_count: 3,
            local_aabb: AABB {
                center: Vector3f { x: 0.0, y: 0.5, z: 0.0 },
                extent: Vector3f { x: 1.0, y: 0.5, z: 0.0 },
            },
        }],
        index_format: IndexFormat::UInt16,
        index_buffer: vec![0, 0, 1, 0, 2, 0],
        vertex_data: VertexData {
            vertex_count: 3,
            channels: vec![ChannelInfo {
                stream: 0,
                offset: 0,
                format: 0,
                dimension: 3,
            }],
            data: vec![0; 36],
        },
        mesh_metrics: [1.0, 1.0],
        ..Default::default()
    };

    let parsed: UnityMesh = parse_object(&encode_mesh(&mesh), &context(DEFAULT_VERSION))?;
    assert_eq!(parsed.name, "Cube");
    assert!(!parsed.is_compressed());
    assert_eq!(parsed.sub_meshes, mesh.sub_meshes);
    assert_eq!(parsed.index_format, IndexFormat::UInt16);
    assert_eq!(parsed.index_buffer.len(), 6);
    assert_eq!(parsed.vertex_data.vertex_count, 3);
    assert_eq!(parsed.vertex_data.channels, mesh.vertex_data.channels);
    assert_eq!(parsed.vertex_data.data.len(), 36);
    assert_eq!(parsed.mesh_metrics, [1.0, 1.0]);
    assert!(parsed.stream_data.is_empty());
    Ok(())
}
