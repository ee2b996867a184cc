//! Animation sections decoded through the full container path.

mod common;

use bch_tools::animation::{BoneSegment, SampleTrack};
use bch_tools::bch::BchHeader;
use binrw::BinWrite;
use common::Arena;
use std::io::Cursor;

const SLOT_SKELETAL: usize = 8;
const SLOT_MATERIAL: usize = 9;
const SLOT_VISIBILITY: usize = 10;

/// A container holding one animation entry in the given content-table slot.
fn animation_container(slot: usize, write_animation: impl FnOnce(&mut Arena) -> u32) -> Vec<u8> {
    let mut a = Arena::default();
    a.skip(68); // compatibility 0x21 header

    let content_table = a.pos();
    a.skip(16 * 12);

    let animation = write_animation(&mut a);
    a.align(4);
    let pointer_table = a.pos();
    a.push_u32(animation);

    a.patch_u32(content_table + (slot * 12) as u32, pointer_table);
    a.patch_u32(content_table + (slot * 12) as u32 + 4, 1);

    let header = BchHeader {
        backward_compatibility: 0x21,
        forward_compatibility: 0x21,
        version: 0,
        main_header_offset: content_table,
        string_table_offset: 0,
        gpu_commands_offset: 0,
        data_offset: 0,
        data_ext_offset: 0,
        relocation_table_offset: a.pos(),
        main_header_length: 16 * 12,
        string_table_length: 0,
        gpu_commands_length: 0,
        data_length: 0,
        data_ext_length: 0,
        relocation_table_length: 0,
        uninit_data_length: 0,
        uninit_description_length: 0,
        flags: 0,
        address_count: 0,
    };
    let mut cursor = Cursor::new(vec![]);
    header.write(&mut cursor).unwrap();
    let header_bytes = cursor.into_inner();
    a.bytes[..header_bytes.len()].copy_from_slice(&header_bytes);

    a.bytes
}

/// Serialize one keyframe group under the stepLinear64 quantization.
fn write_group(a: &mut Arena, interpolation: u8, keys: &[(f32, f32)]) {
    a.push_f32(keys.first().map(|k| k.0).unwrap_or(0.0)); // start frame
    a.push_f32(keys.last().map(|k| k.0).unwrap_or(0.0)); // end frame
    a.push_u8(0); // pre repeat
    a.push_u8(0); // post repeat
    a.push_u8(interpolation);
    a.push_u8(6); // stepLinear64
    a.push_u32(keys.len() as u32);
    a.push_f32(1.0); // value scale
    a.push_f32(0.0); // value offset
    a.push_f32(1.0); // frame scale
    a.push_f32(0.0); // frame offset
    for (frame, value) in keys {
        a.push_f32(*frame);
        a.push_f32(*value);
    }
}

fn write_animation_header(a: &mut Arena, name: u32, frames: f32, table: u32, entries: u32) -> u32 {
    let header = a.pos();
    a.push_u32(name);
    a.push_f32(frames);
    a.push_u32(1); // loop
    a.push_u32(table);
    a.push_u32(entries);
    header
}

#[test]
fn euler_segment_tracks_evaluate_through_the_codec() {
    let bytes = animation_container(SLOT_SKELETAL, |a| {
        let name = a.push_cstr("walk");
        let bone = a.push_cstr("tail");
        a.align(4);

        let data = a.pos();
        write_group(a, 1, &[(0.0, 0.0), (10.0, 10.0)]); // linear translation X

        let table = a.pos();
        a.push_u32(bone);
        a.push_u32(0); // transform segment
        a.push_u32(1 << 3); // translation X present
        a.push_u32(data);

        write_animation_header(a, name, 10.0, table, 1)
    });

    let group = bch_tools::decode(bytes).unwrap();
    assert_eq!(group.skeletal_animations.len(), 1);
    let animation = &group.skeletal_animations[0];
    assert_eq!(animation.name, "walk");
    assert_eq!(animation.bones[0].name, "tail");

    let BoneSegment::Transform(segment) = &animation.bones[0].segment else {
        panic!("expected a transform segment");
    };
    assert!(segment.translation[0].exists);
    assert!(!segment.translation[1].exists);
    assert!(!segment.rotation[0].exists);
    assert_eq!(segment.translation[0].value_at(5.0), 5.0);
}

#[test]
fn quaternion_segment_reads_constant_and_framed_tracks() {
    let bytes = animation_container(SLOT_SKELETAL, |a| {
        let name = a.push_cstr("turn");
        let bone = a.push_cstr("hip");
        a.align(4);

        let data = a.pos();
        // constant rotation: identity quaternion
        for v in [0.0f32, 0.0, 0.0, 1.0] {
            a.push_f32(v);
        }
        // framed translation: two samples
        a.push_f32(0.0); // start frame
        a.push_f32(1.0); // end frame
        a.push_u32(2);
        for v in [0.0f32, 0.0, 0.0, 4.0, 0.0, 0.0] {
            a.push_f32(v);
        }

        let table = a.pos();
        a.push_u32(bone);
        a.push_u32(1); // quaternion segment
        // rotation present+constant, translation present
        a.push_u32(0b0111);
        a.push_u32(data);

        write_animation_header(a, name, 1.0, table, 1)
    });

    let group = bch_tools::decode(bytes).unwrap();
    let BoneSegment::QuaternionTransform(segment) = &group.skeletal_animations[0].bones[0].segment
    else {
        panic!("expected a quaternion segment");
    };

    assert!(matches!(segment.rotation, SampleTrack::Constant(_)));
    let mid = segment.translation.sample(0.5).unwrap();
    assert_eq!(mid.to_slice(), [2.0, 0.0, 0.0]);
}

#[test]
fn baked_matrix_segment_reads_per_frame_matrices() {
    let bytes = animation_container(SLOT_SKELETAL, |a| {
        let name = a.push_cstr("baked");
        let bone = a.push_cstr("jaw");
        a.align(4);

        let data = a.pos();
        a.push_u32(2); // frame count
        for frame in 0..2 {
            // identity with a per-frame x translation
            let rows = [
                [1.0f32, 0.0, 0.0, frame as f32],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ];
            for row in rows {
                for v in row {
                    a.push_f32(v);
                }
            }
        }

        let table = a.pos();
        a.push_u32(bone);
        a.push_u32(2); // matrix segment
        a.push_u32(0);
        a.push_u32(data);

        write_animation_header(a, name, 2.0, table, 1)
    });

    let group = bch_tools::decode(bytes).unwrap();
    let BoneSegment::Matrix(matrices) = &group.skeletal_animations[0].bones[0].segment else {
        panic!("expected a matrix segment");
    };
    assert_eq!(matrices.len(), 2);
    assert_eq!(matrices[1].0.w.x, 1.0);
}

#[test]
fn unknown_segment_types_fail_naming_the_bone() {
    let bytes = animation_container(SLOT_SKELETAL, |a| {
        let name = a.push_cstr("bad");
        let bone = a.push_cstr("spine");
        a.align(4);

        let table = a.pos();
        a.push_u32(bone);
        a.push_u32(7); // no such segment encoding
        a.push_u32(0);
        a.push_u32(0);

        write_animation_header(a, name, 1.0, table, 1)
    });

    let err = bch_tools::decode(bytes).unwrap_err();
    let message = format!("{err:?}");
    assert!(message.contains("spine"));
    assert!(message.contains("segment type 7"));
}

#[test]
fn visibility_bitstream_toggles_against_the_default() {
    let bytes = animation_container(SLOT_VISIBILITY, |a| {
        let name = a.push_cstr("blink");
        let element = a.push_cstr("eyelid");
        a.align(4);

        let data = a.pos();
        a.push_u8(1); // default: visible
        a.push_f32(0.0);
        a.push_f32(4.0);
        a.push_u32(5);
        a.push_u8(0b10010); // frames 1 and 4 flip

        a.align(4);
        let table = a.pos();
        a.push_u32(element);
        a.push_u32(0);
        a.push_u32(0);
        a.push_u32(data);

        write_animation_header(a, name, 5.0, table, 1)
    });

    let group = bch_tools::decode(bytes).unwrap();
    let track = &group.visibility_animations[0].elements[0].track;
    assert_eq!(track.values, vec![true, false, true, true, false]);
}

#[test]
fn material_animation_channels_follow_the_flag_bits() {
    let bytes = animation_container(SLOT_MATERIAL, |a| {
        let name = a.push_cstr("scroll");
        let element = a.push_cstr("water");
        a.align(4);

        let data = a.pos();
        write_group(a, 0, &[(0.0, 0.25)]); // channel for bit 0
        write_group(a, 0, &[(0.0, 0.75)]); // channel for bit 2

        let table = a.pos();
        a.push_u32(element);
        a.push_u32(3); // target tag: coordinator 0 translate V, say
        a.push_u32(0b101);
        a.push_u32(data);

        write_animation_header(a, name, 1.0, table, 1)
    });

    let group = bch_tools::decode(bytes).unwrap();
    let element = &group.material_animations[0].elements[0];
    assert_eq!(element.name, "water");
    assert_eq!(element.target, 3);
    assert_eq!(element.channels.len(), 2);
    assert_eq!(element.channels[0].value_at(0.0), 0.25);
    assert_eq!(element.channels[1].value_at(0.0), 0.75);
}
