//! Skeleton records and transform composition. Bones store their transform
//! relative to the parent; absolute placement is composed recursively up the
//! parent chain. A separate scale pass folds ancestor scales into each
//! bone's absolute scale and pre-scales its translation — child translation
//! distances follow ancestor scale in this engine's convention.

use std::io::{Read, Seek, SeekFrom};

use anyhow::{bail, Context, Result};
use binrw::BinRead;
use cgmath::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::animation::{BoneSegment, SkeletalAnimation};
use crate::bch::strings;
use crate::math::{srt_matrix, BchVector3};

use super::{read_metadata, MetaDataEntry};

pub const ROOT_BONE_ID: i32 = -1;

/// Deep enough for any real skeleton; past this the parent chain is treated
/// as malformed rather than walked forever.
const MAX_CHAIN_DEPTH: usize = 1024;

const BONE_RECORD_SIZE: u32 = 0x34;

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct BoneRecord {
    name_offset: u32,
    _flags: u32,
    parent_id: i32,
    scale: BchVector3,
    rotation: BchVector3,
    translation: BchVector3,
    meta_data_offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone, or -1 for a root.
    pub parent_id: i32,
    pub scale: BchVector3,
    /// Euler rotation in radians, applied X then Y then Z.
    pub rotation: BchVector3,
    /// Parent-relative translation, pre-scaled by the ancestor scale product.
    pub translation: BchVector3,
    /// Product of this bone's scale and every ancestor's scale.
    pub absolute_scale: BchVector3,
    pub metadata: Vec<MetaDataEntry>,
}

pub(crate) fn read_skeleton<R: Read + Seek>(reader: &mut R, offset: u32, entries: u32) -> Result<Vec<Bone>> {
    let mut bones = Vec::with_capacity(entries as usize);

    for index in 0..entries {
        reader
            .seek(SeekFrom::Start((offset + index * BONE_RECORD_SIZE) as u64))
            .with_context(|| format!("seek to bone record {index}"))?;
        let record = BoneRecord::read(reader).with_context(|| format!("bone record {index}"))?;
        let name = strings::read_string(reader, record.name_offset)?;

        if record.parent_id != ROOT_BONE_ID && record.parent_id >= index as i32 {
            bail!(
                "bone \"{name}\" (index {index}) has parent {} — parents must precede children",
                record.parent_id
            );
        }

        let metadata = if record.meta_data_offset != 0 {
            read_metadata(reader, record.meta_data_offset)
                .with_context(|| format!("metadata of bone \"{name}\""))?
        } else {
            vec![]
        };

        bones.push(Bone {
            name,
            parent_id: record.parent_id,
            scale: record.scale,
            rotation: record.rotation,
            translation: record.translation,
            absolute_scale: record.scale,
            metadata,
        });
    }

    scale_skeleton(&mut bones);
    Ok(bones)
}

/// Fold ancestor scales into each bone: `absolute_scale` becomes the product
/// of the bone's own scale and every strict ancestor's, and the translation
/// is multiplied by the same ancestor product. Reads only the immutable
/// `scale` fields, so pass order does not matter.
pub fn scale_skeleton(bones: &mut [Bone]) {
    for index in 0..bones.len() {
        let mut absolute = bones[index].scale.0;
        let mut translation = bones[index].translation.0;

        let mut parent = bones[index].parent_id;
        while parent != ROOT_BONE_ID {
            let ancestor = &bones[parent as usize];
            let s = ancestor.scale.0;
            absolute = Vector3::new(absolute.x * s.x, absolute.y * s.y, absolute.z * s.z);
            translation = Vector3::new(translation.x * s.x, translation.y * s.y, translation.z * s.z);
            parent = ancestor.parent_id;
        }

        bones[index].absolute_scale = BchVector3(absolute);
        bones[index].translation = BchVector3(translation);
    }
}

/// Absolute bind-pose transform of a bone: scale, rotate X/Y/Z, translate,
/// composed with the parent chain up to the root.
pub fn bind_pose_transform(bones: &[Bone], index: usize) -> Result<Matrix4<f32>> {
    let mut transform = local_bind_transform(&bones[index]);
    let mut parent = bones[index].parent_id;
    let mut depth = 0usize;

    while parent != ROOT_BONE_ID {
        depth += 1;
        if depth > MAX_CHAIN_DEPTH {
            bail!(
                "parent chain of bone \"{}\" exceeds {MAX_CHAIN_DEPTH} links",
                bones[index].name
            );
        }
        let ancestor = &bones[parent as usize];
        transform = local_bind_transform(ancestor) * transform;
        parent = ancestor.parent_id;
    }

    Ok(transform)
}

fn local_bind_transform(bone: &Bone) -> Matrix4<f32> {
    srt_matrix(bone.scale.0, bone.rotation.0, bone.translation.0)
}

/// Absolute transform of a bone at an animation frame. Each bone in the
/// chain resolves its local transform from the animation element matching
/// its name: Euler tracks evaluated through the keyframe codec, slerped
/// quaternion samples, or a directly baked matrix. Bones the animation does
/// not touch keep their bind transform.
pub fn animated_transform(
    bones: &[Bone],
    animation: &SkeletalAnimation,
    index: usize,
    frame: f32,
) -> Result<Matrix4<f32>> {
    let mut transform = local_animated_transform(&bones[index], animation, frame);
    let mut parent = bones[index].parent_id;
    let mut depth = 0usize;

    while parent != ROOT_BONE_ID {
        depth += 1;
        if depth > MAX_CHAIN_DEPTH {
            bail!(
                "parent chain of bone \"{}\" exceeds {MAX_CHAIN_DEPTH} links",
                bones[index].name
            );
        }
        let ancestor = &bones[parent as usize];
        transform = local_animated_transform(ancestor, animation, frame) * transform;
        parent = ancestor.parent_id;
    }

    Ok(transform)
}

fn local_animated_transform(bone: &Bone, animation: &SkeletalAnimation, frame: f32) -> Matrix4<f32> {
    let element = animation.bones.iter().find(|b| b.name == bone.name);
    let Some(element) = element else {
        return local_bind_transform(bone);
    };

    match &element.segment {
        BoneSegment::Transform(segment) => {
            let bind_rotation = bone.rotation.to_slice();
            let bind_translation = bone.translation.to_slice();

            let channel = |group: &crate::animation::KeyFrameGroup, bind: f32| {
                if group.exists {
                    group.value_at(frame)
                } else {
                    bind
                }
            };

            let rotation = Vector3::new(
                channel(&segment.rotation[0], bind_rotation[0]),
                channel(&segment.rotation[1], bind_rotation[1]),
                channel(&segment.rotation[2], bind_rotation[2]),
            );
            let translation = Vector3::new(
                channel(&segment.translation[0], bind_translation[0]),
                channel(&segment.translation[1], bind_translation[1]),
                channel(&segment.translation[2], bind_translation[2]),
            );

            srt_matrix(bone.scale.0, rotation, translation)
        }
        BoneSegment::QuaternionTransform(segment) => {
            let translation = segment
                .translation
                .sample(frame)
                .unwrap_or(bone.translation)
                .0;
            let rotation: Matrix4<f32> = match segment.rotation.sample(frame) {
                Some(quat) => Matrix4::from(quat.0),
                None => {
                    let r = bone.rotation.0;
                    srt_matrix(Vector3::new(1.0, 1.0, 1.0), r, Vector3::new(0.0, 0.0, 0.0))
                }
            };
            let s = bone.scale.0;
            Matrix4::from_translation(translation)
                * rotation
                * Matrix4::from_nonuniform_scale(s.x, s.y, s.z)
        }
        BoneSegment::Matrix(matrices) => {
            if matrices.is_empty() {
                return local_bind_transform(bone);
            }
            let clamped = (frame.max(0.0) as usize).min(matrices.len() - 1);
            matrices[clamped].0
        }
    }
}
