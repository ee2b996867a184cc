//! Animation sections. Six entity kinds (skeletal, material, visibility,
//! light, camera, fog) share one header and element-record shape and the
//! same keyframe codec; what differs is how each element's payload is
//! decoded. Skeletal elements carry one of three mutually exclusive segment
//! encodings, tagged per bone.

pub mod keyframes;

use std::io::{Read, Seek, SeekFrom};

use anyhow::{bail, Context, Result};
use binrw::BinRead;
use serde::{Deserialize, Serialize};

use crate::bch::strings;
use crate::math::{BchMatrix43, BchQuaternion, BchVector3};

pub use keyframes::{BooleanTrack, Interpolation, KeyFrame, KeyFrameGroup, RepeatMethod};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopMode {
    #[default]
    Once,
    Loop,
}

impl LoopMode {
    fn from_raw(value: u32) -> LoopMode {
        if value & 1 != 0 {
            LoopMode::Loop
        } else {
            LoopMode::Once
        }
    }
}

/// Common animation section header.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct AnimationHeader {
    name_offset: u32,
    frames_count: f32,
    loop_mode: u32,
    element_table_offset: u32,
    element_entries: u32,
}

/// One element record: the animated entity's name, a segment/target tag, a
/// presence-flag word and the payload offset.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct ElementRecord {
    name_offset: u32,
    segment_type: u32,
    flags: u32,
    data_offset: u32,
}

/// A run of per-frame samples, either constant for the whole animation or
/// covering an explicit frame range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SampleTrack<T> {
    None,
    Constant(T),
    Frames {
        start_frame: f32,
        end_frame: f32,
        values: Vec<T>,
    },
}

impl<T> Default for SampleTrack<T> {
    fn default() -> Self {
        SampleTrack::None
    }
}

impl<T: Copy> SampleTrack<T> {
    fn pick(&self, frame: f32) -> Option<(T, T, f32)> {
        match self {
            SampleTrack::None => None,
            SampleTrack::Constant(value) => Some((*value, *value, 0.0)),
            SampleTrack::Frames { start_frame, values, .. } => {
                if values.is_empty() {
                    return None;
                }
                let position = (frame - start_frame).max(0.0);
                let last = values.len() - 1;
                let lower = (position.floor() as usize).min(last);
                let upper = (lower + 1).min(last);
                Some((values[lower], values[upper], position.fract()))
            }
        }
    }
}

impl SampleTrack<BchQuaternion> {
    /// Spherical interpolation between the two samples bracketing `frame`.
    pub fn sample(&self, frame: f32) -> Option<BchQuaternion> {
        self.pick(frame).map(|(a, b, t)| a.slerp(&b, t))
    }
}

impl SampleTrack<BchVector3> {
    /// Linear interpolation between the two samples bracketing `frame`.
    pub fn sample(&self, frame: f32) -> Option<BchVector3> {
        self.pick(frame).map(|(a, b, t)| {
            BchVector3(a.0 + (b.0 - a.0) * t)
        })
    }
}

/// Per-axis Euler keyframe groups, the most common skeletal encoding.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TransformSegment {
    pub rotation: [KeyFrameGroup; 3],
    pub translation: [KeyFrameGroup; 3],
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct QuaternionTransformSegment {
    pub rotation: SampleTrack<BchQuaternion>,
    pub translation: SampleTrack<BchVector3>,
}

/// The three mutually exclusive skeletal segment encodings. The tag in the
/// element record decides which one is stored; only that one is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BoneSegment {
    Transform(TransformSegment),
    QuaternionTransform(QuaternionTransformSegment),
    Matrix(Vec<BchMatrix43>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletalAnimationBone {
    pub name: String,
    pub segment: BoneSegment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletalAnimation {
    pub name: String,
    pub frames_count: f32,
    pub loop_mode: LoopMode,
    pub bones: Vec<SkeletalAnimationBone>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterAnimationElement {
    pub name: String,
    /// Which material/light/camera/fog parameter the channels drive. The tag
    /// space differs per entity kind and is passed through as stored.
    pub target: u32,
    pub channels: Vec<KeyFrameGroup>,
}

/// Material, light, camera and fog animations share this shape: named
/// elements, a target tag and scalar channels under the keyframe codec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterAnimation {
    pub name: String,
    pub frames_count: f32,
    pub loop_mode: LoopMode,
    pub elements: Vec<ParameterAnimationElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityAnimationElement {
    pub name: String,
    pub track: BooleanTrack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityAnimation {
    pub name: String,
    pub frames_count: f32,
    pub loop_mode: LoopMode,
    pub elements: Vec<VisibilityAnimationElement>,
}

const SEGMENT_TRANSFORM: u32 = 0;
const SEGMENT_QUATERNION_TRANSFORM: u32 = 1;
const SEGMENT_MATRIX: u32 = 2;

const ELEMENT_RECORD_SIZE: u32 = 0x10;

fn read_elements<R: Read + Seek>(
    reader: &mut R,
    header: &AnimationHeader,
) -> Result<Vec<(ElementRecord, String)>> {
    let mut elements = Vec::with_capacity(header.element_entries as usize);
    for index in 0..header.element_entries {
        reader
            .seek(SeekFrom::Start(
                (header.element_table_offset + index * ELEMENT_RECORD_SIZE) as u64,
            ))
            .with_context(|| format!("seek to animation element record {index}"))?;
        let record = ElementRecord::read(reader)
            .with_context(|| format!("animation element record {index}"))?;
        let name = strings::read_string(reader, record.name_offset)?;
        elements.push((record, name));
    }
    Ok(elements)
}

pub(crate) fn read_skeletal_animation<R: Read + Seek>(reader: &mut R, address: u32) -> Result<SkeletalAnimation> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to skeletal animation at {address:#x}"))?;
    let header = AnimationHeader::read(reader).context("skeletal animation header")?;
    let name = strings::read_string(reader, header.name_offset)?;

    let mut bones = vec![];
    for (record, bone_name) in read_elements(reader, &header)? {
        reader
            .seek(SeekFrom::Start(record.data_offset as u64))
            .with_context(|| format!("seek to segment data of bone \"{bone_name}\""))?;

        let segment = match record.segment_type {
            SEGMENT_TRANSFORM => {
                let mut segment = TransformSegment::default();
                for axis in 0..3usize {
                    if record.flags & (1 << axis) != 0 {
                        segment.rotation[axis] = KeyFrameGroup::read(reader).with_context(|| {
                            format!("rotation track of bone \"{bone_name}\" in animation \"{name}\"")
                        })?;
                    }
                }
                for axis in 0..3usize {
                    if record.flags & (1 << (axis + 3)) != 0 {
                        segment.translation[axis] = KeyFrameGroup::read(reader).with_context(|| {
                            format!("translation track of bone \"{bone_name}\" in animation \"{name}\"")
                        })?;
                    }
                }
                BoneSegment::Transform(segment)
            }
            SEGMENT_QUATERNION_TRANSFORM => {
                let rotation = read_sample_track::<_, BchQuaternion>(reader, record.flags)
                    .with_context(|| format!("rotation samples of bone \"{bone_name}\""))?;
                let translation = read_sample_track::<_, BchVector3>(reader, record.flags >> 2)
                    .with_context(|| format!("translation samples of bone \"{bone_name}\""))?;
                BoneSegment::QuaternionTransform(QuaternionTransformSegment { rotation, translation })
            }
            SEGMENT_MATRIX => {
                let count = u32::read_le(reader)
                    .with_context(|| format!("matrix count of bone \"{bone_name}\""))?;
                let mut matrices = Vec::with_capacity(count as usize);
                for frame in 0..count {
                    matrices.push(BchMatrix43::read(reader).with_context(|| {
                        format!("baked matrix {frame} of bone \"{bone_name}\"")
                    })?);
                }
                BoneSegment::Matrix(matrices)
            }
            other => bail!(
                "animation \"{name}\": bone \"{bone_name}\" uses unsupported segment type {other}"
            ),
        };

        bones.push(SkeletalAnimationBone { name: bone_name, segment });
    }

    Ok(SkeletalAnimation {
        name,
        frames_count: header.frames_count,
        loop_mode: LoopMode::from_raw(header.loop_mode),
        bones,
    })
}

/// Sample-array layout shared by the quaternion segment's two tracks:
/// flag bit 0 = track present, bit 1 = constant (single sample).
fn read_sample_track<R, T>(reader: &mut R, flags: u32) -> Result<SampleTrack<T>>
where
    R: Read + Seek,
    for<'a> T: BinRead<Args<'a> = ()>,
{
    if flags & 1 == 0 {
        return Ok(SampleTrack::None);
    }

    if flags & 2 != 0 {
        return Ok(SampleTrack::Constant(T::read_le(reader)?));
    }

    let start_frame = f32::read_le(reader)?;
    let end_frame = f32::read_le(reader)?;
    let count = u32::read_le(reader)?;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        values.push(T::read_le(reader)?);
    }

    Ok(SampleTrack::Frames { start_frame, end_frame, values })
}

pub(crate) fn read_parameter_animation<R: Read + Seek>(
    reader: &mut R,
    address: u32,
    kind: &str,
) -> Result<ParameterAnimation> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to {kind} animation at {address:#x}"))?;
    let header = AnimationHeader::read(reader).with_context(|| format!("{kind} animation header"))?;
    let name = strings::read_string(reader, header.name_offset)?;

    let mut elements = vec![];
    for (record, element_name) in read_elements(reader, &header)? {
        reader
            .seek(SeekFrom::Start(record.data_offset as u64))
            .with_context(|| format!("seek to channel data of \"{element_name}\""))?;

        let mut channels = vec![];
        for bit in 0..32 {
            if record.flags & (1 << bit) != 0 {
                channels.push(KeyFrameGroup::read(reader).with_context(|| {
                    format!(
                        "channel {bit} of element \"{element_name}\" in {kind} animation \"{name}\""
                    )
                })?);
            }
        }

        elements.push(ParameterAnimationElement {
            name: element_name,
            target: record.segment_type,
            channels,
        });
    }

    Ok(ParameterAnimation {
        name,
        frames_count: header.frames_count,
        loop_mode: LoopMode::from_raw(header.loop_mode),
        elements,
    })
}

pub(crate) fn read_visibility_animation<R: Read + Seek>(reader: &mut R, address: u32) -> Result<VisibilityAnimation> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to visibility animation at {address:#x}"))?;
    let header = AnimationHeader::read(reader).context("visibility animation header")?;
    let name = strings::read_string(reader, header.name_offset)?;

    let mut elements = vec![];
    for (record, element_name) in read_elements(reader, &header)? {
        reader
            .seek(SeekFrom::Start(record.data_offset as u64))
            .with_context(|| format!("seek to visibility bits of \"{element_name}\""))?;
        let track = BooleanTrack::read(reader).with_context(|| {
            format!("visibility track of \"{element_name}\" in animation \"{name}\"")
        })?;
        elements.push(VisibilityAnimationElement { name: element_name, track });
    }

    Ok(VisibilityAnimation {
        name,
        frames_count: header.frames_count,
        loop_mode: LoopMode::from_raw(header.loop_mode),
        elements,
    })
}
