//! Mesh object decoding: the vertex attribute layout comes out of the GPU
//! command stream, vertices are pulled through the index buffer and
//! post-processed per attribute (uniform-derived scales, color packing,
//! bone index resolution through the face group's node list), and rigidly
//! skinned positions are pre-transformed back out of bone space.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use anyhow::{bail, Context, Result};
use binrw::BinRead;
use cgmath::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::math::{transform_point, BchVector2, BchVector3};
use crate::pica::commands::CommandStreamReader;
use crate::pica::{
    AttributeFormat, AttributeName, UNIFORM_POSITION_OFFSET, UNIFORM_SCALES_A, UNIFORM_SCALES_B,
};

use super::skeleton::{bind_pose_transform, Bone};

pub(crate) const MESH_DESCRIPTOR_SIZE: u32 = 0x24;
const FACE_HEADER_SIZE: u32 = 0x34;
const NODE_LIST_CAPACITY: usize = 20;

/// Node lists at or below this length let vertices omit the bone index
/// attribute and use the whole list implicitly.
const IMPLICIT_NODE_LIST_LIMIT: usize = 4;

#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub(crate) struct MeshDescriptor {
    pub material_id: u16,
    pub flags: u16,
    pub node_id: u16,
    pub render_priority: u16,
    pub attributes_commands_offset: u32,
    pub attributes_commands_words: u32,
    pub faces_header_offset: u32,
    pub faces_header_entries: u32,
    pub extra_attributes_commands_offset: u32,
    pub extra_attributes_commands_words: u32,
    pub bounding_box_offset: u32,
}

const MESH_FLAG_SILHOUETTE: u16 = 0x01;

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct FaceHeaderRecord {
    skinning_mode: u16,
    node_list_size: u16,
    node_list: [u16; NODE_LIST_CAPACITY],
    face_commands_offset: u32,
    face_commands_words: u32,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkinningMode {
    #[default]
    None,
    Rigid,
    Smooth,
}

impl SkinningMode {
    fn from_raw(value: u16) -> SkinningMode {
        match value {
            0 => SkinningMode::None,
            1 => SkinningMode::Rigid,
            // 2 and unknown tags: no pre-transform applies
            _ => SkinningMode::Smooth,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub position: BchVector3,
    pub normal: BchVector3,
    pub tangent: BchVector3,
    pub uv: [BchVector2; 3],
    /// Packed 0xAABBGGRR diffuse color.
    pub color: u32,
    /// Global skeleton indices; same length as `weight`, or both empty.
    pub node: Vec<u16>,
    pub weight: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrientedBoundingBox {
    pub center: BchVector3,
    pub orientation: [BchVector3; 3],
    pub size: BchVector3,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Mesh {
    pub material_id: u16,
    pub node_id: u16,
    pub render_priority: u16,
    pub silhouette: bool,
    pub visible: bool,
    pub has_normal: bool,
    pub has_tangent: bool,
    pub has_color: bool,
    pub uv_count: u8,
    pub skinning: SkinningMode,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub bounding_box: Option<OrientedBoundingBox>,
}

/// Running min/max over every reconstructed vertex of a model.
#[derive(Debug, Default, Clone)]
pub(crate) struct BoundsAccumulator {
    bounds: Option<(BchVector3, BchVector3)>,
}

impl BoundsAccumulator {
    fn update(&mut self, position: &BchVector3) {
        self.bounds = Some(match &self.bounds {
            None => (*position, *position),
            Some((min, max)) => (min.min(position), max.max(position)),
        });
    }

    pub fn finish(self) -> (BchVector3, BchVector3) {
        self.bounds.unwrap_or_default()
    }
}

/// Uniform-derived post-processing constants captured from the vertex
/// shader command stream.
struct AttributeScales {
    position_offset: Vector3<f32>,
    position: f32,
    uv: [f32; 3],
    bone_weight: f32,
    normal: f32,
    tangent: f32,
    color: f32,
}

impl AttributeScales {
    fn from_commands(commands: &CommandStreamReader) -> AttributeScales {
        let offset = commands.float_uniform(UNIFORM_POSITION_OFFSET).unwrap_or(&[]);
        let a = commands.float_uniform(UNIFORM_SCALES_A).unwrap_or(&[]);
        let b = commands.float_uniform(UNIFORM_SCALES_B).unwrap_or(&[]);
        let at = |slice: &[f32], index: usize| slice.get(index).copied().unwrap_or(1.0);

        AttributeScales {
            position_offset: Vector3::new(
                offset.first().copied().unwrap_or(0.0),
                offset.get(1).copied().unwrap_or(0.0),
                offset.get(2).copied().unwrap_or(0.0),
            ),
            position: at(a, 0),
            uv: [at(a, 1), at(a, 2), at(b, 0)],
            bone_weight: at(a, 3),
            normal: at(b, 1),
            tangent: at(b, 2),
            color: at(b, 3),
        }
    }
}

struct FaceGroup {
    skinning: SkinningMode,
    node_list: Vec<u16>,
    commands_offset: u32,
    commands_words: u32,
}

pub(crate) fn read_mesh<R: Read + Seek>(
    reader: &mut R,
    descriptor: &MeshDescriptor,
    skeleton: &[Bone],
    visible: bool,
    bounds: &mut BoundsAccumulator,
) -> Result<Mesh> {
    let mut commands = CommandStreamReader::new(
        reader,
        descriptor.attributes_commands_offset,
        descriptor.attributes_commands_words,
    )
    .context("vertex attribute commands")?;
    if descriptor.extra_attributes_commands_words > 0 {
        commands
            .append(
                reader,
                descriptor.extra_attributes_commands_offset,
                descriptor.extra_attributes_commands_words,
            )
            .context("extra vertex attribute commands")?;
    }

    let buffer_address = commands.attributes_buffer_address(0);
    let stride = commands.attributes_buffer_stride(0);
    let permutation = commands.attributes_buffer_permutation(0);
    let attribute_count = commands.attributes_buffer_attribute_count(0);
    let formats = commands.attributes_format();
    let scales = AttributeScales::from_commands(&commands);

    let mut mesh = Mesh {
        material_id: descriptor.material_id,
        node_id: descriptor.node_id,
        render_priority: descriptor.render_priority,
        silhouette: descriptor.flags & MESH_FLAG_SILHOUETTE != 0,
        visible,
        ..Default::default()
    };

    let mut has_bone_index = false;
    for slot in 0..attribute_count {
        match AttributeName::from_raw((permutation >> (slot * 4)) as u32) {
            AttributeName::Normal => mesh.has_normal = true,
            AttributeName::Tangent => mesh.has_tangent = true,
            AttributeName::Color => mesh.has_color = true,
            AttributeName::TextureCoordinate0 => mesh.uv_count = mesh.uv_count.max(1),
            AttributeName::TextureCoordinate1 => mesh.uv_count = mesh.uv_count.max(2),
            AttributeName::TextureCoordinate2 => mesh.uv_count = mesh.uv_count.max(3),
            AttributeName::BoneIndex => has_bone_index = true,
            _ => {}
        }
    }

    let face_groups = read_face_groups(reader, descriptor)?;
    let mut flat_vertices = vec![];

    for group in &face_groups {
        mesh.skinning = mesh.skinning.max(group.skinning);

        let face_commands =
            CommandStreamReader::new(reader, group.commands_offset, group.commands_words)
                .context("face index commands")?;
        let (index_address, indices_16bit) = face_commands.index_buffer();
        let index_count = face_commands.vertex_count();

        for i in 0..index_count {
            let index_size = if indices_16bit { 2 } else { 1 };
            reader
                .seek(SeekFrom::Start((index_address + i * index_size) as u64))
                .with_context(|| format!("seek to face index {i}"))?;
            let index = if indices_16bit {
                u16::read_le(reader).with_context(|| format!("face index {i}"))? as u32
            } else {
                u8::read_le(reader).with_context(|| format!("face index {i}"))? as u32
            };

            let vertex = read_vertex(
                reader,
                buffer_address + index * stride,
                permutation,
                attribute_count,
                formats,
                &scales,
                group,
                has_bone_index,
                skeleton,
            )
            .with_context(|| format!("vertex {index} (face index {i})"))?;

            bounds.update(&vertex.position);
            flat_vertices.push(vertex);
        }
    }

    let (vertices, indices) = optimize(flat_vertices);
    mesh.vertices = vertices;
    mesh.indices = indices;

    if descriptor.bounding_box_offset != 0 {
        reader
            .seek(SeekFrom::Start(descriptor.bounding_box_offset as u64))
            .context("seek to oriented bounding box")?;
        let center = BchVector3::read(reader).context("bounding box center")?;
        let mut orientation = [BchVector3::default(); 3];
        for row in orientation.iter_mut() {
            *row = BchVector3::read(reader).context("bounding box orientation")?;
        }
        let size = BchVector3::read(reader).context("bounding box size")?;
        mesh.bounding_box = Some(OrientedBoundingBox { center, orientation, size });
    }

    Ok(mesh)
}

fn read_face_groups<R: Read + Seek>(reader: &mut R, descriptor: &MeshDescriptor) -> Result<Vec<FaceGroup>> {
    let mut groups = vec![];

    if descriptor.faces_header_entries > 0 {
        for entry in 0..descriptor.faces_header_entries {
            reader
                .seek(SeekFrom::Start(
                    (descriptor.faces_header_offset + entry * FACE_HEADER_SIZE) as u64,
                ))
                .with_context(|| format!("seek to face header {entry}"))?;
            let record = FaceHeaderRecord::read(reader).with_context(|| format!("face header {entry}"))?;
            let list_size = (record.node_list_size as usize).min(NODE_LIST_CAPACITY);
            groups.push(FaceGroup {
                skinning: SkinningMode::from_raw(record.skinning_mode),
                node_list: record.node_list[..list_size].to_vec(),
                commands_offset: record.face_commands_offset,
                commands_words: record.face_commands_words,
            });
        }
    } else {
        // Fallback table used by silhouette objects: a bare command
        // reference with no node list.
        reader
            .seek(SeekFrom::Start(descriptor.faces_header_offset as u64))
            .context("seek to fallback face table")?;
        let commands_offset = u32::read_le(reader).context("fallback face commands offset")?;
        let commands_words = u32::read_le(reader).context("fallback face commands word count")?;
        groups.push(FaceGroup {
            skinning: SkinningMode::None,
            node_list: vec![],
            commands_offset,
            commands_words,
        });
    }

    Ok(groups)
}

fn read_component<R: Read + Seek>(reader: &mut R, format: AttributeFormat) -> Result<f32> {
    Ok(match format {
        AttributeFormat::SignedByte => i8::read_le(reader)? as f32,
        AttributeFormat::UnsignedByte => u8::read_le(reader)? as f32,
        AttributeFormat::SignedShort => i16::read_le(reader)? as f32,
        AttributeFormat::Float => f32::read_le(reader)?,
    })
}

#[allow(clippy::too_many_arguments)]
fn read_vertex<R: Read + Seek>(
    reader: &mut R,
    address: u32,
    permutation: u64,
    attribute_count: u32,
    formats: u64,
    scales: &AttributeScales,
    group: &FaceGroup,
    has_bone_index: bool,
    skeleton: &[Bone],
) -> Result<Vertex> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to vertex data at {address:#x}"))?;

    let mut vertex = Vertex::default();

    for slot in 0..attribute_count {
        let name = AttributeName::from_raw((permutation >> (slot * 4)) as u32);
        let format_bits = ((formats >> ((name as u64) * 4)) & 0xf) as u32;
        let format = AttributeFormat::from_raw(format_bits);
        let components = ((format_bits >> 2) & 3) + 1;

        let mut values = [0.0f32; 4];
        for component in values.iter_mut().take(components as usize) {
            *component = read_component(reader, format)?;
        }

        match name {
            AttributeName::Position => {
                vertex.position = BchVector3(
                    Vector3::new(values[0], values[1], values[2]) * scales.position
                        + scales.position_offset,
                );
            }
            AttributeName::Normal => {
                vertex.normal =
                    BchVector3(Vector3::new(values[0], values[1], values[2]) * scales.normal);
            }
            AttributeName::Tangent => {
                vertex.tangent =
                    BchVector3(Vector3::new(values[0], values[1], values[2]) * scales.tangent);
            }
            AttributeName::Color => {
                if components < 4 {
                    values[3] = 1.0;
                }
                let quantize = |c: f32| ((c * scales.color).clamp(0.0, 1.0) * 255.0) as u32;
                vertex.color = (quantize(values[3]) << 24)
                    | (quantize(values[2]) << 16)
                    | (quantize(values[1]) << 8)
                    | quantize(values[0]);
            }
            AttributeName::TextureCoordinate0 => {
                vertex.uv[0] = BchVector2(Vector2::new(values[0], values[1]) * scales.uv[0]);
            }
            AttributeName::TextureCoordinate1 => {
                vertex.uv[1] = BchVector2(Vector2::new(values[0], values[1]) * scales.uv[1]);
            }
            AttributeName::TextureCoordinate2 => {
                vertex.uv[2] = BchVector2(Vector2::new(values[0], values[1]) * scales.uv[2]);
            }
            AttributeName::BoneIndex => {
                for component in values.iter().take(components as usize) {
                    let local = *component as usize;
                    let Some(&global) = group.node_list.get(local) else {
                        bail!(
                            "bone index {local} outside the face group node list (length {})",
                            group.node_list.len()
                        );
                    };
                    vertex.node.push(global);
                }
            }
            AttributeName::BoneWeight => {
                for component in values.iter().take(components as usize) {
                    vertex.weight.push(component * scales.bone_weight);
                }
            }
            _ => {}
        }
    }

    // Small node lists skip the bone index attribute: the whole list applies.
    if !has_bone_index
        && !group.node_list.is_empty()
        && group.node_list.len() <= IMPLICIT_NODE_LIST_LIMIT
    {
        vertex.node = group.node_list.clone();
        if vertex.weight.is_empty() {
            vertex.weight.push(1.0);
        }
    }

    if group.skinning != SkinningMode::Smooth && !vertex.node.is_empty() {
        // Rigid meshes are stored pre-transformed into bone space; undo that
        // with the bone's composed bind pose so the vertex follows the
        // skeleton. Exactly one weight of 1.0 is assumed.
        vertex.node.truncate(1);
        vertex.weight = vec![1.0];

        let bone = vertex.node[0] as usize;
        if bone >= skeleton.len() {
            bail!("rigid vertex references bone {bone} but the skeleton has {} bones", skeleton.len());
        }
        let transform = bind_pose_transform(skeleton, bone)?;
        vertex.position = BchVector3(transform_point(&transform, vertex.position.0));
    }

    let influences = vertex.node.len().min(vertex.weight.len());
    vertex.node.truncate(influences);
    vertex.weight.truncate(influences);

    Ok(vertex)
}

/// Deduplicate the flat vertex list into a vertex buffer plus index buffer.
fn optimize(flat: Vec<Vertex>) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices: Vec<Vertex> = vec![];
    let mut indices = Vec::with_capacity(flat.len());
    let mut seen: HashMap<Vec<u8>, u32> = HashMap::new();

    for vertex in flat {
        let key = vertex_key(&vertex);
        match seen.get(&key) {
            Some(&index) => indices.push(index),
            None => {
                let index = vertices.len() as u32;
                seen.insert(key, index);
                vertices.push(vertex);
                indices.push(index);
            }
        }
    }

    (vertices, indices)
}

fn vertex_key(vertex: &Vertex) -> Vec<u8> {
    let mut floats: Vec<f32> = vec![];
    floats.extend_from_slice(&vertex.position.to_slice());
    floats.extend_from_slice(&vertex.normal.to_slice());
    floats.extend_from_slice(&vertex.tangent.to_slice());
    for uv in &vertex.uv {
        floats.extend_from_slice(&uv.to_slice());
    }
    floats.extend_from_slice(&vertex.weight);

    let mut key: Vec<u8> = bytemuck::cast_slice(&floats).to_vec();
    key.extend_from_slice(&vertex.color.to_le_bytes());
    for node in &vertex.node {
        key.extend_from_slice(&node.to_le_bytes());
    }
    key
}
