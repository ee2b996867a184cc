//! The decoded model graph and the model-section reader. A model header is
//! one of two fixed layouts selected once from the compatibility byte (the
//! tagged-union approach keeps "which fields exist" a per-variant property
//! instead of a pile of conditionally valid options).

pub mod material;
pub mod mesh;
pub mod skeleton;
pub mod texture;

use std::io::{Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use binrw::{BinRead, BinResult};
use serde::{Deserialize, Serialize};

use crate::animation::{ParameterAnimation, SkeletalAnimation, VisibilityAnimation};
use crate::bch::strings;
use crate::math::{BchMatrix43, BchVector3};
use crate::scene::{Camera, Fog, Light, Scene};

pub use material::{
    FragmentLightingSamplers, Material, MaterialColors, MaterialLightingFlags, TextureCoordinator,
    TextureMapper, TextureMappingMethod,
};
pub use mesh::{Mesh, OrientedBoundingBox, SkinningMode, Vertex};
pub use skeleton::Bone;
pub use texture::TextureEntry;

/// Everything decoded from one container.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ModelGroup {
    pub models: Vec<Model>,
    pub textures: Vec<TextureEntry>,
    pub lights: Vec<Light>,
    pub cameras: Vec<Camera>,
    pub fogs: Vec<Fog>,
    pub scenes: Vec<Scene>,
    pub skeletal_animations: Vec<SkeletalAnimation>,
    pub material_animations: Vec<ParameterAnimation>,
    pub visibility_animations: Vec<VisibilityAnimation>,
    pub light_animations: Vec<ParameterAnimation>,
    pub camera_animations: Vec<ParameterAnimation>,
    pub fog_animations: Vec<ParameterAnimation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub transform: BchMatrix43,
    pub materials: Vec<Material>,
    pub skeleton: Vec<Bone>,
    pub meshes: Vec<Mesh>,
    /// Mesh-node names in trie enumeration order.
    pub node_names: Vec<String>,
    /// Running bounds over every reconstructed vertex.
    pub min_vector: BchVector3,
    pub max_vector: BchVector3,
    pub metadata: Vec<MetaDataEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MetaDataValue {
    Integer(i32),
    Float(f32),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaDataEntry {
    pub name: String,
    pub value: MetaDataValue,
}

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct MetaDataRecord {
    name_offset: u32,
    kind: u32,
    raw_value: u32,
}

pub(crate) fn read_metadata<R: Read + Seek>(reader: &mut R, offset: u32) -> Result<Vec<MetaDataEntry>> {
    reader
        .seek(SeekFrom::Start(offset as u64))
        .with_context(|| format!("seek to metadata list at {offset:#x}"))?;
    let count = u32::read_le(reader).context("metadata entry count")?;

    let mut records = Vec::with_capacity(count as usize);
    for index in 0..count {
        records.push(MetaDataRecord::read(reader).with_context(|| format!("metadata record {index}"))?);
    }

    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let name = strings::read_string(reader, record.name_offset)?;
        let value = match record.kind {
            0 => MetaDataValue::Integer(record.raw_value as i32),
            1 => MetaDataValue::Float(f32::from_bits(record.raw_value)),
            _ => MetaDataValue::Text(strings::read_string(reader, record.raw_value)?),
        };
        entries.push(MetaDataEntry { name, value });
    }

    Ok(entries)
}

/// Shared model header prefix.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct ModelHeaderPrefix {
    _flags: u8,
    _skeleton_scaling_mode: u8,
    _silhouette_material_entries: u16,
    world_transform: BchMatrix43,
}

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct ModelHeaderLegacy {
    materials_table_offset: u32,
    materials_table_entries: u32,
    _materials_name_offset: u32,
    vertices_table_offset: u32,
    vertices_table_entries: u32,
    skeleton_offset: u32,
    skeleton_entries: u32,
    objects_node_visibility_offset: u32,
    objects_node_count: u32,
    model_name_offset: u32,
    objects_node_name_entries: u32,
    objects_node_name_offset: u32,
    _bounding_box_and_measures_offset: u32,
}

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct ModelHeaderExtended {
    materials_table_offset: u32,
    materials_table_entries: u32,
    _materials_name_offset: u32,
    vertices_table_offset: u32,
    vertices_table_entries: u32,
    _reserved: [u8; 0x28],
    skeleton_offset: u32,
    skeleton_entries: u32,
    objects_node_visibility_offset: u32,
    objects_node_count: u32,
    model_name_offset: u32,
    objects_node_name_entries: u32,
    objects_node_name_offset: u32,
    _bounding_box_and_measures_offset: u32,
    meta_data_offset: u32,
}

/// The two on-disk model header layouts, chosen once at parse time from the
/// compatibility byte.
enum ModelHeader {
    Legacy(ModelHeaderLegacy),
    Extended(ModelHeaderExtended),
}

/// Compatibility byte from which the extended model header layout applies.
const EXTENDED_MODEL_HEADER_COMPATIBILITY: u8 = 0x21;

impl ModelHeader {
    fn read<R: Read + Seek>(reader: &mut R, compatibility: u8) -> BinResult<ModelHeader> {
        if compatibility >= EXTENDED_MODEL_HEADER_COMPATIBILITY {
            Ok(ModelHeader::Extended(ModelHeaderExtended::read(reader)?))
        } else {
            Ok(ModelHeader::Legacy(ModelHeaderLegacy::read(reader)?))
        }
    }

    fn materials_table(&self) -> (u32, u32) {
        match self {
            ModelHeader::Legacy(h) => (h.materials_table_offset, h.materials_table_entries),
            ModelHeader::Extended(h) => (h.materials_table_offset, h.materials_table_entries),
        }
    }

    fn vertices_table(&self) -> (u32, u32) {
        match self {
            ModelHeader::Legacy(h) => (h.vertices_table_offset, h.vertices_table_entries),
            ModelHeader::Extended(h) => (h.vertices_table_offset, h.vertices_table_entries),
        }
    }

    fn skeleton(&self) -> (u32, u32) {
        match self {
            ModelHeader::Legacy(h) => (h.skeleton_offset, h.skeleton_entries),
            ModelHeader::Extended(h) => (h.skeleton_offset, h.skeleton_entries),
        }
    }

    fn visibility(&self) -> (u32, u32) {
        match self {
            ModelHeader::Legacy(h) => (h.objects_node_visibility_offset, h.objects_node_count),
            ModelHeader::Extended(h) => (h.objects_node_visibility_offset, h.objects_node_count),
        }
    }

    fn name_offset(&self) -> u32 {
        match self {
            ModelHeader::Legacy(h) => h.model_name_offset,
            ModelHeader::Extended(h) => h.model_name_offset,
        }
    }

    fn node_names(&self) -> (u32, u32) {
        match self {
            ModelHeader::Legacy(h) => (h.objects_node_name_offset, h.objects_node_name_entries),
            ModelHeader::Extended(h) => (h.objects_node_name_offset, h.objects_node_name_entries),
        }
    }

    fn metadata_offset(&self) -> u32 {
        match self {
            ModelHeader::Legacy(_) => 0,
            ModelHeader::Extended(h) => h.meta_data_offset,
        }
    }
}

fn read_visibility_bits<R: Read + Seek>(reader: &mut R, offset: u32, node_count: u32) -> Result<Vec<bool>> {
    if offset == 0 || node_count == 0 {
        return Ok(vec![true; node_count as usize]);
    }

    reader
        .seek(SeekFrom::Start(offset as u64))
        .with_context(|| format!("seek to node visibility bits at {offset:#x}"))?;

    let word_count = node_count.div_ceil(32);
    let mut words = Vec::with_capacity(word_count as usize);
    for word in 0..word_count {
        words.push(u32::read_le(reader).with_context(|| format!("visibility word {word}"))?);
    }

    Ok((0..node_count)
        .map(|node| (words[(node / 32) as usize] >> (node % 32)) & 1 != 0)
        .collect())
}

pub(crate) fn read_model<R: Read + Seek>(reader: &mut R, compatibility: u8, address: u32) -> Result<Model> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to model header at {address:#x}"))?;

    let prefix = ModelHeaderPrefix::read(reader).context("model header prefix")?;
    let header = ModelHeader::read(reader, compatibility).context("model header")?;

    let name = strings::read_string(reader, header.name_offset())?;
    let (node_name_offset, node_name_entries) = header.node_names();
    let node_names = strings::read_node_names(reader, node_name_offset, node_name_entries)
        .with_context(|| format!("node name table of model \"{name}\""))?;

    let (visibility_offset, node_count) = header.visibility();
    let visibility = read_visibility_bits(reader, visibility_offset, node_count)
        .with_context(|| format!("node visibility of model \"{name}\""))?;

    let (skeleton_offset, skeleton_entries) = header.skeleton();
    let bones = if skeleton_offset != 0 && skeleton_entries > 0 {
        skeleton::read_skeleton(reader, skeleton_offset, skeleton_entries)
            .with_context(|| format!("skeleton of model \"{name}\""))?
    } else {
        vec![]
    };

    let (materials_offset, material_entries) = header.materials_table();
    let stride = material::material_stride(compatibility);
    let mut materials = Vec::with_capacity(material_entries as usize);
    for index in 0..material_entries {
        materials.push(
            material::read_material(reader, compatibility, materials_offset + index * stride)
                .with_context(|| format!("material {index} of model \"{name}\""))?,
        );
    }

    let (vertices_offset, mesh_entries) = header.vertices_table();
    let mut bounds = mesh::BoundsAccumulator::default();
    let mut meshes = Vec::with_capacity(mesh_entries as usize);
    for index in 0..mesh_entries {
        reader
            .seek(SeekFrom::Start(
                (vertices_offset + index * mesh::MESH_DESCRIPTOR_SIZE) as u64,
            ))
            .with_context(|| format!("seek to mesh descriptor {index}"))?;
        let descriptor = mesh::MeshDescriptor::read(reader)
            .with_context(|| format!("mesh descriptor {index} of model \"{name}\""))?;
        let visible = visibility
            .get(descriptor.node_id as usize)
            .copied()
            .unwrap_or(true);
        meshes.push(
            mesh::read_mesh(reader, &descriptor, &bones, visible, &mut bounds)
                .with_context(|| format!("mesh {index} of model \"{name}\""))?,
        );
    }

    let metadata = if header.metadata_offset() != 0 {
        read_metadata(reader, header.metadata_offset())
            .with_context(|| format!("metadata of model \"{name}\""))?
    } else {
        vec![]
    };

    let (min_vector, max_vector) = bounds.finish();

    Ok(Model {
        name,
        transform: prefix.world_transform,
        materials,
        skeleton: bones,
        meshes,
        node_names,
        min_vector,
        max_vector,
        metadata,
    })
}
