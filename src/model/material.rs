//! Material decoding. A material is a fixed-size parameter block whose
//! stride depends on the compatibility byte: older converters (< 0x21)
//! inline a reduced texture-coordinator table in the 0x58-byte block, newer
//! ones shrink the block to 0x2c bytes and move the full coordinators into
//! a separate parameter record next to the colors. Raster, combiner and
//! sampler state all come out of GPU command streams.

use std::io::{Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use binrw::BinRead;
use serde::{Deserialize, Serialize};

use crate::bch::strings;
use crate::math::BchColorF;
use crate::pica::commands::{
    AlphaTest, BlendState, CommandStreamReader, DepthTest, LutSampler, StencilTest, TevStage,
};
use crate::pica::{CullMode, LogicalOperation, TextureFilter, TextureWrap};

pub(crate) const MATERIAL_STRIDE_LEGACY: u32 = 0x58;
pub(crate) const MATERIAL_STRIDE_COMPACT: u32 = 0x2c;

/// Compatibility byte from which materials use the compact block.
pub(crate) const COMPACT_MATERIALS_COMPATIBILITY: u8 = 0x21;

const FRAGMENT_LIGHTING_BLOCK_WORDS: u32 = 6;

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct MaterialRecordHead {
    material_flags: u32,
    texture_coords_config: u32,
    material_name_offset: u32,
    texture0_name_offset: u32,
    texture1_name_offset: u32,
    texture2_name_offset: u32,
}

/// Trailing offsets shared by both block layouts: parameter/color records
/// and the three command regions. The word-count field packs the fragment
/// shader words in its low half and the texture mapper words in its high
/// half.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct MaterialRecordTail {
    params_offset: u32,
    texture_mappers_commands_offset: u32,
    fragment_lighting_commands_offset: u32,
    fragment_shader_commands_offset: u32,
    commands_word_counts: u32,
}

/// Reduced coordinator as inlined by the legacy block: no rotation or
/// translation yet.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct LegacyCoordinatorRecord {
    config: u32,
    scale_u: f32,
    scale_v: f32,
}

/// Full coordinator record used from compatibility 0x21 on.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct CoordinatorRecord {
    config: u32,
    scale_u: f32,
    scale_v: f32,
    rotate: f32,
    translate_u: f32,
    translate_v: f32,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureMappingMethod {
    #[default]
    UvCoordinateMap,
    CameraCubeEnvMap,
    CameraSphereEnvMap,
    ProjectionMap,
    ShadowMap,
}

impl TextureMappingMethod {
    fn from_raw(value: u32) -> TextureMappingMethod {
        match value {
            1 => TextureMappingMethod::CameraCubeEnvMap,
            2 => TextureMappingMethod::CameraSphereEnvMap,
            3 => TextureMappingMethod::ProjectionMap,
            4 => TextureMappingMethod::ShadowMap,
            _ => TextureMappingMethod::UvCoordinateMap,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TextureCoordinator {
    pub source_coordinate_index: u8,
    pub mapping_method: TextureMappingMethod,
    pub reference_camera_index: u8,
    pub scale_u: f32,
    pub scale_v: f32,
    pub rotate: f32,
    pub translate_u: f32,
    pub translate_v: f32,
}

impl TextureCoordinator {
    fn from_config(config: u32) -> TextureCoordinator {
        TextureCoordinator {
            source_coordinate_index: (config & 0xff) as u8,
            mapping_method: TextureMappingMethod::from_raw((config >> 8) & 0xff),
            reference_camera_index: ((config >> 16) & 0xff) as u8,
            scale_u: 1.0,
            scale_v: 1.0,
            ..Default::default()
        }
    }
}

/// Per-unit sampler state pulled from the texture mapper command stream.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TextureMapper {
    pub enabled: bool,
    pub wrap_u: TextureWrap,
    pub wrap_v: TextureWrap,
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
    pub border_color: BchColorF,
}

#[derive(Debug, Default, Clone, BinRead, Serialize, Deserialize)]
#[br(little)]
pub struct MaterialColors {
    pub emission: BchColorF,
    pub ambient: BchColorF,
    pub diffuse: BchColorF,
    pub specular0: BchColorF,
    pub specular1: BchColorF,
    pub constant0: BchColorF,
    pub constant1: BchColorF,
    pub constant2: BchColorF,
    pub constant3: BchColorF,
    pub constant4: BchColorF,
    pub constant5: BchColorF,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterialLightingFlags {
    pub fragment_lighting: bool,
    pub vertex_lighting: bool,
    pub hemisphere_lighting: bool,
    pub hemisphere_occlusion: bool,
    pub fresnel: bool,
    pub bump_renormalize: bool,
}

impl MaterialLightingFlags {
    fn from_raw(value: u32) -> MaterialLightingFlags {
        MaterialLightingFlags {
            fragment_lighting: value & 0x01 != 0,
            vertex_lighting: value & 0x02 != 0,
            hemisphere_lighting: value & 0x04 != 0,
            hemisphere_occlusion: value & 0x08 != 0,
            fresnel: value & 0x10 != 0,
            bump_renormalize: value & 0x20 != 0,
        }
    }
}

/// Fragment-lighting LUT sampler bindings: distribution 0/1 and fresnel.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FragmentLightingSamplers {
    pub distribution0: LutSampler,
    pub distribution1: LutSampler,
    pub fresnel: LutSampler,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub lighting_flags: MaterialLightingFlags,
    pub active_coordinators: u8,
    pub coordinators: [TextureCoordinator; 3],
    pub texture_names: [String; 3],
    pub mappers: [TextureMapper; 3],
    pub colors: MaterialColors,
    pub combiner_stages: Vec<TevStage>,
    pub combiner_buffer_color: BchColorF,
    pub blend: BlendState,
    pub logical_operation: LogicalOperation,
    pub alpha_test: AlphaTest,
    pub stencil_test: StencilTest,
    pub depth_test: DepthTest,
    pub cull_mode: CullMode,
    pub lut_samplers: FragmentLightingSamplers,
}

pub(crate) fn read_material<R: Read + Seek>(reader: &mut R, compatibility: u8, address: u32) -> Result<Material> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to material block at {address:#x}"))?;

    let head = MaterialRecordHead::read(reader).context("material block head")?;

    let mut coordinators: [TextureCoordinator; 3] = Default::default();
    let compact = compatibility >= COMPACT_MATERIALS_COMPATIBILITY;

    if !compact {
        // Legacy layout inlines the reduced coordinators before the tail,
        // followed by two reserved words after it.
        for coordinator in coordinators.iter_mut() {
            let record = LegacyCoordinatorRecord::read(reader).context("inline texture coordinator")?;
            *coordinator = TextureCoordinator {
                scale_u: record.scale_u,
                scale_v: record.scale_v,
                ..TextureCoordinator::from_config(record.config)
            };
        }
    }

    let tail = MaterialRecordTail::read(reader).context("material block tail")?;
    let name = strings::read_string(reader, head.material_name_offset)?;
    let texture_names = [
        strings::read_string(reader, head.texture0_name_offset)?,
        strings::read_string(reader, head.texture1_name_offset)?,
        strings::read_string(reader, head.texture2_name_offset)?,
    ];

    // Parameter record: compact files store the full coordinators here,
    // immediately followed by the colors; legacy files store the colors
    // alone.
    let colors = if tail.params_offset != 0 {
        reader
            .seek(SeekFrom::Start(tail.params_offset as u64))
            .with_context(|| format!("seek to material parameters of \"{name}\""))?;
        if compact {
            for coordinator in coordinators.iter_mut() {
                let record = CoordinatorRecord::read(reader)
                    .with_context(|| format!("texture coordinator of material \"{name}\""))?;
                *coordinator = TextureCoordinator {
                    scale_u: record.scale_u,
                    scale_v: record.scale_v,
                    rotate: record.rotate,
                    translate_u: record.translate_u,
                    translate_v: record.translate_v,
                    ..TextureCoordinator::from_config(record.config)
                };
            }
        }
        MaterialColors::read(reader).with_context(|| format!("colors of material \"{name}\""))?
    } else {
        MaterialColors::default()
    };

    let fragment_words = tail.commands_word_counts & 0xffff;
    let mapper_words = tail.commands_word_counts >> 16;

    let mut mappers: [TextureMapper; 3] = Default::default();
    if tail.texture_mappers_commands_offset != 0 && mapper_words > 0 {
        let commands =
            CommandStreamReader::new(reader, tail.texture_mappers_commands_offset, mapper_words)
                .with_context(|| format!("texture mapper commands of material \"{name}\""))?;
        let enabled = commands.texture_units_enabled();
        for (unit, mapper) in mappers.iter_mut().enumerate() {
            let state = commands.texture_unit(unit);
            *mapper = TextureMapper {
                enabled: enabled[unit],
                wrap_u: state.wrap_u,
                wrap_v: state.wrap_v,
                mag_filter: state.mag_filter,
                min_filter: state.min_filter,
                border_color: state.border_color,
            };
        }
    }

    let mut lut_samplers = FragmentLightingSamplers::default();
    if tail.fragment_lighting_commands_offset != 0 {
        let commands = CommandStreamReader::new_unaligned(
            reader,
            tail.fragment_lighting_commands_offset,
            FRAGMENT_LIGHTING_BLOCK_WORDS,
        )
        .with_context(|| format!("fragment lighting sampler block of material \"{name}\""))?;
        lut_samplers = FragmentLightingSamplers {
            distribution0: commands.lut_sampler(0),
            distribution1: commands.lut_sampler(1),
            fresnel: commands.lut_sampler(2),
        };
    }

    let mut material = Material {
        name,
        lighting_flags: MaterialLightingFlags::from_raw(head.material_flags),
        active_coordinators: (head.texture_coords_config & 3) as u8,
        coordinators,
        texture_names,
        mappers,
        colors,
        combiner_stages: vec![TevStage::default(); 6],
        lut_samplers,
        ..Default::default()
    };

    if tail.fragment_shader_commands_offset != 0 && fragment_words > 0 {
        let commands = CommandStreamReader::new(
            reader,
            tail.fragment_shader_commands_offset,
            fragment_words,
        )
        .with_context(|| format!("fragment shader commands of material \"{}\"", material.name))?;

        for stage in 0..6 {
            material.combiner_stages[stage] = commands.combiner_stage(stage);
        }
        material.combiner_buffer_color = commands.combiner_buffer_color();
        material.blend = commands.blend();
        material.logical_operation = commands.logical_operation();
        material.alpha_test = commands.alpha_test();
        material.stencil_test = commands.stencil_test();
        material.depth_test = commands.depth_test();
        material.cull_mode = commands.cull_mode();
    }

    Ok(material)
}

pub(crate) fn material_stride(compatibility: u8) -> u32 {
    if compatibility >= COMPACT_MATERIALS_COMPATIBILITY {
        MATERIAL_STRIDE_COMPACT
    } else {
        MATERIAL_STRIDE_LEGACY
    }
}
