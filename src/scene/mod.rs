//! Scene-level entities: lights, cameras, fogs and the scene records tying
//! them together by index. These are plain value objects; the animation
//! sections of the same names drive their parameters per frame.

use std::io::{Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use binrw::BinRead;
use serde::{Deserialize, Serialize};

use crate::bch::strings;
use crate::math::{BchColorF, BchVector3};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    #[default]
    Directional,
    Point,
    Spot,
    Ambient,
}

impl LightKind {
    fn from_raw(value: u32) -> LightKind {
        match value {
            1 => LightKind::Point,
            2 => LightKind::Spot,
            3 => LightKind::Ambient,
            _ => LightKind::Directional,
        }
    }
}

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct LightRecord {
    name_offset: u32,
    kind: u32,
    flags: u32,
    ambient: BchColorF,
    diffuse: BchColorF,
    specular0: BchColorF,
    specular1: BchColorF,
    position: BchVector3,
    direction: BchVector3,
    attenuation_start: f32,
    attenuation_end: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Light {
    pub name: String,
    pub kind: LightKind,
    pub enabled: bool,
    pub ambient: BchColorF,
    pub diffuse: BchColorF,
    pub specular0: BchColorF,
    pub specular1: BchColorF,
    pub position: BchVector3,
    pub direction: BchVector3,
    pub attenuation_start: f32,
    pub attenuation_end: f32,
}

pub(crate) fn read_light<R: Read + Seek>(reader: &mut R, address: u32) -> Result<Light> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to light at {address:#x}"))?;
    let record = LightRecord::read(reader).context("light record")?;
    let name = strings::read_string(reader, record.name_offset)?;

    Ok(Light {
        name,
        kind: LightKind::from_raw(record.kind),
        enabled: record.flags & 1 != 0,
        ambient: record.ambient,
        diffuse: record.diffuse,
        specular0: record.specular0,
        specular1: record.specular1,
        position: record.position,
        direction: record.direction,
        attenuation_start: record.attenuation_start,
        attenuation_end: record.attenuation_end,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CameraProjection {
    Perspective {
        field_of_view: f32,
        aspect_ratio: f32,
        z_near: f32,
        z_far: f32,
    },
    Orthographic {
        height: f32,
        z_near: f32,
        z_far: f32,
    },
}

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct CameraRecord {
    name_offset: u32,
    projection_kind: u32,
    position: BchVector3,
    target: BchVector3,
    up_rotation: f32,
    field_of_view_or_height: f32,
    aspect_ratio: f32,
    z_near: f32,
    z_far: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub name: String,
    pub position: BchVector3,
    pub target: BchVector3,
    /// Roll around the view axis, radians.
    pub up_rotation: f32,
    pub projection: CameraProjection,
}

pub(crate) fn read_camera<R: Read + Seek>(reader: &mut R, address: u32) -> Result<Camera> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to camera at {address:#x}"))?;
    let record = CameraRecord::read(reader).context("camera record")?;
    let name = strings::read_string(reader, record.name_offset)?;

    let projection = if record.projection_kind == 1 {
        CameraProjection::Orthographic {
            height: record.field_of_view_or_height,
            z_near: record.z_near,
            z_far: record.z_far,
        }
    } else {
        CameraProjection::Perspective {
            field_of_view: record.field_of_view_or_height,
            aspect_ratio: record.aspect_ratio,
            z_near: record.z_near,
            z_far: record.z_far,
        }
    };

    Ok(Camera {
        name,
        position: record.position,
        target: record.target,
        up_rotation: record.up_rotation,
        projection,
    })
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FogKind {
    #[default]
    Linear,
    Exponential,
    ExponentialSquared,
}

impl FogKind {
    fn from_raw(value: u32) -> FogKind {
        match value {
            1 => FogKind::Exponential,
            2 => FogKind::ExponentialSquared,
            _ => FogKind::Linear,
        }
    }
}

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct FogRecord {
    name_offset: u32,
    kind: u32,
    color: BchColorF,
    min_depth: f32,
    max_depth: f32,
    density: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fog {
    pub name: String,
    pub kind: FogKind,
    pub color: BchColorF,
    pub min_depth: f32,
    pub max_depth: f32,
    pub density: f32,
}

pub(crate) fn read_fog<R: Read + Seek>(reader: &mut R, address: u32) -> Result<Fog> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to fog at {address:#x}"))?;
    let record = FogRecord::read(reader).context("fog record")?;
    let name = strings::read_string(reader, record.name_offset)?;

    Ok(Fog {
        name,
        kind: FogKind::from_raw(record.kind),
        color: record.color,
        min_depth: record.min_depth,
        max_depth: record.max_depth,
        density: record.density,
    })
}

/// A by-index reference into one of the container's entity tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneReference {
    pub index: i32,
    pub name: String,
}

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct SceneRecord {
    name_offset: u32,
    model_table_offset: u32,
    model_entries: u32,
    light_table_offset: u32,
    light_entries: u32,
    camera_table_offset: u32,
    camera_entries: u32,
    fog_table_offset: u32,
    fog_entries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    pub models: Vec<SceneReference>,
    pub lights: Vec<SceneReference>,
    pub cameras: Vec<SceneReference>,
    pub fogs: Vec<SceneReference>,
}

fn read_references<R: Read + Seek>(reader: &mut R, offset: u32, entries: u32) -> Result<Vec<SceneReference>> {
    let mut references = Vec::with_capacity(entries as usize);
    for index in 0..entries {
        reader
            .seek(SeekFrom::Start((offset + index * 8) as u64))
            .with_context(|| format!("seek to scene reference {index}"))?;
        let target = i32::read_le(reader).with_context(|| format!("scene reference {index}"))?;
        let name_offset = u32::read_le(reader).with_context(|| format!("scene reference {index}"))?;
        references.push(SceneReference {
            index: target,
            name: strings::read_string(reader, name_offset)?,
        });
    }
    Ok(references)
}

pub(crate) fn read_scene<R: Read + Seek>(reader: &mut R, address: u32) -> Result<Scene> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to scene at {address:#x}"))?;
    let record = SceneRecord::read(reader).context("scene record")?;
    let name = strings::read_string(reader, record.name_offset)?;

    Ok(Scene {
        models: read_references(reader, record.model_table_offset, record.model_entries)?,
        lights: read_references(reader, record.light_table_offset, record.light_entries)?,
        cameras: read_references(reader, record.camera_table_offset, record.camera_entries)?,
        fogs: read_references(reader, record.fog_table_offset, record.fog_entries)?,
        name,
    })
}
