//! The BCH container. A load runs in three steps: read the file header,
//! hand the buffer to the relocation pass (which consumes it and returns
//! the patched bytes), then walk the content table's pointer tables and
//! decode each entity kind. All offsets below the header are absolute once
//! relocation has run.

pub mod relocation;
pub mod strings;

use std::io::{Cursor, Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use binrw::{binrw, BinRead};

use crate::animation;
use crate::model::{self, ModelGroup};
use crate::scene;

pub const BCH_MAGIC: [u8; 4] = *b"BCH\0";

/// File header. The extended-data section pair only exists above
/// compatibility 0x20, and the trailing flags/address words only from
/// compatibility 8 on.
#[binrw]
#[derive(Debug, Clone)]
#[br(little, magic = b"BCH\0")]
#[bw(little, magic = b"BCH\0")]
pub struct BchHeader {
    pub backward_compatibility: u8,
    pub forward_compatibility: u8,
    pub version: u16,

    pub main_header_offset: u32,
    pub string_table_offset: u32,
    pub gpu_commands_offset: u32,
    pub data_offset: u32,

    #[br(if(backward_compatibility > 0x20))]
    #[bw(if(*backward_compatibility > 0x20))]
    pub data_ext_offset: u32,

    pub relocation_table_offset: u32,

    pub main_header_length: u32,
    pub string_table_length: u32,
    pub gpu_commands_length: u32,
    pub data_length: u32,

    #[br(if(backward_compatibility > 0x20))]
    #[bw(if(*backward_compatibility > 0x20))]
    pub data_ext_length: u32,

    pub relocation_table_length: u32,

    pub uninit_data_length: u32,
    pub uninit_description_length: u32,

    #[br(if(backward_compatibility > 7))]
    #[bw(if(*backward_compatibility > 7))]
    pub flags: u16,

    #[br(if(backward_compatibility > 7))]
    #[bw(if(*backward_compatibility > 7))]
    pub address_count: u16,
}

/// One content-table slot: where an entity kind's pointer table lives, how
/// many entries it has, and where its name table sits.
#[binrw]
#[derive(Debug, Default, Clone)]
#[br(little)]
pub struct PointerTableEntry {
    pub offset: u32,
    pub entries: u32,
    pub name_table_offset: u32,
}

/// The container's content table: one pointer-table slot per entity kind,
/// in fixed order.
#[binrw]
#[derive(Debug, Default, Clone)]
#[br(little)]
pub struct ContentTable {
    pub models: PointerTableEntry,
    pub materials: PointerTableEntry,
    pub shaders: PointerTableEntry,
    pub textures: PointerTableEntry,
    pub material_luts: PointerTableEntry,
    pub lights: PointerTableEntry,
    pub cameras: PointerTableEntry,
    pub fogs: PointerTableEntry,
    pub skeletal_animations: PointerTableEntry,
    pub material_animations: PointerTableEntry,
    pub visibility_animations: PointerTableEntry,
    pub light_animations: PointerTableEntry,
    pub camera_animations: PointerTableEntry,
    pub fog_animations: PointerTableEntry,
    pub scenes: PointerTableEntry,
    pub reserved: PointerTableEntry,
}

impl BchHeader {
    pub fn read_from(buffer: &[u8]) -> Result<BchHeader> {
        let mut cursor = Cursor::new(buffer);
        BchHeader::read(&mut cursor).context("BCH file header")
    }
}

/// Resolve a pointer table to the addresses of its entries. Each table slot
/// is one more indirection: `offset + index * 4` holds the entry's address.
fn walk_pointer_table<R: Read + Seek>(reader: &mut R, table: &PointerTableEntry, kind: &str) -> Result<Vec<u32>> {
    if table.offset == 0 || table.entries == 0 {
        return Ok(vec![]);
    }

    let mut addresses = Vec::with_capacity(table.entries as usize);
    for index in 0..table.entries {
        reader
            .seek(SeekFrom::Start((table.offset + index * 4) as u64))
            .with_context(|| format!("seek to {kind} pointer {index}"))?;
        addresses.push(u32::read_le(reader).with_context(|| format!("{kind} pointer {index}"))?);
    }
    Ok(addresses)
}

/// Decode a container into the output model graph. Takes the buffer by
/// value: the relocation pass patches it in place before any section is
/// read, and nothing else may alias it while that happens.
pub fn decode(buffer: Vec<u8>) -> Result<ModelGroup> {
    let header = BchHeader::read_from(&buffer)?;
    let buffer = relocation::relocate(buffer, &header).context("relocation pass")?;
    let compatibility = header.backward_compatibility;

    let mut reader = Cursor::new(buffer.as_slice());
    reader
        .seek(SeekFrom::Start(header.main_header_offset as u64))
        .context("seek to content table")?;
    let content = ContentTable::read(&mut reader).context("content table")?;

    let mut group = ModelGroup::default();

    for address in walk_pointer_table(&mut reader, &content.models, "model")? {
        group
            .models
            .push(model::read_model(&mut reader, compatibility, address)?);
    }

    for address in walk_pointer_table(&mut reader, &content.textures, "texture")? {
        group
            .textures
            .push(model::texture::read_texture(&mut reader, address)?);
    }

    for address in walk_pointer_table(&mut reader, &content.lights, "light")? {
        group.lights.push(scene::read_light(&mut reader, address)?);
    }

    for address in walk_pointer_table(&mut reader, &content.cameras, "camera")? {
        group.cameras.push(scene::read_camera(&mut reader, address)?);
    }

    for address in walk_pointer_table(&mut reader, &content.fogs, "fog")? {
        group.fogs.push(scene::read_fog(&mut reader, address)?);
    }

    for address in walk_pointer_table(&mut reader, &content.skeletal_animations, "skeletal animation")? {
        group
            .skeletal_animations
            .push(animation::read_skeletal_animation(&mut reader, address)?);
    }

    for address in walk_pointer_table(&mut reader, &content.material_animations, "material animation")? {
        group
            .material_animations
            .push(animation::read_parameter_animation(&mut reader, address, "material")?);
    }

    for address in walk_pointer_table(&mut reader, &content.visibility_animations, "visibility animation")? {
        group
            .visibility_animations
            .push(animation::read_visibility_animation(&mut reader, address)?);
    }

    for address in walk_pointer_table(&mut reader, &content.light_animations, "light animation")? {
        group
            .light_animations
            .push(animation::read_parameter_animation(&mut reader, address, "light")?);
    }

    for address in walk_pointer_table(&mut reader, &content.camera_animations, "camera animation")? {
        group
            .camera_animations
            .push(animation::read_parameter_animation(&mut reader, address, "camera")?);
    }

    for address in walk_pointer_table(&mut reader, &content.fog_animations, "fog animation")? {
        group
            .fog_animations
            .push(animation::read_parameter_animation(&mut reader, address, "fog")?);
    }

    for address in walk_pointer_table(&mut reader, &content.scenes, "scene")? {
        group.scenes.push(scene::read_scene(&mut reader, address)?);
    }

    Ok(group)
}
