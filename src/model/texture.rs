//! Texture section entries. Only the metadata the renderer needs to locate
//! pixel data is decoded here — address, dimensions and format tag from the
//! texture-unit command stream. Pixel de-swizzling is someone else's job.

use std::io::{Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use binrw::BinRead;
use serde::{Deserialize, Serialize};

use crate::bch::strings;
use crate::pica::commands::CommandStreamReader;
use crate::pica::TextureFormat;

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct TextureRecord {
    commands_offset: u32,
    commands_words: u32,
    name_offset: u32,
    mipmap_levels: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureEntry {
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub format: TextureFormat,
    /// Absolute address of the swizzled pixel data after relocation.
    pub data_address: u32,
    pub mipmap_levels: u32,
}

pub(crate) fn read_texture<R: Read + Seek>(reader: &mut R, address: u32) -> Result<TextureEntry> {
    reader
        .seek(SeekFrom::Start(address as u64))
        .with_context(|| format!("seek to texture entry at {address:#x}"))?;
    let record = TextureRecord::read(reader).context("texture entry record")?;
    let name = strings::read_string(reader, record.name_offset)?;

    let commands = CommandStreamReader::new(reader, record.commands_offset, record.commands_words)
        .with_context(|| format!("texture unit commands of texture \"{name}\""))?;
    let unit = commands.texture_unit(0);

    Ok(TextureEntry {
        name,
        width: unit.width,
        height: unit.height,
        format: unit.format,
        data_address: unit.address,
        mipmap_levels: record.mipmap_levels,
    })
}
