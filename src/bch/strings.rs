//! String reads. Names are null-terminated and reached through offsets that
//! are absolute after relocation. Node name tables are stored as a Patricia
//! trie; only the leaf string offsets matter for reconstruction, so the trie
//! is walked linearly in node order and the topology is ignored.

use std::io::{Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use binrw::BinRead;

/// Read a null-terminated string at an absolute offset. A zero offset is the
/// format's "no name" convention and yields an empty string.
pub fn read_string<R: Read + Seek>(reader: &mut R, offset: u32) -> Result<String> {
    if offset == 0 {
        return Ok(String::new());
    }

    reader
        .seek(SeekFrom::Start(offset as u64))
        .with_context(|| format!("seek to string at {offset:#x}"))?;

    let mut bytes = vec![];
    loop {
        let b = u8::read_le(reader).with_context(|| format!("string at {offset:#x} is unterminated"))?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }

    Ok(String::from_utf8_lossy(&bytes).to_string())
}

/// One Patricia-trie node: a reference bit index, child links and the name
/// offset. 12 bytes on disk.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct TrieNode {
    _reference_bit: u32,
    _left_node: u16,
    _right_node: u16,
    name_offset: u32,
}

/// Enumerate the names of a node-name trie in node order. The root node (the
/// first entry) carries no name and is skipped.
pub fn read_node_names<R: Read + Seek>(reader: &mut R, offset: u32, entries: u32) -> Result<Vec<String>> {
    if offset == 0 || entries == 0 {
        return Ok(vec![]);
    }

    let mut name_offsets = Vec::with_capacity(entries as usize);
    reader
        .seek(SeekFrom::Start(offset as u64))
        .with_context(|| format!("seek to node name table at {offset:#x}"))?;

    for index in 0..=entries {
        let node = TrieNode::read(reader)
            .with_context(|| format!("node name table entry {index} at {offset:#x}"))?;
        if index > 0 {
            name_offsets.push(node.name_offset);
        }
    }

    let mut names = Vec::with_capacity(name_offsets.len());
    for name_offset in name_offsets {
        names.push(read_string(reader, name_offset)?);
    }

    Ok(names)
}
