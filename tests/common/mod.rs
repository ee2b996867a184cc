//! Synthetic container assembly for the integration suites. Builds a
//! complete single-model BCH file in memory: header, content table, string
//! table, skeleton, material block, vertex/index data and the GPU command
//! regions describing them.

use std::io::Cursor;

use binrw::BinWrite;

use bch_tools::bch::BchHeader;

// Register ids mirrored from the library's catalog.
const ATTRIBUTES_FORMAT_LOW: u16 = 0x0201;
const ATTRIBUTES_FORMAT_HIGH: u16 = 0x0202;
const ATTRIBUTES_BUFFER0_ADDRESS: u16 = 0x0203;
const INDEX_BUFFER_CONFIG: u16 = 0x0227;
const VERTEX_COUNT: u16 = 0x0228;
const VSH_FLOAT_UNIFORM_CONFIG: u16 = 0x02c0;
const VSH_FLOAT_UNIFORM_DATA: u16 = 0x02c1;

#[derive(Default)]
pub struct Arena {
    pub bytes: Vec<u8>,
}

impl Arena {
    pub fn pos(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn skip(&mut self, count: usize) {
        self.bytes.extend(std::iter::repeat(0u8).take(count));
    }

    pub fn align(&mut self, to: usize) {
        while self.bytes.len() % to != 0 {
            self.bytes.push(0);
        }
    }

    pub fn push_u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    pub fn push_u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_i32(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_f32(&mut self, v: f32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_cstr(&mut self, s: &str) -> u32 {
        let offset = self.pos();
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        offset
    }

    pub fn patch_u32(&mut self, offset: u32, v: u32) {
        let offset = offset as usize;
        self.bytes[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// One command pair writing `value` to `id` with a full mask.
    pub fn push_command(&mut self, id: u16, value: u32) {
        self.push_u32(value);
        self.push_u32(id as u32 | 0x000f_0000);
    }
}

pub struct BoneSpec {
    pub parent: i32,
    pub scale: [f32; 3],
    pub translation: [f32; 3],
}

impl BoneSpec {
    pub fn root() -> BoneSpec {
        BoneSpec { parent: -1, scale: [1.0, 1.0, 1.0], translation: [0.0, 0.0, 0.0] }
    }
}

/// Per-vertex skinning attributes: local bone indices and float weights.
pub struct VertexSkin {
    pub indices: Vec<u8>,
    pub weights: Vec<f32>,
}

pub struct MeshSpec {
    pub positions: Vec<[i8; 3]>,
    pub indices: Vec<u16>,
    pub indices_16bit: bool,
    /// 0 none, 1 rigid, 2 smooth.
    pub skinning: u16,
    pub node_list: Vec<u16>,
    /// When set, every vertex carries bone index/weight attributes with this
    /// many influences.
    pub skin: Option<Vec<VertexSkin>>,
    /// Emitted as float uniform 6 (xyz) when set.
    pub position_offset: Option<[f32; 3]>,
    /// Emitted as float uniform 7 slot 0 when set.
    pub position_scale: Option<f32>,
}

impl MeshSpec {
    pub fn positions_only(positions: Vec<[i8; 3]>, indices: Vec<u16>) -> MeshSpec {
        MeshSpec {
            positions,
            indices,
            indices_16bit: false,
            skinning: 0,
            node_list: vec![],
            skin: None,
            position_offset: None,
            position_scale: None,
        }
    }
}

fn header_size(compat: u8) -> usize {
    // magic + version word + 14 u32 fields + flags/address pair
    let mut size = 4 + 4 + 14 * 4 + 4;
    if compat <= 0x20 {
        size -= 8;
    }
    if compat <= 7 {
        size -= 4;
    }
    size
}

/// Assemble a complete one-model container. All stored offsets are absolute
/// except where a relocation entry is emitted (the 16-bit index tag).
pub fn build_container(compat: u8, bones: &[BoneSpec], mesh: &MeshSpec) -> Vec<u8> {
    let mut a = Arena::default();
    a.skip(header_size(compat));

    let content_table = a.pos();
    a.skip(16 * 12);

    let model_ptr_table = a.pos();
    a.skip(4);

    // strings
    let model_name = a.push_cstr("model");
    let material_name = a.push_cstr("mat0");
    let bone_names: Vec<u32> = (0..bones.len())
        .map(|i| a.push_cstr(&format!("bone{i}")))
        .collect();
    a.align(4);

    // skeleton records, 0x34 bytes each
    let skeleton_offset = if bones.is_empty() { 0 } else { a.pos() };
    for (i, bone) in bones.iter().enumerate() {
        a.push_u32(bone_names[i]);
        a.push_u32(0); // flags
        a.push_i32(bone.parent);
        for v in bone.scale {
            a.push_f32(v);
        }
        for _ in 0..3 {
            a.push_f32(0.0); // rotation
        }
        for v in bone.translation {
            a.push_f32(v);
        }
        a.push_u32(0); // metadata
    }

    // material block
    let material_offset = a.pos();
    a.push_u32(0); // lighting flags
    a.push_u32(0); // coords config
    a.push_u32(material_name);
    for _ in 0..3 {
        a.push_u32(0); // texture name offsets
    }
    if compat < 0x21 {
        a.skip(3 * 12); // inline legacy coordinators
    }
    a.skip(5 * 4); // tail: params/mappers/lighting/fragment/counts, all empty
    if compat < 0x21 {
        a.skip(8); // reserved words closing the 0x58 block
    }

    // vertex buffer
    a.align(4);
    let vertex_data = a.pos();
    let skin_influences = mesh.skin.as_ref().map(|s| s[0].indices.len()).unwrap_or(0);
    for (i, position) in mesh.positions.iter().enumerate() {
        for c in position {
            a.push_u8(*c as u8);
        }
        if let Some(skins) = &mesh.skin {
            let skin = &skins[i];
            for index in &skin.indices {
                a.push_u8(*index);
            }
            for weight in &skin.weights {
                a.push_f32(*weight);
            }
        }
    }

    // index buffer
    a.align(4);
    let index_data = a.pos();
    for index in &mesh.indices {
        if mesh.indices_16bit {
            a.push_u16(*index);
        } else {
            a.push_u8(*index as u8);
        }
    }

    // vertex attribute commands
    a.align(4);
    let attr_commands = a.pos();
    let (permutation, format_low, format_high, stride, attr_count) = if mesh.skin.is_some() {
        // position, boneIndex, boneWeight
        let stride = 3 + skin_influences as u32 + skin_influences as u32 * 4;
        let fmt_index = 0x1 | ((skin_influences as u32 - 1) << 2); // unsigned byte
        let fmt_weight = 0x3 | ((skin_influences as u32 - 1) << 2); // float
        (
            0x870u32,
            0x8u32 | (fmt_index << 28),
            fmt_weight | (2 << 28),
            stride,
            3u32,
        )
    } else {
        // position only: signed byte x3
        (0x0u32, 0x8u32, 0, 3, 1u32)
    };
    a.push_command(ATTRIBUTES_BUFFER0_ADDRESS, vertex_data);
    a.push_command(ATTRIBUTES_BUFFER0_ADDRESS + 1, permutation);
    a.push_command(ATTRIBUTES_BUFFER0_ADDRESS + 2, (stride << 16) | (attr_count << 28));
    a.push_command(ATTRIBUTES_FORMAT_LOW, format_low);
    a.push_command(ATTRIBUTES_FORMAT_HIGH, format_high);
    if let Some(offset) = mesh.position_offset {
        a.push_command(VSH_FLOAT_UNIFORM_CONFIG, 6);
        a.push_command(VSH_FLOAT_UNIFORM_DATA, offset[0].to_bits());
        a.push_command(VSH_FLOAT_UNIFORM_DATA, offset[1].to_bits());
        a.push_command(VSH_FLOAT_UNIFORM_DATA, offset[2].to_bits());
        a.push_command(VSH_FLOAT_UNIFORM_DATA, 0f32.to_bits());
    }
    if let Some(scale) = mesh.position_scale {
        a.push_command(VSH_FLOAT_UNIFORM_CONFIG, 7);
        a.push_command(VSH_FLOAT_UNIFORM_DATA, scale.to_bits());
    }
    let attr_words = (a.pos() - attr_commands) / 4;

    // face commands: the index buffer config parameter word comes first in
    // its pair, which is what the relocation entry must point at.
    let face_commands = a.pos();
    a.push_command(INDEX_BUFFER_CONFIG, index_data);
    a.push_command(VERTEX_COUNT, mesh.indices.len() as u32);
    let face_words = (a.pos() - face_commands) / 4;

    // face header
    let faces_offset = a.pos();
    a.push_u16(mesh.skinning);
    a.push_u16(mesh.node_list.len() as u16);
    for slot in 0..20 {
        a.push_u16(mesh.node_list.get(slot).copied().unwrap_or(0));
    }
    a.push_u32(face_commands);
    a.push_u32(face_words);

    // mesh descriptor
    let mesh_descriptor = a.pos();
    a.push_u16(0); // material id
    a.push_u16(0); // flags
    a.push_u16(0); // node id
    a.push_u16(0); // render priority
    a.push_u32(attr_commands);
    a.push_u32(attr_words);
    a.push_u32(faces_offset);
    a.push_u32(1);
    a.push_u32(0); // extra commands
    a.push_u32(0);
    a.push_u32(0); // bounding box

    // model header
    let model_header = a.pos();
    a.push_u8(0); // flags
    a.push_u8(0); // skeleton scaling mode
    a.push_u16(0); // silhouette materials
    for row in [
        [1.0f32, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ] {
        for v in row {
            a.push_f32(v);
        }
    }
    a.push_u32(material_offset);
    a.push_u32(1);
    a.push_u32(0); // materials name table
    a.push_u32(mesh_descriptor);
    a.push_u32(1);
    if compat > 0x20 {
        a.skip(0x28);
    }
    a.push_u32(skeleton_offset);
    a.push_u32(bones.len() as u32);
    a.push_u32(0); // visibility bits
    a.push_u32(1); // node count
    a.push_u32(model_name);
    a.push_u32(0); // node name entries
    a.push_u32(0); // node name table
    a.push_u32(0); // bounding box and measures
    if compat > 0x20 {
        a.push_u32(0); // metadata
    }

    a.patch_u32(model_ptr_table, model_header);

    // relocation table: only the 16-bit index tag needs an entry
    a.align(4);
    let reloc_offset = a.pos();
    let mut reloc_len = 0u32;
    if mesh.indices_16bit {
        let flag: u32 = match compat {
            0..=5 => 0x26,
            6..=7 => 0x27,
            8..=0x20 => 0x28,
            _ => 0x27,
        };
        a.push_u32((flag << 25) | (face_commands / 4));
        reloc_len = 4;
    }

    // content table: slot 0 is models, the rest stay empty
    let mut patch = content_table;
    a.patch_u32(patch, model_ptr_table);
    patch += 4;
    a.patch_u32(patch, 1);

    // file header, gpu commands and data bases at zero so relocation
    // arithmetic works on absolute offsets
    let header = BchHeader {
        backward_compatibility: compat,
        forward_compatibility: compat,
        version: 0,
        main_header_offset: content_table,
        string_table_offset: 0,
        gpu_commands_offset: 0,
        data_offset: 0,
        data_ext_offset: 0,
        relocation_table_offset: reloc_offset,
        main_header_length: 16 * 12,
        string_table_length: 0,
        gpu_commands_length: 0,
        data_length: 0,
        data_ext_length: 0,
        relocation_table_length: reloc_len,
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
