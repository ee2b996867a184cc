//! Reader for the GPU command word stream. Commands are (parameter, header)
//! word pairs that write a sparse register file; the asset formats use them
//! as a data-description language, so the stream is interpreted, never
//! executed. Decoded state is exposed through a fixed catalog of accessors —
//! the raw register file stays private.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use binrw::BinRead;
use serde::{Deserialize, Serialize};

use crate::math::BchColorF;

use super::*;

const REGISTER_COUNT: usize = 0x10000;

const TEV_STAGE_BASES: [u16; 6] = [
    TEX_ENV0_SOURCE,
    TEX_ENV1_SOURCE,
    TEX_ENV2_SOURCE,
    TEX_ENV3_SOURCE,
    TEX_ENV4_SOURCE,
    TEX_ENV5_SOURCE,
];

/// One texture combiner stage. Operands are the raw 4-bit selector fields;
/// their meaning differs between the RGB and alpha channels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TevStage {
    pub source_rgb: [CombineSource; 3],
    pub operand_rgb: [u8; 3],
    pub operator_rgb: CombineOperator,
    pub scale_rgb: u16,
    pub source_alpha: [CombineSource; 3],
    pub operand_alpha: [u8; 3],
    pub operator_alpha: CombineOperator,
    pub scale_alpha: u16,
    pub constant: BchColorF,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlendState {
    pub color_equation: BlendEquation,
    pub alpha_equation: BlendEquation,
    pub color_source: BlendFunction,
    pub color_destination: BlendFunction,
    pub alpha_source: BlendFunction,
    pub alpha_destination: BlendFunction,
    pub color: BchColorF,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlphaTest {
    pub enabled: bool,
    pub function: TestFunction,
    pub reference: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StencilTest {
    pub enabled: bool,
    pub function: TestFunction,
    pub reference: u8,
    pub input_mask: u8,
    pub fail_op: StencilOp,
    pub z_fail_op: StencilOp,
    pub z_pass_op: StencilOp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepthTest {
    pub enabled: bool,
    pub function: TestFunction,
    pub red_write: bool,
    pub green_write: bool,
    pub blue_write: bool,
    pub alpha_write: bool,
    pub depth_write: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextureUnitState {
    pub address: u32,
    pub width: u16,
    pub height: u16,
    pub format: TextureFormat,
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
    pub wrap_u: TextureWrap,
    pub wrap_v: TextureWrap,
    pub border_color: BchColorF,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LutSampler {
    pub is_absolute: bool,
    pub input: u8,
    pub scale: f32,
}

pub struct CommandStreamReader {
    registers: Vec<u32>,
    uniforms: HashMap<u32, Vec<f32>>,
    uniform_index: u32,
    lookup_tables: Vec<Vec<f32>>,
    lut_accum: Vec<f32>,
}

impl CommandStreamReader {
    /// Decode an 8-byte-aligned command region (the normal case).
    pub fn new<R: Read + Seek>(reader: &mut R, offset: u32, word_count: u32) -> Result<Self> {
        let mut this = Self::empty();
        this.run(reader, offset, word_count, true)?;
        Ok(this)
    }

    /// Decode a region without inter-group alignment padding. Used for the
    /// 6-word inline fragment-lighting-sampler block, which is not 8-byte
    /// aligned.
    pub fn new_unaligned<R: Read + Seek>(reader: &mut R, offset: u32, word_count: u32) -> Result<Self> {
        let mut this = Self::empty();
        this.run(reader, offset, word_count, false)?;
        Ok(this)
    }

    /// Feed a further command region into the same register file, e.g. the
    /// mesh object's extra vertex-attribute command buffer.
    pub fn append<R: Read + Seek>(&mut self, reader: &mut R, offset: u32, word_count: u32) -> Result<()> {
        self.run(reader, offset, word_count, true)
    }

    fn empty() -> Self {
        CommandStreamReader {
            registers: vec![0u32; REGISTER_COUNT],
            uniforms: HashMap::new(),
            uniform_index: 0,
            lookup_tables: vec![],
            lut_accum: vec![],
        }
    }

    fn run<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        offset: u32,
        word_count: u32,
        aligned: bool,
    ) -> Result<()> {
        reader
            .seek(SeekFrom::Start(offset as u64))
            .with_context(|| format!("seek to command region at {offset:#x}"))?;

        let mut words_left = word_count;
        while words_left >= 2 {
            let parameter = u32::read_le(reader)
                .with_context(|| format!("command parameter word in region at {offset:#x}"))?;
            let header = u32::read_le(reader)
                .with_context(|| format!("command header word in region at {offset:#x}"))?;
            words_left -= 2;
            let mut group_words = 2u32;

            let mut id = (header & 0xffff) as u16;
            let mask = (header >> 16) & 0xf;
            let extra = (header >> 20) & 0x7ff;
            let consecutive = header & 0x8000_0000 != 0;

            self.write(id, mask, parameter);
            if id == BLOCK_END {
                break;
            }

            for _ in 0..extra.min(words_left) {
                let value = u32::read_le(reader)
                    .with_context(|| format!("extra command word in region at {offset:#x}"))?;
                words_left -= 1;
                group_words += 1;
                if consecutive {
                    id = id.wrapping_add(1);
                }
                self.write(id, mask, value);
            }

            if aligned && group_words % 2 != 0 && words_left > 0 {
                let _ = u32::read_le(reader)
                    .with_context(|| format!("alignment word in region at {offset:#x}"))?;
                words_left -= 1;
            }

            self.end_group();
        }

        self.end_group();
        Ok(())
    }

    /// Masked register merge: the upper 28 bits always come from the new
    /// parameter, the low nibble only where the mask selects it.
    fn write(&mut self, id: u16, mask: u32, value: u32) {
        let old = self.registers[id as usize];
        self.registers[id as usize] = (old & (0xf & !mask)) | (value & (0xfffffff0 | mask));

        match id {
            VSH_FLOAT_UNIFORM_CONFIG => self.uniform_index = value & 0xff,
            VSH_FLOAT_UNIFORM_DATA..=VSH_FLOAT_UNIFORM_DATA_END => {
                self.uniforms
                    .entry(self.uniform_index)
                    .or_default()
                    .push(f32::from_bits(value));
            }
            LUT_DATA..=LUT_DATA_END => {
                self.lut_accum.push((value & 0xfff) as f32 / 0xfff as f32);
            }
            _ => {}
        }
    }

    fn end_group(&mut self) {
        if self.lut_accum.len() >= 256 {
            let table: Vec<f32> = self.lut_accum[..256].to_vec();
            self.lookup_tables.push(table);
        }
        self.lut_accum.clear();
    }

    fn reg(&self, id: u16) -> u32 {
        self.registers[id as usize]
    }

    // --- vertex layout ---

    pub fn attributes_buffer_address(&self, slot: u16) -> u32 {
        debug_assert!(slot < ATTRIBUTES_BUFFER_SLOTS);
        self.reg(ATTRIBUTES_BUFFER0_ADDRESS + slot * ATTRIBUTES_BUFFER_STRIDE)
    }

    pub fn attributes_buffer_permutation(&self, slot: u16) -> u64 {
        let low = self.reg(ATTRIBUTES_BUFFER0_ADDRESS + 1 + slot * ATTRIBUTES_BUFFER_STRIDE) as u64;
        let config = self.reg(ATTRIBUTES_BUFFER0_ADDRESS + 2 + slot * ATTRIBUTES_BUFFER_STRIDE) as u64;
        low | ((config & 0xffff) << 32)
    }

    pub fn attributes_buffer_stride(&self, slot: u16) -> u32 {
        (self.reg(ATTRIBUTES_BUFFER0_ADDRESS + 2 + slot * ATTRIBUTES_BUFFER_STRIDE) >> 16) & 0xff
    }

    pub fn attributes_buffer_attribute_count(&self, slot: u16) -> u32 {
        self.reg(ATTRIBUTES_BUFFER0_ADDRESS + 2 + slot * ATTRIBUTES_BUFFER_STRIDE) >> 28
    }

    /// 64-bit table of attribute formats, 4 bits per attribute name.
    pub fn attributes_format(&self) -> u64 {
        self.reg(ATTRIBUTES_FORMAT_LOW) as u64 | ((self.reg(ATTRIBUTES_FORMAT_HIGH) as u64 & 0xffff) << 32)
    }

    pub fn attributes_total(&self) -> u32 {
        ((self.reg(ATTRIBUTES_FORMAT_HIGH) >> 28) & 0xf) + 1
    }

    /// Index buffer address and width. Bit 31 is tagged by the relocation
    /// pass: set means 16-bit indices.
    pub fn index_buffer(&self) -> (u32, bool) {
        let value = self.reg(INDEX_BUFFER_CONFIG);
        (value & 0x7fffffff, value & 0x8000_0000 != 0)
    }

    pub fn vertex_count(&self) -> u32 {
        self.reg(VERTEX_COUNT)
    }

    // --- uniforms ---

    pub fn boolean_uniforms(&self) -> u32 {
        self.reg(VSH_BOOLEAN_UNIFORMS) & 0xffff
    }

    pub fn float_uniform(&self, index: u32) -> Option<&[f32]> {
        self.uniforms.get(&index).map(|v| v.as_slice())
    }

    pub fn lookup_tables(&self) -> &[Vec<f32>] {
        &self.lookup_tables
    }

    // --- fragment pipeline ---

    pub fn combiner_stage(&self, stage: usize) -> TevStage {
        let base = TEV_STAGE_BASES[stage];
        let source = self.reg(base);
        let operand = self.reg(base + 1);
        let combine = self.reg(base + 2);
        let color = self.reg(base + 3);
        let scale = self.reg(base + 4);

        TevStage {
            source_rgb: [
                CombineSource::from_raw(source),
                CombineSource::from_raw(source >> 4),
                CombineSource::from_raw(source >> 8),
            ],
            operand_rgb: [
                (operand & 0xf) as u8,
                ((operand >> 4) & 0xf) as u8,
                ((operand >> 8) & 0xf) as u8,
            ],
            operator_rgb: CombineOperator::from_raw(combine),
            scale_rgb: 1 << (scale & 3),
            source_alpha: [
                CombineSource::from_raw(source >> 16),
                CombineSource::from_raw(source >> 20),
                CombineSource::from_raw(source >> 24),
            ],
            operand_alpha: [
                ((operand >> 12) & 0xf) as u8,
                ((operand >> 16) & 0xf) as u8,
                ((operand >> 20) & 0xf) as u8,
            ],
            operator_alpha: CombineOperator::from_raw(combine >> 16),
            scale_alpha: 1 << ((scale >> 16) & 3),
            constant: unpack_rgba8(color),
        }
    }

    pub fn combiner_buffer_color(&self) -> BchColorF {
        unpack_rgba8(self.reg(TEX_ENV_BUFFER_COLOR))
    }

    pub fn blend(&self) -> BlendState {
        let config = self.reg(BLEND_CONFIG);
        BlendState {
            color_equation: BlendEquation::from_raw(config),
            alpha_equation: BlendEquation::from_raw(config >> 8),
            color_source: BlendFunction::from_raw(config >> 16),
            color_destination: BlendFunction::from_raw(config >> 20),
            alpha_source: BlendFunction::from_raw(config >> 24),
            alpha_destination: BlendFunction::from_raw(config >> 28),
            color: unpack_rgba8(self.reg(BLEND_COLOR)),
        }
    }

    pub fn logical_operation(&self) -> LogicalOperation {
        LogicalOperation::from_raw(self.reg(COLOR_LOGIC_OPERATION_CONFIG))
    }

    pub fn alpha_test(&self) -> AlphaTest {
        let value = self.reg(ALPHA_TEST_CONFIG);
        AlphaTest {
            enabled: value & 1 != 0,
            function: TestFunction::from_raw(value >> 4),
            reference: ((value >> 8) & 0xff) as u8,
        }
    }

    pub fn stencil_test(&self) -> StencilTest {
        let test = self.reg(STENCIL_TEST_CONFIG);
        let op = self.reg(STENCIL_OPERATION_CONFIG);
        StencilTest {
            enabled: test & 1 != 0,
            function: TestFunction::from_raw(test >> 4),
            reference: ((test >> 16) & 0xff) as u8,
            input_mask: ((test >> 24) & 0xff) as u8,
            fail_op: StencilOp::from_raw(op),
            z_fail_op: StencilOp::from_raw(op >> 4),
            z_pass_op: StencilOp::from_raw(op >> 8),
        }
    }

    pub fn depth_test(&self) -> DepthTest {
        let value = self.reg(DEPTH_TEST_CONFIG);
        DepthTest {
            enabled: value & 1 != 0,
            function: TestFunction::from_raw(value >> 4),
            red_write: value & 0x100 != 0,
            green_write: value & 0x200 != 0,
            blue_write: value & 0x400 != 0,
            alpha_write: value & 0x800 != 0,
            depth_write: value & 0x1000 != 0,
        }
    }

    pub fn cull_mode(&self) -> CullMode {
        CullMode::from_raw(self.reg(CULL_MODE))
    }

    // --- texture units ---

    pub fn texture_unit(&self, unit: usize) -> TextureUnitState {
        let (border, size, param, address, kind) = match unit {
            0 => (
                TEX_UNIT0_BORDER_COLOR,
                TEX_UNIT0_SIZE,
                TEX_UNIT0_PARAM,
                TEX_UNIT0_ADDRESS,
                TEX_UNIT0_TYPE,
            ),
            1 => (
                TEX_UNIT1_BORDER_COLOR,
                TEX_UNIT1_SIZE,
                TEX_UNIT1_PARAM,
                TEX_UNIT1_ADDRESS,
                TEX_UNIT1_TYPE,
            ),
            _ => (
                TEX_UNIT2_BORDER_COLOR,
                TEX_UNIT2_SIZE,
                TEX_UNIT2_PARAM,
                TEX_UNIT2_ADDRESS,
                TEX_UNIT2_TYPE,
            ),
        };

        let size = self.reg(size);
        let param = self.reg(param);
        TextureUnitState {
            address: self.reg(address),
            width: ((size >> 16) & 0x7ff) as u16,
            height: (size & 0x7ff) as u16,
            format: TextureFormat::from_raw(self.reg(kind)),
            mag_filter: TextureFilter::from_raw(param >> 1),
            min_filter: TextureFilter::from_raw(param >> 2),
            wrap_v: TextureWrap::from_raw(param >> 8),
            wrap_u: TextureWrap::from_raw(param >> 12),
            border_color: unpack_rgba8(self.reg(border)),
        }
    }

    /// How many texture units the material enables (low 3 bits of the
    /// texture units config register, one bit per unit).
    pub fn texture_units_enabled(&self) -> [bool; 3] {
        let value = self.reg(TEX_UNITS_CONFIG);
        [value & 1 != 0, value & 2 != 0, value & 4 != 0]
    }

    // --- fragment lighting LUT samplers ---

    pub fn lut_sampler(&self, sampler: usize) -> LutSampler {
        let absolute = self.reg(LUT_SAMPLER_ABSOLUTE);
        let input = self.reg(LUT_SAMPLER_INPUT);
        let scale = self.reg(LUT_SAMPLER_SCALE);
        let shift = (sampler as u32) * 4;

        LutSampler {
            is_absolute: (absolute >> sampler) & 1 == 0,
            input: ((input >> shift) & 0xf) as u8,
            scale: match (scale >> shift) & 0xf {
                1 => 2.0,
                2 => 4.0,
                3 => 8.0,
                6 => 0.25,
                7 => 0.5,
                _ => 1.0,
            },
        }
    }
}

fn unpack_rgba8(value: u32) -> BchColorF {
    BchColorF {
        r: (value & 0xff) as f32 / 255.0,
        g: ((value >> 8) & 0xff) as f32 / 255.0,
        b: ((value >> 16) & 0xff) as f32 / 255.0,
        a: (value >> 24) as f32 / 255.0,
    }
}
