//! PICA200 command-buffer register catalog and raster/texture/combiner state
//! decoded from it. Register ids follow the hardware numbering; only the
//! registers the asset formats actually write are listed.

pub mod commands;

use serde::{Deserialize, Serialize};

// Rasterizer
pub const CULL_MODE: u16 = 0x0040;

// Texture units
pub const TEX_UNITS_CONFIG: u16 = 0x0080;
pub const TEX_UNIT0_BORDER_COLOR: u16 = 0x0081;
pub const TEX_UNIT0_SIZE: u16 = 0x0082;
pub const TEX_UNIT0_PARAM: u16 = 0x0083;
pub const TEX_UNIT0_LEVEL_OF_DETAIL: u16 = 0x0084;
pub const TEX_UNIT0_ADDRESS: u16 = 0x0085;
pub const TEX_UNIT0_TYPE: u16 = 0x008e;
pub const TEX_UNIT1_BORDER_COLOR: u16 = 0x0092;
pub const TEX_UNIT1_SIZE: u16 = 0x0093;
pub const TEX_UNIT1_PARAM: u16 = 0x0094;
pub const TEX_UNIT1_LEVEL_OF_DETAIL: u16 = 0x0095;
pub const TEX_UNIT1_ADDRESS: u16 = 0x0096;
pub const TEX_UNIT1_TYPE: u16 = 0x0097;
pub const TEX_UNIT2_BORDER_COLOR: u16 = 0x0099;
pub const TEX_UNIT2_SIZE: u16 = 0x009a;
pub const TEX_UNIT2_PARAM: u16 = 0x009b;
pub const TEX_UNIT2_LEVEL_OF_DETAIL: u16 = 0x009c;
pub const TEX_UNIT2_ADDRESS: u16 = 0x009d;
pub const TEX_UNIT2_TYPE: u16 = 0x009e;

// Texture combiner (TEV) stages: source/operand/combine/color/scale per stage
pub const TEX_ENV0_SOURCE: u16 = 0x00c0;
pub const TEX_ENV1_SOURCE: u16 = 0x00c8;
pub const TEX_ENV2_SOURCE: u16 = 0x00d0;
pub const TEX_ENV3_SOURCE: u16 = 0x00d8;
pub const TEX_ENV4_SOURCE: u16 = 0x00f0;
pub const TEX_ENV5_SOURCE: u16 = 0x00f8;
pub const TEX_ENV_BUFFER_COLOR: u16 = 0x00fd;

// Output merger
pub const BLEND_CONFIG: u16 = 0x0101;
pub const COLOR_LOGIC_OPERATION_CONFIG: u16 = 0x0102;
pub const BLEND_COLOR: u16 = 0x0103;
pub const ALPHA_TEST_CONFIG: u16 = 0x0104;
pub const STENCIL_TEST_CONFIG: u16 = 0x0105;
pub const STENCIL_OPERATION_CONFIG: u16 = 0x0106;
pub const DEPTH_TEST_CONFIG: u16 = 0x0107;

// Fragment lighting look-up tables
pub const LUT_DATA: u16 = 0x01c8;
pub const LUT_DATA_END: u16 = 0x01cf;
pub const LUT_SAMPLER_ABSOLUTE: u16 = 0x01d0;
pub const LUT_SAMPLER_INPUT: u16 = 0x01d1;
pub const LUT_SAMPLER_SCALE: u16 = 0x01d2;

// Vertex attribute buffers (12 slots, 3 registers each starting at 0x0203)
pub const ATTRIBUTES_BUFFER_BASE_ADDRESS: u16 = 0x0200;
pub const ATTRIBUTES_FORMAT_LOW: u16 = 0x0201;
pub const ATTRIBUTES_FORMAT_HIGH: u16 = 0x0202;
pub const ATTRIBUTES_BUFFER0_ADDRESS: u16 = 0x0203;
pub const ATTRIBUTES_BUFFER_STRIDE: u16 = 3;
pub const ATTRIBUTES_BUFFER_SLOTS: u16 = 12;

pub const INDEX_BUFFER_CONFIG: u16 = 0x0227;
pub const VERTEX_COUNT: u16 = 0x0228;

pub const BLOCK_END: u16 = 0x023d;

// Vertex shader uniforms
pub const VSH_BOOLEAN_UNIFORMS: u16 = 0x02b0;
pub const VSH_ATTRIBUTES_PERMUTATION_LOW: u16 = 0x02bb;
pub const VSH_ATTRIBUTES_PERMUTATION_HIGH: u16 = 0x02bc;
pub const VSH_FLOAT_UNIFORM_CONFIG: u16 = 0x02c0;
pub const VSH_FLOAT_UNIFORM_DATA: u16 = 0x02c1;
pub const VSH_FLOAT_UNIFORM_DATA_END: u16 = 0x02c8;

/// Float uniform slots the vertex reconstruction consumes.
pub const UNIFORM_POSITION_OFFSET: u32 = 6;
pub const UNIFORM_SCALES_A: u32 = 7;
pub const UNIFORM_SCALES_B: u32 = 8;

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureFormat {
    #[default]
    Rgba8 = 0,
    Rgb8 = 1,
    Rgba5551 = 2,
    Rgb565 = 3,
    Rgba4 = 4,
    La8 = 5,
    HiLo8 = 6,
    L8 = 7,
    A8 = 8,
    La4 = 9,
    L4 = 10,
    A4 = 11,
    Etc1 = 12,
    Etc1A4 = 13,
    Reserved14 = 14,
    Reserved15 = 15,
}

impl TextureFormat {
    pub fn from_raw(value: u32) -> TextureFormat {
        match value & 0xf {
            0 => TextureFormat::Rgba8,
            1 => TextureFormat::Rgb8,
            2 => TextureFormat::Rgba5551,
            3 => TextureFormat::Rgb565,
            4 => TextureFormat::Rgba4,
            5 => TextureFormat::La8,
            6 => TextureFormat::HiLo8,
            7 => TextureFormat::L8,
            8 => TextureFormat::A8,
            9 => TextureFormat::La4,
            10 => TextureFormat::L4,
            11 => TextureFormat::A4,
            12 => TextureFormat::Etc1,
            13 => TextureFormat::Etc1A4,
            14 => TextureFormat::Reserved14,
            _ => TextureFormat::Reserved15,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureWrap {
    ClampToEdge = 0,
    ClampToBorder = 1,
    #[default]
    Repeat = 2,
    MirroredRepeat = 3,
}

impl TextureWrap {
    pub fn from_raw(value: u32) -> TextureWrap {
        match value & 3 {
            0 => TextureWrap::ClampToEdge,
            1 => TextureWrap::ClampToBorder,
            2 => TextureWrap::Repeat,
            _ => TextureWrap::MirroredRepeat,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureFilter {
    #[default]
    Nearest = 0,
    Linear = 1,
}

impl TextureFilter {
    pub fn from_raw(value: u32) -> TextureFilter {
        if value & 1 != 0 {
            TextureFilter::Linear
        } else {
            TextureFilter::Nearest
        }
    }
}

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CullMode {
    #[default]
    Never = 0,
    FrontFace = 1,
    BackFace = 2,
    Reserved3 = 3,
}

impl CullMode {
    pub fn from_raw(value: u32) -> CullMode {
        match value & 3 {
            0 => CullMode::Never,
            1 => CullMode::FrontFace,
            2 => CullMode::BackFace,
            _ => CullMode::Reserved3,
        }
    }
}

/// Comparison function shared by the depth, alpha and stencil tests.
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestFunction {
    Never = 0,
    #[default]
    Always = 1,
    Equal = 2,
    NotEqual = 3,
    Less = 4,
    LessOrEqual = 5,
    Greater = 6,
    GreaterOrEqual = 7,
}

impl TestFunction {
    pub fn from_raw(value: u32) -> TestFunction {
        match value & 7 {
            0 => TestFunction::Never,
            1 => TestFunction::Always,
            2 => TestFunction::Equal,
            3 => TestFunction::NotEqual,
            4 => TestFunction::Less,
            5 => TestFunction::LessOrEqual,
            6 => TestFunction::Greater,
            _ => TestFunction::GreaterOrEqual,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StencilOp {
    #[default]
    Keep = 0,
    Zero = 1,
    Replace = 2,
    Increment = 3,
    Decrement = 4,
    Invert = 5,
    IncrementWrap = 6,
    DecrementWrap = 7,
}

impl StencilOp {
    pub fn from_raw(value: u32) -> StencilOp {
        match value & 7 {
            0 => StencilOp::Keep,
            1 => StencilOp::Zero,
            2 => StencilOp::Replace,
            3 => StencilOp::Increment,
            4 => StencilOp::Decrement,
            5 => StencilOp::Invert,
            6 => StencilOp::IncrementWrap,
            _ => StencilOp::DecrementWrap,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendEquation {
    #[default]
    Add = 0,
    Subtract = 1,
    ReverseSubtract = 2,
    Min = 3,
    Max = 4,
}

impl BlendEquation {
    pub fn from_raw(value: u32) -> BlendEquation {
        match value & 7 {
            1 => BlendEquation::Subtract,
            2 => BlendEquation::ReverseSubtract,
            3 => BlendEquation::Min,
            4 => BlendEquation::Max,
            // 0 and the 5..7 hardware aliases
            _ => BlendEquation::Add,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendFunction {
    Zero = 0,
    #[default]
    One = 1,
    SourceColor = 2,
    OneMinusSourceColor = 3,
    DestinationColor = 4,
    OneMinusDestinationColor = 5,
    SourceAlpha = 6,
    OneMinusSourceAlpha = 7,
    DestinationAlpha = 8,
    OneMinusDestinationAlpha = 9,
    ConstantColor = 10,
    OneMinusConstantColor = 11,
    ConstantAlpha = 12,
    OneMinusConstantAlpha = 13,
    SourceAlphaSaturate = 14,
    Reserved15 = 15,
}

impl BlendFunction {
    pub fn from_raw(value: u32) -> BlendFunction {
        match value & 0xf {
            0 => BlendFunction::Zero,
            1 => BlendFunction::One,
            2 => BlendFunction::SourceColor,
            3 => BlendFunction::OneMinusSourceColor,
            4 => BlendFunction::DestinationColor,
            5 => BlendFunction::OneMinusDestinationColor,
            6 => BlendFunction::SourceAlpha,
            7 => BlendFunction::OneMinusSourceAlpha,
            8 => BlendFunction::DestinationAlpha,
            9 => BlendFunction::OneMinusDestinationAlpha,
            10 => BlendFunction::ConstantColor,
            11 => BlendFunction::OneMinusConstantColor,
            12 => BlendFunction::ConstantAlpha,
            13 => BlendFunction::OneMinusConstantAlpha,
            14 => BlendFunction::SourceAlphaSaturate,
            _ => BlendFunction::Reserved15,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperation {
    Clear = 0,
    And = 1,
    AndReverse = 2,
    #[default]
    Copy = 3,
    Set = 4,
    CopyInverted = 5,
    NoOp = 6,
    Invert = 7,
    Nand = 8,
    Or = 9,
    Nor = 10,
    Xor = 11,
    Equiv = 12,
    AndInverted = 13,
    OrReverse = 14,
    OrInverted = 15,
}

impl LogicalOperation {
    pub fn from_raw(value: u32) -> LogicalOperation {
        match value & 0xf {
            0 => LogicalOperation::Clear,
            1 => LogicalOperation::And,
            2 => LogicalOperation::AndReverse,
            3 => LogicalOperation::Copy,
            4 => LogicalOperation::Set,
            5 => LogicalOperation::CopyInverted,
            6 => LogicalOperation::NoOp,
            7 => LogicalOperation::Invert,
            8 => LogicalOperation::Nand,
            9 => LogicalOperation::Or,
            10 => LogicalOperation::Nor,
            11 => LogicalOperation::Xor,
            12 => LogicalOperation::Equiv,
            13 => LogicalOperation::AndInverted,
            14 => LogicalOperation::OrReverse,
            _ => LogicalOperation::OrInverted,
        }
    }
}

/// Texture combiner input sources.
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineSource {
    #[default]
    PrimaryColor = 0,
    FragmentPrimaryColor = 1,
    FragmentSecondaryColor = 2,
    Texture0 = 3,
    Texture1 = 4,
    Texture2 = 5,
    Texture3 = 6,
    Reserved7 = 7,
    Reserved8 = 8,
    Reserved9 = 9,
    Reserved10 = 10,
    Reserved11 = 11,
    Reserved12 = 12,
    PreviousBuffer = 13,
    Constant = 14,
    Previous = 15,
}

impl CombineSource {
    pub fn from_raw(value: u32) -> CombineSource {
        match value & 0xf {
            0 => CombineSource::PrimaryColor,
            1 => CombineSource::FragmentPrimaryColor,
            2 => CombineSource::FragmentSecondaryColor,
            3 => CombineSource::Texture0,
            4 => CombineSource::Texture1,
            5 => CombineSource::Texture2,
            6 => CombineSource::Texture3,
            7 => CombineSource::Reserved7,
            8 => CombineSource::Reserved8,
            9 => CombineSource::Reserved9,
            10 => CombineSource::Reserved10,
            11 => CombineSource::Reserved11,
            12 => CombineSource::Reserved12,
            13 => CombineSource::PreviousBuffer,
            14 => CombineSource::Constant,
            _ => CombineSource::Previous,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineOperator {
    #[default]
    Replace = 0,
    Modulate = 1,
    Add = 2,
    AddSigned = 3,
    Interpolate = 4,
    Subtract = 5,
    Dot3Rgb = 6,
    Dot3Rgba = 7,
    MultiplyThenAdd = 8,
    AddThenMultiply = 9,
}

impl CombineOperator {
    pub fn from_raw(value: u32) -> CombineOperator {
        match value & 0xf {
            1 => CombineOperator::Modulate,
            2 => CombineOperator::Add,
            3 => CombineOperator::AddSigned,
            4 => CombineOperator::Interpolate,
            5 => CombineOperator::Subtract,
            6 => CombineOperator::Dot3Rgb,
            7 => CombineOperator::Dot3Rgba,
            8 => CombineOperator::MultiplyThenAdd,
            9 => CombineOperator::AddThenMultiply,
            // 0 and the undefined 10..15 encodings act as replace
            _ => CombineOperator::Replace,
        }
    }
}

/// Vertex attribute component storage in the attribute buffers.
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeFormat {
    #[default]
    SignedByte = 0,
    UnsignedByte = 1,
    SignedShort = 2,
    Float = 3,
}

impl AttributeFormat {
    pub fn from_raw(value: u32) -> AttributeFormat {
        match value & 3 {
            0 => AttributeFormat::SignedByte,
            1 => AttributeFormat::UnsignedByte,
            2 => AttributeFormat::SignedShort,
            _ => AttributeFormat::Float,
        }
    }

    pub fn byte_length(&self) -> u32 {
        match self {
            AttributeFormat::SignedByte | AttributeFormat::UnsignedByte => 1,
            AttributeFormat::SignedShort => 2,
            AttributeFormat::Float => 4,
        }
    }
}

/// Meaning of a vertex attribute slot, as named by the permutation registers.
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeName {
    #[default]
    Position = 0,
    Normal = 1,
    Tangent = 2,
    Color = 3,
    TextureCoordinate0 = 4,
    TextureCoordinate1 = 5,
    TextureCoordinate2 = 6,
    BoneIndex = 7,
    BoneWeight = 8,
    UserAttribute0 = 9,
    UserAttribute1 = 10,
    UserAttribute2 = 11,
    UserAttribute3 = 12,
    UserAttribute4 = 13,
    UserAttribute5 = 14,
    Interleave = 15,
}

impl AttributeName {
    pub fn from_raw(value: u32) -> AttributeName {
        match value & 0xf {
            0 => AttributeName::Position,
            1 => AttributeName::Normal,
            2 => AttributeName::Tangent,
            3 => AttributeName::Color,
            4 => AttributeName::TextureCoordinate0,
            5 => AttributeName::TextureCoordinate1,
            6 => AttributeName::TextureCoordinate2,
            7 => AttributeName::BoneIndex,
            8 => AttributeName::BoneWeight,
            9 => AttributeName::UserAttribute0,
            10 => AttributeName::UserAttribute1,
            11 => AttributeName::UserAttribute2,
            12 => AttributeName::UserAttribute3,
            13 => AttributeName::UserAttribute4,
            14 => AttributeName::UserAttribute5,
            _ => AttributeName::Interleave,
        }
    }
}
