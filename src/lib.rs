//! Decoder for the BCH 3D asset container and its PICA200 GPU command
//! encoding. The input is a fully decompressed byte buffer; the output is a
//! model group with resolved materials, skeletons, skinned vertex buffers
//! and animation tracks, ready for a renderer or exporter to consume.

pub mod animation;
pub mod bch;
pub mod math;
pub mod model;
pub mod pica;
pub mod scene;

pub use bch::{decode, BchHeader};
pub use model::ModelGroup;
