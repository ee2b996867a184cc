//! Keyframe decoding and evaluation. Tracks are stored under one of 8
//! fixed-point quantized encodings and evaluated under one of 3
//! interpolation modes. After raw decode every frame and value is passed
//! through a per-track affine transform (raw * scale + offset) whose
//! constants sit in the track header.

use std::io::{Read, Seek};

use binrw::{BinRead, BinResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatMethod {
    #[default]
    None,
    Repeat,
    Mirror,
}

impl RepeatMethod {
    fn from_raw(value: u8) -> RepeatMethod {
        match value {
            1 => RepeatMethod::Repeat,
            2 => RepeatMethod::Mirror,
            _ => RepeatMethod::None,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    Step,
    Linear,
    Hermite,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Quantization {
    Hermite128,
    Hermite64,
    Hermite48,
    UnifiedHermite96,
    UnifiedHermite48,
    UnifiedHermite32,
    StepLinear64,
    StepLinear32,
}

impl Quantization {
    fn from_raw(value: u8, pos: u64) -> BinResult<Quantization> {
        Ok(match value {
            0 => Quantization::Hermite128,
            1 => Quantization::Hermite64,
            2 => Quantization::Hermite48,
            3 => Quantization::UnifiedHermite96,
            4 => Quantization::UnifiedHermite48,
            5 => Quantization::UnifiedHermite32,
            6 => Quantization::StepLinear64,
            7 => Quantization::StepLinear32,
            _ => {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!("unknown key frame quantization tag {value}"),
                })
            }
        })
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrame {
    pub frame: f32,
    pub value: f32,
    pub in_slope: f32,
    pub out_slope: f32,
}

/// One animated scalar channel. Keyframes are kept in storage order; the
/// format allows duplicate frame numbers at step boundaries, so the
/// neighbor scans below are deliberately order-sensitive linear passes.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct KeyFrameGroup {
    pub exists: bool,
    pub start_frame: f32,
    pub end_frame: f32,
    pub pre_repeat: RepeatMethod,
    pub post_repeat: RepeatMethod,
    pub interpolation: Interpolation,
    pub key_frames: Vec<KeyFrame>,
}

fn sign_extend_12(value: u32) -> i32 {
    ((value as i32) << 20) >> 20
}

impl KeyFrameGroup {
    /// Read a group at the reader's current position.
    pub fn read<R: Read + Seek>(reader: &mut R) -> BinResult<KeyFrameGroup> {
        let start_frame = f32::read_le(reader)?;
        let end_frame = f32::read_le(reader)?;
        let pre_repeat = u8::read_le(reader)?;
        let post_repeat = u8::read_le(reader)?;
        let interpolation_raw = u8::read_le(reader)?;
        let quantization_raw = u8::read_le(reader)?;
        let count = u32::read_le(reader)?;
        let value_scale = f32::read_le(reader)?;
        let value_offset = f32::read_le(reader)?;
        let frame_scale = f32::read_le(reader)?;
        let frame_offset = f32::read_le(reader)?;

        let pos = reader.stream_position().unwrap_or(0);
        let interpolation = match interpolation_raw {
            0 => Interpolation::Step,
            1 => Interpolation::Linear,
            2 => Interpolation::Hermite,
            other => {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!("unknown interpolation mode {other}"),
                })
            }
        };
        let quantization = Quantization::from_raw(quantization_raw, pos)?;

        let mut key_frames = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut key = read_raw_key(reader, quantization)?;
            key.frame = key.frame * frame_scale + frame_offset;
            key.value = key.value * value_scale + value_offset;
            key_frames.push(key);
        }

        Ok(KeyFrameGroup {
            exists: true,
            start_frame,
            end_frame,
            pre_repeat: RepeatMethod::from_raw(pre_repeat),
            post_repeat: RepeatMethod::from_raw(post_repeat),
            interpolation,
            key_frames,
        })
    }

    /// Keyframe with the greatest frame number <= the query frame. Ties are
    /// broken by the last keyframe seen in storage order; a query before the
    /// first keyframe returns the first.
    pub fn left_frame(&self, frame: f32) -> &KeyFrame {
        let mut found = &self.key_frames[0];
        for key in &self.key_frames {
            if key.frame <= frame {
                found = key;
            }
        }
        found
    }

    /// First keyframe in storage order with a frame number >= the query
    /// frame; a query past the last keyframe returns the last.
    pub fn right_frame(&self, frame: f32) -> &KeyFrame {
        let mut found = &self.key_frames[self.key_frames.len() - 1];
        for key in self.key_frames.iter().rev() {
            if key.frame >= frame {
                found = key;
            }
        }
        found
    }

    /// Evaluate the track at an arbitrary frame number.
    pub fn value_at(&self, frame: f32) -> f32 {
        if self.key_frames.is_empty() {
            return 0.0;
        }

        match self.interpolation {
            Interpolation::Step => self.left_frame(frame).value,
            Interpolation::Linear => {
                let left = self.left_frame(frame);
                let right = self.right_frame(frame);
                if left.frame == right.frame {
                    return left.value;
                }
                let mu = (frame - left.frame) / (right.frame - left.frame);
                left.value + (right.value - left.value) * mu
            }
            Interpolation::Hermite => {
                let left = self.left_frame(frame);
                let right = self.right_frame(frame);
                if left.frame == right.frame {
                    return left.value;
                }
                // The engine's own Hermite parameterization; keep it exactly.
                let t = (frame - left.frame) / (right.frame - left.frame);
                let t1 = t - 1.0;
                let distance = frame - left.frame;
                left.value
                    + (left.value - right.value) * (2.0 * t - 3.0) * t * t
                    + t1 * distance * (t1 * left.out_slope + t * right.in_slope)
            }
        }
    }
}

fn read_raw_key<R: Read + Seek>(reader: &mut R, quantization: Quantization) -> BinResult<KeyFrame> {
    let key = match quantization {
        Quantization::Hermite128 => KeyFrame {
            frame: f32::read_le(reader)?,
            value: f32::read_le(reader)?,
            in_slope: f32::read_le(reader)?,
            out_slope: f32::read_le(reader)?,
        },
        Quantization::Hermite64 => {
            let packed = u32::read_le(reader)?;
            KeyFrame {
                frame: (packed & 0xfff) as f32,
                value: (packed >> 12) as f32,
                in_slope: i16::read_le(reader)? as f32 / 256.0,
                out_slope: i16::read_le(reader)? as f32 / 256.0,
            }
        }
        Quantization::Hermite48 => {
            let frame = u8::read_le(reader)?;
            let value = u16::read_le(reader)?;
            let b0 = u8::read_le(reader)? as u32;
            let b1 = u8::read_le(reader)? as u32;
            let b2 = u8::read_le(reader)? as u32;
            KeyFrame {
                frame: frame as f32,
                value: value as f32,
                in_slope: sign_extend_12(b0 | ((b1 & 0xf) << 8)) as f32 / 32.0,
                out_slope: sign_extend_12((b1 >> 4) | (b2 << 4)) as f32 / 32.0,
            }
        }
        Quantization::UnifiedHermite96 => {
            let frame = f32::read_le(reader)?;
            let value = f32::read_le(reader)?;
            let slope = f32::read_le(reader)?;
            KeyFrame { frame, value, in_slope: slope, out_slope: slope }
        }
        Quantization::UnifiedHermite48 => {
            let frame = u16::read_le(reader)? as f32 / 32.0;
            let value = u16::read_le(reader)? as f32;
            let slope = i16::read_le(reader)? as f32 / 256.0;
            KeyFrame { frame, value, in_slope: slope, out_slope: slope }
        }
        Quantization::UnifiedHermite32 => {
            let frame = u8::read_le(reader)? as f32;
            let packed = u16::read_le(reader)? as u32;
            let high = u8::read_le(reader)? as u32;
            let slope = sign_extend_12((packed >> 12) | (high << 4)) as f32 / 32.0;
            KeyFrame {
                frame,
                value: (packed & 0xfff) as f32,
                in_slope: slope,
                out_slope: slope,
            }
        }
        Quantization::StepLinear64 => KeyFrame {
            frame: f32::read_le(reader)?,
            value: f32::read_le(reader)?,
            in_slope: 0.0,
            out_slope: 0.0,
        },
        Quantization::StepLinear32 => {
            let packed = u32::read_le(reader)?;
            KeyFrame {
                frame: (packed & 0xfff) as f32,
                value: (packed >> 12) as f32,
                in_slope: 0.0,
                out_slope: 0.0,
            }
        }
    };
    Ok(key)
}

/// A boolean channel: a default value plus one bit per frame, LSB-first. A
/// set bit means the frame differs from the default.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BooleanTrack {
    pub exists: bool,
    pub default_value: bool,
    pub start_frame: f32,
    pub end_frame: f32,
    pub values: Vec<bool>,
}

impl BooleanTrack {
    pub fn read<R: Read + Seek>(reader: &mut R) -> BinResult<BooleanTrack> {
        let default_value = u8::read_le(reader)? != 0;
        let start_frame = f32::read_le(reader)?;
        let end_frame = f32::read_le(reader)?;
        let frame_count = u32::read_le(reader)?;

        let byte_count = frame_count.div_ceil(8);
        let mut bits = Vec::with_capacity(byte_count as usize);
        for _ in 0..byte_count {
            bits.push(u8::read_le(reader)?);
        }

        let mut values = Vec::with_capacity(frame_count as usize);
        for frame in 0..frame_count {
            let bit = (bits[(frame / 8) as usize] >> (frame % 8)) & 1 != 0;
            values.push(default_value ^ bit);
        }

        Ok(BooleanTrack {
            exists: true,
            default_value,
            start_frame,
            end_frame,
            values,
        })
    }

    pub fn value_at(&self, frame: usize) -> bool {
        self.values.get(frame).copied().unwrap_or(self.default_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn group_header(
        interpolation: u8,
        quantization: u8,
        count: u32,
        scales: [f32; 4], // value_scale, value_offset, frame_scale, frame_offset
    ) -> Vec<u8> {
        let mut out = vec![];
        out.extend_from_slice(&0f32.to_le_bytes()); // start_frame
        out.extend_from_slice(&10f32.to_le_bytes()); // end_frame
        out.push(0); // pre_repeat
        out.push(0); // post_repeat
        out.push(interpolation);
        out.push(quantization);
        out.extend_from_slice(&count.to_le_bytes());
        for s in scales {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    const IDENTITY: [f32; 4] = [1.0, 0.0, 1.0, 0.0];

    fn read_group(bytes: &[u8]) -> KeyFrameGroup {
        KeyFrameGroup::read(&mut Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn hermite128_decodes_exact_floats() {
        let mut bytes = group_header(2, 0, 1, IDENTITY);
        for v in [3.0f32, 7.5, -1.25, 0.5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let group = read_group(&bytes);
        assert_eq!(
            group.key_frames[0],
            KeyFrame { frame: 3.0, value: 7.5, in_slope: -1.25, out_slope: 0.5 }
        );
    }

    #[test]
    fn hermite64_round_trips_within_resolution() {
        let frame = 100u32;
        let value = 0x5432u32;
        let in_slope = -1.5f32;
        let out_slope = 2.25f32;

        let mut bytes = group_header(2, 1, 1, IDENTITY);
        bytes.extend_from_slice(&(frame | (value << 12)).to_le_bytes());
        bytes.extend_from_slice(&((in_slope * 256.0) as i16).to_le_bytes());
        bytes.extend_from_slice(&((out_slope * 256.0) as i16).to_le_bytes());

        let key = read_group(&bytes).key_frames[0];
        assert_eq!(key.frame, 100.0);
        assert_eq!(key.value, 0x5432 as f32);
        assert!((key.in_slope - in_slope).abs() <= 1.0 / 256.0);
        assert!((key.out_slope - out_slope).abs() <= 1.0 / 256.0);
    }

    #[test]
    fn hermite48_packs_two_signed_12_bit_slopes() {
        let in_raw: i32 = -40; // -1.25 * 32
        let out_raw: i32 = 16; // 0.5 * 32
        let in_bits = (in_raw & 0xfff) as u32;
        let out_bits = (out_raw & 0xfff) as u32;

        let mut bytes = group_header(2, 2, 1, IDENTITY);
        bytes.push(9); // frame
        bytes.extend_from_slice(&1000u16.to_le_bytes()); // value
        bytes.push((in_bits & 0xff) as u8);
        bytes.push(((in_bits >> 8) | ((out_bits & 0xf) << 4)) as u8);
        bytes.push((out_bits >> 4) as u8);

        let key = read_group(&bytes).key_frames[0];
        assert_eq!(key.frame, 9.0);
        assert_eq!(key.value, 1000.0);
        assert!((key.in_slope - (-1.25)).abs() <= 1.0 / 32.0);
        assert!((key.out_slope - 0.5).abs() <= 1.0 / 32.0);
    }

    #[test]
    fn unified_hermite48_shares_one_slope() {
        let mut bytes = group_header(2, 4, 1, IDENTITY);
        bytes.extend_from_slice(&(5u16 * 32).to_le_bytes()); // frame 5.0 in 1/32 units
        bytes.extend_from_slice(&77u16.to_le_bytes());
        bytes.extend_from_slice(&((0.75f32 * 256.0) as i16).to_le_bytes());

        let key = read_group(&bytes).key_frames[0];
        assert_eq!(key.frame, 5.0);
        assert_eq!(key.value, 77.0);
        assert_eq!(key.in_slope, key.out_slope);
        assert!((key.in_slope - 0.75).abs() <= 1.0 / 256.0);
    }

    #[test]
    fn unified_hermite32_splits_value_and_slope() {
        let value = 0xabcu32;
        let slope_raw: i32 = -100; // -3.125 * 32
        let slope_bits = (slope_raw & 0xfff) as u32;

        let mut bytes = group_header(2, 5, 1, IDENTITY);
        bytes.push(3); // frame
        bytes.extend_from_slice(&((value | ((slope_bits & 0xf) << 12)) as u16).to_le_bytes());
        bytes.push((slope_bits >> 4) as u8);

        let key = read_group(&bytes).key_frames[0];
        assert_eq!(key.frame, 3.0);
        assert_eq!(key.value, 0xabc as f32);
        assert!((key.in_slope - (-3.125)).abs() <= 1.0 / 32.0);
        assert_eq!(key.in_slope, key.out_slope);
    }

    #[test]
    fn unified_hermite96_decodes_exact_floats() {
        let mut bytes = group_header(2, 3, 1, IDENTITY);
        for v in [6.0f32, -2.5, 0.125] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let key = read_group(&bytes).key_frames[0];
        assert_eq!(key.frame, 6.0);
        assert_eq!(key.value, -2.5);
        assert_eq!(key.in_slope, 0.125);
        assert_eq!(key.out_slope, 0.125);
    }

    #[test]
    fn step_linear64_decodes_exact_floats() {
        let mut bytes = group_header(0, 6, 1, IDENTITY);
        for v in [3.0f32, 12.5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let key = read_group(&bytes).key_frames[0];
        assert_eq!(key.frame, 3.0);
        assert_eq!(key.value, 12.5);
        assert_eq!(key.in_slope, 0.0);
    }

    #[test]
    fn step_linear32_packs_frame_and_value() {
        let mut bytes = group_header(1, 7, 1, IDENTITY);
        bytes.extend_from_slice(&(42u32 | (9999 << 12)).to_le_bytes());
        let key = read_group(&bytes).key_frames[0];
        assert_eq!(key.frame, 42.0);
        assert_eq!(key.value, 9999.0);
    }

    #[test]
    fn affine_transform_applies_per_track_constants() {
        // frame = raw * 2 + 1, value = raw * 0.5 + 10
        let mut bytes = group_header(1, 7, 1, [0.5, 10.0, 2.0, 1.0]);
        bytes.extend_from_slice(&(4u32 | (8 << 12)).to_le_bytes());
        let key = read_group(&bytes).key_frames[0];
        assert_eq!(key.frame, 9.0);
        assert_eq!(key.value, 14.0);
    }

    #[test]
    fn unknown_quantization_tag_is_fatal() {
        let mut bytes = group_header(1, 9, 0, IDENTITY);
        bytes.extend_from_slice(&[0; 8]);
        let err = KeyFrameGroup::read(&mut Cursor::new(bytes.as_slice())).unwrap_err();
        assert!(err.to_string().contains("quantization"));
    }

    fn group_of(interpolation: Interpolation, keys: &[(f32, f32, f32, f32)]) -> KeyFrameGroup {
        KeyFrameGroup {
            exists: true,
            start_frame: 0.0,
            end_frame: 10.0,
            pre_repeat: RepeatMethod::None,
            post_repeat: RepeatMethod::None,
            interpolation,
            key_frames: keys
                .iter()
                .map(|&(frame, value, in_slope, out_slope)| KeyFrame { frame, value, in_slope, out_slope })
                .collect(),
        }
    }

    #[test]
    fn single_keyframe_answers_every_query() {
        let group = group_of(Interpolation::Linear, &[(4.0, 2.5, 0.0, 0.0)]);
        for frame in [-10.0, 0.0, 4.0, 100.0] {
            assert_eq!(group.left_frame(frame).value, 2.5);
            assert_eq!(group.right_frame(frame).value, 2.5);
            assert_eq!(group.value_at(frame), 2.5);
        }
    }

    #[test]
    fn step_ties_resolve_to_last_seen_in_scan_order() {
        // Duplicate frames mark a step boundary; the scan keeps the later one.
        let group = group_of(
            Interpolation::Step,
            &[(0.0, 1.0, 0.0, 0.0), (5.0, 2.0, 0.0, 0.0), (5.0, 3.0, 0.0, 0.0)],
        );
        assert_eq!(group.value_at(4.9), 1.0);
        assert_eq!(group.value_at(5.0), 3.0);
        assert_eq!(group.value_at(7.0), 3.0);
    }

    #[test]
    fn linear_interpolates_between_neighbors() {
        let group = group_of(
            Interpolation::Linear,
            &[(0.0, 0.0, 0.0, 0.0), (10.0, 20.0, 0.0, 0.0)],
        );
        assert_eq!(group.value_at(2.5), 5.0);
        assert_eq!(group.value_at(10.0), 20.0);
        assert_eq!(group.value_at(15.0), 20.0);
    }

    #[test]
    fn hermite_is_exact_at_both_boundaries() {
        let group = group_of(
            Interpolation::Hermite,
            &[(2.0, 1.0, 0.5, -0.25), (8.0, 5.0, 1.5, 0.75)],
        );
        assert_eq!(group.value_at(2.0), 1.0);
        assert_eq!(group.value_at(8.0), 5.0);
    }

    #[test]
    fn hermite_midpoint_matches_the_engine_formula() {
        let group = group_of(
            Interpolation::Hermite,
            &[(0.0, 0.0, 0.0, 1.0), (4.0, 0.0, 1.0, 0.0)],
        );
        // t = 0.5, distance = 2, t1 = -0.5:
        // value = 0 + 0 + (-0.5) * 2 * (-0.5 * 1.0 + 0.5 * 1.0) = 0
        assert_eq!(group.value_at(2.0), 0.0);
        // t = 0.25, distance = 1, t1 = -0.75:
        // value = (-0.75) * 1 * (-0.75 * 1.0 + 0.25 * 1.0) = 0.375
        assert!((group.value_at(1.0) - 0.375).abs() < 1e-6);
    }

    #[test]
    fn boolean_track_reads_lsb_first_against_the_default() {
        let mut bytes = vec![1u8]; // default = true
        bytes.extend_from_slice(&0f32.to_le_bytes());
        bytes.extend_from_slice(&4f32.to_le_bytes());
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.push(0b10010); // frames 1 and 4 differ from the default

        let track = BooleanTrack::read(&mut Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(track.values, vec![true, false, true, true, false]);
        assert!(track.value_at(100)); // past the end falls back to the default
    }
}
