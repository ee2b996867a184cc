use binrw::binrw;
use cgmath::{InnerSpace, Matrix4, Quaternion, Rad, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[br(little)]
pub struct BchVector2(
    #[br(map = |raw: [f32; 2]| Vector2::new(raw[0], raw[1]))]
    #[bw(map = |v: &Vector2<f32>| [v.x, v.y])]
    pub Vector2<f32>,
);

impl Default for BchVector2 {
    fn default() -> Self {
        Self(Vector2::new(0.0, 0.0))
    }
}

impl BchVector2 {
    pub fn to_slice(&self) -> [f32; 2] {
        [self.0.x, self.0.y]
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[br(little)]
pub struct BchVector3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &Vector3<f32>| [v.x, v.y, v.z])]
    pub Vector3<f32>,
);

impl Default for BchVector3 {
    fn default() -> Self {
        Self(Vector3::new(0.0, 0.0, 0.0))
    }
}

impl BchVector3 {
    pub fn to_slice(&self) -> [f32; 3] {
        [self.0.x, self.0.y, self.0.z]
    }

    /// Component-wise running minimum, used for bounding accumulation.
    pub fn min(&self, other: &BchVector3) -> BchVector3 {
        BchVector3(Vector3::new(
            self.0.x.min(other.0.x),
            self.0.y.min(other.0.y),
            self.0.z.min(other.0.z),
        ))
    }

    /// Component-wise running maximum, used for bounding accumulation.
    pub fn max(&self, other: &BchVector3) -> BchVector3 {
        BchVector3(Vector3::new(
            self.0.x.max(other.0.x),
            self.0.y.max(other.0.y),
            self.0.z.max(other.0.z),
        ))
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[br(little)]
pub struct BchVector4(
    #[br(map = |raw: [f32; 4]| Vector4::new(raw[0], raw[1], raw[2], raw[3]))]
    #[bw(map = |v: &Vector4<f32>| [v.x, v.y, v.z, v.w])]
    pub Vector4<f32>,
);

impl Default for BchVector4 {
    fn default() -> Self {
        Self(Vector4::new(0.0, 0.0, 0.0, 0.0))
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[br(little)]
pub struct BchQuaternion(
    #[br(map = |raw: [f32; 4]| Quaternion::new(raw[3], raw[0], raw[1], raw[2]))]
    #[bw(map = |q: &Quaternion<f32>| [q.v.x, q.v.y, q.v.z, q.s])]
    pub Quaternion<f32>,
);

impl Default for BchQuaternion {
    fn default() -> Self {
        Self(Quaternion::new(1.0, 0.0, 0.0, 0.0))
    }
}

impl BchQuaternion {
    pub fn to_slice(&self) -> [f32; 4] {
        let q = &self.0;
        [q.v.x, q.v.y, q.v.z, q.s]
    }

    /// Spherical linear interpolation taking the shorter arc.
    pub fn slerp(&self, other: &BchQuaternion, t: f32) -> BchQuaternion {
        let mut q1 = other.0;
        let dot = self.0.s * other.0.s
            + self.0.v.x * other.0.v.x
            + self.0.v.y * other.0.v.y
            + self.0.v.z * other.0.v.z;
        if dot < 0.0 {
            q1 = Quaternion::new(-q1.s, -q1.v.x, -q1.v.y, -q1.v.z);
        }

        let result = self.0.slerp(q1, t);
        BchQuaternion(result.normalize())
    }
}

/// A 4x3 transform stored row-major on disk (three rows of four floats);
/// expanded to a cgmath column-major 4x4 with an implicit (0,0,0,1) bottom row.
#[binrw]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[br(little)]
pub struct BchMatrix43(
    #[br(map = |raw: [f32; 12]| Matrix4::new(
        raw[0], raw[4], raw[8], 0.0,
        raw[1], raw[5], raw[9], 0.0,
        raw[2], raw[6], raw[10], 0.0,
        raw[3], raw[7], raw[11], 1.0,
    ))]
    #[bw(map = |m: &Matrix4<f32>| [
        m.x.x, m.y.x, m.z.x, m.w.x,
        m.x.y, m.y.y, m.z.y, m.w.y,
        m.x.z, m.y.z, m.z.z, m.w.z,
    ])]
    pub Matrix4<f32>,
);

impl Default for BchMatrix43 {
    fn default() -> Self {
        use cgmath::SquareMatrix;
        BchMatrix43(Matrix4::identity())
    }
}

impl BchMatrix43 {
    pub fn to_slice(&self) -> [f32; 16] {
        let m = &self.0;
        [
            m.x.x, m.x.y, m.x.z, m.x.w, m.y.x, m.y.y, m.y.z, m.y.w, m.z.x, m.z.y, m.z.z, m.z.w,
            m.w.x, m.w.y, m.w.z, m.w.w,
        ]
    }
}

/// An RGBA color with float components, as stored in material color blocks.
#[binrw]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[br(little)]
pub struct BchColorF {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl BchColorF {
    /// Saturate each channel to [0, 1] and pack as 0xAABBGGRR.
    pub fn to_packed(&self) -> u32 {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0) as u32;
        (quantize(self.a) << 24) | (quantize(self.b) << 16) | (quantize(self.g) << 8) | quantize(self.r)
    }
}

/// Local transform in the engine's composition order: scale, then the three
/// axis rotations X, Y, Z, then translation (row-vector chain), applied here
/// as the equivalent column-vector product T * Rz * Ry * Rx * S.
pub fn srt_matrix(scale: Vector3<f32>, rotation: Vector3<f32>, translation: Vector3<f32>) -> Matrix4<f32> {
    let s = Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z);
    let rx = Matrix4::from_angle_x(Rad(rotation.x));
    let ry = Matrix4::from_angle_y(Rad(rotation.y));
    let rz = Matrix4::from_angle_z(Rad(rotation.z));
    let t = Matrix4::from_translation(translation);

    t * rz * ry * rx * s
}

/// Transform a point by a 4x4 matrix (w assumed 1).
pub fn transform_point(m: &Matrix4<f32>, p: Vector3<f32>) -> Vector3<f32> {
    let v = m * Vector4::new(p.x, p.y, p.z, 1.0);
    Vector3::new(v.x, v.y, v.z)
}
