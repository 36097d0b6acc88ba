//! Column-major 4x4 matrices stored as `[f32; 16]`.
//!
//! `idx(r, c) = c * 4 + r`, so the translation lives in elements 12..15 and
//! matrices apply to column vectors (`m * v`).

pub type Mat4 = [f32; 16];

pub const MAT4_IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

/// `a * b`: applying the result applies `b` first, then `a`.
pub fn mat4_mul(a: Mat4, b: Mat4) -> Mat4 {
    let mut out = [0.0f32; 16];
    for c in 0..4 {
        for r in 0..4 {
            out[c * 4 + r] = (0..4).map(|k| a[k * 4 + r] * b[c * 4 + k]).sum();
        }
    }
    out
}

pub fn mat4_translate(tx: f32, ty: f32, tz: f32) -> Mat4 {
    [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, tx, ty, tz, 1.0,
    ]
}

pub fn mat4_scale(sx: f32, sy: f32, sz: f32) -> Mat4 {
    [
        sx, 0.0, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 0.0, sz, 0.0, 0.0, 0.0, 0.0, 1.0,
    ]
}

/// Rotation from a unit quaternion in `[x, y, z, w]` order.
pub fn mat4_from_quat([x, y, z, w]: [f32; 4]) -> Mat4 {
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);
    [
        1.0 - 2.0 * (yy + zz),
        2.0 * (xy + wz),
        2.0 * (xz - wy),
        0.0,
        2.0 * (xy - wz),
        1.0 - 2.0 * (xx + zz),
        2.0 * (yz + wx),
        0.0,
        2.0 * (xz + wy),
        2.0 * (yz - wx),
        1.0 - 2.0 * (xx + yy),
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    ]
}

/// `T * R * S`: scale first, then rotate, then translate.
pub fn mat4_from_trs(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Mat4 {
    let [tx, ty, tz] = translation;
    let [sx, sy, sz] = scale;
    mat4_mul(
        mat4_translate(tx, ty, tz),
        mat4_mul(mat4_from_quat(rotation), mat4_scale(sx, sy, sz)),
    )
}

pub fn mat4_transform_point(m: &Mat4, [x, y, z]: [f32; 3]) -> [f32; 3] {
    [
        m[0] * x + m[4] * y + m[8] * z + m[12],
        m[1] * x + m[5] * y + m[9] * z + m[13],
        m[2] * x + m[6] * y + m[10] * z + m[14],
    ]
}
