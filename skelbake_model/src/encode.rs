//! Pack bone transforms into RGBA32F texels.
//!
//! Each bone uses three consecutive texels in a row.
//! Texel `r` stores row `r` of the 3x4 affine portion of the matrix.
//! The implicit fourth row is always `[0, 0, 0, 1]`.
use glam::{Mat4, Vec4};

/// A single RGBA32F texel.
pub type Texel = [f32; 4];

/// The number of texels used to store one bone transform.
pub const TEXELS_PER_BONE: usize = 3;

const AFFINE_EPSILON: f32 = 1e-5;

/// Encode the first three rows of `transform`.
pub fn encode_transform(transform: &Mat4) -> [Texel; TEXELS_PER_BONE] {
    [
        transform.row(0).to_array(),
        transform.row(1).to_array(),
        transform.row(2).to_array(),
    ]
}

/// Reconstruct the matrix from texels written by [encode_transform].
pub fn decode_transform(texels: &[Texel; TEXELS_PER_BONE]) -> Mat4 {
    Mat4::from_cols(
        Vec4::from(texels[0]),
        Vec4::from(texels[1]),
        Vec4::from(texels[2]),
        Vec4::W,
    )
    .transpose()
}

/// Returns `true` if `transform` is finite with a bottom row of `[0, 0, 0, 1]`.
pub fn is_affine(transform: &Mat4) -> bool {
    transform.is_finite() && transform.row(3).abs_diff_eq(Vec4::W, AFFINE_EPSILON)
}

/// Write the texels for `bone` in `row` of an atlas with `width` texels per row.
pub fn write_bone_texels(
    texels: &mut [Texel],
    width: usize,
    bone: usize,
    row: usize,
    transform: &Mat4,
) {
    let start = row * width + bone * TEXELS_PER_BONE;
    texels[start..start + TEXELS_PER_BONE].copy_from_slice(&encode_transform(transform));
}

#[cfg(test)]
mod tests {
    use super::*;

    use glam::{Quat, vec3};
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_rows() {
        let transform = Mat4::from_cols_array_2d(&[
            [1.0, 5.0, 9.0, 0.0],
            [2.0, 6.0, 10.0, 0.0],
            [3.0, 7.0, 11.0, 0.0],
            [4.0, 8.0, 12.0, 1.0],
        ]);
        assert_eq!(
            [
                [1.0, 2.0, 3.0, 4.0],
                [5.0, 6.0, 7.0, 8.0],
                [9.0, 10.0, 11.0, 12.0]
            ],
            encode_transform(&transform)
        );
    }

    #[test]
    fn decode_encoded_affine_is_exact() {
        let sheared = Mat4::from_scale(vec3(3.0, 0.25, 1.0)) * Mat4::from_rotation_y(0.7);
        let transforms = [
            Mat4::IDENTITY,
            Mat4::from_scale_rotation_translation(
                vec3(1.5, 0.5, 2.0),
                Quat::from_rotation_z(0.3),
                vec3(-1.0, 4.0, 0.25),
            ),
            Mat4::from_translation(vec3(1.0e7, -3.5e6, -0.001)),
            Mat4::from_scale_rotation_translation(
                vec3(-1.0, 1.0e-3, 250.0),
                Quat::from_euler(glam::EulerRot::XYZ, 1.0, -2.0, 0.5),
                vec3(-12345.678, 0.0, 98765.43),
            ),
            sheared * Mat4::from_translation(vec3(-4.0, 8.0, -16.0)),
        ];
        for transform in transforms {
            assert_eq!(transform, decode_transform(&encode_transform(&transform)));
        }
    }

    #[test]
    fn affine_check() {
        assert!(is_affine(&Mat4::IDENTITY));
        assert!(is_affine(&Mat4::from_translation(vec3(1.0, 2.0, 3.0))));
        assert!(!is_affine(&Mat4::perspective_rh(1.0, 1.0, 0.1, 10.0)));
        assert!(!is_affine(&Mat4::from_translation(vec3(f32::NAN, 0.0, 0.0))));
    }

    #[test]
    fn write_bone_texels_position() {
        let width = 2 * TEXELS_PER_BONE;
        let mut texels = vec![[0.0; 4]; width * 2];
        let transform = Mat4::from_translation(vec3(1.0, 2.0, 3.0));
        write_bone_texels(&mut texels, width, 1, 1, &transform);

        assert_eq!(vec![[0.0; 4]; 9], texels[..9].to_vec());
        assert_eq!(
            vec![
                [1.0, 0.0, 0.0, 1.0],
                [0.0, 1.0, 0.0, 2.0],
                [0.0, 0.0, 1.0, 3.0]
            ],
            texels[9..].to_vec()
        );
    }
}
