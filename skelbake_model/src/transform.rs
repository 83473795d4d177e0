use glam::{Affine3A, Quat, Vec3};

/// A decomposed transform as scale -> rotation -> translation (TRS).
///
/// Parent and child transforms are combined with [Transform::to_affine]
/// since the product of two TRS transforms may include shear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// The equivalent affine transform.
    /// Converting through [Affine3A] keeps the bottom matrix row exactly `[0, 0, 0, 1]`.
    pub fn to_affine(self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
