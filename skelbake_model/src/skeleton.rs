use glam::Affine3A;
use log::{error, warn};

use crate::Transform;

/// A hierarchy of bones with a rest pose.
///
/// Bones are expected to appear after their parents.
/// This makes accumulating transforms a single forward pass.
#[derive(Debug, PartialEq, Clone)]
pub struct Skeleton {
    /// The hierarchy of bones in the skeleton.
    pub bones: Vec<Bone>,
}

/// A single node in the skeleton heirarchy.
#[derive(Debug, PartialEq, Clone)]
pub struct Bone {
    /// The name used by clips to identify this bone.
    pub name: String,
    /// The local transform of the bone relative to its parent.
    pub transform: Transform,
    /// The index of the parent [Bone] in [bones](struct.Skeleton.html#structfield.bones)
    /// or `None` if this is a root bone.
    pub parent_index: Option<usize>,
}

impl Skeleton {
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Check the ordering constraints required by [Self::model_space_transforms].
    /// Returns `false` if any bone has a parent that is out of range or appears after the bone.
    pub fn validate(&self) -> bool {
        let mut is_valid = true;
        for (i, bone) in self.bones.iter().enumerate() {
            if let Some(p) = bone.parent_index
                && i <= p
            {
                error!("Bone {i} appears before parent {p} and will not animate properly.");
                is_valid = false;
            }
        }

        let root_bone_count = self.bones.iter().filter(|b| b.parent_index.is_none()).count();
        if root_bone_count > 1 {
            warn!("Skeleton contains {root_bone_count} root bones.");
        }

        is_valid
    }

    /// The global transform for each bone in model space
    /// by recursively applying the parent transform.
    ///
    /// This is also known as the bone's "rest pose" or "bind pose".
    pub fn model_space_transforms(&self) -> Vec<Affine3A> {
        let mut final_transforms: Vec<_> = self
            .bones
            .iter()
            .map(|b| b.transform.to_affine())
            .collect();

        for i in 0..final_transforms.len() {
            if let Some(parent) = self.bones[i].parent_index.filter(|p| *p < i) {
                final_transforms[i] = final_transforms[parent] * final_transforms[i];
            }
        }

        final_transforms
    }

    /// The inverse of each bone's [model space](Self::model_space_transforms) rest transform.
    pub fn inverse_bind_transforms(&self) -> Vec<Affine3A> {
        self.model_space_transforms()
            .into_iter()
            .map(|t| t.inverse())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::relative_eq;
    use glam::{Mat4, Quat, Vec3, Vec4, vec3};

    fn bone(name: &str, y: f32, parent_index: Option<usize>) -> Bone {
        Bone {
            name: name.to_string(),
            transform: Transform {
                translation: vec3(0.0, y, 0.0),
                ..Transform::IDENTITY
            },
            parent_index,
        }
    }

    #[test]
    fn model_space_transforms_empty() {
        assert!(
            Skeleton { bones: Vec::new() }
                .model_space_transforms()
                .is_empty()
        );
    }

    #[test]
    fn model_space_transforms_chain() {
        let skeleton = Skeleton {
            bones: vec![
                bone("root", 1.0, None),
                bone("spine", 2.0, Some(0)),
                bone("head", 3.0, Some(1)),
            ],
        };
        let translations: Vec<_> = skeleton
            .model_space_transforms()
            .iter()
            .map(|t| Vec3::from(t.translation))
            .collect();
        assert_eq!(
            vec![vec3(0.0, 1.0, 0.0), vec3(0.0, 3.0, 0.0), vec3(0.0, 6.0, 0.0)],
            translations
        );
    }

    #[test]
    fn inverse_bind_undoes_rest_pose() {
        let skeleton = Skeleton {
            bones: vec![
                Bone {
                    name: "root".to_string(),
                    transform: Transform {
                        translation: vec3(1.0, 2.0, 3.0),
                        rotation: Quat::from_rotation_y(0.5),
                        scale: vec3(2.0, 2.0, 2.0),
                    },
                    parent_index: None,
                },
                bone("child", 1.0, Some(0)),
            ],
        };
        let rest = skeleton.model_space_transforms();
        for (transform, inverse_bind) in rest.iter().zip(skeleton.inverse_bind_transforms()) {
            let product = Mat4::from(*transform * inverse_bind);
            assert!(
                product
                    .to_cols_array()
                    .iter()
                    .zip(Mat4::IDENTITY.to_cols_array().iter())
                    .all(|(a, b)| relative_eq!(a, b, epsilon = 0.0001f32)),
                "{product:?}"
            );
            assert_eq!(Vec4::W, Mat4::from(inverse_bind).row(3));
        }
    }

    #[test]
    fn model_space_transforms_scaled_parent() {
        let skeleton = Skeleton {
            bones: vec![
                Bone {
                    name: "root".to_string(),
                    transform: Transform {
                        scale: vec3(2.0, 2.0, 2.0),
                        ..Transform::IDENTITY
                    },
                    parent_index: None,
                },
                bone("child", 1.0, Some(0)),
            ],
        };
        let transforms = skeleton.model_space_transforms();
        assert_eq!(vec3(0.0, 2.0, 0.0), Vec3::from(transforms[1].translation));
        // The child inherits the parent scale.
        assert_eq!(
            vec3(0.0, 4.0, 0.0),
            transforms[1].transform_point3(vec3(0.0, 1.0, 0.0))
        );
    }

    #[test]
    fn validate_parent_order() {
        assert!(
            Skeleton {
                bones: vec![bone("a", 0.0, None), bone("b", 0.0, Some(0))]
            }
            .validate()
        );
        assert!(
            !Skeleton {
                bones: vec![bone("a", 0.0, Some(1)), bone("b", 0.0, None)]
            }
            .validate()
        );
    }

    #[test]
    fn bone_index_by_name() {
        let skeleton = Skeleton {
            bones: vec![bone("a", 0.0, None), bone("b", 0.0, Some(0))],
        };
        assert_eq!(Some(1), skeleton.bone_index("b"));
        assert_eq!(None, skeleton.bone_index("c"));
    }
}
