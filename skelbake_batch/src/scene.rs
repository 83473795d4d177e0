//! A procedural skeleton, clip set, and mesh for exercising the full pipeline.
use std::collections::BTreeMap;
use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3, vec3};
use ordered_float::OrderedFloat;
use skelbake_model::{
    AnimationClip, Bone, Skeleton, Track, Transform, VertexDeclaration, VertexElement,
    VertexFormat, VertexSemantic,
};

const BONE_LENGTH: f32 = 0.5;
const KEYFRAMES: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub bone_index: u32,
}

pub struct Mesh {
    pub declaration: VertexDeclaration,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

/// A single chain of bones pointing up.
pub fn skeleton(bone_count: usize) -> Skeleton {
    Skeleton {
        bones: (0..bone_count)
            .map(|i| Bone {
                name: format!("bone{i}"),
                transform: Transform {
                    translation: if i == 0 {
                        Vec3::ZERO
                    } else {
                        vec3(0.0, BONE_LENGTH, 0.0)
                    },
                    ..Transform::IDENTITY
                },
                parent_index: i.checked_sub(1),
            })
            .collect(),
    }
}

/// Looping clips that sway each bone with a different speed and amplitude.
pub fn clips(bone_count: usize) -> Vec<AnimationClip> {
    [("walk", 1.0, 0.3), ("run", 1.5, 0.6), ("idle", 0.7, 0.1)]
        .into_iter()
        .map(|(name, duration, amplitude)| sway(name, duration, amplitude, bone_count))
        .collect()
}

fn sway(name: &str, duration: f32, amplitude: f32, bone_count: usize) -> AnimationClip {
    let tracks = (0..bone_count)
        .map(|bone_index| {
            let phase = bone_index as f32 * 0.25;
            // Start and end on the same pose so the clip loops smoothly.
            let rotation_keyframes: BTreeMap<_, _> = (0..=KEYFRAMES)
                .map(|k| {
                    let t = k as f32 / KEYFRAMES as f32;
                    let angle = amplitude * (TAU * t + phase).sin();
                    (OrderedFloat(t * duration), Quat::from_rotation_z(angle))
                })
                .collect();

            Track {
                bone_index,
                rotation_keyframes,
                ..Default::default()
            }
        })
        .collect();

    AnimationClip {
        name: name.to_string(),
        duration,
        sample_rate: KEYFRAMES as f32 / duration,
        looping: true,
        tracks,
    }
}

/// A thin quad along each bone in the rest pose.
pub fn mesh(skeleton: &Skeleton) -> Mesh {
    let declaration = VertexDeclaration {
        elements: vec![
            VertexElement {
                format: VertexFormat::Float32x3,
                semantic: VertexSemantic::Position,
                semantic_index: 0,
                stream_index: 0,
                instance_step_rate: 0,
            },
            VertexElement {
                format: VertexFormat::Uint32,
                semantic: VertexSemantic::BlendIndices,
                semantic_index: 0,
                stream_index: 0,
                instance_step_rate: 0,
            },
        ],
    };

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for (i, transform) in skeleton.model_space_transforms().iter().enumerate() {
        let start = vertices.len() as u32;
        for offset in [
            vec3(-0.05, 0.0, 0.0),
            vec3(0.05, 0.0, 0.0),
            vec3(0.05, BONE_LENGTH, 0.0),
            vec3(-0.05, BONE_LENGTH, 0.0),
        ] {
            vertices.push(MeshVertex {
                position: transform.transform_point3(offset).to_array(),
                bone_index: i as u32,
            });
        }
        indices.extend([start, start + 1, start + 2, start, start + 2, start + 3]);
    }

    Mesh {
        declaration,
        vertices,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use skelbake_model::{SkinnedSkeleton, bake_pose_atlas};

    #[test]
    fn demo_scene_bakes() {
        let skeleton = skeleton(4);
        assert!(skeleton.validate());

        let atlas = bake_pose_atlas(&SkinnedSkeleton::new(skeleton), &clips(4), 10.0).unwrap();
        assert_eq!(12, atlas.width);
        assert_eq!(35, atlas.height);
    }

    #[test]
    fn demo_mesh_matches_declaration() {
        let mesh = mesh(&skeleton(3));
        assert_eq!(12, mesh.vertices.len());
        assert_eq!(18, mesh.indices.len());
        assert_eq!(
            std::mem::size_of::<MeshVertex>() as u32,
            mesh.declaration.stream_stride(0)
        );
    }
}
