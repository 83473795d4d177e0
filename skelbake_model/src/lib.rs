//! # skelbake_model
//! skelbake_model bakes skeletal animation clips into a pose atlas texture
//! and manages the per instance playback state for drawing animated crowds.
//!
//! The crate has no rendering dependencies.
//! Texture and buffer creation are provided by implementing [TextureFactory] and [InstanceBufferTarget].
//!
//! # Getting Started
//! ```rust no_run
//! use skelbake_model::{CrowdConfig, InstanceStore, InstanceUpdater, SkinnedSkeleton, bake_pose_atlas};
//!
//! # fn load() -> (skelbake_model::Skeleton, Vec<skelbake_model::AnimationClip>) { todo!() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (skeleton, clips) = load();
//! let config = CrowdConfig::default();
//!
//! let atlas = bake_pose_atlas(&SkinnedSkeleton::new(skeleton), &clips, config.fps)?;
//! let mut store = InstanceStore::new(&config, &atlas.layout)?;
//! let mut updater = InstanceUpdater::new(atlas.layout.clone(), config.fps, &store)?;
//! let records = updater.tick(&mut store, 1.0 / 60.0);
//! # Ok(())
//! # }
//! ```

pub use animation::{AnimationClip, Track};
pub use atlas::{
    PixelFormat, PoseAtlas, TextureDescriptor, TextureFactory, bake_pose_atlas, bake_pose_texture,
};
pub use command::{Drained, UpdateCommand, UpdateReceiver, UpdateSender, update_channel};
pub use config::CrowdConfig;
pub use encode::{TEXELS_PER_BONE, Texel, decode_transform, encode_transform};
pub use instance::{InstanceId, InstanceState, InstanceStore, InstanceVertex};
pub use layout::{ClipDescriptor, ClipLayout, ClipLayoutEntry, ClipSource, plan_clip_layout};
pub use pose::{BoneMask, LocalPose, PoseEvaluator, PoseSampler, SkinnedSkeleton};
pub use skeleton::{Bone, Skeleton};
pub use transform::Transform;
pub use update::{FramesInFlight, InstanceBufferTarget, InstanceUpdater};
pub use vertex::{
    BufferUsage, InstanceBufferDescriptor, InstanceField, InstancedLayout, VertexDeclaration,
    VertexElement, VertexFormat, VertexSemantic, build_instanced_layout,
};

pub mod animation;
pub mod atlas;
pub mod command;
pub mod config;
pub mod encode;
pub mod error;
pub mod instance;
pub mod layout;
pub mod pose;
pub mod skeleton;
mod transform;
pub mod update;
pub mod vertex;

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use approx::assert_relative_eq;
    use glam::{Quat, vec3};
    use ordered_float::OrderedFloat;
    use pretty_assertions::assert_eq;

    fn skeleton() -> Skeleton {
        Skeleton {
            bones: vec![
                Bone {
                    name: "hips".to_string(),
                    transform: Transform::IDENTITY,
                    parent_index: None,
                },
                Bone {
                    name: "leg".to_string(),
                    transform: Transform {
                        translation: vec3(0.0, -1.0, 0.0),
                        ..Transform::IDENTITY
                    },
                    parent_index: Some(0),
                },
            ],
        }
    }

    fn swing(name: &str, duration: f32) -> AnimationClip {
        AnimationClip {
            name: name.to_string(),
            duration,
            sample_rate: 30.0,
            looping: true,
            tracks: vec![Track {
                bone_index: 1,
                rotation_keyframes: BTreeMap::from([
                    (OrderedFloat(0.0), Quat::IDENTITY),
                    (OrderedFloat(duration * 0.5), Quat::from_rotation_x(0.5)),
                    (OrderedFloat(duration), Quat::IDENTITY),
                ]),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn bake_and_play_crowd() {
        let clips = [swing("walk", 1.0), swing("run", 1.5), swing("idle", 0.7)];
        let atlas = bake_pose_atlas(&SkinnedSkeleton::new(skeleton()), &clips, 10.0).unwrap();

        assert_eq!(6, atlas.width);
        assert_eq!(35, atlas.height);
        assert_eq!(
            vec![(0, 11), (11, 16), (27, 8)],
            atlas
                .layout
                .entries
                .iter()
                .map(|e| (e.start_frame, e.num_frames))
                .collect::<Vec<_>>()
        );

        let mut store = InstanceStore::empty();
        let id = store.insert(glam::Vec3::ZERO, 1, &atlas.layout).unwrap();
        let mut updater = InstanceUpdater::new(atlas.layout.clone(), 10.0, &store).unwrap();

        let (sender, receiver) = update_channel();
        sender.tick(1.6).unwrap();
        receiver.drain(|c| updater.apply(&mut store, c).unwrap());

        assert_relative_eq!(12.0, store.get(id).unwrap().frame, epsilon = 0.0001);
        assert_eq!(12.0, updater.records()[0].current_row);

        // The rows used for drawing hold valid transforms.
        assert!(atlas.bone_transform(1, 12).is_some());
        assert_eq!(atlas.bone_transform(1, 11), atlas.bone_transform(1, 26));
    }

    #[test]
    fn instanced_layout_matches_records() {
        let layout = build_instanced_layout::<InstanceVertex>(
            &VertexDeclaration::default(),
            InstanceVertex::FIELDS,
            CrowdConfig::default().instance_count,
        )
        .unwrap();
        assert_eq!(
            std::mem::size_of::<InstanceVertex>() as u32,
            layout.buffer.vertex_size
        );
    }
}
