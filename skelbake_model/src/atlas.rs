//! Bake every frame of a clip set into a single RGBA32F texture.
//!
//! The atlas is `bone_count * 3` texels wide with one row per sampled frame.
//! Rows for each clip are assigned by [plan_clip_layout].
use glam::Mat4;
use log::{debug, info};
use rayon::prelude::*;

use crate::{
    encode::{TEXELS_PER_BONE, Texel, decode_transform, write_bone_texels},
    error::BakePoseAtlasError,
    layout::{ClipLayout, ClipLayoutEntry, ClipSource, plan_clip_layout},
    pose::{PoseEvaluator, PoseSampler},
};

/// Baked skinning transforms for every bone and frame.
#[derive(Debug, PartialEq, Clone)]
pub struct PoseAtlas {
    /// The width in texels.
    pub width: usize,
    /// The height in texels. This is the total frame count of the layout.
    pub height: usize,
    /// The rows assigned to each clip.
    pub layout: ClipLayout,
    /// The sample rate used for baking in frames per second.
    pub fps: f32,
    /// Row major texel data with `width * height` texels.
    pub pixels: Vec<Texel>,
}

/// Supported texture formats for baked data.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PixelFormat {
    /// Four 32-bit floating point channels.
    Rgba32Float,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba32Float => 16,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: PixelFormat,
}

/// Creates textures for a rendering backend.
pub trait TextureFactory {
    type Texture;

    /// Create a texture from tightly packed row major `texels`.
    fn create_texture(&mut self, descriptor: &TextureDescriptor, texels: &[Texel]) -> Self::Texture;
}

impl PoseAtlas {
    pub fn bone_count(&self) -> usize {
        self.width / TEXELS_PER_BONE
    }

    pub fn texel(&self, x: usize, y: usize) -> Option<Texel> {
        if x < self.width {
            self.pixels.get(y * self.width + x).copied()
        } else {
            None
        }
    }

    /// The three texels storing the transform of `bone` at atlas `row`.
    pub fn bone_texels(&self, bone: usize, row: usize) -> Option<[Texel; TEXELS_PER_BONE]> {
        if bone >= self.bone_count() {
            return None;
        }
        let start = row * self.width + bone * TEXELS_PER_BONE;
        self.pixels
            .get(start..start + TEXELS_PER_BONE)?
            .try_into()
            .ok()
    }

    /// The decoded transform of `bone` at atlas `row`.
    pub fn bone_transform(&self, bone: usize, row: usize) -> Option<Mat4> {
        self.bone_texels(bone, row).map(|t| decode_transform(&t))
    }

    /// The texel data as bytes for uploading to the GPU.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn texture_descriptor(&self) -> TextureDescriptor {
        TextureDescriptor {
            width: self.width as u32,
            height: self.height as u32,
            depth: 1,
            format: PixelFormat::Rgba32Float,
        }
    }
}

/// Bake the atlas and create a texture with `factory`.
pub fn bake_pose_texture<E, F>(
    evaluator: &E,
    clips: &[E::Clip],
    fps: f32,
    factory: &mut F,
) -> Result<(PoseAtlas, F::Texture), BakePoseAtlasError>
where
    E: PoseEvaluator + Sync,
    E::Clip: Sync,
    F: TextureFactory,
{
    let atlas = bake_pose_atlas(evaluator, clips, fps)?;
    let texture = factory.create_texture(&atlas.texture_descriptor(), &atlas.pixels);
    Ok((atlas, texture))
}

/// Sample every clip at `fps` and store each bone's transform in the atlas.
///
/// Clips are baked in parallel since each clip writes a disjoint band of rows.
/// Any non affine transform aborts the entire bake.
#[tracing::instrument(skip_all)]
pub fn bake_pose_atlas<E>(
    evaluator: &E,
    clips: &[E::Clip],
    fps: f32,
) -> Result<PoseAtlas, BakePoseAtlasError>
where
    E: PoseEvaluator + Sync,
    E::Clip: Sync,
{
    for (i, clip) in clips.iter().enumerate() {
        evaluator.validate_clip(i, clip)?;
    }

    let layout = plan_clip_layout(clips, fps)?;
    if layout.total_frames <= 1 {
        return Err(BakePoseAtlasError::EmptyAnimationSet {
            total_frames: layout.total_frames,
        });
    }

    let bone_count = evaluator.bone_count();
    if bone_count == 0 {
        return Err(BakePoseAtlasError::NoBones);
    }

    let height = layout.total_frames;
    let width = bone_count
        .checked_mul(TEXELS_PER_BONE)
        .ok_or(BakePoseAtlasError::TooLarge {
            width: usize::MAX,
            height,
        })?;
    let texel_count = width
        .checked_mul(height)
        .ok_or(BakePoseAtlasError::TooLarge { width, height })?;
    info!(
        "Bake {} clips with {} bones and {} frames at {} fps",
        clips.len(),
        bone_count,
        height,
        fps
    );

    let mut pixels = vec![[0.0; 4]; texel_count];

    // Split the texels into the band of rows for each clip.
    let mut blocks = Vec::with_capacity(layout.len());
    let mut remaining = pixels.as_mut_slice();
    for entry in &layout.entries {
        let (block, rest) = remaining.split_at_mut(entry.num_frames * width);
        blocks.push((entry, block));
        remaining = rest;
    }

    let coverage = blocks
        .into_par_iter()
        .map(|(entry, block)| {
            bake_clip_block(evaluator, &clips[entry.clip_index], entry, fps, width, block)
        })
        .collect::<Result<Vec<_>, _>>()?;

    check_coverage(coverage.iter().flatten().copied(), width)?;

    Ok(PoseAtlas {
        width,
        height,
        layout,
        fps,
        pixels,
    })
}

/// Bake the rows for a single clip and return how many times each texel was written.
fn bake_clip_block<E: PoseEvaluator>(
    evaluator: &E,
    clip: &E::Clip,
    entry: &ClipLayoutEntry,
    fps: f32,
    width: usize,
    block: &mut [Texel],
) -> Result<Vec<u32>, BakePoseAtlasError> {
    debug!(
        "Bake clip {} with duration {} and {} frames",
        entry.clip_index,
        clip.duration(),
        entry.num_frames
    );

    let mut sampler = PoseSampler::new(evaluator.bone_count());
    let mut coverage = vec![0u32; block.len()];

    for frame in 0..entry.num_frames {
        let time = frame as f32 / fps;
        let transforms = sampler
            .sample(evaluator, clip, time, entry.looping)
            .map_err(|e| BakePoseAtlasError::SkeletonConsistency {
                clip_index: entry.clip_index,
                frame,
                bone_index: e.bone_index,
            })?;

        for (bone, transform) in transforms.iter().enumerate() {
            write_bone_texels(block, width, bone, frame, transform);

            let start = frame * width + bone * TEXELS_PER_BONE;
            for count in &mut coverage[start..start + TEXELS_PER_BONE] {
                *count += 1;
            }
        }
    }

    Ok(coverage)
}

fn check_coverage(
    coverage: impl Iterator<Item = u32>,
    width: usize,
) -> Result<(), BakePoseAtlasError> {
    for (i, count) in coverage.enumerate() {
        if count != 1 {
            return Err(BakePoseAtlasError::AtlasCoverage {
                x: i % width,
                y: i / width,
                count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use approx::relative_eq;
    use glam::{Quat, Vec3, vec3};
    use ordered_float::OrderedFloat;
    use pretty_assertions::assert_eq;

    use crate::{
        AnimationClip, Bone, Skeleton, SkinnedSkeleton, Track, Transform,
        layout::ClipDescriptor,
        pose::{BoneMask, LocalPose},
    };

    fn skeleton() -> SkinnedSkeleton {
        SkinnedSkeleton::new(Skeleton {
            bones: vec![
                Bone {
                    name: "root".to_string(),
                    transform: Transform::IDENTITY,
                    parent_index: None,
                },
                Bone {
                    name: "tip".to_string(),
                    transform: Transform {
                        translation: vec3(0.0, 1.0, 0.0),
                        ..Transform::IDENTITY
                    },
                    parent_index: Some(0),
                },
            ],
        })
    }

    fn slide(duration: f32, looping: bool) -> AnimationClip {
        AnimationClip {
            name: "slide".to_string(),
            duration,
            sample_rate: 30.0,
            looping,
            tracks: vec![Track {
                bone_index: 0,
                translation_keyframes: BTreeMap::from([
                    (OrderedFloat(0.0), Vec3::ZERO),
                    (OrderedFloat(duration), vec3(duration, 0.0, 0.0)),
                ]),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn bake_three_clips_dimensions() {
        let clips = [slide(1.0, true), slide(1.5, true), slide(0.7, true)];
        let atlas = bake_pose_atlas(&skeleton(), &clips, 10.0).unwrap();

        assert_eq!(6, atlas.width);
        assert_eq!(35, atlas.height);
        assert_eq!(6 * 35, atlas.pixels.len());
        assert_eq!(6 * 35 * 16, atlas.as_bytes().len());
        assert_eq!(
            vec![0, 11, 27],
            atlas
                .layout
                .entries
                .iter()
                .map(|e| e.start_frame)
                .collect::<Vec<_>>()
        );
        assert_eq!(
            TextureDescriptor {
                width: 6,
                height: 35,
                depth: 1,
                format: PixelFormat::Rgba32Float
            },
            atlas.texture_descriptor()
        );
    }

    #[test]
    fn bake_rows_match_sampled_poses() {
        let skeleton = skeleton();
        let clips = [slide(1.0, true), slide(0.5, false)];
        let atlas = bake_pose_atlas(&skeleton, &clips, 10.0).unwrap();

        let mut sampler = PoseSampler::new(2);
        for entry in &atlas.layout.entries {
            for frame in 0..entry.num_frames {
                let expected = sampler
                    .sample(
                        &skeleton,
                        &clips[entry.clip_index],
                        frame as f32 / 10.0,
                        entry.looping,
                    )
                    .unwrap()
                    .to_vec();
                for (bone, transform) in expected.iter().enumerate() {
                    assert_eq!(
                        Some(*transform),
                        atlas.bone_transform(bone, entry.start_frame + frame)
                    );
                }
            }
        }
    }

    #[test]
    fn bake_loop_seam_matches_first_frame() {
        let clips = [slide(1.0, true)];
        let atlas = bake_pose_atlas(&skeleton(), &clips, 10.0).unwrap();
        let entry = atlas.layout.entries[0];
        for bone in 0..2 {
            assert_eq!(
                atlas.bone_texels(bone, entry.start_frame),
                atlas.bone_texels(bone, entry.end_frame())
            );
        }
    }

    #[test]
    fn bake_texel_layout() {
        let clips = [slide(1.0, false)];
        let atlas = bake_pose_atlas(&skeleton(), &clips, 10.0).unwrap();

        // Root translation at frame 5 is stored in the last column of each row.
        let transform = atlas.bone_transform(0, 5).unwrap();
        assert!(relative_eq!(0.5, transform.w_axis.x, epsilon = 0.0001));
        assert_eq!(atlas.texel(2, 5), atlas.bone_texels(0, 5).map(|t| t[2]));
        assert_eq!(Some(glam::Vec4::W), atlas.bone_transform(1, 5).map(|t| t.row(3)));
        assert_eq!(None, atlas.texel(6, 0));
        assert_eq!(None, atlas.bone_texels(2, 0));
    }

    #[test]
    fn bake_single_clip() {
        let atlas = bake_pose_atlas(&skeleton(), &[slide(1.0, true)], 10.0).unwrap();
        assert_eq!(11, atlas.height);
    }

    #[test]
    fn bake_empty_animation_set() {
        assert_eq!(
            Err(BakePoseAtlasError::EmptyAnimationSet { total_frames: 0 }),
            bake_pose_atlas(&skeleton(), &[], 10.0)
        );
        assert_eq!(
            Err(BakePoseAtlasError::EmptyAnimationSet { total_frames: 1 }),
            bake_pose_atlas(&skeleton(), &[slide(0.1, false)], 10.0)
        );
    }

    #[test]
    fn bake_invalid_clip() {
        let mut clip = slide(1.0, true);
        clip.tracks[0].bone_index = 5;
        assert!(matches!(
            bake_pose_atlas(&skeleton(), &[clip], 10.0),
            Err(BakePoseAtlasError::InvalidClip(_))
        ));
    }

    struct Skewed;

    impl PoseEvaluator for Skewed {
        type Clip = ClipDescriptor;

        fn bone_count(&self) -> usize {
            1
        }

        fn evaluate(
            &self,
            out: &mut [Mat4],
            _pose: &mut LocalPose,
            _mask: &BoneMask,
            _clip: &ClipDescriptor,
            time: f32,
            _looping: bool,
        ) {
            out[0] = if time > 0.25 {
                let mut m = Mat4::IDENTITY;
                m.x_axis.w = 0.5;
                m
            } else {
                Mat4::from_quat(Quat::from_rotation_x(time))
            };
        }
    }

    #[test]
    fn bake_non_affine_aborts() {
        let clip = ClipDescriptor {
            duration: 1.0,
            looping: true,
        };
        assert_eq!(
            Err(BakePoseAtlasError::SkeletonConsistency {
                clip_index: 0,
                frame: 3,
                bone_index: 0
            }),
            bake_pose_atlas(&Skewed, &[clip], 10.0)
        );
    }

    #[test]
    fn bake_too_large() {
        let clip = ClipDescriptor {
            duration: 1e18,
            looping: true,
        };
        assert!(matches!(
            bake_pose_atlas(&Skewed, &[clip], 10.0),
            Err(BakePoseAtlasError::TooLarge { width: 3, .. })
        ));
    }

    #[test]
    fn coverage_gap() {
        assert_eq!(
            Err(BakePoseAtlasError::AtlasCoverage { x: 1, y: 1, count: 0 }),
            check_coverage([1, 1, 1, 0].into_iter(), 2)
        );
        assert_eq!(
            Err(BakePoseAtlasError::AtlasCoverage { x: 0, y: 0, count: 2 }),
            check_coverage([2, 1].into_iter(), 2)
        );
        assert_eq!(Ok(()), check_coverage([1, 1, 1, 1].into_iter(), 2));
    }

    #[derive(Default)]
    struct RecordingFactory {
        descriptors: Vec<TextureDescriptor>,
    }

    impl TextureFactory for RecordingFactory {
        type Texture = usize;

        fn create_texture(&mut self, descriptor: &TextureDescriptor, texels: &[Texel]) -> usize {
            self.descriptors.push(*descriptor);
            texels.len()
        }
    }

    #[test]
    fn bake_texture_uses_factory() {
        let mut factory = RecordingFactory::default();
        let (atlas, texture) =
            bake_pose_texture(&skeleton(), &[slide(1.0, true)], 10.0, &mut factory).unwrap();
        assert_eq!(atlas.pixels.len(), texture);
        assert_eq!(vec![atlas.texture_descriptor()], factory.descriptors);
    }
}
