//! Evaluate skeleton poses for a clip at a point in time.
use glam::{Affine3A, Mat4};

use crate::{
    AnimationClip, Skeleton, Transform,
    encode::is_affine,
    error::{InvalidClipError, NonAffineTransformError},
    layout::ClipSource,
};

/// Computes per bone transforms for a clip at a given time.
///
/// Implementations should write one transform for each bone to `out`.
/// Bones with an override in `pose` keep their local transform.
pub trait PoseEvaluator {
    type Clip: ClipSource;

    fn bone_count(&self) -> usize;

    /// Check that `clip` can be evaluated before any frames are sampled.
    fn validate_clip(
        &self,
        _clip_index: usize,
        _clip: &Self::Clip,
    ) -> Result<(), InvalidClipError> {
        Ok(())
    }

    fn evaluate(
        &self,
        out: &mut [Mat4],
        pose: &mut LocalPose,
        mask: &BoneMask,
        clip: &Self::Clip,
        time: f32,
        looping: bool,
    );
}

/// Per bone local transforms used as scratch space during evaluation.
#[derive(Debug, PartialEq, Clone)]
pub struct LocalPose {
    pub transforms: Vec<Transform>,
    /// `true` if the bone's local transform was set externally
    /// and should not be replaced by the animation.
    pub has_override: Vec<bool>,
}

impl LocalPose {
    pub fn new(bone_count: usize) -> Self {
        Self {
            transforms: vec![Transform::IDENTITY; bone_count],
            has_override: vec![false; bone_count],
        }
    }

    /// Set the local transform for `bone` and ignore animation for that bone.
    pub fn set_override(&mut self, bone: usize, transform: Transform) {
        if let (Some(t), Some(o)) = (
            self.transforms.get_mut(bone),
            self.has_override.get_mut(bone),
        ) {
            *t = transform;
            *o = true;
        }
    }

    pub fn clear_overrides(&mut self) {
        self.has_override.fill(false);
    }
}

/// Selects which bones are affected by animation.
#[derive(Debug, PartialEq, Clone)]
pub struct BoneMask {
    enabled: Vec<bool>,
}

impl BoneMask {
    /// A mask with every bone enabled.
    pub fn all(bone_count: usize) -> Self {
        Self {
            enabled: vec![true; bone_count],
        }
    }

    pub fn set_enabled(&mut self, bone: usize, enabled: bool) {
        if let Some(e) = self.enabled.get_mut(bone) {
            *e = enabled;
        }
    }

    pub fn is_enabled(&self, bone: usize) -> bool {
        self.enabled.get(bone).copied().unwrap_or(false)
    }
}

/// A [Skeleton] with cached inverse bind transforms for computing skinning transforms.
#[derive(Debug, PartialEq, Clone)]
pub struct SkinnedSkeleton {
    pub skeleton: Skeleton,
    inverse_bind_transforms: Vec<Affine3A>,
}

impl SkinnedSkeleton {
    pub fn new(skeleton: Skeleton) -> Self {
        skeleton.validate();
        let inverse_bind_transforms = skeleton.inverse_bind_transforms();
        Self {
            skeleton,
            inverse_bind_transforms,
        }
    }
}

impl PoseEvaluator for SkinnedSkeleton {
    type Clip = AnimationClip;

    fn bone_count(&self) -> usize {
        self.skeleton.bone_count()
    }

    fn validate_clip(
        &self,
        clip_index: usize,
        clip: &AnimationClip,
    ) -> Result<(), InvalidClipError> {
        clip.validate(clip_index, self.bone_count())
    }

    /// Write the skinning transform for each bone.
    /// This is the animated model space transform multiplied by the inverse bind transform.
    fn evaluate(
        &self,
        out: &mut [Mat4],
        pose: &mut LocalPose,
        mask: &BoneMask,
        clip: &AnimationClip,
        time: f32,
        looping: bool,
    ) {
        let bones = &self.skeleton.bones;

        for (i, bone) in bones.iter().enumerate() {
            if !pose.has_override[i] {
                pose.transforms[i] = bone.transform;
            }
        }

        let time = clip.clip_time(time, looping);
        for track in &clip.tracks {
            let i = track.bone_index;
            if i < bones.len() && mask.is_enabled(i) && !pose.has_override[i] {
                pose.transforms[i] = track.sample_transform(time, bones[i].transform);
            }
        }

        // Parents are always processed before their children.
        // The affine product keeps the parent scale for the child translation.
        for (i, bone) in bones.iter().enumerate() {
            let local = pose.transforms[i].to_affine();
            out[i] = match bone.parent_index.filter(|p| *p < i) {
                Some(parent) => out[parent] * Mat4::from(local),
                None => Mat4::from(local),
            };
        }

        for (out, inverse_bind) in out.iter_mut().zip(&self.inverse_bind_transforms) {
            *out *= Mat4::from(*inverse_bind);
        }
    }
}

/// Samples poses into reusable scratch buffers sized for a single skeleton.
///
/// Each call starts from a cleared [LocalPose],
/// so sampling the same clip and time always gives the same result.
#[derive(Debug, Clone)]
pub struct PoseSampler {
    pose: LocalPose,
    mask: BoneMask,
    transforms: Vec<Mat4>,
}

impl PoseSampler {
    pub fn new(bone_count: usize) -> Self {
        Self {
            pose: LocalPose::new(bone_count),
            mask: BoneMask::all(bone_count),
            transforms: vec![Mat4::IDENTITY; bone_count],
        }
    }

    /// Sample one transform per bone for `clip` at `time` in seconds.
    pub fn sample<E: PoseEvaluator>(
        &mut self,
        evaluator: &E,
        clip: &E::Clip,
        time: f32,
        looping: bool,
    ) -> Result<&[Mat4], NonAffineTransformError> {
        self.pose.clear_overrides();
        evaluator.evaluate(
            &mut self.transforms,
            &mut self.pose,
            &self.mask,
            clip,
            time,
            looping,
        );

        match self.transforms.iter().position(|t| !is_affine(t)) {
            Some(bone_index) => Err(NonAffineTransformError { bone_index }),
            None => Ok(&self.transforms),
        }
    }
}
