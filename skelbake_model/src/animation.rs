//! Utilities for working with animation clip data.
use std::collections::BTreeMap;
use std::ops::Bound::*;

use glam::{Quat, Vec3};
use ordered_float::OrderedFloat;

use crate::{Transform, error::InvalidClipError, layout::ClipSource};

/// A timed animation sequence defined over the bones of a [Skeleton](crate::Skeleton).
#[derive(Debug, PartialEq, Clone)]
pub struct AnimationClip {
    pub name: String,
    /// The length of the clip in seconds.
    pub duration: f32,
    /// The rate the clip was authored at in samples per second.
    /// Baking uses its own fixed rate instead.
    pub sample_rate: f32,
    pub looping: bool,
    pub tracks: Vec<Track>,
}

/// Keyframes for a single bone.
/// Keyframe times are in seconds from the start of the clip.
/// Missing channels use the bone's rest transform.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Track {
    /// Index into [bones](crate::Skeleton#structfield.bones).
    pub bone_index: usize,
    pub translation_keyframes: BTreeMap<OrderedFloat<f32>, Vec3>,
    pub rotation_keyframes: BTreeMap<OrderedFloat<f32>, Quat>,
    pub scale_keyframes: BTreeMap<OrderedFloat<f32>, Vec3>,
}

impl AnimationClip {
    /// Convert `time` in seconds to a time within the clip.
    ///
    /// Looping wraps around so the clip duration samples the first pose again.
    /// Non looping playback holds the final pose.
    pub fn clip_time(&self, time: f32, looping: bool) -> f32 {
        if !(self.duration > 0.0) {
            return 0.0;
        }

        if looping {
            time.rem_euclid(self.duration)
        } else {
            time.clamp(0.0, self.duration)
        }
    }

    /// The earliest and latest keyframe time over all channels
    /// or `None` if the clip has no keyframes.
    pub fn keyframe_time_range(&self) -> Option<(f32, f32)> {
        self.tracks
            .iter()
            .flat_map(|t| {
                t.translation_keyframes
                    .keys()
                    .chain(t.rotation_keyframes.keys())
                    .chain(t.scale_keyframes.keys())
            })
            .fold(None, |range, time| match range {
                Some((start, end)) => Some((time.0.min(start), time.0.max(end))),
                None => Some((time.0, time.0)),
            })
    }

    /// Check that the clip can be evaluated for a skeleton with `bone_count` bones.
    pub fn validate(&self, clip_index: usize, bone_count: usize) -> Result<(), InvalidClipError> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(InvalidClipError::Duration {
                clip_index,
                duration: self.duration,
            });
        }

        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(InvalidClipError::SampleRate(self.sample_rate));
        }

        for (track_index, track) in self.tracks.iter().enumerate() {
            if track.bone_index >= bone_count {
                return Err(InvalidClipError::BoneOutOfRange {
                    clip_index,
                    track_index,
                    bone_index: track.bone_index,
                    bone_count,
                });
            }

            let times = track
                .translation_keyframes
                .keys()
                .chain(track.rotation_keyframes.keys())
                .chain(track.scale_keyframes.keys());
            for time in times {
                if !time.0.is_finite() {
                    return Err(InvalidClipError::NonFiniteKeyframe {
                        clip_index,
                        track_index,
                    });
                }
                if time.0 < 0.0 {
                    return Err(InvalidClipError::NegativeKeyframeTime {
                        clip_index,
                        track_index,
                        time: time.0,
                    });
                }
            }

            let values_finite = track.translation_keyframes.values().all(|v| v.is_finite())
                && track.rotation_keyframes.values().all(|v| v.is_finite())
                && track.scale_keyframes.values().all(|v| v.is_finite());
            if !values_finite {
                return Err(InvalidClipError::NonFiniteKeyframe {
                    clip_index,
                    track_index,
                });
            }
        }

        Ok(())
    }
}

impl ClipSource for AnimationClip {
    fn duration(&self) -> f32 {
        self.duration
    }

    fn looping(&self) -> bool {
        self.looping
    }
}

impl Track {
    /// Sample the translation at `time` with linear interpolation between keyframes.
    /// Returns `None` if the channel is empty.
    pub fn sample_translation(&self, time: f32) -> Option<Vec3> {
        let (a, b, factor) = keyframe_position(&self.translation_keyframes, time)?;
        Some(a.lerp(*b, factor))
    }

    /// Sample the rotation at `time` with spherical interpolation between keyframes.
    /// Returns `None` if the channel is empty.
    pub fn sample_rotation(&self, time: f32) -> Option<Quat> {
        let (a, b, factor) = keyframe_position(&self.rotation_keyframes, time)?;
        Some(a.slerp(*b, factor).normalize())
    }

    /// Sample the scale at `time` with linear interpolation between keyframes.
    /// Returns `None` if the channel is empty.
    pub fn sample_scale(&self, time: f32) -> Option<Vec3> {
        let (a, b, factor) = keyframe_position(&self.scale_keyframes, time)?;
        Some(a.lerp(*b, factor))
    }

    /// Sample each channel at `time` and use `rest` for any channels without keyframes.
    pub fn sample_transform(&self, time: f32, rest: Transform) -> Transform {
        Transform {
            translation: self.sample_translation(time).unwrap_or(rest.translation),
            rotation: self.sample_rotation(time).unwrap_or(rest.rotation),
            scale: self.sample_scale(time).unwrap_or(rest.scale),
        }
    }
}

fn keyframe_position<T>(
    keyframes: &BTreeMap<OrderedFloat<f32>, T>,
    time: f32,
) -> Option<(&T, &T, f32)> {
    // Find the keyframe range containing the desired time.
    let key = OrderedFloat::<f32>::from(time);
    let mut before = keyframes.range((Unbounded, Included(key)));
    let mut after = keyframes.range((Excluded(key), Unbounded));

    // Times before the first keyframe hold the first value.
    let Some((previous_time, previous)) = before.next_back() else {
        let (_, first) = keyframes.iter().next()?;
        return Some((first, first, 0.0));
    };

    // The final keyframe should persist for the rest of the clip.
    match after.next() {
        Some((next_time, next)) => {
            let factor = (time - previous_time.0) / (next_time.0 - previous_time.0);
            Some((previous, next, factor.clamp(0.0, 1.0)))
        }
        None => Some((previous, previous, 0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use glam::vec3;
    use pretty_assertions::assert_eq;

    fn keys(times: &[f32]) -> BTreeMap<OrderedFloat<f32>, Vec3> {
        times
            .iter()
            .map(|t| (OrderedFloat(*t), Vec3::splat(*t)))
            .collect()
    }

    fn clip(duration: f32, tracks: Vec<Track>) -> AnimationClip {
        AnimationClip {
            name: "clip".to_string(),
            duration,
            sample_rate: 30.0,
            looping: true,
            tracks,
        }
    }

    #[test]
    fn keyframe_position_empty() {
        assert_eq!(None, keyframe_position(&keys(&[]), 0.0));
    }

    #[test]
    fn keyframe_position_before_first() {
        let keyframes = keys(&[0.5, 1.0]);
        assert_eq!(
            Some((&Vec3::splat(0.5), &Vec3::splat(0.5), 0.0)),
            keyframe_position(&keyframes, 0.25)
        );
    }

    #[test]
    fn keyframe_position_between() {
        let keyframes = keys(&[0.0, 1.0, 2.0]);
        assert_eq!(
            Some((&Vec3::splat(1.0), &Vec3::splat(2.0), 0.5)),
            keyframe_position(&keyframes, 1.5)
        );
    }

    #[test]
    fn keyframe_position_exact() {
        let keyframes = keys(&[0.0, 1.0, 2.0]);
        assert_eq!(
            Some((&Vec3::splat(1.0), &Vec3::splat(2.0), 0.0)),
            keyframe_position(&keyframes, 1.0)
        );
    }

    #[test]
    fn keyframe_position_after_last() {
        let keyframes = keys(&[0.0, 1.0]);
        assert_eq!(
            Some((&Vec3::splat(1.0), &Vec3::splat(1.0), 0.0)),
            keyframe_position(&keyframes, 3.0)
        );
    }

    #[test]
    fn sample_transform_missing_channels_use_rest() {
        let track = Track {
            bone_index: 0,
            translation_keyframes: BTreeMap::from([
                (OrderedFloat(0.0), vec3(0.0, 0.0, 0.0)),
                (OrderedFloat(1.0), vec3(2.0, 0.0, 0.0)),
            ]),
            ..Default::default()
        };
        let rest = Transform {
            scale: vec3(3.0, 3.0, 3.0),
            ..Transform::IDENTITY
        };
        assert_eq!(
            Transform {
                translation: vec3(1.0, 0.0, 0.0),
                rotation: Quat::IDENTITY,
                scale: vec3(3.0, 3.0, 3.0),
            },
            track.sample_transform(0.5, rest)
        );
    }

    #[test]
    fn clip_time_looping_wraps_at_duration() {
        let clip = clip(2.0, Vec::new());
        assert_eq!(0.0, clip.clip_time(2.0, true));
        assert_eq!(0.5, clip.clip_time(2.5, true));
        assert_eq!(1.5, clip.clip_time(-0.5, true));
    }

    #[test]
    fn clip_time_single_clamps() {
        let clip = clip(2.0, Vec::new());
        assert_eq!(2.0, clip.clip_time(2.5, false));
        assert_eq!(0.0, clip.clip_time(-1.0, false));
    }

    #[test]
    fn keyframe_time_range_all_channels() {
        let clip = clip(
            2.0,
            vec![
                Track {
                    bone_index: 0,
                    translation_keyframes: keys(&[0.25, 1.0]),
                    ..Default::default()
                },
                Track {
                    bone_index: 1,
                    scale_keyframes: keys(&[0.5, 1.75]),
                    ..Default::default()
                },
            ],
        );
        assert_eq!(Some((0.25, 1.75)), clip.keyframe_time_range());
    }

    #[test]
    fn keyframe_time_range_empty() {
        assert_eq!(None, clip(1.0, Vec::new()).keyframe_time_range());
    }

    #[test]
    fn validate_duration() {
        assert_eq!(
            Err(InvalidClipError::Duration {
                clip_index: 2,
                duration: 0.0
            }),
            clip(0.0, Vec::new()).validate(2, 1)
        );
    }

    #[test]
    fn validate_bone_index() {
        let clip = clip(
            1.0,
            vec![Track {
                bone_index: 3,
                ..Default::default()
            }],
        );
        assert_eq!(
            Err(InvalidClipError::BoneOutOfRange {
                clip_index: 0,
                track_index: 0,
                bone_index: 3,
                bone_count: 2
            }),
            clip.validate(0, 2)
        );
    }

    #[test]
    fn validate_non_finite_values() {
        let clip = clip(
            1.0,
            vec![Track {
                bone_index: 0,
                scale_keyframes: BTreeMap::from([(OrderedFloat(0.0), Vec3::NAN)]),
                ..Default::default()
            }],
        );
        assert_eq!(
            Err(InvalidClipError::NonFiniteKeyframe {
                clip_index: 0,
                track_index: 0
            }),
            clip.validate(0, 1)
        );
    }

    #[test]
    fn validate_negative_time() {
        let clip = clip(
            1.0,
            vec![Track {
                bone_index: 0,
                translation_keyframes: keys(&[-1.0]),
                ..Default::default()
            }],
        );
        assert_eq!(
            Err(InvalidClipError::NegativeKeyframeTime {
                clip_index: 0,
                track_index: 0,
                time: -1.0
            }),
            clip.validate(0, 1)
        );
    }
}
