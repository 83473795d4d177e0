use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum InvalidClipError {
    #[error("sample rate {0} must be positive and finite")]
    SampleRate(f32),

    #[error("clip {clip_index} has invalid duration {duration}")]
    Duration { clip_index: usize, duration: f32 },

    #[error("clip {clip_index} with duration {duration} is shorter than one frame at {fps} fps")]
    TooShort {
        clip_index: usize,
        duration: f32,
        fps: f32,
    },

    #[error("clip {clip_index} with duration {duration} has too many frames at {fps} fps")]
    TooManyFrames {
        clip_index: usize,
        duration: f32,
        fps: f32,
    },

    #[error("clip {clip_index} track {track_index} contains non finite keyframe data")]
    NonFiniteKeyframe {
        clip_index: usize,
        track_index: usize,
    },

    #[error("clip {clip_index} track {track_index} has negative keyframe time {time}")]
    NegativeKeyframeTime {
        clip_index: usize,
        track_index: usize,
        time: f32,
    },

    #[error(
        "clip {clip_index} track {track_index} targets bone {bone_index} but the skeleton has {bone_count} bones"
    )]
    BoneOutOfRange {
        clip_index: usize,
        track_index: usize,
        bone_index: usize,
        bone_count: usize,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum BakePoseAtlasError {
    #[error("error planning clip layout")]
    InvalidClip(#[from] InvalidClipError),

    #[error("animation set has {total_frames} total frames but at least 2 are required")]
    EmptyAnimationSet { total_frames: usize },

    /// The skeleton evaluation produced a non affine transform.
    /// This is a defect in the evaluator and is never retried.
    #[error("bone {bone_index} in clip {clip_index} frame {frame} is not an affine transform")]
    SkeletonConsistency {
        clip_index: usize,
        frame: usize,
        bone_index: usize,
    },

    #[error("skeleton has no bones")]
    NoBones,

    #[error("atlas with {width} texels per row and {height} rows is too large")]
    TooLarge { width: usize, height: usize },

    #[error("texel ({x}, {y}) was written {count} times instead of once")]
    AtlasCoverage { x: usize, y: usize, count: u32 },
}

#[derive(Debug, Error, PartialEq)]
pub enum LayoutMismatchError {
    #[error(
        "per instance record is {record_size} bytes but stream {stream_index} has stride {stride}"
    )]
    Stride {
        stream_index: u32,
        stride: u32,
        record_size: usize,
    },

    #[error("instanced layout requires at least one per instance field")]
    NoInstanceFields,
}

#[derive(Debug, Error, PartialEq)]
pub enum CreateInstancesError {
    #[error("clip index {clip_index} out of range for {clip_count} clips")]
    ClipOutOfRange { clip_index: usize, clip_count: usize },

    #[error("instance {0} does not exist")]
    InstanceOutOfRange(u32),

    #[error("cannot assign clips to instances from an empty clip layout")]
    EmptyLayout,

    #[error("playback rate {0} must be positive and finite")]
    FramesPerSecond(f32),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("instance count must be at least 1")]
    NoInstances,

    #[error("instance grid must have at least 1 column")]
    NoColumns,

    #[error("frames per second {0} must be positive and finite")]
    FramesPerSecond(f32),

    #[error("at least 2 frames in flight are required but found {0}")]
    FramesInFlight(usize),

    #[error("playback rate {config} does not match the atlas sample rate {atlas}")]
    AtlasFramesPerSecond { config: f32, atlas: f32 },
}

#[derive(Debug, Error, PartialEq)]
#[error("bone {bone_index} does not have an affine transform")]
pub struct NonAffineTransformError {
    pub bone_index: usize,
}
