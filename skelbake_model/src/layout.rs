//! Assign each clip a contiguous band of atlas rows.
use log::debug;

use crate::error::InvalidClipError;

/// Absorbs decimal representation error like `0.7 * 10.0 = 6.9999995`.
const FRAME_EPSILON: f32 = 1e-4;

/// The properties of a clip needed to reserve atlas rows.
pub trait ClipSource {
    /// The clip length in seconds.
    fn duration(&self) -> f32;

    fn looping(&self) -> bool;
}

/// A minimal [ClipSource] for clips defined outside this crate.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct ClipDescriptor {
    pub duration: f32,
    pub looping: bool,
}

impl ClipSource for ClipDescriptor {
    fn duration(&self) -> f32 {
        self.duration
    }

    fn looping(&self) -> bool {
        self.looping
    }
}

/// The rows reserved for a single clip.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ClipLayoutEntry {
    pub clip_index: usize,
    /// The first atlas row for this clip.
    pub start_frame: usize,
    /// The number of sampled frames including the duplicated loop seam frame.
    pub num_frames: usize,
    pub looping: bool,
}

impl ClipLayoutEntry {
    /// The last row belonging to this clip.
    pub fn end_frame(&self) -> usize {
        self.start_frame + self.num_frames.saturating_sub(1)
    }

    /// The number of distinct frames in one playback cycle.
    ///
    /// The final row of a looping clip duplicates its first row,
    /// so the cycle skips one row when wrapping.
    pub fn period(&self) -> usize {
        if self.looping && self.num_frames > 1 {
            self.num_frames - 1
        } else {
            self.num_frames
        }
    }

    pub fn contains_frame(&self, frame: usize) -> bool {
        (self.start_frame..=self.end_frame()).contains(&frame)
    }
}

/// The row assignment for an entire clip set.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ClipLayout {
    /// One entry for each clip in the same order as the clips.
    pub entries: Vec<ClipLayoutEntry>,
    /// The atlas height in rows.
    pub total_frames: usize,
}

impl ClipLayout {
    pub fn entry(&self, clip_index: usize) -> Option<&ClipLayoutEntry> {
        self.entries.get(clip_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute the number of frames sampled at `fps` for a clip.
/// Returns `None` if the count does not fit in a `usize`.
pub fn clip_frame_count(duration: f32, fps: f32, looping: bool) -> Option<usize> {
    let frames = (duration * fps + FRAME_EPSILON).floor();
    if !(frames >= 0.0 && frames < usize::MAX as f32) {
        return None;
    }

    let frames = frames as usize;
    if looping {
        frames.checked_add(1)
    } else {
        Some(frames)
    }
}

/// Assign each clip in `clips` a range of rows sampled at `fps`.
///
/// Clips are laid out back to back in order starting at row 0.
/// Looping clips get one extra row to sample the pose at the loop seam.
pub fn plan_clip_layout<C: ClipSource>(
    clips: &[C],
    fps: f32,
) -> Result<ClipLayout, InvalidClipError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(InvalidClipError::SampleRate(fps));
    }

    let mut entries = Vec::with_capacity(clips.len());
    let mut start_frame = 0;
    for (clip_index, clip) in clips.iter().enumerate() {
        let duration = clip.duration();
        if !duration.is_finite() || duration <= 0.0 {
            return Err(InvalidClipError::Duration {
                clip_index,
                duration,
            });
        }

        let too_many_frames = || InvalidClipError::TooManyFrames {
            clip_index,
            duration,
            fps,
        };
        if clip_frame_count(duration, fps, false) == Some(0) {
            return Err(InvalidClipError::TooShort {
                clip_index,
                duration,
                fps,
            });
        }
        let num_frames = clip_frame_count(duration, fps, clip.looping())
            .ok_or_else(too_many_frames)?;

        debug!("Clip {clip_index}: {num_frames} frames starting at row {start_frame}");
        entries.push(ClipLayoutEntry {
            clip_index,
            start_frame,
            num_frames,
            looping: clip.looping(),
        });
        start_frame = start_frame
            .checked_add(num_frames)
            .ok_or_else(too_many_frames)?;
    }

    Ok(ClipLayout {
        entries,
        total_frames: start_frame,
    })
}
