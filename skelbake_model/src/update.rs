//! Advance instance playback and produce records for the instance buffer.
use log::warn;

use crate::{
    command::UpdateCommand,
    error::CreateInstancesError,
    instance::{InstanceState, InstanceStore, InstanceVertex},
    layout::{ClipLayout, ClipLayoutEntry},
};

/// A GPU buffer that accepts raw bytes for the instance records.
pub trait InstanceBufferTarget {
    /// Replace the bytes starting at `offset` with `data`.
    fn write(&mut self, offset: u64, data: &[u8]);
}

/// Rotates between `count` buffer slots so the CPU never writes
/// a buffer the GPU may still be reading from.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct FramesInFlight {
    count: usize,
    current: usize,
}

impl FramesInFlight {
    pub fn new(count: usize) -> Self {
        Self {
            count: count.max(1),
            current: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// The most recently written slot.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Move to the next slot and return its index.
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.count;
        self.current
    }
}

/// Advances instances at a fixed frame rate and keeps one record per instance.
#[derive(Debug, Clone)]
pub struct InstanceUpdater {
    layout: ClipLayout,
    fps: f32,
    records: Vec<InstanceVertex>,
}

impl InstanceUpdater {
    /// Create an updater with records for the current state of `store`.
    ///
    /// `fps` should match the rate used to bake the rows in `layout`.
    pub fn new(
        layout: ClipLayout,
        fps: f32,
        store: &InstanceStore,
    ) -> Result<Self, CreateInstancesError> {
        if layout.is_empty() {
            return Err(CreateInstancesError::EmptyLayout);
        }
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CreateInstancesError::FramesPerSecond(fps));
        }

        let mut updater = Self {
            layout,
            fps,
            records: Vec::new(),
        };
        updater.refresh(store);
        Ok(updater)
    }

    pub fn layout(&self) -> &ClipLayout {
        &self.layout
    }

    /// The records from the most recent update.
    pub fn records(&self) -> &[InstanceVertex] {
        &self.records
    }

    /// Advance every playing instance by `delta_seconds` and rebuild the records.
    pub fn tick(&mut self, store: &mut InstanceStore, delta_seconds: f32) -> &[InstanceVertex] {
        let delta_seconds = if delta_seconds.is_finite() && delta_seconds >= 0.0 {
            delta_seconds
        } else {
            warn!("Ignoring invalid time step {delta_seconds}");
            0.0
        };
        let frames = delta_seconds * self.fps;

        for state in &mut store.states {
            let entry = *entry_or_last(&self.layout, state);
            if state.playing {
                advance_frame(state, &entry, frames);
            }
            check_range(state, &entry);
        }

        self.refresh(store);
        &self.records
    }

    /// Apply a single command from the update queue.
    pub fn apply(
        &mut self,
        store: &mut InstanceStore,
        command: UpdateCommand,
    ) -> Result<(), CreateInstancesError> {
        match command {
            UpdateCommand::Tick { delta_seconds } => {
                self.tick(store, delta_seconds);
            }
            UpdateCommand::PlayClip {
                instance,
                clip_index,
            } => {
                store.play_clip(instance, clip_index, &self.layout)?;
                self.refresh(store);
            }
            UpdateCommand::SetPlaying { instance, playing } => {
                store.set_playing(instance, playing)?;
            }
        }
        Ok(())
    }

    /// Write all records to `target` in a single call.
    pub fn submit<T: InstanceBufferTarget>(&self, target: &mut T) {
        target.write(0, bytemuck::cast_slice(&self.records));
    }

    fn refresh(&mut self, store: &InstanceStore) {
        self.records.clear();
        self.records.extend(
            store
                .states
                .iter()
                .zip(&store.positions)
                .map(|(state, position)| {
                    InstanceVertex::new(*position, state, entry_or_last(&self.layout, state))
                }),
        );
    }
}

fn entry_or_last<'a>(layout: &'a ClipLayout, state: &InstanceState) -> &'a ClipLayoutEntry {
    // The layout is never empty after construction.
    let last = layout.entries.len() - 1;
    &layout.entries[state.clip_index.min(last)]
}

/// Advance `state` by `frames` and wrap or stop at the end of the clip.
///
/// Looping clips skip the duplicated seam row when wrapping,
/// so frame `end + 1` becomes `start + 1`.
pub fn advance_frame(state: &mut InstanceState, entry: &ClipLayoutEntry, frames: f32) {
    let end = entry.end_frame() as f64;
    let mut frame = state.frame as f64 + frames as f64;

    if frame > end {
        if entry.looping && entry.num_frames > 1 {
            // Apply the single period wrap repeatedly in closed form.
            let period = entry.period() as f64;
            let wraps = ((frame - end) / period).ceil();
            frame -= wraps * period;
        } else {
            frame = end;
            state.playing = false;
        }
    }

    state.frame = frame as f32;
}

fn check_range(state: &mut InstanceState, entry: &ClipLayoutEntry) {
    let start = entry.start_frame as f32;
    let end = entry.end_frame() as f32;
    let in_range = (start..=end).contains(&state.frame) && state.clip_index == entry.clip_index;
    debug_assert!(
        in_range,
        "instance frame {} for clip {} outside rows {start}..={end}",
        state.frame,
        state.clip_index
    );

    if !in_range {
        warn!(
            "Clamping instance frame {} for clip {} to rows {start}..={end}",
            state.frame, state.clip_index
        );
        state.clip_index = entry.clip_index;
        state.frame = if state.frame.is_nan() {
            start
        } else {
            state.frame.clamp(start, end)
        };
    }
}
