//! Per instance playback state and the records uploaded for instanced drawing.
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, vec3};
use log::info;

use crate::{
    config::CrowdConfig,
    error::CreateInstancesError,
    layout::{ClipLayout, ClipLayoutEntry},
    vertex::{InstanceField, VertexFormat, VertexSemantic},
};

/// A stable handle to an instance in an [InstanceStore].
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct InstanceId(pub u32);

impl InstanceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The playback state of a single instance.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct InstanceState {
    pub playing: bool,
    /// Index into the [ClipLayout] entries.
    pub clip_index: usize,
    /// The current atlas row including the fractional part between rows.
    pub frame: f32,
    /// The number of frames past the first row where playback starts.
    /// Staggering instances keeps neighbors from animating in lockstep.
    pub frame_offset: usize,
}

impl InstanceState {
    fn start(clip_index: usize, frame_offset: usize, entry: &ClipLayoutEntry) -> Self {
        Self {
            playing: true,
            clip_index,
            frame: (entry.start_frame + frame_offset % entry.period()) as f32,
            frame_offset,
        }
    }
}

/// The per instance record read by the vertex shader.
///
/// The row and blend fields let the shader interpolate between
/// two adjacent atlas rows without recomputing the wrap.
#[repr(C)]
#[derive(Debug, PartialEq, Clone, Copy, Pod, Zeroable)]
pub struct InstanceVertex {
    pub position: [f32; 3],
    pub frame: f32,
    pub current_row: f32,
    pub next_row: f32,
    pub blend: f32,
}

impl InstanceVertex {
    /// Vertex attributes matching the field layout of this struct.
    pub const FIELDS: &'static [InstanceField] = &[
        InstanceField {
            format: VertexFormat::Float32x3,
            semantic: VertexSemantic::Position,
            semantic_index: 1,
        },
        InstanceField {
            format: VertexFormat::Float32x4,
            semantic: VertexSemantic::Color,
            semantic_index: 1,
        },
    ];

    pub fn new(position: Vec3, state: &InstanceState, entry: &ClipLayoutEntry) -> Self {
        let current_row = state.frame.floor();
        let next_row = (current_row + 1.0).min(entry.end_frame() as f32);
        Self {
            position: position.to_array(),
            frame: state.frame,
            current_row,
            next_row,
            blend: state.frame - current_row,
        }
    }
}

/// Owns the playback state for every instance in a crowd.
#[derive(Debug, PartialEq, Clone)]
pub struct InstanceStore {
    pub(crate) states: Vec<InstanceState>,
    pub(crate) positions: Vec<Vec3>,
}

impl InstanceStore {
    pub fn empty() -> Self {
        Self {
            states: Vec::new(),
            positions: Vec::new(),
        }
    }

    /// Place `config.instance_count` instances on a grid
    /// with clips assigned round robin and staggered starting frames.
    pub fn new(config: &CrowdConfig, layout: &ClipLayout) -> Result<Self, CreateInstancesError> {
        if layout.is_empty() {
            return Err(CreateInstancesError::EmptyLayout);
        }

        let columns = config.columns.max(1);
        let (positions, states) = (0..config.instance_count)
            .map(|i| {
                let position =
                    vec3((i % columns) as f32, 0.0, (i / columns) as f32) * config.spacing;

                let entry = &layout.entries[i as usize % layout.len()];
                let frame_offset = (i as usize * 7) / 40;
                (position, InstanceState::start(entry.clip_index, frame_offset, entry))
            })
            .unzip();

        info!(
            "Created {} instances in {} columns",
            config.instance_count, columns
        );

        Ok(Self { states, positions })
    }

    /// Add an instance at the first frame of `clip_index` with no frame offset.
    pub fn insert(
        &mut self,
        position: Vec3,
        clip_index: usize,
        layout: &ClipLayout,
    ) -> Result<InstanceId, CreateInstancesError> {
        let entry = entry(layout, clip_index)?;
        let id = InstanceId(self.states.len() as u32);
        self.states.push(InstanceState::start(clip_index, 0, entry));
        self.positions.push(position);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, id: InstanceId) -> Option<&InstanceState> {
        self.states.get(id.index())
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut InstanceState> {
        self.states.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &InstanceState)> {
        self.states
            .iter()
            .enumerate()
            .map(|(i, s)| (InstanceId(i as u32), s))
    }

    pub fn for_each_mut<F: FnMut(InstanceId, &mut InstanceState)>(&mut self, mut f: F) {
        for (i, state) in self.states.iter_mut().enumerate() {
            f(InstanceId(i as u32), state);
        }
    }

    pub fn position(&self, id: InstanceId) -> Option<Vec3> {
        self.positions.get(id.index()).copied()
    }

    pub fn set_position(
        &mut self,
        id: InstanceId,
        position: Vec3,
    ) -> Result<(), CreateInstancesError> {
        let p = self
            .positions
            .get_mut(id.index())
            .ok_or(CreateInstancesError::InstanceOutOfRange(id.0))?;
        *p = position;
        Ok(())
    }

    /// Restart the instance on `clip_index` and resume playback.
    /// Playback starts at the instance's frame offset into the clip.
    pub fn play_clip(
        &mut self,
        id: InstanceId,
        clip_index: usize,
        layout: &ClipLayout,
    ) -> Result<(), CreateInstancesError> {
        let entry = entry(layout, clip_index)?;
        let state = self
            .states
            .get_mut(id.index())
            .ok_or(CreateInstancesError::InstanceOutOfRange(id.0))?;
        *state = InstanceState::start(clip_index, state.frame_offset, entry);
        Ok(())
    }

    pub fn set_playing(
        &mut self,
        id: InstanceId,
        playing: bool,
    ) -> Result<(), CreateInstancesError> {
        let state = self
            .states
            .get_mut(id.index())
            .ok_or(CreateInstancesError::InstanceOutOfRange(id.0))?;
        state.playing = playing;
        Ok(())
    }
}

fn entry(layout: &ClipLayout, clip_index: usize) -> Result<&ClipLayoutEntry, CreateInstancesError> {
    layout
        .entry(clip_index)
        .ok_or(CreateInstancesError::ClipOutOfRange {
            clip_index,
            clip_count: layout.len(),
        })
}
