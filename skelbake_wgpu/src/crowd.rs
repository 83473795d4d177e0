use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use log::{info, warn};
use skelbake_model::{
    CrowdConfig, Drained, InstanceStore, InstanceUpdater, InstanceVertex, InstancedLayout,
    PoseAtlas, UpdateReceiver, VertexDeclaration, build_instanced_layout,
    error::{ConfigError, CreateInstancesError, LayoutMismatchError},
};
use thiserror::Error;
use wgpu::util::DeviceExt;

use crate::{CrowdPipeline, InstanceBuffers, VertexLayouts, create_pose_atlas_texture};

#[derive(Debug, Error)]
pub enum CreateCrowdError {
    #[error("invalid crowd configuration")]
    Config(#[from] ConfigError),

    #[error("error creating instances")]
    Instances(#[from] CreateInstancesError),

    #[error("instance vertex layout does not match the instance records")]
    Layout(#[from] LayoutMismatchError),
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraData {
    pub view_projection: Mat4,
}

/// The GPU resources and playback state for an animated crowd.
///
/// Playback changes arrive through the [UpdateReceiver]
/// and are applied once per frame with [Self::process_commands].
pub struct CrowdAnimation {
    atlas_texture: wgpu::Texture,
    atlas_view: wgpu::TextureView,
    instanced_layout: InstancedLayout,
    vertex_layouts: VertexLayouts,
    instance_slot: u32,
    pipeline: CrowdPipeline,
    camera_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    store: InstanceStore,
    updater: InstanceUpdater,
    buffers: InstanceBuffers,
    receiver: UpdateReceiver,
}

impl CrowdAnimation {
    /// Upload `atlas` and create instances for `mesh` with the initial playback state.
    #[tracing::instrument(skip_all)]
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        atlas: &PoseAtlas,
        mesh: &VertexDeclaration,
        config: &CrowdConfig,
        receiver: UpdateReceiver,
    ) -> Result<Self, CreateCrowdError> {
        config.validate()?;
        config.validate_atlas(atlas)?;

        let instanced_layout = build_instanced_layout::<InstanceVertex>(
            mesh,
            InstanceVertex::FIELDS,
            config.instance_count,
        )?;
        let vertex_layouts = VertexLayouts::new(&instanced_layout.declaration);
        let instance_slot = vertex_layouts
            .stream_indices()
            .iter()
            .position(|i| *i == instanced_layout.instance_stream)
            .unwrap_or_default() as u32;

        let store = InstanceStore::new(config, &atlas.layout)?;
        let updater = InstanceUpdater::new(atlas.layout.clone(), atlas.fps, &store)?;
        let buffers = InstanceBuffers::new(
            device,
            &instanced_layout.buffer,
            config.frames_in_flight,
            updater.records(),
        );

        let atlas_texture = create_pose_atlas_texture(device, queue, atlas);
        let atlas_view = atlas_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let pipeline = CrowdPipeline::new(device, &vertex_layouts);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("crowd camera buffer"),
            contents: bytemuck::cast_slice(&[CameraData {
                view_projection: Mat4::IDENTITY,
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("crowd bind group"),
            layout: &pipeline.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&atlas_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: camera_buffer.as_entire_binding(),
                },
            ],
        });

        info!(
            "Created crowd with {} instances and {} frames in flight",
            store.len(),
            config.frames_in_flight
        );

        Ok(Self {
            atlas_texture,
            atlas_view,
            instanced_layout,
            vertex_layouts,
            instance_slot,
            pipeline,
            camera_buffer,
            bind_group,
            store,
            updater,
            buffers,
            receiver,
        })
    }

    /// Apply all pending update commands in order.
    ///
    /// The instance records are written to the next buffer at most once per call.
    /// Commands that fail are logged and skipped.
    pub fn process_commands(&mut self, queue: &wgpu::Queue) -> Drained {
        let Self {
            store,
            updater,
            receiver,
            ..
        } = self;

        let drained = receiver.drain(|command| {
            if let Err(e) = updater.apply(store, command) {
                warn!("Skipping update command {command:?}: {e}");
            }
        });

        if drained.count > 0 {
            self.buffers.write_next(queue, &self.updater);
        }

        drained
    }

    pub fn update_camera(&self, queue: &wgpu::Queue, camera_data: &CameraData) {
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[*camera_data]));
    }

    /// Bind the most recently written instance buffer.
    pub fn bind_instance_buffer(&self, render_pass: &mut wgpu::RenderPass) {
        render_pass.set_vertex_buffer(self.instance_slot, self.buffers.current().slice(..));
    }

    /// Draw every instance of an indexed mesh.
    /// `mesh_buffers` contains one buffer for each per vertex stream in declaration order.
    pub fn draw(
        &self,
        render_pass: &mut wgpu::RenderPass,
        mesh_buffers: &[&wgpu::Buffer],
        index_buffer: &wgpu::Buffer,
        index_count: u32,
    ) {
        render_pass.set_pipeline(&self.pipeline.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);

        let mesh_slots = (0..self.vertex_layouts.stream_indices().len() as u32)
            .filter(|slot| *slot != self.instance_slot);
        for (slot, buffer) in mesh_slots.zip(mesh_buffers) {
            render_pass.set_vertex_buffer(slot, buffer.slice(..));
        }
        self.bind_instance_buffer(render_pass);

        render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..index_count, 0, 0..self.buffers.instance_count());
    }

    pub fn atlas_texture(&self) -> &wgpu::Texture {
        &self.atlas_texture
    }

    pub fn atlas_view(&self) -> &wgpu::TextureView {
        &self.atlas_view
    }

    pub fn instanced_layout(&self) -> &InstancedLayout {
        &self.instanced_layout
    }

    pub fn vertex_layouts(&self) -> &VertexLayouts {
        &self.vertex_layouts
    }

    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    pub fn records(&self) -> &[InstanceVertex] {
        self.updater.records()
    }
}
