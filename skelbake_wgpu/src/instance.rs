use log::debug;
use skelbake_model::{
    FramesInFlight, InstanceBufferDescriptor, InstanceBufferTarget, InstanceUpdater,
    InstanceVertex,
};
use wgpu::util::DeviceExt;

/// Writes instance records to a single vertex buffer through the queue.
pub struct InstanceBufferWriter<'a> {
    pub queue: &'a wgpu::Queue,
    pub buffer: &'a wgpu::Buffer,
}

impl InstanceBufferTarget for InstanceBufferWriter<'_> {
    fn write(&mut self, offset: u64, data: &[u8]) {
        self.queue.write_buffer(self.buffer, offset, data);
    }
}

/// One instance vertex buffer for each frame in flight.
pub struct InstanceBuffers {
    buffers: Vec<wgpu::Buffer>,
    frames: FramesInFlight,
    instance_count: u32,
}

impl InstanceBuffers {
    /// Create `frames_in_flight` buffers all initialized to `records`.
    pub fn new(
        device: &wgpu::Device,
        descriptor: &InstanceBufferDescriptor,
        frames_in_flight: usize,
        records: &[InstanceVertex],
    ) -> Self {
        let frames = FramesInFlight::new(frames_in_flight);
        debug!(
            "Create {} instance buffers with {} bytes",
            frames.count(),
            descriptor.size_in_bytes()
        );

        let buffers = (0..frames.count())
            .map(|i| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("instance buffer {i}")),
                    contents: bytemuck::cast_slice(records),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                })
            })
            .collect();

        Self {
            buffers,
            frames,
            instance_count: descriptor.vertex_count,
        }
    }

    /// The most recently written buffer.
    pub fn current(&self) -> &wgpu::Buffer {
        &self.buffers[self.frames.current()]
    }

    pub fn current_index(&self) -> usize {
        self.frames.current()
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// Write the updater's records to the next buffer in the rotation.
    pub fn write_next(&mut self, queue: &wgpu::Queue, updater: &InstanceUpdater) {
        let index = self.frames.advance();
        updater.submit(&mut InstanceBufferWriter {
            queue,
            buffer: &self.buffers[index],
        });
    }
}
