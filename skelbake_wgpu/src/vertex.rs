use skelbake_model::{VertexDeclaration, VertexFormat};

/// wgpu vertex buffer layouts for each stream in a [VertexDeclaration].
///
/// Shader locations are assigned in declaration order across all streams.
#[derive(Debug, PartialEq, Clone)]
pub struct VertexLayouts {
    streams: Vec<StreamLayout>,
}

#[derive(Debug, PartialEq, Clone)]
struct StreamLayout {
    stream_index: u32,
    array_stride: u64,
    step_mode: wgpu::VertexStepMode,
    attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexLayouts {
    pub fn new(declaration: &VertexDeclaration) -> Self {
        let offsets = declaration.offsets();

        let streams = declaration
            .streams()
            .into_iter()
            .map(|stream_index| {
                let elements: Vec<_> = declaration
                    .elements
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.stream_index == stream_index)
                    .collect();

                let step_mode = if elements.iter().any(|(_, e)| e.instance_step_rate > 0) {
                    wgpu::VertexStepMode::Instance
                } else {
                    wgpu::VertexStepMode::Vertex
                };

                StreamLayout {
                    stream_index,
                    array_stride: declaration.stream_stride(stream_index) as u64,
                    step_mode,
                    attributes: elements
                        .iter()
                        .map(|(location, e)| wgpu::VertexAttribute {
                            format: vertex_format(e.format),
                            offset: offsets[*location] as u64,
                            shader_location: *location as u32,
                        })
                        .collect(),
                }
            })
            .collect();

        Self { streams }
    }

    /// The stream index for each layout in [Self::buffers].
    /// This is the vertex buffer slot used when drawing.
    pub fn stream_indices(&self) -> Vec<u32> {
        self.streams.iter().map(|s| s.stream_index).collect()
    }

    pub fn buffers(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.streams
            .iter()
            .map(|s| wgpu::VertexBufferLayout {
                array_stride: s.array_stride,
                step_mode: s.step_mode,
                attributes: &s.attributes,
            })
            .collect()
    }
}

pub fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32 => wgpu::VertexFormat::Float32,
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
        VertexFormat::Uint8x4 => wgpu::VertexFormat::Uint8x4,
        VertexFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
    }
}
