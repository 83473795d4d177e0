//! Backend independent vertex declarations with per instance streams.
use log::debug;

use crate::error::LayoutMismatchError;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint8x4,
    Unorm8x4,
}

impl VertexFormat {
    /// The size in bytes.
    pub fn size(&self) -> u32 {
        match self {
            VertexFormat::Float32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
            VertexFormat::Uint32 => 4,
            VertexFormat::Uint8x4 => 4,
            VertexFormat::Unorm8x4 => 4,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VertexSemantic {
    Position,
    Normal,
    Tangent,
    TexCoord,
    Color,
    BlendIndices,
    BlendWeights,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct VertexElement {
    pub format: VertexFormat,
    pub semantic: VertexSemantic,
    /// Distinguishes elements with the same semantic.
    pub semantic_index: u32,
    /// The buffer binding this element is read from.
    pub stream_index: u32,
    /// `0` for per vertex data and `1` to advance once per instance.
    pub instance_step_rate: u32,
}

/// A per instance attribute to append with [build_instanced_layout].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct InstanceField {
    pub format: VertexFormat,
    pub semantic: VertexSemantic,
    pub semantic_index: u32,
}

/// The ordered attributes for all vertex streams.
/// Attributes in each stream are tightly packed in declaration order.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct VertexDeclaration {
    pub elements: Vec<VertexElement>,
}

impl VertexDeclaration {
    /// The byte offset of each element within its stream.
    pub fn offsets(&self) -> Vec<u32> {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, e)| {
                self.elements[..i]
                    .iter()
                    .filter(|other| other.stream_index == e.stream_index)
                    .map(|other| other.format.size())
                    .sum()
            })
            .collect()
    }

    /// The total size in bytes of the elements in `stream_index`.
    pub fn stream_stride(&self, stream_index: u32) -> u32 {
        self.elements
            .iter()
            .filter(|e| e.stream_index == stream_index)
            .map(|e| e.format.size())
            .sum()
    }

    /// The sorted unique stream indices.
    pub fn streams(&self) -> Vec<u32> {
        let mut streams: Vec<_> = self.elements.iter().map(|e| e.stream_index).collect();
        streams.sort();
        streams.dedup();
        streams
    }

    pub fn max_stream_index(&self) -> Option<u32> {
        self.elements.iter().map(|e| e.stream_index).max()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BufferUsage {
    /// Written once.
    Static,
    /// Rewritten every frame.
    Dynamic,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct InstanceBufferDescriptor {
    pub vertex_size: u32,
    pub vertex_count: u32,
    pub usage: BufferUsage,
}

impl InstanceBufferDescriptor {
    pub fn size_in_bytes(&self) -> u64 {
        self.vertex_size as u64 * self.vertex_count as u64
    }
}

/// A vertex declaration extended with a per instance stream.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct InstancedLayout {
    pub declaration: VertexDeclaration,
    /// The stream index containing the per instance fields.
    pub instance_stream: u32,
    pub buffer: InstanceBufferDescriptor,
}

/// Append `fields` to `base` on a new stream that advances once per instance.
///
/// The new stream's stride must equal the size of the record type `T`
/// uploaded for each instance.
pub fn build_instanced_layout<T>(
    base: &VertexDeclaration,
    fields: &[InstanceField],
    instance_count: u32,
) -> Result<InstancedLayout, LayoutMismatchError> {
    if fields.is_empty() {
        return Err(LayoutMismatchError::NoInstanceFields);
    }

    let instance_stream = base.max_stream_index().map(|i| i + 1).unwrap_or_default();

    let mut declaration = base.clone();
    declaration
        .elements
        .extend(fields.iter().map(|f| VertexElement {
            format: f.format,
            semantic: f.semantic,
            semantic_index: f.semantic_index,
            stream_index: instance_stream,
            instance_step_rate: 1,
        }));

    let stride = declaration.stream_stride(instance_stream);
    let record_size = std::mem::size_of::<T>();
    if stride as usize != record_size {
        return Err(LayoutMismatchError::Stride {
            stream_index: instance_stream,
            stride,
            record_size,
        });
    }

    debug!("Instance stream {instance_stream} with stride {stride} for {instance_count} instances");

    Ok(InstancedLayout {
        declaration,
        instance_stream,
        buffer: InstanceBufferDescriptor {
            vertex_size: stride,
            vertex_count: instance_count,
            usage: BufferUsage::Dynamic,
        },
    })
}
