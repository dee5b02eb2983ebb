use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
#[cfg(feature = "rhal-serde")]
use serde::{Deserialize, Serialize};

use super::d3d11::{
    D3d11Buffer, D3d11ComputePipeline, D3d11Pipeline, D3d11RenderTarget, D3d11Sampler,
    D3d11Texture,
};
use super::format::FormatSet;
use super::gl::{GlBuffer, GlComputePipeline, GlPipeline, GlRenderTarget, GlSampler, GlTexture};

pub const MAX_VERTEX_BUFFERS: usize = 16;
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;
pub const MAX_UNIFORM_BUFFERS: usize = 16;
pub const MAX_RESOURCE_VIEWS: usize = 16;
pub const MAX_UNORDERED_VIEWS: usize = 16;
pub const MAX_SAMPLERS: usize = 16;
pub const MAX_RENDER_TARGETS: usize = 8;
pub const MAX_VIEWPORTS: usize = 8;

#[repr(u32)]
#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum Usage {
    #[default]
    Immutable,
    Dynamic,
    GpuReadWrite,
    /// CPU readable and writable copy target, never bound to the pipeline.
    Staging,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
    pub struct BindingFlags: u32 {
        const VERTEX_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const UNIFORM_BUFFER = 0x4;
        const STRUCTURED_BUFFER = 0x8;
        const SHADER_RESOURCE = 0x10;
        const UNORDERED_ACCESS = 0x20;
        const RENDER_TARGET = 0x40;
        const DEPTH_STENCIL = 0x80;
        const INDIRECT = 0x100;
    }
}

impl BindingFlags {
    /// Bind points a texture may request.
    pub const TEXTURE_BINDINGS: Self = Self::SHADER_RESOURCE
        .union(Self::UNORDERED_ACCESS)
        .union(Self::RENDER_TARGET)
        .union(Self::DEPTH_STENCIL);

    /// Bind points a buffer may request.
    pub const BUFFER_BINDINGS: Self = Self::VERTEX_BUFFER
        .union(Self::INDEX_BUFFER)
        .union(Self::UNIFORM_BUFFER)
        .union(Self::STRUCTURED_BUFFER)
        .union(Self::SHADER_RESOURCE)
        .union(Self::UNORDERED_ACCESS)
        .union(Self::INDIRECT);
}

#[repr(u8)]
#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum Format {
    #[default]
    Null,
    U8x1Norm,
    /// Single channel sampled into alpha.
    U8x1NormToAlpha,
    U8x2Norm,
    U8x4Norm,
    U8x4NormSrgb,
    U8x4NormBgrx,
    U8x4NormBgra,
    U8x1,
    U8x2,
    U8x4,
    I16x2Norm,
    I16x4Norm,
    I16x2,
    I16x4,
    U16x1Norm,
    U16x2Norm,
    U16x4Norm,
    U16x1,
    U16x2,
    U16x4,
    U32x1,
    U32x2,
    U32x4,
    F16x2,
    F16x4,
    F32x1,
    F32x2,
    F32x3,
    F32x4,
    D16,
    D24S8,
    BC1,
    BC2,
    BC3,
    BC4,
    BC5,
    BC6,
    BC7,
}

#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum TextureFiltering {
    #[default]
    Nearest,
    Linear,
    Anisotropic,
}

/// Mip chain length requested for a texture.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum MipLevels {
    /// Full chain down to 1x1.
    Auto,
    /// Literal count; zero is treated as one.
    Count(u32),
}

impl Default for MipLevels {
    fn default() -> Self {
        MipLevels::Count(1)
    }
}

impl MipLevels {
    pub fn resolve(self, width: u32, height: u32) -> u32 {
        match self {
            MipLevels::Auto => u32::BITS - width.max(height).max(1).leading_zeros(),
            MipLevels::Count(n) => n.max(1),
        }
    }
}

/// Capability snapshot taken once when the context is created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub struct ContextInfo {
    pub backend_api: String,
    pub driver_renderer: String,
    pub driver_adapter: String,
    pub driver_version: String,

    pub max_texture_size: u32,
    pub max_render_targets: u32,
    pub max_textures_per_draw: u32,
    pub max_uniform_buffers: u32,
    pub max_dispatch: [u32; 3],
    pub max_anisotropy: u32,

    pub texture_formats: FormatSet,
    pub render_target_formats: FormatSet,

    pub has_instancing: bool,
    pub has_base_vertex: bool,
    pub has_32bit_index: bool,
    pub has_separate_alpha_blend: bool,
    pub has_compute_pipeline: bool,
}

#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub struct LayoutDesc {
    pub offset: u32,
    /// `Format::Null` terminates the layout.
    pub format: Format,
    pub buffer_slot: u32,
    /// Zero steps per vertex, anything else per instance.
    pub divisor: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TextureDesc<'a> {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: Format,
    pub usage: Usage,
    pub binding_flags: BindingFlags,
    pub mip_levels: MipLevels,
    pub initial_data: Option<&'a [u8]>,
}

impl TextureDesc<'_> {
    /// Asserts the descriptor describes a texture any backend could create.
    pub fn validate(&self) {
        assert!(self.format != Format::Null, "texture format must not be Null");
        assert!(
            self.width > 0 && self.height > 0,
            "texture extent {}x{} is empty",
            self.width,
            self.height
        );
        assert!(
            BindingFlags::TEXTURE_BINDINGS.contains(self.binding_flags),
            "{:?} are not texture bind points",
            self.binding_flags.difference(BindingFlags::TEXTURE_BINDINGS)
        );
        if self.usage == Usage::Staging {
            assert!(
                self.binding_flags.is_empty(),
                "staging textures cannot be bound to the pipeline"
            );
        }
        if let Some(data) = self.initial_data {
            assert!(
                self.mip_levels.resolve(self.width, self.height) == 1,
                "initial data is only accepted for single mip textures"
            );
            let needed = self.depth.max(1) as usize
                * self.format.slice_size(self.width, self.height) as usize;
            assert!(
                data.len() >= needed,
                "initial data holds {} bytes, {needed} needed",
                data.len()
            );
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BufferDesc<'a> {
    pub size: u32,
    pub binding_flags: BindingFlags,
    pub usage: Usage,
    /// Element stride for structured buffers, zero otherwise.
    pub struct_size: u32,
    pub initial_data: Option<&'a [u8]>,
}

impl BufferDesc<'_> {
    pub fn validate(&self) {
        assert!(self.size > 0, "buffers must not be empty");
        assert!(
            BindingFlags::BUFFER_BINDINGS.contains(self.binding_flags),
            "{:?} are not buffer bind points",
            self.binding_flags.difference(BindingFlags::BUFFER_BINDINGS)
        );
        if self.usage == Usage::Staging {
            assert!(
                self.binding_flags.is_empty(),
                "staging buffers cannot be bound to the pipeline"
            );
        }
        if self.usage == Usage::Immutable {
            assert!(self.initial_data.is_some(), "immutable buffers need initial data");
        }
        if let Some(data) = self.initial_data {
            assert!(
                data.len() >= self.size as usize,
                "initial data holds {} bytes, {} needed",
                data.len(),
                self.size
            );
        }
    }

    /// Element count of the typed views derived from this buffer.
    pub fn element_count(&self) -> u32 {
        if self
            .binding_flags
            .intersects(BindingFlags::SHADER_RESOURCE | BindingFlags::UNORDERED_ACCESS)
        {
            assert!(
                self.struct_size != 0 && self.size % self.struct_size == 0,
                "buffer views need size ({}) to be a multiple of struct_size ({})",
                self.size,
                self.struct_size
            );
            self.size / self.struct_size
        } else {
            0
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RenderTargetDesc<'a> {
    /// The first `None` ends the colour list.
    pub color_textures: [Option<&'a Texture>; MAX_RENDER_TARGETS],
    pub depth_stencil: Option<&'a Texture>,
}

impl<'a> RenderTargetDesc<'a> {
    pub fn colors(&self) -> impl Iterator<Item = &'a Texture> + '_ {
        self.color_textures.iter().map_while(|t| *t)
    }
}

#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub struct SamplerDesc {
    pub filtering: TextureFiltering,
    pub anisotropy: u32,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    DstColor,
    InvDstColor,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
}

#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
}

#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
}

#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub struct ColorBlendState {
    pub enable: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub op_alpha: BlendOp,
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self {
            enable: false,
            src: BlendFactor::One,
            dst: BlendFactor::Zero,
            op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            op_alpha: BlendOp::Add,
        }
    }
}

impl ColorBlendState {
    /// Classic `src * a + dst * (1 - a)` over blending.
    pub fn alpha_blend() -> Self {
        Self {
            enable: true,
            src: BlendFactor::SrcAlpha,
            dst: BlendFactor::InvSrcAlpha,
            ..Default::default()
        }
    }
}

/// Shader binary flavour, ordered from least to most capable HLSL profile.
#[repr(u8)]
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum ShaderTier {
    /// GLSL source text.
    Glsl,
    /// Shader model 4.0, feature level 9.1 profile.
    Hlsl40Level91,
    /// Shader model 4.0, feature level 9.3 profile.
    Hlsl40Level93,
    Hlsl40,
    Hlsl50,
}

#[derive(Clone, Copy, Debug)]
pub struct ShaderBinary<'a> {
    pub tier: ShaderTier,
    pub vertex: &'a [u8],
    pub fragment: &'a [u8],
}

#[derive(Clone, Copy, Debug)]
pub struct ComputeBinary<'a> {
    pub tier: ShaderTier,
    pub code: &'a [u8],
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineDesc<'a> {
    pub cw_front_face: bool,
    pub depth_test: bool,
    pub render_targets: [ColorBlendState; MAX_RENDER_TARGETS],
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    /// Candidate binaries; the best one the device can run is picked once.
    pub shaders: &'a [ShaderBinary<'a>],
    pub input_layout: [LayoutDesc; MAX_VERTEX_ATTRIBUTES],
}

impl PipelineDesc<'_> {
    pub fn attributes(&self) -> impl Iterator<Item = (usize, &LayoutDesc)> + '_ {
        self.input_layout
            .iter()
            .enumerate()
            .take_while(|(_, l)| l.format != Format::Null)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ComputePipelineDesc<'a> {
    pub shaders: &'a [ComputeBinary<'a>],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub struct ClearDesc {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u8,
    pub flag_color: bool,
    pub flag_depth: bool,
    pub flag_stencil: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VertexBufferBinding {
    pub buffer: Option<Buffer>,
    pub offset: u32,
    pub stride: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VertexInputs {
    pub index_buffer: Option<Buffer>,
    /// `U16x1` or `U32x1` when an index buffer is present.
    pub index_format: Format,
    pub vertex_buffers: [VertexBufferBinding; MAX_VERTEX_BUFFERS],
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UniformBufferBinding {
    pub buffer: Buffer,
    /// Byte offset of the bound range.
    pub offset: u32,
    /// Byte size of the bound range; zero binds the whole buffer.
    pub size: u32,
}

/// Read-only shader view onto exactly one resource.
#[derive(Clone, Copy, Debug)]
pub enum ResourceView {
    Buffer(Buffer),
    Texture(Texture),
}

/// Read-write shader view onto exactly one resource.
#[derive(Clone, Copy, Debug)]
pub enum UnorderedView {
    Buffer(Buffer),
    Texture(Texture),
}

#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum PrimitiveType {
    #[default]
    TriangleList,
    TriangleStrip,
    TriangleFan,
    LineList,
    LineStrip,
    PointList,
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub enum MapKind {
    Read,
    Write,
    ReadWrite,
    Discard,
    NoOverwrite,
}

impl MapKind {
    pub fn reads(self) -> bool {
        matches!(self, MapKind::Read | MapKind::ReadWrite)
    }

    pub fn writes(self) -> bool {
        !matches!(self, MapKind::Read)
    }
}

/// CPU view of a mapped resource, valid until the matching unmap.
#[derive(Debug)]
pub struct MappedResource<'a> {
    pub data: &'a mut [u8],
    pub row_pitch: u32,
    pub depth_pitch: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyRegion {
    pub src_x: u32,
    pub src_y: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Draw {
    pub vertex_count: u32,
    pub start_vertex: u32,
    /// Zero selects the non-instanced draw.
    pub instance_count: u32,
    pub start_instance: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawIndexed {
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
    /// Zero selects the non-instanced draw.
    pub instance_count: u32,
    pub start_instance: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

//===----------------------------------------------------------------------===//
// Resource bundles
//===----------------------------------------------------------------------===//

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextureRaw {
    #[default]
    Empty,
    D3d11(D3d11Texture),
    Gl(GlTexture),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: Format,
    pub mip_levels: u32,
    pub raw: TextureRaw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BufferRaw {
    #[default]
    Empty,
    D3d11(D3d11Buffer),
    Gl(GlBuffer),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Buffer {
    pub size: u32,
    pub struct_size: u32,
    pub raw: BufferRaw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderTargetRaw {
    #[default]
    Empty,
    D3d11(D3d11RenderTarget),
    Gl(GlRenderTarget),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderTarget {
    pub color_count: u32,
    pub has_depth_stencil: bool,
    pub raw: RenderTargetRaw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PipelineRaw {
    #[default]
    Empty,
    D3d11(D3d11Pipeline),
    Gl(GlPipeline),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub raw: PipelineRaw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComputePipelineRaw {
    #[default]
    Empty,
    D3d11(D3d11ComputePipeline),
    Gl(GlComputePipeline),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComputePipeline {
    pub raw: ComputePipelineRaw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SamplerRaw {
    #[default]
    Empty,
    D3d11(D3d11Sampler),
    Gl(GlSampler),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sampler {
    pub raw: SamplerRaw,
}

macro_rules! impl_is_empty {
    ($($bundle:ty => $raw:ident),+ $(,)?) => {
        $(
            impl $bundle {
                /// True for the unallocated bundle.
                pub fn is_empty(&self) -> bool {
                    matches!(self.raw, $raw::Empty)
                }
            }
        )+
    };
}

impl_is_empty!(
    Texture => TextureRaw,
    Buffer => BufferRaw,
    RenderTarget => RenderTargetRaw,
    Pipeline => PipelineRaw,
    ComputePipeline => ComputePipelineRaw,
    Sampler => SamplerRaw,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_mip_chain_covers_largest_extent() {
        assert_eq!(MipLevels::Auto.resolve(256, 256), 9);
        assert_eq!(MipLevels::Auto.resolve(300, 17), 9);
        assert_eq!(MipLevels::Auto.resolve(1, 1), 1);
        assert_eq!(MipLevels::Count(0).resolve(64, 64), 1);
        assert_eq!(MipLevels::Count(3).resolve(64, 64), 3);
    }

    #[test]
    fn structured_element_count() {
        let desc = BufferDesc {
            size: 256,
            struct_size: 16,
            binding_flags: BindingFlags::SHADER_RESOURCE | BindingFlags::STRUCTURED_BUFFER,
            ..Default::default()
        };
        assert_eq!(desc.element_count(), 16);
    }

    #[test]
    #[should_panic(expected = "multiple of struct_size")]
    fn structured_size_must_divide() {
        let desc = BufferDesc {
            size: 250,
            struct_size: 16,
            binding_flags: BindingFlags::UNORDERED_ACCESS,
            ..Default::default()
        };
        desc.element_count();
    }

    #[test]
    fn render_target_colors_stop_at_first_gap() {
        let a = Texture::default();
        let b = Texture::default();
        let desc = RenderTargetDesc {
            color_textures: [Some(&a), None, Some(&b), None, None, None, None, None],
            depth_stencil: None,
        };
        assert_eq!(desc.colors().count(), 1);
    }
}
