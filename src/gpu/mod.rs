pub mod context;
pub mod d3d11;
pub mod error;
pub mod format;
pub mod gl;
pub mod null;
pub mod state;
pub mod structs;

pub use context::*;
pub use error::*;
pub use format::{Component, FormatInfo, FormatSet, FormatSize};
pub use state::BindingState;
pub use structs::*;

/// Operations every rendering backend implements.
///
/// [`Context`] holds exactly one implementation, chosen when it is created.
/// Bundles handed to a backend must have been made by that same backend.
///
/// # Examples
/// ```ignore
/// use rhal::gpu::Backend;
/// fn clear_black<B: Backend>(ctx: &mut B) {
///     ctx.clear(&rhal::ClearDesc { color: [0.0, 0.0, 0.0, 1.0], flag_color: true, ..Default::default() });
/// }
/// ```
pub trait Backend {
    fn info(&self) -> &ContextInfo;
    fn binding_state(&self) -> &BindingState;
    fn resize_buffers(&mut self);
    fn present(&mut self);
    fn is_device_lost(&self) -> bool;

    fn make_texture(&mut self, desc: &TextureDesc<'_>) -> Texture;
    fn make_buffer(&mut self, desc: &BufferDesc<'_>) -> Buffer;
    fn make_render_target(&mut self, desc: &RenderTargetDesc<'_>) -> RenderTarget;
    fn make_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Pipeline;
    fn make_compute_pipeline(&mut self, desc: &ComputePipelineDesc<'_>) -> ComputePipeline;
    fn make_sampler(&mut self, desc: &SamplerDesc) -> Sampler;

    fn free_texture(&mut self, texture: &mut Texture);
    fn free_buffer(&mut self, buffer: &mut Buffer);
    fn free_render_target(&mut self, target: &mut RenderTarget);
    fn free_pipeline(&mut self, pipeline: &mut Pipeline);
    fn free_compute_pipeline(&mut self, pipeline: &mut ComputePipeline);
    fn free_sampler(&mut self, sampler: &mut Sampler);

    /// Overwrites the start of `buffer` with `data`.
    fn update_buffer(&mut self, buffer: &Buffer, data: &[u8]);
    /// Overwrites mip 0 of array slice `slice`; `data` must cover it exactly.
    fn update_texture(&mut self, texture: &Texture, slice: u32, data: &[u8]);
    fn map_buffer(&mut self, buffer: &Buffer, kind: MapKind) -> MappedResource<'_>;
    /// `written_offset`/`written_size` describe the range the CPU modified.
    fn unmap_buffer(&mut self, buffer: &Buffer, written_offset: u32, written_size: u32);
    fn map_texture(&mut self, texture: &Texture, slice: u32, kind: MapKind) -> MappedResource<'_>;
    fn unmap_texture(&mut self, texture: &Texture, slice: u32);
    fn copy_buffer(&mut self, src: &Buffer, src_offset: u32, dst: &Buffer, dst_offset: u32, size: u32);
    fn copy_texture_2d(&mut self, src: &Texture, dst: &Texture, region: &CopyRegion);

    fn set_viewports(&mut self, viewports: &[Viewport]);
    fn set_pipeline(&mut self, pipeline: &Pipeline);
    /// `None` binds the swap chain target.
    fn set_render_target(&mut self, target: Option<&RenderTarget>);
    fn set_vertex_inputs(&mut self, inputs: &VertexInputs);
    fn set_uniform_buffers(&mut self, buffers: &[Option<UniformBufferBinding>]);
    fn set_resource_views(&mut self, views: &[Option<ResourceView>]);
    fn set_samplers(&mut self, samplers: &[Option<Sampler>]);
    fn set_primitive_type(&mut self, primitive: PrimitiveType);
    fn clear(&mut self, desc: &ClearDesc);
    fn draw(&mut self, cmd: &Draw);
    fn draw_indexed(&mut self, cmd: &DrawIndexed);

    fn set_compute_pipeline(&mut self, pipeline: &ComputePipeline);
    fn set_compute_uniform_buffers(&mut self, buffers: &[Option<UniformBufferBinding>]);
    fn set_compute_resource_views(&mut self, views: &[Option<ResourceView>]);
    fn set_compute_unordered_views(&mut self, views: &[Option<UnorderedView>]);
    fn dispatch(&mut self, cmd: &Dispatch);
}
