use raw_window_handle::RawWindowHandle;

use super::d3d11::{D3d11Context, D3d11Device};
use super::gl::{GlApi, GlContext};
use super::null::{NullD3d11, NullD3d11Config, NullD3d11Probe, NullGl, NullGlConfig, NullGlProbe};
use crate::{
    Backend, BindingState, Buffer, BufferDesc, ClearDesc, ComputePipeline, ComputePipelineDesc,
    ContextInfo, CopyRegion, Dispatch, Draw, DrawIndexed, MapKind, MappedResource, Pipeline,
    PipelineDesc, PrimitiveType, RenderTarget, RenderTargetDesc, ResourceView, Sampler,
    SamplerDesc, Texture, TextureDesc, UniformBufferBinding, UnorderedView, VertexInputs, Viewport,
};

/// Environment variable that turns on native debug output when set to `1`.
pub const DEBUG_ENV: &str = "RHAL_DEBUG";

/// Creation parameters shared by both backends.
#[derive(Clone, Copy, Debug)]
pub struct ContextDesc {
    pub window: Option<RawWindowHandle>,
    /// Debug layer (Direct3D 11) or error draining after each call (GL).
    pub debug: bool,
    pub vsync: bool,
}

impl Default for ContextDesc {
    fn default() -> Self {
        Self {
            window: None,
            debug: std::env::var(DEBUG_ENV).map_or(false, |v| v == "1"),
            vsync: true,
        }
    }
}

/// Public GPU context facade that dispatches to the selected backend.
///
/// The backend is fixed at creation; every bundle it hands out must come
/// back to the same context.
pub enum Context {
    D3d11(D3d11Context),
    Gl(GlContext),
}

macro_rules! forward {
    ($self:ident, $ctx:ident => $call:expr) => {
        match $self {
            Context::D3d11($ctx) => $call,
            Context::Gl($ctx) => $call,
        }
    };
}

impl Context {
    pub fn from_d3d11_device(device: Box<dyn D3d11Device>, desc: &ContextDesc) -> Self {
        Context::D3d11(D3d11Context::new(device, desc.vsync))
    }

    pub fn from_gl_api(gl: Box<dyn GlApi>, desc: &ContextDesc) -> Self {
        Context::Gl(GlContext::new(gl, desc.debug))
    }

    /// Explicit backend on a software device.
    pub fn null_d3d11(config: NullD3d11Config) -> (Self, NullD3d11Probe) {
        let (device, probe) = NullD3d11::new(config);
        let desc = ContextDesc {
            vsync: false,
            ..Default::default()
        };
        (Self::from_d3d11_device(Box::new(device), &desc), probe)
    }

    /// Reflective backend on a software device, always in debug mode.
    pub fn null_gl(config: NullGlConfig) -> (Self, NullGlProbe) {
        let (gl, probe) = NullGl::new(config);
        let desc = ContextDesc {
            debug: true,
            ..Default::default()
        };
        (Self::from_gl_api(Box::new(gl), &desc), probe)
    }

    /// Direct3D 11 device and swap chain for `desc.window`.
    #[cfg(all(windows, feature = "rhal-d3d11"))]
    pub fn d3d11(desc: &ContextDesc) -> crate::Result<Self> {
        let window = desc.window.ok_or(crate::GPUError::MissingWindowHandle)?;
        let device = super::d3d11::windows_device::WindowsDevice::new(window, desc.debug)?;
        Ok(Self::from_d3d11_device(Box::new(device), desc))
    }

    /// GL context that is current for `surface`.
    ///
    /// # Safety
    /// Same contract as [`GlowDevice::new`](super::gl::glow_device::GlowDevice::new).
    #[cfg(feature = "rhal-gl")]
    pub unsafe fn gl(surface: Box<dyn super::gl::glow_device::GlSurface>, desc: &ContextDesc) -> Self {
        let device = super::gl::glow_device::GlowDevice::new(surface);
        Self::from_gl_api(Box::new(device), desc)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Context::D3d11(_) => "Direct3D 11",
            Context::Gl(ctx) if ctx.is_embedded() => "OpenGL ES",
            Context::Gl(_) => "OpenGL",
        }
    }

    /// Explicitly destroy the context and release backend resources.
    pub fn destroy(self) {
        log::debug!("destroying {} context", self.backend_name());
        match self {
            Context::D3d11(ctx) => drop(ctx),
            Context::Gl(ctx) => ctx.destroy(),
        }
    }
}

impl Backend for Context {
    fn info(&self) -> &ContextInfo {
        forward!(self, ctx => ctx.info())
    }

    fn binding_state(&self) -> &BindingState {
        forward!(self, ctx => ctx.binding_state())
    }

    fn resize_buffers(&mut self) {
        forward!(self, ctx => ctx.resize_buffers())
    }

    fn present(&mut self) {
        forward!(self, ctx => ctx.present())
    }

    fn is_device_lost(&self) -> bool {
        forward!(self, ctx => ctx.is_device_lost())
    }

    fn make_texture(&mut self, desc: &TextureDesc<'_>) -> Texture {
        forward!(self, ctx => ctx.make_texture(desc))
    }

    fn make_buffer(&mut self, desc: &BufferDesc<'_>) -> Buffer {
        forward!(self, ctx => ctx.make_buffer(desc))
    }

    fn make_render_target(&mut self, desc: &RenderTargetDesc<'_>) -> RenderTarget {
        forward!(self, ctx => ctx.make_render_target(desc))
    }

    fn make_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Pipeline {
        forward!(self, ctx => ctx.make_pipeline(desc))
    }

    fn make_compute_pipeline(&mut self, desc: &ComputePipelineDesc<'_>) -> ComputePipeline {
        forward!(self, ctx => ctx.make_compute_pipeline(desc))
    }

    fn make_sampler(&mut self, desc: &SamplerDesc) -> Sampler {
        forward!(self, ctx => ctx.make_sampler(desc))
    }

    fn free_texture(&mut self, texture: &mut Texture) {
        forward!(self, ctx => ctx.free_texture(texture))
    }

    fn free_buffer(&mut self, buffer: &mut Buffer) {
        forward!(self, ctx => ctx.free_buffer(buffer))
    }

    fn free_render_target(&mut self, target: &mut RenderTarget) {
        forward!(self, ctx => ctx.free_render_target(target))
    }

    fn free_pipeline(&mut self, pipeline: &mut Pipeline) {
        forward!(self, ctx => ctx.free_pipeline(pipeline))
    }

    fn free_compute_pipeline(&mut self, pipeline: &mut ComputePipeline) {
        forward!(self, ctx => ctx.free_compute_pipeline(pipeline))
    }

    fn free_sampler(&mut self, sampler: &mut Sampler) {
        forward!(self, ctx => ctx.free_sampler(sampler))
    }

    fn update_buffer(&mut self, buffer: &Buffer, data: &[u8]) {
        forward!(self, ctx => ctx.update_buffer(buffer, data))
    }

    fn update_texture(&mut self, texture: &Texture, slice: u32, data: &[u8]) {
        forward!(self, ctx => ctx.update_texture(texture, slice, data))
    }

    fn map_buffer(&mut self, buffer: &Buffer, kind: MapKind) -> MappedResource<'_> {
        forward!(self, ctx => ctx.map_buffer(buffer, kind))
    }

    fn unmap_buffer(&mut self, buffer: &Buffer, written_offset: u32, written_size: u32) {
        forward!(self, ctx => ctx.unmap_buffer(buffer, written_offset, written_size))
    }

    fn map_texture(&mut self, texture: &Texture, slice: u32, kind: MapKind) -> MappedResource<'_> {
        forward!(self, ctx => ctx.map_texture(texture, slice, kind))
    }

    fn unmap_texture(&mut self, texture: &Texture, slice: u32) {
        forward!(self, ctx => ctx.unmap_texture(texture, slice))
    }

    fn copy_buffer(&mut self, src: &Buffer, src_offset: u32, dst: &Buffer, dst_offset: u32, size: u32) {
        forward!(self, ctx => ctx.copy_buffer(src, src_offset, dst, dst_offset, size))
    }

    fn copy_texture_2d(&mut self, src: &Texture, dst: &Texture, region: &CopyRegion) {
        forward!(self, ctx => ctx.copy_texture_2d(src, dst, region))
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        forward!(self, ctx => ctx.set_viewports(viewports))
    }

    fn set_pipeline(&mut self, pipeline: &Pipeline) {
        forward!(self, ctx => ctx.set_pipeline(pipeline))
    }

    fn set_render_target(&mut self, target: Option<&RenderTarget>) {
        forward!(self, ctx => ctx.set_render_target(target))
    }

    fn set_vertex_inputs(&mut self, inputs: &VertexInputs) {
        forward!(self, ctx => ctx.set_vertex_inputs(inputs))
    }

    fn set_uniform_buffers(&mut self, buffers: &[Option<UniformBufferBinding>]) {
        forward!(self, ctx => ctx.set_uniform_buffers(buffers))
    }

    fn set_resource_views(&mut self, views: &[Option<ResourceView>]) {
        forward!(self, ctx => ctx.set_resource_views(views))
    }

    fn set_samplers(&mut self, samplers: &[Option<Sampler>]) {
        forward!(self, ctx => ctx.set_samplers(samplers))
    }

    fn set_primitive_type(&mut self, primitive: PrimitiveType) {
        forward!(self, ctx => ctx.set_primitive_type(primitive))
    }

    fn clear(&mut self, desc: &ClearDesc) {
        forward!(self, ctx => ctx.clear(desc))
    }

    fn draw(&mut self, cmd: &Draw) {
        forward!(self, ctx => ctx.draw(cmd))
    }

    fn draw_indexed(&mut self, cmd: &DrawIndexed) {
        forward!(self, ctx => ctx.draw_indexed(cmd))
    }

    fn set_compute_pipeline(&mut self, pipeline: &ComputePipeline) {
        forward!(self, ctx => ctx.set_compute_pipeline(pipeline))
    }

    fn set_compute_uniform_buffers(&mut self, buffers: &[Option<UniformBufferBinding>]) {
        forward!(self, ctx => ctx.set_compute_uniform_buffers(buffers))
    }

    fn set_compute_resource_views(&mut self, views: &[Option<ResourceView>]) {
        forward!(self, ctx => ctx.set_compute_resource_views(views))
    }

    fn set_compute_unordered_views(&mut self, views: &[Option<UnorderedView>]) {
        forward!(self, ctx => ctx.set_compute_unordered_views(views))
    }

    fn dispatch(&mut self, cmd: &Dispatch) {
        forward!(self, ctx => ctx.dispatch(cmd))
    }
}
