use crate::{
    Buffer, ComputePipeline, Format, Pipeline, PrimitiveType, RenderTarget, ResourceView,
    Sampler, UniformBufferBinding, UnorderedView, VertexBufferBinding, Viewport, MAX_RESOURCE_VIEWS,
    MAX_SAMPLERS, MAX_UNIFORM_BUFFERS, MAX_UNORDERED_VIEWS, MAX_VERTEX_BUFFERS, MAX_VIEWPORTS,
};

/// Ambient binding state of a context.
///
/// Set* calls write here and to the native API; draws and dispatches read
/// the parts the native API cannot be asked for cheaply. `Clear` never reads
/// the render target from here.
#[derive(Clone, Debug, Default)]
pub struct BindingState {
    pub viewports: Vec<Viewport>,
    pub pipeline: Option<Pipeline>,
    pub compute_pipeline: Option<ComputePipeline>,
    /// `None` while the swap chain target is bound.
    pub render_target: Option<RenderTarget>,
    pub vertex_buffers: [VertexBufferBinding; MAX_VERTEX_BUFFERS],
    pub index_buffer: Option<Buffer>,
    pub index_format: Format,
    pub uniform_buffers: [Option<UniformBufferBinding>; MAX_UNIFORM_BUFFERS],
    pub resource_views: [Option<ResourceView>; MAX_RESOURCE_VIEWS],
    pub samplers: [Option<Sampler>; MAX_SAMPLERS],
    pub compute_uniform_buffers: [Option<UniformBufferBinding>; MAX_UNIFORM_BUFFERS],
    pub compute_resource_views: [Option<ResourceView>; MAX_RESOURCE_VIEWS],
    pub unordered_views: [Option<UnorderedView>; MAX_UNORDERED_VIEWS],
    pub primitive: PrimitiveType,
}

/// Copies `src` over the first slots of `dst`, asserting the slot budget.
pub(crate) fn store_slots<T: Copy>(dst: &mut [Option<T>], src: &[Option<T>], what: &str) {
    assert!(
        src.len() <= dst.len(),
        "{} {what} slots requested, at most {} exist",
        src.len(),
        dst.len()
    );
    dst[..src.len()].copy_from_slice(src);
}

impl BindingState {
    pub fn set_viewports(&mut self, viewports: &[Viewport]) {
        assert!(
            viewports.len() <= MAX_VIEWPORTS,
            "{} viewports requested, at most {MAX_VIEWPORTS} exist",
            viewports.len()
        );
        self.viewports.clear();
        self.viewports.extend_from_slice(viewports);
    }

    /// Bytes per index of the bound index buffer.
    pub fn index_size(&self) -> u32 {
        assert!(self.index_buffer.is_some(), "indexed draw without an index buffer");
        index_size(self.index_format)
    }
}

pub fn index_size(format: Format) -> u32 {
    match format {
        Format::U16x1 => 2,
        Format::U32x1 => 4,
        other => panic!("{other:?} is not an index format"),
    }
}
