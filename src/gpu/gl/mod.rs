//! Reflective backend on top of OpenGL 3.3+ and OpenGL ES 3.0+.
//!
//! GL keeps one global state machine, so pipelines store their descriptor
//! fields and re-apply them on every bind. Uniform blocks and samplers are
//! attached to slots by name whenever a program becomes current.

pub mod capabilities;
pub mod conversions;
#[cfg(feature = "rhal-gl")]
pub mod glow_device;
pub mod native;
pub mod reflection;
pub mod shader;

use std::collections::HashMap;

use glow as gl;

use crate::state::store_slots;
use crate::{
    Backend, BindingFlags, BindingState, Buffer, BufferDesc, BufferRaw, ClearDesc, ColorBlendState,
    ComputePipeline, ComputePipelineDesc, ComputePipelineRaw, ContextInfo, CopyRegion, CullMode,
    Dispatch, Draw, DrawIndexed, FillMode, Format, LayoutDesc, MapKind, MappedResource, Pipeline,
    PipelineDesc, PipelineRaw, PrimitiveType, RenderTarget, RenderTargetDesc, RenderTargetRaw,
    ResourceView, Sampler, SamplerDesc, SamplerRaw, ShaderTier, Texture, TextureDesc,
    TextureFiltering, TextureRaw, UniformBufferBinding, UnorderedView, Usage, VertexInputs,
    Viewport, MAX_RESOURCE_VIEWS, MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_BUFFERS,
};
use capabilities::{apply_limits, parse_version, probe_features, GlFeatures, GlLimits, GlVersion};
use conversions::{
    blend_equation, blend_factor, buffer_usage, cull_face, depth_attachment, map_access,
    polygon_mode, primitive_mode, sampler_filters, texture_swizzle, vertex_attrib_format,
    GlFormat, TEXTURE_MAX_ANISOTROPY_EXT,
};
pub use native::{GlApi, GlName};
use reflection::SlotCache;
use shader::{prepare_source, ShaderStage};

/// Unordered buffer views bind after the shader-storage slots of resource views.
const UNORDERED_BUFFER_BASE: u32 = MAX_RESOURCE_VIEWS as u32;

/// Texture unit used for uploads and copies; resource views never reach it.
const SCRATCH_UNIT: u32 = gl::TEXTURE0 + MAX_RESOURCE_VIEWS as u32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlTexture {
    pub texture: Option<GlName>,
    /// Set instead of `texture` for depth targets that are never sampled.
    pub renderbuffer: Option<GlName>,
    pub target: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlBuffer {
    pub buffer: Option<GlName>,
    pub usage: Usage,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlRenderTarget {
    pub framebuffer: Option<GlName>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlPipeline {
    pub program: Option<GlName>,
    pub blend: ColorBlendState,
    pub cull_mode: CullMode,
    pub cw_front_face: bool,
    pub depth_test: bool,
    pub fill_mode: FillMode,
    pub layout: [LayoutDesc; MAX_VERTEX_ATTRIBUTES],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlComputePipeline {
    pub program: Option<GlName>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlSampler {
    pub sampler: Option<GlName>,
}

macro_rules! raw_of {
    ($name:ident, $bundle:ty, $raw:ident, $native:ty) => {
        fn $name(bundle: &$bundle) -> Option<&$native> {
            match &bundle.raw {
                $raw::Gl(raw) => Some(raw),
                $raw::Empty => None,
                _ => panic!(concat!(stringify!($bundle), " was created by another backend")),
            }
        }
    };
}

raw_of!(texture_raw, Texture, TextureRaw, GlTexture);
raw_of!(buffer_raw, Buffer, BufferRaw, GlBuffer);
raw_of!(target_raw, RenderTarget, RenderTargetRaw, GlRenderTarget);
raw_of!(pipeline_raw, Pipeline, PipelineRaw, GlPipeline);
raw_of!(compute_raw, ComputePipeline, ComputePipelineRaw, GlComputePipeline);
raw_of!(sampler_raw, Sampler, SamplerRaw, GlSampler);

fn unmapped<'a>() -> MappedResource<'a> {
    MappedResource {
        data: &mut [],
        row_pitch: 0,
        depth_pitch: 0,
    }
}

/// CPU copy of a texture slice handed out by `map_texture`.
struct TextureMapping {
    kind: MapKind,
    data: Vec<u8>,
}

pub struct GlContext {
    gl: Box<dyn GlApi>,
    info: ContextInfo,
    version: GlVersion,
    embedded: bool,
    features: GlFeatures,
    debug: bool,
    state: BindingState,
    slots: SlotCache,
    /// Attribute layout of the bound pipeline.
    layout: [LayoutDesc; MAX_VERTEX_ATTRIBUTES],
    primitive: u32,
    vertex_array: Option<GlName>,
    scratch_framebuffer: Option<GlName>,
    mapped_textures: HashMap<(GlName, u32), TextureMapping>,
}

impl GlContext {
    /// Probes `gl` and prepares the global objects every context needs.
    ///
    /// `debug` drains `glGetError` after every operation and logs what it finds.
    pub fn new(mut gl: Box<dyn GlApi>, debug: bool) -> Self {
        let version_string = gl.get_string(gl::VERSION);
        let Some((version, embedded)) = parse_version(&version_string) else {
            panic!("unrecognised GL_VERSION '{version_string}'");
        };

        let (mut info, features) = probe_features(version, embedded, &gl.extensions());
        let limits = GlLimits::query(gl.as_ref(), &features);
        apply_limits(&mut info, &features, &limits);

        let profile = if embedded { "OpenGL ES" } else { "OpenGL" };
        info.backend_api = format!("{profile} {}.{}", version.major, version.minor);
        info.driver_renderer = gl.get_string(gl::RENDERER);
        info.driver_adapter = gl.get_string(gl::VENDOR);
        info.driver_version = version_string;

        gl.pixel_store_i32(gl::UNPACK_ALIGNMENT, 1);
        gl.pixel_store_i32(gl::PACK_ALIGNMENT, 1);

        let vertex_array = match gl.create_vertex_array() {
            Ok(vao) => Some(vao),
            Err(err) => {
                log::error!("glGenVertexArrays failed: {err}");
                None
            }
        };
        gl.bind_vertex_array(vertex_array);
        let scratch_framebuffer = match gl.create_framebuffer() {
            Ok(fb) => Some(fb),
            Err(err) => {
                log::error!("glGenFramebuffers failed: {err}");
                None
            }
        };

        log::info!(
            "{} context on '{}' ({}), compute {}",
            info.backend_api,
            info.driver_renderer,
            info.driver_adapter,
            if info.has_compute_pipeline { "available" } else { "unavailable" }
        );

        Self {
            gl,
            info,
            version,
            embedded,
            features,
            debug,
            state: BindingState::default(),
            slots: SlotCache::default(),
            layout: [LayoutDesc::default(); MAX_VERTEX_ATTRIBUTES],
            primitive: gl::TRIANGLES,
            vertex_array,
            scratch_framebuffer,
            mapped_textures: HashMap::new(),
        }
    }

    pub fn version(&self) -> GlVersion {
        self.version
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn features(&self) -> &GlFeatures {
        &self.features
    }

    /// Releases the objects created by [`GlContext::new`].
    pub fn destroy(mut self) {
        self.gl.bind_vertex_array(None);
        if let Some(vao) = self.vertex_array.take() {
            self.gl.delete_vertex_array(vao);
        }
        if let Some(fb) = self.scratch_framebuffer.take() {
            self.gl.delete_framebuffer(fb);
        }
    }

    fn profile(&self) -> &str {
        &self.info.backend_api
    }

    fn created(what: &str, result: Result<GlName, String>) -> Option<GlName> {
        match result {
            Ok(name) => Some(name),
            Err(err) => {
                log::error!("{what} failed: {err}");
                None
            }
        }
    }

    fn drain_errors(&mut self, what: &str) {
        if !self.debug {
            return;
        }
        loop {
            let error = self.gl.get_error();
            if error == gl::NO_ERROR {
                break;
            }
            log::error!("{what}: GL error {error:#06x}");
        }
    }

    fn current_framebuffer(&self) -> Option<GlName> {
        self.state
            .render_target
            .as_ref()
            .and_then(target_raw)
            .and_then(|r| r.framebuffer)
    }

    /// Makes `program` current, resolving its slots if it was not already.
    fn activate(&mut self, program: Option<GlName>) {
        let Some(program) = program else {
            self.gl.use_program(None);
            self.slots.invalidate();
            return;
        };
        if self.slots.program() != Some(program) {
            self.gl.use_program(Some(program));
            self.slots.resolve(self.gl.as_mut(), program);
        }
    }

    fn compile(&mut self, stage: ShaderStage, code: &[u8]) -> Option<GlName> {
        let source = prepare_source(code, stage, self.embedded);
        let shader = Self::created("glCreateShader", self.gl.create_shader(stage.gl_type()))?;
        self.gl.shader_source(shader, &source);
        self.gl.compile_shader(shader);
        assert!(
            self.gl.get_shader_compile_status(shader),
            "{stage:?} shader failed to compile: {}",
            self.gl.get_shader_info_log(shader)
        );
        Some(shader)
    }

    fn link(&mut self, shaders: &[Option<GlName>]) -> Option<GlName> {
        let program = Self::created("glCreateProgram", self.gl.create_program());
        if let Some(program) = program {
            for shader in shaders.iter().flatten() {
                self.gl.attach_shader(program, *shader);
            }
            self.gl.link_program(program);
            assert!(
                self.gl.get_program_link_status(program),
                "program failed to link: {}",
                self.gl.get_program_info_log(program)
            );
        }
        for shader in shaders.iter().flatten() {
            if let Some(program) = program {
                self.gl.detach_shader(program, *shader);
            }
            self.gl.delete_shader(*shader);
        }
        program
    }

    fn glsl_binary<'a, T>(&self, shaders: &'a [T], tier_of: impl Fn(&T) -> ShaderTier) -> &'a T {
        let Some(binary) = shaders.iter().find(|s| tier_of(s) == ShaderTier::Glsl) else {
            panic!("no GLSL binary among the {} supplied for {}", shaders.len(), self.profile());
        };
        binary
    }

    /// Uploads `layers` tightly packed slices starting at `first_layer`.
    ///
    /// The texture must be bound on the scratch unit.
    fn upload_slices(&mut self, texture: &Texture, target: u32, first_layer: u32, layers: u32, data: &[u8]) {
        let native = GlFormat::of(texture.format);
        let (w, h) = (texture.width as i32, texture.height as i32);
        match (target == gl::TEXTURE_2D_ARRAY, native.compressed) {
            (false, false) => self
                .gl
                .tex_sub_image_2d(target, 0, 0, 0, w, h, native.format, native.ty, data),
            (false, true) => self
                .gl
                .compressed_tex_sub_image_2d(target, 0, 0, 0, w, h, native.internal, data),
            (true, false) => self.gl.tex_sub_image_3d(
                target,
                0,
                0,
                0,
                first_layer as i32,
                w,
                h,
                layers as i32,
                native.format,
                native.ty,
                data,
            ),
            (true, true) => self.gl.compressed_tex_sub_image_3d(
                target,
                0,
                0,
                0,
                first_layer as i32,
                w,
                h,
                layers as i32,
                native.internal,
                data,
            ),
        }
    }

    /// Allocates every mip of the texture bound on the scratch unit.
    fn allocate_texture(&mut self, desc: &TextureDesc<'_>, target: u32, mip_levels: u32) {
        let native = GlFormat::of(desc.format);
        let layers = desc.depth.max(1) as i32;
        let array = target == gl::TEXTURE_2D_ARRAY;

        if self.features.texture_storage {
            let levels = mip_levels as i32;
            let (w, h) = (desc.width as i32, desc.height as i32);
            if array {
                self.gl.tex_storage_3d(target, levels, native.internal, w, h, layers);
            } else {
                self.gl.tex_storage_2d(target, levels, native.internal, w, h);
            }
            return;
        }

        assert!(
            !(array && native.compressed),
            "compressed texture arrays need texture storage on {}",
            self.profile()
        );
        for level in 0..mip_levels {
            let w = (desc.width >> level).max(1);
            let h = (desc.height >> level).max(1);
            if native.compressed {
                let zeros = vec![0; desc.format.slice_size(w, h) as usize];
                self.gl
                    .compressed_tex_image_2d(target, level as i32, native.internal, w as i32, h as i32, &zeros);
            } else if array {
                self.gl.tex_image_3d(
                    target,
                    level as i32,
                    native.internal,
                    w as i32,
                    h as i32,
                    layers,
                    native.format,
                    native.ty,
                    None,
                );
            } else {
                self.gl.tex_image_2d(
                    target,
                    level as i32,
                    native.internal,
                    w as i32,
                    h as i32,
                    native.format,
                    native.ty,
                    None,
                );
            }
        }
    }

    /// Attaches colour slot 0 of the scratch framebuffer to `texture` for reading.
    fn attach_for_read(&mut self, raw: &GlTexture, layer: u32) {
        self.gl
            .bind_framebuffer(gl::READ_FRAMEBUFFER, self.scratch_framebuffer);
        if raw.target == gl::TEXTURE_2D_ARRAY {
            self.gl.framebuffer_texture_layer(
                gl::READ_FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0,
                raw.texture,
                0,
                layer as i32,
            );
        } else {
            self.gl.framebuffer_texture_2d(
                gl::READ_FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0,
                gl::TEXTURE_2D,
                raw.texture,
                0,
            );
        }
    }

    fn detach_read(&mut self) {
        self.gl.framebuffer_texture_2d(
            gl::READ_FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::TEXTURE_2D,
            None,
            0,
        );
        let current = self.current_framebuffer();
        self.gl.bind_framebuffer(gl::READ_FRAMEBUFFER, current);
    }

    fn bind_uniform_buffers(&mut self, buffers: &[Option<UniformBufferBinding>]) {
        assert!(
            buffers.len() <= self.info.max_uniform_buffers as usize,
            "{} uniform buffers requested, the device has {} slots",
            buffers.len(),
            self.info.max_uniform_buffers
        );
        for (i, binding) in buffers.iter().enumerate() {
            let Some(binding) = binding else {
                self.gl.bind_buffer_base(gl::UNIFORM_BUFFER, i as u32, None);
                continue;
            };
            assert!(
                binding.offset % 256 == 0,
                "uniform buffer offset {} is not a multiple of 256 bytes",
                binding.offset
            );
            assert!(
                binding.size % 16 == 0,
                "uniform buffer range of {} bytes is not a whole number of constants",
                binding.size
            );
            if let Some(program) = self.slots.program() {
                if self.slots.block(i).is_none() {
                    log::debug!("uniform buffer slot {i} is not read by program {program}");
                }
            }
            let name = buffer_raw(&binding.buffer).and_then(|r| r.buffer);
            if binding.offset == 0 && binding.size == 0 {
                self.gl.bind_buffer_base(gl::UNIFORM_BUFFER, i as u32, name);
            } else {
                let size = if binding.size == 0 {
                    binding.buffer.size.saturating_sub(binding.offset)
                } else {
                    binding.size
                };
                self.gl.bind_buffer_range(
                    gl::UNIFORM_BUFFER,
                    i as u32,
                    name,
                    binding.offset as i32,
                    size as i32,
                );
            }
        }
    }

    fn bind_resource_views(&mut self, views: &[Option<ResourceView>]) {
        assert!(
            views.len() <= self.info.max_textures_per_draw as usize,
            "{} resource views requested, the device samples {} textures",
            views.len(),
            self.info.max_textures_per_draw
        );
        for (i, view) in views.iter().enumerate() {
            let unit = i as u32;
            match view {
                Some(ResourceView::Texture(texture)) => {
                    let Some(raw) = texture_raw(texture).copied() else {
                        panic!("resource view {i} is an empty texture");
                    };
                    assert!(
                        raw.renderbuffer.is_none(),
                        "resource view {i} is a depth target created without SHADER_RESOURCE"
                    );
                    if let Some(program) = self.slots.program() {
                        if self.slots.sampler(i).is_none() {
                            log::debug!("texture unit {i} is not sampled by program {program}");
                        }
                    }
                    self.gl.active_texture(gl::TEXTURE0 + unit);
                    self.gl.bind_texture(raw.target, raw.texture);
                }
                Some(ResourceView::Buffer(buffer)) => {
                    let name = buffer_raw(buffer).and_then(|r| r.buffer);
                    self.gl.bind_buffer_base(gl::SHADER_STORAGE_BUFFER, unit, name);
                }
                None => {
                    self.gl.active_texture(gl::TEXTURE0 + unit);
                    self.gl.bind_texture(gl::TEXTURE_2D, None);
                    self.gl.bind_texture(gl::TEXTURE_2D_ARRAY, None);
                    if self.info.has_compute_pipeline {
                        self.gl.bind_buffer_base(gl::SHADER_STORAGE_BUFFER, unit, None);
                    }
                }
            }
        }
    }

    /// Re-applies every attribute of the bound pipeline's layout.
    fn apply_vertex_inputs(&mut self) {
        for (i, attr) in self.layout.iter().enumerate() {
            let index = i as u32;
            if attr.format == Format::Null {
                self.gl.disable_vertex_attrib_array(index);
                continue;
            }
            let vb = self.state.vertex_buffers[attr.buffer_slot as usize];
            let Some(name) = vb.buffer.as_ref().and_then(buffer_raw).and_then(|r| r.buffer) else {
                log::warn!(
                    "attribute {i} reads vertex buffer slot {}, which is unbound",
                    attr.buffer_slot
                );
                self.gl.disable_vertex_attrib_array(index);
                continue;
            };

            let native = vertex_attrib_format(attr.format);
            let stride = vb.stride as i32;
            let offset = (vb.offset + attr.offset) as i32;
            self.gl.bind_buffer(gl::ARRAY_BUFFER, Some(name));
            self.gl.enable_vertex_attrib_array(index);
            if native.integer {
                self.gl
                    .vertex_attrib_pointer_i32(index, native.size, native.ty, stride, offset);
            } else {
                self.gl.vertex_attrib_pointer_f32(
                    index,
                    native.size,
                    native.ty,
                    native.normalized,
                    stride,
                    offset,
                );
            }
            if self.info.has_instancing {
                self.gl.vertex_attrib_divisor(index, attr.divisor);
            }
        }
        self.gl.bind_buffer(gl::ARRAY_BUFFER, None);
    }

    fn apply_pipeline_state(&mut self, raw: &GlPipeline) {
        let blend = raw.blend;
        if blend.enable {
            self.gl.enable(gl::BLEND);
            self.gl.blend_func_separate(
                blend_factor(blend.src),
                blend_factor(blend.dst),
                blend_factor(blend.src_alpha),
                blend_factor(blend.dst_alpha),
            );
            self.gl
                .blend_equation_separate(blend_equation(blend.op), blend_equation(blend.op_alpha));
        } else {
            self.gl.disable(gl::BLEND);
        }

        match cull_face(raw.cull_mode) {
            Some(face) => {
                self.gl.enable(gl::CULL_FACE);
                self.gl.cull_face(face);
            }
            None => self.gl.disable(gl::CULL_FACE),
        }
        self.gl
            .front_face(if raw.cw_front_face { gl::CW } else { gl::CCW });

        if raw.depth_test {
            self.gl.enable(gl::DEPTH_TEST);
            self.gl.depth_func(gl::LESS);
        } else {
            self.gl.disable(gl::DEPTH_TEST);
        }
        self.gl.depth_mask(true);

        if !self.embedded {
            self.gl
                .polygon_mode(gl::FRONT_AND_BACK, polygon_mode(raw.fill_mode));
        }
    }

    fn graphics_program(&self) -> Option<GlName> {
        self.state
            .pipeline
            .as_ref()
            .and_then(pipeline_raw)
            .and_then(|r| r.program)
    }

    fn compute_program(&self) -> Option<GlName> {
        self.state
            .compute_pipeline
            .as_ref()
            .and_then(compute_raw)
            .and_then(|r| r.program)
    }
}

impl Backend for GlContext {
    fn info(&self) -> &ContextInfo {
        &self.info
    }

    fn binding_state(&self) -> &BindingState {
        &self.state
    }

    fn resize_buffers(&mut self) {
        self.gl.resize_surface();
        self.drain_errors("resize_buffers");
    }

    fn present(&mut self) {
        self.gl.swap_buffers();
        self.drain_errors("present");
    }

    fn is_device_lost(&self) -> bool {
        false
    }

    fn make_texture(&mut self, desc: &TextureDesc<'_>) -> Texture {
        desc.validate();
        assert!(
            self.info.texture_formats.contains(desc.format),
            "{:?} textures are not supported on {}",
            desc.format,
            self.profile()
        );
        if desc.binding_flags.contains(BindingFlags::RENDER_TARGET) {
            assert!(
                self.info.render_target_formats.contains(desc.format),
                "{:?} cannot be rendered to on {}",
                desc.format,
                self.profile()
            );
        }
        if desc.binding_flags.contains(BindingFlags::DEPTH_STENCIL) {
            assert!(
                desc.format.is_depth(),
                "{:?} is not a depth-stencil format",
                desc.format
            );
        }
        if desc.binding_flags.contains(BindingFlags::UNORDERED_ACCESS) {
            assert!(
                self.info.has_compute_pipeline,
                "unordered access textures need compute support, missing on {}",
                self.profile()
            );
        }

        let mip_levels = desc.mip_levels.resolve(desc.width, desc.height);
        let native = GlFormat::of(desc.format);
        let mut raw = GlTexture::default();

        let renderbuffer = desc.format.is_depth()
            && desc.binding_flags.contains(BindingFlags::DEPTH_STENCIL)
            && !desc.binding_flags.contains(BindingFlags::SHADER_RESOURCE)
            && desc.initial_data.is_none();

        if renderbuffer {
            raw.target = gl::RENDERBUFFER;
            raw.renderbuffer = Self::created("glGenRenderbuffers", self.gl.create_renderbuffer());
            if raw.renderbuffer.is_some() {
                self.gl.bind_renderbuffer(raw.renderbuffer);
                self.gl
                    .renderbuffer_storage(native.internal, desc.width as i32, desc.height as i32);
                self.gl.bind_renderbuffer(None);
            }
        } else {
            raw.target = if desc.depth > 1 {
                gl::TEXTURE_2D_ARRAY
            } else {
                gl::TEXTURE_2D
            };
            raw.texture = Self::created("glGenTextures", self.gl.create_texture());
            if raw.texture.is_some() {
                self.gl.active_texture(SCRATCH_UNIT);
                self.gl.bind_texture(raw.target, raw.texture);
                self.allocate_texture(desc, raw.target, mip_levels);
                self.gl.tex_parameter_i32(raw.target, gl::TEXTURE_BASE_LEVEL, 0);
                self.gl
                    .tex_parameter_i32(raw.target, gl::TEXTURE_MAX_LEVEL, mip_levels as i32 - 1);
                if let Some(swizzle) = texture_swizzle(desc.format) {
                    let channels = [
                        gl::TEXTURE_SWIZZLE_R,
                        gl::TEXTURE_SWIZZLE_G,
                        gl::TEXTURE_SWIZZLE_B,
                        gl::TEXTURE_SWIZZLE_A,
                    ];
                    for (pname, source) in channels.into_iter().zip(swizzle) {
                        self.gl.tex_parameter_i32(raw.target, pname, source as i32);
                    }
                }
            }
        }

        let texture = Texture {
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
            format: desc.format,
            mip_levels,
            raw: TextureRaw::Gl(raw),
        };

        if let (Some(data), Some(_)) = (desc.initial_data, raw.texture) {
            let layers = desc.depth.max(1);
            let size = layers as usize * desc.format.slice_size(desc.width, desc.height) as usize;
            self.upload_slices(&texture, raw.target, 0, layers, &data[..size]);
        }
        if raw.texture.is_some() {
            self.gl.bind_texture(raw.target, None);
        }

        self.drain_errors("make_texture");
        texture
    }

    fn make_buffer(&mut self, desc: &BufferDesc<'_>) -> Buffer {
        desc.validate();
        if desc.binding_flags.contains(BindingFlags::UNIFORM_BUFFER) {
            assert!(
                desc.size % 16 == 0,
                "uniform buffers must be a multiple of 16 bytes, got {}",
                desc.size
            );
        }
        if desc
            .binding_flags
            .intersects(BindingFlags::SHADER_RESOURCE | BindingFlags::UNORDERED_ACCESS)
        {
            assert!(
                self.info.has_compute_pipeline,
                "shader storage buffers need compute support, missing on {}",
                self.profile()
            );
        }
        let elements = desc.element_count();
        log::trace!("buffer of {} bytes, {elements} typed elements", desc.size);

        let buffer = Self::created("glGenBuffers", self.gl.create_buffer());
        if buffer.is_some() {
            let usage = buffer_usage(desc.usage);
            self.gl.bind_buffer(gl::COPY_WRITE_BUFFER, buffer);
            match desc.initial_data {
                Some(data) => self
                    .gl
                    .buffer_data(gl::COPY_WRITE_BUFFER, &data[..desc.size as usize], usage),
                None => self
                    .gl
                    .buffer_data_size(gl::COPY_WRITE_BUFFER, desc.size as i32, usage),
            }
            self.gl.bind_buffer(gl::COPY_WRITE_BUFFER, None);
        }

        self.drain_errors("make_buffer");
        Buffer {
            size: desc.size,
            struct_size: desc.struct_size,
            raw: BufferRaw::Gl(GlBuffer {
                buffer,
                usage: desc.usage,
            }),
        }
    }

    fn make_render_target(&mut self, desc: &RenderTargetDesc<'_>) -> RenderTarget {
        let framebuffer = Self::created("glGenFramebuffers", self.gl.create_framebuffer());
        self.gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, framebuffer);

        let mut draw_buffers = Vec::new();
        for (i, texture) in desc.colors().enumerate() {
            assert!(
                (i as u32) < self.info.max_render_targets,
                "render target {i} exceeds the device limit of {}",
                self.info.max_render_targets
            );
            let Some(raw) = texture_raw(texture).copied() else {
                panic!("render target colour {i} is an empty texture");
            };
            let point = gl::COLOR_ATTACHMENT0 + i as u32;
            if framebuffer.is_some() {
                if raw.target == gl::TEXTURE_2D_ARRAY {
                    self.gl
                        .framebuffer_texture_layer(gl::DRAW_FRAMEBUFFER, point, raw.texture, 0, 0);
                } else {
                    self.gl
                        .framebuffer_texture_2d(gl::DRAW_FRAMEBUFFER, point, gl::TEXTURE_2D, raw.texture, 0);
                }
            }
            draw_buffers.push(point);
        }

        if let Some(texture) = desc.depth_stencil {
            assert!(
                texture.format.is_depth(),
                "{:?} cannot be used as depth-stencil",
                texture.format
            );
            let Some(raw) = texture_raw(texture).copied() else {
                panic!("render target depth-stencil is an empty texture");
            };
            let point = depth_attachment(texture.format);
            if framebuffer.is_some() {
                match raw.renderbuffer {
                    Some(rb) => self
                        .gl
                        .framebuffer_renderbuffer(gl::DRAW_FRAMEBUFFER, point, Some(rb)),
                    None if raw.target == gl::TEXTURE_2D_ARRAY => self
                        .gl
                        .framebuffer_texture_layer(gl::DRAW_FRAMEBUFFER, point, raw.texture, 0, 0),
                    None => self.gl.framebuffer_texture_2d(
                        gl::DRAW_FRAMEBUFFER,
                        point,
                        gl::TEXTURE_2D,
                        raw.texture,
                        0,
                    ),
                }
            }
        }

        if framebuffer.is_some() {
            if draw_buffers.is_empty() {
                self.gl.draw_buffers(&[gl::NONE]);
            } else {
                self.gl.draw_buffers(&draw_buffers);
            }
            let status = self.gl.check_framebuffer_status(gl::DRAW_FRAMEBUFFER);
            if status != gl::FRAMEBUFFER_COMPLETE {
                log::error!("framebuffer {framebuffer:?} is incomplete: {status:#06x}");
            }
        }

        let current = self.current_framebuffer();
        self.gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, current);
        self.drain_errors("make_render_target");

        RenderTarget {
            color_count: draw_buffers.len() as u32,
            has_depth_stencil: desc.depth_stencil.is_some(),
            raw: RenderTargetRaw::Gl(GlRenderTarget { framebuffer }),
        }
    }

    fn make_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Pipeline {
        let binary = *self.glsl_binary(desc.shaders, |s| s.tier);
        assert!(
            !binary.vertex.is_empty() && !binary.fragment.is_empty(),
            "GLSL pipeline is missing its vertex or fragment source"
        );
        if self.embedded {
            assert!(
                desc.fill_mode == FillMode::Solid,
                "wireframe fill is not available on {}",
                self.profile()
            );
        }
        for (i, layout) in desc.attributes() {
            assert!(
                (layout.buffer_slot as usize) < MAX_VERTEX_BUFFERS,
                "attribute {i} reads vertex buffer slot {}",
                layout.buffer_slot
            );
            if layout.divisor != 0 {
                assert!(self.info.has_instancing, "per-instance attributes need instancing");
            }
            vertex_attrib_format(layout.format);
        }
        if desc.render_targets.iter().any(|rt| *rt != desc.render_targets[0]) {
            log::warn!("independent blend is not available, render target 0 blend state applies to all");
        }

        let vs = self.compile(ShaderStage::Vertex, binary.vertex);
        let fs = self.compile(ShaderStage::Fragment, binary.fragment);
        let program = self.link(&[vs, fs]);

        let mut layout = [LayoutDesc::default(); MAX_VERTEX_ATTRIBUTES];
        for (i, attr) in desc.attributes() {
            layout[i] = *attr;
        }

        self.drain_errors("make_pipeline");
        Pipeline {
            raw: PipelineRaw::Gl(GlPipeline {
                program,
                blend: desc.render_targets[0],
                cull_mode: desc.cull_mode,
                cw_front_face: desc.cw_front_face,
                depth_test: desc.depth_test,
                fill_mode: desc.fill_mode,
                layout,
            }),
        }
    }

    fn make_compute_pipeline(&mut self, desc: &ComputePipelineDesc<'_>) -> ComputePipeline {
        assert!(
            self.info.has_compute_pipeline,
            "compute pipelines are not supported on {}",
            self.profile()
        );
        let binary = *self.glsl_binary(desc.shaders, |s| s.tier);
        assert!(!binary.code.is_empty(), "empty GLSL compute source");

        let cs = self.compile(ShaderStage::Compute, binary.code);
        let program = self.link(&[cs]);

        self.drain_errors("make_compute_pipeline");
        ComputePipeline {
            raw: ComputePipelineRaw::Gl(GlComputePipeline { program }),
        }
    }

    fn make_sampler(&mut self, desc: &SamplerDesc) -> Sampler {
        let sampler = Self::created("glGenSamplers", self.gl.create_sampler());
        if let Some(s) = sampler {
            let (min, mag) = sampler_filters(desc.filtering);
            self.gl.sampler_parameter_i32(s, gl::TEXTURE_MIN_FILTER, min as i32);
            self.gl.sampler_parameter_i32(s, gl::TEXTURE_MAG_FILTER, mag as i32);
            for wrap in [gl::TEXTURE_WRAP_S, gl::TEXTURE_WRAP_T, gl::TEXTURE_WRAP_R] {
                self.gl.sampler_parameter_i32(s, wrap, gl::REPEAT as i32);
            }
            self.gl.sampler_parameter_f32(s, gl::TEXTURE_MIN_LOD, -1000.0);
            self.gl.sampler_parameter_f32(s, gl::TEXTURE_MAX_LOD, 1000.0);
            if desc.filtering == TextureFiltering::Anisotropic && self.features.anisotropic {
                let anisotropy = desc.anisotropy.clamp(1, self.info.max_anisotropy.max(1));
                self.gl
                    .sampler_parameter_f32(s, TEXTURE_MAX_ANISOTROPY_EXT, anisotropy as f32);
            }
        }

        self.drain_errors("make_sampler");
        Sampler {
            raw: SamplerRaw::Gl(GlSampler { sampler }),
        }
    }

    fn free_texture(&mut self, texture: &mut Texture) {
        if let Some(raw) = texture_raw(texture).copied() {
            if let Some(name) = raw.texture {
                self.mapped_textures.retain(|(t, _), _| *t != name);
                self.gl.delete_texture(name);
            }
            if let Some(name) = raw.renderbuffer {
                self.gl.delete_renderbuffer(name);
            }
        }
        *texture = Texture::default();
    }

    fn free_buffer(&mut self, buffer: &mut Buffer) {
        if let Some(name) = buffer_raw(buffer).and_then(|r| r.buffer) {
            self.gl.delete_buffer(name);
        }
        *buffer = Buffer::default();
    }

    fn free_render_target(&mut self, target: &mut RenderTarget) {
        if let Some(name) = target_raw(target).and_then(|r| r.framebuffer) {
            self.gl.delete_framebuffer(name);
        }
        *target = RenderTarget::default();
    }

    fn free_pipeline(&mut self, pipeline: &mut Pipeline) {
        if let Some(name) = pipeline_raw(pipeline).and_then(|r| r.program) {
            if self.slots.program() == Some(name) {
                self.slots.invalidate();
            }
            self.gl.delete_program(name);
        }
        *pipeline = Pipeline::default();
    }

    fn free_compute_pipeline(&mut self, pipeline: &mut ComputePipeline) {
        if let Some(name) = compute_raw(pipeline).and_then(|r| r.program) {
            if self.slots.program() == Some(name) {
                self.slots.invalidate();
            }
            self.gl.delete_program(name);
        }
        *pipeline = ComputePipeline::default();
    }

    fn free_sampler(&mut self, sampler: &mut Sampler) {
        if let Some(name) = sampler_raw(sampler).and_then(|r| r.sampler) {
            self.gl.delete_sampler(name);
        }
        *sampler = Sampler::default();
    }

    fn update_buffer(&mut self, buffer: &Buffer, data: &[u8]) {
        let Some(raw) = buffer_raw(buffer).copied() else {
            panic!("update of an empty buffer");
        };
        assert!(
            data.len() as u32 <= buffer.size,
            "{} bytes do not fit a {} byte buffer",
            data.len(),
            buffer.size
        );
        assert!(raw.usage != Usage::Immutable, "immutable buffers cannot be updated");
        let Some(name) = raw.buffer else { return };

        self.gl.bind_buffer(gl::COPY_WRITE_BUFFER, Some(name));
        self.gl.buffer_sub_data(gl::COPY_WRITE_BUFFER, 0, data);
        self.gl.bind_buffer(gl::COPY_WRITE_BUFFER, None);
        self.drain_errors("update_buffer");
    }

    fn update_texture(&mut self, texture: &Texture, slice: u32, data: &[u8]) {
        let Some(raw) = texture_raw(texture).copied() else {
            panic!("update of an empty texture");
        };
        assert!(
            slice < texture.depth.max(1),
            "slice {slice} out of range for a texture of depth {}",
            texture.depth
        );
        let expected = texture.format.slice_size(texture.width, texture.height);
        assert_eq!(
            data.len(),
            expected as usize,
            "texture update size mismatch for {}x{} {:?}",
            texture.width,
            texture.height,
            texture.format
        );
        assert!(
            raw.renderbuffer.is_none(),
            "depth targets created without SHADER_RESOURCE cannot be updated"
        );
        let Some(name) = raw.texture else { return };

        self.gl.active_texture(SCRATCH_UNIT);
        self.gl.bind_texture(raw.target, Some(name));
        self.upload_slices(texture, raw.target, slice, 1, data);
        self.gl.bind_texture(raw.target, None);
        self.drain_errors("update_texture");
    }

    fn map_buffer(&mut self, buffer: &Buffer, kind: MapKind) -> MappedResource<'_> {
        let Some(raw) = buffer_raw(buffer).copied() else {
            panic!("map of an empty buffer");
        };
        let Some(name) = raw.buffer else {
            return unmapped();
        };
        self.gl.bind_buffer(gl::COPY_WRITE_BUFFER, Some(name));
        let ptr = self
            .gl
            .map_buffer_range(gl::COPY_WRITE_BUFFER, 0, buffer.size as i32, map_access(kind));
        if ptr.is_null() {
            log::error!("glMapBufferRange of {} bytes failed", buffer.size);
            self.drain_errors("map_buffer");
            return unmapped();
        }
        // SAFETY: the driver mapped `size` bytes, valid until unmap_buffer,
        // which needs &mut self again.
        let data = unsafe { std::slice::from_raw_parts_mut(ptr, buffer.size as usize) };
        MappedResource {
            data,
            row_pitch: buffer.size,
            depth_pitch: buffer.size,
        }
    }

    fn unmap_buffer(&mut self, buffer: &Buffer, written_offset: u32, written_size: u32) {
        assert!(
            written_offset.saturating_add(written_size) <= buffer.size,
            "written range {written_offset}+{written_size} exceeds the {} byte buffer",
            buffer.size
        );
        if let Some(name) = buffer_raw(buffer).and_then(|r| r.buffer) {
            self.gl.bind_buffer(gl::COPY_WRITE_BUFFER, Some(name));
            self.gl.unmap_buffer(gl::COPY_WRITE_BUFFER);
            self.gl.bind_buffer(gl::COPY_WRITE_BUFFER, None);
        }
        self.drain_errors("unmap_buffer");
    }

    fn map_texture(&mut self, texture: &Texture, slice: u32, kind: MapKind) -> MappedResource<'_> {
        let Some(raw) = texture_raw(texture).copied() else {
            panic!("map of an empty texture");
        };
        assert!(slice < texture.depth.max(1), "slice {slice} out of range");
        assert!(
            raw.renderbuffer.is_none(),
            "depth targets created without SHADER_RESOURCE cannot be mapped"
        );
        let Some(name) = raw.texture else {
            return unmapped();
        };

        let size = texture.format.slice_size(texture.width, texture.height);
        let mut data = vec![0; size as usize];
        if kind != MapKind::Discard {
            assert!(
                !texture.format.is_depth() && !texture.format.is_compressed(),
                "{:?} textures can only be mapped with MapKind::Discard",
                texture.format
            );
            let native = GlFormat::of(texture.format);
            self.attach_for_read(&raw, slice);
            self.gl.read_pixels(
                0,
                0,
                texture.width as i32,
                texture.height as i32,
                native.format,
                native.ty,
                &mut data,
            );
            self.detach_read();
            self.drain_errors("map_texture");
        }

        let mapping = self
            .mapped_textures
            .entry((name, slice))
            .or_insert(TextureMapping { kind, data: Vec::new() });
        mapping.kind = kind;
        mapping.data = data;
        MappedResource {
            data: &mut mapping.data[..],
            row_pitch: texture.format.row_pitch(texture.width),
            depth_pitch: size,
        }
    }

    fn unmap_texture(&mut self, texture: &Texture, slice: u32) {
        let Some(raw) = texture_raw(texture).copied() else { return };
        let Some(name) = raw.texture else { return };
        let Some(mapping) = self.mapped_textures.remove(&(name, slice)) else {
            log::warn!("texture {name} slice {slice} was not mapped");
            return;
        };
        if mapping.kind.writes() {
            self.gl.active_texture(SCRATCH_UNIT);
            self.gl.bind_texture(raw.target, Some(name));
            self.upload_slices(texture, raw.target, slice, 1, &mapping.data);
            self.gl.bind_texture(raw.target, None);
        }
        self.drain_errors("unmap_texture");
    }

    fn copy_buffer(&mut self, src: &Buffer, src_offset: u32, dst: &Buffer, dst_offset: u32, size: u32) {
        assert!(
            src_offset.saturating_add(size) <= src.size && dst_offset.saturating_add(size) <= dst.size,
            "buffer copy of {size} bytes out of range"
        );
        let (Some(s), Some(d)) = (
            buffer_raw(src).and_then(|r| r.buffer),
            buffer_raw(dst).and_then(|r| r.buffer),
        ) else {
            return;
        };
        self.gl.bind_buffer(gl::COPY_READ_BUFFER, Some(s));
        self.gl.bind_buffer(gl::COPY_WRITE_BUFFER, Some(d));
        self.gl.copy_buffer_sub_data(
            gl::COPY_READ_BUFFER,
            gl::COPY_WRITE_BUFFER,
            src_offset as i32,
            dst_offset as i32,
            size as i32,
        );
        self.gl.bind_buffer(gl::COPY_READ_BUFFER, None);
        self.gl.bind_buffer(gl::COPY_WRITE_BUFFER, None);
        self.drain_errors("copy_buffer");
    }

    fn copy_texture_2d(&mut self, src: &Texture, dst: &Texture, region: &CopyRegion) {
        assert_eq!(src.format, dst.format, "texture copy between different formats");
        assert!(
            region.src_x + region.width <= src.width
                && region.src_y + region.height <= src.height
                && region.dst_x + region.width <= dst.width
                && region.dst_y + region.height <= dst.height,
            "texture copy region {region:?} out of range"
        );
        let (Some(s), Some(d)) = (texture_raw(src).copied(), texture_raw(dst).copied()) else {
            return;
        };

        if self.features.copy_image {
            let (Some(src_name), Some(dst_name)) = (
                s.texture.or(s.renderbuffer),
                d.texture.or(d.renderbuffer),
            ) else {
                return;
            };
            self.gl.copy_image_sub_data(
                src_name,
                s.target,
                region.src_x as i32,
                region.src_y as i32,
                dst_name,
                d.target,
                region.dst_x as i32,
                region.dst_y as i32,
                region.width as i32,
                region.height as i32,
            );
        } else {
            assert!(
                !src.format.is_depth() && !src.format.is_compressed(),
                "{:?} copies need glCopyImageSubData, missing on {}",
                src.format,
                self.profile()
            );
            assert!(
                d.target == gl::TEXTURE_2D,
                "copies into texture arrays need glCopyImageSubData, missing on {}",
                self.profile()
            );
            let Some(dst_name) = d.texture else { return };
            self.attach_for_read(&s, 0);
            self.gl.active_texture(SCRATCH_UNIT);
            self.gl.bind_texture(gl::TEXTURE_2D, Some(dst_name));
            self.gl.copy_tex_sub_image_2d(
                gl::TEXTURE_2D,
                0,
                region.dst_x as i32,
                region.dst_y as i32,
                region.src_x as i32,
                region.src_y as i32,
                region.width as i32,
                region.height as i32,
            );
            self.gl.bind_texture(gl::TEXTURE_2D, None);
            self.detach_read();
        }
        self.drain_errors("copy_texture_2d");
    }

    /// Only the first viewport reaches GL.
    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.state.set_viewports(viewports);
        if let Some(vp) = viewports.first() {
            self.gl
                .viewport(vp.x as i32, vp.y as i32, vp.width as i32, vp.height as i32);
            self.gl.depth_range(vp.min_depth, vp.max_depth);
        }
    }

    fn set_pipeline(&mut self, pipeline: &Pipeline) {
        let Some(raw) = pipeline_raw(pipeline).copied() else {
            panic!("binding an empty pipeline");
        };
        self.slots.invalidate();
        self.activate(raw.program);
        self.apply_pipeline_state(&raw);
        self.layout = raw.layout;
        self.state.pipeline = Some(*pipeline);
        self.apply_vertex_inputs();
        self.drain_errors("set_pipeline");
    }

    fn set_render_target(&mut self, target: Option<&RenderTarget>) {
        let framebuffer = match target {
            Some(target) => {
                let Some(raw) = target_raw(target) else {
                    panic!("binding an empty render target");
                };
                raw.framebuffer
            }
            None => None,
        };
        self.gl.bind_framebuffer(gl::FRAMEBUFFER, framebuffer);
        self.state.render_target = target.copied();
    }

    fn set_vertex_inputs(&mut self, inputs: &VertexInputs) {
        let index = match &inputs.index_buffer {
            Some(ib) => {
                if crate::state::index_size(inputs.index_format) == 4 {
                    assert!(self.info.has_32bit_index, "32-bit indices are not supported");
                }
                buffer_raw(ib).and_then(|r| r.buffer)
            }
            None => None,
        };
        self.gl.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, index);

        self.state.vertex_buffers = inputs.vertex_buffers;
        self.state.index_buffer = inputs.index_buffer;
        self.state.index_format = inputs.index_format;
        self.apply_vertex_inputs();
    }

    fn set_uniform_buffers(&mut self, buffers: &[Option<UniformBufferBinding>]) {
        store_slots(&mut self.state.uniform_buffers, buffers, "uniform buffer");
        self.bind_uniform_buffers(buffers);
    }

    fn set_resource_views(&mut self, views: &[Option<ResourceView>]) {
        store_slots(&mut self.state.resource_views, views, "resource view");
        self.bind_resource_views(views);
    }

    fn set_samplers(&mut self, samplers: &[Option<Sampler>]) {
        store_slots(&mut self.state.samplers, samplers, "sampler");
        for (i, sampler) in samplers.iter().enumerate() {
            let name = sampler.as_ref().and_then(sampler_raw).and_then(|r| r.sampler);
            self.gl.bind_sampler(i as u32, name);
        }
    }

    fn set_primitive_type(&mut self, primitive: PrimitiveType) {
        self.primitive = primitive_mode(primitive);
        self.state.primitive = primitive;
    }

    fn clear(&mut self, desc: &ClearDesc) {
        let default_framebuffer = self.gl.get_integer(gl::DRAW_FRAMEBUFFER_BINDING) == 0;
        let (depth_point, stencil_point) = if default_framebuffer {
            (gl::DEPTH, gl::STENCIL)
        } else {
            (gl::DEPTH_ATTACHMENT, gl::STENCIL_ATTACHMENT)
        };
        let attached = |api: &dyn GlApi, point: u32| {
            api.get_framebuffer_attachment_parameter_i32(
                gl::DRAW_FRAMEBUFFER,
                point,
                gl::FRAMEBUFFER_ATTACHMENT_OBJECT_TYPE,
            ) != gl::NONE as i32
        };

        let mut mask = 0;
        if desc.flag_color {
            self.gl.clear_color(desc.color);
            mask |= gl::COLOR_BUFFER_BIT;
        }
        if desc.flag_depth && attached(self.gl.as_ref(), depth_point) {
            self.gl.depth_mask(true);
            self.gl.clear_depth(desc.depth);
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        if desc.flag_stencil && attached(self.gl.as_ref(), stencil_point) {
            self.gl.clear_stencil(i32::from(desc.stencil));
            mask |= gl::STENCIL_BUFFER_BIT;
        }
        if mask != 0 {
            self.gl.clear(mask);
        }
        self.drain_errors("clear");
    }

    fn draw(&mut self, cmd: &Draw) {
        assert!(
            cmd.start_instance == 0,
            "a start instance of {} is not supported on {}",
            cmd.start_instance,
            self.profile()
        );
        let program = self.graphics_program();
        self.activate(program);

        let (first, count) = (cmd.start_vertex as i32, cmd.vertex_count as i32);
        if cmd.instance_count == 0 {
            self.gl.draw_arrays(self.primitive, first, count);
        } else {
            assert!(self.info.has_instancing, "instanced draws are not supported");
            self.gl
                .draw_arrays_instanced(self.primitive, first, count, cmd.instance_count as i32);
        }
        self.drain_errors("draw");
    }

    fn draw_indexed(&mut self, cmd: &DrawIndexed) {
        let index_size = self.state.index_size();
        assert!(
            cmd.start_instance == 0,
            "a start instance of {} is not supported on {}",
            cmd.start_instance,
            self.profile()
        );
        if cmd.base_vertex != 0 {
            assert!(self.info.has_base_vertex, "base vertex draws are not supported");
        }
        if cmd.instance_count != 0 {
            assert!(self.info.has_instancing, "instanced draws are not supported");
        }
        let program = self.graphics_program();
        self.activate(program);

        let mode = self.primitive;
        let count = cmd.index_count as i32;
        let ty = if index_size == 4 {
            gl::UNSIGNED_INT
        } else {
            gl::UNSIGNED_SHORT
        };
        let offset = (cmd.start_index * index_size) as i32;
        let instances = cmd.instance_count as i32;
        match (cmd.instance_count, cmd.base_vertex) {
            (0, 0) => self.gl.draw_elements(mode, count, ty, offset),
            (0, base) => self.gl.draw_elements_base_vertex(mode, count, ty, offset, base),
            (_, 0) => self
                .gl
                .draw_elements_instanced(mode, count, ty, offset, instances),
            (_, base) => self
                .gl
                .draw_elements_instanced_base_vertex(mode, count, ty, offset, instances, base),
        }
        self.drain_errors("draw_indexed");
    }

    fn set_compute_pipeline(&mut self, pipeline: &ComputePipeline) {
        let Some(raw) = compute_raw(pipeline).copied() else {
            panic!("binding an empty compute pipeline");
        };
        self.slots.invalidate();
        self.activate(raw.program);
        self.state.compute_pipeline = Some(*pipeline);
    }

    fn set_compute_uniform_buffers(&mut self, buffers: &[Option<UniformBufferBinding>]) {
        store_slots(&mut self.state.compute_uniform_buffers, buffers, "uniform buffer");
        self.bind_uniform_buffers(buffers);
    }

    fn set_compute_resource_views(&mut self, views: &[Option<ResourceView>]) {
        store_slots(&mut self.state.compute_resource_views, views, "resource view");
        self.bind_resource_views(views);
    }

    fn set_compute_unordered_views(&mut self, views: &[Option<UnorderedView>]) {
        store_slots(&mut self.state.unordered_views, views, "unordered view");
        assert!(
            views.is_empty() || self.info.has_compute_pipeline,
            "unordered views need compute support, missing on {}",
            self.profile()
        );
        for (i, view) in views.iter().enumerate() {
            let unit = i as u32;
            match view {
                Some(UnorderedView::Buffer(buffer)) => {
                    let name = buffer_raw(buffer).and_then(|r| r.buffer);
                    self.gl
                        .bind_buffer_base(gl::SHADER_STORAGE_BUFFER, UNORDERED_BUFFER_BASE + unit, name);
                }
                Some(UnorderedView::Texture(texture)) => {
                    let Some(raw) = texture_raw(texture).copied() else {
                        panic!("unordered view {i} is an empty texture");
                    };
                    self.gl.bind_image_texture(
                        unit,
                        raw.texture,
                        0,
                        raw.target == gl::TEXTURE_2D_ARRAY,
                        0,
                        gl::READ_WRITE,
                        GlFormat::of(texture.format).internal,
                    );
                }
                None => {
                    self.gl
                        .bind_buffer_base(gl::SHADER_STORAGE_BUFFER, UNORDERED_BUFFER_BASE + unit, None);
                    self.gl
                        .bind_image_texture(unit, None, 0, false, 0, gl::READ_ONLY, gl::R32F);
                }
            }
        }
    }

    fn dispatch(&mut self, cmd: &Dispatch) {
        assert!(self.info.has_compute_pipeline, "dispatch without compute support");
        let [mx, my, mz] = self.info.max_dispatch;
        assert!(
            cmd.x <= mx && cmd.y <= my && cmd.z <= mz,
            "dispatch {cmd:?} exceeds {:?}",
            self.info.max_dispatch
        );
        let program = self.compute_program();
        self.activate(program);

        self.gl.dispatch_compute(cmd.x, cmd.y, cmd.z);
        self.gl.memory_barrier(gl::ALL_BARRIER_BITS);
        self.drain_errors("dispatch");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null::gl::{GlCall, NullGl, NullGlConfig};
    use crate::{BufferDesc, ShaderBinary};

    const VERTEX: &[u8] = b"#version 450\nin vec4 aPosition;\nvoid main() { gl_Position = aPosition; }\n";
    const FRAGMENT: &[u8] = b"#version 450
uniform type_UniformBuffer0 { vec4 color; };
out vec4 oColor;
void main() { oColor = color; }
";

    fn context(config: NullGlConfig) -> (GlContext, crate::null::gl::NullGlProbe) {
        let (gl, probe) = NullGl::new(config);
        (GlContext::new(Box::new(gl), true), probe)
    }

    fn pipeline(ctx: &mut GlContext) -> Pipeline {
        let shaders = [ShaderBinary {
            tier: ShaderTier::Glsl,
            vertex: VERTEX,
            fragment: FRAGMENT,
        }];
        ctx.make_pipeline(&PipelineDesc {
            shaders: &shaders,
            ..Default::default()
        })
    }

    #[test]
    fn alpha_only_textures_swizzle_red_into_alpha() {
        let (mut ctx, probe) = context(NullGlConfig::default());
        let desc = TextureDesc {
            width: 4,
            height: 4,
            depth: 1,
            format: Format::U8x1NormToAlpha,
            usage: Usage::GpuReadWrite,
            binding_flags: BindingFlags::SHADER_RESOURCE,
            ..Default::default()
        };
        let swizzles = |calls: Vec<GlCall>| -> Vec<(u32, i32)> {
            calls
                .into_iter()
                .filter_map(|c| match c {
                    GlCall::TexParameter { pname, value, .. }
                        if (gl::TEXTURE_SWIZZLE_R..=gl::TEXTURE_SWIZZLE_A).contains(&pname) =>
                    {
                        Some((pname, value))
                    }
                    _ => None,
                })
                .collect()
        };

        ctx.make_texture(&desc);
        assert_eq!(
            swizzles(probe.calls()),
            [
                (gl::TEXTURE_SWIZZLE_R, gl::ZERO as i32),
                (gl::TEXTURE_SWIZZLE_G, gl::ZERO as i32),
                (gl::TEXTURE_SWIZZLE_B, gl::ZERO as i32),
                (gl::TEXTURE_SWIZZLE_A, gl::RED as i32),
            ]
        );

        probe.clear_calls();
        ctx.make_texture(&TextureDesc {
            format: Format::U8x1Norm,
            ..desc
        });
        assert!(swizzles(probe.calls()).is_empty());
    }

    #[test]
    fn current_program_slots_are_cached() {
        let (mut ctx, _probe) = context(NullGlConfig::default());
        let pipeline = pipeline(&mut ctx);
        assert_eq!(ctx.slots.program(), None);

        ctx.set_pipeline(&pipeline);
        assert!(ctx.slots.program().is_some());
        assert_eq!(ctx.slots.block(0), Some(0));
        assert_eq!(ctx.slots.block(1), None);
        assert_eq!(ctx.slots.sampler(0), None);

        let buffer = ctx.make_buffer(&BufferDesc {
            size: 64,
            binding_flags: BindingFlags::UNIFORM_BUFFER,
            usage: Usage::Dynamic,
            ..Default::default()
        });
        let binding = UniformBufferBinding {
            buffer,
            offset: 0,
            size: 0,
        };
        // Slot 1 is not read by the program and is only logged.
        ctx.set_uniform_buffers(&[Some(binding), Some(binding)]);
        assert!(ctx.binding_state().uniform_buffers[1].is_some());
    }

    #[test]
    fn info_names_the_profile() {
        let (ctx, _probe) = context(NullGlConfig::default());
        assert_eq!(ctx.info().backend_api, "OpenGL 4.3");
        assert_eq!(ctx.info().driver_renderer, "Null GL renderer");
        assert!(ctx.info().has_compute_pipeline);

        let (ctx, _probe) = context(NullGlConfig::embedded(3, 0));
        assert_eq!(ctx.info().backend_api, "OpenGL ES 3.0");
        assert!(ctx.is_embedded());
        assert!(!ctx.info().has_compute_pipeline);
    }

    #[test]
    fn draws_pick_the_narrowest_entry_point() {
        let (mut ctx, probe) = context(NullGlConfig::default());
        let mut pipeline = pipeline(&mut ctx);
        ctx.set_pipeline(&pipeline);
        probe.clear_calls();

        ctx.draw(&Draw {
            vertex_count: 3,
            ..Default::default()
        });
        ctx.draw(&Draw {
            vertex_count: 3,
            instance_count: 2,
            ..Default::default()
        });
        assert_eq!(
            probe.calls(),
            vec![
                GlCall::DrawArrays {
                    mode: gl::TRIANGLES,
                    first: 0,
                    count: 3
                },
                GlCall::DrawArraysInstanced {
                    mode: gl::TRIANGLES,
                    first: 0,
                    count: 3,
                    instances: 2
                },
            ]
        );
        ctx.free_pipeline(&mut pipeline);
        assert_eq!(pipeline, Pipeline::default());
    }

    #[test]
    fn ranged_uniform_buffers_use_bind_range() {
        let (mut ctx, probe) = context(NullGlConfig::default());
        let mut buffer = ctx.make_buffer(&BufferDesc {
            size: 512,
            binding_flags: BindingFlags::UNIFORM_BUFFER,
            usage: Usage::Dynamic,
            ..Default::default()
        });
        probe.clear_calls();

        ctx.set_uniform_buffers(&[
            Some(UniformBufferBinding {
                buffer,
                offset: 0,
                size: 0,
            }),
            Some(UniformBufferBinding {
                buffer,
                offset: 256,
                size: 64,
            }),
            None,
        ]);
        let calls = probe.calls();
        assert!(matches!(calls[0], GlCall::BindBufferBase { index: 0, buffer: Some(_), .. }));
        assert!(matches!(
            calls[1],
            GlCall::BindBufferRange {
                index: 1,
                offset: 256,
                size: 64,
                ..
            }
        ));
        assert!(matches!(calls[2], GlCall::BindBufferBase { index: 2, buffer: None, .. }));
        ctx.free_buffer(&mut buffer);
    }

    #[test]
    #[should_panic(expected = "not a multiple of 256 bytes")]
    fn misaligned_uniform_offset_panics() {
        let (mut ctx, _probe) = context(NullGlConfig::default());
        let buffer = ctx.make_buffer(&BufferDesc {
            size: 512,
            binding_flags: BindingFlags::UNIFORM_BUFFER,
            usage: Usage::Dynamic,
            ..Default::default()
        });
        ctx.set_uniform_buffers(&[Some(UniformBufferBinding {
            buffer,
            offset: 16,
            size: 16,
        })]);
    }

    #[test]
    fn dispatch_is_followed_by_a_barrier() {
        let (mut ctx, probe) = context(NullGlConfig::default());
        let binaries = [crate::ComputeBinary {
            tier: ShaderTier::Glsl,
            code: b"layout(local_size_x = 8) in;\nvoid main() {}\n",
        }];
        let pipeline = ctx.make_compute_pipeline(&ComputePipelineDesc { shaders: &binaries });
        ctx.set_compute_pipeline(&pipeline);
        probe.clear_calls();
        ctx.dispatch(&Dispatch { x: 4, y: 1, z: 1 });
        assert_eq!(
            probe.calls(),
            vec![
                GlCall::DispatchCompute(4, 1, 1),
                GlCall::MemoryBarrier(gl::ALL_BARRIER_BITS)
            ]
        );
    }

    #[test]
    fn debug_contexts_drain_native_errors() {
        let (mut ctx, probe) = context(NullGlConfig::default());
        probe.raise_error(gl::INVALID_OPERATION);
        ctx.present();
        assert_eq!(probe.pending_errors(), 0);
    }
}
