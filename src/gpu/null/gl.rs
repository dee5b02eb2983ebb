//! Software stand-in for an OpenGL / OpenGL ES context.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::rc::Rc;

use glam::Vec4;
use glow as gl;

use super::memory::{decode_depth, encode, encode_depth, Rect, SoftImage};
use crate::gl::capabilities::{GlLimits, GlVersion};
use crate::gl::conversions::{GlFormat, MAX_TEXTURE_MAX_ANISOTROPY_EXT};
use crate::gl::native::{GlApi, GlName};
use crate::gl::reflection::uniform_block_name;
use crate::utils::{Handle, Pool};
use crate::{BlendFactor, BlendOp, ColorBlendState, CopyRegion, Format, Viewport};

#[derive(Clone, Debug)]
pub struct NullGlConfig {
    pub version: GlVersion,
    pub embedded: bool,
    pub extensions: Vec<String>,
    pub limits: GlLimits,
    pub back_buffer: (u32, u32),
    pub renderer: String,
}

impl Default for NullGlConfig {
    fn default() -> Self {
        Self {
            version: GlVersion::new(4, 3),
            embedded: false,
            extensions: vec!["GL_EXT_texture_filter_anisotropic".to_string()],
            limits: GlLimits::default(),
            back_buffer: (256, 256),
            renderer: "Null GL renderer".to_string(),
        }
    }
}

impl NullGlConfig {
    /// OpenGL ES context of the given version.
    pub fn embedded(major: u32, minor: u32) -> Self {
        Self {
            version: GlVersion::new(major, minor),
            embedded: true,
            extensions: Vec::new(),
            ..Default::default()
        }
    }
}

/// Native entry points recorded by [`NullGl`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GlCall {
    DrawArrays {
        mode: u32,
        first: i32,
        count: i32,
    },
    DrawArraysInstanced {
        mode: u32,
        first: i32,
        count: i32,
        instances: i32,
    },
    DrawElements {
        mode: u32,
        count: i32,
        ty: u32,
        offset: i32,
    },
    DrawElementsInstanced {
        mode: u32,
        count: i32,
        ty: u32,
        offset: i32,
        instances: i32,
    },
    DrawElementsBaseVertex {
        mode: u32,
        count: i32,
        ty: u32,
        offset: i32,
        base_vertex: i32,
    },
    DrawElementsInstancedBaseVertex {
        mode: u32,
        count: i32,
        ty: u32,
        offset: i32,
        instances: i32,
        base_vertex: i32,
    },
    DispatchCompute(u32, u32, u32),
    MemoryBarrier(u32),
    UniformBlockBinding {
        index: u32,
        binding: u32,
    },
    Uniform1i {
        location: u32,
        value: i32,
    },
    BindBufferBase {
        target: u32,
        index: u32,
        buffer: Option<GlName>,
    },
    BindBufferRange {
        target: u32,
        index: u32,
        buffer: Option<GlName>,
        offset: i32,
        size: i32,
    },
    BindImageTexture {
        unit: u32,
        texture: Option<GlName>,
    },
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    VertexAttribPointer {
        index: u32,
        size: i32,
        ty: u32,
        integer: bool,
        stride: i32,
        offset: i32,
    },
    VertexAttribDivisor {
        index: u32,
        divisor: u32,
    },
    TexParameter {
        target: u32,
        pname: u32,
        value: i32,
    },
    Clear(u32),
    SwapBuffers,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Attachment {
    Texture { name: GlName, layer: u32 },
    Renderbuffer(GlName),
}

#[derive(Default)]
struct Framebuffer {
    colors: [Option<Attachment>; 8],
    depth: Option<Attachment>,
    draw_buffers: Vec<u32>,
}

#[derive(Default)]
struct Program {
    shaders: Vec<GlName>,
    linked: bool,
    log: String,
    blocks: Vec<String>,
    block_bindings: Vec<u32>,
    uniforms: Vec<String>,
}

enum Object {
    Texture(Option<SoftImage>),
    Renderbuffer(Option<SoftImage>),
    Buffer(Vec<u8>),
    Framebuffer(Framebuffer),
    Shader { source: String, compiled: bool },
    Program(Program),
    Sampler,
    VertexArray,
}

fn name_of(handle: Handle<Object>) -> Result<GlName, String> {
    NonZeroU32::new(handle.to_bits().wrapping_add(1)).ok_or_else(|| "name space exhausted".to_string())
}

fn handle_of(name: GlName) -> Handle<Object> {
    Handle::from_bits(name.get() - 1)
}

fn blend_factor(native: u32) -> BlendFactor {
    match native {
        gl::ZERO => BlendFactor::Zero,
        gl::ONE => BlendFactor::One,
        gl::SRC_COLOR => BlendFactor::SrcColor,
        gl::ONE_MINUS_SRC_COLOR => BlendFactor::InvSrcColor,
        gl::DST_COLOR => BlendFactor::DstColor,
        gl::ONE_MINUS_DST_COLOR => BlendFactor::InvDstColor,
        gl::SRC_ALPHA => BlendFactor::SrcAlpha,
        gl::ONE_MINUS_SRC_ALPHA => BlendFactor::InvSrcAlpha,
        gl::DST_ALPHA => BlendFactor::DstAlpha,
        gl::ONE_MINUS_DST_ALPHA => BlendFactor::InvDstAlpha,
        other => panic!("unknown blend factor {other:#x}"),
    }
}

fn blend_op(native: u32) -> BlendOp {
    if native == gl::FUNC_SUBTRACT {
        BlendOp::Subtract
    } else {
        BlendOp::Add
    }
}

/// Names the shader declares after `uniform`, in order of appearance.
fn reflect(source: &str, blocks: &mut Vec<String>, uniforms: &mut Vec<String>) {
    for line in source.lines() {
        let Some(decl) = line.trim_start().strip_prefix("uniform ") else {
            continue;
        };
        let mut words = decl.split(|c: char| c.is_whitespace() || c == '{' || c == ';');
        let Some(first) = words.next() else { continue };
        if first.starts_with("type_UniformBuffer") {
            if !blocks.iter().any(|b| b == first) {
                blocks.push(first.to_string());
            }
        } else if let Some(name) = words.find(|w| w.starts_with("uTexture")) {
            if !uniforms.iter().any(|u| u == name) {
                uniforms.push(name.to_string());
            }
        }
    }
}

struct State {
    config: NullGlConfig,
    objects: Pool<Object>,
    back_buffer: SoftImage,
    back_depth: SoftImage,
    errors: VecDeque<u32>,

    active_unit: usize,
    units: [Option<GlName>; 32],
    buffers: HashMap<u32, GlName>,
    indexed: HashMap<(u32, u32), (GlName, i32)>,
    renderbuffer: Option<GlName>,
    draw_framebuffer: Option<GlName>,
    read_framebuffer: Option<GlName>,
    program: Option<GlName>,
    vertex_array: Option<GlName>,

    blend: ColorBlendState,
    viewport: Viewport,
    clear_color: [f32; 4],
    clear_depth: f32,
    clear_stencil: u8,

    calls: Vec<GlCall>,
}

impl State {
    fn new(config: NullGlConfig) -> Self {
        let (w, h) = config.back_buffer;
        Self {
            back_buffer: SoftImage::new(w, h, 1, Format::U8x4Norm),
            back_depth: SoftImage::new(w, h, 1, Format::D24S8),
            viewport: Viewport::new(0.0, 0.0, w as f32, h as f32),
            config,
            objects: Pool::default(),
            errors: VecDeque::new(),
            active_unit: 0,
            units: [None; 32],
            buffers: HashMap::new(),
            indexed: HashMap::new(),
            renderbuffer: None,
            draw_framebuffer: None,
            read_framebuffer: None,
            program: None,
            vertex_array: None,
            blend: ColorBlendState::default(),
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            calls: Vec::new(),
        }
    }

    fn insert(&mut self, object: Object) -> Result<GlName, String> {
        name_of(self.objects.insert(object))
    }

    fn delete(&mut self, name: GlName) {
        if self.objects.release(handle_of(name)).is_none() {
            self.errors.push_back(gl::INVALID_VALUE);
        }
    }

    fn get(&self, name: GlName) -> Option<&Object> {
        self.objects.get_ref(handle_of(name))
    }

    fn get_mut(&mut self, name: GlName) -> Option<&mut Object> {
        self.objects.get_mut_ref(handle_of(name))
    }

    fn bound_texture(&mut self) -> Option<&mut Option<SoftImage>> {
        let name = self.units[self.active_unit]?;
        match self.get_mut(name) {
            Some(Object::Texture(image)) => Some(image),
            _ => None,
        }
    }

    fn bound_buffer(&mut self, target: u32) -> Option<&mut Vec<u8>> {
        let name = *self.buffers.get(&target)?;
        match self.get_mut(name) {
            Some(Object::Buffer(data)) => Some(data),
            _ => None,
        }
    }

    fn framebuffer_mut(&mut self, target: u32) -> Option<&mut Framebuffer> {
        let name = if target == gl::READ_FRAMEBUFFER {
            self.read_framebuffer
        } else {
            self.draw_framebuffer
        }?;
        match self.get_mut(name) {
            Some(Object::Framebuffer(fb)) => Some(fb),
            _ => None,
        }
    }

    fn framebuffer(&self, name: GlName) -> Option<&Framebuffer> {
        match self.get(name) {
            Some(Object::Framebuffer(fb)) => Some(fb),
            _ => None,
        }
    }

    fn attach(&mut self, target: u32, attachment: u32, value: Option<Attachment>) {
        let Some(fb) = self.framebuffer_mut(target) else {
            self.errors.push_back(gl::INVALID_OPERATION);
            return;
        };
        match attachment {
            gl::DEPTH_ATTACHMENT | gl::DEPTH_STENCIL_ATTACHMENT => fb.depth = value,
            color => {
                let index = color.wrapping_sub(gl::COLOR_ATTACHMENT0) as usize;
                if let Some(slot) = fb.colors.get_mut(index) {
                    *slot = value;
                }
            }
        }
    }

    /// Image and slice an attachment renders to.
    fn attachment_image(&mut self, attachment: Attachment) -> Option<(&mut SoftImage, u32)> {
        match attachment {
            Attachment::Texture { name, layer } => match self.get_mut(name) {
                Some(Object::Texture(Some(image))) => Some((image, layer)),
                _ => None,
            },
            Attachment::Renderbuffer(name) => match self.get_mut(name) {
                Some(Object::Renderbuffer(Some(image))) => Some((image, 0)),
                _ => None,
            },
        }
    }

    fn attachment_format(&self, attachment: Attachment) -> Option<Format> {
        let name = match attachment {
            Attachment::Texture { name, .. } | Attachment::Renderbuffer(name) => name,
        };
        match self.get(name) {
            Some(Object::Texture(Some(image)) | Object::Renderbuffer(Some(image))) => Some(image.format),
            _ => None,
        }
    }

    /// Colour attachments selected by the draw buffers of the draw framebuffer.
    fn draw_attachments(&self) -> Vec<Attachment> {
        let Some(fb) = self.draw_framebuffer.and_then(|n| self.framebuffer(n)) else {
            return Vec::new();
        };
        fb.colors
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                let point = gl::COLOR_ATTACHMENT0 + *i as u32;
                if fb.draw_buffers.is_empty() {
                    *i == 0
                } else {
                    fb.draw_buffers.contains(&point)
                }
            })
            .filter_map(|(_, a)| *a)
            .collect()
    }

    fn depth_attachment(&self) -> Option<Attachment> {
        self.draw_framebuffer
            .and_then(|n| self.framebuffer(n))
            .and_then(|fb| fb.depth)
    }

    /// Copy of the colour image read operations source from.
    fn read_image(&mut self) -> Option<(SoftImage, u32)> {
        match self.read_framebuffer {
            None => Some((self.back_buffer.clone(), 0)),
            Some(name) => {
                let attachment = self.framebuffer(name)?.colors[0]?;
                self.attachment_image(attachment)
                    .map(|(image, slice)| (image.clone(), slice))
            }
        }
    }

    fn fragment_color(&self) -> Vec4 {
        let Some(Object::Program(program)) = self.program.and_then(|p| self.get(p)) else {
            return Vec4::ONE;
        };
        let block = uniform_block_name(0);
        let Some(index) = program.blocks.iter().position(|b| *b == block) else {
            return Vec4::ONE;
        };
        let binding = program.block_bindings[index];
        let Some((buffer, offset)) = self.indexed.get(&(gl::UNIFORM_BUFFER, binding)).copied() else {
            return Vec4::ONE;
        };
        let start = offset.max(0) as usize;
        match self.get(buffer) {
            Some(Object::Buffer(data)) if data.len() >= start + 16 => {
                Vec4::from_array(bytemuck::pod_read_unaligned(&data[start..start + 16]))
            }
            _ => Vec4::ONE,
        }
    }

    fn rasterize(&mut self, vertex_count: i64) {
        if vertex_count <= 0 {
            return;
        }
        let rect = Rect::from_viewport(&self.viewport);
        let color = self.fragment_color();
        let blend = self.blend;

        if self.draw_framebuffer.is_none() {
            self.back_buffer.shade(0, rect, color, &blend);
            return;
        }
        for attachment in self.draw_attachments() {
            if let Some((image, slice)) = self.attachment_image(attachment) {
                image.shade(slice, rect, color, &blend);
            }
        }
    }

    fn clear(&mut self, mask: u32) {
        if mask & gl::COLOR_BUFFER_BIT != 0 {
            let color = Vec4::from_array(self.clear_color);
            if self.draw_framebuffer.is_none() {
                let bytes = encode(self.back_buffer.format, color);
                let full = Rect::full(self.back_buffer.width, self.back_buffer.height);
                self.back_buffer.fill(0, full, &bytes);
            }
            for attachment in self.draw_attachments() {
                if let Some((image, slice)) = self.attachment_image(attachment) {
                    let bytes = encode(image.format, color);
                    image.fill(slice, Rect::full(image.width, image.height), &bytes);
                }
            }
        }

        let depth_bits = mask & (gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT);
        if depth_bits == 0 {
            return;
        }
        let (depth, stencil) = (self.clear_depth, self.clear_stencil);
        let image = match self.draw_framebuffer {
            None => Some((&mut self.back_depth, 0)),
            Some(_) => match self.depth_attachment() {
                Some(attachment) => self.attachment_image(attachment),
                None => None,
            },
        };
        if let Some((image, slice)) = image {
            let (old_depth, old_stencil) = decode_depth(image.format, image.texel(slice, 0, 0));
            let depth = if mask & gl::DEPTH_BUFFER_BIT != 0 { depth } else { old_depth };
            let stencil = if mask & gl::STENCIL_BUFFER_BIT != 0 { stencil } else { old_stencil };
            let bytes = encode_depth(image.format, depth, stencil);
            image.fill(slice, Rect::full(image.width, image.height), &bytes);
        }
    }

    fn link(&mut self, name: GlName) {
        let shaders = match self.get(name) {
            Some(Object::Program(program)) => program.shaders.clone(),
            _ => {
                self.errors.push_back(gl::INVALID_VALUE);
                return;
            }
        };

        let mut linked = !shaders.is_empty();
        let mut log = String::new();
        let mut blocks = Vec::new();
        let mut uniforms = Vec::new();
        for shader in &shaders {
            match self.get(*shader) {
                Some(Object::Shader { source, compiled: true }) => reflect(source, &mut blocks, &mut uniforms),
                _ => {
                    linked = false;
                    log = format!("shader {shader} is not compiled");
                }
            }
        }

        if let Some(Object::Program(program)) = self.get_mut(name) {
            program.linked = linked;
            program.log = log;
            program.block_bindings = vec![0; blocks.len()];
            program.blocks = blocks;
            program.uniforms = uniforms;
        }
    }
}

/// Probe into a [`NullGl`] owned by a context.
#[derive(Clone)]
pub struct NullGlProbe {
    state: Rc<RefCell<State>>,
}

impl NullGlProbe {
    pub fn live_objects(&self) -> usize {
        self.state.borrow().objects.len()
    }

    pub fn calls(&self) -> Vec<GlCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Queues `error` for the next `glGetError`.
    pub fn raise_error(&self, error: u32) {
        self.state.borrow_mut().errors.push_back(error);
    }

    /// Errors raised and not yet drained.
    pub fn pending_errors(&self) -> usize {
        self.state.borrow().errors.len()
    }

    pub fn back_buffer_texel(&self, x: u32, y: u32) -> Vec<u8> {
        self.state.borrow().back_buffer.texel(0, x, y).to_vec()
    }
}

/// [`GlApi`] that keeps every object in CPU memory.
pub struct NullGl {
    state: Rc<RefCell<State>>,
}

impl NullGl {
    pub fn new(config: NullGlConfig) -> (Self, NullGlProbe) {
        let state = Rc::new(RefCell::new(State::new(config)));
        (
            Self {
                state: state.clone(),
            },
            NullGlProbe { state },
        )
    }

    fn record(&self, call: GlCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn draw(&self, call: GlCall, vertices: i64) {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        state.rasterize(vertices);
    }

    fn upload(&self, mut image: SoftImage, data: Option<&[u8]>) {
        let mut state = self.state.borrow_mut();
        if let Some(data) = data {
            let n = data.len().min(image.data.len());
            image.data[..n].copy_from_slice(&data[..n]);
        }
        match state.bound_texture() {
            Some(slot) => *slot = Some(image),
            None => state.errors.push_back(gl::INVALID_OPERATION),
        }
    }

    fn upload_rect(&self, z: u32, depth: u32, rect: Rect, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let Some(Some(image)) = state.bound_texture() else {
            state.errors.push_back(gl::INVALID_OPERATION);
            return;
        };
        let slice_bytes = image.format.slice_size(rect.x1 - rect.x0, rect.y1 - rect.y0) as usize;
        for (i, chunk) in data.chunks(slice_bytes.max(1)).take(depth as usize).enumerate() {
            image.write_rect(z + i as u32, rect, chunk);
        }
    }

    fn storage(&self, internal: u32, width: i32, height: i32, slices: i32) -> Option<SoftImage> {
        match GlFormat::storage_format(internal) {
            Some(format) => Some(SoftImage::new(width as u32, height as u32, slices as u32, format)),
            None => {
                self.state.borrow_mut().errors.push_back(gl::INVALID_ENUM);
                None
            }
        }
    }
}

fn rect(x: i32, y: i32, width: i32, height: i32) -> Rect {
    Rect {
        x0: x as u32,
        y0: y as u32,
        x1: (x + width) as u32,
        y1: (y + height) as u32,
    }
}

impl GlApi for NullGl {
    fn get_string(&self, name: u32) -> String {
        let state = self.state.borrow();
        let GlVersion { major, minor } = state.config.version;
        match name {
            gl::VERSION if state.config.embedded => format!("OpenGL ES {major}.{minor} rhal-null"),
            gl::VERSION => format!("{major}.{minor}.0 rhal-null"),
            gl::RENDERER => state.config.renderer.clone(),
            gl::VENDOR => "rhal".to_string(),
            _ => String::new(),
        }
    }

    fn get_integer(&self, pname: u32) -> i32 {
        let state = self.state.borrow();
        let limits = &state.config.limits;
        match pname {
            gl::MAX_TEXTURE_SIZE => limits.max_texture_size as i32,
            gl::MAX_COLOR_ATTACHMENTS => limits.max_color_attachments as i32,
            gl::MAX_TEXTURE_IMAGE_UNITS => limits.max_texture_image_units as i32,
            gl::MAX_UNIFORM_BUFFER_BINDINGS => limits.max_uniform_buffer_bindings as i32,
            gl::DRAW_FRAMEBUFFER_BINDING => {
                state.draw_framebuffer.map_or(0, |n| n.get() as i32)
            }
            gl::READ_FRAMEBUFFER_BINDING => state.read_framebuffer.map_or(0, |n| n.get() as i32),
            _ => 0,
        }
    }

    fn get_integer_indexed(&self, pname: u32, index: u32) -> i32 {
        let state = self.state.borrow();
        match pname {
            gl::MAX_COMPUTE_WORK_GROUP_COUNT => state
                .config
                .limits
                .max_compute_work_group_count
                .get(index as usize)
                .map_or(0, |v| *v as i32),
            _ => 0,
        }
    }

    fn get_float(&self, pname: u32) -> f32 {
        match pname {
            MAX_TEXTURE_MAX_ANISOTROPY_EXT => self.state.borrow().config.limits.max_anisotropy as f32,
            _ => 0.0,
        }
    }

    fn extensions(&self) -> Vec<String> {
        self.state.borrow().config.extensions.clone()
    }

    fn get_error(&mut self) -> u32 {
        self.state
            .borrow_mut()
            .errors
            .pop_front()
            .unwrap_or(gl::NO_ERROR)
    }

    fn pixel_store_i32(&mut self, _pname: u32, _value: i32) {}

    fn enable(&mut self, cap: u32) {
        if cap == gl::BLEND {
            self.state.borrow_mut().blend.enable = true;
        }
    }

    fn disable(&mut self, cap: u32) {
        if cap == gl::BLEND {
            self.state.borrow_mut().blend.enable = false;
        }
    }

    fn create_texture(&mut self) -> Result<GlName, String> {
        self.state.borrow_mut().insert(Object::Texture(None))
    }

    fn delete_texture(&mut self, texture: GlName) {
        let mut state = self.state.borrow_mut();
        for unit in state.units.iter_mut() {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
        state.delete(texture);
    }

    fn bind_texture(&mut self, _target: u32, texture: Option<GlName>) {
        let mut state = self.state.borrow_mut();
        let unit = state.active_unit;
        state.units[unit] = texture;
    }

    fn active_texture(&mut self, unit: u32) {
        let mut state = self.state.borrow_mut();
        match unit.checked_sub(gl::TEXTURE0) {
            Some(i) if (i as usize) < state.units.len() => state.active_unit = i as usize,
            _ => state.errors.push_back(gl::INVALID_ENUM),
        }
    }

    fn tex_storage_2d(&mut self, _target: u32, _levels: i32, internal: u32, width: i32, height: i32) {
        if let Some(image) = self.storage(internal, width, height, 1) {
            self.upload(image, None);
        }
    }

    fn tex_storage_3d(&mut self, _target: u32, _levels: i32, internal: u32, width: i32, height: i32, depth: i32) {
        if let Some(image) = self.storage(internal, width, height, depth) {
            self.upload(image, None);
        }
    }

    fn tex_image_2d(&mut self, _target: u32, level: i32, internal: u32, width: i32, height: i32, _format: u32, _ty: u32, data: Option<&[u8]>) {
        if level != 0 {
            return;
        }
        if let Some(image) = self.storage(internal, width, height, 1) {
            self.upload(image, data);
        }
    }

    fn tex_image_3d(&mut self, _target: u32, level: i32, internal: u32, width: i32, height: i32, depth: i32, _format: u32, _ty: u32, data: Option<&[u8]>) {
        if level != 0 {
            return;
        }
        if let Some(image) = self.storage(internal, width, height, depth) {
            self.upload(image, data);
        }
    }

    fn compressed_tex_image_2d(&mut self, _target: u32, level: i32, internal: u32, width: i32, height: i32, data: &[u8]) {
        if level != 0 {
            return;
        }
        if let Some(image) = self.storage(internal, width, height, 1) {
            self.upload(image, Some(data));
        }
    }

    fn tex_sub_image_2d(&mut self, _target: u32, level: i32, x: i32, y: i32, width: i32, height: i32, _format: u32, _ty: u32, data: &[u8]) {
        if level == 0 {
            self.upload_rect(0, 1, rect(x, y, width, height), data);
        }
    }

    fn tex_sub_image_3d(&mut self, _target: u32, level: i32, x: i32, y: i32, z: i32, width: i32, height: i32, depth: i32, _format: u32, _ty: u32, data: &[u8]) {
        if level == 0 {
            self.upload_rect(z as u32, depth as u32, rect(x, y, width, height), data);
        }
    }

    fn compressed_tex_sub_image_2d(&mut self, _target: u32, level: i32, x: i32, y: i32, width: i32, height: i32, _internal: u32, data: &[u8]) {
        if level == 0 {
            self.upload_rect(0, 1, rect(x, y, width, height), data);
        }
    }

    fn compressed_tex_sub_image_3d(&mut self, _target: u32, level: i32, x: i32, y: i32, z: i32, width: i32, height: i32, depth: i32, _internal: u32, data: &[u8]) {
        if level == 0 {
            self.upload_rect(z as u32, depth as u32, rect(x, y, width, height), data);
        }
    }

    fn tex_parameter_i32(&mut self, target: u32, pname: u32, value: i32) {
        self.record(GlCall::TexParameter { target, pname, value });
    }

    fn create_renderbuffer(&mut self) -> Result<GlName, String> {
        self.state.borrow_mut().insert(Object::Renderbuffer(None))
    }

    fn delete_renderbuffer(&mut self, renderbuffer: GlName) {
        self.state.borrow_mut().delete(renderbuffer);
    }

    fn bind_renderbuffer(&mut self, renderbuffer: Option<GlName>) {
        self.state.borrow_mut().renderbuffer = renderbuffer;
    }

    fn renderbuffer_storage(&mut self, internal: u32, width: i32, height: i32) {
        let image = self.storage(internal, width, height, 1);
        let mut state = self.state.borrow_mut();
        let Some(name) = state.renderbuffer else {
            state.errors.push_back(gl::INVALID_OPERATION);
            return;
        };
        if let Some(Object::Renderbuffer(slot)) = state.get_mut(name) {
            *slot = image;
        }
    }

    fn create_buffer(&mut self) -> Result<GlName, String> {
        self.state.borrow_mut().insert(Object::Buffer(Vec::new()))
    }

    fn delete_buffer(&mut self, buffer: GlName) {
        let mut state = self.state.borrow_mut();
        state.buffers.retain(|_, b| *b != buffer);
        state.indexed.retain(|_, (b, _)| *b != buffer);
        state.delete(buffer);
    }

    fn bind_buffer(&mut self, target: u32, buffer: Option<GlName>) {
        let mut state = self.state.borrow_mut();
        match buffer {
            Some(buffer) => state.buffers.insert(target, buffer),
            None => state.buffers.remove(&target),
        };
    }

    fn buffer_data_size(&mut self, target: u32, size: i32, _usage: u32) {
        if let Some(data) = self.state.borrow_mut().bound_buffer(target) {
            *data = vec![0; size.max(0) as usize];
        }
    }

    fn buffer_data(&mut self, target: u32, bytes: &[u8], _usage: u32) {
        if let Some(data) = self.state.borrow_mut().bound_buffer(target) {
            *data = bytes.to_vec();
        }
    }

    fn buffer_sub_data(&mut self, target: u32, offset: i32, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        let start = offset.max(0) as usize;
        match state.bound_buffer(target) {
            Some(data) if start + bytes.len() <= data.len() => {
                data[start..start + bytes.len()].copy_from_slice(bytes);
            }
            _ => state.errors.push_back(gl::INVALID_VALUE),
        }
    }

    fn bind_buffer_base(&mut self, target: u32, index: u32, buffer: Option<GlName>) {
        let mut state = self.state.borrow_mut();
        state.calls.push(GlCall::BindBufferBase { target, index, buffer });
        match buffer {
            Some(b) => {
                state.indexed.insert((target, index), (b, 0));
                state.buffers.insert(target, b);
            }
            None => {
                state.indexed.remove(&(target, index));
            }
        }
    }

    fn bind_buffer_range(&mut self, target: u32, index: u32, buffer: Option<GlName>, offset: i32, size: i32) {
        let mut state = self.state.borrow_mut();
        state.calls.push(GlCall::BindBufferRange {
            target,
            index,
            buffer,
            offset,
            size,
        });
        match buffer {
            Some(b) => {
                state.indexed.insert((target, index), (b, offset));
                state.buffers.insert(target, b);
            }
            None => {
                state.indexed.remove(&(target, index));
            }
        }
    }

    fn map_buffer_range(&mut self, target: u32, offset: i32, length: i32, _access: u32) -> *mut u8 {
        let mut state = self.state.borrow_mut();
        let (start, len) = (offset.max(0) as usize, length.max(0) as usize);
        match state.bound_buffer(target) {
            // The heap block of the Vec stays put until the buffer is resized or deleted.
            Some(data) if len > 0 && start + len <= data.len() => data[start..].as_mut_ptr(),
            _ => {
                state.errors.push_back(gl::INVALID_VALUE);
                std::ptr::null_mut()
            }
        }
    }

    fn unmap_buffer(&mut self, _target: u32) {}

    fn copy_buffer_sub_data(&mut self, read_target: u32, write_target: u32, read_offset: i32, write_offset: i32, size: i32) {
        let mut state = self.state.borrow_mut();
        let (from, to, n) = (read_offset as usize, write_offset as usize, size as usize);
        let src = match state.bound_buffer(read_target) {
            Some(data) if from + n <= data.len() => data[from..from + n].to_vec(),
            _ => {
                state.errors.push_back(gl::INVALID_VALUE);
                return;
            }
        };
        match state.bound_buffer(write_target) {
            Some(data) if to + n <= data.len() => data[to..to + n].copy_from_slice(&src),
            _ => state.errors.push_back(gl::INVALID_VALUE),
        }
    }

    fn create_framebuffer(&mut self) -> Result<GlName, String> {
        self.state
            .borrow_mut()
            .insert(Object::Framebuffer(Framebuffer::default()))
    }

    fn delete_framebuffer(&mut self, framebuffer: GlName) {
        let mut state = self.state.borrow_mut();
        if state.draw_framebuffer == Some(framebuffer) {
            state.draw_framebuffer = None;
        }
        if state.read_framebuffer == Some(framebuffer) {
            state.read_framebuffer = None;
        }
        state.delete(framebuffer);
    }

    fn bind_framebuffer(&mut self, target: u32, framebuffer: Option<GlName>) {
        let mut state = self.state.borrow_mut();
        match target {
            gl::READ_FRAMEBUFFER => state.read_framebuffer = framebuffer,
            gl::DRAW_FRAMEBUFFER => state.draw_framebuffer = framebuffer,
            _ => {
                state.read_framebuffer = framebuffer;
                state.draw_framebuffer = framebuffer;
            }
        }
    }

    fn framebuffer_texture_2d(&mut self, target: u32, attachment: u32, _texture_target: u32, texture: Option<GlName>, _level: i32) {
        let value = texture.map(|name| Attachment::Texture { name, layer: 0 });
        self.state.borrow_mut().attach(target, attachment, value);
    }

    fn framebuffer_texture_layer(&mut self, target: u32, attachment: u32, texture: Option<GlName>, _level: i32, layer: i32) {
        let value = texture.map(|name| Attachment::Texture {
            name,
            layer: layer as u32,
        });
        self.state.borrow_mut().attach(target, attachment, value);
    }

    fn framebuffer_renderbuffer(&mut self, target: u32, attachment: u32, renderbuffer: Option<GlName>) {
        let value = renderbuffer.map(Attachment::Renderbuffer);
        self.state.borrow_mut().attach(target, attachment, value);
    }

    fn check_framebuffer_status(&mut self, target: u32) -> u32 {
        let mut state = self.state.borrow_mut();
        match state.framebuffer_mut(target) {
            None => gl::FRAMEBUFFER_COMPLETE,
            Some(fb) if fb.colors.iter().all(Option::is_none) && fb.depth.is_none() => {
                gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT
            }
            Some(_) => gl::FRAMEBUFFER_COMPLETE,
        }
    }

    fn get_framebuffer_attachment_parameter_i32(&self, target: u32, attachment: u32, pname: u32) -> i32 {
        if pname != gl::FRAMEBUFFER_ATTACHMENT_OBJECT_TYPE {
            return 0;
        }
        let state = self.state.borrow();
        let bound = if target == gl::READ_FRAMEBUFFER {
            state.read_framebuffer
        } else {
            state.draw_framebuffer
        };
        let Some(fb) = bound.and_then(|n| state.framebuffer(n)) else {
            return match attachment {
                gl::BACK | gl::FRONT | gl::DEPTH | gl::STENCIL => gl::FRAMEBUFFER_DEFAULT as i32,
                _ => gl::NONE as i32,
            };
        };

        let found = match attachment {
            gl::DEPTH_ATTACHMENT | gl::DEPTH_STENCIL_ATTACHMENT => fb.depth,
            gl::STENCIL_ATTACHMENT => fb
                .depth
                .filter(|a| state.attachment_format(*a).is_some_and(|f| f.info().stencil)),
            color => fb
                .colors
                .get(color.wrapping_sub(gl::COLOR_ATTACHMENT0) as usize)
                .copied()
                .flatten(),
        };
        match found {
            Some(Attachment::Texture { .. }) => gl::TEXTURE as i32,
            Some(Attachment::Renderbuffer(_)) => gl::RENDERBUFFER as i32,
            None => gl::NONE as i32,
        }
    }

    fn draw_buffers(&mut self, buffers: &[u32]) {
        let mut state = self.state.borrow_mut();
        match state.framebuffer_mut(gl::DRAW_FRAMEBUFFER) {
            Some(fb) => fb.draw_buffers = buffers.to_vec(),
            None => state.errors.push_back(gl::INVALID_OPERATION),
        }
    }

    fn read_pixels(&mut self, x: i32, y: i32, width: i32, height: i32, _format: u32, _ty: u32, out: &mut [u8]) {
        let mut state = self.state.borrow_mut();
        let Some((image, slice)) = state.read_image() else {
            state.errors.push_back(gl::INVALID_FRAMEBUFFER_OPERATION);
            return;
        };
        let bytes = image.read_rect(slice, rect(x, y, width, height));
        let n = bytes.len().min(out.len());
        out[..n].copy_from_slice(&bytes[..n]);
    }

    fn copy_tex_sub_image_2d(&mut self, _target: u32, level: i32, x_offset: i32, y_offset: i32, x: i32, y: i32, width: i32, height: i32) {
        if level != 0 {
            return;
        }
        let mut state = self.state.borrow_mut();
        let Some((src, slice)) = state.read_image() else {
            state.errors.push_back(gl::INVALID_FRAMEBUFFER_OPERATION);
            return;
        };
        let bytes = src.read_rect(slice, rect(x, y, width, height));
        match state.bound_texture() {
            Some(Some(dst)) => dst.write_rect(0, rect(x_offset, y_offset, width, height), &bytes),
            _ => state.errors.push_back(gl::INVALID_OPERATION),
        }
    }

    fn copy_image_sub_data(
        &mut self,
        src: GlName,
        _src_target: u32,
        src_x: i32,
        src_y: i32,
        dst: GlName,
        _dst_target: u32,
        dst_x: i32,
        dst_y: i32,
        width: i32,
        height: i32,
    ) {
        let mut state = self.state.borrow_mut();
        let source = match state.get(src) {
            Some(Object::Texture(Some(image)) | Object::Renderbuffer(Some(image))) => image.clone(),
            _ => {
                state.errors.push_back(gl::INVALID_VALUE);
                return;
            }
        };
        let region = CopyRegion {
            src_x: src_x as u32,
            src_y: src_y as u32,
            dst_x: dst_x as u32,
            dst_y: dst_y as u32,
            width: width as u32,
            height: height as u32,
        };
        match state.get_mut(dst) {
            Some(Object::Texture(Some(image)) | Object::Renderbuffer(Some(image))) => {
                image.copy_region(&source, &region)
            }
            _ => state.errors.push_back(gl::INVALID_VALUE),
        }
    }

    fn create_shader(&mut self, _ty: u32) -> Result<GlName, String> {
        self.state.borrow_mut().insert(Object::Shader {
            source: String::new(),
            compiled: false,
        })
    }

    fn delete_shader(&mut self, shader: GlName) {
        self.state.borrow_mut().delete(shader);
    }

    fn shader_source(&mut self, shader: GlName, text: &str) {
        if let Some(Object::Shader { source, .. }) = self.state.borrow_mut().get_mut(shader) {
            *source = text.to_string();
        }
    }

    fn compile_shader(&mut self, shader: GlName) {
        if let Some(Object::Shader { source, compiled }) = self.state.borrow_mut().get_mut(shader) {
            *compiled = source.contains("void main");
        }
    }

    fn get_shader_compile_status(&self, shader: GlName) -> bool {
        matches!(
            self.state.borrow().get(shader),
            Some(Object::Shader { compiled: true, .. })
        )
    }

    fn get_shader_info_log(&self, shader: GlName) -> String {
        if self.get_shader_compile_status(shader) {
            String::new()
        } else {
            "error: no entry point 'main'".to_string()
        }
    }

    fn create_program(&mut self) -> Result<GlName, String> {
        self.state
            .borrow_mut()
            .insert(Object::Program(Program::default()))
    }

    fn delete_program(&mut self, program: GlName) {
        let mut state = self.state.borrow_mut();
        if state.program == Some(program) {
            state.program = None;
        }
        state.delete(program);
    }

    fn attach_shader(&mut self, program: GlName, shader: GlName) {
        if let Some(Object::Program(p)) = self.state.borrow_mut().get_mut(program) {
            p.shaders.push(shader);
        }
    }

    fn detach_shader(&mut self, program: GlName, shader: GlName) {
        if let Some(Object::Program(p)) = self.state.borrow_mut().get_mut(program) {
            p.shaders.retain(|s| *s != shader);
        }
    }

    fn link_program(&mut self, program: GlName) {
        self.state.borrow_mut().link(program);
    }

    fn get_program_link_status(&self, program: GlName) -> bool {
        matches!(
            self.state.borrow().get(program),
            Some(Object::Program(Program { linked: true, .. }))
        )
    }

    fn get_program_info_log(&self, program: GlName) -> String {
        match self.state.borrow().get(program) {
            Some(Object::Program(p)) => p.log.clone(),
            _ => String::new(),
        }
    }

    fn use_program(&mut self, program: Option<GlName>) {
        self.state.borrow_mut().program = program;
    }

    fn get_uniform_block_index(&self, program: GlName, name: &str) -> Option<u32> {
        match self.state.borrow().get(program) {
            Some(Object::Program(p)) => p.blocks.iter().position(|b| b == name).map(|i| i as u32),
            _ => None,
        }
    }

    fn uniform_block_binding(&mut self, program: GlName, index: u32, binding: u32) {
        let mut state = self.state.borrow_mut();
        state.calls.push(GlCall::UniformBlockBinding { index, binding });
        let applied = match state.get_mut(program) {
            Some(Object::Program(p)) => p.block_bindings.get_mut(index as usize).map(|b| *b = binding),
            _ => None,
        };
        if applied.is_none() {
            state.errors.push_back(gl::INVALID_VALUE);
        }
    }

    fn get_uniform_location(&self, program: GlName, name: &str) -> Option<u32> {
        match self.state.borrow().get(program) {
            Some(Object::Program(p)) => p.uniforms.iter().position(|u| u == name).map(|i| i as u32),
            _ => None,
        }
    }

    fn uniform_1_i32(&mut self, location: u32, value: i32) {
        self.record(GlCall::Uniform1i { location, value });
    }

    fn create_sampler(&mut self) -> Result<GlName, String> {
        self.state.borrow_mut().insert(Object::Sampler)
    }

    fn delete_sampler(&mut self, sampler: GlName) {
        self.state.borrow_mut().delete(sampler);
    }

    fn bind_sampler(&mut self, _unit: u32, _sampler: Option<GlName>) {}

    fn sampler_parameter_i32(&mut self, _sampler: GlName, _pname: u32, _value: i32) {}

    fn sampler_parameter_f32(&mut self, _sampler: GlName, _pname: u32, _value: f32) {}

    fn create_vertex_array(&mut self) -> Result<GlName, String> {
        self.state.borrow_mut().insert(Object::VertexArray)
    }

    fn delete_vertex_array(&mut self, vertex_array: GlName) {
        let mut state = self.state.borrow_mut();
        if state.vertex_array == Some(vertex_array) {
            state.vertex_array = None;
        }
        state.delete(vertex_array);
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<GlName>) {
        self.state.borrow_mut().vertex_array = vertex_array;
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.record(GlCall::EnableVertexAttribArray(index));
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.record(GlCall::DisableVertexAttribArray(index));
    }

    fn vertex_attrib_pointer_f32(&mut self, index: u32, size: i32, ty: u32, _normalized: bool, stride: i32, offset: i32) {
        self.record(GlCall::VertexAttribPointer {
            index,
            size,
            ty,
            integer: false,
            stride,
            offset,
        });
    }

    fn vertex_attrib_pointer_i32(&mut self, index: u32, size: i32, ty: u32, stride: i32, offset: i32) {
        self.record(GlCall::VertexAttribPointer {
            index,
            size,
            ty,
            integer: true,
            stride,
            offset,
        });
    }

    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        self.record(GlCall::VertexAttribDivisor { index, divisor });
    }

    fn blend_func_separate(&mut self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        let mut state = self.state.borrow_mut();
        state.blend.src = blend_factor(src_rgb);
        state.blend.dst = blend_factor(dst_rgb);
        state.blend.src_alpha = blend_factor(src_alpha);
        state.blend.dst_alpha = blend_factor(dst_alpha);
    }

    fn blend_equation_separate(&mut self, mode_rgb: u32, mode_alpha: u32) {
        let mut state = self.state.borrow_mut();
        state.blend.op = blend_op(mode_rgb);
        state.blend.op_alpha = blend_op(mode_alpha);
    }

    fn cull_face(&mut self, _mode: u32) {}

    fn front_face(&mut self, _mode: u32) {}

    fn polygon_mode(&mut self, _face: u32, _mode: u32) {}

    fn depth_func(&mut self, _func: u32) {}

    fn depth_mask(&mut self, _write: bool) {}

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let mut state = self.state.borrow_mut();
        let (min_depth, max_depth) = (state.viewport.min_depth, state.viewport.max_depth);
        state.viewport = Viewport {
            x: x as f32,
            y: y as f32,
            width: width as f32,
            height: height as f32,
            min_depth,
            max_depth,
        };
    }

    fn depth_range(&mut self, near: f32, far: f32) {
        let mut state = self.state.borrow_mut();
        state.viewport.min_depth = near;
        state.viewport.max_depth = far;
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.state.borrow_mut().clear_color = color;
    }

    fn clear_depth(&mut self, depth: f32) {
        self.state.borrow_mut().clear_depth = depth;
    }

    fn clear_stencil(&mut self, stencil: i32) {
        self.state.borrow_mut().clear_stencil = stencil as u8;
    }

    fn clear(&mut self, mask: u32) {
        let mut state = self.state.borrow_mut();
        state.calls.push(GlCall::Clear(mask));
        state.clear(mask);
    }

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        self.draw(GlCall::DrawArrays { mode, first, count }, i64::from(count));
    }

    fn draw_arrays_instanced(&mut self, mode: u32, first: i32, count: i32, instances: i32) {
        self.draw(
            GlCall::DrawArraysInstanced {
                mode,
                first,
                count,
                instances,
            },
            i64::from(count) * i64::from(instances),
        );
    }

    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: i32) {
        self.draw(
            GlCall::DrawElements {
                mode,
                count,
                ty,
                offset,
            },
            i64::from(count),
        );
    }

    fn draw_elements_instanced(&mut self, mode: u32, count: i32, ty: u32, offset: i32, instances: i32) {
        self.draw(
            GlCall::DrawElementsInstanced {
                mode,
                count,
                ty,
                offset,
                instances,
            },
            i64::from(count) * i64::from(instances),
        );
    }

    fn draw_elements_base_vertex(&mut self, mode: u32, count: i32, ty: u32, offset: i32, base_vertex: i32) {
        self.draw(
            GlCall::DrawElementsBaseVertex {
                mode,
                count,
                ty,
                offset,
                base_vertex,
            },
            i64::from(count),
        );
    }

    fn draw_elements_instanced_base_vertex(&mut self, mode: u32, count: i32, ty: u32, offset: i32, instances: i32, base_vertex: i32) {
        self.draw(
            GlCall::DrawElementsInstancedBaseVertex {
                mode,
                count,
                ty,
                offset,
                instances,
                base_vertex,
            },
            i64::from(count) * i64::from(instances),
        );
    }

    fn bind_image_texture(&mut self, unit: u32, texture: Option<GlName>, _level: i32, _layered: bool, _layer: i32, _access: u32, _format: u32) {
        self.record(GlCall::BindImageTexture { unit, texture });
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.record(GlCall::DispatchCompute(x, y, z));
    }

    fn memory_barrier(&mut self, barriers: u32) {
        self.record(GlCall::MemoryBarrier(barriers));
    }

    fn swap_buffers(&mut self) {
        self.record(GlCall::SwapBuffers);
    }

    fn resize_surface(&mut self) {
        let mut state = self.state.borrow_mut();
        let (w, h) = state.config.back_buffer;
        state.back_buffer = SoftImage::new(w, h, 1, Format::U8x4Norm);
        state.back_depth = SoftImage::new(w, h, 1, Format::D24S8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_never_zero_and_go_stale() {
        let (mut gl, probe) = NullGl::new(NullGlConfig::default());
        let a = gl.create_buffer().unwrap();
        gl.delete_buffer(a);
        assert_eq!(gl.get_error(), gl::NO_ERROR);
        gl.delete_buffer(a);
        assert_eq!(gl.get_error(), gl::INVALID_VALUE);
        let b = gl.create_buffer().unwrap();
        assert_ne!(a, b);
        assert_eq!(probe.live_objects(), 1);
    }

    #[test]
    fn reflection_keeps_declaration_order() {
        let mut blocks = Vec::new();
        let mut uniforms = Vec::new();
        let src = "uniform type_UniformBuffer2 {\n vec4 a; };\n  uniform highp sampler2D uTexture4;\nuniform type_UniformBuffer0{ vec4 b; };\nuniform sampler2D uTexture4;\n";
        reflect(src, &mut blocks, &mut uniforms);
        assert_eq!(blocks, ["type_UniformBuffer2", "type_UniformBuffer0"]);
        assert_eq!(uniforms, ["uTexture4"]);
    }

    #[test]
    fn version_string_parses_back() {
        let (gl, _) = NullGl::new(NullGlConfig::embedded(3, 1));
        let version = gl.get_string(gl::VERSION);
        assert_eq!(
            crate::gl::capabilities::parse_version(&version),
            Some((GlVersion::new(3, 1), true))
        );
    }

    #[test]
    fn default_framebuffer_clears_and_blends() {
        let (mut gl, probe) = NullGl::new(NullGlConfig::default());
        gl.clear_color([0.0, 0.0, 1.0, 0.5]);
        gl.clear(gl::COLOR_BUFFER_BIT);
        assert_eq!(probe.back_buffer_texel(10, 10), [0, 0, 255, 128]);

        gl.enable(gl::BLEND);
        gl.blend_func_separate(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA, gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);
        gl.viewport(0, 0, 4, 4);
        gl.draw_arrays(gl::TRIANGLES, 0, 0);
        assert_eq!(probe.back_buffer_texel(0, 0), [0, 0, 255, 128]);
        gl.draw_arrays(gl::TRIANGLES, 0, 6);
        // White at alpha 1 replaces the colour.
        assert_eq!(probe.back_buffer_texel(0, 0), [255, 255, 255, 255]);
        assert_eq!(probe.back_buffer_texel(4, 4), [0, 0, 255, 128]);
    }

    #[test]
    fn missing_depth_attachment_reports_none() {
        let (mut gl, _) = NullGl::new(NullGlConfig::default());
        let pname = gl::FRAMEBUFFER_ATTACHMENT_OBJECT_TYPE;
        assert_eq!(
            gl.get_framebuffer_attachment_parameter_i32(gl::DRAW_FRAMEBUFFER, gl::DEPTH, pname),
            gl::FRAMEBUFFER_DEFAULT as i32
        );

        let texture = gl.create_texture().unwrap();
        gl.bind_texture(gl::TEXTURE_2D, Some(texture));
        gl.tex_storage_2d(gl::TEXTURE_2D, 1, gl::RGBA8, 4, 4);
        let fb = gl.create_framebuffer().unwrap();
        gl.bind_framebuffer(gl::FRAMEBUFFER, Some(fb));
        assert_eq!(gl.check_framebuffer_status(gl::FRAMEBUFFER), gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT);
        gl.framebuffer_texture_2d(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, Some(texture), 0);
        assert_eq!(gl.check_framebuffer_status(gl::FRAMEBUFFER), gl::FRAMEBUFFER_COMPLETE);
        assert_eq!(
            gl.get_framebuffer_attachment_parameter_i32(gl::DRAW_FRAMEBUFFER, gl::COLOR_ATTACHMENT0, pname),
            gl::TEXTURE as i32
        );
        assert_eq!(
            gl.get_framebuffer_attachment_parameter_i32(gl::DRAW_FRAMEBUFFER, gl::DEPTH_ATTACHMENT, pname),
            gl::NONE as i32
        );
    }

    #[test]
    fn mapped_range_aliases_buffer_memory() {
        let (mut gl, _) = NullGl::new(NullGlConfig::default());
        let buffer = gl.create_buffer().unwrap();
        gl.bind_buffer(gl::COPY_WRITE_BUFFER, Some(buffer));
        gl.buffer_data(gl::COPY_WRITE_BUFFER, &[1, 2, 3, 4], gl::DYNAMIC_DRAW);
        let ptr = gl.map_buffer_range(gl::COPY_WRITE_BUFFER, 2, 2, gl::MAP_WRITE_BIT);
        assert!(!ptr.is_null());
        // SAFETY: two bytes were mapped and the buffer is not touched meanwhile.
        unsafe { std::slice::from_raw_parts_mut(ptr, 2).copy_from_slice(&[9, 9]) };
        gl.unmap_buffer(gl::COPY_WRITE_BUFFER);

        gl.bind_buffer(gl::COPY_READ_BUFFER, Some(buffer));
        let out = gl.create_buffer().unwrap();
        gl.bind_buffer(gl::COPY_WRITE_BUFFER, Some(out));
        gl.buffer_data_size(gl::COPY_WRITE_BUFFER, 4, gl::DYNAMIC_DRAW);
        gl.copy_buffer_sub_data(gl::COPY_READ_BUFFER, gl::COPY_WRITE_BUFFER, 0, 0, 4);
        let ptr = gl.map_buffer_range(gl::COPY_WRITE_BUFFER, 0, 4, gl::MAP_READ_BIT);
        // SAFETY: as above.
        assert_eq!(unsafe { std::slice::from_raw_parts(ptr, 4) }, [1, 2, 9, 9]);
        assert!(gl.map_buffer_range(gl::COPY_WRITE_BUFFER, 2, 8, gl::MAP_READ_BIT).is_null());
    }
}
