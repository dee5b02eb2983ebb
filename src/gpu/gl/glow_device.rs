//! [`GlApi`] over a real driver through `glow`.

use std::collections::HashMap;
use std::ffi::c_void;

use glow::{self as gl, HasContext};

use super::native::{GlApi, GlName};

/// Window-system side of a GL context: proc lookup and presentation.
///
/// The context must be current on the calling thread for the lifetime of
/// the [`GlowDevice`] built on it.
pub trait GlSurface {
    fn get_proc_address(&self, symbol: &str) -> *const c_void;
    fn swap_buffers(&mut self);
    /// Called after the window changed size.
    fn resize(&mut self);
    /// Whether the default framebuffer was created with depth and stencil.
    fn has_depth_stencil(&self) -> bool;
}

/// Attachment object types per framebuffer, since `glow` cannot query them.
#[derive(Default)]
struct Attachments {
    draw: Option<GlName>,
    objects: HashMap<(GlName, u32), u32>,
}

pub struct GlowDevice {
    gl: gl::Context,
    surface: Box<dyn GlSurface>,
    attachments: Attachments,
}

fn texture(name: GlName) -> gl::NativeTexture {
    gl::NativeTexture(name)
}

fn created<T>(result: Result<T, String>, raw: impl FnOnce(T) -> GlName) -> Result<GlName, String> {
    result.map(raw)
}

impl GlowDevice {
    /// Loads the entry points of the context that is current for `surface`.
    ///
    /// # Safety
    /// A GL context must be current on this thread and `surface` must return
    /// valid function pointers for it.
    pub unsafe fn new(surface: Box<dyn GlSurface>) -> Self {
        let gl = gl::Context::from_loader_function(|symbol| surface.get_proc_address(symbol));
        Self {
            gl,
            surface,
            attachments: Attachments::default(),
        }
    }

    fn record_attachment(&mut self, target: u32, attachment: u32, object: u32) {
        if target == gl::READ_FRAMEBUFFER {
            return;
        }
        let Some(fb) = self.attachments.draw else { return };
        let points: &[u32] = if attachment == gl::DEPTH_STENCIL_ATTACHMENT {
            &[gl::DEPTH_ATTACHMENT, gl::STENCIL_ATTACHMENT]
        } else {
            &[attachment]
        };
        for point in points {
            self.attachments.objects.insert((fb, *point), object);
        }
    }
}

impl GlApi for GlowDevice {
    fn get_string(&self, name: u32) -> String {
        unsafe { self.gl.get_parameter_string(name) }
    }

    fn get_integer(&self, pname: u32) -> i32 {
        unsafe { self.gl.get_parameter_i32(pname) }
    }

    fn get_integer_indexed(&self, pname: u32, index: u32) -> i32 {
        unsafe { self.gl.get_parameter_indexed_i32(pname, index) }
    }

    fn get_float(&self, pname: u32) -> f32 {
        unsafe { self.gl.get_parameter_f32(pname) }
    }

    fn extensions(&self) -> Vec<String> {
        self.gl.supported_extensions().iter().cloned().collect()
    }

    fn get_error(&mut self) -> u32 {
        unsafe { self.gl.get_error() }
    }

    fn pixel_store_i32(&mut self, pname: u32, value: i32) {
        unsafe { self.gl.pixel_store_i32(pname, value) }
    }

    fn enable(&mut self, cap: u32) {
        unsafe { self.gl.enable(cap) }
    }

    fn disable(&mut self, cap: u32) {
        unsafe { self.gl.disable(cap) }
    }

    fn create_texture(&mut self) -> Result<GlName, String> {
        created(unsafe { self.gl.create_texture() }, |t| t.0)
    }

    fn delete_texture(&mut self, name: GlName) {
        unsafe { self.gl.delete_texture(texture(name)) }
    }

    fn bind_texture(&mut self, target: u32, name: Option<GlName>) {
        unsafe { self.gl.bind_texture(target, name.map(texture)) }
    }

    fn active_texture(&mut self, unit: u32) {
        unsafe { self.gl.active_texture(unit) }
    }

    fn tex_storage_2d(&mut self, target: u32, levels: i32, internal: u32, width: i32, height: i32) {
        unsafe { self.gl.tex_storage_2d(target, levels, internal, width, height) }
    }

    fn tex_storage_3d(&mut self, target: u32, levels: i32, internal: u32, width: i32, height: i32, depth: i32) {
        unsafe { self.gl.tex_storage_3d(target, levels, internal, width, height, depth) }
    }

    fn tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal: u32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        data: Option<&[u8]>,
    ) {
        unsafe {
            self.gl
                .tex_image_2d(target, level, internal as i32, width, height, 0, format, ty, data)
        }
    }

    fn tex_image_3d(
        &mut self,
        target: u32,
        level: i32,
        internal: u32,
        width: i32,
        height: i32,
        depth: i32,
        format: u32,
        ty: u32,
        data: Option<&[u8]>,
    ) {
        unsafe {
            self.gl.tex_image_3d(
                target,
                level,
                internal as i32,
                width,
                height,
                depth,
                0,
                format,
                ty,
                data,
            )
        }
    }

    fn compressed_tex_image_2d(&mut self, target: u32, level: i32, internal: u32, width: i32, height: i32, data: &[u8]) {
        unsafe {
            self.gl.compressed_tex_image_2d(
                target,
                level,
                internal as i32,
                width,
                height,
                0,
                data.len() as i32,
                data,
            )
        }
    }

    fn tex_sub_image_2d(
        &mut self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        data: &[u8],
    ) {
        unsafe {
            self.gl.tex_sub_image_2d(
                target,
                level,
                x,
                y,
                width,
                height,
                format,
                ty,
                gl::PixelUnpackData::Slice(data),
            )
        }
    }

    fn tex_sub_image_3d(
        &mut self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        format: u32,
        ty: u32,
        data: &[u8],
    ) {
        unsafe {
            self.gl.tex_sub_image_3d(
                target,
                level,
                x,
                y,
                z,
                width,
                height,
                depth,
                format,
                ty,
                gl::PixelUnpackData::Slice(data),
            )
        }
    }

    fn compressed_tex_sub_image_2d(
        &mut self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        internal: u32,
        data: &[u8],
    ) {
        unsafe {
            self.gl.compressed_tex_sub_image_2d(
                target,
                level,
                x,
                y,
                width,
                height,
                internal,
                gl::CompressedPixelUnpackData::Slice(data),
            )
        }
    }

    fn compressed_tex_sub_image_3d(
        &mut self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        internal: u32,
        data: &[u8],
    ) {
        unsafe {
            self.gl.compressed_tex_sub_image_3d(
                target,
                level,
                x,
                y,
                z,
                width,
                height,
                depth,
                internal,
                gl::CompressedPixelUnpackData::Slice(data),
            )
        }
    }

    fn tex_parameter_i32(&mut self, target: u32, pname: u32, value: i32) {
        unsafe { self.gl.tex_parameter_i32(target, pname, value) }
    }

    fn create_renderbuffer(&mut self) -> Result<GlName, String> {
        created(unsafe { self.gl.create_renderbuffer() }, |r| r.0)
    }

    fn delete_renderbuffer(&mut self, name: GlName) {
        unsafe { self.gl.delete_renderbuffer(gl::NativeRenderbuffer(name)) }
    }

    fn bind_renderbuffer(&mut self, name: Option<GlName>) {
        unsafe {
            self.gl
                .bind_renderbuffer(gl::RENDERBUFFER, name.map(gl::NativeRenderbuffer))
        }
    }

    fn renderbuffer_storage(&mut self, internal: u32, width: i32, height: i32) {
        unsafe {
            self.gl
                .renderbuffer_storage(gl::RENDERBUFFER, internal, width, height)
        }
    }

    fn create_buffer(&mut self) -> Result<GlName, String> {
        created(unsafe { self.gl.create_buffer() }, |b| b.0)
    }

    fn delete_buffer(&mut self, name: GlName) {
        unsafe { self.gl.delete_buffer(gl::NativeBuffer(name)) }
    }

    fn bind_buffer(&mut self, target: u32, name: Option<GlName>) {
        unsafe { self.gl.bind_buffer(target, name.map(gl::NativeBuffer)) }
    }

    fn buffer_data_size(&mut self, target: u32, size: i32, usage: u32) {
        unsafe { self.gl.buffer_data_size(target, size, usage) }
    }

    fn buffer_data(&mut self, target: u32, data: &[u8], usage: u32) {
        unsafe { self.gl.buffer_data_u8_slice(target, data, usage) }
    }

    fn buffer_sub_data(&mut self, target: u32, offset: i32, data: &[u8]) {
        unsafe { self.gl.buffer_sub_data_u8_slice(target, offset, data) }
    }

    fn bind_buffer_base(&mut self, target: u32, index: u32, name: Option<GlName>) {
        unsafe {
            self.gl
                .bind_buffer_base(target, index, name.map(gl::NativeBuffer))
        }
    }

    fn bind_buffer_range(&mut self, target: u32, index: u32, name: Option<GlName>, offset: i32, size: i32) {
        unsafe {
            self.gl
                .bind_buffer_range(target, index, name.map(gl::NativeBuffer), offset, size)
        }
    }

    fn map_buffer_range(&mut self, target: u32, offset: i32, length: i32, access: u32) -> *mut u8 {
        unsafe { self.gl.map_buffer_range(target, offset, length, access) }
    }

    fn unmap_buffer(&mut self, target: u32) {
        unsafe { self.gl.unmap_buffer(target) }
    }

    fn copy_buffer_sub_data(&mut self, read_target: u32, write_target: u32, read_offset: i32, write_offset: i32, size: i32) {
        unsafe {
            self.gl
                .copy_buffer_sub_data(read_target, write_target, read_offset, write_offset, size)
        }
    }

    fn create_framebuffer(&mut self) -> Result<GlName, String> {
        created(unsafe { self.gl.create_framebuffer() }, |f| f.0)
    }

    fn delete_framebuffer(&mut self, name: GlName) {
        self.attachments.objects.retain(|(fb, _), _| *fb != name);
        if self.attachments.draw == Some(name) {
            self.attachments.draw = None;
        }
        unsafe { self.gl.delete_framebuffer(gl::NativeFramebuffer(name)) }
    }

    fn bind_framebuffer(&mut self, target: u32, name: Option<GlName>) {
        if target != gl::READ_FRAMEBUFFER {
            self.attachments.draw = name;
        }
        unsafe {
            self.gl
                .bind_framebuffer(target, name.map(gl::NativeFramebuffer))
        }
    }

    fn framebuffer_texture_2d(&mut self, target: u32, attachment: u32, tex_target: u32, name: Option<GlName>, level: i32) {
        let object = if name.is_some() { gl::TEXTURE } else { gl::NONE };
        self.record_attachment(target, attachment, object);
        unsafe {
            self.gl
                .framebuffer_texture_2d(target, attachment, tex_target, name.map(texture), level)
        }
    }

    fn framebuffer_texture_layer(&mut self, target: u32, attachment: u32, name: Option<GlName>, level: i32, layer: i32) {
        let object = if name.is_some() { gl::TEXTURE } else { gl::NONE };
        self.record_attachment(target, attachment, object);
        unsafe {
            self.gl
                .framebuffer_texture_layer(target, attachment, name.map(texture), level, layer)
        }
    }

    fn framebuffer_renderbuffer(&mut self, target: u32, attachment: u32, name: Option<GlName>) {
        let object = if name.is_some() { gl::RENDERBUFFER } else { gl::NONE };
        self.record_attachment(target, attachment, object);
        unsafe {
            self.gl.framebuffer_renderbuffer(
                target,
                attachment,
                gl::RENDERBUFFER,
                name.map(gl::NativeRenderbuffer),
            )
        }
    }

    fn check_framebuffer_status(&mut self, target: u32) -> u32 {
        unsafe { self.gl.check_framebuffer_status(target) }
    }

    /// Answers `FRAMEBUFFER_ATTACHMENT_OBJECT_TYPE` for draw framebuffers
    /// from the attachments this device recorded.
    fn get_framebuffer_attachment_parameter_i32(&self, _target: u32, attachment: u32, pname: u32) -> i32 {
        if pname != gl::FRAMEBUFFER_ATTACHMENT_OBJECT_TYPE {
            return 0;
        }
        let object = match self.attachments.draw {
            None => match attachment {
                gl::BACK | gl::FRONT => gl::FRAMEBUFFER_DEFAULT,
                gl::DEPTH | gl::STENCIL if self.surface.has_depth_stencil() => gl::FRAMEBUFFER_DEFAULT,
                _ => gl::NONE,
            },
            Some(fb) => self
                .attachments
                .objects
                .get(&(fb, attachment))
                .copied()
                .unwrap_or(gl::NONE),
        };
        object as i32
    }

    fn draw_buffers(&mut self, buffers: &[u32]) {
        unsafe { self.gl.draw_buffers(buffers) }
    }

    fn read_pixels(&mut self, x: i32, y: i32, width: i32, height: i32, format: u32, ty: u32, data: &mut [u8]) {
        unsafe {
            self.gl
                .read_pixels(x, y, width, height, format, ty, gl::PixelPackData::Slice(data))
        }
    }

    fn copy_tex_sub_image_2d(&mut self, target: u32, level: i32, x_offset: i32, y_offset: i32, x: i32, y: i32, width: i32, height: i32) {
        unsafe {
            self.gl
                .copy_tex_sub_image_2d(target, level, x_offset, y_offset, x, y, width, height)
        }
    }

    fn copy_image_sub_data(
        &mut self,
        src: GlName,
        src_target: u32,
        src_x: i32,
        src_y: i32,
        dst: GlName,
        dst_target: u32,
        dst_x: i32,
        dst_y: i32,
        width: i32,
        height: i32,
    ) {
        unsafe {
            self.gl.copy_image_sub_data(
                texture(src),
                src_target,
                0,
                src_x,
                src_y,
                0,
                texture(dst),
                dst_target,
                0,
                dst_x,
                dst_y,
                0,
                width,
                height,
                1,
            )
        }
    }

    fn create_shader(&mut self, ty: u32) -> Result<GlName, String> {
        created(unsafe { self.gl.create_shader(ty) }, |s| s.0)
    }

    fn delete_shader(&mut self, shader: GlName) {
        unsafe { self.gl.delete_shader(gl::NativeShader(shader)) }
    }

    fn shader_source(&mut self, shader: GlName, source: &str) {
        unsafe { self.gl.shader_source(gl::NativeShader(shader), source) }
    }

    fn compile_shader(&mut self, shader: GlName) {
        unsafe { self.gl.compile_shader(gl::NativeShader(shader)) }
    }

    fn get_shader_compile_status(&self, shader: GlName) -> bool {
        unsafe { self.gl.get_shader_compile_status(gl::NativeShader(shader)) }
    }

    fn get_shader_info_log(&self, shader: GlName) -> String {
        unsafe { self.gl.get_shader_info_log(gl::NativeShader(shader)) }
    }

    fn create_program(&mut self) -> Result<GlName, String> {
        created(unsafe { self.gl.create_program() }, |p| p.0)
    }

    fn delete_program(&mut self, program: GlName) {
        unsafe { self.gl.delete_program(gl::NativeProgram(program)) }
    }

    fn attach_shader(&mut self, program: GlName, shader: GlName) {
        unsafe {
            self.gl
                .attach_shader(gl::NativeProgram(program), gl::NativeShader(shader))
        }
    }

    fn detach_shader(&mut self, program: GlName, shader: GlName) {
        unsafe {
            self.gl
                .detach_shader(gl::NativeProgram(program), gl::NativeShader(shader))
        }
    }

    fn link_program(&mut self, program: GlName) {
        unsafe { self.gl.link_program(gl::NativeProgram(program)) }
    }

    fn get_program_link_status(&self, program: GlName) -> bool {
        unsafe { self.gl.get_program_link_status(gl::NativeProgram(program)) }
    }

    fn get_program_info_log(&self, program: GlName) -> String {
        unsafe { self.gl.get_program_info_log(gl::NativeProgram(program)) }
    }

    fn use_program(&mut self, program: Option<GlName>) {
        unsafe { self.gl.use_program(program.map(gl::NativeProgram)) }
    }

    fn get_uniform_block_index(&self, program: GlName, name: &str) -> Option<u32> {
        unsafe { self.gl.get_uniform_block_index(gl::NativeProgram(program), name) }
    }

    fn uniform_block_binding(&mut self, program: GlName, index: u32, binding: u32) {
        unsafe {
            self.gl
                .uniform_block_binding(gl::NativeProgram(program), index, binding)
        }
    }

    fn get_uniform_location(&self, program: GlName, name: &str) -> Option<u32> {
        unsafe {
            self.gl
                .get_uniform_location(gl::NativeProgram(program), name)
                .map(|location| location.0)
        }
    }

    fn uniform_1_i32(&mut self, location: u32, value: i32) {
        let location = gl::NativeUniformLocation(location);
        unsafe { self.gl.uniform_1_i32(Some(&location), value) }
    }

    fn create_sampler(&mut self) -> Result<GlName, String> {
        created(unsafe { self.gl.create_sampler() }, |s| s.0)
    }

    fn delete_sampler(&mut self, sampler: GlName) {
        unsafe { self.gl.delete_sampler(gl::NativeSampler(sampler)) }
    }

    fn bind_sampler(&mut self, unit: u32, sampler: Option<GlName>) {
        unsafe { self.gl.bind_sampler(unit, sampler.map(gl::NativeSampler)) }
    }

    fn sampler_parameter_i32(&mut self, sampler: GlName, pname: u32, value: i32) {
        unsafe {
            self.gl
                .sampler_parameter_i32(gl::NativeSampler(sampler), pname, value)
        }
    }

    fn sampler_parameter_f32(&mut self, sampler: GlName, pname: u32, value: f32) {
        unsafe {
            self.gl
                .sampler_parameter_f32(gl::NativeSampler(sampler), pname, value)
        }
    }

    fn create_vertex_array(&mut self) -> Result<GlName, String> {
        created(unsafe { self.gl.create_vertex_array() }, |v| v.0)
    }

    fn delete_vertex_array(&mut self, vao: GlName) {
        unsafe { self.gl.delete_vertex_array(gl::NativeVertexArray(vao)) }
    }

    fn bind_vertex_array(&mut self, vao: Option<GlName>) {
        unsafe { self.gl.bind_vertex_array(vao.map(gl::NativeVertexArray)) }
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) }
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(index) }
    }

    fn vertex_attrib_pointer_f32(&mut self, index: u32, size: i32, ty: u32, normalized: bool, stride: i32, offset: i32) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(index, size, ty, normalized, stride, offset)
        }
    }

    fn vertex_attrib_pointer_i32(&mut self, index: u32, size: i32, ty: u32, stride: i32, offset: i32) {
        unsafe { self.gl.vertex_attrib_pointer_i32(index, size, ty, stride, offset) }
    }

    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        unsafe { self.gl.vertex_attrib_divisor(index, divisor) }
    }

    fn blend_func_separate(&mut self, src: u32, dst: u32, src_alpha: u32, dst_alpha: u32) {
        unsafe { self.gl.blend_func_separate(src, dst, src_alpha, dst_alpha) }
    }

    fn blend_equation_separate(&mut self, mode: u32, mode_alpha: u32) {
        unsafe { self.gl.blend_equation_separate(mode, mode_alpha) }
    }

    fn cull_face(&mut self, face: u32) {
        unsafe { self.gl.cull_face(face) }
    }

    fn front_face(&mut self, mode: u32) {
        unsafe { self.gl.front_face(mode) }
    }

    fn polygon_mode(&mut self, face: u32, mode: u32) {
        unsafe { self.gl.polygon_mode(face, mode) }
    }

    fn depth_func(&mut self, func: u32) {
        unsafe { self.gl.depth_func(func) }
    }

    fn depth_mask(&mut self, write: bool) {
        unsafe { self.gl.depth_mask(write) }
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn depth_range(&mut self, near: f32, far: f32) {
        unsafe { self.gl.depth_range_f32(near, far) }
    }

    fn clear_color(&mut self, [r, g, b, a]: [f32; 4]) {
        unsafe { self.gl.clear_color(r, g, b, a) }
    }

    fn clear_depth(&mut self, depth: f32) {
        unsafe { self.gl.clear_depth_f32(depth) }
    }

    fn clear_stencil(&mut self, stencil: i32) {
        unsafe { self.gl.clear_stencil(stencil) }
    }

    fn clear(&mut self, mask: u32) {
        unsafe { self.gl.clear(mask) }
    }

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        unsafe { self.gl.draw_arrays(mode, first, count) }
    }

    fn draw_arrays_instanced(&mut self, mode: u32, first: i32, count: i32, instances: i32) {
        unsafe { self.gl.draw_arrays_instanced(mode, first, count, instances) }
    }

    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: i32) {
        unsafe { self.gl.draw_elements(mode, count, ty, offset) }
    }

    fn draw_elements_instanced(&mut self, mode: u32, count: i32, ty: u32, offset: i32, instances: i32) {
        unsafe {
            self.gl
                .draw_elements_instanced(mode, count, ty, offset, instances)
        }
    }

    fn draw_elements_base_vertex(&mut self, mode: u32, count: i32, ty: u32, offset: i32, base_vertex: i32) {
        unsafe {
            self.gl
                .draw_elements_base_vertex(mode, count, ty, offset, base_vertex)
        }
    }

    fn draw_elements_instanced_base_vertex(
        &mut self,
        mode: u32,
        count: i32,
        ty: u32,
        offset: i32,
        instances: i32,
        base_vertex: i32,
    ) {
        unsafe {
            self.gl
                .draw_elements_instanced_base_vertex(mode, count, ty, offset, instances, base_vertex)
        }
    }

    fn bind_image_texture(&mut self, unit: u32, name: Option<GlName>, level: i32, layered: bool, layer: i32, access: u32, format: u32) {
        // Unbinding an image unit has no glow entry point; unused units are left alone.
        let Some(name) = name else { return };
        unsafe {
            self.gl
                .bind_image_texture(unit, texture(name), level, layered, layer, access, format)
        }
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        unsafe { self.gl.dispatch_compute(x, y, z) }
    }

    fn memory_barrier(&mut self, barriers: u32) {
        unsafe { self.gl.memory_barrier(barriers) }
    }

    fn swap_buffers(&mut self) {
        self.surface.swap_buffers();
    }

    fn resize_surface(&mut self) {
        self.surface.resize();
    }
}
