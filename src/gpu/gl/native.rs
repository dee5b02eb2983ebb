//! Narrow view of an OpenGL / OpenGL ES context.
//!
//! Enumerants are the raw `GLenum` values from `glow`. Object names are
//! [`GlName`], the same non-zero integer `glow` wraps in its `Native*` types;
//! `None` stands for object zero.

use std::num::NonZeroU32;

pub type GlName = NonZeroU32;

/// One GL context plus the surface it presents to.
///
/// Mirrors the `glow::HasContext` entry points the reflective backend issues.
/// Creation failures carry the driver's message.
pub trait GlApi {
    fn get_string(&self, name: u32) -> String;
    fn get_integer(&self, pname: u32) -> i32;
    fn get_integer_indexed(&self, pname: u32, index: u32) -> i32;
    fn get_float(&self, pname: u32) -> f32;
    fn extensions(&self) -> Vec<String>;
    fn get_error(&mut self) -> u32;
    fn pixel_store_i32(&mut self, pname: u32, value: i32);
    fn enable(&mut self, cap: u32);
    fn disable(&mut self, cap: u32);

    fn create_texture(&mut self) -> Result<GlName, String>;
    fn delete_texture(&mut self, texture: GlName);
    fn bind_texture(&mut self, target: u32, texture: Option<GlName>);
    fn active_texture(&mut self, unit: u32);
    fn tex_storage_2d(&mut self, target: u32, levels: i32, internal: u32, width: i32, height: i32);
    fn tex_storage_3d(&mut self, target: u32, levels: i32, internal: u32, width: i32, height: i32, depth: i32);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(&mut self, target: u32, level: i32, internal: u32, width: i32, height: i32, format: u32, ty: u32, data: Option<&[u8]>);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_3d(&mut self, target: u32, level: i32, internal: u32, width: i32, height: i32, depth: i32, format: u32, ty: u32, data: Option<&[u8]>);
    fn compressed_tex_image_2d(&mut self, target: u32, level: i32, internal: u32, width: i32, height: i32, data: &[u8]);
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_2d(&mut self, target: u32, level: i32, x: i32, y: i32, width: i32, height: i32, format: u32, ty: u32, data: &[u8]);
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_3d(&mut self, target: u32, level: i32, x: i32, y: i32, z: i32, width: i32, height: i32, depth: i32, format: u32, ty: u32, data: &[u8]);
    #[allow(clippy::too_many_arguments)]
    fn compressed_tex_sub_image_2d(&mut self, target: u32, level: i32, x: i32, y: i32, width: i32, height: i32, internal: u32, data: &[u8]);
    #[allow(clippy::too_many_arguments)]
    fn compressed_tex_sub_image_3d(&mut self, target: u32, level: i32, x: i32, y: i32, z: i32, width: i32, height: i32, depth: i32, internal: u32, data: &[u8]);
    fn tex_parameter_i32(&mut self, target: u32, pname: u32, value: i32);

    fn create_renderbuffer(&mut self) -> Result<GlName, String>;
    fn delete_renderbuffer(&mut self, renderbuffer: GlName);
    fn bind_renderbuffer(&mut self, renderbuffer: Option<GlName>);
    fn renderbuffer_storage(&mut self, internal: u32, width: i32, height: i32);

    fn create_buffer(&mut self) -> Result<GlName, String>;
    fn delete_buffer(&mut self, buffer: GlName);
    fn bind_buffer(&mut self, target: u32, buffer: Option<GlName>);
    fn buffer_data_size(&mut self, target: u32, size: i32, usage: u32);
    fn buffer_data(&mut self, target: u32, data: &[u8], usage: u32);
    fn buffer_sub_data(&mut self, target: u32, offset: i32, data: &[u8]);
    fn bind_buffer_base(&mut self, target: u32, index: u32, buffer: Option<GlName>);
    fn bind_buffer_range(&mut self, target: u32, index: u32, buffer: Option<GlName>, offset: i32, size: i32);
    /// Null when the driver refuses the mapping.
    fn map_buffer_range(&mut self, target: u32, offset: i32, length: i32, access: u32) -> *mut u8;
    fn unmap_buffer(&mut self, target: u32);
    fn copy_buffer_sub_data(&mut self, read_target: u32, write_target: u32, read_offset: i32, write_offset: i32, size: i32);

    fn create_framebuffer(&mut self) -> Result<GlName, String>;
    fn delete_framebuffer(&mut self, framebuffer: GlName);
    fn bind_framebuffer(&mut self, target: u32, framebuffer: Option<GlName>);
    fn framebuffer_texture_2d(&mut self, target: u32, attachment: u32, texture_target: u32, texture: Option<GlName>, level: i32);
    fn framebuffer_texture_layer(&mut self, target: u32, attachment: u32, texture: Option<GlName>, level: i32, layer: i32);
    fn framebuffer_renderbuffer(&mut self, target: u32, attachment: u32, renderbuffer: Option<GlName>);
    fn check_framebuffer_status(&mut self, target: u32) -> u32;
    fn get_framebuffer_attachment_parameter_i32(&self, target: u32, attachment: u32, pname: u32) -> i32;
    fn draw_buffers(&mut self, buffers: &[u32]);
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(&mut self, x: i32, y: i32, width: i32, height: i32, format: u32, ty: u32, out: &mut [u8]);
    #[allow(clippy::too_many_arguments)]
    fn copy_tex_sub_image_2d(&mut self, target: u32, level: i32, x_offset: i32, y_offset: i32, x: i32, y: i32, width: i32, height: i32);
    #[allow(clippy::too_many_arguments)]
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
    );

    fn create_shader(&mut self, ty: u32) -> Result<GlName, String>;
    fn delete_shader(&mut self, shader: GlName);
    fn shader_source(&mut self, shader: GlName, source: &str);
    fn compile_shader(&mut self, shader: GlName);
    fn get_shader_compile_status(&self, shader: GlName) -> bool;
    fn get_shader_info_log(&self, shader: GlName) -> String;
    fn create_program(&mut self) -> Result<GlName, String>;
    fn delete_program(&mut self, program: GlName);
    fn attach_shader(&mut self, program: GlName, shader: GlName);
    fn detach_shader(&mut self, program: GlName, shader: GlName);
    fn link_program(&mut self, program: GlName);
    fn get_program_link_status(&self, program: GlName) -> bool;
    fn get_program_info_log(&self, program: GlName) -> String;
    fn use_program(&mut self, program: Option<GlName>);
    fn get_uniform_block_index(&self, program: GlName, name: &str) -> Option<u32>;
    fn uniform_block_binding(&mut self, program: GlName, index: u32, binding: u32);
    fn get_uniform_location(&self, program: GlName, name: &str) -> Option<u32>;
    fn uniform_1_i32(&mut self, location: u32, value: i32);

    fn create_sampler(&mut self) -> Result<GlName, String>;
    fn delete_sampler(&mut self, sampler: GlName);
    fn bind_sampler(&mut self, unit: u32, sampler: Option<GlName>);
    fn sampler_parameter_i32(&mut self, sampler: GlName, pname: u32, value: i32);
    fn sampler_parameter_f32(&mut self, sampler: GlName, pname: u32, value: f32);

    fn create_vertex_array(&mut self) -> Result<GlName, String>;
    fn delete_vertex_array(&mut self, vertex_array: GlName);
    fn bind_vertex_array(&mut self, vertex_array: Option<GlName>);
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    #[allow(clippy::too_many_arguments)]
    fn vertex_attrib_pointer_f32(&mut self, index: u32, size: i32, ty: u32, normalized: bool, stride: i32, offset: i32);
    fn vertex_attrib_pointer_i32(&mut self, index: u32, size: i32, ty: u32, stride: i32, offset: i32);
    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32);

    fn blend_func_separate(&mut self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32);
    fn blend_equation_separate(&mut self, mode_rgb: u32, mode_alpha: u32);
    fn cull_face(&mut self, mode: u32);
    fn front_face(&mut self, mode: u32);
    fn polygon_mode(&mut self, face: u32, mode: u32);
    fn depth_func(&mut self, func: u32);
    fn depth_mask(&mut self, write: bool);
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn depth_range(&mut self, near: f32, far: f32);

    fn clear_color(&mut self, color: [f32; 4]);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, stencil: i32);
    fn clear(&mut self, mask: u32);

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32);
    fn draw_arrays_instanced(&mut self, mode: u32, first: i32, count: i32, instances: i32);
    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: i32);
    fn draw_elements_instanced(&mut self, mode: u32, count: i32, ty: u32, offset: i32, instances: i32);
    fn draw_elements_base_vertex(&mut self, mode: u32, count: i32, ty: u32, offset: i32, base_vertex: i32);
    #[allow(clippy::too_many_arguments)]
    fn draw_elements_instanced_base_vertex(&mut self, mode: u32, count: i32, ty: u32, offset: i32, instances: i32, base_vertex: i32);

    #[allow(clippy::too_many_arguments)]
    fn bind_image_texture(&mut self, unit: u32, texture: Option<GlName>, level: i32, layered: bool, layer: i32, access: u32, format: u32);
    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);
    fn memory_barrier(&mut self, barriers: u32);

    fn swap_buffers(&mut self);
    fn resize_surface(&mut self);
}
