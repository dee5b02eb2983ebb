#![allow(dead_code)]

use rhal::null::{NullD3d11Config, NullD3d11Probe, NullGlConfig, NullGlProbe};
use rhal::*;

pub const WIDTH: u32 = 256;
pub const HEIGHT: u32 = 256;

pub const GLSL_VERTEX: &[u8] = b"#version 430
in vec4 aPosition;
void main() { gl_Position = aPosition; }
";

pub const GLSL_FRAGMENT: &[u8] = b"#version 430
uniform type_UniformBuffer0 { vec4 color; };
out vec4 oColor;
void main() { oColor = color; }
";

pub const GLSL_COMPUTE: &[u8] = b"#version 430
layout(local_size_x = 8, local_size_y = 8) in;
layout(std430, binding = 16) buffer Output { uint values[]; };
void main() { values[gl_GlobalInvocationID.x] = gl_GlobalInvocationID.y; }
";

// Stand-ins for compiled shader blobs; the software device only checks they are non-empty.
pub const DXBC_VERTEX: &[u8] = b"DXBC vs_5_0";
pub const DXBC_PIXEL: &[u8] = b"DXBC ps_5_0";
pub const DXBC_COMPUTE: &[u8] = b"DXBC cs_5_0";

pub const SHADERS: [ShaderBinary<'static>; 2] = [
    ShaderBinary {
        tier: ShaderTier::Glsl,
        vertex: GLSL_VERTEX,
        fragment: GLSL_FRAGMENT,
    },
    ShaderBinary {
        tier: ShaderTier::Hlsl50,
        vertex: DXBC_VERTEX,
        fragment: DXBC_PIXEL,
    },
];

pub const COMPUTE_SHADERS: [ComputeBinary<'static>; 2] = [
    ComputeBinary {
        tier: ShaderTier::Glsl,
        code: GLSL_COMPUTE,
    },
    ComputeBinary {
        tier: ShaderTier::Hlsl50,
        code: DXBC_COMPUTE,
    },
];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Probe of whichever software device backs a context.
pub enum Probe {
    D3d11(NullD3d11Probe),
    Gl(NullGlProbe),
}

impl Probe {
    pub fn live_objects(&self) -> usize {
        match self {
            Probe::D3d11(p) => p.live_objects(),
            Probe::Gl(p) => p.live_objects(),
        }
    }

    pub fn back_buffer_texel(&self, x: u32, y: u32) -> Vec<u8> {
        match self {
            Probe::D3d11(p) => p.back_buffer_texel(x, y),
            Probe::Gl(p) => p.back_buffer_texel(x, y),
        }
    }

    pub fn clear_calls(&self) {
        match self {
            Probe::D3d11(p) => p.clear_calls(),
            Probe::Gl(p) => p.clear_calls(),
        }
    }
}

pub fn d3d11() -> (Context, NullD3d11Probe) {
    init_logging();
    Context::null_d3d11(NullD3d11Config::default())
}

pub fn gl() -> (Context, NullGlProbe) {
    init_logging();
    Context::null_gl(NullGlConfig::default())
}

/// Runs `test` once against every backend.
pub fn each_backend(mut test: impl FnMut(&mut Context, &Probe)) {
    let (mut ctx, probe) = d3d11();
    let probe = Probe::D3d11(probe);
    log::info!("running against {}", ctx.backend_name());
    test(&mut ctx, &probe);
    ctx.destroy();

    let (mut ctx, probe) = gl();
    let probe = Probe::Gl(probe);
    log::info!("running against {}", ctx.backend_name());
    test(&mut ctx, &probe);
    ctx.destroy();
}

pub fn solid_pipeline(ctx: &mut Context, blend: ColorBlendState) -> Pipeline {
    ctx.make_pipeline(&PipelineDesc {
        shaders: &SHADERS,
        render_targets: fill![..=> blend; MAX_RENDER_TARGETS],
        ..Default::default()
    })
}

/// Uniform buffer whose first constant is the colour the test pipelines output.
pub fn color_buffer(ctx: &mut Context, color: [f32; 4]) -> Buffer {
    let buffer = ctx.make_buffer(&BufferDesc {
        size: 16,
        binding_flags: BindingFlags::UNIFORM_BUFFER,
        usage: Usage::Dynamic,
        ..Default::default()
    });
    ctx.update_buffer(&buffer, bytemuck::cast_slice(&color));
    buffer
}

pub fn bind_color(ctx: &mut Context, buffer: Buffer) {
    ctx.set_uniform_buffers(&[Some(UniformBufferBinding {
        buffer,
        offset: 0,
        size: 0,
    })]);
}

pub fn target_texture(ctx: &mut Context, format: Format) -> Texture {
    ctx.make_texture(&TextureDesc {
        width: WIDTH,
        height: HEIGHT,
        depth: 1,
        format,
        usage: Usage::GpuReadWrite,
        binding_flags: BindingFlags::RENDER_TARGET | BindingFlags::SHADER_RESOURCE,
        ..Default::default()
    })
}

/// Copies `texture` into a staging texture and returns its texels.
pub fn read_back(ctx: &mut Context, texture: &Texture) -> Vec<u8> {
    let mut staging = ctx.make_texture(&TextureDesc {
        width: texture.width,
        height: texture.height,
        depth: 1,
        format: texture.format,
        usage: Usage::Staging,
        ..Default::default()
    });
    ctx.copy_texture_2d(
        texture,
        &staging,
        &CopyRegion {
            width: texture.width,
            height: texture.height,
            ..Default::default()
        },
    );

    let data = {
        let mapped = ctx.map_texture(&staging, 0, MapKind::Read);
        assert_eq!(mapped.row_pitch, texture.format.row_pitch(texture.width));
        mapped.data.to_vec()
    };
    ctx.unmap_texture(&staging, 0);
    ctx.free_texture(&mut staging);
    data
}

/// Sets `RHAL_DEBUG` for the lifetime of the guard and restores the old value on drop.
pub struct DebugEnv {
    original: Option<String>,
}

impl DebugEnv {
    pub fn set(value: &str) -> Self {
        let original = std::env::var(DEBUG_ENV).ok();
        std::env::set_var(DEBUG_ENV, value);
        Self { original }
    }
}

impl Drop for DebugEnv {
    fn drop(&mut self) {
        match &self.original {
            Some(value) => std::env::set_var(DEBUG_ENV, value),
            None => std::env::remove_var(DEBUG_ENV),
        }
    }
}
