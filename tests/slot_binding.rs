mod common;

use common::{bind_color, color_buffer, d3d11, gl, solid_pipeline};
use rhal::d3d11::native::Stage;
use rhal::null::{D3d11Call, GlCall};
use rhal::*;

const SCRAMBLED_FRAGMENT: &[u8] = b"#version 430
uniform type_UniformBuffer3 { vec4 tint; };
uniform sampler2D uTexture2;
uniform type_UniformBuffer0 { vec4 color; };
uniform sampler2D uTexture0;
out vec4 oColor;
void main() { oColor = color * tint * texture(uTexture0, vec2(0.5)) + texture(uTexture2, vec2(0.5)); }
";

fn sampled_texture(ctx: &mut Context) -> Texture {
    ctx.make_texture(&TextureDesc {
        width: 4,
        height: 4,
        depth: 1,
        format: Format::U8x4Norm,
        usage: Usage::GpuReadWrite,
        binding_flags: BindingFlags::SHADER_RESOURCE,
        ..Default::default()
    })
}

#[test]
fn gl_blocks_and_samplers_bind_by_name() {
    let (mut ctx, probe) = gl();
    let shaders = [ShaderBinary {
        tier: ShaderTier::Glsl,
        vertex: common::GLSL_VERTEX,
        fragment: SCRAMBLED_FRAGMENT,
    }];
    let pipeline = ctx.make_pipeline(&PipelineDesc {
        shaders: &shaders,
        ..Default::default()
    });
    probe.clear_calls();
    ctx.set_pipeline(&pipeline);

    let calls = probe.calls();
    let blocks: Vec<&GlCall> = calls
        .iter()
        .filter(|c| matches!(c, GlCall::UniformBlockBinding { .. }))
        .collect();
    assert_eq!(
        blocks,
        [
            &GlCall::UniformBlockBinding { index: 1, binding: 0 },
            &GlCall::UniformBlockBinding { index: 0, binding: 3 },
        ]
    );
    let units: Vec<i32> = calls
        .iter()
        .filter_map(|c| match c {
            GlCall::Uniform1i { value, .. } => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(units, [0, 2]);
}

#[test]
fn gl_slots_are_resolved_again_per_program() {
    let (mut ctx, probe) = gl();
    let plain = solid_pipeline(&mut ctx, ColorBlendState::default());
    let shaders = [ShaderBinary {
        tier: ShaderTier::Glsl,
        vertex: common::GLSL_VERTEX,
        fragment: SCRAMBLED_FRAGMENT,
    }];
    let scrambled = ctx.make_pipeline(&PipelineDesc {
        shaders: &shaders,
        ..Default::default()
    });

    ctx.set_pipeline(&plain);
    ctx.set_pipeline(&scrambled);
    probe.clear_calls();
    ctx.set_pipeline(&plain);
    assert!(probe
        .calls()
        .contains(&GlCall::UniformBlockBinding { index: 0, binding: 0 }));
}

#[test]
fn gl_uniform_slot_reaches_the_fragment_colour() {
    let (mut ctx, probe) = gl();
    let pipeline = solid_pipeline(&mut ctx, ColorBlendState::default());
    let color = color_buffer(&mut ctx, [0.0, 1.0, 0.0, 1.0]);
    ctx.set_render_target(None);
    ctx.set_pipeline(&pipeline);
    bind_color(&mut ctx, color);
    ctx.draw(&Draw {
        vertex_count: 3,
        ..Default::default()
    });
    assert_eq!(probe.back_buffer_texel(5, 5), [0, 255, 0, 255]);
}

#[test]
fn d3d11_uniform_slots_cover_both_stages() {
    let (mut ctx, probe) = d3d11();
    let buffer = ctx.make_buffer(&BufferDesc {
        size: 1024,
        binding_flags: BindingFlags::UNIFORM_BUFFER,
        usage: Usage::Dynamic,
        ..Default::default()
    });
    probe.clear_calls();

    ctx.set_uniform_buffers(&[
        Some(UniformBufferBinding {
            buffer,
            offset: 256,
            size: 64,
        }),
        None,
        Some(UniformBufferBinding {
            buffer,
            offset: 0,
            size: 0,
        }),
    ]);
    let expected = |stage: Stage| D3d11Call::SetConstantBuffers {
        stage,
        first_constant: vec![16, 0, 0],
        num_constants: vec![4, 0, 4096],
    };
    assert_eq!(probe.calls(), vec![expected(Stage::Vertex), expected(Stage::Pixel)]);
    assert_eq!(
        ctx.binding_state().uniform_buffers[0].map(|b| b.offset),
        Some(256)
    );
}

#[test]
fn d3d11_resource_views_and_samplers_bind_per_stage() {
    let (mut ctx, probe) = d3d11();
    let texture = sampled_texture(&mut ctx);
    let sampler = ctx.make_sampler(&SamplerDesc::default());
    probe.clear_calls();

    ctx.set_resource_views(&[Some(ResourceView::Texture(texture)), None]);
    ctx.set_samplers(&[Some(sampler)]);
    let calls = probe.calls();
    assert!(calls.contains(&D3d11Call::SetShaderResources {
        stage: Stage::Pixel,
        count: 2
    }));
    assert!(calls.contains(&D3d11Call::SetSamplers {
        stage: Stage::Pixel,
        count: 1
    }));
}

#[test]
#[should_panic(expected = "not a multiple of 256 bytes")]
fn d3d11_misaligned_uniform_offset_panics() {
    let (mut ctx, _probe) = d3d11();
    let buffer = ctx.make_buffer(&BufferDesc {
        size: 512,
        binding_flags: BindingFlags::UNIFORM_BUFFER,
        usage: Usage::Dynamic,
        ..Default::default()
    });
    ctx.set_uniform_buffers(&[Some(UniformBufferBinding {
        buffer,
        offset: 128,
        size: 16,
    })]);
}

#[test]
#[should_panic(expected = "uniform buffers requested")]
fn d3d11_too_many_uniform_slots_panics() {
    let (mut ctx, _probe) = d3d11();
    ctx.set_uniform_buffers(&[None; MAX_UNIFORM_BUFFERS]);
}

#[test]
#[should_panic(expected = "resource views requested, the device samples 8 textures")]
fn d3d11_resource_views_respect_the_sampling_limit() {
    let (mut ctx, _probe) = d3d11();
    assert_eq!(ctx.info().max_textures_per_draw, 8);
    ctx.set_resource_views(&[None; 9]);
}
