mod common;

use common::{d3d11, gl, init_logging, COMPUTE_SHADERS};
use rhal::d3d11::FeatureLevel;
use rhal::null::{D3d11Call, GlCall, NullD3d11Config, NullGlConfig};
use rhal::*;

fn output_buffer(ctx: &mut Context) -> Buffer {
    ctx.make_buffer(&BufferDesc {
        size: 4096,
        binding_flags: BindingFlags::UNORDERED_ACCESS | BindingFlags::STRUCTURED_BUFFER,
        usage: Usage::GpuReadWrite,
        struct_size: 4,
        ..Default::default()
    })
}

#[test]
fn d3d11_dispatch_reaches_the_device() {
    let (mut ctx, probe) = d3d11();
    let mut pipeline = ctx.make_compute_pipeline(&ComputePipelineDesc {
        shaders: &COMPUTE_SHADERS,
    });
    let mut output = output_buffer(&mut ctx);
    ctx.set_compute_pipeline(&pipeline);
    probe.clear_calls();

    ctx.set_compute_unordered_views(&[Some(UnorderedView::Buffer(output))]);
    ctx.dispatch(&Dispatch { x: 16, y: 4, z: 1 });
    assert_eq!(
        probe.calls(),
        vec![
            D3d11Call::SetUnorderedAccessViews(1),
            D3d11Call::Dispatch(16, 4, 1)
        ]
    );
    assert_eq!(ctx.binding_state().compute_pipeline, Some(pipeline));

    ctx.free_buffer(&mut output);
    ctx.free_compute_pipeline(&mut pipeline);
}

#[test]
fn gl_dispatch_binds_storage_past_the_uniform_range() {
    let (mut ctx, probe) = gl();
    let pipeline = ctx.make_compute_pipeline(&ComputePipelineDesc {
        shaders: &COMPUTE_SHADERS,
    });
    let output = output_buffer(&mut ctx);
    ctx.set_compute_pipeline(&pipeline);
    probe.clear_calls();

    ctx.set_compute_unordered_views(&[Some(UnorderedView::Buffer(output)), None]);
    ctx.dispatch(&Dispatch { x: 2, y: 2, z: 1 });

    let calls = probe.calls();
    assert!(matches!(
        calls[0],
        GlCall::BindBufferBase {
            target: glow::SHADER_STORAGE_BUFFER,
            index: 16,
            buffer: Some(_)
        }
    ));
    assert_eq!(
        calls[1],
        GlCall::BindBufferBase {
            target: glow::SHADER_STORAGE_BUFFER,
            index: 17,
            buffer: None
        }
    );
    assert_eq!(
        calls[calls.len() - 2..],
        [
            GlCall::DispatchCompute(2, 2, 1),
            GlCall::MemoryBarrier(glow::ALL_BARRIER_BITS)
        ]
    );
}

#[test]
fn gles_3_1_has_compute() {
    init_logging();
    let (mut ctx, _probe) = Context::null_gl(NullGlConfig::embedded(3, 1));
    assert!(ctx.info().has_compute_pipeline);
    let pipeline = ctx.make_compute_pipeline(&ComputePipelineDesc {
        shaders: &COMPUTE_SHADERS,
    });
    assert!(!pipeline.is_empty());
}

#[test]
#[should_panic(expected = "compute pipelines are not supported on OpenGL ES 3.0")]
fn gles_3_0_rejects_compute_pipelines() {
    init_logging();
    let (mut ctx, _probe) = Context::null_gl(NullGlConfig::embedded(3, 0));
    ctx.make_compute_pipeline(&ComputePipelineDesc {
        shaders: &COMPUTE_SHADERS,
    });
}

#[test]
#[should_panic(expected = "compute pipelines are not supported on feature level")]
fn level_10_without_compute_option_rejects_compute() {
    init_logging();
    let (mut ctx, _probe) = Context::null_d3d11(NullD3d11Config {
        feature_level: FeatureLevel::Level10_0,
        ..Default::default()
    });
    ctx.make_compute_pipeline(&ComputePipelineDesc {
        shaders: &COMPUTE_SHADERS,
    });
}

#[test]
fn level_10_with_compute_option_picks_shader_model_4() {
    init_logging();
    let (mut ctx, _probe) = Context::null_d3d11(NullD3d11Config {
        feature_level: FeatureLevel::Level10_0,
        compute_shaders_4x: true,
        ..Default::default()
    });
    assert!(ctx.info().has_compute_pipeline);
    let shaders = [
        ComputeBinary {
            tier: ShaderTier::Hlsl40,
            code: b"DXBC cs_4_0",
        },
        COMPUTE_SHADERS[1],
    ];
    let pipeline = ctx.make_compute_pipeline(&ComputePipelineDesc { shaders: &shaders });
    assert!(!pipeline.is_empty());
}

#[test]
#[should_panic(expected = "exceeds")]
fn oversized_dispatch_panics() {
    let (mut ctx, _probe) = d3d11();
    let pipeline = ctx.make_compute_pipeline(&ComputePipelineDesc {
        shaders: &COMPUTE_SHADERS,
    });
    ctx.set_compute_pipeline(&pipeline);
    ctx.dispatch(&Dispatch {
        x: u32::MAX,
        y: 1,
        z: 1,
    });
}
