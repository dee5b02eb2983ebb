mod common;

use common::{d3d11, gl, DebugEnv};
use rhal::d3d11::HResult;
use rhal::null::{D3d11Call, NullD3d11Config, NullGlConfig};
use rhal::*;
use serial_test::serial;

#[test]
fn fresh_contexts_are_not_lost() {
    let (ctx, _probe) = d3d11();
    assert!(!ctx.is_device_lost());
    let (ctx, _probe) = gl();
    assert!(!ctx.is_device_lost());
}

#[test]
fn removal_during_present_is_sticky() {
    let (mut ctx, probe) = d3d11();
    ctx.present();
    assert!(!ctx.is_device_lost());

    probe.fail_next(HResult::DEVICE_REMOVED);
    ctx.present();
    assert!(ctx.is_device_lost());

    // Creation keeps working on a lost device, it just yields empty natives.
    let texture = ctx.make_texture(&TextureDesc {
        width: 4,
        height: 4,
        depth: 1,
        format: Format::U8x4Norm,
        usage: Usage::GpuReadWrite,
        binding_flags: BindingFlags::SHADER_RESOURCE,
        ..Default::default()
    });
    assert!(!texture.is_empty());
    ctx.present();
    ctx.resize_buffers();
    assert!(ctx.is_device_lost());
}

#[test]
fn reset_during_creation_is_loss() {
    let (mut ctx, probe) = d3d11();
    probe.fail_next(HResult::DEVICE_RESET);
    let _ = ctx.make_buffer(&BufferDesc {
        size: 64,
        binding_flags: BindingFlags::VERTEX_BUFFER,
        usage: Usage::Dynamic,
        ..Default::default()
    });
    assert!(ctx.is_device_lost());
}

#[test]
fn ordinary_failures_are_not_loss() {
    let (mut ctx, probe) = d3d11();
    probe.fail_next(HResult::E_INVALIDARG);
    ctx.present();
    assert!(!ctx.is_device_lost());
}

#[test]
fn present_honours_vsync() {
    let (mut ctx, probe) = d3d11();
    probe.clear_calls();
    ctx.present();
    assert_eq!(probe.calls(), vec![D3d11Call::Present(0)]);

    let (device, probe) = rhal::null::NullD3d11::new(NullD3d11Config::default());
    let mut ctx = Context::from_d3d11_device(Box::new(device), &ContextDesc::default());
    ctx.present();
    assert_eq!(probe.calls().last(), Some(&D3d11Call::Present(1)));
}

#[test]
#[serial]
fn debug_flag_comes_from_the_environment() {
    {
        let _env = DebugEnv::set("1");
        assert!(ContextDesc::default().debug);
    }
    {
        let _env = DebugEnv::set("0");
        assert!(!ContextDesc::default().debug);
    }
}

#[test]
#[serial]
fn gl_without_debug_leaves_native_errors_queued() {
    let _env = DebugEnv::set("0");
    let (gl, probe) = rhal::null::NullGl::new(NullGlConfig::default());
    let mut ctx = Context::from_gl_api(Box::new(gl), &ContextDesc::default());
    probe.raise_error(glow::INVALID_VALUE);
    ctx.present();
    assert_eq!(probe.pending_errors(), 1);
    assert!(!ctx.is_device_lost());
}
