mod common;

use common::{
    bind_color, color_buffer, d3d11, each_backend, gl, read_back, solid_pipeline, target_texture,
    HEIGHT, WIDTH,
};
use rhal::null::{D3d11Call, GlCall};
use rhal::*;

fn clear_color(ctx: &mut Context, color: [f32; 4]) {
    ctx.clear(&ClearDesc {
        color,
        depth: 1.0,
        stencil: 0,
        flag_color: true,
        flag_depth: false,
        flag_stencil: false,
    });
}

fn triangle() -> Draw {
    Draw {
        vertex_count: 3,
        ..Default::default()
    }
}

#[test]
fn cleared_target_reads_back_opaque_black() {
    each_backend(|ctx, _probe| {
        let mut texture = target_texture(ctx, Format::U8x4Norm);
        let mut target = ctx.make_render_target(&RenderTargetDesc {
            color_textures: fill![Some(&texture) => None; MAX_RENDER_TARGETS],
            depth_stencil: None,
        });
        ctx.set_render_target(Some(&target));
        clear_color(ctx, [0.0, 0.0, 0.0, 1.0]);

        let texels = read_back(ctx, &texture);
        assert_eq!(texels.len(), (WIDTH * HEIGHT * 4) as usize);
        assert!(texels.chunks(4).all(|t| t == [0, 0, 0, 255]));

        ctx.set_render_target(None);
        ctx.free_render_target(&mut target);
        ctx.free_texture(&mut texture);
    });
}

#[test]
fn back_buffer_clear() {
    each_backend(|ctx, probe| {
        ctx.set_render_target(None);
        clear_color(ctx, [1.0, 0.5, 0.0, 1.0]);
        assert_eq!(probe.back_buffer_texel(0, 0), [255, 128, 0, 255]);
        assert_eq!(probe.back_buffer_texel(WIDTH - 1, HEIGHT - 1), [255, 128, 0, 255]);
    });
}

#[test]
fn alpha_blend_mixes_with_the_previous_draw() {
    each_backend(|ctx, probe| {
        ctx.set_render_target(None);
        ctx.set_viewports(&[Viewport::new(0.0, 0.0, WIDTH as f32, HEIGHT as f32)]);
        clear_color(ctx, [0.0, 0.0, 0.0, 0.0]);

        let opaque = solid_pipeline(ctx, ColorBlendState::default());
        let blended = solid_pipeline(ctx, ColorBlendState::alpha_blend());
        let color = color_buffer(ctx, [0.0, 0.0, 1.0, 0.5]);
        bind_color(ctx, color);

        ctx.set_pipeline(&opaque);
        ctx.draw(&triangle());
        assert_eq!(probe.back_buffer_texel(10, 10), [0, 0, 255, 128]);

        ctx.update_buffer(&color, bytemuck::cast_slice(&[1.0f32, 0.0, 0.0, 0.5]));
        ctx.set_pipeline(&blended);
        ctx.draw(&triangle());
        assert_eq!(probe.back_buffer_texel(10, 10), [128, 0, 128, 128]);
    });
}

#[test]
fn draws_stay_inside_the_viewport() {
    each_backend(|ctx, _probe| {
        let texture = target_texture(ctx, Format::U8x4Norm);
        let target = ctx.make_render_target(&RenderTargetDesc {
            color_textures: fill![Some(&texture) => None; MAX_RENDER_TARGETS],
            depth_stencil: None,
        });
        ctx.set_render_target(Some(&target));
        clear_color(ctx, [0.0, 0.0, 0.0, 1.0]);

        let pipeline = solid_pipeline(ctx, ColorBlendState::default());
        let color = color_buffer(ctx, [0.0, 1.0, 0.0, 1.0]);
        bind_color(ctx, color);
        ctx.set_pipeline(&pipeline);
        ctx.set_viewports(&[Viewport::new(0.0, 0.0, (WIDTH / 2) as f32, HEIGHT as f32)]);
        ctx.draw(&triangle());

        let texels = read_back(ctx, &texture);
        let row = (WIDTH * 4) as usize;
        let mid = row * (HEIGHT as usize / 2);
        assert_eq!(texels[mid..mid + 4], [0, 255, 0, 255]);
        assert_eq!(texels[mid + row - 4..mid + row], [0, 0, 0, 255]);
        ctx.set_render_target(None);
    });
}

#[test]
fn binding_state_tracks_the_last_calls() {
    each_backend(|ctx, _probe| {
        let pipeline = solid_pipeline(ctx, ColorBlendState::default());
        ctx.set_pipeline(&pipeline);
        ctx.set_viewports(&[
            Viewport::new(0.0, 0.0, 64.0, 64.0),
            Viewport::new(64.0, 0.0, 64.0, 64.0),
        ]);
        ctx.set_primitive_type(PrimitiveType::LineList);

        let state = ctx.binding_state();
        assert_eq!(state.pipeline, Some(pipeline));
        assert_eq!(state.primitive, PrimitiveType::LineList);
        assert_eq!(state.viewports.len(), 2);
        assert!(state.render_target.is_none());
    });
}

fn clear_everything(ctx: &mut Context) {
    ctx.clear(&ClearDesc {
        color: [0.0, 0.0, 1.0, 1.0],
        depth: 0.5,
        stencil: 3,
        flag_color: true,
        flag_depth: true,
        flag_stencil: true,
    });
}

/// Colour target plus, when `with_depth`, a D24S8 attachment.
fn render_target(ctx: &mut Context, with_depth: bool) -> (RenderTarget, Texture, Option<Texture>) {
    let color = target_texture(ctx, Format::U8x4Norm);
    let depth = with_depth.then(|| {
        ctx.make_texture(&TextureDesc {
            width: WIDTH,
            height: HEIGHT,
            depth: 1,
            format: Format::D24S8,
            usage: Usage::GpuReadWrite,
            binding_flags: BindingFlags::DEPTH_STENCIL,
            ..Default::default()
        })
    });
    let target = ctx.make_render_target(&RenderTargetDesc {
        color_textures: fill![Some(&color) => None; MAX_RENDER_TARGETS],
        depth_stencil: depth.as_ref(),
    });
    (target, color, depth)
}

#[test]
fn d3d11_depth_clear_reaches_the_attachment() {
    let (mut ctx, probe) = d3d11();
    let (target, _color, _depth) = render_target(&mut ctx, true);
    ctx.set_render_target(Some(&target));
    probe.clear_calls();

    clear_everything(&mut ctx);
    assert_eq!(
        probe.calls(),
        vec![
            D3d11Call::ClearRenderTargetView,
            D3d11Call::ClearDepthStencilView
        ]
    );
}

#[test]
fn d3d11_depth_clear_skips_colour_only_targets() {
    let (mut ctx, probe) = d3d11();
    let (target, color, _) = render_target(&mut ctx, false);
    ctx.set_render_target(Some(&target));
    probe.clear_calls();

    clear_everything(&mut ctx);
    assert_eq!(probe.calls(), vec![D3d11Call::ClearRenderTargetView]);
    assert!(read_back(&mut ctx, &color)
        .chunks(4)
        .all(|t| t == [0, 0, 255, 255]));
}

#[test]
fn gl_depth_clear_reaches_the_attachment() {
    let (mut ctx, probe) = gl();
    let (target, _color, _depth) = render_target(&mut ctx, true);
    ctx.set_render_target(Some(&target));
    probe.clear_calls();

    clear_everything(&mut ctx);
    assert!(probe.calls().contains(&GlCall::Clear(
        glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT | glow::STENCIL_BUFFER_BIT
    )));
}

#[test]
fn gl_depth_clear_skips_colour_only_targets() {
    let (mut ctx, probe) = gl();
    let (target, color, _) = render_target(&mut ctx, false);
    ctx.set_render_target(Some(&target));
    probe.clear_calls();

    clear_everything(&mut ctx);
    let clears: Vec<GlCall> = probe
        .calls()
        .into_iter()
        .filter(|c| matches!(c, GlCall::Clear(_)))
        .collect();
    assert_eq!(clears, [GlCall::Clear(glow::COLOR_BUFFER_BIT)]);
    assert!(read_back(&mut ctx, &color)
        .chunks(4)
        .all(|t| t == [0, 0, 255, 255]));
}
