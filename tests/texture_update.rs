mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};

use common::{d3d11, each_backend, gl, read_back, target_texture};
use rhal::*;

/// Formats with a fixed size per texel.
fn texel_formats(ctx: &Context) -> Vec<Format> {
    ctx.info()
        .texture_formats
        .iter()
        .filter(|f| !f.is_compressed() && !f.is_depth())
        .collect()
}

fn sampled(ctx: &mut Context, format: Format) -> Texture {
    ctx.make_texture(&TextureDesc {
        width: 8,
        height: 4,
        depth: 1,
        format,
        usage: Usage::GpuReadWrite,
        binding_flags: BindingFlags::SHADER_RESOURCE,
        ..Default::default()
    })
}

fn upload_target(ctx: &mut Context) -> Texture {
    ctx.make_texture(&TextureDesc {
        width: 8,
        height: 4,
        depth: 1,
        format: Format::U8x4Norm,
        usage: Usage::GpuReadWrite,
        binding_flags: BindingFlags::SHADER_RESOURCE,
        ..Default::default()
    })
}

#[test]
fn exact_slice_size_updates_the_texture() {
    each_backend(|ctx, _probe| {
        let mut texture = upload_target(ctx);
        let texels: Vec<u8> = (0..8 * 4 * 4).map(|i| i as u8).collect();
        ctx.update_texture(&texture, 0, &texels);
        assert_eq!(read_back(ctx, &texture), texels);
        ctx.free_texture(&mut texture);
    });
}

#[test]
fn compressed_updates_count_blocks() {
    each_backend(|ctx, _probe| {
        if !ctx.info().texture_formats.contains(Format::BC1) {
            return;
        }
        let mut texture = ctx.make_texture(&TextureDesc {
            width: 8,
            height: 8,
            depth: 1,
            format: Format::BC1,
            usage: Usage::GpuReadWrite,
            binding_flags: BindingFlags::SHADER_RESOURCE,
            ..Default::default()
        });
        // Four 4x4 blocks of eight bytes.
        ctx.update_texture(&texture, 0, &[0xAB; 32]);
        ctx.free_texture(&mut texture);
    });
}

#[test]
#[should_panic(expected = "texture update size mismatch")]
fn short_update_panics_on_d3d11() {
    let (mut ctx, _probe) = d3d11();
    let texture = upload_target(&mut ctx);
    ctx.update_texture(&texture, 0, &[0; 8 * 4 * 4 - 1]);
}

#[test]
#[should_panic(expected = "texture update size mismatch")]
fn long_update_panics_on_gl() {
    let (mut ctx, _probe) = gl();
    let texture = upload_target(&mut ctx);
    ctx.update_texture(&texture, 0, &[0; 8 * 4 * 4 + 4]);
}

#[test]
#[should_panic(expected = "texture update size mismatch")]
fn row_sized_update_panics() {
    let (mut ctx, _probe) = gl();
    let texture = target_texture(&mut ctx, Format::U8x4Norm);
    ctx.update_texture(&texture, 0, &[0; 256 * 4]);
}

#[test]
fn every_texel_format_accepts_an_exact_update() {
    each_backend(|ctx, _probe| {
        let formats = texel_formats(ctx);
        assert!(formats.len() > 1);
        for format in formats {
            let mut texture = sampled(ctx, format);
            let size = format.slice_size(8, 4) as usize;
            let texels: Vec<u8> = (0..size).map(|i| (i * 7) as u8).collect();
            ctx.update_texture(&texture, 0, &texels);
            assert_eq!(read_back(ctx, &texture), texels, "{format:?}");
            ctx.free_texture(&mut texture);
        }
    });
}

#[test]
fn every_texel_format_rejects_a_wrong_size() {
    each_backend(|ctx, _probe| {
        for format in texel_formats(ctx) {
            let mut texture = sampled(ctx, format);
            let size = format.slice_size(8, 4) as usize;
            for len in [size - 1, size + format.slice_size(1, 1) as usize] {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    ctx.update_texture(&texture, 0, &vec![0; len]);
                }));
                let message = match result {
                    Ok(()) => panic!("{format:?} accepted {len} bytes"),
                    Err(payload) => payload
                        .downcast_ref::<String>()
                        .cloned()
                        .unwrap_or_default(),
                };
                assert!(
                    message.contains("texture update size mismatch"),
                    "{format:?}: {message}"
                );
            }
            ctx.free_texture(&mut texture);
        }
    });
}
