mod common;

use common::{d3d11, each_backend, solid_pipeline, target_texture, COMPUTE_SHADERS, HEIGHT, WIDTH};
use rhal::d3d11::native::DxgiFormat;
use rhal::*;

#[test]
fn free_restores_native_object_count() {
    each_backend(|ctx, probe| {
        let before = probe.live_objects();

        let mut texture = target_texture(ctx, Format::U8x4Norm);
        let mut depth = ctx.make_texture(&TextureDesc {
            width: WIDTH,
            height: HEIGHT,
            depth: 1,
            format: Format::D24S8,
            usage: Usage::GpuReadWrite,
            binding_flags: BindingFlags::DEPTH_STENCIL,
            ..Default::default()
        });
        let mut target = ctx.make_render_target(&RenderTargetDesc {
            color_textures: fill![Some(&texture) => None; MAX_RENDER_TARGETS],
            depth_stencil: Some(&depth),
        });
        let mut buffer = ctx.make_buffer(&BufferDesc {
            size: 1024,
            binding_flags: BindingFlags::SHADER_RESOURCE | BindingFlags::UNORDERED_ACCESS,
            usage: Usage::GpuReadWrite,
            struct_size: 16,
            ..Default::default()
        });
        let mut pipeline = solid_pipeline(ctx, ColorBlendState::default());
        let mut compute = ctx.make_compute_pipeline(&ComputePipelineDesc {
            shaders: &COMPUTE_SHADERS,
        });
        let mut sampler = ctx.make_sampler(&SamplerDesc {
            filtering: TextureFiltering::Anisotropic,
            anisotropy: 8,
        });
        assert!(probe.live_objects() > before);

        ctx.free_sampler(&mut sampler);
        ctx.free_compute_pipeline(&mut compute);
        ctx.free_pipeline(&mut pipeline);
        ctx.free_buffer(&mut buffer);
        ctx.free_render_target(&mut target);
        ctx.free_texture(&mut depth);
        ctx.free_texture(&mut texture);
        assert_eq!(probe.live_objects(), before);

        assert!(texture.is_empty());
        assert!(target.is_empty());
        assert!(pipeline.is_empty());
    });
}

#[test]
fn double_free_is_harmless() {
    each_backend(|ctx, probe| {
        let before = probe.live_objects();
        let mut texture = target_texture(ctx, Format::U8x4Norm);
        let mut buffer = ctx.make_buffer(&BufferDesc {
            size: 64,
            binding_flags: BindingFlags::VERTEX_BUFFER,
            usage: Usage::Dynamic,
            ..Default::default()
        });

        ctx.free_texture(&mut texture);
        ctx.free_texture(&mut texture);
        ctx.free_buffer(&mut buffer);
        ctx.free_buffer(&mut buffer);
        assert_eq!(probe.live_objects(), before);

        let mut never_made = Texture::default();
        ctx.free_texture(&mut never_made);
        assert_eq!(probe.live_objects(), before);
    });
}

#[test]
fn every_render_target_format_can_be_rendered_to() {
    each_backend(|ctx, probe| {
        let before = probe.live_objects();
        let formats: Vec<Format> = ctx.info().render_target_formats.iter().collect();
        assert!(!formats.is_empty());

        for format in formats {
            let depth = format.is_depth();
            let mut texture = ctx.make_texture(&TextureDesc {
                width: 64,
                height: 64,
                depth: 1,
                format,
                usage: Usage::GpuReadWrite,
                binding_flags: if depth {
                    BindingFlags::DEPTH_STENCIL
                } else {
                    BindingFlags::RENDER_TARGET
                },
                ..Default::default()
            });
            assert!(!texture.is_empty(), "{format:?}");

            let desc = if depth {
                RenderTargetDesc {
                    depth_stencil: Some(&texture),
                    ..Default::default()
                }
            } else {
                RenderTargetDesc {
                    color_textures: fill![Some(&texture) => None; MAX_RENDER_TARGETS],
                    depth_stencil: None,
                }
            };
            let mut target = ctx.make_render_target(&desc);
            assert_eq!(target.has_depth_stencil, depth, "{format:?}");

            ctx.free_render_target(&mut target);
            ctx.free_texture(&mut texture);
        }
        assert_eq!(probe.live_objects(), before);
    });
}

#[test]
fn texture_arrays_take_initial_data_per_slice() {
    each_backend(|ctx, _probe| {
        let slice = Format::U8x4Norm.slice_size(4, 4) as usize;
        let data: Vec<u8> = (0..3 * slice).map(|i| (i / slice) as u8 * 100).collect();
        let mut texture = ctx.make_texture(&TextureDesc {
            width: 4,
            height: 4,
            depth: 3,
            format: Format::U8x4Norm,
            usage: Usage::Staging,
            initial_data: Some(&data),
            ..Default::default()
        });
        assert_eq!(texture.depth, 3);

        for i in 0..3 {
            let texels = ctx.map_texture(&texture, i, MapKind::Read).data.to_vec();
            ctx.unmap_texture(&texture, i);
            assert!(texels.iter().all(|b| *b == i as u8 * 100), "slice {i}");
        }
        ctx.free_texture(&mut texture);
    });
}

#[test]
fn buffer_copy_lands_at_the_destination_offset() {
    each_backend(|ctx, _probe| {
        let source: Vec<u8> = (0..64).collect();
        let mut src = ctx.make_buffer(&BufferDesc {
            size: 64,
            binding_flags: BindingFlags::VERTEX_BUFFER,
            usage: Usage::Immutable,
            initial_data: Some(&source),
            ..Default::default()
        });
        let mut dst = ctx.make_buffer(&BufferDesc {
            size: 64,
            usage: Usage::Staging,
            initial_data: Some(&[0xff; 64]),
            ..Default::default()
        });

        ctx.copy_buffer(&src, 16, &dst, 32, 8);
        let bytes = ctx.map_buffer(&dst, MapKind::Read).data.to_vec();
        ctx.unmap_buffer(&dst, 0, 0);

        assert_eq!(bytes[32..40], source[16..24]);
        assert!(bytes[..32].iter().chain(&bytes[40..]).all(|b| *b == 0xff));

        ctx.free_buffer(&mut dst);
        ctx.free_buffer(&mut src);
    });
}

#[test]
fn d3d11_sampled_depth_uses_typeless_storage() {
    let (mut ctx, probe) = d3d11();
    for (format, storage, shader_view, depth_view) in [
        (
            Format::D16,
            DxgiFormat::R16_TYPELESS,
            DxgiFormat::R16_UNORM,
            DxgiFormat::D16_UNORM,
        ),
        (
            Format::D24S8,
            DxgiFormat::R24G8_TYPELESS,
            DxgiFormat::R24_UNORM_X8_TYPELESS,
            DxgiFormat::D24_UNORM_S8_UINT,
        ),
    ] {
        let mut depth = ctx.make_texture(&TextureDesc {
            width: 64,
            height: 64,
            depth: 1,
            format,
            usage: Usage::GpuReadWrite,
            binding_flags: BindingFlags::DEPTH_STENCIL | BindingFlags::SHADER_RESOURCE,
            ..Default::default()
        });
        let mut target = ctx.make_render_target(&RenderTargetDesc {
            depth_stencil: Some(&depth),
            ..Default::default()
        });

        let TextureRaw::D3d11(texture) = depth.raw else {
            panic!("{format:?} is not a Direct3D 11 texture");
        };
        let RenderTargetRaw::D3d11(views) = target.raw else {
            panic!("not a Direct3D 11 render target");
        };
        let native = |object| probe.native_format(object?);
        assert_eq!(native(texture.texture), Some(storage), "{format:?}");
        assert_eq!(native(texture.srv), Some(shader_view), "{format:?}");
        assert_eq!(native(views.dsv), Some(depth_view), "{format:?}");

        ctx.free_render_target(&mut target);
        ctx.free_texture(&mut depth);
    }
}

#[test]
fn depth_stencil_textures_are_made_on_every_backend() {
    each_backend(|ctx, _probe| {
        for format in [Format::D16, Format::D24S8] {
            let mut depth = ctx.make_texture(&TextureDesc {
                width: 32,
                height: 32,
                depth: 1,
                format,
                usage: Usage::GpuReadWrite,
                binding_flags: BindingFlags::DEPTH_STENCIL,
                ..Default::default()
            });
            assert!(!depth.is_empty(), "{format:?}");
            ctx.free_texture(&mut depth);
        }
    });
}

#[test]
#[should_panic(expected = "is not a depth-stencil format")]
fn colour_formats_cannot_be_depth_stencil() {
    let (mut ctx, _probe) = d3d11();
    ctx.make_texture(&TextureDesc {
        width: 32,
        height: 32,
        depth: 1,
        format: Format::U8x4Norm,
        usage: Usage::GpuReadWrite,
        binding_flags: BindingFlags::DEPTH_STENCIL,
        ..Default::default()
    });
}

#[test]
fn partial_buffer_update_leaves_the_tail_alone() {
    each_backend(|ctx, _probe| {
        let mut buffer = ctx.make_buffer(&BufferDesc {
            size: 1024,
            binding_flags: BindingFlags::VERTEX_BUFFER,
            usage: Usage::GpuReadWrite,
            initial_data: Some(&[0xab; 1024]),
            ..Default::default()
        });
        let mut staging = ctx.make_buffer(&BufferDesc {
            size: 1024,
            usage: Usage::Staging,
            ..Default::default()
        });

        ctx.update_buffer(&buffer, &[7; 16]);
        ctx.copy_buffer(&buffer, 0, &staging, 0, 1024);
        let bytes = ctx.map_buffer(&staging, MapKind::Read).data.to_vec();
        ctx.unmap_buffer(&staging, 0, 0);

        assert!(bytes[..16].iter().all(|b| *b == 7));
        assert!(bytes[16..].iter().all(|b| *b == 0xab));

        ctx.free_buffer(&mut staging);
        ctx.free_buffer(&mut buffer);
    });
}
