//! Explicit-binding backend on top of Direct3D 11.
//!
//! Every Set* call turns into one native bind call per slot group; blend,
//! rasterizer and depth state are baked into native state objects when the
//! pipeline is created.

pub mod capabilities;
pub mod conversions;
pub mod monitor;
pub mod native;
#[cfg(all(windows, feature = "rhal-d3d11"))]
pub mod windows_device;

use crate::state::store_slots;
use crate::{
    Backend, BindingFlags, BindingState, Buffer, BufferDesc, BufferRaw, ClearDesc, ComputePipeline,
    ComputePipelineDesc, ComputePipelineRaw, ContextInfo, CopyRegion, Dispatch, Draw, DrawIndexed,
    MapKind, MappedResource, Pipeline, PipelineDesc, PipelineRaw, PrimitiveType, RenderTarget,
    RenderTargetDesc, RenderTargetRaw, ResourceView, Sampler, SamplerDesc, SamplerRaw, Texture,
    TextureDesc, TextureRaw, UniformBufferBinding, UnorderedView, Usage, VertexInputs, Viewport,
    MAX_RENDER_TARGETS, MAX_VERTEX_BUFFERS,
};
use capabilities::{select_tier, CONSTANT_BUFFER_SLOTS};
use conversions::{sampled_depth_formats, subresource};
use monitor::DeviceLossMonitor;
pub use native::{ComRef, D3d11Device, FeatureLevel, HResult};
use native::{
    BindFlags, BlendDescNative, BufferDescNative, ClearFlags, ComparisonFunc, CpuAccess,
    DepthStencilDescNative, DxgiFormat, InputElementDesc, MappedSubresource, MiscFlags,
    NativeBox, RasterizerDescNative, RenderTargetBlendDesc, ResourceUsage, SamplerDescNative,
    Stage, SubresourceData, Texture2dDesc, TextureAddressMode, ViewDesc, ViewDimension,
    ViewportNative,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct D3d11Texture {
    pub texture: Option<ComRef>,
    pub srv: Option<ComRef>,
    pub uav: Option<ComRef>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct D3d11Buffer {
    pub buffer: Option<ComRef>,
    pub srv: Option<ComRef>,
    pub uav: Option<ComRef>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct D3d11RenderTarget {
    pub rtvs: [Option<ComRef>; MAX_RENDER_TARGETS],
    pub dsv: Option<ComRef>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct D3d11Pipeline {
    pub vs: Option<ComRef>,
    pub ps: Option<ComRef>,
    pub input_layout: Option<ComRef>,
    pub blend: Option<ComRef>,
    pub rasterizer: Option<ComRef>,
    pub depth_stencil: Option<ComRef>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct D3d11ComputePipeline {
    pub cs: Option<ComRef>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct D3d11Sampler {
    pub sampler: Option<ComRef>,
}

macro_rules! raw_of {
    ($name:ident, $bundle:ty, $raw:ident, $native:ty) => {
        fn $name(bundle: &$bundle) -> Option<&$native> {
            match &bundle.raw {
                $raw::D3d11(raw) => Some(raw),
                $raw::Empty => None,
                _ => panic!(concat!(stringify!($bundle), " was created by another backend")),
            }
        }
    };
}

raw_of!(texture_raw, Texture, TextureRaw, D3d11Texture);
raw_of!(buffer_raw, Buffer, BufferRaw, D3d11Buffer);
raw_of!(target_raw, RenderTarget, RenderTargetRaw, D3d11RenderTarget);
raw_of!(pipeline_raw, Pipeline, PipelineRaw, D3d11Pipeline);
raw_of!(compute_raw, ComputePipeline, ComputePipelineRaw, D3d11ComputePipeline);
raw_of!(sampler_raw, Sampler, SamplerRaw, D3d11Sampler);

fn cpu_access(usage: Usage) -> CpuAccess {
    match usage {
        Usage::Dynamic => CpuAccess::WRITE,
        Usage::Staging => CpuAccess::READ | CpuAccess::WRITE,
        Usage::Immutable | Usage::GpuReadWrite => CpuAccess::empty(),
    }
}

/// # Safety
/// `mapped` must come from a successful `Map` that has not been undone.
unsafe fn mapped_slice<'a>(mapped: MappedSubresource) -> MappedResource<'a> {
    let data: &'a mut [u8] = if mapped.data.is_null() || mapped.len == 0 {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(mapped.data, mapped.len)
    };
    MappedResource {
        data,
        row_pitch: mapped.row_pitch,
        depth_pitch: mapped.depth_pitch,
    }
}

fn unmapped<'a>() -> MappedResource<'a> {
    MappedResource {
        data: &mut [],
        row_pitch: 0,
        depth_pitch: 0,
    }
}

pub struct D3d11Context {
    device: Box<dyn D3d11Device>,
    info: ContextInfo,
    level: FeatureLevel,
    monitor: DeviceLossMonitor,
    state: BindingState,
    vsync: bool,
}

impl D3d11Context {
    pub fn new(mut device: Box<dyn D3d11Device>, vsync: bool) -> Self {
        let level = device.feature_level();
        let mut monitor = DeviceLossMonitor::default();
        let mut info = capabilities::probe(level, || {
            let supported = device.compute_shaders_plus_raw_and_structured_buffers();
            monitor
                .check("CheckFeatureSupport", supported)
                .unwrap_or(false)
        });
        info.driver_adapter = device.adapter_description();
        info.driver_renderer = info.driver_adapter.clone();

        log::info!(
            "Direct3D 11 context on '{}', feature level {}",
            info.driver_adapter,
            level.name()
        );

        Self {
            device,
            info,
            level,
            monitor,
            state: BindingState::default(),
            vsync,
        }
    }

    pub fn feature_level(&self) -> FeatureLevel {
        self.level
    }

    /// Native result code that marked the device as lost.
    pub fn loss_reason(&self) -> Option<HResult> {
        self.monitor.reason()
    }

    fn release(&mut self, object: Option<ComRef>) {
        if let Some(object) = object {
            self.device.release(object);
        }
    }

    fn resource_view_refs(&self, views: &[Option<ResourceView>]) -> Vec<Option<ComRef>> {
        assert!(
            views.len() <= self.info.max_textures_per_draw as usize,
            "{} resource views requested, the device samples {} textures",
            views.len(),
            self.info.max_textures_per_draw
        );
        views
            .iter()
            .map(|view| match view {
                Some(ResourceView::Buffer(b)) => buffer_raw(b).and_then(|r| r.srv),
                Some(ResourceView::Texture(t)) => texture_raw(t).and_then(|r| r.srv),
                None => None,
            })
            .collect()
    }

    fn bind_constant_buffers(&mut self, stages: &[Stage], buffers: &[Option<UniformBufferBinding>]) {
        assert!(
            buffers.len() <= self.info.max_uniform_buffers as usize,
            "{} uniform buffers requested, the device has {} slots",
            buffers.len(),
            self.info.max_uniform_buffers
        );

        let mut refs = [None; CONSTANT_BUFFER_SLOTS as usize];
        let mut first = [0u32; CONSTANT_BUFFER_SLOTS as usize];
        let mut count = [0u32; CONSTANT_BUFFER_SLOTS as usize];
        for (i, binding) in buffers.iter().enumerate() {
            let Some(binding) = binding else { continue };
            assert!(
                binding.offset % 256 == 0,
                "uniform buffer offset {} is not a multiple of 256 bytes",
                binding.offset
            );
            assert!(
                binding.size % 16 == 0,
                "uniform buffer range of {} bytes is not a whole number of constants",
                binding.size
            );
            refs[i] = buffer_raw(&binding.buffer).and_then(|r| r.buffer);
            first[i] = binding.offset / 16;
            count[i] = if binding.size == 0 { 4096 } else { binding.size / 16 };
        }

        let n = buffers.len();
        for stage in stages {
            self.device
                .set_constant_buffers(*stage, &refs[..n], &first[..n], &count[..n]);
        }
    }
}

impl Backend for D3d11Context {
    fn info(&self) -> &ContextInfo {
        &self.info
    }

    fn binding_state(&self) -> &BindingState {
        &self.state
    }

    fn resize_buffers(&mut self) {
        // The back buffer views change identity; rebinding is up to the caller.
        let result = self.device.resize_buffers();
        self.monitor.check("ResizeBuffers", result);
    }

    fn present(&mut self) {
        let result = self.device.present(u32::from(self.vsync));
        self.monitor.check("Present", result);
    }

    fn is_device_lost(&self) -> bool {
        self.monitor.is_lost()
    }

    fn make_texture(&mut self, desc: &TextureDesc<'_>) -> Texture {
        desc.validate();
        assert!(
            self.info.texture_formats.contains(desc.format),
            "{:?} textures are not supported on feature level {}",
            desc.format,
            self.level.name()
        );
        if desc.binding_flags.contains(BindingFlags::RENDER_TARGET) {
            assert!(
                self.info.render_target_formats.contains(desc.format),
                "{:?} cannot be rendered to on feature level {}",
                desc.format,
                self.level.name()
            );
        }
        if desc.binding_flags.contains(BindingFlags::DEPTH_STENCIL) {
            assert!(
                desc.format.is_depth(),
                "{:?} is not a depth-stencil format",
                desc.format
            );
        }

        let mip_levels = desc.mip_levels.resolve(desc.width, desc.height);
        let array_size = desc.depth.max(1);
        let sampled_depth = if desc.binding_flags.contains(BindingFlags::SHADER_RESOURCE) {
            sampled_depth_formats(desc.format)
        } else {
            None
        };
        let format = DxgiFormat::from(desc.format);

        let mut bind = BindFlags::empty();
        for (flag, native) in [
            (BindingFlags::SHADER_RESOURCE, BindFlags::SHADER_RESOURCE),
            (BindingFlags::UNORDERED_ACCESS, BindFlags::UNORDERED_ACCESS),
            (BindingFlags::RENDER_TARGET, BindFlags::RENDER_TARGET),
            (BindingFlags::DEPTH_STENCIL, BindFlags::DEPTH_STENCIL),
        ] {
            if desc.binding_flags.contains(flag) {
                bind |= native;
            }
        }

        let native_desc = Texture2dDesc {
            width: desc.width,
            height: desc.height,
            mip_levels: match desc.mip_levels {
                crate::MipLevels::Auto => 0,
                crate::MipLevels::Count(_) => mip_levels,
            },
            array_size,
            format: sampled_depth.map_or(format, |d| d.storage),
            usage: desc.usage.into(),
            bind,
            cpu_access: cpu_access(desc.usage),
        };

        let slice_size = desc.format.slice_size(desc.width, desc.height) as usize;
        let initial: Vec<SubresourceData<'_>> = desc
            .initial_data
            .map(|data| {
                data.chunks(slice_size)
                    .take(array_size as usize)
                    .map(|slice| SubresourceData {
                        data: slice,
                        row_pitch: desc.format.row_pitch(desc.width),
                        slice_pitch: slice_size as u32,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let created = self.device.create_texture2d(&native_desc, &initial);
        let texture = self.monitor.check("CreateTexture2D", created);

        let mut raw = D3d11Texture {
            texture,
            ..Default::default()
        };

        if let Some(resource) = texture {
            if desc.binding_flags.contains(BindingFlags::SHADER_RESOURCE) {
                let view = ViewDesc {
                    format: sampled_depth.map_or(format, |d| d.shader_view),
                    dimension: if array_size > 1 {
                        ViewDimension::Texture2dArray {
                            mip_levels: u32::MAX,
                            array_size,
                        }
                    } else {
                        ViewDimension::Texture2d { mip_levels: u32::MAX }
                    },
                };
                let created = self.device.create_shader_resource_view(resource, &view);
                raw.srv = self.monitor.check("CreateShaderResourceView", created);
            }

            if desc.binding_flags.contains(BindingFlags::UNORDERED_ACCESS) {
                let view = ViewDesc {
                    format,
                    dimension: if array_size > 1 {
                        ViewDimension::Texture2dArray {
                            mip_levels: 0,
                            array_size,
                        }
                    } else {
                        ViewDimension::Texture2d { mip_levels: 0 }
                    },
                };
                let created = self.device.create_unordered_access_view(resource, &view);
                raw.uav = self.monitor.check("CreateUnorderedAccessView", created);
            }
        }

        Texture {
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
            format: desc.format,
            mip_levels,
            raw: TextureRaw::D3d11(raw),
        }
    }

    fn make_buffer(&mut self, desc: &BufferDesc<'_>) -> Buffer {
        desc.validate();
        if desc.binding_flags.contains(BindingFlags::UNIFORM_BUFFER) {
            assert!(
                desc.size % 16 == 0,
                "uniform buffers must be a multiple of 16 bytes, got {}",
                desc.size
            );
        }
        let elements = desc.element_count();

        let mut bind = BindFlags::empty();
        for (flag, native) in [
            (BindingFlags::VERTEX_BUFFER, BindFlags::VERTEX_BUFFER),
            (BindingFlags::INDEX_BUFFER, BindFlags::INDEX_BUFFER),
            (BindingFlags::UNIFORM_BUFFER, BindFlags::CONSTANT_BUFFER),
            (BindingFlags::SHADER_RESOURCE, BindFlags::SHADER_RESOURCE),
            (BindingFlags::UNORDERED_ACCESS, BindFlags::UNORDERED_ACCESS),
        ] {
            if desc.binding_flags.contains(flag) {
                bind |= native;
            }
        }

        let mut misc = MiscFlags::empty();
        if desc.binding_flags.contains(BindingFlags::STRUCTURED_BUFFER) {
            misc |= MiscFlags::BUFFER_STRUCTURED;
        }
        if desc.binding_flags.contains(BindingFlags::INDIRECT) {
            misc |= MiscFlags::DRAWINDIRECT_ARGS;
        }

        let native_desc = BufferDescNative {
            byte_width: desc.size,
            usage: desc.usage.into(),
            bind,
            cpu_access: cpu_access(desc.usage),
            misc,
            structure_byte_stride: if misc.contains(MiscFlags::BUFFER_STRUCTURED) {
                desc.struct_size
            } else {
                0
            },
        };

        let initial = desc.initial_data.map(|d| &d[..desc.size as usize]);
        let created = self.device.create_buffer(&native_desc, initial);
        let buffer = self.monitor.check("CreateBuffer", created);

        let mut raw = D3d11Buffer {
            buffer,
            ..Default::default()
        };

        if let Some(resource) = buffer {
            let view = ViewDesc {
                format: DxgiFormat::UNKNOWN,
                dimension: ViewDimension::Buffer {
                    first_element: 0,
                    num_elements: elements,
                },
            };
            if desc.binding_flags.contains(BindingFlags::SHADER_RESOURCE) {
                let created = self.device.create_shader_resource_view(resource, &view);
                raw.srv = self.monitor.check("CreateShaderResourceView", created);
            }
            if desc.binding_flags.contains(BindingFlags::UNORDERED_ACCESS) {
                let created = self.device.create_unordered_access_view(resource, &view);
                raw.uav = self.monitor.check("CreateUnorderedAccessView", created);
            }
        }

        Buffer {
            size: desc.size,
            struct_size: desc.struct_size,
            raw: BufferRaw::D3d11(raw),
        }
    }

    fn make_render_target(&mut self, desc: &RenderTargetDesc<'_>) -> RenderTarget {
        let mut raw = D3d11RenderTarget::default();
        let mut color_count = 0;

        for (i, texture) in desc.colors().enumerate() {
            assert!(
                (i as u32) < self.info.max_render_targets,
                "render target {i} exceeds the device limit of {}",
                self.info.max_render_targets
            );
            let Some(tex) = texture_raw(texture) else {
                panic!("render target colour {i} is an empty texture");
            };
            if let Some(resource) = tex.texture {
                let created = self.device.create_render_target_view(resource);
                raw.rtvs[i] = self.monitor.check("CreateRenderTargetView", created);
            }
            color_count += 1;
        }

        if let Some(texture) = desc.depth_stencil {
            assert!(
                texture.format.is_depth(),
                "{:?} cannot be used as depth-stencil",
                texture.format
            );
            let Some(tex) = texture_raw(texture) else {
                panic!("render target depth-stencil is an empty texture");
            };
            if let Some(resource) = tex.texture {
                let created = self
                    .device
                    .create_depth_stencil_view(resource, texture.format.into());
                raw.dsv = self.monitor.check("CreateDepthStencilView", created);
            }
        }

        RenderTarget {
            color_count,
            has_depth_stencil: desc.depth_stencil.is_some(),
            raw: RenderTargetRaw::D3d11(raw),
        }
    }

    fn make_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Pipeline {
        let Some(binary) = select_tier(desc.shaders, |s| s.tier, self.level) else {
            panic!(
                "no shader binary runs on feature level {}",
                self.level.name()
            );
        };
        assert!(
            !binary.vertex.is_empty() && !binary.fragment.is_empty(),
            "{:?} pipeline is missing its vertex or fragment binary",
            binary.tier
        );
        log::debug!("pipeline uses {:?} binaries", binary.tier);

        let mut raw = D3d11Pipeline::default();

        let created = self.device.create_vertex_shader(binary.vertex);
        raw.vs = self.monitor.check("CreateVertexShader", created);
        let created = self.device.create_pixel_shader(binary.fragment);
        raw.ps = self.monitor.check("CreatePixelShader", created);

        let elements: Vec<InputElementDesc> = desc
            .attributes()
            .map(|(i, layout)| {
                assert!(
                    (layout.buffer_slot as usize) < MAX_VERTEX_BUFFERS,
                    "attribute {i} reads vertex buffer slot {}",
                    layout.buffer_slot
                );
                InputElementDesc {
                    semantic_index: i as u32,
                    format: layout.format.into(),
                    input_slot: layout.buffer_slot,
                    aligned_byte_offset: layout.offset,
                    per_instance: layout.divisor != 0,
                    instance_step_rate: layout.divisor,
                }
            })
            .collect();
        if !elements.is_empty() {
            let created = self.device.create_input_layout(&elements, binary.vertex);
            raw.input_layout = self.monitor.check("CreateInputLayout", created);
        }

        let blend = BlendDescNative {
            independent_blend_enable: desc
                .render_targets
                .iter()
                .any(|rt| *rt != desc.render_targets[0]),
            render_targets: desc.render_targets.map(|rt| RenderTargetBlendDesc {
                blend_enable: rt.enable,
                src_blend: rt.src.into(),
                dest_blend: rt.dst.into(),
                blend_op: rt.op.into(),
                src_blend_alpha: rt.src_alpha.into(),
                dest_blend_alpha: rt.dst_alpha.into(),
                blend_op_alpha: rt.op_alpha.into(),
                write_mask: 0x0F,
            }),
        };
        let created = self.device.create_blend_state(&blend);
        raw.blend = self.monitor.check("CreateBlendState", created);

        let rasterizer = RasterizerDescNative {
            fill_mode: desc.fill_mode.into(),
            cull_mode: desc.cull_mode.into(),
            front_counter_clockwise: !desc.cw_front_face,
            depth_clip_enable: true,
        };
        let created = self.device.create_rasterizer_state(&rasterizer);
        raw.rasterizer = self.monitor.check("CreateRasterizerState", created);

        let depth = DepthStencilDescNative {
            depth_enable: desc.depth_test,
            depth_write_all: true,
            depth_func: ComparisonFunc::LESS,
        };
        let created = self.device.create_depth_stencil_state(&depth);
        raw.depth_stencil = self.monitor.check("CreateDepthStencilState", created);

        Pipeline {
            raw: PipelineRaw::D3d11(raw),
        }
    }

    fn make_compute_pipeline(&mut self, desc: &ComputePipelineDesc<'_>) -> ComputePipeline {
        assert!(
            self.info.has_compute_pipeline,
            "compute pipelines are not supported on feature level {}",
            self.level.name()
        );
        let Some(binary) = select_tier(desc.shaders, |s| s.tier, self.level) else {
            panic!(
                "no compute binary runs on feature level {}",
                self.level.name()
            );
        };
        assert!(!binary.code.is_empty(), "empty {:?} compute binary", binary.tier);

        let created = self.device.create_compute_shader(binary.code);
        let cs = self.monitor.check("CreateComputeShader", created);

        ComputePipeline {
            raw: ComputePipelineRaw::D3d11(D3d11ComputePipeline { cs }),
        }
    }

    fn make_sampler(&mut self, desc: &SamplerDesc) -> Sampler {
        let native = SamplerDescNative {
            filter: desc.filtering.into(),
            address: TextureAddressMode::WRAP,
            max_anisotropy: desc.anisotropy.clamp(1, self.info.max_anisotropy.max(1)),
            comparison: ComparisonFunc::NEVER,
            min_lod: -f32::MAX,
            max_lod: f32::MAX,
        };
        let created = self.device.create_sampler_state(&native);
        let sampler = self.monitor.check("CreateSamplerState", created);

        Sampler {
            raw: SamplerRaw::D3d11(D3d11Sampler { sampler }),
        }
    }

    fn free_texture(&mut self, texture: &mut Texture) {
        if let Some(raw) = texture_raw(texture).copied() {
            self.release(raw.uav);
            self.release(raw.srv);
            self.release(raw.texture);
        }
        *texture = Texture::default();
    }

    fn free_buffer(&mut self, buffer: &mut Buffer) {
        if let Some(raw) = buffer_raw(buffer).copied() {
            self.release(raw.uav);
            self.release(raw.srv);
            self.release(raw.buffer);
        }
        *buffer = Buffer::default();
    }

    fn free_render_target(&mut self, target: &mut RenderTarget) {
        if let Some(raw) = target_raw(target).copied() {
            for rtv in raw.rtvs {
                self.release(rtv);
            }
            self.release(raw.dsv);
        }
        *target = RenderTarget::default();
    }

    fn free_pipeline(&mut self, pipeline: &mut Pipeline) {
        if let Some(raw) = pipeline_raw(pipeline).copied() {
            self.release(raw.vs);
            self.release(raw.ps);
            self.release(raw.input_layout);
            self.release(raw.blend);
            self.release(raw.rasterizer);
            self.release(raw.depth_stencil);
        }
        *pipeline = Pipeline::default();
    }

    fn free_compute_pipeline(&mut self, pipeline: &mut ComputePipeline) {
        if let Some(raw) = compute_raw(pipeline).copied() {
            self.release(raw.cs);
        }
        *pipeline = ComputePipeline::default();
    }

    fn free_sampler(&mut self, sampler: &mut Sampler) {
        if let Some(raw) = sampler_raw(sampler).copied() {
            self.release(raw.sampler);
        }
        *sampler = Sampler::default();
    }

    fn update_buffer(&mut self, buffer: &Buffer, data: &[u8]) {
        let Some(raw) = buffer_raw(buffer) else {
            panic!("update of an empty buffer");
        };
        assert!(
            data.len() as u32 <= buffer.size,
            "{} bytes do not fit a {} byte buffer",
            data.len(),
            buffer.size
        );
        let Some(native) = raw.buffer else { return };
        let Some(desc) = self.device.buffer_desc(native) else { return };
        assert!(
            desc.usage != ResourceUsage::IMMUTABLE,
            "immutable buffers cannot be updated"
        );

        if desc.usage == ResourceUsage::DYNAMIC {
            let mapped = self.device.map(native, 0, native::MapType::WRITE_DISCARD);
            if let Some(mapped) = self.monitor.check("Map", mapped) {
                // SAFETY: mapped until the unmap below.
                let target = unsafe { mapped_slice(mapped) };
                target.data[..data.len()].copy_from_slice(data);
                self.device.unmap(native, 0);
            }
        } else {
            let len = data.len() as u32;
            self.device
                .update_subresource(native, 0, Some(&NativeBox::bytes(0, len)), data, len, len);
        }
    }

    fn update_texture(&mut self, texture: &Texture, slice: u32, data: &[u8]) {
        let Some(raw) = texture_raw(texture) else {
            panic!("update of an empty texture");
        };
        assert!(
            slice < texture.depth.max(1),
            "slice {slice} out of range for a texture of depth {}",
            texture.depth
        );
        let expected = texture.format.slice_size(texture.width, texture.height);
        assert_eq!(
            data.len(),
            expected as usize,
            "texture update size mismatch for {}x{} {:?}",
            texture.width,
            texture.height,
            texture.format
        );
        let Some(native) = raw.texture else { return };
        self.device.update_subresource(
            native,
            subresource(slice, texture.mip_levels),
            None,
            data,
            texture.format.row_pitch(texture.width),
            expected,
        );
    }

    fn map_buffer(&mut self, buffer: &Buffer, kind: MapKind) -> MappedResource<'_> {
        let Some(raw) = buffer_raw(buffer) else {
            panic!("map of an empty buffer");
        };
        let Some(native) = raw.buffer else {
            return unmapped();
        };
        let mapped = self.device.map(native, 0, kind.into());
        match self.monitor.check("Map", mapped) {
            // SAFETY: valid until unmap_buffer, which needs &mut self again.
            Some(mapped) => unsafe { mapped_slice(mapped) },
            None => unmapped(),
        }
    }

    fn unmap_buffer(&mut self, buffer: &Buffer, written_offset: u32, written_size: u32) {
        assert!(
            written_offset.saturating_add(written_size) <= buffer.size,
            "written range {written_offset}+{written_size} exceeds the {} byte buffer",
            buffer.size
        );
        if let Some(native) = buffer_raw(buffer).and_then(|r| r.buffer) {
            self.device.unmap(native, 0);
        }
    }

    fn map_texture(&mut self, texture: &Texture, slice: u32, kind: MapKind) -> MappedResource<'_> {
        let Some(raw) = texture_raw(texture) else {
            panic!("map of an empty texture");
        };
        assert!(slice < texture.depth.max(1), "slice {slice} out of range");
        let Some(native) = raw.texture else {
            return unmapped();
        };
        let mapped = self
            .device
            .map(native, subresource(slice, texture.mip_levels), kind.into());
        match self.monitor.check("Map", mapped) {
            // SAFETY: valid until unmap_texture, which needs &mut self again.
            Some(mapped) => unsafe { mapped_slice(mapped) },
            None => unmapped(),
        }
    }

    fn unmap_texture(&mut self, texture: &Texture, slice: u32) {
        if let Some(native) = texture_raw(texture).and_then(|r| r.texture) {
            self.device
                .unmap(native, subresource(slice, texture.mip_levels));
        }
    }

    fn copy_buffer(&mut self, src: &Buffer, src_offset: u32, dst: &Buffer, dst_offset: u32, size: u32) {
        assert!(
            src_offset.saturating_add(size) <= src.size && dst_offset.saturating_add(size) <= dst.size,
            "buffer copy of {size} bytes out of range"
        );
        let (Some(s), Some(d)) = (
            buffer_raw(src).and_then(|r| r.buffer),
            buffer_raw(dst).and_then(|r| r.buffer),
        ) else {
            return;
        };
        self.device
            .copy_subresource_region(d, dst_offset, 0, s, &NativeBox::bytes(src_offset, size));
    }

    fn copy_texture_2d(&mut self, src: &Texture, dst: &Texture, region: &CopyRegion) {
        assert_eq!(src.format, dst.format, "texture copy between different formats");
        assert!(
            region.src_x + region.width <= src.width
                && region.src_y + region.height <= src.height
                && region.dst_x + region.width <= dst.width
                && region.dst_y + region.height <= dst.height,
            "texture copy region {region:?} out of range"
        );
        let (Some(s), Some(d)) = (
            texture_raw(src).and_then(|r| r.texture),
            texture_raw(dst).and_then(|r| r.texture),
        ) else {
            return;
        };
        let src_box = NativeBox {
            left: region.src_x,
            top: region.src_y,
            front: 0,
            right: region.src_x + region.width,
            bottom: region.src_y + region.height,
            back: 1,
        };
        self.device
            .copy_subresource_region(d, region.dst_x, region.dst_y, s, &src_box);
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.state.set_viewports(viewports);
        let native: Vec<ViewportNative> = viewports.iter().map(ViewportNative::from).collect();
        self.device.rs_set_viewports(&native);
    }

    fn set_pipeline(&mut self, pipeline: &Pipeline) {
        let Some(raw) = pipeline_raw(pipeline).copied() else {
            panic!("binding an empty pipeline");
        };
        self.device.ia_set_input_layout(raw.input_layout);
        self.device.set_shader(Stage::Vertex, raw.vs);
        self.device.set_shader(Stage::Pixel, raw.ps);
        self.device.om_set_blend_state(raw.blend);
        self.device.rs_set_state(raw.rasterizer);
        self.device.om_set_depth_stencil_state(raw.depth_stencil);
        self.state.pipeline = Some(*pipeline);
    }

    fn set_render_target(&mut self, target: Option<&RenderTarget>) {
        match target {
            Some(target) => {
                let Some(raw) = target_raw(target) else {
                    panic!("binding an empty render target");
                };
                self.device
                    .om_set_render_targets(&raw.rtvs[..target.color_count as usize], raw.dsv);
            }
            None => {
                let (rtv, dsv) = self.device.back_buffer_views();
                self.device.om_set_render_targets(&[rtv], dsv);
            }
        }
        self.state.render_target = target.copied();
    }

    fn set_vertex_inputs(&mut self, inputs: &VertexInputs) {
        let mut buffers = [None; MAX_VERTEX_BUFFERS];
        let mut strides = [0u32; MAX_VERTEX_BUFFERS];
        let mut offsets = [0u32; MAX_VERTEX_BUFFERS];
        for (i, vb) in inputs.vertex_buffers.iter().enumerate() {
            buffers[i] = vb.buffer.as_ref().and_then(buffer_raw).and_then(|r| r.buffer);
            strides[i] = vb.stride;
            offsets[i] = vb.offset;
        }
        self.device.ia_set_vertex_buffers(&buffers, &strides, &offsets);

        match &inputs.index_buffer {
            Some(ib) => {
                if crate::state::index_size(inputs.index_format) == 4 {
                    assert!(self.info.has_32bit_index, "32-bit indices are not supported");
                }
                let native = buffer_raw(ib).and_then(|r| r.buffer);
                self.device
                    .ia_set_index_buffer(native, inputs.index_format.into());
            }
            None => self.device.ia_set_index_buffer(None, DxgiFormat::UNKNOWN),
        }

        self.state.vertex_buffers = inputs.vertex_buffers;
        self.state.index_buffer = inputs.index_buffer;
        self.state.index_format = inputs.index_format;
    }

    fn set_uniform_buffers(&mut self, buffers: &[Option<UniformBufferBinding>]) {
        store_slots(&mut self.state.uniform_buffers, buffers, "uniform buffer");
        self.bind_constant_buffers(&[Stage::Vertex, Stage::Pixel], buffers);
    }

    fn set_resource_views(&mut self, views: &[Option<ResourceView>]) {
        store_slots(&mut self.state.resource_views, views, "resource view");
        let refs = self.resource_view_refs(views);
        self.device.set_shader_resources(Stage::Vertex, &refs);
        self.device.set_shader_resources(Stage::Pixel, &refs);
    }

    fn set_samplers(&mut self, samplers: &[Option<Sampler>]) {
        store_slots(&mut self.state.samplers, samplers, "sampler");
        let refs: Vec<Option<ComRef>> = samplers
            .iter()
            .map(|s| s.as_ref().and_then(sampler_raw).and_then(|r| r.sampler))
            .collect();
        self.device.set_samplers(Stage::Pixel, &refs);
    }

    fn set_primitive_type(&mut self, primitive: PrimitiveType) {
        self.device.ia_set_primitive_topology(primitive.into());
        self.state.primitive = primitive;
    }

    fn clear(&mut self, desc: &ClearDesc) {
        let (rtvs, dsv) = self.device.om_get_render_targets();

        if desc.flag_color {
            for rtv in rtvs.into_iter().flatten() {
                self.device.clear_render_target_view(rtv, desc.color);
            }
        }

        let mut flags = ClearFlags::empty();
        if desc.flag_depth {
            flags |= ClearFlags::DEPTH;
        }
        if desc.flag_stencil {
            flags |= ClearFlags::STENCIL;
        }
        if let (Some(dsv), false) = (dsv, flags.is_empty()) {
            self.device
                .clear_depth_stencil_view(dsv, flags, desc.depth, desc.stencil);
        }
    }

    fn draw(&mut self, cmd: &Draw) {
        if cmd.instance_count == 0 {
            self.device.draw(cmd.vertex_count, cmd.start_vertex);
        } else {
            assert!(self.info.has_instancing, "instanced draws are not supported");
            self.device.draw_instanced(
                cmd.vertex_count,
                cmd.instance_count,
                cmd.start_vertex,
                cmd.start_instance,
            );
        }
    }

    fn draw_indexed(&mut self, cmd: &DrawIndexed) {
        self.state.index_size();
        if cmd.base_vertex != 0 {
            assert!(self.info.has_base_vertex, "base vertex draws are not supported");
        }
        if cmd.instance_count == 0 {
            self.device
                .draw_indexed(cmd.index_count, cmd.start_index, cmd.base_vertex);
        } else {
            assert!(self.info.has_instancing, "instanced draws are not supported");
            self.device.draw_indexed_instanced(
                cmd.index_count,
                cmd.instance_count,
                cmd.start_index,
                cmd.base_vertex,
                cmd.start_instance,
            );
        }
    }

    fn set_compute_pipeline(&mut self, pipeline: &ComputePipeline) {
        let Some(raw) = compute_raw(pipeline).copied() else {
            panic!("binding an empty compute pipeline");
        };
        self.device.set_shader(Stage::Compute, raw.cs);
        self.state.compute_pipeline = Some(*pipeline);
    }

    fn set_compute_uniform_buffers(&mut self, buffers: &[Option<UniformBufferBinding>]) {
        store_slots(&mut self.state.compute_uniform_buffers, buffers, "uniform buffer");
        self.bind_constant_buffers(&[Stage::Compute], buffers);
    }

    fn set_compute_resource_views(&mut self, views: &[Option<ResourceView>]) {
        store_slots(&mut self.state.compute_resource_views, views, "resource view");
        let refs = self.resource_view_refs(views);
        self.device.set_shader_resources(Stage::Compute, &refs);
    }

    fn set_compute_unordered_views(&mut self, views: &[Option<UnorderedView>]) {
        store_slots(&mut self.state.unordered_views, views, "unordered view");
        let refs: Vec<Option<ComRef>> = views
            .iter()
            .map(|v| match v {
                Some(UnorderedView::Buffer(b)) => buffer_raw(b).and_then(|r| r.uav),
                Some(UnorderedView::Texture(t)) => texture_raw(t).and_then(|r| r.uav),
                None => None,
            })
            .collect();
        self.device.cs_set_unordered_access_views(&refs);
    }

    fn dispatch(&mut self, cmd: &Dispatch) {
        assert!(self.info.has_compute_pipeline, "dispatch without compute support");
        let [mx, my, mz] = self.info.max_dispatch;
        assert!(
            cmd.x <= mx && cmd.y <= my && cmd.z <= mz,
            "dispatch {cmd:?} exceeds {:?}",
            self.info.max_dispatch
        );
        self.device.dispatch(cmd.x, cmd.y, cmd.z);
    }
}
