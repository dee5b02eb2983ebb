//! Software stand-in for a Direct3D 11 device.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec4;

use super::memory::{decode_depth, encode, encode_depth, Rect, SoftImage};
use crate::d3d11::native::*;
use crate::utils::Pool;
use crate::{BlendFactor, BlendOp, ColorBlendState, CopyRegion, Format, MipLevels, Viewport};

#[derive(Clone, Debug)]
pub struct NullD3d11Config {
    pub feature_level: FeatureLevel,
    /// Answer of the compute-on-10.x hardware options query.
    pub compute_shaders_4x: bool,
    pub back_buffer: (u32, u32),
    pub adapter: String,
}

impl Default for NullD3d11Config {
    fn default() -> Self {
        Self {
            feature_level: FeatureLevel::Level11_0,
            compute_shaders_4x: false,
            back_buffer: (256, 256),
            adapter: "Null Direct3D 11 adapter".to_string(),
        }
    }
}

/// Native entry points recorded by [`NullD3d11`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum D3d11Call {
    Draw {
        vertex_count: u32,
        start_vertex: u32,
    },
    DrawInstanced {
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    },
    Dispatch(u32, u32, u32),
    SetConstantBuffers {
        stage: Stage,
        first_constant: Vec<u32>,
        num_constants: Vec<u32>,
    },
    SetShaderResources {
        stage: Stage,
        count: usize,
    },
    SetSamplers {
        stage: Stage,
        count: usize,
    },
    SetUnorderedAccessViews(usize),
    ClearRenderTargetView,
    ClearDepthStencilView,
    Present(u32),
    ResizeBuffers,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ViewKind {
    ShaderResource,
    UnorderedAccess,
    RenderTarget,
    DepthStencil,
}

enum Object {
    Texture { desc: Texture2dDesc, image: SoftImage },
    Buffer { desc: BufferDescNative, data: Vec<u8> },
    View {
        kind: ViewKind,
        format: DxgiFormat,
        resource: ComRef,
    },
    Shader(Stage),
    InputLayout,
    Blend(BlendDescNative),
    Rasterizer,
    DepthStencilState,
    Sampler,
}

enum CopySource {
    Bytes(Vec<u8>),
    Image(SoftImage),
}

#[derive(Default)]
struct Bindings {
    rtvs: [Option<ComRef>; 8],
    dsv: Option<ComRef>,
    viewports: Vec<ViewportNative>,
    blend: Option<ComRef>,
    ps_constants: Option<(ComRef, u32)>,
}

struct State {
    config: NullD3d11Config,
    objects: Pool<Object>,
    /// Objects owned by the swap chain.
    internal: usize,
    back_buffer: (ComRef, ComRef),
    depth_buffer: (ComRef, ComRef),
    bound: Bindings,
    calls: Vec<D3d11Call>,
    fail_next: Option<HResult>,
    removed: Option<HResult>,
}

fn mip_count(desc: &Texture2dDesc) -> u32 {
    if desc.mip_levels == 0 {
        MipLevels::Auto.resolve(desc.width, desc.height)
    } else {
        desc.mip_levels
    }
}

/// Abstract format a native storage format holds texels of.
fn storage_format(native: DxgiFormat) -> Option<Format> {
    match native {
        DxgiFormat::R16_TYPELESS => Some(Format::D16),
        DxgiFormat::R24G8_TYPELESS => Some(Format::D24S8),
        DxgiFormat::UNKNOWN => None,
        other => Format::ALL.into_iter().find(|f| DxgiFormat::from(*f) == other),
    }
}

fn blend_factor(native: Blend) -> BlendFactor {
    match native {
        Blend::ZERO => BlendFactor::Zero,
        Blend::ONE => BlendFactor::One,
        Blend::SRC_COLOR => BlendFactor::SrcColor,
        Blend::INV_SRC_COLOR => BlendFactor::InvSrcColor,
        Blend::SRC_ALPHA => BlendFactor::SrcAlpha,
        Blend::INV_SRC_ALPHA => BlendFactor::InvSrcAlpha,
        Blend::DEST_ALPHA => BlendFactor::DstAlpha,
        Blend::INV_DEST_ALPHA => BlendFactor::InvDstAlpha,
        Blend::DEST_COLOR => BlendFactor::DstColor,
        Blend::INV_DEST_COLOR => BlendFactor::InvDstColor,
        Blend(other) => panic!("unknown D3D11_BLEND {other}"),
    }
}

fn blend_op(native: BlendOpNative) -> BlendOp {
    if native == BlendOpNative::SUBTRACT {
        BlendOp::Subtract
    } else {
        BlendOp::Add
    }
}

fn blend_state(desc: &RenderTargetBlendDesc) -> ColorBlendState {
    ColorBlendState {
        enable: desc.blend_enable,
        src: blend_factor(desc.src_blend),
        dst: blend_factor(desc.dest_blend),
        op: blend_op(desc.blend_op),
        src_alpha: blend_factor(desc.src_blend_alpha),
        dst_alpha: blend_factor(desc.dest_blend_alpha),
        op_alpha: blend_op(desc.blend_op_alpha),
    }
}

impl State {
    fn new(config: NullD3d11Config) -> Self {
        let mut objects = Pool::default();
        let (w, h) = config.back_buffer;
        let color = Self::swap_chain_texture(&mut objects, w, h, Format::U8x4Norm, BindFlags::RENDER_TARGET);
        let color_view = ComRef::from_handle(objects.insert(Object::View {
            kind: ViewKind::RenderTarget,
            format: DxgiFormat::from(Format::U8x4Norm),
            resource: color,
        }));
        let depth = Self::swap_chain_texture(&mut objects, w, h, Format::D24S8, BindFlags::DEPTH_STENCIL);
        let depth_view = ComRef::from_handle(objects.insert(Object::View {
            kind: ViewKind::DepthStencil,
            format: DxgiFormat::D24_UNORM_S8_UINT,
            resource: depth,
        }));

        Self {
            config,
            internal: objects.len(),
            objects,
            back_buffer: (color, color_view),
            depth_buffer: (depth, depth_view),
            bound: Bindings::default(),
            calls: Vec::new(),
            fail_next: None,
            removed: None,
        }
    }

    fn swap_chain_texture(objects: &mut Pool<Object>, w: u32, h: u32, format: Format, bind: BindFlags) -> ComRef {
        let desc = Texture2dDesc {
            width: w,
            height: h,
            mip_levels: 1,
            array_size: 1,
            format: format.into(),
            usage: ResourceUsage::DEFAULT,
            bind,
            cpu_access: CpuAccess::empty(),
        };
        ComRef::from_handle(objects.insert(Object::Texture {
            desc,
            image: SoftImage::new(w, h, 1, format),
        }))
    }

    /// Consumes an injected failure; device removal sticks.
    fn fallible(&mut self) -> HrResult<()> {
        if let Some(hr) = self.removed {
            return Err(hr);
        }
        match self.fail_next.take() {
            Some(hr) => {
                if hr.is_device_lost() {
                    self.removed = Some(hr);
                }
                Err(hr)
            }
            None => Ok(()),
        }
    }

    fn get(&self, r: ComRef) -> Option<&Object> {
        self.objects.get_ref(r.to_handle())
    }

    fn get_mut(&mut self, r: ComRef) -> Option<&mut Object> {
        self.objects.get_mut_ref(r.to_handle())
    }

    fn insert(&mut self, object: Object) -> HrResult<ComRef> {
        self.fallible()?;
        Ok(ComRef::from_handle(self.objects.insert(object)))
    }

    fn view_resource(&self, view: ComRef, kind: ViewKind) -> Option<ComRef> {
        match self.get(view) {
            Some(Object::View { kind: k, resource, .. }) if *k == kind => Some(*resource),
            _ => None,
        }
    }

    fn image_mut(&mut self, texture: ComRef) -> Option<&mut SoftImage> {
        match self.get_mut(texture) {
            Some(Object::Texture { image, .. }) => Some(image),
            _ => None,
        }
    }

    fn fragment_color(&self) -> Vec4 {
        let Some((buffer, first_constant)) = self.bound.ps_constants else {
            return Vec4::ONE;
        };
        let start = first_constant as usize * 16;
        match self.get(buffer) {
            Some(Object::Buffer { data, .. }) if data.len() >= start + 16 => {
                Vec4::from_array(bytemuck::pod_read_unaligned(&data[start..start + 16]))
            }
            _ => Vec4::ONE,
        }
    }

    fn rasterize(&mut self, vertex_count: u32) {
        if vertex_count == 0 {
            return;
        }
        let Some(vp) = self.bound.viewports.first().copied() else {
            return;
        };
        let rect = Rect::from_viewport(&Viewport {
            x: vp.top_left_x,
            y: vp.top_left_y,
            width: vp.width,
            height: vp.height,
            min_depth: vp.min_depth,
            max_depth: vp.max_depth,
        });
        let color = self.fragment_color();
        let blend = match self.bound.blend.and_then(|b| self.get(b)) {
            Some(Object::Blend(desc)) => Some(*desc),
            _ => None,
        };

        for (i, rtv) in self.bound.rtvs.into_iter().enumerate() {
            let Some(texture) = rtv.and_then(|v| self.view_resource(v, ViewKind::RenderTarget)) else {
                continue;
            };
            let state = blend.map_or_else(ColorBlendState::default, |desc| {
                let index = if desc.independent_blend_enable { i } else { 0 };
                blend_state(&desc.render_targets[index])
            });
            if let Some(image) = self.image_mut(texture) {
                image.shade(0, rect, color, &state);
            }
        }
    }
}

/// Probe into a [`NullD3d11`] owned by a context.
#[derive(Clone)]
pub struct NullD3d11Probe {
    state: Rc<RefCell<State>>,
}

impl NullD3d11Probe {
    /// Native objects alive, not counting the swap chain.
    pub fn live_objects(&self) -> usize {
        let state = self.state.borrow();
        state.objects.len() - state.internal
    }

    pub fn calls(&self) -> Vec<D3d11Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Storage format of a texture or the format a view was created with.
    pub fn native_format(&self, object: ComRef) -> Option<DxgiFormat> {
        match self.state.borrow().get(object) {
            Some(Object::Texture { desc, .. }) => Some(desc.format),
            Some(Object::View { format, .. }) => Some(*format),
            _ => None,
        }
    }

    /// Makes the next fallible native call fail with `hr`.
    pub fn fail_next(&self, hr: HResult) {
        self.state.borrow_mut().fail_next = Some(hr);
    }

    /// Colour of a back buffer texel.
    pub fn back_buffer_texel(&self, x: u32, y: u32) -> Vec<u8> {
        let state = self.state.borrow();
        match state.get(state.back_buffer.0) {
            Some(Object::Texture { image, .. }) => image.texel(0, x, y).to_vec(),
            _ => Vec::new(),
        }
    }
}

/// [`D3d11Device`] that keeps every object in CPU memory.
pub struct NullD3d11 {
    state: Rc<RefCell<State>>,
}

impl NullD3d11 {
    pub fn new(config: NullD3d11Config) -> (Self, NullD3d11Probe) {
        let state = Rc::new(RefCell::new(State::new(config)));
        let probe = NullD3d11Probe {
            state: Rc::clone(&state),
        };
        (Self { state }, probe)
    }

    fn record(&self, call: D3d11Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl D3d11Device for NullD3d11 {
    fn feature_level(&self) -> FeatureLevel {
        self.state.borrow().config.feature_level
    }

    fn adapter_description(&self) -> String {
        self.state.borrow().config.adapter.clone()
    }

    fn compute_shaders_plus_raw_and_structured_buffers(&mut self) -> HrResult<bool> {
        let mut state = self.state.borrow_mut();
        state.fallible()?;
        Ok(state.config.compute_shaders_4x)
    }

    fn create_texture2d(&mut self, desc: &Texture2dDesc, initial: &[SubresourceData<'_>]) -> HrResult<ComRef> {
        let Some(format) = storage_format(desc.format) else {
            return Err(HResult::E_INVALIDARG);
        };
        if desc.width == 0 || desc.height == 0 || desc.array_size == 0 {
            return Err(HResult::E_INVALIDARG);
        }
        if desc.usage == ResourceUsage::IMMUTABLE && initial.is_empty() {
            return Err(HResult::E_INVALIDARG);
        }

        let mut image = SoftImage::new(desc.width, desc.height, desc.array_size, format);
        for (slice, sub) in initial.iter().enumerate().take(desc.array_size as usize) {
            let target = image.slice_mut(slice as u32);
            let n = target.len().min(sub.data.len());
            target[..n].copy_from_slice(&sub.data[..n]);
        }

        self.state.borrow_mut().insert(Object::Texture { desc: *desc, image })
    }

    fn create_buffer(&mut self, desc: &BufferDescNative, initial: Option<&[u8]>) -> HrResult<ComRef> {
        if desc.byte_width == 0 {
            return Err(HResult::E_INVALIDARG);
        }
        if desc.bind.contains(BindFlags::CONSTANT_BUFFER) && desc.byte_width % 16 != 0 {
            return Err(HResult::E_INVALIDARG);
        }
        if desc.usage == ResourceUsage::IMMUTABLE && initial.is_none() {
            return Err(HResult::E_INVALIDARG);
        }
        let mut data = vec![0; desc.byte_width as usize];
        if let Some(initial) = initial {
            let n = data.len().min(initial.len());
            data[..n].copy_from_slice(&initial[..n]);
        }
        self.state.borrow_mut().insert(Object::Buffer { desc: *desc, data })
    }

    fn create_shader_resource_view(&mut self, resource: ComRef, desc: &ViewDesc) -> HrResult<ComRef> {
        let mut state = self.state.borrow_mut();
        if state.get(resource).is_none() {
            return Err(HResult::E_INVALIDARG);
        }
        state.insert(Object::View {
            kind: ViewKind::ShaderResource,
            format: desc.format,
            resource,
        })
    }

    fn create_unordered_access_view(&mut self, resource: ComRef, desc: &ViewDesc) -> HrResult<ComRef> {
        let mut state = self.state.borrow_mut();
        if state.get(resource).is_none() {
            return Err(HResult::E_INVALIDARG);
        }
        state.insert(Object::View {
            kind: ViewKind::UnorderedAccess,
            format: desc.format,
            resource,
        })
    }

    fn create_render_target_view(&mut self, resource: ComRef) -> HrResult<ComRef> {
        let mut state = self.state.borrow_mut();
        let format = match state.get(resource) {
            Some(Object::Texture { desc, .. }) if desc.bind.contains(BindFlags::RENDER_TARGET) => desc.format,
            _ => return Err(HResult::E_INVALIDARG),
        };
        state.insert(Object::View {
            kind: ViewKind::RenderTarget,
            format,
            resource,
        })
    }

    fn create_depth_stencil_view(&mut self, resource: ComRef, format: DxgiFormat) -> HrResult<ComRef> {
        let mut state = self.state.borrow_mut();
        match state.get(resource) {
            Some(Object::Texture { desc, .. })
                if desc.bind.contains(BindFlags::DEPTH_STENCIL)
                    && matches!(format, DxgiFormat::D16_UNORM | DxgiFormat::D24_UNORM_S8_UINT) => {}
            _ => return Err(HResult::E_INVALIDARG),
        }
        state.insert(Object::View {
            kind: ViewKind::DepthStencil,
            format,
            resource,
        })
    }

    fn create_vertex_shader(&mut self, bytecode: &[u8]) -> HrResult<ComRef> {
        if bytecode.is_empty() {
            return Err(HResult::E_INVALIDARG);
        }
        self.state.borrow_mut().insert(Object::Shader(Stage::Vertex))
    }

    fn create_pixel_shader(&mut self, bytecode: &[u8]) -> HrResult<ComRef> {
        if bytecode.is_empty() {
            return Err(HResult::E_INVALIDARG);
        }
        self.state.borrow_mut().insert(Object::Shader(Stage::Pixel))
    }

    fn create_compute_shader(&mut self, bytecode: &[u8]) -> HrResult<ComRef> {
        if bytecode.is_empty() {
            return Err(HResult::E_INVALIDARG);
        }
        self.state.borrow_mut().insert(Object::Shader(Stage::Compute))
    }

    fn create_input_layout(&mut self, elements: &[InputElementDesc], _vs_bytecode: &[u8]) -> HrResult<ComRef> {
        if elements.is_empty() {
            return Err(HResult::E_INVALIDARG);
        }
        self.state.borrow_mut().insert(Object::InputLayout)
    }

    fn create_blend_state(&mut self, desc: &BlendDescNative) -> HrResult<ComRef> {
        self.state.borrow_mut().insert(Object::Blend(*desc))
    }

    fn create_rasterizer_state(&mut self, _desc: &RasterizerDescNative) -> HrResult<ComRef> {
        self.state.borrow_mut().insert(Object::Rasterizer)
    }

    fn create_depth_stencil_state(&mut self, _desc: &DepthStencilDescNative) -> HrResult<ComRef> {
        self.state.borrow_mut().insert(Object::DepthStencilState)
    }

    fn create_sampler_state(&mut self, desc: &SamplerDescNative) -> HrResult<ComRef> {
        if !(1..=16).contains(&desc.max_anisotropy) {
            return Err(HResult::E_INVALIDARG);
        }
        self.state.borrow_mut().insert(Object::Sampler)
    }

    fn release(&mut self, object: ComRef) {
        self.state.borrow_mut().objects.release(object.to_handle());
    }

    fn buffer_desc(&self, buffer: ComRef) -> Option<BufferDescNative> {
        match self.state.borrow().get(buffer) {
            Some(Object::Buffer { desc, .. }) => Some(*desc),
            _ => None,
        }
    }

    fn texture2d_desc(&self, texture: ComRef) -> Option<Texture2dDesc> {
        match self.state.borrow().get(texture) {
            Some(Object::Texture { desc, .. }) => Some(*desc),
            _ => None,
        }
    }

    fn map(&mut self, resource: ComRef, subresource: u32, map_type: MapType) -> HrResult<MappedSubresource> {
        let mut state = self.state.borrow_mut();
        state.fallible()?;

        let allowed = |usage: ResourceUsage, cpu: CpuAccess| match map_type {
            MapType::READ => cpu.contains(CpuAccess::READ),
            MapType::READ_WRITE => cpu.contains(CpuAccess::READ | CpuAccess::WRITE),
            MapType::WRITE => cpu.contains(CpuAccess::WRITE) && usage == ResourceUsage::STAGING,
            _ => usage == ResourceUsage::DYNAMIC,
        };

        match state.get_mut(resource) {
            Some(Object::Buffer { desc, data }) if allowed(desc.usage, desc.cpu_access) && subresource == 0 => {
                Ok(MappedSubresource {
                    data: data.as_mut_ptr(),
                    len: data.len(),
                    row_pitch: desc.byte_width,
                    depth_pitch: desc.byte_width,
                })
            }
            Some(Object::Texture { desc, image }) if allowed(desc.usage, desc.cpu_access) => {
                let mips = mip_count(desc);
                if subresource % mips != 0 || subresource / mips >= image.slices {
                    return Err(HResult::E_INVALIDARG);
                }
                let row_pitch = image.row_pitch();
                let slice = image.slice_mut(subresource / mips);
                Ok(MappedSubresource {
                    data: slice.as_mut_ptr(),
                    len: slice.len(),
                    row_pitch,
                    depth_pitch: slice.len() as u32,
                })
            }
            _ => Err(HResult::E_INVALIDARG),
        }
    }

    fn unmap(&mut self, _resource: ComRef, _subresource: u32) {}

    fn update_subresource(
        &mut self,
        resource: ComRef,
        subresource: u32,
        dst_box: Option<&NativeBox>,
        data: &[u8],
        row_pitch: u32,
        _depth_pitch: u32,
    ) {
        let mut state = self.state.borrow_mut();
        match state.get_mut(resource) {
            Some(Object::Buffer { data: dst, .. }) => {
                let range = dst_box.map_or(0..dst.len(), |b| b.left as usize..b.right as usize);
                assert!(
                    range.end <= dst.len() && data.len() >= range.len(),
                    "UpdateSubresource reads {} bytes from a {} byte source",
                    range.len(),
                    data.len()
                );
                dst[range.clone()].copy_from_slice(&data[..range.len()]);
            }
            Some(Object::Texture { desc, image }) => {
                let mips = mip_count(desc);
                if subresource % mips != 0 || subresource / mips >= image.slices {
                    return;
                }
                let pitch = image.row_pitch() as usize;
                let dst = image.slice_mut(subresource / mips);
                for (row, src) in dst.chunks_mut(pitch).zip(data.chunks(row_pitch.max(1) as usize)) {
                    let n = row.len().min(src.len());
                    row[..n].copy_from_slice(&src[..n]);
                }
            }
            _ => {}
        }
    }

    fn copy_subresource_region(&mut self, dst: ComRef, dst_x: u32, dst_y: u32, src: ComRef, src_box: &NativeBox) {
        let mut state = self.state.borrow_mut();
        let source = match state.get(src) {
            Some(Object::Buffer { data, .. }) => {
                let range = src_box.left as usize..src_box.right as usize;
                CopySource::Bytes(data.get(range).map(<[u8]>::to_vec).unwrap_or_default())
            }
            Some(Object::Texture { image, .. }) => CopySource::Image(image.clone()),
            _ => return,
        };

        match (state.get_mut(dst), source) {
            (Some(Object::Buffer { data, .. }), CopySource::Bytes(bytes)) => {
                let start = dst_x as usize;
                if start + bytes.len() <= data.len() {
                    data[start..start + bytes.len()].copy_from_slice(&bytes);
                }
            }
            (Some(Object::Texture { image, .. }), CopySource::Image(source)) => {
                if image.format == source.format {
                    image.copy_region(
                        &source,
                        &CopyRegion {
                            src_x: src_box.left,
                            src_y: src_box.top,
                            dst_x,
                            dst_y,
                            width: src_box.right - src_box.left,
                            height: src_box.bottom - src_box.top,
                        },
                    );
                }
            }
            _ => {}
        }
    }

    fn rs_set_viewports(&mut self, viewports: &[ViewportNative]) {
        self.state.borrow_mut().bound.viewports = viewports.to_vec();
    }

    fn rs_set_state(&mut self, _state: Option<ComRef>) {}

    fn om_set_blend_state(&mut self, state: Option<ComRef>) {
        self.state.borrow_mut().bound.blend = state;
    }

    fn om_set_depth_stencil_state(&mut self, _state: Option<ComRef>) {}

    fn om_set_render_targets(&mut self, rtvs: &[Option<ComRef>], dsv: Option<ComRef>) {
        let mut state = self.state.borrow_mut();
        state.bound.rtvs = [None; 8];
        for (slot, rtv) in state.bound.rtvs.iter_mut().zip(rtvs) {
            *slot = *rtv;
        }
        state.bound.dsv = dsv;
    }

    fn om_get_render_targets(&mut self) -> ([Option<ComRef>; 8], Option<ComRef>) {
        let state = self.state.borrow();
        (state.bound.rtvs, state.bound.dsv)
    }

    fn ia_set_input_layout(&mut self, _layout: Option<ComRef>) {}

    fn ia_set_vertex_buffers(&mut self, _buffers: &[Option<ComRef>], _strides: &[u32], _offsets: &[u32]) {}

    fn ia_set_index_buffer(&mut self, _buffer: Option<ComRef>, _format: DxgiFormat) {}

    fn ia_set_primitive_topology(&mut self, _topology: Topology) {}

    fn set_shader(&mut self, _stage: Stage, _shader: Option<ComRef>) {}

    fn set_constant_buffers(&mut self, stage: Stage, buffers: &[Option<ComRef>], first_constant: &[u32], num_constants: &[u32]) {
        if stage == Stage::Pixel {
            let slot0 = buffers.first().copied().flatten();
            self.state.borrow_mut().bound.ps_constants =
                slot0.map(|b| (b, first_constant.first().copied().unwrap_or(0)));
        }
        self.record(D3d11Call::SetConstantBuffers {
            stage,
            first_constant: first_constant.to_vec(),
            num_constants: num_constants.to_vec(),
        });
    }

    fn set_shader_resources(&mut self, stage: Stage, views: &[Option<ComRef>]) {
        self.record(D3d11Call::SetShaderResources {
            stage,
            count: views.len(),
        });
    }

    fn set_samplers(&mut self, stage: Stage, samplers: &[Option<ComRef>]) {
        self.record(D3d11Call::SetSamplers {
            stage,
            count: samplers.len(),
        });
    }

    fn cs_set_unordered_access_views(&mut self, views: &[Option<ComRef>]) {
        self.record(D3d11Call::SetUnorderedAccessViews(views.len()));
    }

    fn clear_render_target_view(&mut self, rtv: ComRef, color: [f32; 4]) {
        let mut state = self.state.borrow_mut();
        state.calls.push(D3d11Call::ClearRenderTargetView);
        let Some(texture) = state.view_resource(rtv, ViewKind::RenderTarget) else {
            return;
        };
        if let Some(image) = state.image_mut(texture) {
            let bytes = encode(image.format, Vec4::from_array(color));
            image.fill(0, Rect::full(image.width, image.height), &bytes);
        }
    }

    fn clear_depth_stencil_view(&mut self, dsv: ComRef, flags: ClearFlags, depth: f32, stencil: u8) {
        let mut state = self.state.borrow_mut();
        state.calls.push(D3d11Call::ClearDepthStencilView);
        let Some(texture) = state.view_resource(dsv, ViewKind::DepthStencil) else {
            return;
        };
        if let Some(image) = state.image_mut(texture) {
            let (old_depth, old_stencil) = decode_depth(image.format, image.texel(0, 0, 0));
            let depth = if flags.contains(ClearFlags::DEPTH) { depth } else { old_depth };
            let stencil = if flags.contains(ClearFlags::STENCIL) { stencil } else { old_stencil };
            let bytes = encode_depth(image.format, depth, stencil);
            image.fill(0, Rect::full(image.width, image.height), &bytes);
        }
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        let mut state = self.state.borrow_mut();
        state.calls.push(D3d11Call::Draw {
            vertex_count,
            start_vertex,
        });
        state.rasterize(vertex_count);
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, start_vertex: u32, start_instance: u32) {
        let mut state = self.state.borrow_mut();
        state.calls.push(D3d11Call::DrawInstanced {
            vertex_count,
            instance_count,
            start_vertex,
            start_instance,
        });
        state.rasterize(vertex_count * instance_count);
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        let mut state = self.state.borrow_mut();
        state.calls.push(D3d11Call::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
        });
        state.rasterize(index_count);
    }

    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32, start_index: u32, base_vertex: i32, start_instance: u32) {
        let mut state = self.state.borrow_mut();
        state.calls.push(D3d11Call::DrawIndexedInstanced {
            index_count,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        });
        state.rasterize(index_count * instance_count);
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(D3d11Call::Dispatch(x, y, z));
    }

    fn back_buffer_views(&self) -> (Option<ComRef>, Option<ComRef>) {
        let state = self.state.borrow();
        (Some(state.back_buffer.1), Some(state.depth_buffer.1))
    }

    fn present(&mut self, sync_interval: u32) -> HrResult<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(D3d11Call::Present(sync_interval));
        state.fallible()
    }

    fn resize_buffers(&mut self) -> HrResult<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(D3d11Call::ResizeBuffers);
        state.fallible()?;
        let (w, h) = state.config.back_buffer;
        let (color, depth) = (state.back_buffer.0, state.depth_buffer.0);
        for texture in [color, depth] {
            if let Some(Object::Texture { desc, image }) = state.get_mut(texture) {
                desc.width = w;
                desc.height = h;
                *image = SoftImage::new(w, h, 1, image.format);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typeless_depth_storage_keeps_depth_texels() {
        assert_eq!(storage_format(DxgiFormat::R24G8_TYPELESS), Some(Format::D24S8));
        assert_eq!(storage_format(DxgiFormat::B8G8R8X8_UNORM), Some(Format::U8x4NormBgrx));
        assert_eq!(storage_format(DxgiFormat::UNKNOWN), None);
    }

    #[test]
    fn removal_sticks_to_every_fallible_call() {
        let (mut device, probe) = NullD3d11::new(NullD3d11Config::default());
        probe.fail_next(HResult::DEVICE_REMOVED);
        assert_eq!(device.present(0), Err(HResult::DEVICE_REMOVED));
        assert_eq!(device.create_rasterizer_state(&RasterizerDescNative {
            fill_mode: FillModeNative::SOLID,
            cull_mode: CullModeNative::NONE,
            front_counter_clockwise: true,
            depth_clip_enable: true,
        }), Err(HResult::DEVICE_REMOVED));
        assert_eq!(probe.live_objects(), 0);
    }

    #[test]
    fn ordinary_failures_are_one_shot() {
        let (mut device, probe) = NullD3d11::new(NullD3d11Config::default());
        probe.fail_next(HResult::E_OUTOFMEMORY);
        assert_eq!(device.present(1), Err(HResult::E_OUTOFMEMORY));
        assert_eq!(device.present(1), Ok(()));
    }

    #[test]
    fn stale_release_is_ignored() {
        let (mut device, probe) = NullD3d11::new(NullD3d11Config::default());
        let sampler = device
            .create_sampler_state(&SamplerDescNative {
                filter: Filter::MIN_MAG_MIP_POINT,
                address: TextureAddressMode::WRAP,
                max_anisotropy: 1,
                comparison: ComparisonFunc::NEVER,
                min_lod: -f32::MAX,
                max_lod: f32::MAX,
            })
            .unwrap();
        assert_eq!(probe.live_objects(), 1);
        device.release(sampler);
        device.release(sampler);
        assert_eq!(probe.live_objects(), 0);
    }

    #[test]
    fn draw_shades_back_buffer_with_white() {
        let (mut device, probe) = NullD3d11::new(NullD3d11Config::default());
        let (rtv, _) = device.back_buffer_views();
        device.om_set_render_targets(&[rtv], None);
        device.rs_set_viewports(&[ViewportNative {
            width: 2.0,
            height: 2.0,
            max_depth: 1.0,
            ..Default::default()
        }]);
        device.draw(0, 0);
        assert_eq!(probe.back_buffer_texel(0, 0), [0, 0, 0, 0]);
        device.draw(3, 0);
        assert_eq!(probe.back_buffer_texel(1, 1), [255, 255, 255, 255]);
        assert_eq!(probe.back_buffer_texel(2, 2), [0, 0, 0, 0]);
    }
}
