//! [`D3d11Device`] over the real runtime through the `windows` crate.

use std::ffi::c_void;

use raw_window_handle::RawWindowHandle;
use windows::core::{s, ComInterface};
use windows::Win32::Foundation::{BOOL, E_INVALIDARG, HMODULE, HWND};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use super::native::*;
use crate::utils::Pool;
use crate::{GPUError, Result};

enum Object {
    Texture(ID3D11Texture2D),
    Buffer(ID3D11Buffer),
    ShaderResource(ID3D11ShaderResourceView),
    UnorderedAccess(ID3D11UnorderedAccessView),
    RenderTarget(ID3D11RenderTargetView),
    DepthStencil(ID3D11DepthStencilView),
    VertexShader(ID3D11VertexShader),
    PixelShader(ID3D11PixelShader),
    ComputeShader(ID3D11ComputeShader),
    InputLayout(ID3D11InputLayout),
    BlendState(ID3D11BlendState),
    RasterizerState(ID3D11RasterizerState),
    DepthStencilState(ID3D11DepthStencilState),
    SamplerState(ID3D11SamplerState),
}

fn hr(err: windows::core::Error) -> HResult {
    HResult(err.code().0 as u32)
}

fn bool32(value: bool) -> BOOL {
    BOOL::from(value)
}

macro_rules! lookup {
    ($name:ident, $variant:ident, $ty:ty) => {
        fn $name(&self, object: Option<ComRef>) -> Option<$ty> {
            match self.objects.get_ref(object?.to_handle())? {
                Object::$variant(native) => Some(native.clone()),
                _ => None,
            }
        }
    };
}

/// Created object, or `E_FAIL` when the runtime returned success without one.
fn created<T>(result: windows::core::Result<()>, object: Option<T>) -> HrResult<T> {
    result.map_err(hr)?;
    object.ok_or(HResult::E_FAIL)
}

pub struct WindowsDevice {
    device: ID3D11Device,
    context: ID3D11DeviceContext1,
    swap_chain: IDXGISwapChain,
    level: FeatureLevel,
    objects: Pool<Object>,
    back_buffer: (Option<ComRef>, Option<ComRef>),
}

impl WindowsDevice {
    /// Creates a device, immediate context and swap chain for `window`.
    ///
    /// `debug` requests the runtime's debug layer.
    pub fn new(window: RawWindowHandle, debug: bool) -> Result<Self> {
        let RawWindowHandle::Win32(handle) = window else {
            return Err(GPUError::UnsupportedWindowHandle("Direct3D 11"));
        };

        let swap_desc = DXGI_SWAP_CHAIN_DESC {
            BufferDesc: DXGI_MODE_DESC {
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                ..Default::default()
            },
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: 2,
            OutputWindow: HWND(handle.hwnd as isize),
            Windowed: bool32(true),
            SwapEffect: DXGI_SWAP_EFFECT_DISCARD,
            Flags: 0,
        };
        let flags = if debug {
            D3D11_CREATE_DEVICE_DEBUG
        } else {
            D3D11_CREATE_DEVICE_FLAG(0)
        };

        let levels = [
            D3D_FEATURE_LEVEL_11_1,
            D3D_FEATURE_LEVEL_11_0,
            D3D_FEATURE_LEVEL_10_1,
            D3D_FEATURE_LEVEL_10_0,
            D3D_FEATURE_LEVEL_9_3,
            D3D_FEATURE_LEVEL_9_2,
            D3D_FEATURE_LEVEL_9_1,
        ];
        let create = |levels: &[D3D_FEATURE_LEVEL]| {
            let mut swap_chain = None;
            let mut device = None;
            let mut context = None;
            let mut level = D3D_FEATURE_LEVEL::default();
            unsafe {
                D3D11CreateDeviceAndSwapChain(
                    None,
                    D3D_DRIVER_TYPE_HARDWARE,
                    HMODULE::default(),
                    flags,
                    Some(levels),
                    D3D11_SDK_VERSION,
                    Some(&swap_desc),
                    Some(&mut swap_chain),
                    Some(&mut device),
                    Some(&mut level),
                    Some(&mut context),
                )
            }
            .map(|()| (swap_chain, device, context, level))
        };

        // Runtimes older than 11.1 reject the whole list when it names 11_1.
        let result = match create(&levels) {
            Err(err) if err.code() == E_INVALIDARG => create(&levels[1..]),
            other => other,
        };
        let (swap_chain, device, context, level) =
            result.map_err(|e| GPUError::DeviceCreation(e.message().to_string()))?;
        let (Some(swap_chain), Some(device), Some(context)) = (swap_chain, device, context) else {
            return Err(GPUError::DeviceCreation("runtime returned no device".to_string()));
        };
        let context: ID3D11DeviceContext1 = context
            .cast()
            .map_err(|e| GPUError::LoadingError(format!("ID3D11DeviceContext1: {}", e.message())))?;
        let Some(level) = FeatureLevel::from_raw(level.0 as u32) else {
            return Err(GPUError::DeviceCreation(format!(
                "unknown feature level {:#x}",
                level.0
            )));
        };

        let mut this = Self {
            device,
            context,
            swap_chain,
            level,
            objects: Pool::default(),
            back_buffer: (None, None),
        };
        this.make_back_buffer()
            .map_err(|e| GPUError::DeviceCreation(e.to_string()))?;
        Ok(this)
    }

    fn insert(&mut self, object: Object) -> ComRef {
        ComRef::from_handle(self.objects.insert(object))
    }

    fn make_back_buffer(&mut self) -> HrResult<()> {
        let texture: ID3D11Texture2D = unsafe { self.swap_chain.GetBuffer(0) }.map_err(hr)?;
        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };

        let mut rtv = None;
        let rtv = created(
            unsafe { self.device.CreateRenderTargetView(&texture, None, Some(&mut rtv)) },
            rtv,
        )?;

        let depth_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.Width,
            Height: desc.Height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_D24_UNORM_S8_UINT,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_DEPTH_STENCIL.0 as u32,
            CPUAccessFlags: 0,
            MiscFlags: 0,
        };
        let mut depth = None;
        let depth = created(
            unsafe { self.device.CreateTexture2D(&depth_desc, None, Some(&mut depth)) },
            depth,
        )?;
        let mut dsv = None;
        let dsv = created(
            unsafe { self.device.CreateDepthStencilView(&depth, None, Some(&mut dsv)) },
            dsv,
        )?;

        let rtv = self.insert(Object::RenderTarget(rtv));
        let dsv = self.insert(Object::DepthStencil(dsv));
        self.back_buffer = (Some(rtv), Some(dsv));
        Ok(())
    }

    lookup!(texture, Texture, ID3D11Texture2D);
    lookup!(buffer, Buffer, ID3D11Buffer);
    lookup!(srv, ShaderResource, ID3D11ShaderResourceView);
    lookup!(uav, UnorderedAccess, ID3D11UnorderedAccessView);
    lookup!(rtv, RenderTarget, ID3D11RenderTargetView);
    lookup!(dsv, DepthStencil, ID3D11DepthStencilView);
    lookup!(vertex_shader, VertexShader, ID3D11VertexShader);
    lookup!(pixel_shader, PixelShader, ID3D11PixelShader);
    lookup!(compute_shader, ComputeShader, ID3D11ComputeShader);
    lookup!(input_layout, InputLayout, ID3D11InputLayout);
    lookup!(blend_state, BlendState, ID3D11BlendState);
    lookup!(rasterizer_state, RasterizerState, ID3D11RasterizerState);
    lookup!(depth_stencil_state, DepthStencilState, ID3D11DepthStencilState);
    lookup!(sampler_state, SamplerState, ID3D11SamplerState);

    fn resource(&self, object: ComRef) -> Option<ID3D11Resource> {
        match self.objects.get_ref(object.to_handle())? {
            Object::Texture(t) => t.cast().ok(),
            Object::Buffer(b) => b.cast().ok(),
            _ => None,
        }
    }

    /// Reverse lookup of a view handed back by the runtime.
    fn find(&self, matches: impl Fn(&Object) -> bool) -> Option<ComRef> {
        self.objects
            .iter()
            .find(|(_, object)| matches(object))
            .map(|(handle, _)| ComRef::from_handle(handle))
    }
}

fn texture_desc(desc: &Texture2dDesc) -> D3D11_TEXTURE2D_DESC {
    D3D11_TEXTURE2D_DESC {
        Width: desc.width,
        Height: desc.height,
        MipLevels: desc.mip_levels,
        ArraySize: desc.array_size,
        Format: DXGI_FORMAT(desc.format.0 as _),
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Usage: D3D11_USAGE(desc.usage.0 as _),
        BindFlags: desc.bind.bits(),
        CPUAccessFlags: desc.cpu_access.bits(),
        MiscFlags: 0,
    }
}

fn srv_desc(desc: &ViewDesc) -> D3D11_SHADER_RESOURCE_VIEW_DESC {
    let format = DXGI_FORMAT(desc.format.0 as _);
    match desc.dimension {
        ViewDimension::Buffer {
            first_element,
            num_elements,
        } => D3D11_SHADER_RESOURCE_VIEW_DESC {
            Format: format,
            ViewDimension: D3D11_SRV_DIMENSION_BUFFER,
            Anonymous: D3D11_SHADER_RESOURCE_VIEW_DESC_0 {
                Buffer: D3D11_BUFFER_SRV {
                    Anonymous1: D3D11_BUFFER_SRV_0 {
                        FirstElement: first_element,
                    },
                    Anonymous2: D3D11_BUFFER_SRV_1 {
                        NumElements: num_elements,
                    },
                },
            },
        },
        ViewDimension::Texture2d { mip_levels } => D3D11_SHADER_RESOURCE_VIEW_DESC {
            Format: format,
            ViewDimension: D3D11_SRV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_SRV {
                    MostDetailedMip: 0,
                    MipLevels: mip_levels,
                },
            },
        },
        ViewDimension::Texture2dArray {
            mip_levels,
            array_size,
        } => D3D11_SHADER_RESOURCE_VIEW_DESC {
            Format: format,
            ViewDimension: D3D11_SRV_DIMENSION_TEXTURE2DARRAY,
            Anonymous: D3D11_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2DArray: D3D11_TEX2D_ARRAY_SRV {
                    MostDetailedMip: 0,
                    MipLevels: mip_levels,
                    FirstArraySlice: 0,
                    ArraySize: array_size,
                },
            },
        },
    }
}

fn uav_desc(desc: &ViewDesc) -> D3D11_UNORDERED_ACCESS_VIEW_DESC {
    let format = DXGI_FORMAT(desc.format.0 as _);
    match desc.dimension {
        ViewDimension::Buffer {
            first_element,
            num_elements,
        } => D3D11_UNORDERED_ACCESS_VIEW_DESC {
            Format: format,
            ViewDimension: D3D11_UAV_DIMENSION_BUFFER,
            Anonymous: D3D11_UNORDERED_ACCESS_VIEW_DESC_0 {
                Buffer: D3D11_BUFFER_UAV {
                    FirstElement: first_element,
                    NumElements: num_elements,
                    Flags: 0,
                },
            },
        },
        ViewDimension::Texture2d { .. } => D3D11_UNORDERED_ACCESS_VIEW_DESC {
            Format: format,
            ViewDimension: D3D11_UAV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_UNORDERED_ACCESS_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_UAV { MipSlice: 0 },
            },
        },
        ViewDimension::Texture2dArray { array_size, .. } => D3D11_UNORDERED_ACCESS_VIEW_DESC {
            Format: format,
            ViewDimension: D3D11_UAV_DIMENSION_TEXTURE2DARRAY,
            Anonymous: D3D11_UNORDERED_ACCESS_VIEW_DESC_0 {
                Texture2DArray: D3D11_TEX2D_ARRAY_UAV {
                    MipSlice: 0,
                    FirstArraySlice: 0,
                    ArraySize: array_size,
                },
            },
        },
    }
}

fn blend_target(desc: &RenderTargetBlendDesc) -> D3D11_RENDER_TARGET_BLEND_DESC {
    D3D11_RENDER_TARGET_BLEND_DESC {
        BlendEnable: bool32(desc.blend_enable),
        SrcBlend: D3D11_BLEND(desc.src_blend.0 as _),
        DestBlend: D3D11_BLEND(desc.dest_blend.0 as _),
        BlendOp: D3D11_BLEND_OP(desc.blend_op.0 as _),
        SrcBlendAlpha: D3D11_BLEND(desc.src_blend_alpha.0 as _),
        DestBlendAlpha: D3D11_BLEND(desc.dest_blend_alpha.0 as _),
        BlendOpAlpha: D3D11_BLEND_OP(desc.blend_op_alpha.0 as _),
        RenderTargetWriteMask: desc.write_mask,
    }
}

fn native_box(b: &NativeBox) -> D3D11_BOX {
    D3D11_BOX {
        left: b.left,
        top: b.top,
        front: b.front,
        right: b.right,
        bottom: b.bottom,
        back: b.back,
    }
}

impl D3d11Device for WindowsDevice {
    fn feature_level(&self) -> FeatureLevel {
        self.level
    }

    fn adapter_description(&self) -> String {
        let desc = self
            .device
            .cast::<IDXGIDevice>()
            .and_then(|dxgi| unsafe { dxgi.GetAdapter() })
            .and_then(|adapter| unsafe { adapter.GetDesc() });
        match desc {
            Ok(desc) => {
                let len = desc.Description.iter().position(|c| *c == 0).unwrap_or(desc.Description.len());
                String::from_utf16_lossy(&desc.Description[..len])
            }
            Err(err) => {
                log::warn!("adapter description unavailable: {}", err.message());
                String::from("unknown adapter")
            }
        }
    }

    fn compute_shaders_plus_raw_and_structured_buffers(&mut self) -> HrResult<bool> {
        let mut options = D3D11_FEATURE_DATA_D3D10_X_HARDWARE_OPTIONS::default();
        unsafe {
            self.device.CheckFeatureSupport(
                D3D11_FEATURE_D3D10_X_HARDWARE_OPTIONS,
                &mut options as *mut _ as *mut c_void,
                std::mem::size_of_val(&options) as u32,
            )
        }
        .map_err(hr)?;
        Ok(options
            .ComputeShaders_Plus_RawAndStructuredBuffers_Via_Shader_4_x
            .as_bool())
    }

    fn create_texture2d(&mut self, desc: &Texture2dDesc, initial: &[SubresourceData<'_>]) -> HrResult<ComRef> {
        let native = texture_desc(desc);
        let initial: Vec<D3D11_SUBRESOURCE_DATA> = initial
            .iter()
            .map(|s| D3D11_SUBRESOURCE_DATA {
                pSysMem: s.data.as_ptr() as *const c_void,
                SysMemPitch: s.row_pitch,
                SysMemSlicePitch: s.slice_pitch,
            })
            .collect();
        let initial_ptr = (!initial.is_empty()).then(|| initial.as_ptr());

        let mut texture = None;
        let texture = created(
            unsafe { self.device.CreateTexture2D(&native, initial_ptr, Some(&mut texture)) },
            texture,
        )?;
        Ok(self.insert(Object::Texture(texture)))
    }

    fn create_buffer(&mut self, desc: &BufferDescNative, initial: Option<&[u8]>) -> HrResult<ComRef> {
        let native = D3D11_BUFFER_DESC {
            ByteWidth: desc.byte_width,
            Usage: D3D11_USAGE(desc.usage.0 as _),
            BindFlags: desc.bind.bits(),
            CPUAccessFlags: desc.cpu_access.bits(),
            MiscFlags: desc.misc.bits(),
            StructureByteStride: desc.structure_byte_stride,
        };
        let data = initial.map(|data| D3D11_SUBRESOURCE_DATA {
            pSysMem: data.as_ptr() as *const c_void,
            SysMemPitch: 0,
            SysMemSlicePitch: 0,
        });

        let mut buffer = None;
        let buffer = created(
            unsafe {
                self.device.CreateBuffer(
                    &native,
                    data.as_ref().map(|d| d as *const _),
                    Some(&mut buffer),
                )
            },
            buffer,
        )?;
        Ok(self.insert(Object::Buffer(buffer)))
    }

    fn create_shader_resource_view(&mut self, resource: ComRef, desc: &ViewDesc) -> HrResult<ComRef> {
        let resource = self.resource(resource).ok_or(HResult::E_INVALIDARG)?;
        let native = srv_desc(desc);
        let mut view = None;
        let view = created(
            unsafe {
                self.device
                    .CreateShaderResourceView(&resource, Some(&native), Some(&mut view))
            },
            view,
        )?;
        Ok(self.insert(Object::ShaderResource(view)))
    }

    fn create_unordered_access_view(&mut self, resource: ComRef, desc: &ViewDesc) -> HrResult<ComRef> {
        let resource = self.resource(resource).ok_or(HResult::E_INVALIDARG)?;
        let native = uav_desc(desc);
        let mut view = None;
        let view = created(
            unsafe {
                self.device
                    .CreateUnorderedAccessView(&resource, Some(&native), Some(&mut view))
            },
            view,
        )?;
        Ok(self.insert(Object::UnorderedAccess(view)))
    }

    fn create_render_target_view(&mut self, resource: ComRef) -> HrResult<ComRef> {
        let resource = self.resource(resource).ok_or(HResult::E_INVALIDARG)?;
        let mut view = None;
        let view = created(
            unsafe { self.device.CreateRenderTargetView(&resource, None, Some(&mut view)) },
            view,
        )?;
        Ok(self.insert(Object::RenderTarget(view)))
    }

    fn create_depth_stencil_view(&mut self, resource: ComRef, format: DxgiFormat) -> HrResult<ComRef> {
        let resource = self.resource(resource).ok_or(HResult::E_INVALIDARG)?;
        let native = D3D11_DEPTH_STENCIL_VIEW_DESC {
            Format: DXGI_FORMAT(format.0 as _),
            ViewDimension: D3D11_DSV_DIMENSION_TEXTURE2D,
            Flags: 0,
            Anonymous: D3D11_DEPTH_STENCIL_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_DSV { MipSlice: 0 },
            },
        };
        let mut view = None;
        let view = created(
            unsafe {
                self.device
                    .CreateDepthStencilView(&resource, Some(&native), Some(&mut view))
            },
            view,
        )?;
        Ok(self.insert(Object::DepthStencil(view)))
    }

    fn create_vertex_shader(&mut self, bytecode: &[u8]) -> HrResult<ComRef> {
        let mut shader = None;
        let shader = created(
            unsafe { self.device.CreateVertexShader(bytecode, None, Some(&mut shader)) },
            shader,
        )?;
        Ok(self.insert(Object::VertexShader(shader)))
    }

    fn create_pixel_shader(&mut self, bytecode: &[u8]) -> HrResult<ComRef> {
        let mut shader = None;
        let shader = created(
            unsafe { self.device.CreatePixelShader(bytecode, None, Some(&mut shader)) },
            shader,
        )?;
        Ok(self.insert(Object::PixelShader(shader)))
    }

    fn create_compute_shader(&mut self, bytecode: &[u8]) -> HrResult<ComRef> {
        let mut shader = None;
        let shader = created(
            unsafe { self.device.CreateComputeShader(bytecode, None, Some(&mut shader)) },
            shader,
        )?;
        Ok(self.insert(Object::ComputeShader(shader)))
    }

    fn create_input_layout(&mut self, elements: &[InputElementDesc], vs_bytecode: &[u8]) -> HrResult<ComRef> {
        let native: Vec<D3D11_INPUT_ELEMENT_DESC> = elements
            .iter()
            .map(|e| D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("VINPUT"),
                SemanticIndex: e.semantic_index,
                Format: DXGI_FORMAT(e.format.0 as _),
                InputSlot: e.input_slot,
                AlignedByteOffset: e.aligned_byte_offset,
                InputSlotClass: if e.per_instance {
                    D3D11_INPUT_PER_INSTANCE_DATA
                } else {
                    D3D11_INPUT_PER_VERTEX_DATA
                },
                InstanceDataStepRate: e.instance_step_rate,
            })
            .collect();
        let mut layout = None;
        let layout = created(
            unsafe {
                self.device
                    .CreateInputLayout(&native, vs_bytecode, Some(&mut layout))
            },
            layout,
        )?;
        Ok(self.insert(Object::InputLayout(layout)))
    }

    fn create_blend_state(&mut self, desc: &BlendDescNative) -> HrResult<ComRef> {
        let native = D3D11_BLEND_DESC {
            AlphaToCoverageEnable: bool32(false),
            IndependentBlendEnable: bool32(desc.independent_blend_enable),
            RenderTarget: desc.render_targets.map(|rt| blend_target(&rt)),
        };
        let mut state = None;
        let state = created(
            unsafe { self.device.CreateBlendState(&native, Some(&mut state)) },
            state,
        )?;
        Ok(self.insert(Object::BlendState(state)))
    }

    fn create_rasterizer_state(&mut self, desc: &RasterizerDescNative) -> HrResult<ComRef> {
        let native = D3D11_RASTERIZER_DESC {
            FillMode: D3D11_FILL_MODE(desc.fill_mode.0 as _),
            CullMode: D3D11_CULL_MODE(desc.cull_mode.0 as _),
            FrontCounterClockwise: bool32(desc.front_counter_clockwise),
            DepthClipEnable: bool32(desc.depth_clip_enable),
            ..Default::default()
        };
        let mut state = None;
        let state = created(
            unsafe { self.device.CreateRasterizerState(&native, Some(&mut state)) },
            state,
        )?;
        Ok(self.insert(Object::RasterizerState(state)))
    }

    fn create_depth_stencil_state(&mut self, desc: &DepthStencilDescNative) -> HrResult<ComRef> {
        let native = D3D11_DEPTH_STENCIL_DESC {
            DepthEnable: bool32(desc.depth_enable),
            DepthWriteMask: if desc.depth_write_all {
                D3D11_DEPTH_WRITE_MASK_ALL
            } else {
                D3D11_DEPTH_WRITE_MASK_ZERO
            },
            DepthFunc: D3D11_COMPARISON_FUNC(desc.depth_func.0 as _),
            ..Default::default()
        };
        let mut state = None;
        let state = created(
            unsafe { self.device.CreateDepthStencilState(&native, Some(&mut state)) },
            state,
        )?;
        Ok(self.insert(Object::DepthStencilState(state)))
    }

    fn create_sampler_state(&mut self, desc: &SamplerDescNative) -> HrResult<ComRef> {
        let address = D3D11_TEXTURE_ADDRESS_MODE(desc.address.0 as _);
        let native = D3D11_SAMPLER_DESC {
            Filter: D3D11_FILTER(desc.filter.0 as _),
            AddressU: address,
            AddressV: address,
            AddressW: address,
            MipLODBias: 0.0,
            MaxAnisotropy: desc.max_anisotropy,
            ComparisonFunc: D3D11_COMPARISON_FUNC(desc.comparison.0 as _),
            BorderColor: [0.0; 4],
            MinLOD: desc.min_lod,
            MaxLOD: desc.max_lod,
        };
        let mut state = None;
        let state = created(
            unsafe { self.device.CreateSamplerState(&native, Some(&mut state)) },
            state,
        )?;
        Ok(self.insert(Object::SamplerState(state)))
    }

    fn release(&mut self, object: ComRef) {
        self.objects.release(object.to_handle());
    }

    fn buffer_desc(&self, buffer: ComRef) -> Option<BufferDescNative> {
        let buffer = self.buffer(Some(buffer))?;
        let mut desc = D3D11_BUFFER_DESC::default();
        unsafe { buffer.GetDesc(&mut desc) };
        Some(BufferDescNative {
            byte_width: desc.ByteWidth,
            usage: ResourceUsage(desc.Usage.0 as u32),
            bind: BindFlags::from_bits_truncate(desc.BindFlags),
            cpu_access: CpuAccess::from_bits_truncate(desc.CPUAccessFlags),
            misc: MiscFlags::from_bits_truncate(desc.MiscFlags),
            structure_byte_stride: desc.StructureByteStride,
        })
    }

    fn texture2d_desc(&self, texture: ComRef) -> Option<Texture2dDesc> {
        let texture = self.texture(Some(texture))?;
        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };
        Some(Texture2dDesc {
            width: desc.Width,
            height: desc.Height,
            mip_levels: desc.MipLevels,
            array_size: desc.ArraySize,
            format: DxgiFormat(desc.Format.0 as u32),
            usage: ResourceUsage(desc.Usage.0 as u32),
            bind: BindFlags::from_bits_truncate(desc.BindFlags),
            cpu_access: CpuAccess::from_bits_truncate(desc.CPUAccessFlags),
        })
    }

    fn map(&mut self, resource: ComRef, subresource: u32, map_type: MapType) -> HrResult<MappedSubresource> {
        let len = self.buffer_desc(resource).map(|desc| desc.byte_width as usize);
        let native = self.resource(resource).ok_or(HResult::E_INVALIDARG)?;
        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            self.context.Map(
                &native,
                subresource,
                D3D11_MAP(map_type.0 as _),
                0,
                Some(&mut mapped),
            )
        }
        .map_err(hr)?;
        Ok(MappedSubresource {
            data: mapped.pData as *mut u8,
            len: len.unwrap_or(mapped.DepthPitch as usize),
            row_pitch: mapped.RowPitch,
            depth_pitch: mapped.DepthPitch,
        })
    }

    fn unmap(&mut self, resource: ComRef, subresource: u32) {
        if let Some(native) = self.resource(resource) {
            unsafe { self.context.Unmap(&native, subresource) };
        }
    }

    fn update_subresource(
        &mut self,
        resource: ComRef,
        subresource: u32,
        dst_box: Option<&NativeBox>,
        data: &[u8],
        row_pitch: u32,
        depth_pitch: u32,
    ) {
        let Some(native) = self.resource(resource) else { return };
        let dst_box = dst_box.map(native_box);
        unsafe {
            self.context.UpdateSubresource(
                &native,
                subresource,
                dst_box.as_ref().map(|b| b as *const D3D11_BOX),
                data.as_ptr() as *const c_void,
                row_pitch,
                depth_pitch,
            )
        };
    }

    fn copy_subresource_region(&mut self, dst: ComRef, dst_x: u32, dst_y: u32, src: ComRef, src_box: &NativeBox) {
        let (Some(dst), Some(src)) = (self.resource(dst), self.resource(src)) else {
            return;
        };
        let native = native_box(src_box);
        unsafe {
            self.context
                .CopySubresourceRegion(&dst, 0, dst_x, dst_y, 0, &src, 0, Some(&native))
        };
    }

    fn rs_set_viewports(&mut self, viewports: &[ViewportNative]) {
        let native: Vec<D3D11_VIEWPORT> = viewports
            .iter()
            .map(|vp| D3D11_VIEWPORT {
                TopLeftX: vp.top_left_x,
                TopLeftY: vp.top_left_y,
                Width: vp.width,
                Height: vp.height,
                MinDepth: vp.min_depth,
                MaxDepth: vp.max_depth,
            })
            .collect();
        unsafe { self.context.RSSetViewports(Some(&native)) };
    }

    fn rs_set_state(&mut self, state: Option<ComRef>) {
        let state = self.rasterizer_state(state);
        unsafe { self.context.RSSetState(state.as_ref()) };
    }

    fn om_set_blend_state(&mut self, state: Option<ComRef>) {
        let state = self.blend_state(state);
        unsafe { self.context.OMSetBlendState(state.as_ref(), None, u32::MAX) };
    }

    fn om_set_depth_stencil_state(&mut self, state: Option<ComRef>) {
        let state = self.depth_stencil_state(state);
        unsafe { self.context.OMSetDepthStencilState(state.as_ref(), 0) };
    }

    fn om_set_render_targets(&mut self, rtvs: &[Option<ComRef>], dsv: Option<ComRef>) {
        let views: Vec<_> = rtvs.iter().map(|r| self.rtv(*r)).collect();
        let dsv = self.dsv(dsv);
        unsafe { self.context.OMSetRenderTargets(Some(&views), dsv.as_ref()) };
    }

    fn om_get_render_targets(&mut self) -> ([Option<ComRef>; 8], Option<ComRef>) {
        let mut views: [Option<ID3D11RenderTargetView>; 8] = Default::default();
        let mut dsv = None;
        unsafe { self.context.OMGetRenderTargets(Some(&mut views), Some(&mut dsv)) };

        let mut out = [None; 8];
        for (slot, view) in out.iter_mut().zip(views.iter()) {
            if let Some(view) = view {
                *slot = self.find(|o| matches!(o, Object::RenderTarget(v) if v == view));
            }
        }
        let dsv = dsv.and_then(|view| self.find(|o| matches!(o, Object::DepthStencil(v) if *v == view)));
        (out, dsv)
    }

    fn ia_set_input_layout(&mut self, layout: Option<ComRef>) {
        let layout = self.input_layout(layout);
        unsafe { self.context.IASetInputLayout(layout.as_ref()) };
    }

    fn ia_set_vertex_buffers(&mut self, buffers: &[Option<ComRef>], strides: &[u32], offsets: &[u32]) {
        let native: Vec<_> = buffers.iter().map(|b| self.buffer(*b)).collect();
        unsafe {
            self.context.IASetVertexBuffers(
                0,
                native.len() as u32,
                Some(native.as_ptr()),
                Some(strides.as_ptr()),
                Some(offsets.as_ptr()),
            )
        };
    }

    fn ia_set_index_buffer(&mut self, buffer: Option<ComRef>, format: DxgiFormat) {
        let buffer = self.buffer(buffer);
        unsafe {
            self.context
                .IASetIndexBuffer(buffer.as_ref(), DXGI_FORMAT(format.0 as _), 0)
        };
    }

    fn ia_set_primitive_topology(&mut self, topology: Topology) {
        unsafe {
            self.context
                .IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY(topology.0 as _))
        };
    }

    fn set_shader(&mut self, stage: Stage, shader: Option<ComRef>) {
        unsafe {
            match stage {
                Stage::Vertex => self
                    .context
                    .VSSetShader(self.vertex_shader(shader).as_ref(), None),
                Stage::Pixel => self
                    .context
                    .PSSetShader(self.pixel_shader(shader).as_ref(), None),
                Stage::Compute => self
                    .context
                    .CSSetShader(self.compute_shader(shader).as_ref(), None),
            }
        }
    }

    fn set_constant_buffers(&mut self, stage: Stage, buffers: &[Option<ComRef>], first_constant: &[u32], num_constants: &[u32]) {
        let native: Vec<_> = buffers.iter().map(|b| self.buffer(*b)).collect();
        let count = native.len() as u32;
        let (ptr, first, num) = (
            Some(native.as_ptr()),
            Some(first_constant.as_ptr()),
            Some(num_constants.as_ptr()),
        );
        unsafe {
            match stage {
                Stage::Vertex => self.context.VSSetConstantBuffers1(0, count, ptr, first, num),
                Stage::Pixel => self.context.PSSetConstantBuffers1(0, count, ptr, first, num),
                Stage::Compute => self.context.CSSetConstantBuffers1(0, count, ptr, first, num),
            }
        }
    }

    fn set_shader_resources(&mut self, stage: Stage, views: &[Option<ComRef>]) {
        let native: Vec<_> = views.iter().map(|v| self.srv(*v)).collect();
        unsafe {
            match stage {
                Stage::Vertex => self.context.VSSetShaderResources(0, Some(&native)),
                Stage::Pixel => self.context.PSSetShaderResources(0, Some(&native)),
                Stage::Compute => self.context.CSSetShaderResources(0, Some(&native)),
            }
        }
    }

    fn set_samplers(&mut self, stage: Stage, samplers: &[Option<ComRef>]) {
        let native: Vec<_> = samplers.iter().map(|s| self.sampler_state(*s)).collect();
        unsafe {
            match stage {
                Stage::Vertex => self.context.VSSetSamplers(0, Some(&native)),
                Stage::Pixel => self.context.PSSetSamplers(0, Some(&native)),
                Stage::Compute => self.context.CSSetSamplers(0, Some(&native)),
            }
        }
    }

    fn cs_set_unordered_access_views(&mut self, views: &[Option<ComRef>]) {
        let native: Vec<_> = views.iter().map(|v| self.uav(*v)).collect();
        unsafe {
            self.context
                .CSSetUnorderedAccessViews(0, native.len() as u32, Some(native.as_ptr()), None)
        };
    }

    fn clear_render_target_view(&mut self, rtv: ComRef, color: [f32; 4]) {
        if let Some(view) = self.rtv(Some(rtv)) {
            unsafe { self.context.ClearRenderTargetView(&view, &color) };
        }
    }

    fn clear_depth_stencil_view(&mut self, dsv: ComRef, flags: ClearFlags, depth: f32, stencil: u8) {
        if let Some(view) = self.dsv(Some(dsv)) {
            unsafe {
                self.context
                    .ClearDepthStencilView(&view, flags.bits(), depth, stencil)
            };
        }
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        unsafe { self.context.Draw(vertex_count, start_vertex) };
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, start_vertex: u32, start_instance: u32) {
        unsafe {
            self.context
                .DrawInstanced(vertex_count, instance_count, start_vertex, start_instance)
        };
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        unsafe { self.context.DrawIndexed(index_count, start_index, base_vertex) };
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        unsafe {
            self.context.DrawIndexedInstanced(
                index_count,
                instance_count,
                start_index,
                base_vertex,
                start_instance,
            )
        };
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        unsafe { self.context.Dispatch(x, y, z) };
    }

    fn back_buffer_views(&self) -> (Option<ComRef>, Option<ComRef>) {
        self.back_buffer
    }

    fn present(&mut self, sync_interval: u32) -> HrResult<()> {
        unsafe { self.swap_chain.Present(sync_interval, 0) }
            .ok()
            .map_err(hr)
    }

    fn resize_buffers(&mut self) -> HrResult<()> {
        unsafe { self.context.OMSetRenderTargets(None, None) };
        let (rtv, dsv) = std::mem::take(&mut self.back_buffer);
        for view in [rtv, dsv].into_iter().flatten() {
            self.release(view);
        }
        unsafe {
            self.swap_chain
                .ResizeBuffers(0, 0, 0, DXGI_FORMAT_UNKNOWN, 0)
        }
        .map_err(hr)?;
        self.make_back_buffer()
    }
}
