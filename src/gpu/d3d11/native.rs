//! Narrow view of the Direct3D 11 device and immediate context.
//!
//! Only the entry points the explicit backend issues are modelled. Enumerant
//! values match the Windows SDK so implementations can convert with a cast.

use std::num::NonZeroU64;

use bitflags::bitflags;
use thiserror::Error;

use crate::utils::Handle;

/// Opaque reference to a native device object.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComRef(NonZeroU64);

impl ComRef {
    pub fn from_handle<T>(handle: Handle<T>) -> Self {
        ComRef(NonZeroU64::MIN.saturating_add(u64::from(handle.to_bits())))
    }

    pub fn to_handle<T>(self) -> Handle<T> {
        Handle::from_bits((self.0.get() - 1) as u32)
    }
}

/// Native result code of a failed call.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("HRESULT {0:#010X}")]
pub struct HResult(pub u32);

impl HResult {
    pub const DEVICE_REMOVED: Self = Self(0x887A_0005);
    pub const DEVICE_HUNG: Self = Self(0x887A_0006);
    pub const DEVICE_RESET: Self = Self(0x887A_0007);
    pub const WAS_STILL_DRAWING: Self = Self(0x887A_000A);
    pub const INVALID_CALL: Self = Self(0x887A_0001);
    pub const E_INVALIDARG: Self = Self(0x8007_0057);
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E);
    pub const E_FAIL: Self = Self(0x8000_4005);

    /// Device removed or reset; the device cannot be used any more.
    pub fn is_device_lost(self) -> bool {
        self == Self::DEVICE_REMOVED || self == Self::DEVICE_RESET
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::DEVICE_REMOVED => "DXGI_ERROR_DEVICE_REMOVED",
            Self::DEVICE_HUNG => "DXGI_ERROR_DEVICE_HUNG",
            Self::DEVICE_RESET => "DXGI_ERROR_DEVICE_RESET",
            Self::WAS_STILL_DRAWING => "DXGI_ERROR_WAS_STILL_DRAWING",
            Self::INVALID_CALL => "DXGI_ERROR_INVALID_CALL",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::E_OUTOFMEMORY => "E_OUTOFMEMORY",
            Self::E_FAIL => "E_FAIL",
            _ => "unknown error",
        }
    }
}

pub type HrResult<T> = std::result::Result<T, HResult>;

#[repr(u32)]
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeatureLevel {
    Level9_1 = 0x9100,
    Level9_2 = 0x9200,
    Level9_3 = 0x9300,
    Level10_0 = 0xa000,
    Level10_1 = 0xa100,
    Level11_0 = 0xb000,
    Level11_1 = 0xb100,
}

impl FeatureLevel {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0x9100 => Self::Level9_1,
            0x9200 => Self::Level9_2,
            0x9300 => Self::Level9_3,
            0xa000 => Self::Level10_0,
            0xa100 => Self::Level10_1,
            0xb000 => Self::Level11_0,
            0xb100 => Self::Level11_1,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Level9_1 => "9_1",
            Self::Level9_2 => "9_2",
            Self::Level9_3 => "9_3",
            Self::Level10_0 => "10_0",
            Self::Level10_1 => "10_1",
            Self::Level11_0 => "11_0",
            Self::Level11_1 => "11_1",
        }
    }
}

macro_rules! native_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name(pub u32);

        impl $name {
            $(pub const $variant: Self = Self($value);)+
        }
    };
}

native_enum!(
    /// `DXGI_FORMAT`.
    DxgiFormat {
        UNKNOWN = 0,
        R32G32B32A32_FLOAT = 2,
        R32G32B32A32_UINT = 3,
        R32G32B32_FLOAT = 6,
        R16G16B16A16_FLOAT = 10,
        R16G16B16A16_UNORM = 11,
        R16G16B16A16_UINT = 12,
        R16G16B16A16_SNORM = 13,
        R16G16B16A16_SINT = 14,
        R32G32_FLOAT = 16,
        R32G32_UINT = 17,
        R8G8B8A8_UNORM = 28,
        R8G8B8A8_UNORM_SRGB = 29,
        R8G8B8A8_UINT = 30,
        R16G16_FLOAT = 34,
        R16G16_UNORM = 35,
        R16G16_UINT = 36,
        R16G16_SNORM = 37,
        R16G16_SINT = 38,
        R32_FLOAT = 41,
        R32_UINT = 42,
        R24G8_TYPELESS = 44,
        D24_UNORM_S8_UINT = 45,
        R24_UNORM_X8_TYPELESS = 46,
        R8G8_UNORM = 49,
        R8G8_UINT = 50,
        R16_TYPELESS = 53,
        R16_FLOAT = 54,
        D16_UNORM = 55,
        R16_UNORM = 56,
        R16_UINT = 57,
        R8_UNORM = 61,
        R8_UINT = 62,
        A8_UNORM = 65,
        BC1_UNORM = 71,
        BC2_UNORM = 74,
        BC3_UNORM = 77,
        BC4_UNORM = 80,
        BC5_UNORM = 83,
        B8G8R8A8_UNORM = 87,
        B8G8R8X8_UNORM = 88,
        BC6H_UF16 = 95,
        BC7_UNORM = 98,
    }
);

native_enum!(ResourceUsage {
    DEFAULT = 0,
    IMMUTABLE = 1,
    DYNAMIC = 2,
    STAGING = 3,
});

native_enum!(Blend {
    ZERO = 1,
    ONE = 2,
    SRC_COLOR = 3,
    INV_SRC_COLOR = 4,
    SRC_ALPHA = 5,
    INV_SRC_ALPHA = 6,
    DEST_ALPHA = 7,
    INV_DEST_ALPHA = 8,
    DEST_COLOR = 9,
    INV_DEST_COLOR = 10,
});

native_enum!(BlendOpNative {
    ADD = 1,
    SUBTRACT = 2,
});

native_enum!(FillModeNative {
    WIREFRAME = 2,
    SOLID = 3,
});

native_enum!(CullModeNative {
    NONE = 1,
    FRONT = 2,
    BACK = 3,
});

native_enum!(Topology {
    UNDEFINED = 0,
    POINTLIST = 1,
    LINELIST = 2,
    LINESTRIP = 3,
    TRIANGLELIST = 4,
    TRIANGLESTRIP = 5,
});

native_enum!(Filter {
    MIN_MAG_MIP_POINT = 0,
    MIN_MAG_MIP_LINEAR = 0x15,
    ANISOTROPIC = 0x55,
});

native_enum!(MapType {
    READ = 1,
    WRITE = 2,
    READ_WRITE = 3,
    WRITE_DISCARD = 4,
    WRITE_NO_OVERWRITE = 5,
});

native_enum!(ComparisonFunc {
    NEVER = 1,
    LESS = 2,
    ALWAYS = 8,
});

native_enum!(TextureAddressMode {
    WRAP = 1,
    CLAMP = 3,
});

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const CONSTANT_BUFFER = 0x4;
        const SHADER_RESOURCE = 0x8;
        const RENDER_TARGET = 0x20;
        const DEPTH_STENCIL = 0x40;
        const UNORDERED_ACCESS = 0x80;
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CpuAccess: u32 {
        const WRITE = 0x10000;
        const READ = 0x20000;
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MiscFlags: u32 {
        const DRAWINDIRECT_ARGS = 0x10;
        const BUFFER_STRUCTURED = 0x40;
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const DEPTH = 0x1;
        const STENCIL = 0x2;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Texture2dDesc {
    pub width: u32,
    pub height: u32,
    /// Zero requests the full chain.
    pub mip_levels: u32,
    pub array_size: u32,
    pub format: DxgiFormat,
    pub usage: ResourceUsage,
    pub bind: BindFlags,
    pub cpu_access: CpuAccess,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferDescNative {
    pub byte_width: u32,
    pub usage: ResourceUsage,
    pub bind: BindFlags,
    pub cpu_access: CpuAccess,
    pub misc: MiscFlags,
    pub structure_byte_stride: u32,
}

/// Initial contents for the first subresource of each array slice.
#[derive(Clone, Copy, Debug)]
pub struct SubresourceData<'a> {
    pub data: &'a [u8],
    pub row_pitch: u32,
    pub slice_pitch: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewDimension {
    Buffer { first_element: u32, num_elements: u32 },
    Texture2d { mip_levels: u32 },
    Texture2dArray { mip_levels: u32, array_size: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewDesc {
    pub format: DxgiFormat,
    pub dimension: ViewDimension,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputElementDesc {
    /// Every element uses the `VINPUT` semantic with this index.
    pub semantic_index: u32,
    pub format: DxgiFormat,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
    pub per_instance: bool,
    pub instance_step_rate: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTargetBlendDesc {
    pub blend_enable: bool,
    pub src_blend: Blend,
    pub dest_blend: Blend,
    pub blend_op: BlendOpNative,
    pub src_blend_alpha: Blend,
    pub dest_blend_alpha: Blend,
    pub blend_op_alpha: BlendOpNative,
    pub write_mask: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendDescNative {
    pub independent_blend_enable: bool,
    pub render_targets: [RenderTargetBlendDesc; 8],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterizerDescNative {
    pub fill_mode: FillModeNative,
    pub cull_mode: CullModeNative,
    pub front_counter_clockwise: bool,
    pub depth_clip_enable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthStencilDescNative {
    pub depth_enable: bool,
    pub depth_write_all: bool,
    pub depth_func: ComparisonFunc,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerDescNative {
    pub filter: Filter,
    pub address: TextureAddressMode,
    pub max_anisotropy: u32,
    pub comparison: ComparisonFunc,
    pub min_lod: f32,
    pub max_lod: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewportNative {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// `D3D11_BOX`; buffers use `left..right` as a byte range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NativeBox {
    pub left: u32,
    pub top: u32,
    pub front: u32,
    pub right: u32,
    pub bottom: u32,
    pub back: u32,
}

impl NativeBox {
    pub fn bytes(offset: u32, len: u32) -> Self {
        Self {
            left: offset,
            right: offset + len,
            bottom: 1,
            back: 1,
            ..Default::default()
        }
    }
}

/// Pointer returned by `Map`, valid until the matching `Unmap`.
#[derive(Clone, Copy, Debug)]
pub struct MappedSubresource {
    pub data: *mut u8,
    pub len: usize,
    pub row_pitch: u32,
    pub depth_pitch: u32,
}

/// Shader stage a binding call targets.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Pixel,
    Compute,
}

/// Device, immediate context and swap chain of one window.
///
/// Creation calls return [`HrResult`] so the context can route every failure
/// through its device-loss monitor. `release` of an already released object
/// is a no-op.
pub trait D3d11Device {
    fn feature_level(&self) -> FeatureLevel;
    fn adapter_description(&self) -> String;
    /// `D3D11_FEATURE_D3D10_X_HARDWARE_OPTIONS`.
    fn compute_shaders_plus_raw_and_structured_buffers(&mut self) -> HrResult<bool>;

    fn create_texture2d(
        &mut self,
        desc: &Texture2dDesc,
        initial: &[SubresourceData<'_>],
    ) -> HrResult<ComRef>;
    fn create_buffer(
        &mut self,
        desc: &BufferDescNative,
        initial: Option<&[u8]>,
    ) -> HrResult<ComRef>;
    fn create_shader_resource_view(&mut self, resource: ComRef, desc: &ViewDesc)
        -> HrResult<ComRef>;
    fn create_unordered_access_view(
        &mut self,
        resource: ComRef,
        desc: &ViewDesc,
    ) -> HrResult<ComRef>;
    fn create_render_target_view(&mut self, resource: ComRef) -> HrResult<ComRef>;
    fn create_depth_stencil_view(&mut self, resource: ComRef, format: DxgiFormat)
        -> HrResult<ComRef>;
    fn create_vertex_shader(&mut self, bytecode: &[u8]) -> HrResult<ComRef>;
    fn create_pixel_shader(&mut self, bytecode: &[u8]) -> HrResult<ComRef>;
    fn create_compute_shader(&mut self, bytecode: &[u8]) -> HrResult<ComRef>;
    fn create_input_layout(
        &mut self,
        elements: &[InputElementDesc],
        vs_bytecode: &[u8],
    ) -> HrResult<ComRef>;
    fn create_blend_state(&mut self, desc: &BlendDescNative) -> HrResult<ComRef>;
    fn create_rasterizer_state(&mut self, desc: &RasterizerDescNative) -> HrResult<ComRef>;
    fn create_depth_stencil_state(&mut self, desc: &DepthStencilDescNative) -> HrResult<ComRef>;
    fn create_sampler_state(&mut self, desc: &SamplerDescNative) -> HrResult<ComRef>;
    fn release(&mut self, object: ComRef);

    fn buffer_desc(&self, buffer: ComRef) -> Option<BufferDescNative>;
    fn texture2d_desc(&self, texture: ComRef) -> Option<Texture2dDesc>;

    fn map(
        &mut self,
        resource: ComRef,
        subresource: u32,
        map_type: MapType,
    ) -> HrResult<MappedSubresource>;
    fn unmap(&mut self, resource: ComRef, subresource: u32);
    /// Without `dst_box` the whole subresource is read from `data`.
    fn update_subresource(
        &mut self,
        resource: ComRef,
        subresource: u32,
        dst_box: Option<&NativeBox>,
        data: &[u8],
        row_pitch: u32,
        depth_pitch: u32,
    );
    fn copy_subresource_region(
        &mut self,
        dst: ComRef,
        dst_x: u32,
        dst_y: u32,
        src: ComRef,
        src_box: &NativeBox,
    );

    fn rs_set_viewports(&mut self, viewports: &[ViewportNative]);
    fn rs_set_state(&mut self, state: Option<ComRef>);
    fn om_set_blend_state(&mut self, state: Option<ComRef>);
    fn om_set_depth_stencil_state(&mut self, state: Option<ComRef>);
    fn om_set_render_targets(&mut self, rtvs: &[Option<ComRef>], dsv: Option<ComRef>);
    fn om_get_render_targets(&mut self) -> ([Option<ComRef>; 8], Option<ComRef>);
    fn ia_set_input_layout(&mut self, layout: Option<ComRef>);
    fn ia_set_vertex_buffers(&mut self, buffers: &[Option<ComRef>], strides: &[u32], offsets: &[u32]);
    fn ia_set_index_buffer(&mut self, buffer: Option<ComRef>, format: DxgiFormat);
    fn ia_set_primitive_topology(&mut self, topology: Topology);
    fn set_shader(&mut self, stage: Stage, shader: Option<ComRef>);
    /// `*SetConstantBuffers1`, ranges in 16 byte constants.
    fn set_constant_buffers(
        &mut self,
        stage: Stage,
        buffers: &[Option<ComRef>],
        first_constant: &[u32],
        num_constants: &[u32],
    );
    fn set_shader_resources(&mut self, stage: Stage, views: &[Option<ComRef>]);
    fn set_samplers(&mut self, stage: Stage, samplers: &[Option<ComRef>]);
    fn cs_set_unordered_access_views(&mut self, views: &[Option<ComRef>]);

    fn clear_render_target_view(&mut self, rtv: ComRef, color: [f32; 4]);
    fn clear_depth_stencil_view(&mut self, dsv: ComRef, flags: ClearFlags, depth: f32, stencil: u8);
    fn draw(&mut self, vertex_count: u32, start_vertex: u32);
    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    );
    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32);
    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    );
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// Views of the swap chain back buffer and its depth buffer.
    fn back_buffer_views(&self) -> (Option<ComRef>, Option<ComRef>);
    fn present(&mut self, sync_interval: u32) -> HrResult<()>;
    fn resize_buffers(&mut self) -> HrResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn com_ref_carries_handle() {
        let h = Handle::<u8>::new(42, 7);
        let r = ComRef::from_handle(h);
        assert_eq!(r.to_handle::<u8>(), h);
        assert_eq!(ComRef::from_handle(Handle::<u8>::default()).to_handle::<u8>(), Handle::default());
    }

    #[test]
    fn only_removed_and_reset_are_loss() {
        assert!(HResult::DEVICE_REMOVED.is_device_lost());
        assert!(HResult::DEVICE_RESET.is_device_lost());
        assert!(!HResult::DEVICE_HUNG.is_device_lost());
        assert!(!HResult::E_OUTOFMEMORY.is_device_lost());
        assert_eq!(HResult::DEVICE_REMOVED.to_string(), "HRESULT 0x887A0005");
    }
}
