use super::native::{
    Blend, BlendOpNative, CullModeNative, DxgiFormat, FillModeNative, Filter, MapType,
    ResourceUsage, Topology, ViewportNative,
};
use crate::{
    BlendFactor, BlendOp, CullMode, FillMode, Format, MapKind, PrimitiveType, TextureFiltering,
    Usage, Viewport,
};

impl From<Format> for DxgiFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Null => DxgiFormat::UNKNOWN,
            Format::U8x1Norm => DxgiFormat::R8_UNORM,
            Format::U8x1NormToAlpha => DxgiFormat::A8_UNORM,
            Format::U8x2Norm => DxgiFormat::R8G8_UNORM,
            Format::U8x4Norm => DxgiFormat::R8G8B8A8_UNORM,
            Format::U8x4NormSrgb => DxgiFormat::R8G8B8A8_UNORM_SRGB,
            Format::U8x4NormBgrx => DxgiFormat::B8G8R8X8_UNORM,
            Format::U8x4NormBgra => DxgiFormat::B8G8R8A8_UNORM,
            Format::U8x1 => DxgiFormat::R8_UINT,
            Format::U8x2 => DxgiFormat::R8G8_UINT,
            Format::U8x4 => DxgiFormat::R8G8B8A8_UINT,
            Format::I16x2Norm => DxgiFormat::R16G16_SNORM,
            Format::I16x4Norm => DxgiFormat::R16G16B16A16_SNORM,
            Format::I16x2 => DxgiFormat::R16G16_SINT,
            Format::I16x4 => DxgiFormat::R16G16B16A16_SINT,
            Format::U16x1Norm => DxgiFormat::R16_UNORM,
            Format::U16x2Norm => DxgiFormat::R16G16_UNORM,
            Format::U16x4Norm => DxgiFormat::R16G16B16A16_UNORM,
            Format::U16x1 => DxgiFormat::R16_UINT,
            Format::U16x2 => DxgiFormat::R16G16_UINT,
            Format::U16x4 => DxgiFormat::R16G16B16A16_UINT,
            Format::U32x1 => DxgiFormat::R32_UINT,
            Format::U32x2 => DxgiFormat::R32G32_UINT,
            Format::U32x4 => DxgiFormat::R32G32B32A32_UINT,
            Format::F16x2 => DxgiFormat::R16G16_FLOAT,
            Format::F16x4 => DxgiFormat::R16G16B16A16_FLOAT,
            Format::F32x1 => DxgiFormat::R32_FLOAT,
            Format::F32x2 => DxgiFormat::R32G32_FLOAT,
            Format::F32x3 => DxgiFormat::R32G32B32_FLOAT,
            Format::F32x4 => DxgiFormat::R32G32B32A32_FLOAT,
            Format::D16 => DxgiFormat::D16_UNORM,
            Format::D24S8 => DxgiFormat::D24_UNORM_S8_UINT,
            Format::BC1 => DxgiFormat::BC1_UNORM,
            Format::BC2 => DxgiFormat::BC2_UNORM,
            Format::BC3 => DxgiFormat::BC3_UNORM,
            Format::BC4 => DxgiFormat::BC4_UNORM,
            Format::BC5 => DxgiFormat::BC5_UNORM,
            Format::BC6 => DxgiFormat::BC6H_UF16,
            Format::BC7 => DxgiFormat::BC7_UNORM,
        }
    }
}

/// Native formats of a depth texture that is also sampled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthFormats {
    pub storage: DxgiFormat,
    pub shader_view: DxgiFormat,
    pub depth_view: DxgiFormat,
}

/// Typeless storage plus readable view for sampled depth formats.
pub fn sampled_depth_formats(format: Format) -> Option<DepthFormats> {
    match format {
        Format::D16 => Some(DepthFormats {
            storage: DxgiFormat::R16_TYPELESS,
            shader_view: DxgiFormat::R16_UNORM,
            depth_view: DxgiFormat::D16_UNORM,
        }),
        Format::D24S8 => Some(DepthFormats {
            storage: DxgiFormat::R24G8_TYPELESS,
            shader_view: DxgiFormat::R24_UNORM_X8_TYPELESS,
            depth_view: DxgiFormat::D24_UNORM_S8_UINT,
        }),
        _ => None,
    }
}

impl From<Usage> for ResourceUsage {
    fn from(usage: Usage) -> Self {
        match usage {
            Usage::Immutable => ResourceUsage::IMMUTABLE,
            Usage::Dynamic => ResourceUsage::DYNAMIC,
            Usage::GpuReadWrite => ResourceUsage::DEFAULT,
            Usage::Staging => ResourceUsage::STAGING,
        }
    }
}

impl From<BlendFactor> for Blend {
    fn from(factor: BlendFactor) -> Self {
        match factor {
            BlendFactor::Zero => Blend::ZERO,
            BlendFactor::One => Blend::ONE,
            BlendFactor::SrcColor => Blend::SRC_COLOR,
            BlendFactor::InvSrcColor => Blend::INV_SRC_COLOR,
            BlendFactor::DstColor => Blend::DEST_COLOR,
            BlendFactor::InvDstColor => Blend::INV_DEST_COLOR,
            BlendFactor::SrcAlpha => Blend::SRC_ALPHA,
            BlendFactor::InvSrcAlpha => Blend::INV_SRC_ALPHA,
            BlendFactor::DstAlpha => Blend::DEST_ALPHA,
            BlendFactor::InvDstAlpha => Blend::INV_DEST_ALPHA,
        }
    }
}

impl From<BlendOp> for BlendOpNative {
    fn from(op: BlendOp) -> Self {
        match op {
            BlendOp::Add => BlendOpNative::ADD,
            BlendOp::Subtract => BlendOpNative::SUBTRACT,
        }
    }
}

impl From<FillMode> for FillModeNative {
    fn from(mode: FillMode) -> Self {
        match mode {
            FillMode::Solid => FillModeNative::SOLID,
            FillMode::Wireframe => FillModeNative::WIREFRAME,
        }
    }
}

impl From<CullMode> for CullModeNative {
    fn from(mode: CullMode) -> Self {
        match mode {
            CullMode::None => CullModeNative::NONE,
            CullMode::Front => CullModeNative::FRONT,
            CullMode::Back => CullModeNative::BACK,
        }
    }
}

impl From<PrimitiveType> for Topology {
    fn from(primitive: PrimitiveType) -> Self {
        match primitive {
            PrimitiveType::TriangleList => Topology::TRIANGLELIST,
            PrimitiveType::TriangleStrip => Topology::TRIANGLESTRIP,
            PrimitiveType::LineList => Topology::LINELIST,
            PrimitiveType::LineStrip => Topology::LINESTRIP,
            PrimitiveType::PointList => Topology::POINTLIST,
            PrimitiveType::TriangleFan => {
                panic!("triangle fans have no Direct3D 11 topology")
            }
        }
    }
}

impl From<TextureFiltering> for Filter {
    fn from(filtering: TextureFiltering) -> Self {
        match filtering {
            TextureFiltering::Nearest => Filter::MIN_MAG_MIP_POINT,
            TextureFiltering::Linear => Filter::MIN_MAG_MIP_LINEAR,
            TextureFiltering::Anisotropic => Filter::ANISOTROPIC,
        }
    }
}

impl From<MapKind> for MapType {
    fn from(kind: MapKind) -> Self {
        match kind {
            MapKind::Read => MapType::READ,
            MapKind::Write => MapType::WRITE,
            MapKind::ReadWrite => MapType::READ_WRITE,
            MapKind::Discard => MapType::WRITE_DISCARD,
            MapKind::NoOverwrite => MapType::WRITE_NO_OVERWRITE,
        }
    }
}

impl From<&Viewport> for ViewportNative {
    fn from(v: &Viewport) -> Self {
        ViewportNative {
            top_left_x: v.x,
            top_left_y: v.y,
            width: v.width,
            height: v.height,
            min_depth: v.min_depth,
            max_depth: v.max_depth,
        }
    }
}

/// `D3D11CalcSubresource` for mip 0 of `slice`.
pub fn subresource(slice: u32, mip_levels: u32) -> u32 {
    slice * mip_levels.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_null_maps_to_unknown() {
        for f in Format::ALL {
            let native = DxgiFormat::from(f);
            assert_eq!(native == DxgiFormat::UNKNOWN, f == Format::Null, "{f:?}");
        }
    }

    #[test]
    fn sampled_depth_uses_typeless_storage() {
        let d16 = sampled_depth_formats(Format::D16).unwrap();
        assert_eq!(d16.storage, DxgiFormat::R16_TYPELESS);
        assert_eq!(d16.shader_view, DxgiFormat::R16_UNORM);
        let d24 = sampled_depth_formats(Format::D24S8).unwrap();
        assert_eq!(d24.depth_view, DxgiFormat::D24_UNORM_S8_UINT);
        assert!(sampled_depth_formats(Format::U8x4Norm).is_none());
    }

    #[test]
    #[should_panic(expected = "triangle fans")]
    fn fans_are_rejected() {
        let _ = Topology::from(PrimitiveType::TriangleFan);
    }
}
