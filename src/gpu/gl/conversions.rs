use glow as gl;

use crate::{
    BlendFactor, BlendOp, Component, CullMode, FillMode, Format, MapKind, PrimitiveType,
    TextureFiltering, Usage,
};

// Extension enumerants.
pub const COMPRESSED_RGBA_S3TC_DXT1_EXT: u32 = 0x83F1;
pub const COMPRESSED_RGBA_S3TC_DXT3_EXT: u32 = 0x83F2;
pub const COMPRESSED_RGBA_S3TC_DXT5_EXT: u32 = 0x83F3;
pub const COMPRESSED_RED_RGTC1: u32 = 0x8DBB;
pub const COMPRESSED_RG_RGTC2: u32 = 0x8DBD;
pub const COMPRESSED_RGBA_BPTC_UNORM: u32 = 0x8E8C;
pub const COMPRESSED_RGB_BPTC_UNSIGNED_FLOAT: u32 = 0x8E8F;
pub const TEXTURE_MAX_ANISOTROPY_EXT: u32 = 0x84FE;
pub const MAX_TEXTURE_MAX_ANISOTROPY_EXT: u32 = 0x84FF;

/// Native description of a texel format.
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlFormat {
    /// Sized internal format.
    pub internal: u32,
    /// Client pixel format for uploads and read-back.
    pub format: u32,
    pub ty: u32,
    pub compressed: bool,
}

impl GlFormat {
    const fn texel(internal: u32, format: u32, ty: u32) -> Self {
        Self {
            internal,
            format,
            ty,
            compressed: false,
        }
    }

    const fn block(internal: u32) -> Self {
        Self {
            internal,
            format: 0,
            ty: 0,
            compressed: true,
        }
    }

    pub fn of(format: Format) -> Self {
        match format {
            Format::Null => Self::texel(gl::NONE, gl::NONE, gl::NONE),
            Format::U8x1Norm | Format::U8x1NormToAlpha => Self::texel(gl::R8, gl::RED, gl::UNSIGNED_BYTE),
            Format::U8x2Norm => Self::texel(gl::RG8, gl::RG, gl::UNSIGNED_BYTE),
            Format::U8x4Norm => Self::texel(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE),
            Format::U8x4NormSrgb => Self::texel(gl::SRGB8_ALPHA8, gl::RGBA, gl::UNSIGNED_BYTE),
            Format::U8x4NormBgrx | Format::U8x4NormBgra => Self::texel(gl::RGBA8, gl::BGRA, gl::UNSIGNED_BYTE),
            Format::U8x1 => Self::texel(gl::R8UI, gl::RED_INTEGER, gl::UNSIGNED_BYTE),
            Format::U8x2 => Self::texel(gl::RG8UI, gl::RG_INTEGER, gl::UNSIGNED_BYTE),
            Format::U8x4 => Self::texel(gl::RGBA8UI, gl::RGBA_INTEGER, gl::UNSIGNED_BYTE),
            Format::I16x2Norm => Self::texel(gl::RG16_SNORM, gl::RG, gl::SHORT),
            Format::I16x4Norm => Self::texel(gl::RGBA16_SNORM, gl::RGBA, gl::SHORT),
            Format::I16x2 => Self::texel(gl::RG16I, gl::RG_INTEGER, gl::SHORT),
            Format::I16x4 => Self::texel(gl::RGBA16I, gl::RGBA_INTEGER, gl::SHORT),
            Format::U16x1Norm => Self::texel(gl::R16, gl::RED, gl::UNSIGNED_SHORT),
            Format::U16x2Norm => Self::texel(gl::RG16, gl::RG, gl::UNSIGNED_SHORT),
            Format::U16x4Norm => Self::texel(gl::RGBA16, gl::RGBA, gl::UNSIGNED_SHORT),
            Format::U16x1 => Self::texel(gl::R16UI, gl::RED_INTEGER, gl::UNSIGNED_SHORT),
            Format::U16x2 => Self::texel(gl::RG16UI, gl::RG_INTEGER, gl::UNSIGNED_SHORT),
            Format::U16x4 => Self::texel(gl::RGBA16UI, gl::RGBA_INTEGER, gl::UNSIGNED_SHORT),
            Format::U32x1 => Self::texel(gl::R32UI, gl::RED_INTEGER, gl::UNSIGNED_INT),
            Format::U32x2 => Self::texel(gl::RG32UI, gl::RG_INTEGER, gl::UNSIGNED_INT),
            Format::U32x4 => Self::texel(gl::RGBA32UI, gl::RGBA_INTEGER, gl::UNSIGNED_INT),
            Format::F16x2 => Self::texel(gl::RG16F, gl::RG, gl::HALF_FLOAT),
            Format::F16x4 => Self::texel(gl::RGBA16F, gl::RGBA, gl::HALF_FLOAT),
            Format::F32x1 => Self::texel(gl::R32F, gl::RED, gl::FLOAT),
            Format::F32x2 => Self::texel(gl::RG32F, gl::RG, gl::FLOAT),
            Format::F32x3 => Self::texel(gl::RGB32F, gl::RGB, gl::FLOAT),
            Format::F32x4 => Self::texel(gl::RGBA32F, gl::RGBA, gl::FLOAT),
            Format::D16 => Self::texel(gl::DEPTH_COMPONENT16, gl::DEPTH_COMPONENT, gl::UNSIGNED_SHORT),
            Format::D24S8 => Self::texel(gl::DEPTH24_STENCIL8, gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8),
            Format::BC1 => Self::block(COMPRESSED_RGBA_S3TC_DXT1_EXT),
            Format::BC2 => Self::block(COMPRESSED_RGBA_S3TC_DXT3_EXT),
            Format::BC3 => Self::block(COMPRESSED_RGBA_S3TC_DXT5_EXT),
            Format::BC4 => Self::block(COMPRESSED_RED_RGTC1),
            Format::BC5 => Self::block(COMPRESSED_RG_RGTC2),
            Format::BC6 => Self::block(COMPRESSED_RGB_BPTC_UNSIGNED_FLOAT),
            Format::BC7 => Self::block(COMPRESSED_RGBA_BPTC_UNORM),
        }
    }

    /// Abstract format whose storage a sized internal format holds.
    pub fn storage_format(internal: u32) -> Option<Format> {
        Format::ALL
            .into_iter()
            .skip(1)
            .find(|f| Self::of(*f).internal == internal)
    }
}

/// Channel swizzle (r, g, b, a) for formats GL stores in other channels.
pub fn texture_swizzle(format: Format) -> Option<[u32; 4]> {
    match format {
        Format::U8x1NormToAlpha => Some([gl::ZERO, gl::ZERO, gl::ZERO, gl::RED]),
        _ => None,
    }
}

/// Framebuffer attachment point of a depth format.
pub fn depth_attachment(format: Format) -> u32 {
    if format.info().stencil {
        gl::DEPTH_STENCIL_ATTACHMENT
    } else {
        gl::DEPTH_ATTACHMENT
    }
}

/// `glVertexAttrib*Pointer` arguments for an attribute format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribFormat {
    pub size: i32,
    pub ty: u32,
    pub normalized: bool,
    /// Goes through `glVertexAttribIPointer`.
    pub integer: bool,
}

pub fn vertex_attrib_format(format: Format) -> VertexAttribFormat {
    let info = format.info();
    let Some(component) = info.component else {
        panic!("{format:?} cannot be a vertex attribute");
    };
    let (ty, normalized) = match component {
        Component::Unorm(8) | Component::Uint(8) => (gl::UNSIGNED_BYTE, matches!(component, Component::Unorm(_))),
        Component::Unorm(16) | Component::Uint(16) => (gl::UNSIGNED_SHORT, matches!(component, Component::Unorm(_))),
        Component::Snorm(16) | Component::Sint(16) => (gl::SHORT, matches!(component, Component::Snorm(_))),
        Component::Uint(32) => (gl::UNSIGNED_INT, false),
        Component::Float(16) => (gl::HALF_FLOAT, false),
        Component::Float(32) => (gl::FLOAT, false),
        other => panic!("{other:?} vertex components are not supported"),
    };
    VertexAttribFormat {
        size: info.channels as i32,
        ty,
        normalized,
        integer: component.is_integer(),
    }
}

pub fn buffer_usage(usage: Usage) -> u32 {
    match usage {
        Usage::Immutable => gl::STATIC_DRAW,
        Usage::Dynamic => gl::DYNAMIC_DRAW,
        Usage::GpuReadWrite => gl::DYNAMIC_COPY,
        Usage::Staging => gl::DYNAMIC_READ,
    }
}

pub fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => gl::ZERO,
        BlendFactor::One => gl::ONE,
        BlendFactor::SrcColor => gl::SRC_COLOR,
        BlendFactor::InvSrcColor => gl::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => gl::DST_COLOR,
        BlendFactor::InvDstColor => gl::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => gl::SRC_ALPHA,
        BlendFactor::InvSrcAlpha => gl::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => gl::DST_ALPHA,
        BlendFactor::InvDstAlpha => gl::ONE_MINUS_DST_ALPHA,
    }
}

pub fn blend_equation(op: BlendOp) -> u32 {
    match op {
        BlendOp::Add => gl::FUNC_ADD,
        BlendOp::Subtract => gl::FUNC_SUBTRACT,
    }
}

/// `None` disables culling.
pub fn cull_face(mode: CullMode) -> Option<u32> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(gl::FRONT),
        CullMode::Back => Some(gl::BACK),
    }
}

pub fn polygon_mode(mode: FillMode) -> u32 {
    match mode {
        FillMode::Solid => gl::FILL,
        FillMode::Wireframe => gl::LINE,
    }
}

pub fn primitive_mode(primitive: PrimitiveType) -> u32 {
    match primitive {
        PrimitiveType::TriangleList => gl::TRIANGLES,
        PrimitiveType::TriangleStrip => gl::TRIANGLE_STRIP,
        PrimitiveType::TriangleFan => gl::TRIANGLE_FAN,
        PrimitiveType::LineList => gl::LINES,
        PrimitiveType::LineStrip => gl::LINE_STRIP,
        PrimitiveType::PointList => gl::POINTS,
    }
}

/// (min, mag) filters.
pub fn sampler_filters(filtering: TextureFiltering) -> (u32, u32) {
    match filtering {
        TextureFiltering::Nearest => (gl::NEAREST_MIPMAP_NEAREST, gl::NEAREST),
        TextureFiltering::Linear | TextureFiltering::Anisotropic => {
            (gl::LINEAR_MIPMAP_LINEAR, gl::LINEAR)
        }
    }
}

pub fn map_access(kind: MapKind) -> u32 {
    match kind {
        MapKind::Read => gl::MAP_READ_BIT,
        MapKind::Write => gl::MAP_WRITE_BIT,
        MapKind::ReadWrite => gl::MAP_READ_BIT | gl::MAP_WRITE_BIT,
        MapKind::Discard => gl::MAP_WRITE_BIT | gl::MAP_INVALIDATE_BUFFER_BIT,
        MapKind::NoOverwrite => gl::MAP_WRITE_BIT | gl::MAP_UNSYNCHRONIZED_BIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_matches_format_table() {
        for f in Format::ALL.into_iter().skip(1) {
            assert_eq!(GlFormat::of(f).compressed, f.is_compressed(), "{f:?}");
        }
    }

    #[test]
    fn only_null_maps_to_none() {
        for f in Format::ALL {
            let native = GlFormat::of(f);
            assert_eq!(native.internal == gl::NONE, f == Format::Null, "{f:?}");
        }
        assert_eq!(GlFormat::of(Format::Null).format, gl::NONE);
    }

    #[test]
    fn alpha_only_format_reads_red_into_alpha() {
        assert_eq!(GlFormat::of(Format::U8x1NormToAlpha).internal, gl::R8);
        assert_eq!(
            texture_swizzle(Format::U8x1NormToAlpha),
            Some([gl::ZERO, gl::ZERO, gl::ZERO, gl::RED])
        );
        assert_eq!(texture_swizzle(Format::U8x1Norm), None);
    }

    #[test]
    fn internal_formats_resolve_back() {
        assert_eq!(GlFormat::storage_format(gl::RGBA8), Some(Format::U8x4Norm));
        assert_eq!(GlFormat::storage_format(gl::DEPTH24_STENCIL8), Some(Format::D24S8));
        assert_eq!(GlFormat::storage_format(COMPRESSED_RGBA_BPTC_UNORM), Some(Format::BC7));
        assert_eq!(GlFormat::storage_format(0), None);
    }

    #[test]
    fn attribute_formats() {
        let rgba8 = vertex_attrib_format(Format::U8x4Norm);
        assert_eq!((rgba8.size, rgba8.ty, rgba8.normalized, rgba8.integer), (4, gl::UNSIGNED_BYTE, true, false));
        let uint = vertex_attrib_format(Format::U32x2);
        assert!(uint.integer && !uint.normalized);
        let snorm = vertex_attrib_format(Format::I16x2Norm);
        assert_eq!((snorm.ty, snorm.normalized), (gl::SHORT, true));
        assert_eq!(vertex_attrib_format(Format::F32x3).size, 3);
    }

    #[test]
    fn depth_attachment_points() {
        assert_eq!(depth_attachment(Format::D24S8), gl::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(depth_attachment(Format::D16), gl::DEPTH_ATTACHMENT);
    }
}
