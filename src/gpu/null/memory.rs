//! CPU texel storage and the pixel math the null devices rasterise with.

use glam::Vec4;

use crate::{BlendFactor, BlendOp, ColorBlendState, Component, CopyRegion, Format, FormatSize, Viewport};

/// Texel rectangle; `x1`/`y1` are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        }
    }

    /// Texels whose centre the viewport covers.
    pub fn from_viewport(vp: &Viewport) -> Self {
        let edge = |v: f32| (v - 0.5).ceil().max(0.0) as u32;
        Self {
            x0: edge(vp.x),
            y0: edge(vp.y),
            x1: edge(vp.x + vp.width),
            y1: edge(vp.y + vp.height),
        }
    }

    pub fn clamp(self, width: u32, height: u32) -> Self {
        Self {
            x0: self.x0.min(width),
            y0: self.y0.min(height),
            x1: self.x1.min(width),
            y1: self.y1.min(height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn unorm(v: f32, bits: u8) -> u32 {
    let max = ((1u64 << bits) - 1) as f64;
    (f64::from(v.clamp(0.0, 1.0)) * max + 0.5).floor() as u32
}

fn encode_component(component: Component, v: f32, out: &mut Vec<u8>) {
    match component {
        Component::Unorm(8) => out.push(unorm(v, 8) as u8),
        Component::Unorm(16) => out.extend_from_slice(&(unorm(v, 16) as u16).to_le_bytes()),
        Component::Snorm(16) => {
            let q = (v.clamp(-1.0, 1.0) * 32767.0).round() as i16;
            out.extend_from_slice(&q.to_le_bytes());
        }
        Component::Uint(8) => out.push(v.clamp(0.0, 255.0) as u8),
        Component::Uint(16) => out.extend_from_slice(&(v.clamp(0.0, 65535.0) as u16).to_le_bytes()),
        Component::Uint(32) => out.extend_from_slice(&(v.max(0.0) as u32).to_le_bytes()),
        Component::Sint(16) => {
            out.extend_from_slice(&(v.clamp(-32768.0, 32767.0) as i16).to_le_bytes())
        }
        Component::Float(16) => out.extend_from_slice(&half::f16::from_f32(v).to_le_bytes()),
        Component::Float(32) => out.extend_from_slice(&v.to_le_bytes()),
        other => panic!("{other:?} components are not stored by any format"),
    }
}

fn decode_component(component: Component, bytes: &[u8]) -> f32 {
    let u16_at = |b: &[u8]| u16::from_le_bytes([b[0], b[1]]);
    match component {
        Component::Unorm(8) => f32::from(bytes[0]) / 255.0,
        Component::Unorm(16) => f32::from(u16_at(bytes)) / 65535.0,
        Component::Snorm(16) => (f32::from(u16_at(bytes) as i16) / 32767.0).max(-1.0),
        Component::Uint(8) => f32::from(bytes[0]),
        Component::Uint(16) => f32::from(u16_at(bytes)),
        Component::Uint(32) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
        Component::Sint(16) => f32::from(u16_at(bytes) as i16),
        Component::Float(16) => half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f32(),
        Component::Float(32) => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        other => panic!("{other:?} components are not stored by any format"),
    }
}

/// Channel values in storage order.
fn storage_channels(format: Format, color: Vec4) -> [f32; 4] {
    let info = format.info();
    let rgb = |c: f32| if info.srgb { linear_to_srgb(c) } else { c };
    let [r, g, b, a] = color.to_array();
    if format == Format::U8x1NormToAlpha {
        [a, 0.0, 0.0, 0.0]
    } else if info.bgra {
        [rgb(b), rgb(g), rgb(r), a]
    } else {
        [rgb(r), rgb(g), rgb(b), a]
    }
}

/// Encodes one colour texel of `format`.
pub fn encode(format: Format, color: Vec4) -> Vec<u8> {
    let info = format.info();
    let Some(component) = info.component else {
        panic!("{format:?} has no colour texels");
    };
    let channels = storage_channels(format, color);
    let mut out = Vec::with_capacity(16);
    for v in &channels[..info.channels as usize] {
        encode_component(component, *v, &mut out);
    }
    out
}

/// Decodes one colour texel; missing channels read as (0, 0, 0, 1).
pub fn decode(format: Format, bytes: &[u8]) -> Vec4 {
    let info = format.info();
    let Some(component) = info.component else {
        panic!("{format:?} has no colour texels");
    };
    let step = component.bytes() as usize;
    let mut stored = [0.0; 4];
    for (i, v) in stored.iter_mut().take(info.channels as usize).enumerate() {
        *v = decode_component(component, &bytes[i * step..]);
    }

    let lin = |c: f32| if info.srgb { srgb_to_linear(c) } else { c };
    if format == Format::U8x1NormToAlpha {
        return Vec4::new(0.0, 0.0, 0.0, stored[0]);
    }
    let alpha = if info.channels == 4 { stored[3] } else { 1.0 };
    if info.bgra {
        Vec4::new(lin(stored[2]), lin(stored[1]), lin(stored[0]), alpha)
    } else {
        Vec4::new(lin(stored[0]), lin(stored[1]), lin(stored[2]), alpha)
    }
}

/// Encodes a depth/stencil texel.
pub fn encode_depth(format: Format, depth: f32, stencil: u8) -> Vec<u8> {
    match format {
        Format::D16 => (unorm(depth, 16) as u16).to_le_bytes().to_vec(),
        Format::D24S8 => (unorm(depth, 24) | (u32::from(stencil) << 24))
            .to_le_bytes()
            .to_vec(),
        other => panic!("{other:?} is not a depth format"),
    }
}

pub fn decode_depth(format: Format, bytes: &[u8]) -> (f32, u8) {
    match format {
        Format::D16 => (f32::from(u16::from_le_bytes([bytes[0], bytes[1]])) / 65535.0, 0),
        Format::D24S8 => {
            let v = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            ((v & 0x00FF_FFFF) as f32 / 16_777_215.0, (v >> 24) as u8)
        }
        other => panic!("{other:?} is not a depth format"),
    }
}

fn factor(f: BlendFactor, src: Vec4, dst: Vec4) -> Vec4 {
    match f {
        BlendFactor::Zero => Vec4::ZERO,
        BlendFactor::One => Vec4::ONE,
        BlendFactor::SrcColor => src,
        BlendFactor::InvSrcColor => Vec4::ONE - src,
        BlendFactor::DstColor => dst,
        BlendFactor::InvDstColor => Vec4::ONE - dst,
        BlendFactor::SrcAlpha => Vec4::splat(src.w),
        BlendFactor::InvSrcAlpha => Vec4::splat(1.0 - src.w),
        BlendFactor::DstAlpha => Vec4::splat(dst.w),
        BlendFactor::InvDstAlpha => Vec4::splat(1.0 - dst.w),
    }
}

fn combine(op: BlendOp, a: Vec4, b: Vec4) -> Vec4 {
    match op {
        BlendOp::Add => a + b,
        BlendOp::Subtract => a - b,
    }
}

/// Fixed-function blend of `src` over `dst`.
pub fn blend(state: &ColorBlendState, src: Vec4, dst: Vec4) -> Vec4 {
    if !state.enable {
        return src;
    }
    let rgb = combine(
        state.op,
        src * factor(state.src, src, dst),
        dst * factor(state.dst, src, dst),
    );
    let alpha = combine(
        state.op_alpha,
        src * factor(state.src_alpha, src, dst),
        dst * factor(state.dst_alpha, src, dst),
    );
    rgb.truncate().extend(alpha.w)
}

/// Array of equally sized 2D slices held in CPU memory.
#[derive(Clone, Debug)]
pub struct SoftImage {
    pub width: u32,
    pub height: u32,
    pub slices: u32,
    pub format: Format,
    pub data: Vec<u8>,
}

impl SoftImage {
    pub fn new(width: u32, height: u32, slices: u32, format: Format) -> Self {
        let slices = slices.max(1);
        let size = slices as usize * format.slice_size(width, height) as usize;
        Self {
            width,
            height,
            slices,
            format,
            data: vec![0; size],
        }
    }

    pub fn slice_size(&self) -> usize {
        self.format.slice_size(self.width, self.height) as usize
    }

    pub fn row_pitch(&self) -> u32 {
        self.format.row_pitch(self.width)
    }

    pub fn slice(&self, slice: u32) -> &[u8] {
        let size = self.slice_size();
        let start = slice as usize * size;
        &self.data[start..start + size]
    }

    pub fn slice_mut(&mut self, slice: u32) -> &mut [u8] {
        let size = self.slice_size();
        let start = slice as usize * size;
        &mut self.data[start..start + size]
    }

    /// Bytes and edge length of the unit the format is addressed in.
    fn unit(&self) -> (usize, u32) {
        match self.format.info().size {
            FormatSize::Texel(bytes) => (bytes as usize, 1),
            FormatSize::Block(bytes) => (bytes as usize, 4),
        }
    }

    fn offset(&self, slice: u32, x: u32, y: u32) -> usize {
        let (bytes, dim) = self.unit();
        slice as usize * self.slice_size()
            + (y / dim) as usize * self.row_pitch() as usize
            + (x / dim) as usize * bytes
    }

    pub fn texel(&self, slice: u32, x: u32, y: u32) -> &[u8] {
        let (bytes, _) = self.unit();
        let at = self.offset(slice, x, y);
        &self.data[at..at + bytes]
    }

    pub fn read(&self, slice: u32, x: u32, y: u32) -> Vec4 {
        decode(self.format, self.texel(slice, x, y))
    }

    /// Writes the encoded texel `bytes` to every texel of `rect`.
    pub fn fill(&mut self, slice: u32, rect: Rect, bytes: &[u8]) {
        let rect = rect.clamp(self.width, self.height);
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                let at = self.offset(slice, x, y);
                self.data[at..at + bytes.len()].copy_from_slice(bytes);
            }
        }
    }

    /// Blends `color` into every texel of `rect`.
    pub fn shade(&mut self, slice: u32, rect: Rect, color: Vec4, state: &ColorBlendState) {
        let rect = rect.clamp(self.width, self.height);
        if !state.enable {
            self.fill(slice, rect, &encode(self.format, color));
            return;
        }
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                let out = blend(state, color, self.read(slice, x, y));
                let bytes = encode(self.format, out);
                let at = self.offset(slice, x, y);
                self.data[at..at + bytes.len()].copy_from_slice(&bytes);
            }
        }
    }

    /// Stores tightly packed rows of `data` into `rect`.
    pub fn write_rect(&mut self, slice: u32, rect: Rect, data: &[u8]) {
        let (bytes, dim) = self.unit();
        let run = (rect.x1 - rect.x0).div_ceil(dim) as usize * bytes;
        for (row, y) in (rect.y0..rect.y1).step_by(dim as usize).enumerate() {
            let Some(src) = data.get(row * run..(row + 1) * run) else {
                break;
            };
            let at = self.offset(slice, rect.x0, y);
            self.data[at..at + run].copy_from_slice(src);
        }
    }

    /// Tightly packed rows of `rect`.
    pub fn read_rect(&self, slice: u32, rect: Rect) -> Vec<u8> {
        let (bytes, dim) = self.unit();
        let run = (rect.x1 - rect.x0).div_ceil(dim) as usize * bytes;
        let mut out = Vec::with_capacity(run * (rect.y1 - rect.y0) as usize);
        for y in (rect.y0..rect.y1).step_by(dim as usize) {
            let at = self.offset(slice, rect.x0, y);
            out.extend_from_slice(&self.data[at..at + run]);
        }
        out
    }

    /// Copies `region` of slice 0 of `src` into slice 0 of `self`.
    pub fn copy_region(&mut self, src: &SoftImage, region: &CopyRegion) {
        let (bytes, dim) = self.unit();
        let run = region.width.div_ceil(dim) as usize * bytes;
        let mut y = 0;
        while y < region.height {
            let from = src.offset(0, region.src_x, region.src_y + y);
            let to = self.offset(0, region.dst_x, region.dst_y + y);
            self.data[to..to + run].copy_from_slice(&src.data[from..from + run]);
            y += dim;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba8(format: Format, c: Vec4) -> Vec<u8> {
        encode(format, c)
    }

    #[test]
    fn unorm_rounds_to_nearest() {
        assert_eq!(rgba8(Format::U8x4Norm, Vec4::new(0.0, 0.5, 1.0, 1.0)), [0, 128, 255, 255]);
        assert_eq!(rgba8(Format::U8x4Norm, Vec4::new(-1.0, 2.0, 0.25, 0.0)), [0, 255, 64, 0]);
    }

    #[test]
    fn bgra_and_alpha_only_layouts() {
        assert_eq!(rgba8(Format::U8x4NormBgra, Vec4::new(1.0, 0.0, 0.0, 1.0)), [0, 0, 255, 255]);
        assert_eq!(rgba8(Format::U8x1NormToAlpha, Vec4::new(1.0, 1.0, 1.0, 0.5)), [128]);
        let back = decode(Format::U8x4NormBgra, &[0, 0, 255, 255]);
        assert_eq!(back, Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn srgb_encodes_mid_grey_brighter() {
        let bytes = rgba8(Format::U8x4NormSrgb, Vec4::new(0.5, 0.5, 0.5, 0.5));
        assert_eq!(bytes, [188, 188, 188, 128]);
        let back = decode(Format::U8x4NormSrgb, &bytes);
        assert!((back.x - 0.5).abs() < 0.01);
    }

    #[test]
    fn float_and_integer_texels() {
        let h = encode(Format::F16x2, Vec4::new(1.0, -2.0, 0.0, 0.0));
        assert_eq!(h.len(), 4);
        assert_eq!(decode(Format::F16x2, &h), Vec4::new(1.0, -2.0, 0.0, 1.0));
        let u = encode(Format::U32x1, Vec4::new(7.0, 0.0, 0.0, 0.0));
        assert_eq!(u, 7u32.to_le_bytes());
        let s = encode(Format::I16x2Norm, Vec4::new(-1.0, 1.0, 0.0, 0.0));
        assert_eq!(decode(Format::I16x2Norm, &s).truncate().truncate(), glam::Vec2::new(-1.0, 1.0));
    }

    #[test]
    fn depth_stencil_packing() {
        let d = encode_depth(Format::D24S8, 1.0, 0x80);
        assert_eq!(d, [0xFF, 0xFF, 0xFF, 0x80]);
        assert_eq!(decode_depth(Format::D24S8, &d), (1.0, 0x80));
        assert_eq!(encode_depth(Format::D16, 0.0, 0), [0, 0]);
    }

    #[test]
    fn alpha_blend_over_blue() {
        let state = ColorBlendState::alpha_blend();
        let dst = decode(Format::U8x4Norm, &[0, 0, 255, 128]);
        let out = blend(&state, Vec4::new(1.0, 0.0, 0.0, 0.5), dst);
        assert_eq!(encode(Format::U8x4Norm, out), [128, 0, 128, 128]);
        let off = ColorBlendState::default();
        assert_eq!(blend(&off, Vec4::ONE, Vec4::ZERO), Vec4::ONE);
    }

    #[test]
    fn viewport_covers_texel_centres() {
        let vp = Viewport::new(0.0, 0.0, 256.0, 256.0);
        assert_eq!(Rect::from_viewport(&vp), Rect::full(256, 256));
        let vp = Viewport::new(-10.0, 2.4, 4.0, 1.0);
        let r = Rect::from_viewport(&vp);
        assert!(r.is_empty());
        assert_eq!(Rect::full(300, 300).clamp(64, 32), Rect::full(64, 32));
    }

    #[test]
    fn shade_respects_rect_and_copy_moves_rows() {
        let mut img = SoftImage::new(4, 4, 1, Format::U8x4Norm);
        img.shade(
            0,
            Rect { x0: 1, y0: 1, x1: 3, y1: 2 },
            Vec4::ONE,
            &ColorBlendState::default(),
        );
        assert_eq!(img.texel(0, 0, 0), [0, 0, 0, 0]);
        assert_eq!(img.texel(0, 2, 1), [255, 255, 255, 255]);

        let mut dst = SoftImage::new(4, 4, 1, Format::U8x4Norm);
        dst.copy_region(
            &img,
            &CopyRegion {
                src_x: 1,
                src_y: 1,
                dst_x: 0,
                dst_y: 3,
                width: 2,
                height: 1,
            },
        );
        assert_eq!(dst.texel(0, 1, 3), [255, 255, 255, 255]);
        assert_eq!(dst.texel(0, 2, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn rect_rows_are_tightly_packed() {
        let mut img = SoftImage::new(4, 2, 2, Format::U8x1Norm);
        let rect = Rect { x0: 1, y0: 0, x1: 3, y1: 2 };
        img.write_rect(1, rect, &[1, 2, 3, 4]);
        assert_eq!(img.slice(0), [0; 8]);
        assert_eq!(img.slice(1), [0, 1, 2, 0, 0, 3, 4, 0]);
        assert_eq!(img.read_rect(1, rect), [1, 2, 3, 4]);

        let mut bc = SoftImage::new(8, 8, 1, Format::BC1);
        bc.write_rect(0, Rect { x0: 4, y0: 4, x1: 8, y1: 8 }, &[7; 8]);
        assert_eq!(bc.texel(0, 5, 5), [7; 8]);
        assert_eq!(bc.read_rect(0, Rect::full(8, 8)).len(), 32);
    }
}
