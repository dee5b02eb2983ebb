//! Backend independent format metadata.
//!
//! Native ids live with each backend (`d3d11::conversions`,
//! `gl::conversions`); this table only describes what a texel looks like.

#[cfg(feature = "rhal-serde")]
use serde::{Deserialize, Serialize};

use super::structs::Format;

/// Byte size of the unit a format is addressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatSize {
    /// Uncompressed, bytes per texel.
    Texel(u32),
    /// Block compressed, bytes per 4x4 block.
    Block(u32),
}

/// Storage of a single colour component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    Unorm(u8),
    Snorm(u8),
    Uint(u8),
    Sint(u8),
    Float(u8),
}

impl Component {
    pub fn bytes(self) -> u32 {
        match self {
            Component::Unorm(bits)
            | Component::Snorm(bits)
            | Component::Uint(bits)
            | Component::Sint(bits)
            | Component::Float(bits) => u32::from(bits) / 8,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Component::Uint(_) | Component::Sint(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatInfo {
    pub size: FormatSize,
    /// Colour channels; zero for depth and compressed formats.
    pub channels: u32,
    /// `None` for depth and compressed formats.
    pub component: Option<Component>,
    pub srgb: bool,
    /// Channels stored blue first.
    pub bgra: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl FormatInfo {
    const fn color(channels: u32, component: Component) -> Self {
        let bits = match component {
            Component::Unorm(b)
            | Component::Snorm(b)
            | Component::Uint(b)
            | Component::Sint(b)
            | Component::Float(b) => b as u32,
        };
        Self {
            size: FormatSize::Texel(channels * bits / 8),
            channels,
            component: Some(component),
            srgb: false,
            bgra: false,
            depth: false,
            stencil: false,
        }
    }

    const fn srgb(mut self) -> Self {
        self.srgb = true;
        self
    }

    const fn bgra(mut self) -> Self {
        self.bgra = true;
        self
    }

    const fn depth(bytes: u32, stencil: bool) -> Self {
        Self {
            size: FormatSize::Texel(bytes),
            channels: 0,
            component: None,
            srgb: false,
            bgra: false,
            depth: true,
            stencil,
        }
    }

    const fn block(bytes: u32) -> Self {
        Self {
            size: FormatSize::Block(bytes),
            channels: 0,
            component: None,
            srgb: false,
            bgra: false,
            depth: false,
            stencil: false,
        }
    }

    const fn null() -> Self {
        Self {
            size: FormatSize::Texel(0),
            channels: 0,
            component: None,
            srgb: false,
            bgra: false,
            depth: false,
            stencil: false,
        }
    }
}

impl Format {
    pub const COUNT: usize = Format::BC7 as usize + 1;

    pub const ALL: [Format; Format::COUNT] = [
        Format::Null,
        Format::U8x1Norm,
        Format::U8x1NormToAlpha,
        Format::U8x2Norm,
        Format::U8x4Norm,
        Format::U8x4NormSrgb,
        Format::U8x4NormBgrx,
        Format::U8x4NormBgra,
        Format::U8x1,
        Format::U8x2,
        Format::U8x4,
        Format::I16x2Norm,
        Format::I16x4Norm,
        Format::I16x2,
        Format::I16x4,
        Format::U16x1Norm,
        Format::U16x2Norm,
        Format::U16x4Norm,
        Format::U16x1,
        Format::U16x2,
        Format::U16x4,
        Format::U32x1,
        Format::U32x2,
        Format::U32x4,
        Format::F16x2,
        Format::F16x4,
        Format::F32x1,
        Format::F32x2,
        Format::F32x3,
        Format::F32x4,
        Format::D16,
        Format::D24S8,
        Format::BC1,
        Format::BC2,
        Format::BC3,
        Format::BC4,
        Format::BC5,
        Format::BC6,
        Format::BC7,
    ];

    pub const fn info(self) -> FormatInfo {
        use Component::*;
        match self {
            Format::Null => FormatInfo::null(),
            Format::U8x1Norm | Format::U8x1NormToAlpha => FormatInfo::color(1, Unorm(8)),
            Format::U8x2Norm => FormatInfo::color(2, Unorm(8)),
            Format::U8x4Norm => FormatInfo::color(4, Unorm(8)),
            Format::U8x4NormSrgb => FormatInfo::color(4, Unorm(8)).srgb(),
            Format::U8x4NormBgrx | Format::U8x4NormBgra => FormatInfo::color(4, Unorm(8)).bgra(),
            Format::U8x1 => FormatInfo::color(1, Uint(8)),
            Format::U8x2 => FormatInfo::color(2, Uint(8)),
            Format::U8x4 => FormatInfo::color(4, Uint(8)),
            Format::I16x2Norm => FormatInfo::color(2, Snorm(16)),
            Format::I16x4Norm => FormatInfo::color(4, Snorm(16)),
            Format::I16x2 => FormatInfo::color(2, Sint(16)),
            Format::I16x4 => FormatInfo::color(4, Sint(16)),
            Format::U16x1Norm => FormatInfo::color(1, Unorm(16)),
            Format::U16x2Norm => FormatInfo::color(2, Unorm(16)),
            Format::U16x4Norm => FormatInfo::color(4, Unorm(16)),
            Format::U16x1 => FormatInfo::color(1, Uint(16)),
            Format::U16x2 => FormatInfo::color(2, Uint(16)),
            Format::U16x4 => FormatInfo::color(4, Uint(16)),
            Format::U32x1 => FormatInfo::color(1, Uint(32)),
            Format::U32x2 => FormatInfo::color(2, Uint(32)),
            Format::U32x4 => FormatInfo::color(4, Uint(32)),
            Format::F16x2 => FormatInfo::color(2, Float(16)),
            Format::F16x4 => FormatInfo::color(4, Float(16)),
            Format::F32x1 => FormatInfo::color(1, Float(32)),
            Format::F32x2 => FormatInfo::color(2, Float(32)),
            Format::F32x3 => FormatInfo::color(3, Float(32)),
            Format::F32x4 => FormatInfo::color(4, Float(32)),
            Format::D16 => FormatInfo::depth(2, false),
            Format::D24S8 => FormatInfo::depth(4, true),
            Format::BC1 | Format::BC4 => FormatInfo::block(8),
            Format::BC2 | Format::BC3 | Format::BC5 | Format::BC6 | Format::BC7 => {
                FormatInfo::block(16)
            }
        }
    }

    /// Bytes per texel for uncompressed formats.
    pub fn texel_size(self) -> Option<u32> {
        match self.info().size {
            FormatSize::Texel(0) => None,
            FormatSize::Texel(size) => Some(size),
            FormatSize::Block(_) => None,
        }
    }

    pub fn block_size(self) -> Option<u32> {
        match self.info().size {
            FormatSize::Block(size) => Some(size),
            FormatSize::Texel(_) => None,
        }
    }

    pub fn is_depth(self) -> bool {
        self.info().depth
    }

    pub fn is_compressed(self) -> bool {
        matches!(self.info().size, FormatSize::Block(_))
    }

    /// Bytes in one row of texels (or one row of blocks).
    pub fn row_pitch(self, width: u32) -> u32 {
        match self.info().size {
            FormatSize::Texel(size) => width * size,
            FormatSize::Block(size) => width.div_ceil(4).max(1) * size,
        }
    }

    /// Bytes in one `width` x `height` slice.
    pub fn slice_size(self, width: u32, height: u32) -> u32 {
        match self.info().size {
            FormatSize::Texel(_) => self.row_pitch(width) * height,
            FormatSize::Block(_) => self.row_pitch(width) * height.div_ceil(4).max(1),
        }
    }
}

/// Set of formats, one bit per [`Format`].
#[derive(Hash, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "rhal-serde", derive(Serialize, Deserialize))]
pub struct FormatSet(u128);

impl FormatSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, format: Format) {
        self.0 |= 1u128 << format as u32;
    }

    pub fn extend(&mut self, formats: &[Format]) {
        for f in formats {
            self.insert(*f);
        }
    }

    pub fn contains(&self, format: Format) -> bool {
        self.0 & (1u128 << format as u32) != 0
    }

    pub fn is_superset(&self, other: &FormatSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Format> + '_ {
        Format::ALL.into_iter().filter(|f| self.contains(*f))
    }

    pub fn bits(&self) -> u128 {
        self.0
    }
}

impl FromIterator<Format> for FormatSet {
    fn from_iter<I: IntoIterator<Item = Format>>(iter: I) -> Self {
        let mut set = FormatSet::empty();
        for f in iter {
            set.insert(f);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_in_declaration_order() {
        for (i, f) in Format::ALL.iter().enumerate() {
            assert_eq!(*f as usize, i);
        }
    }

    #[test]
    fn size_classes_are_exclusive() {
        for f in Format::ALL.iter().skip(1) {
            assert!(
                f.texel_size().is_some() ^ f.block_size().is_some(),
                "{f:?} must have exactly one size class"
            );
        }
        assert_eq!(Format::Null.texel_size(), None);
    }

    #[test]
    fn texel_sizes() {
        assert_eq!(Format::U8x4Norm.texel_size(), Some(4));
        assert_eq!(Format::F32x3.texel_size(), Some(12));
        assert_eq!(Format::F32x4.texel_size(), Some(16));
        assert_eq!(Format::F16x2.texel_size(), Some(4));
        assert_eq!(Format::D16.texel_size(), Some(2));
        assert_eq!(Format::D24S8.texel_size(), Some(4));
        assert_eq!(Format::BC1.block_size(), Some(8));
        assert_eq!(Format::BC4.block_size(), Some(8));
        assert_eq!(Format::BC7.block_size(), Some(16));
    }

    #[test]
    fn compressed_pitch_rounds_up_to_blocks() {
        assert_eq!(Format::BC1.row_pitch(10), 24);
        assert_eq!(Format::BC3.slice_size(8, 8), 64);
        assert_eq!(Format::BC1.slice_size(1, 1), 8);
        assert_eq!(Format::U8x4Norm.slice_size(256, 256), 256 * 256 * 4);
    }

    #[test]
    fn format_set_membership() {
        let mut set = FormatSet::empty();
        set.extend(&[Format::U8x4Norm, Format::BC7]);
        assert!(set.contains(Format::BC7));
        assert!(!set.contains(Format::BC6));
        assert_eq!(set.len(), 2);

        let bigger: FormatSet = [Format::U8x4Norm, Format::BC7, Format::D16].into_iter().collect();
        assert!(bigger.is_superset(&set));
        assert!(!set.is_superset(&bigger));
        assert_eq!(bigger.iter().collect::<Vec<_>>(), vec![Format::U8x4Norm, Format::D16, Format::BC7]);
    }
}
