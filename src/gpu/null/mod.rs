//! In-memory devices for both backends.
//!
//! They keep every object in CPU memory, rasterise draws as solid viewport
//! fills and record the native calls they receive, which is enough to drive
//! the contexts without a GPU.

pub mod d3d11;
pub mod gl;
pub mod memory;

pub use d3d11::{D3d11Call, NullD3d11, NullD3d11Config, NullD3d11Probe};
pub use gl::{GlCall, NullGl, NullGlConfig, NullGlProbe};
