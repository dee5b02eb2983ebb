pub mod utils;
pub mod gpu;

#[cfg(all(feature = "rhal-d3d11", not(windows)))]
compile_error!("`rhal-d3d11` drives Direct3D 11 and is only available on Windows targets");

#[macro_export]
macro_rules! fill {
    // Only fill: fill![..=> fill; N]
    (..=> $fill:expr ; $len:expr $(,)?) => {{
        [$fill; $len]
    }};

    // Prefix + fill: fill![a, b => fill; N]
    ($($val:expr),+ => $fill:expr ; $len:expr $(,)?) => {{
        let mut __arr = [$fill; $len];
        let mut __i = 0usize;
        $(
            __arr[__i] = $val;
            __i += 1;
        )+
        let _ = __i;
        __arr
    }};
}

pub use gpu::*;
