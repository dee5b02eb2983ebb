//! GLSL source preparation.

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub fn gl_type(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
            ShaderStage::Compute => glow::COMPUTE_SHADER,
        }
    }

    fn prologue(self, embedded: bool) -> &'static str {
        match (self, embedded) {
            (ShaderStage::Compute, false) => "#version 430\n",
            (ShaderStage::Compute, true) => "#version 310 es\n",
            (ShaderStage::Fragment, true) => {
                "#version 300 es\nprecision mediump float;\nprecision highp int;\n"
            }
            (_, true) => "#version 300 es\n",
            (_, false) => "#version 140\n#extension GL_ARB_explicit_attrib_location : enable\n",
        }
    }
}

/// Replaces the `#version` line of `code` with the profile's prologue.
///
/// Blobs may carry trailing NULs from C tooling; they are dropped.
pub fn prepare_source(code: &[u8], stage: ShaderStage, embedded: bool) -> String {
    let end = code.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    let text = String::from_utf8_lossy(&code[..end]);

    let body = match text.trim_start().strip_prefix("#version") {
        Some(rest) => rest.split_once('\n').map_or("", |(_, tail)| tail),
        None => &text,
    };

    let mut out = String::with_capacity(body.len() + 96);
    out.push_str(stage.prologue(embedded));
    out.push_str(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_line_is_replaced() {
        let src = b"#version 450\nvoid main() {}\n\0\0";
        let out = prepare_source(src, ShaderStage::Vertex, false);
        assert_eq!(
            out,
            "#version 140\n#extension GL_ARB_explicit_attrib_location : enable\nvoid main() {}\n"
        );
    }

    #[test]
    fn embedded_fragments_get_precision() {
        let out = prepare_source(b"void main() {}", ShaderStage::Fragment, true);
        assert!(out.starts_with("#version 300 es\nprecision mediump float;"));
        assert!(out.ends_with("void main() {}"));
        let out = prepare_source(b"void main() {}", ShaderStage::Vertex, true);
        assert!(!out.contains("precision"));
    }

    #[test]
    fn compute_versions() {
        let src = b"  #version 310 es\nlayout(local_size_x = 1) in;\nvoid main() {}";
        assert!(prepare_source(src, ShaderStage::Compute, false).starts_with("#version 430\nlayout"));
        assert!(prepare_source(src, ShaderStage::Compute, true).starts_with("#version 310 es\nlayout"));
    }
}
