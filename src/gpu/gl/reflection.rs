//! Binding slots resolved from GLSL names.
//!
//! Uniform block `type_UniformBufferN` is attached to binding point N and
//! sampler `uTextureN` to texture unit N. Programs are free to number blocks
//! and samplers however they like, so both are resolved again every time a
//! program is made current.

use super::native::{GlApi, GlName};
use crate::{MAX_RESOURCE_VIEWS, MAX_UNIFORM_BUFFERS};

pub fn uniform_block_name(slot: usize) -> String {
    format!("type_UniformBuffer{slot}")
}

pub fn sampler_name(slot: usize) -> String {
    format!("uTexture{slot}")
}

/// Per-slot native indices of the current program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotCache {
    program: Option<GlName>,
    blocks: [Option<u32>; MAX_UNIFORM_BUFFERS],
    samplers: [Option<u32>; MAX_RESOURCE_VIEWS],
}

impl SlotCache {
    /// Resolves every slot of `program`, which must be in use.
    pub fn resolve(&mut self, gl: &mut dyn GlApi, program: GlName) {
        self.invalidate();
        self.program = Some(program);

        for slot in 0..MAX_UNIFORM_BUFFERS {
            let index = gl.get_uniform_block_index(program, &uniform_block_name(slot));
            if let Some(index) = index {
                gl.uniform_block_binding(program, index, slot as u32);
            }
            self.blocks[slot] = index;
        }

        for slot in 0..MAX_RESOURCE_VIEWS {
            let location = gl.get_uniform_location(program, &sampler_name(slot));
            if let Some(location) = location {
                gl.uniform_1_i32(location, slot as i32);
            }
            self.samplers[slot] = location;
        }

        log::debug!(
            "program {program}: {} uniform blocks, {} samplers resolved",
            self.blocks.iter().flatten().count(),
            self.samplers.iter().flatten().count()
        );
    }

    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    pub fn program(&self) -> Option<GlName> {
        self.program
    }

    /// Block index behind `slot`; `None` when the program does not use it.
    pub fn block(&self, slot: usize) -> Option<u32> {
        self.blocks.get(slot).copied().flatten()
    }

    pub fn sampler(&self, slot: usize) -> Option<u32> {
        self.samplers.get(slot).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null::gl::{GlCall, NullGl, NullGlConfig};

    const VERTEX: &str = "#version 140\nvoid main() { gl_Position = vec4(0.0); }\n";
    const FRAGMENT: &str = "#version 140
uniform type_UniformBuffer3 { vec4 tint; };
uniform sampler2D uTexture1;
uniform type_UniformBuffer0 { vec4 color; };
out vec4 o;
void main() { o = color * tint * texture(uTexture1, vec2(0.0)); }
";

    fn program(gl: &mut NullGl) -> GlName {
        let vs = gl.create_shader(glow::VERTEX_SHADER).unwrap();
        gl.shader_source(vs, VERTEX);
        gl.compile_shader(vs);
        let fs = gl.create_shader(glow::FRAGMENT_SHADER).unwrap();
        gl.shader_source(fs, FRAGMENT);
        gl.compile_shader(fs);
        let program = gl.create_program().unwrap();
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);
        assert!(gl.get_program_link_status(program));
        gl.use_program(Some(program));
        program
    }

    #[test]
    fn blocks_bind_to_their_slot_number() {
        let (mut gl, probe) = NullGl::new(NullGlConfig::default());
        let program = program(&mut gl);
        probe.clear_calls();

        let mut cache = SlotCache::default();
        cache.resolve(&mut gl, program);

        // Declaration order gives block 0 to `type_UniformBuffer3`.
        assert_eq!(cache.block(3), Some(0));
        assert_eq!(cache.block(0), Some(1));
        assert_eq!(cache.block(1), None);
        assert!(cache.sampler(1).is_some());
        assert!(cache.sampler(0).is_none());

        let calls = probe.calls();
        assert!(calls.contains(&GlCall::UniformBlockBinding { index: 0, binding: 3 }));
        assert!(calls.contains(&GlCall::UniformBlockBinding { index: 1, binding: 0 }));
        assert!(calls
            .iter()
            .any(|c| matches!(c, GlCall::Uniform1i { value: 1, .. })));
    }

    #[test]
    fn invalidate_forgets_the_program() {
        let (mut gl, _probe) = NullGl::new(NullGlConfig::default());
        let program = program(&mut gl);
        let mut cache = SlotCache::default();
        cache.resolve(&mut gl, program);
        assert_eq!(cache.program(), Some(program));
        cache.invalidate();
        assert_eq!(cache.program(), None);
        assert_eq!(cache.block(0), None);
        assert_eq!(cache.block(99), None);
    }
}
