use super::conversions::MAX_TEXTURE_MAX_ANISOTROPY_EXT;
use super::native::GlApi;
use crate::{ContextInfo, Format, MAX_RENDER_TARGETS, MAX_RESOURCE_VIEWS, MAX_UNIFORM_BUFFERS};

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct GlVersion {
    pub major: u32,
    pub minor: u32,
}

impl GlVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

/// Parses `GL_VERSION`; returns the version and whether it is OpenGL ES.
pub fn parse_version(version: &str) -> Option<(GlVersion, bool)> {
    let (rest, embedded) = match version.strip_prefix("OpenGL ES") {
        Some(rest) => (rest.trim_start_matches(|c: char| !c.is_ascii_digit()), true),
        None => (version.trim_start(), false),
    };
    let number = rest.split_whitespace().next()?;
    let mut parts = number.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()
        .map(|m| m.chars().take_while(char::is_ascii_digit).collect::<String>())
        .and_then(|m| m.parse().ok())
        .unwrap_or(0);
    Some((GlVersion::new(major, minor), embedded))
}

/// Native limits read once at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlLimits {
    pub max_texture_size: u32,
    pub max_color_attachments: u32,
    pub max_texture_image_units: u32,
    pub max_uniform_buffer_bindings: u32,
    pub max_anisotropy: u32,
    pub max_compute_work_group_count: [u32; 3],
}

impl Default for GlLimits {
    fn default() -> Self {
        Self {
            max_texture_size: 8192,
            max_color_attachments: 8,
            max_texture_image_units: 16,
            max_uniform_buffer_bindings: 36,
            max_anisotropy: 16,
            max_compute_work_group_count: [65535; 3],
        }
    }
}

impl GlLimits {
    pub fn query(gl: &dyn GlApi, features: &GlFeatures) -> Self {
        let int = |pname| gl.get_integer(pname).max(0) as u32;
        Self {
            max_texture_size: int(glow::MAX_TEXTURE_SIZE),
            max_color_attachments: if features.framebuffer_objects {
                int(glow::MAX_COLOR_ATTACHMENTS)
            } else {
                1
            },
            max_texture_image_units: int(glow::MAX_TEXTURE_IMAGE_UNITS),
            max_uniform_buffer_bindings: if features.uniform_buffers {
                int(glow::MAX_UNIFORM_BUFFER_BINDINGS)
            } else {
                0
            },
            max_anisotropy: if features.anisotropic {
                gl.get_float(MAX_TEXTURE_MAX_ANISOTROPY_EXT).max(1.0) as u32
            } else {
                1
            },
            max_compute_work_group_count: if features.compute {
                [0, 1, 2].map(|i| gl.get_integer_indexed(glow::MAX_COMPUTE_WORK_GROUP_COUNT, i).max(0) as u32)
            } else {
                [0; 3]
            },
        }
    }
}

/// Optional native features the backend takes different paths for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlFeatures {
    pub texture_storage: bool,
    pub uniform_buffers: bool,
    pub framebuffer_objects: bool,
    pub explicit_attrib_location: bool,
    pub compute: bool,
    pub copy_image: bool,
    pub anisotropic: bool,
}

struct Step {
    version: GlVersion,
    apply: fn(&mut ContextInfo, &mut GlFeatures),
}

const COLOR_FORMATS_3X: &[Format] = &[
    Format::U8x1Norm,
    Format::U8x2Norm,
    Format::U8x4NormSrgb,
    Format::U8x1,
    Format::U8x2,
    Format::U8x4,
    Format::I16x2,
    Format::I16x4,
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
    Format::F32x4,
];

const INTEGER_TARGETS_3X: &[Format] = &[
    Format::U8x1Norm,
    Format::U8x2Norm,
    Format::U8x4NormSrgb,
    Format::U8x1,
    Format::U8x2,
    Format::U8x4,
    Format::I16x2,
    Format::I16x4,
    Format::U16x1,
    Format::U16x2,
    Format::U16x4,
    Format::U32x1,
    Format::U32x2,
    Format::U32x4,
];

const FLOAT_TARGETS: &[Format] = &[Format::F16x2, Format::F16x4, Format::F32x1, Format::F32x2, Format::F32x4];

const DESKTOP: &[Step] = &[
    Step {
        version: GlVersion::new(2, 0),
        apply: |info, _| {
            info.has_separate_alpha_blend = true;
            info.has_32bit_index = true;
            info.texture_formats.extend(&[
                Format::U8x4Norm,
                Format::U8x4NormBgra,
                Format::U8x4NormBgrx,
                Format::U16x4Norm,
                Format::D16,
                Format::D24S8,
            ]);
            info.render_target_formats.extend(&[Format::U8x4Norm, Format::D16, Format::D24S8]);
        },
    },
    Step {
        version: GlVersion::new(3, 0),
        apply: |info, features| {
            features.framebuffer_objects = true;
            info.texture_formats.extend(COLOR_FORMATS_3X);
            info.texture_formats.extend(&[
                Format::I16x2Norm,
                Format::I16x4Norm,
                Format::U16x1Norm,
                Format::U16x2Norm,
                Format::F32x3,
                Format::BC4,
                Format::BC5,
            ]);
            info.render_target_formats.extend(INTEGER_TARGETS_3X);
            info.render_target_formats.extend(FLOAT_TARGETS);
            info.render_target_formats
                .extend(&[Format::U16x1Norm, Format::U16x2Norm, Format::U16x4Norm]);
        },
    },
    Step {
        version: GlVersion::new(3, 1),
        apply: |info, features| {
            features.uniform_buffers = true;
            info.has_instancing = true;
        },
    },
    Step {
        version: GlVersion::new(3, 2),
        apply: |info, _| info.has_base_vertex = true,
    },
    Step {
        version: GlVersion::new(3, 3),
        apply: |info, features| {
            features.explicit_attrib_location = true;
            // Needs texture swizzle.
            info.texture_formats.extend(&[Format::U8x1NormToAlpha]);
        },
    },
    Step {
        version: GlVersion::new(4, 2),
        apply: |info, features| {
            features.texture_storage = true;
            info.texture_formats.extend(&[Format::BC6, Format::BC7]);
        },
    },
    Step {
        version: GlVersion::new(4, 3),
        apply: |info, features| {
            features.compute = true;
            features.copy_image = true;
            info.has_compute_pipeline = true;
        },
    },
];

const EMBEDDED: &[Step] = &[
    Step {
        version: GlVersion::new(2, 0),
        apply: |info, features| {
            features.framebuffer_objects = true;
            info.has_separate_alpha_blend = true;
            info.texture_formats.extend(&[Format::U8x4Norm]);
            info.render_target_formats.extend(&[Format::U8x4Norm]);
        },
    },
    Step {
        version: GlVersion::new(3, 0),
        apply: |info, features| {
            features.texture_storage = true;
            features.uniform_buffers = true;
            features.explicit_attrib_location = true;
            info.has_instancing = true;
            info.has_32bit_index = true;
            info.texture_formats.extend(COLOR_FORMATS_3X);
            info.texture_formats
                .extend(&[Format::U8x1NormToAlpha, Format::F32x3, Format::D16, Format::D24S8]);
            info.render_target_formats.extend(INTEGER_TARGETS_3X);
            info.render_target_formats.extend(&[Format::D16, Format::D24S8]);
        },
    },
    Step {
        version: GlVersion::new(3, 1),
        apply: |info, features| {
            features.compute = true;
            info.has_compute_pipeline = true;
        },
    },
    Step {
        version: GlVersion::new(3, 2),
        apply: |info, features| {
            features.copy_image = true;
            info.has_base_vertex = true;
            info.render_target_formats.extend(FLOAT_TARGETS);
        },
    },
];

/// Applies the version ladder, then the extensions.
pub fn probe_features(version: GlVersion, embedded: bool, extensions: &[String]) -> (ContextInfo, GlFeatures) {
    let mut info = ContextInfo::default();
    let mut features = GlFeatures::default();

    let ladder = if embedded { EMBEDDED } else { DESKTOP };
    for step in ladder.iter().take_while(|s| s.version <= version) {
        (step.apply)(&mut info, &mut features);
    }

    let has = |name: &str| extensions.iter().any(|e| e == name);
    if has("GL_ARB_texture_storage") {
        features.texture_storage = true;
    }
    if has("GL_ARB_uniform_buffer_object") {
        features.uniform_buffers = true;
    }
    if has("GL_ARB_framebuffer_object") {
        features.framebuffer_objects = true;
    }
    if has("GL_EXT_texture_filter_anisotropic") {
        features.anisotropic = true;
    }
    if has("GL_ARB_explicit_attrib_location") {
        features.explicit_attrib_location = true;
    }
    if has("GL_ARB_compute_shader") {
        features.compute = true;
        info.has_compute_pipeline = true;
    }
    if has("GL_EXT_texture_compression_s3tc") {
        info.texture_formats.extend(&[Format::BC1, Format::BC2, Format::BC3]);
    }
    if has("GL_ARB_texture_compression_rgtc") {
        info.texture_formats.extend(&[Format::BC4, Format::BC5]);
    }
    if has("GL_ARB_texture_compression_bptc") {
        info.texture_formats.extend(&[Format::BC6, Format::BC7]);
    }

    (info, features)
}

/// Fills the limits and asserts the minimum feature set.
pub fn apply_limits(info: &mut ContextInfo, features: &GlFeatures, limits: &GlLimits) {
    assert!(features.uniform_buffers, "uniform buffer objects are required");
    assert!(
        features.explicit_attrib_location,
        "explicit attribute locations are required"
    );
    assert!(features.framebuffer_objects, "framebuffer objects are required");

    info.max_texture_size = limits.max_texture_size.max(2048);
    info.max_render_targets = limits.max_color_attachments.max(4).min(MAX_RENDER_TARGETS as u32);
    info.max_textures_per_draw = limits
        .max_texture_image_units
        .min(MAX_RESOURCE_VIEWS as u32);
    info.max_uniform_buffers = limits
        .max_uniform_buffer_bindings
        .min(MAX_UNIFORM_BUFFERS as u32);
    info.max_anisotropy = if features.anisotropic {
        limits.max_anisotropy.max(1)
    } else {
        1
    };
    if info.has_compute_pipeline {
        info.max_dispatch = limits.max_compute_work_group_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn version_strings() {
        assert_eq!(parse_version("4.6.0 NVIDIA 535.54"), Some((GlVersion::new(4, 6), false)));
        assert_eq!(parse_version("OpenGL ES 3.2 Mesa 23.0"), Some((GlVersion::new(3, 2), true)));
        assert_eq!(parse_version("OpenGL ES-CM 1.1"), Some((GlVersion::new(1, 1), true)));
        assert_eq!(parse_version("3.3"), Some((GlVersion::new(3, 3), false)));
        assert_eq!(parse_version("garbage"), None);
    }

    #[test]
    fn ladders_only_add_capabilities() {
        for (ladder, embedded) in [(DESKTOP, false), (EMBEDDED, true)] {
            let versions: Vec<_> = ladder.iter().map(|s| s.version).collect();
            for pair in versions.windows(2) {
                let (lo, _) = probe_features(pair[0], embedded, &[]);
                let (hi, _) = probe_features(pair[1], embedded, &[]);
                assert!(hi.texture_formats.is_superset(&lo.texture_formats));
                assert!(hi.render_target_formats.is_superset(&lo.render_target_formats));
                assert!(!lo.has_compute_pipeline || hi.has_compute_pipeline);
            }
        }
    }

    #[test]
    fn gles_3_0_has_no_compute() {
        let (info, features) = probe_features(GlVersion::new(3, 0), true, &[]);
        assert!(!info.has_compute_pipeline);
        assert!(features.uniform_buffers && features.explicit_attrib_location);
        let (info, _) = probe_features(GlVersion::new(3, 1), true, &[]);
        assert!(info.has_compute_pipeline);
    }

    #[test]
    fn extensions_lift_old_desktop_versions() {
        let (_, features) = probe_features(GlVersion::new(3, 1), false, &[]);
        assert!(!features.explicit_attrib_location);
        let (info, features) = probe_features(
            GlVersion::new(3, 1),
            false,
            &exts(&["GL_ARB_explicit_attrib_location", "GL_EXT_texture_compression_s3tc"]),
        );
        assert!(features.explicit_attrib_location);
        assert!(info.texture_formats.contains(Format::BC1));
        assert!(!info.texture_formats.contains(Format::BC7));
    }

    #[test]
    #[should_panic(expected = "explicit attribute locations")]
    fn minimum_requirements_are_asserted() {
        let (mut info, features) = probe_features(GlVersion::new(3, 1), false, &[]);
        apply_limits(&mut info, &features, &GlLimits::default());
    }

    #[test]
    fn limits_are_clamped() {
        let (mut info, features) = probe_features(GlVersion::new(3, 0), true, &[]);
        let limits = GlLimits {
            max_texture_size: 1024,
            max_color_attachments: 1,
            max_uniform_buffer_bindings: 72,
            ..Default::default()
        };
        apply_limits(&mut info, &features, &limits);
        assert_eq!(info.max_texture_size, 2048);
        assert_eq!(info.max_render_targets, 4);
        assert_eq!(info.max_uniform_buffers, 16);
        assert_eq!(info.max_anisotropy, 1);
        assert_eq!(info.max_dispatch, [0; 3]);
    }
}
