use super::native::FeatureLevel;
use crate::{ContextInfo, Format, ShaderTier};

/// Lowest feature level a context can be created on.
pub const MIN_FEATURE_LEVEL: FeatureLevel = FeatureLevel::Level9_1;

/// `D3D11_COMMONSHADER_CONSTANT_BUFFER_API_SLOT_COUNT`.
pub const CONSTANT_BUFFER_SLOTS: u32 = 14;

const MAX_DISPATCH: u32 = 65535;

struct TierStep {
    level: FeatureLevel,
    apply: fn(&mut ContextInfo),
}

const LADDER: &[TierStep] = &[
    TierStep {
        level: FeatureLevel::Level9_1,
        apply: |info| {
            info.has_base_vertex = true;
            info.max_texture_size = 2048;
            info.max_render_targets = 1;
            info.max_textures_per_draw = 8;
            info.max_uniform_buffers = CONSTANT_BUFFER_SLOTS;
            info.max_anisotropy = 2;
            info.texture_formats.extend(&[
                Format::D16,
                Format::D24S8,
                Format::U8x1Norm,
                Format::U8x4Norm,
                Format::U8x4NormSrgb,
                Format::BC1,
                Format::BC2,
                Format::BC3,
            ]);
            info.render_target_formats
                .extend(&[Format::U8x4Norm, Format::U8x4NormSrgb]);
        },
    },
    TierStep {
        level: FeatureLevel::Level9_2,
        apply: |info| {
            info.has_32bit_index = true;
            info.has_separate_alpha_blend = true;
            info.max_anisotropy = 16;
            info.texture_formats.extend(&[
                Format::U8x1NormToAlpha,
                Format::U16x1Norm,
                Format::U16x2Norm,
                Format::U16x4Norm,
                Format::F16x2,
                Format::F16x4,
            ]);
            info.render_target_formats
                .extend(&[Format::U16x4Norm, Format::F16x4]);
        },
    },
    TierStep {
        level: FeatureLevel::Level9_3,
        apply: |info| {
            info.has_instancing = true;
            info.max_texture_size = 4096;
            info.max_render_targets = 4;
            info.texture_formats
                .extend(&[Format::F32x1, Format::F32x3, Format::F32x4]);
            info.render_target_formats.extend(&[Format::F32x4]);
        },
    },
    TierStep {
        level: FeatureLevel::Level10_0,
        apply: |info| {
            info.max_texture_size = 8192;
            info.max_render_targets = 8;
            info.texture_formats.extend(&[
                Format::U8x2Norm,
                Format::I16x4Norm,
                Format::I16x4,
                Format::U16x2,
                Format::U16x4,
                Format::U32x2,
                Format::U32x4,
                Format::F32x2,
                Format::BC4,
                Format::BC5,
            ]);
        },
    },
    TierStep {
        level: FeatureLevel::Level11_0,
        apply: |info| {
            info.max_texture_size = 16384;
            enable_compute(info);
            info.texture_formats.extend(&[Format::BC6, Format::BC7]);
        },
    },
];

fn enable_compute(info: &mut ContextInfo) {
    info.has_compute_pipeline = true;
    info.max_dispatch = [MAX_DISPATCH; 3];
}

/// Builds the capability snapshot for `level`.
///
/// `compute_query` is consulted only on 10.x devices, whose compute support
/// is an optional hardware feature.
pub fn probe(level: FeatureLevel, compute_query: impl FnOnce() -> bool) -> ContextInfo {
    assert!(
        level >= MIN_FEATURE_LEVEL,
        "feature level {} is below the supported minimum {}",
        level.name(),
        MIN_FEATURE_LEVEL.name()
    );

    let mut info = ContextInfo {
        backend_api: format!("Direct3D 11 (feature level {})", level.name()),
        ..Default::default()
    };

    for step in LADDER.iter().take_while(|s| s.level <= level) {
        (step.apply)(&mut info);
    }

    if !info.has_compute_pipeline && level >= FeatureLevel::Level10_0 && compute_query() {
        log::debug!("compute shaders enabled through 10.x hardware options");
        enable_compute(&mut info);
    }

    info
}

/// Lowest feature level able to run binaries of `tier`.
pub fn min_feature_level(tier: ShaderTier) -> Option<FeatureLevel> {
    match tier {
        ShaderTier::Glsl => None,
        ShaderTier::Hlsl40Level91 => Some(FeatureLevel::Level9_1),
        ShaderTier::Hlsl40Level93 => Some(FeatureLevel::Level9_3),
        ShaderTier::Hlsl40 => Some(FeatureLevel::Level10_0),
        ShaderTier::Hlsl50 => Some(FeatureLevel::Level11_0),
    }
}

/// Picks the most capable candidate the device can run.
pub fn select_tier<T>(
    candidates: &[T],
    tier_of: impl Fn(&T) -> ShaderTier,
    level: FeatureLevel,
) -> Option<&T> {
    candidates
        .iter()
        .filter(|c| min_feature_level(tier_of(c)).is_some_and(|min| min <= level))
        .max_by_key(|c| tier_of(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: [FeatureLevel; 7] = [
        FeatureLevel::Level9_1,
        FeatureLevel::Level9_2,
        FeatureLevel::Level9_3,
        FeatureLevel::Level10_0,
        FeatureLevel::Level10_1,
        FeatureLevel::Level11_0,
        FeatureLevel::Level11_1,
    ];

    #[test]
    fn tiers_only_add_capabilities() {
        for pair in LEVELS.windows(2) {
            let lo = probe(pair[0], || false);
            let hi = probe(pair[1], || false);
            assert!(hi.texture_formats.is_superset(&lo.texture_formats));
            assert!(hi.render_target_formats.is_superset(&lo.render_target_formats));
            assert!(hi.max_texture_size >= lo.max_texture_size);
            assert!(hi.max_render_targets >= lo.max_render_targets);
            assert!(hi.max_textures_per_draw >= lo.max_textures_per_draw);
            assert!(hi.max_anisotropy >= lo.max_anisotropy);
            for (l, h) in [
                (lo.has_instancing, hi.has_instancing),
                (lo.has_base_vertex, hi.has_base_vertex),
                (lo.has_32bit_index, hi.has_32bit_index),
                (lo.has_separate_alpha_blend, hi.has_separate_alpha_blend),
                (lo.has_compute_pipeline, hi.has_compute_pipeline),
            ] {
                assert!(!l || h);
            }
        }
    }

    #[test]
    fn render_targets_are_sampleable() {
        for level in LEVELS {
            let info = probe(level, || false);
            assert!(info.texture_formats.is_superset(&info.render_target_formats));
        }
    }

    #[test]
    fn compute_paths_agree_on_limits() {
        let by_tier = probe(FeatureLevel::Level11_0, || false);
        let by_query = probe(FeatureLevel::Level10_0, || true);
        assert!(by_tier.has_compute_pipeline && by_query.has_compute_pipeline);
        assert_eq!(by_tier.max_dispatch, by_query.max_dispatch);

        let without = probe(FeatureLevel::Level10_1, || false);
        assert!(!without.has_compute_pipeline);
        assert_eq!(without.max_dispatch, [0; 3]);
    }

    #[test]
    fn query_is_not_consulted_below_10_0() {
        let info = probe(FeatureLevel::Level9_3, || panic!("queried on 9_3"));
        assert!(!info.has_compute_pipeline);
    }

    #[test]
    fn highest_runnable_tier_wins() {
        let tiers = [
            ShaderTier::Glsl,
            ShaderTier::Hlsl40Level91,
            ShaderTier::Hlsl40Level93,
            ShaderTier::Hlsl40,
            ShaderTier::Hlsl50,
        ];
        let pick = |level| select_tier(&tiers, |t| *t, level).copied();
        assert_eq!(pick(FeatureLevel::Level9_1), Some(ShaderTier::Hlsl40Level91));
        assert_eq!(pick(FeatureLevel::Level9_2), Some(ShaderTier::Hlsl40Level91));
        assert_eq!(pick(FeatureLevel::Level9_3), Some(ShaderTier::Hlsl40Level93));
        assert_eq!(pick(FeatureLevel::Level10_1), Some(ShaderTier::Hlsl40));
        assert_eq!(pick(FeatureLevel::Level11_1), Some(ShaderTier::Hlsl50));

        let only_sm5 = [ShaderTier::Hlsl50];
        assert_eq!(select_tier(&only_sm5, |t| *t, FeatureLevel::Level10_0), None);
        assert_eq!(select_tier(&[ShaderTier::Glsl], |t| *t, FeatureLevel::Level11_1), None);
    }

    #[test]
    fn level_9_1_basics() {
        let info = probe(FeatureLevel::Level9_1, || false);
        assert_eq!(info.max_texture_size, 2048);
        assert_eq!(info.max_render_targets, 1);
        assert!(info.has_base_vertex);
        assert!(!info.has_32bit_index);
        assert!(info.render_target_formats.contains(Format::U8x4Norm));
    }

    #[test]
    fn format_tables_per_level() {
        let info = probe(FeatureLevel::Level9_1, || false);
        assert_eq!(info.texture_formats.len(), 8);
        assert!(!info.texture_formats.contains(Format::U8x4NormBgra));
        assert!(info.texture_formats.contains(Format::D24S8));
        assert!(!info.render_target_formats.contains(Format::D24S8));

        let info = probe(FeatureLevel::Level10_0, || false);
        assert_eq!(info.texture_formats.len(), 8 + 6 + 3 + 10);
        assert!(!info.texture_formats.contains(Format::I16x2));
        assert_eq!(info.max_textures_per_draw, 8);

        let info = probe(FeatureLevel::Level11_1, || false);
        let targets: Vec<Format> = info.render_target_formats.iter().collect();
        assert_eq!(
            targets,
            [
                Format::U8x4Norm,
                Format::U8x4NormSrgb,
                Format::U16x4Norm,
                Format::F16x4,
                Format::F32x4,
            ]
        );
    }
}
