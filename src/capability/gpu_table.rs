//! Curated GPU family table
//!
//! Patterns are matched as lower-case substrings of the renderer string.
//! Order matters: the first bucket containing a match wins, so more
//! specific families are listed before broader ones.

use super::GpuTier;

/// Texture size a capable-but-unknown GPU must reach for the medium bucket
pub const CAPABLE_MAX_TEXTURE_SIZE: u32 = 8192;

const SOFTWARE_RENDERERS: &[&str] = &["swiftshader", "llvmpipe", "softpipe", "software"];

const HIGH_TIER: &[&str] = &[
    "rtx",
    "radeon rx 6",
    "radeon rx 7",
    "radeon pro",
    "quadro",
    "apple m1",
    "apple m2",
    "apple m3",
    "apple m4",
    "arc a7",
    "adreno (tm) 7",
    "adreno 7",
];

const MEDIUM_TIER: &[&str] = &[
    "gtx",
    "radeon rx 5",
    "radeon rx 4",
    "radeon vega",
    "iris xe",
    "iris plus",
    "arc a3",
    "apple gpu",
    "apple a1",
    "adreno (tm) 6",
    "adreno 6",
    "mali-g7",
    "mali-g6",
];

const LOW_TIER: &[&str] = &[
    "intel hd",
    "intel uhd",
    "intel(r) hd",
    "intel(r) uhd",
    "mali-4",
    "mali-t",
    "mali-g5",
    "adreno (tm) 5",
    "adreno 5",
    "adreno (tm) 4",
    "powervr",
    "videocore",
];

/// Look a renderer string up in the curated table
pub fn classify_renderer(renderer: &str) -> Option<GpuTier> {
    let renderer = renderer.to_ascii_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| renderer.contains(p));

    if matches(SOFTWARE_RENDERERS) {
        Some(GpuTier::Low)
    } else if matches(HIGH_TIER) {
        Some(GpuTier::High)
    } else if matches(MEDIUM_TIER) {
        Some(GpuTier::Medium)
    } else if matches(LOW_TIER) {
        Some(GpuTier::Low)
    } else {
        None
    }
}

/// Classification for renderers missing from the table
pub fn classify_by_capability(max_texture_size: u32, secondary_api: bool) -> GpuTier {
    if max_texture_size >= CAPABLE_MAX_TEXTURE_SIZE && secondary_api {
        GpuTier::Medium
    } else {
        GpuTier::Low
    }
}
