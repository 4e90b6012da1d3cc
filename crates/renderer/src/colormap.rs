//! Perceptually uniform colormap for pollutant display.
//!
//! The inferno ramp is stored as evenly spaced anchor colors and linearly
//! interpolated between them, which reproduces the full ramp to within a
//! couple of levels per channel.

/// Anchor colors of the inferno ramp at t = 0.0, 0.1, ..., 1.0.
const INFERNO_ANCHORS: [(u8, u8, u8); 11] = [
    (0, 0, 4),
    (22, 11, 57),
    (66, 10, 104),
    (106, 23, 110),
    (147, 38, 103),
    (188, 55, 84),
    (221, 81, 58),
    (243, 120, 25),
    (252, 165, 10),
    (246, 215, 70),
    (252, 255, 164),
];

/// Map a normalized value in `[0, 1]` to an inferno RGB color.
///
/// Inputs outside the range are clamped.
pub fn inferno(t: f32) -> (u8, u8, u8) {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    let scaled = t * (INFERNO_ANCHORS.len() - 1) as f32;
    let lo = scaled.floor() as usize;
    let hi = (lo + 1).min(INFERNO_ANCHORS.len() - 1);
    let frac = scaled - lo as f32;

    let (r0, g0, b0) = INFERNO_ANCHORS[lo];
    let (r1, g1, b1) = INFERNO_ANCHORS[hi];
    (
        lerp_channel(r0, r1, frac),
        lerp_channel(g0, g1, frac),
        lerp_channel(b0, b1, frac),
    )
}

#[inline]
fn lerp_channel(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}
