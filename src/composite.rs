//! Per-sample thresholding and selection-weighted blending.
//!
//! A sample below the threshold level maps to `0x00`, anything at or above it
//! maps to `0xFF`. The binary value is then blended against the original
//! sample with an 8-bit selection weight:
//! `(original * (255 - w) + target * w + 127) / 255`.

use crate::control::ThresholdLevel;

const FULL: u32 = 0xFF;
const HALF: u32 = 0x7F;

/// Maps a sample to `0x00` when it is below `level`, otherwise `0xFF`.
#[inline]
pub fn threshold_sample(sample: u8, level: ThresholdLevel) -> u8 {
    if sample < level.get() {
        0x00
    } else {
        0xFF
    }
}

/// Linear blend from `original` towards `target` by `weight / 255`.
///
/// Rounds to nearest with ties going up. The intermediate fits in 17 bits.
#[inline]
pub fn lerp(original: u8, target: u8, weight: u8) -> u8 {
    let w = u32::from(weight);
    let value = (u32::from(original) * (FULL - w) + u32::from(target) * w + HALF) / FULL;
    value as u8
}

/// Blends a thresholded value over the original sample.
///
/// Full weight replaces the sample, zero weight keeps it.
#[inline]
pub fn composite(original: u8, thresholded: u8, weight: u8) -> u8 {
    match weight {
        0xFF => thresholded,
        0x00 => original,
        _ => lerp(original, thresholded, weight),
    }
}

/// Thresholds `sample` and blends it back, or returns `None` when the
/// selection weight is zero and the write can be skipped.
#[inline]
pub fn apply(sample: u8, level: ThresholdLevel, weight: u8) -> Option<u8> {
    if weight == 0 {
        return None;
    }
    Some(composite(sample, threshold_sample(sample, level), weight))
}
