//! Randomized checks of the compositor and of whole runs against a direct
//! per-pixel model.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use threshold_filter::composite::{apply, composite, lerp, threshold_sample};
use threshold_filter::host::memory::{MemoryCanvas, MemoryHost, MemorySelection};
use threshold_filter::{dispatch, CallResult, ChannelLayout, Selector, ThresholdFilter, ThresholdLevel};

fn level(rng: &mut StdRng) -> ThresholdLevel {
    ThresholdLevel::new(rng.random_range(1..=255)).unwrap()
}

#[test]
fn composite_stays_between_original_and_target() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..10_000 {
        let original: u8 = rng.random();
        let weight: u8 = rng.random();
        let level = level(&mut rng);
        let target = threshold_sample(original, level);
        let out = composite(original, target, weight);
        let (lo, hi) = if original < target {
            (original, target)
        } else {
            (target, original)
        };
        assert!(lo <= out && out <= hi, "{original} -> {target} @ {weight} = {out}");
    }
}

#[test]
fn lerp_matches_the_integer_formula() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..10_000 {
        let a: u8 = rng.random();
        let b: u8 = rng.random();
        let w: u8 = rng.random();
        let expected =
            (u32::from(a) * (255 - u32::from(w)) + u32::from(b) * u32::from(w) + 127) / 255;
        assert_eq!(u32::from(lerp(a, b, w)), expected);
    }
}

#[test]
fn threshold_is_monotonic_in_the_sample() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..256 {
        let level = level(&mut rng);
        let mut previous = 0;
        for sample in 0..=255u8 {
            let value = threshold_sample(sample, level);
            assert!(value == 0 || value == 255);
            assert!(value >= previous);
            previous = value;
        }
        assert_eq!(threshold_sample(level.get() - 1, level), 0);
        assert_eq!(threshold_sample(level.get(), level), 255);
    }
}

#[test]
fn full_weight_output_is_a_fixed_point() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..1_000 {
        let sample: u8 = rng.random();
        let level = level(&mut rng);
        let once = apply(sample, level, 255).unwrap();
        assert_eq!(apply(once, level, 255), Some(once));
    }
}

#[test]
fn runs_match_a_per_pixel_model() {
    let mut rng = StdRng::seed_from_u64(2024);
    for case in 0..12 {
        let width = rng.random_range(1..=23);
        let height = rng.random_range(1..=17);
        let block_size = rng.random_range(1..=9);
        let pixels = (width * height) as usize;
        let layout = [ChannelLayout::Alpha, ChannelLayout::GrayAlpha, ChannelLayout::RgbAlpha]
            [case % 3];

        let mut canvas = MemoryCanvas::new(layout, width, height)
            .unwrap()
            .with_block_size(block_size);
        rng.fill(canvas.alpha_mut());
        rng.fill(canvas.image_mut());
        let alpha = canvas.alpha().to_vec();
        let image = canvas.image().to_vec();
        let mut weights = vec![0u8; pixels];
        rng.fill(weights.as_mut_slice());

        let selection = MemorySelection::new(width, height, weights.clone()).unwrap();
        let mut host = MemoryHost::new(canvas).with_selection(selection);
        let mut handle: Option<Box<ThresholdFilter>> = None;
        for selector in [
            Selector::ModuleInitialize,
            Selector::FilterInitialize,
            Selector::FilterRun,
        ] {
            assert_eq!(dispatch(selector, &mut handle, &mut host), CallResult::Success);
        }

        let level = ThresholdLevel::DEFAULT;
        let blend = |sample: u8, weight: u8| apply(sample, level, weight).unwrap_or(sample);
        match layout {
            ChannelLayout::Alpha => {
                let expected: Vec<u8> = alpha
                    .iter()
                    .zip(&weights)
                    .map(|(&a, &w)| blend(a, w))
                    .collect();
                assert_eq!(host.canvas.alpha(), expected.as_slice(), "case {case}");
                assert!(host.canvas.image().is_empty());
            }
            _ => {
                let pixel_bytes = host.canvas.pixel_bytes();
                let expected: Vec<u8> = image
                    .iter()
                    .enumerate()
                    .map(|(i, &s)| blend(s, weights[i / pixel_bytes]))
                    .collect();
                assert_eq!(host.canvas.image(), expected.as_slice(), "case {case}");
                assert_eq!(host.canvas.alpha(), alpha.as_slice(), "case {case}");
            }
        }
    }
}
