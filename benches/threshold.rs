use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use threshold_filter::host::memory::{MemoryCanvas, MemoryHost, MemorySelection};
use threshold_filter::{dispatch, CallResult, ChannelLayout, Selector, ThresholdFilter};

const SIZE: i32 = 1024;

fn make_plane(len: usize, stride: usize) -> Vec<u8> {
    (0..len)
        .map(|i| {
            let (x, y) = (i % stride, i / stride);
            (((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as u8
        })
        .collect()
}

fn make_host(layout: ChannelLayout, with_selection: bool) -> MemoryHost {
    let mut canvas = MemoryCanvas::new(layout, SIZE, SIZE).unwrap();
    let stride = SIZE as usize * canvas.pixel_bytes().max(1);
    let alpha = make_plane(canvas.alpha().len(), SIZE as usize);
    canvas.alpha_mut().copy_from_slice(&alpha);
    let image = make_plane(canvas.image().len(), stride);
    canvas.image_mut().copy_from_slice(&image);

    let host = MemoryHost::new(canvas);
    if with_selection {
        let weights = make_plane((SIZE * SIZE) as usize, SIZE as usize);
        host.with_selection(MemorySelection::new(SIZE, SIZE, weights).unwrap())
    } else {
        host
    }
}

fn initialized(host: &mut MemoryHost) -> Option<Box<ThresholdFilter>> {
    let mut handle = None;
    for selector in [Selector::ModuleInitialize, Selector::FilterInitialize] {
        assert_eq!(dispatch(selector, &mut handle, &mut *host), CallResult::Success);
    }
    handle
}

fn bench_runs(c: &mut Criterion) {
    let cases = [
        ("alpha_full_weight", ChannelLayout::Alpha, false),
        ("rgb_full_weight", ChannelLayout::RgbAlpha, false),
        ("rgb_selection", ChannelLayout::RgbAlpha, true),
    ];
    for (name, layout, with_selection) in cases {
        let mut host = make_host(layout, with_selection);
        let mut handle = initialized(&mut host);
        c.bench_function(name, |b| {
            b.iter(|| {
                host.runner.clear_log();
                black_box(dispatch(Selector::FilterRun, &mut handle, &mut host))
            });
        });
    }
}

criterion_group!(benches, bench_runs);
criterion_main!(benches);
