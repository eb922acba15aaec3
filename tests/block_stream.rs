use threshold_filter::block::{BlockView, BlockViewMut, Point, Rect};
use threshold_filter::host::memory::{MemoryCanvas, MemoryHost, MemoryRunner, MemorySelection};
use threshold_filter::host::{
    FilterRunner, Offscreen, PropertyService, RunContext, SelectAreaOffscreen,
};
use threshold_filter::plan::ChannelIndexSource;
use threshold_filter::{
    dispatch, run_blocks, CallResult, ChannelIndexList, ChannelLayout, ControlState,
    FilterError, ProcessResult, ProcessState, Selector, ThresholdFilter, ThresholdLevel,
    THRESHOLD_ITEM,
};

fn make_plane(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 37) ^ (i * 11)) as u8).collect()
}

fn alpha_row(values: &[u8], block_size: i32) -> MemoryHost {
    let mut canvas = MemoryCanvas::new(ChannelLayout::Alpha, values.len() as i32, 1)
        .unwrap()
        .with_block_size(block_size);
    canvas.alpha_mut().copy_from_slice(values);
    MemoryHost::new(canvas)
}

fn ready(host: &mut MemoryHost) -> Option<Box<ThresholdFilter>> {
    let mut handle = None;
    for selector in [Selector::ModuleInitialize, Selector::FilterInitialize] {
        assert_eq!(dispatch(selector, &mut handle, &mut *host), CallResult::Success);
    }
    handle
}

fn run(host: &mut MemoryHost, handle: &mut Option<Box<ThresholdFilter>>) -> CallResult {
    dispatch(Selector::FilterRun, handle, host)
}

#[test]
fn restart_before_first_block_processes_every_block_once() {
    let mut host = alpha_row(&[0, 100, 127, 128, 250], 1);
    let mut handle = ready(&mut host);
    host.runner.push_answer(Some(ProcessResult::Restart));

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);

    assert_eq!(host.canvas.alpha(), &[0, 0, 0, 255, 255]);
    assert_eq!(host.runner.updated_rects().len(), 5);
    assert_eq!(host.runner.progress_total(), Some(5));
    assert_eq!(host.runner.progress_done(), &[1, 2, 3, 4, 5]);
    assert_eq!(
        host.runner.requests(),
        &[
            ProcessState::Start,
            ProcessState::Start,
            ProcessState::Continue,
            ProcessState::Continue,
            ProcessState::Continue,
            ProcessState::Continue,
            ProcessState::End,
        ]
    );
    let summary = handle.as_deref().and_then(ThresholdFilter::last_run).unwrap();
    assert_eq!(summary.total_blocks, 5);
    assert_eq!(summary.processed, 5);
    assert_eq!(summary.restarts, 1);
}

#[test]
fn restart_mid_pass_rewinds_to_the_first_block() {
    let mut host = alpha_row(&[10, 200, 30, 140, 90], 1);
    let mut handle = ready(&mut host);
    host.runner.push_answer(Some(ProcessResult::Continue));
    host.runner.push_answer(Some(ProcessResult::Continue));
    host.runner.push_answer(Some(ProcessResult::Restart));

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);

    assert_eq!(host.canvas.alpha(), &[0, 255, 0, 255, 0]);
    assert_eq!(host.runner.progress_done(), &[1, 2, 1, 2, 3, 4, 5]);
    assert_eq!(host.runner.updated_rects().len(), 7);
    let summary = handle.as_deref().and_then(ThresholdFilter::last_run).unwrap();
    assert_eq!(summary.processed, 7);
    assert_eq!(summary.restarts, 1);
}

#[test]
fn restart_then_exit_leaves_the_original_pixels() {
    let mut host = alpha_row(&[10, 200, 30], 1);
    let mut handle = ready(&mut host);
    host.runner.push_answer(Some(ProcessResult::Continue));
    host.runner.push_answer(Some(ProcessResult::Restart));
    host.runner.push_answer(Some(ProcessResult::Exit));

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);

    assert_eq!(host.canvas.alpha(), &[10, 200, 30]);
    assert_eq!(host.runner.progress_done(), &[1]);
    assert_eq!(
        host.runner.requests(),
        &[ProcessState::Start, ProcessState::Continue, ProcessState::Start]
    );
}

#[test]
fn threshold_edit_during_run_restarts_with_new_level() {
    let mut host = alpha_row(&[100, 150, 200], 1);
    let mut handle = ready(&mut host);
    // Request 0 starts block 0; the edit lands while answering request 1.
    host.runner.schedule_edit(1, THRESHOLD_ITEM, 160);

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);

    assert_eq!(host.canvas.alpha(), &[0, 0, 255]);
    assert_eq!(host.runner.property.integer_value(THRESHOLD_ITEM), Some(160));
    let plugin = handle.as_deref().unwrap();
    assert_eq!(plugin.control().threshold().get(), 160);
    assert_eq!(plugin.last_run().map(|s| s.restarts), Some(1));
}

#[test]
fn repeated_runs_are_idempotent() {
    let values = make_plane(64);
    let mut canvas = MemoryCanvas::new(ChannelLayout::GrayAlpha, 8, 8)
        .unwrap()
        .with_block_size(3);
    canvas.image_mut().copy_from_slice(&values);
    let mut host = MemoryHost::new(canvas);
    let mut handle = ready(&mut host);

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);
    let first = host.canvas.image().to_vec();
    assert!(first.iter().all(|&v| v == 0 || v == 255));
    assert_eq!(run(&mut host, &mut handle), CallResult::Success);
    assert_eq!(host.canvas.image(), first.as_slice());
}

#[test]
fn zero_weight_selection_leaves_pixels_untouched() {
    let mut canvas = MemoryCanvas::new(ChannelLayout::RgbAlpha, 6, 5)
        .unwrap()
        .with_block_size(4);
    let image = make_plane(canvas.image().len());
    let alpha = make_plane(canvas.alpha().len());
    canvas.image_mut().copy_from_slice(&image);
    canvas.alpha_mut().copy_from_slice(&alpha);
    let selection = MemorySelection::new(6, 5, vec![0; 30]).unwrap();
    let mut host = MemoryHost::new(canvas).with_selection(selection);
    let mut handle = ready(&mut host);

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);

    assert_eq!(host.canvas.image(), image.as_slice());
    assert_eq!(host.canvas.alpha(), alpha.as_slice());
    assert_eq!(host.runner.updated_rects().len(), 4);
}

#[test]
fn partial_weight_blends_towards_threshold() {
    let mut host = alpha_row(&[200, 100, 200], 256)
        .with_selection(MemorySelection::new(3, 1, vec![128, 128, 255]).unwrap());
    let mut handle = ready(&mut host);

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);

    // (200 * 127 + 255 * 128 + 127) / 255 and (100 * 127 + 127) / 255
    assert_eq!(host.canvas.alpha(), &[228, 50, 255]);
}

#[test]
fn rgb_channels_follow_host_order_and_skip_padding() {
    let mut canvas = MemoryCanvas::new(ChannelLayout::RgbAlpha, 2, 1)
        .unwrap()
        .with_pixel_bytes(4)
        .with_rgb_index([2, 1, 0]);
    canvas
        .image_mut()
        .copy_from_slice(&[10, 130, 250, 77, 128, 127, 1, 200]);
    canvas.alpha_mut().copy_from_slice(&[5, 6]);
    let mut host = MemoryHost::new(canvas);
    let mut handle = ready(&mut host);

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);

    assert_eq!(host.canvas.image(), &[0, 255, 255, 77, 255, 0, 0, 200]);
    assert_eq!(host.canvas.alpha(), &[5, 6]);
}

#[test]
fn gray_layout_leaves_alpha_alone() {
    let mut canvas = MemoryCanvas::new(ChannelLayout::GrayAlpha, 3, 1).unwrap();
    canvas.image_mut().copy_from_slice(&[127, 128, 3]);
    canvas.alpha_mut().copy_from_slice(&[1, 2, 3]);
    let mut host = MemoryHost::new(canvas);
    let mut handle = ready(&mut host);

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);

    assert_eq!(host.canvas.image(), &[0, 255, 0]);
    assert_eq!(host.canvas.alpha(), &[1, 2, 3]);
}

#[test]
fn select_area_rect_limits_the_run() {
    let mut host = alpha_row(&[200, 200, 200, 200], 256).with_area(Rect::new(1, 0, 3, 1));
    let mut handle = ready(&mut host);

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);

    assert_eq!(host.canvas.alpha(), &[200, 255, 255, 200]);
    assert_eq!(host.runner.updated_rects(), &[Rect::new(1, 0, 3, 1)]);
}

#[test]
fn empty_area_ends_without_blocks() {
    let mut host = alpha_row(&[200, 200], 256).with_area(Rect::new(5, 5, 9, 9));
    let mut handle = ready(&mut host);

    assert_eq!(run(&mut host, &mut handle), CallResult::Success);

    assert_eq!(host.canvas.alpha(), &[200, 200]);
    assert_eq!(host.runner.progress_total(), Some(0));
    assert_eq!(host.runner.requests(), &[ProcessState::End]);
    assert!(host.runner.updated_rects().is_empty());
}

#[test]
fn unsupported_layouts_fail_before_any_block() {
    for layout in [ChannelLayout::SelectArea, ChannelLayout::CmykAlpha] {
        let mut host = MemoryHost::new(MemoryCanvas::new(layout, 4, 4).unwrap());
        let mut handle = ready(&mut host);

        assert_eq!(run(&mut host, &mut handle), CallResult::Failed);

        assert!(host.runner.requests().is_empty());
        assert!(host.runner.updated_rects().is_empty());
        assert_eq!(host.runner.progress_total(), None);
        assert!(handle.as_deref().and_then(ThresholdFilter::last_run).is_none());
    }
}

#[test]
fn failing_iterator_fails_the_run() {
    let mut host = alpha_row(&[200, 200], 1);
    let mut handle = ready(&mut host);
    host.runner.push_answer(Some(ProcessResult::Continue));
    host.runner.push_answer(None);

    assert_eq!(run(&mut host, &mut handle), CallResult::Failed);

    assert_eq!(host.canvas.alpha(), &[255, 200]);
    assert_eq!(host.runner.progress_done(), &[1]);
    // The instance stays usable for the next run.
    assert_eq!(run(&mut host, &mut handle), CallResult::Success);
}

/// Canvas that loses one block rect and refuses alpha or image blocks at one
/// position each.
struct Flaky {
    inner: MemoryCanvas,
    missing_rect: Option<usize>,
    missing_alpha: Option<Point>,
    missing_image: Option<Point>,
}

impl ChannelIndexSource for Flaky {
    fn rgb_channel_index(&self) -> Option<[usize; 3]> {
        self.inner.rgb_channel_index()
    }

    fn cmyk_channel_index(&self) -> Option<[usize; 4]> {
        self.inner.cmyk_channel_index()
    }
}

impl Offscreen for Flaky {
    fn channel_layout(&self) -> Option<ChannelLayout> {
        self.inner.channel_layout()
    }

    fn block_rect_count(&self, area: Rect) -> Option<usize> {
        self.inner.block_rect_count(area)
    }

    fn block_rect(&self, index: usize, area: Rect) -> Option<Rect> {
        if Some(index) == self.missing_rect {
            return None;
        }
        self.inner.block_rect(index, area)
    }

    fn mutable_block_alpha(&mut self, pos: Point) -> Option<BlockViewMut<'_>> {
        if Some(pos) == self.missing_alpha {
            return None;
        }
        self.inner.mutable_block_alpha(pos)
    }

    fn mutable_block_image(&mut self, pos: Point) -> Option<BlockViewMut<'_>> {
        if Some(pos) == self.missing_image {
            return None;
        }
        self.inner.mutable_block_image(pos)
    }
}

#[test]
fn unavailable_blocks_are_skipped_but_counted() {
    let mut inner = MemoryCanvas::new(ChannelLayout::GrayAlpha, 5, 1)
        .unwrap()
        .with_block_size(1);
    inner.image_mut().copy_from_slice(&[200; 5]);
    let mut flaky = Flaky {
        inner,
        missing_rect: Some(1),
        missing_alpha: None,
        missing_image: Some(Point::new(3, 0)),
    };
    let mut runner = MemoryRunner::default();
    runner.set_area(Some(Rect::from_size(5, 1)));
    let mut control = ControlState::default();

    let summary = {
        let mut ctx = RunContext {
            runner: &mut runner,
            destination: &mut flaky,
            select_area: None,
        };
        run_blocks(&mut ctx, &ChannelIndexList::gray(), &mut control).unwrap()
    };

    assert_eq!(summary.total_blocks, 5);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.skipped, 2);
    assert_eq!(flaky.inner.image(), &[255, 200, 255, 200, 255]);
    assert_eq!(runner.progress_done(), &[1, 2, 3, 4, 5]);
    // A lost rect is not reported; a failed fetch still reports its rect.
    assert_eq!(runner.updated_rects().len(), 4);
    assert_eq!(runner.select_area_rect(), Some(Rect::from_size(5, 1)));
}

/// Selection that has no block at one position.
struct Holey {
    inner: MemorySelection,
    missing: Point,
}

impl SelectAreaOffscreen for Holey {
    fn block_select_area(&self, pos: Point) -> Option<BlockView<'_>> {
        if pos == self.missing {
            return None;
        }
        self.inner.block_select_area(pos)
    }
}

#[test]
fn unavailable_alpha_and_selection_blocks_are_skipped() {
    let mut inner = MemoryCanvas::new(ChannelLayout::Alpha, 5, 1)
        .unwrap()
        .with_block_size(1);
    inner.alpha_mut().copy_from_slice(&[200; 5]);
    let mut flaky = Flaky {
        inner,
        missing_rect: None,
        missing_alpha: Some(Point::new(1, 0)),
        missing_image: None,
    };
    let selection = Holey {
        inner: MemorySelection::new(5, 1, vec![255; 5]).unwrap(),
        missing: Point::new(3, 0),
    };
    let mut runner = MemoryRunner::default();
    runner.set_area(Some(Rect::from_size(5, 1)));
    let mut control = ControlState::default();

    let summary = {
        let mut ctx = RunContext {
            runner: &mut runner,
            destination: &mut flaky,
            select_area: Some(&selection),
        };
        run_blocks(&mut ctx, &ChannelIndexList::alpha(), &mut control).unwrap()
    };

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.skipped, 2);
    assert_eq!(flaky.inner.alpha(), &[255, 200, 255, 200, 255]);
    assert_eq!(runner.progress_done(), &[1, 2, 3, 4, 5]);
    let expected: Vec<Rect> = (0..5).map(|x| Rect::new(x, 0, x + 1, 1)).collect();
    assert_eq!(runner.updated_rects(), expected.as_slice());
}

#[test]
fn missing_select_area_rect_is_a_host_failure() {
    let mut canvas = MemoryCanvas::new(ChannelLayout::Alpha, 2, 2).unwrap();
    let mut runner = MemoryRunner::default();
    let mut control = ControlState::new(ThresholdLevel::new(10).unwrap());
    let mut ctx = RunContext {
        runner: &mut runner,
        destination: &mut canvas,
        select_area: None,
    };
    assert_eq!(
        run_blocks(&mut ctx, &ChannelIndexList::alpha(), &mut control),
        Err(FilterError::HostQueryFailed("select area rect"))
    );
}
