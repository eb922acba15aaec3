//! Block streaming over the host's cooperative iteration protocol.
//!
//! The host drives a run: the filter asks for the next step with a
//! [`ProcessState`] and the host answers with a [`ProcessResult`]. Control
//! returns to the host between steps, so the only state carried across steps
//! is the block index kept by [`BlockStream`].
//!
//! The requested state is derived from the index alone:
//! `Start` for block 0, `Continue` while blocks remain, `End` after the last
//! block. `Restart` rewinds the index to 0 at any point and `Exit` ends the
//! run.

use crate::block::{BlockView, BlockViewMut, Point, Rect};
use crate::composite;
use crate::control::{ControlState, ThresholdLevel};
use crate::host::{RunContext, SelectAreaOffscreen};
use crate::plan::ChannelIndexList;
use crate::trace::{trace_debug, trace_event};
use crate::util::{FilterError, FilterResult};

/// Step requested from the host's block iterator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Start,
    Continue,
    End,
    Abort,
}

/// Host answer to a [`ProcessState`] request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcessResult {
    Continue,
    Restart,
    Exit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    NotStarted,
    Streaming,
    Done,
    Aborted,
}

/// Block index bookkeeping for one run.
#[derive(Clone, Debug)]
pub struct BlockStream {
    index: usize,
    total: usize,
    restarts: usize,
    phase: StreamPhase,
}

impl BlockStream {
    pub fn new(total: usize) -> Self {
        Self {
            index: 0,
            total,
            restarts: 0,
            phase: StreamPhase::NotStarted,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of restarts the host requested.
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, StreamPhase::Done | StreamPhase::Aborted)
    }

    /// State to request from the host next.
    pub fn requested_state(&self) -> ProcessState {
        if self.index < self.total {
            if self.index == 0 {
                ProcessState::Start
            } else {
                ProcessState::Continue
            }
        } else {
            ProcessState::End
        }
    }

    /// Applies a host answer. Returns the block index to process, if any.
    pub fn advance(&mut self, result: ProcessResult) -> Option<usize> {
        if self.is_finished() {
            return None;
        }
        match result {
            ProcessResult::Restart => {
                self.index = 0;
                self.restarts += 1;
                self.phase = StreamPhase::NotStarted;
                None
            }
            ProcessResult::Exit => {
                self.phase = StreamPhase::Done;
                None
            }
            ProcessResult::Continue => {
                self.phase = StreamPhase::Streaming;
                (self.index < self.total).then_some(self.index)
            }
        }
    }

    /// Marks the current block as handled and returns the progress value.
    pub fn complete_block(&mut self) -> usize {
        self.index = (self.index + 1).min(self.total);
        self.index
    }

    pub fn abort(&mut self) {
        self.phase = StreamPhase::Aborted;
    }
}

/// Counters describing a finished run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_blocks: usize,
    /// Block steps that wrote pixels, counted across restarts.
    pub processed: usize,
    /// Block steps skipped because a block region was unavailable.
    pub skipped: usize,
    pub restarts: usize,
}

/// Streams every block of the select area through the compositor.
///
/// The threshold is read from `control` for each block, so a value changed
/// by the host during [`crate::host::FilterRunner::process`] applies from the
/// next block on; hosts pair such changes with a restart.
pub fn run_blocks(
    ctx: &mut RunContext<'_>,
    channels: &ChannelIndexList,
    control: &mut ControlState,
) -> FilterResult<RunSummary> {
    let area = ctx
        .runner
        .select_area_rect()
        .ok_or(FilterError::HostQueryFailed("select area rect"))?;
    let total = ctx
        .destination
        .block_rect_count(area)
        .ok_or(FilterError::HostQueryFailed("block rect count"))?;
    ctx.runner.set_progress_total(total);

    let mut stream = BlockStream::new(total);
    let mut summary = RunSummary {
        total_blocks: total,
        ..RunSummary::default()
    };

    while !stream.is_finished() {
        let Some(result) = ctx.runner.process(stream.requested_state(), &mut *control) else {
            stream.abort();
            return Err(FilterError::HostQueryFailed("process"));
        };
        let Some(index) = stream.advance(result) else {
            continue;
        };

        match ctx.destination.block_rect(index, area) {
            Some(rect) => {
                match execute_block(ctx, index, rect, channels, control.threshold()) {
                    Ok(()) => summary.processed += 1,
                    Err(err) => {
                        summary.skipped += 1;
                        trace_debug!("block_skipped", index = index, reason = err.to_string().as_str());
                    }
                }
                ctx.runner.update_destination_offscreen_rect(rect);
            }
            None => {
                summary.skipped += 1;
                trace_debug!("block_skipped", index = index, reason = "block rect unavailable");
            }
        }

        let done = stream.complete_block();
        ctx.runner.set_progress_done(done);
    }

    summary.restarts = stream.restarts();
    trace_event!(
        "blocks_streamed",
        total = summary.total_blocks,
        processed = summary.processed,
        skipped = summary.skipped,
        restarts = summary.restarts,
    );
    Ok(summary)
}

fn execute_block(
    ctx: &mut RunContext<'_>,
    index: usize,
    rect: Rect,
    channels: &ChannelIndexList,
    level: ThresholdLevel,
) -> FilterResult<()> {
    let pos = rect.origin();
    let alpha = ctx
        .destination
        .mutable_block_alpha(pos)
        .ok_or(FilterError::BlockFetchFailed {
            index,
            what: "alpha block",
        })?;
    let weights = select_weights(ctx.select_area, pos, alpha.rect(), index)?;
    if !alpha.rect().contains(&rect) || !weights.rect().contains(&rect) {
        return Err(FilterError::BlockFetchFailed {
            index,
            what: "block covering the block rect",
        });
    }

    if channels.is_empty() {
        threshold_alpha(alpha, &weights, rect, level);
        return Ok(());
    }

    let image = ctx
        .destination
        .mutable_block_image(pos)
        .ok_or(FilterError::BlockFetchFailed {
            index,
            what: "image block",
        })?;
    let pixel_bytes = image.pixel_bytes();
    if !image.rect().contains(&rect) || channels.as_slice().iter().any(|&c| c >= pixel_bytes) {
        return Err(FilterError::BlockFetchFailed {
            index,
            what: "image block covering the planned channels",
        });
    }
    threshold_channels(image, &weights, rect, channels, level);
    Ok(())
}

fn select_weights<'s>(
    select_area: Option<&'s dyn SelectAreaOffscreen>,
    pos: Point,
    alpha_rect: Rect,
    index: usize,
) -> FilterResult<BlockView<'s>> {
    match select_area {
        Some(offscreen) => offscreen
            .block_select_area(pos)
            .ok_or(FilterError::BlockFetchFailed {
                index,
                what: "select area block",
            }),
        None => Ok(BlockView::full_weight(alpha_rect)),
    }
}

fn threshold_alpha(
    mut alpha: BlockViewMut<'_>,
    weights: &BlockView<'_>,
    rect: Rect,
    level: ThresholdLevel,
) {
    for y in rect.top..rect.bottom {
        for x in rect.left..rect.right {
            let Some(weight) = weights.sample(x, y, 0) else {
                continue;
            };
            if let Some(sample) = alpha.sample_mut(x, y, 0) {
                if let Some(value) = composite::apply(*sample, level, weight) {
                    *sample = value;
                }
            }
        }
    }
}

fn threshold_channels(
    mut image: BlockViewMut<'_>,
    weights: &BlockView<'_>,
    rect: Rect,
    channels: &ChannelIndexList,
    level: ThresholdLevel,
) {
    for y in rect.top..rect.bottom {
        for x in rect.left..rect.right {
            let Some(weight) = weights.sample(x, y, 0) else {
                continue;
            };
            if weight == 0 {
                continue;
            }
            for &channel in channels.as_slice() {
                if let Some(sample) = image.sample_mut(x, y, channel) {
                    if let Some(value) = composite::apply(*sample, level, weight) {
                        *sample = value;
                    }
                }
            }
        }
    }
}
