//! A host-loaded filter that binarizes raster layers.
//!
//! The filter thresholds either the alpha plane or the gray/RGB channels of a
//! layer and blends the binary result against the original sample with the
//! per-pixel selection weight. The host owns the canvas memory and drives the
//! run one block at a time; the crate models it through the traits in
//! [`host`], and ships an in-memory implementation in [`host::memory`].
//!
//! ```
//! use threshold_filter::host::memory::{MemoryCanvas, MemoryHost};
//! use threshold_filter::{dispatch, CallResult, ChannelLayout, Selector, ThresholdFilter};
//!
//! let mut canvas = MemoryCanvas::new(ChannelLayout::Alpha, 4, 1).unwrap();
//! canvas.alpha_mut().copy_from_slice(&[0, 127, 128, 255]);
//! let mut host = MemoryHost::new(canvas);
//!
//! let mut handle: Option<Box<ThresholdFilter>> = None;
//! for selector in [
//!     Selector::ModuleInitialize,
//!     Selector::FilterInitialize,
//!     Selector::FilterRun,
//! ] {
//!     assert_eq!(dispatch(selector, &mut handle, &mut host), CallResult::Success);
//! }
//! assert_eq!(host.canvas.alpha(), &[0, 0, 255, 255]);
//! ```

pub mod block;
pub mod composite;
pub mod control;
pub mod host;
#[cfg(feature = "image-io")]
pub mod io;
pub mod lifecycle;
pub mod metadata;
pub mod plan;
pub mod stream;
mod trace;
pub mod util;

pub use block::{BlockView, BlockViewMut, Point, Rect};
pub use control::{ControlState, ThresholdLevel, THRESHOLD_ITEM};
pub use lifecycle::{
    dispatch, property_callback, CallResult, FilterPlugin, LifecycleState, Selector,
    ThresholdFilter,
};
pub use plan::{plan_channels, ChannelIndexList, ChannelLayout, TargetKind, TargetKindSet};
pub use stream::{run_blocks, BlockStream, ProcessResult, ProcessState, RunSummary};
pub use util::{FilterError, FilterResult};
