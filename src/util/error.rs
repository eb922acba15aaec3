//! Error types for the threshold filter.

use crate::lifecycle::{LifecycleState, Selector};
use crate::plan::ChannelLayout;
use thiserror::Error;

/// Result alias for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors that can occur while initializing or running the filter.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    /// The host reported a version older than the filter requires.
    #[error("host version {host} is older than required version {required}")]
    HostVersionTooOld { host: i32, required: i32 },
    /// A caption or its access key could not be resolved to a usable string.
    #[error("caption `{name}` could not be resolved")]
    CaptionResolutionFailed { name: &'static str },
    /// The host rejected a piece of declared metadata.
    #[error("host rejected metadata: {0}")]
    MetadataRegistrationFailed(&'static str),
    /// The destination layout is not one this filter processes.
    #[error("unsupported channel layout {0:?}")]
    UnsupportedChannelLayout(ChannelLayout),
    /// The host could not report the channel offsets for the layout.
    #[error("channel index query failed for {0:?}")]
    ChannelIndexQueryFailed(ChannelLayout),
    /// A block region was unavailable for the given block index.
    #[error("block {index}: {what} unavailable")]
    BlockFetchFailed { index: usize, what: &'static str },
    /// A run-level host query returned no value.
    #[error("host query failed: {0}")]
    HostQueryFailed(&'static str),
    /// A selector arrived in a state that does not accept it.
    #[error("selector {selector:?} is invalid in state {state:?}")]
    InvalidLifecycle {
        selector: Selector,
        state: LifecycleState,
    },
    /// Block dimensions are zero or negative.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    /// Row stride cannot hold a row of pixels.
    #[error("row stride {row_bytes} is smaller than a row of {width} pixels of {pixel_bytes} bytes")]
    InvalidStride {
        width: usize,
        row_bytes: usize,
        pixel_bytes: usize,
    },
    /// The backing buffer is shorter than the geometry requires.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Image decoding or encoding failed.
    #[error("image io: {reason}")]
    ImageIo { reason: String },
}
