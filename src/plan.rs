//! Channel planning for the destination layout.
//!
//! The planner runs once per filter run, before any block is touched. It
//! checks that the destination layout is one the filter declared, and decides
//! which bytes of each pixel the threshold applies to: the dedicated alpha
//! plane (empty index list) or a list of channel offsets inside the image
//! plane.

use crate::util::{FilterError, FilterResult};

/// Channel arrangement of the destination offscreen.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    Alpha,
    GrayAlpha,
    RgbAlpha,
    CmykAlpha,
    BinarizationAlpha,
    BinarizationGrayAlpha,
    SelectArea,
    Plane,
}

impl ChannelLayout {
    /// Short lowercase name, used in logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            ChannelLayout::Alpha => "alpha",
            ChannelLayout::GrayAlpha => "gray_alpha",
            ChannelLayout::RgbAlpha => "rgb_alpha",
            ChannelLayout::CmykAlpha => "cmyk_alpha",
            ChannelLayout::BinarizationAlpha => "binarization_alpha",
            ChannelLayout::BinarizationGrayAlpha => "binarization_gray_alpha",
            ChannelLayout::SelectArea => "select_area",
            ChannelLayout::Plane => "plane",
        }
    }

    /// Target kind that must be declared for this layout, if any.
    pub fn target_kind(self) -> Option<TargetKind> {
        match self {
            ChannelLayout::Alpha => Some(TargetKind::RasterLayerAlpha),
            ChannelLayout::GrayAlpha => Some(TargetKind::RasterLayerGrayAlpha),
            ChannelLayout::RgbAlpha => Some(TargetKind::RasterLayerRgbAlpha),
            ChannelLayout::CmykAlpha => Some(TargetKind::RasterLayerCmykAlpha),
            ChannelLayout::BinarizationAlpha => Some(TargetKind::RasterLayerBinarizationAlpha),
            ChannelLayout::BinarizationGrayAlpha => {
                Some(TargetKind::RasterLayerBinarizationGrayAlpha)
            }
            ChannelLayout::SelectArea | ChannelLayout::Plane => None,
        }
    }
}

/// Layer kinds a filter can declare support for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    RasterLayerGrayAlpha,
    RasterLayerRgbAlpha,
    RasterLayerCmykAlpha,
    RasterLayerAlpha,
    RasterLayerBinarizationAlpha,
    RasterLayerBinarizationGrayAlpha,
}

/// Fixed set of target kinds declared at filter initialization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TargetKindSet {
    kinds: &'static [TargetKind],
}

impl TargetKindSet {
    pub const fn new(kinds: &'static [TargetKind]) -> Self {
        Self { kinds }
    }

    pub fn contains(&self, kind: TargetKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn as_slice(&self) -> &'static [TargetKind] {
        self.kinds
    }
}

/// Ordered channel offsets the threshold applies to.
///
/// Holds 0 (alpha plane), 1 (gray), 3 (RGB) or 4 (CMYK) offsets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChannelIndexList {
    indices: [usize; 4],
    len: usize,
}

impl ChannelIndexList {
    /// Operate on the alpha plane.
    pub const fn alpha() -> Self {
        Self {
            indices: [0; 4],
            len: 0,
        }
    }

    /// Single gray channel at offset 0.
    pub const fn gray() -> Self {
        Self {
            indices: [0; 4],
            len: 1,
        }
    }

    pub const fn rgb(indices: [usize; 3]) -> Self {
        Self {
            indices: [indices[0], indices[1], indices[2], 0],
            len: 3,
        }
    }

    pub const fn cmyk(indices: [usize; 4]) -> Self {
        Self { indices, len: 4 }
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.indices[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Host queries for the channel offsets of multi-channel layouts.
pub trait ChannelIndexSource {
    /// Offsets of the R, G and B channels inside an image pixel.
    fn rgb_channel_index(&self) -> Option<[usize; 3]>;
    /// Offsets of the C, M, Y and K channels inside an image pixel.
    fn cmyk_channel_index(&self) -> Option<[usize; 4]>;
}

/// Decides which channels a run processes.
pub fn plan_channels<S>(
    layout: ChannelLayout,
    targets: TargetKindSet,
    source: &S,
) -> FilterResult<ChannelIndexList>
where
    S: ChannelIndexSource + ?Sized,
{
    let kind = layout
        .target_kind()
        .ok_or(FilterError::UnsupportedChannelLayout(layout))?;
    if !targets.contains(kind) {
        return Err(FilterError::UnsupportedChannelLayout(layout));
    }

    let channels = match layout {
        ChannelLayout::Alpha | ChannelLayout::BinarizationAlpha => ChannelIndexList::alpha(),
        ChannelLayout::GrayAlpha | ChannelLayout::BinarizationGrayAlpha => {
            ChannelIndexList::gray()
        }
        ChannelLayout::RgbAlpha => source
            .rgb_channel_index()
            .map(ChannelIndexList::rgb)
            .ok_or(FilterError::ChannelIndexQueryFailed(layout))?,
        ChannelLayout::CmykAlpha => source
            .cmyk_channel_index()
            .map(ChannelIndexList::cmyk)
            .ok_or(FilterError::ChannelIndexQueryFailed(layout))?,
        ChannelLayout::SelectArea | ChannelLayout::Plane => {
            return Err(FilterError::UnsupportedChannelLayout(layout))
        }
    };
    Ok(channels)
}
