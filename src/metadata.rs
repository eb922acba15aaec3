//! Declared module and filter metadata.

use crate::host::{StringId, StringService};
use crate::plan::{TargetKind, TargetKindSet};
use crate::util::{FilterError, FilterResult};

pub const MODULE_ID: &str = "6904699D-BAF9-4669-893F-0C1F29EB88B3";

/// Oldest host version the filter runs on.
pub const NEED_HOST_VERSION: i32 = 1;

pub const CATEGORY_NAME: StringId = StringId(100);
pub const CATEGORY_ACCESS_KEY: StringId = StringId(101);
pub const FILTER_NAME: StringId = StringId(200);
pub const FILTER_ACCESS_KEY: StringId = StringId(201);
pub const THRESHOLD_NAME: StringId = StringId(10000);
pub const THRESHOLD_ACCESS_KEY: StringId = StringId(10001);

pub const TARGET_KINDS: TargetKindSet = TargetKindSet::new(&[
    TargetKind::RasterLayerAlpha,
    TargetKind::RasterLayerGrayAlpha,
    TargetKind::RasterLayerRgbAlpha,
]);

/// The filter always needs real source pixels.
pub const USE_BLANK_IMAGE: bool = false;
pub const CAN_PREVIEW: bool = true;

/// A resolved display string with its menu access key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caption {
    pub text: String,
    pub access_key: char,
}

/// Resolves a caption and its access key.
///
/// The access key is the first character of the access-key resource; an
/// empty or missing resource fails the caption.
pub fn resolve_caption(
    strings: &dyn StringService,
    name: StringId,
    access_key: StringId,
    label: &'static str,
) -> FilterResult<Caption> {
    let failed = || FilterError::CaptionResolutionFailed { name: label };
    let text = strings
        .resolve(name)
        .filter(|text| !text.is_empty())
        .ok_or_else(failed)?;
    let access_key = strings
        .resolve(access_key)
        .and_then(|key| key.chars().next())
        .ok_or_else(failed)?;
    Ok(Caption { text, access_key })
}
