//! The threshold control and its property callback.

use std::num::NonZeroU8;

use crate::host::{
    CallBackNotify, CallBackResult, InputKind, ItemKey, PropertyCallback, PropertyService,
    ValueKind, ValueType,
};
use crate::metadata::Caption;
use crate::util::{FilterError, FilterResult};

/// Property item key of the threshold control.
pub const THRESHOLD_ITEM: ItemKey = ItemKey(10000);

/// Threshold level in `[1, 255]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThresholdLevel(NonZeroU8);

impl ThresholdLevel {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 255;
    /// Midpoint of the range, 128.
    pub const DEFAULT: Self = match NonZeroU8::new(((Self::MIN + Self::MAX) / 2) as u8) {
        Some(level) => Self(level),
        None => panic!("default threshold must be non-zero"),
    };

    /// Returns `None` when `value` is outside `[1, 255]`.
    pub fn new(value: i32) -> Option<Self> {
        let byte = u8::try_from(value).ok()?;
        NonZeroU8::new(byte).map(Self)
    }

    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl Default for ThresholdLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Mutable settings owned by the plug-in instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlState {
    threshold: ThresholdLevel,
}

impl ControlState {
    pub fn new(threshold: ThresholdLevel) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> ThresholdLevel {
        self.threshold
    }

    /// Declares the threshold item on the host property object.
    pub fn register(property: &mut dyn PropertyService, caption: &Caption) -> FilterResult<()> {
        let key = THRESHOLD_ITEM;
        if !property.add_item(
            key,
            ValueType::Integer,
            ValueKind::Default,
            InputKind::Default,
            &caption.text,
            caption.access_key,
        ) {
            return Err(FilterError::MetadataRegistrationFailed("threshold item"));
        }
        if !property.set_integer_min_value(key, ThresholdLevel::MIN) {
            return Err(FilterError::MetadataRegistrationFailed("threshold minimum"));
        }
        if !property.set_integer_max_value(key, ThresholdLevel::MAX) {
            return Err(FilterError::MetadataRegistrationFailed("threshold maximum"));
        }
        if !property.set_integer_default_value(key, i32::from(ThresholdLevel::DEFAULT.get())) {
            return Err(FilterError::MetadataRegistrationFailed("threshold default"));
        }
        if !property.set_item_store_value(key, false) {
            return Err(FilterError::MetadataRegistrationFailed("threshold store flag"));
        }
        Ok(())
    }

    fn on_value_changed(&mut self, property: &dyn PropertyService, key: ItemKey) -> CallBackResult {
        if key != THRESHOLD_ITEM {
            return CallBackResult::NoModify;
        }
        match property.integer_value(key).and_then(ThresholdLevel::new) {
            Some(level) if level != self.threshold => {
                self.threshold = level;
                CallBackResult::Modify
            }
            _ => CallBackResult::NoModify,
        }
    }
}

impl PropertyCallback for ControlState {
    fn on_property_notify(
        &mut self,
        property: &dyn PropertyService,
        key: ItemKey,
        notify: CallBackNotify,
        proposed: CallBackResult,
    ) -> CallBackResult {
        match notify {
            // No push-button items are registered.
            CallBackNotify::ButtonPushed => CallBackResult::NoModify,
            CallBackNotify::ValueCheck => proposed,
            CallBackNotify::ValueChanged => self.on_value_changed(property, key),
        }
    }
}
