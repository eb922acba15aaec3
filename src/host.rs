//! Interfaces to the host application.
//!
//! The host owns the canvas memory, the property panel and the caption
//! resources; the filter reaches them only through the traits below. Each
//! lifecycle selector receives a context bundling the services valid for that
//! call. The contexts hold disjoint borrows so a run can hold the destination
//! offscreen, the selection offscreen and the runner record at the same time.
//!
//! [`memory`] provides an in-process host used by tests, benches and the CLI.

use crate::block::{BlockView, BlockViewMut, Point, Rect};
use crate::plan::{ChannelIndexSource, ChannelLayout, TargetKind};
use crate::stream::{ProcessResult, ProcessState};

pub mod memory;

/// Opaque id of a host caption resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub i32);

/// Key of an item in a property object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(pub i32);

/// Kind of module declared at module initialization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModuleKind {
    Filter,
    FilterActivation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueType {
    Void,
    Boolean,
    Enumeration,
    Integer,
    Decimal,
    Point,
    String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Default,
    Pixel,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputKind {
    Hide,
    Default,
    PushButton,
    Canvas,
}

/// Reason the host invokes the property callback.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallBackNotify {
    ValueChanged,
    ButtonPushed,
    ValueCheck,
}

/// Answer to a property callback.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallBackResult {
    /// Nothing the preview depends on changed.
    NoModify,
    /// The preview must be recomputed.
    Modify,
    /// The proposed value is rejected.
    Invalid,
}

/// Resolves caption resources.
pub trait StringService {
    fn resolve(&self, id: StringId) -> Option<String>;
}

/// Module initialization record.
pub trait ModuleInitializer {
    fn host_version(&self) -> Option<i32>;
    fn set_module_kind(&mut self, kind: ModuleKind) -> bool;
    fn set_module_id(&mut self, id: &str) -> bool;
}

/// Filter initialization record.
pub trait FilterInitializer {
    fn set_filter_category_name(&mut self, name: &str, access_key: char) -> bool;
    fn set_filter_name(&mut self, name: &str, access_key: char) -> bool;
    fn set_target_kinds(&mut self, kinds: &[TargetKind]) -> bool;
    fn set_use_blank_image(&mut self, use_blank_image: bool) -> bool;
    fn set_can_preview(&mut self, can_preview: bool) -> bool;
    /// Routes property notifications for this filter to the plug-in instance.
    fn set_property_callback(&mut self) -> bool;
    /// Attaches the property object of the current context to the filter.
    fn set_property(&mut self) -> bool;
}

/// Property object: typed items with bounds.
pub trait PropertyService {
    fn add_item(
        &mut self,
        key: ItemKey,
        value_type: ValueType,
        value_kind: ValueKind,
        input_kind: InputKind,
        caption: &str,
        access_key: char,
    ) -> bool;
    fn set_integer_min_value(&mut self, key: ItemKey, value: i32) -> bool;
    fn set_integer_max_value(&mut self, key: ItemKey, value: i32) -> bool;
    fn set_integer_default_value(&mut self, key: ItemKey, value: i32) -> bool;
    /// Whether the host remembers the value across sessions.
    fn set_item_store_value(&mut self, key: ItemKey, store: bool) -> bool;
    fn integer_value(&self, key: ItemKey) -> Option<i32>;
}

/// Receiver of property notifications; implemented by the plug-in.
pub trait PropertyCallback {
    fn on_property_notify(
        &mut self,
        property: &dyn PropertyService,
        key: ItemKey,
        notify: CallBackNotify,
        proposed: CallBackResult,
    ) -> CallBackResult;
}

/// Destination offscreen of a filter run.
pub trait Offscreen: ChannelIndexSource {
    fn channel_layout(&self) -> Option<ChannelLayout>;
    /// Number of blocks covering `area`.
    fn block_rect_count(&self, area: Rect) -> Option<usize>;
    /// Rectangle of block `index` within `area`.
    fn block_rect(&self, index: usize, area: Rect) -> Option<Rect>;
    /// Alpha plane of the block containing `pos`.
    fn mutable_block_alpha(&mut self, pos: Point) -> Option<BlockViewMut<'_>>;
    /// Image plane of the block containing `pos`.
    fn mutable_block_image(&mut self, pos: Point) -> Option<BlockViewMut<'_>>;
}

/// Selection weights of a filter run.
pub trait SelectAreaOffscreen {
    fn block_select_area(&self, pos: Point) -> Option<BlockView<'_>>;
}

/// Filter run record: region, progress and the block iterator.
pub trait FilterRunner {
    fn select_area_rect(&self) -> Option<Rect>;
    fn set_progress_total(&mut self, total: usize);
    fn set_progress_done(&mut self, done: usize);
    fn update_destination_offscreen_rect(&mut self, rect: Rect);
    /// Advances the host's block iterator.
    ///
    /// The host may deliver property notifications to `callback` before it
    /// answers, typically followed by [`ProcessResult::Restart`].
    fn process(
        &mut self,
        state: ProcessState,
        callback: &mut dyn PropertyCallback,
    ) -> Option<ProcessResult>;
}

/// Services available during `ModuleInitialize`.
pub struct ModuleContext<'a> {
    pub initializer: &'a mut dyn ModuleInitializer,
    pub strings: &'a dyn StringService,
}

/// Services available during `FilterInitialize`.
pub struct InitContext<'a> {
    pub initializer: &'a mut dyn FilterInitializer,
    pub property: &'a mut dyn PropertyService,
    pub strings: &'a dyn StringService,
}

/// Services available during `FilterRun`.
pub struct RunContext<'a> {
    pub runner: &'a mut dyn FilterRunner,
    pub destination: &'a mut dyn Offscreen,
    /// `None` when the run has no selection; every pixel is fully selected.
    pub select_area: Option<&'a dyn SelectAreaOffscreen>,
}

/// The host as seen by the selector dispatcher.
pub trait Server {
    fn module_context(&mut self) -> ModuleContext<'_>;
    fn init_context(&mut self) -> InitContext<'_>;
    fn run_context(&mut self) -> RunContext<'_>;

    /// Called once the plug-in returns from `FilterRun`, whatever the outcome.
    fn finish_run(&mut self) {}
}
