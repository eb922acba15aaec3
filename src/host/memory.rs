//! In-process host backed by owned buffers.
//!
//! `MemoryHost` implements every host interface over plain vectors so the
//! filter can be driven end to end without the real application: integration
//! tests script the block iterator through [`MemoryRunner`], the benches time
//! full runs, and the CLI processes image files with it.
//!
//! The canvas is tiled into square blocks of `block_size` pixels aligned to
//! the canvas origin. The alpha plane holds one byte per pixel; the image
//! plane interleaves `pixel_bytes` bytes per pixel. When the runner answers
//! `Restart`, the canvas is rolled back to the pixels it held when the run
//! began, the way the application restores its preview. The rollback lands
//! at the next block fetch or when the run finishes, whichever comes first.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use crate::block::{BlockView, BlockViewMut, Point, Rect};
use crate::host::{
    CallBackNotify, CallBackResult, FilterInitializer, FilterRunner, InitContext, InputKind,
    ItemKey, ModuleContext, ModuleInitializer, ModuleKind, Offscreen, PropertyCallback,
    PropertyService, RunContext, SelectAreaOffscreen, Server, StringId, StringService, ValueKind,
    ValueType,
};
use crate::metadata;
use crate::plan::{ChannelIndexSource, ChannelLayout, TargetKind};
use crate::stream::{ProcessResult, ProcessState};
use crate::util::{FilterError, FilterResult};

/// Default block edge in pixels.
pub const DEFAULT_BLOCK_SIZE: i32 = 256;

/// Caption table keyed by string id.
#[derive(Clone, Debug, Default)]
pub struct MemoryStrings {
    entries: HashMap<StringId, String>,
}

impl MemoryStrings {
    /// Captions for every string id the filter resolves.
    pub fn english() -> Self {
        Self::default()
            .with(metadata::CATEGORY_NAME, "Binarize")
            .with(metadata::CATEGORY_ACCESS_KEY, "B")
            .with(metadata::FILTER_NAME, "Threshold")
            .with(metadata::FILTER_ACCESS_KEY, "T")
            .with(metadata::THRESHOLD_NAME, "Threshold level")
            .with(metadata::THRESHOLD_ACCESS_KEY, "L")
    }

    pub fn with(mut self, id: StringId, text: &str) -> Self {
        self.insert(id, text);
        self
    }

    pub fn insert(&mut self, id: StringId, text: &str) {
        self.entries.insert(id, text.to_owned());
    }

    pub fn remove(&mut self, id: StringId) {
        self.entries.remove(&id);
    }
}

impl StringService for MemoryStrings {
    fn resolve(&self, id: StringId) -> Option<String> {
        self.entries.get(&id).cloned()
    }
}

/// Records the module declarations.
#[derive(Clone, Debug, Default)]
pub struct MemoryModule {
    pub host_version: Option<i32>,
    pub module_kind: Option<ModuleKind>,
    pub module_id: Option<String>,
    /// Name of a setter to reject, e.g. `"set_module_id"`.
    pub reject: Option<&'static str>,
}

impl ModuleInitializer for MemoryModule {
    fn host_version(&self) -> Option<i32> {
        self.host_version
    }

    fn set_module_kind(&mut self, kind: ModuleKind) -> bool {
        if self.reject == Some("set_module_kind") {
            return false;
        }
        self.module_kind = Some(kind);
        true
    }

    fn set_module_id(&mut self, id: &str) -> bool {
        if self.reject == Some("set_module_id") {
            return false;
        }
        self.module_id = Some(id.to_owned());
        true
    }
}

/// Records the filter declarations.
#[derive(Clone, Debug, Default)]
pub struct MemoryInitializer {
    pub category: Option<(String, char)>,
    pub name: Option<(String, char)>,
    pub target_kinds: Vec<TargetKind>,
    pub use_blank_image: Option<bool>,
    pub can_preview: Option<bool>,
    pub property_callback: bool,
    pub property_attached: bool,
    /// Name of a setter to reject, e.g. `"set_target_kinds"`.
    pub reject: Option<&'static str>,
}

impl MemoryInitializer {
    fn accepts(&self, setter: &str) -> bool {
        self.reject != Some(setter)
    }
}

impl FilterInitializer for MemoryInitializer {
    fn set_filter_category_name(&mut self, name: &str, access_key: char) -> bool {
        if !self.accepts("set_filter_category_name") {
            return false;
        }
        self.category = Some((name.to_owned(), access_key));
        true
    }

    fn set_filter_name(&mut self, name: &str, access_key: char) -> bool {
        if !self.accepts("set_filter_name") {
            return false;
        }
        self.name = Some((name.to_owned(), access_key));
        true
    }

    fn set_target_kinds(&mut self, kinds: &[TargetKind]) -> bool {
        if !self.accepts("set_target_kinds") {
            return false;
        }
        self.target_kinds = kinds.to_vec();
        true
    }

    fn set_use_blank_image(&mut self, use_blank_image: bool) -> bool {
        if !self.accepts("set_use_blank_image") {
            return false;
        }
        self.use_blank_image = Some(use_blank_image);
        true
    }

    fn set_can_preview(&mut self, can_preview: bool) -> bool {
        if !self.accepts("set_can_preview") {
            return false;
        }
        self.can_preview = Some(can_preview);
        true
    }

    fn set_property_callback(&mut self) -> bool {
        if !self.accepts("set_property_callback") {
            return false;
        }
        self.property_callback = true;
        true
    }

    fn set_property(&mut self) -> bool {
        if !self.accepts("set_property") {
            return false;
        }
        self.property_attached = true;
        true
    }
}

/// One declared property item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryItem {
    pub value_type: ValueType,
    pub value_kind: ValueKind,
    pub input_kind: InputKind,
    pub caption: String,
    pub access_key: char,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub default: Option<i32>,
    pub store: bool,
    pub value: Option<i32>,
}

impl MemoryItem {
    fn in_bounds(&self, value: i32) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Property object with integer items and host-side bounds validation.
#[derive(Clone, Debug, Default)]
pub struct MemoryProperty {
    items: BTreeMap<ItemKey, MemoryItem>,
    /// Name of a setter to reject, e.g. `"add_item"`.
    pub reject: Option<&'static str>,
}

impl MemoryProperty {
    pub fn item(&self, key: ItemKey) -> Option<&MemoryItem> {
        self.items.get(&key)
    }

    /// Stores `value` if the item is an integer and the value is in bounds.
    pub fn set_integer_value(&mut self, key: ItemKey, value: i32) -> bool {
        match self.items.get_mut(&key) {
            Some(item) if item.value_type == ValueType::Integer && item.in_bounds(value) => {
                item.value = Some(value);
                true
            }
            _ => false,
        }
    }

    /// Edits an item the way the property panel does: a `ValueCheck` round
    /// trip, the store, then a `ValueChanged` notification.
    pub fn edit_integer(
        &mut self,
        key: ItemKey,
        value: i32,
        callback: &mut dyn PropertyCallback,
    ) -> CallBackResult {
        let proposed = match self.items.get(&key) {
            Some(item) if item.in_bounds(value) => CallBackResult::NoModify,
            _ => CallBackResult::Invalid,
        };
        let verdict = callback.on_property_notify(&*self, key, CallBackNotify::ValueCheck, proposed);
        if verdict == CallBackResult::Invalid || !self.set_integer_value(key, value) {
            return CallBackResult::Invalid;
        }
        callback.on_property_notify(
            &*self,
            key,
            CallBackNotify::ValueChanged,
            CallBackResult::NoModify,
        )
    }

    fn update(&mut self, setter: &'static str, key: ItemKey, f: impl FnOnce(&mut MemoryItem)) -> bool {
        if self.reject == Some(setter) {
            return false;
        }
        match self.items.get_mut(&key) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }
}

impl PropertyService for MemoryProperty {
    fn add_item(
        &mut self,
        key: ItemKey,
        value_type: ValueType,
        value_kind: ValueKind,
        input_kind: InputKind,
        caption: &str,
        access_key: char,
    ) -> bool {
        if self.reject == Some("add_item") || self.items.contains_key(&key) {
            return false;
        }
        self.items.insert(
            key,
            MemoryItem {
                value_type,
                value_kind,
                input_kind,
                caption: caption.to_owned(),
                access_key,
                min: None,
                max: None,
                default: None,
                store: true,
                value: None,
            },
        );
        true
    }

    fn set_integer_min_value(&mut self, key: ItemKey, value: i32) -> bool {
        self.update("set_integer_min_value", key, |item| item.min = Some(value))
    }

    fn set_integer_max_value(&mut self, key: ItemKey, value: i32) -> bool {
        self.update("set_integer_max_value", key, |item| item.max = Some(value))
    }

    fn set_integer_default_value(&mut self, key: ItemKey, value: i32) -> bool {
        self.update("set_integer_default_value", key, |item| {
            item.default = Some(value);
            item.value.get_or_insert(value);
        })
    }

    fn set_item_store_value(&mut self, key: ItemKey, store: bool) -> bool {
        self.update("set_item_store_value", key, |item| item.store = store)
    }

    fn integer_value(&self, key: ItemKey) -> Option<i32> {
        self.items
            .get(&key)
            .filter(|item| item.value_type == ValueType::Integer)
            .and_then(|item| item.value)
    }
}

/// Destination canvas: an alpha plane plus an optional interleaved image
/// plane.
#[derive(Debug)]
pub struct MemoryCanvas {
    layout: ChannelLayout,
    width: i32,
    height: i32,
    pixel_bytes: usize,
    alpha: Vec<u8>,
    image: Vec<u8>,
    rgb_index: [usize; 3],
    cmyk_index: [usize; 4],
    block_size: i32,
    source: Option<(Vec<u8>, Vec<u8>)>,
    restore: Rc<Cell<bool>>,
}

impl MemoryCanvas {
    /// Zero-filled canvas. The image plane has 0 bytes per pixel for alpha
    /// layouts, 1 for gray, 3 for RGB and 4 for CMYK.
    pub fn new(layout: ChannelLayout, width: i32, height: i32) -> FilterResult<Self> {
        if width <= 0 || height <= 0 {
            return Err(FilterError::InvalidDimensions { width, height });
        }
        let pixel_bytes = match layout {
            ChannelLayout::Alpha | ChannelLayout::BinarizationAlpha => 0,
            ChannelLayout::GrayAlpha
            | ChannelLayout::BinarizationGrayAlpha
            | ChannelLayout::SelectArea
            | ChannelLayout::Plane => 1,
            ChannelLayout::RgbAlpha => 3,
            ChannelLayout::CmykAlpha => 4,
        };
        let pixels = width as usize * height as usize;
        Ok(Self {
            layout,
            width,
            height,
            pixel_bytes,
            alpha: vec![0; pixels],
            image: vec![0; pixels * pixel_bytes],
            rgb_index: [0, 1, 2],
            cmyk_index: [0, 1, 2, 3],
            block_size: DEFAULT_BLOCK_SIZE,
            source: None,
            restore: Rc::new(Cell::new(false)),
        })
    }

    /// Reallocates the image plane with `pixel_bytes` per pixel, e.g. 4 for
    /// a padded BGRX layout.
    pub fn with_pixel_bytes(mut self, pixel_bytes: usize) -> Self {
        self.pixel_bytes = pixel_bytes;
        self.image = vec![0; self.alpha.len() * pixel_bytes];
        self
    }

    pub fn with_rgb_index(mut self, index: [usize; 3]) -> Self {
        self.rgb_index = index;
        self
    }

    pub fn with_cmyk_index(mut self, index: [usize; 4]) -> Self {
        self.cmyk_index = index;
        self
    }

    pub fn with_block_size(mut self, block_size: i32) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn pixel_bytes(&self) -> usize {
        self.pixel_bytes
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    pub fn alpha(&self) -> &[u8] {
        &self.alpha
    }

    pub fn alpha_mut(&mut self) -> &mut [u8] {
        &mut self.alpha
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    /// Remembers the current pixels as the state a restart rolls back to.
    pub fn begin_run(&mut self) {
        self.source = Some((self.alpha.clone(), self.image.clone()));
        self.restore.set(false);
    }

    fn restore_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.restore)
    }

    /// Applies a rollback still pending from the last `Restart` answer and
    /// forgets the run snapshot.
    pub fn finish_run(&mut self) {
        self.restore_if_requested();
        self.source = None;
    }

    fn restore_if_requested(&mut self) {
        if !self.restore.replace(false) {
            return;
        }
        if let Some((alpha, image)) = &self.source {
            self.alpha.copy_from_slice(alpha);
            self.image.copy_from_slice(image);
        }
    }

    /// Grid columns and rows touched by `area`: `(first_col, first_row, cols, rows)`.
    fn grid_span(&self, area: Rect) -> Option<(i32, i32, usize, usize)> {
        let clipped = area.intersect(&self.bounds())?;
        let bs = self.block_size;
        let (c0, c1) = (clipped.left / bs, (clipped.right - 1) / bs);
        let (r0, r1) = (clipped.top / bs, (clipped.bottom - 1) / bs);
        Some((c0, r0, (c1 - c0 + 1) as usize, (r1 - r0 + 1) as usize))
    }

    fn grid_block(&self, pos: Point) -> Option<Rect> {
        let bounds = self.bounds();
        if !bounds.contains_point(pos) {
            return None;
        }
        let bs = self.block_size;
        let (left, top) = (pos.x / bs * bs, pos.y / bs * bs);
        Rect::new(left, top, left + bs, top + bs).intersect(&bounds)
    }
}

impl ChannelIndexSource for MemoryCanvas {
    fn rgb_channel_index(&self) -> Option<[usize; 3]> {
        (self.layout == ChannelLayout::RgbAlpha).then_some(self.rgb_index)
    }

    fn cmyk_channel_index(&self) -> Option<[usize; 4]> {
        (self.layout == ChannelLayout::CmykAlpha).then_some(self.cmyk_index)
    }
}

impl Offscreen for MemoryCanvas {
    fn channel_layout(&self) -> Option<ChannelLayout> {
        Some(self.layout)
    }

    fn block_rect_count(&self, area: Rect) -> Option<usize> {
        Some(
            self.grid_span(area)
                .map_or(0, |(_, _, cols, rows)| cols * rows),
        )
    }

    fn block_rect(&self, index: usize, area: Rect) -> Option<Rect> {
        let (c0, r0, cols, rows) = self.grid_span(area)?;
        if index >= cols * rows {
            return None;
        }
        let col = c0 + (index % cols) as i32;
        let row = r0 + (index / cols) as i32;
        let bs = self.block_size;
        Rect::new(col * bs, row * bs, (col + 1) * bs, (row + 1) * bs)
            .intersect(&area)?
            .intersect(&self.bounds())
    }

    fn mutable_block_alpha(&mut self, pos: Point) -> Option<BlockViewMut<'_>> {
        self.restore_if_requested();
        let rect = self.grid_block(pos)?;
        let row_bytes = self.width as usize;
        let start = rect.top as usize * row_bytes + rect.left as usize;
        BlockViewMut::new(self.alpha.get_mut(start..)?, rect, row_bytes, 1).ok()
    }

    fn mutable_block_image(&mut self, pos: Point) -> Option<BlockViewMut<'_>> {
        self.restore_if_requested();
        if self.pixel_bytes == 0 {
            return None;
        }
        let rect = self.grid_block(pos)?;
        let row_bytes = self.width as usize * self.pixel_bytes;
        let start = rect.top as usize * row_bytes + rect.left as usize * self.pixel_bytes;
        BlockViewMut::new(
            self.image.get_mut(start..)?,
            rect,
            row_bytes,
            self.pixel_bytes,
        )
        .ok()
    }
}

/// Selection mask with one weight byte per pixel.
#[derive(Clone, Debug)]
pub struct MemorySelection {
    width: i32,
    height: i32,
    weights: Vec<u8>,
}

impl MemorySelection {
    pub fn new(width: i32, height: i32, weights: Vec<u8>) -> FilterResult<Self> {
        if width <= 0 || height <= 0 {
            return Err(FilterError::InvalidDimensions { width, height });
        }
        let needed = width as usize * height as usize;
        if weights.len() != needed {
            return Err(FilterError::BufferTooSmall {
                needed,
                got: weights.len(),
            });
        }
        Ok(Self {
            width,
            height,
            weights,
        })
    }

    pub fn weights(&self) -> &[u8] {
        &self.weights
    }
}

impl SelectAreaOffscreen for MemorySelection {
    fn block_select_area(&self, pos: Point) -> Option<BlockView<'_>> {
        let bounds = Rect::from_size(self.width, self.height);
        if !bounds.contains_point(pos) {
            return None;
        }
        let rect = Rect::new(pos.x, pos.y, self.width, self.height);
        let row_bytes = self.width as usize;
        let start = pos.y as usize * row_bytes + pos.x as usize;
        BlockView::new(self.weights.get(start..)?, rect, row_bytes, 1).ok()
    }
}

#[derive(Copy, Clone, Debug)]
struct ScriptedEdit {
    at_request: usize,
    key: ItemKey,
    value: i32,
}

/// Filter run record with a scriptable block iterator.
///
/// Unscripted, it answers `Continue` to `Start` and `Continue` requests and
/// `Exit` to `End`. Queued answers take precedence; `None` simulates a
/// failing iterator call. Scheduled edits change a property item before the
/// answer to the given request; an edit the plug-in reports as `Modify`
/// turns that answer into `Restart`.
#[derive(Debug, Default)]
pub struct MemoryRunner {
    /// The property object registered at filter initialization.
    pub property: MemoryProperty,
    area: Option<Rect>,
    answers: VecDeque<Option<ProcessResult>>,
    edits: Vec<ScriptedEdit>,
    requests: Vec<ProcessState>,
    progress_total: Option<usize>,
    progress_done: Vec<usize>,
    updated: Vec<Rect>,
    restore: Rc<Cell<bool>>,
}

impl MemoryRunner {
    pub fn set_area(&mut self, area: Option<Rect>) {
        self.area = area;
    }

    /// Queues an answer for the next unscripted request.
    pub fn push_answer(&mut self, answer: Option<ProcessResult>) {
        self.answers.push_back(answer);
    }

    /// Edits `key` to `value` while answering request number `at_request`
    /// (0-based, counted over the whole session).
    pub fn schedule_edit(&mut self, at_request: usize, key: ItemKey, value: i32) {
        self.edits.push(ScriptedEdit {
            at_request,
            key,
            value,
        });
    }

    /// Every state requested so far, in order.
    pub fn requests(&self) -> &[ProcessState] {
        &self.requests
    }

    pub fn progress_total(&self) -> Option<usize> {
        self.progress_total
    }

    /// Every progress value reported so far, in order.
    pub fn progress_done(&self) -> &[usize] {
        &self.progress_done
    }

    /// Every rectangle reported as updated, in order.
    pub fn updated_rects(&self) -> &[Rect] {
        &self.updated
    }

    /// Forgets the recorded requests, progress and updates.
    pub fn clear_log(&mut self) {
        self.requests.clear();
        self.progress_total = None;
        self.progress_done.clear();
        self.updated.clear();
    }

    fn default_answer(state: ProcessState) -> ProcessResult {
        match state {
            ProcessState::Start | ProcessState::Continue => ProcessResult::Continue,
            ProcessState::End | ProcessState::Abort => ProcessResult::Exit,
        }
    }
}

impl FilterRunner for MemoryRunner {
    fn select_area_rect(&self) -> Option<Rect> {
        self.area
    }

    fn set_progress_total(&mut self, total: usize) {
        self.progress_total = Some(total);
    }

    fn set_progress_done(&mut self, done: usize) {
        self.progress_done.push(done);
    }

    fn update_destination_offscreen_rect(&mut self, rect: Rect) {
        self.updated.push(rect);
    }

    fn process(
        &mut self,
        state: ProcessState,
        callback: &mut dyn PropertyCallback,
    ) -> Option<ProcessResult> {
        let request = self.requests.len();
        self.requests.push(state);

        let mut modified = false;
        let due: Vec<ScriptedEdit> = self
            .edits
            .iter()
            .copied()
            .filter(|edit| edit.at_request == request)
            .collect();
        for edit in due {
            let verdict = self.property.edit_integer(edit.key, edit.value, callback);
            modified |= verdict == CallBackResult::Modify;
        }

        let answer = if modified {
            Some(ProcessResult::Restart)
        } else {
            match self.answers.pop_front() {
                Some(answer) => answer,
                None => Some(Self::default_answer(state)),
            }
        };
        if answer == Some(ProcessResult::Restart) {
            self.restore.set(true);
        }
        answer
    }
}

/// A complete in-process host.
#[derive(Debug)]
pub struct MemoryHost {
    pub strings: MemoryStrings,
    pub module: MemoryModule,
    pub initializer: MemoryInitializer,
    pub runner: MemoryRunner,
    pub canvas: MemoryCanvas,
    pub selection: Option<MemorySelection>,
}

impl MemoryHost {
    /// Host at version 1 with English captions, running over the whole
    /// canvas without a selection.
    pub fn new(canvas: MemoryCanvas) -> Self {
        let runner = MemoryRunner {
            area: Some(canvas.bounds()),
            restore: canvas.restore_flag(),
            ..MemoryRunner::default()
        };
        Self {
            strings: MemoryStrings::english(),
            module: MemoryModule {
                host_version: Some(metadata::NEED_HOST_VERSION),
                ..MemoryModule::default()
            },
            initializer: MemoryInitializer::default(),
            runner,
            canvas,
            selection: None,
        }
    }

    pub fn with_selection(mut self, selection: MemorySelection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Restricts runs to `area` instead of the whole canvas.
    pub fn with_area(mut self, area: Rect) -> Self {
        self.runner.area = Some(area);
        self
    }
}

impl Server for MemoryHost {
    fn module_context(&mut self) -> ModuleContext<'_> {
        ModuleContext {
            initializer: &mut self.module,
            strings: &self.strings,
        }
    }

    fn init_context(&mut self) -> InitContext<'_> {
        InitContext {
            initializer: &mut self.initializer,
            property: &mut self.runner.property,
            strings: &self.strings,
        }
    }

    fn run_context(&mut self) -> RunContext<'_> {
        self.canvas.begin_run();
        RunContext {
            runner: &mut self.runner,
            destination: &mut self.canvas,
            select_area: self
                .selection
                .as_ref()
                .map(|selection| selection as &dyn SelectAreaOffscreen),
        }
    }

    fn finish_run(&mut self) {
        self.canvas.finish_run();
    }
}
