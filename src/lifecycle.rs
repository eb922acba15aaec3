//! Selector dispatch and the threshold filter plug-in.
//!
//! The host loads the module and then drives it with five selectors:
//! `ModuleInitialize`, `FilterInitialize`, `FilterRun` (any number of times,
//! once per preview or apply), `FilterTerminate` and `ModuleTerminate`. The
//! instance handle the host keeps between calls is an `Option<Box<P>>`:
//! allocated by `ModuleInitialize` on success and dropped by
//! `ModuleTerminate`.

use crate::control::ControlState;
use crate::host::{
    CallBackNotify, CallBackResult, InitContext, ItemKey, ModuleContext, ModuleKind,
    PropertyCallback, PropertyService, RunContext, Server,
};
use crate::metadata::{
    resolve_caption, CAN_PREVIEW, CATEGORY_ACCESS_KEY, CATEGORY_NAME, FILTER_ACCESS_KEY,
    FILTER_NAME, MODULE_ID, NEED_HOST_VERSION, TARGET_KINDS, THRESHOLD_ACCESS_KEY,
    THRESHOLD_NAME, USE_BLANK_IMAGE,
};
use crate::plan::plan_channels;
use crate::stream::{run_blocks, RunSummary};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{FilterError, FilterResult};

/// Host call selectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    ModuleInitialize,
    ModuleTerminate,
    FilterInitialize,
    FilterTerminate,
    FilterRun,
}

impl Selector {
    pub fn name(self) -> &'static str {
        match self {
            Selector::ModuleInitialize => "module_initialize",
            Selector::ModuleTerminate => "module_terminate",
            Selector::FilterInitialize => "filter_initialize",
            Selector::FilterTerminate => "filter_terminate",
            Selector::FilterRun => "filter_run",
        }
    }
}

/// Outcome reported to the host for every selector.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallResult {
    Success,
    Failed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Unloaded,
    ModuleReady,
    FilterReady,
    Running,
    Terminated,
}

/// A filter module driven by the selector protocol.
pub trait FilterPlugin: PropertyCallback {
    fn state(&self) -> LifecycleState;
    fn module_initialize(&mut self, ctx: ModuleContext<'_>) -> FilterResult<()>;
    fn filter_initialize(&mut self, ctx: InitContext<'_>) -> FilterResult<()>;
    fn filter_run(&mut self, ctx: RunContext<'_>) -> FilterResult<()>;
    fn filter_terminate(&mut self) -> FilterResult<()>;
    fn module_terminate(&mut self) -> FilterResult<()>;
}

/// Routes a host selector to the plug-in instance behind `instance`.
pub fn dispatch<P>(
    selector: Selector,
    instance: &mut Option<Box<P>>,
    server: &mut dyn Server,
) -> CallResult
where
    P: FilterPlugin + Default,
{
    match route(selector, instance, server) {
        Ok(()) => CallResult::Success,
        Err(err) => {
            trace_warn!(
                "selector_failed",
                selector = selector.name(),
                error = err.to_string().as_str(),
            );
            CallResult::Failed
        }
    }
}

fn route<P>(
    selector: Selector,
    instance: &mut Option<Box<P>>,
    server: &mut dyn Server,
) -> FilterResult<()>
where
    P: FilterPlugin + Default,
{
    match selector {
        Selector::ModuleInitialize => match instance.as_deref().map(P::state) {
            Some(state) => Err(FilterError::InvalidLifecycle { selector, state }),
            None => {
                let mut plugin = Box::<P>::default();
                let outcome = plugin.module_initialize(server.module_context());
                if outcome.is_ok() {
                    *instance = Some(plugin);
                }
                outcome
            }
        },
        Selector::ModuleTerminate => match instance.take() {
            Some(mut plugin) => plugin.module_terminate(),
            None => Err(unloaded(selector)),
        },
        Selector::FilterInitialize => match instance.as_deref_mut() {
            Some(plugin) => plugin.filter_initialize(server.init_context()),
            None => Err(unloaded(selector)),
        },
        Selector::FilterRun => match instance.as_deref_mut() {
            Some(plugin) => {
                let outcome = plugin.filter_run(server.run_context());
                server.finish_run();
                outcome
            }
            None => Err(unloaded(selector)),
        },
        Selector::FilterTerminate => match instance.as_deref_mut() {
            Some(plugin) => plugin.filter_terminate(),
            None => Err(unloaded(selector)),
        },
    }
}

/// Routes a host property notification to the plug-in instance.
///
/// Without an instance the proposed value is rejected.
pub fn property_callback<P>(
    instance: &mut Option<Box<P>>,
    property: &dyn PropertyService,
    key: ItemKey,
    notify: CallBackNotify,
    proposed: CallBackResult,
) -> CallBackResult
where
    P: FilterPlugin,
{
    match instance.as_deref_mut() {
        Some(plugin) => plugin.on_property_notify(property, key, notify, proposed),
        None => CallBackResult::Invalid,
    }
}

fn unloaded(selector: Selector) -> FilterError {
    FilterError::InvalidLifecycle {
        selector,
        state: LifecycleState::Unloaded,
    }
}

/// Binarizes the alpha plane, or the gray/RGB channels, of a raster layer.
#[derive(Debug)]
pub struct ThresholdFilter {
    state: LifecycleState,
    control: ControlState,
    last_run: Option<RunSummary>,
}

impl Default for ThresholdFilter {
    fn default() -> Self {
        Self {
            state: LifecycleState::Unloaded,
            control: ControlState::default(),
            last_run: None,
        }
    }
}

impl ThresholdFilter {
    pub fn control(&self) -> &ControlState {
        &self.control
    }

    /// Summary of the most recent successful run.
    pub fn last_run(&self) -> Option<RunSummary> {
        self.last_run
    }

    fn expect_state(&self, selector: Selector, allowed: &[LifecycleState]) -> FilterResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(FilterError::InvalidLifecycle {
                selector,
                state: self.state,
            })
        }
    }

    fn run_pass(&mut self, ctx: &mut RunContext<'_>) -> FilterResult<RunSummary> {
        let layout = ctx
            .destination
            .channel_layout()
            .ok_or(FilterError::HostQueryFailed("channel layout"))?;
        let channels = plan_channels(layout, TARGET_KINDS, &*ctx.destination)?;
        trace_event!(
            "channels_planned",
            layout = layout.name(),
            channels = channels.len(),
        );
        run_blocks(ctx, &channels, &mut self.control)
    }
}

impl PropertyCallback for ThresholdFilter {
    fn on_property_notify(
        &mut self,
        property: &dyn PropertyService,
        key: ItemKey,
        notify: CallBackNotify,
        proposed: CallBackResult,
    ) -> CallBackResult {
        self.control
            .on_property_notify(property, key, notify, proposed)
    }
}

impl FilterPlugin for ThresholdFilter {
    fn state(&self) -> LifecycleState {
        self.state
    }

    fn module_initialize(&mut self, ctx: ModuleContext<'_>) -> FilterResult<()> {
        self.expect_state(Selector::ModuleInitialize, &[LifecycleState::Unloaded])?;
        let _span = trace_span!("module_initialize").entered();

        let host = ctx
            .initializer
            .host_version()
            .ok_or(FilterError::HostQueryFailed("host version"))?;
        if host < NEED_HOST_VERSION {
            return Err(FilterError::HostVersionTooOld {
                host,
                required: NEED_HOST_VERSION,
            });
        }
        if !ctx.initializer.set_module_kind(ModuleKind::Filter) {
            return Err(FilterError::MetadataRegistrationFailed("module kind"));
        }
        if !ctx.initializer.set_module_id(MODULE_ID) {
            return Err(FilterError::MetadataRegistrationFailed("module id"));
        }

        self.state = LifecycleState::ModuleReady;
        Ok(())
    }

    fn filter_initialize(&mut self, ctx: InitContext<'_>) -> FilterResult<()> {
        self.expect_state(
            Selector::FilterInitialize,
            &[LifecycleState::ModuleReady, LifecycleState::Terminated],
        )?;
        let _span = trace_span!("filter_initialize").entered();
        let InitContext {
            initializer,
            property,
            strings,
        } = ctx;

        let category = resolve_caption(strings, CATEGORY_NAME, CATEGORY_ACCESS_KEY, "category")?;
        if !initializer.set_filter_category_name(&category.text, category.access_key) {
            return Err(FilterError::MetadataRegistrationFailed("category name"));
        }
        let name = resolve_caption(strings, FILTER_NAME, FILTER_ACCESS_KEY, "filter")?;
        if !initializer.set_filter_name(&name.text, name.access_key) {
            return Err(FilterError::MetadataRegistrationFailed("filter name"));
        }
        if !initializer.set_target_kinds(TARGET_KINDS.as_slice()) {
            return Err(FilterError::MetadataRegistrationFailed("target kinds"));
        }
        if !initializer.set_use_blank_image(USE_BLANK_IMAGE) {
            return Err(FilterError::MetadataRegistrationFailed("use blank image"));
        }
        if !initializer.set_can_preview(CAN_PREVIEW) {
            return Err(FilterError::MetadataRegistrationFailed("can preview"));
        }

        let threshold = resolve_caption(strings, THRESHOLD_NAME, THRESHOLD_ACCESS_KEY, "threshold")?;
        ControlState::register(property, &threshold)?;
        if !initializer.set_property_callback() {
            return Err(FilterError::MetadataRegistrationFailed("property callback"));
        }
        if !initializer.set_property() {
            return Err(FilterError::MetadataRegistrationFailed("property"));
        }

        self.state = LifecycleState::FilterReady;
        Ok(())
    }

    fn filter_run(&mut self, mut ctx: RunContext<'_>) -> FilterResult<()> {
        self.expect_state(Selector::FilterRun, &[LifecycleState::FilterReady])?;
        let _span = trace_span!("filter_run", threshold = self.control.threshold().get()).entered();

        self.state = LifecycleState::Running;
        let outcome = self.run_pass(&mut ctx);
        self.state = LifecycleState::FilterReady;

        let summary = outcome?;
        self.last_run = Some(summary);
        Ok(())
    }

    fn filter_terminate(&mut self) -> FilterResult<()> {
        self.expect_state(
            Selector::FilterTerminate,
            &[LifecycleState::ModuleReady, LifecycleState::FilterReady],
        )?;
        self.state = LifecycleState::Terminated;
        Ok(())
    }

    fn module_terminate(&mut self) -> FilterResult<()> {
        self.state = LifecycleState::Unloaded;
        self.last_run = None;
        Ok(())
    }
}
