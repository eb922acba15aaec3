use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use threshold_filter::host::memory::{MemoryHost, DEFAULT_BLOCK_SIZE};
use threshold_filter::host::CallBackResult;
use threshold_filter::io::{canvas_for, fill_canvas, load_rgba, load_selection, save_rgba, write_canvas};
use threshold_filter::{
    dispatch, CallResult, ChannelLayout, Selector, ThresholdFilter, ThresholdLevel, THRESHOLD_ITEM,
};
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Threshold filter CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
enum LayoutConfig {
    Alpha,
    GrayAlpha,
    RgbAlpha,
}

impl From<LayoutConfig> for ChannelLayout {
    fn from(value: LayoutConfig) -> Self {
        match value {
            LayoutConfig::Alpha => ChannelLayout::Alpha,
            LayoutConfig::GrayAlpha => ChannelLayout::GrayAlpha,
            LayoutConfig::RgbAlpha => ChannelLayout::RgbAlpha,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    image_path: String,
    output_path: String,
    selection_path: Option<String>,
    layout: LayoutConfig,
    threshold: i32,
    block_size: i32,
    rgb_order: [usize; 3],
    report_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_path: String::new(),
            output_path: String::new(),
            selection_path: None,
            layout: LayoutConfig::RgbAlpha,
            threshold: i32::from(ThresholdLevel::DEFAULT.get()),
            block_size: DEFAULT_BLOCK_SIZE,
            rgb_order: [0, 1, 2],
            report_path: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    layout: LayoutConfig,
    threshold: u8,
    total_blocks: usize,
    processed: usize,
    skipped: usize,
    restarts: usize,
    progress_done: Option<usize>,
}

fn call(
    selector: Selector,
    handle: &mut Option<Box<ThresholdFilter>>,
    host: &mut MemoryHost,
) -> Result<(), Box<dyn std::error::Error>> {
    match dispatch(selector, handle, host) {
        CallResult::Success => Ok(()),
        CallResult::Failed => Err(format!("{} failed", selector.name()).into()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("threshold_filter=debug".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.image_path.is_empty() || config.output_path.is_empty() {
        return Err("image_path and output_path must be set in the config".into());
    }
    let level = ThresholdLevel::new(config.threshold).ok_or("threshold must be in 1..=255")?;
    if config.block_size <= 0 {
        return Err("block_size must be at least 1".into());
    }
    let mut order = config.rgb_order;
    order.sort_unstable();
    if order != [0, 1, 2] {
        return Err("rgb_order must be a permutation of [0, 1, 2]".into());
    }

    let mut image = load_rgba(&config.image_path)?;
    let mut canvas = canvas_for(&image, config.layout.into())?
        .with_block_size(config.block_size)
        .with_rgb_index(config.rgb_order);
    fill_canvas(&mut canvas, &image)?;
    let mut host = MemoryHost::new(canvas);
    if let Some(path) = &config.selection_path {
        host = host.with_selection(load_selection(path)?);
    }

    let mut handle: Option<Box<ThresholdFilter>> = None;
    call(Selector::ModuleInitialize, &mut handle, &mut host)?;
    call(Selector::FilterInitialize, &mut handle, &mut host)?;
    if let Some(plugin) = handle.as_deref_mut() {
        let verdict =
            host.runner
                .property
                .edit_integer(THRESHOLD_ITEM, i32::from(level.get()), plugin);
        if verdict == CallBackResult::Invalid {
            return Err("host rejected the threshold value".into());
        }
    }
    call(Selector::FilterRun, &mut handle, &mut host)?;
    let summary = handle
        .as_deref()
        .and_then(ThresholdFilter::last_run)
        .ok_or("filter run produced no summary")?;
    call(Selector::FilterTerminate, &mut handle, &mut host)?;
    call(Selector::ModuleTerminate, &mut handle, &mut host)?;

    write_canvas(&host.canvas, &mut image)?;
    save_rgba(&image, &config.output_path)?;

    let report = Report {
        layout: config.layout,
        threshold: level.get(),
        total_blocks: summary.total_blocks,
        processed: summary.processed,
        skipped: summary.skipped,
        restarts: summary.restarts,
        progress_done: host.runner.progress_done().last().copied(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    match config.report_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
