use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docshell_core::{
    AssetBrowser, CellState, ImageView, ShellConfig, TextView, ViewId, ViewKind, ViewStatus,
    Workspace,
};
use docshell_render::ZoomLevel;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Parser)]
#[command(name = "docshell-cli")]
#[command(about = "Docshell headless driver")]
pub struct Cli {
    /// Settings file (defaults to the user config directory).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open files in their views and print one JSON object per file.
    Open {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        /// Zoom percentage for image views.
        #[arg(long, default_value_t = 100)]
        zoom: u32,
        /// Viewport height in pixels.
        #[arg(long, default_value_t = 800.0)]
        viewport: f32,
        /// Maximum time to wait for loads, in milliseconds.
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
    /// Print the effective settings as JSON.
    Config,
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct OpenOutput {
    path: String,
    kind: &'static str,
    status: &'static str,
    title: Option<String>,
    error: Option<String>,
    rendered_units: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lines: Option<usize>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let config = ShellConfig::load(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command {
        Commands::Open { files, zoom, viewport, timeout_ms } => {
            run_open(config, &files, zoom, viewport, Duration::from_millis(timeout_ms))
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_open(
    config: ShellConfig,
    files: &[PathBuf],
    zoom: u32,
    viewport: f32,
    timeout: Duration,
) -> Result<()> {
    let scroll_idle = config.scroll_idle();
    let mut workspace =
        Workspace::new(config, Instant::now()).context("failed to start workspace")?;
    workspace.set_viewport_extent(viewport);

    let mut opened: Vec<(PathBuf, Result<ViewId, String>)> = Vec::new();
    for file in files {
        let view = open_file(&mut workspace, file).map_err(|e| format!("{e:#}"));
        opened.push((file.clone(), view));
    }

    workspace.run_until_idle(timeout);
    // Let idle timers fire so the first render pass runs
    workspace.tick(Instant::now() + scroll_idle);

    for (_, view) in &opened {
        if let Ok(id) = view {
            if let Some(image) = workspace.view_as_mut::<ImageView>(*id) {
                image.set_zoom(ZoomLevel::new(zoom));
            }
        }
    }

    let mut failures = 0;
    for (path, view) in &opened {
        let output = match view {
            Ok(id) => describe(&workspace, *id, path),
            Err(message) => OpenOutput {
                path: path.display().to_string(),
                kind: docshell_core::view_kind_for(path).as_str(),
                status: "failed",
                title: None,
                error: Some(message.clone()),
                rendered_units: Vec::new(),
                lines: None,
            },
        };
        if output.status == "failed" {
            failures += 1;
        }
        println!("{}", serde_json::to_string(&output)?);
    }

    workspace.shutdown();

    if failures > 0 {
        anyhow::bail!("failed to open {failures} of {} files", opened.len());
    }
    Ok(())
}

fn open_file(workspace: &mut Workspace, file: &Path) -> Result<ViewId> {
    if file.is_dir() {
        let assets = list_images(file)?;
        return Ok(workspace.open_assets(file, assets));
    }
    Ok(workspace.open_path(file)?)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && docshell_core::view_kind_for(&path) == ViewKind::Image {
            images.push(path);
        }
    }
    images.sort();
    log::debug!("{} images in {}", images.len(), dir.display());
    Ok(images)
}

fn describe(workspace: &Workspace, id: ViewId, path: &Path) -> OpenOutput {
    let Some(view) = workspace.view(id) else {
        return OpenOutput {
            path: path.display().to_string(),
            kind: "unknown",
            status: "failed",
            title: None,
            error: Some("view closed".to_string()),
            rendered_units: Vec::new(),
            lines: None,
        };
    };

    let (status, error) = match view.status() {
        ViewStatus::Loading => ("loading", None),
        ViewStatus::Ready => ("ready", None),
        ViewStatus::Failed(message) => ("failed", Some(message.clone())),
    };

    let rendered_units = if let Some(image) = workspace.view_as::<ImageView>(id) {
        image
            .renderer()
            .surfaces()
            .iter()
            .enumerate()
            .filter(|(_, surface)| surface.bitmap().is_some())
            .map(|(index, _)| index)
            .collect()
    } else if let Some(browser) = workspace.view_as::<AssetBrowser>(id) {
        (0..browser.assets().len())
            .filter(|&index| matches!(browser.cell(index), Some(CellState::Thumbnail(_))))
            .collect()
    } else {
        Vec::new()
    };

    let lines = workspace
        .view_as::<TextView>(id)
        .filter(|_| error.is_none())
        .map(|text| text.text().lines().count());

    OpenOutput {
        path: path.display().to_string(),
        kind: view.kind().as_str(),
        status,
        title: Some(view.title()),
        error,
        rendered_units,
        lines,
    }
}
