//! End-to-end scenarios through the workspace, the real worker and real files

use docshell_core::{
    AssetBrowser, CellState, DocumentView, MarkdownView, PagedView, ShellConfig, TextView,
    ViewStatus, Workspace,
};
use docshell_render::{Bitmap, PageLayout, RenderBackend, RenderError, ZoomLevel};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);
const IDLE: Duration = Duration::from_millis(200);

fn workspace(config: ShellConfig) -> Workspace {
    Workspace::new(config, Instant::now()).expect("workspace should start")
}

/// `bytes[0]` units of 80x100
struct StripBackend;

impl RenderBackend for StripBackend {
    type Document = usize;

    fn open(&self, bytes: &[u8]) -> Result<(usize, PageLayout), RenderError> {
        let count = *bytes.first().ok_or(RenderError::Empty)? as usize;
        Ok((count, PageLayout::uniform(count, 80.0, 100.0, 0.0)))
    }

    fn render_unit(&self, _: &usize, unit: usize, _: ZoomLevel) -> Result<Bitmap, RenderError> {
        Bitmap::from_rgba(1, 1, vec![unit as u8, 0, 0, 255], false)
    }
}

fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbImage::from_pixel(width, height, image::Rgb([200, 100, 50]))
        .save(path)
        .unwrap();
}

#[test]
fn test_text_load_then_deleted_reload_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "hello").unwrap();

    let mut workspace = workspace(ShellConfig::default());
    let id = workspace.open_text(&path);
    workspace.run_until_idle(WAIT);

    let view = workspace.view_as::<TextView>(id).unwrap();
    assert_eq!(view.text(), "hello");
    assert_eq!(view.status(), &ViewStatus::Ready);

    fs::remove_file(&path).unwrap();
    workspace.view_as_mut::<TextView>(id).unwrap().reload();
    workspace.tick(Instant::now());
    workspace.run_until_idle(WAIT);

    let view = workspace.view_as::<TextView>(id).unwrap();
    let error = view.status().error().expect("reload should fail");
    assert!(error.contains("a.txt"), "error should name the target: {}", error);
    assert!(error.contains("not found"));
    assert_eq!(workspace.worker_stats().failed, 1);
}

#[test]
fn test_ten_unit_document_with_two_entry_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.pdf");
    fs::write(&path, [10u8]).unwrap();

    let mut config = ShellConfig::default();
    config.cache_max_entries.pages = 2;
    let mut workspace = workspace(config);
    workspace.set_viewport_extent(300.0);

    let id = workspace.open_paged(&path, StripBackend);
    workspace.run_until_idle(WAIT);
    assert_eq!(workspace.view(id).unwrap().status(), &ViewStatus::Ready);

    let now = Instant::now();
    workspace
        .view_as_mut::<PagedView<StripBackend>>(id)
        .unwrap()
        .on_scroll(now, 300.0);
    workspace.tick(now + IDLE);

    let view = workspace.view_as::<PagedView<StripBackend>>(id).unwrap();
    let renderer = view.renderer();
    assert_eq!(renderer.visible_units(), 3..6);
    assert_eq!(renderer.cache().borrow().len(), 2);

    for unit in 0..10 {
        let surface = renderer.surface(unit).unwrap();
        if (3..6).contains(&unit) {
            assert!(surface.bitmap().is_some(), "unit {} should be displayed", unit);
        } else {
            assert!(surface.is_placeholder(), "unit {} should be a placeholder", unit);
        }
    }
}

#[test]
fn test_result_for_closed_view_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late.txt");
    fs::write(&path, "late").unwrap();

    let mut workspace = workspace(ShellConfig::default());
    let closed = workspace.open_text(&path);
    let open = workspace.open_text(&path);
    workspace.close_view(closed).unwrap();

    let mut stale = 0;
    let deadline = Instant::now() + WAIT;
    while stale == 0 && Instant::now() < deadline {
        stale += workspace.pump(Duration::from_millis(50)).stale;
    }
    workspace.run_until_idle(WAIT);

    assert_eq!(stale, 1);
    assert!(workspace.view(closed).is_none());
    assert_eq!(workspace.view_as::<TextView>(open).unwrap().text(), "late");
}

#[test]
fn test_markdown_burst_renders_once_with_last_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.md");
    fs::write(&path, "# Start").unwrap();

    let mut workspace = workspace(ShellConfig::default());
    let id = workspace.open_markdown(&path);
    workspace.run_until_idle(WAIT);
    assert_eq!(workspace.view_as::<MarkdownView>(id).unwrap().render_runs(), 1);

    let start = Instant::now();
    for step in 0..10u64 {
        let now = start + Duration::from_millis(step * 50);
        workspace
            .view_as_mut::<MarkdownView>(id)
            .unwrap()
            .edit(now, format!("# Draft {}", step));
        workspace.tick(now);
    }
    assert_eq!(workspace.view_as::<MarkdownView>(id).unwrap().render_runs(), 1);

    workspace.tick(start + Duration::from_millis(450 + 300));
    let view = workspace.view_as::<MarkdownView>(id).unwrap();
    assert_eq!(view.render_runs(), 2);
    assert!(view.preview().unwrap().contains("Draft 9"));
    assert_eq!(view.title(), "notes.md*");
}

#[test]
fn test_asset_browser_loads_visible_thumbnails() {
    let dir = tempfile::tempdir().unwrap();
    let mut assets = Vec::new();
    for i in 0..6 {
        let path = dir.path().join(format!("{}.png", i));
        write_png(&path, 40, 20);
        assets.push(path);
    }
    let broken = dir.path().join("broken.png");
    fs::write(&broken, b"not a png").unwrap();
    assets.insert(1, broken);

    let mut workspace = workspace(ShellConfig::default());
    workspace.set_viewport_extent(160.0);
    let id = workspace.open_assets(dir.path(), assets);
    workspace.run_until_idle(WAIT);

    let browser = workspace.view_as::<AssetBrowser>(id).unwrap();
    assert_eq!(browser.visible_assets(), 0..4);
    assert!(matches!(browser.cell(0), Some(CellState::Thumbnail(_))));
    assert!(matches!(browser.cell(1), Some(CellState::Failed(_))));
    assert_eq!(browser.cell(4), Some(CellState::Empty));
    assert_eq!(workspace.worker_stats().enqueued, 4);
}

#[test]
fn test_image_view_through_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.png");
    write_png(&path, 30, 10);

    let mut workspace = workspace(ShellConfig::default());
    let id = workspace.open_path(&path).unwrap();
    workspace.run_until_idle(WAIT);
    workspace.tick(Instant::now() + Duration::from_secs(1));

    let view = workspace.view(id).unwrap();
    assert_eq!(view.kind().as_str(), "image");
    assert_eq!(view.status(), &ViewStatus::Ready);
    workspace.shutdown();
}
