//! View command handler: ASCII previews of the picked photos.

use std::path::Path;

use anyhow::{Context, Result};
use gphoto_core::config::paths;
use gphoto_core::media::{self, AsciiRenderer, ImageFetcher, PREVIEW_THUMBNAIL_SIZE};
use gphoto_core::picker::PickerClient;
use tokio_util::sync::CancellationToken;

use super::picker::select_items;

pub async fn run(
    picker: &PickerClient,
    fetcher: &ImageFetcher,
    width: u32,
    open: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let scratch = paths::scratch_dir();
    let scratch = media::ensure_scratch_dir(&scratch)
        .with_context(|| format!("create {}", scratch.display()))?;
    let removed = media::cleanup_older_than(&scratch, media::SCRATCH_MAX_AGE);
    tracing::debug!(removed, "swept stale preview files");

    let items = select_items(picker, cancel).await?;
    if items.is_empty() {
        println!("No photos were selected.");
        return Ok(());
    }

    let renderer = AsciiRenderer::new(width);
    let (thumb_w, thumb_h) = PREVIEW_THUMBNAIL_SIZE;

    for (index, item) in items.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(gphoto_core::Error::Cancelled.into());
        }

        println!();
        println!("{}/{}: {}", index + 1, items.len(), item.media_file.filename);

        let dest = scratch.join(media::scratch_filename(item));
        let url = media::thumbnail_url(&item.media_file.base_url, thumb_w, thumb_h);
        if let Err(err) = fetcher.download(&url, &dest).await {
            tracing::warn!(item = %item.id, error = %err, "preview download failed");
            println!("   ✗ Error: {err}");
            continue;
        }

        preview(&renderer, &dest);
        if open {
            open_externally(&dest);
        }
    }
    Ok(())
}

fn preview(renderer: &AsciiRenderer, path: &Path) {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    println!("ASCII preview of: {name}");

    let frame = renderer.render_file(path);
    print!("{frame}");
    match frame.source_size {
        Some((width, height)) => println!("Image: {width}x{height} pixels"),
        None => {
            println!("Note: preview unavailable for this image format. Use --open to see it.");
        }
    }
}

fn open_externally(path: &Path) {
    if let Err(err) = media::open_with_viewer(path) {
        tracing::debug!(error = %err, "viewer launch failed");
        println!("   External viewer failed. File saved at: {}", path.display());
    }
}
