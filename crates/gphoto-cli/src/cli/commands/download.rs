//! Download command handler.

use std::path::PathBuf;

use anyhow::{Context, Result};
use gphoto_core::media::{self, DOWNLOAD_THUMBNAIL_SIZE, ImageFetcher};
use gphoto_core::picker::{MediaItem, PickerClient};
use tokio_util::sync::CancellationToken;

use super::picker::select_items;

pub struct DownloadOptions {
    pub output_dir: PathBuf,
    pub thumbnail: bool,
}

pub async fn run(
    picker: &PickerClient,
    fetcher: &ImageFetcher,
    options: &DownloadOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let items = select_items(picker, cancel).await?;
    if items.is_empty() {
        println!("No photos were selected.");
        return Ok(());
    }

    std::fs::create_dir_all(&options.output_dir)
        .with_context(|| format!("create {}", options.output_dir.display()))?;

    println!("Download directory: {}", options.output_dir.display());
    println!("Downloading {} selected item(s)...", items.len());
    println!();

    let mut saved = 0;
    for (index, item) in items.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(gphoto_core::Error::Cancelled.into());
        }

        let filename = media::output_filename(item);
        println!("{}/{}: {filename}", index + 1, items.len());

        let dest = options.output_dir.join(&filename);
        let url = source_url(item, options.thumbnail);
        match fetcher.download(&url, &dest).await {
            Ok(bytes) => {
                saved += 1;
                println!("   ✓ Saved {} ({bytes} bytes)", dest.display());
            }
            // One failed item must not stop the rest of the batch.
            Err(err) => {
                tracing::warn!(item = %item.id, error = %err, "download failed");
                println!("   ✗ Error: {err}");
            }
        }
    }

    println!();
    println!("Downloaded {saved} of {} item(s).", items.len());
    println!("Saved to: {}", options.output_dir.display());
    Ok(())
}

fn source_url(item: &MediaItem, thumbnail: bool) -> String {
    let base = &item.media_file.base_url;
    if thumbnail {
        let (width, height) = DOWNLOAD_THUMBNAIL_SIZE;
        media::thumbnail_url(base, width, height)
    } else {
        media::high_res_url(base)
    }
}
