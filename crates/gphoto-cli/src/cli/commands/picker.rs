//! Picker session flow shared by `picker`, `download` and `view`.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use gphoto_core::picker::{MediaItem, PickerClient, PollSettings};
use tokio_util::sync::CancellationToken;

/// Creates a session, waits for the user to pick, and returns the selection.
pub async fn select_items(
    picker: &PickerClient,
    cancel: &CancellationToken,
) -> Result<Vec<MediaItem>> {
    println!("Creating Google Photos Picker session...");
    let session = picker
        .create_session()
        .await
        .context("create picker session")?;

    println!("Open the Google Photos Picker:");
    println!("{}", session.picker_uri);
    println!();
    println!("Select photos in your browser, then click Done. Waiting for your selection...");

    picker
        .wait_for_selection(&session.name, &PollSettings::default(), cancel)
        .await?;

    println!("Fetching selected items...");
    let items = picker
        .list_media_items(&session.name)
        .await
        .context("list selected media items")?;
    Ok(items)
}

pub async fn run(picker: &PickerClient, cancel: &CancellationToken) -> Result<()> {
    let items = select_items(picker, cancel).await?;
    if items.is_empty() {
        println!("No photos were selected.");
        return Ok(());
    }

    println!("Selected photos ({}):", items.len());
    println!();
    for (index, item) in items.iter().enumerate() {
        print!("{}", describe(index + 1, item));
        println!();
    }
    Ok(())
}

/// Multi-line summary of one picked item.
fn describe(position: usize, item: &MediaItem) -> String {
    let file = &item.media_file;
    let metadata = &file.media_file_metadata;
    let photo = &metadata.photo_metadata;

    let mut out = String::new();
    let _ = writeln!(out, "{position}. {}", file.filename);
    let _ = writeln!(out, "   ID: {}", item.id);
    let _ = writeln!(out, "   Type: {} ({})", item.kind, file.mime_type);
    let _ = writeln!(out, "   Created: {}", item.create_time);
    let _ = writeln!(out, "   Size: {}x{}", metadata.width, metadata.height);
    if !metadata.camera_make.is_empty() {
        let _ = writeln!(
            out,
            "   Camera: {} {}",
            metadata.camera_make, metadata.camera_model
        );
    }
    if photo.focal_length > 0.0 {
        let _ = writeln!(
            out,
            "   Exposure: f/{:.1}, {:.0}mm, ISO{}, {}",
            photo.aperture_f_number,
            photo.focal_length.trunc(),
            photo.iso_equivalent,
            photo.exposure_time
        );
    }
    let _ = writeln!(out, "   URL: {}", file.base_url);
    out
}
