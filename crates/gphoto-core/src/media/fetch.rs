//! Authenticated image downloads and scratch-directory housekeeping.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::picker::MediaItem;

/// Scratch files older than this are swept before each preview run.
pub const SCRATCH_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Downloads media with the bearer credential attached.
pub struct ImageFetcher {
    http: reqwest::Client,
    access_token: String,
}

impl ImageFetcher {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
        }
    }

    /// Streams `url` into `dest` and returns the number of bytes written.
    ///
    /// Only HTTP 200 is accepted. A partially written file is removed on failure.
    ///
    /// # Errors
    /// Returns [`Error::Api`] for any other status, or a transport/I/O error.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        tracing::debug!(dest = %dest.display(), "downloading image");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::from_response(response).await);
        }

        let mut file = tokio::fs::File::create(dest).await?;
        match write_body(response, &mut file).await {
            Ok(written) => {
                tracing::debug!(dest = %dest.display(), bytes = written, "download complete");
                Ok(written)
            }
            Err(err) => {
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(dest).await {
                    tracing::debug!(error = %remove_err, "could not remove partial download");
                }
                Err(err)
            }
        }
    }
}

async fn write_body(response: reqwest::Response, file: &mut tokio::fs::File) -> Result<u64> {
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

/// Deletes regular files under `dir` modified strictly before `now - max_age`.
///
/// Best effort: unreadable entries and failed deletes are skipped. Returns the
/// number of files removed.
pub fn cleanup_older_than(dir: &Path, max_age: Duration) -> usize {
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return 0;
    };
    sweep(dir, cutoff)
}

fn sweep(dir: &Path, cutoff: SystemTime) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };

        if metadata.is_dir() {
            removed += sweep(&path, cutoff);
            continue;
        }

        let stale = metadata
            .modified()
            .is_ok_and(|modified| modified < cutoff);
        if !stale {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove stale file");
            }
        }
    }
    removed
}

/// Creates the scratch directory (owner-only on unix) if needed.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_scratch_dir(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(dir.to_path_buf())
}

/// File name used when saving `item` to the download directory.
///
/// Uses the item's own filename (without any directory part), otherwise the
/// item id with an extension guessed from the MIME type.
pub fn output_filename(item: &MediaItem) -> String {
    let own_name = Path::new(&item.media_file.filename)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty());
    if let Some(name) = own_name {
        return name.to_string();
    }

    let extension = if item.media_file.mime_type.contains("heif") {
        "heic"
    } else {
        "jpg"
    };
    format!("{}.{extension}", item.id)
}

/// Unique scratch file name for a preview of `item`.
pub fn scratch_filename(item: &MediaItem) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    let extension = Path::new(&item.media_file.filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("jpg");
    format!("{nanos}.{extension}")
}

/// Opens `path` with the platform's default viewer.
///
/// # Errors
/// Returns an error if no viewer could be launched.
pub fn open_with_viewer(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("image file does not exist: {}", path.display()),
        )));
    }
    open::that(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use tempfile::tempdir;

    use super::*;
    use crate::picker::MediaFile;

    fn touch(path: &Path, age: Duration) {
        let file = File::create(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_cleanup_removes_only_stale_files() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();

        touch(&dir.path().join("old.jpg"), Duration::from_secs(2 * 60 * 60));
        touch(&nested.join("old.png"), Duration::from_secs(61 * 60));
        touch(&dir.path().join("fresh.jpg"), Duration::from_secs(59 * 60));
        touch(&dir.path().join("new.jpg"), Duration::ZERO);

        let removed = cleanup_older_than(dir.path(), SCRATCH_MAX_AGE);

        assert_eq!(removed, 2);
        assert!(!dir.path().join("old.jpg").exists());
        assert!(!nested.join("old.png").exists());
        assert!(dir.path().join("fresh.jpg").exists());
        assert!(dir.path().join("new.jpg").exists());
        assert!(nested.exists());
    }

    #[test]
    fn test_cleanup_of_missing_dir_is_noop() {
        let dir = tempdir().unwrap();
        assert_eq!(cleanup_older_than(&dir.path().join("absent"), SCRATCH_MAX_AGE), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_scratch_dir_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let scratch = ensure_scratch_dir(&dir.path().join("gphoto-cli")).unwrap();
        let mode = fs::metadata(scratch).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    fn item(id: &str, filename: &str, mime: &str) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            media_file: MediaFile {
                filename: filename.to_string(),
                mime_type: mime.to_string(),
                ..MediaFile::default()
            },
            ..MediaItem::default()
        }
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(output_filename(&item("a", "IMG_1.JPG", "image/jpeg")), "IMG_1.JPG");
        assert_eq!(output_filename(&item("a", "../../etc/x.png", "image/png")), "x.png");
        assert_eq!(output_filename(&item("a", "", "image/heif")), "a.heic");
        assert_eq!(output_filename(&item("b", "", "image/png")), "b.jpg");
    }

    #[test]
    fn test_scratch_filename_keeps_extension() {
        assert!(scratch_filename(&item("a", "IMG_1.png", "image/png")).ends_with(".png"));
        assert!(scratch_filename(&item("a", "", "image/jpeg")).ends_with(".jpg"));
    }
}
