//! Size directives for Google Photos base URLs.
//!
//! Base URLs are only usable with a directive appended; anything that is not
//! served from the image host is returned unchanged.

const IMAGE_HOST_MARKER: &str = "googleusercontent.com";

/// Thumbnail size used by `download --thumbnail`.
pub const DOWNLOAD_THUMBNAIL_SIZE: (u32, u32) = (800, 600);

/// Thumbnail size fetched for terminal previews.
pub const PREVIEW_THUMBNAIL_SIZE: (u32, u32) = (1024, 1024);

fn is_image_host(base_url: &str) -> bool {
    base_url.contains(IMAGE_HOST_MARKER)
}

/// Appends a `=w{width}-h{height}` directive.
pub fn thumbnail_url(base_url: &str, width: u32, height: u32) -> String {
    if !is_image_host(base_url) {
        return base_url.to_string();
    }
    format!("{base_url}=w{width}-h{height}")
}

/// Appends the `=d` (download original) directive.
pub fn high_res_url(base_url: &str) -> String {
    if !is_image_host(base_url) {
        return base_url.to_string();
    }
    format!("{base_url}=d")
}
