//! Media URL directives, downloads, and terminal previews.

mod ascii;
mod fetch;
mod resolve;

pub use ascii::{AsciiRenderer, DEFAULT_WIDTH, MAX_WIDTH, MIN_WIDTH, PALETTE, RenderedFrame};
pub use fetch::{
    ImageFetcher, SCRATCH_MAX_AGE, cleanup_older_than, ensure_scratch_dir, open_with_viewer,
    output_filename, scratch_filename,
};
pub use resolve::{DOWNLOAD_THUMBNAIL_SIZE, PREVIEW_THUMBNAIL_SIZE, high_res_url, thumbnail_url};
