use serde::{Deserialize, Serialize};

/// A picker session as reported by the Picker API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PickerSession {
    /// Resource name (`sessions/<id>`); synthesized from `id` when absent.
    pub name: String,
    pub id: String,
    /// URL the user opens to select photos.
    pub picker_uri: String,
    /// Set by the server once the user has finished selecting.
    pub media_items_set: bool,
}

impl PickerSession {
    /// Fills in `name` from `id` when the server omitted it.
    pub(crate) fn normalize(mut self) -> Self {
        if self.name.is_empty() && !self.id.is_empty() {
            self.name = format!("sessions/{}", self.id);
        }
        self
    }
}

/// One item the user picked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaItem {
    pub id: String,
    pub create_time: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub media_file: MediaFile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaFile {
    pub base_url: String,
    pub mime_type: String,
    pub filename: String,
    pub media_file_metadata: MediaFileMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaFileMetadata {
    pub width: u32,
    pub height: u32,
    pub camera_make: String,
    pub camera_model: String,
    pub photo_metadata: PhotoMetadata,
}

/// Exposure settings; all zero when the camera did not record them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoMetadata {
    pub focal_length: f64,
    pub aperture_f_number: f64,
    pub iso_equivalent: u32,
    /// Duration string such as `"0.008s"`.
    pub exposure_time: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct MediaItemsPage {
    pub media_items: Vec<MediaItem>,
    pub next_page_token: Option<String>,
}
