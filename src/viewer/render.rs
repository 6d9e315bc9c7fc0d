//! Renders `meta.js`, the manifest consumed by the static viewer page.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ViewerInfo {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Series thumbnail, relative to the output root; empty when unavailable.
    pub thumbnail_file: String,
    pub entries: Vec<ViewerEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ViewerEntry {
    pub number: u32,
    pub title: String,
    /// Directory of the entry's files, relative to the output root.
    pub path: String,
    pub thumbnail_file_name: String,
    pub content_file_names: Vec<String>,
}

pub(crate) struct Renderer {
    base_path: PathBuf,
}

impl Renderer {
    pub(crate) fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Write `meta.js` under the base path.
    ///
    /// Entries arrive in arbitrary completion order, so they are sorted by
    /// episode number here.
    pub(crate) fn write_meta(&self, mut info: ViewerInfo) -> anyhow::Result<()> {
        info.entries.sort_by_key(|entry| entry.number);
        let path = self.base_path.join("meta.js");
        let json = serde_json::to_string_pretty(&info)?;
        fs::write(&path, format!("var viewerMeta = {json};\n"))
            .with_context(|| format!("failed to write \"{}\"", path.display()))
    }
}
