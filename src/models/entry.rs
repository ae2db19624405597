//! UI-facing records produced by directory listings.
//!
//! Entries are built fresh for every listing request and serialize into the
//! node shape the manager tree and grid consume.

use crate::models::menu::ContextMenuItem;
use serde::Serialize;

/// A directory node. Never carries a size.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DirectoryEntry {
    /// Object key of the directory marker (ends with the delimiter).
    pub id: String,
    #[serde(rename = "text")]
    pub display_name: String,
    /// Icon class, `icon-<ext>`.
    pub cls: String,
    pub leaf: bool,
    pub path: String,
    pub menu: Vec<ContextMenuItem>,
}

/// A file node, used by both the tree and the grid view.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct FileEntry {
    pub id: String,
    #[serde(rename = "text")]
    pub display_name: String,
    pub cls: String,
    pub leaf: bool,
    pub path: String,
    #[serde(rename = "url")]
    pub public_url: String,
    #[serde(rename = "ext")]
    pub extension: String,
    /// Best-effort; 0 when the store listing does not report sizes.
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "thumb", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "image", skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(rename = "thumbWidth", skip_serializing_if = "Option::is_none")]
    pub thumb_width: Option<u32>,
    #[serde(rename = "thumbHeight", skip_serializing_if = "Option::is_none")]
    pub thumb_height: Option<u32>,
    pub menu: Vec<ContextMenuItem>,
}

/// One listing entry, tagged with `type: "dir" | "file"`.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum Entry {
    #[serde(rename = "dir")]
    Directory(DirectoryEntry),
    #[serde(rename = "file")]
    File(FileEntry),
}

impl Entry {
    pub fn id(&self) -> &str {
        match self {
            Entry::Directory(dir) => &dir.id,
            Entry::File(file) => &file.id,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Entry::Directory(_))
    }
}

/// Ordered listing: all directories (by key), then all files (by key).
pub type Listing = Vec<Entry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_serialize_with_type_tag() {
        let dir = Entry::Directory(DirectoryEntry {
            id: "photos/sub/".into(),
            display_name: "sub".into(),
            cls: "icon-".into(),
            leaf: false,
            path: "photos/sub/".into(),
            menu: vec![ContextMenuItem::REFRESH_DIRECTORY],
        });
        let json = serde_json::to_value(&dir).unwrap();
        assert_eq!(json["type"], "dir");
        assert_eq!(json["text"], "sub");
        assert_eq!(json["leaf"], false);
        assert!(json.get("size").is_none());
        assert!(json.get("url").is_none());
    }

    #[test]
    fn tree_file_omits_thumbnail_fields() {
        let file = Entry::File(FileEntry {
            id: "a.txt".into(),
            display_name: "a.txt".into(),
            cls: "icon-txt".into(),
            leaf: true,
            path: "a.txt".into(),
            public_url: "http://cdn.test/a.txt".into(),
            extension: "txt".into(),
            size_bytes: 0,
            thumbnail_url: None,
            preview_url: None,
            thumb_width: None,
            thumb_height: None,
            menu: Vec::new(),
        });
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["url"], "http://cdn.test/a.txt");
        assert!(json.get("thumb").is_none());
        assert!(json.get("thumbWidth").is_none());
    }
}
