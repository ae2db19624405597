//! Context menus attached to tree and grid entries, and the manager
//! permissions that decide which items appear.

use serde::{Serialize, Serializer};
use std::{collections::BTreeSet, str::FromStr};

/// Manager capabilities relevant to a media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    DirectoryCreate,
    DirectoryRemove,
    FileUpload,
    FileUpdate,
    FileRemove,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::DirectoryCreate,
        Permission::DirectoryRemove,
        Permission::FileUpload,
        Permission::FileUpdate,
        Permission::FileRemove,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::DirectoryCreate => "directory_create",
            Permission::DirectoryRemove => "directory_remove",
            Permission::FileUpload => "file_upload",
            Permission::FileUpdate => "file_update",
            Permission::FileRemove => "file_remove",
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| format!("unknown permission `{}`", s.trim()))
    }
}

/// The permission set of the manager user issuing a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(BTreeSet<Permission>);

impl Permissions {
    pub fn all() -> Self {
        Self(Permission::ALL.into_iter().collect())
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Parse a comma list, ignoring unknown names.
    pub fn from_list(list: &str) -> Self {
        Self(
            list.split(',')
                .filter_map(|name| name.parse::<Permission>().ok())
                .collect(),
        )
    }

    pub fn with(mut self, permission: Permission) -> Self {
        self.0.insert(permission);
        self
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }
}

/// A context menu entry: either an action bound to a UI handler or a
/// separator, which the UI expects as the bare string `"-"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextMenuItem {
    Action {
        text: &'static str,
        handler: &'static str,
    },
    Separator,
}

impl ContextMenuItem {
    const fn action(text: &'static str, handler: &'static str) -> Self {
        ContextMenuItem::Action { text, handler }
    }

    pub const RENAME_FILE: Self = Self::action("Rename", "this.renameFile");
    pub const REMOVE_FILE: Self = Self::action("Remove File", "this.removeFile");
    pub const CREATE_DIRECTORY: Self =
        Self::action("Create Directory Here", "this.createDirectory");
    pub const REFRESH_DIRECTORY: Self = Self::action("Refresh Directory", "this.refreshActiveNode");
    pub const UPLOAD_FILES: Self = Self::action("Upload Files", "this.uploadFiles");
    pub const REMOVE_DIRECTORY: Self = Self::action("Remove Directory", "this.removeDirectory");

    pub fn handler(&self) -> Option<&'static str> {
        match self {
            ContextMenuItem::Action { handler, .. } => Some(*handler),
            ContextMenuItem::Separator => None,
        }
    }
}

impl Serialize for ContextMenuItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        match self {
            ContextMenuItem::Separator => serializer.serialize_str("-"),
            ContextMenuItem::Action { text, handler } => {
                let mut item = serializer.serialize_struct("ContextMenuItem", 2)?;
                item.serialize_field("text", text)?;
                item.serialize_field("handler", handler)?;
                item.end()
            }
        }
    }
}

/// Menu for a file node in the tree.
pub fn file_menu(permissions: &Permissions) -> Vec<ContextMenuItem> {
    let mut menu = Vec::new();
    if permissions.has(Permission::FileUpdate) {
        menu.push(ContextMenuItem::RENAME_FILE);
    }
    if permissions.has(Permission::FileRemove) {
        if !menu.is_empty() {
            menu.push(ContextMenuItem::Separator);
        }
        menu.push(ContextMenuItem::REMOVE_FILE);
    }
    menu
}

/// Menu for a directory node in the tree. Refresh is always offered.
pub fn directory_menu(permissions: &Permissions) -> Vec<ContextMenuItem> {
    let mut menu = Vec::new();
    if permissions.has(Permission::DirectoryCreate) {
        menu.push(ContextMenuItem::CREATE_DIRECTORY);
    }
    menu.push(ContextMenuItem::REFRESH_DIRECTORY);
    if permissions.has(Permission::FileUpload) {
        menu.push(ContextMenuItem::Separator);
        menu.push(ContextMenuItem::UPLOAD_FILES);
    }
    if permissions.has(Permission::DirectoryRemove) {
        menu.push(ContextMenuItem::Separator);
        menu.push(ContextMenuItem::REMOVE_DIRECTORY);
    }
    menu
}

/// Menu for a file tile in the grid view.
pub fn grid_file_menu(permissions: &Permissions) -> Vec<ContextMenuItem> {
    if permissions.has(Permission::FileRemove) {
        vec![ContextMenuItem::REMOVE_FILE]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_menu_separates_rename_and_remove() {
        let menu = file_menu(&Permissions::all());
        assert_eq!(
            menu,
            vec![
                ContextMenuItem::RENAME_FILE,
                ContextMenuItem::Separator,
                ContextMenuItem::REMOVE_FILE
            ]
        );

        let remove_only = file_menu(&Permissions::none().with(Permission::FileRemove));
        assert_eq!(remove_only, vec![ContextMenuItem::REMOVE_FILE]);
    }

    #[test]
    fn directory_menu_always_offers_refresh() {
        let menu = directory_menu(&Permissions::none());
        assert_eq!(menu, vec![ContextMenuItem::REFRESH_DIRECTORY]);

        let full = directory_menu(&Permissions::all());
        let handlers: Vec<_> = full.iter().filter_map(ContextMenuItem::handler).collect();
        assert_eq!(
            handlers,
            vec![
                "this.createDirectory",
                "this.refreshActiveNode",
                "this.uploadFiles",
                "this.removeDirectory"
            ]
        );
        assert_eq!(full.len(), 6);
    }

    #[test]
    fn permission_list_parsing_ignores_unknown_names() {
        let perms = Permissions::from_list("file_remove, bogus ,directory_create");
        assert!(perms.has(Permission::FileRemove));
        assert!(perms.has(Permission::DirectoryCreate));
        assert!(!perms.has(Permission::FileUpload));
    }

    #[test]
    fn separator_serializes_as_dash() {
        let json = serde_json::to_value(vec![
            ContextMenuItem::REFRESH_DIRECTORY,
            ContextMenuItem::Separator,
        ])
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"text": "Refresh Directory", "handler": "this.refreshActiveNode"},
                "-"
            ])
        );
    }
}
