//! In-memory folder tree for providers without a native path hierarchy
//!
//! Google Drive only knows folder ids and parent ids. To address folders
//! by path, the provider lists every folder once and reconciles the flat
//! list into a path → id index:
//!
//! ```text
//! /My Drive                      -> {id: "0AAA"}
//! /My Drive/project              -> {id: "1BBB"}
//! /My Drive/project/assets       -> {id: "1CCC"}
//! ```
//!
//! The listing arrives in arbitrary order, so children may show up before
//! their parents. [`build_tree`] resolves those with a bounded number of
//! extra passes; anything still unresolved afterwards (usually folders
//! sitting in the trash) is logged and dropped.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum number of passes over deferred folders
pub const MAX_RESOLVE_PASSES: usize = 20;

/// Name of the root folder of a regular (non shared) Google Drive
pub const MY_DRIVE: &str = "My Drive";

/// A single tree entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Provider-native folder id
    pub id: String,
}

/// A folder record as listed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl FolderRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parents: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// A resolved root folder (My Drive or a shared drive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootFolder {
    pub name: String,
    pub id: String,
}

/// Mapping of absolute `/`-delimited path to folder id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathTree {
    entries: BTreeMap<String, TreeEntry>,
}

impl PathTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry; trailing slashes are stripped from `path`
    pub fn insert(&mut self, path: &str, id: impl Into<String>) {
        self.entries.insert(
            super::paths::trim_trailing_slash(path).to_string(),
            TreeEntry { id: id.into() },
        );
    }

    pub fn get(&self, path: &str) -> Option<&TreeEntry> {
        self.entries.get(super::paths::trim_trailing_slash(path))
    }

    pub fn id_of(&self, path: &str) -> Option<&str> {
        self.get(path).map(|e| e.id.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn remove(&mut self, path: &str) -> Option<TreeEntry> {
        self.entries.remove(super::paths::trim_trailing_slash(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Builds the path → id index from the resolved roots and a flat folder list.
///
/// Each root is seeded as `/<root name>`. Folders without parents are
/// attached to the My Drive root. Folders whose parent is not resolved yet
/// are deferred and retried for at most [`MAX_RESOLVE_PASSES`] passes.
pub fn build_tree(roots: &[RootFolder], folders: Vec<FolderRecord>) -> PathTree {
    debug!(folders = folders.len(), roots = roots.len(), "Building folder tree");

    let mut tree = PathTree::new();
    let mut ending_by: HashMap<String, String> = HashMap::new();
    let mut root_ids: HashSet<String> = HashSet::new();
    let mut default_root_id: Option<String> = None;

    for root in roots {
        if root_ids.insert(root.id.clone()) {
            let path = format!("/{}", root.name);
            tree.insert(&path, root.id.clone());
            ending_by.insert(root.id.clone(), path);
            if root.name == MY_DRIVE {
                default_root_id = Some(root.id.clone());
            }
        }
    }

    // parent id -> [(folder id, folder name)]; `deferred_order` keeps the
    // parents in arrival order so passes are deterministic
    let mut no_parents_yet: HashMap<String, Vec<(String, String)>> = HashMap::new();
    let mut deferred_order: Vec<String> = Vec::new();

    for folder in folders {
        if root_ids.contains(&folder.id) {
            continue;
        }

        let parent = match folder.parents.first() {
            Some(parent) => parent.clone(),
            // shared folders and other oddities report no parent
            None => match default_root_id {
                Some(ref id) => id.clone(),
                None => {
                    debug!(id = %folder.id, name = %folder.name, "Folder without parent and no default root");
                    continue;
                }
            },
        };

        match ending_by.get(&parent) {
            Some(parent_path) => {
                let path = format!("{}/{}", parent_path, folder.name);
                tree.insert(&path, folder.id.clone());
                ending_by.insert(folder.id, path);
            }
            None => {
                let children = no_parents_yet.entry(parent.clone()).or_default();
                if children.is_empty() {
                    deferred_order.push(parent);
                }
                children.push((folder.id, folder.name));
            }
        }
    }

    let mut passes = 0;
    while !no_parents_yet.is_empty() && passes < MAX_RESOLVE_PASSES {
        for parent in &deferred_order {
            let Some(parent_path) = ending_by.get(parent).cloned() else {
                continue;
            };
            let Some(children) = no_parents_yet.remove(parent) else {
                continue;
            };
            for (id, name) in children {
                let path = format!("{}/{}", parent_path, name);
                tree.insert(&path, id.clone());
                ending_by.insert(id, path);
            }
        }
        deferred_order.retain(|parent| no_parents_yet.contains_key(parent));
        passes += 1;
    }

    if !no_parents_yet.is_empty() {
        debug!(
            unresolved = ?no_parents_yet,
            "Some folder paths are not resolved, remove deleted folders from trash"
        );
    }

    debug!(entries = tree.len(), passes, "Folder tree built");
    tree
}
