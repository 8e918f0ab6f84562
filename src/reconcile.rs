//! # Reconciliation Engine
//!
//! Before a target is repopulated, every entry under it that is no longer
//! wanted by the manifest is deleted. The wanted paths are loaded into a
//! prefix tree: the last segment of each wanted folder is a *leaf*, everything
//! above it is a pass-through directory.
//!
//! Pruning walks the filesystem and the tree together, top-down:
//!
//! - at a leaf, stop; the fetch step owns everything below it,
//! - an entry with no matching child node is deleted recursively,
//! - an entry with a matching child node is descended into.
//!
//! Pass-through directories are never deleted themselves, even when they end
//! up empty.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::filesystem::remove_path;
use crate::path::{clean_relative_path, segments};

/// One node of the wanted-paths tree. Each node owns its children.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeNode {
    is_leaf: bool,
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from relative paths. Paths are normalized first.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = Self::new();
        for path in paths {
            root.insert(&clean_relative_path(path.as_ref()));
        }
        root
    }

    /// Mark the normalized `path` as wanted, creating intermediate nodes.
    pub fn insert(&mut self, path: &str) {
        let mut node = self;
        for segment in segments(path) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.is_leaf = true;
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.get(name)
    }

    /// Delete everything under `root` that this tree does not account for.
    ///
    /// A missing `root` is already clean. Returns the number of entries
    /// deleted.
    pub fn prune(&self, root: &Path, cancel: &CancellationToken) -> Result<usize> {
        if self.is_leaf {
            return Ok(0);
        }

        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::fs(root, e)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| Error::fs(root, e))?;
            let path = entry.path();
            let name = entry.file_name();

            let child = name.to_str().and_then(|name| self.children.get(name));
            match child {
                Some(child) if child.is_leaf => {}
                Some(child) => {
                    let file_type = entry.file_type().map_err(|e| Error::fs(&path, e))?;
                    if file_type.is_dir() {
                        removed += child.prune(&path, cancel)?;
                    } else {
                        // A file (or link) sits where a pass-through directory is needed.
                        cancel.check()?;
                        log::debug!("Removing {}", path.display());
                        remove_path(&path)?;
                        removed += 1;
                    }
                }
                None => {
                    cancel.check()?;
                    log::debug!("Removing {}", path.display());
                    remove_path(&path)?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

/// Prune `target_root` so that only `wanted` folders (and their ancestors)
/// remain.
pub fn reconcile<I, S>(target_root: &Path, wanted: I, cancel: &CancellationToken) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    TreeNode::from_paths(wanted).prune(target_root, cancel)
}
