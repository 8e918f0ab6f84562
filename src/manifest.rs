//! # Manifest Store
//!
//! The manifest (`subsync.yaml`) maps each *target* directory to an ordered
//! list of *mappings*, each of which binds a folder name inside the target to
//! a subpath of an upstream git repository:
//!
//! ```yaml
//! # Vendored assets, managed by subsync.
//! targets:
//!   assets:
//!   - folder_name: logo
//!     repo_url: https://github.com/example/community.git
//!     repo_ref: main
//!     repo_hash: 9f0ea0341816665feadcdcfb7744f4245604ab28
//!     repo_path: logo
//! ```
//!
//! ## Edit cycle
//!
//! Every mutation goes through [`ManifestStore::edit`], which:
//!
//! 1. takes an exclusive lock on the manifest file,
//! 2. reads and parses it (an empty or missing file is an empty manifest),
//! 3. sets aside the leading and trailing comment blocks verbatim,
//! 4. canonicalizes the document,
//! 5. runs the caller's mutation,
//! 6. canonicalizes again,
//! 7. rewrites the file as header comments, document, footer comments,
//! 8. releases the lock when the handle drops.
//!
//! If the mutation fails the file is never written, so its bytes on disk are
//! exactly what they were before the edit started.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cancel::CancellationToken;
use crate::defaults::MANIFEST_FILENAME;
use crate::error::{Error, Result};
use crate::lock::ManifestLock;
use crate::path::clean_relative_path;

/// Where a mapping's content comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Repository URL, as understood by the fetch capability.
    #[serde(default)]
    pub repo_url: String,
    /// Branch, tag or other symbolic ref to track.
    #[serde(default)]
    pub repo_ref: String,
    /// Resolved commit. Empty means "not resolved yet".
    #[serde(default)]
    pub repo_hash: String,
    /// Subpath within the repository to extract.
    #[serde(default)]
    pub repo_path: String,
}

impl Source {
    pub fn new(
        repo_url: impl Into<String>,
        repo_ref: impl Into<String>,
        repo_path: impl Into<String>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            repo_ref: repo_ref.into(),
            repo_hash: String::new(),
            repo_path: repo_path.into(),
        }
    }

    /// Pin this source to a commit.
    pub fn with_hash(mut self, repo_hash: impl Into<String>) -> Self {
        self.repo_hash = repo_hash.into();
        self
    }
}

/// One folder inside a target, bound to an upstream source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MappingRecord", into = "MappingRecord")]
pub struct Mapping {
    pub folder_name: String,
    pub source: Source,
}

/// On-disk shape of a mapping: one flat row, folder name first.
///
/// Kept separate from `Mapping` instead of using `#[serde(flatten)]`, which
/// would lose YAML scalar typing (a ref such as `1.0` would arrive as a float).
#[derive(Serialize, Deserialize)]
struct MappingRecord {
    #[serde(default)]
    folder_name: String,
    #[serde(default)]
    repo_url: String,
    #[serde(default)]
    repo_ref: String,
    #[serde(default)]
    repo_hash: String,
    #[serde(default)]
    repo_path: String,
}

impl From<MappingRecord> for Mapping {
    fn from(record: MappingRecord) -> Self {
        Self {
            folder_name: record.folder_name,
            source: Source {
                repo_url: record.repo_url,
                repo_ref: record.repo_ref,
                repo_hash: record.repo_hash,
                repo_path: record.repo_path,
            },
        }
    }
}

impl From<Mapping> for MappingRecord {
    fn from(mapping: Mapping) -> Self {
        Self {
            folder_name: mapping.folder_name,
            repo_url: mapping.source.repo_url,
            repo_ref: mapping.source.repo_ref,
            repo_hash: mapping.source.repo_hash,
            repo_path: mapping.source.repo_path,
        }
    }
}

impl Mapping {
    pub fn new(folder_name: impl Into<String>, source: Source) -> Self {
        Self {
            folder_name: folder_name.into(),
            source,
        }
    }
}

/// All mappings of one target, in canonical order.
pub type Folder = Vec<Mapping>;

/// The structured part of the manifest file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub targets: BTreeMap<String, Folder>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Manifest {
    /// Bring the manifest into its canonical form.
    ///
    /// Target paths and folder names are normalized, mappings sharing a
    /// normalized folder name collapse to the last one seen, and mappings are
    /// sorted by folder name. Targets that normalize to the same path are
    /// merged before deduplication.
    pub fn canonicalize(&mut self) {
        let mut targets: BTreeMap<String, BTreeMap<String, Mapping>> = BTreeMap::new();

        for (target, folder) in std::mem::take(&mut self.targets) {
            let unique = targets.entry(clean_relative_path(&target)).or_default();
            for mut mapping in folder {
                mapping.folder_name = clean_relative_path(&mapping.folder_name);
                unique.insert(mapping.folder_name.clone(), mapping);
            }
        }

        self.targets = targets
            .into_iter()
            .map(|(target, unique)| (target, unique.into_values().collect()))
            .collect();
    }

    /// Insert or replace the mapping for `folder_name` under `target`.
    ///
    /// An existing mapping keeps its position and only has its source
    /// replaced; otherwise a new mapping is appended.
    pub fn upsert(&mut self, target: &str, folder_name: &str, source: Source) {
        let folder_name = clean_relative_path(folder_name);
        let folder = self
            .targets
            .entry(clean_relative_path(target))
            .or_default();

        match folder
            .iter_mut()
            .find(|mapping| clean_relative_path(&mapping.folder_name) == folder_name)
        {
            Some(existing) => existing.source = source,
            None => folder.push(Mapping::new(folder_name, source)),
        }
    }

    /// Look up a mapping by target and folder name.
    pub fn get(&self, target: &str, folder_name: &str) -> Option<&Mapping> {
        let folder_name = clean_relative_path(folder_name);
        self.targets
            .get(&clean_relative_path(target))?
            .iter()
            .find(|mapping| mapping.folder_name == folder_name)
    }

    /// Total number of mappings across all targets.
    pub fn mapping_count(&self) -> usize {
        self.targets.values().map(Vec::len).sum()
    }
}

/// A manifest file split into its comment blocks and structured body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDocument {
    /// Comment (and blank) lines before the first structured line.
    pub header: String,
    /// Comment (and blank) lines after the last structured line.
    pub footer: String,
    pub manifest: Manifest,
}

fn is_comment_line(line: &str) -> bool {
    let line = line.trim_end_matches(['\n', '\r']);
    line.is_empty() || line.starts_with('#')
}

/// Split raw file content into `(header, body, footer)`.
///
/// The blocks are byte-for-byte slices of `content`; concatenating them gives
/// back the original text.
pub fn split_comments(content: &str) -> (&str, &str, &str) {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();

    let Some(first) = lines.iter().position(|line| !is_comment_line(line)) else {
        return (content, "", "");
    };
    // `first` exists, so a last structured line does too.
    let last = lines
        .iter()
        .rposition(|line| !is_comment_line(line))
        .unwrap_or(first);

    let body_start: usize = lines[..first].iter().map(|line| line.len()).sum();
    let body_end: usize = body_start + lines[first..=last].iter().map(|line| line.len()).sum::<usize>();

    (
        &content[..body_start],
        &content[body_start..body_end],
        &content[body_end..],
    )
}

impl ManifestDocument {
    /// Parse the raw content of the manifest file at `path`.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let (header, body, footer) = split_comments(content);

        let manifest = if body.trim().is_empty() {
            Manifest::default()
        } else {
            serde_yaml::from_str(body).map_err(|e| Error::ManifestParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        Ok(Self {
            header: header.to_string(),
            footer: footer.to_string(),
            manifest,
        })
    }

    /// Render the document back to text.
    pub fn render(&self) -> Result<String> {
        let mut out = String::with_capacity(self.header.len() + self.footer.len() + 256);
        out.push_str(&self.header);
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&serde_yaml::to_string(&self.manifest)?);
        out.push_str(&self.footer);
        Ok(out)
    }
}

/// Lock-protected access to the manifest of one working directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    cancel: CancellationToken,
}

impl ManifestStore {
    /// The store for `subsync.yaml` inside `work_dir`.
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self::at(work_dir.as_ref().join(MANIFEST_FILENAME))
    }

    /// The store for a manifest at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop waiting for the manifest lock once `cancel` is raised.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that targets are relative to.
    pub fn work_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Run one read-modify-write cycle on the manifest.
    ///
    /// The file is only rewritten if `mutate` succeeds and the rendered
    /// document differs from what was read.
    pub fn edit<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Manifest) -> Result<()>,
    {
        let mut lock = ManifestLock::exclusive(&self.path, &self.cancel)?;
        self.cancel.check()?;
        let original = lock.read_to_string()?;

        let mut document = ManifestDocument::parse(lock.path(), &original)?;
        document.manifest.canonicalize();

        mutate(&mut document.manifest)?;

        document.manifest.canonicalize();
        let rendered = document.render()?;

        if rendered != original {
            lock.rewrite(&rendered)?;
            log::debug!("Wrote {}", lock.path().display());
        }

        Ok(())
    }

    /// Create the manifest if it does not exist yet.
    ///
    /// Existing targets are never touched.
    pub fn init(&self) -> Result<()> {
        self.edit(|_| Ok(()))
    }

    /// Insert or replace one mapping.
    pub fn upsert_mapping(&self, target: &str, folder_name: &str, source: Source) -> Result<()> {
        self.edit(|manifest| {
            manifest.upsert(target, folder_name, source);
            Ok(())
        })
    }

    /// Visit every target under an exclusive edit.
    ///
    /// `resolve` is applied to each mapping of a target (it may update the
    /// mapping in place), then `reconcile_and_fetch` receives the whole
    /// resolved folder. Any error abandons the edit and leaves the file
    /// untouched; on success the resolved mappings are persisted.
    pub fn with_each_target<R, F>(&self, mut resolve: R, mut reconcile_and_fetch: F) -> Result<()>
    where
        R: FnMut(&str, &mut Mapping) -> Result<()>,
        F: FnMut(&str, &[Mapping]) -> Result<()>,
    {
        self.edit(|manifest| {
            for (target, folder) in manifest.targets.iter_mut() {
                for mapping in folder.iter_mut() {
                    resolve(target, mapping)?;
                }
                reconcile_and_fetch(target, folder)?;
            }
            Ok(())
        })
    }

    /// Read the canonical manifest under a shared lock without rewriting it.
    pub fn load(&self) -> Result<Manifest> {
        let Some(mut lock) = ManifestLock::shared(&self.path)? else {
            return Ok(Manifest::default());
        };
        let content = lock.read_to_string()?;
        let mut document = ManifestDocument::parse(lock.path(), &content)?;
        document.manifest.canonicalize();
        Ok(document.manifest)
    }
}
