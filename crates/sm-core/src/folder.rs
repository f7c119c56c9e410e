//! Display folders: path normalization and the per-table folder cache
//!
//! Folders are not model objects. They are derived from the display-folder
//! strings of a table's members, built lazily the first time a table's
//! folders are requested, and thrown away whenever anything that could change
//! the tree happens (a display folder edit, a member added or removed).

use crate::model::Model;
use crate::object::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Normalized display-folder path (`Finance/Tax`)
///
/// Levels are separated by `/` after normalization, trimmed, and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderPath(String);

impl FolderPath {
    /// Normalize a single folder path, returning `None` for the table root.
    pub fn parse(raw: &str, separators: &[char]) -> Option<Self> {
        let levels: Vec<&str> = raw
            .split(|c: char| separators.contains(&c))
            .map(str::trim)
            .filter(|level| !level.is_empty())
            .collect();
        if levels.is_empty() {
            None
        } else {
            Some(Self(levels.join("/")))
        }
    }

    /// Parse a display-folder property, which may list several paths separated by `;`.
    ///
    /// Duplicates are dropped; the order of first appearance is kept.
    pub fn parse_list(raw: &str, separators: &[char]) -> Vec<Self> {
        let mut seen = BTreeSet::new();
        raw.split(';')
            .filter_map(|part| Self::parse(part, separators))
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every path from the top-level folder down to and including this one
    pub fn ancestors_and_self(&self) -> Vec<FolderPath> {
        let mut out = Vec::new();
        let mut current = String::new();
        for level in self.0.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(level);
            out.push(FolderPath(current.clone()));
        }
        out
    }

    /// Enclosing folder, `None` for a top-level folder
    pub fn parent(&self) -> Option<FolderPath> {
        self.0.rsplit_once('/').map(|(parent, _)| FolderPath(parent.to_string()))
    }

    /// Last level of the path
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn depth(&self) -> usize {
        self.0.split('/').count()
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An object that carries an error roll-up: a table or one of its folders
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "container", rename_all = "snake_case")]
pub enum Container {
    Table { table: ObjectId },
    Folder { table: ObjectId, path: FolderPath },
}

impl Container {
    pub fn table(&self) -> ObjectId {
        match self {
            Container::Table { table } | Container::Folder { table, .. } => *table,
        }
    }
}

/// A virtual folder node inside one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub path: FolderPath,
    /// Members placed directly in this folder, in id order
    pub members: Vec<ObjectId>,
    /// Direct child folders
    pub subfolders: BTreeSet<FolderPath>,
}

impl Folder {
    fn new(path: FolderPath) -> Self {
        Self {
            path,
            members: Vec::new(),
            subfolders: BTreeSet::new(),
        }
    }
}

/// Folder tree of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFolders {
    pub table: ObjectId,
    /// Members not placed in any folder, in id order
    pub root_members: Vec<ObjectId>,
    /// Top-level folders
    pub top_level: BTreeSet<FolderPath>,
    folders: BTreeMap<FolderPath, Folder>,
    /// Folder paths each member is placed in
    placements: BTreeMap<ObjectId, Vec<FolderPath>>,
}

impl TableFolders {
    /// Build the folder tree of `table` from the current model
    pub fn build(model: &Model, table: ObjectId, separators: &[char]) -> Self {
        let mut tree = Self {
            table,
            root_members: Vec::new(),
            top_level: BTreeSet::new(),
            folders: BTreeMap::new(),
            placements: BTreeMap::new(),
        };

        for member in model.members_of(table) {
            let paths = member
                .display_folder()
                .map(|raw| FolderPath::parse_list(raw, separators))
                .unwrap_or_default();

            if paths.is_empty() {
                tree.root_members.push(member.id);
                continue;
            }

            for path in &paths {
                tree.insert_path(path);
                if let Some(folder) = tree.folders.get_mut(path) {
                    folder.members.push(member.id);
                }
            }
            tree.placements.insert(member.id, paths);
        }

        tree
    }

    fn insert_path(&mut self, path: &FolderPath) {
        let chain = path.ancestors_and_self();
        for (i, level) in chain.iter().enumerate() {
            self.folders
                .entry(level.clone())
                .or_insert_with(|| Folder::new(level.clone()));
            match i.checked_sub(1).map(|p| &chain[p]) {
                Some(parent) => {
                    if let Some(parent) = self.folders.get_mut(parent) {
                        parent.subfolders.insert(level.clone());
                    }
                }
                None => {
                    self.top_level.insert(level.clone());
                }
            }
        }
    }

    pub fn folder(&self, path: &FolderPath) -> Option<&Folder> {
        self.folders.get(path)
    }

    /// All folders in path order (parents before children)
    pub fn folders(&self) -> impl Iterator<Item = &Folder> + '_ {
        self.folders.values()
    }

    /// Folder paths a member is placed in; empty for root members
    pub fn placements(&self, member: ObjectId) -> &[FolderPath] {
        self.placements.get(&member).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Lazily built folder trees, one per table
#[derive(Debug)]
pub struct FolderCache {
    separators: Vec<char>,
    tables: HashMap<ObjectId, TableFolders>,
    builds: usize,
}

impl FolderCache {
    pub fn new(separators: Vec<char>) -> Self {
        Self {
            separators,
            tables: HashMap::new(),
            builds: 0,
        }
    }

    /// Folder tree of `table`, built on first access after an invalidation
    pub fn get(&mut self, model: &Model, table: ObjectId) -> &TableFolders {
        let separators = &self.separators;
        let builds = &mut self.builds;
        self.tables.entry(table).or_insert_with(|| {
            *builds += 1;
            TableFolders::build(model, table, separators)
        })
    }

    pub fn invalidate(&mut self, table: ObjectId) {
        if self.tables.remove(&table).is_some() {
            log::debug!("Folder cache invalidated for table {}", table);
        }
    }

    pub fn invalidate_all(&mut self) {
        self.tables.clear();
    }

    pub fn is_cached(&self, table: ObjectId) -> bool {
        self.tables.contains_key(&table)
    }

    /// Number of folder trees built so far
    pub fn build_count(&self) -> usize {
        self.builds
    }

    pub fn separators(&self) -> &[char] {
        &self.separators
    }
}

#[cfg(test)]
#[path = "folder_test.rs"]
mod tests;
