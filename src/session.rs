//! Branchable conversation history with JSONL persistence.
//!
//! A [`SessionTree`] stores every entry ever appended and never mutates one
//! in place; branching, forking, and compaction all work by inserting new
//! entries and moving a `current` pointer. A [`Session`] wraps a tree with
//! identity, workspace, and autosave, and knows how to write and read its
//! own on-disk representation.

use crate::error::Error;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One node in a [`SessionTree`].
///
/// Entries are append-only: once inserted, an entry's fields never change.
/// Branching and compaction both work by inserting new entries, never by
/// editing old ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: String,
    pub parent_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SessionEntry {
    fn new(
        parent_id: Option<String>,
        role: impl Into<String>,
        content: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id,
            timestamp: chrono::Utc::now(),
            role: role.into(),
            content: content.into(),
            metadata,
        }
    }
}

/// Tree of [`SessionEntry`] values rooted at the first entry ever appended.
///
/// Every non-root entry's `parent_id` references an entry already in the
/// tree; the `current` pointer marks the tip of the active branch and is
/// retargeted by [`SessionTree::switch_to`].
#[derive(Debug, Default)]
pub struct SessionTree {
    entries: HashMap<String, SessionEntry>,
    order: Vec<String>,
    root_id: Option<String>,
    current_id: Option<String>,
}

impl SessionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry as a child of `parent` (or of `current` if `parent` is `None`).
    pub fn append(
        &mut self,
        role: impl Into<String>,
        content: impl Into<String>,
        parent: Option<&str>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> &SessionEntry {
        let parent_id = parent.map(str::to_string).or_else(|| self.current_id.clone());
        let entry = SessionEntry::new(parent_id, role, content, metadata);
        let id = entry.id.clone();

        if self.root_id.is_none() {
            self.root_id = Some(id.clone());
        }
        self.order.push(id.clone());
        self.entries.insert(id.clone(), entry);
        self.current_id = Some(id.clone());

        self.entries.get(&id).expect("just inserted")
    }

    /// Retarget `current` to an existing entry. Subsequent appends branch from here.
    pub fn switch_to(&mut self, entry_id: &str) -> Result<()> {
        if !self.entries.contains_key(entry_id) {
            return Err(Error::session(format!("entry {entry_id} not found")));
        }
        self.current_id = Some(entry_id.to_string());
        Ok(())
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    pub fn get(&self, entry_id: &str) -> Option<&SessionEntry> {
        self.entries.get(entry_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walk `parent_id` from `entry_id` back to the root, then reverse: the effective conversation.
    pub fn path_to(&self, entry_id: &str) -> Vec<SessionEntry> {
        let mut path = Vec::new();
        let mut cursor = self.entries.get(entry_id);

        while let Some(entry) = cursor {
            path.push(entry.clone());
            cursor = entry.parent_id.as_deref().and_then(|id| self.entries.get(id));
        }

        path.reverse();
        path
    }

    /// Path from root to `current`, or empty if the tree has no entries.
    pub fn current_path(&self) -> Vec<SessionEntry> {
        match &self.current_id {
            Some(id) => self.path_to(id),
            None => Vec::new(),
        }
    }

    fn children_of(&self, entry_id: &str) -> Vec<&SessionEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|e| e.parent_id.as_deref() == Some(entry_id))
            .collect()
    }

    /// All maximal paths starting at `entry_id` (exclusive of `entry_id` itself).
    pub fn branches_from(&self, entry_id: &str) -> Vec<Vec<SessionEntry>> {
        let children = self.children_of(entry_id);
        if children.is_empty() {
            return vec![Vec::new()];
        }

        let mut branches = Vec::new();
        for child in children {
            for mut rest in self.branches_from(&child.id) {
                let mut branch = vec![child.clone()];
                branch.append(&mut rest);
                branches.push(branch);
            }
        }
        branches
    }

    /// Serialize every entry, one JSON object per line, in insertion order.
    pub fn to_jsonl(&self) -> Result<String> {
        let mut lines = Vec::with_capacity(self.order.len());
        for id in &self.order {
            let entry = self.entries.get(id).expect("order and entries in sync");
            lines.push(serde_json::to_string(entry)?);
        }
        Ok(lines.join("\n"))
    }

    /// Rebuild a tree from its JSONL form. `current` is restored to the entry with the latest timestamp.
    pub fn from_jsonl(jsonl: &str) -> Result<Self> {
        let mut tree = Self::new();

        for line in jsonl.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: SessionEntry = serde_json::from_str(line)?;
            if entry.parent_id.is_none() {
                tree.root_id = Some(entry.id.clone());
            }
            tree.order.push(entry.id.clone());
            tree.entries.insert(entry.id.clone(), entry);
        }

        tree.current_id = tree
            .entries
            .values()
            .max_by_key(|e| e.timestamp)
            .map(|e| e.id.clone());

        Ok(tree)
    }
}

/// On-disk header line preceding a session's entries.
///
/// `tree` mirrors the body for human inspection but is not consulted on
/// load; the body lines are the sole source of truth for reconstructing
/// the tree, since every entry carries its own parent pointer.
#[derive(Debug, Serialize, Deserialize)]
struct SessionHeader {
    id: String,
    name: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    metadata: serde_json::Map<String, serde_json::Value>,
    tree: String,
}

/// A named, workspace-scoped conversation, persisted as a single JSONL file.
pub struct Session {
    pub id: String,
    pub name: String,
    pub workspace: PathBuf,
    pub auto_save: bool,
    pub tree: SessionTree,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    pub fn new(name: Option<String>, workspace: PathBuf, auto_save: bool) -> Self {
        let id = Uuid::new_v4().to_string();
        let name = name.unwrap_or_else(|| format!("session-{}", &id[..8]));
        let now = chrono::Utc::now();

        Self {
            id,
            name,
            workspace,
            auto_save,
            tree: SessionTree::new(),
            created_at: now,
            updated_at: now,
            metadata: serde_json::Map::new(),
        }
    }

    /// Append a message to the active branch, autosaving if enabled.
    pub fn add_message(
        &mut self,
        role: impl Into<String>,
        content: impl Into<String>,
        parent: Option<&str>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<SessionEntry> {
        let entry = self.tree.append(role, content, parent, metadata).clone();
        self.updated_at = chrono::Utc::now();

        if self.auto_save {
            self.save(None)?;
        }

        Ok(entry)
    }

    /// The effective conversation: root-to-`current` path.
    pub fn current_conversation(&self) -> Vec<SessionEntry> {
        self.tree.current_path()
    }

    /// Retarget to a different point in history, autosaving if enabled.
    pub fn branch_to(&mut self, entry_id: &str) -> Result<()> {
        self.tree.switch_to(entry_id)?;
        self.updated_at = chrono::Utc::now();
        if self.auto_save {
            self.save(None)?;
        }
        Ok(())
    }

    /// Collapse the prefix of the current path into a synthetic `system` entry,
    /// keeping the last `keep_recent` entries verbatim.
    ///
    /// No-ops (returns the unmodified path) when the path isn't longer than `threshold`.
    pub fn compact(
        &mut self,
        threshold: usize,
        keep_recent: usize,
        instructions: Option<&str>,
    ) -> Result<Vec<SessionEntry>> {
        let path = self.current_conversation();
        if path.len() <= threshold {
            return Ok(path);
        }

        let split = path.len() - keep_recent;
        let (old, recent) = path.split_at(split);

        let distinct_roles = old.iter().map(|e| e.role.as_str()).collect::<std::collections::HashSet<_>>().len();
        let mut summary = format!("[Compacted {} messages]\n", old.len());
        if let Some(instructions) = instructions {
            summary.push_str(&format!("Instructions: {instructions}\n"));
        }
        summary.push_str(&format!("Topics covered: {distinct_roles} roles"));

        let mut metadata = serde_json::Map::new();
        metadata.insert("compacted".to_string(), serde_json::Value::Bool(true));
        metadata.insert(
            "original_count".to_string(),
            serde_json::Value::from(old.len()),
        );

        // Compaction summarizes the prefix ending at `old`'s tip, branching from
        // there so the synthetic entry supersedes exactly that prefix. `recent`
        // is then re-appended as fresh copies on top of the summary, so `current`
        // walks summary -> recent and matches what this function returns.
        // Entries are append-only: the originals stay in the tree, unreachable
        // from `current`, rather than being mutated or reparented in place.
        let parent = old.last().map(|e| e.id.clone());
        let compacted = self.add_message("system", summary, parent.as_deref(), metadata)?;

        let mut effective = vec![compacted];
        for entry in recent {
            let appended = self.add_message(entry.role.clone(), entry.content.clone(), None, entry.metadata.clone())?;
            effective.push(appended);
        }
        Ok(effective)
    }

    /// Build a fresh session whose tree is a linear copy of the path to `entry_id`.
    pub fn fork(&self, entry_id: &str, new_name: Option<String>) -> Result<Session> {
        let mut forked = Session::new(
            Some(new_name.unwrap_or_else(|| format!("{}-fork", self.name))),
            self.workspace.clone(),
            self.auto_save,
        );

        for entry in self.tree.path_to(entry_id) {
            forked.add_message(entry.role, entry.content, None, entry.metadata)?;
        }

        Ok(forked)
    }

    fn default_path(&self) -> PathBuf {
        self.workspace.join(".sessions").join(format!("{}.jsonl", self.name))
    }

    /// Persist the session. Writes to a temp file then renames into place so
    /// a reader never observes a partially written file.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| self.default_path());
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| Error::session(e.to_string()))?;
        }

        let tree_jsonl = self.tree.to_jsonl()?;
        let header = SessionHeader {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            metadata: self.metadata.clone(),
            tree: tree_jsonl.clone(),
        };

        let mut body = serde_json::to_string(&header)?;
        body.push('\n');
        body.push_str(&tree_jsonl);

        let tmp_path = path.with_extension("jsonl.tmp");
        std::fs::write(&tmp_path, body).map_err(|e| Error::session(e.to_string()))?;
        std::fs::rename(&tmp_path, &path).map_err(|e| Error::session(e.to_string()))?;

        Ok(path)
    }

    /// Load a session from its JSONL file.
    pub fn load(path: &Path) -> Result<Session> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::session(e.to_string()))?;
        let mut lines = contents.splitn(2, '\n');
        let header_line = lines.next().ok_or_else(|| Error::session("empty session file"))?;
        let body = lines.next().unwrap_or("");

        let header: SessionHeader = serde_json::from_str(header_line)?;
        let workspace = path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Session {
            id: header.id,
            name: header.name,
            workspace,
            auto_save: false,
            tree: SessionTree::from_jsonl(body)?,
            created_at: header.created_at,
            updated_at: header.updated_at,
            metadata: header.metadata,
        })
    }

    /// Human-facing summary used by CLI `/info`-style surfaces.
    pub fn info(&self) -> serde_json::Value {
        let branches = self
            .tree
            .root_id()
            .map(|root| self.tree.branches_from(root).len())
            .unwrap_or(0);

        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
            "entries": self.tree.len(),
            "current_path_length": self.current_conversation().len(),
            "branches": branches,
            "metadata": self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }

    #[test]
    fn append_sets_root_and_current() {
        let mut tree = SessionTree::new();
        let entry = tree.append("user", "hi", None, meta()).clone();
        assert_eq!(tree.root_id(), Some(entry.id.as_str()));
        assert_eq!(tree.current_id(), Some(entry.id.as_str()));
    }

    #[test]
    fn path_to_walks_root_to_tip() {
        let mut tree = SessionTree::new();
        let a = tree.append("user", "a", None, meta()).id.clone();
        let b = tree.append("assistant", "b", None, meta()).id.clone();

        let path = tree.path_to(&b);
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].id, a);
        assert_eq!(path[1].id, b);
    }

    #[test]
    fn switch_to_unknown_entry_errors() {
        let mut tree = SessionTree::new();
        let err = tree.switch_to("nope").unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[test]
    fn switch_to_enables_branching() {
        let mut tree = SessionTree::new();
        let root = tree.append("user", "root", None, meta()).id.clone();
        tree.append("assistant", "branch a", None, meta());

        tree.switch_to(&root).unwrap();
        let branch_b = tree.append("assistant", "branch b", None, meta()).id.clone();

        let branches = tree.branches_from(&root);
        assert_eq!(branches.len(), 2);
        assert!(branches.iter().any(|b| b.last().map(|e| e.id.as_str()) == Some(branch_b.as_str())));
    }

    #[test]
    fn jsonl_round_trip_preserves_entries_and_current() {
        let mut tree = SessionTree::new();
        tree.append("user", "hi", None, meta());
        let last = tree.append("assistant", "hello", None, meta()).id.clone();

        let jsonl = tree.to_jsonl().unwrap();
        let restored = SessionTree::from_jsonl(&jsonl).unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.current_id(), Some(last.as_str()));
    }

    #[test]
    fn save_then_load_round_trips_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(Some("test".to_string()), dir.path().to_path_buf(), false);
        session.add_message("user", "hello", None, meta()).unwrap();
        session.add_message("assistant", "hi there", None, meta()).unwrap();

        let path = session.save(None).unwrap();
        let loaded = Session::load(&path).unwrap();

        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.tree.len(), 2);
        assert_eq!(loaded.current_conversation().len(), 2);
    }

    #[test]
    fn compact_below_threshold_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(None, dir.path().to_path_buf(), false);
        for i in 0..5 {
            session.add_message("user", format!("msg {i}"), None, meta()).unwrap();
        }

        let path = session.compact(10, 5, None).unwrap();
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn compact_above_threshold_collapses_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(None, dir.path().to_path_buf(), false);
        for i in 0..12 {
            session.add_message("user", format!("msg {i}"), None, meta()).unwrap();
        }

        let effective = session.compact(10, 5, Some("focus on recent")).unwrap();
        assert_eq!(effective.len(), 6);
        assert_eq!(effective[0].role, "system");
        assert_eq!(effective[0].metadata["compacted"], serde_json::Value::Bool(true));

        // `current` must land on the effective path's tip, not be left behind on
        // the synthetic entry with `recent` orphaned off of it.
        let current = session.current_conversation();
        assert_eq!(current.len(), effective.len());
        assert_eq!(current.last().unwrap().content, "msg 11");
        for (a, b) in current.iter().zip(effective.iter()) {
            assert_eq!(a.id, b.id);
        }

        // A subsequent real message must branch off the effective tip, not the
        // orphaned original chain.
        let next = session.add_message("user", "msg 12", None, meta()).unwrap();
        assert_eq!(next.parent_id.as_deref(), Some(effective.last().unwrap().id.as_str()));
    }

    #[test]
    fn fork_copies_path_into_a_new_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(Some("orig".to_string()), dir.path().to_path_buf(), false);
        session.add_message("user", "hello", None, meta()).unwrap();
        let last = session.add_message("assistant", "hi", None, meta()).unwrap();

        let forked = session.fork(&last.id, Some("forked".to_string())).unwrap();
        assert_eq!(forked.name, "forked");
        assert_eq!(forked.tree.len(), 2);
        assert_ne!(forked.id, session.id);
    }

    #[test]
    fn branch_to_retargets_current() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(None, dir.path().to_path_buf(), false);
        let first = session.add_message("user", "hello", None, meta()).unwrap();
        session.add_message("assistant", "hi", None, meta()).unwrap();

        session.branch_to(&first.id).unwrap();
        assert_eq!(session.tree.current_id(), Some(first.id.as_str()));
    }
}
