//! The per-title progress ledger: chapter groups of `{title, url, completed}`
//! records, kept in file order and rewritten wholesale on every change.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::ser::SerializeMap as _;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tokio::fs;

use crate::error::LedgerError;
use crate::sort_key::SortKey;

pub const DEFAULT_GROUP_ORDER: &[&str] = &["番外篇", "单行本", "单话"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// Fields this tool does not interpret, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChapterRecord {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            completed: false,
            extra: Map::new(),
        }
    }

    /// Title and URL, when both are present and non-empty.
    pub fn target(&self) -> Option<(&str, &str)> {
        let title = self.title.as_deref().filter(|t| !t.is_empty())?;
        let url = self.url.as_deref().filter(|u| !u.is_empty())?;
        Some((title, url))
    }
}

/// A group entry that did not parse as a record is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChapterEntry {
    Record(ChapterRecord),
    Malformed(Value),
}

impl ChapterEntry {
    pub fn record(&self) -> Option<&ChapterRecord> {
        match self {
            ChapterEntry::Record(record) => Some(record),
            ChapterEntry::Malformed(_) => None,
        }
    }

    fn sort_key(&self) -> SortKey {
        let title = self
            .record()
            .and_then(|record| record.title.as_deref())
            .unwrap_or("");
        SortKey::from_title(title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LedgerGroup {
    Chapters(Vec<ChapterEntry>),
    /// Anything that is not a list; skipped by the runner.
    Other(Value),
}

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    groups: Vec<(String, LedgerGroup)>,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>, groups: Vec<(String, Vec<ChapterRecord>)>) -> Self {
        let groups = groups
            .into_iter()
            .map(|(name, records)| {
                let entries = records.into_iter().map(ChapterEntry::Record).collect();
                (name, LedgerGroup::Chapters(entries))
            })
            .collect();
        Self {
            path: path.into(),
            groups,
        }
    }

    pub async fn load(path: &Path) -> Result<Self, LedgerError> {
        let data = fs::read(path).await.map_err(|source| LedgerError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(path, &data)
    }

    pub fn from_slice(path: &Path, data: &[u8]) -> Result<Self, LedgerError> {
        let value: Value = serde_json::from_slice(data).map_err(|source| LedgerError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let Value::Object(map) = value else {
            return Err(LedgerError::NotAnObject {
                path: path.to_path_buf(),
            });
        };

        let groups = map
            .into_iter()
            .map(|(name, value)| {
                let group = serde_json::from_value::<LedgerGroup>(value.clone())
                    .unwrap_or(LedgerGroup::Other(value));
                (name, group)
            })
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            groups,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the ledger lives in; chapter output is laid out below it.
    pub fn root_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    pub fn group(&self, name: &str) -> Option<&LedgerGroup> {
        self.groups
            .iter()
            .find(|(group, _)| group == name)
            .map(|(_, group)| group)
    }

    /// Group names in processing order: every `preferred` name present in
    /// the ledger, then the remaining groups in file order.
    pub fn processing_order<S: AsRef<str>>(&self, preferred: &[S]) -> Vec<String> {
        let mut order = Vec::with_capacity(self.groups.len());
        for wanted in preferred {
            let wanted = wanted.as_ref();
            if self.group(wanted).is_some() && !order.iter().any(|name| name == wanted) {
                order.push(wanted.to_owned());
            }
        }
        for name in self.group_names() {
            if !order.iter().any(|seen| seen == name) {
                order.push(name.to_owned());
            }
        }
        order
    }

    /// Sorts the group's chapters by title in place. Returns the number of
    /// entries, or `None` when the group is missing or not a list.
    pub fn sort_group(&mut self, name: &str) -> Option<usize> {
        let entries = self.chapters_mut(name)?;
        entries.sort_by_cached_key(ChapterEntry::sort_key);
        Some(entries.len())
    }

    pub fn entry(&self, group: &str, index: usize) -> Option<&ChapterEntry> {
        match self.group(group)? {
            LedgerGroup::Chapters(entries) => entries.get(index),
            LedgerGroup::Other(_) => None,
        }
    }

    pub fn mark_completed(&mut self, group: &str, index: usize) -> bool {
        match self
            .chapters_mut(group)
            .and_then(|entries| entries.get_mut(index))
        {
            Some(ChapterEntry::Record(record)) => {
                record.completed = true;
                true
            }
            _ => false,
        }
    }

    fn chapters_mut(&mut self, name: &str) -> Option<&mut Vec<ChapterEntry>> {
        self.groups
            .iter_mut()
            .find(|(group, _)| group == name)
            .and_then(|(_, group)| match group {
                LedgerGroup::Chapters(entries) => Some(entries),
                LedgerGroup::Other(_) => None,
            })
    }

    /// UTF-8 JSON, four-space indent, non-ASCII kept as is.
    pub fn to_pretty_json(&self) -> serde_json::Result<Vec<u8>> {
        to_pretty_json(self)
    }

    pub async fn save(&self) -> Result<(), LedgerError> {
        write_json_atomic(&self.path, self)
            .await
            .map_err(|source| LedgerError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Writes `value` next to `path` under a unique temporary name, then renames
/// it into place so readers never observe a half-written file.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = to_pretty_json(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err).with_context(|| format!("rename tmp to final: {}", path.display()));
    }
    Ok(())
}

impl Serialize for Ledger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (name, group) in &self.groups {
            map.serialize_entry(name, group)?;
        }
        map.end()
    }
}
