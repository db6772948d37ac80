use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Labels {
    ids: HashMap<String, u32>,
    /// Names by id; the id of a name is its position here.
    names: Vec<String>,
}

/// Run-scoped interning of creator process names into small integers.
///
/// Shared by every worker of a run. Ids are handed out in first-seen order
/// and never change or get reused.
#[derive(Debug, Default)]
pub struct ProcessLabelTable {
    labels: Mutex<Labels>,
}

impl ProcessLabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn labels(&self) -> MutexGuard<'_, Labels> {
        // Inserts have no panicking step between push and map insert.
        self.labels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the id for `name`, assigning the next free id on first sight.
    pub fn intern(&self, name: &str) -> u32 {
        let mut labels = self.labels();
        if let Some(&id) = labels.ids.get(name) {
            return id;
        }
        let id = labels.names.len() as u32;
        labels.names.push(name.to_string());
        labels.ids.insert(name.to_string(), id);
        debug!("Registered process '{}' as id {}", name, id);
        id
    }

    pub fn len(&self) -> usize {
        self.labels().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the full id -> name mapping.
    pub fn export(&self) -> BTreeMap<u32, String> {
        self.labels()
            .names
            .iter()
            .enumerate()
            .map(|(id, name)| (id as u32, name.clone()))
            .collect()
    }

    /// Writes the current mapping with [`write_process_map`].
    pub fn write_map<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_process_map(path, &self.export())
    }
}

/// Writes an id -> name mapping as tab-separated `id, name` rows under an
/// `ID\tProcessName` header line.
pub fn write_process_map<P: AsRef<Path>>(path: P, mapping: &BTreeMap<u32, String>) -> Result<()> {
    let path_ref = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path_ref)
        .with_context(|| format!("Failed to create process map file '{}'", path_ref.display()))?;
    writer.write_record(["ID", "ProcessName"])?;
    for (id, name) in mapping {
        writer.write_record([id.to_string(), name.clone()])?;
    }
    writer.flush()?;

    info!("Process ID mapping ({} entries) saved to '{}'", mapping.len(), path_ref.display());
    Ok(())
}

/// Reads a file written by [`write_process_map`].
pub fn read_process_map<P: AsRef<Path>>(path: P) -> Result<BTreeMap<u32, String>> {
    let path_ref = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path_ref)
        .with_context(|| format!("Failed to open process map file '{}'", path_ref.display()))?;
    let mut mapping = BTreeMap::new();
    for row in reader.deserialize() {
        let (id, name): (u32, String) = row.with_context(|| format!("Malformed row in '{}'", path_ref.display()))?;
        mapping.insert(id, name);
    }
    Ok(mapping)
}
