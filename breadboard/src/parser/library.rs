//! Device library with partial-failure batch import.
//!
//! Every descriptor in a batch is parsed on its own. A failure is recorded
//! against its source and the rest of the batch still loads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{parse_device, ParseError};
use crate::device::DeviceDefinition;

/// Palette order of the well-known categories.
pub const CATEGORY_ORDER: [&str; 7] = [
    "Boards", "Output", "Display", "Input", "Sensor", "Passive", "Other",
];

/// File extensions picked up when importing a directory.
pub const DESCRIPTOR_EXTENSIONS: [&str; 2] = ["adev", "json"];

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug)]
pub struct ImportFailure {
    /// File path or caller-supplied name of the descriptor.
    pub source: String,
    pub error: ImportError,
}

/// Outcome of a batch import.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Ids of the definitions loaded, in import order.
    pub loaded: Vec<String>,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: ImportReport) {
        self.loaded.extend(other.loaded);
        self.failures.extend(other.failures);
    }
}

/// Loaded definitions keyed by id, in load order.
#[derive(Debug, Clone, Default)]
pub struct DeviceLibrary {
    devices: Vec<Arc<DeviceDefinition>>,
}

impl DeviceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. One with the same id is replaced where it stands.
    pub fn insert(&mut self, definition: DeviceDefinition) -> Arc<DeviceDefinition> {
        let definition = Arc::new(definition);
        match self.devices.iter_mut().find(|d| d.id == definition.id) {
            Some(slot) => {
                debug!(device = %definition.id, "replacing definition");
                *slot = definition.clone();
            }
            None => self.devices.push(definition.clone()),
        }
        definition
    }

    pub fn get(&self, id: &str) -> Option<Arc<DeviceDefinition>> {
        self.devices.iter().find(|d| d.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.iter().any(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DeviceDefinition>> {
        self.devices.iter()
    }

    /// Parse one descriptor and add it.
    pub fn import_str(&mut self, text: &str) -> Result<Arc<DeviceDefinition>, ParseError> {
        Ok(self.insert(parse_device(text)?))
    }

    /// Import named descriptor texts.
    pub fn import_batch<'a, I>(&mut self, items: I) -> ImportReport
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut report = ImportReport::default();
        for (source, text) in items {
            match self.import_str(text) {
                Ok(def) => report.loaded.push(def.id.clone()),
                Err(e) => {
                    warn!(source = %source, error = %e, "failed to import device");
                    report.failures.push(ImportFailure {
                        source: source.to_string(),
                        error: e.into(),
                    });
                }
            }
        }
        info!(loaded = report.loaded.len(), failed = report.failures.len(), "import finished");
        report
    }

    /// Import descriptor files. Directories are expanded to the descriptor
    /// files directly inside them.
    pub fn import_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> ImportReport {
        let mut report = ImportReport::default();
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                match self.import_dir(path) {
                    Ok(r) => report.merge(r),
                    Err(e) => report.failures.push(ImportFailure {
                        source: path.display().to_string(),
                        error: e.into(),
                    }),
                }
            } else {
                self.import_file(path, &mut report);
            }
        }
        report
    }

    /// Import every `*.adev` / `*.json` file in a directory, in file-name
    /// order. Fails only if the directory itself cannot be read.
    pub fn import_dir(&mut self, dir: &Path) -> Result<ImportReport, std::io::Error> {
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_descriptor = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| DESCRIPTOR_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if path.is_file() && is_descriptor {
                files.push(path);
            }
        }
        files.sort();

        let mut report = ImportReport::default();
        for path in &files {
            self.import_file(path, &mut report);
        }
        info!(
            dir = %dir.display(),
            loaded = report.loaded.len(),
            failed = report.failures.len(),
            "imported device directory"
        );
        Ok(report)
    }

    fn import_file(&mut self, path: &Path, report: &mut ImportReport) {
        let result = std::fs::read_to_string(path)
            .map_err(ImportError::from)
            .and_then(|text| self.import_str(&text).map_err(ImportError::from));
        match result {
            Ok(def) => {
                debug!(path = %path.display(), device = %def.id, "imported device");
                report.loaded.push(def.id.clone());
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "failed to import device");
                report.failures.push(ImportFailure {
                    source: path.display().to_string(),
                    error,
                });
            }
        }
    }

    /// Definitions grouped for the palette: the well-known categories in
    /// [`CATEGORY_ORDER`], then any others in first-seen order. A blank
    /// category counts as "Other". Empty groups are omitted.
    pub fn by_category(&self) -> Vec<(String, Vec<Arc<DeviceDefinition>>)> {
        let mut groups: Vec<(String, Vec<Arc<DeviceDefinition>>)> = CATEGORY_ORDER
            .iter()
            .map(|c| (c.to_string(), Vec::new()))
            .collect();

        for def in &self.devices {
            let category = match def.category.trim() {
                "" => "Other",
                c => c,
            };
            match groups.iter_mut().find(|(name, _)| name == category) {
                Some((_, members)) => members.push(def.clone()),
                None => groups.push((category.to_string(), vec![def.clone()])),
            }
        }

        groups.retain(|(_, members)| !members.is_empty());
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn descriptor(id: &str, category: &str) -> String {
        format!(r#"{{ "device": {{ "id": "{id}", "name": "{id}", "category": "{category}" }} }}"#)
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut lib = DeviceLibrary::new();
        lib.import_str(&descriptor("led", "Output")).unwrap();
        lib.import_str(&descriptor("btn", "Input")).unwrap();
        lib.import_str(&descriptor("led", "Display")).unwrap();

        assert_eq!(lib.len(), 2);
        let ids: Vec<_> = lib.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["led", "btn"]);
        assert_eq!(lib.get("led").unwrap().category, "Display");
    }

    #[test]
    fn test_batch_is_partial_failure_tolerant() {
        let mut lib = DeviceLibrary::new();
        let good = descriptor("led", "Output");
        let report = lib.import_batch([
            ("led.adev", good.as_str()),
            ("broken.adev", "{ not json"),
            ("list.adev", "[]"),
            ("empty.adev", "{}"),
        ]);

        assert_eq!(report.loaded, ["led", "?"]);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].source, "broken.adev");
        assert!(matches!(
            report.failures[0].error,
            ImportError::Parse(ParseError::Syntax { .. })
        ));
        assert!(matches!(
            report.failures[1].error,
            ImportError::Parse(ParseError::Structure(_))
        ));
        assert_eq!(lib.len(), 2);
    }

    #[test]
    fn test_by_category_order() {
        let mut lib = DeviceLibrary::new();
        for (id, cat) in [
            ("pot", "Input"),
            ("relay", "Actuators"),
            ("uno", "Boards"),
            ("misc", ""),
            ("led", "Output"),
            ("ldr", "Sensor"),
        ] {
            lib.import_str(&descriptor(id, cat)).unwrap();
        }

        let names: Vec<_> = lib.by_category().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Boards", "Output", "Input", "Sensor", "Other", "Actuators"]);
    }

    #[test]
    fn test_import_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b_led.adev"), descriptor("led", "Output")).unwrap();
        fs::write(dir.path().join("a_uno.json"), descriptor("uno", "Boards")).unwrap();
        fs::write(dir.path().join("c_bad.adev"), "{ \"pins\": 5 }").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut lib = DeviceLibrary::new();
        let report = lib.import_dir(dir.path()).unwrap();
        assert_eq!(report.loaded, ["uno", "led"]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].source.ends_with("c_bad.adev"));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_import_files_missing_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("led.adev");
        fs::write(&file, descriptor("led", "Output")).unwrap();

        let mut lib = DeviceLibrary::new();
        let report = lib.import_files(&[file, dir.path().join("missing.adev")]);
        assert_eq!(report.loaded, ["led"]);
        assert!(matches!(report.failures[0].error, ImportError::Io(_)));
    }
}
