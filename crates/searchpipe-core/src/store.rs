//! Directory-backed pipeline store: one `<id>.json` file per definition.
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::pipeline::PipelineDefinition;
use crate::traits::PipelineStore;

#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Parse a single definition file.
    pub fn load_file(path: &Path) -> Result<PipelineDefinition> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let bad = id.is_empty() || id.contains("..") || id.contains('/') || id.contains('\\');
        if bad {
            return Err(Error::InvalidInput(format!("invalid pipeline id '{id}'")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl PipelineStore for DirectoryStore {
    fn load(&self, id: &str) -> Result<Option<PipelineDefinition>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            debug!(id, dir = %self.dir.display(), "pipeline not found");
            return Ok(None);
        }
        Self::load_file(&path).map(Some)
    }

    fn save(&self, definition: &PipelineDefinition) -> Result<()> {
        let path = self.path_for(&definition.id)?;
        let content = definition.to_json_pretty()?;
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => Error::AlreadyExists(format!("pipeline '{}'", definition.id)),
            _ => Error::Io(e),
        })?;
        file.write_all(content.as_bytes())?;
        debug!(id = %definition.id, path = %path.display(), "pipeline saved");
        Ok(())
    }

    fn list(&self) -> Result<Vec<PipelineDefinition>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut definitions = Vec::new();
        for entry in walkdir::WalkDir::new(&self.dir).max_depth(1).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match Self::load_file(path) {
                Ok(def) => definitions.push(def),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable pipeline definition"),
            }
        }
        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(definitions)
    }
}
