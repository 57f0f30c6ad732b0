// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The thin, swappable loader trait §1 calls for: job manager boot reads
//! configuration through this interface rather than the filesystem
//! directly, so an alternate source (a database, a remote fetch) can be
//! substituted without touching the manager.

use crate::error::RunbookError;
use crate::variables::VariableEntry;
use crate::{connector, dotenv, job_definition, variables};
use chrono::{DateTime, Utc};
use sift_core::{Connector, JobDefinition};
use std::collections::HashMap;
use std::path::PathBuf;

pub trait ConfigLoader: Send + Sync {
    fn load_job_definitions(&self, now: DateTime<Utc>) -> Vec<JobDefinition>;
    fn load_variables(&self) -> Result<Vec<VariableEntry>, RunbookError>;
    fn load_dotenv(&self) -> Result<HashMap<String, String>, RunbookError>;
    fn load_connectors(&self, vars: &HashMap<String, String>, now: DateTime<Utc>) -> Vec<Connector>;
}

/// Default [`ConfigLoader`]: job definitions and connectors are
/// directories of `.toml` files; variables and `.env` are single files.
/// Any path that doesn't exist yields an empty result rather than an
/// error (a fresh install has none of these yet).
pub struct FsConfigLoader {
    pub job_definitions_dir: PathBuf,
    pub connectors_dir: PathBuf,
    pub variables_path: PathBuf,
    pub dotenv_path: PathBuf,
}

impl FsConfigLoader {
    /// Lay out the four conventional paths under a single config root:
    /// `<root>/jobs/`, `<root>/connectors/`, `<root>/variables.toml`,
    /// `<root>/.env`.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            job_definitions_dir: root.join("jobs"),
            connectors_dir: root.join("connectors"),
            variables_path: root.join("variables.toml"),
            dotenv_path: root.join(".env"),
        }
    }
}

impl ConfigLoader for FsConfigLoader {
    fn load_job_definitions(&self, now: DateTime<Utc>) -> Vec<JobDefinition> {
        job_definition::load_dir(&self.job_definitions_dir, now)
    }

    fn load_variables(&self) -> Result<Vec<VariableEntry>, RunbookError> {
        if !self.variables_path.exists() {
            return Ok(Vec::new());
        }
        variables::load(&self.variables_path)
    }

    fn load_dotenv(&self) -> Result<HashMap<String, String>, RunbookError> {
        if !self.dotenv_path.exists() {
            return Ok(HashMap::new());
        }
        dotenv::load(&self.dotenv_path)
    }

    fn load_connectors(&self, vars: &HashMap<String, String>, now: DateTime<Utc>) -> Vec<Connector> {
        connector::load_dir(&self.connectors_dir, vars, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_paths_yield_empty_results() {
        let dir = tempdir().unwrap();
        let loader = FsConfigLoader::under(dir.path());
        assert!(loader.load_job_definitions(Utc::now()).is_empty());
        assert!(loader.load_variables().unwrap().is_empty());
        assert!(loader.load_dotenv().unwrap().is_empty());
        assert!(loader.load_connectors(&HashMap::new(), Utc::now()).is_empty());
    }

    #[test]
    fn loads_job_definitions_and_connectors_from_conventional_layout() {
        let dir = tempdir().unwrap();
        let loader = FsConfigLoader::under(dir.path());
        fs::create_dir_all(&loader.job_definitions_dir).unwrap();
        fs::write(
            loader.job_definitions_dir.join("nightly.toml"),
            "name = \"nightly\"\n[[steps]]\nname = \"collect\"\nworker_type = \"collector_github\"\n",
        )
        .unwrap();
        fs::create_dir_all(&loader.connectors_dir).unwrap();
        fs::write(
            loader.connectors_dir.join("github.toml"),
            "name = \"github-main\"\ntype = \"github\"\nconfig = { token = \"{github.token}\" }\n",
        )
        .unwrap();

        let defs = loader.load_job_definitions(Utc::now());
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "nightly");

        let vars = [("github.token".to_string(), "secret".to_string())].into_iter().collect();
        let connectors = loader.load_connectors(&vars, Utc::now());
        assert_eq!(connectors.len(), 1);
        assert_eq!(connectors[0].config["token"], "secret");
    }
}
