// attest-core/src/infrastructure/config/project.rs

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use validator::Validate;

use crate::infrastructure::error::InfrastructureError;

// --- STRUCTS DE CONFIGURATION ---

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProjectConfig {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Directory of schema definition YAML files, relative to the project.
    #[serde(default = "default_schemas_path")]
    pub schemas_path: String,

    /// Build artifacts (snapshots, reports), relative to the project.
    #[serde(default = "default_target_path")]
    pub target_path: String,

    /// Rows sampled by the Schema Matcher's content pass.
    #[serde(default = "default_sample_rows")]
    #[validate(range(min = 1, max = 10_000))]
    pub sample_rows: usize,

    #[serde(default)]
    #[validate(nested)]
    pub resolver: ResolverConfig,

    /// Tenant directory connection. Absent = resolution is skipped.
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResolverConfig {
    #[serde(default = "default_max_in_flight")]
    #[validate(range(min = 1, max = 64))]
    pub max_in_flight: usize,

    #[serde(default = "default_query_timeout_ms")]
    #[validate(range(min = 10, max = 120_000))]
    pub query_timeout_ms: u64,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            query_timeout_ms: default_query_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Where the tenant directory lives and how lookup fields map onto it.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// DuckDB database file. Mutually exclusive with `source_csv`.
    #[serde(default)]
    pub db_path: Option<String>,

    /// CSV registered as an in-memory directory view (read_csv_auto).
    #[serde(default)]
    pub source_csv: Option<String>,

    pub table: String,
    pub id_column: String,
    pub display_column: String,

    /// Lookup field name -> directory column.
    pub fields: HashMap<String, String>,
}

// --- DEFAULTS ---

fn default_version() -> String {
    "1.0".into()
}
fn default_schemas_path() -> String {
    "schemas".into()
}
fn default_target_path() -> String {
    "target".into()
}
fn default_sample_rows() -> usize {
    50
}
fn default_max_in_flight() -> usize {
    8
}
fn default_query_timeout_ms() -> u64 {
    5_000
}
fn default_retry_backoff_ms() -> u64 {
    250
}

// --- LOADER ---

#[instrument(skip(project_dir))] // Log automatique de l'entrée/sortie de la fonction
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    // 1. Découverte du fichier principal
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project configuration");

    // 2. Chargement YAML
    let content = fs::read_to_string(&config_path).map_err(InfrastructureError::Io)?;
    let mut config: ProjectConfig =
        serde_yaml::from_str(&content).map_err(InfrastructureError::YamlError)?;

    // 3. Override via Variables d'Environnement (Pattern 'Layering')
    // Permet de faire: ATTEST_TARGET_PATH=/tmp/build attest run
    apply_env_overrides(&mut config);

    // 4. Bornes numériques (Fail-Secure)
    config
        .validate()
        .map_err(|e| InfrastructureError::ConfigError(e.to_string()))?;

    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    let candidates = ["attest.yaml", "attest_project.yaml"];
    for filename in candidates {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, candidates
    )))
}

fn apply_env_overrides(config: &mut ProjectConfig) {
    if let Ok(val) = std::env::var("ATTEST_TARGET_PATH") {
        info!(old = ?config.target_path, new = ?val, "Overriding target path via ENV");
        config.target_path = val;
    }
    if let Ok(val) = std::env::var("ATTEST_SCHEMAS_PATH") {
        info!(old = ?config.schemas_path, new = ?val, "Overriding schemas path via ENV");
        config.schemas_path = val;
    }
}
