use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use sprmin_core::{DPLC_ENTRY_SIZE, MAPPINGS_ENTRY_SIZE, OperandWidth};

const ENTITY_PLACEHOLDER: &str = "{entity}";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub entities: Vec<Entity>,
    pub kinds: Vec<ArtifactKind>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entity {
    pub name: String,
    /// Read this entity's parallel offset tables record-major.
    #[serde(default)]
    pub interleave: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactKind {
    pub name: String,
    /// Path of the authoritative record contents, relative to the batch root.
    pub source: String,
    /// Path whose offset tables are kept; the result is written back here.
    pub target: String,
    pub entry_size: usize,
    #[serde(default = "default_payload")]
    pub payload: PayloadWidth,
}

fn default_payload() -> PayloadWidth {
    PayloadWidth::Word
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PayloadWidth {
    Byte,
    Word,
}

impl From<PayloadWidth> for OperandWidth {
    fn from(width: PayloadWidth) -> Self {
        match width {
            PayloadWidth::Byte => OperandWidth::Byte,
            PayloadWidth::Word => OperandWidth::Word,
        }
    }
}

impl ArtifactKind {
    pub fn source_path(&self, root: &Path, entity: &str) -> PathBuf {
        root.join(self.source.replace(ENTITY_PLACEHOLDER, entity))
    }

    pub fn target_path(&self, root: &Path, entity: &str) -> PathBuf {
        root.join(self.target.replace(ENTITY_PLACEHOLDER, entity))
    }
}

pub fn load_config(path: &Path) -> Result<BatchConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read batch config '{}'", path.display()))?;
    parse_config(&text)
        .with_context(|| format!("failed to parse batch config '{}'", path.display()))
}

pub fn parse_config(text: &str) -> Result<BatchConfig> {
    let config: BatchConfig = ron::from_str(text)?;
    validate_config(&config)?;
    Ok(config)
}

/// Sprite mappings and DPLCs of the three playable characters.
pub fn default_config() -> BatchConfig {
    let entity = |name: &str, interleave| Entity {
        name: name.to_string(),
        interleave,
    };
    BatchConfig {
        entities: vec![
            entity("Sonic", true),
            entity("Tails", false),
            entity("Knuckles", false),
        ],
        kinds: vec![
            ArtifactKind {
                name: "mappings".to_string(),
                source: "{entity}/map.asm".to_string(),
                target: "{entity}/Map - {entity}.asm".to_string(),
                entry_size: MAPPINGS_ENTRY_SIZE,
                payload: PayloadWidth::Byte,
            },
            ArtifactKind {
                name: "dplc".to_string(),
                source: "{entity}/plc.asm".to_string(),
                target: "{entity}/DPLC - {entity}.asm".to_string(),
                entry_size: DPLC_ENTRY_SIZE,
                payload: PayloadWidth::Word,
            },
        ],
    }
}

pub fn validate_config(config: &BatchConfig) -> Result<()> {
    if config.entities.is_empty() {
        bail!("batch config declares no entities");
    }
    if config.kinds.is_empty() {
        bail!("batch config declares no artifact kinds");
    }

    let mut seen_entities: HashMap<&str, usize> = HashMap::new();
    for (index, entity) in config.entities.iter().enumerate() {
        if entity.name.trim().is_empty() {
            bail!("entity name at index {index} must not be empty");
        }
        if let Some(previous) = seen_entities.insert(entity.name.as_str(), index) {
            bail!(
                "duplicate entity '{}' at indices {} and {}",
                entity.name,
                previous,
                index
            );
        }
    }

    let mut seen_kinds: HashMap<&str, usize> = HashMap::new();
    for (index, kind) in config.kinds.iter().enumerate() {
        if kind.name.trim().is_empty() {
            bail!("artifact kind name at index {index} must not be empty");
        }
        if let Some(previous) = seen_kinds.insert(kind.name.as_str(), index) {
            bail!(
                "duplicate artifact kind '{}' at indices {} and {}",
                kind.name,
                previous,
                index
            );
        }
        if kind.entry_size == 0 {
            bail!("artifact kind '{}' must have an entry_size of at least 1", kind.name);
        }
        if kind.source == kind.target {
            bail!(
                "artifact kind '{}' uses the same path for source and target",
                kind.name
            );
        }
    }
    Ok(())
}
