//! Batch driver: minifies every configured artifact kind for every entity
//! under a root directory.

pub mod config;
pub mod fs;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use sprmin_core::{IndexOrder, MinifyOptions, MinifyStats, RenderOptions, minify_sources};

pub use config::{
    ArtifactKind, BatchConfig, Entity, PayloadWidth, default_config, load_config, parse_config,
    validate_config,
};
pub use fs::{ArtifactError, ArtifactSink, ArtifactSource, MemoryArtifacts, StdArtifactFs};

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Parse and minify, but leave targets untouched.
    pub dry_run: bool,
    pub render: RenderOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub entity: String,
    pub kind: String,
    pub path: PathBuf,
    pub stats: MinifyStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArtifact {
    pub entity: String,
    pub kind: String,
    pub source: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub written: Vec<WrittenArtifact>,
    pub skipped: Vec<SkippedArtifact>,
}

pub fn run_batch(
    config: &BatchConfig,
    root: &Path,
    source: &dyn ArtifactSource,
    sink: &dyn ArtifactSink,
    options: BatchOptions,
) -> Result<BatchReport> {
    validate_config(config)?;

    let mut report = BatchReport::default();
    for entity in &config.entities {
        for kind in &config.kinds {
            let source_path = kind.source_path(root, &entity.name);
            let source_text = match source.read(&source_path) {
                Ok(text) => text,
                Err(err) if err.is_not_found() => {
                    tracing::info!(
                        "skipping {} for {}: '{}' does not exist",
                        kind.name,
                        entity.name,
                        source_path.display()
                    );
                    report.skipped.push(SkippedArtifact {
                        entity: entity.name.clone(),
                        kind: kind.name.clone(),
                        source: source_path,
                    });
                    continue;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("failed to load {} source for {}", kind.name, entity.name)
                    });
                }
            };

            let target_path = kind.target_path(root, &entity.name);
            let target_text = source.read(&target_path).with_context(|| {
                format!("failed to load {} target for {}", kind.name, entity.name)
            })?;

            let minify_options = MinifyOptions {
                entry_size: kind.entry_size,
                payload: kind.payload.into(),
                order: if entity.interleave {
                    IndexOrder::Interleaved
                } else {
                    IndexOrder::Sequential
                },
            };
            let output = minify_sources(
                (&source_path.display().to_string(), &source_text),
                (&target_path.display().to_string(), &target_text),
                minify_options,
                options.render,
            )
            .map_err(|error| anyhow!(error.rendered()))
            .with_context(|| format!("failed to minify {} for {}", kind.name, entity.name))?;

            if options.dry_run {
                tracing::info!(
                    "{} for {}: {} distinct record(s), not written (dry run)",
                    kind.name,
                    entity.name,
                    output.stats.distinct_records
                );
            } else {
                sink.write(&target_path, &output.text).with_context(|| {
                    format!("failed to store {} for {}", kind.name, entity.name)
                })?;
                tracing::info!(
                    "wrote '{}': {} offset entries, {} distinct record(s)",
                    target_path.display(),
                    output.stats.offset_entries,
                    output.stats.distinct_records
                );
            }

            report.written.push(WrittenArtifact {
                entity: entity.name.clone(),
                kind: kind.name.clone(),
                path: target_path,
                stats: output.stats,
            });
        }
    }

    Ok(report)
}
