use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use sprmin_batch::PayloadWidth;
use sprmin_core::{
    CodecError, IndexOrder, MinifyOptions, MinifyOutput, RenderOptions, minify_sources,
};

const SOURCE_FILE: &str = "source.asm";
const TARGET_FILE: &str = "target.asm";
const CASE_FILE: &str = "case.ron";
const EXPECTED_OUTPUT: &str = "expected.asm";
const EXPECTED_ERROR: &str = "expected.err";

/// Per-fixture settings read from `case.ron`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseConfig {
    entry_size: usize,
    #[serde(default = "word_payload")]
    payload: PayloadWidth,
    #[serde(default)]
    interleave: bool,
}

fn word_payload() -> PayloadWidth {
    PayloadWidth::Word
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlessOptions {
    /// Only regenerate fixtures that already expect an error.
    pub errors_only: bool,
}

#[derive(Debug, Default)]
pub struct BlessSummary {
    pub processed_cases: usize,
    pub updated_files: Vec<PathBuf>,
}

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

pub fn discover_cases() -> Result<Vec<String>> {
    let dir = fixtures_dir();
    let mut cases = Vec::new();
    for entry in std::fs::read_dir(&dir)
        .with_context(|| format!("failed to read fixtures dir '{}'", dir.display()))?
    {
        let entry = entry?;
        if entry.path().is_dir() {
            cases.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    cases.sort();
    Ok(cases)
}

pub fn run_case(case: &str) -> Result<()> {
    let fixture_dir = fixtures_dir().join(case);
    let outcome = minify_fixture(&fixture_dir)?;

    let expected_error_path = fixture_dir.join(EXPECTED_ERROR);
    if expected_error_path.exists() {
        let expected_error = read(&expected_error_path)?;
        let err = match outcome {
            Ok(_) => {
                return Err(anyhow!(
                    "fixture '{}' expected an error, but minification succeeded",
                    fixture_dir.display()
                ));
            }
            Err(err) => err,
        };

        similar_asserts::assert_eq!(expected_error.trim_end(), err.to_string().trim_end());
        return Ok(());
    }

    let output = outcome.map_err(|err| anyhow!("{}", err.rendered()))?;
    let expected = read(&fixture_dir.join(EXPECTED_OUTPUT))?;
    similar_asserts::assert_eq!(expected, output.text);
    Ok(())
}

pub fn bless_cases(cases: &[String], options: BlessOptions) -> Result<BlessSummary> {
    let mut summary = BlessSummary::default();
    for case in cases {
        let fixture_dir = fixtures_dir().join(case);
        let expected_error_path = fixture_dir.join(EXPECTED_ERROR);
        if options.errors_only && !expected_error_path.exists() {
            continue;
        }

        summary.processed_cases += 1;
        let (path, contents, stale) = match minify_fixture(&fixture_dir)? {
            Ok(output) => (fixture_dir.join(EXPECTED_OUTPUT), output.text, expected_error_path),
            Err(err) => (
                expected_error_path,
                format!("{err}\n"),
                fixture_dir.join(EXPECTED_OUTPUT),
            ),
        };

        if stale.exists() {
            std::fs::remove_file(&stale)
                .with_context(|| format!("failed to remove '{}'", stale.display()))?;
            summary.updated_files.push(stale);
        }
        if std::fs::read_to_string(&path).ok().as_deref() != Some(contents.as_str()) {
            std::fs::write(&path, contents)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            summary.updated_files.push(path);
        }
    }
    Ok(summary)
}

/// Runs one fixture. The outer error is a broken fixture, the inner one a
/// minification failure.
fn minify_fixture(fixture_dir: &Path) -> Result<Result<MinifyOutput, CodecError>> {
    let case_path = fixture_dir.join(CASE_FILE);
    let case: CaseConfig = ron::from_str(&read(&case_path)?)
        .with_context(|| format!("failed to parse '{}'", case_path.display()))?;
    let source = read(&fixture_dir.join(SOURCE_FILE))?;
    let target = read(&fixture_dir.join(TARGET_FILE))?;

    let options = MinifyOptions {
        entry_size: case.entry_size,
        payload: case.payload.into(),
        order: if case.interleave {
            IndexOrder::Interleaved
        } else {
            IndexOrder::Sequential
        },
    };
    Ok(minify_sources(
        (SOURCE_FILE, &source),
        (TARGET_FILE, &target),
        options,
        RenderOptions::plain(),
    ))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_fixture_directories_sorted() {
        let cases = discover_cases().expect("discover");
        assert!(cases.contains(&"merge-basic".to_string()));
        assert!(cases.contains(&"duplicate-label".to_string()));
        assert!(cases.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn errors_only_skips_fixtures_with_output() {
        let summary = bless_cases(
            &["merge-basic".to_string()],
            BlessOptions { errors_only: true },
        )
        .expect("bless");
        assert_eq!(summary.processed_cases, 0);
        assert!(summary.updated_files.is_empty());
    }
}
