use anyhow::Result;
use clap::Parser;
use sprmin_golden_tests::harness::{BlessOptions, bless_cases, discover_cases, fixtures_dir};

/// Regenerates expected.asm / expected.err for golden fixtures.
#[derive(Debug, Parser)]
#[command(name = "bless", about = "Regenerate golden fixture expectations")]
struct Cli {
    /// Only regenerate fixtures that already expect an error.
    #[arg(long = "errors-only", alias = "err-only")]
    errors_only: bool,
    /// List discoverable fixtures and exit.
    #[arg(long = "list")]
    list: bool,
    /// Fixture directory name; may repeat. Defaults to every fixture.
    #[arg(long = "case", value_name = "CASE")]
    cases: Vec<String>,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.list {
        for case in discover_cases()? {
            println!("{case}");
        }
        return Ok(());
    }

    let mut cases = cli.cases;
    if cases.is_empty() {
        cases = discover_cases()?;
    } else {
        cases.sort();
        cases.dedup();
    }

    let summary = bless_cases(
        &cases,
        BlessOptions {
            errors_only: cli.errors_only,
        },
    )?;
    println!(
        "Processed {} case(s), updated {} file(s).",
        summary.processed_cases,
        summary.updated_files.len()
    );
    let root = fixtures_dir();
    for path in summary.updated_files {
        let shown = path.strip_prefix(&root).unwrap_or(&path);
        println!("updated {}", shown.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_filters_and_error_alias() {
        let cli = Cli::try_parse_from(["bless", "--err-only", "--case", "b", "--case", "a"])
            .expect("parse");
        assert!(cli.errors_only);
        assert!(!cli.list);
        assert_eq!(cli.cases, vec!["b", "a"]);
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["bless", "--bogus"]).is_err());
    }
}
