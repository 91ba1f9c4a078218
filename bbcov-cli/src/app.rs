use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bbcov_build::{emit_templates, BuildLayout};
use bbcov_runtime::{merge_store_files, RuntimeConfig, StoreMergeSummary};
use clap::ValueEnum;
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub format: OutputFormat,
    pub runtime: RuntimeConfig,
}

pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_layout(path: &Path) -> Result<BuildLayout> {
    BuildLayout::load(path).with_context(|| format!("failed to load layout {}", path.display()))
}

pub fn verify(config: &AppConfig, layout_path: &Path) -> Result<()> {
    let layout = load_layout(layout_path)?;
    layout
        .verify()
        .with_context(|| format!("layout {} failed verification", layout_path.display()))?;
    info!(
        files = layout.files.len(),
        functions = layout.function_count(),
        "Layout verified"
    );

    match config.format {
        OutputFormat::Text => println!(
            "ok: {} files, {} functions",
            layout.files.len(),
            layout.function_count()
        ),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "ok": true,
                "files": layout.files.len(),
                "functions": layout.function_count(),
            })
        ),
    }
    Ok(())
}

pub fn template(config: &AppConfig, layout_path: &Path) -> Result<Vec<PathBuf>> {
    let layout = load_layout(layout_path)?;
    let written = emit_templates(&layout)
        .with_context(|| format!("failed to emit templates for {}", layout_path.display()))?;

    match config.format {
        OutputFormat::Text => {
            for path in &written {
                println!("{}", path.display());
            }
        }
        OutputFormat::Json => {
            let paths: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
            println!("{}", json!({ "written": paths }));
        }
    }
    Ok(written)
}

pub fn merge(config: &AppConfig, source: &Path, target: &Path) -> Result<StoreMergeSummary> {
    debug!(lock = config.runtime.lock, "Merging stores");
    let summary = merge_store_files(source, target, &config.runtime).with_context(|| {
        format!(
            "failed to merge {} into {}",
            source.display(),
            target.display()
        )
    })?;

    match config.format {
        OutputFormat::Text => println!(
            "{}: {} functions, {} covered, {} blocks covered",
            target.display(),
            summary.functions,
            summary.covered_functions,
            summary.covered_blocks
        ),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "store": target.display().to_string(),
                "functions": summary.functions,
                "covered_functions": summary.covered_functions,
                "covered_blocks": summary.covered_blocks,
                "source_truncated_at": summary.source_stopped.as_ref().map(|s| s.line),
                "target_truncated_at": summary.target_stopped.as_ref().map(|s| s.line),
            })
        ),
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn config() -> AppConfig {
        AppConfig {
            format: OutputFormat::Text,
            runtime: RuntimeConfig::default(),
        }
    }

    #[test]
    fn verify__malformed_json__then_error_names_layout() {
        let dir = tempdir().expect("tempdir");
        let layout = dir.path().join("layout.json");
        fs::write(&layout, "{ not json").unwrap();

        let err = verify(&config(), &layout).unwrap_err();

        assert!(format!("{err:#}").contains("layout.json"));
    }

    #[test]
    fn template__valid_layout__then_returns_written_stores() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("a.c").display().to_string();
        let layout = dir.path().join("layout.json");
        let mut build = BuildLayout::new();
        build.files.entry(source.clone()).or_default().insert("f".to_string(), 2);
        build.save(&layout).unwrap();

        let written = template(&config(), &layout).expect("template");

        assert_eq!(written, vec![PathBuf::from(format!("{source}.cov"))]);
    }

    #[test]
    fn merge__json_format__then_summary_returned() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("run.cov");
        let target = dir.path().join("a.c.cov");
        fs::write(&source, "F f 1\nB 0 1\n").unwrap();
        let config = AppConfig {
            format: OutputFormat::Json,
            ..config()
        };

        let summary = merge(&config, &source, &target).expect("merge");

        assert_eq!(summary.covered_blocks, 1);
    }
}
