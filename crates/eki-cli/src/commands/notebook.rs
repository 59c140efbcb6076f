//! Notebook repair command implementations

use std::path::PathBuf;

use anyhow::{Context, Result};
use eki_core::notebook::{patch_file, rewrite_models_file, TRIGGERS};

/// Patch every file; stops at the first file that cannot be read or parsed
pub fn cmd_notebook_patch(files: &[PathBuf], dry_run: bool) -> Result<()> {
    let mut total = 0;
    for path in files {
        let report = patch_file(path, dry_run)
            .with_context(|| format!("Failed to patch {}", path.display()))?;

        if report.modified.is_empty() {
            println!("✓ {}: no cells need fixing", path.display());
            continue;
        }

        let verb = if dry_run { "would fix" } else { "fixed" };
        println!(
            "🔧 {}: {} {} cell(s)",
            path.display(),
            verb,
            report.modified_count()
        );
        for cell in &report.modified {
            println!("   cell {:>3} → {}", cell.index, cell.category);
        }
        total += report.modified_count();
    }

    if files.len() > 1 {
        println!();
        println!("Total: {} cell(s) across {} notebook(s)", total, files.len());
    }
    if dry_run && total > 0 {
        println!("Dry run: no files were written");
    }
    Ok(())
}

pub fn cmd_notebook_rewrite_models(files: &[PathBuf], dry_run: bool) -> Result<()> {
    for path in files {
        let report = rewrite_models_file(path, dry_run)
            .with_context(|| format!("Failed to rewrite {}", path.display()))?;

        if report.modified_cells.is_empty() {
            println!("✓ {}: no model references to rewrite", path.display());
        } else {
            let cells: Vec<String> = report
                .modified_cells
                .iter()
                .map(|i| i.to_string())
                .collect();
            println!(
                "🔧 {}: {} model references in cell(s) {}",
                path.display(),
                if dry_run { "would rewrite" } else { "rewrote" },
                cells.join(", ")
            );
        }
    }
    Ok(())
}

pub fn cmd_notebook_triggers() -> Result<()> {
    println!("Trigger table (first match wins, code cells only):");
    println!();
    for (i, trigger) in TRIGGERS.iter().enumerate() {
        println!("{}. {}", i + 1, trigger.category);
        for predicate in trigger.predicates {
            println!("     - {}", predicate.describe());
        }
    }
    Ok(())
}
