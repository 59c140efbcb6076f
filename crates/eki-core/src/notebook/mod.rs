//! Notebook repair
//!
//! Scans the code cells of a Jupyter notebook and replaces whole cells that
//! match a known-broken pattern with a canonical template (see
//! [`triggers::TRIGGERS`]). A separate pass rewrites `AI.GENERATE*` model
//! arguments in place.
//!
//! Documents are read fully, patched in memory, and only written back when
//! something changed. Writes go through a temp file in the same directory
//! and a rename, so a failure never leaves a half-written notebook.

pub mod templates;
pub mod triggers;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub use templates::{template_for, template_lines};
pub use triggers::{match_trigger, rewrite_model_references, TriggerCategory, TRIGGERS};

/// A cell replaced by the patcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchedCell {
    pub index: usize,
    pub category: TriggerCategory,
}

/// Outcome of patching one notebook file
#[derive(Debug, Clone, Serialize)]
pub struct PatchReport {
    pub path: PathBuf,
    pub modified: Vec<PatchedCell>,
    /// False for dry runs and for documents with nothing to change
    pub written: bool,
}

impl PatchReport {
    pub fn modified_count(&self) -> usize {
        self.modified.len()
    }
}

/// Outcome of rewriting model references in one notebook file
#[derive(Debug, Clone, Serialize)]
pub struct RewriteReport {
    pub path: PathBuf,
    pub modified_cells: Vec<usize>,
    pub written: bool,
}

/// Joined source text of a cell (`source` may be a string or a list of lines)
pub fn cell_source(cell: &Value) -> Option<String> {
    match cell.get("source")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(lines) => Some(lines.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

fn is_code_cell(cell: &Value) -> bool {
    cell.get("cell_type").and_then(Value::as_str) == Some("code")
}

/// Replace `source` with the list-of-lines form of `text`
fn set_source(cell: &mut Value, text: &str) {
    if let Some(obj) = cell.as_object_mut() {
        let lines = text
            .split_inclusive('\n')
            .map(|l| Value::String(l.to_string()))
            .collect();
        obj.insert("source".to_string(), Value::Array(lines));
    }
}

/// Apply the trigger table to a cell sequence
///
/// Cells already holding their template are left alone and not reported.
pub fn patch_cells(cells: &mut [Value]) -> Vec<PatchedCell> {
    let mut modified = Vec::new();
    for (index, cell) in cells.iter_mut().enumerate() {
        if !is_code_cell(cell) {
            continue;
        }
        let Some(source) = cell_source(cell) else {
            continue;
        };
        let Some(category) = match_trigger(&source) else {
            continue;
        };

        let template = template_for(category);
        if source == template {
            debug!(cell = index, %category, "Cell already holds template");
            continue;
        }

        info!(cell = index, %category, "Replacing notebook cell");
        set_source(cell, template);
        modified.push(PatchedCell { index, category });
    }
    modified
}

fn cells_mut(doc: &mut Value) -> Result<&mut Vec<Value>> {
    doc.get_mut("cells")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| Error::NotebookParse("document has no 'cells' array".into()))
}

/// Apply the trigger table to a parsed notebook document
pub fn patch_document(doc: &mut Value) -> Result<Vec<PatchedCell>> {
    Ok(patch_cells(cells_mut(doc)?))
}

/// Rewrite model references in every code cell, returning changed indices
pub fn rewrite_document_models(doc: &mut Value) -> Result<Vec<usize>> {
    let mut changed = Vec::new();
    for (index, cell) in cells_mut(doc)?.iter_mut().enumerate() {
        if !is_code_cell(cell) {
            continue;
        }
        let Some(source) = cell_source(cell) else {
            continue;
        };
        let rewritten = rewrite_model_references(&source)?;
        if rewritten != source {
            let rewritten = rewritten.into_owned();
            info!(cell = index, "Rewrote model references");
            set_source(cell, &rewritten);
            changed.push(index);
        }
    }
    Ok(changed)
}

/// Parse a notebook from text
pub fn parse_notebook(content: &str) -> Result<Value> {
    let doc: Value =
        serde_json::from_str(content).map_err(|e| Error::NotebookParse(e.to_string()))?;
    if !doc.get("cells").is_some_and(Value::is_array) {
        return Err(Error::NotebookParse("document has no 'cells' array".into()));
    }
    Ok(doc)
}

/// Serialize with one-space indentation, the layout notebooks are saved in
pub fn to_notebook_string(doc: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut serializer)?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| Error::NotebookParse(e.to_string()))
}

/// Replace `path` with `content` via a temp file in the same directory
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn read_notebook(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    parse_notebook(&content).map_err(|e| match e {
        Error::NotebookParse(msg) => Error::NotebookParse(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Patch a notebook file in place
///
/// With `dry_run` the report lists what would change but nothing is written.
pub fn patch_file(path: &Path, dry_run: bool) -> Result<PatchReport> {
    let mut doc = read_notebook(path)?;
    let modified = patch_document(&mut doc)?;

    let written = !dry_run && !modified.is_empty();
    if written {
        write_atomic(path, &to_notebook_string(&doc)?)?;
    }
    info!(
        path = %path.display(),
        modified = modified.len(),
        written,
        "Patched notebook"
    );

    Ok(PatchReport {
        path: path.to_path_buf(),
        modified,
        written,
    })
}

/// Rewrite `AI.GENERATE*` model references in a notebook file in place
pub fn rewrite_models_file(path: &Path, dry_run: bool) -> Result<RewriteReport> {
    let mut doc = read_notebook(path)?;
    let modified_cells = rewrite_document_models(&mut doc)?;

    let written = !dry_run && !modified_cells.is_empty();
    if written {
        write_atomic(path, &to_notebook_string(&doc)?)?;
    }

    Ok(RewriteReport {
        path: path.to_path_buf(),
        modified_cells,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn notebook(cells: Vec<Value>) -> Value {
        json!({
            "cells": cells,
            "metadata": {"kernelspec": {"name": "python3"}},
            "nbformat": 4,
            "nbformat_minor": 5
        })
    }

    fn code(source: Value) -> Value {
        json!({"cell_type": "code", "metadata": {}, "outputs": [], "source": source})
    }

    fn markdown(text: &str) -> Value {
        json!({"cell_type": "markdown", "metadata": {}, "source": [text]})
    }

    #[test]
    fn test_untriggered_document_is_unchanged() {
        let original = notebook(vec![
            markdown("# Title\n"),
            code(json!(["x = 1\n", "print(x)"])),
            code(json!("y = 2")),
        ]);
        let mut doc = original.clone();

        let modified = patch_document(&mut doc).unwrap();
        assert!(modified.is_empty());
        assert_eq!(doc, original);
    }

    #[test]
    fn test_triggered_cell_gets_exact_template() {
        let untouched = code(json!(["print('keep me')\n"]));
        let mut doc = notebook(vec![
            untouched.clone(),
            code(json!(["client = bigquery.Client()\n", "df = None"])),
            markdown("client = bigquery.Client()"),
        ]);

        let modified = patch_document(&mut doc).unwrap();
        assert_eq!(
            modified,
            vec![PatchedCell {
                index: 1,
                category: TriggerCategory::CredentialSetup
            }]
        );
        assert_eq!(
            cell_source(&doc["cells"][1]).unwrap(),
            template_for(TriggerCategory::CredentialSetup)
        );
        assert_eq!(doc["cells"][0], untouched);
        // Markdown cells are never patched
        assert_eq!(doc["cells"][2], markdown("client = bigquery.Client()"));
    }

    #[test]
    fn test_string_source_is_written_as_list() {
        let mut doc = notebook(vec![code(json!("def analyze_content_patterns():\n    pass"))]);
        patch_document(&mut doc).unwrap();

        let expected: Vec<Value> = template_lines(TriggerCategory::ContentAnalysis)
            .into_iter()
            .map(Value::String)
            .collect();
        assert_eq!(doc["cells"][0]["source"].as_array().unwrap(), &expected);
    }

    #[test]
    fn test_first_matching_trigger_wins() {
        let mut doc = notebook(vec![code(json!([
            "import pandas as pd\n",
            "q = 'SELECT AI.GENERATE(MODEL `x`, p)'"
        ]))]);
        let modified = patch_document(&mut doc).unwrap();
        assert_eq!(modified[0].category, TriggerCategory::CredentialSetup);
    }

    #[test]
    fn test_public_dataset_migration_is_stable() {
        let mut doc = notebook(vec![
            code(json!([
                "import pandas as pd\n",
                "client = bigquery.Client()\n",
                "dataset_id = 'enterprise_knowledge_ai'\n"
            ])),
            code(json!("results_df = client.query(demo_query).to_dataframe()")),
        ]);

        let modified = patch_document(&mut doc).unwrap();
        assert_eq!(
            modified,
            vec![
                PatchedCell {
                    index: 0,
                    category: TriggerCategory::PublicDatasetSetup
                },
                PatchedCell {
                    index: 1,
                    category: TriggerCategory::DemoAnalysis
                },
            ]
        );
        assert_eq!(
            cell_source(&doc["cells"][1]).unwrap(),
            template_for(TriggerCategory::DemoAnalysis)
        );

        // Replaced cells do not trigger again
        assert!(patch_document(&mut doc).unwrap().is_empty());
    }

    #[test]
    fn test_missing_cells_is_parse_error() {
        let mut doc = json!({"metadata": {}});
        assert!(matches!(
            patch_document(&mut doc),
            Err(Error::NotebookParse(_))
        ));
        assert!(matches!(
            parse_notebook("[1, 2, 3]"),
            Err(Error::NotebookParse(_))
        ));
    }

    #[test]
    fn test_patch_file_and_rerun_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demo.ipynb");
        let doc = notebook(vec![
            code(json!(["CREATE OR REPLACE TABLE `p.d.enterprise_documents`\n"])),
            code(json!(["x = 1"])),
        ]);
        fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

        let report = patch_file(&path, false).unwrap();
        assert_eq!(report.modified_count(), 1);
        assert!(report.written);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("{\n \"cells\": [\n  {"));
        let reread: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(
            cell_source(&reread["cells"][0]).unwrap(),
            template_for(TriggerCategory::SampleDataCreation)
        );
        assert_eq!(reread["cells"][1], doc["cells"][1]);
        assert_eq!(reread["nbformat"], 4);

        let second = patch_file(&path, false).unwrap();
        assert_eq!(second.modified_count(), 0);
        assert!(!second.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), written);
    }

    #[test]
    fn test_dry_run_does_not_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demo.ipynb");
        let original =
            serde_json::to_string(&notebook(vec![code(json!(["import pandas as pd\n"]))])).unwrap();
        fs::write(&path, &original).unwrap();

        let report = patch_file(&path, true).unwrap();
        assert_eq!(report.modified_count(), 1);
        assert!(!report.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_invalid_json_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.ipynb");
        fs::write(&path, "{\"cells\": [").unwrap();

        let result = patch_file(&path, false);
        assert!(matches!(result, Err(Error::NotebookParse(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"cells\": [");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_rewrite_models_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models.ipynb");
        let doc = notebook(vec![
            code(json!(["SELECT AI.GENERATE_BOOL(\n", "  MODEL `p.d.gemini`, prompt)"])),
            markdown("AI.GENERATE(MODEL `p.d.gemini`"),
        ]);
        fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

        let report = rewrite_models_file(&path, false).unwrap();
        assert_eq!(report.modified_cells, vec![0]);

        let reread: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            cell_source(&reread["cells"][0]).unwrap(),
            "SELECT AI.GENERATE_BOOL(p.d.gemini, prompt)"
        );
        assert_eq!(reread["cells"][1], doc["cells"][1]);
    }

    #[test]
    fn test_key_order_preserved() {
        let doc: Value =
            serde_json::from_str(r#"{"nbformat": 4, "cells": [], "metadata": {}}"#).unwrap();
        let out = to_notebook_string(&doc).unwrap();
        assert_eq!(out, "{\n \"nbformat\": 4,\n \"cells\": [],\n \"metadata\": {}\n}\n");
    }
}
