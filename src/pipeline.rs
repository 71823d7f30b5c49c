//! End-to-end run: load tables, render one extract per record, merge each
//! category, package the archive.
//!
//! Failure policy: table loads and archive packaging are fatal; a render
//! failure is scoped to its record, a merge failure only costs the merged
//! file of that category.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tokio::task;
use tracing::{info, warn};

use crate::{
    archive::{build_archive, Category, RenderedDocument},
    context::{collective_context, individual_context},
    docx,
    error::{EngineError, RenderError},
    progress::{Gauge, ProgressReporter},
    tables::{load_table, normalize_key, Table},
};

/// Yield back to the scheduler after this many records, so a long batch
/// does not starve an interactive host. Has no effect on ordering.
const YIELD_EVERY: usize = 50;

/// The six user-supplied files. Any of them may be missing; a missing table
/// is an empty table, a missing template skips its category.
#[derive(Debug, Clone, Default)]
pub struct InputSet {
    pub individual: Option<PathBuf>,
    pub collective: Option<PathBuf>,
    pub coords_individual: Option<PathBuf>,
    pub coords_collective: Option<PathBuf>,
    pub template_individual: Option<PathBuf>,
    pub template_collective: Option<PathBuf>,
}

/// One record that failed to render, identified by its key.
#[derive(Debug)]
pub struct RecordFailure {
    pub key: String,
    pub error: RenderError,
}

/// Outcome of one category: rendered documents in table order plus the
/// failures that were skipped over.
#[derive(Debug, Default)]
pub struct CategoryOutput {
    pub documents: Vec<RenderedDocument>,
    pub failures: Vec<RecordFailure>,
}

/// Run the whole pipeline and return the packaged archive bytes.
///
/// The terminal state always reaches the reporter: "completed" on success,
/// "failed: …" with the fatal error before the error propagates. A host
/// watching only the progress log never sees a silent partial run.
pub async fn run(
    inputs: &InputSet,
    reporter: &mut dyn ProgressReporter,
) -> Result<Vec<u8>, EngineError> {
    match run_inner(inputs, reporter).await {
        Ok(archive) => Ok(archive),
        Err(error) => {
            reporter.report(&format!("failed: {error}"));
            Err(error)
        }
    }
}

async fn run_inner(
    inputs: &InputSet,
    reporter: &mut dyn ProgressReporter,
) -> Result<Vec<u8>, EngineError> {
    let mut gauge = Gauge::new();
    reporter.report("starting extract generation");

    reporter.report("reading individual records");
    let individuals = load_table(inputs.individual.as_deref(), "individual records")?;
    gauge.advance(reporter, 5);

    reporter.report("reading collective records");
    let collectives = load_table(inputs.collective.as_deref(), "collective records")?;
    gauge.advance(reporter, 10);

    reporter.report("reading individual coordinates");
    let coords_pi = load_table(inputs.coords_individual.as_deref(), "PI coordinates")?;
    gauge.advance(reporter, 15);

    reporter.report("reading collective coordinates");
    let coords_pc = load_table(inputs.coords_collective.as_deref(), "PC coordinates")?;
    gauge.advance(reporter, 20);

    if !individuals.is_empty() {
        reporter.report(&format!(
            "individual columns: {}",
            column_preview(&individuals)
        ));
    }
    if !coords_pi.is_empty() {
        reporter.report(&format!("coordinate columns: {}", column_preview(&coords_pi)));
    }

    let template_individual = read_template(inputs.template_individual.as_deref(), "individual")?;
    let template_collective = read_template(inputs.template_collective.as_deref(), "collective")?;

    let individual_out = run_category(
        Category::Individual,
        &individuals,
        &coords_pi,
        template_individual.as_deref(),
        reporter,
    )
    .await;
    gauge.advance(reporter, 55);

    let collective_out = run_category(
        Category::Collective,
        &collectives,
        &coords_pc,
        template_collective.as_deref(),
        reporter,
    )
    .await;
    gauge.advance(reporter, 80);

    let merged_individual = merge_category(Category::Individual, &individual_out, reporter);
    let merged_collective = merge_category(Category::Collective, &collective_out, reporter);
    gauge.advance(reporter, 90);

    reporter.report("packaging archive");
    let archive = build_archive(&[
        (
            Category::Individual,
            &individual_out.documents,
            merged_individual.as_deref(),
        ),
        (
            Category::Collective,
            &collective_out.documents,
            merged_collective.as_deref(),
        ),
    ])?;

    gauge.finish(reporter);
    reporter.report("completed");
    Ok(archive)
}

fn column_preview(table: &Table) -> String {
    table
        .headers
        .iter()
        .take(5)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_template(path: Option<&Path>, label: &str) -> Result<Option<Vec<u8>>, EngineError> {
    match path {
        Some(path) => {
            let bytes = fs::read(path).map_err(|source| EngineError::Template {
                label: label.to_string(),
                source,
            })?;
            Ok(Some(bytes))
        }
        None => Ok(None),
    }
}

/// Process one category if it has both records and a template; otherwise it
/// contributes nothing without failing the run.
async fn run_category(
    category: Category,
    records: &Table,
    coords: &Table,
    template: Option<&[u8]>,
    reporter: &mut dyn ProgressReporter,
) -> CategoryOutput {
    if records.is_empty() {
        return CategoryOutput::default();
    }
    let Some(template) = template else {
        reporter.report(&format!(
            "no {} template supplied; skipping {} extracts",
            category.label(),
            category.label()
        ));
        return CategoryOutput::default();
    };

    reporter.report(&format!(
        "rendering {} {} extracts",
        records.len(),
        category.label()
    ));
    let out = process_category(category, records, coords, reporter, |context| {
        docx::render(template, context)
    })
    .await;
    reporter.report(&format!(
        "{} {} extracts rendered",
        out.documents.len(),
        category.label()
    ));
    out
}

/// Fold the category's records into (successes, failures). Processing is
/// sequential and deterministic, in table order; a failed record is logged
/// with its key and skipped.
pub async fn process_category<F>(
    category: Category,
    records: &Table,
    coords: &Table,
    reporter: &mut dyn ProgressReporter,
    render: F,
) -> CategoryOutput
where
    F: Fn(&Value) -> Result<Vec<u8>, RenderError>,
{
    let mut documents = Vec::new();
    let mut failures = Vec::new();

    for (index, row) in records.rows.iter().enumerate() {
        let key = normalize_key(row.field("nicad"));
        let context = match category {
            Category::Individual => individual_context(row, &key, coords),
            Category::Collective => collective_context(row, &key, coords),
        };

        match render(&context) {
            Ok(bytes) => documents.push(RenderedDocument {
                file_name: category.document_name(&key),
                bytes,
            }),
            Err(error) => {
                warn!(key = %key, %error, "record failed; continuing with the rest");
                reporter.report(&format!("  error on {key}: {error}"));
                failures.push(RecordFailure { key, error });
            }
        }

        let done = index + 1;
        if done % YIELD_EVERY == 0 {
            reporter.report(&format!("  ... {done} done"));
            task::yield_now().await;
        }
    }

    CategoryOutput { documents, failures }
}

/// Merge a category's successes. Non-fatal: on failure the merged file is
/// omitted and the per-record documents are kept.
fn merge_category(
    category: Category,
    output: &CategoryOutput,
    reporter: &mut dyn ProgressReporter,
) -> Option<Vec<u8>> {
    if output.documents.is_empty() {
        return None;
    }

    reporter.report(&format!(
        "merging {} {} extracts",
        output.documents.len(),
        category.label()
    ));
    let buffers: Vec<&[u8]> = output.documents.iter().map(|d| d.bytes.as_slice()).collect();
    match docx::merge::merge(&buffers) {
        Ok(bytes) => {
            info!(category = category.label(), "merged document created");
            reporter.report("merged document created");
            Some(bytes)
        }
        Err(error) => {
            warn!(category = category.label(), %error, "merge failed; keeping per-record documents");
            reporter.report(&format!("merge failed: {error}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryReporter;
    use crate::tables::Row;

    fn records(keys: &[&str]) -> Table {
        Table {
            headers: vec!["nicad".into()],
            rows: keys
                .iter()
                .map(|k| Row::from_pairs(&[("nicad", k)]))
                .collect(),
        }
    }

    #[tokio::test]
    async fn one_bad_record_does_not_stop_the_batch() {
        let table = records(&["12.0", "13", "14"]);
        let mut reporter = MemoryReporter::default();

        let out = process_category(
            Category::Individual,
            &table,
            &Table::default(),
            &mut reporter,
            |context| {
                if context["nicad"] == "13" {
                    Err(RenderError::MissingPart("word/document.xml"))
                } else {
                    Ok(vec![1, 2, 3])
                }
            },
        )
        .await;

        assert_eq!(out.documents.len(), 2);
        assert_eq!(out.documents[0].file_name, "Extrait_PI_12.docx");
        assert_eq!(out.documents[1].file_name, "Extrait_PI_14.docx");
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].key, "13");
        assert!(reporter
            .messages
            .iter()
            .any(|m| m.contains("error on 13")));
    }

    #[tokio::test]
    async fn records_render_in_table_order() {
        let table = records(&["3", "1", "2"]);
        let mut reporter = MemoryReporter::default();
        let out = process_category(
            Category::Collective,
            &table,
            &Table::default(),
            &mut reporter,
            |_| Ok(Vec::new()),
        )
        .await;
        let names: Vec<_> = out.documents.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(
            names,
            ["Extrait_PC_3.docx", "Extrait_PC_1.docx", "Extrait_PC_2.docx"]
        );
    }

    #[tokio::test]
    async fn progress_message_every_fifty_records() {
        let keys: Vec<String> = (0..120).map(|i| i.to_string()).collect();
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let table = records(&key_refs);
        let mut reporter = MemoryReporter::default();
        process_category(
            Category::Individual,
            &table,
            &Table::default(),
            &mut reporter,
            |_| Ok(Vec::new()),
        )
        .await;
        assert!(reporter.messages.iter().any(|m| m.contains("... 50 done")));
        assert!(reporter.messages.iter().any(|m| m.contains("... 100 done")));
        assert!(!reporter.messages.iter().any(|m| m.contains("... 120 done")));
    }
}
