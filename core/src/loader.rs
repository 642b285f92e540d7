//! Source table ingestion: CSV, JSON and JSONL files, or a directory of them.
//!
//! Rows are read into [`RawRecord`] (every column optional) and converted once into
//! [`Document`] with dense ids in overall row order.

use crate::{DocId, Document};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One source row. The body column is `texto_pdf` in newer exports and `texto` in older ones.
#[derive(Debug, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub titulo: Option<String>,
    #[serde(default)]
    pub texto: Option<String>,
    #[serde(default)]
    pub texto_pdf: Option<String>,
    #[serde(default)]
    pub data_publicacao: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

impl RawRecord {
    pub fn into_document(self, id: DocId) -> Document {
        let body = non_empty(self.texto_pdf).or(non_empty(self.texto)).unwrap_or_default();
        Document {
            id,
            title: self.titulo.unwrap_or_default(),
            body,
            publication_date: self.data_publicacao.unwrap_or_default(),
            link: self.link.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
    Jsonl,
}

fn format_of(path: &Path) -> Option<Format> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("csv") => Some(Format::Csv),
        Some("json") => Some(Format::Json),
        Some("jsonl") => Some(Format::Jsonl),
        _ => None,
    }
}

/// Load every document under `input`, a single file or a directory walked in path order.
pub fn load_documents<P: AsRef<Path>>(input: P) -> Result<Vec<Document>> {
    let input = input.as_ref();
    let files = source_files(input)?;
    let mut records = Vec::new();
    for file in &files {
        let before = records.len();
        read_records(file, &mut records)?;
        tracing::debug!(file = %file.display(), rows = records.len() - before, "read source file");
    }
    let docs: Vec<Document> = records
        .into_iter()
        .enumerate()
        .map(|(i, rec)| rec.into_document(i as DocId))
        .collect();
    tracing::info!(
        input = %input.display(),
        files = files.len(),
        num_docs = docs.len(),
        "loaded documents"
    );
    Ok(docs)
}

fn source_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        anyhow::bail!("input not found: {}", input.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input) {
        let entry = entry.with_context(|| format!("walking {}", input.display()))?;
        let path = entry.into_path();
        if path.is_file() && format_of(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_records(file: &Path, out: &mut Vec<RawRecord>) -> Result<()> {
    match format_of(file) {
        Some(Format::Csv) => read_csv(file, out),
        Some(Format::Jsonl) => read_jsonl(file, out),
        // Single files with an unknown extension are treated as JSON.
        Some(Format::Json) | None => read_json(file, out),
    }
}

fn read_csv(file: &Path, out: &mut Vec<RawRecord>) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(file)
        .with_context(|| format!("opening {}", file.display()))?;
    for (row, record) in reader.deserialize::<RawRecord>().enumerate() {
        let record = record.with_context(|| format!("{}: row {}", file.display(), row + 1))?;
        out.push(record);
    }
    Ok(())
}

fn read_jsonl(file: &Path, out: &mut Vec<RawRecord>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    for (lineno, line) in BufReader::new(f).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: RawRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}: line {}", file.display(), lineno + 1))?;
        out.push(record);
    }
    Ok(())
}

fn read_json(file: &Path, out: &mut Vec<RawRecord>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let json: serde_json::Value = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing {}", file.display()))?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        serde_json::Value::Object(_) => vec![json],
        _ => anyhow::bail!("{}: expected a JSON array or object", file.display()),
    };
    for (i, value) in values.into_iter().enumerate() {
        let record = serde_json::from_value(value)
            .with_context(|| format!("{}: bad record {}", file.display(), i + 1))?;
        out.push(record);
    }
    Ok(())
}
