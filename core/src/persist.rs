use crate::index::InvertedIndex;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    pub num_terms: usize,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn describe(index: &InvertedIndex) -> Self {
        Self {
            num_docs: index.num_docs(),
            num_terms: index.num_terms(),
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: SNAPSHOT_VERSION,
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn snapshot(&self) -> PathBuf { self.root.join("index.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// True when both the snapshot and its metadata file are present.
pub fn index_exists(paths: &IndexPaths) -> bool {
    paths.snapshot().is_file() && paths.meta().is_file()
}

pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    create_dir_all(&paths.root)
        .with_context(|| format!("creating index directory {}", paths.root.display()))?;
    let file = File::create(paths.snapshot())
        .with_context(|| format!("creating {}", paths.snapshot().display()))?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, index).context("serializing index snapshot")?;
    writer.flush()?;

    let meta = MetaFile::describe(index);
    save_meta(paths, &meta)?;
    tracing::info!(
        root = %paths.root.display(),
        num_docs = meta.num_docs,
        num_terms = meta.num_terms,
        "index saved"
    );
    Ok(())
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let meta = load_meta(paths)?;
    if meta.version != SNAPSHOT_VERSION {
        bail!(
            "unsupported index snapshot version {} (expected {SNAPSHOT_VERSION})",
            meta.version
        );
    }
    let file = File::open(paths.snapshot())
        .with_context(|| format!("opening {}", paths.snapshot().display()))?;
    let index: InvertedIndex = bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("decoding {}", paths.snapshot().display()))?;
    tracing::info!(root = %paths.root.display(), num_docs = index.num_docs(), "index loaded");
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())
        .with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)
        .with_context(|| format!("parsing {}", paths.meta().display()))?;
    Ok(meta)
}
