//! On-disk layout of the index: a vector file and a metadata file that are
//! always read and written as a pair.
//!
//! Both files carry the same `generation`, bumped on every save. A save
//! stages both new files first, then moves the current pair aside as
//! `<file>.prev` while renaming the new files into place. `load` prefers the
//! current pair and falls back to the newest consistent pair, so a save that
//! fails or crashes halfway leaves the previous generation readable.

use std::fs;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::flat::FlatIndex;
use crate::error::VectorStoreError;
use crate::models::{Chunk, DocumentRef, IndexConfig, IndexedVector, ScoredChunk};
use crate::utils::l2_normalized;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct VectorFile {
    format_version: u32,
    generation: u64,
    dimension: u32,
    count: u64,
    data: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
    generation: u64,
    records: Vec<IndexedVector>,
}

#[derive(Deserialize)]
struct VectorHeader {
    _format_version: u32,
    generation: u64,
}

#[derive(Deserialize)]
struct MetadataHeader {
    generation: u64,
}

#[derive(Serialize)]
struct MetadataFileRef<'a> {
    generation: u64,
    records: &'a [IndexedVector],
}

/// Locations of the two persisted artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFiles {
    vectors_path: PathBuf,
    metadata_path: PathBuf,
}

impl IndexFiles {
    pub fn new(vectors_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>) -> Self {
        Self {
            vectors_path: vectors_path.into(),
            metadata_path: metadata_path.into(),
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.vectors_path(), config.metadata_path())
    }

    pub fn vectors_path(&self) -> &Path {
        &self.vectors_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    pub fn exists(&self) -> bool {
        [
            self.vectors_path.as_path(),
            self.metadata_path.as_path(),
            previous(&self.vectors_path).as_path(),
            previous(&self.metadata_path).as_path(),
        ]
        .iter()
        .any(|path| path.exists())
    }

    /// Read the newest consistent pair of files, or return an empty snapshot
    /// of `dimension` when no index was ever written.
    pub fn load(&self, dimension: usize) -> Result<Snapshot, VectorStoreError> {
        if !self.exists() {
            return Ok(Snapshot::empty(dimension));
        }

        let err = match load_pair(&self.vectors_path, &self.metadata_path) {
            Ok(snapshot) => return Ok(snapshot),
            Err(err) => err,
        };

        let prev_vectors = previous(&self.vectors_path);
        let prev_metadata = previous(&self.metadata_path);
        let recovered = [
            (prev_vectors.as_path(), self.metadata_path.as_path()),
            (prev_vectors.as_path(), prev_metadata.as_path()),
        ]
        .into_iter()
        .filter_map(|(vectors, metadata)| load_pair(vectors, metadata).ok())
        .max_by_key(|snapshot| snapshot.generation);

        match recovered {
            Some(snapshot) => {
                tracing::warn!(
                    error = %err,
                    generation = snapshot.generation,
                    "index files out of step, loaded previous generation"
                );
                Ok(snapshot)
            }
            None => Err(err),
        }
    }

    /// Persist `snapshot` under the next generation number.
    pub fn save(&self, snapshot: &mut Snapshot) -> Result<(), VectorStoreError> {
        let generation = snapshot.generation + 1;

        let vectors = VectorFile {
            format_version: FORMAT_VERSION,
            generation,
            dimension: snapshot.index.dimension() as u32,
            count: snapshot.index.len() as u64,
            data: snapshot.index.to_raw(),
        };
        let vector_bytes = bincode::serde::encode_to_vec(&vectors, bincode::config::standard())
            .map_err(|e| VectorStoreError::Encode(e.to_string()))?;

        let metadata_bytes = serde_json::to_vec(&MetadataFileRef {
            generation,
            records: &snapshot.records,
        })
        .map_err(|e| VectorStoreError::Encode(e.to_string()))?;

        // Nothing on disk changes until both files are staged.
        let staged_vectors = stage(&self.vectors_path, &vector_bytes)?;
        let staged_metadata = stage(&self.metadata_path, &metadata_bytes)?;

        set_aside(&self.vectors_path, snapshot.generation, vector_generation)?;
        install(staged_vectors, &self.vectors_path)?;
        set_aside(&self.metadata_path, snapshot.generation, metadata_generation)?;
        install(staged_metadata, &self.metadata_path)?;

        sync_dir(&self.vectors_path)?;
        sync_dir(&self.metadata_path)?;

        snapshot.generation = generation;
        Ok(())
    }
}

fn load_pair(vectors_path: &Path, metadata_path: &Path) -> Result<Snapshot, VectorStoreError> {
    match (vectors_path.exists(), metadata_path.exists()) {
        (_, false) => {
            return Err(VectorStoreError::CorruptIndex(format!(
                "metadata file missing: {}",
                metadata_path.display()
            )));
        }
        (false, true) => {
            return Err(VectorStoreError::CorruptIndex(format!(
                "vector file missing: {}",
                vectors_path.display()
            )));
        }
        (true, true) => {}
    }

    let vector_bytes = read_file(vectors_path)?;
    let (vectors, _): (VectorFile, usize) =
        bincode::serde::decode_from_slice(&vector_bytes, bincode::config::standard()).map_err(
            |e| {
                VectorStoreError::CorruptIndex(format!(
                    "cannot decode {}: {}",
                    vectors_path.display(),
                    e
                ))
            },
        )?;

    let metadata_bytes = read_file(metadata_path)?;
    let metadata: MetadataFile = serde_json::from_slice(&metadata_bytes).map_err(|e| {
        VectorStoreError::CorruptIndex(format!(
            "cannot decode {}: {}",
            metadata_path.display(),
            e
        ))
    })?;

    if vectors.format_version != FORMAT_VERSION {
        return Err(VectorStoreError::CorruptIndex(format!(
            "unsupported vector file version {}",
            vectors.format_version
        )));
    }
    if vectors.count != metadata.records.len() as u64 {
        return Err(VectorStoreError::CorruptIndex(format!(
            "vector count {} does not match metadata count {}",
            vectors.count,
            metadata.records.len()
        )));
    }
    if vectors.generation != metadata.generation {
        return Err(VectorStoreError::CorruptIndex(format!(
            "vector generation {} does not match metadata generation {}",
            vectors.generation, metadata.generation
        )));
    }

    let dimension = vectors.dimension as usize;
    let expected_len = vectors.count as usize * dimension;
    if vectors.data.len() != expected_len {
        return Err(VectorStoreError::CorruptIndex(format!(
            "vector data holds {} values, expected {}",
            vectors.data.len(),
            expected_len
        )));
    }

    Ok(Snapshot {
        index: FlatIndex::from_raw(dimension, vectors.data)?,
        records: metadata.records,
        generation: vectors.generation,
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>, VectorStoreError> {
    fs::read(path).map_err(|e| {
        VectorStoreError::CorruptIndex(format!("cannot read {}: {}", path.display(), e))
    })
}

fn previous(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".prev");
    PathBuf::from(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn vector_generation(path: &Path) -> Option<u64> {
    let mut prefix = Vec::with_capacity(32);
    fs::File::open(path).ok()?.take(32).read_to_end(&mut prefix).ok()?;
    bincode::serde::decode_from_slice::<VectorHeader, _>(&prefix, bincode::config::standard())
        .ok()
        .map(|(header, _)| header.generation)
}

fn metadata_generation(path: &Path) -> Option<u64> {
    let file = fs::File::open(path).ok()?;
    serde_json::from_reader::<_, MetadataHeader>(BufReader::new(file))
        .ok()
        .map(|header| header.generation)
}

/// Write `bytes` to a synced temp file next to `path`.
fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile, VectorStoreError> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Move the current file to `<path>.prev` if it holds `generation`. A file
/// from any other generation is left over from an interrupted save and is
/// dropped so it cannot replace the good `.prev` copy.
fn set_aside(
    path: &Path,
    generation: u64,
    read_generation: fn(&Path) -> Option<u64>,
) -> Result<(), VectorStoreError> {
    if !path.exists() {
        return Ok(());
    }
    if read_generation(path) == Some(generation) {
        fs::rename(path, previous(path))?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

fn install(staged: NamedTempFile, path: &Path) -> Result<(), VectorStoreError> {
    staged.persist(path).map_err(|e| VectorStoreError::Io(e.error))?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<(), VectorStoreError> {
    fs::File::open(parent_dir(path))?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> Result<(), VectorStoreError> {
    Ok(())
}

/// In-memory copy of the whole index: vectors and their metadata in lockstep.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub index: FlatIndex,
    pub records: Vec<IndexedVector>,
    pub generation: u64,
}

impl Snapshot {
    pub fn empty(dimension: usize) -> Self {
        Self {
            index: FlatIndex::new(dimension),
            records: Vec::new(),
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append one document's chunks and their unit-normalized vectors.
    /// Either both the vectors and the records are added, or neither is.
    pub fn append(
        &mut self,
        document: &DocumentRef,
        chunks: &[Chunk],
        vectors: &Array2<f32>,
    ) -> Result<usize, VectorStoreError> {
        if chunks.len() != vectors.nrows() {
            return Err(VectorStoreError::InvalidInput(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.nrows()
            )));
        }

        self.index.add(vectors.view())?;
        self.records.extend(
            chunks
                .iter()
                .enumerate()
                .map(|(i, chunk)| IndexedVector::new(document, chunk, i as u32)),
        );
        Ok(chunks.len())
    }

    /// Drop every entry matching `predicate`; returns how many were dropped.
    pub fn remove_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&IndexedVector) -> bool,
    {
        let keep: Vec<bool> = self.records.iter().map(|r| !predicate(r)).collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }
        self.index.retain(&keep);
        self.records.retain(|r| !predicate(r));
        removed
    }

    /// Normalize `query` and return its `top_k` nearest neighbors, best first.
    /// An empty snapshot has no neighbors for a query of any dimension.
    pub fn nearest(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.index.dimension() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: query.len(),
            });
        }
        let query = Array1::from(l2_normalized(query));
        Ok(self.search(query.view(), top_k))
    }

    /// Nearest neighbors of a unit-length query, best first.
    pub fn search(&self, query: ArrayView1<'_, f32>, top_k: usize) -> Vec<ScoredChunk> {
        self.index
            .search(query, top_k)
            .into_iter()
            .filter_map(|(row, score)| {
                self.records.get(row).map(|record| ScoredChunk {
                    record: record.clone(),
                    score,
                })
            })
            .collect()
    }
}
