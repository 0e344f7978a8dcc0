//! Exact nearest-neighbour search by linear scan.
//!
//! File format (little-endian):
//! - Magic: "QBIDX001" (8 bytes)
//! - Dimension: u32
//! - Count: u64
//! - Body, `Count` times:
//!   - EntryId: u64
//!   - Vector: [f32; Dimension]

use super::{AnnIndex, EntryId};
use qabase_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

const MAGIC: &[u8; 8] = b"QBIDX001";

/// Flat L2 index. Every search scans all stored vectors.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dimension: usize,
    vectors: BTreeMap<EntryId, Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: BTreeMap::new(),
        }
    }

    /// Read an index written by [`AnnIndex::save`].
    ///
    /// # Errors
    /// * `AppError::Persistence` - If the file is missing, truncated or not an index file
    pub fn load(path: &Path) -> AppResult<Self> {
        let file = File::open(path).map_err(|e| {
            AppError::Persistence(format!("Failed to open index file {:?}: {}", path, e))
        })?;
        let mut reader = BufReader::new(file);

        let index = Self::read_from(&mut reader).map_err(|e| {
            AppError::Persistence(format!("Failed to read index file {:?}: {}", path, e))
        })?;

        debug!(
            "Loaded flat index from {:?}: {} vectors, dimension {}",
            path,
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid index magic",
            ));
        }

        let mut buf_u32 = [0u8; 4];
        let mut buf_u64 = [0u8; 8];

        reader.read_exact(&mut buf_u32)?;
        let dimension = u32::from_le_bytes(buf_u32) as usize;

        reader.read_exact(&mut buf_u64)?;
        let count = u64::from_le_bytes(buf_u64);

        let mut vectors = BTreeMap::new();
        for _ in 0..count {
            reader.read_exact(&mut buf_u64)?;
            let id = u64::from_le_bytes(buf_u64);

            let mut vector = Vec::with_capacity(dimension);
            for _ in 0..dimension {
                reader.read_exact(&mut buf_u32)?;
                vector.push(f32::from_le_bytes(buf_u32));
            }
            vectors.insert(id, vector);
        }

        // Anything after the last entry means the header lied about the count
        if reader.read(&mut buf_u32)? != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Trailing bytes after last entry",
            ));
        }

        Ok(Self { dimension, vectors })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.vectors.len() as u64).to_le_bytes())?;

        for (id, vector) in &self.vectors {
            writer.write_all(&id.to_le_bytes())?;
            for value in vector {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        writer.flush()
    }

    fn check_dimension(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.dimension {
            return Err(AppError::Embedding(format!(
                "Vector dimension mismatch: index expects {}, got {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(())
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

impl AnnIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn insert(&mut self, id: EntryId, vector: Vec<f32>) -> AppResult<()> {
        self.check_dimension(&vector)?;
        self.vectors.insert(id, vector);
        Ok(())
    }

    fn remove(&mut self, id: EntryId) -> bool {
        self.vectors.remove(&id).is_some()
    }

    fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(EntryId, f32)>> {
        self.check_dimension(query)?;

        let mut scored: Vec<(EntryId, f32)> = self
            .vectors
            .iter()
            .map(|(id, vector)| (*id, euclidean_distance(query, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    fn ids(&self) -> Vec<EntryId> {
        self.vectors.keys().copied().collect()
    }

    fn save(&self, path: &Path) -> AppResult<()> {
        let file = File::create(path).map_err(|e| {
            AppError::Persistence(format!("Failed to create index file {:?}: {}", path, e))
        })?;
        let mut writer = BufWriter::new(file);

        self.write_to(&mut writer).map_err(|e| {
            AppError::Persistence(format!("Failed to write index file {:?}: {}", path, e))
        })?;

        debug!("Saved {} vectors to {:?}", self.vectors.len(), path);
        Ok(())
    }
}
