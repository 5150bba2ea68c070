// bitwig-mcp
// Copyright (C) 2024  The bitwig-mcp authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Semantic lookup of Bitwig devices.
//!
//! The bridge only defines the boundary: records carry a precomputed embedding, and an index
//! ranks them against a query embedding. How embeddings are produced and where an index persists
//! its data belong to the implementation. [`MemoryIndex`] keeps everything in memory.

use crate::error::{Error, Result};
use serde::Serialize;
use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

/// A metadata value. Lists hold tags and similar multi-valued fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for MetadataValue {
    fn from(text: &str) -> MetadataValue {
        MetadataValue::Text(text.to_owned())
    }
}

impl From<String> for MetadataValue {
    fn from(text: String) -> MetadataValue {
        MetadataValue::Text(text)
    }
}

impl From<Vec<&str>> for MetadataValue {
    fn from(items: Vec<&str>) -> MetadataValue {
        MetadataValue::List(items.into_iter().map(str::to_owned).collect())
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// One indexed device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    /// Usually `name`, `type`, `category`, `creator` and `tags`.
    pub metadata: Metadata,
    /// The text the embedding was computed from.
    pub document: String,
}

/// Restricts a search to records whose metadata matches every pair.
///
/// A text value must be equal to the filter value; a list value must contain it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter(BTreeMap<String, String>);

impl MetadataFilter {
    pub fn new() -> MetadataFilter {
        MetadataFilter::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> MetadataFilter {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0.iter().all(|(key, expected)| match metadata.get(key) {
            Some(MetadataValue::Text(value)) => value == expected,
            Some(MetadataValue::List(items)) => items.contains(expected),
            None => false,
        })
    }
}

/// A search result. Lower distances are closer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub metadata: Metadata,
    pub document: String,
    pub distance: f32,
}

/// A store of device embeddings that can be searched by similarity.
pub trait VectorIndex {
    /// Adds a record, replacing any record with the same id.
    fn insert(&mut self, record: DeviceRecord) -> Result<()>;

    /// Returns up to `n_results` records closest to `query`, closest first.
    fn search(
        &self,
        query: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>>;

    fn count(&self) -> usize;
}

/// Distinct metadata values across an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub count: usize,
    pub categories: Vec<String>,
    pub types: Vec<String>,
    pub creators: Vec<String>,
}

/// A [`VectorIndex`] ranking by cosine distance over records held in memory.
///
/// Every embedding must have the dimension of the first one inserted.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    dimension: Option<usize>,
    records: Vec<DeviceRecord>,
}

impl MemoryIndex {
    pub fn new() -> MemoryIndex {
        MemoryIndex::default()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn stats(&self) -> IndexStats {
        let distinct = |key: &str| -> Vec<String> {
            let values: BTreeSet<&String> = self
                .records
                .iter()
                .filter_map(|record| match record.metadata.get(key) {
                    Some(MetadataValue::Text(value)) if !value.is_empty() => Some(value),
                    _ => None,
                })
                .collect();
            values.into_iter().cloned().collect()
        };

        IndexStats {
            count: self.records.len(),
            categories: distinct("category"),
            types: distinct("type"),
            creators: distinct("creator"),
        }
    }

    fn check_dimension(&self, name: &str, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Err(Error::invalid_parameter(name, "[]", "must not be empty"));
        }
        match self.dimension {
            Some(dimension) if dimension != embedding.len() => Err(Error::invalid_parameter(
                name,
                format!("{} dimensions", embedding.len()),
                format!("must have {} dimensions", dimension),
            )),
            _ => Ok(()),
        }
    }
}

impl VectorIndex for MemoryIndex {
    fn insert(&mut self, record: DeviceRecord) -> Result<()> {
        self.check_dimension("embedding", &record.embedding)?;
        self.dimension = Some(record.embedding.len());

        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        self.check_dimension("query", query)?;

        let mut hits: Vec<SearchHit> = self
            .records
            .iter()
            .filter(|record| filter.map_or(true, |filter| filter.matches(&record.metadata)))
            .map(|record| SearchHit {
                id: record.id.clone(),
                metadata: record.metadata.clone(),
                document: record.document.clone(),
                distance: cosine_distance(query, &record.embedding),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        hits.truncate(n_results);
        Ok(hits)
    }

    fn count(&self) -> usize {
        self.records.len()
    }
}

/// `1 - cos(a, b)`. A zero vector is treated as orthogonal to everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>, category: &str, tags: Vec<&str>) -> DeviceRecord {
        let mut metadata = Metadata::new();
        metadata.insert("name".to_owned(), id.into());
        metadata.insert("category".to_owned(), category.into());
        metadata.insert("type".to_owned(), "Audio FX".into());
        metadata.insert("creator".to_owned(), "Bitwig".into());
        metadata.insert("tags".to_owned(), tags.into());
        DeviceRecord {
            id: id.to_owned(),
            embedding,
            metadata,
            document: format!("{} device", id),
        }
    }

    fn index() -> MemoryIndex {
        let mut index = MemoryIndex::new();
        index
            .insert(record("EQ+", vec![1.0, 0.0, 0.0], "EQ", vec!["mixing"]))
            .unwrap();
        index
            .insert(record("Compressor", vec![0.0, 1.0, 0.0], "Dynamics", vec!["mixing", "punch"]))
            .unwrap();
        index
            .insert(record("Filter+", vec![0.7, 0.7, 0.0], "Filter", vec!["sound design"]))
            .unwrap();
        index
    }

    #[test]
    fn test_search_ranks_by_cosine_distance() {
        let hits = index().search(&[1.0, 0.1, 0.0], 3, None).unwrap();
        let ids: Vec<&str> = hits.iter().map(|hit| hit.id.as_str()).collect();
        assert_eq!(ids, vec!["EQ+", "Filter+", "Compressor"]);
        assert!(hits[0].distance < 0.01);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(hits[0].document, "EQ+ device");
    }

    #[test]
    fn test_search_limit_and_filter() {
        let index = index();
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 1, None).unwrap().len(), 1);

        let tagged = MetadataFilter::new().with("tags", "mixing");
        let hits = index.search(&[0.0, 0.0, 1.0], 10, Some(&tagged)).unwrap();
        assert_eq!(hits.len(), 2);

        let both = tagged.with("category", "Dynamics");
        let hits = index.search(&[1.0, 0.0, 0.0], 10, Some(&both)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "Compressor");

        let none = MetadataFilter::new().with("creator", "Someone Else");
        assert!(index.search(&[1.0, 0.0, 0.0], 10, Some(&none)).unwrap().is_empty());
    }

    #[test]
    fn test_insert_replaces_and_checks_dimension() {
        let mut index = index();
        index
            .insert(record("EQ+", vec![0.0, 0.0, 1.0], "EQ", vec![]))
            .unwrap();
        assert_eq!(index.count(), 3);
        let hits = index.search(&[0.0, 0.0, 1.0], 1, None).unwrap();
        assert_eq!(hits[0].id, "EQ+");

        assert!(matches!(
            index.insert(record("Delay", vec![1.0, 0.0], "Delay", vec![])),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            index.search(&[1.0], 1, None),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            MemoryIndex::new().search(&[], 1, None),
            Err(Error::InvalidParameter { .. })
        ));
        assert_eq!(index.count(), 3);
    }

    #[test]
    fn test_zero_vector_distance() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_stats() {
        let stats = index().stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.categories, vec!["Dynamics", "EQ", "Filter"]);
        assert_eq!(stats.types, vec!["Audio FX"]);
        assert_eq!(stats.creators, vec!["Bitwig"]);
        assert_eq!(MemoryIndex::new().stats(), IndexStats::default());
    }
}
