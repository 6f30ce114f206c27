//! In-memory stand-in for [`VectorIndex`].
//!
//! Does not compute similarity: a search returns the most recently inserted
//! points of the filtered dataset, newest first, with `score: None`.

use super::{CollectionConfig, DatasetFilter, Point, ScoredPoint, VectorIndex};
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use half::f16;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug)]
struct Collection {
    config: CollectionConfig,
    points: Vec<Point>,
}

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(&self, config: &CollectionConfig) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get(&config.name) {
            Some(existing) if existing.config.dimension != config.dimension => bail!(
                "collection '{}' exists with dimension {}, requested {}",
                config.name,
                existing.config.dimension,
                config.dimension
            ),
            Some(_) => {}
            None => {
                collections.insert(
                    config.name.clone(),
                    Collection {
                        config: config.clone(),
                        points: Vec::new(),
                    },
                );
                tracing::debug!("Created in-memory collection '{}'", config.name);
            }
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| anyhow!("collection '{collection}' does not exist"))?;

        let dimension = target.config.dimension;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != dimension) {
            bail!(
                "point {} has {} dimensions, collection '{}' expects {}",
                bad.id,
                bad.vector.len(),
                collection,
                dimension
            );
        }

        let inserted = points.len();
        for point in points {
            match target.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point,
                None => target.points.push(point),
            }
        }
        Ok(inserted)
    }

    async fn search(
        &self,
        collection: &str,
        _vector: &[f16],
        filter: &DatasetFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| anyhow!("collection '{collection}' does not exist"))?;

        Ok(target
            .points
            .iter()
            .rev()
            .filter(|p| filter.matches(&p.payload))
            .take(limit)
            .map(|p| ScoredPoint {
                point: p.clone(),
                score: None,
            })
            .collect())
    }

    async fn count(&self, collection: &str, filter: &DatasetFilter) -> Result<usize> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| anyhow!("collection '{collection}' does not exist"))?;
        Ok(target
            .points
            .iter()
            .filter(|p| filter.matches(&p.payload))
            .count())
    }

    fn backend_name(&self) -> &str {
        "in-memory"
    }
}
