//! Retrieval scenarios run against both index backends.
//!
//! - dataset isolation with identical texts
//! - empty-index searches
//! - recency ordering of the stand-in
//! - concurrent indexing into different datasets

use anyhow::Result;
use std::sync::Arc;
use tabsight_embed::HashEmbedProvider;
use tabsight_retriever::retrieval::gateway::source_metadata;
use tabsight_retriever::retrieval::{GatewayConfig, RetrievalGateway};
use tabsight_retriever::storage::{
    DatasetFilter, IndexBackend, InMemoryIndex, Metadata, SqliteIndex, VectorIndex, open_index,
};
use tempfile::tempdir;

fn gateway(index: Arc<dyn VectorIndex>) -> RetrievalGateway {
    RetrievalGateway::new(
        Arc::new(HashEmbedProvider::default()),
        index,
        GatewayConfig::default(),
    )
}

async fn backends() -> Result<Vec<Arc<dyn VectorIndex>>> {
    Ok(vec![
        Arc::new(InMemoryIndex::new()),
        Arc::new(SqliteIndex::open_memory().await?),
    ])
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn insight_metadata(n: usize) -> Vec<Metadata> {
    vec![source_metadata("insight"); n]
}

#[tokio::test]
async fn test_dataset_isolation_with_identical_texts() -> Result<()> {
    for index in backends().await? {
        let gateway = gateway(Arc::clone(&index));
        let texts = strings(&["Fare is right-skewed", "Age has 20% missing values"]);
        gateway.index_text("A", &texts, &insight_metadata(2)).await?;
        gateway.index_text("B", &texts, &insight_metadata(2)).await?;
        gateway
            .index_text("B", &strings(&["Only in B"]), &insight_metadata(1))
            .await?;

        let found = gateway.search("A", "Only in B", Some(10)).await?;
        assert_eq!(found.len(), 2, "backend {}", index.backend_name());
        assert!(!found.contains(&"Only in B".to_string()));

        let hits = index
            .search(
                &gateway.config().collection,
                &vec![half::f16::ZERO; gateway.config().dimension],
                &DatasetFilter::dataset("A"),
                10,
            )
            .await?;
        assert!(hits.iter().all(|h| h.point.payload.dataset_id == "A"));
    }
    Ok(())
}

#[tokio::test]
async fn test_empty_index_search_returns_nothing() -> Result<()> {
    for index in backends().await? {
        let gateway = gateway(index);
        assert!(gateway.search("fresh", "anything at all", None).await?.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_stand_in_returns_three_newest() -> Result<()> {
    let gateway = gateway(Arc::new(InMemoryIndex::new()));
    gateway
        .index_text("d1", &strings(&["t1", "t2", "t3", "t4"]), &insight_metadata(4))
        .await?;
    assert_eq!(gateway.search("d1", "t1", Some(3)).await?, vec!["t4", "t3", "t2"]);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_ranks_lexically_closest_first() -> Result<()> {
    let gateway = gateway(Arc::new(SqliteIndex::open_memory().await?));
    gateway
        .index_text(
            "titanic",
            &strings(&[
                "Cabin is missing for most passengers",
                "Passenger class predicts survival",
                "Fare distribution is right skewed",
            ]),
            &insight_metadata(3),
        )
        .await?;

    let found = gateway
        .search("titanic", "does passenger class predict survival", Some(1))
        .await?;
    assert_eq!(found, vec!["Passenger class predicts survival"]);
    Ok(())
}

#[tokio::test]
async fn test_regeneration_appends_duplicates() -> Result<()> {
    let gateway = gateway(Arc::new(SqliteIndex::open_memory().await?));
    let texts = strings(&["Insight: Skew. Fare is skewed"]);
    gateway.index_text("d1", &texts, &insight_metadata(1)).await?;
    gateway.index_text("d1", &texts, &insight_metadata(1)).await?;
    assert_eq!(gateway.count("d1").await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_indexing_into_different_datasets() -> Result<()> {
    let dir = tempdir()?;
    let index = open_index(&IndexBackend::Sqlite {
        path: dir.path().join("index.db"),
    })
    .await;
    assert_eq!(index.backend_name(), "sqlite");
    let gateway = gateway(index);

    let mut handles = Vec::new();
    for dataset in ["d1", "d2", "d3", "d4"] {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            let texts: Vec<String> = (0..5).map(|i| format!("{dataset} fact {i}")).collect();
            gateway
                .index_text(dataset, &texts, &insight_metadata(texts.len()))
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await??, 5);
    }

    for dataset in ["d1", "d2", "d3", "d4"] {
        assert_eq!(gateway.count(dataset).await?, 5);
        let found = gateway.search(dataset, "fact", Some(10)).await?;
        assert!(found.iter().all(|t| t.starts_with(dataset)));
    }
    Ok(())
}
