use anyhow::Result;
use std::process::Command;
use tabsight_retriever::storage::SqliteIndex;
use tempfile::TempDir;

/// Run the `tabsight-index` binary against a database inside `temp_dir`.
fn run_cli(temp_dir: &TempDir, args: &[&str]) -> Result<std::process::Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_tabsight-index"))
        .arg("--db")
        .arg(temp_dir.path().join("index.db"))
        .args(["--embedder", "hash"])
        .args(args)
        .env("RUST_LOG", "error")
        .output()?;
    Ok(output)
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_add_count_and_search() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let add = run_cli(
        &temp_dir,
        &["add", "--dataset", "titanic", "--source", "insight", "first fact", "second fact"],
    )?;
    assert!(add.status.success(), "{}", String::from_utf8_lossy(&add.stderr));
    assert!(stdout(&add).contains("Indexed 2 texts"));

    let count = run_cli(&temp_dir, &["count", "--dataset", "titanic"])?;
    assert_eq!(stdout(&count), "2");

    let other = run_cli(&temp_dir, &["count", "--dataset", "iris"])?;
    assert_eq!(stdout(&other), "0");

    let search = run_cli(
        &temp_dir,
        &["search", "--dataset", "titanic", "--format", "json", "second fact"],
    )?;
    assert!(search.status.success());
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&search))?;
    assert_eq!(parsed["results"][0], "second fact");
    assert_eq!(parsed["results"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn test_count_on_new_database_is_zero() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = run_cli(&temp_dir, &["count"])?;
    assert!(output.status.success());
    assert_eq!(stdout(&output), "0");
    Ok(())
}

#[tokio::test]
async fn test_count_reports_database_errors() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let add = run_cli(&temp_dir, &["add", "--dataset", "titanic", "fact"])?;
    assert!(add.status.success());

    let db = temp_dir.path().join("index.db");
    let index = SqliteIndex::open(&db).await?;
    sqlx::query("ALTER TABLE collections RENAME COLUMN dimension TO width")
        .execute(index.pool())
        .await?;
    index.pool().close().await;

    let count = run_cli(&temp_dir, &["count", "--dataset", "titanic"])?;
    assert!(!count.status.success());
    assert_eq!(stdout(&count), "");
    assert!(String::from_utf8_lossy(&count.stderr).contains("Error"));
    Ok(())
}

#[test]
fn test_invalid_format_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = run_cli(
        &temp_dir,
        &["search", "--dataset", "d", "--format", "xml", "q"],
    )?;
    assert!(!output.status.success());
    Ok(())
}
