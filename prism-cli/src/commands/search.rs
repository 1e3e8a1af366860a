use anyhow::{Context, Result};
use prism_client::{SearchClient, SearchParams};
use serde_json::Value;

pub async fn run_search(client: &SearchClient, collection: &str, params: &SearchParams) -> Result<()> {
    let response: Value = client
        .collection(collection)
        .search_documents()
        .search(params)
        .await
        .with_context(|| format!("Search in '{}' failed", collection))?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
