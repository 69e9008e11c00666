use std::sync::Arc;

use nyaya::{
    safe_truncate_ellipsis, DocumentStore, EmbeddingGenerator, EndeeClient, NyayaConfig, Retriever,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Runs one query through the retrieval pipeline and prints the ranked
/// sections. Verification tool for a running index + embedding stack:
///
///   nyaya_search "What is punishment for theft?"
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env().add_directive("nyaya=info".parse()?),
        )
        .init();

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        anyhow::bail!("usage: nyaya_search <query>");
    }

    let config = NyayaConfig::from_env();
    config.validate()?;

    let store = Arc::new(DocumentStore::load(&config.chunks_dir)?);
    let index = Arc::new(EndeeClient::new(
        &config.index_url,
        config.index_api_key.clone(),
        config.index_timeout_secs,
    )?);
    let embedder = Arc::new(EmbeddingGenerator::new(
        &config.embedding_provider,
        &config.embedding_model,
        &config.embedding_url,
        config.embedding_api_key.clone(),
        config.embedding_timeout_secs,
        64,
        300,
    )?);

    let retriever = Retriever::new(index, embedder, store, config.retrieval.clone());
    let outcome = retriever.retrieve(&query).await;

    if outcome.degraded {
        eprintln!("Service degraded: every corpus search failed.");
        for failure in &outcome.failures {
            eprintln!("  {}: {}", failure.corpus, failure.error);
        }
        std::process::exit(1);
    }

    if outcome.results.is_empty() {
        println!("No relevant sections found.");
        return Ok(());
    }

    println!("Intent: {:?}\n", outcome.intent);
    for (rank, result) in outcome.results.iter().enumerate() {
        println!(
            "{:2}. [{:.3}{}] {} {} — {}",
            rank + 1,
            result.final_score,
            if result.boosted { "*" } else { "" },
            result.matched_corpus.to_string().to_uppercase(),
            result.record.section_display,
            result.record.heading,
        );
        println!("     {}", safe_truncate_ellipsis(&result.record.content, 120));
    }

    for failure in &outcome.failures {
        eprintln!("warning: no results from {}: {}", failure.corpus, failure.error);
    }

    Ok(())
}
