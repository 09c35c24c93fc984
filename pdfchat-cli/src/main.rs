mod cli;
mod repl;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pdfchat_rag::gemini::{GeminiConfig, GeminiEmbeddingProvider, GeminiGenerationProvider};
use pdfchat_rag::{
    InMemoryVectorStore, PgVectorStore, RagConfig, RagPipeline, RetryPolicy, VectorStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber =
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn vector_store(cli: &Cli, config: &RagConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    match cli.database_url() {
        Some(url) => {
            let store = PgVectorStore::connect(&url, config.dimensions)
                .await
                .context("failed to connect to PostgreSQL")?
                .with_table(&cli.table)?
                .with_retry(RetryPolicy::from_config(&config.retry));
            info!(table = store.table(), "using pgvector store");
            Ok(Arc::new(store))
        }
        None => {
            info!("DATABASE_URL not set, using in-memory store");
            Ok(Arc::new(InMemoryVectorStore::new(config.dimensions)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = cli.rag_config()?;
    let mut gemini = GeminiConfig::from_env()?;
    if let Some(model) = &cli.embedding_model {
        gemini = gemini.with_embedding_model(model);
    }
    if let Some(model) = &cli.generation_model {
        gemini = gemini.with_generation_model(model);
    }

    let embedder =
        GeminiEmbeddingProvider::new(gemini.clone())?.with_dimensions(config.dimensions);
    let generator = GeminiGenerationProvider::new(gemini)?;
    let store = vector_store(&cli, &config).await?;

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .vector_store(store)
        .generation_provider(Arc::new(generator))
        .build()?;
    pipeline.initialize().await?;

    let mut documents = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        documents.push(repl::load_document(path).await?);
    }
    if cli.replace {
        pipeline.reindex(&documents).await?;
    } else {
        pipeline.ingest_batch(&documents).await?;
    }
    info!(stored = pipeline.vector_store().count().await?, "store ready");

    let session = pipeline.new_session().await;
    match &cli.ask {
        Some(question) => println!("{}", session.ask(question).await?),
        None => repl::run(&pipeline, &session).await?,
    }
    Ok(())
}
