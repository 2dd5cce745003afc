use crate::cli::EnrichArgs;
use anyhow::{Context, Result};
use shelfmark_config::ShelfmarkConfig;
use shelfmark_core::{CompletionProvider, JsonFileStore, Product};
use shelfmark_enrichment::{
    BatchCoordinator, CategoryResolver, EnhancementCache, EnhancementCacheDocument,
    EnrichmentOptions, MappingSetup, Orchestrator, ProductFailure, PromptDocuments,
    ResolverSettings, RunSummary,
};
use shelfmark_llm::{create_batch_backend, create_completion_provider, create_embedding_provider};
use shelfmark_taxonomy::{
    CategoryMapper, EmbeddingIndexStore, ExternalTaxonomySource, IndexDocument, InternalTaxonomy,
    MappingCacheDocument, TaxonomyDocument,
};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn execute(config: ShelfmarkConfig, args: EnrichArgs) -> Result<()> {
    let products = read_products(&args.input)?;
    info!(count = products.len(), input = %args.input.display(), "Loaded products");

    let internal = InternalTaxonomy::load(&config.paths.taxonomy_doc)
        .context("Failed to load the taxonomy document")?;
    let voice_tone = std::fs::read_to_string(&config.paths.voice_tone_doc).with_context(|| {
        format!(
            "Failed to read voice and tone guidelines from {}",
            config.paths.voice_tone_doc.display()
        )
    })?;
    let documents = PromptDocuments {
        taxonomy: internal.document().to_string(),
        voice_tone,
    };

    let api_key = config.provider_api_key()?;
    let completion = create_completion_provider(&config.provider, api_key.clone())
        .context("Failed to create completion provider")?;
    let resolver = build_resolver(&config, &args, completion.clone(), &internal).await;

    let mut options = EnrichmentOptions::from_config(&config);
    options.force_refresh_cache = args.force_refresh_cache;
    let cache = EnhancementCache::load(Arc::new(JsonFileStore::<EnhancementCacheDocument>::new(
        config.paths.enhancement_cache_path(),
    )));

    let summary = if args.batch || config.batch.enabled {
        let backend = create_batch_backend(&config.provider, &config.batch, api_key)
            .context("Failed to create batch backend")?;
        let mut coordinator = BatchCoordinator::new(
            backend,
            config.batch.poll_interval(),
            cache,
            resolver,
            documents,
            options,
        );
        let run = coordinator
            .run(products)
            .await
            .context("Batch enrichment failed")?;
        write_products(&args.output, &run.products)?;
        if !run.failures.is_empty() {
            eprint!("{}", format_failures(&run.failures));
        }
        run.summary
    } else {
        let mut orchestrator = Orchestrator::new(completion, cache, resolver, documents, options);
        let run = orchestrator
            .run(products)
            .await
            .context("Enrichment aborted; completed products are cached and will be skipped on rerun")?;
        write_products(&args.output, &run.products)?;
        run.summary
    };

    print!("{}", format_summary(&summary, &args.output));
    Ok(())
}

async fn build_resolver(
    config: &ShelfmarkConfig,
    args: &EnrichArgs,
    completion: Arc<dyn CompletionProvider>,
    internal: &InternalTaxonomy,
) -> CategoryResolver {
    if !config.mapping.enabled {
        info!("Category mapping disabled in config");
        return CategoryResolver::disabled();
    }

    let embedder = match config.embedding_api_key().map_err(anyhow::Error::from).and_then(|key| {
        create_embedding_provider(&config.embedding, key, config.provider.timeout_secs())
            .map_err(anyhow::Error::from)
    }) {
        Ok(embedder) => embedder,
        Err(e) => {
            warn!(error = %e, "No embedding provider; category mapping disabled for this run");
            return CategoryResolver::disabled();
        }
    };

    let source = ExternalTaxonomySource::new(
        config.mapping.taxonomy_url.clone(),
        config.mapping.freshness_days,
        Arc::new(JsonFileStore::<TaxonomyDocument>::new(
            config.paths.external_taxonomy_path(),
        )),
    );
    let index_store = EmbeddingIndexStore::new(
        Arc::new(JsonFileStore::<IndexDocument>::new(
            config.paths.embedding_index_path(),
        )),
        config.embedding.batch_size(),
    );
    let setup = MappingSetup {
        source: &source,
        index_store: &index_store,
        embedder,
        mapper: CategoryMapper::new(completion, config.provider.description_max_tokens()),
        mapping_store: Arc::new(JsonFileStore::<MappingCacheDocument>::new(
            config.paths.mapping_cache_path(),
        )),
        internal_fingerprint: internal.fingerprint().to_string(),
    };
    let settings = ResolverSettings {
        top_k: config.mapping.top_k,
        excerpt_chars: config.mapping.description_excerpt_chars,
        force_refresh_mapping: args.force_refresh_mapping,
        force_refresh_embeddings: args.force_refresh_embeddings,
    };
    CategoryResolver::prepare(setup, settings).await
}

/// Reads a JSON array of products
pub fn read_products(path: &Path) -> Result<Vec<Product>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read products from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of products", path.display()))
}

/// Writes products as pretty-printed JSON, creating parent directories
pub fn write_products(path: &Path, products: &[Product]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(products)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write products to {}", path.display()))?;
    info!(count = products.len(), output = %path.display(), "Wrote enriched products");
    Ok(())
}

pub fn format_summary(summary: &RunSummary, output: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Enriched {} products -> {}", summary.total, output.display());
    let _ = writeln!(out, "  enhanced:    {}", summary.enhanced);
    let _ = writeln!(out, "  from cache:  {} ({} backfilled)", summary.cached, summary.backfilled);
    let _ = writeln!(out, "  mapped:      {}", summary.mapped);
    let _ = writeln!(out, "  unmapped:    {}", summary.unmapped);
    if summary.failed > 0 {
        let _ = writeln!(out, "  failed:      {}", summary.failed);
    }
    let _ = writeln!(
        out,
        "  model calls: {} ({} input / {} output tokens)",
        summary.model_calls, summary.usage.input_tokens, summary.usage.output_tokens
    );
    out
}

pub fn format_failures(failures: &[ProductFailure]) -> String {
    let mut out = format!("{} product(s) could not be enhanced:\n", failures.len());
    for failure in failures {
        let _ = writeln!(out, "  #{} {}: {}", failure.index, failure.title, failure.reason);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfmark_core::TokenUsage;
    use tempfile::TempDir;

    #[test]
    fn test_products_round_trip_through_files() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.json");
        std::fs::write(
            &input,
            r#"[{"id": "7", "title": "Claw Hammer", "descriptionHtml": "<p>16oz</p>", "vendor": "Acme"}]"#,
        )
        .unwrap();

        let products = read_products(&input).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title, "Claw Hammer");
        assert_eq!(products[0].description, "<p>16oz</p>");

        let output = dir.path().join("nested").join("out.json");
        write_products(&output, &products).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written[0]["title"], "Claw Hammer");
        // Fields we do not model survive untouched
        assert_eq!(written[0]["vendor"], "Acme");
    }

    #[test]
    fn test_read_products_reports_the_path() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("broken.json");
        std::fs::write(&input, r#"{"products": "nope"}"#).unwrap();

        let err = read_products(&input).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));

        let missing = read_products(&dir.path().join("absent.json")).unwrap_err();
        assert!(format!("{missing:#}").contains("absent.json"));
    }

    #[test]
    fn test_summary_lists_counts_and_tokens() {
        let summary = RunSummary {
            enhanced: 3,
            cached: 2,
            backfilled: 1,
            mapped: 4,
            unmapped: 1,
            model_calls: 7,
            usage: TokenUsage {
                input_tokens: 1200,
                output_tokens: 300,
            },
            ..RunSummary::new(5)
        };
        let text = format_summary(&summary, Path::new("out.json"));
        assert!(text.contains("Enriched 5 products -> out.json"));
        assert!(text.contains("from cache:  2 (1 backfilled)"));
        assert!(text.contains("7 (1200 input / 300 output tokens)"));
        assert!(!text.contains("failed"));
    }

    #[test]
    fn test_failures_are_listed_by_position() {
        let text = format_failures(&[ProductFailure {
            index: 2,
            title: "Mystery Box".to_string(),
            reason: "Batch sub-request failed: overloaded".to_string(),
        }]);
        assert!(text.starts_with("1 product(s)"));
        assert!(text.contains("#2 Mystery Box: Batch sub-request failed: overloaded"));
    }
}
