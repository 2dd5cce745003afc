//! Category mapping with hallucination rejection
//!
//! The model only ever sees the narrowed candidates. Whatever it answers is
//! validated against the full loaded taxonomy: an id outside that set is a
//! hallucination and is dropped, never replaced by a "closest" guess.

use crate::source::ExternalTaxonomy;
use serde::Deserialize;
use shelfmark_core::{
    strip_code_fence, CategoryPath, CompletionProvider, CompletionRequest, Confidence,
    ExternalCategory, MappingDecision, TokenUsage, UnmappedReason,
};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, warn};

/// Product context shown alongside the category path
#[derive(Debug, Clone, PartialEq)]
pub struct MappingContext {
    pub title: String,
    pub description_excerpt: String,
}

/// Decision plus what it cost
#[derive(Debug, Clone, PartialEq)]
pub struct MappingOutcome {
    pub decision: MappingDecision,
    /// `None` when no model call was made
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct RawMapping {
    #[serde(default, alias = "external_id", alias = "shopify_id")]
    category_id: Option<String>,
    #[serde(default, alias = "reasoning")]
    rationale: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
}

/// Maps one of our category paths onto the external taxonomy
pub struct CategoryMapper {
    provider: Arc<dyn CompletionProvider>,
    max_tokens: u32,
}

impl CategoryMapper {
    pub fn new(provider: Arc<dyn CompletionProvider>, max_tokens: u32) -> Self {
        Self {
            provider,
            max_tokens,
        }
    }

    /// Provider recorded alongside cached decisions
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Prompt listing only `candidates`
    pub fn build_prompt(
        path: &CategoryPath,
        candidates: &[ExternalCategory],
        context: &MappingContext,
    ) -> String {
        let mut listing = String::new();
        for candidate in candidates {
            let _ = writeln!(listing, "- {} [ID: {}]", candidate.full_name, candidate.id);
        }

        format!(
            "You map our internal product categories onto a standard product taxonomy.\n\n\
             OUR CATEGORY: {path}\n\
             PRODUCT: {title}\n\
             DESCRIPTION: {description}\n\n\
             CANDIDATE CATEGORIES ({count}):\n{listing}\n\
             Pick the single best candidate. Prefer the most specific category that \
             still describes the product. Use only an ID from the list above. If no \
             candidate fits, return null for category_id.\n\n\
             Respond with JSON only:\n\
             {{\"category_id\": \"<ID or null>\", \"category_name\": \"<full name>\", \
             \"confidence\": \"high|medium|low\", \"rationale\": \"<one sentence>\"}}",
            title = context.title,
            description = context.description_excerpt,
            count = candidates.len(),
        )
    }

    /// Asks the model to choose among `candidates` and validates the answer.
    ///
    /// Never fails: provider errors and bad answers become `Unmapped`.
    pub async fn map(
        &self,
        path: &CategoryPath,
        candidates: &[ExternalCategory],
        taxonomy: &ExternalTaxonomy,
        context: &MappingContext,
    ) -> MappingOutcome {
        if taxonomy.is_empty() {
            return MappingOutcome {
                decision: MappingDecision::unmapped(UnmappedReason::MappingDisabled),
                usage: None,
            };
        }
        if candidates.is_empty() {
            return MappingOutcome {
                decision: MappingDecision::unmapped(UnmappedReason::NoConfidentMatch),
                usage: None,
            };
        }

        let prompt = Self::build_prompt(path, candidates, context);
        let request = CompletionRequest::new(prompt, self.max_tokens);
        match self.provider.complete(request).await {
            Ok(completion) => {
                debug!(
                    %path,
                    input_tokens = completion.usage.input_tokens,
                    output_tokens = completion.usage.output_tokens,
                    "Mapping call completed"
                );
                MappingOutcome {
                    decision: validate_response(&completion.text, path, taxonomy),
                    usage: Some(completion.usage),
                }
            }
            Err(e) => {
                warn!(%path, error = %e, "Mapping call failed; category left unmapped");
                MappingOutcome {
                    decision: MappingDecision::unmapped(UnmappedReason::MappingFailed),
                    usage: None,
                }
            }
        }
    }
}

/// Turns a raw model answer into a decision that is safe to attach to a product.
///
/// The external name always comes from the loaded taxonomy, not the model.
pub fn validate_response(
    text: &str,
    path: &CategoryPath,
    taxonomy: &ExternalTaxonomy,
) -> MappingDecision {
    let raw: RawMapping = match serde_json::from_str(strip_code_fence(text)) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(%path, error = %e, "Unparseable mapping response");
            return MappingDecision::unmapped(UnmappedReason::MalformedResponse);
        }
    };

    let Some(id) = raw.category_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())
    else {
        debug!(%path, "Model found no confident match");
        return MappingDecision::unmapped(UnmappedReason::NoConfidentMatch);
    };

    let Some(category) = taxonomy.get(&id) else {
        warn!(%path, rejected_id = %id, "Rejected hallucinated category id");
        return MappingDecision::unmapped(UnmappedReason::Hallucinated);
    };

    let confidence = raw.confidence.as_deref().and_then(Confidence::parse);
    let rationale = raw.rationale.filter(|r| !r.trim().is_empty());
    let (Some(confidence), Some(rationale)) = (confidence, rationale) else {
        warn!(%path, "Mapping response missing confidence or rationale");
        return MappingDecision::unmapped(UnmappedReason::MalformedResponse);
    };

    MappingDecision::Mapped {
        external_id: category.id.clone(),
        external_name: category.full_name.clone(),
        confidence,
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TaxonomyOrigin;
    use shelfmark_core::LlmError;
    use shelfmark_llm::MockCompletionProvider;

    fn taxonomy() -> ExternalTaxonomy {
        ExternalTaxonomy::new(
            vec![
                ExternalCategory::new("gid://t/hammers", "Hardware > Tools > Hammers"),
                ExternalCategory::new("gid://t/saws", "Hardware > Tools > Saws"),
            ],
            TaxonomyOrigin::Fetched,
        )
    }

    fn path() -> CategoryPath {
        CategoryPath::parse("Tools > Hand Tools > Hammers").unwrap()
    }

    fn context() -> MappingContext {
        MappingContext {
            title: "Claw Hammer".to_string(),
            description_excerpt: "16 oz steel".to_string(),
        }
    }

    #[test]
    fn test_valid_response_uses_canonical_name() {
        let decision = validate_response(
            "```json\n{\"category_id\": \"gid://t/hammers\", \"category_name\": \"Hammers\", \
             \"confidence\": \"HIGH\", \"rationale\": \"exact leaf\"}\n```",
            &path(),
            &taxonomy(),
        );
        assert_eq!(
            decision,
            MappingDecision::Mapped {
                external_id: "gid://t/hammers".to_string(),
                external_name: "Hardware > Tools > Hammers".to_string(),
                confidence: Confidence::High,
                rationale: "exact leaf".to_string(),
            }
        );
    }

    #[test]
    fn test_fabricated_id_is_rejected() {
        let decision = validate_response(
            r#"{"category_id": "ext-999", "confidence": "high", "rationale": "looks right"}"#,
            &path(),
            &taxonomy(),
        );
        assert_eq!(decision, MappingDecision::unmapped(UnmappedReason::Hallucinated));
        assert_eq!(decision.external_id(), None);
        assert_eq!(decision.confidence(), None);
    }

    #[test]
    fn test_null_id_is_no_confident_match() {
        let decision = validate_response(
            r#"{"category_id": null, "confidence": "low", "rationale": "nothing fits"}"#,
            &path(),
            &taxonomy(),
        );
        assert_eq!(decision, MappingDecision::unmapped(UnmappedReason::NoConfidentMatch));
    }

    #[test]
    fn test_missing_fields_and_garbage_are_malformed() {
        let missing = validate_response(r#"{"category_id": "gid://t/saws"}"#, &path(), &taxonomy());
        assert_eq!(missing, MappingDecision::unmapped(UnmappedReason::MalformedResponse));

        let garbage = validate_response("I think hammers", &path(), &taxonomy());
        assert_eq!(garbage, MappingDecision::unmapped(UnmappedReason::MalformedResponse));
    }

    #[test]
    fn test_legacy_field_names_accepted() {
        let decision = validate_response(
            r#"{"shopify_id": "gid://t/saws", "confidence": "medium", "reasoning": "close"}"#,
            &path(),
            &taxonomy(),
        );
        assert_eq!(decision.external_id(), Some("gid://t/saws"));
    }

    #[tokio::test]
    async fn test_prompt_lists_only_candidates() {
        let provider = Arc::new(MockCompletionProvider::new());
        provider.push_response(
            r#"{"category_id": "gid://t/hammers", "confidence": "high", "rationale": "leaf"}"#,
        );
        let mapper = CategoryMapper::new(provider.clone(), 256);

        let candidates = vec![taxonomy().categories()[0].clone()];
        let outcome = mapper.map(&path(), &candidates, &taxonomy(), &context()).await;

        assert!(outcome.decision.is_mapped());
        assert!(outcome.usage.is_some());
        let prompt = &provider.calls()[0];
        assert!(prompt.contains("gid://t/hammers"));
        assert!(!prompt.contains("gid://t/saws"));
        assert!(prompt.contains("Claw Hammer"));
    }

    #[tokio::test]
    async fn test_provider_error_is_recoverable() {
        let provider = Arc::new(MockCompletionProvider::new());
        provider.push_error(LlmError::Transport("reset".to_string()));
        let mapper = CategoryMapper::new(provider, 256);

        let outcome = mapper
            .map(&path(), taxonomy().categories(), &taxonomy(), &context())
            .await;
        assert_eq!(outcome.decision, MappingDecision::unmapped(UnmappedReason::MappingFailed));
    }

    #[tokio::test]
    async fn test_empty_taxonomy_makes_no_call() {
        let provider = Arc::new(MockCompletionProvider::new());
        let mapper = CategoryMapper::new(provider.clone(), 256);

        let outcome = mapper
            .map(&path(), &[], &ExternalTaxonomy::unavailable(), &context())
            .await;
        assert_eq!(outcome.decision, MappingDecision::unmapped(UnmappedReason::MappingDisabled));
        assert_eq!(provider.call_count(), 0);
    }
}
