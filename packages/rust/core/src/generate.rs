//! Tiered insight generator.
//!
//! Drives one or more backends per item depending on the assigned tier.
//! Standard is a single primary-backend call; premium is an ordered
//! chain where the first stage originates an insight from the item's
//! metadata and later stages refine it. Fallback never blocks
//! production: a degraded-but-present insight beats no insight, and an
//! item is only skipped when every backend in the chain is unavailable.

use std::sync::Arc;

use tracing::{debug, warn};

use insightforge_backend::Backend;
use insightforge_shared::{CatalogItem, PriorityTier, WorkQueueEntry};

/// A generated insight plus the tier that actually produced it
/// (which may differ from the assigned tier after fallback).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedInsight {
    pub text: String,
    pub tier_used: PriorityTier,
}

/// Result of one generation attempt, with the spend it accrued.
#[derive(Debug)]
pub struct GenerateOutcome {
    /// `None` when every backend involved failed; the item is skipped,
    /// never given a placeholder asset.
    pub insight: Option<GeneratedInsight>,
    /// Estimated cost of all backend calls made, successful or not.
    pub cost_usd: f64,
}

/// Tiered generator over injected backends.
///
/// `chain` is the premium fallback chain in stage order; providers with
/// missing credentials are dropped before construction, shortening the
/// chain. The primary backend also serves the standard tier and is
/// shared (`Arc`) so its pacing budget is honored across both roles.
pub struct Generator {
    primary: Arc<dyn Backend>,
    chain: Vec<Arc<dyn Backend>>,
    refine_max_chars: usize,
}

impl Generator {
    pub fn new(
        primary: Arc<dyn Backend>,
        chain: Vec<Arc<dyn Backend>>,
        refine_max_chars: usize,
    ) -> Self {
        Self {
            primary,
            chain,
            refine_max_chars,
        }
    }

    /// Generate one insight for a queue entry, per its assigned tier.
    pub async fn generate(&self, entry: &WorkQueueEntry) -> GenerateOutcome {
        match entry.tier {
            PriorityTier::Standard => self.generate_standard(&entry.item).await,
            PriorityTier::Premium => self.generate_premium(&entry.item).await,
        }
    }

    /// Single from-scratch call to the primary backend.
    async fn generate_standard(&self, item: &CatalogItem) -> GenerateOutcome {
        let cost_usd = self.primary.cost_per_call_usd();

        match self.primary.call(&standard_prompt(item)).await {
            Ok(text) => GenerateOutcome {
                insight: Some(GeneratedInsight {
                    text,
                    tier_used: PriorityTier::Standard,
                }),
                cost_usd,
            },
            Err(kind) => {
                warn!(item = %item.id, backend = self.primary.name(), failure = %kind,
                      "standard generation failed");
                GenerateOutcome {
                    insight: None,
                    cost_usd,
                }
            }
        }
    }

    /// Premium chain: originate, then refine stage by stage.
    ///
    /// Stage-1 failure falls back to standard generation as a full
    /// replacement. A later stage's failure keeps the previous stage's
    /// text as the final result.
    async fn generate_premium(&self, item: &CatalogItem) -> GenerateOutcome {
        let Some(first) = self.chain.first() else {
            return self.generate_standard(item).await;
        };

        let mut cost_usd = first.cost_per_call_usd();
        let mut text = match first.call(&originate_prompt(item)).await {
            Ok(t) => t,
            Err(kind) => {
                warn!(item = %item.id, backend = first.name(), failure = %kind,
                      "premium origination failed, falling back to standard tier");
                let mut fallback = self.generate_standard(item).await;
                fallback.cost_usd += cost_usd;
                return fallback;
            }
        };

        for (stage, backend) in self.chain.iter().enumerate().skip(1) {
            cost_usd += backend.cost_per_call_usd();
            match backend.call(&refine_prompt(&text, self.refine_max_chars)).await {
                Ok(refined) => {
                    debug!(item = %item.id, stage = stage + 1, backend = backend.name(),
                           "refine stage ok");
                    text = refined;
                }
                Err(kind) => {
                    warn!(item = %item.id, stage = stage + 1, backend = backend.name(),
                          failure = %kind, "refine stage failed, keeping prior output");
                    break;
                }
            }
        }

        GenerateOutcome {
            insight: Some(GeneratedInsight {
                text,
                tier_used: PriorityTier::Premium,
            }),
            cost_usd,
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt builders
// ---------------------------------------------------------------------------

fn metadata_block(item: &CatalogItem) -> String {
    let author = if item.author.is_empty() {
        "Unknown Author"
    } else {
        &item.author
    };
    let subjects = if item.subjects.is_empty() {
        "Unknown"
    } else {
        &item.subjects
    };
    format!(
        "Title: {}\nAuthor: {}\nSubjects: {}",
        item.title, author, subjects
    )
}

fn standard_prompt(item: &CatalogItem) -> String {
    format!(
        "Write one concise, non-obvious insight a busy professional could act on, \
         drawn from the work described below. Respond with two or three plain \
         sentences and no preamble.\n\n{}",
        metadata_block(item)
    )
}

fn originate_prompt(item: &CatalogItem) -> String {
    format!(
        "Extract the single most consequential idea from the work described below \
         and state it as a practical insight. Be specific, avoid summary language, \
         respond with plain prose only.\n\n{}",
        metadata_block(item)
    )
}

fn refine_prompt(prior: &str, max_chars: usize) -> String {
    format!(
        "Compress and refine the insight below to under {max_chars} characters. \
         Keep the core claim, drop hedging, respond with the revised text only.\n\n{prior}"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use insightforge_backend::FailureKind;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Fake backend replaying a script of responses; records prompts.
    struct Scripted {
        name: &'static str,
        script: Mutex<VecDeque<Result<String, FailureKind>>>,
        prompts: Mutex<Vec<String>>,
        cost: f64,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            script: Vec<Result<String, FailureKind>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                script: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
                cost: 0.0,
            })
        }

        fn with_cost(name: &'static str, reply: &str, cost: f64) -> Arc<Self> {
            Arc::new(Self {
                name,
                script: Mutex::new(vec![Ok(reply.to_string())].into()),
                prompts: Mutex::new(Vec::new()),
                cost,
            })
        }

        fn always_ok(name: &'static str, reply: &str) -> Arc<Self> {
            // An empty script falls back to repeating the last reply
            Self::new(name, vec![Ok(reply.into())])
        }

        fn always_fail(name: &'static str, kind: FailureKind) -> Arc<Self> {
            Self::new(name, vec![Err(kind)])
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Backend for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn cost_per_call_usd(&self) -> f64 {
            self.cost
        }

        async fn call(&self, prompt: &str) -> Result<String, FailureKind> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut script = self.script.lock().unwrap();
            match script.len() {
                0 => Err(FailureKind::ServerError),
                1 => script.front().cloned().unwrap(),
                _ => script.pop_front().unwrap(),
            }
        }
    }

    fn item(id: &str) -> CatalogItem {
        CatalogItem {
            id: id.into(),
            title: "The Art of War".into(),
            author: "Sunzi".into(),
            subjects: "Strategy".into(),
            popularity: 100,
            rank: 1,
        }
    }

    fn entry(tier: PriorityTier) -> WorkQueueEntry {
        WorkQueueEntry {
            item: item("77"),
            tier,
        }
    }

    #[tokio::test]
    async fn standard_tier_calls_primary_once() {
        let primary = Scripted::always_ok("p", "T");
        let generator = Generator::new(primary.clone(), vec![primary.clone()], 280);

        let outcome = generator.generate(&entry(PriorityTier::Standard)).await;

        let insight = outcome.insight.unwrap();
        assert_eq!(insight.text, "T");
        assert_eq!(insight.tier_used, PriorityTier::Standard);
        assert_eq!(primary.prompts().len(), 1);
        assert!(primary.prompts()[0].contains("The Art of War"));
    }

    #[tokio::test]
    async fn premium_chain_refines_through_all_stages() {
        let s1 = Scripted::always_ok("a", "raw idea");
        let s2 = Scripted::always_ok("b", "tighter idea");
        let s3 = Scripted::always_ok("c", "final idea");
        let generator = Generator::new(
            s1.clone(),
            vec![s1.clone(), s2.clone(), s3.clone()],
            280,
        );

        let outcome = generator.generate(&entry(PriorityTier::Premium)).await;

        let insight = outcome.insight.unwrap();
        assert_eq!(insight.text, "final idea");
        assert_eq!(insight.tier_used, PriorityTier::Premium);
        // Stage 2 refines stage 1's output, stage 3 refines stage 2's
        assert!(s2.prompts()[0].contains("raw idea"));
        assert!(s3.prompts()[0].contains("tighter idea"));
        assert!(s2.prompts()[0].contains("under 280 characters"));
    }

    #[tokio::test]
    async fn stage_one_failure_falls_back_to_standard() {
        // Primary succeeds from scratch; the chain's first stage always fails.
        let primary = Scripted::new(
            "p",
            vec![Err(FailureKind::RateLimited), Ok("T".into())],
        );
        let s2 = Scripted::always_ok("b", "never reached");
        let generator = Generator::new(primary.clone(), vec![primary.clone(), s2.clone()], 280);

        let outcome = generator.generate(&entry(PriorityTier::Premium)).await;

        let insight = outcome.insight.unwrap();
        assert_eq!(insight.text, "T");
        assert_eq!(insight.tier_used, PriorityTier::Standard);
        assert!(s2.prompts().is_empty());
    }

    #[tokio::test]
    async fn stage_two_failure_keeps_stage_one_text() {
        let s1 = Scripted::always_ok("a", "stage one text");
        let s2 = Scripted::always_fail("b", FailureKind::Timeout);
        let s3 = Scripted::always_ok("c", "never reached");
        let generator = Generator::new(
            s1.clone(),
            vec![s1.clone(), s2.clone(), s3.clone()],
            280,
        );

        let outcome = generator.generate(&entry(PriorityTier::Premium)).await;

        let insight = outcome.insight.unwrap();
        assert_eq!(insight.text, "stage one text");
        assert_eq!(insight.tier_used, PriorityTier::Premium);
        // Chain stops at the failed stage
        assert!(s3.prompts().is_empty());
    }

    #[tokio::test]
    async fn stage_three_failure_keeps_stage_two_text() {
        let s1 = Scripted::always_ok("a", "one");
        let s2 = Scripted::always_ok("b", "two");
        let s3 = Scripted::always_fail("c", FailureKind::ServerError);
        let generator = Generator::new(s1.clone(), vec![s1, s2, s3], 280);

        let outcome = generator.generate(&entry(PriorityTier::Premium)).await;

        let insight = outcome.insight.unwrap();
        assert_eq!(insight.text, "two");
        assert_eq!(insight.tier_used, PriorityTier::Premium);
    }

    #[tokio::test]
    async fn total_failure_yields_no_insight() {
        let primary = Scripted::always_fail("p", FailureKind::ServerError);
        let generator = Generator::new(primary.clone(), vec![primary.clone()], 280);

        let premium = generator.generate(&entry(PriorityTier::Premium)).await;
        assert!(premium.insight.is_none());

        let standard = generator.generate(&entry(PriorityTier::Standard)).await;
        assert!(standard.insight.is_none());
    }

    #[tokio::test]
    async fn empty_chain_degrades_to_standard() {
        let primary = Scripted::always_ok("p", "T");
        let generator = Generator::new(primary.clone(), vec![], 280);

        let outcome = generator.generate(&entry(PriorityTier::Premium)).await;
        assert_eq!(outcome.insight.unwrap().tier_used, PriorityTier::Standard);
    }

    #[tokio::test]
    async fn cost_accrues_per_stage_call() {
        let s1 = Scripted::with_cost("a", "one", 0.01);
        let s2 = Scripted::with_cost("b", "two", 0.02);
        let generator = Generator::new(s1.clone(), vec![s1, s2], 280);

        let outcome = generator.generate(&entry(PriorityTier::Premium)).await;
        assert!((outcome.cost_usd - 0.03).abs() < 1e-9);
    }
}
