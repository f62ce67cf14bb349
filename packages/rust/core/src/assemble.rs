//! Asset assembler.
//!
//! Packages a generated insight plus item metadata into the
//! schema-shaped [`InsightAsset`]. Pure: no I/O, no backend calls.
//! The fixed-cardinality lists (cards, quiz, keywords) are a hard
//! content-shape contract independent of what the LLM returned, so
//! short or odd insights are padded from deterministic defaults rather
//! than rejected here.

use std::sync::LazyLock;

use regex::Regex;

use insightforge_shared::{CatalogItem, InsightAsset, PriorityTier, QuizPair};

/// Maximum title length carried into the asset.
const TITLE_MAX_CHARS: usize = 80;

/// Maximum author length carried into the asset.
const AUTHOR_MAX_CHARS: usize = 50;

/// Maximum length of the narration script.
const NARRATION_MAX_CHARS: usize = 320;

/// Maximum length of a single card.
const CARD_MAX_CHARS: usize = 120;

/// Minimum cardinality of cards, quiz pairs, and keywords.
const MIN_LIST_LEN: usize = 3;

/// Upper bound on keyword tags.
const MAX_KEYWORDS: usize = 8;

const DEFAULT_CARDS: [&str; 3] = [
    "Define the binding constraint",
    "Weigh what cannot be undone",
    "Act on the smallest reversible step",
];

const DEFAULT_KEYWORDS: [&str; 3] = ["strategy", "decision-making", "efficiency"];

/// Splits a raw subject string on `;`, `,`, or `--` separators.
static SUBJECT_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?:;|,|--)\s*").expect("subject split regex"));

/// Assemble the final asset for an item.
pub fn assemble(item: &CatalogItem, insight: &str, tier_used: PriorityTier) -> InsightAsset {
    let insight = insight.trim().to_string();
    let sentences = split_sentences(&insight);

    InsightAsset {
        item_id: item.id.clone(),
        title: truncate_chars(or_placeholder(&item.title, "Unknown"), TITLE_MAX_CHARS),
        author: truncate_chars(
            or_placeholder(&item.author, "Unknown Author"),
            AUTHOR_MAX_CHARS,
        ),
        audience: "professional".into(),
        cards: build_cards(&sentences),
        quiz: build_quiz(item, &insight, &sentences),
        narration: truncate_chars(&insight, NARRATION_MAX_CHARS),
        keywords: build_keywords(&item.subjects),
        insight,
        tier: tier_used,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() { placeholder } else { trimmed }
}

/// Truncate on a character boundary, never mid code point.
fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => value[..byte_idx].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Split prose into trimmed, non-empty sentences.
fn split_sentences(text: &str) -> Vec<String> {
    text.split_terminator(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// At least three short prompt cards, led by the insight's sentences.
fn build_cards(sentences: &[String]) -> Vec<String> {
    let mut cards: Vec<String> = sentences
        .iter()
        .take(MIN_LIST_LEN)
        .map(|s| truncate_chars(s, CARD_MAX_CHARS))
        .collect();

    for default in DEFAULT_CARDS {
        if cards.len() >= MIN_LIST_LEN {
            break;
        }
        cards.push(default.to_string());
    }
    cards
}

/// Three question/answer pairs anchored on the item metadata.
fn build_quiz(item: &CatalogItem, insight: &str, sentences: &[String]) -> Vec<QuizPair> {
    let title = or_placeholder(&item.title, "Unknown");
    let author = or_placeholder(&item.author, "Unknown Author");
    let central = sentences
        .first()
        .map(String::as_str)
        .unwrap_or(insight);

    vec![
        QuizPair {
            q: format!("Who is credited with \"{}\"?", truncate_chars(title, TITLE_MAX_CHARS)),
            a: truncate_chars(author, AUTHOR_MAX_CHARS),
        },
        QuizPair {
            q: "What is the central insight?".into(),
            a: truncate_chars(central, CARD_MAX_CHARS),
        },
        QuizPair {
            q: "What should you do first?".into(),
            a: sentences
                .get(1)
                .map(|s| truncate_chars(s, CARD_MAX_CHARS))
                .unwrap_or_else(|| DEFAULT_CARDS[0].to_string()),
        },
    ]
}

/// Lowercased, deduplicated keyword tags from the subject string,
/// padded from defaults up to the minimum.
fn build_keywords(subjects: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();

    for token in SUBJECT_SPLIT_RE.split(subjects) {
        let tag = token.trim().to_lowercase();
        if tag.is_empty() || keywords.contains(&tag) {
            continue;
        }
        keywords.push(tag);
        if keywords.len() >= MAX_KEYWORDS {
            break;
        }
    }

    for default in DEFAULT_KEYWORDS {
        if keywords.len() >= MIN_LIST_LEN {
            break;
        }
        if !keywords.contains(&default.to_string()) {
            keywords.push(default.to_string());
        }
    }
    keywords
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> CatalogItem {
        CatalogItem {
            id: "1342".into(),
            title: "Pride and Prejudice".into(),
            author: "Austen, Jane".into(),
            subjects: "England -- Fiction; Courtship -- Fiction".into(),
            popularity: 50000,
            rank: 1,
        }
    }

    const INSIGHT: &str = "First impressions are expensive to revise. \
        Delay judgment until the evidence accumulates. \
        Re-examine your certainties when stakes rise.";

    #[test]
    fn assembles_all_schema_fields() {
        let asset = assemble(&item(), INSIGHT, PriorityTier::Premium);

        assert_eq!(asset.item_id, "1342");
        assert_eq!(asset.title, "Pride and Prejudice");
        assert_eq!(asset.audience, "professional");
        assert_eq!(asset.tier, PriorityTier::Premium);
        assert!(asset.insight.starts_with("First impressions"));
        assert!(asset.cards.len() >= 3);
        assert_eq!(asset.quiz.len(), 3);
        assert!(asset.keywords.len() >= 3);
        assert!(!asset.narration.is_empty());
    }

    #[test]
    fn long_title_and_author_are_truncated() {
        let mut long = item();
        long.title = "T".repeat(200);
        long.author = "A".repeat(200);

        let asset = assemble(&long, INSIGHT, PriorityTier::Standard);

        assert_eq!(asset.title.chars().count(), 80);
        assert_eq!(asset.author.chars().count(), 50);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut unicode = item();
        unicode.title = "é".repeat(100);

        let asset = assemble(&unicode, INSIGHT, PriorityTier::Standard);
        assert_eq!(asset.title.chars().count(), 80);
    }

    #[test]
    fn missing_metadata_gets_placeholders() {
        let mut blank = item();
        blank.title = "   ".into();
        blank.author = String::new();

        let asset = assemble(&blank, INSIGHT, PriorityTier::Standard);

        assert_eq!(asset.title, "Unknown");
        assert_eq!(asset.author, "Unknown Author");
        assert_eq!(asset.quiz[0].a, "Unknown Author");
    }

    #[test]
    fn short_insight_pads_cards_from_defaults() {
        let asset = assemble(&item(), "One idea.", PriorityTier::Standard);

        assert_eq!(asset.cards.len(), 3);
        assert_eq!(asset.cards[0], "One idea");
        assert_eq!(asset.cards[1], DEFAULT_CARDS[0]);
        assert_eq!(asset.cards[2], DEFAULT_CARDS[1]);
    }

    #[test]
    fn empty_insight_still_meets_cardinality() {
        let asset = assemble(&item(), "", PriorityTier::Standard);

        assert_eq!(asset.cards.len(), 3);
        assert_eq!(asset.quiz.len(), 3);
        assert!(asset.keywords.len() >= 3);
    }

    #[test]
    fn keywords_come_from_subjects_lowercased_and_deduped() {
        let asset = assemble(&item(), INSIGHT, PriorityTier::Standard);

        assert!(asset.keywords.contains(&"england".to_string()));
        assert!(asset.keywords.contains(&"courtship".to_string()));
        // "Fiction" appears twice in the subjects but only once as a tag
        assert_eq!(
            asset.keywords.iter().filter(|k| *k == "fiction").count(),
            1
        );
    }

    #[test]
    fn empty_subjects_fall_back_to_default_keywords() {
        let mut blank = item();
        blank.subjects = String::new();

        let asset = assemble(&blank, INSIGHT, PriorityTier::Standard);
        assert_eq!(
            asset.keywords,
            vec!["strategy", "decision-making", "efficiency"]
        );
    }

    #[test]
    fn narration_is_capped() {
        let long_insight = "word ".repeat(200);
        let asset = assemble(&item(), &long_insight, PriorityTier::Standard);
        assert!(asset.narration.chars().count() <= 320);
    }

    #[test]
    fn quiz_second_answer_is_first_sentence() {
        let asset = assemble(&item(), INSIGHT, PriorityTier::Standard);
        assert_eq!(asset.quiz[1].a, "First impressions are expensive to revise");
    }
}
