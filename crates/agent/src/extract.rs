//! Lightweight text extraction: identifiers and keyword classes pulled from one utterance.
//!
//! Everything here is pure. Misses return `None` or `false`; nothing errors.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use trailhead_core::domain::order::normalize_order_number;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static ORDER_NUMBER_RE: OnceLock<Regex> = OnceLock::new();

const ORDER_STEMS: &[&str] = &["order", "track"];
const PRODUCT_STEMS: &[&str] = &["product", "recommend", "search", "suggest"];
const PRODUCT_PHRASES: &[&str] = &["looking for", "show me", "find me"];
const PRODUCT_DETAIL_STEMS: &[&str] = &["product", "item", "detail"];
const PRODUCT_DETAIL_PHRASES: &[&str] = &["what's in", "what is in", "what was in", "what did i"];
const RECOMMEND_STEMS: &[&str] = &["recommend", "suggest", "similar", "complement"];
const RECOMMEND_PHRASES: &[&str] = &["go with", "goes with", "pair with"];
const PROMOTION_STEMS: &[&str] = &["discount", "promotion", "promo", "coupon"];
const PROMOTION_PHRASES: &[&str] = &["early riser"];
const CLOSING_WORDS: &[&str] = &["bye", "goodbye"];
const CLOSING_PHRASES: &[&str] = &["that's all", "that is all"];

const ACTIVITIES: &[&str] = &[
    "backpacking",
    "biking",
    "camping",
    "climbing",
    "cycling",
    "fishing",
    "hiking",
    "kayaking",
    "running",
    "skiing",
    "snowboarding",
    "trekking",
];

/// Case-folded text split into alphanumeric words (apostrophes kept).
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|character: char| !character.is_alphanumeric() && character != '\'')
        .filter(|word| !word.is_empty())
        .map(|word| word.to_string())
        .collect()
}

pub fn extract_email(text: &str) -> Option<String> {
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}")
            .expect("email pattern is valid")
    });
    re.find(text).map(|found| found.as_str().to_string())
}

/// First order-number token in `text`, in canonical `#W<digits>` form.
pub fn extract_order_number(text: &str) -> Option<String> {
    let re = ORDER_NUMBER_RE.get_or_init(|| {
        Regex::new(r"(?i)(?:#\s*w?|\bw)[-_]?\d{1,10}\b").expect("order number pattern is valid")
    });
    re.find_iter(text).find_map(|found| normalize_order_number(found.as_str()))
}

pub fn has_order_intent(text: &str) -> bool {
    has_stem(text, ORDER_STEMS) || extract_order_number(text).is_some()
}

pub fn has_product_intent(text: &str) -> bool {
    has_stem(text, PRODUCT_STEMS) || has_phrase(text, PRODUCT_PHRASES)
}

pub fn mentions_product_details(text: &str) -> bool {
    has_stem(text, PRODUCT_DETAIL_STEMS) || has_phrase(text, PRODUCT_DETAIL_PHRASES)
}

pub fn mentions_recommendation(text: &str) -> bool {
    has_stem(text, RECOMMEND_STEMS) || has_phrase(text, RECOMMEND_PHRASES)
}

pub fn has_promotion_intent(text: &str) -> bool {
    has_stem(text, PROMOTION_STEMS) || has_phrase(text, PROMOTION_PHRASES)
}

pub fn has_closing_intent(text: &str) -> bool {
    let words = words(text);
    words.iter().any(|word| CLOSING_WORDS.contains(&word.as_str()))
        || has_phrase(text, CLOSING_PHRASES)
}

/// Activity words that hint at what the customer is shopping for.
pub fn extract_preferences(text: &str) -> BTreeSet<String> {
    words(text)
        .into_iter()
        .filter(|word| ACTIVITIES.contains(&word.as_str()))
        .collect()
}

/// True when any word in `text` starts with one of `stems` (`orders` matches `order`).
fn has_stem(text: &str, stems: &[&str]) -> bool {
    words(text).iter().any(|word| stems.iter().any(|stem| word.starts_with(stem)))
}

fn has_phrase(text: &str, phrases: &[&str]) -> bool {
    let folded = text.to_lowercase().replace('\u{2019}', "'");
    phrases.iter().any(|phrase| folded.contains(phrase))
}
