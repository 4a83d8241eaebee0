use serde::{Deserialize, Serialize};

/// A customer order as held in the order book.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub customer_name: String,
    pub email: String,
    pub order_number: String,
    pub products_ordered: Vec<String>,
    pub status: String,
    pub tracking_number: Option<String>,
}

impl Order {
    pub fn matches(&self, email: &str, order_number: &str) -> bool {
        let Some(wanted) = normalize_order_number(order_number) else {
            return false;
        };
        self.email.trim().eq_ignore_ascii_case(email.trim())
            && normalize_order_number(&self.order_number).as_deref() == Some(wanted.as_str())
    }

    pub fn is_shipped(&self) -> bool {
        self.tracking_number.as_deref().is_some_and(|number| !number.trim().is_empty())
    }
}

/// Canonical `#W<digits>` form of an order number.
///
/// Accepts the spellings customers actually type: `#W002`, `w002`, `W-002`, `#002`.
pub fn normalize_order_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_hash = trimmed.strip_prefix('#').unwrap_or(trimmed).trim_start();
    let without_prefix = without_hash
        .strip_prefix('W')
        .or_else(|| without_hash.strip_prefix('w'))
        .unwrap_or(without_hash);
    let digits = without_prefix.trim_start_matches(['-', '_']);

    if digits.is_empty() || !digits.chars().all(|character| character.is_ascii_digit()) {
        return None;
    }
    if without_prefix.len() == without_hash.len() && !trimmed.starts_with('#') {
        // a bare number is not an order number
        return None;
    }

    Some(format!("#W{digits}"))
}
