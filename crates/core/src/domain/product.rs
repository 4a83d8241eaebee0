use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_name: String,
    pub sku: String,
    pub inventory: u32,
    pub description: String,
    pub tags: Vec<String>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.inventory > 0
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate.eq_ignore_ascii_case(tag))
    }

    pub fn shared_tags(&self, other: &Product) -> usize {
        self.tags.iter().filter(|tag| other.has_tag(tag)).count()
    }
}
