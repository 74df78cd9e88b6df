//! Category model and paged server responses

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Expense category as provided by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub is_offline: bool,
    #[serde(default)]
    pub owner: Option<String>,
}

/// One page of a server listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_parses_with_missing_counters() {
        let raw = r#"{"items": [{"id": "00000000-0000-0000-0000-000000000001", "name": "Food"}]}"#;
        let page: Page<Category> = serde_json::from_str(raw).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Food");
        assert_eq!(page.total, 0);
        assert!(page.items[0].owner.is_none());
    }
}
