use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{describe_transport_error, WordPressClient, CATEGORIES_PATH};
use crate::error::AppError;

/// Category as listed by the CMS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

/// Category display name -> remote id
#[derive(Debug, Clone, Default)]
pub struct CategoryMap(BTreeMap<String, i64>);

impl CategoryMap {
    pub fn new(entries: BTreeMap<String, i64>) -> Self {
        Self(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact match first, then case-insensitive.
    pub fn lookup(&self, name: &str) -> Option<i64> {
        let name = name.trim();
        self.0.get(name).copied().or_else(|| {
            let lower = name.to_lowercase();
            self.0
                .iter()
                .find(|(k, _)| k.to_lowercase() == lower)
                .map(|(_, id)| *id)
        })
    }

    /// Map names to ids, dropping unknown names with a warning. Order is kept, duplicates removed.
    pub fn resolve(&self, names: &[String]) -> Vec<i64> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match self.lookup(name) {
                Some(id) if !ids.contains(&id) => ids.push(id),
                Some(_) => {}
                None => warn!("Category '{}' not found on the CMS; skipping it", name),
            }
        }
        ids
    }
}

impl From<Vec<Category>> for CategoryMap {
    fn from(categories: Vec<Category>) -> Self {
        Self(categories.into_iter().map(|c| (c.name, c.id)).collect())
    }
}

/// Where category ids come from
#[derive(Debug, Clone)]
pub enum CategorySource {
    Static(CategoryMap),
    /// Fetched from the CMS on every publish call
    Live,
}

impl WordPressClient {
    /// List the site's categories (first 100).
    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let url = self.endpoint(CATEGORIES_PATH);
        let response = self
            .with_basic_auth(self.http().get(&url).query(&[("per_page", "100")]))
            .send()
            .await
            .map_err(|e| {
                let detail = describe_transport_error(&e);
                error!("Category lookup failed: {}", detail);
                AppError::upstream(detail)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("WordPress category lookup returned {}: {}", status, body);
            return Err(AppError::upstream(format!(
                "Failed to fetch categories from WordPress (HTTP {})",
                status.as_u16()
            )));
        }

        let categories: Vec<Category> = response.json().await.map_err(|e| {
            error!("Failed to parse WordPress categories: {}", e);
            AppError::upstream("Failed to parse categories returned by WordPress")
        })?;
        info!("Fetched {} categories from WordPress", categories.len());
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> CategoryMap {
        let mut m = BTreeMap::new();
        m.insert("समाचार".to_string(), 3);
        m.insert("Economy".to_string(), 7);
        CategoryMap::new(m)
    }

    #[test]
    fn unknown_names_are_dropped() {
        let ids = map().resolve(&["समाचार".into(), "Sports".into(), "Economy".into()]);
        assert_eq!(ids, vec![3, 7]);
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive() {
        assert_eq!(map().lookup("economy"), Some(7));
        assert_eq!(map().lookup(" Economy "), Some(7));
        assert_eq!(map().lookup("politics"), None);
    }

    #[test]
    fn duplicate_names_yield_one_id() {
        assert_eq!(map().resolve(&["Economy".into(), "economy".into()]), vec![7]);
    }

    #[test]
    fn categories_deserialize_without_slug() {
        let cats: Vec<Category> = serde_json::from_str(r#"[{"id":1,"name":"Uncategorized","count":4}]"#).unwrap();
        assert_eq!(cats[0].slug, "");
        assert_eq!(CategoryMap::from(cats).lookup("Uncategorized"), Some(1));
    }
}
