//! Template Store (C8): reusable, categorized, versioned evaluation prompts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::persistence::TemplateStore;

/// Role a template is written to evaluate a profile for. A known set of
/// categories is recognized by name (`CTO`, `CIO`, `CISO`, `CFO`, `CEO`,
/// ...), but the field is stored as plain text so a new category never
/// requires a schema change — the same "retain, flag, never reject"
/// treatment the canonical model gives `employee_range` buckets.
pub type TemplateCategory = String;

/// Known category names, used for a `debug!` flag on unrecognized values,
/// not for rejection.
pub const KNOWN_TEMPLATE_CATEGORIES: &[&str] = &["CTO", "CIO", "CISO", "CFO", "CEO"];

/// Reusable evaluation prompt, versioned per category (§3 invariant 8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PromptTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: TemplateCategory,
    pub prompt: String,
    pub version: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptTemplate {
    pub fn new(name: String, description: Option<String>, category: TemplateCategory, prompt: String, version: u32) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("template.name must not be empty".to_string()));
        }
        if prompt.trim().is_empty() {
            return Err(AppError::Validation("template.prompt must not be empty".to_string()));
        }
        if !KNOWN_TEMPLATE_CATEGORIES.contains(&category.as_str()) {
            tracing::debug!(category = %category, "unrecognized template category");
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            description,
            category,
            prompt,
            version,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Thin façade over a [`TemplateStore`] backend, providing the single
/// `resolve` interface the Scoring Job Engine uses (§4.8).
pub struct TemplateService {
    store: Arc<dyn TemplateStore>,
}

impl TemplateService {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, template: PromptTemplate) -> Result<PromptTemplate> {
        self.store.create(template).await
    }

    pub async fn get(&self, id: Uuid) -> Result<PromptTemplate> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::TemplateNotFound(id.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<PromptTemplate>> {
        self.store.list().await
    }

    pub async fn update(&self, template: PromptTemplate) -> Result<PromptTemplate> {
        self.store.update(template).await
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<()> {
        if self.store.deactivate(id).await? {
            Ok(())
        } else {
            Err(AppError::TemplateNotFound(id.to_string()))
        }
    }

    /// Resolves a template id into its prompt text, the single interface
    /// the scoring engine depends on (§4.8).
    pub async fn resolve(&self, template_id: Uuid) -> Result<String> {
        let template = self.get(template_id).await?;
        Ok(template.prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_blank_name_or_prompt() {
        assert!(PromptTemplate::new(
            "".to_string(),
            None,
            "CTO".to_string(),
            "prompt".to_string(),
            1
        )
        .is_err());
        assert!(PromptTemplate::new(
            "Tech Fit".to_string(),
            None,
            "CTO".to_string(),
            "".to_string(),
            1
        )
        .is_err());
    }

    #[test]
    fn new_stamps_active_and_timestamps() {
        let template = PromptTemplate::new(
            "Tech Fit".to_string(),
            None,
            "CTO".to_string(),
            "Evaluate tech fit".to_string(),
            1,
        )
        .unwrap();
        assert!(template.is_active);
        assert_eq!(template.created_at, template.updated_at);
    }
}
