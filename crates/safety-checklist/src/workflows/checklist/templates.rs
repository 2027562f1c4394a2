use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::domain::{ItemId, TemplateId};

/// A single prompt on a checklist template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub id: ItemId,
    pub text: String,
    pub required: bool,
}

/// Immutable, versioned item list for one work type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistTemplate {
    pub id: TemplateId,
    pub work_type: String,
    pub version: u32,
    pub items: Vec<TemplateItem>,
}

impl ChecklistTemplate {
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter().map(|item| &item.id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("template {work_type} v{version} is already published")]
    DuplicateVersion { work_type: String, version: u32 },
    #[error("template {work_type} v{version} does not supersede latest v{latest}")]
    StaleVersion {
        work_type: String,
        version: u32,
        latest: u32,
    },
    #[error("template id {0} is already published")]
    DuplicateId(TemplateId),
    #[error("template {0} repeats item ids")]
    DuplicateItem(TemplateId),
    #[error("no template published for work type '{0}'")]
    UnknownWorkType(String),
    #[error("template {0} not found")]
    UnknownTemplate(TemplateId),
    #[error("unable to read template file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse template file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Append-only catalog of published templates keyed by work type.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    by_work_type: BTreeMap<String, Vec<ChecklistTemplate>>,
}

impl TemplateCatalog {
    pub fn from_templates(
        templates: impl IntoIterator<Item = ChecklistTemplate>,
    ) -> Result<Self, CatalogError> {
        let mut sorted: Vec<_> = templates.into_iter().collect();
        sorted.sort_by(|a, b| {
            a.work_type
                .cmp(&b.work_type)
                .then_with(|| a.version.cmp(&b.version))
        });

        let mut catalog = Self::default();
        for template in sorted {
            catalog.publish(template)?;
        }
        Ok(catalog)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)?;
        let templates: Vec<ChecklistTemplate> = serde_json::from_str(&raw)?;
        Self::from_templates(templates)
    }

    /// Work types seeded for the initial deployment.
    pub fn standard() -> Self {
        let mut catalog = Self::default();
        for template in standard_templates() {
            catalog
                .by_work_type
                .entry(template.work_type.clone())
                .or_default()
                .push(template);
        }
        catalog
    }

    /// Publish a new version. Existing versions are never replaced.
    pub fn publish(&mut self, template: ChecklistTemplate) -> Result<(), CatalogError> {
        let mut seen = BTreeSet::new();
        if !template.items.iter().all(|item| seen.insert(&item.id)) {
            return Err(CatalogError::DuplicateItem(template.id));
        }

        if self.get(&template.id).is_some() {
            return Err(CatalogError::DuplicateId(template.id));
        }

        let versions = self
            .by_work_type
            .entry(template.work_type.clone())
            .or_default();

        if versions
            .iter()
            .any(|existing| existing.version == template.version)
        {
            return Err(CatalogError::DuplicateVersion {
                work_type: template.work_type,
                version: template.version,
            });
        }

        if let Some(latest) = versions.last() {
            if template.version < latest.version {
                return Err(CatalogError::StaleVersion {
                    work_type: template.work_type,
                    version: template.version,
                    latest: latest.version,
                });
            }
        }

        versions.push(template);
        Ok(())
    }

    pub fn get_template(&self, work_type: &str) -> Result<&ChecklistTemplate, CatalogError> {
        self.by_work_type
            .get(work_type)
            .and_then(|versions| versions.last())
            .ok_or_else(|| CatalogError::UnknownWorkType(work_type.to_string()))
    }

    pub fn get(&self, id: &TemplateId) -> Option<&ChecklistTemplate> {
        self.by_work_type
            .values()
            .flat_map(|versions| versions.iter())
            .find(|template| &template.id == id)
    }

    pub fn list_templates(&self) -> Vec<&ChecklistTemplate> {
        self.by_work_type
            .values()
            .flat_map(|versions| versions.iter())
            .collect()
    }
}

fn required(id: &str, text: &str) -> TemplateItem {
    TemplateItem {
        id: ItemId(id.to_string()),
        text: text.to_string(),
        required: true,
    }
}

fn standard_templates() -> Vec<ChecklistTemplate> {
    vec![
        ChecklistTemplate {
            id: TemplateId("ladder_v1".to_string()),
            work_type: "Ladder work".to_string(),
            version: 1,
            items: vec![
                required("item1", "Is the ladder set up on a stable surface?"),
                required("item2", "Is the ladder free of damage or defects?"),
                required(
                    "item3",
                    "Is the working radius clear of power lines and other hazards?",
                ),
                required(
                    "item4",
                    "Are anti-slip measures (outriggers, fixings) in place?",
                ),
            ],
        },
        ChecklistTemplate {
            id: TemplateId("platform_v1".to_string()),
            work_type: "Aerial work platform".to_string(),
            version: 1,
            items: vec![
                required("item1", "Was the equipment inspected before work?"),
                required(
                    "item2",
                    "Are harness, hard hat and other protective equipment worn?",
                ),
                required("item3", "Is access to the work zone controlled?"),
                required("item4", "Is the platform's maximum load respected?"),
            ],
        },
        ChecklistTemplate {
            id: TemplateId("confined_space_v1".to_string()),
            work_type: "Confined space entry".to_string(),
            version: 1,
            items: vec![
                required(
                    "item1",
                    "Were oxygen and toxic gas levels measured before entry?",
                ),
                required("item2", "Is the ventilation equipment operating normally?"),
                required(
                    "item3",
                    "Are an attendant and an emergency contact procedure in place?",
                ),
                required(
                    "item4",
                    "Has the worker completed the relevant safety training?",
                ),
            ],
        },
    ]
}
