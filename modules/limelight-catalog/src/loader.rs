//! Catalog loading and pinned-entity sync.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use limelight_common::{
    normalize_surface, Alias, CatalogEntry, Entity, EntityRelationship, EntityType, PipelineError,
};
use limelight_store::Store;
use serde::Deserialize;
use tracing::info;

/// One record of `config/pinned_entities.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct PinnedEntity {
    pub entity_id: String,
    #[serde(default)]
    pub entity_key: Option<String>,
    pub canonical_name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub external_ids: HashMap<String, String>,
    #[serde(default)]
    pub context_hints: Vec<String>,
    #[serde(default)]
    pub pin_reason: Option<String>,
}

/// The resolver's view of the catalog for one run: entries plus lookup
/// maps, loaded once and read-only thereafter.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
    by_id: HashMap<String, usize>,
    pub relationships: Vec<EntityRelationship>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>, relationships: Vec<EntityRelationship>) -> Self {
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.entity.entity_id.clone(), i))
            .collect();
        Self {
            entries,
            by_id,
            relationships,
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<&CatalogEntry> {
        self.by_id.get(entity_id).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pinned_active(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| e.entity.is_pinned && e.entity.is_active)
    }
}

fn read_pinned_file(path: &Path) -> Result<Vec<PinnedEntity>, PipelineError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| PipelineError::Config(format!("parse {}: {e}", path.display())))
}

/// Upsert pinned entities and their aliases into the store. The canonical
/// name always doubles as an alias.
pub async fn sync_pinned_entities(store: &Store, path: &Path) -> Result<usize, PipelineError> {
    let pinned = read_pinned_file(path)?;
    let now = Utc::now();

    for p in &pinned {
        let existing = store.get_entity(&p.entity_id).await?;
        let entity = Entity {
            entity_id: p.entity_id.clone(),
            entity_key: p.entity_key.clone().unwrap_or_else(|| p.entity_id.clone()),
            canonical_name: p.canonical_name.clone(),
            entity_type: p.entity_type,
            is_pinned: true,
            is_active: true,
            first_seen_at: existing.as_ref().and_then(|e| e.first_seen_at).or(Some(now)),
            last_seen_at: Some(now),
            dormant_since: existing.as_ref().and_then(|e| e.dormant_since),
            external_ids: p.external_ids.clone(),
            context_hints: p.context_hints.clone(),
            metadata: serde_json::json!({ "pin_reason": p.pin_reason }),
        };
        store.upsert_entity(&entity).await?;

        for (i, surface) in std::iter::once(&p.canonical_name)
            .chain(p.aliases.iter())
            .enumerate()
        {
            let surface_norm = normalize_surface(surface);
            if surface_norm.is_empty() {
                continue;
            }
            store
                .upsert_alias(&Alias {
                    entity_id: p.entity_id.clone(),
                    surface: surface.clone(),
                    surface_norm,
                    is_primary: i == 0,
                    confidence: 1.0,
                })
                .await?;
        }
    }

    info!(count = pinned.len(), "Synced pinned entities");
    Ok(pinned.len())
}

/// Load the merged catalog snapshot for a run: all active entities with
/// their aliases. Pinned entities carry a higher prior than promoted ones.
pub async fn load_catalog(store: &Store) -> Result<Catalog, PipelineError> {
    let entities = store.active_entities().await?;
    let mut aliases = store.aliases_by_entity().await?;
    let relationships = store.relationships().await?;

    let entries = entities
        .into_iter()
        .map(|entity| {
            let mut alias_list: Vec<String> = aliases
                .remove(&entity.entity_id)
                .unwrap_or_default()
                .into_iter()
                .map(|a| a.surface)
                .collect();
            let canonical_norm = normalize_surface(&entity.canonical_name);
            if !alias_list
                .iter()
                .any(|a| normalize_surface(a) == canonical_norm)
            {
                alias_list.push(entity.canonical_name.clone());
            }
            let prior_weight = if entity.is_pinned { 1.0 } else { 0.5 };
            CatalogEntry {
                entity,
                aliases: alias_list,
                prior_weight,
            }
        })
        .collect();

    Ok(Catalog::new(entries, relationships))
}
