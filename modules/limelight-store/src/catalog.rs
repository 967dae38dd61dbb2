//! Entity, alias, and relationship persistence.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use limelight_common::{Alias, Entity, EntityRelationship, EntityType, RelationKind};

use crate::error::{Result, StoreError};
use crate::store::Store;

#[derive(Debug, sqlx::FromRow)]
struct EntityRow {
    entity_id: String,
    entity_key: String,
    canonical_name: String,
    entity_type: String,
    is_pinned: bool,
    is_active: bool,
    first_seen_at: Option<DateTime<Utc>>,
    last_seen_at: Option<DateTime<Utc>>,
    dormant_since: Option<DateTime<Utc>>,
    external_ids: String,
    context_hints: String,
    metadata: String,
}

impl EntityRow {
    fn into_entity(self) -> Result<Entity> {
        let entity_type: EntityType =
            serde_json::from_value(serde_json::Value::String(self.entity_type.clone()))
                .map_err(|e| StoreError::corrupt("entities", e))?;
        Ok(Entity {
            entity_id: self.entity_id,
            entity_key: self.entity_key,
            canonical_name: self.canonical_name,
            entity_type,
            is_pinned: self.is_pinned,
            is_active: self.is_active,
            first_seen_at: self.first_seen_at,
            last_seen_at: self.last_seen_at,
            dormant_since: self.dormant_since,
            external_ids: serde_json::from_str(&self.external_ids)
                .map_err(|e| StoreError::corrupt("entities", e))?,
            context_hints: serde_json::from_str(&self.context_hints)
                .map_err(|e| StoreError::corrupt("entities", e))?,
            metadata: serde_json::from_str(&self.metadata)
                .map_err(|e| StoreError::corrupt("entities", e))?,
        })
    }
}

fn entity_type_str(t: EntityType) -> String {
    t.to_string()
}

impl Store {
    /// Create-or-update an entity. Pinned/active flags and descriptive
    /// fields follow the incoming record; first_seen_at is preserved.
    pub async fn upsert_entity(&self, entity: &Entity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entities
                (entity_id, entity_key, canonical_name, entity_type, is_pinned, is_active,
                 first_seen_at, last_seen_at, dormant_since, external_ids, context_hints, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(entity_id) DO UPDATE SET
                entity_key = excluded.entity_key,
                canonical_name = excluded.canonical_name,
                entity_type = excluded.entity_type,
                is_pinned = excluded.is_pinned,
                is_active = excluded.is_active,
                last_seen_at = excluded.last_seen_at,
                dormant_since = excluded.dormant_since,
                external_ids = excluded.external_ids,
                context_hints = excluded.context_hints,
                metadata = excluded.metadata
            "#,
        )
        .bind(&entity.entity_id)
        .bind(&entity.entity_key)
        .bind(&entity.canonical_name)
        .bind(entity_type_str(entity.entity_type))
        .bind(entity.is_pinned)
        .bind(entity.is_active)
        .bind(entity.first_seen_at)
        .bind(entity.last_seen_at)
        .bind(entity.dormant_since)
        .bind(serde_json::to_string(&entity.external_ids).unwrap_or_else(|_| "{}".into()))
        .bind(serde_json::to_string(&entity.context_hints).unwrap_or_else(|_| "[]".into()))
        .bind(entity.metadata.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_entity(&self, entity_id: &str) -> Result<Option<Entity>> {
        let row = sqlx::query_as::<_, EntityRow>("SELECT * FROM entities WHERE entity_id = ?1")
            .bind(entity_id)
            .fetch_optional(self.pool())
            .await?;
        row.map(EntityRow::into_entity).transpose()
    }

    pub async fn active_entities(&self) -> Result<Vec<Entity>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            "SELECT * FROM entities WHERE is_active = 1 ORDER BY entity_id",
        )
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    /// Aliases are unique on (entity_id, normalized form); re-syncing the
    /// catalog is a no-op for existing rows.
    pub async fn upsert_alias(&self, alias: &Alias) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entity_aliases (entity_id, surface, surface_norm, is_primary, confidence)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(entity_id, surface_norm) DO UPDATE SET
                surface = excluded.surface,
                is_primary = excluded.is_primary,
                confidence = excluded.confidence
            "#,
        )
        .bind(&alias.entity_id)
        .bind(&alias.surface)
        .bind(&alias.surface_norm)
        .bind(alias.is_primary)
        .bind(alias.confidence)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn aliases_by_entity(&self) -> Result<HashMap<String, Vec<Alias>>> {
        let rows = sqlx::query_as::<_, (String, String, String, bool, f64)>(
            "SELECT entity_id, surface, surface_norm, is_primary, confidence
             FROM entity_aliases ORDER BY entity_id, surface_norm",
        )
        .fetch_all(self.pool())
        .await?;
        let mut map: HashMap<String, Vec<Alias>> = HashMap::new();
        for (entity_id, surface, surface_norm, is_primary, confidence) in rows {
            map.entry(entity_id.clone()).or_default().push(Alias {
                entity_id,
                surface,
                surface_norm,
                is_primary,
                confidence,
            });
        }
        Ok(map)
    }

    pub async fn upsert_relationship(&self, rel: &EntityRelationship) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO entity_relationships (from_entity_id, to_entity_id, kind)
             VALUES (?1, ?2, ?3)",
        )
        .bind(&rel.from_entity_id)
        .bind(&rel.to_entity_id)
        .bind(relation_kind_str(rel.kind))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn relationships(&self) -> Result<Vec<EntityRelationship>> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT from_entity_id, to_entity_id, kind FROM entity_relationships",
        )
        .fetch_all(self.pool())
        .await?;
        rows.into_iter()
            .map(|(from_entity_id, to_entity_id, kind)| {
                Ok(EntityRelationship {
                    from_entity_id,
                    to_entity_id,
                    kind: parse_relation_kind(&kind)?,
                })
            })
            .collect()
    }
}

fn relation_kind_str(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::ParentChild => "parent_child",
        RelationKind::CoupleMember => "couple_member",
        RelationKind::BrandOwns => "brand_owns",
    }
}

fn parse_relation_kind(s: &str) -> Result<RelationKind> {
    match s {
        "parent_child" => Ok(RelationKind::ParentChild),
        "couple_member" => Ok(RelationKind::CoupleMember),
        "brand_owns" => Ok(RelationKind::BrandOwns),
        other => Err(StoreError::corrupt(
            "entity_relationships",
            format!("unknown kind {other}"),
        )),
    }
}
