use std::collections::HashMap;

use async_trait::async_trait;
use libsql::{params_from_iter, Row, Value};
use serde_json::Map;

use super::connection::Database;
use crate::errors::{LinkError, Result};
use crate::store::{ComponentRepository, RelationshipRepository};
use crate::types::*;

/// Maximum number of bound parameters per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

const RELATIONSHIP_COLUMNS: &str = "r.id, r.kind, r.source_id, r.target_id, r.line, r.col,
        r.metadata, r.resolved_source_id, r.resolved_target_id,
        EXISTS (SELECT 1 FROM components c WHERE c.id = r.source_id) AS source_known,
        EXISTS (SELECT 1 FROM components c WHERE c.id = r.target_id) AS target_known";

// ---------------------------------------------------------------------------
// Helper: map a libsql row to domain types
// ---------------------------------------------------------------------------

fn text(row: &Row, idx: i32) -> Result<Option<String>> {
    Ok(match row.get_value(idx)? {
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Null | Value::Blob(_) => None,
    })
}

fn required_text(row: &Row, idx: i32) -> Result<String> {
    text(row, idx)?.ok_or_else(|| LinkError::database("read_row", format!("column {idx} is NULL")))
}

fn integer(row: &Row, idx: i32) -> Result<Option<i64>> {
    Ok(match row.get_value(idx)? {
        Value::Integer(i) => Some(i),
        _ => None,
    })
}

fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::Text(s.to_string()))
}

/// Maps a row from the `components` table to a `Component`.
fn row_to_component(row: &Row) -> Result<Component> {
    Ok(Component {
        id: required_text(row, 0)?,
        name: required_text(row, 1)?,
        kind: required_text(row, 2)?,
        file_path: required_text(row, 3)?,
        language: Language::from_str(&required_text(row, 4)?),
    })
}

/// Maps a row selected with [`RELATIONSHIP_COLUMNS`] to a decoded
/// `Relationship`.
fn row_to_relationship(row: &Row) -> Result<Relationship> {
    let raw = row_to_raw_relationship(row)?;
    let source_known = integer(row, 9)?.unwrap_or(0) != 0;
    let target_known = integer(row, 10)?.unwrap_or(0) != 0;
    Ok(raw.decode(source_known, target_known))
}

fn row_to_raw_relationship(row: &Row) -> Result<RawRelationship> {
    let location = match (integer(row, 4)?, integer(row, 5)?) {
        (Some(line), Some(column)) => Some(Location {
            line: line as u32,
            column: column as u32,
        }),
        _ => None,
    };
    let metadata = parse_metadata(text(row, 6)?);
    Ok(RawRelationship {
        id: required_text(row, 0)?,
        kind: required_text(row, 1)?,
        source_id: required_text(row, 2)?,
        target_id: required_text(row, 3)?,
        location,
        metadata,
        resolved_source_id: text(row, 7)?,
        resolved_target_id: text(row, 8)?,
    })
}

/// Stored metadata as a JSON object; NULL, empty or invalid JSON read as `{}`.
fn parse_metadata(raw: Option<String>) -> Map<String, serde_json::Value> {
    match raw {
        Some(raw) if !raw.is_empty() => {
            serde_json::from_str::<Map<String, serde_json::Value>>(&raw).unwrap_or_default()
        }
        _ => Map::new(),
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn text_params(values: &[String]) -> Vec<Value> {
    values.iter().map(|v| Value::Text(v.clone())).collect()
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

impl Database {
    /// Inserts or replaces a batch of components inside a single transaction.
    pub async fn insert_components(&self, components: &[Component]) -> Result<()> {
        let tx = self.conn().transaction().await.map_err(|e| {
            LinkError::database("insert_components", format!("failed to begin transaction: {e}"))
        })?;

        for component in components {
            tx.execute(
                "INSERT OR REPLACE INTO components (id, name, kind, file_path, language)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params_from_iter(vec![
                    Value::Text(component.id.clone()),
                    Value::Text(component.name.clone()),
                    Value::Text(component.kind.clone()),
                    Value::Text(component.file_path.clone()),
                    Value::Text(component.language.as_str().to_string()),
                ]),
            )
            .await
            .map_err(|e| {
                LinkError::database("insert_components", format!("failed to insert component: {e}"))
            })?;
        }

        tx.commit().await.map_err(|e| {
            LinkError::database("insert_components", format!("failed to commit transaction: {e}"))
        })
    }

    /// Inserts or replaces a batch of relationships inside a single transaction.
    pub async fn insert_relationships(&self, relationships: &[RawRelationship]) -> Result<()> {
        let tx = self.conn().transaction().await.map_err(|e| {
            LinkError::database("insert_relationships", format!("failed to begin transaction: {e}"))
        })?;

        for rel in relationships {
            let (line, col) = match rel.location {
                Some(loc) => (Value::Integer(loc.line.into()), Value::Integer(loc.column.into())),
                None => (Value::Null, Value::Null),
            };
            tx.execute(
                "INSERT OR REPLACE INTO relationships
                    (id, kind, source_id, target_id, line, col, metadata,
                     resolved_source_id, resolved_target_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params_from_iter(vec![
                    Value::Text(rel.id.clone()),
                    Value::Text(rel.kind.clone()),
                    Value::Text(rel.source_id.clone()),
                    Value::Text(rel.target_id.clone()),
                    line,
                    col,
                    Value::Text(serde_json::to_string(&rel.metadata)?),
                    opt_text(rel.resolved_source_id.as_deref()),
                    opt_text(rel.resolved_target_id.as_deref()),
                ]),
            )
            .await
            .map_err(|e| {
                LinkError::database("insert_relationships", format!("failed to insert relationship: {e}"))
            })?;
        }

        tx.commit().await.map_err(|e| {
            LinkError::database("insert_relationships", format!("failed to commit transaction: {e}"))
        })
    }

    /// Removes all data from every table.
    pub async fn clear(&self) -> Result<()> {
        self.conn()
            .execute_batch(
                "DELETE FROM relationships;
                 DELETE FROM components;",
            )
            .await
            .map_err(|e| LinkError::database("clear", format!("failed to clear database: {e}")))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

impl Database {
    /// Retrieves a relationship as stored, returning `None` if not found.
    pub async fn get_relationship(&self, id: &str) -> Result<Option<RawRelationship>> {
        let sql = format!("SELECT {RELATIONSHIP_COLUMNS} FROM relationships r WHERE r.id = ?1");
        let mut rows = self
            .conn()
            .query(&sql, params_from_iter(vec![Value::Text(id.to_string())]))
            .await
            .map_err(|e| LinkError::database("get_relationship", e))?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_raw_relationship(&row)?)),
            None => Ok(None),
        }
    }

    /// Counts relationships and how many still wait on either side.
    pub async fn unresolved_counts(&self) -> Result<UnresolvedCounts> {
        let mut rows = self
            .conn()
            .query(
                "SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN r.resolved_target_id IS NULL
                        AND NOT EXISTS (SELECT 1 FROM components c WHERE c.id = r.target_id)
                        THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN r.resolved_source_id IS NULL
                        AND NOT EXISTS (SELECT 1 FROM components c WHERE c.id = r.source_id)
                        THEN 1 ELSE 0 END), 0)
                 FROM relationships r",
                (),
            )
            .await
            .map_err(|e| LinkError::database("unresolved_counts", e))?;

        let Some(row) = rows.next().await? else {
            return Ok(UnresolvedCounts::default());
        };
        Ok(UnresolvedCounts {
            relationships: integer(&row, 0)?.unwrap_or(0) as u64,
            unresolved_targets: integer(&row, 1)?.unwrap_or(0) as u64,
            unresolved_sources: integer(&row, 2)?.unwrap_or(0) as u64,
        })
    }

    async fn unresolved(&self, side: &str, operation: &str) -> Result<Vec<Relationship>> {
        let sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS}
             FROM relationships r
             WHERE r.resolved_{side}_id IS NULL
               AND NOT EXISTS (SELECT 1 FROM components c WHERE c.id = r.{side}_id)
             ORDER BY r.id"
        );
        let mut rows = self
            .conn()
            .query(&sql, ())
            .await
            .map_err(|e| LinkError::database(operation, e))?;

        let mut relationships = Vec::new();
        while let Some(row) = rows.next().await? {
            relationships.push(row_to_relationship(&row)?);
        }
        Ok(relationships)
    }

    async fn components_where_in(&self, column: &str, values: &[String]) -> Result<Vec<Component>> {
        let mut components = Vec::new();
        for chunk in values.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT id, name, kind, file_path, language FROM components
                 WHERE {column} IN ({})
                 ORDER BY id",
                placeholders(chunk.len())
            );
            let mut rows = self
                .conn()
                .query(&sql, params_from_iter(text_params(chunk)))
                .await
                .map_err(|e| LinkError::database("components_where_in", e))?;
            while let Some(row) = rows.next().await? {
                components.push(row_to_component(&row)?);
            }
        }
        Ok(components)
    }
}

// ---------------------------------------------------------------------------
// Repository implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl RelationshipRepository for Database {
    async fn ensure_indexes(&self) -> Result<()> {
        self.conn()
            .execute_batch(
                "CREATE INDEX IF NOT EXISTS idx_relationships_unresolved_target
                    ON relationships(target_id) WHERE resolved_target_id IS NULL;
                 CREATE INDEX IF NOT EXISTS idx_relationships_unresolved_source
                    ON relationships(source_id) WHERE resolved_source_id IS NULL;",
            )
            .await
            .map_err(|e| LinkError::database("ensure_indexes", e))?;
        Ok(())
    }

    async fn get_unresolved_targets(&self) -> Result<Vec<Relationship>> {
        self.unresolved("target", "get_unresolved_targets").await
    }

    async fn get_unresolved_sources(&self) -> Result<Vec<Relationship>> {
        self.unresolved("source", "get_unresolved_sources").await
    }

    async fn update_relationships_bulk(&self, patches: &[RelationshipPatch]) -> Result<usize> {
        let tx = self.conn().transaction().await.map_err(|e| {
            LinkError::database("update_relationships_bulk", format!("failed to begin transaction: {e}"))
        })?;

        let mut updated = 0usize;
        for patch in patches {
            // Merged here rather than with json_patch, which drops keys
            // whose value is null.
            let mut rows = tx
                .query(
                    "SELECT metadata FROM relationships WHERE id = ?1",
                    params_from_iter(vec![Value::Text(patch.relationship_id.clone())]),
                )
                .await
                .map_err(|e| {
                    LinkError::database("update_relationships_bulk", format!("failed to read metadata: {e}"))
                })?;
            let Some(row) = rows.next().await? else {
                continue;
            };
            let stored = parse_metadata(text(&row, 0)?);
            drop(rows);
            let merged = merge_metadata(&stored, patch.metadata.clone());

            let changed = tx
                .execute(
                    "UPDATE relationships
                     SET resolved_target_id = COALESCE(resolved_target_id, ?1),
                         resolved_source_id = COALESCE(resolved_source_id, ?2),
                         metadata = ?3
                     WHERE id = ?4",
                    params_from_iter(vec![
                        opt_text(patch.resolved_target_id.as_deref()),
                        opt_text(patch.resolved_source_id.as_deref()),
                        Value::Text(serde_json::to_string(&merged)?),
                        Value::Text(patch.relationship_id.clone()),
                    ]),
                )
                .await
                .map_err(|e| {
                    LinkError::database("update_relationships_bulk", format!("failed to apply patch: {e}"))
                })?;
            updated += changed as usize;
        }

        tx.commit().await.map_err(|e| {
            LinkError::database("update_relationships_bulk", format!("failed to commit transaction: {e}"))
        })?;
        Ok(updated)
    }
}

#[async_trait]
impl ComponentRepository for Database {
    async fn get_component(&self, id: &str) -> Result<Option<Component>> {
        let mut found = self.components_where_in("id", &[id.to_string()]).await?;
        Ok(found.pop())
    }

    async fn get_components(&self, ids: &[String]) -> Result<Vec<Component>> {
        self.components_where_in("id", ids).await
    }

    async fn search_components(&self, query: &ComponentQuery) -> Result<Vec<Component>> {
        let mut sql = "SELECT id, name, kind, file_path, language FROM components
                       WHERE lower(name) LIKE ?1"
            .to_string();
        let mut params = vec![Value::Text(format!("%{}%", query.name_contains.to_lowercase()))];
        if let Some(language) = query.language {
            sql.push_str(" AND language = ?2");
            params.push(Value::Text(language.as_str().to_string()));
        }
        sql.push_str(&format!(" ORDER BY id LIMIT {}", query.limit));

        let mut rows = self
            .conn()
            .query(&sql, params_from_iter(params))
            .await
            .map_err(|e| LinkError::database("search_components", e))?;
        let mut components = Vec::new();
        while let Some(row) = rows.next().await? {
            components.push(row_to_component(&row)?);
        }
        Ok(components)
    }

    async fn ids_by_names(&self, names: &[String]) -> Result<HashMap<String, Vec<String>>> {
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for component in self.components_where_in("name", names).await? {
            result.entry(component.name).or_default().push(component.id);
        }
        Ok(result)
    }

    async fn ids_by_file_paths(&self, paths: &[String]) -> Result<HashMap<String, String>> {
        let mut result = HashMap::new();
        let mut components = self.components_where_in("file_path", paths).await?;
        // File components first, then by id.
        components.sort_by(|a, b| b.is_file().cmp(&a.is_file()).then_with(|| a.id.cmp(&b.id)));
        for component in components {
            result.entry(component.file_path).or_insert(component.id);
        }
        Ok(result)
    }
}
