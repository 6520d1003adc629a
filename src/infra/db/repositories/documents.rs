use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, upsert::excluded};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::documents::{DocumentEntity, DocumentSnapshot, UpsertDocumentEntity},
        repositories::record_store::{FieldFilter, RecordStore},
        value_objects::external_reference::OwnerPath,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::documents},
};

pub struct DocumentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl DocumentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RecordStore for DocumentPostgres {
    async fn get(&self, path: &str) -> Result<Option<DocumentSnapshot>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = documents::table
            .filter(documents::path.eq(path))
            .select(DocumentEntity::as_select())
            .first::<DocumentEntity>(&mut conn)
            .optional()?;

        Ok(result.map(DocumentSnapshot::from))
    }

    async fn set_merge(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        let owner = OwnerPath::parse(path)?;
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let upsert = UpsertDocumentEntity {
            path: owner.to_string(),
            collection: owner.collection().to_string(),
            data: Value::Object(fields),
        };

        // jsonb `||` replaces top-level keys and keeps the others.
        insert_into(documents::table)
            .values(&upsert)
            .on_conflict(documents::path)
            .do_update()
            .set((
                documents::data.eq(documents::data.concat(excluded(documents::data))),
                documents::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: Vec<FieldFilter>,
    ) -> Result<Vec<DocumentSnapshot>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let containment: Map<String, Value> = filters
            .into_iter()
            .map(|filter| (filter.field, filter.value))
            .collect();

        let results = documents::table
            .filter(documents::collection.eq(collection))
            .filter(documents::data.contains(Value::Object(containment)))
            .order(documents::created_at.asc())
            .select(DocumentEntity::as_select())
            .load::<DocumentEntity>(&mut conn)?;

        Ok(results.into_iter().map(DocumentSnapshot::from).collect())
    }

    async fn add(&self, collection: &str, fields: Map<String, Value>) -> Result<String> {
        let document_id = Uuid::new_v4().to_string();
        let owner = OwnerPath::new(collection, &document_id)?;
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let insert = UpsertDocumentEntity {
            path: owner.to_string(),
            collection: owner.collection().to_string(),
            data: Value::Object(fields),
        };

        insert_into(documents::table)
            .values(&insert)
            .execute(&mut conn)?;

        Ok(document_id)
    }
}
