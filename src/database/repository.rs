use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument, UpdateOptions};
use mongodb::Collection;

use super::manager::{DatabaseError, DatabaseManager};
use super::serialize::now;
use crate::filter::{and_filters, Filter};

/// Document-level access to one collection. Callers pass the tenant filter
/// produced by the access layer; it is ANDed into every query here.
#[derive(Clone)]
pub struct Repository {
    name: &'static str,
    collection: Collection<Document>,
}

impl Repository {
    pub async fn open(name: &'static str) -> Result<Self, DatabaseError> {
        let collection = DatabaseManager::collection(name).await?;
        Ok(Self { name, collection })
    }

    /// One page of documents plus the total matching count
    pub async fn select_page(
        &self,
        filter: &Filter,
        scope: Document,
    ) -> Result<(Vec<Document>, u64), DatabaseError> {
        let query = and_filters(filter.where_document().clone(), scope);
        let total = self.collection.count_documents(query.clone(), None).await?;
        let documents = self
            .collection
            .find(query, filter.find_options())
            .await?
            .try_collect()
            .await?;
        Ok((documents, total))
    }

    pub async fn select_any(
        &self,
        query: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>, DatabaseError> {
        let options = FindOptions::builder().sort(sort).build();
        let documents = self.collection.find(query, options).await?.try_collect().await?;
        Ok(documents)
    }

    pub async fn select_one(&self, query: Document) -> Result<Option<Document>, DatabaseError> {
        Ok(self.collection.find_one(query, None).await?)
    }

    pub async fn select_404(&self, id: ObjectId, scope: Document) -> Result<Document, DatabaseError> {
        let query = and_filters(doc! { "_id": id }, scope);
        self.select_one(query)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} record not found", self.label())))
    }

    pub async fn count(&self, query: Document) -> Result<u64, DatabaseError> {
        Ok(self.collection.count_documents(query, None).await?)
    }

    /// Insert with `created_at`/`updated_at`, returning the stored document
    pub async fn insert_one(&self, mut document: Document) -> Result<Document, DatabaseError> {
        let timestamp = now();
        if !document.contains_key("created_at") {
            document.insert("created_at", timestamp);
        }
        document.insert("updated_at", timestamp);
        document.remove("_id");

        let result = self.collection.insert_one(&document, None).await?;
        if let Bson::ObjectId(id) = result.inserted_id {
            document.insert("_id", id);
        }
        Ok(document)
    }

    /// `$set` the given fields (plus `updated_at`) and return the new document
    pub async fn update_404(
        &self,
        id: ObjectId,
        scope: Document,
        mut set: Document,
    ) -> Result<Document, DatabaseError> {
        set.remove("_id");
        set.insert("updated_at", now());
        self.modify_404(id, scope, doc! { "$set": set }).await
    }

    /// Apply an arbitrary update document and return the new document
    pub async fn modify_404(
        &self,
        id: ObjectId,
        scope: Document,
        update: Document,
    ) -> Result<Document, DatabaseError> {
        let query = and_filters(doc! { "_id": id }, scope);
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.collection
            .find_one_and_update(query, update, options)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} record not found", self.label())))
    }

    /// Atomically update the first match, `None` when nothing matched
    pub async fn modify_one(&self, query: Document, update: Document) -> Result<Option<Document>, DatabaseError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self.collection.find_one_and_update(query, update, options).await?)
    }

    /// Insert `fields` under `key` unless a document with that key exists.
    /// Losing an insert race to a unique index counts as already present.
    pub async fn seed_one(&self, key: Document, mut fields: Document) -> Result<(), DatabaseError> {
        fields.insert("created_at", now());
        let options = UpdateOptions::builder().upsert(true).build();
        match self
            .collection
            .update_one(key, doc! { "$setOnInsert": fields }, options)
            .await
            .map_err(DatabaseError::from)
        {
            Ok(_) | Err(DatabaseError::DuplicateKey(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_404(&self, id: ObjectId, scope: Document) -> Result<(), DatabaseError> {
        let query = and_filters(doc! { "_id": id }, scope);
        let result = self.collection.delete_one(query, None).await?;
        if result.deleted_count == 0 {
            return Err(DatabaseError::NotFound(format!("{} record not found", self.label())));
        }
        Ok(())
    }

    pub async fn delete_many(&self, query: Document) -> Result<u64, DatabaseError> {
        let result = self.collection.delete_many(query, None).await?;
        Ok(result.deleted_count)
    }

    fn label(&self) -> &'static str {
        super::collections::record_label(self.name)
    }
}
