use crate::models::{Artisan, Product};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::collections::HashMap;

/// Persistence for artisans and their products.
///
/// Name and location filters are case-insensitive substring matches; an empty
/// fragment matches everything. Listings are ordered by `created_at`, then id.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_artisan(&self, artisan: &Artisan) -> Result<(), AppError>;
    async fn get_artisan(&self, id: &str) -> Result<Option<Artisan>, AppError>;
    /// Fails with `NotFound` when the artisan does not exist.
    async fn update_artisan(&self, artisan: &Artisan) -> Result<(), AppError>;
    async fn find_artisans(
        &self,
        name: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<Artisan>, AppError>;

    async fn insert_product(&self, product: &Product) -> Result<(), AppError>;
    async fn get_product(&self, id: &str) -> Result<Option<Product>, AppError>;
    /// Replaces the product only while its stored `image_key` still equals
    /// `expected_image_key`. Fails with `NotFound` when the product does not
    /// exist and `Conflict` when another writer changed its image first.
    async fn update_product(
        &self,
        product: &Product,
        expected_image_key: &str,
    ) -> Result<(), AppError>;
    /// Returns whether a product was removed.
    async fn delete_product(&self, id: &str) -> Result<bool, AppError>;
    async fn products_for_artisan(&self, artisan_id: &str) -> Result<Vec<Product>, AppError>;

    /// Products whose name matches `name` and whose owner's location matches
    /// `location`, each paired with its owner.
    async fn search_products(
        &self,
        name: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<(Product, Artisan)>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct MongoCatalog {
    client: MongoClient,
    db: Database,
}

impl MongoCatalog {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for artisan-service");

        let artisan_indexes = [
            ("name", "artisan_name_lookup"),
            ("location", "artisan_location_lookup"),
        ];
        for (field, name) in artisan_indexes {
            self.artisans()
                .create_index(Self::index(field, name), None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create {} index on artisans: {}", name, e);
                    AppError::from(e)
                })?;
        }

        let product_indexes = [
            ("artisan_id", "product_owner_lookup"),
            ("name", "product_name_lookup"),
        ];
        for (field, name) in product_indexes {
            self.products()
                .create_index(Self::index(field, name), None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create {} index on products: {}", name, e);
                    AppError::from(e)
                })?;
        }

        tracing::info!("MongoDB indexes ready");
        Ok(())
    }

    fn index(field: &str, name: &str) -> IndexModel {
        let mut keys = Document::new();
        keys.insert(field, 1);
        IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().name(name.to_string()).build())
            .build()
    }

    fn artisans(&self) -> Collection<Artisan> {
        self.db.collection("artisans")
    }

    fn products(&self) -> Collection<Product> {
        self.db.collection("products")
    }

    fn listing_options(limit: Option<usize>) -> FindOptions {
        FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .limit(limit.map(|l| l as i64))
            .build()
    }

    fn id_projection() -> FindOptions {
        FindOptions::builder().projection(doc! { "_id": 1 }).build()
    }

    async fn artisan_ids(&self, filter: Document) -> Result<Vec<String>, AppError> {
        let docs: Vec<Document> = self
            .db
            .collection::<Document>("artisans")
            .find(filter, Self::id_projection())
            .await?
            .try_collect()
            .await?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get_str("_id").ok().map(str::to_string))
            .collect())
    }

    async fn artisans_by_ids(&self, ids: Vec<String>) -> Result<HashMap<String, Artisan>, AppError> {
        let cursor = self
            .artisans()
            .find(doc! { "_id": { "$in": ids } }, None)
            .await?;
        let artisans: Vec<Artisan> = cursor.try_collect().await?;
        Ok(artisans.into_iter().map(|a| (a.id.clone(), a)).collect())
    }
}

/// Adds an escaped, case-insensitive `$regex` filter when `fragment` is non-empty.
fn push_fragment(filter: &mut Document, field: &str, fragment: &str) {
    let fragment = fragment.trim();
    if !fragment.is_empty() {
        filter.insert(
            field,
            doc! { "$regex": regex::escape(fragment), "$options": "i" },
        );
    }
}

#[async_trait]
impl CatalogStore for MongoCatalog {
    async fn insert_artisan(&self, artisan: &Artisan) -> Result<(), AppError> {
        self.artisans().insert_one(artisan, None).await?;
        Ok(())
    }

    async fn get_artisan(&self, id: &str) -> Result<Option<Artisan>, AppError> {
        Ok(self.artisans().find_one(doc! { "_id": id }, None).await?)
    }

    async fn update_artisan(&self, artisan: &Artisan) -> Result<(), AppError> {
        let result = self
            .artisans()
            .replace_one(doc! { "_id": artisan.id.as_str() }, artisan, None)
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::not_found(format!("Artisan {} not found", artisan.id)));
        }
        Ok(())
    }

    async fn find_artisans(
        &self,
        name: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<Artisan>, AppError> {
        let mut filter = Document::new();
        push_fragment(&mut filter, "name", name);
        push_fragment(&mut filter, "location", location);

        let cursor = self
            .artisans()
            .find(filter, Self::listing_options(Some(limit)))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), AppError> {
        self.products().insert_one(product, None).await?;
        Ok(())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>, AppError> {
        Ok(self.products().find_one(doc! { "_id": id }, None).await?)
    }

    async fn update_product(
        &self,
        product: &Product,
        expected_image_key: &str,
    ) -> Result<(), AppError> {
        let filter = doc! { "_id": product.id.as_str(), "image_key": expected_image_key };
        let result = self.products().replace_one(filter, product, None).await?;
        if result.matched_count > 0 {
            return Ok(());
        }

        let exists = self
            .products()
            .count_documents(doc! { "_id": product.id.as_str() }, None)
            .await?
            > 0;
        if exists {
            Err(AppError::Conflict(format!(
                "Product {} was modified concurrently",
                product.id
            )))
        } else {
            Err(AppError::not_found(format!("Product {} not found", product.id)))
        }
    }

    async fn delete_product(&self, id: &str) -> Result<bool, AppError> {
        let result = self.products().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn products_for_artisan(&self, artisan_id: &str) -> Result<Vec<Product>, AppError> {
        let cursor = self
            .products()
            .find(doc! { "artisan_id": artisan_id }, Self::listing_options(None))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn search_products(
        &self,
        name: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<(Product, Artisan)>, AppError> {
        let mut filter = Document::new();
        push_fragment(&mut filter, "name", name);

        if !location.trim().is_empty() {
            let mut artisan_filter = Document::new();
            push_fragment(&mut artisan_filter, "location", location);
            let ids = self.artisan_ids(artisan_filter).await?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            filter.insert("artisan_id", doc! { "$in": ids });
        }

        let products: Vec<Product> = self
            .products()
            .find(filter, Self::listing_options(Some(limit)))
            .await?
            .try_collect()
            .await?;

        let mut owner_ids: Vec<String> = products.iter().map(|p| p.artisan_id.clone()).collect();
        owner_ids.sort();
        owner_ids.dedup();
        let owners = self.artisans_by_ids(owner_ids).await?;

        Ok(products
            .into_iter()
            .filter_map(|p| owners.get(&p.artisan_id).cloned().map(|a| (p, a)))
            .collect())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_are_escaped_and_case_insensitive() {
        let mut filter = Document::new();
        push_fragment(&mut filter, "name", " vase (blue) ");

        let clause = filter.get_document("name").unwrap();
        assert_eq!(clause.get_str("$regex").unwrap(), r"vase \(blue\)");
        assert_eq!(clause.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn location_prefilter_fetches_only_ids() {
        let options = MongoCatalog::id_projection();
        assert_eq!(options.projection, Some(doc! { "_id": 1 }));
    }

    #[test]
    fn empty_fragments_add_no_filter() {
        let mut filter = Document::new();
        push_fragment(&mut filter, "location", "   ");
        assert!(filter.is_empty());
    }
}
