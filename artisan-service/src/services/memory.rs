//! Process-local catalog for `CATALOG_BACKEND=memory` and tests.

use super::catalog::CatalogStore;
use crate::models::{matches_fragment, Artisan, Product};
use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryCatalog {
    artisans: RwLock<HashMap<String, Artisan>>,
    products: RwLock<HashMap<String, Product>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_products<'a>(products: impl Iterator<Item = &'a Product>) -> Vec<Product> {
    let mut products: Vec<Product> = products.cloned().collect();
    products.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    products
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn insert_artisan(&self, artisan: &Artisan) -> Result<(), AppError> {
        self.artisans
            .write()
            .await
            .insert(artisan.id.clone(), artisan.clone());
        Ok(())
    }

    async fn get_artisan(&self, id: &str) -> Result<Option<Artisan>, AppError> {
        Ok(self.artisans.read().await.get(id).cloned())
    }

    async fn update_artisan(&self, artisan: &Artisan) -> Result<(), AppError> {
        match self.artisans.write().await.get_mut(&artisan.id) {
            Some(existing) => {
                *existing = artisan.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Artisan {} not found", artisan.id))),
        }
    }

    async fn find_artisans(
        &self,
        name: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<Artisan>, AppError> {
        let artisans = self.artisans.read().await;
        let mut found: Vec<Artisan> = artisans
            .values()
            .filter(|a| matches_fragment(&a.name, name) && matches_fragment(&a.location, location))
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        found.truncate(limit);
        Ok(found)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), AppError> {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>, AppError> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn update_product(
        &self,
        product: &Product,
        expected_image_key: &str,
    ) -> Result<(), AppError> {
        match self.products.write().await.get_mut(&product.id) {
            Some(existing) if existing.image_key == expected_image_key => {
                *existing = product.clone();
                Ok(())
            }
            Some(_) => Err(AppError::Conflict(format!(
                "Product {} was modified concurrently",
                product.id
            ))),
            None => Err(AppError::not_found(format!("Product {} not found", product.id))),
        }
    }

    async fn delete_product(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.products.write().await.remove(id).is_some())
    }

    async fn products_for_artisan(&self, artisan_id: &str) -> Result<Vec<Product>, AppError> {
        let products = self.products.read().await;
        Ok(sorted_products(
            products.values().filter(|p| p.artisan_id == artisan_id),
        ))
    }

    async fn search_products(
        &self,
        name: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<(Product, Artisan)>, AppError> {
        let artisans = self.artisans.read().await;
        let products = self.products.read().await;

        let matching = products.values().filter(|p| {
            matches_fragment(&p.name, name)
                && artisans
                    .get(&p.artisan_id)
                    .is_some_and(|a| matches_fragment(&a.location, location))
        });

        Ok(sorted_products(matching)
            .into_iter()
            .filter_map(|p| artisans.get(&p.artisan_id).cloned().map(|a| (p, a)))
            .take(limit)
            .collect())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
