//! The catalog store: product and nested review lifecycle over a whole
//! snapshot.
//!
//! Every mutation runs load -> change -> save while holding the writer lock,
//! so two concurrent requests can never save over each other's changes.
//! Reads load the current snapshot without taking the lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use catalog_core::catalog::Catalog;
use catalog_core::domain::product::{Product, ProductFields, ProductId, ProductPatch};
use catalog_core::domain::review::{Review, ReviewFields, ReviewId, ReviewPatch};
use catalog_core::errors::{ApplicationError, DomainError};
use catalog_core::ids::IdGenerator;

use crate::repositories::SnapshotRepository;

pub struct CatalogStore {
    repository: Arc<dyn SnapshotRepository>,
    ids: Arc<dyn IdGenerator>,
    writer: Mutex<()>,
}

impl CatalogStore {
    pub fn new(repository: Arc<dyn SnapshotRepository>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { repository, ids, writer: Mutex::new(()) }
    }

    pub async fn list_products(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<Product>, ApplicationError> {
        let catalog = self.load().await?;
        Ok(match category {
            Some(category) => catalog.in_category(category),
            None => catalog.into_products(),
        })
    }

    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product, ApplicationError> {
        let catalog = self.load().await?;
        catalog.find(product_id).cloned().ok_or_else(|| product_not_found(product_id).into())
    }

    pub async fn create_product(
        &self,
        fields: ProductFields,
        image_url: String,
    ) -> Result<Product, ApplicationError> {
        let (product, _) = self
            .mutate(|catalog, now| {
                let product =
                    Product::new(ProductId(self.ids.next_id()), fields, image_url, now);
                catalog.push(product.clone());
                Ok(product)
            })
            .await?;
        Ok(product)
    }

    /// Merges `patch` into the product and, when given, replaces its image.
    /// Returns the whole collection after the change.
    pub async fn update_product(
        &self,
        product_id: &ProductId,
        patch: ProductPatch,
        image_url: Option<String>,
    ) -> Result<Vec<Product>, ApplicationError> {
        let ((), products) = self
            .mutate(|catalog, now| {
                let product =
                    catalog.find_mut(product_id).ok_or_else(|| product_not_found(product_id))?;
                product.apply(patch, image_url, now);
                Ok(())
            })
            .await?;
        Ok(products)
    }

    /// Removes the product together with all of its reviews.
    pub async fn delete_product(&self, product_id: &ProductId) -> Result<(), ApplicationError> {
        self.mutate(|catalog, _| {
            catalog.remove(product_id).map(|_| ()).ok_or_else(|| product_not_found(product_id))
        })
        .await?;
        Ok(())
    }

    pub async fn list_reviews(&self, product_id: &ProductId) -> Result<Vec<Review>, ApplicationError> {
        let product = self.get_product(product_id).await?;
        Ok(product.reviews)
    }

    pub async fn get_review(
        &self,
        product_id: &ProductId,
        review_id: &ReviewId,
    ) -> Result<Review, ApplicationError> {
        let product = self.get_product(product_id).await?;
        product
            .find_review(review_id)
            .cloned()
            .ok_or_else(|| review_not_found(product_id, review_id).into())
    }

    pub async fn create_review(
        &self,
        product_id: &ProductId,
        fields: ReviewFields,
    ) -> Result<Vec<Product>, ApplicationError> {
        let (_, products) = self
            .mutate(|catalog, now| {
                let product =
                    catalog.find_mut(product_id).ok_or_else(|| product_not_found(product_id))?;
                let review = Review::new(ReviewId(self.ids.next_id()), fields, now);
                let review_id = review.id.clone();
                product.reviews.push(review);
                Ok(review_id)
            })
            .await?;
        Ok(products)
    }

    pub async fn update_review(
        &self,
        product_id: &ProductId,
        review_id: &ReviewId,
        patch: ReviewPatch,
    ) -> Result<Vec<Product>, ApplicationError> {
        let ((), products) = self
            .mutate(|catalog, now| {
                let product =
                    catalog.find_mut(product_id).ok_or_else(|| product_not_found(product_id))?;
                let review = product
                    .find_review_mut(review_id)
                    .ok_or_else(|| review_not_found(product_id, review_id))?;
                review.apply(patch, now);
                Ok(())
            })
            .await?;
        Ok(products)
    }

    pub async fn delete_review(
        &self,
        product_id: &ProductId,
        review_id: &ReviewId,
    ) -> Result<Vec<Product>, ApplicationError> {
        let (_, products) = self
            .mutate(|catalog, _| {
                let product =
                    catalog.find_mut(product_id).ok_or_else(|| product_not_found(product_id))?;
                product.remove_review(review_id).ok_or_else(|| review_not_found(product_id, review_id))
            })
            .await?;
        Ok(products)
    }

    async fn load(&self) -> Result<Catalog, ApplicationError> {
        let products = self.repository.load().await?;
        Ok(Catalog::new(products))
    }

    /// Applies one change to a freshly loaded snapshot and saves it. A failed
    /// change leaves the persisted snapshot untouched.
    async fn mutate<T, F>(&self, change: F) -> Result<(T, Vec<Product>), ApplicationError>
    where
        F: FnOnce(&mut Catalog, DateTime<Utc>) -> Result<T, DomainError>,
    {
        let _writer = self.writer.lock().await;
        let mut catalog = self.load().await?;
        let outcome = change(&mut catalog, Utc::now())?;
        self.repository.save(catalog.products()).await?;
        debug!(
            event_name = "catalog.store.committed",
            product_count = catalog.products().len(),
            "catalog snapshot committed"
        );
        Ok((outcome, catalog.into_products()))
    }
}

fn product_not_found(product_id: &ProductId) -> DomainError {
    DomainError::ProductNotFound(product_id.clone())
}

fn review_not_found(product_id: &ProductId, review_id: &ReviewId) -> DomainError {
    DomainError::ReviewNotFound { product_id: product_id.clone(), review_id: review_id.clone() }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use catalog_core::domain::product::{ProductFields, ProductId, ProductPatch};
    use catalog_core::domain::review::{ReviewFields, ReviewId, ReviewPatch};
    use catalog_core::errors::{ApplicationError, DomainError};
    use catalog_core::ids::SequentialIdGenerator;

    use crate::repositories::{InMemorySnapshotRepository, SnapshotRepository};
    use crate::store::CatalogStore;

    fn store() -> (CatalogStore, Arc<InMemorySnapshotRepository>) {
        let repo = Arc::new(InMemorySnapshotRepository::default());
        let store = CatalogStore::new(repo.clone(), Arc::new(SequentialIdGenerator::new("id")));
        (store, repo)
    }

    fn fields(name: &str, category: Option<&str>) -> ProductFields {
        ProductFields {
            name: name.to_string(),
            brand: "Acme".to_string(),
            description: "Ceramic".to_string(),
            price: Decimal::new(9, 0),
            category: category.map(str::to_string),
        }
    }

    fn review(rate: u8, comment: &str) -> ReviewFields {
        ReviewFields { rate, comment: comment.to_string() }
    }

    #[tokio::test]
    async fn create_assigns_id_timestamps_and_empty_reviews() {
        let (store, repo) = store();

        let created =
            store.create_product(fields("Mug", None), "http://x/img.png".to_string()).await.expect("create");

        assert_eq!(created.id, ProductId("id-1".to_string()));
        assert_eq!(created.created_at, created.updated_at);
        assert!(created.reviews.is_empty());
        assert_eq!(repo.load().await.expect("load"), vec![created]);
    }

    #[tokio::test]
    async fn get_product_is_idempotent_without_mutation() {
        let (store, _) = store();
        let created =
            store.create_product(fields("Mug", None), "http://x/img.png".to_string()).await.expect("create");

        let first = store.get_product(&created.id).await.expect("first read");
        let second = store.get_product(&created.id).await.expect("second read");

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_product_reports_not_found_and_does_not_save() {
        let (store, repo) = store();
        store.create_product(fields("Mug", None), "u".to_string()).await.expect("create");
        let snapshot = repo.load().await.expect("load");
        let missing = ProductId("nope".to_string());

        let get = store.get_product(&missing).await;
        let update = store.update_product(&missing, ProductPatch::default(), None).await;
        let delete = store.delete_product(&missing).await;

        assert!(matches!(get, Err(ref error) if error.is_not_found()));
        assert!(matches!(update, Err(ref error) if error.is_not_found()));
        assert!(matches!(delete, Err(ref error) if error.is_not_found()));
        assert_eq!(repo.load().await.expect("load"), snapshot);
        assert_eq!(repo.save_count(), 1);
    }

    #[tokio::test]
    async fn update_merges_patch_and_keeps_position_and_reviews() {
        let (store, _) = store();
        let first = store.create_product(fields("Mug", None), "u1".to_string()).await.expect("create");
        let second = store.create_product(fields("Cup", None), "u2".to_string()).await.expect("create");
        store.create_review(&first.id, review(5, "Great")).await.expect("review");
        let before = store.get_product(&first.id).await.expect("get");

        let products = store
            .update_product(
                &first.id,
                ProductPatch { price: Some(Decimal::new(42, 0)), ..ProductPatch::default() },
                None,
            )
            .await
            .expect("update");

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, first.id);
        assert_eq!(products[1], second);
        let after = &products[0];
        assert_eq!(after.price, Decimal::new(42, 0));
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.name, before.name);
        assert_eq!(after.image_url, before.image_url);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.reviews, before.reviews);
    }

    #[tokio::test]
    async fn update_with_new_image_replaces_url() {
        let (store, _) = store();
        let created = store.create_product(fields("Mug", None), "old".to_string()).await.expect("create");

        let products = store
            .update_product(&created.id, ProductPatch::default(), Some("new".to_string()))
            .await
            .expect("update");

        assert_eq!(products[0].image_url, "new");
    }

    #[tokio::test]
    async fn category_filter_returns_matching_subset_in_order() {
        let (store, _) = store();
        for (name, category) in
            [("a", Some("mugs")), ("b", None), ("c", Some("lamps")), ("d", Some("mugs"))]
        {
            store.create_product(fields(name, category), "u".to_string()).await.expect("create");
        }

        let all = store.list_products(None).await.expect("list");
        let mugs = store.list_products(Some("mugs")).await.expect("filter");

        let expected: Vec<_> =
            all.iter().filter(|product| product.category.as_deref() == Some("mugs")).cloned().collect();
        assert_eq!(mugs, expected);
        assert_eq!(mugs.iter().map(|product| product.name.as_str()).collect::<Vec<_>>(), ["a", "d"]);
        assert!(store.list_products(Some("none")).await.expect("filter").is_empty());
    }

    #[tokio::test]
    async fn review_lifecycle_keeps_product_updated_at() {
        let (store, _) = store();
        let product = store.create_product(fields("Mug", None), "u".to_string()).await.expect("create");

        let products = store.create_review(&product.id, review(5, "Great")).await.expect("review");
        let review_id = products[0].reviews[0].id.clone();
        assert_eq!(products[0].updated_at, product.updated_at);
        assert_eq!(products[0].reviews[0].updated_at, None);

        let products = store
            .update_review(
                &product.id,
                &review_id,
                ReviewPatch { rate: Some(3), comment: None },
            )
            .await
            .expect("update review");
        let updated = &products[0].reviews[0];
        assert_eq!(updated.rate, 3);
        assert_eq!(updated.comment, "Great");
        assert!(updated.updated_at.is_some());
        assert_eq!(products[0].updated_at, product.updated_at);

        let fetched = store.get_review(&product.id, &review_id).await.expect("get review");
        assert_eq!(&fetched, updated);

        let products = store.delete_review(&product.id, &review_id).await.expect("delete review");
        assert!(products[0].reviews.is_empty());
    }

    #[tokio::test]
    async fn review_ids_are_unique_within_a_product() {
        let (store, _) = store();
        let product = store.create_product(fields("Mug", None), "u".to_string()).await.expect("create");

        for rate in 1..=5 {
            store.create_review(&product.id, review(rate, "ok")).await.expect("review");
        }

        let reviews = store.list_reviews(&product.id).await.expect("list reviews");
        let mut ids: Vec<&ReviewId> = reviews.iter().map(|review| &review.id).collect();
        ids.sort_by(|left, right| left.0.cmp(&right.0));
        ids.dedup();
        assert_eq!(ids.len(), 5);
        assert_eq!(reviews.iter().map(|review| review.rate).collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn missing_review_is_reported_uniformly() {
        let (store, repo) = store();
        let product = store.create_product(fields("Mug", None), "u".to_string()).await.expect("create");
        let missing = ReviewId("ghost".to_string());
        let saves = repo.save_count();

        let get = store.get_review(&product.id, &missing).await;
        let update = store.update_review(&product.id, &missing, ReviewPatch::default()).await;
        let delete = store.delete_review(&product.id, &missing).await;

        for result in [get.map(|_| ()), update.map(|_| ()), delete.map(|_| ())] {
            assert!(matches!(
                result,
                Err(ApplicationError::Domain(DomainError::ReviewNotFound { .. }))
            ));
        }
        assert_eq!(repo.save_count(), saves);
    }

    #[tokio::test]
    async fn review_operations_on_missing_product_report_not_found() {
        let (store, _) = store();
        let missing = ProductId("nope".to_string());
        let review_id = ReviewId("r".to_string());

        assert!(matches!(
            store.list_reviews(&missing).await,
            Err(ApplicationError::Domain(DomainError::ProductNotFound(_)))
        ));
        assert!(matches!(
            store.create_review(&missing, review(5, "x")).await,
            Err(ApplicationError::Domain(DomainError::ProductNotFound(_)))
        ));
        assert!(matches!(
            store.delete_review(&missing, &review_id).await,
            Err(ApplicationError::Domain(DomainError::ProductNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn storage_failure_propagates_and_discards_the_change() {
        let (store, repo) = store();
        let product = store.create_product(fields("Mug", None), "u".to_string()).await.expect("create");
        repo.set_fail_writes(true);

        let result = store.create_review(&product.id, review(5, "lost")).await;

        assert!(matches!(result, Err(ApplicationError::Persistence(_))));
        repo.set_fail_writes(false);
        assert!(store.list_reviews(&product.id).await.expect("list").is_empty());
    }
}
