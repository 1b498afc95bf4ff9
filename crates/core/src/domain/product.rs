use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::review::{Review, ReviewId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog entry. Owns its reviews; a review never outlives the product it
/// belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub description: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

/// Product fields that passed the validation gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductFields {
    pub name: String,
    pub brand: String,
    pub description: String,
    pub price: Decimal,
    pub category: Option<String>,
}

/// Partial update of a product. `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
}

impl From<ProductFields> for ProductPatch {
    fn from(fields: ProductFields) -> Self {
        Self {
            name: Some(fields.name),
            brand: Some(fields.brand),
            description: Some(fields.description),
            price: Some(fields.price),
            category: fields.category,
        }
    }
}

impl Product {
    pub fn new(
        id: ProductId,
        fields: ProductFields,
        image_url: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: fields.name,
            brand: fields.brand,
            description: fields.description,
            price: fields.price,
            category: fields.category,
            image_url,
            created_at: now,
            updated_at: now,
            reviews: Vec::new(),
        }
    }

    /// Overlays `patch` onto the record. `id`, `created_at` and `reviews` are
    /// never touched here.
    pub fn apply(&mut self, patch: ProductPatch, image_url: Option<String>, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(brand) = patch.brand {
            self.brand = brand;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(category) = patch.category {
            self.category = Some(category);
        }
        if let Some(image_url) = image_url {
            self.image_url = image_url;
        }
        self.updated_at = now;
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.category.as_deref() == Some(category)
    }

    pub fn find_review(&self, review_id: &ReviewId) -> Option<&Review> {
        self.reviews.iter().find(|review| &review.id == review_id)
    }

    pub fn find_review_mut(&mut self, review_id: &ReviewId) -> Option<&mut Review> {
        self.reviews.iter_mut().find(|review| &review.id == review_id)
    }

    /// Removes the review, returning it if it was present.
    pub fn remove_review(&mut self, review_id: &ReviewId) -> Option<Review> {
        let position = self.reviews.iter().position(|review| &review.id == review_id)?;
        Some(self.reviews.remove(position))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{Product, ProductFields, ProductId, ProductPatch};

    fn mug() -> Product {
        Product::new(
            ProductId("p-1".to_string()),
            ProductFields {
                name: "Mug".to_string(),
                brand: "Acme".to_string(),
                description: "Ceramic".to_string(),
                price: Decimal::new(9, 0),
                category: Some("kitchen".to_string()),
            },
            "http://x/img.png".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn new_product_starts_with_matching_timestamps_and_no_reviews() {
        let product = mug();

        assert_eq!(product.created_at, product.updated_at);
        assert!(product.reviews.is_empty());
        assert_eq!(product.image_url, "http://x/img.png");
    }

    #[test]
    fn apply_changes_only_patched_fields_and_updated_at() {
        let mut product = mug();
        let before = product.clone();
        let later = before.updated_at + Duration::seconds(5);

        product.apply(
            ProductPatch { price: Some(Decimal::new(42, 0)), ..ProductPatch::default() },
            None,
            later,
        );

        assert_eq!(product.price, Decimal::new(42, 0));
        assert_eq!(product.updated_at, later);
        assert_eq!(product.name, before.name);
        assert_eq!(product.brand, before.brand);
        assert_eq!(product.description, before.description);
        assert_eq!(product.category, before.category);
        assert_eq!(product.image_url, before.image_url);
        assert_eq!(product.created_at, before.created_at);
        assert_eq!(product.reviews, before.reviews);
    }

    #[test]
    fn serialized_form_uses_legacy_id_key_and_camel_case() {
        let value = serde_json::to_value(mug()).expect("serialize product");

        assert_eq!(value["_id"], "p-1");
        assert_eq!(value["imageUrl"], "http://x/img.png");
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["reviews"], serde_json::json!([]));
    }

    #[test]
    fn snapshot_entry_without_reviews_reads_as_empty_sequence() {
        let raw = r#"{
            "_id": "p-9",
            "name": "Lamp",
            "brand": "Lumo",
            "description": "Desk lamp",
            "price": "19.50",
            "imageUrl": "http://x/lamp.png",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }"#;

        let product: Product = serde_json::from_str(raw).expect("deserialize product");

        assert!(product.reviews.is_empty());
        assert_eq!(product.category, None);
        assert_eq!(product.price, Decimal::new(1950, 2));
    }

    #[test]
    fn snapshot_review_with_string_rate_still_loads() {
        let raw = r#"[{
            "_id": "p-9",
            "name": "Lamp",
            "brand": "Lumo",
            "description": "Desk lamp",
            "price": "19.50",
            "imageUrl": "http://x/lamp.png",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
            "reviews": [
                { "_id": "r-1", "rate": "5", "comment": "Bright", "createdAt": "2024-01-02T00:00:00Z" },
                { "_id": "r-2", "rate": 3, "comment": "Wobbly", "createdAt": "2024-01-03T00:00:00Z" }
            ]
        }]"#;

        let products: Vec<Product> = serde_json::from_str(raw).expect("deserialize snapshot");

        let rates: Vec<u8> = products[0].reviews.iter().map(|review| review.rate).collect();
        assert_eq!(rates, vec![5, 3]);
        let written = serde_json::to_value(&products[0].reviews[0]).expect("serialize review");
        assert_eq!(written["rate"], 5);
    }

    #[test]
    fn snapshot_review_with_non_numeric_rate_is_rejected() {
        let raw = r#"{ "_id": "r-1", "rate": "five", "comment": "x", "createdAt": "2024-01-02T00:00:00Z" }"#;

        let result = serde_json::from_str::<super::Review>(raw);

        assert!(result.is_err());
    }
}
