use crate::domain::product::{Product, ProductId};

/// Working copy of one loaded snapshot. Lives for a single store operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn find(&self, product_id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|product| &product.id == product_id)
    }

    pub fn find_mut(&mut self, product_id: &ProductId) -> Option<&mut Product> {
        self.products.iter_mut().find(|product| &product.id == product_id)
    }

    pub fn push(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Removes the product and, with it, every review it owns.
    pub fn remove(&mut self, product_id: &ProductId) -> Option<Product> {
        let position = self.products.iter().position(|product| &product.id == product_id)?;
        Some(self.products.remove(position))
    }

    /// Products whose category is present and equal to `category`, in storage order.
    pub fn in_category(&self, category: &str) -> Vec<Product> {
        self.products.iter().filter(|product| product.has_category(category)).cloned().collect()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn into_products(self) -> Vec<Product> {
        self.products
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::product::{Product, ProductFields, ProductId};

    use super::Catalog;

    fn product(id: &str, category: Option<&str>) -> Product {
        Product::new(
            ProductId(id.to_string()),
            ProductFields {
                name: format!("name-{id}"),
                brand: "Acme".to_string(),
                description: "desc".to_string(),
                price: Decimal::ONE,
                category: category.map(str::to_string),
            },
            format!("http://x/{id}.png"),
            Utc::now(),
        )
    }

    #[test]
    fn in_category_keeps_storage_order_and_skips_uncategorized() {
        let catalog = Catalog::new(vec![
            product("a", Some("mugs")),
            product("b", None),
            product("c", Some("lamps")),
            product("d", Some("mugs")),
        ]);

        let ids: Vec<String> =
            catalog.in_category("mugs").into_iter().map(|product| product.id.0).collect();

        assert_eq!(ids, vec!["a".to_string(), "d".to_string()]);
    }

    #[test]
    fn remove_preserves_order_of_remaining_products() {
        let mut catalog =
            Catalog::new(vec![product("a", None), product("b", None), product("c", None)]);

        let removed = catalog.remove(&ProductId("b".to_string()));

        assert_eq!(removed.map(|product| product.id.0), Some("b".to_string()));
        let ids: Vec<&str> = catalog.products().iter().map(|product| product.id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(catalog.remove(&ProductId("missing".to_string())).is_none());
    }
}
