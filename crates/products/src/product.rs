use chrono::{DateTime, Utc};

use pricebook_core::{DomainError, DomainResult, Entity, ProductId};

/// Longest accepted product name, in characters.
pub const MAX_NAME_LEN: usize = 200;

/// Catalog entry owning a set of price intervals.
///
/// Only the identifier matters to pricing; the name is catalog metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    created_at: DateTime<Utc>,
}

impl Product {
    /// Validate and build a new product.
    pub fn create(id: ProductId, name: &str, created_at: DateTime<Utc>) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "name cannot be longer than {MAX_NAME_LEN} characters"
            )));
        }

        Ok(Self {
            id,
            name: name.to_string(),
            created_at,
        })
    }

    /// Rebuild a product from storage (already validated on the way in).
    pub fn restore(id: ProductId, name: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            created_at,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_trims_name() {
        let product = Product::create(ProductId::new(), "  Coffee beans ", Utc::now()).unwrap();
        assert_eq!(product.name(), "Coffee beans");
    }

    #[test]
    fn create_rejects_empty_name() {
        let err = Product::create(ProductId::new(), "   ", Utc::now()).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn create_rejects_overlong_name() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        let err = Product::create(ProductId::new(), &name, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn entity_id_matches_typed_id() {
        let id = ProductId::new();
        let product = Product::create(id, "Tea", Utc::now()).unwrap();
        assert_eq!(*product.id(), id);
        assert_eq!(product.id_typed(), id);
    }
}
