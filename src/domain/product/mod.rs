use std::fmt;

// ============================================================================
// Product - catalog entry referenced by order details
// ============================================================================

pub type ProductId = i64;

/// Longest accepted product name.
pub const PRODUCT_NAME_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Data for a product whose id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
}

/// How an order detail names its product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRef {
    /// The product must already exist.
    Existing(ProductId),
    /// Use the product if it exists, otherwise create it with this name.
    GetOrCreate { id: ProductId, name: String },
}

impl ProductRef {
    pub fn id(&self) -> ProductId {
        match self {
            ProductRef::Existing(id) => *id,
            ProductRef::GetOrCreate { id, .. } => *id,
        }
    }
}
