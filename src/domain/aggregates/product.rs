//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Active => "active",
            ProductStatus::Archived => "archived",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "active" => ProductStatus::Active,
            "archived" => ProductStatus::Archived,
            _ => ProductStatus::Draft,
        }
    }
}

/// A catalog product as the cart engine sees it: current prices, promotion
/// flag and available stock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub main_image_url: Option<String>,
    pub list_price: Money,
    pub promotional_price: Option<Money>,
    pub promotion_active: bool,
    pub stock_quantity: u32,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The promotional price, but only while the promotion is switched on.
    pub fn active_promotional_price(&self) -> Option<Money> {
        if self.promotion_active { self.promotional_price } else { None }
    }

    /// The effective per-unit price charged right now.
    pub fn unit_price(&self) -> Money {
        self.active_promotional_price().unwrap_or(self.list_price)
    }

    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}
