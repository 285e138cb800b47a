use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub size: String,
    pub quantity: i32,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub size: Option<String>,
    pub quantity: Option<i32>,
}

impl UpdateCartItemRequest {
    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.quantity.is_none()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartItemDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemDto {
    pub id: Uuid,
    pub product_id: Uuid,
    pub size: String,
    pub quantity: i32,
    pub product: Option<Product>,
}
