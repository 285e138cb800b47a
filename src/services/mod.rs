pub mod admin_service;
pub mod cart_service;
pub mod order_rules;
pub mod order_service;

use crate::{entity::products::Model as ProductModel, models::Product};

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        price: model.price,
        league: model.league,
        kit_type: model.kit_type,
        year: model.year,
        is_top_selling: model.is_top_selling,
        is_active: model.is_active,
    }
}
