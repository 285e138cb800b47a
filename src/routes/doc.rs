use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartItemDto, CartView, UpdateCartItemRequest},
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
    },
    models::{CartItem, Order, OrderItem, OrderStatus, Product},
    response::{ApiResponse, Meta},
    routes::{admin, cart, health, orders, params},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::place_order,
        orders::list_orders,
        orders::get_order,
        orders::update_order_status,
        orders::cancel_order,
        orders::delete_order,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_cart_item,
        admin::list_all_orders,
        admin::update_order_status,
    ),
    components(
        schemas(
            Product,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartView,
            CartItemDto,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            params::Pagination,
            params::SortOrder,
            params::OrderListQuery,
            Meta,
            ApiResponse<CartView>,
            ApiResponse<CartItem>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
