#![allow(dead_code)]

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectOptions, Database};
use uuid::Uuid;

use storefront_orders::{
    db::run_migrations,
    dto::cart::AddToCartRequest,
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    middleware::auth::{AuthUser, issue_token},
    models::Role,
    services::cart_service,
    state::AppState,
};

pub const TEST_SECRET: &str = "test-secret";

/// Fresh in-memory database with every migration applied. A single pooled
/// connection keeps the memory database alive and serializes transactions.
pub async fn setup_state() -> AppState {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let orm = Database::connect(options).await.expect("connect sqlite");
    run_migrations(&orm).await.expect("run migrations");
    AppState::new(orm, TEST_SECRET)
}

pub async fn create_user(state: &AppState, role: Role) -> AuthUser {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{id}@example.com")),
        role: Set(role.as_str().to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .expect("insert user");
    AuthUser { user_id: id, role }
}

pub async fn create_product(state: &AppState, price: i64) -> Uuid {
    create_product_with(state, price, true).await
}

pub async fn create_product_with(state: &AppState, price: i64, is_active: bool) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    ProductActive {
        id: Set(id),
        name: Set(format!("Kit {id}")),
        price: Set(price),
        league: Set("Premier League".into()),
        kit_type: Set("home".into()),
        year: Set(2024),
        is_top_selling: Set(false),
        is_active: Set(is_active),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await
    .expect("insert product");
    id
}

pub async fn add(state: &AppState, user: &AuthUser, product_id: Uuid, size: &str, quantity: i32) {
    cart_service::add_to_cart(
        state,
        user,
        AddToCartRequest {
            product_id,
            size: size.into(),
            quantity,
        },
    )
    .await
    .expect("add to cart");
}

pub fn bearer(user: &AuthUser) -> String {
    let token = issue_token(TEST_SECRET, user.user_id, user.role, Duration::hours(1))
        .expect("issue token");
    format!("Bearer {token}")
}
