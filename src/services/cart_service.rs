use chrono::Utc;
use sea_orm::sea_query::{LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait, prelude::DateTimeWithTimeZone,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartView, UpdateCartItemRequest},
    entity::{
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
            Model as CartItemModel,
        },
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        products::Entity as Products,
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartItem,
    response::{ApiResponse, Meta},
    services::product_from_entity,
    state::AppState,
};

const MAX_SIZE_LEN: usize = 16;

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("cart not found".into()))?;

    let items = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(item, product)| CartItemDto {
            id: item.id,
            product_id: item.product_id,
            size: item.size,
            quantity: item.quantity,
            product: product.map(product_from_entity),
        })
        .collect();

    Ok(ApiResponse::success(
        "OK",
        CartView {
            id: cart.id,
            user_id: cart.user_id,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Add `quantity` of `(product, size)` to the caller's cart, creating the
/// cart on first use and merging into an existing line.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::InvalidArgument(
            "quantity must be greater than 0".to_string(),
        ));
    }
    let size = normalize_size(&payload.size)?;

    let txn = state.orm.begin().await?;

    let product = Products::find_by_id(payload.product_id).one(&txn).await?;
    if !product.is_some_and(|p| p.is_active) {
        return Err(AppError::NotFound("product not found".to_string()));
    }

    let cart = lock_or_create_cart(&txn, user.user_id).await?;
    let now: DateTimeWithTimeZone = Utc::now().into();

    let existing = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(payload.product_id))
        .filter(CartItemCol::Size.eq(size.as_str()))
        .one(&txn)
        .await?;

    let cart_item = match existing {
        Some(item) => {
            let quantity = add_quantities(item.quantity, payload.quantity)?;
            let mut active: CartItemActive = item.into();
            active.quantity = Set(quantity);
            active.updated_at = Set(now);
            active.update(&txn).await?
        }
        None => {
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(payload.product_id),
                size: Set(size.clone()),
                quantity: Set(payload.quantity),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit().await?;

    audit::record(
        state,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({
            "product_id": payload.product_id,
            "size": size,
            "quantity": payload.quantity,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "product added to cart",
        cart_item_from_entity(cart_item),
        Some(Meta::empty()),
    ))
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.is_empty() {
        return Err(AppError::InvalidArgument("no fields to update".into()));
    }
    if payload.quantity.is_some_and(|q| q <= 0) {
        return Err(AppError::InvalidArgument(
            "quantity must be greater than zero".into(),
        ));
    }
    let size = payload.size.as_deref().map(normalize_size).transpose()?;

    let txn = state.orm.begin().await?;
    let item = find_owned_item(&txn, user, item_id).await?;
    let now: DateTimeWithTimeZone = Utc::now().into();

    // Re-sizing onto a size the cart already holds folds the two lines together.
    let collision = match size.as_deref() {
        Some(new_size) if new_size != item.size => {
            CartItems::find()
                .filter(CartItemCol::CartId.eq(item.cart_id))
                .filter(CartItemCol::ProductId.eq(item.product_id))
                .filter(CartItemCol::Size.eq(new_size))
                .one(&txn)
                .await?
        }
        _ => None,
    };

    let updated = match collision {
        Some(other) => {
            let quantity = add_quantities(other.quantity, payload.quantity.unwrap_or(item.quantity))?;
            CartItems::delete_by_id(item.id).exec(&txn).await?;
            let mut active: CartItemActive = other.into();
            active.quantity = Set(quantity);
            active.updated_at = Set(now);
            active.update(&txn).await?
        }
        None => {
            let mut active: CartItemActive = item.into();
            if let Some(size) = size {
                active.size = Set(size);
            }
            if let Some(quantity) = payload.quantity {
                active.quantity = Set(quantity);
            }
            active.updated_at = Set(now);
            active.update(&txn).await?
        }
    };

    txn.commit().await?;

    audit::record(
        state,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "cart_item_id": item_id, "result_id": updated.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "cart item updated successfully",
        cart_item_from_entity(updated),
        Some(Meta::empty()),
    ))
}

pub async fn remove_cart_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let item = find_owned_item(&txn, user, item_id).await?;
    CartItems::delete_by_id(item.id).exec(&txn).await?;
    txn.commit().await?;

    audit::record(
        state,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_item_id": item_id, "product_id": item.product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "cart item removed successfully",
        serde_json::json!({ "id": item_id }),
        Some(Meta::empty()),
    ))
}

async fn lock_cart<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<Option<CartModel>> {
    Ok(Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .lock(LockType::Update)
        .one(db)
        .await?)
}

async fn lock_or_create_cart<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<CartModel> {
    if let Some(cart) = lock_cart(db, user_id).await? {
        return Ok(cart);
    }

    // A signed token can outlive its user row.
    if Users::find_by_id(user_id).one(db).await?.is_none() {
        return Err(AppError::Unauthorized("unknown user".into()));
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    // A concurrent first add may win the race; the unique user_id keeps one row.
    Carts::insert(CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .on_conflict(OnConflict::column(CartCol::UserId).do_nothing().to_owned())
    .exec_without_returning(db)
    .await?;

    lock_cart(db, user_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart for {user_id} missing after insert")))
}

/// Load a cart item and verify it sits in the caller's cart. The owning cart
/// row stays locked until the surrounding transaction ends.
async fn find_owned_item<C: ConnectionTrait>(
    db: &C,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<CartItemModel> {
    let not_found = || AppError::NotFound("cart item not found".into());

    let item = CartItems::find_by_id(item_id)
        .one(db)
        .await?
        .ok_or_else(not_found)?;

    let cart = Carts::find_by_id(item.cart_id)
        .lock(LockType::Update)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("cart not found".into()))?;
    if cart.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "not authorized to modify this cart item".into(),
        ));
    }

    // re-read under the lock
    CartItems::find_by_id(item_id)
        .one(db)
        .await?
        .ok_or_else(not_found)
}

fn normalize_size(raw: &str) -> AppResult<String> {
    let size = raw.trim();
    if size.is_empty() {
        return Err(AppError::InvalidArgument("size is required".into()));
    }
    if size.chars().count() > MAX_SIZE_LEN {
        return Err(AppError::InvalidArgument(format!(
            "size must be at most {MAX_SIZE_LEN} characters"
        )));
    }
    Ok(size.to_string())
}

fn add_quantities(current: i32, extra: i32) -> AppResult<i32> {
    current
        .checked_add(extra)
        .ok_or_else(|| AppError::InvalidArgument("quantity is too large".into()))
}

fn cart_item_from_entity(model: CartItemModel) -> CartItem {
    CartItem {
        id: model.id,
        cart_id: model.cart_id,
        product_id: model.product_id,
        size: model.size,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
