use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        order_rules::{
            StatusUpdateScope, authorize_status_update, ensure_cancellable, ensure_deletable,
            ensure_owner, order_total,
        },
        product_from_entity,
    },
    state::AppState,
};

/// Convert the caller's cart into an order in a single transaction.
///
/// The cart row is locked for the duration, so two concurrent checkouts of
/// the same cart serialize and the second one observes an empty cart.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("cart not found".into()))?;

    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .find_also_related(Products)
        .all(&txn)
        .await?;

    if lines.is_empty() {
        return Err(AppError::Empty("cart is empty".into()));
    }

    // Prices are read from the live catalog here and nowhere else.
    let mut priced = Vec::with_capacity(lines.len());
    for (item, product) in lines {
        let product = product.ok_or_else(|| {
            AppError::NotFound(format!("product {} not found", item.product_id))
        })?;
        if !product.is_active {
            return Err(AppError::InvalidArgument(format!(
                "product {} is no longer available",
                product.id
            )));
        }
        priced.push((item, product.price));
    }
    let total = order_total(priced.iter().map(|(item, price)| (*price, item.quantity)))?;

    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total: Set(total),
        status: Set(OrderStatus::Placed.as_str().to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    for (item, price) in &priced {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            size: Set(item.size.clone()),
            quantity: Set(item.quantity),
            price: Set(*price),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
    }

    // clear cart, keep the cart row for reuse
    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    let view = load_order_view(&txn, order).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %view.order.id,
        user_id = %user.user_id,
        total,
        items = view.items.len(),
        "order placed"
    );
    audit::record(
        state,
        user.user_id,
        "order_placed",
        "orders",
        serde_json::json!({ "order_id": view.order.id, "total": total }),
    )
    .await;

    Ok(ApiResponse::created("Order placed", view))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    let (orders, meta) = list_orders_matching(state, condition, query).await?;
    Ok(ApiResponse::success("Ok", orders, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_order(&state.orm, id, false).await?;
    ensure_owner(user.user_id, order.user_id, "view")?;

    let view = load_order_view(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

/// Generic status update. `scope` says whether the request came through the
/// admin surface (any target) or the owner surface (cancel only).
pub async fn update_status_by_id(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
    scope: StatusUpdateScope,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let target: OrderStatus = payload.status.parse()?;

    let txn = state.orm.begin().await?;
    let order = find_order(&txn, id, true).await?;
    let current = stored_status(&order.status)?;
    authorize_status_update(scope, user.user_id, order.user_id, current, target)?;

    let order = swap_status(&txn, order, current, target).await?;
    let view = load_order_view(&txn, order).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %id,
        actor = %user.user_id,
        from = %current,
        to = %target,
        ?scope,
        "order status updated"
    );
    audit::record(
        state,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": id, "from": current, "to": target }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        view,
        Some(Meta::empty()),
    ))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let order = find_order(&txn, id, true).await?;
    ensure_owner(user.user_id, order.user_id, "cancel")?;
    let current = stored_status(&order.status)?;
    ensure_cancellable(current)?;

    let order = swap_status(&txn, order, current, OrderStatus::Cancelled).await?;
    let view = load_order_view(&txn, order).await?;
    txn.commit().await?;

    tracing::info!(order_id = %id, user_id = %user.user_id, "order cancelled");
    audit::record(
        state,
        user.user_id,
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        view,
        Some(Meta::empty()),
    ))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let order = find_order(&txn, id, true).await?;
    ensure_owner(user.user_id, order.user_id, "delete")?;
    let current = stored_status(&order.status)?;
    ensure_deletable(current)?;

    // items first, the store does not cascade
    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .exec(&txn)
        .await?;

    let deleted = Orders::delete_many()
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(current.as_str()))
        .exec(&txn)
        .await?;
    if deleted.rows_affected == 0 {
        return Err(AppError::InvalidStateTransition(
            "order status changed concurrently".into(),
        ));
    }
    txn.commit().await?;

    tracing::info!(order_id = %id, user_id = %user.user_id, "order deleted");
    audit::record(
        state,
        user.user_id,
        "order_delete",
        "orders",
        serde_json::json!({ "order_id": id, "status": current }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order deleted",
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

/// One page of orders matching `condition`, each with its items and products.
pub(crate) async fn list_orders_matching(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<(OrderList, Meta)> {
    let (page, limit, offset) = query.pagination().normalize()?;
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: OrderStatus = status.parse()?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = load_order_views(&state.orm, orders).await?;

    Ok((OrderList { items }, Meta::new(page, limit, total)))
}

async fn find_order<C: ConnectionTrait>(db: &C, id: Uuid, for_update: bool) -> AppResult<OrderModel> {
    let mut finder = Orders::find_by_id(id);
    if for_update {
        finder = finder.lock(LockType::Update);
    }
    finder
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("order not found".into()))
}

/// Write `target` only if the row still holds `current`.
async fn swap_status<C: ConnectionTrait>(
    db: &C,
    order: OrderModel,
    current: OrderStatus,
    target: OrderStatus,
) -> AppResult<OrderModel> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let result = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(target.as_str()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now))
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(current.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::InvalidStateTransition(
            "order status changed concurrently".into(),
        ));
    }

    Ok(OrderModel {
        status: target.as_str().to_string(),
        updated_at: now,
        ..order
    })
}

async fn load_order_view<C: ConnectionTrait>(db: &C, order: OrderModel) -> AppResult<OrderWithItems> {
    load_order_views(db, vec![order])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order view assembly lost the order")))
}

/// Attach items and products to `orders` with one extra query, whatever
/// the number of orders.
pub(crate) async fn load_order_views<C: ConnectionTrait>(
    db: &C,
    orders: Vec<OrderModel>,
) -> AppResult<Vec<OrderWithItems>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
    let rows = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(ids))
        .order_by_asc(OrderItemCol::CreatedAt)
        .find_also_related(Products)
        .all(db)
        .await?;

    let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for (item, product) in rows {
        items_by_order
            .entry(item.order_id)
            .or_default()
            .push(OrderItem {
                id: item.id,
                order_id: item.order_id,
                product_id: item.product_id,
                size: item.size,
                quantity: item.quantity,
                price: item.price,
                product: product.map(product_from_entity),
            });
    }

    orders
        .into_iter()
        .map(|order| {
            let items = items_by_order.remove(&order.id).unwrap_or_default();
            Ok(OrderWithItems {
                order: order_from_entity(order)?,
                items,
            })
        })
        .collect()
}

fn stored_status(raw: &str) -> AppResult<OrderStatus> {
    raw.parse()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("order has unknown status {raw:?}")))
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        total: model.total,
        status: stored_status(&model.status)?,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
