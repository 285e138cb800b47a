mod common;

use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, PaginatorTrait};
use uuid::Uuid;

use common::{add, create_product, create_product_with, create_user, setup_state};
use storefront_orders::{
    dto::orders::UpdateOrderStatusRequest,
    entity::{
        audit_logs::Entity as AuditLogs, order_items::Entity as OrderItems,
        orders::Entity as Orders, products::ActiveModel as ProductActive,
    },
    error::AppError,
    models::{OrderStatus, Role},
    routes::params::OrderListQuery,
    services::{admin_service, cart_service, order_rules::StatusUpdateScope, order_service},
};

fn status(s: &str) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest { status: s.into() }
}

#[tokio::test]
async fn place_order_snapshots_prices_and_empties_cart() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;
    let shirt = create_product(&state, 500).await;
    let scarf = create_product(&state, 1000).await;

    add(&state, &user, shirt, "M", 2).await;
    add(&state, &user, scarf, "L", 1).await;

    let resp = order_service::place_order(&state, &user).await.unwrap();
    assert_eq!(resp.status, 201);
    let view = resp.data.unwrap();
    assert_eq!(view.order.total, 2000);
    assert_eq!(view.order.status, OrderStatus::Placed);
    assert_eq!(view.order.user_id, user.user_id);
    assert_eq!(view.items.len(), 2);

    let shirt_line = view.items.iter().find(|i| i.product_id == shirt).unwrap();
    assert_eq!((shirt_line.price, shirt_line.quantity), (500, 2));
    assert_eq!(shirt_line.size, "M");
    assert!(shirt_line.product.is_some());

    let cart = cart_service::get_cart(&state, &user).await.unwrap().data.unwrap();
    assert!(cart.items.is_empty());

    let audits = AuditLogs::find().count(&state.orm).await.unwrap();
    assert!(audits >= 3, "two cart adds and one order placement");
}

#[tokio::test]
async fn place_order_rejects_missing_and_empty_carts() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;

    let err = order_service::place_order(&state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let kit = create_product(&state, 700).await;
    add(&state, &user, kit, "S", 1).await;
    order_service::place_order(&state, &user).await.unwrap();

    let err = order_service::place_order(&state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::Empty(_)));
    assert_eq!(Orders::find().count(&state.orm).await.unwrap(), 1);
}

#[tokio::test]
async fn inactive_product_blocks_checkout_and_leaves_cart_intact() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;
    let kit = create_product(&state, 700).await;
    add(&state, &user, kit, "S", 1).await;

    ProductActive {
        id: Set(kit),
        is_active: Set(false),
        ..Default::default()
    }
    .update(&state.orm)
    .await
    .unwrap();

    let err = order_service::place_order(&state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    assert_eq!(Orders::find().count(&state.orm).await.unwrap(), 0);

    let cart = cart_service::get_cart(&state, &user).await.unwrap().data.unwrap();
    assert_eq!(cart.items.len(), 1);
}

#[tokio::test]
async fn later_price_changes_do_not_touch_placed_orders() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;
    let kit = create_product(&state, 500).await;

    add(&state, &user, kit, "M", 2).await;
    let first = order_service::place_order(&state, &user)
        .await
        .unwrap()
        .data
        .unwrap();

    ProductActive {
        id: Set(kit),
        price: Set(800),
        ..Default::default()
    }
    .update(&state.orm)
    .await
    .unwrap();

    add(&state, &user, kit, "M", 1).await;
    let second = order_service::place_order(&state, &user)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(second.order.total, 800);

    let reloaded = order_service::get_order(&state, &user, first.order.id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(reloaded.order.total, 1000);
    assert_eq!(reloaded.items[0].price, 500);
}

#[tokio::test]
async fn cancel_is_owner_only_and_happens_once() {
    let state = setup_state().await;
    let owner = create_user(&state, Role::User).await;
    let stranger = create_user(&state, Role::User).await;
    let kit = create_product(&state, 300).await;
    add(&state, &owner, kit, "XL", 1).await;
    let order = order_service::place_order(&state, &owner)
        .await
        .unwrap()
        .data
        .unwrap()
        .order;

    let err = order_service::cancel_order(&state, &stranger, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let cancelled = order_service::cancel_order(&state, &owner, order.id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);

    let err = order_service::cancel_order(&state, &owner, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;

    let err = order_service::get_order(&state, &user, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = order_service::cancel_order(&state, &user, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn owner_status_update_only_cancels() {
    let state = setup_state().await;
    let owner = create_user(&state, Role::User).await;
    let kit = create_product(&state, 300).await;
    add(&state, &owner, kit, "M", 1).await;
    let id = order_service::place_order(&state, &owner)
        .await
        .unwrap()
        .data
        .unwrap()
        .order
        .id;

    let err = order_service::update_status_by_id(
        &state,
        &owner,
        id,
        status("SHIPPED"),
        StatusUpdateScope::Owner,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = order_service::update_status_by_id(
        &state,
        &owner,
        id,
        status("shipped-ish"),
        StatusUpdateScope::Owner,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let view = order_service::update_status_by_id(
        &state,
        &owner,
        id,
        status("CANCELLED"),
        StatusUpdateScope::Owner,
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(view.order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn admin_ships_then_owner_cannot_cancel_or_delete() {
    let state = setup_state().await;
    let owner = create_user(&state, Role::User).await;
    let admin = create_user(&state, Role::Admin).await;
    let kit = create_product(&state, 450).await;
    add(&state, &owner, kit, "M", 2).await;
    let id = order_service::place_order(&state, &owner)
        .await
        .unwrap()
        .data
        .unwrap()
        .order
        .id;

    let err = admin_service::update_order_status(&state, &owner, id, status("SHIPPED"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let shipped = admin_service::update_order_status(&state, &admin, id, status("SHIPPED"))
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(shipped.order.status, OrderStatus::Shipped);
    assert_eq!(shipped.order.total, 900);

    let err = order_service::cancel_order(&state, &owner, id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
    let err = order_service::delete_order(&state, &owner, id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    let delivered = admin_service::update_order_status(&state, &admin, id, status("DELIVERED"))
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(delivered.order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn delete_removes_order_and_its_items() {
    let state = setup_state().await;
    let owner = create_user(&state, Role::User).await;
    let stranger = create_user(&state, Role::User).await;
    let kit = create_product(&state, 100).await;

    add(&state, &owner, kit, "M", 1).await;
    let placed = order_service::place_order(&state, &owner)
        .await
        .unwrap()
        .data
        .unwrap()
        .order
        .id;
    add(&state, &owner, kit, "L", 3).await;
    let cancelled = order_service::place_order(&state, &owner)
        .await
        .unwrap()
        .data
        .unwrap()
        .order
        .id;
    order_service::cancel_order(&state, &owner, cancelled)
        .await
        .unwrap();

    let err = order_service::delete_order(&state, &stranger, placed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    order_service::delete_order(&state, &owner, placed).await.unwrap();
    order_service::delete_order(&state, &owner, cancelled)
        .await
        .unwrap();

    assert_eq!(Orders::find().count(&state.orm).await.unwrap(), 0);
    assert_eq!(OrderItems::find().count(&state.orm).await.unwrap(), 0);

    let err = order_service::get_order(&state, &owner, placed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn listing_is_scoped_filtered_and_paginated() {
    let state = setup_state().await;
    let alice = create_user(&state, Role::User).await;
    let bob = create_user(&state, Role::User).await;
    let admin = create_user(&state, Role::Admin).await;
    let kit = create_product(&state, 100).await;

    for _ in 0..3 {
        add(&state, &alice, kit, "M", 1).await;
        order_service::place_order(&state, &alice).await.unwrap();
    }
    add(&state, &bob, kit, "M", 1).await;
    let bobs = order_service::place_order(&state, &bob)
        .await
        .unwrap()
        .data
        .unwrap()
        .order
        .id;
    order_service::cancel_order(&state, &bob, bobs).await.unwrap();

    let page = order_service::list_orders(
        &state,
        &alice,
        OrderListQuery {
            page: Some(1),
            per_page: Some(2),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(page.data.as_ref().unwrap().items.len(), 2);
    assert_eq!(page.meta.as_ref().unwrap().total, Some(3));
    assert!(
        page.data
            .unwrap()
            .items
            .iter()
            .all(|o| o.order.user_id == alice.user_id && !o.items.is_empty())
    );

    let err = admin_service::list_all_orders(&state, &alice, OrderListQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let all = admin_service::list_all_orders(&state, &admin, OrderListQuery::default())
        .await
        .unwrap();
    assert_eq!(all.meta.unwrap().total, Some(4));

    let cancelled = admin_service::list_all_orders(
        &state,
        &admin,
        OrderListQuery {
            status: Some("CANCELLED".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(cancelled.items.len(), 1);
    assert_eq!(cancelled.items[0].order.id, bobs);

    let err = order_service::list_orders(
        &state,
        &alice,
        OrderListQuery {
            status: Some("LOST".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

// The test pool has one connection, so the two checkouts run back to back
// and SQLite ignores FOR UPDATE. This pins the drain-once outcome; the cart
// row lock itself only bites on Postgres.
#[tokio::test]
async fn back_to_back_checkouts_of_one_cart_create_one_order() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;
    let kit = create_product(&state, 250).await;
    add(&state, &user, kit, "M", 4).await;

    let (a, b) = tokio::join!(
        order_service::place_order(&state, &user),
        order_service::place_order(&state, &user),
    );

    let placed = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(placed, 1);
    let failure = if let Err(err) = a { err } else { b.unwrap_err() };
    assert!(matches!(failure, AppError::Empty(_)));
    assert_eq!(Orders::find().count(&state.orm).await.unwrap(), 1);
}

#[tokio::test]
async fn inactive_products_cannot_be_added() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;
    let retired = create_product_with(&state, 100, false).await;

    let err = cart_service::add_to_cart(
        &state,
        &user,
        storefront_orders::dto::cart::AddToCartRequest {
            product_id: retired,
            size: "M".into(),
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
