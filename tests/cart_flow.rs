mod common;

use uuid::Uuid;

use common::{add, create_product, create_user, setup_state};
use storefront_orders::{
    dto::cart::{AddToCartRequest, UpdateCartItemRequest},
    error::AppError,
    models::Role,
    services::cart_service,
};

#[tokio::test]
async fn first_add_creates_the_cart_and_repeats_merge() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;
    let kit = create_product(&state, 900).await;

    let err = cart_service::get_cart(&state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    add(&state, &user, kit, "M", 1).await;
    add(&state, &user, kit, "M", 2).await;
    add(&state, &user, kit, "L", 1).await;

    let cart = cart_service::get_cart(&state, &user).await.unwrap().data.unwrap();
    assert_eq!(cart.user_id, user.user_id);
    assert_eq!(cart.items.len(), 2);

    let medium = cart.items.iter().find(|i| i.size == "M").unwrap();
    assert_eq!(medium.quantity, 3);
    assert_eq!(medium.product.as_ref().map(|p| p.price), Some(900));
}

#[tokio::test]
async fn add_validates_quantity_size_and_product() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;
    let kit = create_product(&state, 900).await;

    let bad = [
        (kit, "M", 0),
        (kit, "  ", 1),
        (Uuid::new_v4(), "M", 1),
    ];
    for (product_id, size, quantity) in bad {
        let err = cart_service::add_to_cart(
            &state,
            &user,
            AddToCartRequest {
                product_id,
                size: size.into(),
                quantity,
            },
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, AppError::InvalidArgument(_) | AppError::NotFound(_)),
            "{err:?}"
        );
    }
}

#[tokio::test]
async fn update_changes_quantity_and_merges_on_size_collision() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;
    let kit = create_product(&state, 400).await;
    add(&state, &user, kit, "M", 1).await;
    add(&state, &user, kit, "L", 2).await;

    let cart = cart_service::get_cart(&state, &user).await.unwrap().data.unwrap();
    let medium = cart.items.iter().find(|i| i.size == "M").unwrap().id;
    let large = cart.items.iter().find(|i| i.size == "L").unwrap().id;

    let updated = cart_service::update_cart_item(
        &state,
        &user,
        medium,
        UpdateCartItemRequest {
            quantity: Some(5),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!((updated.size.as_str(), updated.quantity), ("M", 5));

    let merged = cart_service::update_cart_item(
        &state,
        &user,
        medium,
        UpdateCartItemRequest {
            size: Some("L".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(merged.id, large);
    assert_eq!(merged.quantity, 7);

    let cart = cart_service::get_cart(&state, &user).await.unwrap().data.unwrap();
    assert_eq!(cart.items.len(), 1);
}

#[tokio::test]
async fn update_rejects_empty_or_invalid_payloads() {
    let state = setup_state().await;
    let user = create_user(&state, Role::User).await;
    let kit = create_product(&state, 400).await;
    add(&state, &user, kit, "M", 1).await;
    let item = cart_service::get_cart(&state, &user)
        .await
        .unwrap()
        .data
        .unwrap()
        .items[0]
        .id;

    for payload in [
        UpdateCartItemRequest::default(),
        UpdateCartItemRequest {
            quantity: Some(-1),
            ..Default::default()
        },
        UpdateCartItemRequest {
            size: Some(String::new()),
            ..Default::default()
        },
    ] {
        let err = cart_service::update_cart_item(&state, &user, item, payload)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
}

#[tokio::test]
async fn other_users_cart_lines_are_off_limits() {
    let state = setup_state().await;
    let owner = create_user(&state, Role::User).await;
    let intruder = create_user(&state, Role::User).await;
    let kit = create_product(&state, 400).await;
    add(&state, &owner, kit, "M", 1).await;
    let item = cart_service::get_cart(&state, &owner)
        .await
        .unwrap()
        .data
        .unwrap()
        .items[0]
        .id;

    let err = cart_service::remove_cart_item(&state, &intruder, item)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = cart_service::update_cart_item(
        &state,
        &intruder,
        item,
        UpdateCartItemRequest {
            quantity: Some(9),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    cart_service::remove_cart_item(&state, &owner, item)
        .await
        .unwrap();
    let err = cart_service::remove_cart_item(&state, &owner, item)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let cart = cart_service::get_cart(&state, &owner).await.unwrap().data.unwrap();
    assert!(cart.items.is_empty());
}

#[tokio::test]
async fn actor_without_a_user_row_cannot_create_a_cart() {
    let state = setup_state().await;
    let kit = create_product(&state, 400).await;
    let ghost = storefront_orders::middleware::auth::AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::User,
    };

    let err = cart_service::add_to_cart(
        &state,
        &ghost,
        AddToCartRequest {
            product_id: kit,
            size: "M".into(),
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}
