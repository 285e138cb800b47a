//! Authorization and state-machine rules for order transitions.
//!
//! Everything here is pure: callers load the order, ask these functions
//! whether the actor may proceed, then write with a compare-and-swap on the
//! observed status.

use uuid::Uuid;

use crate::{error::AppError, models::OrderStatus};

/// Which endpoint a status update arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdateScope {
    /// `/admin/order/{id}`: any target, any current state.
    Admin,
    /// `/orders/{id}/status`: the owner may only cancel.
    Owner,
}

pub fn ensure_owner(actor_id: Uuid, owner_id: Uuid, action: &str) -> Result<(), AppError> {
    if actor_id != owner_id {
        return Err(AppError::Forbidden(format!(
            "not authorized to {action} this order"
        )));
    }
    Ok(())
}

pub fn ensure_cancellable(current: OrderStatus) -> Result<(), AppError> {
    if !current.is_cancellable() {
        return Err(AppError::InvalidStateTransition(format!(
            "only placed orders can be cancelled (current status: {current})"
        )));
    }
    Ok(())
}

pub fn ensure_deletable(current: OrderStatus) -> Result<(), AppError> {
    if !current.is_deletable() {
        return Err(AppError::InvalidStateTransition(format!(
            "order cannot be deleted at this stage (current status: {current})"
        )));
    }
    Ok(())
}

/// Decide whether `actor_id` may move an order owned by `owner_id` from
/// `current` to `target` through `scope`.
pub fn authorize_status_update(
    scope: StatusUpdateScope,
    actor_id: Uuid,
    owner_id: Uuid,
    current: OrderStatus,
    target: OrderStatus,
) -> Result<(), AppError> {
    match scope {
        StatusUpdateScope::Admin => Ok(()),
        StatusUpdateScope::Owner => {
            ensure_owner(actor_id, owner_id, "update")?;
            if target != OrderStatus::Cancelled {
                return Err(AppError::Forbidden(
                    "customers can only cancel their own orders".into(),
                ));
            }
            ensure_cancellable(current)
        }
    }
}

/// Σ(unit price × quantity) over the lines, rejecting non-positive
/// quantities, negative prices and overflow.
pub fn order_total<I>(lines: I) -> Result<i64, AppError>
where
    I: IntoIterator<Item = (i64, i32)>,
{
    lines.into_iter().try_fold(0i64, |total, (price, quantity)| {
        if quantity <= 0 {
            return Err(AppError::InvalidArgument(
                "cart has an invalid quantity".into(),
            ));
        }
        if price < 0 {
            return Err(AppError::InvalidArgument("product has a negative price".into()));
        }
        price
            .checked_mul(i64::from(quantity))
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| AppError::InvalidArgument("order total is too large".into()))
    })
}
