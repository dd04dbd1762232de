//! Integration tests for the order lifecycle.
//!
//! Exercises status transitions through `OrderActor::authorize`, the same
//! check the repository runs inside its transaction for admin status
//! changes and customer cancellations.

#![allow(clippy::unwrap_used)]

use agora_commerce::db::RepositoryError;
use agora_commerce::db::orders::{Order, OrderActor};
use agora_core::{AdminUserId, Email, Money, OrderId, OrderStatus, Phone, UserId};
use chrono::Utc;

const CUSTOMER: UserId = UserId::new(7);
const ADMIN: OrderActor = OrderActor::Admin(AdminUserId::new(1));

fn order(status: OrderStatus) -> Order {
    Order {
        id: OrderId::new(100),
        item_id: "000100".to_owned(),
        user_id: CUSTOMER,
        customer_name: "Anna".to_owned(),
        customer_email: Email::parse("anna@example.com").unwrap(),
        customer_phone: Phone::parse("+79990001122").unwrap(),
        comment: String::new(),
        status,
        total: Money::ZERO,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// =============================================================================
// Admin transitions
// =============================================================================

#[test]
fn test_admin_walks_the_happy_path() {
    let mut current = OrderStatus::Pending;
    for next in [OrderStatus::Confirmed, OrderStatus::Ready, OrderStatus::Done] {
        current = ADMIN.authorize(&order(current), next).unwrap();
    }
    assert_eq!(current, OrderStatus::Done);
    assert!(current.next_statuses().is_empty());
}

#[test]
fn test_admin_cannot_skip_steps() {
    let err = ADMIN
        .authorize(&order(OrderStatus::Pending), OrderStatus::Done)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Invalid(ref msg) if msg.contains("pending")));
}

#[test]
fn test_admin_cancels_until_done() {
    for status in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Ready] {
        assert_eq!(
            ADMIN.authorize(&order(status), OrderStatus::Canceled).unwrap(),
            OrderStatus::Canceled
        );
    }
    assert!(
        ADMIN
            .authorize(&order(OrderStatus::Done), OrderStatus::Canceled)
            .is_err()
    );
}

#[test]
fn test_terminal_statuses_stay_put() {
    for status in [OrderStatus::Done, OrderStatus::Canceled] {
        for to in OrderStatus::ALL {
            assert!(ADMIN.authorize(&order(status), to).is_err(), "{status} -> {to}");
        }
    }
}

// =============================================================================
// Customer cancellation
// =============================================================================

#[test]
fn test_customer_cancels_pending_order() {
    let actor = OrderActor::Customer(CUSTOMER);
    assert_eq!(
        actor
            .authorize(&order(OrderStatus::Pending), OrderStatus::Canceled)
            .unwrap(),
        OrderStatus::Canceled
    );
}

#[test]
fn test_customer_cannot_cancel_confirmed_order() {
    let actor = OrderActor::Customer(CUSTOMER);
    let err = actor
        .authorize(&order(OrderStatus::Confirmed), OrderStatus::Canceled)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Invalid(_)));
}

#[test]
fn test_customer_cannot_confirm() {
    let actor = OrderActor::Customer(CUSTOMER);
    assert!(
        actor
            .authorize(&order(OrderStatus::Pending), OrderStatus::Confirmed)
            .is_err()
    );
}

#[test]
fn test_other_customers_order_is_not_found() {
    let actor = OrderActor::Customer(UserId::new(8));
    let err = actor
        .authorize(&order(OrderStatus::Pending), OrderStatus::Canceled)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound));
}

#[test]
fn test_order_serializes_status_in_snake_case() {
    let json = serde_json::to_value(order(OrderStatus::Ready)).unwrap();
    assert_eq!(json["status"], "ready");
    assert_eq!(json["item_id"], "000100");
}
