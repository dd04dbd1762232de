//! Status and variant enums for catalogue and sales entities.
//!
//! All of these are stored as `PostgreSQL` enum types (see `migrations/`),
//! so the `sqlx` type names below must match the migration DDL.

use serde::{Deserialize, Serialize};

/// Error returned when an order status change is not allowed.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("order cannot move from {from} to {to}")]
pub struct TransitionError {
    /// Current status.
    pub from: OrderStatus,
    /// Requested status.
    pub to: OrderStatus,
}

/// Order lifecycle status.
///
/// ```text
/// Pending ──► Confirmed ──► Ready ──► Done
///    │            │           │
///    └────────────┴───────────┴──► Canceled
/// ```
///
/// `Done` and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sales.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed by the customer, not yet seen by the shop.
    #[default]
    Pending,
    /// Accepted by the shop.
    Confirmed,
    /// Packed and waiting for pickup or delivery.
    Ready,
    /// Handed over to the customer.
    Done,
    /// Canceled by the customer or the shop.
    Canceled,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::Ready,
        Self::Done,
        Self::Canceled,
    ];

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }

    /// Whether the order may move from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Ready)
                | (Self::Ready, Self::Done)
                | (Self::Pending | Self::Confirmed | Self::Ready, Self::Canceled)
        )
    }

    /// Validate a transition and return the new status.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the move is not part of the lifecycle.
    pub const fn transition(self, to: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }

    /// Customers can only withdraw orders the shop has not accepted yet.
    #[must_use]
    pub const fn can_be_canceled_by_customer(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Statuses reachable from this one.
    #[must_use]
    pub fn next_statuses(self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|to| self.can_transition_to(*to))
            .collect()
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Ready => "ready",
            Self::Done => "done",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// How an attribute stores its value on a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "catalog.attribute_variant", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AttributeVariant {
    /// Exactly one option from the attribute's options group.
    Select,
    /// One or more options from the attribute's options group.
    MultipleSelect,
    /// Free text.
    Text,
    /// A decimal number, optionally with a metric.
    Number,
}

impl AttributeVariant {
    /// Whether values are options from an options group.
    #[must_use]
    pub const fn uses_options(self) -> bool {
        matches!(self, Self::Select | Self::MultipleSelect)
    }
}

/// How an attribute is presented on the product card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "catalog.attribute_view_variant", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AttributeViewVariant {
    /// Row in the characteristics list.
    #[default]
    List,
    /// Tag chip above the characteristics.
    Tag,
    /// Paragraph of text.
    Text,
    /// Rating from an outside source (critics, magazines).
    OuterRating,
}

/// How the options of a group are rendered in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "catalog.options_group_variant", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OptionsGroupVariant {
    /// Plain text labels.
    #[default]
    Text,
    /// Colour swatches; options carry a hex colour.
    Color,
    /// Icons; options carry an icon name.
    Icon,
}

/// Admin role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "admin.admin_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Full access including admin user management.
    SuperAdmin,
    /// Catalogue, tenants and orders.
    Admin,
    /// Catalogue content only.
    ContentManager,
    /// Read-only access.
    Viewer,
}

impl AdminRole {
    /// May create and edit rubrics, attributes, options and products.
    #[must_use]
    pub const fn can_edit_catalogue(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin | Self::ContentManager)
    }

    /// May manage companies, shops, stock and orders.
    #[must_use]
    pub const fn can_manage_orders(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }

    /// May create other admin users.
    #[must_use]
    pub const fn can_manage_admins(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

impl std::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SuperAdmin => write!(f, "super_admin"),
            Self::Admin => write!(f, "admin"),
            Self::ContentManager => write!(f, "content_manager"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "content_manager" => Ok(Self::ContentManager),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("invalid admin role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let status = OrderStatus::Pending
            .transition(OrderStatus::Confirmed)
            .and_then(|s| s.transition(OrderStatus::Ready))
            .and_then(|s| s.transition(OrderStatus::Done))
            .unwrap();
        assert_eq!(status, OrderStatus::Done);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_cannot_skip_or_go_back() {
        assert_eq!(
            OrderStatus::Pending.transition(OrderStatus::Done),
            Err(TransitionError {
                from: OrderStatus::Pending,
                to: OrderStatus::Done,
            })
        );
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for terminal in [OrderStatus::Done, OrderStatus::Canceled] {
            assert!(terminal.next_statuses().is_empty());
        }
    }

    #[test]
    fn test_cancel_allowed_until_done() {
        assert_eq!(
            OrderStatus::Confirmed.next_statuses(),
            vec![OrderStatus::Ready, OrderStatus::Canceled]
        );
        assert!(OrderStatus::Ready.can_transition_to(OrderStatus::Canceled));
        assert!(!OrderStatus::Done.can_transition_to(OrderStatus::Canceled));
    }

    #[test]
    fn test_customer_cancel_only_pending() {
        assert!(OrderStatus::Pending.can_be_canceled_by_customer());
        assert!(!OrderStatus::Confirmed.can_be_canceled_by_customer());
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_role_capabilities() {
        assert!(AdminRole::ContentManager.can_edit_catalogue());
        assert!(!AdminRole::ContentManager.can_manage_orders());
        assert!(!AdminRole::Viewer.can_edit_catalogue());
        assert!(AdminRole::SuperAdmin.can_manage_admins());
        assert!(!AdminRole::Admin.can_manage_admins());
    }

    #[test]
    fn test_variant_uses_options() {
        assert!(AttributeVariant::MultipleSelect.uses_options());
        assert!(!AttributeVariant::Number.uses_options());
    }
}
