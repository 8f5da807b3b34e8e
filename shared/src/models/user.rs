//! User and role models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub status: UserStatus,
    /// At most one role; `None` until an administrator assigns one
    pub role: Option<Role>,
    /// Supplier the account belongs to, for supplier-scoped visibility
    pub supplier_id: Option<Uuid>,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account activation status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Pending,
    Active,
    Disabled,
}

/// Roles a user can hold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Management,
    Staff,
    Supplier,
    Guest,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "PENDING",
            UserStatus::Active => "ACTIVE",
            UserStatus::Disabled => "DISABLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(UserStatus::Pending),
            "ACTIVE" => Some(UserStatus::Active),
            "DISABLED" => Some(UserStatus::Disabled),
            _ => None,
        }
    }
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Management,
        Role::Staff,
        Role::Supplier,
        Role::Guest,
    ];

    /// Actions this role may perform
    pub fn allowed_actions(&self) -> &'static [Action] {
        match self {
            Role::Admin => &[
                Action::View,
                Action::Create,
                Action::Update,
                Action::Close,
                Action::Reopen,
                Action::Delete,
                Action::EditQuantities,
            ],
            Role::Staff => &[
                Action::View,
                Action::Create,
                Action::Update,
                Action::Close,
                Action::EditQuantities,
            ],
            Role::Management | Role::Supplier | Role::Guest => &[Action::View],
        }
    }

    pub fn can(&self, action: Action) -> bool {
        self.allowed_actions().contains(&action)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Management => "management",
            Role::Staff => "staff",
            Role::Supplier => "supplier",
            Role::Guest => "guest",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|role| role.as_str() == s)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::Management => write!(f, "Management"),
            Role::Staff => write!(f, "Staff"),
            Role::Supplier => write!(f, "Supplier"),
            Role::Guest => write!(f, "Guest"),
        }
    }
}

/// Actions that can be performed on batches, orders and their records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Update,
    Close,
    Reopen,
    Delete,
    /// Create or edit allocations and distributions
    EditQuantities,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::View => write!(f, "view"),
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Close => write!(f, "close"),
            Action::Reopen => write!(f, "reopen"),
            Action::Delete => write!(f, "delete"),
            Action::EditQuantities => write!(f, "edit quantities of"),
        }
    }
}

impl User {
    /// Whether the user may perform `action` at all.
    ///
    /// Superusers may do everything; accounts that are not active or have
    /// no role may do nothing.
    pub fn can(&self, action: Action) -> bool {
        if self.is_superuser {
            return true;
        }
        if self.status != UserStatus::Active {
            return false;
        }
        self.role.is_some_and(|role| role.can(action))
    }

    /// Whether the user may see a batch supplied by `supplier_id`
    pub fn can_view_supplier(&self, supplier_id: Option<Uuid>) -> bool {
        if !self.can(Action::View) {
            return false;
        }
        match self.role {
            Some(Role::Supplier) if !self.is_superuser => {
                self.supplier_id.is_some() && self.supplier_id == supplier_id
            }
            _ => true,
        }
    }

    /// Whether the user may change the role or status of other accounts
    pub fn can_manage_users(&self) -> bool {
        self.is_superuser || (self.status == UserStatus::Active && self.role == Some(Role::Admin))
    }

    /// Message explaining why the account cannot access anything
    pub fn denial_reason(&self) -> &'static str {
        match self.status {
            UserStatus::Pending => "Your account is not activated yet.",
            UserStatus::Disabled => "Your account has been disabled.",
            UserStatus::Active => "You don't have the right permission to access this page.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<Role>, status: UserStatus) -> User {
        User {
            id: Uuid::new_v4(),
            username: "tester".to_string(),
            email: None,
            status,
            role,
            supplier_id: None,
            is_superuser: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_can_reopen_staff_cannot() {
        assert!(user(Some(Role::Admin), UserStatus::Active).can(Action::Reopen));
        assert!(!user(Some(Role::Staff), UserStatus::Active).can(Action::Reopen));
        assert!(user(Some(Role::Staff), UserStatus::Active).can(Action::Close));
    }

    #[test]
    fn test_inactive_or_roleless_users_are_denied() {
        assert!(!user(Some(Role::Admin), UserStatus::Pending).can(Action::View));
        assert!(!user(Some(Role::Admin), UserStatus::Disabled).can(Action::View));
        assert!(!user(None, UserStatus::Active).can(Action::View));
    }

    #[test]
    fn test_superuser_bypasses_role() {
        let mut admin = user(None, UserStatus::Pending);
        admin.is_superuser = true;
        assert!(admin.can(Action::Delete));
    }

    #[test]
    fn test_supplier_sees_only_own_batches() {
        let supplier_id = Uuid::new_v4();
        let mut supplier = user(Some(Role::Supplier), UserStatus::Active);
        supplier.supplier_id = Some(supplier_id);

        assert!(supplier.can_view_supplier(Some(supplier_id)));
        assert!(!supplier.can_view_supplier(Some(Uuid::new_v4())));
        assert!(!supplier.can_view_supplier(None));
        assert!(user(Some(Role::Guest), UserStatus::Active).can_view_supplier(None));
    }

    #[test]
    fn test_only_admins_manage_users() {
        assert!(user(Some(Role::Admin), UserStatus::Active).can_manage_users());
        assert!(!user(Some(Role::Admin), UserStatus::Disabled).can_manage_users());
        assert!(!user(Some(Role::Staff), UserStatus::Active).can_manage_users());
        assert_eq!(Role::from_str("management"), Some(Role::Management));
    }

    #[test]
    fn test_view_only_roles() {
        for role in [Role::Management, Role::Supplier, Role::Guest] {
            assert_eq!(role.allowed_actions(), &[Action::View]);
        }
    }
}
