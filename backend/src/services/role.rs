//! Role and account status management

use std::sync::Arc;

use chrono::Utc;
use shared::{Role, User, UserStatus};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

/// Role service; the only way to change a user's role
#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn ProcurementStore>,
}

impl RoleService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Give `user_id` the role `role` (or none), returning the previous role
    pub async fn assign_role(
        &self,
        actor: &User,
        user_id: Uuid,
        role: Option<Role>,
    ) -> AppResult<Option<Role>> {
        let mut user = self.managed_user(actor, user_id).await?;
        let previous = user.role;
        if previous == role {
            return Ok(previous);
        }

        user.role = role;
        user.updated_at = Utc::now();
        self.store.save_user(&user).await?;

        tracing::info!(
            user_id = %user_id,
            assigned_by = %actor.id,
            previous = previous.map(|r| r.as_str()),
            role = role.map(|r| r.as_str()),
            "Role assigned"
        );
        Ok(previous)
    }

    pub async fn activate_user(&self, actor: &User, user_id: Uuid) -> AppResult<User> {
        self.set_status(actor, user_id, UserStatus::Active).await
    }

    pub async fn disable_user(&self, actor: &User, user_id: Uuid) -> AppResult<User> {
        if actor.id == user_id {
            return Err(AppError::validation("user_id", "You cannot disable your own account"));
        }
        self.set_status(actor, user_id, UserStatus::Disabled).await
    }

    async fn set_status(&self, actor: &User, user_id: Uuid, status: UserStatus) -> AppResult<User> {
        let mut user = self.managed_user(actor, user_id).await?;
        if user.status != status {
            user.status = status;
            user.updated_at = Utc::now();
            self.store.save_user(&user).await?;
            tracing::info!(user_id = %user_id, status = status.as_str(), "Account status changed");
        }
        Ok(user)
    }

    async fn managed_user(&self, actor: &User, user_id: Uuid) -> AppResult<User> {
        if !actor.can_manage_users() {
            tracing::warn!(user_id = %actor.id, "User management denied");
            return Err(AppError::InsufficientPermissions(
                "Only administrators can manage users".to_string(),
            ));
        }
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user", user_id))
    }
}
