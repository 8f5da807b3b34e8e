//! OPEN/CLOSED lifecycle shared by batches and delivery orders
//!
//! Staff and administrators close records, only administrators reopen or
//! delete them, and deletion is only possible once a record is closed.
//! Every successful transition touches the audit stamp.

use super::{Action, Batch, DeliveryOrder, User};
use crate::error::TransitionError;
use crate::types::{AuditStamp, RecordStatus};

/// Check that `actor` may perform `action` on an `entity`
pub fn authorize(entity: &'static str, actor: &User, action: Action) -> Result<(), TransitionError> {
    if actor.can(action) {
        Ok(())
    } else {
        Err(TransitionError::not_permitted(entity, action, actor.role))
    }
}

/// A record with an OPEN/CLOSED status and an audit stamp
pub trait Lifecycle {
    /// Name used in messages
    const ENTITY: &'static str;

    fn status(&self) -> RecordStatus;
    fn set_status(&mut self, status: RecordStatus);
    fn audit_mut(&mut self) -> &mut AuditStamp;

    fn close(&mut self, actor: &User) -> Result<(), TransitionError> {
        self.transition(actor, Action::Close, RecordStatus::Open, RecordStatus::Closed)
    }

    fn reopen(&mut self, actor: &User) -> Result<(), TransitionError> {
        self.transition(actor, Action::Reopen, RecordStatus::Closed, RecordStatus::Open)
    }

    /// Check that the record may be deleted; removal is left to the caller
    fn ensure_deletable(&self, actor: &User) -> Result<(), TransitionError> {
        authorize(Self::ENTITY, actor, Action::Delete)?;
        self.require_status(Action::Delete, RecordStatus::Closed)
    }

    /// Check that child quantities may be edited
    fn ensure_editable(&self, actor: &User) -> Result<(), TransitionError> {
        authorize(Self::ENTITY, actor, Action::EditQuantities)?;
        self.require_status(Action::EditQuantities, RecordStatus::Open)
    }

    /// Record an update by `actor` without changing the status
    fn touch(&mut self, actor: &User) {
        self.audit_mut().touch(Some(actor.id));
    }

    fn transition(
        &mut self,
        actor: &User,
        action: Action,
        from: RecordStatus,
        to: RecordStatus,
    ) -> Result<(), TransitionError> {
        authorize(Self::ENTITY, actor, action)?;
        self.require_status(action, from)?;
        self.set_status(to);
        self.touch(actor);
        Ok(())
    }

    fn require_status(&self, action: Action, required: RecordStatus) -> Result<(), TransitionError> {
        let status = self.status();
        if status != required {
            return Err(TransitionError::InvalidState {
                entity: Self::ENTITY,
                action,
                status,
            });
        }
        Ok(())
    }
}

impl Lifecycle for DeliveryOrder {
    const ENTITY: &'static str = "delivery order";

    fn status(&self) -> RecordStatus {
        self.status
    }

    fn set_status(&mut self, status: RecordStatus) {
        self.status = status;
    }

    fn audit_mut(&mut self) -> &mut AuditStamp {
        &mut self.audit
    }
}

impl Lifecycle for Batch {
    const ENTITY: &'static str = "batch";

    fn status(&self) -> RecordStatus {
        self.status
    }

    fn set_status(&mut self, status: RecordStatus) {
        self.status = status;
    }

    fn audit_mut(&mut self) -> &mut AuditStamp {
        &mut self.audit
    }
}

impl Batch {
    /// Mark a closed batch as deleted; it is kept but hidden from listings
    pub fn soft_delete(&mut self, actor: &User) -> Result<(), TransitionError> {
        self.ensure_deletable(actor)?;
        self.is_deleted = true;
        self.touch(actor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, UserStatus};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn actor(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: format!("{role}").to_lowercase(),
            email: None,
            status: UserStatus::Active,
            role: Some(role),
            supplier_id: None,
            is_superuser: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn order() -> DeliveryOrder {
        DeliveryOrder::new("MV Abay", "BL-1", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
    }

    #[test]
    fn test_staff_closes_and_touch_records_actor() {
        let staff = actor(Role::Staff);
        let mut order = order();
        order.close(&staff).unwrap();
        assert_eq!(order.status, RecordStatus::Closed);
        assert_eq!(order.audit.updated_by, Some(staff.id));
    }

    #[test]
    fn test_staff_cannot_reopen() {
        let mut order = order();
        order.close(&actor(Role::Staff)).unwrap();
        let err = order.reopen(&actor(Role::Staff)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Staff may not reopen a delivery order"
        );
        order.reopen(&actor(Role::Admin)).unwrap();
        assert_eq!(order.status, RecordStatus::Open);
    }

    #[test]
    fn test_closing_twice_is_invalid() {
        let admin = actor(Role::Admin);
        let mut order = order();
        order.close(&admin).unwrap();
        let err = order.close(&admin).unwrap_err();
        assert_eq!(err.to_string(), "cannot close a delivery order that is closed");
    }

    #[test]
    fn test_delete_requires_closed_and_admin() {
        let admin = actor(Role::Admin);
        let mut order = order();
        assert!(matches!(
            order.ensure_deletable(&admin),
            Err(TransitionError::InvalidState { .. })
        ));
        order.close(&admin).unwrap();
        assert!(order.ensure_deletable(&admin).is_ok());
        assert!(matches!(
            order.ensure_deletable(&actor(Role::Staff)),
            Err(TransitionError::NotPermitted { .. })
        ));
    }

    #[test]
    fn test_closed_order_is_not_editable() {
        let staff = actor(Role::Staff);
        let mut order = order();
        assert!(order.ensure_editable(&staff).is_ok());
        order.close(&staff).unwrap();
        assert!(order.ensure_editable(&staff).is_err());
        assert!(matches!(
            order.ensure_editable(&actor(Role::Guest)),
            Err(TransitionError::NotPermitted { .. })
        ));
    }

    #[test]
    fn test_batch_soft_delete() {
        let admin = actor(Role::Admin);
        let mut batch = Batch::new("LOT 3", "LC-3", dec!(10), dec!(2), 2020);
        assert!(batch.soft_delete(&admin).is_err());
        batch.close(&admin).unwrap();
        batch.soft_delete(&admin).unwrap();
        assert!(batch.is_deleted);
    }

    #[test]
    fn test_role_less_user_message() {
        let mut user = actor(Role::Admin);
        user.role = None;
        let err = order().close(&user).unwrap_err();
        assert_eq!(err.to_string(), "user without a role may not close a delivery order");
    }
}
