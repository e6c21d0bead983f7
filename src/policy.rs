//! Role capabilities and per-task ownership checks
//!
//! Roles grant capabilities; capabilities alone are never enough to touch a
//! task. The actor must also own the task from the right side: admins act on
//! tasks they assigned, staff on tasks assigned to them.
use super::task::{Action, Task};
use super::user::{Actor, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// File new tasks and assign them.
    CreateTask,
    /// Approve or query completed work.
    ReviewTask,
    /// Accept, decline, work on and complete assigned tasks.
    WorkTask,
    /// Create and edit service offerings.
    ManageServices,
    /// Read tasks the actor is a party to.
    ViewOwnTasks,
}

const ADMIN: &[Capability] = &[
    Capability::CreateTask,
    Capability::ReviewTask,
    Capability::ManageServices,
    Capability::ViewOwnTasks,
];
const STAFF: &[Capability] = &[Capability::WorkTask, Capability::ViewOwnTasks];
const PARTNER: &[Capability] = &[Capability::ViewOwnTasks];

impl Role {
    // super_admin holds exactly the admin set for now
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::SuperAdmin | Role::Admin => ADMIN,
            Role::Staff => STAFF,
            Role::Partner => PARTNER,
        }
    }
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl Actor {
    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }
}

/// Whether `actor` may perform `action` on this particular task.
pub fn authorize(actor: &Actor, action: Action, task: &Task) -> bool {
    let is_assignee = task.assigned_to == actor.id;
    let is_assigner = task.assigned_by == actor.id;

    match action {
        Action::Accept | Action::Decline | Action::Complete => {
            actor.can(Capability::WorkTask) && is_assignee
        }
        Action::Approve | Action::Query => actor.can(Capability::ReviewTask) && is_assigner,
        Action::SubmitDocument => {
            (actor.can(Capability::WorkTask) && is_assignee)
                || (actor.can(Capability::ReviewTask) && is_assigner)
        }
        Action::View => actor.can(Capability::ViewOwnTasks) && (is_assignee || is_assigner),
    }
}

/// Whether `actor` may file a new task.
pub fn authorize_create(actor: &Actor) -> bool {
    actor.can(Capability::CreateTask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Applicant, DocumentRef, NewTask};
    use crate::types::{TimeSpan, TimeStamp};

    fn actor(id: &str, role: Role) -> Actor {
        Actor { id: id.into(), role }
    }

    fn task() -> Task {
        NewTask::new("Visa", "svc_1", "user_staff", TimeSpan::hours(4))
            .set_applicant(Applicant::new("Ada", "0803", "Lagos"))
            .set_application_form(DocumentRef::new("form.pdf").unwrap())
            .finalise("task_1".into(), "user_admin".into(), TimeStamp::now())
            .unwrap()
    }

    #[test]
    fn super_admin_matches_admin() {
        assert_eq!(Role::SuperAdmin.capabilities(), Role::Admin.capabilities());
        assert!(!Role::Partner.can(Capability::CreateTask));
        assert!(!Role::Staff.can(Capability::ReviewTask));
    }

    #[test]
    fn only_assignee_works_the_task() {
        let task = task();
        let staff = actor("user_staff", Role::Staff);
        let other_staff = actor("user_other", Role::Staff);
        let admin = actor("user_admin", Role::Admin);

        for action in [Action::Accept, Action::Decline, Action::Complete] {
            assert!(authorize(&staff, action, &task));
            assert!(!authorize(&other_staff, action, &task));
            assert!(!authorize(&admin, action, &task));
        }
    }

    #[test]
    fn only_assigner_reviews_the_task() {
        let task = task();
        let admin = actor("user_admin", Role::Admin);
        let other_admin = actor("user_other_admin", Role::SuperAdmin);
        let staff = actor("user_staff", Role::Staff);

        for action in [Action::Approve, Action::Query] {
            assert!(authorize(&admin, action, &task));
            assert!(!authorize(&other_admin, action, &task));
            assert!(!authorize(&staff, action, &task));
        }
    }

    #[test]
    fn role_must_match_the_side_owned() {
        // an admin who somehow ended up as assignee still cannot accept
        let mut task = task();
        task.assigned_to = "user_admin".into();
        let admin = actor("user_admin", Role::Admin);
        assert!(!authorize(&admin, Action::Accept, &task));
    }

    #[test]
    fn partner_is_read_only() {
        let mut task = task();
        task.assigned_by = "user_partner".into();
        let partner = actor("user_partner", Role::Partner);

        assert!(authorize(&partner, Action::View, &task));
        for action in Action::TRANSITIONS {
            assert!(!authorize(&partner, action, &task));
        }
        assert!(!authorize_create(&partner));
    }

    #[test]
    fn strangers_cannot_view() {
        let task = task();
        assert!(authorize(&actor("user_staff", Role::Staff), Action::View, &task));
        assert!(!authorize(&actor("user_x", Role::Admin), Action::View, &task));
    }
}
