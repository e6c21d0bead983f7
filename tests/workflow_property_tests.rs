//! Property-based tests for the task workflow
//!
//! Random sequences of (actor, action) requests are replayed against a real
//! service and against a tiny reference model built from the edge table.
//! After every request the two must agree on the outcome and the status, and
//! the assignee's wallet must still equal the sum of their ledger.
//!
//! What these tests DON'T cover (deliberately):
//!
//! - Message wording (see the notification unit tests)
//! - Concurrent callers (see the scenarios)

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use task_portal::{
    PortalError, PortalService,
    task::{Action, Applicant, DocumentRef, NewTask, TaskStatus},
    types::{Money, TimeSpan},
    user::{Actor, NewUser, Role},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Who {
    Assignee,
    Assigner,
    OtherStaff,
    OtherAdmin,
    Partner,
}

#[derive(Debug, PartialEq, Eq)]
enum Expect {
    Unauthorized,
    Invalid,
    Moved(TaskStatus),
}

struct Cast {
    assignee: Actor,
    assigner: Actor,
    other_staff: Actor,
    other_admin: Actor,
    partner: Actor,
}

impl Cast {
    fn get(&self, who: Who) -> &Actor {
        match who {
            Who::Assignee => &self.assignee,
            Who::Assigner => &self.assigner,
            Who::OtherStaff => &self.other_staff,
            Who::OtherAdmin => &self.other_admin,
            Who::Partner => &self.partner,
        }
    }
}

/// Strategy to pick any actor
fn who_strategy() -> impl Strategy<Value = Who> {
    prop_oneof![
        3 => Just(Who::Assignee),
        3 => Just(Who::Assigner),
        1 => Just(Who::OtherStaff),
        1 => Just(Who::OtherAdmin),
        1 => Just(Who::Partner),
    ]
}

/// Strategy to pick any status-changing request
fn action_strategy() -> impl Strategy<Value = Action> {
    prop::sample::select(Action::TRANSITIONS.to_vec())
}

fn request_sequence_strategy() -> impl Strategy<Value = Vec<(Who, Action)>> {
    prop::collection::vec((who_strategy(), action_strategy()), 1..=16)
}

/// The reference model: who may do what, and where it leads.
fn expected(status: TaskStatus, who: Who, action: Action) -> Expect {
    let allowed = match action {
        Action::Accept | Action::Decline | Action::Complete => who == Who::Assignee,
        Action::Approve | Action::Query => who == Who::Assigner,
        Action::SubmitDocument => matches!(who, Who::Assignee | Who::Assigner),
        Action::View => matches!(who, Who::Assignee | Who::Assigner),
    };
    if !allowed {
        return Expect::Unauthorized;
    }
    // the assigner attaches documents without moving the task
    if action == Action::SubmitDocument && who == Who::Assigner {
        return Expect::Moved(status);
    }
    match status.next(action) {
        Some(to) => Expect::Moved(to),
        None => Expect::Invalid,
    }
}

fn setup() -> anyhow::Result<(PortalService, Cast, String)> {
    let db = sled::Config::new().temporary(true).open()?;
    let service = PortalService::new(Arc::new(db))?;

    let assigner = service.register_user(NewUser::new("admin", Role::Admin))?.actor();
    let cast = Cast {
        assignee: service.register_user(NewUser::new("staff", Role::Staff))?.actor(),
        other_staff: service.register_user(NewUser::new("staff2", Role::Staff))?.actor(),
        other_admin: service.register_user(NewUser::new("root", Role::SuperAdmin))?.actor(),
        partner: service.register_user(NewUser::new("firm", Role::Partner))?.actor(),
        assigner,
    };
    let offering = service.create_service(&cast.assigner, "Visa", "", Money::from_cents(12_345))?;

    let task = service.create_task(
        &cast.assigner,
        NewTask::new("Visa for Obi", &offering.id, &cast.assignee.id, TimeSpan::hours(8))
            .set_applicant(Applicant::new("Obi", "0803", "Abuja"))
            .set_application_form(DocumentRef::new("form.pdf")?),
    )?;

    Ok((service, cast, task.id))
}

fn request(
    service: &PortalService,
    actor: &Actor,
    task_id: &str,
    action: Action,
) -> Result<TaskStatus, PortalError> {
    let task = match action {
        Action::Approve => service.approve(actor, task_id)?,
        Action::Query => service.query(actor, task_id, "needs another look")?,
        Action::SubmitDocument => {
            service.update_document(actor, task_id, DocumentRef::new("processed.pdf")?)?
        }
        other => service.transition(actor, task_id, other)?,
    };
    Ok(task.status)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: the service agrees with the edge table on every request
    ///
    /// Authorisation is checked before the edge, so an unauthorised request
    /// on an illegal edge reports Unauthorized. A refused request never
    /// changes the stored status.
    #[test]
    fn prop_service_follows_edge_table(requests in request_sequence_strategy()) {
        let (service, cast, task_id) = setup().expect("fixture should build");
        let mut status = TaskStatus::Pending;

        for (who, action) in requests {
            let want = expected(status, who, action);
            let got = request(&service, cast.get(who), &task_id, action);

            match (&want, &got) {
                (Expect::Moved(to), Ok(actual)) => {
                    prop_assert_eq!(to, actual, "{:?} {:?} from {:?}", who, action, status);
                    status = *to;
                }
                (Expect::Unauthorized, Err(PortalError::Unauthorized { .. })) => {}
                (Expect::Invalid, Err(PortalError::InvalidTransition { .. })) => {}
                _ => prop_assert!(
                    false,
                    "{:?} {:?} from {:?}: expected {:?}, got {:?}",
                    who, action, status, want, got
                ),
            }

            let stored = service.task(&cast.assigner, &task_id).expect("task should load");
            prop_assert_eq!(stored.status, status);
        }
    }

    /// Property: the assignee is paid exactly once, and only on approval
    #[test]
    fn prop_wallet_matches_ledger(requests in request_sequence_strategy()) {
        let (service, cast, task_id) = setup().expect("fixture should build");

        for (who, action) in requests {
            let _ = request(&service, cast.get(who), &task_id, action);

            let entries = service.transactions(&cast.assignee).expect("ledger should load");
            let balance = service.wallet_balance(&cast.assignee.id).expect("wallet should load");
            let sum: Decimal = entries.iter().map(|e| e.signed_amount()).sum();
            let status = service.task(&cast.assignee, &task_id).expect("task should load").status;

            prop_assert_eq!(balance.amount(), sum);
            if status == TaskStatus::Approved {
                prop_assert_eq!(entries.len(), 1);
                prop_assert_eq!(balance, Money::from_cents(8_642)); // 123.45 * 0.70 = 86.415
            } else {
                prop_assert!(entries.is_empty());
            }
        }

        let audit = service.verify_ledger(&cast.assignee.id).expect("audit should run");
        prop_assert!(audit.is_consistent());
    }
}
