//! Notification events emitted by task transitions
use sled::transaction::{ConflictableTransactionResult, TransactionalTree};
use tracing::info;

use super::error::PortalError;
use super::store::{load_tx, save_tx};
use super::task::Task;
use super::types::{Money, TimeStamp};
use super::user::User;
use super::utils::seq_key;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub recipient: String,
    #[n(2)]
    pub message: String,
    #[n(3)]
    pub is_read: bool,
    #[n(4)]
    pub related_task: Option<String>,
    #[n(5)]
    pub created_at: TimeStamp,
}

/// What happened to a task, from the point of view of whoever gets told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Assigned,
    Accepted,
    Declined,
    Completed,
    Approved { credited: Money },
    Queried { reason: String },
}

impl TaskEvent {
    pub fn recipient<'t>(&self, task: &'t Task) -> &'t str {
        match self {
            TaskEvent::Assigned | TaskEvent::Approved { .. } | TaskEvent::Queried { .. } => {
                &task.assigned_to
            }
            TaskEvent::Accepted | TaskEvent::Declined | TaskEvent::Completed => &task.assigned_by,
        }
    }

    /// Message text; `actor_name` is whoever triggered the event.
    pub fn message(&self, task: &Task, actor_name: &str) -> String {
        let title = &task.title;
        match self {
            TaskEvent::Assigned => format!(
                "You have a new task \"{title}\" from {actor_name}. Please accept or decline."
            ),
            TaskEvent::Accepted => format!("{actor_name} has accepted the task \"{title}\"."),
            TaskEvent::Declined => format!("{actor_name} has declined the task \"{title}\"."),
            TaskEvent::Completed => {
                format!("{actor_name} has completed the task \"{title}\". Please review.")
            }
            TaskEvent::Approved { credited } => format!(
                "Your task \"{title}\" has been approved. Your wallet has been credited with ${credited}."
            ),
            TaskEvent::Queried { reason } => {
                format!("Your task \"{title}\" has been queried. Reason: {reason}")
            }
        }
    }

    pub(crate) fn into_notification(
        self,
        id: u64,
        task: &Task,
        actor_name: &str,
        now: TimeStamp,
    ) -> Notification {
        Notification {
            id,
            recipient: self.recipient(task).to_string(),
            message: self.message(task, actor_name),
            is_read: false,
            related_task: Some(task.id.clone()),
            created_at: now,
        }
    }

    /// Stores the notification under the recipient's next sequence number.
    pub(crate) fn record_tx(
        self,
        users: &TransactionalTree,
        notifications: &TransactionalTree,
        task: &Task,
        actor_name: &str,
        now: TimeStamp,
    ) -> ConflictableTransactionResult<Notification, PortalError> {
        let mut recipient: User = load_tx(users, self.recipient(task), "user")?;
        let note = self.into_notification(recipient.notification_seq, task, actor_name, now);
        recipient.notification_seq += 1;

        save_tx(users, &recipient.id, &recipient)?;
        save_tx(notifications, &seq_key(&note.recipient, note.id), &note)?;
        Ok(note)
    }
}

/// Delivery channel for committed notifications (email, SMS, push).
///
/// Called after the owning transaction commits; failures are the
/// implementation's concern and never roll back the transition.
pub trait Notifier: Send + Sync {
    fn deliver(&self, notification: &Notification);
}

/// Logs each delivery. Used when no other channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn deliver(&self, notification: &Notification) {
        info!(
            recipient = %notification.recipient,
            task = notification.related_task.as_deref().unwrap_or("-"),
            "{}",
            notification.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Applicant, DocumentRef, NewTask};
    use crate::types::TimeSpan;

    fn task() -> Task {
        NewTask::new("Visa", "svc_1", "user_staff", TimeSpan::hours(4))
            .set_applicant(Applicant::new("Ada", "0803", "Lagos"))
            .set_application_form(DocumentRef::new("form.pdf").unwrap())
            .finalise("task_1".into(), "user_admin".into(), TimeStamp::now())
            .unwrap()
    }

    #[test]
    fn events_route_to_the_other_party() {
        let task = task();
        assert_eq!(TaskEvent::Assigned.recipient(&task), "user_staff");
        assert_eq!(TaskEvent::Accepted.recipient(&task), "user_admin");
        assert_eq!(TaskEvent::Completed.recipient(&task), "user_admin");
        let queried = TaskEvent::Queried { reason: "x".into() };
        assert_eq!(queried.recipient(&task), "user_staff");
    }

    #[test]
    fn approval_message_carries_amount() {
        let task = task();
        let event = TaskEvent::Approved { credited: Money::from_cents(7_000) };
        assert_eq!(
            event.message(&task, "Admin"),
            "Your task \"Visa\" has been approved. Your wallet has been credited with $70.00."
        );
    }

    #[test]
    fn query_message_carries_reason() {
        let task = task();
        let event = TaskEvent::Queried { reason: "missing signature".into() };
        let note = event.into_notification(7, &task, "Admin", TimeStamp::now());

        assert_eq!(note.recipient, "user_staff");
        assert!(note.message.ends_with("Reason: missing signature"));
        assert_eq!(note.related_task.as_deref(), Some("task_1"));
        assert!(!note.is_read);
    }
}
