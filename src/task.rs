//! Task records and the status state machine
//!
//! A task moves through a fixed set of edges:
//!
//! ```text
//! pending ──accept──▶ accepted ──submit_document──▶ processing
//!    │                   │                              │
//! decline             complete                       complete
//!    ▼                   ▼                              ▼
//! declined            completed ◀──────complete────── queried
//!                      │     │                          ▲
//!                   approve  └──────────query───────────┘
//!                      ▼
//!                   approved
//! ```
//!
//! `approved` and `declined` are terminal. Every other request is refused
//! with [`PortalError::InvalidTransition`] and leaves the task untouched.
use std::collections::BTreeMap;
use std::fmt;

use chrono::Duration;

use super::error::PortalError;
use super::types::{TimeSpan, TimeStamp};
use super::user::Actor;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    Processing,
    #[n(3)]
    Completed,
    #[n(4)]
    Approved,
    #[n(5)]
    Queried,
    #[n(6)]
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Accept,
    Decline,
    SubmitDocument,
    Complete,
    Approve,
    Query,
    View,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Pending,
        TaskStatus::Accepted,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Approved,
        TaskStatus::Queried,
        TaskStatus::Declined,
    ];

    /// The status reached by applying `action`, or `None` if that edge does
    /// not exist. Document submission by the assignee is the only action
    /// with self-loops (processing and queried keep their status).
    pub fn next(self, action: Action) -> Option<TaskStatus> {
        use TaskStatus::*;

        match (self, action) {
            (Pending, Action::Accept) => Some(Accepted),
            (Pending, Action::Decline) => Some(Declined),
            (Accepted | Processing, Action::SubmitDocument) => Some(Processing),
            (Queried, Action::SubmitDocument) => Some(Queried),
            (Accepted | Processing | Queried, Action::Complete) => Some(Completed),
            (Completed, Action::Approve) => Some(Approved),
            (Completed, Action::Query) => Some(Queried),
            _ => None,
        }
    }
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Approved | TaskStatus::Declined)
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Accepted => "accepted",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Approved => "approved",
            TaskStatus::Queried => "queried",
            TaskStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub const TRANSITIONS: [Action; 6] = [
        Action::Accept,
        Action::Decline,
        Action::SubmitDocument,
        Action::Complete,
        Action::Approve,
        Action::Query,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::Decline => "decline",
            Action::SubmitDocument => "submit a document for",
            Action::Complete => "complete",
            Action::Approve => "approve",
            Action::Query => "query",
            Action::View => "view",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a stored file (path, blob key, URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef(String);

impl DocumentRef {
    pub fn new(reference: &str) -> Result<Self, PortalError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(PortalError::Validation("document reference is empty".into()));
        }
        Ok(Self(reference.to_string()))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<C> minicbor::Encode<C> for DocumentRef {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for DocumentRef {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(DocumentRef(d.str()?.to_string()))
    }
}

/// The customer a task is filed for. Owned by exactly one task.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Applicant {
    #[n(0)]
    pub full_name: String,
    #[n(1)]
    pub email: Option<String>,
    #[n(2)]
    pub phone: String,
    #[n(3)]
    pub address: String,
    #[n(4)]
    pub additional_info: BTreeMap<String, String>,
}

impl Applicant {
    pub fn new(full_name: &str, phone: &str, address: &str) -> Self {
        Self {
            full_name: full_name.trim().to_string(),
            phone: phone.trim().to_string(),
            address: address.trim().to_string(),
            ..Self::default()
        }
    }
    pub fn set_email(mut self, email: &str) -> Self {
        self.email = Some(email.trim().to_string());
        self
    }
    pub fn set_info(mut self, key: &str, value: &str) -> Self {
        self.additional_info.insert(key.to_string(), value.to_string());
        self
    }
    pub fn validate(&self) -> Result<(), PortalError> {
        if self.full_name.is_empty() {
            return Err(PortalError::Validation("applicant name is empty".into()));
        }
        if self.phone.is_empty() || self.phone.len() > 15 {
            return Err(PortalError::Validation(format!(
                "applicant phone {:?} must be 1-15 characters",
                self.phone
            )));
        }
        if self.address.is_empty() {
            return Err(PortalError::Validation("applicant address is empty".into()));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(PortalError::Validation(format!("applicant email {email:?} is malformed")));
            }
        }
        Ok(())
    }
}

/// Everything an admin supplies when filing a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub service_id: String,
    pub assigned_to: String,
    pub time_allocated: TimeSpan,
    pub applicant: Applicant,
    pub application_form: Option<DocumentRef>,
    pub supporting_docs: Option<DocumentRef>,
}

impl NewTask {
    pub fn new(title: &str, service_id: &str, assigned_to: &str, time_allocated: TimeSpan) -> Self {
        Self {
            title: title.trim().to_string(),
            description: String::new(),
            service_id: service_id.to_string(),
            assigned_to: assigned_to.to_string(),
            time_allocated,
            applicant: Applicant::default(),
            application_form: None,
            supporting_docs: None,
        }
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
    pub fn set_applicant(mut self, applicant: Applicant) -> Self {
        self.applicant = applicant;
        self
    }
    pub fn set_application_form(mut self, form: DocumentRef) -> Self {
        self.application_form = Some(form);
        self
    }
    pub fn set_supporting_docs(mut self, docs: DocumentRef) -> Self {
        self.supporting_docs = Some(docs);
        self
    }
    /// Checks the caller-supplied fields and produces a pending task.
    pub(crate) fn finalise(self, id: String, assigned_by: String, now: TimeStamp) -> Result<Task, PortalError> {
        if self.title.is_empty() || self.title.len() > 200 {
            return Err(PortalError::Validation(
                "task title must be 1-200 characters".into(),
            ));
        }
        if !self.time_allocated.is_positive() {
            return Err(PortalError::Validation(
                "allocated time must be positive".into(),
            ));
        }
        let Some(application_form) = self.application_form else {
            return Err(PortalError::Validation(
                "an application form is required".into(),
            ));
        };
        self.applicant.validate()?;

        Ok(Task {
            id,
            title: self.title,
            description: self.description,
            service_id: self.service_id,
            assigned_by,
            assigned_to: self.assigned_to,
            status: TaskStatus::Pending,
            time_allocated: self.time_allocated,
            time_accepted: None,
            time_completed: None,
            time_approved: None,
            created_at: now,
            updated_at: now,
            application_form,
            supporting_docs: self.supporting_docs,
            processed_document: None,
            query_reason: String::new(),
            query_resolved: false,
            applicant: self.applicant,
        })
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Task {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub service_id: String,
    #[n(4)]
    pub assigned_by: String,
    #[n(5)]
    pub assigned_to: String,
    #[n(6)]
    pub status: TaskStatus,
    #[n(7)]
    pub time_allocated: TimeSpan,
    #[n(8)]
    pub time_accepted: Option<TimeStamp>,
    #[n(9)]
    pub time_completed: Option<TimeStamp>,
    #[n(10)]
    pub time_approved: Option<TimeStamp>,
    #[n(11)]
    pub created_at: TimeStamp,
    #[n(12)]
    pub updated_at: TimeStamp,
    #[n(13)]
    pub application_form: DocumentRef,
    #[n(14)]
    pub supporting_docs: Option<DocumentRef>,
    #[n(15)]
    pub processed_document: Option<DocumentRef>,
    #[n(16)]
    pub query_reason: String,
    #[n(17)]
    pub query_resolved: bool,
    #[n(18)]
    pub applicant: Applicant,
}

impl Task {
    /// Moves the task along the edge for `action`, stamping the timestamp
    /// that belongs to the edge the first time it fires.
    pub fn advance(&mut self, action: Action, now: TimeStamp) -> Result<TaskStatus, PortalError> {
        let from = self.status;
        let Some(to) = from.next(action) else {
            return Err(PortalError::InvalidTransition {
                task_id: self.id.clone(),
                status: from,
                action,
            });
        };

        match action {
            Action::Accept => {
                self.time_accepted.get_or_insert(now);
            }
            Action::Complete => {
                self.time_completed.get_or_insert(now);
                if from == TaskStatus::Queried {
                    self.query_resolved = true;
                }
            }
            Action::Approve => {
                self.time_approved.get_or_insert(now);
            }
            _ => {}
        }
        self.status = to;
        self.updated_at = now;

        Ok(from)
    }

    /// Sends a completed task back to the assignee with a reason.
    pub fn raise_query(&mut self, reason: &str, now: TimeStamp) -> Result<TaskStatus, PortalError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PortalError::Validation("query reason is empty".into()));
        }
        let from = self.advance(Action::Query, now)?;
        self.query_reason = reason.to_string();
        self.query_resolved = false;

        Ok(from)
    }

    /// Stores the processed output. Only the assignee's upload moves status.
    pub fn attach_processed(
        &mut self,
        actor: &Actor,
        document: DocumentRef,
        now: TimeStamp,
    ) -> Result<(), PortalError> {
        if actor.id == self.assigned_to {
            self.advance(Action::SubmitDocument, now)?;
        }
        self.processed_document = Some(document);
        self.updated_at = now;

        Ok(())
    }

    /// Allocated time left since acceptance, negative once overdue. Only
    /// meaningful while work is underway.
    pub fn time_remaining(&self, now: &TimeStamp) -> Option<Duration> {
        match (self.status, &self.time_accepted) {
            (TaskStatus::Accepted | TaskStatus::Processing, Some(accepted)) => {
                Some(self.time_allocated.duration() - now.since(accepted))
            }
            _ => None,
        }
    }
}
