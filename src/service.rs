//! Service layer API for task workflow operations
//!
//! Every write goes through one sled transaction spanning all trees it
//! touches. Policy and edge checks run inside that transaction against the
//! freshly read task, so concurrent callers are serialised by sled's conflict
//! detection and a rejected call leaves nothing behind.
use std::sync::Arc;

use sled::Transactional;
use sled::transaction::{ConflictableTransactionResult, TransactionalTree, abort};
use tracing::{debug, info, warn};

use super::catalog::{Service, ServiceUpdate};
use super::config::PortalConfig;
use super::error::{OrAbort, PortalError};
use super::ledger::{Ledger, LedgerAudit, LedgerEntry, Posting, post_tx};
use super::notification::{Notification, Notifier, TaskEvent, TracingNotifier};
use super::policy::{self, Capability};
use super::store::{Store, decode, load_tx, save_tx};
use super::task::{Action, DocumentRef, NewTask, Task, TaskStatus};
use super::types::{Money, TimeStamp};
use super::user::{Actor, NewUser, Role, User};
use super::utils::{self, SERVICE_HRP, TASK_HRP, USER_HRP, owner_prefix, seq_key};

/// Trees a transition step may read or write besides the task itself.
pub(crate) struct TxTrees<'a> {
    users: &'a TransactionalTree,
    services: &'a TransactionalTree,
    ledger: &'a TransactionalTree,
}

/// Counts and most recent tasks for the actor's landing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub pending: usize,
    pub processing: usize,
    pub recent: Vec<Task>,
}

pub struct PortalService {
    store: Store,
    config: PortalConfig,
    notifier: Arc<dyn Notifier>,
}

fn unregistered(actor: &Actor) -> PortalError {
    PortalError::Unauthorized {
        actor: actor.to_string(),
        operation: "act without a registered user".into(),
    }
}

fn stale_role(actor: &Actor, stored: Role) -> PortalError {
    PortalError::Unauthorized {
        actor: actor.to_string(),
        operation: format!("act with role {} (stored role is {stored})", actor.role),
    }
}

// Loads the caller's record, refusing unknown callers and sessions whose
// role has gone stale.
fn caller_tx(users: &TransactionalTree, actor: &Actor) -> ConflictableTransactionResult<User, PortalError> {
    let Some(bytes) = users.get(actor.id.as_bytes())? else {
        return abort(unregistered(actor));
    };
    let caller: User = decode(&bytes).or_abort()?;
    if caller.role != actor.role {
        return abort(stale_role(actor, caller.role));
    }
    Ok(caller)
}

impl PortalService {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, PortalError> {
        Self::with_config(instance, PortalConfig::default())
    }

    pub fn with_config(instance: Arc<sled::Db>, config: PortalConfig) -> Result<Self, PortalError> {
        config.validate()?;
        Ok(Self {
            store: Store::open(instance)?,
            config,
            notifier: Arc::new(TracingNotifier),
        })
    }

    pub fn set_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn ledger(&self) -> Ledger<'_> {
        Ledger::new(&self.store)
    }

    pub fn flush(&self) -> Result<(), PortalError> {
        self.store.flush()
    }

    // Read-side counterpart of `caller_tx`.
    fn verify_caller(&self, actor: &Actor) -> Result<User, PortalError> {
        let caller: User = match self.store.users.get(actor.id.as_bytes())? {
            Some(bytes) => decode(&bytes)?,
            None => return Err(unregistered(actor)),
        };
        if caller.role != actor.role {
            return Err(stale_role(actor, caller.role));
        }
        Ok(caller)
    }

    fn refuse(&self, actor: &Actor, operation: String) -> PortalError {
        warn!(actor = %actor, operation = %operation, "operation refused");
        PortalError::Unauthorized {
            actor: actor.to_string(),
            operation,
        }
    }

    /// Provision a user record. Credentials live with the auth layer.
    pub fn register_user(&self, new_user: NewUser) -> Result<User, PortalError> {
        let user = new_user.finalise(utils::new_uuid_to_bech32(USER_HRP)?)?;
        self.store.put(&self.store.users, &user.id, &user)?;

        info!(user = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    pub fn user(&self, user_id: &str) -> Result<User, PortalError> {
        self.store.get(&self.store.users, user_id, "user")
    }

    pub fn create_service(
        &self,
        actor: &Actor,
        name: &str,
        description: &str,
        fee: Money,
    ) -> Result<Service, PortalError> {
        if !actor.can(Capability::ManageServices) {
            return Err(self.refuse(actor, "manage services".into()));
        }
        let service = Service::new(utils::new_uuid_to_bech32(SERVICE_HRP)?, name, description, fee)?;
        (&self.store.users, &self.store.services)
            .transaction(|(users, services)| {
                caller_tx(users, actor)?;
                save_tx(services, &service.id, &service)
            })
            .map_err(PortalError::from)
            .inspect_err(|err| warn!(actor = %actor, error = %err, "service creation rejected"))?;

        info!(service = %service.id, fee = %service.fee, "service created");
        Ok(service)
    }

    pub fn update_service(
        &self,
        actor: &Actor,
        service_id: &str,
        update: ServiceUpdate,
    ) -> Result<Service, PortalError> {
        if !actor.can(Capability::ManageServices) {
            return Err(self.refuse(actor, "manage services".into()));
        }
        let service = (&self.store.users, &self.store.services)
            .transaction(|(users, services)| {
                caller_tx(users, actor)?;
                let mut service: Service = load_tx(services, service_id, "service")?;
                update.apply_to(&mut service).or_abort()?;
                save_tx(services, service_id, &service)?;
                Ok(service)
            })
            .map_err(PortalError::from)
            .inspect_err(|err| warn!(actor = %actor, error = %err, "service update rejected"))?;

        info!(service = %service.id, fee = %service.fee, active = service.is_active, "service updated");
        Ok(service)
    }

    pub fn service(&self, service_id: &str) -> Result<Service, PortalError> {
        self.store.get(&self.store.services, service_id, "service")
    }

    pub fn services(&self) -> Result<Vec<Service>, PortalError> {
        self.store.scan(&self.store.services, "")
    }

    /// File a new task. The task and the assignee's notification commit together.
    pub fn create_task(&self, actor: &Actor, new_task: NewTask) -> Result<Task, PortalError> {
        if !policy::authorize_create(actor) {
            return Err(self.refuse(actor, "create tasks".into()));
        }
        let now = TimeStamp::now();
        let task = new_task.finalise(utils::new_uuid_to_bech32(TASK_HRP)?, actor.id.clone(), now)?;
        let store = &self.store;

        let notification = (&store.tasks, &store.users, &store.services, &store.notifications)
            .transaction(|(tasks, users, services, notifications)| {
                let creator = caller_tx(users, actor)?;
                let assignee: User = load_tx(users, &task.assigned_to, "user")?;
                if assignee.role != Role::Staff {
                    return abort(PortalError::Validation(format!(
                        "tasks are assigned to staff, {} is {}",
                        assignee.id, assignee.role
                    )));
                }
                let service: Service = load_tx(services, &task.service_id, "service")?;
                if !service.is_active {
                    return abort(PortalError::Validation(format!(
                        "service {} is not active",
                        service.name
                    )));
                }

                save_tx(tasks, &task.id, &task)?;
                TaskEvent::Assigned.record_tx(users, notifications, &task, creator.display_name(), now)
            })
            .map_err(PortalError::from)
            .inspect_err(|err| warn!(actor = %actor, error = %err, "task creation rejected"))?;

        info!(actor = %actor, task = %task.id, assigned_to = %task.assigned_to, "task created");
        self.notifier.deliver(&notification);
        Ok(task)
    }

    /// Runs one transition: load, authorise, apply `step`, persist the task
    /// and the resulting notification. All-or-nothing.
    fn commit<F>(&self, actor: &Actor, task_id: &str, action: Action, step: F) -> Result<Task, PortalError>
    where
        F: Fn(&mut Task, &TxTrees<'_>, TimeStamp) -> ConflictableTransactionResult<Option<TaskEvent>, PortalError>,
    {
        let now = TimeStamp::now();
        let store = &self.store;

        let (task, notification) = (
            &store.tasks,
            &store.users,
            &store.services,
            &store.ledger,
            &store.notifications,
        )
            .transaction(|(tasks, users, services, ledger, notifications)| {
                let mut task: Task = load_tx(tasks, task_id, "task")?;
                let caller = caller_tx(users, actor)?;
                if !policy::authorize(actor, action, &task) {
                    return abort(PortalError::Unauthorized {
                        actor: actor.to_string(),
                        operation: format!("{action} task {task_id}"),
                    });
                }

                let trees = TxTrees {
                    users,
                    services,
                    ledger,
                };
                let event = step(&mut task, &trees, now)?;
                save_tx(tasks, &task.id, &task)?;

                let notification = match event {
                    Some(event) => {
                        Some(event.record_tx(users, notifications, &task, caller.display_name(), now)?)
                    }
                    None => None,
                };
                Ok((task, notification))
            })
            .map_err(PortalError::from)
            .inspect_err(|err| {
                warn!(actor = %actor, task = task_id, %action, error = %err, "transition rejected")
            })?;

        info!(actor = %actor, task = %task.id, %action, status = %task.status, "transition committed");
        if let Some(notification) = &notification {
            self.notifier.deliver(notification);
        }
        Ok(task)
    }

    /// Staff-side transitions: accept, decline or complete.
    pub fn transition(&self, actor: &Actor, task_id: &str, action: Action) -> Result<Task, PortalError> {
        let event = match action {
            Action::Accept => TaskEvent::Accepted,
            Action::Decline => TaskEvent::Declined,
            Action::Complete => TaskEvent::Completed,
            other => {
                return Err(PortalError::Validation(format!(
                    "{other} is not a staff transition"
                )));
            }
        };

        self.commit(actor, task_id, action, |task, _, now| {
            task.advance(action, now).or_abort()?;
            Ok(Some(event.clone()))
        })
    }

    pub fn accept(&self, actor: &Actor, task_id: &str) -> Result<Task, PortalError> {
        self.transition(actor, task_id, Action::Accept)
    }

    pub fn decline(&self, actor: &Actor, task_id: &str) -> Result<Task, PortalError> {
        self.transition(actor, task_id, Action::Decline)
    }

    pub fn complete(&self, actor: &Actor, task_id: &str) -> Result<Task, PortalError> {
        self.transition(actor, task_id, Action::Complete)
    }

    /// Approve completed work and pay the assignee their share of the fee.
    pub fn approve(&self, actor: &Actor, task_id: &str) -> Result<Task, PortalError> {
        let rate = self.config.payout_rate();

        self.commit(actor, task_id, Action::Approve, |task, trees, now| {
            task.advance(Action::Approve, now).or_abort()?;

            let service: Service = load_tx(trees.services, &task.service_id, "service")?;
            let credited = service.fee.share(rate).or_abort()?;
            let posting = Posting::credit(
                &task.assigned_to,
                credited,
                &format!("Payment for completing task: {}", task.title),
            )
            .for_task(&task.id);
            post_tx(trees.users, trees.ledger, &posting, now)?;

            Ok(Some(TaskEvent::Approved { credited }))
        })
    }

    /// Send completed work back to the assignee.
    pub fn query(&self, actor: &Actor, task_id: &str, reason: &str) -> Result<Task, PortalError> {
        self.commit(actor, task_id, Action::Query, |task, _, now| {
            task.raise_query(reason, now).or_abort()?;
            Ok(Some(TaskEvent::Queried {
                reason: task.query_reason.clone(),
            }))
        })
    }

    /// Attach the processed output document.
    pub fn update_document(
        &self,
        actor: &Actor,
        task_id: &str,
        document: DocumentRef,
    ) -> Result<Task, PortalError> {
        self.commit(actor, task_id, Action::SubmitDocument, |task, _, now| {
            task.attach_processed(actor, document.clone(), now).or_abort()?;
            Ok(None)
        })
    }

    pub fn task(&self, actor: &Actor, task_id: &str) -> Result<Task, PortalError> {
        self.verify_caller(actor)?;
        let task: Task = self.store.get(&self.store.tasks, task_id, "task")?;
        if !policy::authorize(actor, Action::View, &task) {
            return Err(self.refuse(actor, format!("view task {task_id}")));
        }
        Ok(task)
    }

    /// Tasks the actor is a party to, newest first. Staff see what was
    /// assigned to them; everyone else sees what they assigned.
    pub fn list_tasks(&self, actor: &Actor) -> Result<Vec<Task>, PortalError> {
        self.verify_caller(actor)?;
        let works = actor.can(Capability::WorkTask);
        let mut tasks: Vec<Task> = self
            .store
            .scan::<Task>(&self.store.tasks, "")?
            .into_iter()
            .filter(|task| {
                if works {
                    task.assigned_to == actor.id
                } else {
                    task.assigned_by == actor.id
                }
            })
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        debug!(actor = %actor, count = tasks.len(), "tasks listed");
        Ok(tasks)
    }

    pub fn dashboard(&self, actor: &Actor) -> Result<Dashboard, PortalError> {
        let tasks = self.list_tasks(actor)?;
        let counted = actor.can(Capability::CreateTask) || actor.can(Capability::WorkTask);
        let count = |status: TaskStatus| {
            if counted {
                tasks.iter().filter(|t| t.status == status).count()
            } else {
                0
            }
        };

        Ok(Dashboard {
            pending: count(TaskStatus::Pending),
            processing: count(TaskStatus::Processing),
            recent: tasks.iter().take(self.config.recent_limit()).cloned().collect(),
        })
    }

    /// The actor's notifications, newest first.
    pub fn notifications(&self, actor: &Actor) -> Result<Vec<Notification>, PortalError> {
        self.verify_caller(actor)?;
        let mut notes: Vec<Notification> =
            self.store.scan(&self.store.notifications, &owner_prefix(&actor.id))?;
        notes.reverse();
        Ok(notes)
    }

    pub fn unread_count(&self, actor: &Actor) -> Result<usize, PortalError> {
        Ok(self
            .notifications(actor)?
            .iter()
            .filter(|note| !note.is_read)
            .count())
    }

    /// Mark one of the actor's own notifications as read.
    pub fn mark_read(&self, actor: &Actor, notification_id: u64) -> Result<Notification, PortalError> {
        self.verify_caller(actor)?;
        let key = seq_key(&actor.id, notification_id);
        let note = self.store.notifications.transaction(|notifications| {
            let mut note: Notification = load_tx(notifications, &key, "notification")?;
            note.is_read = true;
            save_tx(notifications, &key, &note)?;
            Ok(note)
        })?;

        debug!(actor = %actor, notification = notification_id, "notification read");
        Ok(note)
    }

    pub fn wallet_balance(&self, user_id: &str) -> Result<Money, PortalError> {
        self.ledger().balance(user_id)
    }

    /// The actor's own ledger entries, oldest first.
    pub fn transactions(&self, actor: &Actor) -> Result<Vec<LedgerEntry>, PortalError> {
        self.verify_caller(actor)?;
        self.ledger().entries(&actor.id)
    }

    pub fn verify_ledger(&self, user_id: &str) -> Result<LedgerAudit, PortalError> {
        self.ledger().audit(user_id)
    }
}
