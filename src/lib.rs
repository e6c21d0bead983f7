//! Task assignment workflow with a staff wallet ledger.
//!
//! Admins file tasks against a service on behalf of an applicant and assign
//! them to staff. Staff accept, work and complete them; the assigning admin
//! approves (crediting the staff wallet) or queries the work back.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod notification;
pub mod policy;
pub mod service;
pub mod store;
pub mod task;
pub mod types;
pub mod user;
pub mod utils;

pub use error::PortalError;
pub use service::PortalService;
