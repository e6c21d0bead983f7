//! Portal users and the actor identity threaded through every core call
use std::fmt;
use std::str::FromStr;

use super::error::PortalError;
use super::types::Money;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    #[n(0)]
    SuperAdmin,
    #[n(1)]
    Admin,
    #[n(2)]
    Staff,
    #[n(3)]
    Partner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Partner => "partner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "partner" => Ok(Role::Partner),
            other => Err(PortalError::Validation(format!("unknown role {other:?}"))),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    pub username: String,
    #[n(2)]
    pub full_name: String,
    #[n(3)]
    pub role: Role,
    #[n(4)]
    pub phone: Option<String>,
    #[n(5)]
    pub wallet_balance: Money, // only ever moved by ledger postings
    #[n(6)]
    pub is_verified: bool,
    #[n(7)]
    pub ledger_head: Option<String>, // digest of the newest ledger entry
    #[n(8)]
    pub ledger_len: u64, // next ledger entry number
    #[n(9)]
    pub notification_seq: u64, // next notification number
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            role: self.role,
        }
    }
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

/// Profile data for provisioning a user record.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub is_verified: bool,
}

impl NewUser {
    pub fn new(username: &str, role: Role) -> Self {
        Self {
            username: username.to_string(),
            full_name: String::new(),
            role,
            phone: None,
            is_verified: false,
        }
    }
    pub fn set_full_name(mut self, full_name: &str) -> Self {
        self.full_name = full_name.to_string();
        self
    }
    pub fn set_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }
    pub fn set_verified(mut self, verified: bool) -> Self {
        self.is_verified = verified;
        self
    }
    pub(crate) fn finalise(self, id: String) -> Result<User, PortalError> {
        if self.username.trim().is_empty() {
            return Err(PortalError::Validation("username is empty".into()));
        }
        Ok(User {
            id,
            username: self.username,
            full_name: self.full_name,
            role: self.role,
            phone: self.phone,
            wallet_balance: Money::ZERO,
            is_verified: self.is_verified,
            ledger_head: None,
            ledger_len: 0,
            notification_seq: 0,
        })
    }
}

/// The authenticated caller of a core operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.role, self.id)
    }
}
