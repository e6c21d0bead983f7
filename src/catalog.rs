//! Service offerings a task can be filed against
use super::error::PortalError;
use super::types::Money;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Service {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub fee: Money, // flat fee charged to the applicant
    #[n(4)]
    pub is_active: bool,
}

impl Service {
    pub(crate) fn new(id: String, name: &str, description: &str, fee: Money) -> Result<Self, PortalError> {
        let service = Self {
            id,
            name: name.trim().to_string(),
            description: description.to_string(),
            fee,
            is_active: true,
        };
        service.validate()?;
        Ok(service)
    }
    pub fn validate(&self) -> Result<(), PortalError> {
        if self.name.is_empty() {
            return Err(PortalError::Validation("service name is empty".into()));
        }
        if self.fee.is_negative() {
            return Err(PortalError::Validation(format!(
                "service fee {} is negative",
                self.fee
            )));
        }
        Ok(())
    }
}

/// Partial edit of a service; unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct ServiceUpdate {
    name: Option<String>,
    description: Option<String>,
    fee: Option<Money>,
    is_active: Option<bool>,
}

impl ServiceUpdate {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.name = Some(name.trim().to_string());
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
    pub fn set_fee(mut self, fee: Money) -> Self {
        self.fee = Some(fee);
        self
    }
    pub fn set_active(mut self, active: bool) -> Self {
        self.is_active = Some(active);
        self
    }
    pub(crate) fn apply_to(&self, service: &mut Service) -> Result<(), PortalError> {
        if let Some(name) = &self.name {
            service.name = name.clone();
        }
        if let Some(description) = &self.description {
            service.description = description.clone();
        }
        if let Some(fee) = self.fee {
            service.fee = fee;
        }
        if let Some(active) = self.is_active {
            service.is_active = active;
        }
        service.validate()
    }
}
