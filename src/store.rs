//! sled trees holding every portal record, CBOR encoded
use std::sync::Arc;

use sled::transaction::{ConflictableTransactionResult, TransactionalTree, abort};
use sled::{Db, Tree};

use super::error::{OrAbort, PortalError};

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, PortalError> {
    Ok(minicbor::to_vec(value)?)
}

pub(crate) fn decode<T>(bytes: &[u8]) -> Result<T, PortalError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

/// Reads and decodes `key` inside a transaction, aborting with `NotFound`.
pub(crate) fn load_tx<T>(
    tree: &TransactionalTree,
    key: &str,
    kind: &'static str,
) -> ConflictableTransactionResult<T, PortalError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match tree.get(key.as_bytes())? {
        Some(bytes) => decode(&bytes).or_abort(),
        None => abort(PortalError::not_found(kind, key)),
    }
}

pub(crate) fn save_tx<T: minicbor::Encode<()>>(
    tree: &TransactionalTree,
    key: &str,
    value: &T,
) -> ConflictableTransactionResult<(), PortalError> {
    tree.insert(key.as_bytes(), encode(value).or_abort()?)?;
    Ok(())
}

#[derive(Clone)]
pub struct Store {
    instance: Arc<Db>,
    pub(crate) users: Tree,
    pub(crate) services: Tree,
    pub(crate) tasks: Tree,
    pub(crate) ledger: Tree,
    pub(crate) notifications: Tree,
}

impl Store {
    pub fn open(instance: Arc<Db>) -> Result<Self, PortalError> {
        Ok(Self {
            users: instance.open_tree("users")?,
            services: instance.open_tree("services")?,
            tasks: instance.open_tree("tasks")?,
            ledger: instance.open_tree("ledger")?,
            notifications: instance.open_tree("notifications")?,
            instance,
        })
    }

    pub(crate) fn get<T>(&self, tree: &Tree, key: &str, kind: &'static str) -> Result<T, PortalError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match tree.get(key.as_bytes())? {
            Some(bytes) => decode(&bytes),
            None => Err(PortalError::not_found(kind, key)),
        }
    }

    pub(crate) fn put<T: minicbor::Encode<()>>(&self, tree: &Tree, key: &str, value: &T) -> Result<(), PortalError> {
        tree.insert(key.as_bytes(), encode(value)?)?;
        Ok(())
    }

    /// Decodes every record under `prefix`, in key order.
    pub(crate) fn scan<T>(&self, tree: &Tree, prefix: &str) -> Result<Vec<T>, PortalError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        tree.scan_prefix(prefix.as_bytes())
            .map(|res| {
                let (_, bytes) = res?;
                decode(&bytes)
            })
            .collect()
    }

    pub fn flush(&self) -> Result<(), PortalError> {
        self.instance.flush()?;
        Ok(())
    }
}
