//! # The Account Directory Capability
//!
//! The directory answers three questions the agreement protocol cannot
//! answer for itself:
//!
//! 1. Which host owns the account named "alice"? ([`resolve`])
//! 2. Give me a fresh one-time key for that account. ([`new_key`])
//! 3. Make this account visible to those hosts. ([`share_visibility`])
//!
//! The core depends only on the [`AccountDirectory`] trait, injected at
//! construction. [`InMemoryDirectory`] is the in-process implementation
//! used by the devnet node and the test suite; a production deployment
//! would back the same trait with a real directory service.
//!
//! [`resolve`]: AccountDirectory::resolve
//! [`new_key`]: AccountDirectory::new_key
//! [`share_visibility`]: AccountDirectory::share_visibility

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::keys::PactPublicKey;
use crate::identity::account::{AccountInfo, KeyRing};
use crate::identity::host::HostId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No account with the given name is known.
    #[error("account not found: {0:?}")]
    UnknownAccount(String),

    /// No account with the given identifier is known.
    #[error("account id not found: {0}")]
    UnknownAccountId(Uuid),

    /// The host named in a request is not registered with the directory.
    #[error("unknown host: {0}")]
    UnknownHost(HostId),

    /// An account with this name already exists.
    #[error("account name already taken: {0:?}")]
    NameTaken(String),

    /// The named host does not own the account in question.
    #[error("host {host} does not own account {account_id}")]
    NotOwner { host: HostId, account_id: Uuid },
}

// ---------------------------------------------------------------------------
// AccountDirectory
// ---------------------------------------------------------------------------

/// The directory capability the agreement protocol depends on.
///
/// All operations are async: a real directory is a network service, and the
/// in-process implementation simply resolves immediately.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Resolve an account name to its directory entry.
    async fn resolve(&self, name: &str) -> Result<AccountInfo, DirectoryError>;

    /// Resolve an account id to its directory entry.
    async fn resolve_id(&self, account_id: Uuid) -> Result<AccountInfo, DirectoryError>;

    /// Request a fresh one-time public key for an account from its host.
    ///
    /// The secret half stays in the owning host's key ring; the returned
    /// public key names the account in exactly one record.
    async fn new_key(
        &self,
        host: &HostId,
        account_id: Uuid,
    ) -> Result<PactPublicKey, DirectoryError>;

    /// Make an account visible to the given hosts.
    async fn share_visibility(
        &self,
        account_id: Uuid,
        hosts: &[HostId],
    ) -> Result<(), DirectoryError>;
}

// ---------------------------------------------------------------------------
// InMemoryDirectory
// ---------------------------------------------------------------------------

/// In-process directory for the devnet node and tests.
///
/// Holds the name → account mapping, per-account visibility sets, and a
/// handle to each registered host's [`KeyRing`] so `new_key` can mint keys
/// on the correct host.
#[derive(Default)]
pub struct InMemoryDirectory {
    by_name: DashMap<String, AccountInfo>,
    by_id: DashMap<Uuid, AccountInfo>,
    visibility: DashMap<Uuid, HashSet<HostId>>,
    keyrings: DashMap<HostId, Arc<KeyRing>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host and the key ring it mints account keys from.
    pub fn register_host(&self, host: HostId, keyring: Arc<KeyRing>) {
        self.keyrings.insert(host, keyring);
    }

    /// Create a new account owned by `host`.
    ///
    /// Names are unique directory-wide; the new account starts visible to
    /// its owning host only.
    pub fn create_account(
        &self,
        host: &HostId,
        name: &str,
    ) -> Result<AccountInfo, DirectoryError> {
        if !self.keyrings.contains_key(host) {
            return Err(DirectoryError::UnknownHost(host.clone()));
        }
        if self.by_name.contains_key(name) {
            return Err(DirectoryError::NameTaken(name.to_string()));
        }

        let info = AccountInfo {
            name: name.to_string(),
            account_id: Uuid::new_v4(),
            host: host.clone(),
        };
        self.by_name.insert(info.name.clone(), info.clone());
        self.by_id.insert(info.account_id, info.clone());
        self.visibility
            .insert(info.account_id, HashSet::from([host.clone()]));

        tracing::debug!(account = %info.name, id = %info.account_id, host = ?info.host, "account created");
        Ok(info)
    }

    /// All accounts currently visible to the given host.
    pub fn accounts_visible_to(&self, host: &HostId) -> Vec<AccountInfo> {
        self.by_id
            .iter()
            .filter(|entry| {
                self.visibility
                    .get(&entry.account_id)
                    .map(|set| set.contains(host))
                    .unwrap_or(false)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// All registered accounts.
    pub fn all_accounts(&self) -> Vec<AccountInfo> {
        self.by_id.iter().map(|e| e.value().clone()).collect()
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn resolve(&self, name: &str) -> Result<AccountInfo, DirectoryError> {
        self.by_name
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| DirectoryError::UnknownAccount(name.to_string()))
    }

    async fn resolve_id(&self, account_id: Uuid) -> Result<AccountInfo, DirectoryError> {
        self.by_id
            .get(&account_id)
            .map(|e| e.value().clone())
            .ok_or(DirectoryError::UnknownAccountId(account_id))
    }

    async fn new_key(
        &self,
        host: &HostId,
        account_id: Uuid,
    ) -> Result<PactPublicKey, DirectoryError> {
        let info = self.resolve_id(account_id).await?;
        if &info.host != host {
            return Err(DirectoryError::NotOwner {
                host: host.clone(),
                account_id,
            });
        }
        let ring = self
            .keyrings
            .get(host)
            .ok_or_else(|| DirectoryError::UnknownHost(host.clone()))?;
        Ok(ring.mint(account_id))
    }

    async fn share_visibility(
        &self,
        account_id: Uuid,
        hosts: &[HostId],
    ) -> Result<(), DirectoryError> {
        if !self.by_id.contains_key(&account_id) {
            return Err(DirectoryError::UnknownAccountId(account_id));
        }
        let mut set = self.visibility.entry(account_id).or_default();
        for host in hosts {
            set.insert(host.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PactKeypair;

    fn host() -> HostId {
        HostId::from_public_key(&PactKeypair::generate().public_key())
    }

    fn directory_with_host() -> (InMemoryDirectory, HostId, Arc<KeyRing>) {
        let dir = InMemoryDirectory::new();
        let h = host();
        let ring = Arc::new(KeyRing::new());
        dir.register_host(h.clone(), Arc::clone(&ring));
        (dir, h, ring)
    }

    #[tokio::test]
    async fn create_and_resolve_account() {
        let (dir, h, _) = directory_with_host();
        let created = dir.create_account(&h, "alice").unwrap();

        let resolved = dir.resolve("alice").await.unwrap();
        assert_eq!(resolved, created);

        let by_id = dir.resolve_id(created.account_id).await.unwrap();
        assert_eq!(by_id, created);
    }

    #[tokio::test]
    async fn resolve_unknown_name_fails() {
        let (dir, _, _) = directory_with_host();
        assert!(matches!(
            dir.resolve("nobody").await,
            Err(DirectoryError::UnknownAccount(_))
        ));
    }

    #[test]
    fn duplicate_name_rejected() {
        let (dir, h, _) = directory_with_host();
        dir.create_account(&h, "alice").unwrap();
        assert!(matches!(
            dir.create_account(&h, "alice"),
            Err(DirectoryError::NameTaken(_))
        ));
    }

    #[test]
    fn create_on_unregistered_host_fails() {
        let dir = InMemoryDirectory::new();
        assert!(matches!(
            dir.create_account(&host(), "alice"),
            Err(DirectoryError::UnknownHost(_))
        ));
    }

    #[tokio::test]
    async fn new_key_mints_into_owning_host_ring() {
        let (dir, h, ring) = directory_with_host();
        let info = dir.create_account(&h, "alice").unwrap();

        let key = dir.new_key(&h, info.account_id).await.unwrap();
        assert!(ring.holds(&key.to_hex()));
    }

    #[tokio::test]
    async fn new_key_from_non_owner_fails() {
        let (dir, h, _) = directory_with_host();
        let info = dir.create_account(&h, "alice").unwrap();

        let stranger = host();
        assert!(matches!(
            dir.new_key(&stranger, info.account_id).await,
            Err(DirectoryError::NotOwner { .. })
        ));
    }

    #[tokio::test]
    async fn visibility_starts_with_owner_and_grows() {
        let (dir, h, _) = directory_with_host();
        let info = dir.create_account(&h, "alice").unwrap();

        let other = host();
        assert!(dir.accounts_visible_to(&other).is_empty());

        dir.share_visibility(info.account_id, &[other.clone()])
            .await
            .unwrap();
        let visible = dir.accounts_visible_to(&other);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].account_id, info.account_id);

        // Owner still sees it.
        assert_eq!(dir.accounts_visible_to(&h).len(), 1);
    }
}
