//! Pre-shared key rotation state machine.
//!
//! Key states per identity: READY → PENDING → ACTIVE → INACTIVE, or INVALID
//! when a key is rejected or discarded. Every transition is a single store
//! write; the service never holds locks of its own, callers serialize per
//! device through the session gate.

use devlink_core::error::{Error, Result};
use devlink_core::psk::{PreSharedKey, PskStatus};
use devlink_core::repository::SharedPskRepository;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Length of generated key material.
pub const KEY_LENGTH: usize = 16;

/// Render the downlink token that transfers a key to the device.
///
/// `PSK:<key>:<sha256hex(secret || key)>`, suffixed with `:SET` when the
/// device should switch to the key right away.
pub fn psk_token(key: &PreSharedKey, set: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.secret.as_bytes());
    hasher.update(key.key.as_bytes());
    let hash = hex::encode(hasher.finalize());

    if set {
        format!("PSK:{}:{}:SET", key.key, hash)
    } else {
        format!("PSK:{}:{}", key.key, hash)
    }
}

fn generate_key_material() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// Key lifecycle operations on top of a key repository.
#[derive(Clone)]
pub struct PskService {
    keys: SharedPskRepository,
}

impl PskService {
    pub fn new(keys: SharedPskRepository) -> Self {
        Self { keys }
    }

    fn next_revision(&self, identity: &str) -> Result<u32> {
        Ok(self
            .keys
            .latest_revision(identity)?
            .map_or(0, |revision| revision + 1))
    }

    fn invalidate(&self, identity: &str, status: PskStatus) -> Result<()> {
        if let Some(key) = self.keys.latest_with_status(identity, status)? {
            debug!(
                category = "psk",
                device_id = %identity,
                revision = key.revision,
                previous = %status,
                "Invalidating key"
            );
            self.keys.save(&key.with_status(PskStatus::Invalid))?;
        }
        Ok(())
    }

    /// Store provisioned credentials as the ACTIVE key.
    ///
    /// Re-provisioning demotes the previous ACTIVE key and discards keys that
    /// were derived from it but never confirmed.
    pub fn set_initial_key(&self, identity: &str, key: &str, secret: &str) -> Result<PreSharedKey> {
        self.invalidate(identity, PskStatus::Ready)?;
        self.invalidate(identity, PskStatus::Pending)?;
        if let Some(active) = self.keys.latest_with_status(identity, PskStatus::Active)? {
            self.keys.save(&active.with_status(PskStatus::Inactive))?;
        }

        let initial = PreSharedKey::new(
            identity,
            self.next_revision(identity)?,
            key,
            secret,
            PskStatus::Active,
        );
        self.keys.save(&initial)?;
        info!(
            category = "psk",
            device_id = %identity,
            revision = initial.revision,
            "Initial key stored"
        );
        Ok(initial)
    }

    /// Generate a READY key sharing the ACTIVE key's secret.
    pub fn generate_ready_key(&self, identity: &str) -> Result<PreSharedKey> {
        let active = self
            .keys
            .latest_with_status(identity, PskStatus::Active)?
            .ok_or_else(|| Error::NoActiveKey {
                device_id: identity.to_string(),
            })?;

        self.invalidate(identity, PskStatus::Ready)?;

        let ready = PreSharedKey::new(
            identity,
            self.next_revision(identity)?,
            generate_key_material(),
            active.secret,
            PskStatus::Ready,
        );
        self.keys.save(&ready)?;
        info!(
            category = "psk",
            device_id = %identity,
            revision = ready.revision,
            "Generated new ready key"
        );
        Ok(ready)
    }

    pub fn has_pending_key(&self, identity: &str) -> Result<bool> {
        Ok(self
            .keys
            .latest_with_status(identity, PskStatus::Pending)?
            .is_some())
    }

    /// Whether a key is waiting to be committed with a `KEY_ROTATE_SET` command.
    pub fn ready_for_rotation_commit(&self, identity: &str) -> Result<bool> {
        Ok(self.current_ready_key(identity)?.is_some())
    }

    pub fn current_ready_key(&self, identity: &str) -> Result<Option<PreSharedKey>> {
        self.keys.latest_with_status(identity, PskStatus::Ready)
    }

    pub fn current_active_key(&self, identity: &str) -> Result<Option<PreSharedKey>> {
        self.keys.latest_with_status(identity, PskStatus::Active)
    }

    /// Move the READY key to PENDING after it was sent.
    pub fn mark_ready_as_pending(&self, identity: &str) -> Result<PreSharedKey> {
        let ready = self
            .current_ready_key(identity)?
            .ok_or_else(|| Error::NoReadyKey {
                device_id: identity.to_string(),
            })?;

        self.invalidate(identity, PskStatus::Pending)?;

        let pending = ready.with_status(PskStatus::Pending);
        self.keys.save(&pending)?;
        debug!(
            category = "psk",
            device_id = %identity,
            revision = pending.revision,
            "Key pending confirmation"
        );
        Ok(pending)
    }

    /// Promote the PENDING key to ACTIVE and retire the previous ACTIVE key.
    pub fn activate_pending_key(&self, identity: &str) -> Result<PreSharedKey> {
        let pending = self.pending_key(identity)?;

        if let Some(active) = self.current_active_key(identity)? {
            self.keys.save(&active.with_status(PskStatus::Inactive))?;
        }

        let active = pending.with_status(PskStatus::Active);
        self.keys.save(&active)?;
        info!(
            category = "psk",
            device_id = %identity,
            revision = active.revision,
            "Key activated"
        );
        Ok(active)
    }

    /// Mark the PENDING key INVALID, leaving the ACTIVE key in use.
    pub fn invalidate_pending_key(&self, identity: &str) -> Result<PreSharedKey> {
        let pending = self.pending_key(identity)?;
        let invalid = pending.with_status(PskStatus::Invalid);
        self.keys.save(&invalid)?;
        info!(
            category = "psk",
            device_id = %identity,
            revision = invalid.revision,
            "Pending key rejected by device"
        );
        Ok(invalid)
    }

    fn pending_key(&self, identity: &str) -> Result<PreSharedKey> {
        self.keys
            .latest_with_status(identity, PskStatus::Pending)?
            .ok_or_else(|| Error::NoPendingKey {
                device_id: identity.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlink_storage::MemoryPskStore;
    use std::sync::Arc;

    fn service() -> PskService {
        PskService::new(Arc::new(MemoryPskStore::new()))
    }

    fn count(service: &PskService, identity: &str, status: PskStatus) -> usize {
        service
            .keys
            .list_for_identity(identity)
            .unwrap()
            .iter()
            .filter(|k| k.status == status)
            .count()
    }

    #[test]
    fn test_psk_token() {
        let key = PreSharedKey::new("dev", 1, "1234567890123456", "secret", PskStatus::Ready);
        let mut hasher = Sha256::new();
        hasher.update(b"secret1234567890123456");
        let hash = hex::encode(hasher.finalize());

        assert_eq!(psk_token(&key, false), format!("PSK:1234567890123456:{}", hash));
        assert_eq!(psk_token(&key, true), format!("PSK:1234567890123456:{}:SET", hash));
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_generate_requires_active_key() {
        let service = service();
        let err = service.generate_ready_key("dev").unwrap_err();
        assert!(matches!(err, Error::NoActiveKey { .. }));
    }

    #[test]
    fn test_ready_key_shares_secret_and_supersedes_older_ready() {
        let service = service();
        let initial = service.set_initial_key("dev", "initialkey000000", "secret").unwrap();
        assert_eq!(initial.revision, 0);

        let first = service.generate_ready_key("dev").unwrap();
        assert_eq!(first.secret, "secret");
        assert_eq!(first.key.len(), KEY_LENGTH);
        assert!(first.key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(first.revision, 1);

        let second = service.generate_ready_key("dev").unwrap();
        assert_eq!(second.revision, 2);
        assert_eq!(count(&service, "dev", PskStatus::Ready), 1);
        assert_eq!(service.current_ready_key("dev").unwrap().unwrap().key, second.key);
    }

    #[test]
    fn test_rotation_success() {
        let service = service();
        service.set_initial_key("dev", "initialkey000000", "secret").unwrap();
        let ready = service.generate_ready_key("dev").unwrap();
        assert!(service.ready_for_rotation_commit("dev").unwrap());

        service.mark_ready_as_pending("dev").unwrap();
        assert!(service.has_pending_key("dev").unwrap());
        assert!(!service.ready_for_rotation_commit("dev").unwrap());

        let active = service.activate_pending_key("dev").unwrap();
        assert_eq!(active.key, ready.key);
        assert_eq!(count(&service, "dev", PskStatus::Active), 1);
        assert_eq!(count(&service, "dev", PskStatus::Inactive), 1);
        assert!(!service.has_pending_key("dev").unwrap());
    }

    #[test]
    fn test_rotation_failure_keeps_active_key() {
        let service = service();
        let initial = service.set_initial_key("dev", "initialkey000000", "secret").unwrap();
        service.generate_ready_key("dev").unwrap();
        service.mark_ready_as_pending("dev").unwrap();

        service.invalidate_pending_key("dev").unwrap();
        assert_eq!(service.current_active_key("dev").unwrap().unwrap().key, initial.key);
        assert_eq!(count(&service, "dev", PskStatus::Invalid), 1);

        let err = service.invalidate_pending_key("dev").unwrap_err();
        assert!(matches!(err, Error::NoPendingKey { .. }));
    }

    #[test]
    fn test_stale_pending_is_invalidated() {
        let service = service();
        service.set_initial_key("dev", "initialkey000000", "secret").unwrap();
        service.generate_ready_key("dev").unwrap();
        service.mark_ready_as_pending("dev").unwrap();
        service.generate_ready_key("dev").unwrap();
        service.mark_ready_as_pending("dev").unwrap();

        assert_eq!(count(&service, "dev", PskStatus::Pending), 1);
        assert_eq!(count(&service, "dev", PskStatus::Invalid), 1);
    }

    #[test]
    fn test_mark_pending_without_ready_key() {
        let service = service();
        service.set_initial_key("dev", "initialkey000000", "secret").unwrap();
        let err = service.mark_ready_as_pending("dev").unwrap_err();
        assert!(matches!(err, Error::NoReadyKey { .. }));
    }

    #[test]
    fn test_reprovisioning_demotes_previous_key() {
        let service = service();
        service.set_initial_key("dev", "firstkey00000000", "secret").unwrap();
        service.generate_ready_key("dev").unwrap();
        let second = service.set_initial_key("dev", "secondkey0000000", "other").unwrap();

        assert_eq!(second.revision, 2);
        assert_eq!(count(&service, "dev", PskStatus::Active), 1);
        assert_eq!(count(&service, "dev", PskStatus::Inactive), 1);
        assert_eq!(count(&service, "dev", PskStatus::Ready), 0);
    }
}
