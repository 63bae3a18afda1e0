//! In-memory ledger collaborator.
//!
//! Enforces the real ledger's one-record-per-sender rule: a commit
//! replaces any existing record from the same sender for that receiver.
//! Commits can be made to fail on demand, and every commit attempt is
//! counted so tests can assert that the conflict gate never reached the
//! ledger.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use vouch_core::{Address, ConfirmedAttestation, TestimonialLedger, VouchError};

/// Receiver profile metadata stored by [`MemoryLedger`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredProfile {
    /// Display name.
    pub name: String,
    /// Contact information.
    pub contact: String,
    /// Biography text.
    pub bio: String,
}

/// In-memory [`TestimonialLedger`] with failure injection.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<HashMap<Address, Vec<ConfirmedAttestation>>>,
    profiles: Mutex<HashMap<Address, StoredProfile>>,
    next_id: AtomicU64,
    fail_commits: AtomicBool,
    commit_attempts: AtomicUsize,
    commit_delay: Mutex<Option<Duration>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Make every subsequent commit fail (or succeed again).
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::Release);
    }

    /// Delay commits, to hold an accept or replacement in flight.
    pub async fn set_commit_delay(&self, delay: Option<Duration>) {
        *self.commit_delay.lock().await = delay;
    }

    /// Number of commit attempts so far, including failed ones.
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::Acquire)
    }

    /// Seed a confirmed record directly, bypassing the commit path.
    pub async fn seed_confirmed(
        &self,
        receiver: &Address,
        sender: &Address,
        content: &str,
    ) -> ConfirmedAttestation {
        let record = ConfirmedAttestation {
            ledger_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            content: content.to_owned(),
            sender_address: sender.clone(),
            giver_name: format!("giver-{sender}"),
            profile_url: String::new(),
            committed_at: Utc::now(),
            verified: true,
        };
        self.records
            .lock()
            .await
            .entry(receiver.clone())
            .or_default()
            .push(record.clone());
        record
    }

    /// Snapshot of the confirmed records held for a receiver.
    pub async fn list_records(&self, receiver: &Address) -> Vec<ConfirmedAttestation> {
        self.records
            .lock()
            .await
            .get(receiver)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored profile for a receiver, if set.
    pub async fn profile(&self, receiver: &Address) -> Option<StoredProfile> {
        self.profiles.lock().await.get(receiver).cloned()
    }
}

#[async_trait]
impl TestimonialLedger for MemoryLedger {
    async fn list_confirmed(
        &self,
        receiver: &Address,
    ) -> Result<Vec<ConfirmedAttestation>, VouchError> {
        Ok(self
            .records
            .lock()
            .await
            .get(receiver)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit(
        &self,
        receiver: &Address,
        sender: &Address,
        content: &str,
        giver_name: &str,
        profile_url: &str,
        signature: &str,
    ) -> Result<ConfirmedAttestation, VouchError> {
        self.commit_attempts.fetch_add(1, Ordering::AcqRel);

        let delay = *self.commit_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_commits.load(Ordering::Acquire) {
            return Err(VouchError::commit("injected commit failure"));
        }
        if signature.is_empty() {
            return Err(VouchError::commit("ledger rejected empty signature"));
        }

        let record = ConfirmedAttestation {
            ledger_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            content: content.to_owned(),
            sender_address: sender.clone(),
            giver_name: giver_name.to_owned(),
            profile_url: profile_url.to_owned(),
            committed_at: Utc::now(),
            verified: true,
        };

        let mut records = self.records.lock().await;
        let entries = records.entry(receiver.clone()).or_default();
        // One active record per sender: the new commit supersedes.
        entries.retain(|c| &c.sender_address != sender);
        entries.push(record.clone());
        Ok(record)
    }

    async fn discard(&self, receiver: &Address, ledger_id: u64) -> Result<(), VouchError> {
        let mut records = self.records.lock().await;
        let entries = records
            .get_mut(receiver)
            .ok_or_else(|| VouchError::ledger(format!("no records for {receiver}")))?;
        let before = entries.len();
        entries.retain(|c| c.ledger_id != ledger_id);
        if entries.len() == before {
            return Err(VouchError::ledger(format!(
                "no confirmed record with id {ledger_id}"
            )));
        }
        Ok(())
    }

    async fn set_receiver_profile(
        &self,
        receiver: &Address,
        name: &str,
        contact: &str,
        bio: &str,
    ) -> Result<(), VouchError> {
        self.profiles.lock().await.insert(
            receiver.clone(),
            StoredProfile {
                name: name.to_owned(),
                contact: contact.to_owned(),
                bio: bio.to_owned(),
            },
        );
        Ok(())
    }
}
