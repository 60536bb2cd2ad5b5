use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
    sync::watch,
};
use tracing::{debug, warn};

use crate::{
    ledger::entities::{DayLedger, UserId},
    utils::{clock::Clock, time::DayKey},
};

use super::{LedgerStore, LedgerSubscription, StoreError};

/// File-backed realization of [LedgerStore]. Each `(user, day)` resource is
/// one JSON document at `users/{user}/days/{day}.json` under the root
/// directory, and an in-process watch channel per resource fans snapshots
/// out to subscribers.
///
/// The handle is bound to the authenticated user at construction: replacing
/// another user's resource is rejected before anything touches disk, which
/// is the local stand-in for the remote store's permission rules.
pub struct LocalLedgerStore {
    root: PathBuf,
    authorized: UserId,
    clock: Arc<dyn Clock>,
    channels: Mutex<HashMap<(UserId, DayKey), watch::Sender<DayLedger>>>,
}

impl LocalLedgerStore {
    pub fn new(
        root: PathBuf,
        authorized: UserId,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            authorized,
            clock,
            channels: Mutex::new(HashMap::new()),
        })
    }

    fn document_path(&self, user: &UserId, day: DayKey) -> PathBuf {
        self.root
            .join("users")
            .join(user.as_str())
            .join("days")
            .join(format!("{day}.json"))
    }

    async fn load(&self, path: &Path) -> Result<DayLedger, StoreError> {
        let mut file = match File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DayLedger::empty()),
            Err(e) => return Err(e.into()),
        };

        file.lock_shared()?;
        let mut contents = String::new();
        let read = file.read_to_string(&mut contents).await;
        file.unlock_async().await?;
        read?;

        match serde_json::from_str::<DayLedger>(&contents) {
            Ok(ledger) => Ok(ledger),
            Err(e) => {
                // Might happen when a shutdown cut a write short. Treat it
                // as an absent document rather than wedging the subscriber.
                warn!("Corrupted ledger document at {path:?}: {e}");
                Ok(DayLedger::empty())
            }
        }
    }

    async fn persist(&self, path: &Path, ledger: &DayLedger) -> Result<(), StoreError> {
        let buffer =
            serde_json::to_vec(ledger).map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;

        // Semi-safe acquire-release for the document file
        file.lock_exclusive()?;
        let written = Self::overwrite(&mut file, &buffer).await;
        file.unlock_async().await?;
        written?;
        Ok(())
    }

    async fn overwrite(file: &mut File, buffer: &[u8]) -> Result<(), std::io::Error> {
        file.set_len(0).await?;
        file.write_all(buffer).await?;
        file.flush().await?;
        Ok(())
    }

    /// Gets a receiver for the resource, creating its channel from the
    /// persisted state when no subscriber exists yet. Channels whose last
    /// subscriber went away are pruned here, releasing the resource.
    fn subscribe_channel(
        &self,
        user: &UserId,
        day: DayKey,
        initial: &DayLedger,
    ) -> watch::Receiver<DayLedger> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.retain(|_, sender| sender.receiver_count() > 0);

        match channels.get(&(user.clone(), day)) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(initial.clone());
                channels.insert((user.clone(), day), sender);
                receiver
            }
        }
    }

    fn publish(&self, user: &UserId, day: DayKey, ledger: DayLedger) {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = channels.get(&(user.clone(), day)) {
            sender.send_replace(ledger);
        }
    }
}

#[async_trait]
impl LedgerStore for LocalLedgerStore {
    async fn read_and_subscribe(
        &self,
        user: &UserId,
        day: DayKey,
    ) -> Result<LedgerSubscription, StoreError> {
        let path = self.document_path(user, day);
        debug!("Subscribing to {path:?}");

        let initial = self.load(&path).await?;
        let receiver = self.subscribe_channel(user, day, &initial);
        Ok(LedgerSubscription::new(receiver))
    }

    async fn replace(
        &self,
        user: &UserId,
        day: DayKey,
        ledger: DayLedger,
    ) -> Result<(), StoreError> {
        if *user != self.authorized {
            return Err(StoreError::WriteRejected {
                user: user.clone(),
                day,
            });
        }

        let stamped = ledger.stamped(self.clock.time());
        let path = self.document_path(user, day);
        self.persist(&path, &stamped).await?;
        debug!(
            "Replaced {path:?} with {} activities ({} min)",
            stamped.activities.len(),
            stamped.total_minutes
        );
        self.publish(user, day, stamped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    use crate::{
        ledger::entities::{Activity, ActivityId, Category, DayLedger, UserId},
        store::{LedgerStore, StoreError},
        utils::{clock::testing::FixedClock, time::DayKey},
    };

    use super::LocalLedgerStore;

    const TEST_DAY: NaiveDate = match NaiveDate::from_ymd_opt(2024, 3, 1) {
        Some(v) => v,
        None => panic!("valid date"),
    };

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    fn activity(id: &str, name: &str, category: Category, duration: u32) -> Activity {
        Activity {
            id: ActivityId::new(id),
            name: name.into(),
            category,
            duration,
        }
    }

    fn store(root: &std::path::Path) -> LocalLedgerStore {
        LocalLedgerStore::new(root.to_owned(), user("ada"), Arc::new(FixedClock::default()))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_document_reads_as_an_empty_ledger() -> Result<()> {
        let dir = tempdir()?;
        let store = store(dir.path());

        let mut subscription = store
            .read_and_subscribe(&user("ada"), DayKey::from_date(TEST_DAY))
            .await?;
        let initial = subscription.next_snapshot().await.unwrap();

        assert!(initial.is_empty());
        assert_eq!(initial.total_minutes, 0);
        Ok(())
    }

    #[tokio::test]
    async fn replace_persists_stamps_and_notifies_subscribers() -> Result<()> {
        let dir = tempdir()?;
        let clock = FixedClock::default();
        let store = LocalLedgerStore::new(
            dir.path().to_owned(),
            user("ada"),
            Arc::new(clock.clone()),
        )?;
        let day = DayKey::from_date(TEST_DAY);

        let mut subscription = store.read_and_subscribe(&user("ada"), day).await?;
        assert!(subscription.next_snapshot().await.unwrap().is_empty());

        let ledger =
            DayLedger::from_activities(vec![activity("1", "Sleep", Category::Sleep, 480)]);
        store.replace(&user("ada"), day, ledger).await?;

        let snapshot = subscription.next_snapshot().await.unwrap();
        assert_eq!(snapshot.total_minutes, 480);
        assert_eq!(snapshot.updated_at, Some(clock.0));

        // A fresh subscription starts over from the persisted document.
        let mut fresh = store.read_and_subscribe(&user("ada"), day).await?;
        let reread = fresh.next_snapshot().await.unwrap();
        assert_eq!(reread, snapshot);
        Ok(())
    }

    #[tokio::test]
    async fn documents_land_under_the_users_days_path() -> Result<()> {
        let dir = tempdir()?;
        let store = store(dir.path());
        let day = DayKey::from_date(TEST_DAY);

        store
            .replace(&user("ada"), day, DayLedger::empty())
            .await?;

        assert!(dir
            .path()
            .join("users/ada/days/2024-03-01.json")
            .is_file());
        Ok(())
    }

    #[tokio::test]
    async fn writes_for_another_user_are_rejected_before_touching_disk() -> Result<()> {
        let dir = tempdir()?;
        let store = store(dir.path());
        let day = DayKey::from_date(TEST_DAY);

        let result = store.replace(&user("eve"), day, DayLedger::empty()).await;

        assert!(matches!(result, Err(StoreError::WriteRejected { .. })));
        assert!(!dir.path().join("users/eve").exists());
        Ok(())
    }

    #[tokio::test]
    async fn same_base_replaces_leave_exactly_one_ledger_never_a_merge() -> Result<()> {
        let dir = tempdir()?;
        let store = store(dir.path());
        let day = DayKey::from_date(TEST_DAY);

        // Two devices observe the same prior (empty) snapshot.
        let mut device_a = store.read_and_subscribe(&user("ada"), day).await?;
        let mut device_b = store.read_and_subscribe(&user("ada"), day).await?;
        let base_a = device_a.next_snapshot().await.unwrap();
        let base_b = device_b.next_snapshot().await.unwrap();
        assert_eq!(base_a, base_b);

        // Each computes its replacement list from its own last-seen state.
        let from_a =
            DayLedger::from_activities(vec![activity("a", "Read", Category::Study, 60)]);
        let from_b =
            DayLedger::from_activities(vec![activity("b", "Run", Category::Exercise, 45)]);
        store.replace(&user("ada"), day, from_a).await?;
        store.replace(&user("ada"), day, from_b.clone()).await?;

        // The later commit wins wholesale; the earlier one is gone.
        let mut fresh = store.read_and_subscribe(&user("ada"), day).await?;
        let persisted = fresh.next_snapshot().await.unwrap();
        assert_eq!(persisted.activities, from_b.activities);
        assert_eq!(persisted.total_minutes, 45);
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_document_reads_as_empty_instead_of_failing() -> Result<()> {
        let dir = tempdir()?;
        let store = store(dir.path());
        let day = DayKey::from_date(TEST_DAY);

        let path = dir.path().join("users/ada/days/2024-03-01.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await?;
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(b"{\"activities\": [{\"id\"").await?;
        file.flush().await?;

        let mut subscription = store.read_and_subscribe(&user("ada"), day).await?;
        let initial = subscription.next_snapshot().await.unwrap();
        assert!(initial.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn resubscribing_after_cancellation_yields_a_fresh_initial_snapshot() -> Result<()> {
        let dir = tempdir()?;
        let store = store(dir.path());
        let day = DayKey::from_date(TEST_DAY);

        let subscription = store.read_and_subscribe(&user("ada"), day).await?;
        drop(subscription);

        let ledger = DayLedger::from_activities(vec![activity("1", "Gym", Category::Exercise, 30)]);
        store.replace(&user("ada"), day, ledger).await?;

        let mut fresh = store.read_and_subscribe(&user("ada"), day).await?;
        let initial = fresh.next_snapshot().await.unwrap();
        assert_eq!(initial.total_minutes, 30);
        Ok(())
    }
}
