use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::password::fast_hasher,
    config::test_config,
    notify::{Mail, Notifier, NotifyError},
    users::{
        repo::{StoreError, UserStore},
        repo_types::{Lookup, NewUser, Role, User, UserChanges, UserSummary},
        services::AccountService,
    },
};

/// Vec-backed store; the lock makes each call atomic like a single SQL statement.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
    fail_find: AtomicBool,
    fail_insert: AtomicBool,
    fail_update: AtomicBool,
    stale_email_reads: AtomicBool,
}

fn lookup_hits(user: &User, lookup: Lookup<'_>) -> bool {
    match lookup {
        Lookup::Id(id) => user.id == id,
        Lookup::Email(email) => user.email == email,
        Lookup::ResetToken(token) => user.reset_token.as_deref() == Some(token),
        Lookup::ConfirmationToken(token) => user.confirmation_token.as_deref() == Some(token),
    }
}

impl InMemoryUserStore {
    /// Fails every operation.
    pub fn set_down(&self, down: bool) {
        self.fail_finds(down);
        self.fail_inserts(down);
        self.fail_updates(down);
    }

    pub fn fail_finds(&self, fail: bool) {
        self.fail_find.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    /// Email lookups miss existing rows, as when another request commits
    /// the same address between a lookup and the insert.
    pub fn set_stale_email_reads(&self, stale: bool) {
        self.stale_email_reads.store(stale, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    pub fn get(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn confirmation_token_of(&self, email: &str) -> Option<String> {
        self.get(email).and_then(|u| u.confirmation_token)
    }

    pub fn reset_token_of(&self, email: &str) -> Option<String> {
        self.get(email).and_then(|u| u.reset_token)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find(&self, lookup: Lookup<'_>) -> Result<Option<User>, StoreError> {
        Self::check(&self.fail_find)?;
        if matches!(lookup, Lookup::Email(_)) && self.stale_email_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| lookup_hits(u, lookup)).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<UserSummary, StoreError> {
        Self::check(&self.fail_insert)?;
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let record = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password: user.password,
            active: false,
            role: Role::default(),
            reset_token: None,
            confirmation_token: Some(user.confirmation_token),
            created_at: now,
            updated_at: now,
        };
        let summary = UserSummary::from(&record);
        users.push(record);
        Ok(summary)
    }

    async fn update(
        &self,
        lookup: Lookup<'_>,
        changes: UserChanges,
    ) -> Result<Option<UserSummary>, StoreError> {
        Self::check(&self.fail_update)?;
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| lookup_hits(u, lookup)) else {
            return Ok(None);
        };
        if let Some(password) = changes.password {
            user.password = password;
        }
        if let Some(active) = changes.active {
            user.active = active;
        }
        if let Some(reset_token) = changes.reset_token {
            user.reset_token = reset_token;
        }
        if let Some(confirmation_token) = changes.confirmation_token {
            user.confirmation_token = confirmation_token;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(UserSummary::from(&*user)))
    }
}

/// Keeps every mail it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Mail>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, mail: Mail) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("smtp relay refused".into()));
        }
        mail.render()?;
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub fn test_service() -> (AccountService, Arc<InMemoryUserStore>, Arc<RecordingNotifier>) {
    let store = Arc::new(InMemoryUserStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = AccountService::new(
        Arc::new(test_config()),
        store.clone(),
        notifier.clone(),
        fast_hasher(),
    );
    (service, store, notifier)
}
