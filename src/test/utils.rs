// Test utilities shared across unit tests
// Only compiled when running tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use argon2::Params;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::migrate_database;
use crate::errors::{AuthError, DataError, InternalError};
use crate::providers::{SessionProvider, SessionStream, TaskListStream, TaskProvider};
use crate::services::{AuthService, PasswordValidator, ResetNotifier};
use crate::stores::CredentialStore;
use crate::types::{Credentials, ResetToken, Session, Task, TaskPatch, UserId};

pub const TEST_PEPPER: &str = "test-pepper-for-unit-tests";

/// Cheap Argon2 parameters so tests don't spend seconds hashing
pub fn fast_hash_params() -> Params {
    Params::new(1024, 1, 1, None).expect("valid argon2 params")
}

/// Creates an in-memory database with migrations applied
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    migrate_database(&db)
        .await
        .expect("Failed to run migrations");

    db
}

pub fn test_credential_store(db: DatabaseConnection) -> CredentialStore {
    CredentialStore::new(db, TEST_PEPPER.to_string()).with_hash_params(fast_hash_params())
}

/// Returns (db, credential_store)
pub async fn setup_test_credential_store() -> (DatabaseConnection, CredentialStore) {
    let db = setup_test_db().await;
    let store = test_credential_store(db.clone());
    (db, store)
}

/// Creates an AuthService over a fresh database with a capturing notifier
pub async fn setup_test_auth_service() -> (AuthService, Arc<CapturingResetNotifier>) {
    let (_db, store) = setup_test_credential_store().await;
    let notifier = Arc::new(CapturingResetNotifier::default());
    let auth = AuthService::new(
        Arc::new(store),
        PasswordValidator::new(6, 128),
        notifier.clone(),
        60,
    );
    (auth, notifier)
}

/// Await the next stream item, failing the test after five seconds
pub async fn next_within<T>(stream: &mut BoxStream<'static, T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream timed out")
        .expect("stream ended")
}

/// Reset notifier that keeps the last delivered token
#[derive(Default)]
pub struct CapturingResetNotifier {
    last: Mutex<Option<(String, ResetToken)>>,
    fail_next: AtomicBool,
}

impl CapturingResetNotifier {
    pub fn last_delivery(&self) -> Option<(String, ResetToken)> {
        self.last.lock().unwrap().clone()
    }

    pub fn last_token(&self) -> Option<ResetToken> {
        self.last_delivery().map(|(_, token)| token)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResetNotifier for CapturingResetNotifier {
    async fn deliver(&self, email: &str, token: &ResetToken) -> Result<(), InternalError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(InternalError::delivery("test", "mailbox unreachable"));
        }
        *self.last.lock().unwrap() = Some((email.to_string(), token.clone()));
        Ok(())
    }
}

/// Session provider driven by the test
///
/// Every observer receives every transition in order, starting with the session
/// current at subscription time.
pub struct ScriptedSession {
    current: Mutex<Session>,
    observers: Mutex<Vec<mpsc::UnboundedSender<Session>>>,
}

impl ScriptedSession {
    pub fn new(initial: Session) -> Self {
        Self {
            current: Mutex::new(initial),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, session: Session) {
        *self.current.lock().unwrap() = session.clone();
        self.observers
            .lock()
            .unwrap()
            .retain(|observer| observer.send(session.clone()).is_ok());
    }

    /// End every session stream
    pub fn close(&self) {
        self.observers.lock().unwrap().clear();
    }
}

#[async_trait]
impl SessionProvider for ScriptedSession {
    fn current_session(&self) -> Session {
        self.current.lock().unwrap().clone()
    }

    fn observe_session(&self) -> SessionStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let current = self.current.lock().unwrap().clone();
        tx.send(current).expect("receiver alive");
        self.observers.lock().unwrap().push(tx);
        UnboundedReceiverStream::new(rx).boxed()
    }

    async fn register(&self, _credentials: Credentials) -> Result<UserId, AuthError> {
        Err(AuthError::Unavailable("scripted session".to_string()))
    }

    async fn login(&self, _credentials: Credentials) -> Result<UserId, AuthError> {
        Err(AuthError::Unavailable("scripted session".to_string()))
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.set(Session::Anonymous);
        Ok(())
    }

    async fn reset_password(&self, _email: &str) -> Result<(), AuthError> {
        Err(AuthError::Unavailable("scripted session".to_string()))
    }
}

/// Decrements the active query count when a live query stream is dropped
struct ActiveQueryGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ActiveQueryGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

type QueryItem = Result<Vec<Task>, DataError>;

/// Task provider whose live query results are pushed by the test
///
/// Records every write and tracks how many live queries are open at once.
#[derive(Default)]
pub struct FakeTaskProvider {
    queries: Mutex<HashMap<UserId, mpsc::UnboundedSender<QueryItem>>>,
    opened_for: Mutex<Vec<UserId>>,
    active: Arc<AtomicUsize>,
    max_active: AtomicUsize,
    created: Mutex<Vec<Task>>,
    updated: Mutex<Vec<(String, TaskPatch)>>,
    deleted: Mutex<Vec<String>>,
    write_error: Mutex<Option<DataError>>,
}

impl FakeTaskProvider {
    /// Push a result to the newest query for `owner`; false if it was cancelled
    pub fn emit(&self, owner: &UserId, item: QueryItem) -> bool {
        self.queries
            .lock()
            .unwrap()
            .get(owner)
            .map(|tx| tx.send(item).is_ok())
            .unwrap_or(false)
    }

    /// End the newest query for `owner` without an error
    pub fn end(&self, owner: &UserId) {
        self.queries.lock().unwrap().remove(owner);
    }

    pub fn active_queries(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active_queries(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn opened_for(&self) -> Vec<UserId> {
        self.opened_for.lock().unwrap().clone()
    }

    pub async fn wait_until_inactive(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.active_queries() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("live query still active");
    }

    pub fn created(&self) -> Vec<Task> {
        self.created.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<(String, TaskPatch)> {
        self.updated.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail_writes_with(&self, error: DataError) {
        *self.write_error.lock().unwrap() = Some(error);
    }

    fn check_write(&self) -> Result<(), DataError> {
        match self.write_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TaskProvider for FakeTaskProvider {
    fn query_tasks_by_owner(&self, owner: &UserId) -> TaskListStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queries.lock().unwrap().insert(owner.clone(), tx);
        self.opened_for.lock().unwrap().push(owner.clone());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let guard = ActiveQueryGuard {
            active: self.active.clone(),
        };

        UnboundedReceiverStream::new(rx)
            .map(move |item| {
                let _active = &guard;
                item
            })
            .boxed()
    }

    async fn create_task(&self, task: Task) -> Result<String, DataError> {
        self.check_write()?;
        let mut created = self.created.lock().unwrap();
        created.push(task);
        Ok(format!("task-{}", created.len()))
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<(), DataError> {
        self.check_write()?;
        self.updated.lock().unwrap().push((id.to_string(), patch));
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<(), DataError> {
        self.check_write()?;
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
