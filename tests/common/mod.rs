// Common test utilities for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use taskstash::config::BackendSettings;
use taskstash::coordinators::TaskSetStream;
use taskstash::errors::InternalError;
use taskstash::services::ResetNotifier;
use taskstash::types::{ResetToken, Task};
use taskstash::AppData;

pub const TEST_PEPPER: &str = "integration-test-pepper";

/// Creates a test database with migrations applied
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Reset notifier that records delivered tokens for the test to read back
#[derive(Default)]
pub struct MailboxNotifier {
    deliveries: Mutex<Vec<(String, ResetToken)>>,
}

impl MailboxNotifier {
    pub fn token_for(&self, email: &str) -> Option<ResetToken> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl ResetNotifier for MailboxNotifier {
    async fn deliver(&self, email: &str, token: &ResetToken) -> Result<(), InternalError> {
        self.deliveries
            .lock()
            .unwrap()
            .push((email.to_string(), token.clone()));
        Ok(())
    }
}

/// Wires the local backend over a fresh in-memory database
pub async fn setup_app() -> (AppData, Arc<MailboxNotifier>) {
    let db = setup_test_db().await;
    let mailbox = Arc::new(MailboxNotifier::default());
    let settings = BackendSettings::new("sqlite::memory:", TEST_PEPPER);
    let app = AppData::from_connection(db, settings, mailbox.clone());
    (app, mailbox)
}

/// Reads sets from the feed until one satisfies `accept`, returning every set seen
pub async fn collect_until<F>(feed: &mut TaskSetStream, mut accept: F) -> Vec<Vec<Task>>
where
    F: FnMut(&[Task]) -> bool,
{
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(set) = feed.next().await {
            let done = accept(&set);
            seen.push(set);
            if done {
                return;
            }
        }
        panic!("task feed ended");
    })
    .await
    .expect("task feed timed out");
    seen
}
