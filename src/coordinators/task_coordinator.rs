use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::coordinators::task_feed::{TaskFeed, TaskSetStream};
use crate::errors::{DataError, TaskError};
use crate::providers::{SessionProvider, SessionStream, TaskListStream, TaskProvider};
use crate::types::{Session, Task, TaskPatch, UserId};

const DEFAULT_FEED_CAPACITY: usize = 64;

/// Which user, if any, the coordinator's live query is bound to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Idle,
    Bound(UserId),
}

/// Keeps a feed of "tasks visible to the active session" in step with session
/// transitions
///
/// A single driver task consumes the session stream. On `Authenticated(u)` it opens
/// one live query for `u`; on `Anonymous` it drops the query and publishes an empty
/// set. A switch from `u1` to `u2` drops the old query and clears the feed before
/// the new query is opened, so results of two users never mix.
///
/// Mutations go straight to the task provider and report failures to the caller.
/// A mutation's effect shows up on the feed whenever the live query delivers it,
/// not when the call returns.
pub struct TaskCoordinator {
    session_provider: Arc<dyn SessionProvider>,
    task_provider: Arc<dyn TaskProvider>,
    feed: TaskFeed,
    binding: watch::Receiver<Binding>,
    cancel: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl TaskCoordinator {
    /// Start a coordinator; must be called from within a Tokio runtime
    pub fn start(
        session_provider: Arc<dyn SessionProvider>,
        task_provider: Arc<dyn TaskProvider>,
    ) -> Self {
        Self::start_with_capacity(session_provider, task_provider, DEFAULT_FEED_CAPACITY)
    }

    /// Start a coordinator whose feed buffers up to `feed_capacity` sets per observer
    pub fn start_with_capacity(
        session_provider: Arc<dyn SessionProvider>,
        task_provider: Arc<dyn TaskProvider>,
        feed_capacity: usize,
    ) -> Self {
        let feed = TaskFeed::new(feed_capacity);
        let (binding_tx, binding) = watch::channel(Binding::Idle);
        let cancel = CancellationToken::new();

        let driver = Driver {
            sessions: session_provider.observe_session(),
            task_provider: task_provider.clone(),
            feed: feed.clone(),
            binding: binding_tx,
            live: None,
        };
        let handle = tokio::spawn(driver.run(cancel.clone()));

        Self {
            session_provider,
            task_provider,
            feed,
            binding,
            cancel,
            driver: Some(handle),
        }
    }

    /// Observe the visible tasks: the current set first, then each update
    pub fn tasks(&self) -> TaskSetStream {
        self.feed.subscribe()
    }

    pub fn latest_tasks(&self) -> Vec<Task> {
        self.feed.latest()
    }

    pub fn binding(&self) -> Binding {
        self.binding.borrow().clone()
    }

    /// Watch binding transitions
    pub fn watch_binding(&self) -> watch::Receiver<Binding> {
        self.binding.clone()
    }

    /// Create a task owned by the user authenticated at call time
    ///
    /// Fails with [`TaskError::Unauthenticated`], without writing, when no user is
    /// signed in. Any `id` or `owner` on `task` is replaced.
    pub async fn create_task(&self, mut task: Task) -> Result<String, TaskError> {
        let Session::Authenticated(user_id) = self.session_provider.current_session() else {
            tracing::warn!("Rejected task creation without an authenticated session");
            return Err(TaskError::Unauthenticated);
        };

        task.id = None;
        task.owner = Some(user_id);

        Ok(self.task_provider.create_task(task).await?)
    }

    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<(), TaskError> {
        Ok(self.task_provider.update_task(id, patch).await?)
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), TaskError> {
        Ok(self.task_provider.delete_task(id).await?)
    }

    /// Stop the driver, cancel any live query and wait for it to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.driver.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Task coordinator driver failed");
            }
        }
    }
}

impl Drop for TaskCoordinator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Event {
    Session(Option<Session>),
    Tasks(Option<Result<Vec<Task>, DataError>>),
    Cancelled,
}

/// Owns the session stream and the single live query
struct Driver {
    sessions: SessionStream,
    task_provider: Arc<dyn TaskProvider>,
    feed: TaskFeed,
    binding: watch::Sender<Binding>,
    live: Option<TaskListStream>,
}

impl Driver {
    async fn run(mut self, cancel: CancellationToken) {
        tracing::debug!("Task coordinator started");

        loop {
            // Session transitions win over pending query results
            let event = match self.live.as_mut() {
                Some(live) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Event::Cancelled,
                    session = self.sessions.next() => Event::Session(session),
                    tasks = live.next() => Event::Tasks(tasks),
                },
                None => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Event::Cancelled,
                    session = self.sessions.next() => Event::Session(session),
                },
            };

            match event {
                Event::Session(Some(session)) => self.on_session(session),
                Event::Session(None) => {
                    tracing::debug!("Session stream ended");
                    self.on_session(Session::Anonymous);
                    break;
                }
                Event::Tasks(tasks) => self.on_tasks(tasks),
                Event::Cancelled => break,
            }
        }

        self.unbind();
        tracing::debug!("Task coordinator stopped");
    }

    fn bound_user(&self) -> Option<UserId> {
        match &*self.binding.borrow() {
            Binding::Idle => None,
            Binding::Bound(user_id) => Some(user_id.clone()),
        }
    }

    fn on_session(&mut self, session: Session) {
        match (self.bound_user(), session) {
            (Some(current), Session::Authenticated(user_id)) if current == user_id => {
                tracing::trace!(user_id = %user_id, "Session unchanged");
            }
            (_, Session::Authenticated(user_id)) => {
                self.unbind();
                self.bind(user_id);
            }
            (Some(_), Session::Anonymous) => self.unbind(),
            (None, Session::Anonymous) => {}
        }
    }

    fn bind(&mut self, user_id: UserId) {
        debug_assert!(self.live.is_none());

        self.live = Some(self.task_provider.query_tasks_by_owner(&user_id));
        tracing::info!(user_id = %user_id, "Bound task feed");
        self.binding.send_replace(Binding::Bound(user_id));
    }

    /// Drop the live query (if any) and clear the feed
    fn unbind(&mut self) {
        // Dropping the stream cancels the query; nothing it yields can reach the feed
        self.live = None;

        if let Some(user_id) = self.bound_user() {
            tracing::info!(user_id = %user_id, "Unbound task feed");
            self.feed.publish(Vec::new());
            self.binding.send_replace(Binding::Idle);
        }
    }

    fn on_tasks(&mut self, tasks: Option<Result<Vec<Task>, DataError>>) {
        let Some(user_id) = self.bound_user() else {
            self.live = None;
            return;
        };

        match tasks {
            Some(Ok(tasks)) => {
                let total = tasks.len();
                let visible: Vec<Task> = tasks
                    .into_iter()
                    .filter(|task| task.is_owned_by(&user_id))
                    .collect();
                if visible.len() != total {
                    tracing::warn!(
                        user_id = %user_id,
                        dropped = total - visible.len(),
                        "Live query returned tasks of another owner"
                    );
                }
                self.feed.publish(visible);
            }
            Some(Err(e)) => {
                tracing::warn!(user_id = %user_id, error = %e, "Live query failed");
                self.live = None;
            }
            None => {
                tracing::debug!(user_id = %user_id, "Live query ended");
                self.live = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::utils::{next_within, FakeTaskProvider, ScriptedSession};

    fn task(id: &str, content: &str, owner: &str) -> Task {
        Task {
            id: Some(id.to_string()),
            content: content.to_string(),
            completed: false,
            owner: Some(UserId::from(owner)),
        }
    }

    async fn wait_for_binding(coordinator: &TaskCoordinator, expected: Binding) {
        let mut binding = coordinator.watch_binding();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            binding.wait_for(|b| *b == expected),
        )
        .await
        .expect("binding timed out")
        .expect("driver stopped");
    }

    struct Fixture {
        session: Arc<ScriptedSession>,
        tasks: Arc<FakeTaskProvider>,
        coordinator: TaskCoordinator,
    }

    fn setup() -> Fixture {
        let session = Arc::new(ScriptedSession::new(Session::Anonymous));
        let tasks = Arc::new(FakeTaskProvider::default());
        let coordinator = TaskCoordinator::start(session.clone(), tasks.clone());
        Fixture {
            session,
            tasks,
            coordinator,
        }
    }

    #[tokio::test]
    async fn test_starts_idle_with_empty_feed() {
        let f = setup();
        let mut feed = f.coordinator.tasks();

        assert_eq!(next_within(&mut feed).await, vec![]);
        assert_eq!(f.coordinator.binding(), Binding::Idle);
        assert_eq!(f.tasks.active_queries(), 0);
    }

    #[tokio::test]
    async fn test_authenticated_session_forwards_query_results() {
        let f = setup();
        let mut feed = f.coordinator.tasks();
        assert_eq!(next_within(&mut feed).await, vec![]);

        f.session.set(Session::authenticated("u1"));
        wait_for_binding(&f.coordinator, Binding::Bound(UserId::from("u1"))).await;

        let milk = task("t1", "buy milk", "u1");
        f.tasks.emit(&UserId::from("u1"), Ok(vec![milk.clone()]));

        assert_eq!(next_within(&mut feed).await, vec![milk.clone()]);
        assert_eq!(f.coordinator.latest_tasks(), vec![milk]);
        assert_eq!(f.tasks.opened_for(), vec![UserId::from("u1")]);
    }

    #[tokio::test]
    async fn test_anonymous_session_cancels_query_and_clears_feed() {
        let f = setup();
        let u1 = UserId::from("u1");
        let mut feed = f.coordinator.tasks();
        assert_eq!(next_within(&mut feed).await, vec![]);

        f.session.set(Session::Authenticated(u1.clone()));
        wait_for_binding(&f.coordinator, Binding::Bound(u1.clone())).await;
        f.tasks.emit(&u1, Ok(vec![task("t1", "buy milk", "u1")]));
        assert_eq!(next_within(&mut feed).await.len(), 1);

        f.session.set(Session::Anonymous);
        assert_eq!(next_within(&mut feed).await, vec![]);
        assert_eq!(f.tasks.active_queries(), 0);
        wait_for_binding(&f.coordinator, Binding::Idle).await;

        // The cancelled query can no longer deliver anything
        assert!(!f.tasks.emit(&u1, Ok(vec![task("t2", "late", "u1")])));
        assert!(f.coordinator.latest_tasks().is_empty());
    }

    #[tokio::test]
    async fn test_user_switch_never_mixes_result_sets() {
        let f = setup();
        let u1 = UserId::from("u1");
        let u2 = UserId::from("u2");
        let mut feed = f.coordinator.tasks();
        assert_eq!(next_within(&mut feed).await, vec![]);

        f.session.set(Session::Authenticated(u1.clone()));
        wait_for_binding(&f.coordinator, Binding::Bound(u1.clone())).await;
        f.tasks.emit(&u1, Ok(vec![task("t1", "u1 task", "u1")]));
        assert_eq!(next_within(&mut feed).await, vec![task("t1", "u1 task", "u1")]);

        f.session.set(Session::Authenticated(u2.clone()));
        wait_for_binding(&f.coordinator, Binding::Bound(u2.clone())).await;
        assert!(!f.tasks.emit(&u1, Ok(vec![task("t3", "stale", "u1")])));
        f.tasks.emit(&u2, Ok(vec![task("t2", "u2 task", "u2")]));

        assert_eq!(next_within(&mut feed).await, vec![]);
        assert_eq!(next_within(&mut feed).await, vec![task("t2", "u2 task", "u2")]);
        assert_eq!(f.tasks.max_active_queries(), 1);
    }

    #[tokio::test]
    async fn test_rapid_session_transitions_keep_at_most_one_query() {
        let f = setup();

        for i in 0..20 {
            f.session.set(Session::authenticated(format!("u{}", i % 3)));
            if i % 4 == 0 {
                f.session.set(Session::Anonymous);
            }
        }
        f.session.set(Session::authenticated("last"));
        wait_for_binding(&f.coordinator, Binding::Bound(UserId::from("last"))).await;

        assert_eq!(f.tasks.max_active_queries(), 1);
        assert_eq!(f.tasks.active_queries(), 1);
    }

    #[tokio::test]
    async fn test_repeated_authentication_for_same_user_keeps_query() {
        let f = setup();
        let u1 = UserId::from("u1");

        f.session.set(Session::Authenticated(u1.clone()));
        f.session.set(Session::Authenticated(u1.clone()));
        f.session.set(Session::authenticated("sentinel"));
        wait_for_binding(&f.coordinator, Binding::Bound(UserId::from("sentinel"))).await;

        assert_eq!(f.tasks.opened_for(), vec![u1, UserId::from("sentinel")]);
    }

    #[tokio::test]
    async fn test_foreign_tasks_are_filtered_out() {
        let f = setup();
        let u1 = UserId::from("u1");
        let mut feed = f.coordinator.tasks();
        assert_eq!(next_within(&mut feed).await, vec![]);

        f.session.set(Session::Authenticated(u1.clone()));
        wait_for_binding(&f.coordinator, Binding::Bound(u1.clone())).await;
        f.tasks.emit(
            &u1,
            Ok(vec![task("t1", "mine", "u1"), task("t9", "not mine", "u9")]),
        );

        assert_eq!(next_within(&mut feed).await, vec![task("t1", "mine", "u1")]);
    }

    #[tokio::test]
    async fn test_query_error_keeps_last_set_and_drops_query() {
        let f = setup();
        let u1 = UserId::from("u1");
        let mut feed = f.coordinator.tasks();
        assert_eq!(next_within(&mut feed).await, vec![]);

        f.session.set(Session::Authenticated(u1.clone()));
        wait_for_binding(&f.coordinator, Binding::Bound(u1.clone())).await;
        f.tasks.emit(&u1, Ok(vec![task("t1", "buy milk", "u1")]));
        assert_eq!(next_within(&mut feed).await.len(), 1);

        f.tasks.emit(&u1, Err(DataError::Unavailable("offline".to_string())));
        f.tasks.wait_until_inactive().await;

        assert_eq!(f.coordinator.binding(), Binding::Bound(u1));
        assert_eq!(f.coordinator.latest_tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_query_end_keeps_binding_and_last_set() {
        let f = setup();
        let u1 = UserId::from("u1");
        let mut feed = f.coordinator.tasks();
        assert_eq!(next_within(&mut feed).await, vec![]);

        f.session.set(Session::Authenticated(u1.clone()));
        wait_for_binding(&f.coordinator, Binding::Bound(u1.clone())).await;
        let milk = task("t1", "buy milk", "u1");
        f.tasks.emit(&u1, Ok(vec![milk.clone()]));
        assert_eq!(next_within(&mut feed).await, vec![milk.clone()]);

        f.tasks.end(&u1);
        f.tasks.wait_until_inactive().await;

        assert_eq!(f.coordinator.binding(), Binding::Bound(u1));
        assert_eq!(f.coordinator.latest_tasks(), vec![milk]);

        f.session.set(Session::Anonymous);
        assert_eq!(next_within(&mut feed).await, vec![]);
        wait_for_binding(&f.coordinator, Binding::Idle).await;
    }

    #[tokio::test]
    async fn test_create_task_while_anonymous_fails_without_write() {
        let f = setup();

        let result = f.coordinator.create_task(Task::new("buy milk")).await;

        assert_eq!(result, Err(TaskError::Unauthenticated));
        assert!(f.tasks.created().is_empty());
    }

    #[tokio::test]
    async fn test_create_task_stamps_current_owner() {
        let f = setup();
        f.session.set(Session::authenticated("u1"));

        let mut draft = Task::new("buy milk");
        draft.owner = Some(UserId::from("someone-else"));
        draft.id = Some("bogus".to_string());
        let id = f.coordinator.create_task(draft).await.unwrap();

        let created = f.tasks.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].owner, Some(UserId::from("u1")));
        assert_eq!(created[0].id, None);
        assert_eq!(id, "task-1");
    }

    #[tokio::test]
    async fn test_mutation_failures_reach_the_caller() {
        let f = setup();
        f.session.set(Session::authenticated("u1"));
        f.tasks.fail_writes_with(DataError::PermissionDenied);

        assert_eq!(
            f.coordinator.create_task(Task::new("x")).await,
            Err(TaskError::Data(DataError::PermissionDenied))
        );
        assert_eq!(
            f.coordinator.update_task("t1", TaskPatch::completed(true)).await,
            Err(TaskError::Data(DataError::PermissionDenied))
        );
        assert_eq!(
            f.coordinator.delete_task("t1").await,
            Err(TaskError::Data(DataError::PermissionDenied))
        );
    }

    #[tokio::test]
    async fn test_update_and_delete_pass_through() {
        let f = setup();

        f.coordinator.update_task("t1", TaskPatch::content("buy oat milk")).await.unwrap();
        f.coordinator.delete_task("t2").await.unwrap();

        assert_eq!(
            f.tasks.updated(),
            vec![("t1".to_string(), TaskPatch::content("buy oat milk"))]
        );
        assert_eq!(f.tasks.deleted(), vec!["t2".to_string()]);
    }

    #[tokio::test]
    async fn test_session_stream_end_clears_feed_and_stops() {
        let f = setup();
        let u1 = UserId::from("u1");
        f.session.set(Session::Authenticated(u1.clone()));
        wait_for_binding(&f.coordinator, Binding::Bound(u1.clone())).await;
        f.tasks.emit(&u1, Ok(vec![task("t1", "buy milk", "u1")]));

        f.session.close();
        wait_for_binding(&f.coordinator, Binding::Idle).await;

        assert!(f.coordinator.latest_tasks().is_empty());
        assert_eq!(f.tasks.active_queries(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_live_query() {
        let f = setup();
        f.session.set(Session::authenticated("u1"));
        wait_for_binding(&f.coordinator, Binding::Bound(UserId::from("u1"))).await;
        assert_eq!(f.tasks.active_queries(), 1);

        f.coordinator.shutdown().await;

        assert_eq!(f.tasks.active_queries(), 0);
    }
}
