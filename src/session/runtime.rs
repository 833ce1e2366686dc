// src/session/runtime.rs

//! Drives each signed-in user's [`Workspace`]: serializes events per user,
//! runs the countdown and carries out the effects of every transition.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tokio::{
    sync::{Mutex as AsyncMutex, OwnedMutexGuard},
    task::JoinHandle,
};

use crate::{
    error::AppError,
    generation::{self, FollowUpChat, Generator, chat::ChatTurn},
    models::user::UserProfile,
    session::{
        machine::{Effect, Event, Workspace, WorkspaceView},
        snapshot::SnapshotStore,
    },
    store::Store,
};

const TICK: Duration = Duration::from_secs(1);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// One user's workspace plus the resources tied to it.
#[derive(Default)]
pub struct ActiveSession {
    initialized: bool,
    workspace: Workspace,
    ticker: Option<JoinHandle<()>>,
    /// Follow-up chats by question id, for `chat_session` only.
    chats: HashMap<String, FollowUpChat>,
    chat_session: Option<String>,
}

type SessionHandle = Arc<AsyncMutex<ActiveSession>>;

struct RegistryEntry {
    handle: SessionHandle,
    last_seen: Instant,
}

impl RegistryEntry {
    /// Nobody else holds the handle (no request, ticker or generation in
    /// flight), so dropping it loses nothing the store and snapshot lack.
    fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.last_seen) >= timeout && Arc::strong_count(&self.handle) == 1
    }
}

/// Which task is executing effects. The ticker must not abort itself.
#[derive(Clone, Copy, PartialEq)]
enum Origin {
    Request,
    Ticker,
}

#[derive(Clone)]
pub struct SessionRuntime {
    store: Arc<dyn Store>,
    generator: Arc<dyn Generator>,
    snapshots: SnapshotStore,
    sessions: Arc<Mutex<HashMap<i64, RegistryEntry>>>,
    idle_timeout: Duration,
}

impl SessionRuntime {
    pub fn new(store: Arc<dyn Store>, generator: Arc<dyn Generator>, snapshots: SnapshotStore) -> Self {
        Self {
            store,
            generator,
            snapshots,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Workspaces untouched for this long are dropped from memory and
    /// reloaded from the store and snapshot on the next request.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    fn registry(&self) -> Result<std::sync::MutexGuard<'_, HashMap<i64, RegistryEntry>>, AppError> {
        self.sessions
            .lock()
            .map_err(|_| AppError::InternalServerError("session registry poisoned".to_string()))
    }

    /// Locks the user's session, creating and loading it on first use.
    async fn acquire(&self, user_id: i64) -> Result<(SessionHandle, OwnedMutexGuard<ActiveSession>), AppError> {
        let handle = {
            let now = Instant::now();
            let mut registry = self.registry()?;

            let before = registry.len();
            registry.retain(|id, entry| *id == user_id || !entry.is_idle(now, self.idle_timeout));
            if registry.len() < before {
                tracing::info!("Evicted {} idle sessions", before - registry.len());
            }

            let entry = registry.entry(user_id).or_insert_with(|| RegistryEntry {
                handle: Arc::new(AsyncMutex::new(ActiveSession::default())),
                last_seen: now,
            });
            entry.last_seen = now;
            entry.handle.clone()
        };

        let mut guard = handle.clone().lock_owned().await;
        if !guard.initialized {
            self.initialize(user_id, &mut guard).await?;
        }
        Ok((handle, guard))
    }

    async fn initialize(&self, user_id: i64, session: &mut ActiveSession) -> Result<(), AppError> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::AuthError("User not found".to_string()))?;

        let history = self.store.list_history(user_id).await?;
        let saved = self.store.list_saved_tests(user_id).await?;
        let snapshot = self.snapshots.load(user_id).await.unwrap_or_else(|e| {
            tracing::warn!("Could not read snapshot for user {}: {}", user_id, e);
            None
        });

        let workspace = &mut session.workspace;
        workspace.apply(Event::SignedIn(user.profile()))?;
        workspace.apply(Event::HistoryLoaded(history))?;
        workspace.apply(Event::SavedTestsLoaded(saved))?;
        if let Some(snapshot) = snapshot {
            workspace.apply(Event::SnapshotFound(snapshot))?;
        }

        session.initialized = true;
        tracing::info!("Session loaded for user {}", user_id);
        Ok(())
    }

    pub async fn view(&self, user_id: i64) -> Result<WorkspaceView, AppError> {
        let (_, guard) = self.acquire(user_id).await?;
        Ok(guard.workspace.view())
    }

    /// Applies one event and runs everything it triggers. The returned view
    /// reflects the workspace after all effects.
    pub async fn dispatch(&self, user_id: i64, event: Event) -> Result<WorkspaceView, AppError> {
        let (handle, mut guard) = self.acquire(user_id).await?;
        tracing::debug!("User {} event: {}", user_id, event.name());

        let effects = guard.workspace.apply(event)?;
        let (guard, failure) = self
            .run_effects(user_id, &handle, guard, effects, Origin::Request)
            .await;

        match failure {
            Some(err) => Err(err),
            None => Ok(guard.workspace.view()),
        }
    }

    /// Forgets the user's workspace and stops its timer. The snapshot stays.
    pub async fn sign_out(&self, user_id: i64) -> Result<(), AppError> {
        let handle = self.registry()?.remove(&user_id).map(|entry| entry.handle);
        if let Some(handle) = handle {
            let mut guard = handle.lock().await;
            if let Some(ticker) = guard.ticker.take() {
                ticker.abort();
            }
            guard.workspace.apply(Event::SignedOut)?;
            guard.chats.clear();
        }
        tracing::info!("User {} signed out", user_id);
        Ok(())
    }

    /// Pushes an edited profile into a loaded workspace.
    pub async fn update_user(&self, profile: UserProfile) -> Result<(), AppError> {
        let handle = self.registry()?.get(&profile.id).map(|entry| entry.handle.clone());
        if let Some(handle) = handle {
            let mut guard = handle.lock().await;
            if guard.initialized {
                guard.workspace.apply(Event::ProfileUpdated(profile))?;
            }
        }
        Ok(())
    }

    /// Replaces the cached history after it was changed outside a transition.
    pub async fn reload_history(&self, user_id: i64) -> Result<(), AppError> {
        let history = self.store.list_history(user_id).await?;
        self.dispatch(user_id, Event::HistoryLoaded(history)).await?;
        Ok(())
    }

    /// Explanation for a question under review, generated once and kept on
    /// the review draft.
    pub async fn explain(&self, user_id: i64, index: usize) -> Result<String, AppError> {
        let (handle, guard) = self.acquire(user_id).await?;
        let question = guard.workspace.review_question(index)?.clone();
        if let Some(explanation) = question.explanation.clone() {
            return Ok(explanation);
        }
        drop(guard);

        let explanation = self.generator.explain(&question).await.map_err(|e| {
            tracing::error!("Explanation failed for {}: {}", question.id, e);
            AppError::BadRequest(format!("Failed to generate explanation: {}", e))
        })?;

        let mut guard = handle.lock().await;
        // The draft may be gone (or replaced) by the time the reply arrives.
        let still_reviewing = guard
            .workspace
            .review_question(index)
            .is_ok_and(|q| q.id == question.id);
        if still_reviewing {
            guard.workspace.apply(Event::SetExplanation {
                index,
                text: explanation.clone(),
            })?;
        }
        Ok(explanation)
    }

    /// Sends a follow-up message about a reviewed question and returns the
    /// visible conversation.
    pub async fn chat(&self, user_id: i64, index: usize, message: String) -> Result<Vec<ChatTurn>, AppError> {
        let (handle, mut guard) = self.acquire(user_id).await?;
        let question = guard.workspace.review_question(index)?.clone();

        let session_id = guard.workspace.view().session_id;
        if guard.chat_session != session_id {
            guard.chats.clear();
            guard.chat_session = session_id;
        }
        let chat = guard
            .chats
            .entry(question.id.clone())
            .or_insert_with(|| FollowUpChat::new(&question, question.explanation.as_deref()))
            .clone();
        drop(guard);

        let reply = self.generator.follow_up(&chat, &message).await.map_err(|e| {
            tracing::error!("Follow-up chat failed for {}: {}", question.id, e);
            AppError::from(e)
        })?;

        let mut guard = handle.lock().await;
        let chat = guard
            .chats
            .entry(question.id.clone())
            .or_insert(chat);
        chat.record_exchange(&message, &reply);
        Ok(chat.turns().to_vec())
    }

    async fn run_effects(
        &self,
        user_id: i64,
        handle: &SessionHandle,
        mut guard: OwnedMutexGuard<ActiveSession>,
        effects: Vec<Effect>,
        origin: Origin,
    ) -> (OwnedMutexGuard<ActiveSession>, Option<AppError>) {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut failure: Option<AppError> = None;

        while let Some(effect) = queue.pop_front() {
            let follow_up = match effect {
                Effect::StartTimer => {
                    if let Some(previous) = guard.ticker.take() {
                        previous.abort();
                    }
                    guard.ticker = Some(self.spawn_ticker(user_id, handle.clone()));
                    None
                }

                Effect::StopTimer => {
                    if let Some(ticker) = guard.ticker.take() {
                        if origin == Origin::Request {
                            ticker.abort();
                        }
                    }
                    None
                }

                Effect::Generate { ticket, config } => {
                    drop(guard);
                    tracing::info!("Generating questions for user {} ({})", user_id, config.input_method);
                    let result = generation::generate_for_config(self.generator.as_ref(), &config).await;
                    guard = handle.clone().lock_owned().await;

                    if !guard.workspace.awaits_generation(ticket) {
                        tracing::info!("Discarding generation {} for user {}: superseded", ticket, user_id);
                        continue;
                    }
                    match result {
                        Ok(questions) => {
                            tracing::info!("Generated {} questions for user {}", questions.len(), user_id);
                            Some(Event::GenerationSucceeded { ticket, questions })
                        }
                        Err(message) => {
                            tracing::warn!("Generation failed for user {}: {}", user_id, message);
                            failure.get_or_insert(AppError::BadRequest(message.clone()));
                            Some(Event::GenerationFailed { ticket, message })
                        }
                    }
                }

                Effect::MirrorSnapshot(snapshot) => {
                    if let Err(e) = self.snapshots.save(user_id, &snapshot).await {
                        tracing::warn!("Failed to mirror test for user {}: {}", user_id, e);
                    }
                    None
                }

                Effect::ClearSnapshot => {
                    if let Err(e) = self.snapshots.clear(user_id).await {
                        tracing::warn!("Failed to clear snapshot for user {}: {}", user_id, e);
                    }
                    None
                }

                Effect::PersistResult(record) => {
                    let session_id = record.session_id.clone();
                    match self.store.save_session(user_id, record).await {
                        Ok(_) => {
                            tracing::info!("Saved session {} for user {}", session_id, user_id);
                            queue.push_front(Effect::RefreshHistory);
                        }
                        Err(e) => {
                            tracing::error!("Failed to save session {}: {}", session_id, e);
                            failure.get_or_insert(e);
                        }
                    }
                    None
                }

                Effect::RefreshHistory => match self.store.list_history(user_id).await {
                    Ok(history) => Some(Event::HistoryLoaded(history)),
                    Err(e) => {
                        failure.get_or_insert(e);
                        None
                    }
                },

                Effect::StoreSavedTest(saved) => match self.store.save_test(user_id, &saved).await {
                    Ok(()) => Some(Event::SavedTestStored(saved)),
                    Err(e) => {
                        failure.get_or_insert(e);
                        None
                    }
                },

                Effect::DeleteSavedTest(id) => {
                    if let Err(e) = self.store.delete_saved_test(user_id, &id).await {
                        tracing::error!("Failed to delete saved test {}: {}", id, e);
                        failure.get_or_insert(e);
                    }
                    None
                }

                Effect::RefreshSavedTests => match self.store.list_saved_tests(user_id).await {
                    Ok(saved) => Some(Event::SavedTestsLoaded(saved)),
                    Err(e) => {
                        failure.get_or_insert(e);
                        None
                    }
                },
            };

            if let Some(event) = follow_up {
                match guard.workspace.apply(event) {
                    Ok(more) => queue.extend(more),
                    Err(e) => {
                        tracing::warn!("Discarded follow-up event for user {}: {}", user_id, e);
                        failure.get_or_insert(e.into());
                    }
                }
            }
        }

        (guard, failure)
    }

    fn spawn_ticker(&self, user_id: i64, handle: SessionHandle) -> JoinHandle<()> {
        let runtime = self.clone();
        tokio::spawn(async move { runtime.tick_loop(user_id, handle).await })
    }

    async fn tick_loop(self, user_id: i64, handle: SessionHandle) {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + TICK, TICK);
        loop {
            interval.tick().await;

            let mut guard = handle.clone().lock_owned().await;
            let effects = match guard.workspace.apply(Event::Tick) {
                Ok(effects) => effects,
                Err(e) => {
                    tracing::warn!("Tick rejected for user {}: {}", user_id, e);
                    Vec::new()
                }
            };
            let (guard, failure) = Box::pin(self.run_effects(user_id, &handle, guard, effects, Origin::Ticker)).await;
            if let Some(e) = failure {
                tracing::error!("Timer effects failed for user {}: {}", user_id, e);
            }
            if guard.ticker.is_none() {
                tracing::debug!("Timer stopped for user {}", user_id);
                break;
            }
        }
    }
}
