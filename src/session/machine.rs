// src/session/machine.rs

//! The per-user test workspace and its transition function.
//!
//! `Workspace::apply` is the only way to change a workspace. It never performs
//! I/O: timers, persistence, snapshot mirroring and generation calls are
//! returned as [`Effect`]s for the runtime to execute.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    models::{
        history::{HistoryEntry, InProgressSnapshot, SavedTest, SessionRecord},
        question::{PublicQuestion, Question, QuestionStatus},
        test_config::{
            ConfigRequest, InputMethod, Language, NegativeMarking, TestConfig, TimeSettings,
        },
        user::UserProfile,
    },
    scoring::{self, ScoreSummary},
    session::{error::SessionError, phase::Phase},
};

const RETAKE_SEPARATOR: &str = " - Retake ";
const UNTITLED_TEST: &str = "Untitled Test";

/// Something the user (or the clock, or an adapter reply) did.
#[derive(Debug, Clone)]
pub enum Event {
    SignedIn(UserProfile),
    SignedOut,
    ProfileUpdated(UserProfile),

    ChooseMethod(InputMethod),
    SubmitConfig(ConfigRequest),
    LeaveSetup,
    /// Reply to the `Generate` effect carrying the same ticket.
    GenerationSucceeded { ticket: u64, questions: Vec<Question> },
    GenerationFailed { ticket: u64, message: String },
    EditSettings,
    StartTest { test_name: Option<String> },

    SelectOption { index: usize, option: usize },
    EnterText { index: usize, text: String },
    ClearSelection(usize),
    ToggleReviewMark(usize),
    Navigate(usize),
    Tick,
    Submit,
    SaveAndExit,
    SavedTestStored(SavedTest),

    SnapshotFound(InProgressSnapshot),
    ResumeSnapshot,
    DiscardSnapshot,
    ResumeSaved(String),

    EnterReview,
    CorrectOption { index: usize, option: usize },
    CorrectText { index: usize, text: String },
    SetExplanation { index: usize, text: String },
    BackToResults,
    ApplyCorrections,

    OpenHistory,
    OpenProfile,
    OpenLeaderboard,
    ViewHistoryDetails(String),
    ViewHistoryScore(String),
    BackToHistory,
    Retake(String),
    GoHome,
    StartNew,

    HistoryLoaded(Vec<HistoryEntry>),
    SavedTestsLoaded(Vec<SavedTest>),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::SignedIn(_) => "sign in",
            Event::SignedOut => "sign out",
            Event::ProfileUpdated(_) => "update the profile",
            Event::ChooseMethod(_) => "choose an input method",
            Event::SubmitConfig(_) => "submit a configuration",
            Event::LeaveSetup => "leave setup",
            Event::GenerationSucceeded { .. } => "accept generated questions",
            Event::GenerationFailed { .. } => "report a generation failure",
            Event::EditSettings => "edit settings",
            Event::StartTest { .. } => "start the test",
            Event::SelectOption { .. } => "select an option",
            Event::EnterText { .. } => "enter an answer",
            Event::ClearSelection(_) => "clear a selection",
            Event::ToggleReviewMark(_) => "mark a question for review",
            Event::Navigate(_) => "navigate between questions",
            Event::Tick => "tick the timer",
            Event::Submit => "submit the test",
            Event::SaveAndExit => "save and exit",
            Event::SavedTestStored(_) => "confirm a saved test",
            Event::SnapshotFound(_) => "offer a resumable test",
            Event::ResumeSnapshot => "resume the test",
            Event::DiscardSnapshot => "discard the in-progress test",
            Event::ResumeSaved(_) => "resume a saved test",
            Event::EnterReview => "review answers",
            Event::CorrectOption { .. } | Event::CorrectText { .. } => "correct an answer",
            Event::SetExplanation { .. } => "attach an explanation",
            Event::BackToResults => "go back to results",
            Event::ApplyCorrections => "apply corrections",
            Event::OpenHistory => "open history",
            Event::OpenProfile => "open the profile",
            Event::OpenLeaderboard => "open the leaderboard",
            Event::ViewHistoryDetails(_) => "view history details",
            Event::ViewHistoryScore(_) => "view a past score",
            Event::BackToHistory => "go back to history",
            Event::Retake(_) => "retake a test",
            Event::GoHome => "go home",
            Event::StartNew => "start a new test",
            Event::HistoryLoaded(_) => "load history",
            Event::SavedTestsLoaded(_) => "load saved tests",
        }
    }
}

/// Work the runtime must carry out after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartTimer,
    StopTimer,
    /// Produce questions for this configuration. Only the reply carrying
    /// the latest ticket is accepted.
    Generate { ticket: u64, config: TestConfig },
    MirrorSnapshot(InProgressSnapshot),
    ClearSnapshot,
    /// Insert or update the history entry keyed by the session id.
    PersistResult(SessionRecord),
    RefreshHistory,
    StoreSavedTest(SavedTest),
    DeleteSavedTest(String),
    RefreshSavedTests,
}

/// All test-taking state of one signed-in user.
#[derive(Debug, Default)]
pub struct Workspace {
    phase: Phase,
    user: Option<UserProfile>,
    error: Option<String>,

    input_method: Option<InputMethod>,
    config: Option<TestConfig>,
    test_name: String,
    questions: Vec<Question>,
    current_index: usize,
    /// `None` means unlimited.
    time_remaining: Option<u32>,
    test_duration: Option<u32>,
    session_id: Option<String>,
    retake_mode: bool,
    /// Bumped whenever a different attempt starts running.
    attempt: u64,
    /// Ticket of the most recent `Generate` effect.
    generation: u64,

    last_score: Option<ScoreSummary>,
    review_draft: Option<Vec<Question>>,
    viewing_from_history: bool,
    viewing_entry: Option<HistoryEntry>,

    pending_snapshot: Option<InProgressSnapshot>,
    history: Vec<HistoryEntry>,
    saved_tests: Vec<SavedTest>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn saved_tests(&self) -> &[SavedTest] {
        &self.saved_tests
    }

    /// True while a reply for this generation ticket would still be used.
    pub fn awaits_generation(&self, ticket: u64) -> bool {
        self.phase == Phase::Generating && self.generation == ticket
    }

    /// Question as currently shown in review (including pending corrections).
    pub fn review_question(&self, index: usize) -> Result<&Question, SessionError> {
        let draft = match (&self.review_draft, self.phase) {
            (Some(draft), Phase::Review) => draft,
            _ => {
                return Err(SessionError::InvalidTransition {
                    phase: self.phase,
                    event: "look up a review question",
                });
            }
        };
        draft.get(index).ok_or(SessionError::QuestionOutOfRange {
            index,
            len: draft.len(),
        })
    }

    /// Applies one event and returns the side effects it requires.
    pub fn apply(&mut self, event: Event) -> Result<Vec<Effect>, SessionError> {
        if matches!(event, Event::Tick) && !self.tick() {
            return Ok(Vec::new());
        }

        let was_running = self.phase == Phase::InProgress;
        let attempt = self.attempt;
        let mut effects = self.transition(event)?;

        if self.phase == Phase::InProgress && self.time_is_up() {
            effects.extend(self.submit(false));
        }

        let running = self.phase == Phase::InProgress;
        // Swapping one running test for another restarts the clock.
        let swapped = was_running && running && self.attempt != attempt;
        if (was_running && !running) || swapped {
            effects.insert(0, Effect::StopTimer);
        }
        if running {
            if (!was_running || swapped) && self.countdown_active() {
                effects.push(Effect::StartTimer);
            }
            if let Some(snapshot) = self.snapshot() {
                self.pending_snapshot = Some(snapshot.clone());
                effects.push(Effect::MirrorSnapshot(snapshot));
            }
        }

        Ok(effects)
    }

    /// Removes one second from a running countdown. Returns false when the
    /// tick does not apply (wrong phase, untimed, or already at zero).
    fn tick(&mut self) -> bool {
        if self.phase != Phase::InProgress {
            return false;
        }
        match self.time_remaining {
            Some(remaining) if remaining > 0 => {
                self.time_remaining = Some(remaining - 1);
                true
            }
            _ => false,
        }
    }

    fn countdown_active(&self) -> bool {
        matches!(self.time_remaining, Some(remaining) if remaining > 0)
    }

    fn time_is_up(&self) -> bool {
        self.time_remaining == Some(0) && matches!(self.test_duration, Some(total) if total > 0)
    }

    fn transition(&mut self, event: Event) -> Result<Vec<Effect>, SessionError> {
        let name = event.name();

        match event {
            Event::SignedIn(profile) => {
                self.user = Some(profile);
                self.phase = Phase::Home;
                Ok(Vec::new())
            }
            // The mirror stays on disk so the test can be resumed after signing in again.
            Event::SignedOut => {
                *self = Workspace::default();
                Ok(Vec::new())
            }
            Event::HistoryLoaded(entries) => {
                self.history = entries;
                Ok(Vec::new())
            }
            Event::SavedTestsLoaded(saved) => {
                self.saved_tests = saved;
                Ok(Vec::new())
            }
            Event::SnapshotFound(snapshot) => {
                self.pending_snapshot = Some(snapshot);
                Ok(Vec::new())
            }
            // Already applied by `tick`; only expiry handling remains.
            Event::Tick => Ok(Vec::new()),
            event => {
                self.require_user(name)?;
                self.authenticated_transition(event, name)
            }
        }
    }

    fn authenticated_transition(
        &mut self,
        event: Event,
        name: &'static str,
    ) -> Result<Vec<Effect>, SessionError> {
        match event {
            Event::ProfileUpdated(profile) => {
                self.user = Some(profile);
                Ok(Vec::new())
            }

            Event::ChooseMethod(method) => {
                let same_setup = self.phase == Phase::Setup
                    && self.config.as_ref().map(|c| c.input_method) == Some(method);
                if !same_setup || self.retake_mode {
                    self.config = None;
                    self.session_id = None;
                }
                self.input_method = Some(method);
                self.retake_mode = false;
                self.error = None;
                self.phase = Phase::Setup;
                Ok(Vec::new())
            }

            Event::SubmitConfig(request) => {
                self.require_phase(Phase::Setup, name)?;
                self.submit_config(request)
            }

            Event::LeaveSetup => {
                self.require_phase(Phase::Setup, name)?;
                self.error = None;
                self.config = None;
                self.questions.clear();
                self.retake_mode = false;
                self.phase = Phase::Home;
                Ok(Vec::new())
            }

            Event::GenerationSucceeded { ticket, questions } => {
                self.require_phase(Phase::Generating, name)?;
                if ticket != self.generation {
                    tracing::debug!("Ignoring questions from superseded generation {}", ticket);
                    return Ok(Vec::new());
                }
                if questions.is_empty() {
                    let msg = "No questions were generated. Please check your input, selected \
                               language, difficulty, or try different settings."
                        .to_string();
                    self.error = Some(msg.clone());
                    self.phase = Phase::Setup;
                    return Err(SessionError::Generation(msg));
                }
                self.questions = questions;
                self.prepare_attempt();
                self.phase = Phase::Confirmation;
                Ok(Vec::new())
            }

            Event::GenerationFailed { ticket, message } => {
                self.require_phase(Phase::Generating, name)?;
                if ticket != self.generation {
                    tracing::debug!("Ignoring failure from superseded generation {}", ticket);
                    return Ok(Vec::new());
                }
                self.error = Some(message);
                self.phase = Phase::Setup;
                Ok(Vec::new())
            }

            Event::EditSettings => {
                self.require_phase(Phase::Confirmation, name)?;
                self.error = None;
                self.phase = Phase::Setup;
                Ok(Vec::new())
            }

            Event::StartTest { test_name } => {
                self.require_phase(Phase::Confirmation, name)?;
                self.start_test(test_name)
            }

            Event::SelectOption { index, option } => {
                self.require_phase(Phase::InProgress, name)?;
                self.question_mut(index)?.choose_option(option)?;
                Ok(Vec::new())
            }

            Event::EnterText { index, text } => {
                self.require_phase(Phase::InProgress, name)?;
                self.question_mut(index)?.enter_text(&text)?;
                Ok(Vec::new())
            }

            Event::ClearSelection(index) => {
                self.require_phase(Phase::InProgress, name)?;
                self.question_mut(index)?.clear_answer();
                Ok(Vec::new())
            }

            Event::ToggleReviewMark(index) => {
                self.require_phase(Phase::InProgress, name)?;
                let question = self.question_mut(index)?;
                question.is_marked_for_review = !question.is_marked_for_review;
                Ok(Vec::new())
            }

            Event::Navigate(index) => {
                self.require_phase(Phase::InProgress, name)?;
                self.question_mut(index)?;
                let current = self.current_index;
                if current != index {
                    if let Some(question) = self.questions.get_mut(current) {
                        if question.status == QuestionStatus::Unvisited {
                            question.status = QuestionStatus::Skipped;
                        }
                    }
                }
                self.current_index = index;
                Ok(Vec::new())
            }

            Event::Submit => {
                self.require_phase(Phase::InProgress, name)?;
                Ok(self.submit(false))
            }

            Event::SaveAndExit => {
                self.require_phase(Phase::InProgress, name)?;
                match (&self.config, &self.session_id) {
                    (Some(config), Some(session_id)) => {
                        let saved = SavedTest {
                            id: Uuid::new_v4().to_string(),
                            questions: self.questions.clone(),
                            current_question_index: self.current_index,
                            time_remaining_seconds: self.time_remaining,
                            test_duration_seconds: self.test_duration,
                            config: config.clone(),
                            session_id: session_id.clone(),
                            saved_at: chrono::Utc::now(),
                        };
                        Ok(vec![Effect::StoreSavedTest(saved)])
                    }
                    _ => {
                        self.phase = Phase::Home;
                        Ok(Vec::new())
                    }
                }
            }

            Event::SavedTestStored(saved) => {
                self.require_phase(Phase::InProgress, name)?;
                self.saved_tests.insert(0, saved);
                self.pending_snapshot = None;
                self.phase = Phase::Home;
                Ok(vec![Effect::ClearSnapshot])
            }

            Event::ResumeSnapshot => {
                let snapshot = self
                    .pending_snapshot
                    .clone()
                    .ok_or_else(|| SessionError::NotFound("No test to resume".to_string()))?;
                self.restore(
                    snapshot.questions,
                    snapshot.current_question_index,
                    snapshot.time_remaining_seconds,
                    snapshot.test_duration_seconds,
                    snapshot.config,
                    snapshot.session_id,
                );
                Ok(vec![Effect::ClearSnapshot])
            }

            Event::DiscardSnapshot => {
                if self.phase == Phase::InProgress {
                    return Err(SessionError::InvalidTransition {
                        phase: self.phase,
                        event: name,
                    });
                }
                self.pending_snapshot = None;
                Ok(vec![Effect::ClearSnapshot])
            }

            Event::ResumeSaved(id) => {
                let saved = self
                    .saved_tests
                    .iter()
                    .find(|s| s.id == id)
                    .cloned()
                    .ok_or_else(|| SessionError::NotFound(format!("Saved test {} not found", id)))?;
                self.restore(
                    saved.questions,
                    saved.current_question_index,
                    saved.time_remaining_seconds,
                    saved.test_duration_seconds,
                    saved.config,
                    saved.session_id,
                );
                self.saved_tests.retain(|s| s.id != saved.id);
                Ok(vec![Effect::DeleteSavedTest(saved.id), Effect::RefreshSavedTests])
            }

            Event::EnterReview => {
                self.require_phase(Phase::Completed, name)?;
                self.review_draft = Some(self.questions.clone());
                self.phase = Phase::Review;
                Ok(Vec::new())
            }

            Event::CorrectOption { index, option } => {
                self.require_phase(Phase::Review, name)?;
                self.draft_question_mut(index)?.correct_option(option)?;
                Ok(Vec::new())
            }

            Event::CorrectText { index, text } => {
                self.require_phase(Phase::Review, name)?;
                self.draft_question_mut(index)?.correct_text(&text)?;
                Ok(Vec::new())
            }

            Event::SetExplanation { index, text } => {
                self.require_phase(Phase::Review, name)?;
                self.draft_question_mut(index)?.explanation = Some(text);
                Ok(Vec::new())
            }

            Event::BackToResults => {
                self.require_phase(Phase::Review, name)?;
                self.review_draft = None;
                self.phase = Phase::Completed;
                Ok(Vec::new())
            }

            Event::ApplyCorrections => {
                self.require_phase(Phase::Review, name)?;
                if let Some(draft) = self.review_draft.take() {
                    self.questions = draft;
                }
                Ok(self.submit(true))
            }

            Event::OpenHistory => {
                self.error = None;
                self.retake_mode = false;
                self.phase = Phase::History;
                Ok(Vec::new())
            }

            Event::OpenProfile => {
                self.phase = Phase::Profile;
                Ok(Vec::new())
            }

            Event::OpenLeaderboard => {
                self.phase = Phase::Leaderboard;
                Ok(Vec::new())
            }

            Event::ViewHistoryDetails(id) => {
                let entry = self.history_entry(&id)?.clone();
                self.viewing_entry = Some(entry);
                self.phase = Phase::ViewHistoryDetails;
                Ok(Vec::new())
            }

            Event::ViewHistoryScore(id) => {
                let entry = self.history_entry(&id)?.clone();
                self.last_score = Some(scoring::score(&entry.questions, &entry.negative_marking));
                self.input_method = Some(entry.original_config.input_method);
                self.questions = entry.questions;
                self.config = Some(entry.original_config);
                self.test_name = entry.test_name;
                self.session_id = Some(entry.id);
                self.review_draft = None;
                self.viewing_from_history = true;
                self.phase = Phase::Completed;
                Ok(Vec::new())
            }

            Event::BackToHistory => {
                let allowed = self.phase == Phase::ViewHistoryDetails
                    || (self.phase == Phase::Completed && self.viewing_from_history);
                if !allowed {
                    return Err(SessionError::InvalidTransition {
                        phase: self.phase,
                        event: name,
                    });
                }
                self.viewing_from_history = false;
                self.viewing_entry = None;
                self.phase = Phase::History;
                Ok(Vec::new())
            }

            Event::Retake(id) => {
                let entry = self.history_entry(&id)?.clone();
                let name = retake_name(&entry, &self.history);

                let mut config = entry.original_config;
                config.test_name = name.clone();

                self.input_method = Some(config.input_method);
                self.config = Some(config);
                self.test_name = name;
                self.questions = entry.questions;
                // Minted on start, so the original entry is never overwritten.
                self.session_id = None;
                self.retake_mode = true;
                self.viewing_from_history = false;
                self.viewing_entry = None;
                self.review_draft = None;
                self.last_score = None;
                self.error = None;
                self.phase = Phase::Setup;
                Ok(Vec::new())
            }

            Event::GoHome => {
                let effects = match self.phase {
                    Phase::Home | Phase::Profile | Phase::Leaderboard => Vec::new(),
                    _ => self.start_new(),
                };
                self.phase = Phase::Home;
                Ok(effects)
            }

            Event::StartNew => {
                let effects = self.start_new();
                self.phase = Phase::Home;
                Ok(effects)
            }

            // Handled before the authentication check.
            Event::SignedIn(_)
            | Event::SignedOut
            | Event::Tick
            | Event::SnapshotFound(_)
            | Event::HistoryLoaded(_)
            | Event::SavedTestsLoaded(_) => Ok(Vec::new()),
        }
    }

    fn submit_config(&mut self, request: ConfigRequest) -> Result<Vec<Effect>, SessionError> {
        let method = if self.retake_mode {
            self.config.as_ref().map(|c| c.input_method)
        } else {
            self.input_method
        };

        let Some(method) = method else {
            let msg = "No input method selected. Please go back to home.".to_string();
            self.error = Some(msg.clone());
            self.phase = Phase::Home;
            return Err(SessionError::Configuration(msg));
        };

        if request.input_method != method {
            return Err(SessionError::Configuration(format!(
                "This setup is for a {} test, not {}",
                method, request.input_method
            )));
        }

        let test_name = self
            .config
            .as_ref()
            .map(|c| c.test_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| {
                TestConfig::default_test_name(method, request.original_file_name.as_deref())
            });

        let new_config = TestConfig::from_request(request, test_name);

        // Skip the external call when the questions we already hold still fit.
        let reuse = !self.questions.is_empty()
            && (self.retake_mode
                || self
                    .config
                    .as_ref()
                    .is_some_and(|previous| previous.is_equivalent(&new_config)));

        self.test_name = new_config.test_name.clone();
        self.config = Some(new_config.clone());
        self.error = None;

        if reuse {
            self.prepare_attempt();
            self.phase = Phase::Confirmation;
            Ok(Vec::new())
        } else {
            self.generation += 1;
            self.phase = Phase::Generating;
            Ok(vec![Effect::Generate {
                ticket: self.generation,
                config: new_config,
            }])
        }
    }

    fn start_test(&mut self, test_name: Option<String>) -> Result<Vec<Effect>, SessionError> {
        if self.config.is_none() || self.questions.is_empty() {
            let msg = "No test configuration or generated questions found to confirm. \
                       Please start over."
                .to_string();
            self.error = Some(msg.clone());
            self.phase = Phase::Setup;
            return Err(SessionError::Configuration(msg));
        }

        if let Some(name) = test_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            self.test_name = name.clone();
            if let Some(config) = self.config.as_mut() {
                config.test_name = name;
            }
        }

        let has_corrections = self.questions.iter().any(|q| q.was_corrected_by_user);
        if self.session_id.is_none() || has_corrections || self.retake_mode {
            self.session_id = Some(Uuid::new_v4().to_string());
        }

        for question in &mut self.questions {
            question.was_corrected_by_user = false;
            question.is_marked_for_review = false;
        }

        self.last_score = None;
        self.review_draft = None;
        self.viewing_from_history = false;
        self.error = None;
        self.attempt += 1;
        self.phase = Phase::InProgress;
        Ok(Vec::new())
    }

    /// Finalizes the current questions: scores, asks for persistence, and
    /// moves to `Completed`. Used for submission, expiry and corrections.
    fn submit(&mut self, from_correction: bool) -> Vec<Effect> {
        for question in &mut self.questions {
            if question.status == QuestionStatus::Unvisited {
                question.status = QuestionStatus::Skipped;
            }
        }

        let marking = self
            .config
            .as_ref()
            .map(|c| c.negative_marking)
            .unwrap_or_default();
        let summary = scoring::score(&self.questions, &marking);
        self.last_score = Some(summary);

        let mut effects = Vec::new();
        if let Some(record) = self.session_record(&summary, from_correction) {
            effects.push(Effect::PersistResult(record));
        }
        effects.push(Effect::ClearSnapshot);

        self.pending_snapshot = None;
        self.review_draft = None;
        self.phase = Phase::Completed;
        effects
    }

    fn session_record(&self, summary: &ScoreSummary, from_correction: bool) -> Option<SessionRecord> {
        let config = self.config.as_ref()?;
        let session_id = self.session_id.as_ref()?;
        self.user.as_ref()?;
        if self.questions.is_empty() {
            return None;
        }

        let test_name = [self.test_name.as_str(), config.test_name.as_str()]
            .into_iter()
            .find(|n| !n.is_empty())
            .unwrap_or(UNTITLED_TEST)
            .to_string();

        let mut config = config.clone();
        config.test_name = test_name.clone();

        Some(SessionRecord {
            session_id: session_id.clone(),
            test_name,
            score_percentage: summary.percentage,
            total_questions: summary.total as i64,
            correct_answers: summary.correct as i64,
            attempted_questions: summary.attempted as i64,
            questions: self.questions.clone(),
            config,
            was_corrected_by_user: from_correction
                || self.questions.iter().any(|q| q.was_corrected_by_user),
        })
    }

    /// Clears the current test and the resumable mirror.
    fn start_new(&mut self) -> Vec<Effect> {
        self.questions.clear();
        self.current_index = 0;
        self.time_remaining = None;
        self.test_duration = None;
        self.error = None;
        self.input_method = None;
        self.config = None;
        self.test_name.clear();
        self.session_id = None;
        self.retake_mode = false;
        self.last_score = None;
        self.review_draft = None;
        self.viewing_entry = None;
        self.viewing_from_history = false;
        self.pending_snapshot = None;
        vec![Effect::ClearSnapshot]
    }

    /// Resets answers and the clock for a fresh attempt of the held questions.
    fn prepare_attempt(&mut self) {
        for question in &mut self.questions {
            question.reset_for_attempt();
        }
        self.current_index = 0;
        let total = self
            .config
            .as_ref()
            .and_then(|c| c.time_settings.total_seconds());
        self.test_duration = total;
        self.time_remaining = total;
    }

    fn restore(
        &mut self,
        questions: Vec<Question>,
        current_index: usize,
        time_remaining: Option<u32>,
        test_duration: Option<u32>,
        config: TestConfig,
        session_id: String,
    ) {
        self.current_index = current_index.min(questions.len().saturating_sub(1));
        self.questions = questions;
        self.time_remaining = time_remaining;
        self.test_duration = test_duration;
        self.input_method = Some(config.input_method);
        self.test_name = config.test_name.clone();
        self.config = Some(config);
        self.session_id = Some(session_id);
        self.retake_mode = false;
        self.last_score = None;
        self.review_draft = None;
        self.viewing_entry = None;
        self.viewing_from_history = false;
        self.error = None;
        self.attempt += 1;
        self.phase = Phase::InProgress;
    }

    fn snapshot(&self) -> Option<InProgressSnapshot> {
        if self.questions.is_empty() {
            return None;
        }
        Some(InProgressSnapshot {
            questions: self.questions.clone(),
            current_question_index: self.current_index,
            time_remaining_seconds: self.time_remaining,
            test_duration_seconds: self.test_duration,
            config: self.config.clone()?,
            session_id: self.session_id.clone()?,
        })
    }

    fn require_user(&self, event: &'static str) -> Result<(), SessionError> {
        if self.user.is_none() || self.phase == Phase::Auth {
            return Err(SessionError::InvalidTransition {
                phase: self.phase,
                event,
            });
        }
        Ok(())
    }

    fn require_phase(&self, phase: Phase, event: &'static str) -> Result<(), SessionError> {
        if self.phase != phase {
            return Err(SessionError::InvalidTransition {
                phase: self.phase,
                event,
            });
        }
        Ok(())
    }

    fn question_mut(&mut self, index: usize) -> Result<&mut Question, SessionError> {
        let len = self.questions.len();
        self.questions
            .get_mut(index)
            .ok_or(SessionError::QuestionOutOfRange { index, len })
    }

    fn draft_question_mut(&mut self, index: usize) -> Result<&mut Question, SessionError> {
        let draft = self.review_draft.get_or_insert_with(Vec::new);
        let len = draft.len();
        draft
            .get_mut(index)
            .ok_or(SessionError::QuestionOutOfRange { index, len })
    }

    fn history_entry(&self, id: &str) -> Result<&HistoryEntry, SessionError> {
        self.history
            .iter()
            .find(|h| h.id == id)
            .ok_or_else(|| SessionError::NotFound(format!("History entry {} not found", id)))
    }

    /// Serializable picture of the workspace for the client.
    pub fn view(&self) -> WorkspaceView {
        let questions = if self.phase == Phase::InProgress {
            self.questions.iter().map(Question::to_public).collect()
        } else {
            Vec::new()
        };

        let results = match self.phase {
            Phase::Completed => Some(self.questions.clone()),
            Phase::Review => self.review_draft.clone(),
            Phase::ViewHistoryDetails => self.viewing_entry.as_ref().map(|e| e.questions.clone()),
            _ => None,
        };

        let resume_banner = match (&self.pending_snapshot, self.phase) {
            (Some(snapshot), phase) if phase != Phase::InProgress => Some(ResumeBanner {
                test_name: if snapshot.config.test_name.is_empty() {
                    UNTITLED_TEST.to_string()
                } else {
                    snapshot.config.test_name.clone()
                },
                attempted: snapshot
                    .questions
                    .iter()
                    .filter(|q| q.status == QuestionStatus::Attempted)
                    .count(),
                total: snapshot.questions.len(),
                mode: match snapshot.config.time_settings {
                    TimeSettings::Timed { .. } => "Timed",
                    TimeSettings::Untimed => "Untimed",
                },
            }),
            _ => None,
        };

        WorkspaceView {
            phase: self.phase,
            user: self.user.clone(),
            error: self.error.clone(),
            input_method: self.input_method,
            config: self.config.as_ref().map(ConfigSummary::from),
            test_name: self.test_name.clone(),
            session_id: self.session_id.clone(),
            retake_mode: self.retake_mode,
            question_count: self.questions.len(),
            current_index: self.current_index,
            time_remaining_seconds: self.time_remaining,
            test_duration_seconds: self.test_duration,
            questions,
            results,
            score: self.last_score,
            viewing_from_history: self.viewing_from_history,
            resume_banner,
        }
    }
}

/// Base name of a test without its " - Retake N" suffix.
fn retake_base(name: &str) -> &str {
    name.split(RETAKE_SEPARATOR).next().unwrap_or(name)
}

/// `<base> - Retake <N>` where N counts the other attempts sharing the base name.
fn retake_name(entry: &HistoryEntry, history: &[HistoryEntry]) -> String {
    let base = retake_base(&entry.test_name);
    let previous = history
        .iter()
        .filter(|h| h.id != entry.id && retake_base(&h.original_config.test_name) == base)
        .count();
    format!("{}{}{}", base, RETAKE_SEPARATOR, previous + 1)
}

/// Client view of the configuration (the raw content is left out).
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub input_method: InputMethod,
    pub num_questions: Option<u32>,
    pub time_settings: TimeSettings,
    pub negative_marking: NegativeMarking,
    pub original_file_name: Option<String>,
    pub language: Option<Language>,
    pub difficulty: Option<u8>,
    pub custom_instructions: Option<String>,
    pub test_name: String,
    pub tita_enabled: bool,
}

impl From<&TestConfig> for ConfigSummary {
    fn from(config: &TestConfig) -> Self {
        Self {
            input_method: config.input_method,
            num_questions: config.num_questions,
            time_settings: config.time_settings,
            negative_marking: config.negative_marking,
            original_file_name: config.original_file_name.clone(),
            language: config.language,
            difficulty: config.difficulty,
            custom_instructions: config.custom_instructions.clone(),
            test_name: config.test_name.clone(),
            tita_enabled: config.tita_enabled,
        }
    }
}

/// Offer to resume a test found in the transient mirror.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeBanner {
    pub test_name: String,
    pub attempted: usize,
    pub total: usize,
    pub mode: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceView {
    pub phase: Phase,
    pub user: Option<UserProfile>,
    pub error: Option<String>,
    pub input_method: Option<InputMethod>,
    pub config: Option<ConfigSummary>,
    pub test_name: String,
    pub session_id: Option<String>,
    pub retake_mode: bool,
    pub question_count: usize,
    pub current_index: usize,
    pub time_remaining_seconds: Option<u32>,
    pub test_duration_seconds: Option<u32>,
    /// Mid-test questions, answer keys stripped.
    pub questions: Vec<PublicQuestion>,
    /// Full questions once the test is over (or the review draft).
    pub results: Option<Vec<Question>>,
    pub score: Option<ScoreSummary>,
    pub viewing_from_history: bool,
    pub resume_banner: Option<ResumeBanner>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::fixtures::{choice, text};

    fn profile() -> UserProfile {
        UserProfile {
            id: 7,
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            initials: "AL".into(),
        }
    }

    fn request(method: InputMethod) -> ConfigRequest {
        ConfigRequest {
            input_method: method,
            content: "Cell biology".into(),
            num_questions: Some(5),
            time_settings: TimeSettings::Timed { total_seconds: 3 },
            negative_marking: NegativeMarking::default(),
            mime_type: None,
            original_file_name: None,
            language: None,
            difficulty: Some(2),
            custom_instructions: None,
            tita_enabled: false,
        }
    }

    fn five_questions() -> Vec<Question> {
        (0..5).map(|i| choice(&i.to_string(), 0)).collect()
    }

    fn signed_in() -> Workspace {
        let mut ws = Workspace::new();
        ws.apply(Event::SignedIn(profile())).unwrap();
        ws
    }

    /// Signed in, configured and sitting on the confirmation screen.
    fn confirmed(req: ConfigRequest, questions: Vec<Question>) -> Workspace {
        let mut ws = signed_in();
        ws.apply(Event::ChooseMethod(req.input_method)).unwrap();
        let effects = ws.apply(Event::SubmitConfig(req)).unwrap();
        assert!(matches!(effects.as_slice(), [Effect::Generate { .. }]));
        assert_eq!(ws.phase(), Phase::Generating);
        generated(&mut ws, questions).unwrap();
        assert_eq!(ws.phase(), Phase::Confirmation);
        ws
    }

    /// Answers the outstanding `Generate` effect.
    fn generated(ws: &mut Workspace, questions: Vec<Question>) -> Result<Vec<Effect>, SessionError> {
        let ticket = ws.generation;
        ws.apply(Event::GenerationSucceeded { ticket, questions })
    }

    fn ticket_of(effects: &[Effect]) -> u64 {
        match effects {
            [Effect::Generate { ticket, .. }] => *ticket,
            other => panic!("expected a single Generate effect, got {:?}", other),
        }
    }

    fn saved_test(id: &str, remaining: Option<u32>) -> SavedTest {
        let mut config = crate::models::test_config::fixtures::topic_config("Saved");
        config.test_name = "Saved".to_string();
        SavedTest {
            id: id.to_string(),
            questions: vec![choice("s1", 0), choice("s2", 1)],
            current_question_index: 1,
            time_remaining_seconds: remaining,
            test_duration_seconds: remaining.map(|_| 60),
            config,
            session_id: format!("session-{}", id),
            saved_at: chrono::Utc::now(),
        }
    }

    fn running(req: ConfigRequest, questions: Vec<Question>) -> Workspace {
        let mut ws = confirmed(req, questions);
        ws.apply(Event::StartTest { test_name: None }).unwrap();
        ws
    }

    fn persisted(effects: &[Effect]) -> Option<&SessionRecord> {
        effects.iter().find_map(|e| match e {
            Effect::PersistResult(record) => Some(record),
            _ => None,
        })
    }

    fn history_entry(id: &str, name: &str) -> HistoryEntry {
        let mut config = crate::models::test_config::fixtures::topic_config(name);
        config.test_name = name.to_string();
        SessionRecord {
            session_id: id.to_string(),
            test_name: name.to_string(),
            score_percentage: 50.0,
            total_questions: 2,
            correct_answers: 1,
            attempted_questions: 2,
            questions: vec![choice("a", 0), choice("b", 1)],
            config,
            was_corrected_by_user: false,
        }
        .into_entry(chrono::Utc::now())
    }

    #[test]
    fn test_auth_gate_blocks_everything_before_sign_in() {
        let mut ws = Workspace::new();
        let err = ws.apply(Event::ChooseMethod(InputMethod::Topic)).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                phase: Phase::Auth,
                ..
            }
        ));
        // Ticks are ignored rather than rejected.
        assert!(ws.apply(Event::Tick).unwrap().is_empty());
    }

    #[test]
    fn test_happy_path_submission_scores_and_persists() {
        let mut req = request(InputMethod::Topic);
        req.time_settings = TimeSettings::Untimed;
        let mut ws = running(req, five_questions());
        assert_eq!(ws.phase(), Phase::InProgress);

        // Untimed tests never start a timer.
        ws.apply(Event::SelectOption { index: 0, option: 0 }).unwrap();
        ws.apply(Event::Navigate(1)).unwrap();
        ws.apply(Event::SelectOption { index: 1, option: 0 }).unwrap();
        ws.apply(Event::Navigate(2)).unwrap();
        ws.apply(Event::SelectOption { index: 2, option: 3 }).unwrap();

        let effects = ws.apply(Event::Submit).unwrap();
        assert_eq!(effects.first(), Some(&Effect::StopTimer));
        assert!(effects.contains(&Effect::ClearSnapshot));
        let record = persisted(&effects).expect("result persisted");
        assert_eq!(record.score_percentage, 40.0);
        assert_eq!(record.correct_answers, 2);
        assert_eq!(record.attempted_questions, 3);
        assert_eq!(record.test_name, "Topic-based Test");

        assert_eq!(ws.phase(), Phase::Completed);
        let statuses: Vec<QuestionStatus> = ws.questions.iter().map(|q| q.status).collect();
        assert_eq!(
            statuses,
            vec![
                QuestionStatus::Attempted,
                QuestionStatus::Attempted,
                QuestionStatus::Attempted,
                QuestionStatus::Skipped,
                QuestionStatus::Skipped
            ]
        );
    }

    #[test]
    fn test_start_emits_timer_and_snapshot() {
        let mut ws = confirmed(request(InputMethod::Topic), five_questions());
        let effects = ws.apply(Event::StartTest { test_name: Some(" Biology quiz ".into()) }).unwrap();
        assert!(effects.contains(&Effect::StartTimer));
        let snapshot = effects.iter().find_map(|e| match e {
            Effect::MirrorSnapshot(s) => Some(s),
            _ => None,
        });
        let snapshot = snapshot.expect("snapshot mirrored");
        assert_eq!(snapshot.config.test_name, "Biology quiz");
        assert_eq!(snapshot.time_remaining_seconds, Some(3));
        assert_eq!(ws.view().questions.len(), 5);
    }

    #[test]
    fn test_countdown_auto_submits_at_zero() {
        let mut ws = running(request(InputMethod::Topic), five_questions());
        assert_eq!(ws.time_remaining, Some(3));

        let effects = ws.apply(Event::Tick).unwrap();
        assert!(matches!(effects.as_slice(), [Effect::MirrorSnapshot(_)]));
        ws.apply(Event::Tick).unwrap();
        let effects = ws.apply(Event::Tick).unwrap();

        assert_eq!(ws.phase(), Phase::Completed);
        assert_eq!(effects.first(), Some(&Effect::StopTimer));
        assert!(persisted(&effects).is_some());
        assert!(ws.questions.iter().all(|q| q.status == QuestionStatus::Skipped));

        // No further ticks once completed.
        assert!(ws.apply(Event::Tick).unwrap().is_empty());
    }

    #[test]
    fn test_untimed_session_ignores_ticks() {
        let mut req = request(InputMethod::Topic);
        req.time_settings = TimeSettings::Untimed;
        let mut ws = running(req, five_questions());
        for _ in 0..10 {
            assert!(ws.apply(Event::Tick).unwrap().is_empty());
        }
        assert_eq!(ws.phase(), Phase::InProgress);
    }

    #[test]
    fn test_navigating_away_skips_once() {
        let mut ws = running(request(InputMethod::Topic), five_questions());
        ws.apply(Event::Navigate(3)).unwrap();
        assert_eq!(ws.questions[0].status, QuestionStatus::Skipped);

        ws.apply(Event::Navigate(0)).unwrap();
        ws.apply(Event::Navigate(3)).unwrap();
        assert_eq!(ws.questions[0].status, QuestionStatus::Skipped);
        assert_eq!(ws.current_index, 3);

        // Staying on the same question leaves it unvisited.
        ws.apply(Event::Navigate(4)).unwrap();
        ws.apply(Event::Navigate(4)).unwrap();
        assert_eq!(ws.questions[4].status, QuestionStatus::Unvisited);
        assert_eq!(ws.current_index, 4);

        assert_eq!(
            ws.apply(Event::Navigate(9)).unwrap_err(),
            SessionError::QuestionOutOfRange { index: 9, len: 5 }
        );
    }

    #[test]
    fn test_equivalent_resubmission_skips_generation() {
        let mut ws = confirmed(request(InputMethod::Topic), five_questions());
        let session_before = ws.session_id.clone();
        ws.apply(Event::EditSettings).unwrap();

        let effects = ws.apply(Event::SubmitConfig(request(InputMethod::Topic))).unwrap();
        assert!(effects.is_empty());
        assert_eq!(ws.phase(), Phase::Confirmation);
        assert_eq!(ws.questions.len(), 5);
        assert_eq!(ws.session_id, session_before);

        ws.apply(Event::EditSettings).unwrap();
        let mut changed = request(InputMethod::Topic);
        changed.num_questions = Some(8);
        let effects = ws.apply(Event::SubmitConfig(changed)).unwrap();
        assert!(matches!(effects.as_slice(), [Effect::Generate { .. }]));
    }

    #[test]
    fn test_new_attempt_from_home_mints_fresh_session() {
        let mut ws = running(request(InputMethod::Topic), five_questions());
        let first = ws.session_id.clone().unwrap();
        ws.apply(Event::Submit).unwrap();

        ws.apply(Event::OpenProfile).unwrap();
        ws.apply(Event::GoHome).unwrap();
        ws.apply(Event::ChooseMethod(InputMethod::Topic)).unwrap();
        ws.apply(Event::SubmitConfig(request(InputMethod::Topic))).unwrap();
        generated(&mut ws, five_questions()).unwrap();
        ws.apply(Event::StartTest { test_name: None }).unwrap();
        // A new configuration from home is a genuinely new attempt.
        assert_ne!(ws.session_id.as_deref(), Some(first.as_str()));

        let second = ws.session_id.clone();
        ws.apply(Event::GoHome).unwrap();
        assert!(ws.session_id.is_none());
        assert_ne!(second, None);
    }

    #[test]
    fn test_generation_failure_returns_to_setup() {
        let mut ws = signed_in();
        ws.apply(Event::ChooseMethod(InputMethod::Topic)).unwrap();
        let effects = ws.apply(Event::SubmitConfig(request(InputMethod::Topic))).unwrap();
        ws.apply(Event::GenerationFailed {
            ticket: ticket_of(&effects),
            message: "model overloaded".into(),
        })
        .unwrap();
        assert_eq!(ws.phase(), Phase::Setup);
        assert_eq!(ws.view().error.as_deref(), Some("model overloaded"));

        ws.apply(Event::SubmitConfig(request(InputMethod::Topic))).unwrap();
        let err = generated(&mut ws, Vec::new()).unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));
        assert_eq!(ws.phase(), Phase::Setup);
    }

    #[test]
    fn test_submit_without_method_forces_home() {
        let mut ws = signed_in();
        ws.phase = Phase::Setup;
        let err = ws.apply(Event::SubmitConfig(request(InputMethod::Topic))).unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
        assert_eq!(ws.phase(), Phase::Home);
    }

    #[test]
    fn test_review_corrections_rescore_under_same_session() {
        let mut req = request(InputMethod::Topic);
        req.time_settings = TimeSettings::Untimed;
        let mut ws = running(req, vec![choice("a", 0), text("b", "Paris")]);
        ws.apply(Event::SelectOption { index: 0, option: 1 }).unwrap();
        ws.apply(Event::EnterText { index: 1, text: "paris".into() }).unwrap();
        let effects = ws.apply(Event::Submit).unwrap();
        let session_id = persisted(&effects).unwrap().session_id.clone();
        assert_eq!(ws.last_score.unwrap().percentage, 50.0);

        ws.apply(Event::EnterReview).unwrap();
        ws.apply(Event::CorrectOption { index: 0, option: 1 }).unwrap();
        // Going back discards the draft.
        ws.apply(Event::BackToResults).unwrap();
        assert_eq!(ws.last_score.unwrap().percentage, 50.0);

        ws.apply(Event::EnterReview).unwrap();
        ws.apply(Event::CorrectOption { index: 0, option: 1 }).unwrap();
        assert!(ws.review_question(0).unwrap().was_corrected_by_user);
        let effects = ws.apply(Event::ApplyCorrections).unwrap();
        let record = persisted(&effects).unwrap();
        assert_eq!(record.session_id, session_id);
        assert!(record.was_corrected_by_user);
        assert_eq!(record.score_percentage, 100.0);
        assert!(effects.contains(&Effect::ClearSnapshot));
        assert_eq!(ws.phase(), Phase::Completed);
    }

    #[test]
    fn test_retake_naming_and_regeneration_skip() {
        let mut ws = signed_in();
        ws.apply(Event::HistoryLoaded(vec![
            history_entry("2", "Midterm - Retake 1"),
            history_entry("1", "Midterm"),
            history_entry("3", "Final"),
        ]))
        .unwrap();

        ws.apply(Event::Retake("1".into())).unwrap();
        assert_eq!(ws.phase(), Phase::Setup);
        assert_eq!(ws.test_name, "Midterm - Retake 2");
        assert!(ws.retake_mode);
        assert!(ws.session_id.is_none());

        let mut req = request(InputMethod::Topic);
        req.content = "Something else entirely".into();
        let effects = ws.apply(Event::SubmitConfig(req)).unwrap();
        assert!(effects.is_empty(), "retakes reuse their questions");
        assert_eq!(ws.phase(), Phase::Confirmation);
        assert_eq!(ws.questions.len(), 2);
        assert!(ws.questions.iter().all(|q| q.status == QuestionStatus::Unvisited));

        ws.apply(Event::StartTest { test_name: None }).unwrap();
        let session_id = ws.session_id.clone().unwrap();
        assert!(ws.history().iter().all(|h| h.id != session_id));
        assert_eq!(ws.config.as_ref().unwrap().test_name, "Midterm - Retake 2");
    }

    #[test]
    fn test_retake_of_a_retake_counts_siblings() {
        let mut ws = signed_in();
        ws.apply(Event::HistoryLoaded(vec![
            history_entry("1", "Midterm"),
            history_entry("2", "Midterm - Retake 1"),
            history_entry("3", "Midterm - Retake 2"),
        ]))
        .unwrap();
        ws.apply(Event::Retake("3".into())).unwrap();
        assert_eq!(ws.test_name, "Midterm - Retake 3");

        assert!(matches!(
            ws.apply(Event::Retake("missing".into())).unwrap_err(),
            SessionError::NotFound(_)
        ));
    }

    #[test]
    fn test_save_and_exit_waits_for_acknowledgement() {
        let mut ws = running(request(InputMethod::Topic), five_questions());
        let effects = ws.apply(Event::SaveAndExit).unwrap();
        let saved = match effects.as_slice() {
            [Effect::StoreSavedTest(saved), Effect::MirrorSnapshot(_)] => saved.clone(),
            other => panic!("unexpected effects: {:?}", other),
        };
        assert_eq!(ws.phase(), Phase::InProgress);

        let effects = ws.apply(Event::SavedTestStored(saved.clone())).unwrap();
        assert_eq!(effects, vec![Effect::StopTimer, Effect::ClearSnapshot]);
        assert_eq!(ws.phase(), Phase::Home);
        assert_eq!(ws.saved_tests().len(), 1);

        let effects = ws.apply(Event::ResumeSaved(saved.id.clone())).unwrap();
        assert!(effects.contains(&Effect::DeleteSavedTest(saved.id.clone())));
        assert!(effects.contains(&Effect::StartTimer));
        assert_eq!(ws.phase(), Phase::InProgress);
        assert_eq!(ws.session_id.as_deref(), Some(saved.session_id.as_str()));
    }

    #[test]
    fn test_snapshot_resume_and_discard() {
        let source = running(request(InputMethod::Topic), five_questions());
        let snapshot = source.snapshot().unwrap();

        let mut ws = signed_in();
        ws.apply(Event::SnapshotFound(snapshot.clone())).unwrap();
        let banner = ws.view().resume_banner.expect("banner offered");
        assert_eq!(banner.total, 5);
        assert_eq!(banner.mode, "Timed");

        let effects = ws.apply(Event::ResumeSnapshot).unwrap();
        assert_eq!(effects.first(), Some(&Effect::ClearSnapshot));
        assert!(effects.contains(&Effect::StartTimer));
        assert_eq!(ws.phase(), Phase::InProgress);
        assert!(ws.view().resume_banner.is_none());

        let mut other = signed_in();
        other.apply(Event::SnapshotFound(snapshot)).unwrap();
        assert_eq!(other.apply(Event::DiscardSnapshot).unwrap(), vec![Effect::ClearSnapshot]);
        assert!(other.view().resume_banner.is_none());
        assert!(matches!(
            other.apply(Event::ResumeSnapshot).unwrap_err(),
            SessionError::NotFound(_)
        ));
    }

    #[test]
    fn test_expired_snapshot_submits_on_resume() {
        let source = running(request(InputMethod::Topic), five_questions());
        let mut snapshot = source.snapshot().unwrap();
        snapshot.time_remaining_seconds = Some(0);

        let mut ws = signed_in();
        ws.apply(Event::SnapshotFound(snapshot)).unwrap();
        let effects = ws.apply(Event::ResumeSnapshot).unwrap();
        assert_eq!(ws.phase(), Phase::Completed);
        assert!(persisted(&effects).is_some());
        assert!(!effects.contains(&Effect::StartTimer));
    }

    #[test]
    fn test_in_progress_view_hides_answers() {
        let ws = running(request(InputMethod::Topic), five_questions());
        let json = serde_json::to_value(ws.view()).unwrap();
        assert!(json["results"].is_null());
        assert!(json["questions"][0].get("answer").is_none());
    }

    #[test]
    fn test_history_score_view_and_back() {
        let mut ws = signed_in();
        ws.apply(Event::HistoryLoaded(vec![history_entry("9", "Quiz")])).unwrap();
        ws.apply(Event::OpenHistory).unwrap();
        ws.apply(Event::ViewHistoryScore("9".into())).unwrap();
        assert_eq!(ws.phase(), Phase::Completed);
        assert!(ws.view().viewing_from_history);
        assert_eq!(ws.session_id.as_deref(), Some("9"));

        ws.apply(Event::BackToHistory).unwrap();
        assert_eq!(ws.phase(), Phase::History);

        ws.apply(Event::ViewHistoryDetails("9".into())).unwrap();
        assert_eq!(ws.view().results.map(|r| r.len()), Some(2));
        ws.apply(Event::BackToHistory).unwrap();
        assert_eq!(ws.phase(), Phase::History);
    }

    #[test]
    fn test_sign_out_resets_everything() {
        let mut ws = running(request(InputMethod::Topic), five_questions());
        let effects = ws.apply(Event::SignedOut).unwrap();
        assert_eq!(effects, vec![Effect::StopTimer]);
        assert_eq!(ws.phase(), Phase::Auth);
        assert!(ws.user().is_none());
        assert!(ws.questions.is_empty());
    }

    fn untimed() -> ConfigRequest {
        let mut req = request(InputMethod::Topic);
        req.time_settings = TimeSettings::Untimed;
        req
    }

    #[test]
    fn test_resuming_timed_saved_test_over_untimed_run_starts_clock() {
        let mut ws = running(untimed(), five_questions());
        ws.apply(Event::SavedTestsLoaded(vec![saved_test("s", Some(30))])).unwrap();

        let effects = ws.apply(Event::ResumeSaved("s".into())).unwrap();

        assert_eq!(effects.first(), Some(&Effect::StopTimer));
        assert!(effects.contains(&Effect::StartTimer));
        assert_eq!(ws.phase(), Phase::InProgress);
        assert_eq!(ws.time_remaining, Some(30));
        assert_eq!(ws.session_id.as_deref(), Some("session-s"));
    }

    #[test]
    fn test_resuming_saved_test_over_timed_run_restarts_clock() {
        let mut ws = running(request(InputMethod::Topic), five_questions());
        ws.apply(Event::SavedTestsLoaded(vec![saved_test("s", Some(30))])).unwrap();

        let effects = ws.apply(Event::ResumeSaved("s".into())).unwrap();

        match effects.as_slice() {
            [
                Effect::StopTimer,
                Effect::DeleteSavedTest(id),
                Effect::RefreshSavedTests,
                Effect::StartTimer,
                Effect::MirrorSnapshot(snapshot),
            ] => {
                assert_eq!(id, "s");
                assert_eq!(snapshot.session_id, "session-s");
            }
            other => panic!("unexpected effects: {:?}", other),
        }
    }

    #[test]
    fn test_resuming_untimed_saved_test_over_timed_run_stops_clock() {
        let mut ws = running(request(InputMethod::Topic), five_questions());
        ws.apply(Event::SavedTestsLoaded(vec![saved_test("s", None)])).unwrap();

        let effects = ws.apply(Event::ResumeSaved("s".into())).unwrap();

        assert_eq!(effects.first(), Some(&Effect::StopTimer));
        assert!(!effects.contains(&Effect::StartTimer));
        assert_eq!(ws.phase(), Phase::InProgress);
        assert!(ws.time_remaining.is_none());
    }

    #[test]
    fn test_actions_within_one_run_keep_the_clock() {
        let mut ws = running(request(InputMethod::Topic), five_questions());
        let effects = ws.apply(Event::SelectOption { index: 0, option: 1 }).unwrap();
        assert!(!effects.contains(&Effect::StopTimer));
        assert!(!effects.contains(&Effect::StartTimer));
    }

    #[test]
    fn test_retake_from_running_test_stops_clock() {
        let mut ws = running(request(InputMethod::Topic), five_questions());
        ws.apply(Event::HistoryLoaded(vec![history_entry("1", "Midterm")])).unwrap();

        let effects = ws.apply(Event::Retake("1".into())).unwrap();

        assert_eq!(effects.first(), Some(&Effect::StopTimer));
        assert!(!effects.iter().any(|e| matches!(e, Effect::MirrorSnapshot(_))));
        assert_eq!(ws.phase(), Phase::Setup);
        assert!(ws.retake_mode);
    }

    #[test]
    fn test_history_score_from_running_test_stops_clock() {
        let mut ws = running(request(InputMethod::Topic), five_questions());
        ws.apply(Event::HistoryLoaded(vec![history_entry("9", "Quiz")])).unwrap();

        let effects = ws.apply(Event::ViewHistoryScore("9".into())).unwrap();

        assert_eq!(effects, vec![Effect::StopTimer]);
        assert_eq!(ws.phase(), Phase::Completed);
        assert_eq!(ws.session_id.as_deref(), Some("9"));
    }

    #[test]
    fn test_choosing_method_from_running_test_stops_clock() {
        let mut ws = running(request(InputMethod::Topic), five_questions());

        let effects = ws.apply(Event::ChooseMethod(InputMethod::Syllabus)).unwrap();

        assert_eq!(effects, vec![Effect::StopTimer]);
        assert_eq!(ws.phase(), Phase::Setup);
        assert!(ws.session_id.is_none());
    }

    #[test]
    fn test_superseded_generation_reply_is_ignored() {
        let mut ws = signed_in();
        ws.apply(Event::ChooseMethod(InputMethod::Topic)).unwrap();
        let first = ticket_of(&ws.apply(Event::SubmitConfig(request(InputMethod::Topic))).unwrap());

        ws.apply(Event::ChooseMethod(InputMethod::Syllabus)).unwrap();
        let second = ticket_of(&ws.apply(Event::SubmitConfig(request(InputMethod::Syllabus))).unwrap());
        assert_ne!(first, second);
        assert!(!ws.awaits_generation(first));
        assert!(ws.awaits_generation(second));

        // Late replies to the topic request change nothing.
        let effects = ws
            .apply(Event::GenerationSucceeded {
                ticket: first,
                questions: five_questions(),
            })
            .unwrap();
        assert!(effects.is_empty());
        ws.apply(Event::GenerationFailed {
            ticket: first,
            message: "model overloaded".into(),
        })
        .unwrap();
        assert_eq!(ws.phase(), Phase::Generating);
        assert!(ws.questions.is_empty());
        assert!(ws.view().error.is_none());

        ws.apply(Event::GenerationSucceeded {
            ticket: second,
            questions: vec![choice("x", 0), choice("y", 1)],
        })
        .unwrap();
        assert_eq!(ws.phase(), Phase::Confirmation);
        assert_eq!(ws.questions.len(), 2);
        assert_eq!(ws.config.as_ref().unwrap().input_method, InputMethod::Syllabus);
    }

    #[test]
    fn test_retake_start_replaces_any_leftover_session_id() {
        let mut ws = signed_in();
        ws.apply(Event::HistoryLoaded(vec![history_entry("1", "Midterm")])).unwrap();
        ws.apply(Event::Retake("1".into())).unwrap();
        ws.session_id = Some("1".into());

        ws.apply(Event::SubmitConfig(request(InputMethod::Topic))).unwrap();
        ws.apply(Event::StartTest { test_name: None }).unwrap();

        let session_id = ws.session_id.clone().unwrap();
        assert_ne!(session_id, "1");
        assert!(ws.history().iter().all(|h| h.id != session_id));
    }
}
