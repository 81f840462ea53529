//! Testing utilities for the Grove workspace
//!
//! Shared fixtures: rules, lessons, finished attempts, a recording
//! presentation gateway and a scriptable backend.

#![allow(missing_docs)]

use async_trait::async_trait;
use grove_ledger::GrowthRules;
use grove_quiz::{AnswerOption, CompletedAttempt, FinishOutcome, ModuleId, Question, QuizSession};
use grove_reward::{RewardGrant, RewardRates};
use grove_sync::{
    LessonContent, ModuleContent, OfflineBackend, OfflineDataset, PresentationGateway,
    ProgressBackend, ProgressSummary, SubmitRequest, SubmitResponse, TransportError,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const MODULE: &str = "m1";
pub const LESSONS: [&str; 6] = ["l1", "l2", "l3", "l4", "l5", "l6"];

/// 50 points per stage, 5 stages
pub fn rules() -> GrowthRules {
    GrowthRules::new(50, 5).unwrap()
}

/// 10 points and 5 coins per correct answer
pub fn rates() -> RewardRates {
    RewardRates::new(10, 5)
}

/// Three questions whose correct option is always "a"
pub fn questions(lesson: &str) -> Vec<Question> {
    (1..=3)
        .map(|n| {
            Question::new(
                format!("{lesson}-q{n}"),
                format!("Question {n} of {lesson}"),
                vec![
                    AnswerOption::new("a", "right"),
                    AnswerOption::new("b", "wrong"),
                    AnswerOption::new("c", "also wrong"),
                ],
                "a",
            )
            .with_explanation(format!("{lesson}-q{n}: the answer is a"))
        })
        .collect()
}

/// One module holding every fixture lesson
pub fn dataset() -> OfflineDataset {
    OfflineDataset {
        modules: vec![ModuleContent {
            id: ModuleId::new(MODULE),
            title: "Fixture module".to_string(),
            lessons: LESSONS
                .iter()
                .map(|id| LessonContent {
                    id: (*id).into(),
                    title: format!("Lesson {id}"),
                    questions: questions(id),
                })
                .collect(),
        }],
    }
}

/// Session on a fixture lesson, already started
pub fn session(lesson: &str) -> QuizSession {
    QuizSession::started(lesson, Some(ModuleId::new(MODULE)), questions(lesson))
}

/// Finished attempt answering `correct` of three questions correctly
pub fn finished_attempt(lesson: &str, correct: usize) -> CompletedAttempt {
    let mut session = session(lesson);
    for index in 0..3 {
        let option = if index < correct { "a" } else { "b" };
        session.select_answer(index, option).unwrap();
    }
    match session.finish().unwrap() {
        FinishOutcome::Finished(done) => done,
        FinishOutcome::AlreadyCompleted => unreachable!("fresh session"),
    }
}

/// All three answers correct
pub fn perfect_attempt(lesson: &str) -> CompletedAttempt {
    finished_attempt(lesson, 3)
}

/// Event seen by [`RecordingGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    StageIncreased(u32),
    Completed,
    RewardGranted(RewardGrant),
}

/// Gateway that records every call in order
#[derive(Debug, Default)]
pub struct RecordingGateway {
    events: Mutex<Vec<GatewayEvent>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<GatewayEvent> {
        self.events.lock().clone()
    }

    pub fn grants(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, GatewayEvent::RewardGranted(_)))
            .count()
    }
}

impl PresentationGateway for RecordingGateway {
    fn on_stage_increased(&self, new_stage: u32) {
        self.events.lock().push(GatewayEvent::StageIncreased(new_stage));
    }

    fn on_completed(&self) {
        self.events.lock().push(GatewayEvent::Completed);
    }

    fn on_reward_granted(&self, grant: &RewardGrant) {
        self.events
            .lock()
            .push(GatewayEvent::RewardGranted(grant.clone()));
    }
}

/// Scripted behaviour for one submission
#[derive(Debug, Clone)]
pub enum Step {
    /// Fail with this error
    Fail(TransportError),
    /// Answer normally after a delay
    Delay(Duration),
    /// Answer with a hand-made response
    Respond(SubmitResponse),
    /// Grade right away, then hold the reply back
    DelayReply(Duration),
}

/// Backend that grades like the service unless told otherwise
///
/// Queued steps are consumed one per submission; with none queued it
/// answers from an in-process [`OfflineBackend`] over [`dataset`].
#[derive(Debug)]
pub struct ScriptedBackend {
    inner: OfflineBackend,
    script: Mutex<VecDeque<Step>>,
    submissions: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Self::starting_at(0)
    }

    pub fn starting_at(points: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: OfflineBackend::new(Arc::new(dataset()), rules(), rates())
                .with_growth_points(points),
            script: Mutex::new(VecDeque::new()),
            submissions: AtomicUsize::new(0),
        })
    }

    pub fn then(&self, step: Step) -> &Self {
        self.script.lock().push_back(step);
        self
    }

    pub fn fail_next(&self) -> &Self {
        self.then(Step::Fail(TransportError::Unreachable(
            "connection refused".to_string(),
        )))
    }

    /// Submissions that reached this backend
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressBackend for ScriptedBackend {
    async fn submit_quiz(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                self.inner.submit_quiz(request).await
            }
            Some(Step::DelayReply(delay)) => {
                let response = self.inner.submit_quiz(request).await;
                tokio::time::sleep(delay).await;
                response
            }
            Some(Step::Respond(response)) => Ok(response),
            None => self.inner.submit_quiz(request).await,
        }
    }

    async fn fetch_summary(&self) -> Result<ProgressSummary, TransportError> {
        self.inner.fetch_summary().await
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
