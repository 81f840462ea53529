//! Sync layer integration tests
//!
//! Drives [`SyncLayer`] against the scripted backend from grove-test-utils
//! and against mockall mocks.
//!
//! Scenarios use 50 points per stage, 5 stages, 10 points and 5 coins per
//! correct answer.

use async_trait::async_trait;
use grove_ledger::TreeState;
use grove_reward::{Marker, RewardCoordinator};
use grove_sync::{
    FallbackBackend, ProgressBackend, ProgressSummary, SubmitOutcome, SubmitRequest,
    SubmitResponse, SyncError, SyncLayer, TransportError, UnreachableBackend, ViewKey, ViewValue,
    WireTreeState,
};
use grove_test_utils::{
    finished_attempt, perfect_attempt, rates, rules, GatewayEvent, RecordingGateway,
    ScriptedBackend, Step, LESSONS,
};
use mockall::mock;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn layer<B: ProgressBackend>(backend: Arc<B>, points: u64) -> SyncLayer<B> {
    SyncLayer::new(
        backend,
        RewardCoordinator::new(rates()),
        TreeState::from_points(rules(), points, None),
    )
}

#[tokio::test]
async fn perfect_attempt_on_fresh_ledger() {
    let backend = ScriptedBackend::new();
    let gateway = RecordingGateway::new();
    let sync = layer(Arc::clone(&backend), 0).with_gateway(gateway.clone());

    let attempt = perfect_attempt("l1");
    let outcome = sync.submit(&attempt).await.unwrap();

    let SubmitOutcome::Granted { grant, tree, events, score } = outcome else {
        panic!("expected a new grant");
    };
    assert_eq!(grant.growth_points_earned, 30);
    assert_eq!(grant.coins_earned, 15);
    assert!(grant.fertilizer_bonus);
    assert!(grant.badge_earned);
    assert_eq!(score.correct_count, 3);
    assert_eq!(tree.growth_points(), 30);
    assert_eq!(tree.current_stage(), 0);
    assert!(!tree.is_completed());
    assert!(!events.stage_increased);

    assert_eq!(*sync.ledger(), tree);
    let view = sync.local_view();
    assert_eq!(view.coin_balance, 15);
    assert!(view.is_lesson_completed(&attempt.lesson_id));
    assert_eq!(view.grants.get(&attempt.attempt_id), Some(&grant));
    assert_eq!(sync.journal().total_coins(), 15);
    assert!(sync.journal().verify_integrity().is_ok());
    assert_eq!(gateway.events(), vec![GatewayEvent::RewardGranted(grant)]);
}

#[tokio::test]
async fn five_perfect_attempts_reach_stage_three() {
    let backend = ScriptedBackend::new();
    let gateway = RecordingGateway::new();
    let sync = layer(backend, 0).with_gateway(gateway.clone());

    for lesson in &LESSONS[..5] {
        let outcome = sync.submit(&perfect_attempt(lesson)).await.unwrap();
        assert!(outcome.is_new_grant());
    }

    let ledger = sync.ledger();
    assert_eq!(ledger.growth_points(), 150);
    assert_eq!(ledger.current_stage(), 3);
    assert!(!ledger.is_completed());

    let stages: Vec<u32> = gateway
        .events()
        .into_iter()
        .filter_map(|e| match e {
            GatewayEvent::StageIncreased(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(stages, vec![1, 2, 3]);
    assert_eq!(gateway.grants(), 5);
    assert_eq!(sync.local_view().coin_balance, 75);
}

#[tokio::test]
async fn completion_fires_once() {
    let backend = ScriptedBackend::starting_at(240);
    let gateway = RecordingGateway::new();
    let sync = layer(backend, 240).with_gateway(gateway.clone());

    let SubmitOutcome::Granted { tree, events, grant, .. } =
        sync.submit(&finished_attempt("l1", 1)).await.unwrap()
    else {
        panic!("expected a new grant");
    };
    assert_eq!(tree.growth_points(), 250);
    assert_eq!(tree.current_stage(), 4);
    assert!(tree.is_completed());
    assert!(tree.completed_at().is_some());
    assert!(events.just_completed);
    assert_eq!(
        gateway.events(),
        vec![GatewayEvent::Completed, GatewayEvent::RewardGranted(grant)]
    );

    let SubmitOutcome::Granted { tree: after, events, .. } =
        sync.submit(&perfect_attempt("l2")).await.unwrap()
    else {
        panic!("expected a new grant");
    };
    assert_eq!(after.growth_points(), 280);
    assert_eq!(after.current_stage(), 4);
    assert!(!events.just_completed);
    assert_eq!(after.completed_at(), tree.completed_at());
    let completions = gateway
        .events()
        .iter()
        .filter(|e| **e == GatewayEvent::Completed)
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn duplicate_submission_changes_nothing() {
    let backend = ScriptedBackend::new();
    let gateway = RecordingGateway::new();
    let sync = layer(Arc::clone(&backend), 0).with_gateway(gateway.clone());
    let attempt = perfect_attempt("l1");

    let first = sync.submit(&attempt).await.unwrap();
    let second = sync.submit(&attempt).await.unwrap();

    assert_eq!(second, SubmitOutcome::Duplicate(first.grant().cloned().unwrap()));
    assert_eq!(sync.ledger().growth_points(), 30);
    assert_eq!(sync.local_view().coin_balance, 15);
    assert_eq!(sync.journal().len(), 1);
    assert_eq!(backend.submissions(), 1);
    assert_eq!(gateway.grants(), 1);
}

#[tokio::test]
async fn network_failure_rolls_back_exactly() {
    let backend = ScriptedBackend::new();
    backend.fail_next();
    let gateway = RecordingGateway::new();
    let sync = layer(Arc::clone(&backend), 0).with_gateway(gateway.clone());
    let attempt = perfect_attempt("l1");

    let view_before = sync.local_view();
    let ledger_before = sync.ledger();

    let err = sync.submit(&attempt).await.unwrap_err();
    assert!(matches!(
        &err,
        SyncError::Network { attempt_id, source: TransportError::Unreachable(_) }
            if *attempt_id == attempt.attempt_id
    ));
    assert!(err.is_retryable());

    assert_eq!(*sync.local_view(), *view_before);
    assert!(!sync.local_view().is_lesson_completed(&attempt.lesson_id));
    assert_eq!(sync.ledger(), ledger_before);
    assert!(sync.journal().is_empty());
    assert_eq!(sync.coordinator().markers().get(&attempt.attempt_id), None);
    assert!(gateway.events().is_empty());

    // the marker was released, so the same attempt can go again
    let retried = sync.submit(&attempt).await.unwrap();
    assert!(retried.is_new_grant());
    assert_eq!(sync.ledger().growth_points(), 30);
    assert!(matches!(
        sync.coordinator().markers().get(&attempt.attempt_id),
        Some(Marker::Committed(_))
    ));
    assert_eq!(backend.submissions(), 2);
}

#[tokio::test]
async fn invalid_response_is_treated_as_failure() {
    let backend = ScriptedBackend::new();
    let mut tree = WireTreeState::from_tree(&TreeState::from_points(rules(), 30, None));
    tree.current_stage = 2;
    backend.then(Step::Respond(SubmitResponse {
        success: true,
        correct_count: 3,
        total_questions: 3,
        growth_points_earned: 30,
        fertilizer_bonus: true,
        coins_earned: 15,
        tree_state: tree,
    }));
    let sync = layer(backend, 0);
    let attempt = perfect_attempt("l1");

    let err = sync.submit(&attempt).await.unwrap_err();
    assert!(matches!(err.transport(), TransportError::InvalidResponse(_)));
    assert!(!sync.local_view().is_lesson_completed(&attempt.lesson_id));
    assert_eq!(sync.ledger().growth_points(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_service_times_out_and_rolls_back() {
    let backend = ScriptedBackend::new();
    backend.then(Step::Delay(Duration::from_secs(30)));
    let sync = layer(backend, 0).with_timeout(Duration::from_secs(2));
    let attempt = perfect_attempt("l1");

    let err = sync.submit(&attempt).await.unwrap_err();
    assert_eq!(err.transport(), &TransportError::Timeout(Duration::from_secs(2)));
    assert!(sync.local_view().completed_lessons.is_empty());
    assert_eq!(sync.coordinator().markers().get(&attempt.attempt_id), None);
}

#[tokio::test(start_paused = true)]
async fn concurrent_resubmission_is_in_flight() {
    let backend = ScriptedBackend::new();
    backend.then(Step::Delay(Duration::from_secs(1)));
    let sync = Arc::new(layer(Arc::clone(&backend), 0));
    let attempt = perfect_attempt("l1");

    let first = sync.submit_in_background(attempt.clone());
    tokio::task::yield_now().await;

    assert_eq!(sync.submit(&attempt).await.unwrap(), SubmitOutcome::InFlight);
    // speculation is visible while the first submission is pending
    assert!(sync.local_view().is_lesson_completed(&attempt.lesson_id));

    let outcome = first.await.unwrap().unwrap();
    assert!(outcome.is_new_grant());
    assert_eq!(sync.ledger().growth_points(), 30);
    assert_eq!(backend.submissions(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_before_service_grades_keeps_speculation() {
    let backend = ScriptedBackend::new();
    backend.then(Step::Delay(Duration::from_secs(1)));
    let sync = Arc::new(layer(Arc::clone(&backend), 0));
    let attempt = perfect_attempt("l1");

    let pending = sync.submit_in_background(attempt.clone());
    tokio::task::yield_now().await;

    // service has not seen the attempt yet
    let summary = sync.refresh().await.unwrap();
    assert!(summary.completed_lessons.is_empty());
    assert!(sync.local_view().is_lesson_completed(&attempt.lesson_id));

    assert!(pending.await.unwrap().unwrap().is_new_grant());
    let view = sync.local_view();
    assert!(view.is_lesson_completed(&attempt.lesson_id));
    assert_eq!(view.coin_balance, 15);
    assert_eq!(
        sync.view(ViewKey::Lessons).await.unwrap(),
        ViewValue::Lessons(vec!["l1".into()])
    );
}

#[tokio::test(start_paused = true)]
async fn refresh_after_service_grades_counts_coins_once() {
    let backend = ScriptedBackend::new();
    backend.then(Step::DelayReply(Duration::from_secs(1)));
    let sync = Arc::new(layer(Arc::clone(&backend), 0));
    let attempt = perfect_attempt("l1");

    let pending = sync.submit_in_background(attempt.clone());
    tokio::task::yield_now().await;

    // service has committed, its reply is still on the way
    let summary = sync.refresh().await.unwrap();
    assert_eq!(summary.coin_balance, 15);

    assert!(pending.await.unwrap().unwrap().is_new_grant());
    assert_eq!(sync.local_view().coin_balance, 15);
    assert_eq!(
        sync.view(ViewKey::CoinBalance).await.unwrap(),
        ViewValue::CoinBalance(15)
    );

    sync.refresh().await.unwrap();
    let view = sync.local_view();
    assert_eq!(view.coin_balance, 15);
    assert!(view.is_lesson_completed(&attempt.lesson_id));
    assert_eq!(sync.journal().total_coins(), 15);
}

#[tokio::test]
async fn service_ledger_wins_over_local() {
    // service already knows about 100 points the client never saw
    let backend = ScriptedBackend::starting_at(100);
    let sync = layer(backend, 0);

    let SubmitOutcome::Granted { tree, events, .. } =
        sync.submit(&perfect_attempt("l1")).await.unwrap()
    else {
        panic!("expected a new grant");
    };
    assert_eq!(tree.growth_points(), 130);
    assert_eq!(sync.ledger().growth_points(), 130);
    assert_eq!(sync.ledger().current_stage(), 2);
    assert!(!events.stage_increased);
}

#[tokio::test]
async fn fallback_serves_offline_when_primary_is_down() {
    let offline = ScriptedBackend::new();
    let backend = Arc::new(FallbackBackend::new(UnreachableBackend, Arc::clone(&offline)));
    let sync = layer(backend, 0);

    let outcome = sync.submit(&perfect_attempt("l1")).await.unwrap();
    assert!(outcome.is_new_grant());
    assert_eq!(offline.submissions(), 1);
    assert_eq!(sync.ledger().growth_points(), 30);
}

#[tokio::test]
async fn grant_invalidates_derived_views() {
    let backend = ScriptedBackend::new();
    let sync = layer(backend, 0);

    sync.refresh().await.unwrap();
    assert_eq!(
        sync.views().get(&ViewKey::CoinBalance).await,
        Some(ViewValue::CoinBalance(0))
    );

    sync.submit(&perfect_attempt("l1")).await.unwrap();
    assert_eq!(sync.views().get(&ViewKey::CoinBalance).await, None);

    assert_eq!(
        sync.view(ViewKey::CoinBalance).await.unwrap(),
        ViewValue::CoinBalance(15)
    );
    assert_eq!(
        sync.view(ViewKey::Lessons).await.unwrap(),
        ViewValue::Lessons(vec!["l1".into()])
    );
}

#[tokio::test]
async fn refresh_reconciles_stale_ledger() {
    let backend = ScriptedBackend::starting_at(60);
    let sync = layer(backend, 0);

    let summary = sync.refresh().await.unwrap();
    assert_eq!(summary.tree_state.growth_points, 60);
    assert_eq!(sync.ledger().growth_points(), 60);
    assert_eq!(sync.ledger().current_stage(), 1);
}

mock! {
    Backend {}

    #[async_trait]
    impl ProgressBackend for Backend {
        async fn submit_quiz(&self, request: &SubmitRequest) -> Result<SubmitResponse, TransportError>;
        async fn fetch_summary(&self) -> Result<ProgressSummary, TransportError>;
    }
}

#[tokio::test]
async fn error_status_is_surfaced_once_and_not_retried_internally() {
    let mut mock = MockBackend::new();
    mock.expect_submit_quiz().times(1).returning(|_| {
        Err(TransportError::Status {
            status: 503,
            message: "maintenance".to_string(),
        })
    });
    let sync = layer(Arc::new(mock), 0);
    let attempt = perfect_attempt("l1");

    let err = sync.submit(&attempt).await.unwrap_err();
    assert!(matches!(
        err.transport(),
        TransportError::Status { status: 503, .. }
    ));
    assert!(sync.local_view().completed_lessons.is_empty());
}

#[tokio::test]
async fn refresh_failure_is_reported() {
    let mut mock = MockBackend::new();
    mock.expect_fetch_summary()
        .times(1)
        .returning(|| Err(TransportError::Unreachable("offline".to_string())));
    let sync = layer(Arc::new(mock), 0);

    let err = sync.refresh().await.unwrap_err();
    assert!(matches!(err, SyncError::Refresh(TransportError::Unreachable(_))));
    assert_eq!(sync.views().get(&ViewKey::Badges).await, None);
}

#[tokio::test]
async fn fallback_does_not_mask_error_status() {
    let mut primary = MockBackend::new();
    primary.expect_submit_quiz().times(1).returning(|_| {
        Err(TransportError::Status {
            status: 400,
            message: "bad request".to_string(),
        })
    });
    let offline = ScriptedBackend::new();
    let backend = Arc::new(FallbackBackend::new(primary, Arc::clone(&offline)));
    let sync = layer(backend, 0);

    assert!(sync.submit(&perfect_attempt("l1")).await.is_err());
    assert_eq!(offline.submissions(), 0);
}
