use grove_quiz::{
    allowed_transitions, validate_transition, AnswerOption, FinishOutcome, Navigation, Question,
    QuizSession, SessionState,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn quiz(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| {
            Question::new(
                format!("q{i}"),
                format!("question {i}"),
                vec![
                    AnswerOption::new("a", "A"),
                    AnswerOption::new("b", "B"),
                    AnswerOption::new("c", "C"),
                ],
                "b",
            )
        })
        .collect()
}

#[test]
fn test_idle_transitions() {
    assert!(validate_transition(SessionState::Idle, SessionState::InProgress).is_ok());

    // Invalid
    assert!(validate_transition(SessionState::Idle, SessionState::Completed).is_err());
    assert!(validate_transition(SessionState::Idle, SessionState::Transitioning).is_err());
}

#[test]
fn test_completed_transitions() {
    for to in [
        SessionState::Idle,
        SessionState::InProgress,
        SessionState::Transitioning,
        SessionState::Completed,
    ] {
        assert!(validate_transition(SessionState::Completed, to).is_err());
    }
}

#[test]
fn test_next_at_last_question_is_finish_cue() {
    let mut session = QuizSession::started("lesson", None, quiz(3));
    let mut steps = 0;
    loop {
        session.select_answer(session.current_index(), "b").unwrap();
        match session.next().unwrap() {
            Navigation::Moved(_) => steps += 1,
            Navigation::AtEnd => break,
            other => panic!("unexpected navigation: {other:?}"),
        }
    }
    assert_eq!(steps, 2);

    let FinishOutcome::Finished(done) = session.finish().unwrap() else {
        panic!("expected evaluation");
    };
    assert_eq!(done.score.correct_count, 3);
    assert_eq!(done.answers.len(), 3);
}

#[derive(Debug, Clone)]
enum Op {
    Select(usize, u8),
    Next,
    Previous,
    BeginTransition,
    EndTransition,
    Finish,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..6, 0u8..3).prop_map(|(i, o)| Op::Select(i, o)),
        Just(Op::Next),
        Just(Op::Previous),
        Just(Op::BeginTransition),
        Just(Op::EndTransition),
        Just(Op::Finish),
    ]
}

proptest! {
    #[test]
    fn prop_all_transitions_are_subset_of_allowed(
        from in prop_oneof![
            Just(SessionState::Idle),
            Just(SessionState::InProgress),
            Just(SessionState::Transitioning),
            Just(SessionState::Completed),
        ],
        to in prop_oneof![
            Just(SessionState::Idle),
            Just(SessionState::InProgress),
            Just(SessionState::Transitioning),
            Just(SessionState::Completed),
        ]
    ) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);

        if res.is_ok() {
            prop_assert!(allowed.contains(&to));
        } else {
            prop_assert!(!allowed.contains(&to));
        }
    }

    #[test]
    fn prop_random_driving_keeps_session_consistent(ops in proptest::collection::vec(op(), 0..40)) {
        let questions = quiz(4);
        let mut session = QuizSession::started("lesson", None, questions);
        let mut finished = 0;

        for op in ops {
            let option = |o: u8| ["a", "b", "c"][usize::from(o)];
            let _ = match op {
                Op::Select(i, o) => session.select_answer(i, option(o)).map(|_| ()),
                Op::Next => session.next().map(|_| ()),
                Op::Previous => session.previous().map(|_| ()),
                Op::BeginTransition => session.begin_transition().map(|_| ()),
                Op::EndTransition => session.end_transition().map(|_| ()),
                Op::Finish => session.finish().map(|outcome| {
                    if matches!(outcome, FinishOutcome::Finished(_)) {
                        finished += 1;
                    }
                }),
            };

            prop_assert!(session.current_index() < 4);
            let progress = session.progress();
            prop_assert_eq!(progress.answered + progress.remaining, progress.total);
        }

        prop_assert!(finished <= 1);
        if let Some(done) = session.completed() {
            prop_assert!(done.score.correct_count <= done.score.total_questions);
            prop_assert_eq!(session.state(), SessionState::Completed);
        }
    }
}
