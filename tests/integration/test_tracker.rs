//! Behavioral tests for the progress tracker's public API
//!
//! No HTTP here: these exercise the session lifecycle, the difficulty and
//! promotion arithmetic, and the per-session serialization guarantee the
//! server builds on.

use std::sync::Arc;

use mathbuddy_core::{
    KeywordEstimator, Ladder, ProgressTracker, TrackerError, ALL_STEPS_COMPLETE, MAX_DIFFICULTY,
    MIN_DIFFICULTY,
};

fn grades_tracker() -> ProgressTracker {
    ProgressTracker::new(Ladder::grade_levels(), None)
}

#[tokio::test]
async fn test_fresh_session_starts_at_ladder_origin() {
    let tracker = grades_tracker();
    let session = tracker.create_session().await.expect("create session");

    assert_eq!(session.topic, "3rd Grade");
    assert_eq!(session.difficulty, 1);
    assert!(session.history.is_empty());
    assert!(session.steps.is_empty());
}

#[tokio::test]
async fn test_difficulty_never_leaves_range() {
    let tracker = grades_tracker();
    let id = tracker.create_session().await.expect("create session").id;

    // A long arbitrary mix of outcomes; the bound must hold after every
    // single one.
    for round in 0..200u32 {
        let was_correct = (round * 7 + 3) % 5 != 0;
        let session = tracker
            .record_outcome(id, was_correct)
            .await
            .expect("record outcome");
        assert!(
            (MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&session.difficulty),
            "difficulty {} escaped the range at round {round}",
            session.difficulty
        );
    }
}

#[tokio::test]
async fn test_seventh_straight_correct_promotes() {
    let tracker = grades_tracker();
    let id = tracker.create_session().await.expect("create session").id;

    for round in 1..=6 {
        let session = tracker
            .record_outcome(id, true)
            .await
            .expect("record outcome");
        assert_eq!(session.topic, "3rd Grade");
        assert_eq!(session.difficulty, round + 1);
    }

    let promoted = tracker
        .record_outcome(id, true)
        .await
        .expect("record outcome");
    assert_eq!(promoted.topic, "4th Grade");
    assert_eq!(promoted.difficulty, 1);
}

#[tokio::test]
async fn test_wrong_answers_floor_at_minimum() {
    let tracker = grades_tracker();
    let id = tracker.create_session().await.expect("create session").id;

    for _ in 0..5 {
        let session = tracker
            .record_outcome(id, false)
            .await
            .expect("record outcome");
        assert_eq!(session.difficulty, MIN_DIFFICULTY);
        assert_eq!(session.topic, "3rd Grade");
    }
}

#[tokio::test]
async fn test_terminal_topic_clamps_at_maximum() {
    // The course ladder promotes at 10 and resets to 8, so a long run of
    // correct answers climbs through every course and then pegs.
    let tracker = ProgressTracker::new(Ladder::course_topics(), None);
    let id = tracker.create_session().await.expect("create session").id;

    let mut session = tracker.session(id).await.expect("session");
    for _ in 0..30 {
        session = tracker
            .record_outcome(id, true)
            .await
            .expect("record outcome");
    }

    assert_eq!(session.topic, "Calculus");
    assert_eq!(session.difficulty, MAX_DIFFICULTY);

    // Further correct answers are a topic no-op with difficulty pinned.
    let after = tracker
        .record_outcome(id, true)
        .await
        .expect("record outcome");
    assert_eq!(after.topic, "Calculus");
    assert_eq!(after.difficulty, MAX_DIFFICULTY);
}

#[tokio::test]
async fn test_step_walkthrough_is_final_exactly_at_end() {
    let tracker = grades_tracker();
    let id = tracker.create_session().await.expect("create session").id;

    tracker
        .store_steps(
            id,
            vec!["One".to_string(), "Two".to_string(), "Three".to_string()],
        )
        .await
        .expect("store steps");

    let mut observed = Vec::new();
    for _ in 0..5 {
        let advance = tracker.advance_step(id).await.expect("advance step");
        observed.push((advance.step, advance.is_final));
    }

    assert_eq!(observed[0], ("One".to_string(), false));
    assert_eq!(observed[1], ("Two".to_string(), false));
    assert_eq!(observed[2], ("Three".to_string(), true));
    assert_eq!(observed[3], (ALL_STEPS_COMPLETE.to_string(), true));
    assert_eq!(observed[4], (ALL_STEPS_COMPLETE.to_string(), true));
}

#[tokio::test]
async fn test_unknown_session_is_a_client_error_everywhere() {
    let tracker = grades_tracker();
    let ghost = tracker.create_session().await.expect("create session").id;
    let tracker = grades_tracker(); // fresh tracker that never saw `ghost`

    let lookups = [
        tracker.session(ghost).await.err(),
        tracker.record_outcome(ghost, true).await.err(),
        tracker.store_steps(ghost, vec![]).await.err(),
        tracker.add_system_note(ghost, "note").await.err(),
    ];
    for error in lookups {
        let error = error.expect("operation must fail");
        assert!(matches!(error, TrackerError::SessionNotFound { .. }));
        assert!(error.is_client_error());
    }

    let advance = tracker.advance_step(ghost).await.err();
    assert!(matches!(
        advance.expect("operation must fail"),
        TrackerError::SessionNotFound { .. }
    ));
}

#[tokio::test]
async fn test_keyword_estimate_moves_topic_without_promotion() {
    let tracker = grades_tracker();
    let estimator = KeywordEstimator::new(tracker.ladder());
    let id = tracker.create_session().await.expect("create session").id;

    let turn = tracker
        .record_turn(
            id,
            "geometry is too hard for me",
            "Let's slow down and try an easier angle problem.",
            &estimator,
        )
        .await
        .expect("record turn");

    // The topic follows the keyword, difficulty steps down within its
    // floor, and no promotion logic runs.
    assert_eq!(turn.session.topic, "Geometry");
    assert_eq!(turn.session.difficulty, MIN_DIFFICULTY);
    assert_eq!(turn.session.history.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_outcomes_on_one_session_serialize() {
    // Property: a correct and a wrong outcome racing on a difficulty-5
    // session must both land. Whichever applies first observes 6 or 4;
    // the other steps back to 5, which is also the final value. A lost
    // update would return (6, 4) and leave the counter off 5.
    for _ in 0..10 {
        let tracker = Arc::new(ProgressTracker::new(Ladder::course_topics(), None));
        let id = tracker.create_session().await.expect("create session").id;

        let up = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.record_outcome(id, true).await }
        });
        let down = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.record_outcome(id, false).await }
        });

        let up = up.await.expect("join").expect("outcome").difficulty;
        let down = down.await.expect("join").expect("outcome").difficulty;
        assert!(
            (up, down) == (6, 5) || (up, down) == (5, 4),
            "snapshots were ({up}, {down})"
        );

        let session = tracker.session(id).await.expect("session");
        assert_eq!(session.difficulty, 5, "an update was lost");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_walks_on_separate_sessions() {
    let tracker = Arc::new(grades_tracker());

    let mut handles = Vec::new();
    for _ in 0..16 {
        handles.push(tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move {
                let id = tracker.create_session().await?.id;
                for _ in 0..7 {
                    tracker.record_outcome(id, true).await?;
                }
                tracker.session(id).await
            }
        }));
    }

    for handle in handles {
        let session = handle.await.expect("join").expect("walk");
        assert_eq!(session.topic, "4th Grade");
        assert_eq!(session.difficulty, 1);
    }

    assert_eq!(tracker.session_count().await, 16);
}
