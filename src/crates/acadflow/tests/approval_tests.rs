//! Integration tests for the submission and approval gate

mod common;

use acadflow::models::{Deadline, StepKey, SubmissionKind, WorkflowType};
use acadflow::services::{Relationship, StaticRoleResolver};
use acadflow::{AcadflowError, Verdict};
use common::{instant, TestEnv, ADMIN, ADVISOR, SEMESTER, YEAR};

async fn locked_activity(env: &TestEnv) -> Deadline {
    env.seed_internship().await;
    let deadline = env
        .publish_deadline("Final report", "2026-03-10T23:59:59Z", 2880, true)
        .await;
    env.start_on_report("a-1").await;
    let summary = env.engine().run_at(instant("2026-03-14T01:59:59Z")).await;
    assert_eq!(summary.activities_transitioned(), 1);
    deadline
}

#[tokio::test]
async fn test_new_activity_accepts_submissions() {
    let env = TestEnv::new().await;
    env.seed_internship().await;
    env.start_on_report("a-1").await;

    assert!(env.approvals.can_submit("a-1").await.unwrap());
    assert!(env.approvals.can_approve("a-1", ADMIN).await.unwrap());
    assert!(!env.approvals.can_approve("a-1", "someone-else").await.unwrap());
}

#[tokio::test]
async fn test_advisors_may_approve_their_own_activities() {
    let env = TestEnv::new().await;
    env.seed_internship().await;
    env.start_on_report("a-1").await;
    env.start_on_report("a-2").await;

    let approvals = env.approvals_with(
        StaticRoleResolver::new()
            .with_relationship(ADVISOR, "a-1", Relationship::Advisor)
            .with_relationship("co-advisor", "a-1", Relationship::CoAdvisor)
            .with_relationship("student-1", "a-1", Relationship::Student),
    );

    assert!(approvals.can_approve("a-1", ADVISOR).await.unwrap());
    assert!(approvals.can_approve("a-1", "co-advisor").await.unwrap());
    assert!(!approvals.can_approve("a-1", "student-1").await.unwrap());
    assert!(!approvals.can_approve("a-2", ADVISOR).await.unwrap());
}

#[tokio::test]
async fn test_override_lifts_the_lock() {
    let env = TestEnv::new().await;
    locked_activity(&env).await;
    assert!(!env.approvals.can_submit("a-1").await.unwrap());

    // Staying on the overdue step, but without a governing deadline
    let state = env
        .approvals
        .staff_override("a-1", &StepKey::new("report_overdue"), ADMIN)
        .await
        .unwrap();
    assert_eq!(state.governing_deadline_id, None);
    assert_eq!(state.updated_by, ADMIN);
    assert!(env.approvals.can_submit("a-1").await.unwrap());
}

#[tokio::test]
async fn test_unlocking_the_deadline_reopens_submissions() {
    let env = TestEnv::new().await;
    let deadline = locked_activity(&env).await;

    let mut relaxed = deadline.clone();
    relaxed.lock_after_deadline = false;
    env.deadlines.update(relaxed).await.unwrap();

    assert_eq!(env.current_step("a-1").await, "report_overdue");
    assert!(env.approvals.can_submit("a-1").await.unwrap());
}

#[tokio::test]
async fn test_override_requires_staff() {
    let env = TestEnv::new().await;
    locked_activity(&env).await;

    let approvals = env.approvals_with(
        StaticRoleResolver::new().with_relationship("student-1", "a-1", Relationship::Student),
    );
    let err = approvals
        .staff_override("a-1", &StepKey::new("report"), "student-1")
        .await
        .unwrap_err();
    assert!(matches!(err, AcadflowError::Unauthorized { action: "override", .. }));
    assert_eq!(env.current_step("a-1").await, "report_overdue");
}

#[tokio::test]
async fn test_override_to_unknown_step_fails() {
    let env = TestEnv::new().await;
    env.seed_internship().await;
    env.start_on_report("a-1").await;

    let err = env
        .approvals
        .staff_override("a-1", &StepKey::new("graduation"), ADMIN)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = env
        .approvals
        .staff_override("missing", &StepKey::new("report"), ADMIN)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_submission_verdicts_follow_the_deadline() {
    let env = TestEnv::new().await;
    env.seed_internship().await;
    let deadline = env
        .publish_deadline("Final report", "2026-03-15T23:59:59Z", 2880, true)
        .await;
    env.start_on_report("a-1").await;

    let cases = [
        ("2026-03-15T23:59:59Z", Verdict::OnTime),
        ("2026-03-17T23:59:59Z", Verdict::Late),
        ("2026-03-18T00:00:00Z", Verdict::Overdue),
    ];
    for (at, expected) in cases {
        let submission = env
            .approvals
            .record_submission("a-1", &deadline.deadline_id, SubmissionKind::DefenseRequest, instant(at))
            .await
            .unwrap();
        assert_eq!(submission.verdict, expected, "submitted at {}", at);
    }
}

#[tokio::test]
async fn test_unpublished_deadline_never_marks_late() {
    let env = TestEnv::new().await;
    env.seed_internship().await;
    let draft = env
        .deadlines
        .create(
            Deadline::new("Draft", WorkflowType::Internship, YEAR, SEMESTER)
                .with_deadline_at("2026-03-01T00:00:00Z")
                .with_lock(true),
        )
        .await
        .unwrap();
    env.start_on_report("a-1").await;

    let submission = env
        .approvals
        .record_submission("a-1", &draft.deadline_id, SubmissionKind::Document, instant("2026-06-01T00:00:00Z"))
        .await
        .unwrap();
    assert_eq!(submission.verdict, Verdict::OnTime);
}

#[tokio::test]
async fn test_submission_against_wrong_track_is_rejected() {
    let env = TestEnv::new().await;
    env.seed_internship().await;
    let project_deadline = env
        .deadlines
        .create(
            Deadline::new("Proposal", WorkflowType::ProjectPhase1, YEAR, SEMESTER)
                .with_deadline_at("2026-03-01T00:00:00Z")
                .published(),
        )
        .await
        .unwrap();
    env.start_on_report("a-1").await;

    let err = env
        .approvals
        .record_submission("a-1", &project_deadline.deadline_id, SubmissionKind::Document, instant("2026-02-01T00:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, AcadflowError::InvalidInput(_)));

    let err = env
        .approvals
        .record_submission("a-1", "no-such-deadline", SubmissionKind::Document, instant("2026-02-01T00:00:00Z"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = env.approvals.can_submit("unknown").await.unwrap_err();
    assert!(err.is_not_found());
}
