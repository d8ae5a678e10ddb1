//! Activity tracking command handlers

use super::{format_timestamp, parse_instant, short_id, CliContext};
use crate::error::{AcadflowError, Result};
use crate::models::{StepKey, SubmissionKind, WorkflowType};
use crate::timeliness::Verdict;
use chrono::Utc;
use colored::Colorize;
use tabled::{Table, Tabled};

/// Activity display row for table output
#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "Activity")]
    activity_id: String,
    #[tabled(rename = "Type")]
    workflow_type: String,
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Entered")]
    entered: String,
    #[tabled(rename = "Version")]
    version: i64,
    #[tabled(rename = "Active")]
    active: String,
}

/// Submission display row for table output
#[derive(Tabled)]
struct SubmissionRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Deadline")]
    deadline: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Submitted")]
    submitted: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
}

fn colored_verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::OnTime => verdict.to_string().green().to_string(),
        Verdict::Late => verdict.to_string().yellow().to_string(),
        Verdict::Overdue => verdict.to_string().red().to_string(),
    }
}

/// Handle activity start command
pub async fn handle_start(
    ctx: &CliContext,
    activity_id: String,
    workflow_type: String,
    academic_year: String,
    semester: i64,
    step: Option<String>,
) -> Result<()> {
    let workflow_type: WorkflowType = workflow_type.parse()?;
    let state = ctx
        .step_service()
        .start_activity(
            &activity_id,
            workflow_type,
            &academic_year,
            semester,
            step.map(StepKey::new),
        )
        .await?;

    println!("{}", "✓ Activity tracking started".green().bold());
    println!("  Activity: {}", state.activity_id);
    println!("  Type: {}", state.workflow_type);
    println!("  Period: {}/{}", state.academic_year, state.semester);
    println!("  Step: {}", state.current_step_key);

    Ok(())
}

/// Handle activity list command
pub async fn handle_list(ctx: &CliContext, workflow_type: Option<String>) -> Result<()> {
    let workflow_type = workflow_type
        .map(|wt| wt.parse::<WorkflowType>())
        .transpose()?;
    let states = ctx.states().list(workflow_type).await?;

    if states.is_empty() {
        println!("{}", "No activities found".yellow());
        return Ok(());
    }

    let rows: Vec<ActivityRow> = states
        .into_iter()
        .map(|state| ActivityRow {
            activity_id: state.activity_id,
            workflow_type: state.workflow_type.to_string(),
            period: format!("{}/{}", state.academic_year, state.semester),
            step: state.current_step_key.to_string(),
            entered: format_timestamp(state.entered_at),
            version: state.version,
            active: if state.is_active { "yes" } else { "no" }.to_string(),
        })
        .collect();

    let count = rows.len();
    println!("{}", Table::new(rows));
    println!("\nTotal: {} activit(ies)", count);

    Ok(())
}

/// Handle activity show command
pub async fn handle_show(ctx: &CliContext, activity_id: String) -> Result<()> {
    let state = ctx
        .states()
        .find(&activity_id)
        .await?
        .ok_or_else(|| AcadflowError::NotFound(format!("Activity not found: {}", activity_id)))?;
    let step = ctx
        .steps()
        .find_by_key(state.workflow_type, state.current_step_key.as_str())
        .await?;

    println!("{}", format!("Activity {}", state.activity_id).cyan().bold());
    println!("  Type: {}", state.workflow_type);
    println!("  Period: {}/{}", state.academic_year, state.semester);
    match &step {
        Some(step) => println!(
            "  Step: {} - {} ({})",
            step.step_key, step.title, step.phase_variant
        ),
        None => println!(
            "  Step: {} {}",
            state.current_step_key,
            "(not in catalogue)".yellow()
        ),
    }
    println!("  Entered: {}", format_timestamp(state.entered_at));
    println!(
        "  Governing deadline: {}",
        state.governing_deadline_id.as_deref().unwrap_or("-")
    );
    println!("  Version: {} (last write by {})", state.version, state.updated_by);
    println!("  Active: {}", state.is_active);

    let can_submit = ctx.approval_service().can_submit(&activity_id).await?;
    println!(
        "  Submissions: {}",
        if can_submit { "open".green() } else { "locked".red() }
    );

    let submissions = ctx.submissions().list_for_activity(&activity_id).await?;
    if !submissions.is_empty() {
        let rows: Vec<SubmissionRow> = submissions
            .into_iter()
            .map(|s| SubmissionRow {
                id: short_id(&s.submission_id),
                deadline: short_id(&s.deadline_id),
                kind: s.kind.to_string(),
                submitted: format_timestamp(s.submitted_at.timestamp()),
                verdict: colored_verdict(s.verdict),
            })
            .collect();
        println!();
        println!("{}", Table::new(rows));
    }

    Ok(())
}

/// Handle activity submit command
pub async fn handle_submit(
    ctx: &CliContext,
    activity_id: String,
    deadline_id: String,
    kind: String,
    at: Option<String>,
) -> Result<()> {
    let kind: SubmissionKind = kind.parse()?;
    let submitted_at = match at {
        Some(at) => parse_instant(&at)?,
        None => Utc::now(),
    };

    let submission = ctx
        .approval_service()
        .record_submission(&activity_id, &deadline_id, kind, submitted_at)
        .await?;

    println!("{}", "✓ Submission recorded".green().bold());
    println!("  ID: {}", submission.submission_id);
    println!("  Kind: {}", submission.kind);
    println!("  Verdict: {}", colored_verdict(submission.verdict));

    Ok(())
}

/// Handle activity override command
pub async fn handle_override(
    ctx: &CliContext,
    activity_id: String,
    step: String,
    actor: String,
) -> Result<()> {
    let state = ctx
        .approval_service()
        .staff_override(&activity_id, &StepKey::new(step), &actor)
        .await?;

    println!("{}", "✓ Step overridden".green().bold());
    println!("  Activity: {}", state.activity_id);
    println!("  Step: {}", state.current_step_key);
    println!("  Version: {}", state.version);

    Ok(())
}

/// Handle activity close command
pub async fn handle_close(ctx: &CliContext, activity_id: String, actor: String) -> Result<()> {
    let relationship = ctx.approval_service().relationship(&actor, &activity_id).await?;
    if !relationship.is_staff() {
        return Err(AcadflowError::Unauthorized {
            actor,
            action: "close",
            activity_id,
        });
    }

    ctx.states().deactivate(&activity_id, &actor).await?;
    println!("{}", format!("✓ Activity {} closed", activity_id).green().bold());
    Ok(())
}
