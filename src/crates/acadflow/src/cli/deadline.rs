//! Deadline command handlers

use super::{short_id, CliContext};
use crate::error::Result;
use crate::models::{Deadline, WorkflowType};
use chrono::Utc;
use colored::Colorize;
use tabled::{Table, Tabled};

/// Deadline display row for table output
#[derive(Tabled)]
struct DeadlineRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    related_to: String,
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Deadline")]
    deadline_at: String,
    #[tabled(rename = "Grace (min)")]
    grace: i64,
    #[tabled(rename = "Lock")]
    lock: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Arguments of `deadline add`
#[derive(Debug, Clone)]
pub struct NewDeadline {
    pub name: String,
    pub workflow_type: String,
    pub academic_year: String,
    pub semester: i64,
    pub deadline_at: Option<String>,
    pub timezone: Option<String>,
    pub grace_minutes: i64,
    pub lock: bool,
    pub phase: Option<String>,
    pub publish: bool,
}

fn status_of(deadline: &Deadline) -> String {
    if !deadline.is_published {
        return "draft".to_string();
    }
    match deadline.window() {
        Ok(window) if window.has_passed(Utc::now()) => "passed".red().to_string(),
        Ok(_) => "open".green().to_string(),
        Err(_) => "broken".yellow().to_string(),
    }
}

/// Handle deadline list command
pub async fn handle_list(ctx: &CliContext, academic_year: Option<String>, semester: Option<i64>) -> Result<()> {
    let service = ctx.deadline_service();
    let deadlines = match (academic_year, semester) {
        (Some(year), Some(semester)) => service.list_by_period(&year, semester).await?,
        (Some(year), None) => service
            .list()
            .await?
            .into_iter()
            .filter(|d| d.academic_year == year)
            .collect(),
        _ => service.list().await?,
    };

    if deadlines.is_empty() {
        println!("{}", "No deadlines found".yellow());
        return Ok(());
    }

    let rows: Vec<DeadlineRow> = deadlines
        .iter()
        .map(|deadline| DeadlineRow {
            id: short_id(&deadline.deadline_id),
            name: deadline.name.clone(),
            related_to: match &deadline.phase_key {
                Some(phase) => format!("{} / {}", deadline.related_to, phase),
                None => deadline.related_to.to_string(),
            },
            period: format!("{}/{}", deadline.academic_year, deadline.semester),
            deadline_at: match &deadline.deadline_at {
                Some(at) => format!("{} ({})", at, deadline.timezone),
                None => "-".to_string(),
            },
            grace: deadline.grace_period_minutes,
            lock: if deadline.lock_after_deadline { "yes" } else { "no" }.to_string(),
            status: status_of(deadline),
        })
        .collect();

    let count = rows.len();
    println!("{}", Table::new(rows));
    println!("\nTotal: {} deadline(s)", count);

    Ok(())
}

/// Handle deadline add command
pub async fn handle_add(ctx: &CliContext, new_deadline: NewDeadline) -> Result<()> {
    let workflow_type: WorkflowType = new_deadline.workflow_type.parse()?;

    let mut deadline = Deadline::new(
        new_deadline.name,
        workflow_type,
        new_deadline.academic_year,
        new_deadline.semester,
    )
    .with_grace_minutes(new_deadline.grace_minutes)
    .with_lock(new_deadline.lock);

    if let Some(at) = new_deadline.deadline_at {
        deadline = deadline.with_deadline_at(at);
    }
    if let Some(timezone) = new_deadline.timezone {
        deadline = deadline.with_timezone(timezone);
    }
    if let Some(phase) = new_deadline.phase {
        deadline = deadline.with_phase_key(phase);
    }
    if new_deadline.publish {
        deadline = deadline.published();
    }

    let created = ctx.deadline_service().create(deadline).await?;

    println!("{}", "✓ Deadline created successfully".green().bold());
    println!("  ID: {}", created.deadline_id);
    println!("  Name: {}", created.name);
    if let Ok(window) = created.window() {
        println!("  Deadline: {}", window.deadline_at.to_rfc3339());
        println!("  Effective: {}", window.effective_deadline().to_rfc3339());
    }
    println!("  Published: {}", created.is_published);

    Ok(())
}

/// Handle deadline publish command
pub async fn handle_publish(ctx: &CliContext, id: String) -> Result<()> {
    let deadline = ctx.deadline_service().publish(&id).await?;
    println!("{}", format!("✓ Deadline {} published", deadline.name).green().bold());
    Ok(())
}

/// Handle deadline unpublish command
pub async fn handle_unpublish(ctx: &CliContext, id: String) -> Result<()> {
    ctx.deadline_service().unpublish(&id).await?;
    println!("{}", format!("✓ Deadline {} unpublished", id).green().bold());
    Ok(())
}

/// Handle deadline remove command
pub async fn handle_remove(ctx: &CliContext, id: String) -> Result<()> {
    ctx.deadline_service().delete(&id).await?;
    println!("{}", format!("✓ Deadline {} removed", id).green().bold());
    Ok(())
}
