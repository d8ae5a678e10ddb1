//! Step catalogue command handlers

use super::CliContext;
use crate::error::Result;
use crate::models::{PhaseVariant, StepDefinition, StepKey, WorkflowType};
use colored::Colorize;
use tabled::{Table, Tabled};

/// Step display row for table output
#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "Order")]
    order: i64,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Variant")]
    variant: String,
    #[tabled(rename = "Depends On")]
    dependencies: String,
    #[tabled(rename = "Required")]
    required: String,
}

/// Usage display row for table output
#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "Order")]
    order: i64,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Active")]
    active: i64,
}

/// Arguments of `step add`
#[derive(Debug, Clone)]
pub struct NewStep {
    pub workflow_type: String,
    pub key: String,
    pub order: i64,
    pub title: String,
    pub phase: Option<String>,
    pub variant: Option<String>,
    pub depends_on: Vec<String>,
    pub description: Option<String>,
    pub optional: bool,
}

/// Handle step list command
pub async fn handle_list(ctx: &CliContext, workflow_type: String) -> Result<()> {
    let workflow_type: WorkflowType = workflow_type.parse()?;
    let steps = ctx.step_service().list(workflow_type).await?;

    if steps.is_empty() {
        println!("{}", format!("No steps defined for {}", workflow_type).yellow());
        return Ok(());
    }

    let rows: Vec<StepRow> = steps
        .into_iter()
        .map(|step| StepRow {
            order: step.step_order,
            key: step.step_key.to_string(),
            title: step.title,
            phase: step.phase_key,
            variant: step.phase_variant.to_string(),
            dependencies: if step.dependencies.is_empty() {
                "-".to_string()
            } else {
                step.dependencies
                    .iter()
                    .map(StepKey::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            },
            required: if step.is_required { "yes" } else { "no" }.to_string(),
        })
        .collect();

    let count = rows.len();
    println!("{}", Table::new(rows));
    println!("\n{} {} step(s)", workflow_type.to_string().cyan(), count);

    Ok(())
}

/// Handle step add command
pub async fn handle_add(ctx: &CliContext, new_step: NewStep) -> Result<()> {
    let workflow_type: WorkflowType = new_step.workflow_type.parse()?;
    let variant = match new_step.variant.as_deref() {
        Some(variant) => variant.parse()?,
        None => PhaseVariant::Normal,
    };
    let phase = new_step.phase.unwrap_or_else(|| new_step.key.clone());

    let mut step = StepDefinition::new(workflow_type, new_step.key, new_step.order, new_step.title, phase)
        .with_variant(variant)
        .with_dependencies(new_step.depends_on);
    if let Some(description) = new_step.description {
        step = step.with_description(description);
    }
    if new_step.optional {
        step = step.optional();
    }

    let created = ctx.step_service().create_step(step).await?;

    println!("{}", "✓ Step created successfully".green().bold());
    println!("  Key: {}", created.step_key);
    println!("  Order: {}", created.step_order);
    println!("  Phase: {} ({})", created.phase_key, created.phase_variant);

    Ok(())
}

/// Handle step remove command
pub async fn handle_remove(ctx: &CliContext, workflow_type: String, key: String) -> Result<()> {
    let workflow_type: WorkflowType = workflow_type.parse()?;
    ctx.step_service()
        .delete_step(workflow_type, &StepKey::new(key.clone()))
        .await?;

    println!("{}", format!("✓ Step {} removed from {}", key, workflow_type).green().bold());
    Ok(())
}

/// Handle step reorder command
pub async fn handle_reorder(ctx: &CliContext, workflow_type: String, keys: Vec<String>) -> Result<()> {
    let workflow_type: WorkflowType = workflow_type.parse()?;
    let new_order = keys.into_iter().map(StepKey::new).collect();
    let steps = ctx.step_service().reorder(workflow_type, new_order).await?;

    println!("{}", "✓ Steps reordered successfully".green().bold());
    for step in steps {
        println!("  {}. {}", step.step_order, step.step_key);
    }

    Ok(())
}

/// Handle step usage command
pub async fn handle_usage(ctx: &CliContext, workflow_type: String) -> Result<()> {
    let workflow_type: WorkflowType = workflow_type.parse()?;
    let usage = ctx.step_service().usage(workflow_type).await?;

    if usage.is_empty() {
        println!("{}", format!("No steps defined for {}", workflow_type).yellow());
        return Ok(());
    }

    let total: i64 = usage.iter().map(|u| u.active_count).sum();
    let rows: Vec<UsageRow> = usage
        .into_iter()
        .map(|u| UsageRow {
            order: u.step_order,
            key: u.step_key.to_string(),
            active: u.active_count,
        })
        .collect();

    println!("{}", Table::new(rows));
    println!("\n{} active activit(ies) in {}", total, workflow_type.to_string().cyan());

    Ok(())
}
