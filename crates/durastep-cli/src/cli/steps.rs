//! `durastep steps` and `durastep runs` command handlers.

use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use durastep_core::repository::checkpoint::CheckpointStore;
use durastep_types::step::{RunId, StepRecord, StepStatus};

use super::OutputMode;
use crate::state::AppState;

/// Show every checkpointed step of one run.
pub async fn list_steps(
    state: &AppState,
    run_id: &str,
    output: OutputMode,
) -> anyhow::Result<()> {
    let steps = state.engine.store().list_steps(&RunId::new(run_id)).await?;

    if output == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
        return Ok(());
    }
    if output == OutputMode::Silent {
        return Ok(());
    }

    if steps.is_empty() {
        println!();
        println!("  No checkpoints for run {}.", style(run_id).bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::White),
            Cell::new("Status").fg(Color::White),
            Cell::new("Output").fg(Color::White),
            Cell::new("Completed").fg(Color::White),
        ]);

    for step in &steps {
        table.add_row(step_row(step));
    }

    println!();
    println!("  Run {}", style(run_id).bold());
    println!("{table}");
    println!();

    Ok(())
}

fn step_row(step: &StepRecord) -> Vec<Cell> {
    let status = match step.status {
        StepStatus::Completed => Cell::new(step.status.as_str()).fg(Color::Green),
        StepStatus::Pending => Cell::new(step.status.as_str()).fg(Color::Yellow),
    };
    let completed = step
        .completed_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    vec![
        Cell::new(&step.step_key).fg(Color::Cyan),
        status,
        Cell::new(truncate(step.output.as_deref().unwrap_or("-"), 48)),
        Cell::new(completed),
    ]
}

/// List runs with their pending/completed counts.
pub async fn list_runs(state: &AppState, output: OutputMode) -> anyhow::Result<()> {
    let runs = state.engine.store().list_runs().await?;

    if output == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }
    if output == OutputMode::Silent {
        return Ok(());
    }

    if runs.is_empty() {
        println!();
        println!("  No runs yet. Start one with: durastep onboard --employee <name>");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Run").fg(Color::White),
            Cell::new("Completed").fg(Color::White),
            Cell::new("Pending").fg(Color::White),
        ]);

    for run in &runs {
        let pending = if run.pending > 0 {
            Cell::new(run.pending).fg(Color::Yellow)
        } else {
            Cell::new(run.pending).fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(run.run_id.as_str()).fg(Color::Cyan),
            Cell::new(run.completed).fg(Color::Green),
            pending,
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_values() {
        assert_eq!(truncate("\"ok\"", 48), "\"ok\"");
    }

    #[test]
    fn truncate_shortens_on_char_boundaries() {
        let out = truncate("ééééé", 3);
        assert_eq!(out, "éé…");
    }
}
