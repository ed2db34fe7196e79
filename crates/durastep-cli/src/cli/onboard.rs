//! `durastep onboard` command handler.

use std::sync::Arc;

use console::style;
use uuid::Uuid;

use super::OutputMode;
use crate::onboarding::{ConsoleSink, run_onboarding};
use crate::state::AppState;

/// Run or resume one onboarding run.
pub async fn onboard(
    state: &AppState,
    run_id: Option<String>,
    employee: String,
    crash_in: Option<String>,
    output: OutputMode,
) -> anyhow::Result<()> {
    let run_id = run_id.unwrap_or_else(|| Uuid::now_v7().to_string());
    let ctx = state.engine.new_context(run_id.as_str());

    tracing::info!(run_id = %run_id, employee = %employee, "starting onboarding run");

    let styled = output == OutputMode::Styled;
    if styled {
        println!();
        println!("  Onboarding {} (run {})", style(&employee).bold(), style(&run_id).dim());
    }

    let sink = Arc::new(ConsoleSink::new(crash_in, !styled));
    let summary = run_onboarding(&ctx, &employee, sink).await?;

    if output == OutputMode::Json {
        let value = serde_json::json!({
            "run_id": run_id,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    if output == OutputMode::Silent {
        return Ok(());
    }

    println!();
    println!(
        "  {} Onboarded {} as {}",
        style("✓").green().bold(),
        style(&summary.employee.name).bold(),
        summary.employee.employee_id
    );
    println!("  Laptop:  {}", summary.laptop.reference);
    println!("  Access:  {}", summary.access.reference);
    println!("  Email:   {}", summary.email_to);
    println!();

    Ok(())
}
