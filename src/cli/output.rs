//! Output formatting for CLI commands.
//!
//! This module handles formatting output as either JSON or human-readable text.

use std::path::Path;

use concierge::integrations::IntegrationId;
use concierge::{MetricsSnapshot, QueryResult, StatusReport};
use serde::Serialize;

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Print a query result.
pub fn print_result(result: &QueryResult, json: bool) {
    if json {
        print_json(result);
        return;
    }

    println!("{}", result.answer);

    if result.degraded_ai {
        println!("\n⚠️  AI unavailable: showing results without AI processing.");
    }
    if !result.warnings.is_empty() {
        println!();
        for warning in &result.warnings {
            println!("⚠️  {}", warning);
        }
    }
    if !result.suggestions.is_empty() {
        println!("\n💡 Try:");
        for suggestion in &result.suggestions {
            println!("   {}", suggestion);
        }
    }
    if result.stats.timed_out {
        println!("\n⏱️  Some data sources did not respond in time.");
    }
}

/// Print the status report with a metrics snapshot.
pub fn print_status(report: &StatusReport, metrics: &MetricsSnapshot, json: bool) {
    if json {
        print_json(&serde_json::json!({
            "status": report,
            "metrics": metrics,
        }));
        return;
    }

    println!("{}", report.render());
    println!("\n📊 Session:");
    println!("  Queries:        {}", metrics.queries_total);
    match metrics.cache_hit_ratio() {
        Some(ratio) => println!("  Cache hit rate: {:.0}%", ratio * 100.0),
        None => println!("  Cache hit rate: n/a"),
    }
    println!("  AI failovers:   {}", metrics.ai_failovers_total);
    println!("  Uptime:         {}s", metrics.uptime_seconds);
}

/// Confirm a cache refresh from interactive mode.
pub fn print_refresh(integration: Option<IntegrationId>, json: bool) {
    let scope = integration.map_or("all integrations", |id| id.display_name());
    if json {
        print_json(&serde_json::json!({ "refreshed": scope }));
        return;
    }
    println!("🔄 Cleared cached data for {}.\n", scope);
}

/// Print the outcome of the setup command.
pub fn print_setup(path: &Path, written: bool, json: bool) {
    if json {
        print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "written": written,
        }));
        return;
    }

    if !written {
        println!(
            "Configuration already exists at {} (use --force to overwrite).",
            path.display()
        );
        return;
    }

    println!("✅ Wrote configuration template to {}", path.display());
    println!("\nNext steps:");
    println!("  • export GOOGLE_ACCESS_TOKEN=...   (Gmail, Calendar, Drive)");
    println!("  • export GITHUB_TOKEN=...          (GitHub)");
    println!("  • start a local model server on http://localhost:1234/v1,");
    println!("    or set ai_provider = \"cloud\" and export OPENAI_API_KEY=...");
    println!("  • run `concierge status` to check connections");
}
