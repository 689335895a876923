//! CLI command handlers.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use concierge::integrations::IntegrationId;
use concierge::{get_metrics, Config, Dispatcher};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::output;

const EXIT_WORDS: &[&str] = &["exit", "quit", "q"];
const REFRESH_WORD: &str = "refresh";

/// Run the query command.
pub async fn run_query(dispatcher: &Dispatcher, query: String, json_output: bool) -> Result<()> {
    let result = dispatcher.process(&query).await;
    output::print_result(&result, json_output);
    Ok(())
}

/// Run the interactive command: one query per line until EOF or "exit".
pub async fn run_interactive(dispatcher: &Dispatcher, json_output: bool) -> Result<()> {
    if !json_output {
        println!("🤖 Concierge interactive mode. Type 'help' for examples, 'exit' to quit.");
        println!("   'refresh [mail|github|calendar|drive]' drops cached data.\n");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !json_output {
            print!("concierge> ");
            std::io::stdout().flush().context("Failed to flush stdout")?;
        }

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&query.to_lowercase().as_str()) {
            break;
        }

        if let Some(target) = refresh_target(query) {
            match target {
                Ok(integration) => {
                    dispatcher.refresh(integration);
                    output::print_refresh(integration, json_output);
                }
                Err(name) => eprintln!("Unknown integration '{}'", name),
            }
            continue;
        }

        let result = dispatcher.process(query).await;
        output::print_result(&result, json_output);
        if !json_output {
            println!();
        }
    }

    if !json_output {
        println!("👋 Goodbye!");
    }
    Ok(())
}

/// `refresh` clears the whole cache, `refresh <name>` one integration.
/// `None` when the line is not a refresh command.
fn refresh_target(line: &str) -> Option<std::result::Result<Option<IntegrationId>, String>> {
    let mut words = line.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case(REFRESH_WORD) {
        return None;
    }
    let rest = words.collect::<Vec<_>>().join(" ");
    if rest.is_empty() {
        return Some(Ok(None));
    }
    Some(IntegrationId::from_name(&rest).map(Some).ok_or(rest))
}

/// Run the status command.
pub async fn run_status(dispatcher: &Dispatcher, prometheus: bool, json_output: bool) -> Result<()> {
    let report = dispatcher.status_report().await;
    let metrics = get_metrics();
    output::print_status(&report, &metrics.snapshot(), json_output);
    if prometheus {
        print!("{}", metrics.export_prometheus());
    }
    Ok(())
}

/// Run the setup command: write a configuration template.
pub fn run_setup(output_path: Option<String>, force: bool, json_output: bool) -> Result<()> {
    let path = output_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    if path.exists() && !force {
        output::print_setup(&path, false, json_output);
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let template = Config::default().to_toml()?;
    std::fs::write(&path, template)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Wrote configuration template to {}", path.display());
    output::print_setup(&path, true, json_output);
    Ok(())
}
