//! `nbr` subcommand implementations.
//!
//! Each `run_*` function drives one [`QueryService`] operation and prints its
//! result to stdout. Diagnostics go through `tracing` to stderr.

use anyhow::Result;
use notebook_router_core::models::QueryMode;
use std::path::Path;

use crate::service::{AskRequest, QueryService};

/// Options for `nbr ask`.
pub struct AskOptions {
    pub notebook: Option<String>,
    pub conversation_id: Option<String>,
    pub mode: QueryMode,
    pub json: bool,
}

pub async fn run_ask(service: &QueryService, question: &str, options: AskOptions) -> Result<()> {
    let request = AskRequest {
        question: question.to_string(),
        notebook_id: options.notebook,
        conversation_id: options.conversation_id,
        mode: options.mode,
    };

    let result = service.answer(&request).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.answer);
    println!();
    if let Some(notebook) = &result.notebook_used {
        println!("notebook:        {}", notebook);
    }
    if let Some(cid) = &result.conversation_id {
        println!("conversation_id: {}", cid);
    }
    if let Some(citations) = &result.citations {
        println!("citations:       {}", citations);
    }
    Ok(())
}

pub async fn run_classify(service: &QueryService, question: &str) -> Result<()> {
    let category = service.classifier().classify(question).await;
    let notebook = match service.registry().route(category) {
        Some((id, false)) => id.to_string(),
        Some((id, true)) => format!("{} (fallback)", id),
        None => "-".to_string(),
    };
    println!("{:<16} {}", "CATEGORY", "NOTEBOOK");
    println!("{:<16} {}", category.label(), notebook);
    Ok(())
}

pub async fn run_notebooks(service: &QueryService) -> Result<()> {
    let notebooks = service.list_notebooks().await?;
    if notebooks.is_empty() {
        println!("No notebooks.");
        return Ok(());
    }

    println!("{:<38} {:<40} {:>7}  UPDATED", "ID", "TITLE", "SOURCES");
    for nb in &notebooks {
        println!(
            "{:<38} {:<40} {:>7}  {}",
            nb.id, nb.title, nb.source_count, nb.updated
        );
    }
    Ok(())
}

pub async fn run_sources(service: &QueryService, notebook: Option<&str>) -> Result<()> {
    let sources = service.list_sources(notebook).await;
    println!("{}", serde_json::to_string_pretty(&sources)?);
    Ok(())
}

pub async fn run_add_source(
    service: &QueryService,
    path: &Path,
    notebook: Option<&str>,
) -> Result<()> {
    let source_id = service.add_source(path, notebook).await?;
    println!("{}", source_id);
    Ok(())
}

pub fn run_bindings(service: &QueryService) -> Result<()> {
    let registry = service.registry();

    println!("{:<20} {:<20} NOTEBOOK", "CATEGORY", "PRODUCT");
    for (category, notebook) in registry.bindings() {
        println!(
            "{:<20} {:<20} {}",
            category.label(),
            category.product_name().unwrap_or("-"),
            notebook.unwrap_or("-")
        );
    }
    println!();
    println!("default: {}", registry.default_notebook().unwrap_or("-"));
    for warning in registry.warnings() {
        println!("warning: {}", warning);
    }
    Ok(())
}

/// Print the health status. Returns whether the service is ready.
pub async fn run_health(service: &QueryService) -> Result<bool> {
    let health = service.health_check().await;
    println!(
        "{:<8} {}",
        if health.ok { "OK" } else { "FAIL" },
        health.message
    );
    Ok(health.ok)
}
