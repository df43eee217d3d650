//! Tasks command - describe the pipeline tasks

use super::GlobalOptions;
use anyhow::Result;
use colored::*;
use serde_json::json;
use splitrun_harness::pipeline::task_graph;
use splitrun_tasks::{TaskGraph, TaskNode};
use std::collections::BTreeMap;

pub fn run(options: &GlobalOptions) -> Result<()> {
    let config = options.load_config()?;
    let graph = task_graph(config.project.coverage_enabled());

    if options.json {
        let tasks: Vec<_> = graph
            .tasks_sorted()
            .into_iter()
            .map(|task| {
                json!({
                    "name": task.name,
                    "group": task.group,
                    "description": task.description,
                    "depends_on": task.depends_on,
                    "finalized_by": task.finalized_by,
                })
            })
            .collect();
        println!("{}", json!({ "tasks": tasks }));
        return Ok(());
    }

    if options.colors_disabled(&config) {
        colored::control::set_override(false);
    }
    print!("{}", render(&graph));
    Ok(())
}

/// Tasks grouped like `gradle tasks` output
pub fn render(graph: &TaskGraph) -> String {
    let mut groups: BTreeMap<&str, Vec<&TaskNode>> = BTreeMap::new();
    for task in graph.tasks_sorted() {
        groups
            .entry(task.group.as_deref().unwrap_or("other"))
            .or_default()
            .push(task);
    }

    let mut out = String::new();
    for (group, tasks) in groups {
        let title = format!("{} tasks", capitalize(group));
        out.push_str(&format!("{}\n{}\n", title.bold(), "-".repeat(title.len())));
        for task in tasks {
            out.push_str(&format!(
                "{} - {}\n",
                task.name.green(),
                task.description.as_deref().unwrap_or("")
            ));
            if !task.depends_on.is_empty() {
                out.push_str(&format!("    depends on: {}\n", task.depends_on.join(", ")));
            }
            if !task.finalized_by.is_empty() {
                out.push_str(&format!("    finalized by: {}\n", task.finalized_by.join(", ")));
            }
        }
        out.push('\n');
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_groups_and_edges() {
        colored::control::set_override(false);
        let output = render(&task_graph(true));
        colored::control::unset_override();

        assert!(output.contains("Reporting tasks"));
        assert!(output.contains("Verification tasks"));
        assert!(output.contains("unitTest - Runs unit tests."));
        assert!(output.contains("functionalTest - Runs functional tests."));
        assert!(output.contains("    finalized by: coverageReport"));
        assert!(output.contains("    depends on: test"));
    }
}
