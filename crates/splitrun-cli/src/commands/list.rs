//! List command - show cases and their suite

use super::{GlobalOptions, Workspace};
use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use serde_json::json;
use splitrun_harness::{Partition, SuiteKind, TestRegistry};

/// Which cases `list` shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SuiteChoice {
    Unit,
    Functional,
    All,
}

impl SuiteChoice {
    fn includes(self, kind: SuiteKind) -> bool {
        match self {
            SuiteChoice::Unit => kind == SuiteKind::Unit,
            SuiteChoice::Functional => kind == SuiteKind::Functional,
            SuiteChoice::All => true,
        }
    }
}

/// Case names with their suite, in name order
pub fn classify<'r>(
    registry: &'r TestRegistry,
    partition: &Partition,
    choice: SuiteChoice,
) -> Vec<(&'r str, SuiteKind)> {
    registry
        .names()
        .map(|name| (name, partition.classify(name)))
        .filter(|(_, kind)| choice.includes(*kind))
        .collect()
}

pub fn run(options: &GlobalOptions, choice: SuiteChoice) -> Result<()> {
    let workspace = Workspace::load(options)?;
    let pipeline = &workspace.pipeline;
    let cases = classify(pipeline.registry(), pipeline.partition(), choice);

    if options.json {
        let entries: Vec<_> = cases
            .iter()
            .map(|(name, kind)| json!({ "name": name, "suite": kind }))
            .collect();
        println!(
            "{}",
            json!({
                "functional_pattern": pipeline.partition().functional_pattern().as_str(),
                "cases": entries,
            })
        );
        return Ok(());
    }

    if options.colors_disabled(&workspace.config) {
        colored::control::set_override(false);
    }
    workspace.print_problems();

    if cases.is_empty() {
        println!("{}", "No tests found.".yellow());
        return Ok(());
    }

    for (name, kind) in &cases {
        let label = match kind {
            SuiteKind::Unit => "unit      ".cyan(),
            SuiteKind::Functional => "functional".magenta(),
        };
        println!("{}  {}", label, name);
    }
    println!();
    println!(
        "{} case{} (functional pattern: {})",
        cases.len().to_string().bold(),
        if cases.len() == 1 { "" } else { "s" },
        pipeline.partition().functional_pattern()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TestRegistry {
        let mut registry = TestRegistry::new();
        for name in ["LoginTest", "LoginFunctionalTest", "CheckoutFunctionalTest"] {
            registry.register_fn(name, |_| Ok(())).unwrap();
        }
        registry
    }

    #[test]
    fn test_classify_by_choice() {
        let registry = registry();
        let partition = Partition::default();

        assert_eq!(classify(&registry, &partition, SuiteChoice::All).len(), 3);
        assert_eq!(
            classify(&registry, &partition, SuiteChoice::Unit),
            vec![("LoginTest", SuiteKind::Unit)]
        );
        assert_eq!(
            classify(&registry, &partition, SuiteChoice::Functional),
            vec![
                ("CheckoutFunctionalTest", SuiteKind::Functional),
                ("LoginFunctionalTest", SuiteKind::Functional),
            ]
        );
    }
}
