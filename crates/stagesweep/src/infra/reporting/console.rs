// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use crate::core::models::{FlushReport, NamespaceResult};
use camino::Utf8Path;
use comfy_table::Table;
use console::{StyledObject, style};
use std::fmt::Display;

#[derive(Clone, Copy, Default)]
pub struct ConsoleReporter {
    use_colors: bool,
}

impl ConsoleReporter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    pub fn report_flush_started(&self, build_file: &Utf8Path, dry_run: bool) {
        println!();
        if dry_run {
            println!("Planning stages flush for {} (dry run) ...", self.cyan(build_file));
        } else {
            println!("Flushing local stages for {} ...", self.cyan(build_file));
        }
        println!();
    }

    pub fn namespace_started(&self, base_name: &str) {
        println!("• {} ...", self.cyan(base_name));
    }

    pub fn namespace_finished(&self, result: &NamespaceResult) {
        if let Some(reason) = &result.resolution_failure {
            println!("  {}", self.red(reason));
            return;
        }

        println!(
            "  containers : {} removed, {} failed | images : {} removed, {} failed",
            result.containers_removed, result.containers_failed, result.images_removed, result.images_failed
        );
    }

    pub fn report_flush_outcomes(&self, report: &FlushReport) {
        self.report_results(report.dry_run, &report.results);

        println!();
        println!("Statistics : ");
        println!();
        println!("• namespaces processed : {}", self.cyan(report.results.len()));
        println!("• containers removed : {}", self.cyan(report.total_containers_removed()));
        println!("• images removed : {}", self.cyan(report.total_images_removed()));
        println!("• failures : {}", self.cyan(report.total_failures()));
        println!();

        if report.dry_run {
            println!("{}", self.cyan("Dry run : nothing has been removed"));
        } else if report.has_failures() {
            println!("{}", self.red("Some stages could not be flushed"));
        } else {
            println!("{}", self.cyan("Local stages flushed with success!"));
        }

        println!();
    }

    pub fn report_flush_aborted(&self, base_name: &str, completed: &[NamespaceResult], reason: &anyhow::Error) {
        if !completed.is_empty() {
            self.report_results(false, completed);
        }

        println!();
        println!(
            "{} {} : {:#}",
            self.red("Flush aborted while processing"),
            base_name,
            reason
        );
        println!();
    }

    pub fn report_unusable_input<T: Display>(&self, reason: T) {
        println!();
        println!("{} : {}", self.red("Cannot flush stages"), reason);
        println!();
    }

    fn report_results(&self, dry_run: bool, results: &[NamespaceResult]) {
        if results.is_empty() {
            println!();
            println!("No build configurations to flush");
            return;
        }

        let (removed_containers, removed_images) = match dry_run {
            true => ("Containers to remove", "Images to remove"),
            false => ("Containers removed", "Images removed"),
        };

        let mut table = Table::new();
        table.set_header(vec![
            "Base name",
            "Namespace",
            removed_containers,
            "Containers failed",
            removed_images,
            "Images failed",
        ]);

        results.iter().for_each(|result| {
            let namespace = match &result.namespace {
                Some(namespace) => namespace.to_string(),
                None => "unresolved".to_string(),
            };

            table.add_row(vec![
                result.base_name.clone(),
                namespace,
                result.containers_removed.to_string(),
                result.containers_failed.to_string(),
                result.images_removed.to_string(),
                result.images_failed.to_string(),
            ]);
        });

        println!();
        println!("{table}");

        let failures = results
            .iter()
            .flat_map(|result| {
                let unresolved = result.resolution_failure.iter().cloned();
                let items = result.failures.iter().cloned();
                unresolved
                    .chain(items)
                    .map(move |failure| format!("{} : {}", result.base_name, failure))
            })
            .collect::<Vec<_>>();

        if failures.is_empty() {
            return;
        }

        println!();
        println!("Failures : ");
        println!();
        failures.iter().for_each(|failure| println!("• {}", self.red(failure)));
    }

    fn cyan<T>(&self, what: T) -> StyledObject<T> {
        match self.use_colors {
            true => style(what).cyan(),
            false => style(what),
        }
    }

    fn red<T>(&self, what: T) -> StyledObject<T> {
        match self.use_colors {
            true => style(what).red(),
            false => style(what),
        }
    }
}
