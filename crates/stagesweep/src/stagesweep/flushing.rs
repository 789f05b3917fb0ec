// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use crate::core::flushers::combined::{FlushError, StagesFlusher};
use crate::core::models::FlushOptions;
use crate::infra::configs::BuildConfigsLoader;
use crate::infra::reporting::console::ConsoleReporter;
use crate::stagesweep::RunOutcome;

pub struct LocalStagesFlushing {
    configs_loader: BuildConfigsLoader,
    flusher: StagesFlusher,
    reporter: ConsoleReporter,
}

impl LocalStagesFlushing {
    pub fn new(configs_loader: BuildConfigsLoader, flusher: StagesFlusher, reporter: ConsoleReporter) -> Self {
        Self {
            configs_loader,
            flusher,
            reporter,
        }
    }

    pub async fn execute(&self, options: FlushOptions) -> RunOutcome {
        self.reporter
            .report_flush_started(self.configs_loader.build_file(), options.dry_run);

        let configs = match self.configs_loader.load() {
            Ok(configs) => configs,
            Err(reason) => {
                log::error!("[stagesweep.flushing] cannot load build configurations : {:#}", reason);
                self.reporter.report_unusable_input(format!("{:#}", reason));
                return RunOutcome::Aborted;
            },
        };

        match self.flusher.flush_local(&configs, options).await {
            Ok(report) => {
                self.reporter.report_flush_outcomes(&report);
                match report.has_failures() {
                    true => RunOutcome::CompletedWithFailures,
                    false => RunOutcome::Clean,
                }
            },
            Err(FlushError::Aborted {
                base_name,
                completed,
                reason,
            }) => {
                self.reporter.report_flush_aborted(&base_name, &completed, &reason);
                RunOutcome::Aborted
            },
            Err(malformed) => {
                self.reporter.report_unusable_input(&malformed);
                RunOutcome::Aborted
            },
        }
    }
}
