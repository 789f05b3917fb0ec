// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

mod core;
mod infra;
mod ioc;
mod stagesweep;

use crate::infra::cli::parsing::parse_arguments;
use crate::infra::cli::troubleshooting::setup_troubleshooting;
use crate::infra::reporting::console::ConsoleReporter;
use crate::stagesweep::{RunOutcome, StagesweepTask};
use std::process::ExitCode;
use tikv_jemallocator::Jemalloc;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let task = match parse_arguments() {
        Ok(task) => task,
        Err(reason) => {
            ConsoleReporter::default().report_unusable_input(format!("{:#}", reason));
            return RunOutcome::Aborted.exit_code();
        },
    };

    setup_troubleshooting(task.verbose());

    let outcome = match task {
        StagesweepTask::FlushLocalStages(settings) => {
            let flushing = ioc::create_local_stages_flushing(&settings);
            flushing.execute(settings.options).await
        },
    };

    outcome.exit_code()
}
