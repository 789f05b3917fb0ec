// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

pub mod flushing;

use crate::core::models::FlushOptions;
use camino::Utf8PathBuf;
use std::process::ExitCode;

#[derive(Debug, PartialEq)]
pub enum StagesweepTask {
    FlushLocalStages(FlushSettings),
}

impl StagesweepTask {
    pub fn verbose(&self) -> bool {
        match self {
            StagesweepTask::FlushLocalStages(settings) => settings.verbose,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct FlushSettings {
    pub build_file: Utf8PathBuf,
    pub options: FlushOptions,
    pub runtime_binary: String,
    pub stages_prefix: String,
    pub quiet: bool,
    pub use_colors: bool,
    pub verbose: bool,
}

#[derive(Debug, PartialEq)]
pub enum RunOutcome {
    Clean,
    CompletedWithFailures,
    Aborted,
}

impl RunOutcome {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RunOutcome::Clean => ExitCode::SUCCESS,
            RunOutcome::CompletedWithFailures => ExitCode::from(1),
            RunOutcome::Aborted => ExitCode::from(2),
        }
    }
}
