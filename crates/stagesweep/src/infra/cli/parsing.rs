// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use crate::core::models::{FlushOptions, RuntimeKind};
use crate::infra::cli::parsing::MainCommands::Flush;
use crate::infra::configs::DEFAULT_BUILD_FILE;
use crate::infra::naming::DEFAULT_STAGES_PREFIX;
use crate::stagesweep::{FlushSettings, StagesweepTask};
use anyhow::bail;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

#[derive(Args, Debug)]
#[command(version, about, long_about = None)]
struct FlushArguments {
    /// Build file listing the images whose stages should be flushed
    #[arg(short, long, default_value = DEFAULT_BUILD_FILE)]
    pub config: Utf8PathBuf,

    /// Only report what would be removed
    #[arg(long)]
    pub dry_run: bool,

    /// Remove containers even when they are still running
    #[arg(long)]
    pub force: bool,

    /// Container engine holding the cached stages
    #[arg(long, value_enum, default_value_t = RuntimeKind::Docker)]
    pub runtime: RuntimeKind,

    /// Explicit path to the container engine binary
    #[arg(long)]
    pub runtime_binary: Option<String>,

    /// Repository prefix shared by all stage images
    #[arg(long, default_value = DEFAULT_STAGES_PREFIX)]
    pub stages_prefix: String,

    /// Skip per-namespace progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_colors: bool,

    /// Emit diagnostic logs
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = false)]
struct CliParser {
    #[command(subcommand)]
    pub command: MainCommands,
}

#[derive(Subcommand)]
enum MainCommands {
    /// Remove locally cached stage containers and images for every configured image
    Flush(FlushArguments),
}

pub fn parse_arguments() -> anyhow::Result<StagesweepTask> {
    let cli = CliParser::parse();
    evaluate(cli)
}

fn evaluate(cli: CliParser) -> anyhow::Result<StagesweepTask> {
    let task = match cli.command {
        Flush(args) => {
            if !args.config.exists() {
                bail!("stagesweep.cli : no such build file ({})", args.config)
            }

            let runtime_binary = args
                .runtime_binary
                .unwrap_or_else(|| args.runtime.default_binary().to_string());

            let settings = FlushSettings {
                build_file: args.config,
                options: FlushOptions {
                    dry_run: args.dry_run,
                    force: args.force,
                },
                runtime_binary,
                stages_prefix: args.stages_prefix,
                quiet: args.quiet,
                use_colors: !args.no_colors,
                verbose: args.verbose,
            };

            StagesweepTask::FlushLocalStages(settings)
        },
    };

    Ok(task)
}
