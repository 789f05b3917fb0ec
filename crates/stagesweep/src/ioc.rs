// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use crate::core::flushers::combined::StagesFlusher;
use crate::core::flushers::standalone::{ContainerRuntimeClient, ProgressNotifier, StageCacheResolver};
use crate::infra::configs::BuildConfigsLoader;
use crate::infra::naming::StagesNamingScheme;
use crate::infra::reporting::console::ConsoleReporter;
use crate::infra::runtime::ContainerCli;
use crate::stagesweep::FlushSettings;
use crate::stagesweep::flushing::LocalStagesFlushing;

fn stages_resolver(settings: &FlushSettings) -> StageCacheResolver {
    let delegate = StagesNamingScheme::new(settings.stages_prefix.clone());
    StageCacheResolver::PrefixedRepository(delegate)
}

fn runtime_client(settings: &FlushSettings) -> ContainerRuntimeClient {
    let delegate = ContainerCli::new(settings.runtime_binary.clone());
    ContainerRuntimeClient::CommandLine(delegate)
}

fn progress_notifier(settings: &FlushSettings, reporter: ConsoleReporter) -> ProgressNotifier {
    match settings.quiet {
        true => ProgressNotifier::Silent,
        false => ProgressNotifier::Console(reporter),
    }
}

pub fn create_local_stages_flushing(settings: &FlushSettings) -> LocalStagesFlushing {
    let reporter = ConsoleReporter::new(settings.use_colors);
    let flusher = StagesFlusher::new(
        stages_resolver(settings),
        runtime_client(settings),
        progress_notifier(settings, reporter),
    );
    let configs_loader = BuildConfigsLoader::new(settings.build_file.clone());
    LocalStagesFlushing::new(configs_loader, flusher, reporter)
}
