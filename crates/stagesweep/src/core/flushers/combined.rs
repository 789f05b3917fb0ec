// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use crate::core::flushers::standalone::{ContainerRuntimeClient, ProgressNotifier, StageCacheResolver};
use crate::core::interfaces::{ContainerRuntime, FlushProgress, NamespaceResolution};
use crate::core::models::{
    BuildConfig, CacheNamespace, ContainerRemoval, FlushOptions, FlushReport, ImageRemoval, NamespaceResult,
};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("build configuration #{position} has no base name")]
    MalformedConfig { position: usize },

    /// The container runtime could not be reached. Holds the results for the namespaces
    /// flushed before the failure; the failing namespace has none.
    #[error("flush aborted while processing {base_name} : {reason:#}")]
    Aborted {
        base_name: String,
        completed: Vec<NamespaceResult>,
        reason: anyhow::Error,
    },
}

pub struct StagesFlusher {
    resolver: StageCacheResolver,
    runtime: ContainerRuntimeClient,
    progress: ProgressNotifier,
}

impl StagesFlusher {
    pub fn new(resolver: StageCacheResolver, runtime: ContainerRuntimeClient, progress: ProgressNotifier) -> Self {
        Self {
            resolver,
            runtime,
            progress,
        }
    }

    pub async fn flush_local(&self, configs: &[BuildConfig], options: FlushOptions) -> Result<FlushReport, FlushError> {
        let base_names = distinct_base_names(configs)?;
        log::info!("[stagesweep.flusher] {} namespace(s) to flush", base_names.len());

        let mut results = Vec::with_capacity(base_names.len());

        for base_name in base_names {
            self.progress.namespace_started(base_name);

            match self.flush_namespace(base_name, options).await {
                Ok(result) => {
                    self.progress.namespace_finished(&result);
                    results.push(result);
                },
                Err(reason) => {
                    log::error!("[stagesweep.flusher] aborting at {} | reason = {:#}", base_name, reason);
                    return Err(FlushError::Aborted {
                        base_name: base_name.to_string(),
                        completed: results,
                        reason,
                    });
                },
            }
        }

        Ok(FlushReport::new(options.dry_run, results))
    }

    async fn flush_namespace(&self, base_name: &str, options: FlushOptions) -> anyhow::Result<NamespaceResult> {
        let namespace = match self.resolver.resolve(base_name) {
            Ok(namespace) => namespace,
            Err(reason) => {
                log::error!("[stagesweep.flusher] cannot resolve namespace for {} : {:#}", base_name, reason);
                return Ok(NamespaceResult::unresolved(base_name, format!("{:#}", reason)));
            },
        };

        let mut result = NamespaceResult::new(base_name, namespace.clone());

        // Images referenced by a container cannot be removed, hence containers go first
        self.flush_containers(&namespace, options, &mut result).await?;
        self.flush_images(&namespace, options, &mut result).await?;

        Ok(result)
    }

    async fn flush_containers(
        &self,
        namespace: &CacheNamespace,
        options: FlushOptions,
        result: &mut NamespaceResult,
    ) -> anyhow::Result<()> {
        let containers = self.runtime.list_containers(namespace).await?;
        log::info!("[stagesweep.flusher] {} container(s) found for {}", containers.len(), namespace);

        for container in containers {
            if options.dry_run {
                log::info!("[stagesweep.flusher] would remove container {}", container);
                result.containers_removed += 1;
                continue;
            }

            match self.runtime.remove_container(&container, options.force).await? {
                ContainerRemoval::Removed => result.containers_removed += 1,
                ContainerRemoval::NotFound => {
                    log::info!("[stagesweep.flusher] container {} already gone", container);
                },
                ContainerRemoval::Busy => {
                    result.containers_failed += 1;
                    result.failures.push(format!("container {} is busy", container));
                },
                ContainerRemoval::Rejected(reason) => {
                    result.containers_failed += 1;
                    result.failures.push(format!("container {} : {}", container, reason));
                },
            }
        }

        Ok(())
    }

    async fn flush_images(
        &self,
        namespace: &CacheNamespace,
        options: FlushOptions,
        result: &mut NamespaceResult,
    ) -> anyhow::Result<()> {
        let images = self.runtime.list_images(namespace).await?;
        log::info!("[stagesweep.flusher] {} image(s) found for {}", images.len(), namespace);

        for image in images {
            if options.dry_run {
                log::info!("[stagesweep.flusher] would remove image {}", image);
                result.images_removed += 1;
                continue;
            }

            match self.runtime.remove_image(&image).await? {
                ImageRemoval::Removed => result.images_removed += 1,
                ImageRemoval::NotFound => {
                    log::info!("[stagesweep.flusher] image {} already gone", image);
                },
                ImageRemoval::InUse => {
                    result.images_failed += 1;
                    result.failures.push(format!("image {} is in use", image));
                },
                ImageRemoval::Rejected(reason) => {
                    result.images_failed += 1;
                    result.failures.push(format!("image {} : {}", image, reason));
                },
            }
        }

        Ok(())
    }
}

fn distinct_base_names(configs: &[BuildConfig]) -> Result<Vec<&str>, FlushError> {
    let mut seen = HashSet::new();
    let mut distinct = vec![];

    for (position, config) in configs.iter().enumerate() {
        let base_name = config.base_name.as_str();

        if base_name.trim().is_empty() {
            return Err(FlushError::MalformedConfig { position });
        }

        if seen.insert(base_name) {
            distinct.push(base_name);
        }
    }

    Ok(distinct)
}

#[cfg(test)]
mod tests {
    use crate::core::flushers::combined::{FlushError, StagesFlusher};
    use crate::core::flushers::standalone::{
        ContainerRuntimeClient, FakeContainerRuntime, FakeItemState, FakeNamespaceResolver, Journal,
        ProgressNotifier, StageCacheResolver,
    };
    use crate::core::models::{BuildConfig, CacheNamespace, FlushOptions, NamespaceResult};
    use assertor::{BooleanAssertion, EqualityAssertion, ResultAssertion, VecAssertion};

    fn flusher(runtime: FakeContainerRuntime, resolver: FakeNamespaceResolver, journal: &Journal) -> StagesFlusher {
        StagesFlusher::new(
            StageCacheResolver::FakeResolver(resolver),
            ContainerRuntimeClient::FakeRuntime(runtime),
            ProgressNotifier::Recording(journal.clone()),
        )
    }

    fn configs(base_names: &[&str]) -> Vec<BuildConfig> {
        base_names.iter().map(|name| BuildConfig::with(name)).collect()
    }

    fn base_names(results: &[NamespaceResult]) -> Vec<String> {
        results.iter().map(|result| result.base_name.clone()).collect()
    }

    fn expected(base_name: &str, counters: [usize; 4]) -> NamespaceResult {
        let mut result = NamespaceResult::new(base_name, CacheNamespace::new(format!("stages-{}", base_name)));
        result.containers_removed = counters[0];
        result.containers_failed = counters[1];
        result.images_removed = counters[2];
        result.images_failed = counters[3];
        result
    }

    #[tokio::test]
    async fn should_return_empty_report_for_no_configs() {
        let journal = Journal::default();
        let sut = flusher(FakeContainerRuntime::new(journal.clone()), FakeNamespaceResolver::new(), &journal);

        let report = sut.flush_local(&[], FlushOptions::default()).await.expect("flush failed");

        assertor::assert_that!(report.results).is_empty();
        assertor::assert_that!(journal.entries()).is_empty();
    }

    #[tokio::test]
    async fn should_flush_each_distinct_base_name_once_in_first_occurrence_order() {
        let journal = Journal::default();
        let sut = flusher(FakeContainerRuntime::new(journal.clone()), FakeNamespaceResolver::new(), &journal);

        let report = sut
            .flush_local(&configs(&["web", "api", "web"]), FlushOptions::default())
            .await
            .expect("flush failed");

        assertor::assert_that!(base_names(&report.results)).is_equal_to(vec!["web".to_string(), "api".to_string()]);

        let started = journal
            .entries()
            .into_iter()
            .filter(|entry| entry.starts_with("started"))
            .collect::<Vec<_>>();
        assertor::assert_that!(started).is_equal_to(vec!["started web".to_string(), "started api".to_string()]);
    }

    #[tokio::test]
    async fn should_remove_every_container_and_image_of_namespace() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_container("c1", "stages-web:a1", FakeItemState::Removable)
            .with_container("c2", "stages-web:b2", FakeItemState::Removable)
            .with_container("c3", "postgres:16", FakeItemState::Removable)
            .with_image("stages-web", "a1", FakeItemState::Removable)
            .with_image("stages-web", "b2", FakeItemState::Removable)
            .with_image("stages-web", "c3", FakeItemState::Removable)
            .with_image("stages-webapp", "a1", FakeItemState::Removable);
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let report = sut
            .flush_local(&configs(&["web"]), FlushOptions::default())
            .await
            .expect("flush failed");

        assertor::assert_that!(report.results).is_equal_to(vec![expected("web", [2, 0, 3, 0])]);
        assertor::assert_that!(report.has_failures()).is_false();
    }

    #[tokio::test]
    async fn should_keep_going_when_container_is_busy() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_container("c1", "stages-api:a1", FakeItemState::Busy)
            .with_container("c2", "stages-api:a1", FakeItemState::Removable)
            .with_image("stages-api", "a1", FakeItemState::Removable);
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let report = sut
            .flush_local(&configs(&["api"]), FlushOptions::default())
            .await
            .expect("flush failed");

        let mut expected = expected("api", [1, 1, 1, 0]);
        expected.failures = vec!["container c1 is busy".to_string()];

        assertor::assert_that!(report.results).is_equal_to(vec![expected]);
        assertor::assert_that!(journal.entries()).contains("rm c2".to_string());
        assertor::assert_that!(journal.entries()).contains("rmi stages-api:a1".to_string());
    }

    #[tokio::test]
    async fn should_report_busy_container_and_still_remove_images() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_container("c1", "stages-api:a1", FakeItemState::Busy)
            .with_image("stages-api", "b2", FakeItemState::Removable);
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let report = sut
            .flush_local(&configs(&["api"]), FlushOptions::default())
            .await
            .expect("flush failed");

        let result = &report.results[0];
        assertor::assert_that!(result.containers_removed).is_equal_to(0);
        assertor::assert_that!(result.containers_failed).is_equal_to(1);
        assertor::assert_that!(result.images_removed).is_equal_to(1);
        assertor::assert_that!(result.images_failed).is_equal_to(0);
    }

    #[tokio::test]
    async fn should_remove_busy_containers_when_forced() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_container("c1", "stages-api:a1", FakeItemState::Busy)
            .with_image("stages-api", "a1", FakeItemState::Removable);
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let options = FlushOptions {
            dry_run: false,
            force: true,
        };
        let report = sut.flush_local(&configs(&["api"]), options).await.expect("flush failed");

        assertor::assert_that!(report.results).is_equal_to(vec![expected("api", [1, 0, 1, 0])]);
    }

    #[tokio::test]
    async fn should_resolve_all_container_removals_before_touching_images() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_container("c1", "stages-web:a1", FakeItemState::Removable)
            .with_container("c2", "stages-web:a1", FakeItemState::Busy)
            .with_image("stages-web", "a1", FakeItemState::Removable)
            .with_container("c3", "stages-api:b2", FakeItemState::Removable)
            .with_image("stages-api", "b2", FakeItemState::Removable);
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        sut.flush_local(&configs(&["web", "api"]), FlushOptions::default())
            .await
            .expect("flush failed");

        let expected_calls = vec![
            "started web",
            "ps stages-web",
            "rm c1",
            "rm c2",
            "images stages-web",
            "rmi stages-web:a1",
            "finished web",
            "started api",
            "ps stages-api",
            "rm c3",
            "images stages-api",
            "rmi stages-api:b2",
            "finished api",
        ]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();

        assertor::assert_that!(journal.entries()).is_equal_to(expected_calls);
    }

    #[tokio::test]
    async fn should_treat_vanished_items_as_already_flushed() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_container("c1", "stages-web:a1", FakeItemState::Vanishing)
            .with_image("stages-web", "a1", FakeItemState::Vanishing);
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let report = sut
            .flush_local(&configs(&["web"]), FlushOptions::default())
            .await
            .expect("flush failed");

        assertor::assert_that!(report.results).is_equal_to(vec![expected("web", [0, 0, 0, 0])]);
        assertor::assert_that!(report.has_failures()).is_false();
    }

    #[tokio::test]
    async fn should_record_in_use_and_rejected_images_without_stopping() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_image("stages-web", "a1", FakeItemState::Busy)
            .with_image("stages-web", "b2", FakeItemState::Rejecting)
            .with_image("stages-web", "c3", FakeItemState::Removable);
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let report = sut
            .flush_local(&configs(&["web"]), FlushOptions::default())
            .await
            .expect("flush failed");

        let mut expected = expected("web", [0, 0, 1, 2]);
        expected.failures = vec![
            "image stages-web:a1 is in use".to_string(),
            "image stages-web:b2 : permission denied".to_string(),
        ];

        assertor::assert_that!(report.results).is_equal_to(vec![expected]);
    }

    #[tokio::test]
    async fn should_be_idempotent_across_consecutive_runs() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_container("c1", "stages-web:a1", FakeItemState::Removable)
            .with_image("stages-web", "a1", FakeItemState::Removable)
            .with_image("stages-web", "b2", FakeItemState::Removable);
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let first = sut
            .flush_local(&configs(&["web"]), FlushOptions::default())
            .await
            .expect("flush failed");
        let second = sut
            .flush_local(&configs(&["web"]), FlushOptions::default())
            .await
            .expect("flush failed");

        assertor::assert_that!(first.results).is_equal_to(vec![expected("web", [1, 0, 2, 0])]);
        assertor::assert_that!(second.results).is_equal_to(vec![expected("web", [0, 0, 0, 0])]);
    }

    #[tokio::test]
    async fn should_only_plan_removals_on_dry_run() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_container("c1", "stages-web:a1", FakeItemState::Busy)
            .with_image("stages-web", "a1", FakeItemState::Removable);
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let options = FlushOptions {
            dry_run: true,
            force: false,
        };
        let report = sut.flush_local(&configs(&["web"]), options).await.expect("flush failed");

        assertor::assert_that!(report.dry_run).is_true();
        assertor::assert_that!(report.results).is_equal_to(vec![expected("web", [1, 0, 1, 0])]);

        let removals = journal
            .entries()
            .into_iter()
            .filter(|entry| entry.starts_with("rm"))
            .collect::<Vec<_>>();
        assertor::assert_that!(removals).is_empty();
    }

    #[tokio::test]
    async fn should_isolate_namespace_resolution_failures() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_image("stages-api", "a1", FakeItemState::Removable);
        let sut = flusher(runtime, FakeNamespaceResolver::failing_for(&["web"]), &journal);

        let report = sut
            .flush_local(&configs(&["web", "api"]), FlushOptions::default())
            .await
            .expect("flush failed");

        let unresolved = NamespaceResult::unresolved("web", "cannot derive stages namespace for web".to_string());

        assertor::assert_that!(report.results).is_equal_to(vec![unresolved, expected("api", [0, 0, 1, 0])]);
        assertor::assert_that!(report.has_failures()).is_true();
        assertor::assert_that!(journal.entries()).does_not_contain("ps stages-web".to_string());
    }

    #[tokio::test]
    async fn should_abort_on_transport_failure() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_image("stages-api", "a1", FakeItemState::Removable)
            .with_image("stages-web", "a1", FakeItemState::Removable)
            .unreachable_for("stages-web");
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let execution = sut
            .flush_local(&configs(&["api", "web", "db"]), FlushOptions::default())
            .await;

        assertor::assert_that!(execution).is_err();

        match execution {
            Err(FlushError::Aborted {
                base_name, completed, ..
            }) => {
                assertor::assert_that!(base_name).is_equal_to("web".to_string());
                assertor::assert_that!(completed).is_equal_to(vec![expected("api", [0, 0, 1, 0])]);
            },
            _ => panic!("Expecting an aborted flush"),
        }

        assertor::assert_that!(journal.entries()).does_not_contain("rmi stages-web:a1".to_string());
        assertor::assert_that!(journal.entries()).does_not_contain("finished web".to_string());
        assertor::assert_that!(journal.entries()).does_not_contain("started db".to_string());
    }

    #[tokio::test]
    async fn should_abort_when_runtime_drops_while_listing_images() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_image("stages-api", "a1", FakeItemState::Removable)
            .with_container("c1", "stages-web:a1", FakeItemState::Removable)
            .with_image("stages-web", "a1", FakeItemState::Removable)
            .unreachable_on_images("stages-web");
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let execution = sut.flush_local(&configs(&["api", "web"]), FlushOptions::default()).await;

        match execution {
            Err(FlushError::Aborted {
                base_name, completed, ..
            }) => {
                assertor::assert_that!(base_name).is_equal_to("web".to_string());
                assertor::assert_that!(base_names(&completed)).is_equal_to(vec!["api".to_string()]);
                assertor::assert_that!(completed).is_equal_to(vec![expected("api", [0, 0, 1, 0])]);
            },
            _ => panic!("Expecting an aborted flush"),
        }

        assertor::assert_that!(journal.entries()).contains("rm c1".to_string());
        assertor::assert_that!(journal.entries()).does_not_contain("rmi stages-web:a1".to_string());
        assertor::assert_that!(journal.entries()).does_not_contain("finished web".to_string());
    }

    #[tokio::test]
    async fn should_abort_when_runtime_drops_while_removing() {
        let journal = Journal::default();
        let runtime = FakeContainerRuntime::new(journal.clone())
            .with_container("c1", "stages-api:a1", FakeItemState::Removable)
            .with_container("c2", "stages-web:a1", FakeItemState::Removable)
            .with_container("c3", "stages-web:b2", FakeItemState::Unreachable)
            .with_image("stages-web", "a1", FakeItemState::Removable)
            .with_image("stages-db", "a1", FakeItemState::Removable);
        let sut = flusher(runtime, FakeNamespaceResolver::new(), &journal);

        let execution = sut
            .flush_local(&configs(&["api", "web", "db"]), FlushOptions::default())
            .await;

        match execution {
            Err(FlushError::Aborted {
                base_name, completed, ..
            }) => {
                assertor::assert_that!(base_name).is_equal_to("web".to_string());
                assertor::assert_that!(completed).is_equal_to(vec![expected("api", [1, 0, 0, 0])]);
            },
            _ => panic!("Expecting an aborted flush"),
        }

        assertor::assert_that!(journal.entries()).contains("rm c3".to_string());
        assertor::assert_that!(journal.entries()).does_not_contain("images stages-web".to_string());
        assertor::assert_that!(journal.entries()).does_not_contain("started db".to_string());
    }

    #[tokio::test]
    async fn should_reject_blank_base_names_before_flushing() {
        let journal = Journal::default();
        let sut = flusher(FakeContainerRuntime::new(journal.clone()), FakeNamespaceResolver::new(), &journal);

        let execution = sut
            .flush_local(&configs(&["web", "  "]), FlushOptions::default())
            .await;

        match execution {
            Err(FlushError::MalformedConfig { position }) => assertor::assert_that!(position).is_equal_to(1),
            _ => panic!("Expecting a malformed configuration"),
        }

        assertor::assert_that!(journal.entries()).is_empty();
    }
}
