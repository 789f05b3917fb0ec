// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use crate::core::interfaces::{ContainerRuntime, FlushProgress, NamespaceResolution};
use crate::core::models::{
    CacheNamespace, ContainerRef, ContainerRemoval, ImageRef, ImageRemoval, NamespaceResult,
};
use crate::infra::naming::StagesNamingScheme;
use crate::infra::reporting::console::ConsoleReporter;
use crate::infra::runtime::ContainerCli;
#[cfg(test)]
use std::sync::{Arc, Mutex};

pub enum StageCacheResolver {
    PrefixedRepository(StagesNamingScheme),
    #[cfg(test)]
    FakeResolver(FakeNamespaceResolver),
}

impl NamespaceResolution for StageCacheResolver {
    fn resolve(&self, base_name: &str) -> anyhow::Result<CacheNamespace> {
        match self {
            StageCacheResolver::PrefixedRepository(delegate) => delegate.resolve(base_name),
            #[cfg(test)]
            StageCacheResolver::FakeResolver(fake) => fake.resolve(base_name),
        }
    }
}

pub enum ContainerRuntimeClient {
    CommandLine(ContainerCli),
    #[cfg(test)]
    FakeRuntime(FakeContainerRuntime),
}

impl ContainerRuntime for ContainerRuntimeClient {
    async fn list_containers(&self, namespace: &CacheNamespace) -> anyhow::Result<Vec<ContainerRef>> {
        match self {
            ContainerRuntimeClient::CommandLine(delegate) => delegate.list_containers(namespace).await,
            #[cfg(test)]
            ContainerRuntimeClient::FakeRuntime(fake) => fake.list_containers(namespace).await,
        }
    }

    async fn remove_container(&self, container: &ContainerRef, force: bool) -> anyhow::Result<ContainerRemoval> {
        match self {
            ContainerRuntimeClient::CommandLine(delegate) => delegate.remove_container(container, force).await,
            #[cfg(test)]
            ContainerRuntimeClient::FakeRuntime(fake) => fake.remove_container(container, force).await,
        }
    }

    async fn list_images(&self, namespace: &CacheNamespace) -> anyhow::Result<Vec<ImageRef>> {
        match self {
            ContainerRuntimeClient::CommandLine(delegate) => delegate.list_images(namespace).await,
            #[cfg(test)]
            ContainerRuntimeClient::FakeRuntime(fake) => fake.list_images(namespace).await,
        }
    }

    async fn remove_image(&self, image: &ImageRef) -> anyhow::Result<ImageRemoval> {
        match self {
            ContainerRuntimeClient::CommandLine(delegate) => delegate.remove_image(image).await,
            #[cfg(test)]
            ContainerRuntimeClient::FakeRuntime(fake) => fake.remove_image(image).await,
        }
    }
}

pub enum ProgressNotifier {
    Console(ConsoleReporter),
    Silent,
    #[cfg(test)]
    Recording(Journal),
}

impl FlushProgress for ProgressNotifier {
    fn namespace_started(&self, base_name: &str) {
        match self {
            ProgressNotifier::Console(reporter) => reporter.namespace_started(base_name),
            ProgressNotifier::Silent => {},
            #[cfg(test)]
            ProgressNotifier::Recording(journal) => journal.record(format!("started {}", base_name)),
        }
    }

    fn namespace_finished(&self, result: &NamespaceResult) {
        match self {
            ProgressNotifier::Console(reporter) => reporter.namespace_finished(result),
            ProgressNotifier::Silent => {},
            #[cfg(test)]
            ProgressNotifier::Recording(journal) => journal.record(format!("finished {}", result.base_name)),
        }
    }
}

/// Ordered log of every collaborator interaction, shared between fakes.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

#[cfg(test)]
impl Journal {
    pub fn record(&self, entry: String) {
        self.0.lock().expect("journal lock poisoned").push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("journal lock poisoned").clone()
    }
}

#[cfg(test)]
pub struct FakeNamespaceResolver {
    unresolvable: Vec<String>,
}

#[cfg(test)]
impl FakeNamespaceResolver {
    pub fn new() -> Self {
        Self { unresolvable: vec![] }
    }

    pub fn failing_for(base_names: &[&str]) -> Self {
        Self {
            unresolvable: base_names.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[cfg(test)]
impl NamespaceResolution for FakeNamespaceResolver {
    fn resolve(&self, base_name: &str) -> anyhow::Result<CacheNamespace> {
        if self.unresolvable.iter().any(|name| name == base_name) {
            anyhow::bail!("cannot derive stages namespace for {}", base_name)
        }

        Ok(CacheNamespace::new(format!("stages-{}", base_name)))
    }
}

#[cfg(test)]
#[derive(Clone, Copy, PartialEq)]
pub enum FakeItemState {
    Removable,
    Busy,
    Vanishing,
    Rejecting,
    Unreachable,
}

#[cfg(test)]
struct FakeContainer {
    container: ContainerRef,
    image: String,
    state: FakeItemState,
}

#[cfg(test)]
struct FakeImage {
    image: ImageRef,
    state: FakeItemState,
}

/// In-memory runtime: containers match a namespace when created from `<namespace>` or
/// `<namespace>:<tag>`, images when their repository equals the namespace.
#[cfg(test)]
pub struct FakeContainerRuntime {
    containers: Mutex<Vec<FakeContainer>>,
    images: Mutex<Vec<FakeImage>>,
    unreachable: Vec<String>,
    unreachable_on_images: Vec<String>,
    journal: Journal,
}

#[cfg(test)]
impl FakeContainerRuntime {
    pub fn new(journal: Journal) -> Self {
        Self {
            containers: Mutex::new(vec![]),
            images: Mutex::new(vec![]),
            unreachable: vec![],
            unreachable_on_images: vec![],
            journal,
        }
    }

    pub fn with_container(self, id: &str, image: &str, state: FakeItemState) -> Self {
        self.containers.lock().expect("lock poisoned").push(FakeContainer {
            container: ContainerRef::with(id),
            image: image.to_string(),
            state,
        });
        self
    }

    pub fn with_image(self, repository: &str, tag: &str, state: FakeItemState) -> Self {
        self.images.lock().expect("lock poisoned").push(FakeImage {
            image: ImageRef::with(repository, tag),
            state,
        });
        self
    }

    pub fn unreachable_for(mut self, namespace: &str) -> Self {
        self.unreachable.push(namespace.to_string());
        self
    }

    pub fn unreachable_on_images(mut self, namespace: &str) -> Self {
        self.unreachable_on_images.push(namespace.to_string());
        self
    }

    fn matches(namespace: &CacheNamespace, image: &str) -> bool {
        let pattern = namespace.pattern();
        image == pattern || image.strip_prefix(pattern).is_some_and(|rest| rest.starts_with(':'))
    }
}

#[cfg(test)]
impl ContainerRuntime for FakeContainerRuntime {
    async fn list_containers(&self, namespace: &CacheNamespace) -> anyhow::Result<Vec<ContainerRef>> {
        self.journal.record(format!("ps {}", namespace));

        if self.unreachable.iter().any(|pattern| pattern == namespace.pattern()) {
            anyhow::bail!("cannot connect to the container runtime")
        }

        let containers = self.containers.lock().expect("lock poisoned");
        let matching = containers
            .iter()
            .filter(|fake| Self::matches(namespace, &fake.image))
            .map(|fake| fake.container.clone())
            .collect();
        Ok(matching)
    }

    async fn remove_container(&self, container: &ContainerRef, force: bool) -> anyhow::Result<ContainerRemoval> {
        self.journal.record(format!("rm {}", container));

        let mut containers = self.containers.lock().expect("lock poisoned");
        let Some(position) = containers.iter().position(|fake| &fake.container == container) else {
            return Ok(ContainerRemoval::NotFound);
        };

        let outcome = match containers[position].state {
            FakeItemState::Unreachable => anyhow::bail!("cannot connect to the container runtime"),
            FakeItemState::Busy if !force => return Ok(ContainerRemoval::Busy),
            FakeItemState::Rejecting => return Ok(ContainerRemoval::Rejected("permission denied".to_string())),
            FakeItemState::Vanishing => ContainerRemoval::NotFound,
            _ => ContainerRemoval::Removed,
        };

        containers.remove(position);
        Ok(outcome)
    }

    async fn list_images(&self, namespace: &CacheNamespace) -> anyhow::Result<Vec<ImageRef>> {
        self.journal.record(format!("images {}", namespace));

        if self.unreachable_on_images.iter().any(|pattern| pattern == namespace.pattern()) {
            anyhow::bail!("cannot connect to the container runtime")
        }

        let images = self.images.lock().expect("lock poisoned");
        let matching = images
            .iter()
            .filter(|fake| fake.image.repository == namespace.pattern())
            .map(|fake| fake.image.clone())
            .collect();
        Ok(matching)
    }

    async fn remove_image(&self, image: &ImageRef) -> anyhow::Result<ImageRemoval> {
        self.journal.record(format!("rmi {}", image));

        let mut images = self.images.lock().expect("lock poisoned");
        let Some(position) = images.iter().position(|fake| &fake.image == image) else {
            return Ok(ImageRemoval::NotFound);
        };

        let outcome = match images[position].state {
            FakeItemState::Unreachable => anyhow::bail!("cannot connect to the container runtime"),
            FakeItemState::Busy => return Ok(ImageRemoval::InUse),
            FakeItemState::Rejecting => return Ok(ImageRemoval::Rejected("permission denied".to_string())),
            FakeItemState::Vanishing => ImageRemoval::NotFound,
            FakeItemState::Removable => ImageRemoval::Removed,
        };

        images.remove(position);
        Ok(outcome)
    }
}
