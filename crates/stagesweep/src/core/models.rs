// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use clap::ValueEnum;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Hash, Eq)]
pub struct BuildConfig {
    pub base_name: String,
}

impl BuildConfig {
    pub fn new(base_name: String) -> Self {
        Self { base_name }
    }

    pub fn with(base_name: &str) -> Self {
        Self {
            base_name: base_name.to_string(),
        }
    }
}

/// Tag-matching pattern owning every stage image (and the containers created from them)
/// produced for a single base name. Forwarded verbatim to the container runtime.
#[derive(Clone, Debug, PartialEq, Hash, Eq)]
pub struct CacheNamespace(String);

impl CacheNamespace {
    pub fn new(pattern: String) -> Self {
        Self(pattern)
    }

    pub fn pattern(&self) -> &str {
        &self.0
    }
}

impl Display for CacheNamespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Hash, Eq)]
pub struct ContainerRef(String);

impl ContainerRef {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    #[cfg(test)]
    pub fn with(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl Display for ContainerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Hash, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: String, tag: String) -> Self {
        Self { repository, tag }
    }

    #[cfg(test)]
    pub fn with(repository: &str, tag: &str) -> Self {
        Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        }
    }
}

impl Display for ImageRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}:{}", self.repository, self.tag))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerRemoval {
    Removed,
    Busy,
    NotFound,
    Rejected(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageRemoval {
    Removed,
    InUse,
    NotFound,
    Rejected(String),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    pub fn default_binary(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Podman => "podman",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushOptions {
    pub dry_run: bool,
    pub force: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceResult {
    pub base_name: String,
    pub namespace: Option<CacheNamespace>,
    pub containers_removed: usize,
    pub containers_failed: usize,
    pub images_removed: usize,
    pub images_failed: usize,
    pub resolution_failure: Option<String>,
    pub failures: Vec<String>,
}

impl NamespaceResult {
    pub fn new(base_name: &str, namespace: CacheNamespace) -> Self {
        Self {
            base_name: base_name.to_string(),
            namespace: Some(namespace),
            ..Default::default()
        }
    }

    pub fn unresolved(base_name: &str, reason: String) -> Self {
        Self {
            base_name: base_name.to_string(),
            resolution_failure: Some(reason),
            ..Default::default()
        }
    }

    pub fn has_failures(&self) -> bool {
        self.resolution_failure.is_some() || self.containers_failed > 0 || self.images_failed > 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub dry_run: bool,
    pub results: Vec<NamespaceResult>,
}

impl FlushReport {
    pub fn new(dry_run: bool, results: Vec<NamespaceResult>) -> Self {
        Self { dry_run, results }
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(NamespaceResult::has_failures)
    }

    pub fn total_containers_removed(&self) -> usize {
        self.results.iter().map(|result| result.containers_removed).sum()
    }

    pub fn total_images_removed(&self) -> usize {
        self.results.iter().map(|result| result.images_removed).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.results
            .iter()
            .map(|result| {
                let unresolved = usize::from(result.resolution_failure.is_some());
                result.containers_failed + result.images_failed + unresolved
            })
            .sum()
    }
}
