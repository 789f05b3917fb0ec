// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use crate::core::models::{
    CacheNamespace, ContainerRef, ContainerRemoval, ImageRef, ImageRemoval, NamespaceResult,
};

pub trait NamespaceResolution {
    fn resolve(&self, base_name: &str) -> anyhow::Result<CacheNamespace>;
}

/// Errors returned by these operations are transport-level failures (runtime unreachable,
/// unparseable response). Per-item rejections are reported as removal outcomes instead.
pub trait ContainerRuntime {
    async fn list_containers(&self, namespace: &CacheNamespace) -> anyhow::Result<Vec<ContainerRef>>;
    async fn remove_container(&self, container: &ContainerRef, force: bool) -> anyhow::Result<ContainerRemoval>;
    async fn list_images(&self, namespace: &CacheNamespace) -> anyhow::Result<Vec<ImageRef>>;
    async fn remove_image(&self, image: &ImageRef) -> anyhow::Result<ImageRemoval>;
}

pub trait FlushProgress {
    fn namespace_started(&self, base_name: &str);
    fn namespace_finished(&self, result: &NamespaceResult);
}
