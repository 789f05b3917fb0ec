// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use crate::core::interfaces::ContainerRuntime;
use crate::core::models::{CacheNamespace, ContainerRef, ContainerRemoval, ImageRef, ImageRemoval};
use anyhow::{Context, bail};
use tokio::process::Command;

static CONTAINERS_FORMAT: &str = "{{.ID}}\t{{.Image}}";
static IMAGES_FORMAT: &str = "{{.Repository}}:{{.Tag}}";
static UNTAGGED: &str = "<none>";
static LOCAL_REGISTRY: &str = "localhost/";

static DAEMON_UNREACHABLE_MARKERS: [&str; 3] = ["cannot connect to", "unable to connect to", "error during connect"];
static NOT_FOUND_MARKERS: [&str; 3] = ["no such container", "no such image", "image not known"];
static CONTAINER_BUSY_MARKERS: [&str; 3] = ["running", "paused", "already in progress"];
static IMAGE_IN_USE_MARKERS: [&str; 3] = ["conflict", "being used", "in use"];

struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Talks to a docker-compatible engine (docker, podman) through its command line.
pub struct ContainerCli {
    binary: String,
}

impl ContainerCli {
    pub fn new(binary: String) -> Self {
        Self { binary }
    }

    async fn run(&self, args: &[&str]) -> anyhow::Result<CommandOutput> {
        log::info!("[stagesweep.runtime] running {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .with_context(|| format!("cannot execute `{}`", self.binary))?;

        let command_output = CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };

        if !command_output.success && contains_any(&command_output.stderr, &DAEMON_UNREACHABLE_MARKERS) {
            bail!("container runtime is unreachable : {}", command_output.stderr)
        }

        Ok(command_output)
    }

    async fn list(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = self.run(args).await?;

        if !output.success {
            bail!("`{} {}` failed : {}", self.binary, args[0], output.stderr)
        }

        Ok(output.stdout)
    }
}

impl ContainerRuntime for ContainerCli {
    async fn list_containers(&self, namespace: &CacheNamespace) -> anyhow::Result<Vec<ContainerRef>> {
        let stdout = self
            .list(&["ps", "--all", "--no-trunc", "--format", CONTAINERS_FORMAT])
            .await?;
        parse_containers(&stdout, namespace)
    }

    async fn remove_container(&self, container: &ContainerRef, force: bool) -> anyhow::Result<ContainerRemoval> {
        let mut args = vec!["rm"];
        if force {
            args.push("--force");
        }
        args.push(container.id());

        let output = self.run(&args).await?;
        let removal = if output.success {
            ContainerRemoval::Removed
        } else {
            classify_container_failure(&output.stderr)
        };

        log::info!("[stagesweep.runtime] container {} : {:?}", container, removal);
        Ok(removal)
    }

    async fn list_images(&self, namespace: &CacheNamespace) -> anyhow::Result<Vec<ImageRef>> {
        let stdout = self
            .list(&["images", "--format", IMAGES_FORMAT, namespace.pattern()])
            .await?;
        parse_images(&stdout)
    }

    async fn remove_image(&self, image: &ImageRef) -> anyhow::Result<ImageRemoval> {
        let reference = image.to_string();
        let output = self.run(&["rmi", reference.as_str()]).await?;
        let removal = if output.success {
            ImageRemoval::Removed
        } else {
            classify_image_failure(&output.stderr)
        };

        log::info!("[stagesweep.runtime] image {} : {:?}", image, removal);
        Ok(removal)
    }
}

fn contains_any(stderr: &str, markers: &[&str]) -> bool {
    let lowercased = stderr.to_lowercase();
    markers.iter().any(|marker| lowercased.contains(marker))
}

fn parse_containers(stdout: &str, namespace: &CacheNamespace) -> anyhow::Result<Vec<ContainerRef>> {
    let mut containers = vec![];

    for line in stdout.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((id, image)) = line.split_once('\t') else {
            bail!("unexpected container listing : {}", line)
        };

        if created_from(image, namespace.pattern()) {
            containers.push(ContainerRef::new(id.to_string()));
        }
    }

    Ok(containers)
}

// Podman reports locally built images under the `localhost/` registry
fn created_from(image: &str, pattern: &str) -> bool {
    let image = image.strip_prefix(LOCAL_REGISTRY).unwrap_or(image);
    image == pattern || image.strip_prefix(pattern).is_some_and(|tag| tag.starts_with(':'))
}

fn parse_images(stdout: &str) -> anyhow::Result<Vec<ImageRef>> {
    let mut images = vec![];

    for line in stdout.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((repository, tag)) = line.rsplit_once(':') else {
            bail!("unexpected image listing : {}", line)
        };

        if repository.is_empty() || tag.is_empty() || tag.contains('/') {
            bail!("unexpected image listing : {}", line)
        }

        if tag == UNTAGGED {
            log::warn!("[stagesweep.runtime] skipping untagged image from {}", repository);
            continue;
        }

        images.push(ImageRef::new(repository.to_string(), tag.to_string()));
    }

    Ok(images)
}

fn classify_container_failure(stderr: &str) -> ContainerRemoval {
    if contains_any(stderr, &NOT_FOUND_MARKERS) {
        return ContainerRemoval::NotFound;
    }

    if contains_any(stderr, &CONTAINER_BUSY_MARKERS) {
        return ContainerRemoval::Busy;
    }

    ContainerRemoval::Rejected(stderr.to_string())
}

fn classify_image_failure(stderr: &str) -> ImageRemoval {
    if contains_any(stderr, &NOT_FOUND_MARKERS) {
        return ImageRemoval::NotFound;
    }

    if contains_any(stderr, &IMAGE_IN_USE_MARKERS) {
        return ImageRemoval::InUse;
    }

    ImageRemoval::Rejected(stderr.to_string())
}
