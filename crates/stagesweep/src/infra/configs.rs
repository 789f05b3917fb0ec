// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use crate::core::models::BuildConfig;
use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

pub static DEFAULT_BUILD_FILE: &str = "stagesweep.json";

#[derive(Debug, Deserialize)]
struct BuildFile {
    project: String,
    #[serde(default)]
    images: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    #[serde(default)]
    name: Option<String>,
}

pub struct BuildConfigsLoader {
    build_file: Utf8PathBuf,
}

impl BuildConfigsLoader {
    pub fn new(build_file: Utf8PathBuf) -> Self {
        Self { build_file }
    }

    pub fn build_file(&self) -> &Utf8Path {
        &self.build_file
    }

    pub fn load(&self) -> anyhow::Result<Vec<BuildConfig>> {
        let contents = std::fs::read_to_string(&self.build_file)
            .with_context(|| format!("cannot read build file at {}", self.build_file))?;

        let build_file: BuildFile = serde_json::from_str(&contents)
            .with_context(|| format!("cannot parse build file at {}", self.build_file))?;

        let project = build_file.project.trim();
        if project.is_empty() {
            bail!("build file at {} does not name a project", self.build_file)
        }

        let configs = build_file
            .images
            .into_iter()
            .map(|image| match image.name {
                Some(name) => BuildConfig::new(format!("{}-{}", project, name.trim())),
                None => BuildConfig::with(project),
            })
            .collect::<Vec<_>>();

        log::info!(
            "[stagesweep.configs] loaded {} build configuration(s) from {}",
            configs.len(),
            self.build_file
        );

        Ok(configs)
    }
}
