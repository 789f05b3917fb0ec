// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

use crate::core::interfaces::NamespaceResolution;
use crate::core::models::CacheNamespace;
use anyhow::bail;

pub static DEFAULT_STAGES_PREFIX: &str = "dimgstage";

/// Stage images for a base name live in the `<prefix>-<base name>` repository.
pub struct StagesNamingScheme {
    prefix: String,
}

impl StagesNamingScheme {
    pub fn new(prefix: String) -> Self {
        Self { prefix }
    }

    fn is_valid_repository(name: &str) -> bool {
        name.split('/').all(Self::is_valid_component)
    }

    // component := [a-z0-9]+ (separator [a-z0-9]+)* ; separator := '.' | '_' | '__' | '-'+
    fn is_valid_component(component: &str) -> bool {
        let is_alphanumeric = |character: char| character.is_ascii_lowercase() || character.is_ascii_digit();

        let allowed_chars = component
            .chars()
            .all(|character| is_alphanumeric(character) || matches!(character, '.' | '_' | '-'));

        let bounded_by_alphanumerics = component.chars().next().is_some_and(is_alphanumeric)
            && component.chars().last().is_some_and(is_alphanumeric);

        let valid_separators = component
            .split(is_alphanumeric)
            .filter(|separator| !separator.is_empty())
            .all(|separator| matches!(separator, "." | "_" | "__") || separator.chars().all(|character| character == '-'));

        allowed_chars && bounded_by_alphanumerics && valid_separators
    }
}

impl Default for StagesNamingScheme {
    fn default() -> Self {
        Self::new(DEFAULT_STAGES_PREFIX.to_string())
    }
}

impl NamespaceResolution for StagesNamingScheme {
    fn resolve(&self, base_name: &str) -> anyhow::Result<CacheNamespace> {
        let repository = format!("{}-{}", self.prefix, base_name);

        if !Self::is_valid_repository(&repository) {
            bail!("{} is not a valid stages repository name", repository)
        }

        Ok(CacheNamespace::new(repository))
    }
}
