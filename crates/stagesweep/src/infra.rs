// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

pub mod cli;
pub mod configs;
pub mod naming;
pub mod reporting;
pub mod runtime;
