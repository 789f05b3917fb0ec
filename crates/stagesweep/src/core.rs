// Copyright 2025 Dotanuki Labs
// SPDX-License-Identifier: MIT

pub mod flushers;
pub mod interfaces;
pub mod models;
