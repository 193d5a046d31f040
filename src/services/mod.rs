// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod backoff;
pub mod challenge;
pub mod chrome;
pub mod local;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod renderer;
pub mod robots;
