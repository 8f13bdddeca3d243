/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Alarm-cond – concurrent alarm scheduling engine
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── request/        – alarm request types and producer-side validation
//! ├── store/          – ordered alarm list (sorted Vec, no raw links)
//! ├── registry/       – live display workers, one per message type
//! ├── event/          – observable events and sinks
//! ├── engine/         – monitor, Dispatcher thread, display Workers
//! ├── error/          – engine error taxonomy
//! └── config/         – YAML engine configuration and scenario
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod registry;
pub mod request;
pub mod store;
