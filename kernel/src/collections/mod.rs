// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Data structures shared between interrupt handlers and tasks.

pub mod flow_ring;
pub mod mailbox;
