// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;

/// FIFO of serialized envelopes waiting for the in-flight delivery to finish.
///
/// There is no size limit: while the intake is slow the backlog keeps growing.
#[derive(Debug, Default)]
pub struct Backlog {
    entries: VecDeque<String>,
}

impl Backlog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, serialized: String) {
        self.entries.push_back(serialized);
    }

    pub fn dequeue(&mut self) -> Option<String> {
        self.entries.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
