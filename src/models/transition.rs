//! Sequence-dependent changeover times.
//!
//! Changeover minutes between consumable tags, per resource. A resource
//! without a matrix changes over for free; within a matrix, unlisted
//! pairs fall back to the default, and a same-tag changeover is zero
//! unless an explicit entry overrides it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Changeover matrix for one resource, keyed by consumable tag pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionMatrix {
    /// Resource this matrix applies to.
    pub resource: String,
    /// Explicit (from, to) entries in minutes.
    transitions: HashMap<(String, String), i64>,
    /// Minutes for pairs with no explicit entry.
    pub default_minutes: i64,
}

impl TransitionMatrix {
    /// Creates an empty matrix with a zero default.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            transitions: HashMap::new(),
            default_minutes: 0,
        }
    }

    /// Sets the default changeover for unlisted pairs.
    pub fn with_default(mut self, minutes: i64) -> Self {
        self.default_minutes = minutes;
        self
    }

    /// Adds an explicit changeover entry.
    pub fn with_transition(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        minutes: i64,
    ) -> Self {
        self.set(from, to, minutes);
        self
    }

    /// Inserts or replaces an explicit entry.
    pub fn set(&mut self, from: impl Into<String>, to: impl Into<String>, minutes: i64) {
        self.transitions.insert((from.into(), to.into()), minutes);
    }

    /// Changeover minutes from one tag to another. Explicit entries win;
    /// a same-tag changeover is otherwise zero; anything else takes the
    /// default.
    pub fn get(&self, from: &str, to: &str) -> i64 {
        if let Some(&minutes) = self.transitions.get(&(from.to_string(), to.to_string())) {
            return minutes;
        }
        if from == to {
            return 0;
        }
        self.default_minutes
    }

    /// Number of explicit entries.
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}

/// Changeover matrices for the whole plant, keyed by resource name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionSet {
    matrices: HashMap<String, TransitionMatrix>,
}

impl TransitionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a matrix, replacing any existing one for the resource.
    pub fn with_matrix(mut self, matrix: TransitionMatrix) -> Self {
        self.add(matrix);
        self
    }

    /// Inserts a matrix.
    pub fn add(&mut self, matrix: TransitionMatrix) {
        self.matrices.insert(matrix.resource.clone(), matrix);
    }

    /// Matrix for a resource, if present.
    pub fn get(&self, resource: &str) -> Option<&TransitionMatrix> {
        self.matrices.get(resource)
    }

    /// Changeover minutes on a resource between two consumable tags.
    /// Zero when either tag is absent or the resource has no matrix.
    pub fn changeover(&self, resource: &str, from: Option<&str>, to: Option<&str>) -> i64 {
        match (self.matrices.get(resource), from, to) {
            (Some(matrix), Some(from), Some(to)) => matrix.get(from, to),
            _ => 0,
        }
    }

    /// Number of matrices.
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}
