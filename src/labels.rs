//! Label set for steel surface defects
//!
//! The order of the names is the order of the classifier's output units:
//! index `i` of the logits belongs to `labels[i]`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::utils::error::{DefectError, Result};

/// Steel surface defect classes, in the order the classifier was trained on.
pub const STEEL_DEFECT_CLASSES: [&str; 6] = [
    "crazing",         // 0
    "inclusion",       // 1
    "patches",         // 2
    "pitted_surface",  // 3
    "rolled-in_scale", // 4
    "scratches",       // 5
];

/// Immutable, ordered list of class names shared by everything in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Arc<[String]>,
}

impl LabelSet {
    /// Build a label set, rejecting empty, blank or duplicate names
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        if names.is_empty() {
            return Err(DefectError::Config(
                "label set must contain at least one class".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.trim().is_empty() {
                return Err(DefectError::Config("label names must not be blank".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(DefectError::Config(format!("duplicate label '{}'", name)));
            }
        }

        Ok(Self {
            names: names.into(),
        })
    }

    /// The six steel defect classes
    pub fn steel_defects() -> Self {
        Self {
            names: STEEL_DEFECT_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of the class at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Index of the class called `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.to_vec()
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::steel_defects()
    }
}
