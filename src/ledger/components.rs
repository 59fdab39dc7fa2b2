// src/ledger/components.rs
//! Parent/child component resolution.

use serde::Serialize;

use super::error::{LedgerError, LedgerResult};
use super::process::Process;
use crate::models::Batch;

/// Which component a child-scoped stage records against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "components", rename_all = "snake_case")]
pub enum ComponentSelection {
    /// No children registered; the parent is used as is.
    Parent(String),
    /// Exactly one child, picked without asking.
    Single(String),
    /// The operator has to pick one.
    Choice(Vec<String>),
}

impl ComponentSelection {
    pub fn from_children(parent: &str, mut children: Vec<String>) -> Self {
        children.sort();
        children.dedup();
        match children.len() {
            0 => ComponentSelection::Parent(parent.to_string()),
            1 => ComponentSelection::Single(children.remove(0)),
            _ => ComponentSelection::Choice(children),
        }
    }

    pub fn preselected(&self) -> Option<&str> {
        match self {
            ComponentSelection::Parent(name) | ComponentSelection::Single(name) => Some(name),
            ComponentSelection::Choice(_) => None,
        }
    }

    pub fn choices(&self) -> Vec<String> {
        match self {
            ComponentSelection::Parent(name) | ComponentSelection::Single(name) => vec![name.clone()],
            ComponentSelection::Choice(names) => names.clone(),
        }
    }

    /// Settles the component for a record. `parent` names the batch's
    /// component in error messages.
    pub fn select(&self, parent: &str, picked: Option<&str>) -> LedgerResult<String> {
        let picked = picked.map(str::trim).filter(|p| !p.is_empty());
        match (self, picked) {
            (ComponentSelection::Choice(choices), None) => Err(LedgerError::ComponentNotSelected {
                parent: parent.to_string(),
                choices: choices.clone(),
            }),
            (selection, None) => Ok(selection.preselected().unwrap_or(parent).to_string()),
            (selection, Some(name)) => {
                if selection.choices().iter().any(|c| c == name) {
                    Ok(name.to_string())
                } else {
                    Err(LedgerError::component_not_found(name))
                }
            }
        }
    }
}

/// A batch together with the components its records may name at one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResolution {
    pub batch: Batch,
    pub process: Process,
    pub selection: ComponentSelection,
}

impl BatchResolution {
    pub fn new(batch: Batch, process: Process, children: Vec<String>) -> Self {
        let selection = if process.is_child_scoped() {
            ComponentSelection::from_children(&batch.component, children)
        } else {
            ComponentSelection::Parent(batch.component.clone())
        };
        Self { batch, process, selection }
    }

    pub fn component(&self, picked: Option<&str>) -> LedgerResult<String> {
        self.selection.select(&self.batch.component, picked)
    }
}
