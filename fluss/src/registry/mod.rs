//! Process-wide list of operation kinds and applicability queries.

use crate::archive::EntryRef;
use crate::operations::{Operation, OperationKind};
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

/// An operation that accepted a set of inputs, with its proposed outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Applicable {
    /// The operation kind.
    pub kind: OperationKind,
    /// The operation, including configuration derived during the check.
    pub operation: Operation,
    /// Proposed output keys in the order `execute` expects.
    pub outputs: Vec<String>,
}

/// Registry of the built-in operation kinds.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    kinds: Vec<OperationKind>,
}

static GLOBAL: OnceLock<OperationRegistry> = OnceLock::new();

impl Default for OperationRegistry {
    fn default() -> Self {
        Self {
            kinds: OperationKind::ALL.to_vec(),
        }
    }
}

impl OperationRegistry {
    /// Returns the process-wide registry, building it on first use.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::default)
    }

    /// Returns the registered kinds in registry order.
    #[must_use]
    pub fn kinds(&self) -> &[OperationKind] {
        &self.kinds
    }

    /// Creates a fresh operation with default configuration.
    #[must_use]
    pub fn instantiate(&self, kind: OperationKind) -> Operation {
        Operation::new(kind)
    }

    /// Returns true if `kind` accepts `inputs`.
    #[must_use]
    pub fn check(&self, kind: OperationKind, inputs: &[EntryRef]) -> bool {
        Operation::new(kind)
            .pass(inputs)
            .is_some_and(|outputs| !outputs.is_empty())
    }

    /// Lists every operation that accepts `inputs`.
    #[must_use]
    pub fn applicable(&self, inputs: &[EntryRef]) -> Vec<Applicable> {
        let found: Vec<Applicable> = self
            .kinds
            .iter()
            .filter_map(|&kind| {
                let mut operation = self.instantiate(kind);
                let outputs = operation.pass(inputs).filter(|outputs| !outputs.is_empty())?;
                Some(Applicable {
                    kind,
                    operation,
                    outputs,
                })
            })
            .collect();
        debug!(
            inputs = inputs.len(),
            matches = found.len(),
            "Queried applicable operations"
        );
        found
    }
}
