//! Stages bind an operation to input and output targets.

use crate::core::TargetId;
use crate::operations::{Operation, OperationKind};
use serde::{Deserialize, Serialize};

/// One operation applied to ordered inputs, producing ordered outputs.
///
/// Positions matter: the operation receives inputs and writes outputs in the
/// order listed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    operation: Operation,
    inputs: Vec<TargetId>,
    outputs: Vec<TargetId>,
}

impl Stage {
    /// Creates a stage.
    #[must_use]
    pub fn new(operation: Operation, inputs: Vec<TargetId>, outputs: Vec<TargetId>) -> Self {
        Self {
            operation,
            inputs,
            outputs,
        }
    }

    /// Returns the configured operation.
    #[must_use]
    pub const fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Returns the operation for editing its configuration.
    pub fn operation_mut(&mut self) -> &mut Operation {
        &mut self.operation
    }

    /// Returns the operation kind.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// Returns the input targets.
    #[must_use]
    pub fn inputs(&self) -> &[TargetId] {
        &self.inputs
    }

    /// Returns the output targets.
    #[must_use]
    pub fn outputs(&self) -> &[TargetId] {
        &self.outputs
    }

    /// Returns true if `target` is one of the inputs.
    #[must_use]
    pub fn consumes(&self, target: TargetId) -> bool {
        self.inputs.contains(&target)
    }

    /// Returns true if `target` is one of the outputs.
    #[must_use]
    pub fn produces(&self, target: TargetId) -> bool {
        self.outputs.contains(&target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership() {
        let stage = Stage::new(
            Operation::new(OperationKind::PassThrough),
            vec![TargetId::new(0)],
            vec![TargetId::new(1)],
        );
        assert!(stage.consumes(TargetId::new(0)));
        assert!(!stage.consumes(TargetId::new(1)));
        assert!(stage.produces(TargetId::new(1)));
        assert_eq!(stage.kind(), OperationKind::PassThrough);
    }
}
