use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names a file on the proposing node. Peers assign their own local ids, so
/// the name travels alongside the id and is used to resolve the target there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: u64,
    pub name: String,
}

impl FileRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A mutation carried through propose and accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Upload {
        name: String,
        #[serde(with = "crate::payload")]
        data: Bytes,
    },
    Delete {
        target: FileRef,
    },
    Rename {
        target: FileRef,
        new_name: String,
        hold_duration_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Upload,
    Delete,
    Rename,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Upload { .. } => OperationKind::Upload,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Rename { .. } => OperationKind::Rename,
        }
    }

    /// Name of the file the operation acts on, before it is applied.
    pub fn file_name(&self) -> &str {
        match self {
            Operation::Upload { name, .. } => name,
            Operation::Delete { target } => &target.name,
            Operation::Rename { target, .. } => &target.name,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationKind::Upload => "UPLOAD",
            OperationKind::Delete => "DELETE",
            OperationKind::Rename => "RENAME",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub round: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareResponse {
    pub round: u64,
}
