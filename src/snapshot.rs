//! postcard snapshots of compiled functions.
//!
//! Names lose their identity when serialized. Loading re-interns every name
//! through a [`NameTable`] so identity-keyed lookups keep working.

use crate::bytecode::{BytecodeArray, VerifyError, verify};
use crate::lang::name::NameTable;
use crate::lang::value::{HeapObject, Object};
use crate::scope_info::{ScopeInfo, ScopeInfoError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot error: encode failed: {0}")]
    Encode(postcard::Error),

    #[error("snapshot error: decode failed: {0}")]
    Decode(postcard::Error),

    #[error("snapshot error: malformed bytecode: {0}")]
    MalformedBytecode(#[from] VerifyError),

    #[error("snapshot error: malformed scope info: {0}")]
    MalformedScopeInfo(#[from] ScopeInfoError),
}

/// Everything needed to run one function again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSnapshot {
    pub scope_info: ScopeInfo,
    pub bytecode: BytecodeArray,
}

impl FunctionSnapshot {
    pub fn new(scope_info: ScopeInfo, bytecode: BytecodeArray) -> Self {
        Self {
            scope_info,
            bytecode,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let bytes = postcard::to_allocvec(self).map_err(SnapshotError::Encode)?;
        debug!(bytes = bytes.len(), "wrote function snapshot");
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8], names: &NameTable) -> Result<Self, SnapshotError> {
        let raw: FunctionSnapshot = postcard::from_bytes(bytes).map_err(SnapshotError::Decode)?;
        Ok(Self {
            scope_info: load_scope_info_checked(raw.scope_info, names)?,
            bytecode: load_bytecode_checked(raw.bytecode, names)?,
        })
    }
}

pub fn serialize_scope_info(scope_info: &ScopeInfo) -> Result<Vec<u8>, SnapshotError> {
    postcard::to_allocvec(scope_info).map_err(SnapshotError::Encode)
}

pub fn deserialize_scope_info(bytes: &[u8], names: &NameTable) -> Result<ScopeInfo, SnapshotError> {
    let raw: ScopeInfo = postcard::from_bytes(bytes).map_err(SnapshotError::Decode)?;
    load_scope_info_checked(raw, names)
}

pub fn serialize_bytecode(array: &BytecodeArray) -> Result<Vec<u8>, SnapshotError> {
    postcard::to_allocvec(array).map_err(SnapshotError::Encode)
}

pub fn deserialize_bytecode(
    bytes: &[u8],
    names: &NameTable,
) -> Result<BytecodeArray, SnapshotError> {
    let raw: BytecodeArray = postcard::from_bytes(bytes).map_err(SnapshotError::Decode)?;
    load_bytecode_checked(raw, names)
}

fn load_scope_info_checked(raw: ScopeInfo, names: &NameTable) -> Result<ScopeInfo, SnapshotError> {
    raw.validate()?;
    Ok(raw.reintern(names))
}

fn load_bytecode_checked(
    raw: BytecodeArray,
    names: &NameTable,
) -> Result<BytecodeArray, SnapshotError> {
    verify(&raw)?;
    let constant_pool = raw
        .constant_pool()
        .iter()
        .map(|constant| match constant {
            Object::Heap(handle) => match &**handle {
                HeapObject::String(name) => Object::Heap(Arc::new(HeapObject::String(
                    names.intern_name(name),
                ))),
                HeapObject::HeapNumber(_) => constant.clone(),
            },
            other => other.clone(),
        })
        .collect();
    Ok(BytecodeArray::new(
        raw.bytecodes().to_vec(),
        constant_pool,
        raw.frame_size(),
        raw.parameter_count(),
    ))
}
