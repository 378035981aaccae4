// crates/ledger/src/contract.rs
//! Execution façade types: the contract-VM trait the node injects, the
//! per-transaction notify record, and the protocol gas parameters.

use crate::address::Address;
use crate::hash::Hash256;
use crate::overlay::CacheDb;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Gas floor charged for any executed transaction.
pub const MIN_TRANSACTION_GAS: u64 = 20_000;
/// Code length unit for length-scaled gas.
pub const PER_UNIT_CODE_LEN: u64 = 1024;

/// Global-params names for the gas table.
pub const CONTRACT_CREATE_NAME: &str = "contract.create";
pub const INVOKE_CODE_LEN_NAME: &str = "invoke.codeLen";
pub const DEPLOY_CODE_LEN_NAME: &str = "deploy.codeLen";

/// Reserved address of the global-params native contract.
pub const GLOBAL_PARAMS_ADDRESS: Address = Address([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x04,
]);
pub const GET_GLOBAL_PARAM_METHOD: &str = "getGlobalParam";

#[inline]
pub fn calc_gas_by_code_len(code_len: usize, factor: u64) -> u64 {
    (code_len as u64 / PER_UNIT_CODE_LEN).saturating_mul(factor)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractState {
    Fail,
    Success,
}

/// One event emitted by a contract during execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyEventInfo {
    pub contract: Address,
    pub states: Vec<u8>,
}

/// Outcome record of a single transaction's execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteNotify {
    pub tx_hash: Hash256,
    pub state: ContractState,
    pub gas_consumed: u64,
    pub notify: Vec<NotifyEventInfo>,
}

impl ExecuteNotify {
    /// The starting record: FAIL until a handler proves otherwise.
    pub fn fail(tx_hash: Hash256) -> Self {
        Self {
            tx_hash,
            state: ContractState::Fail,
            gas_consumed: 0,
            notify: Vec::new(),
        }
    }
}

/// Result of a no-commit simulation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreExecResult {
    pub state: ContractState,
    pub gas: u64,
    pub result: Option<String>,
    pub notify: Vec<NotifyEventInfo>,
}

/// Execution context handed to the VM for one call.
#[derive(Clone, Debug)]
pub struct ExecConfig {
    /// Block timestamp (seconds) or wall clock for pre-execution.
    pub time: u32,
    pub height: u32,
    pub block_hash: Hash256,
    pub tx_hash: Hash256,
    pub pre_exec: bool,
}

#[derive(Debug, Error)]
pub enum VmError {
    #[error("vm fault: {0}")]
    Fault(String),
    #[error("out of gas")]
    OutOfGas,
    #[error("unknown native contract {0}")]
    UnknownNative(Address),
    #[error("unknown native method {0}")]
    UnknownMethod(String),
    #[error("transaction type not executable")]
    NotExecutable,
}

/// The smart-contract virtual machine, injected at `Ledger::open`.
///
/// `invoke` runs contract code against the per-transaction cache,
/// decrementing `gas` in place and appending emitted events to `notify`.
/// `native_call` dispatches a method on a native contract and returns its
/// serialized result.
pub trait ContractVm: Send + Sync {
    fn invoke(
        &self,
        cfg: &ExecConfig,
        cache: &mut CacheDb<'_>,
        code: &[u8],
        gas: &mut u64,
        notify: &mut Vec<NotifyEventInfo>,
    ) -> Result<Vec<u8>, VmError>;

    fn native_call(
        &self,
        cfg: &ExecConfig,
        cache: &mut CacheDb<'_>,
        contract: Address,
        method: &str,
        args: &[u8],
    ) -> Result<Vec<u8>, VmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_scales_per_unit() {
        assert_eq!(calc_gas_by_code_len(0, 100), 0);
        assert_eq!(calc_gas_by_code_len(1023, 100), 0);
        assert_eq!(calc_gas_by_code_len(1024, 100), 100);
        assert_eq!(calc_gas_by_code_len(4096, 25), 100);
    }

    #[test]
    fn notify_starts_failed() {
        let n = ExecuteNotify::fail(Hash256::ZERO);
        assert_eq!(n.state, ContractState::Fail);
        assert_eq!(n.gas_consumed, 0);
        assert!(n.notify.is_empty());
    }
}
