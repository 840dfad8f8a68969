//! Shared error taxonomy for swap verification, building, signing and
//! broadcast. Every adapter converts its chain-native failures into
//! [`SwapError`] so callers can apply one retry policy across chains.

/// Errors produced along the verify → build → sign → broadcast pipeline.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SwapError {
    // lookup
    #[error("miss token config")]
    MissTokenConfig,
    #[error("no bridge for chain id")]
    NoBridgeForChainID,
    #[error("miss router info")]
    MissRouterInfo,

    // shape
    #[error("log index out of range")]
    LogIndexOutOfRange,
    #[error("tx with wrong topics")]
    TxWithWrongTopics,
    #[error("parse data error")]
    ParseDataError,
    #[error("swapout log not found")]
    SwapoutLogNotFound,
    #[error("tx with removed log")]
    TxWithRemovedLog,
    #[error("tx with wrong contract")]
    TxWithWrongContract,

    // semantic
    #[error("from chain id mismatch in receipt")]
    FromChainIDMismatch,
    #[error("same from and to chain id")]
    SameFromAndToChainID,
    #[error("tx with wrong value")]
    TxWithWrongValue,
    #[error("wrong bind address")]
    WrongBindAddress,
    #[error("swap type not supported")]
    SwapTypeNotSupported,

    // state
    #[error("tx not found")]
    TxNotFound,
    #[error("tx not stable")]
    TxNotStable,
    #[error("tx before initial height")]
    TxBeforeInitialHeight,
    #[error("tx with wrong status")]
    TxWithWrongStatus,

    // transport
    #[error("broadcast tx failed")]
    BroadcastTx,
    #[error("commit message failed")]
    CommitMessage,
    #[error("rpc query error: {0}")]
    RpcQuery(String),

    // signing
    #[error("wrong raw tx")]
    WrongRawTx,
    #[error("wrong signed tx")]
    WrongSignedTx,
    #[error("get sign status require one rsv but return many")]
    MultipleRsv,
    #[error("mpc sign failed: {0}")]
    MpcSign(String),
    #[error("signature verification failed")]
    SignatureVerifyFailed,

    // configuration
    #[error("wrong config: {0}")]
    WrongConfig(String),
}

impl SwapError {
    /// Wrap an arbitrary transport-layer failure as an RPC query error.
    pub fn rpc<E: std::fmt::Display>(err: E) -> Self {
        SwapError::RpcQuery(err.to_string())
    }

    /// Recoverable errors may be retried by the caller; fatal conditions
    /// (configuration, MPC protocol violations, signature verification)
    /// abort the task.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SwapError::TxNotStable
                | SwapError::TxNotFound
                | SwapError::BroadcastTx
                | SwapError::CommitMessage
                | SwapError::RpcQuery(_)
        )
    }

    /// Fatal protocol or configuration violations.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SwapError::MultipleRsv | SwapError::SignatureVerifyFailed | SwapError::WrongConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsv_arity_message() {
        assert_eq!(
            SwapError::MultipleRsv.to_string(),
            "get sign status require one rsv but return many"
        );
    }

    #[test]
    fn recoverability() {
        assert!(SwapError::TxNotStable.is_recoverable());
        assert!(SwapError::RpcQuery("timeout".into()).is_recoverable());
        assert!(!SwapError::WrongBindAddress.is_recoverable());
        assert!(SwapError::SignatureVerifyFailed.is_fatal());
        assert!(!SwapError::TxNotFound.is_fatal());
    }
}
