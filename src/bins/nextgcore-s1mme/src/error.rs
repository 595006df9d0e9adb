//! MME S1 Error Types

use ogs_s1ap::S1apError;
use thiserror::Error;

use crate::s1ap_path::TransportError;

/// Errors reported by the context store, bearer tracker and dispatcher
///
/// None of these is fatal to the event loop; they are logged per inbound unit.
#[derive(Error, Debug)]
pub enum MmeError {
    /// Inbound bytes could not be decoded as an S1AP PDU
    #[error("S1AP decode failed: {0}")]
    Decode(#[from] S1apError),

    /// No eNB is registered on the association
    #[error("Unknown association: {0}")]
    UnknownAssociation(u64),

    /// The owning association has no registered eNB
    #[error("No eNB registered on association {0}")]
    UnknownEnb(u64),

    /// No UE context for the MME-UE-S1AP-ID
    #[error("Unknown UE: MME-UE-S1AP-ID={0}")]
    UnknownUe(u32),

    /// eNB ID already registered
    #[error("Duplicate eNB: eNB-ID={enb_id:#x} already on association {association_id}")]
    DuplicateEnb { enb_id: u32, association_id: u64 },

    /// Association already owns an eNB
    #[error("Association {association_id} already owns eNB-ID={enb_id:#x}")]
    AssociationInUse { association_id: u64, enb_id: u32 },

    /// MME-UE-S1AP-ID already held by a live context
    #[error("Duplicate UE: MME-UE-S1AP-ID={0}")]
    DuplicateUe(u32),

    /// E-RAB ID outside 1..=15
    #[error("Invalid E-RAB ID: {0}")]
    InvalidBearerId(u8),

    /// Bearer transition not allowed from the current state
    #[error("Invalid bearer state: E-RAB {erab_id} is {state}, expected {expected}")]
    InvalidBearerState {
        erab_id: u8,
        state: &'static str,
        expected: &'static str,
    },

    /// Every identifier in the range is held by a live context
    #[error("{0} identifiers exhausted")]
    IdsExhausted(&'static str),

    /// Reply could not be transmitted
    #[error("Failed to send reply on association {association_id}: {source}")]
    TransportSendFailure {
        association_id: u64,
        #[source]
        source: TransportError,
    },

    /// Decoded PDU has no handler
    #[error("Unhandled S1AP message: {0}")]
    UnhandledMessageKind(String),
}

/// MME result type
pub type MmeResult<T> = Result<T, MmeError>;
