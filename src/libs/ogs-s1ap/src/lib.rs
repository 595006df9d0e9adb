//! NextGCore S1AP Protocol Library
//!
//! This crate provides S1AP message types, the PDU envelope codec and
//! message builders. S1AP is the control plane protocol between eNodeB
//! and MME/EPC per 3GPP TS 36.413.

pub mod types;
pub mod error;
pub mod pdu;
pub mod builder;

#[cfg(test)]
mod property_tests;

pub use types::*;
pub use error::{S1apError, S1apResult};
pub use pdu::{
    procedure_code, protocol_ie_id, Criticality, InitiatingMessage, S1apPdu, SuccessfulOutcome,
    UnsuccessfulOutcome,
};
pub use builder::*;
