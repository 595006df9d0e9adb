//! S1AP Message Builders
//!
//! Functions for building encoded S1AP PDUs from high-level types.

use bytes::Bytes;

use crate::error::S1apResult;
use crate::pdu::{InitiatingMessage, S1apPdu, SuccessfulOutcome, UnsuccessfulOutcome};
use crate::types::*;

/// Build an S1 Setup Request PDU
pub fn build_s1_setup_request(msg: &S1SetupRequest) -> S1apResult<Bytes> {
    S1apPdu::InitiatingMessage(InitiatingMessage::S1SetupRequest(msg.clone())).to_bytes()
}

/// Build an S1 Setup Response PDU
pub fn build_s1_setup_response(msg: &S1SetupResponse) -> S1apResult<Bytes> {
    S1apPdu::SuccessfulOutcome(SuccessfulOutcome::S1SetupResponse(msg.clone())).to_bytes()
}

/// Build an S1 Setup Failure PDU
pub fn build_s1_setup_failure(msg: &S1SetupFailure) -> S1apResult<Bytes> {
    S1apPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::S1SetupFailure(msg.clone())).to_bytes()
}

/// Build an Initial UE Message PDU
pub fn build_initial_ue_message(msg: &InitialUeMessage) -> S1apResult<Bytes> {
    S1apPdu::InitiatingMessage(InitiatingMessage::InitialUeMessage(msg.clone())).to_bytes()
}

/// Build a Downlink NAS Transport PDU
pub fn build_dl_nas_transport(msg: &DlNasTransport) -> S1apResult<Bytes> {
    S1apPdu::InitiatingMessage(InitiatingMessage::DownlinkNasTransport(msg.clone())).to_bytes()
}

/// Build an Uplink NAS Transport PDU
pub fn build_ul_nas_transport(msg: &UlNasTransport) -> S1apResult<Bytes> {
    S1apPdu::InitiatingMessage(InitiatingMessage::UplinkNasTransport(msg.clone())).to_bytes()
}

/// Build an Initial Context Setup Request PDU
pub fn build_initial_context_setup_request(msg: &InitialContextSetupRequest) -> S1apResult<Bytes> {
    S1apPdu::InitiatingMessage(InitiatingMessage::InitialContextSetupRequest(msg.clone())).to_bytes()
}

/// Build an Initial Context Setup Response PDU
pub fn build_initial_context_setup_response(msg: &InitialContextSetupResponse) -> S1apResult<Bytes> {
    S1apPdu::SuccessfulOutcome(SuccessfulOutcome::InitialContextSetupResponse(msg.clone())).to_bytes()
}

/// Build an Initial Context Setup Failure PDU
pub fn build_initial_context_setup_failure(msg: &InitialContextSetupFailure) -> S1apResult<Bytes> {
    S1apPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::InitialContextSetupFailure(msg.clone()))
        .to_bytes()
}

/// Build a UE Context Release Request PDU
pub fn build_ue_context_release_request(msg: &UeContextReleaseRequest) -> S1apResult<Bytes> {
    S1apPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseRequest(msg.clone())).to_bytes()
}

/// Build a UE Context Release Command PDU
pub fn build_ue_context_release_command(msg: &UeContextReleaseCommand) -> S1apResult<Bytes> {
    S1apPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(msg.clone())).to_bytes()
}

/// Build a UE Context Release Complete PDU
pub fn build_ue_context_release_complete(msg: &UeContextReleaseComplete) -> S1apResult<Bytes> {
    S1apPdu::SuccessfulOutcome(SuccessfulOutcome::UeContextReleaseComplete(msg.clone())).to_bytes()
}
