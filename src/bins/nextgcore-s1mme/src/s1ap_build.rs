//! S1AP Message Building
//!
//! Builds the PDUs the MME originates: S1 Setup Response/Failure, UE Context
//! Release Command, Initial Context Setup Request and Downlink NAS Transport.

use ogs_s1ap::{
    Cause, DlNasTransport, ErabToBeSetupItem, InitialContextSetupRequest, InitiatingMessage,
    S1SetupFailure, S1SetupResponse, S1apPdu, ServedGummeiItem, SuccessfulOutcome, TimeToWait,
    UeAmbr, UeContextReleaseCommand, UeS1apIds, UeSecurityCapabilities, UnsuccessfulOutcome,
};

use crate::config::MmeConfig;
use crate::context::UeEcmCtx;

// ============================================================================
// S1 Setup
// ============================================================================

/// Build S1 Setup Response from the served GUMMEI
pub fn build_setup_response(config: &MmeConfig) -> S1apPdu {
    let gummei = ServedGummeiItem {
        served_plmns: vec![config.served_plmn().to_tbcd()],
        served_group_ids: vec![config.gummei.mme_gid],
        served_mmec_codes: vec![config.gummei.mme_code],
    };

    S1apPdu::SuccessfulOutcome(SuccessfulOutcome::S1SetupResponse(S1SetupResponse {
        mme_name: Some(config.mme_name.clone()),
        served_gummeis: vec![gummei],
        relative_mme_capacity: config.relative_capacity,
    }))
}

/// Build S1 Setup Failure
pub fn build_setup_failure(cause: Cause, time_to_wait: Option<TimeToWait>) -> S1apPdu {
    S1apPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::S1SetupFailure(S1SetupFailure {
        cause,
        time_to_wait,
    }))
}

// ============================================================================
// UE Context Management
// ============================================================================

/// Build UE Context Release Command for a UE
pub fn build_ue_context_release_command(ue: &UeEcmCtx, cause: Cause) -> S1apPdu {
    S1apPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(UeContextReleaseCommand {
        ue_s1ap_ids: UeS1apIds::Pair {
            mme_ue_s1ap_id: ue.mme_ue_s1ap_id,
            enb_ue_s1ap_id: ue.enb_ue_s1ap_id,
        },
        cause,
    }))
}

/// Parameters of an Initial Context Setup Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContextSetupParams {
    /// UE-AMBR
    pub ue_ambr: UeAmbr,
    /// E-RABs to set up
    pub erab_list: Vec<ErabToBeSetupItem>,
    /// UE security capabilities
    pub ue_security_capabilities: UeSecurityCapabilities,
    /// KeNB
    pub security_key: [u8; 32],
}

/// Build Initial Context Setup Request for a UE
pub fn build_initial_context_setup_request(
    ue: &UeEcmCtx,
    params: &InitialContextSetupParams,
) -> S1apPdu {
    S1apPdu::InitiatingMessage(InitiatingMessage::InitialContextSetupRequest(
        InitialContextSetupRequest {
            mme_ue_s1ap_id: ue.mme_ue_s1ap_id,
            enb_ue_s1ap_id: ue.enb_ue_s1ap_id,
            ue_ambr: params.ue_ambr,
            erab_list: params.erab_list.clone(),
            ue_security_capabilities: params.ue_security_capabilities,
            security_key: params.security_key,
        },
    ))
}

// ============================================================================
// NAS Transport
// ============================================================================

/// Build Downlink NAS Transport carrying a NAS PDU
pub fn build_downlink_nas_transport(ue: &UeEcmCtx, nas_pdu: &[u8]) -> S1apPdu {
    S1apPdu::InitiatingMessage(InitiatingMessage::DownlinkNasTransport(DlNasTransport {
        mme_ue_s1ap_id: ue.mme_ue_s1ap_id,
        enb_ue_s1ap_id: ue.enb_ue_s1ap_id,
        nas_pdu: nas_pdu.to_vec(),
    }))
}
