//! Shared helpers for S1 flow tests

#![allow(dead_code)]

use bytes::Bytes;
use nextgcore_s1mme::{S1apTransport, TransportError};
use ogs_s1ap::*;

/// TBCD PLMN 001/01
pub const TEST_PLMN: PlmnIdentity = [0x00, 0xf1, 0x10];

/// Transport that records every sent PDU
#[derive(Debug, Default)]
pub struct CaptureTransport {
    pub sent: Vec<(u64, Bytes)>,
}

impl CaptureTransport {
    /// Decode the most recent reply
    pub fn last_pdu(&self) -> Option<S1apPdu> {
        self.sent.last().and_then(|(_, data)| S1apPdu::decode(data).ok())
    }
}

impl S1apTransport for CaptureTransport {
    fn send(&mut self, association_id: u64, data: Bytes) -> Result<usize, TransportError> {
        let len = data.len();
        self.sent.push((association_id, data));
        Ok(len)
    }
}

pub fn s1_setup_request(enb_id: u32, tac: u16) -> Bytes {
    build_s1_setup_request(&S1SetupRequest {
        global_enb_id: GlobalEnbId { plmn_identity: TEST_PLMN, enb_id },
        enb_name: Some(format!("enb-{enb_id}")),
        supported_tas: vec![SupportedTaItem { tac, broadcast_plmns: vec![TEST_PLMN] }],
        default_paging_drx: PagingDrx::V128,
    })
    .expect("encode S1SetupRequest")
}

pub fn initial_ue_message(enb_ue_s1ap_id: u32, s_tmsi: Option<STmsi>) -> Bytes {
    build_initial_ue_message(&InitialUeMessage {
        enb_ue_s1ap_id,
        nas_pdu: vec![0x07, 0x41, 0x71],
        tai: Tai { plmn_identity: TEST_PLMN, tac: 7 },
        eutran_cgi: EutranCgi { plmn_identity: TEST_PLMN, cell_identity: 0x0019b01 },
        rrc_establishment_cause: RrcEstablishmentCause::MoSignalling,
        s_tmsi,
    })
    .expect("encode InitialUEMessage")
}

pub fn erab_to_be_setup(erab_id: u8) -> ErabToBeSetupItem {
    ErabToBeSetupItem {
        erab_id,
        erab_qos: ErabLevelQosParameters {
            qci: 9,
            arp: AllocationRetentionPriority {
                priority_level: 8,
                pre_emption_capability: false,
                pre_emption_vulnerability: false,
            },
        },
        transport_layer_address: vec![10, 0, 0, 2],
        gtp_teid: 0x100 + erab_id as u32,
        nas_pdu: None,
    }
}
