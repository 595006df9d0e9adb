//! S1AP PDU Envelope
//!
//! The S1AP-PDU is a CHOICE of InitiatingMessage, SuccessfulOutcome and
//! UnsuccessfulOutcome, each carrying a procedure code and a list of
//! protocol IEs. This module uses a compact byte layout instead of APER:
//!
//! ```text
//! PDU := choice(u8) procedure_code(u8) criticality(u8) ie_count(u16) IE*
//! IE  := id(u16) criticality(u8) length(u16) value[length]
//! ```
//!
//! Choice bytes mirror the first octet of the APER encoding
//! (0x00, 0x20, 0x40). Procedure codes and IE ids follow TS 36.413.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{S1apError, S1apResult};
use crate::types::*;

// ============================================================================
// S1AP Constants
// ============================================================================

/// S1AP Procedure Codes
pub mod procedure_code {
    pub const HANDOVER_PREPARATION: u8 = 0;
    pub const PATH_SWITCH_REQUEST: u8 = 3;
    pub const E_RAB_SETUP: u8 = 5;
    pub const E_RAB_RELEASE: u8 = 7;
    pub const INITIAL_CONTEXT_SETUP: u8 = 9;
    pub const PAGING: u8 = 10;
    pub const DOWNLINK_NAS_TRANSPORT: u8 = 11;
    pub const INITIAL_UE_MESSAGE: u8 = 12;
    pub const UPLINK_NAS_TRANSPORT: u8 = 13;
    pub const RESET: u8 = 14;
    pub const ERROR_INDICATION: u8 = 15;
    pub const NAS_NON_DELIVERY_INDICATION: u8 = 16;
    pub const S1_SETUP: u8 = 17;
    pub const UE_CONTEXT_RELEASE_REQUEST: u8 = 18;
    pub const UE_CONTEXT_RELEASE: u8 = 23;
    pub const ENB_CONFIGURATION_UPDATE: u8 = 29;
}

/// S1AP Protocol IEs
pub mod protocol_ie_id {
    pub const MME_UE_S1AP_ID: u16 = 0;
    pub const CAUSE: u16 = 2;
    pub const ENB_UE_S1AP_ID: u16 = 8;
    pub const E_RAB_TO_BE_SETUP_LIST_CTXT_SU_REQ: u16 = 24;
    pub const NAS_PDU: u16 = 26;
    pub const E_RAB_SETUP_LIST_CTXT_SU_RES: u16 = 51;
    pub const GLOBAL_ENB_ID: u16 = 59;
    pub const ENB_NAME: u16 = 60;
    pub const MME_NAME: u16 = 61;
    pub const SUPPORTED_TAS: u16 = 64;
    pub const TIME_TO_WAIT: u16 = 65;
    pub const UE_AGGREGATE_MAXIMUM_BITRATE: u16 = 66;
    pub const TAI: u16 = 67;
    pub const SECURITY_KEY: u16 = 73;
    pub const RELATIVE_MME_CAPACITY: u16 = 87;
    pub const S_TMSI: u16 = 96;
    pub const UE_S1AP_IDS: u16 = 99;
    pub const EUTRAN_CGI: u16 = 100;
    pub const SERVED_GUMMEIS: u16 = 105;
    pub const UE_SECURITY_CAPABILITIES: u16 = 107;
    pub const RRC_ESTABLISHMENT_CAUSE: u16 = 134;
    pub const DEFAULT_PAGING_DRX: u16 = 137;
}

/// First octet of each S1AP-PDU alternative
pub mod pdu_choice {
    pub const INITIATING_MESSAGE: u8 = 0x00;
    pub const SUCCESSFUL_OUTCOME: u8 = 0x20;
    pub const UNSUCCESSFUL_OUTCOME: u8 = 0x40;
}

/// Fixed PDU header length (choice, procedure code, criticality, IE count)
pub const PDU_HEADER_LEN: usize = 5;

/// Fixed IE header length (id, criticality, length)
pub const IE_HEADER_LEN: usize = 5;

/// S1AP Criticality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Criticality {
    Reject = 0,
    Ignore = 1,
    Notify = 2,
}

fn procedure_criticality(procedure_code: u8) -> Criticality {
    use procedure_code::*;
    match procedure_code {
        INITIAL_UE_MESSAGE | UPLINK_NAS_TRANSPORT | DOWNLINK_NAS_TRANSPORT
        | UE_CONTEXT_RELEASE_REQUEST | ERROR_INDICATION | NAS_NON_DELIVERY_INDICATION
        | PAGING => Criticality::Ignore,
        _ => Criticality::Reject,
    }
}

// ============================================================================
// PDU Types
// ============================================================================

/// Decoded S1AP-PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S1apPdu {
    InitiatingMessage(InitiatingMessage),
    SuccessfulOutcome(SuccessfulOutcome),
    UnsuccessfulOutcome(UnsuccessfulOutcome),
}

/// InitiatingMessage alternatives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiatingMessage {
    S1SetupRequest(S1SetupRequest),
    InitialUeMessage(InitialUeMessage),
    UplinkNasTransport(UlNasTransport),
    DownlinkNasTransport(DlNasTransport),
    InitialContextSetupRequest(InitialContextSetupRequest),
    UeContextReleaseRequest(UeContextReleaseRequest),
    UeContextReleaseCommand(UeContextReleaseCommand),
    /// Procedure without a typed body; IEs are skipped
    Other { procedure_code: u8 },
}

/// SuccessfulOutcome alternatives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuccessfulOutcome {
    S1SetupResponse(S1SetupResponse),
    InitialContextSetupResponse(InitialContextSetupResponse),
    UeContextReleaseComplete(UeContextReleaseComplete),
    /// Procedure without a typed body; IEs are skipped
    Other { procedure_code: u8 },
}

/// UnsuccessfulOutcome alternatives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsuccessfulOutcome {
    S1SetupFailure(S1SetupFailure),
    InitialContextSetupFailure(InitialContextSetupFailure),
    /// Procedure without a typed body; IEs are skipped
    Other { procedure_code: u8 },
}

impl InitiatingMessage {
    /// Procedure code of this message
    pub fn procedure_code(&self) -> u8 {
        use procedure_code::*;
        match self {
            InitiatingMessage::S1SetupRequest(_) => S1_SETUP,
            InitiatingMessage::InitialUeMessage(_) => INITIAL_UE_MESSAGE,
            InitiatingMessage::UplinkNasTransport(_) => UPLINK_NAS_TRANSPORT,
            InitiatingMessage::DownlinkNasTransport(_) => DOWNLINK_NAS_TRANSPORT,
            InitiatingMessage::InitialContextSetupRequest(_) => INITIAL_CONTEXT_SETUP,
            InitiatingMessage::UeContextReleaseRequest(_) => UE_CONTEXT_RELEASE_REQUEST,
            InitiatingMessage::UeContextReleaseCommand(_) => UE_CONTEXT_RELEASE,
            InitiatingMessage::Other { procedure_code } => *procedure_code,
        }
    }

    /// Message name for logging
    pub fn name(&self) -> &'static str {
        match self {
            InitiatingMessage::S1SetupRequest(_) => "S1SetupRequest",
            InitiatingMessage::InitialUeMessage(_) => "InitialUEMessage",
            InitiatingMessage::UplinkNasTransport(_) => "UplinkNASTransport",
            InitiatingMessage::DownlinkNasTransport(_) => "DownlinkNASTransport",
            InitiatingMessage::InitialContextSetupRequest(_) => "InitialContextSetupRequest",
            InitiatingMessage::UeContextReleaseRequest(_) => "UEContextReleaseRequest",
            InitiatingMessage::UeContextReleaseCommand(_) => "UEContextReleaseCommand",
            InitiatingMessage::Other { .. } => "InitiatingMessage",
        }
    }
}

impl SuccessfulOutcome {
    /// Procedure code of this message
    pub fn procedure_code(&self) -> u8 {
        use procedure_code::*;
        match self {
            SuccessfulOutcome::S1SetupResponse(_) => S1_SETUP,
            SuccessfulOutcome::InitialContextSetupResponse(_) => INITIAL_CONTEXT_SETUP,
            SuccessfulOutcome::UeContextReleaseComplete(_) => UE_CONTEXT_RELEASE,
            SuccessfulOutcome::Other { procedure_code } => *procedure_code,
        }
    }

    /// Message name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SuccessfulOutcome::S1SetupResponse(_) => "S1SetupResponse",
            SuccessfulOutcome::InitialContextSetupResponse(_) => "InitialContextSetupResponse",
            SuccessfulOutcome::UeContextReleaseComplete(_) => "UEContextReleaseComplete",
            SuccessfulOutcome::Other { .. } => "SuccessfulOutcome",
        }
    }
}

impl UnsuccessfulOutcome {
    /// Procedure code of this message
    pub fn procedure_code(&self) -> u8 {
        use procedure_code::*;
        match self {
            UnsuccessfulOutcome::S1SetupFailure(_) => S1_SETUP,
            UnsuccessfulOutcome::InitialContextSetupFailure(_) => INITIAL_CONTEXT_SETUP,
            UnsuccessfulOutcome::Other { procedure_code } => *procedure_code,
        }
    }

    /// Message name for logging
    pub fn name(&self) -> &'static str {
        match self {
            UnsuccessfulOutcome::S1SetupFailure(_) => "S1SetupFailure",
            UnsuccessfulOutcome::InitialContextSetupFailure(_) => "InitialContextSetupFailure",
            UnsuccessfulOutcome::Other { .. } => "UnsuccessfulOutcome",
        }
    }
}

impl S1apPdu {
    /// Choice octet of this PDU
    pub fn choice(&self) -> u8 {
        match self {
            S1apPdu::InitiatingMessage(_) => pdu_choice::INITIATING_MESSAGE,
            S1apPdu::SuccessfulOutcome(_) => pdu_choice::SUCCESSFUL_OUTCOME,
            S1apPdu::UnsuccessfulOutcome(_) => pdu_choice::UNSUCCESSFUL_OUTCOME,
        }
    }

    /// Procedure code of this PDU
    pub fn procedure_code(&self) -> u8 {
        match self {
            S1apPdu::InitiatingMessage(m) => m.procedure_code(),
            S1apPdu::SuccessfulOutcome(m) => m.procedure_code(),
            S1apPdu::UnsuccessfulOutcome(m) => m.procedure_code(),
        }
    }

    /// Message name for logging
    pub fn name(&self) -> &'static str {
        match self {
            S1apPdu::InitiatingMessage(m) => m.name(),
            S1apPdu::SuccessfulOutcome(m) => m.name(),
            S1apPdu::UnsuccessfulOutcome(m) => m.name(),
        }
    }

    /// Encode into `buf`
    pub fn encode(&self, buf: &mut BytesMut) -> S1apResult<()> {
        let mut ies = IeList::default();
        match self {
            S1apPdu::InitiatingMessage(m) => match m {
                InitiatingMessage::S1SetupRequest(m) => encode_s1_setup_request(m, &mut ies)?,
                InitiatingMessage::InitialUeMessage(m) => encode_initial_ue_message(m, &mut ies)?,
                InitiatingMessage::UplinkNasTransport(m) => encode_ul_nas_transport(m, &mut ies)?,
                InitiatingMessage::DownlinkNasTransport(m) => encode_dl_nas_transport(m, &mut ies)?,
                InitiatingMessage::InitialContextSetupRequest(m) => {
                    encode_initial_context_setup_request(m, &mut ies)?
                }
                InitiatingMessage::UeContextReleaseRequest(m) => {
                    encode_ue_context_release_request(m, &mut ies)?
                }
                InitiatingMessage::UeContextReleaseCommand(m) => {
                    encode_ue_context_release_command(m, &mut ies)?
                }
                InitiatingMessage::Other { .. } => {}
            },
            S1apPdu::SuccessfulOutcome(m) => match m {
                SuccessfulOutcome::S1SetupResponse(m) => encode_s1_setup_response(m, &mut ies)?,
                SuccessfulOutcome::InitialContextSetupResponse(m) => {
                    encode_initial_context_setup_response(m, &mut ies)?
                }
                SuccessfulOutcome::UeContextReleaseComplete(m) => {
                    encode_ue_context_release_complete(m, &mut ies)?
                }
                SuccessfulOutcome::Other { .. } => {}
            },
            S1apPdu::UnsuccessfulOutcome(m) => match m {
                UnsuccessfulOutcome::S1SetupFailure(m) => encode_s1_setup_failure(m, &mut ies)?,
                UnsuccessfulOutcome::InitialContextSetupFailure(m) => {
                    encode_initial_context_setup_failure(m, &mut ies)?
                }
                UnsuccessfulOutcome::Other { .. } => {}
            },
        }

        let procedure_code = self.procedure_code();
        buf.reserve(PDU_HEADER_LEN + ies.body.len());
        buf.put_u8(self.choice());
        buf.put_u8(procedure_code);
        buf.put_u8(procedure_criticality(procedure_code) as u8);
        buf.put_u16(ies.count);
        buf.put_slice(&ies.body);
        Ok(())
    }

    /// Encode into a freshly allocated buffer
    pub fn to_bytes(&self) -> S1apResult<Bytes> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode one complete PDU
    pub fn decode(data: &[u8]) -> S1apResult<Self> {
        let mut buf = Bytes::copy_from_slice(data);
        need(&buf, PDU_HEADER_LEN)?;

        let choice = buf.get_u8();
        let procedure_code = buf.get_u8();
        let _criticality = buf.get_u8();
        let ie_count = buf.get_u16();

        let mut ies = IeSet::parse(&mut buf, ie_count)?;
        if buf.has_remaining() {
            return Err(S1apError::TrailingData(buf.remaining()));
        }

        use procedure_code::*;
        let pdu = match choice {
            pdu_choice::INITIATING_MESSAGE => S1apPdu::InitiatingMessage(match procedure_code {
                S1_SETUP => InitiatingMessage::S1SetupRequest(decode_s1_setup_request(&mut ies)?),
                INITIAL_UE_MESSAGE => {
                    InitiatingMessage::InitialUeMessage(decode_initial_ue_message(&mut ies)?)
                }
                UPLINK_NAS_TRANSPORT => {
                    InitiatingMessage::UplinkNasTransport(decode_ul_nas_transport(&mut ies)?)
                }
                DOWNLINK_NAS_TRANSPORT => {
                    InitiatingMessage::DownlinkNasTransport(decode_dl_nas_transport(&mut ies)?)
                }
                INITIAL_CONTEXT_SETUP => InitiatingMessage::InitialContextSetupRequest(
                    decode_initial_context_setup_request(&mut ies)?,
                ),
                UE_CONTEXT_RELEASE_REQUEST => InitiatingMessage::UeContextReleaseRequest(
                    decode_ue_context_release_request(&mut ies)?,
                ),
                UE_CONTEXT_RELEASE => InitiatingMessage::UeContextReleaseCommand(
                    decode_ue_context_release_command(&mut ies)?,
                ),
                other => InitiatingMessage::Other { procedure_code: other },
            }),
            pdu_choice::SUCCESSFUL_OUTCOME => S1apPdu::SuccessfulOutcome(match procedure_code {
                S1_SETUP => SuccessfulOutcome::S1SetupResponse(decode_s1_setup_response(&mut ies)?),
                INITIAL_CONTEXT_SETUP => SuccessfulOutcome::InitialContextSetupResponse(
                    decode_initial_context_setup_response(&mut ies)?,
                ),
                UE_CONTEXT_RELEASE => SuccessfulOutcome::UeContextReleaseComplete(
                    decode_ue_context_release_complete(&mut ies)?,
                ),
                other => SuccessfulOutcome::Other { procedure_code: other },
            }),
            pdu_choice::UNSUCCESSFUL_OUTCOME => S1apPdu::UnsuccessfulOutcome(match procedure_code {
                S1_SETUP => UnsuccessfulOutcome::S1SetupFailure(decode_s1_setup_failure(&mut ies)?),
                INITIAL_CONTEXT_SETUP => UnsuccessfulOutcome::InitialContextSetupFailure(
                    decode_initial_context_setup_failure(&mut ies)?,
                ),
                other => UnsuccessfulOutcome::Other { procedure_code: other },
            }),
            other => return Err(S1apError::InvalidPduChoice(other)),
        };

        ies.log_unused(pdu.name());
        Ok(pdu)
    }
}

// ============================================================================
// IE Containers
// ============================================================================

#[derive(Default)]
struct IeList {
    count: u16,
    body: BytesMut,
}

impl IeList {
    fn put<F>(&mut self, id: u16, criticality: Criticality, f: F) -> S1apResult<()>
    where
        F: FnOnce(&mut BytesMut) -> S1apResult<()>,
    {
        let mut value = BytesMut::new();
        f(&mut value)?;
        let len = u16::try_from(value.len())
            .map_err(|_| S1apError::EncodingError(format!("IE {id} too long: {}", value.len())))?;
        self.count = self
            .count
            .checked_add(1)
            .ok_or_else(|| S1apError::EncodingError("too many IEs".to_string()))?;
        self.body.put_u16(id);
        self.body.put_u8(criticality as u8);
        self.body.put_u16(len);
        self.body.put_slice(&value);
        Ok(())
    }
}

struct IeSet {
    ies: Vec<(u16, Option<Bytes>)>,
}

/// IE slots worth reserving; `count` comes off the wire
fn ie_capacity(count: u16, remaining: usize) -> usize {
    (count as usize).min(remaining / IE_HEADER_LEN)
}

impl IeSet {
    fn parse(buf: &mut Bytes, count: u16) -> S1apResult<Self> {
        let mut ies = Vec::with_capacity(ie_capacity(count, buf.remaining()));
        for _ in 0..count {
            need(buf, IE_HEADER_LEN)?;
            let id = buf.get_u16();
            let _criticality = buf.get_u8();
            let len = buf.get_u16() as usize;
            need(buf, len)?;
            ies.push((id, Some(buf.split_to(len))));
        }
        Ok(Self { ies })
    }

    fn optional(&mut self, id: u16) -> Option<Bytes> {
        self.ies
            .iter_mut()
            .find(|(ie_id, value)| *ie_id == id && value.is_some())
            .and_then(|(_, value)| value.take())
    }

    fn mandatory(&mut self, id: u16, ie_name: &'static str) -> S1apResult<Bytes> {
        self.optional(id)
            .ok_or(S1apError::MissingMandatoryIe { ie_name, ie_id: id })
    }

    fn log_unused(&self, message: &str) {
        for (id, value) in &self.ies {
            if value.is_some() {
                log::trace!("{message}: skipping IE id={id}");
            }
        }
    }
}

// ============================================================================
// Field Helpers
// ============================================================================

fn need(buf: &Bytes, expected: usize) -> S1apResult<()> {
    if buf.remaining() < expected {
        return Err(S1apError::BufferTooShort { expected, actual: buf.remaining() });
    }
    Ok(())
}

fn put_count(buf: &mut BytesMut, len: usize, ie_name: &'static str) -> S1apResult<()> {
    let count = u8::try_from(len)
        .map_err(|_| S1apError::EncodingError(format!("{ie_name}: {len} items exceed 255")))?;
    buf.put_u8(count);
    Ok(())
}

fn get_u8(buf: &mut Bytes) -> S1apResult<u8> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_u16(buf: &mut Bytes) -> S1apResult<u16> {
    need(buf, 2)?;
    Ok(buf.get_u16())
}

fn get_u32(buf: &mut Bytes) -> S1apResult<u32> {
    need(buf, 4)?;
    Ok(buf.get_u32())
}

fn get_u64(buf: &mut Bytes) -> S1apResult<u64> {
    need(buf, 8)?;
    Ok(buf.get_u64())
}

fn get_plmn(buf: &mut Bytes) -> S1apResult<PlmnIdentity> {
    need(buf, 3)?;
    let mut plmn = [0u8; 3];
    buf.copy_to_slice(&mut plmn);
    Ok(plmn)
}

fn get_vec(buf: &mut Bytes, len: usize) -> S1apResult<Vec<u8>> {
    need(buf, len)?;
    Ok(buf.split_to(len).to_vec())
}

fn get_string(buf: Bytes, ie_name: &'static str) -> S1apResult<String> {
    String::from_utf8(buf.to_vec()).map_err(|e| S1apError::InvalidIeValue {
        ie_name,
        reason: e.to_string(),
    })
}

fn put_u32_ie(ies: &mut IeList, id: u16, criticality: Criticality, value: u32) -> S1apResult<()> {
    ies.put(id, criticality, |b| {
        b.put_u32(value);
        Ok(())
    })
}

fn put_cause(ies: &mut IeList, criticality: Criticality, cause: &Cause) -> S1apResult<()> {
    ies.put(protocol_ie_id::CAUSE, criticality, |b| {
        b.put_u8(cause.group());
        b.put_u8(cause.value());
        Ok(())
    })
}

fn take_cause(ies: &mut IeSet) -> S1apResult<Cause> {
    let mut v = ies.mandatory(protocol_ie_id::CAUSE, "Cause")?;
    let group = get_u8(&mut v)?;
    let value = get_u8(&mut v)?;
    Cause::from_parts(group, value)
}

fn take_u32(ies: &mut IeSet, id: u16, ie_name: &'static str) -> S1apResult<u32> {
    let mut v = ies.mandatory(id, ie_name)?;
    get_u32(&mut v)
}

fn put_tai(b: &mut BytesMut, tai: &Tai) {
    b.put_slice(&tai.plmn_identity);
    b.put_u16(tai.tac);
}

fn get_tai(buf: &mut Bytes) -> S1apResult<Tai> {
    Ok(Tai { plmn_identity: get_plmn(buf)?, tac: get_u16(buf)? })
}

fn put_cgi(b: &mut BytesMut, cgi: &EutranCgi) {
    b.put_slice(&cgi.plmn_identity);
    b.put_u32(cgi.cell_identity);
}

fn get_cgi(buf: &mut Bytes) -> S1apResult<EutranCgi> {
    Ok(EutranCgi { plmn_identity: get_plmn(buf)?, cell_identity: get_u32(buf)? })
}

fn put_transport_address(b: &mut BytesMut, addr: &[u8]) -> S1apResult<()> {
    put_count(b, addr.len(), "TransportLayerAddress")?;
    b.put_slice(addr);
    Ok(())
}

fn get_transport_address(buf: &mut Bytes) -> S1apResult<Vec<u8>> {
    let len = get_u8(buf)? as usize;
    get_vec(buf, len)
}

// ============================================================================
// S1 Setup
// ============================================================================

fn encode_s1_setup_request(m: &S1SetupRequest, ies: &mut IeList) -> S1apResult<()> {
    ies.put(protocol_ie_id::GLOBAL_ENB_ID, Criticality::Reject, |b| {
        b.put_slice(&m.global_enb_id.plmn_identity);
        b.put_u32(m.global_enb_id.enb_id);
        Ok(())
    })?;
    if let Some(name) = &m.enb_name {
        ies.put(protocol_ie_id::ENB_NAME, Criticality::Ignore, |b| {
            b.put_slice(name.as_bytes());
            Ok(())
        })?;
    }
    ies.put(protocol_ie_id::SUPPORTED_TAS, Criticality::Reject, |b| {
        put_count(b, m.supported_tas.len(), "SupportedTAs")?;
        for ta in &m.supported_tas {
            b.put_u16(ta.tac);
            put_count(b, ta.broadcast_plmns.len(), "BPLMNs")?;
            for plmn in &ta.broadcast_plmns {
                b.put_slice(plmn);
            }
        }
        Ok(())
    })?;
    ies.put(protocol_ie_id::DEFAULT_PAGING_DRX, Criticality::Ignore, |b| {
        b.put_u8(m.default_paging_drx as u8);
        Ok(())
    })
}

fn decode_s1_setup_request(ies: &mut IeSet) -> S1apResult<S1SetupRequest> {
    let mut v = ies.mandatory(protocol_ie_id::GLOBAL_ENB_ID, "Global-ENB-ID")?;
    let global_enb_id = GlobalEnbId { plmn_identity: get_plmn(&mut v)?, enb_id: get_u32(&mut v)? };

    let enb_name = ies
        .optional(protocol_ie_id::ENB_NAME)
        .map(|v| get_string(v, "eNBname"))
        .transpose()?;

    let mut v = ies.mandatory(protocol_ie_id::SUPPORTED_TAS, "SupportedTAs")?;
    let num_tas = get_u8(&mut v)?;
    let mut supported_tas = Vec::with_capacity(num_tas as usize);
    for _ in 0..num_tas {
        let tac = get_u16(&mut v)?;
        let num_plmns = get_u8(&mut v)?;
        let mut broadcast_plmns = Vec::with_capacity(num_plmns as usize);
        for _ in 0..num_plmns {
            broadcast_plmns.push(get_plmn(&mut v)?);
        }
        supported_tas.push(SupportedTaItem { tac, broadcast_plmns });
    }

    let mut v = ies.mandatory(protocol_ie_id::DEFAULT_PAGING_DRX, "DefaultPagingDRX")?;
    let default_paging_drx = PagingDrx::try_from(get_u8(&mut v)?)?;

    Ok(S1SetupRequest { global_enb_id, enb_name, supported_tas, default_paging_drx })
}

fn encode_s1_setup_response(m: &S1SetupResponse, ies: &mut IeList) -> S1apResult<()> {
    if let Some(name) = &m.mme_name {
        ies.put(protocol_ie_id::MME_NAME, Criticality::Ignore, |b| {
            b.put_slice(name.as_bytes());
            Ok(())
        })?;
    }
    ies.put(protocol_ie_id::SERVED_GUMMEIS, Criticality::Reject, |b| {
        put_count(b, m.served_gummeis.len(), "ServedGUMMEIs")?;
        for gummei in &m.served_gummeis {
            put_count(b, gummei.served_plmns.len(), "ServedPLMNs")?;
            for plmn in &gummei.served_plmns {
                b.put_slice(plmn);
            }
            put_count(b, gummei.served_group_ids.len(), "ServedGroupIDs")?;
            for gid in &gummei.served_group_ids {
                b.put_u16(*gid);
            }
            put_count(b, gummei.served_mmec_codes.len(), "ServedMMECs")?;
            b.put_slice(&gummei.served_mmec_codes);
        }
        Ok(())
    })?;
    ies.put(protocol_ie_id::RELATIVE_MME_CAPACITY, Criticality::Ignore, |b| {
        b.put_u8(m.relative_mme_capacity);
        Ok(())
    })
}

fn decode_s1_setup_response(ies: &mut IeSet) -> S1apResult<S1SetupResponse> {
    let mme_name = ies
        .optional(protocol_ie_id::MME_NAME)
        .map(|v| get_string(v, "MMEname"))
        .transpose()?;

    let mut v = ies.mandatory(protocol_ie_id::SERVED_GUMMEIS, "ServedGUMMEIs")?;
    let num_gummeis = get_u8(&mut v)?;
    let mut served_gummeis = Vec::with_capacity(num_gummeis as usize);
    for _ in 0..num_gummeis {
        let num_plmns = get_u8(&mut v)?;
        let mut served_plmns = Vec::with_capacity(num_plmns as usize);
        for _ in 0..num_plmns {
            served_plmns.push(get_plmn(&mut v)?);
        }
        let num_gids = get_u8(&mut v)?;
        let mut served_group_ids = Vec::with_capacity(num_gids as usize);
        for _ in 0..num_gids {
            served_group_ids.push(get_u16(&mut v)?);
        }
        let num_codes = get_u8(&mut v)? as usize;
        let served_mmec_codes = get_vec(&mut v, num_codes)?;
        served_gummeis.push(ServedGummeiItem { served_plmns, served_group_ids, served_mmec_codes });
    }

    let mut v = ies.mandatory(protocol_ie_id::RELATIVE_MME_CAPACITY, "RelativeMMECapacity")?;
    let relative_mme_capacity = get_u8(&mut v)?;

    Ok(S1SetupResponse { mme_name, served_gummeis, relative_mme_capacity })
}

fn encode_s1_setup_failure(m: &S1SetupFailure, ies: &mut IeList) -> S1apResult<()> {
    put_cause(ies, Criticality::Ignore, &m.cause)?;
    if let Some(time_to_wait) = m.time_to_wait {
        ies.put(protocol_ie_id::TIME_TO_WAIT, Criticality::Ignore, |b| {
            b.put_u8(time_to_wait as u8);
            Ok(())
        })?;
    }
    Ok(())
}

fn decode_s1_setup_failure(ies: &mut IeSet) -> S1apResult<S1SetupFailure> {
    let cause = take_cause(ies)?;
    let time_to_wait = match ies.optional(protocol_ie_id::TIME_TO_WAIT) {
        Some(mut v) => Some(TimeToWait::try_from(get_u8(&mut v)?)?),
        None => None,
    };
    Ok(S1SetupFailure { cause, time_to_wait })
}

// ============================================================================
// NAS Transport
// ============================================================================

fn encode_initial_ue_message(m: &InitialUeMessage, ies: &mut IeList) -> S1apResult<()> {
    put_u32_ie(ies, protocol_ie_id::ENB_UE_S1AP_ID, Criticality::Reject, m.enb_ue_s1ap_id)?;
    ies.put(protocol_ie_id::NAS_PDU, Criticality::Reject, |b| {
        b.put_slice(&m.nas_pdu);
        Ok(())
    })?;
    ies.put(protocol_ie_id::TAI, Criticality::Reject, |b| {
        put_tai(b, &m.tai);
        Ok(())
    })?;
    ies.put(protocol_ie_id::EUTRAN_CGI, Criticality::Ignore, |b| {
        put_cgi(b, &m.eutran_cgi);
        Ok(())
    })?;
    ies.put(protocol_ie_id::RRC_ESTABLISHMENT_CAUSE, Criticality::Ignore, |b| {
        b.put_u8(m.rrc_establishment_cause as u8);
        Ok(())
    })?;
    if let Some(s_tmsi) = m.s_tmsi {
        ies.put(protocol_ie_id::S_TMSI, Criticality::Reject, |b| {
            b.put_u8(s_tmsi.mmec);
            b.put_u32(s_tmsi.m_tmsi);
            Ok(())
        })?;
    }
    Ok(())
}

fn decode_initial_ue_message(ies: &mut IeSet) -> S1apResult<InitialUeMessage> {
    let enb_ue_s1ap_id = take_u32(ies, protocol_ie_id::ENB_UE_S1AP_ID, "eNB-UE-S1AP-ID")?;
    let nas_pdu = ies.mandatory(protocol_ie_id::NAS_PDU, "NAS-PDU")?.to_vec();
    let tai = get_tai(&mut ies.mandatory(protocol_ie_id::TAI, "TAI")?)?;
    let eutran_cgi = get_cgi(&mut ies.mandatory(protocol_ie_id::EUTRAN_CGI, "EUTRAN-CGI")?)?;
    let mut v = ies.mandatory(protocol_ie_id::RRC_ESTABLISHMENT_CAUSE, "RRC-Establishment-Cause")?;
    let rrc_establishment_cause = RrcEstablishmentCause::try_from(get_u8(&mut v)?)?;
    let s_tmsi = match ies.optional(protocol_ie_id::S_TMSI) {
        Some(mut v) => Some(STmsi { mmec: get_u8(&mut v)?, m_tmsi: get_u32(&mut v)? }),
        None => None,
    };
    Ok(InitialUeMessage { enb_ue_s1ap_id, nas_pdu, tai, eutran_cgi, rrc_establishment_cause, s_tmsi })
}

fn encode_ul_nas_transport(m: &UlNasTransport, ies: &mut IeList) -> S1apResult<()> {
    put_u32_ie(ies, protocol_ie_id::MME_UE_S1AP_ID, Criticality::Reject, m.mme_ue_s1ap_id)?;
    put_u32_ie(ies, protocol_ie_id::ENB_UE_S1AP_ID, Criticality::Reject, m.enb_ue_s1ap_id)?;
    ies.put(protocol_ie_id::NAS_PDU, Criticality::Reject, |b| {
        b.put_slice(&m.nas_pdu);
        Ok(())
    })?;
    ies.put(protocol_ie_id::EUTRAN_CGI, Criticality::Ignore, |b| {
        put_cgi(b, &m.eutran_cgi);
        Ok(())
    })?;
    ies.put(protocol_ie_id::TAI, Criticality::Ignore, |b| {
        put_tai(b, &m.tai);
        Ok(())
    })
}

fn decode_ul_nas_transport(ies: &mut IeSet) -> S1apResult<UlNasTransport> {
    Ok(UlNasTransport {
        mme_ue_s1ap_id: take_u32(ies, protocol_ie_id::MME_UE_S1AP_ID, "MME-UE-S1AP-ID")?,
        enb_ue_s1ap_id: take_u32(ies, protocol_ie_id::ENB_UE_S1AP_ID, "eNB-UE-S1AP-ID")?,
        nas_pdu: ies.mandatory(protocol_ie_id::NAS_PDU, "NAS-PDU")?.to_vec(),
        eutran_cgi: get_cgi(&mut ies.mandatory(protocol_ie_id::EUTRAN_CGI, "EUTRAN-CGI")?)?,
        tai: get_tai(&mut ies.mandatory(protocol_ie_id::TAI, "TAI")?)?,
    })
}

fn encode_dl_nas_transport(m: &DlNasTransport, ies: &mut IeList) -> S1apResult<()> {
    put_u32_ie(ies, protocol_ie_id::MME_UE_S1AP_ID, Criticality::Reject, m.mme_ue_s1ap_id)?;
    put_u32_ie(ies, protocol_ie_id::ENB_UE_S1AP_ID, Criticality::Reject, m.enb_ue_s1ap_id)?;
    ies.put(protocol_ie_id::NAS_PDU, Criticality::Reject, |b| {
        b.put_slice(&m.nas_pdu);
        Ok(())
    })
}

fn decode_dl_nas_transport(ies: &mut IeSet) -> S1apResult<DlNasTransport> {
    Ok(DlNasTransport {
        mme_ue_s1ap_id: take_u32(ies, protocol_ie_id::MME_UE_S1AP_ID, "MME-UE-S1AP-ID")?,
        enb_ue_s1ap_id: take_u32(ies, protocol_ie_id::ENB_UE_S1AP_ID, "eNB-UE-S1AP-ID")?,
        nas_pdu: ies.mandatory(protocol_ie_id::NAS_PDU, "NAS-PDU")?.to_vec(),
    })
}

// ============================================================================
// Initial Context Setup
// ============================================================================

fn encode_initial_context_setup_request(
    m: &InitialContextSetupRequest,
    ies: &mut IeList,
) -> S1apResult<()> {
    put_u32_ie(ies, protocol_ie_id::MME_UE_S1AP_ID, Criticality::Reject, m.mme_ue_s1ap_id)?;
    put_u32_ie(ies, protocol_ie_id::ENB_UE_S1AP_ID, Criticality::Reject, m.enb_ue_s1ap_id)?;
    ies.put(protocol_ie_id::UE_AGGREGATE_MAXIMUM_BITRATE, Criticality::Reject, |b| {
        b.put_u64(m.ue_ambr.dl);
        b.put_u64(m.ue_ambr.ul);
        Ok(())
    })?;
    ies.put(protocol_ie_id::E_RAB_TO_BE_SETUP_LIST_CTXT_SU_REQ, Criticality::Reject, |b| {
        put_count(b, m.erab_list.len(), "E-RABToBeSetupListCtxtSUReq")?;
        for erab in &m.erab_list {
            b.put_u8(erab.erab_id);
            b.put_u8(erab.erab_qos.qci);
            b.put_u8(erab.erab_qos.arp.priority_level);
            let flags = u8::from(erab.erab_qos.arp.pre_emption_capability)
                | (u8::from(erab.erab_qos.arp.pre_emption_vulnerability) << 1);
            b.put_u8(flags);
            put_transport_address(b, &erab.transport_layer_address)?;
            b.put_u32(erab.gtp_teid);
            match &erab.nas_pdu {
                Some(nas) => {
                    let len = u16::try_from(nas.len()).map_err(|_| {
                        S1apError::EncodingError(format!("E-RAB NAS-PDU too long: {}", nas.len()))
                    })?;
                    b.put_u8(1);
                    b.put_u16(len);
                    b.put_slice(nas);
                }
                None => b.put_u8(0),
            }
        }
        Ok(())
    })?;
    ies.put(protocol_ie_id::UE_SECURITY_CAPABILITIES, Criticality::Reject, |b| {
        b.put_u16(m.ue_security_capabilities.encryption_algorithms);
        b.put_u16(m.ue_security_capabilities.integrity_algorithms);
        Ok(())
    })?;
    ies.put(protocol_ie_id::SECURITY_KEY, Criticality::Reject, |b| {
        b.put_slice(&m.security_key);
        Ok(())
    })
}

fn decode_initial_context_setup_request(ies: &mut IeSet) -> S1apResult<InitialContextSetupRequest> {
    let mme_ue_s1ap_id = take_u32(ies, protocol_ie_id::MME_UE_S1AP_ID, "MME-UE-S1AP-ID")?;
    let enb_ue_s1ap_id = take_u32(ies, protocol_ie_id::ENB_UE_S1AP_ID, "eNB-UE-S1AP-ID")?;

    let mut v = ies.mandatory(protocol_ie_id::UE_AGGREGATE_MAXIMUM_BITRATE, "UEAggregateMaximumBitrate")?;
    let ue_ambr = UeAmbr { dl: get_u64(&mut v)?, ul: get_u64(&mut v)? };

    let mut v = ies.mandatory(
        protocol_ie_id::E_RAB_TO_BE_SETUP_LIST_CTXT_SU_REQ,
        "E-RABToBeSetupListCtxtSUReq",
    )?;
    let num_erabs = get_u8(&mut v)?;
    let mut erab_list = Vec::with_capacity(num_erabs as usize);
    for _ in 0..num_erabs {
        let erab_id = get_u8(&mut v)?;
        let qci = get_u8(&mut v)?;
        let priority_level = get_u8(&mut v)?;
        let flags = get_u8(&mut v)?;
        let transport_layer_address = get_transport_address(&mut v)?;
        let gtp_teid = get_u32(&mut v)?;
        let nas_pdu = match get_u8(&mut v)? {
            0 => None,
            _ => {
                let len = get_u16(&mut v)? as usize;
                Some(get_vec(&mut v, len)?)
            }
        };
        erab_list.push(ErabToBeSetupItem {
            erab_id,
            erab_qos: ErabLevelQosParameters {
                qci,
                arp: AllocationRetentionPriority {
                    priority_level,
                    pre_emption_capability: flags & 0x01 != 0,
                    pre_emption_vulnerability: flags & 0x02 != 0,
                },
            },
            transport_layer_address,
            gtp_teid,
            nas_pdu,
        });
    }

    let mut v = ies.mandatory(protocol_ie_id::UE_SECURITY_CAPABILITIES, "UESecurityCapabilities")?;
    let ue_security_capabilities = UeSecurityCapabilities {
        encryption_algorithms: get_u16(&mut v)?,
        integrity_algorithms: get_u16(&mut v)?,
    };

    let mut v = ies.mandatory(protocol_ie_id::SECURITY_KEY, "SecurityKey")?;
    need(&v, 32)?;
    let mut security_key = [0u8; 32];
    v.copy_to_slice(&mut security_key);

    Ok(InitialContextSetupRequest {
        mme_ue_s1ap_id,
        enb_ue_s1ap_id,
        ue_ambr,
        erab_list,
        ue_security_capabilities,
        security_key,
    })
}

fn encode_initial_context_setup_response(
    m: &InitialContextSetupResponse,
    ies: &mut IeList,
) -> S1apResult<()> {
    put_u32_ie(ies, protocol_ie_id::MME_UE_S1AP_ID, Criticality::Ignore, m.mme_ue_s1ap_id)?;
    put_u32_ie(ies, protocol_ie_id::ENB_UE_S1AP_ID, Criticality::Ignore, m.enb_ue_s1ap_id)?;
    ies.put(protocol_ie_id::E_RAB_SETUP_LIST_CTXT_SU_RES, Criticality::Ignore, |b| {
        put_count(b, m.erab_setup_list.len(), "E-RABSetupListCtxtSURes")?;
        for erab in &m.erab_setup_list {
            b.put_u8(erab.erab_id);
            put_transport_address(b, &erab.transport_layer_address)?;
            b.put_u32(erab.gtp_teid);
        }
        Ok(())
    })
}

fn decode_initial_context_setup_response(ies: &mut IeSet) -> S1apResult<InitialContextSetupResponse> {
    let mme_ue_s1ap_id = take_u32(ies, protocol_ie_id::MME_UE_S1AP_ID, "MME-UE-S1AP-ID")?;
    let enb_ue_s1ap_id = take_u32(ies, protocol_ie_id::ENB_UE_S1AP_ID, "eNB-UE-S1AP-ID")?;

    let mut v = ies.mandatory(protocol_ie_id::E_RAB_SETUP_LIST_CTXT_SU_RES, "E-RABSetupListCtxtSURes")?;
    let num_erabs = get_u8(&mut v)?;
    let mut erab_setup_list = Vec::with_capacity(num_erabs as usize);
    for _ in 0..num_erabs {
        erab_setup_list.push(ErabSetupItem {
            erab_id: get_u8(&mut v)?,
            transport_layer_address: get_transport_address(&mut v)?,
            gtp_teid: get_u32(&mut v)?,
        });
    }

    Ok(InitialContextSetupResponse { mme_ue_s1ap_id, enb_ue_s1ap_id, erab_setup_list })
}

fn encode_initial_context_setup_failure(
    m: &InitialContextSetupFailure,
    ies: &mut IeList,
) -> S1apResult<()> {
    put_u32_ie(ies, protocol_ie_id::MME_UE_S1AP_ID, Criticality::Ignore, m.mme_ue_s1ap_id)?;
    put_u32_ie(ies, protocol_ie_id::ENB_UE_S1AP_ID, Criticality::Ignore, m.enb_ue_s1ap_id)?;
    put_cause(ies, Criticality::Ignore, &m.cause)
}

fn decode_initial_context_setup_failure(ies: &mut IeSet) -> S1apResult<InitialContextSetupFailure> {
    Ok(InitialContextSetupFailure {
        mme_ue_s1ap_id: take_u32(ies, protocol_ie_id::MME_UE_S1AP_ID, "MME-UE-S1AP-ID")?,
        enb_ue_s1ap_id: take_u32(ies, protocol_ie_id::ENB_UE_S1AP_ID, "eNB-UE-S1AP-ID")?,
        cause: take_cause(ies)?,
    })
}

// ============================================================================
// UE Context Release
// ============================================================================

fn encode_ue_context_release_request(m: &UeContextReleaseRequest, ies: &mut IeList) -> S1apResult<()> {
    put_u32_ie(ies, protocol_ie_id::MME_UE_S1AP_ID, Criticality::Reject, m.mme_ue_s1ap_id)?;
    put_u32_ie(ies, protocol_ie_id::ENB_UE_S1AP_ID, Criticality::Reject, m.enb_ue_s1ap_id)?;
    put_cause(ies, Criticality::Ignore, &m.cause)
}

fn decode_ue_context_release_request(ies: &mut IeSet) -> S1apResult<UeContextReleaseRequest> {
    Ok(UeContextReleaseRequest {
        mme_ue_s1ap_id: take_u32(ies, protocol_ie_id::MME_UE_S1AP_ID, "MME-UE-S1AP-ID")?,
        enb_ue_s1ap_id: take_u32(ies, protocol_ie_id::ENB_UE_S1AP_ID, "eNB-UE-S1AP-ID")?,
        cause: take_cause(ies)?,
    })
}

fn encode_ue_context_release_command(m: &UeContextReleaseCommand, ies: &mut IeList) -> S1apResult<()> {
    ies.put(protocol_ie_id::UE_S1AP_IDS, Criticality::Reject, |b| {
        match m.ue_s1ap_ids {
            UeS1apIds::Pair { mme_ue_s1ap_id, enb_ue_s1ap_id } => {
                b.put_u8(0);
                b.put_u32(mme_ue_s1ap_id);
                b.put_u32(enb_ue_s1ap_id);
            }
            UeS1apIds::MmeOnly { mme_ue_s1ap_id } => {
                b.put_u8(1);
                b.put_u32(mme_ue_s1ap_id);
            }
        }
        Ok(())
    })?;
    put_cause(ies, Criticality::Ignore, &m.cause)
}

fn decode_ue_context_release_command(ies: &mut IeSet) -> S1apResult<UeContextReleaseCommand> {
    let mut v = ies.mandatory(protocol_ie_id::UE_S1AP_IDS, "UE-S1AP-IDs")?;
    let ue_s1ap_ids = match get_u8(&mut v)? {
        0 => UeS1apIds::Pair { mme_ue_s1ap_id: get_u32(&mut v)?, enb_ue_s1ap_id: get_u32(&mut v)? },
        1 => UeS1apIds::MmeOnly { mme_ue_s1ap_id: get_u32(&mut v)? },
        other => {
            return Err(S1apError::InvalidIeValue {
                ie_name: "UE-S1AP-IDs",
                reason: format!("unknown choice {other}"),
            })
        }
    };
    Ok(UeContextReleaseCommand { ue_s1ap_ids, cause: take_cause(ies)? })
}

fn encode_ue_context_release_complete(m: &UeContextReleaseComplete, ies: &mut IeList) -> S1apResult<()> {
    put_u32_ie(ies, protocol_ie_id::MME_UE_S1AP_ID, Criticality::Ignore, m.mme_ue_s1ap_id)?;
    put_u32_ie(ies, protocol_ie_id::ENB_UE_S1AP_ID, Criticality::Ignore, m.enb_ue_s1ap_id)
}

fn decode_ue_context_release_complete(ies: &mut IeSet) -> S1apResult<UeContextReleaseComplete> {
    Ok(UeContextReleaseComplete {
        mme_ue_s1ap_id: take_u32(ies, protocol_ie_id::MME_UE_S1AP_ID, "MME-UE-S1AP-ID")?,
        enb_ue_s1ap_id: take_u32(ies, protocol_ie_id::ENB_UE_S1AP_ID, "eNB-UE-S1AP-ID")?,
    })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_request() -> S1SetupRequest {
        S1SetupRequest {
            global_enb_id: GlobalEnbId { plmn_identity: [0x00, 0xf1, 0x10], enb_id: 0x19b },
            enb_name: Some("srsenb01".to_string()),
            supported_tas: vec![SupportedTaItem {
                tac: 7,
                broadcast_plmns: vec![[0x00, 0xf1, 0x10]],
            }],
            default_paging_drx: PagingDrx::V128,
        }
    }

    #[test]
    fn test_s1_setup_request_layout() {
        let pdu = S1apPdu::InitiatingMessage(InitiatingMessage::S1SetupRequest(setup_request()));
        let bytes = pdu.to_bytes().unwrap();

        assert_eq!(bytes[0], pdu_choice::INITIATING_MESSAGE);
        assert_eq!(bytes[1], procedure_code::S1_SETUP);
        assert_eq!(bytes[2], Criticality::Reject as u8);
        // Global-ENB-ID, eNBname, SupportedTAs, DefaultPagingDRX
        assert_eq!(u16::from_be_bytes([bytes[3], bytes[4]]), 4);
        assert_eq!(u16::from_be_bytes([bytes[5], bytes[6]]), protocol_ie_id::GLOBAL_ENB_ID);
        assert_eq!(u16::from_be_bytes([bytes[8], bytes[9]]), 7);

        assert_eq!(S1apPdu::decode(&bytes).unwrap(), pdu);
    }

    #[test]
    fn test_initial_ue_message_with_s_tmsi() {
        let msg = InitialUeMessage {
            enb_ue_s1ap_id: 1,
            nas_pdu: vec![0x07, 0x41, 0x71],
            tai: Tai { plmn_identity: [0x00, 0xf1, 0x10], tac: 7 },
            eutran_cgi: EutranCgi { plmn_identity: [0x00, 0xf1, 0x10], cell_identity: 0x19b01 },
            rrc_establishment_cause: RrcEstablishmentCause::MoSignalling,
            s_tmsi: Some(STmsi { mmec: 0x1a, m_tmsi: 0xf001 }),
        };
        let pdu = S1apPdu::InitiatingMessage(InitiatingMessage::InitialUeMessage(msg));
        let decoded = S1apPdu::decode(&pdu.to_bytes().unwrap()).unwrap();
        match decoded {
            S1apPdu::InitiatingMessage(InitiatingMessage::InitialUeMessage(m)) => {
                assert_eq!(m.s_tmsi.unwrap().m_tmsi, 0xf001);
                assert_eq!(m.nas_pdu, vec![0x07, 0x41, 0x71]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_procedure_decodes_as_other() {
        // Reset (14) with no IEs
        let data = [0x00, procedure_code::RESET, 0x00, 0x00, 0x00];
        let pdu = S1apPdu::decode(&data).unwrap();
        assert_eq!(
            pdu,
            S1apPdu::InitiatingMessage(InitiatingMessage::Other { procedure_code: procedure_code::RESET })
        );
    }

    #[test]
    fn test_unknown_ie_is_skipped() {
        let msg = UeContextReleaseComplete { mme_ue_s1ap_id: 5, enb_ue_s1ap_id: 6 };
        let pdu = S1apPdu::SuccessfulOutcome(SuccessfulOutcome::UeContextReleaseComplete(msg));
        let mut bytes = pdu.to_bytes().unwrap().to_vec();
        // Bump IE count and append an IE with an unassigned id
        bytes[4] += 1;
        bytes.extend_from_slice(&[0x0f, 0xff, 0x01, 0x00, 0x01, 0xaa]);
        assert_eq!(S1apPdu::decode(&bytes).unwrap(), pdu);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            S1apPdu::decode(&[0x00, 0x11]),
            Err(S1apError::BufferTooShort { expected: 5, actual: 2 })
        ));
        assert!(matches!(
            S1apPdu::decode(&[0x60, 0x11, 0x00, 0x00, 0x00]),
            Err(S1apError::InvalidPduChoice(0x60))
        ));
        // One IE announced, none present
        assert!(matches!(
            S1apPdu::decode(&[0x00, 0x11, 0x00, 0x00, 0x01]),
            Err(S1apError::BufferTooShort { .. })
        ));
        // S1 Setup Request without any IE
        assert!(matches!(
            S1apPdu::decode(&[0x00, procedure_code::S1_SETUP, 0x00, 0x00, 0x00]),
            Err(S1apError::MissingMandatoryIe { ie_id: protocol_ie_id::GLOBAL_ENB_ID, .. })
        ));
        assert!(matches!(
            S1apPdu::decode(&[0x00, procedure_code::RESET, 0x00, 0x00, 0x00, 0xff]),
            Err(S1apError::TrailingData(1))
        ));
    }

    #[test]
    fn test_ie_count_bounded_by_payload() {
        assert_eq!(ie_capacity(u16::MAX, 0), 0);
        assert_eq!(ie_capacity(u16::MAX, 2 * IE_HEADER_LEN + 3), 2);
        assert_eq!(ie_capacity(1, 100), 1);

        // 65535 IEs announced in a 5-byte PDU
        assert!(matches!(
            S1apPdu::decode(&[0x00, procedure_code::RESET, 0x00, 0xff, 0xff]),
            Err(S1apError::BufferTooShort { expected: IE_HEADER_LEN, actual: 0 })
        ));
    }

    #[test]
    fn test_ie_length_overrun() {
        // IE claims 16 bytes but only 2 follow
        let data = [0x20, procedure_code::UE_CONTEXT_RELEASE, 0x00, 0x00, 0x01, 0x00, 0x00, 0x01, 0x00, 0x10, 0x01, 0x02];
        assert!(matches!(S1apPdu::decode(&data), Err(S1apError::BufferTooShort { expected: 16, actual: 2 })));
    }

    #[test]
    fn test_release_command_mme_only() {
        let msg = UeContextReleaseCommand {
            ue_s1ap_ids: UeS1apIds::MmeOnly { mme_ue_s1ap_id: 42 },
            cause: Cause::Nas(nas_cause::DETACH),
        };
        let pdu = S1apPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(msg));
        assert_eq!(S1apPdu::decode(&pdu.to_bytes().unwrap()).unwrap(), pdu);
        assert_eq!(pdu.procedure_code(), procedure_code::UE_CONTEXT_RELEASE);
    }

    #[test]
    fn test_initial_context_setup_request_erab_list() {
        let msg = InitialContextSetupRequest {
            mme_ue_s1ap_id: 1,
            enb_ue_s1ap_id: 2,
            ue_ambr: UeAmbr { dl: 1_000_000, ul: 500_000 },
            erab_list: vec![ErabToBeSetupItem {
                erab_id: 5,
                erab_qos: ErabLevelQosParameters {
                    qci: 9,
                    arp: AllocationRetentionPriority {
                        priority_level: 15,
                        pre_emption_capability: false,
                        pre_emption_vulnerability: true,
                    },
                },
                transport_layer_address: vec![127, 0, 1, 100],
                gtp_teid: 0x1234,
                nas_pdu: Some(vec![0x27, 0x01]),
            }],
            ue_security_capabilities: UeSecurityCapabilities {
                encryption_algorithms: 0xe000,
                integrity_algorithms: 0xc000,
            },
            security_key: [0x5a; 32],
        };
        let pdu = S1apPdu::InitiatingMessage(InitiatingMessage::InitialContextSetupRequest(msg));
        assert_eq!(S1apPdu::decode(&pdu.to_bytes().unwrap()).unwrap(), pdu);
    }

    #[test]
    fn test_oversized_list_rejected() {
        let mut req = setup_request();
        req.supported_tas = (0..300)
            .map(|tac| SupportedTaItem { tac, broadcast_plmns: vec![] })
            .collect();
        let pdu = S1apPdu::InitiatingMessage(InitiatingMessage::S1SetupRequest(req));
        assert!(matches!(pdu.to_bytes(), Err(S1apError::EncodingError(_))));
    }
}
