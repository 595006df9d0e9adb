//! S1AP Message Types
//!
//! Strongly-typed representations of S1AP procedure messages per 3GPP TS 36.413.

use crate::error::{S1apError, S1apResult};

/// PLMN Identity in TBCD form (3 bytes, MCC/MNC nibble-swapped)
pub type PlmnIdentity = [u8; 3];

// ============================================================================
// Procedure Messages
// ============================================================================

/// S1 Setup Request - sent by eNB to MME
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S1SetupRequest {
    /// Global eNB ID
    pub global_enb_id: GlobalEnbId,
    /// eNB Name (optional)
    pub enb_name: Option<String>,
    /// Supported TAs List
    pub supported_tas: Vec<SupportedTaItem>,
    /// Default Paging DRX
    pub default_paging_drx: PagingDrx,
}

/// S1 Setup Response - sent by MME to eNB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S1SetupResponse {
    /// MME Name (optional)
    pub mme_name: Option<String>,
    /// Served GUMMEIs
    pub served_gummeis: Vec<ServedGummeiItem>,
    /// Relative MME Capacity (0..255)
    pub relative_mme_capacity: u8,
}

/// S1 Setup Failure - sent by MME to eNB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S1SetupFailure {
    /// Cause
    pub cause: Cause,
    /// Time to wait (optional)
    pub time_to_wait: Option<TimeToWait>,
}

/// Initial UE Message - sent by eNB to MME
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialUeMessage {
    /// eNB UE S1AP ID
    pub enb_ue_s1ap_id: u32,
    /// NAS-PDU
    pub nas_pdu: Vec<u8>,
    /// TAI
    pub tai: Tai,
    /// EUTRAN-CGI
    pub eutran_cgi: EutranCgi,
    /// RRC Establishment Cause
    pub rrc_establishment_cause: RrcEstablishmentCause,
    /// S-TMSI (present when the UE identified itself with a temporary identity)
    pub s_tmsi: Option<STmsi>,
}

/// Downlink NAS Transport - sent by MME to eNB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlNasTransport {
    /// MME UE S1AP ID
    pub mme_ue_s1ap_id: u32,
    /// eNB UE S1AP ID
    pub enb_ue_s1ap_id: u32,
    /// NAS-PDU
    pub nas_pdu: Vec<u8>,
}

/// Uplink NAS Transport - sent by eNB to MME
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlNasTransport {
    /// MME UE S1AP ID
    pub mme_ue_s1ap_id: u32,
    /// eNB UE S1AP ID
    pub enb_ue_s1ap_id: u32,
    /// NAS-PDU
    pub nas_pdu: Vec<u8>,
    /// EUTRAN-CGI
    pub eutran_cgi: EutranCgi,
    /// TAI
    pub tai: Tai,
}

/// Initial Context Setup Request - sent by MME to eNB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContextSetupRequest {
    /// MME UE S1AP ID
    pub mme_ue_s1ap_id: u32,
    /// eNB UE S1AP ID
    pub enb_ue_s1ap_id: u32,
    /// UE Aggregate Maximum Bit Rate
    pub ue_ambr: UeAmbr,
    /// E-RAB to be Setup List
    pub erab_list: Vec<ErabToBeSetupItem>,
    /// UE Security Capabilities
    pub ue_security_capabilities: UeSecurityCapabilities,
    /// Security Key (256 bits)
    pub security_key: [u8; 32],
}

/// Initial Context Setup Response - sent by eNB to MME
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContextSetupResponse {
    /// MME UE S1AP ID
    pub mme_ue_s1ap_id: u32,
    /// eNB UE S1AP ID
    pub enb_ue_s1ap_id: u32,
    /// E-RAB Setup List
    pub erab_setup_list: Vec<ErabSetupItem>,
}

/// Initial Context Setup Failure - sent by eNB to MME
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContextSetupFailure {
    /// MME UE S1AP ID
    pub mme_ue_s1ap_id: u32,
    /// eNB UE S1AP ID
    pub enb_ue_s1ap_id: u32,
    /// Cause
    pub cause: Cause,
}

/// UE Context Release Request - sent by eNB to MME
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextReleaseRequest {
    /// MME UE S1AP ID
    pub mme_ue_s1ap_id: u32,
    /// eNB UE S1AP ID
    pub enb_ue_s1ap_id: u32,
    /// Cause
    pub cause: Cause,
}

/// UE Context Release Command - sent by MME to eNB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextReleaseCommand {
    /// UE S1AP IDs
    pub ue_s1ap_ids: UeS1apIds,
    /// Cause
    pub cause: Cause,
}

/// UE Context Release Complete - sent by eNB to MME
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextReleaseComplete {
    /// MME UE S1AP ID
    pub mme_ue_s1ap_id: u32,
    /// eNB UE S1AP ID
    pub enb_ue_s1ap_id: u32,
}

// ============================================================================
// Common Types
// ============================================================================

/// Global eNB ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalEnbId {
    /// PLMN Identity (3 bytes)
    pub plmn_identity: PlmnIdentity,
    /// eNB ID (20 or 28 bits)
    pub enb_id: u32,
}

/// Supported TA Item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedTaItem {
    /// TAC (2 bytes)
    pub tac: u16,
    /// Broadcast PLMNs
    pub broadcast_plmns: Vec<PlmnIdentity>,
}

/// Served GUMMEI Item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedGummeiItem {
    /// Served PLMNs
    pub served_plmns: Vec<PlmnIdentity>,
    /// Served Group IDs
    pub served_group_ids: Vec<u16>,
    /// Served MME Codes
    pub served_mmec_codes: Vec<u8>,
}

/// TAI (Tracking Area Identity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tai {
    /// PLMN Identity
    pub plmn_identity: PlmnIdentity,
    /// TAC
    pub tac: u16,
}

/// EUTRAN-CGI (E-UTRAN Cell Global Identifier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EutranCgi {
    /// PLMN Identity
    pub plmn_identity: PlmnIdentity,
    /// Cell Identity (28 bits)
    pub cell_identity: u32,
}

/// S-TMSI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct STmsi {
    /// MME Code
    pub mmec: u8,
    /// M-TMSI
    pub m_tmsi: u32,
}

/// UE S1AP IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeS1apIds {
    /// MME and eNB UE S1AP IDs
    Pair { mme_ue_s1ap_id: u32, enb_ue_s1ap_id: u32 },
    /// MME UE S1AP ID only
    MmeOnly { mme_ue_s1ap_id: u32 },
}

impl UeS1apIds {
    /// MME UE S1AP ID carried in either form
    pub fn mme_ue_s1ap_id(&self) -> u32 {
        match *self {
            UeS1apIds::Pair { mme_ue_s1ap_id, .. } => mme_ue_s1ap_id,
            UeS1apIds::MmeOnly { mme_ue_s1ap_id } => mme_ue_s1ap_id,
        }
    }
}

/// UE Aggregate Maximum Bit Rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UeAmbr {
    /// Downlink (bits/s)
    pub dl: u64,
    /// Uplink (bits/s)
    pub ul: u64,
}

/// UE Security Capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UeSecurityCapabilities {
    /// Encryption algorithms (16 bits)
    pub encryption_algorithms: u16,
    /// Integrity algorithms (16 bits)
    pub integrity_algorithms: u16,
}

/// E-RAB To Be Setup Item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErabToBeSetupItem {
    /// E-RAB ID (0..15)
    pub erab_id: u8,
    /// E-RAB Level QoS Parameters
    pub erab_qos: ErabLevelQosParameters,
    /// Transport Layer Address (IPv4 or IPv6)
    pub transport_layer_address: Vec<u8>,
    /// GTP-TEID
    pub gtp_teid: u32,
    /// NAS-PDU (optional)
    pub nas_pdu: Option<Vec<u8>>,
}

/// E-RAB Setup Item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErabSetupItem {
    /// E-RAB ID
    pub erab_id: u8,
    /// Transport Layer Address
    pub transport_layer_address: Vec<u8>,
    /// GTP-TEID
    pub gtp_teid: u32,
}

/// E-RAB Level QoS Parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErabLevelQosParameters {
    /// QCI (QoS Class Identifier) 1..9
    pub qci: u8,
    /// Allocation and Retention Priority
    pub arp: AllocationRetentionPriority,
}

/// Allocation and Retention Priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRetentionPriority {
    /// Priority Level (1..15)
    pub priority_level: u8,
    /// Pre-emption Capability
    pub pre_emption_capability: bool,
    /// Pre-emption Vulnerability
    pub pre_emption_vulnerability: bool,
}

// ============================================================================
// Enumerated IEs
// ============================================================================

/// Paging DRX
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PagingDrx {
    V32 = 0,
    V64 = 1,
    #[default]
    V128 = 2,
    V256 = 3,
}

impl TryFrom<u8> for PagingDrx {
    type Error = S1apError;

    fn try_from(value: u8) -> S1apResult<Self> {
        match value {
            0 => Ok(PagingDrx::V32),
            1 => Ok(PagingDrx::V64),
            2 => Ok(PagingDrx::V128),
            3 => Ok(PagingDrx::V256),
            _ => Err(S1apError::InvalidIeValue {
                ie_name: "DefaultPagingDRX",
                reason: format!("out of range: {value}"),
            }),
        }
    }
}

/// Time to Wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimeToWait {
    V1s = 0,
    V2s = 1,
    V5s = 2,
    V10s = 3,
    V20s = 4,
    V60s = 5,
}

impl TryFrom<u8> for TimeToWait {
    type Error = S1apError;

    fn try_from(value: u8) -> S1apResult<Self> {
        match value {
            0 => Ok(TimeToWait::V1s),
            1 => Ok(TimeToWait::V2s),
            2 => Ok(TimeToWait::V5s),
            3 => Ok(TimeToWait::V10s),
            4 => Ok(TimeToWait::V20s),
            5 => Ok(TimeToWait::V60s),
            _ => Err(S1apError::InvalidIeValue {
                ie_name: "TimeToWait",
                reason: format!("out of range: {value}"),
            }),
        }
    }
}

/// RRC Establishment Cause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RrcEstablishmentCause {
    Emergency = 0,
    HighPriorityAccess = 1,
    MtAccess = 2,
    MoSignalling = 3,
    MoData = 4,
}

impl TryFrom<u8> for RrcEstablishmentCause {
    type Error = S1apError;

    fn try_from(value: u8) -> S1apResult<Self> {
        match value {
            0 => Ok(RrcEstablishmentCause::Emergency),
            1 => Ok(RrcEstablishmentCause::HighPriorityAccess),
            2 => Ok(RrcEstablishmentCause::MtAccess),
            3 => Ok(RrcEstablishmentCause::MoSignalling),
            4 => Ok(RrcEstablishmentCause::MoData),
            _ => Err(S1apError::InvalidIeValue {
                ie_name: "RRC-Establishment-Cause",
                reason: format!("out of range: {value}"),
            }),
        }
    }
}

// ============================================================================
// Cause
// ============================================================================

/// S1AP Cause (group + value)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    RadioNetwork(u8),
    Transport(u8),
    Nas(u8),
    Protocol(u8),
    Misc(u8),
}

impl Cause {
    /// Cause group index as carried on the wire
    pub fn group(&self) -> u8 {
        match self {
            Cause::RadioNetwork(_) => 0,
            Cause::Transport(_) => 1,
            Cause::Nas(_) => 2,
            Cause::Protocol(_) => 3,
            Cause::Misc(_) => 4,
        }
    }

    /// Cause value within its group
    pub fn value(&self) -> u8 {
        match *self {
            Cause::RadioNetwork(v)
            | Cause::Transport(v)
            | Cause::Nas(v)
            | Cause::Protocol(v)
            | Cause::Misc(v) => v,
        }
    }

    /// Rebuild a cause from its wire group and value
    pub fn from_parts(group: u8, value: u8) -> S1apResult<Self> {
        match group {
            0 => Ok(Cause::RadioNetwork(value)),
            1 => Ok(Cause::Transport(value)),
            2 => Ok(Cause::Nas(value)),
            3 => Ok(Cause::Protocol(value)),
            4 => Ok(Cause::Misc(value)),
            _ => Err(S1apError::InvalidIeValue {
                ie_name: "Cause",
                reason: format!("unknown cause group {group}"),
            }),
        }
    }
}

/// Radio Network cause values
pub mod radio_network_cause {
    pub const UNSPECIFIED: u8 = 0;
    pub const RELEASE_DUE_TO_EUTRAN_GENERATED_REASON: u8 = 3;
    pub const UNKNOWN_MME_UE_S1AP_ID: u8 = 13;
    pub const UNKNOWN_ENB_UE_S1AP_ID: u8 = 14;
    pub const UNKNOWN_PAIR_UE_S1AP_ID: u8 = 15;
    pub const USER_INACTIVITY: u8 = 20;
    pub const RADIO_CONNECTION_WITH_UE_LOST: u8 = 21;
}

/// NAS cause values
pub mod nas_cause {
    pub const NORMAL_RELEASE: u8 = 0;
    pub const AUTHENTICATION_FAILURE: u8 = 1;
    pub const DETACH: u8 = 2;
    pub const UNSPECIFIED: u8 = 3;
}

/// Miscellaneous cause values
pub mod misc_cause {
    pub const CONTROL_PROCESSING_OVERLOAD: u8 = 0;
    pub const NOT_ENOUGH_USER_PLANE_PROCESSING_RESOURCES: u8 = 1;
    pub const HARDWARE_FAILURE: u8 = 2;
    pub const OM_INTERVENTION: u8 = 3;
    pub const UNSPECIFIED: u8 = 4;
    pub const UNKNOWN_PLMN: u8 = 5;
}
