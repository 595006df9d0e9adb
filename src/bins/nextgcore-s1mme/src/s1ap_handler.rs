//! S1AP Procedure Handlers
//!
//! The dispatcher forwards each decoded message body to one of three
//! procedure collaborators together with the originating association and a
//! reply handle. Handlers mutate the context store and may request a reply.

use bytes::{Bytes, BytesMut};
use ogs_s1ap::{
    misc_cause, Cause, InitialContextSetupResponse, InitialUeMessage, S1SetupRequest, S1apPdu,
    UeContextReleaseComplete, UeContextReleaseRequest, UlNasTransport,
};

use crate::config::MmeConfig;
use crate::context::{
    AssociationId, EmmState, EnbCtx, MmeUeS1apId, PlmnId, S1apContext, SupportedTa, UeEcmCtx,
};
use crate::erab::Fteid;
use crate::error::{MmeError, MmeResult};
use crate::s1ap_build::{self, InitialContextSetupParams};

// ============================================================================
// Reply Buffer
// ============================================================================

/// Reply buffer shared by every dispatch
#[derive(Debug, Default)]
pub struct S1apReply {
    buf: BytesMut,
    requested: bool,
}

impl S1apReply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a PDU into the buffer and request its transmission
    pub fn set(&mut self, pdu: &S1apPdu) -> MmeResult<()> {
        self.buf.clear();
        pdu.encode(&mut self.buf)?;
        self.requested = true;
        log::debug!("Reply {} ({} bytes) prepared", pdu.name(), self.buf.len());
        Ok(())
    }

    /// Whether a handler asked for the reply to be sent
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Encoded reply
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Copy out the encoded reply for transmission
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf)
    }

    /// Drop the reply and clear the request flag
    pub fn release(&mut self) {
        self.buf.clear();
        self.requested = false;
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// eNB management procedures
pub trait EnbManagement {
    fn handle_s1_setup_request(
        &mut self,
        ctx: &mut S1apContext,
        msg: &S1SetupRequest,
        association_id: AssociationId,
        reply: &mut S1apReply,
    ) -> MmeResult<()>;
}

/// NAS transport procedures
pub trait NasTransport {
    fn handle_initial_ue_message(
        &mut self,
        ctx: &mut S1apContext,
        msg: &InitialUeMessage,
        association_id: AssociationId,
        reply: &mut S1apReply,
    ) -> MmeResult<()>;

    fn handle_uplink_nas_transport(
        &mut self,
        ctx: &mut S1apContext,
        msg: &UlNasTransport,
        association_id: AssociationId,
        reply: &mut S1apReply,
    ) -> MmeResult<()>;
}

/// UE context management procedures
pub trait ContextManagement {
    fn handle_ue_context_release_request(
        &mut self,
        ctx: &mut S1apContext,
        msg: &UeContextReleaseRequest,
        association_id: AssociationId,
        reply: &mut S1apReply,
    ) -> MmeResult<()>;

    fn handle_initial_context_setup_response(
        &mut self,
        ctx: &mut S1apContext,
        msg: &InitialContextSetupResponse,
        association_id: AssociationId,
        reply: &mut S1apReply,
    ) -> MmeResult<()>;

    fn handle_ue_context_release_complete(
        &mut self,
        ctx: &mut S1apContext,
        msg: &UeContextReleaseComplete,
        association_id: AssociationId,
        reply: &mut S1apReply,
    ) -> MmeResult<()>;
}

// ============================================================================
// eNB Management
// ============================================================================

/// S1 Setup handling against the served GUMMEI and TAI list
#[derive(Debug, Clone)]
pub struct MngmtProc {
    config: MmeConfig,
}

impl MngmtProc {
    pub fn new(config: MmeConfig) -> Self {
        Self { config }
    }

    fn enb_from_request(msg: &S1SetupRequest) -> EnbCtx {
        EnbCtx {
            enb_id: msg.global_enb_id.enb_id,
            enb_name: msg.enb_name.clone(),
            plmn_id: PlmnId::from_tbcd(&msg.global_enb_id.plmn_identity),
            supported_tas: msg
                .supported_tas
                .iter()
                .map(|ta| SupportedTa {
                    tac: ta.tac,
                    bplmns: ta.broadcast_plmns.iter().map(PlmnId::from_tbcd).collect(),
                })
                .collect(),
            default_paging_drx: msg.default_paging_drx,
            association_id: 0,
        }
    }
}

impl EnbManagement for MngmtProc {
    fn handle_s1_setup_request(
        &mut self,
        ctx: &mut S1apContext,
        msg: &S1SetupRequest,
        association_id: AssociationId,
        reply: &mut S1apReply,
    ) -> MmeResult<()> {
        let enb = Self::enb_from_request(msg);
        log::info!(
            "S1SetupRequest: eNB-ID[{:#x}] name[{}] PLMN[{}] association {}",
            enb.enb_id,
            enb.enb_name.as_deref().unwrap_or(""),
            enb.plmn_id.to_bcd(),
            association_id
        );
        for ta in &enb.supported_tas {
            let bplmns: Vec<String> = ta.bplmns.iter().map(PlmnId::to_bcd).collect();
            log::debug!("    TAC[{}] broadcast PLMN{:?}", ta.tac, bplmns);
        }
        log::debug!("    Paging DRX[{:?}]", enb.default_paging_drx);

        if enb.plmn_id != self.config.served_plmn() {
            log::warn!(
                "S1SetupFailure: eNB PLMN {} not served (MME PLMN {})",
                enb.plmn_id.to_bcd(),
                self.config.served_plmn().to_bcd()
            );
            return reply.set(&s1ap_build::build_setup_failure(
                Cause::Misc(misc_cause::UNKNOWN_PLMN),
                None,
            ));
        }

        if !self.config.tai.is_empty()
            && !enb.supported_tas.iter().any(|ta| self.config.serves_tac(ta.tac))
        {
            log::warn!("S1SetupFailure: no served TAC in eNB-ID[{:#x}]", enb.enb_id);
            return reply.set(&s1ap_build::build_setup_failure(
                Cause::Misc(misc_cause::UNSPECIFIED),
                None,
            ));
        }

        // eNB ID owned by another association: reject before any teardown
        if let Some(owner) = ctx.find_enb(enb.enb_id) {
            if owner.association_id != association_id {
                log::warn!(
                    "S1SetupFailure: eNB-ID[{:#x}] already on association {} (request on {})",
                    enb.enb_id,
                    owner.association_id,
                    association_id
                );
                return reply.set(&s1ap_build::build_setup_failure(
                    Cause::Misc(misc_cause::UNSPECIFIED),
                    None,
                ));
            }
        }

        // A repeated setup on the same association replaces the old eNB
        if ctx.find_enb_by_association(association_id).is_some() {
            let removal = ctx.remove_enb(association_id)?;
            log::info!(
                "Re-setup on association {}: replaced eNB-ID[{:#x}], released {} UE",
                association_id,
                removal.enb.enb_id,
                removal.released_ues.len()
            );
        }

        match ctx.add_enb(enb, association_id) {
            Ok(()) => reply.set(&s1ap_build::build_setup_response(&self.config)),
            Err(e @ MmeError::DuplicateEnb { .. }) => {
                log::warn!("S1SetupFailure: {}", e);
                reply.set(&s1ap_build::build_setup_failure(
                    Cause::Misc(misc_cause::UNSPECIFIED),
                    None,
                ))
            }
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// NAS Transport
// ============================================================================

/// Connection bookkeeping for NAS transport messages
#[derive(Debug, Clone, Default)]
pub struct NasTransportProc;

impl NasTransportProc {
    pub fn new() -> Self {
        Self
    }
}

impl NasTransport for NasTransportProc {
    fn handle_initial_ue_message(
        &mut self,
        ctx: &mut S1apContext,
        msg: &InitialUeMessage,
        association_id: AssociationId,
        _reply: &mut S1apReply,
    ) -> MmeResult<()> {
        let mme_ue_s1ap_id = ctx.allocate_mme_ue_s1ap_id()?;
        let mut ue = UeEcmCtx::new(mme_ue_s1ap_id, msg.enb_ue_s1ap_id, association_id);

        let known = msg
            .s_tmsi
            .and_then(|s_tmsi| ctx.find_imsi_by_m_tmsi(s_tmsi.m_tmsi))
            .and_then(|imsi| ctx.find_ue_emm(imsi).cloned());
        ue.imsi = known.as_ref().map(|emm| emm.imsi);

        ctx.add_ue_ecm(ue)?;
        log::info!(
            "InitialUEMessage: eNB-UE-S1AP-ID[{}] -> MME-UE-S1AP-ID[{}] TAC[{}] NAS {} bytes",
            msg.enb_ue_s1ap_id,
            mme_ue_s1ap_id,
            msg.tai.tac,
            msg.nas_pdu.len()
        );

        if let Some(emm) = known {
            log::debug!(
                "S-TMSI resolved to IMSI[{}], parking EMM context for MME-UE-S1AP-ID[{}]",
                emm.imsi,
                mme_ue_s1ap_id
            );
            ctx.store_pending_ue_emm(mme_ue_s1ap_id, emm);
        }
        Ok(())
    }

    fn handle_uplink_nas_transport(
        &mut self,
        ctx: &mut S1apContext,
        msg: &UlNasTransport,
        association_id: AssociationId,
        _reply: &mut S1apReply,
    ) -> MmeResult<()> {
        let ue = ctx
            .find_ue_ecm(msg.mme_ue_s1ap_id)
            .ok_or(MmeError::UnknownUe(msg.mme_ue_s1ap_id))?;

        if ue.enb_ue_s1ap_id != msg.enb_ue_s1ap_id || ue.association_id != association_id {
            log::warn!(
                "UplinkNASTransport: MME-UE-S1AP-ID[{}] expected eNB-UE-S1AP-ID[{}] on association {}, got [{}] on {}",
                msg.mme_ue_s1ap_id,
                ue.enb_ue_s1ap_id,
                ue.association_id,
                msg.enb_ue_s1ap_id,
                association_id
            );
        }
        log::debug!(
            "UplinkNASTransport: MME-UE-S1AP-ID[{}] NAS {} bytes",
            msg.mme_ue_s1ap_id,
            msg.nas_pdu.len()
        );
        Ok(())
    }
}

// ============================================================================
// Context Management
// ============================================================================

/// UE ECM context addressed by an eNB on one association
///
/// The MME-UE-S1AP-ID must name a UE anchored on that association with the
/// same eNB-UE-S1AP-ID; anything else is treated as an unknown UE.
fn find_ue_on_association<'a>(
    ctx: &'a S1apContext,
    mme_ue_s1ap_id: MmeUeS1apId,
    enb_ue_s1ap_id: u32,
    association_id: AssociationId,
    message: &str,
) -> MmeResult<&'a UeEcmCtx> {
    let ue = ctx
        .find_ue_ecm(mme_ue_s1ap_id)
        .ok_or(MmeError::UnknownUe(mme_ue_s1ap_id))?;
    if ue.association_id != association_id || ue.enb_ue_s1ap_id != enb_ue_s1ap_id {
        log::warn!(
            "{}: MME-UE-S1AP-ID[{}] is eNB-UE-S1AP-ID[{}] on association {}, got [{}] on {}",
            message,
            mme_ue_s1ap_id,
            ue.enb_ue_s1ap_id,
            ue.association_id,
            enb_ue_s1ap_id,
            association_id
        );
        return Err(MmeError::UnknownUe(mme_ue_s1ap_id));
    }
    Ok(ue)
}

/// UE context setup and release
#[derive(Debug, Clone, Default)]
pub struct CtxMngmtProc;

impl CtxMngmtProc {
    pub fn new() -> Self {
        Self
    }
}

impl ContextManagement for CtxMngmtProc {
    fn handle_ue_context_release_request(
        &mut self,
        ctx: &mut S1apContext,
        msg: &UeContextReleaseRequest,
        association_id: AssociationId,
        reply: &mut S1apReply,
    ) -> MmeResult<()> {
        let ue = find_ue_on_association(
            ctx,
            msg.mme_ue_s1ap_id,
            msg.enb_ue_s1ap_id,
            association_id,
            "UEContextReleaseRequest",
        )?;
        log::info!(
            "UEContextReleaseRequest: MME-UE-S1AP-ID[{}] eNB-UE-S1AP-ID[{}] cause {:?}",
            ue.mme_ue_s1ap_id,
            ue.enb_ue_s1ap_id,
            msg.cause
        );

        reply.set(&s1ap_build::build_ue_context_release_command(ue, msg.cause))?;
        ctx.remove_ue_ecm(msg.mme_ue_s1ap_id);
        Ok(())
    }

    fn handle_initial_context_setup_response(
        &mut self,
        ctx: &mut S1apContext,
        msg: &InitialContextSetupResponse,
        association_id: AssociationId,
        _reply: &mut S1apReply,
    ) -> MmeResult<()> {
        let mme_ue_s1ap_id = msg.mme_ue_s1ap_id;
        find_ue_on_association(
            ctx,
            mme_ue_s1ap_id,
            msg.enb_ue_s1ap_id,
            association_id,
            "InitialContextSetupResponse",
        )?;

        for erab in &msg.erab_setup_list {
            let fteid = Fteid::from_transport_address(&erab.transport_layer_address, erab.gtp_teid);
            if fteid.is_none() {
                log::warn!(
                    "E-RAB {}: unsupported transport address length {}",
                    erab.erab_id,
                    erab.transport_layer_address.len()
                );
            }
            if let Err(e) = ctx.activate_erab(mme_ue_s1ap_id, erab.erab_id, fteid) {
                log::warn!(
                    "InitialContextSetupResponse: E-RAB {} of MME-UE-S1AP-ID[{}] skipped: {}",
                    erab.erab_id,
                    mme_ue_s1ap_id,
                    e
                );
            }
        }

        if let Some(mut emm) = ctx.take_pending_ue_emm(mme_ue_s1ap_id) {
            let imsi = emm.imsi;
            emm.state = EmmState::Registered;
            ctx.add_ue_emm(emm);
            if let Some(ue) = ctx.find_ue_ecm_mut(mme_ue_s1ap_id) {
                ue.imsi = Some(imsi);
            }
            log::info!("IMSI[{}] registered on MME-UE-S1AP-ID[{}]", imsi, mme_ue_s1ap_id);
        }
        Ok(())
    }

    fn handle_ue_context_release_complete(
        &mut self,
        ctx: &mut S1apContext,
        msg: &UeContextReleaseComplete,
        association_id: AssociationId,
        _reply: &mut S1apReply,
    ) -> MmeResult<()> {
        if ctx.find_ue_ecm(msg.mme_ue_s1ap_id).is_some() {
            find_ue_on_association(
                ctx,
                msg.mme_ue_s1ap_id,
                msg.enb_ue_s1ap_id,
                association_id,
                "UEContextReleaseComplete",
            )?;
        }
        if ctx.remove_ue_ecm(msg.mme_ue_s1ap_id) {
            log::info!("UEContextReleaseComplete: released MME-UE-S1AP-ID[{}]", msg.mme_ue_s1ap_id);
        } else {
            log::debug!(
                "UEContextReleaseComplete: MME-UE-S1AP-ID[{}] already released",
                msg.mme_ue_s1ap_id
            );
        }
        Ok(())
    }
}

// ============================================================================
// MME-originated Procedures
// ============================================================================

/// Mark the requested E-RABs as SetupRequested and build the request
///
/// Entry point for the bearer-setup collaborator once the UE is
/// authenticated. Nothing is changed when a bearer cannot be requested.
pub fn initial_context_setup(
    ctx: &mut S1apContext,
    mme_ue_s1ap_id: MmeUeS1apId,
    params: &InitialContextSetupParams,
) -> MmeResult<S1apPdu> {
    let ue = ctx
        .find_ue_ecm(mme_ue_s1ap_id)
        .ok_or(MmeError::UnknownUe(mme_ue_s1ap_id))?;

    let mut erabs = ue.erabs.clone();
    for erab in &params.erab_list {
        erabs.request_setup(erab.erab_id)?;
    }
    let pdu = s1ap_build::build_initial_context_setup_request(ue, params);

    if let Some(ue) = ctx.find_ue_ecm_mut(mme_ue_s1ap_id) {
        ue.erabs = erabs;
    }
    log::info!(
        "InitialContextSetupRequest: MME-UE-S1AP-ID[{}] {} E-RAB",
        mme_ue_s1ap_id,
        params.erab_list.len()
    );
    Ok(pdu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erab::ErabState;
    use crate::context::UeEmmCtx;
    use ogs_s1ap::*;

    const PLMN: [u8; 3] = [0x00, 0xf1, 0x10];

    fn setup_request(enb_id: u32, plmn: [u8; 3], tac: u16) -> S1SetupRequest {
        S1SetupRequest {
            global_enb_id: GlobalEnbId { plmn_identity: plmn, enb_id },
            enb_name: Some("enb".to_string()),
            supported_tas: vec![SupportedTaItem { tac, broadcast_plmns: vec![plmn] }],
            default_paging_drx: PagingDrx::V128,
        }
    }

    fn decoded(reply: &S1apReply) -> S1apPdu {
        S1apPdu::decode(reply.as_bytes()).unwrap()
    }

    fn failure_cause(reply: &S1apReply) -> Cause {
        match decoded(reply) {
            S1apPdu::UnsuccessfulOutcome(UnsuccessfulOutcome::S1SetupFailure(f)) => f.cause,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_s1_setup_success() {
        // Debug level so the supported TA lines are formatted
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Debug)
            .try_init();
        let mut ctx = S1apContext::new();
        let mut proc = MngmtProc::new(MmeConfig::default());
        let mut reply = S1apReply::new();

        proc.handle_s1_setup_request(&mut ctx, &setup_request(7, PLMN, 7), 100, &mut reply)
            .unwrap();
        assert!(reply.is_requested());
        assert!(matches!(
            decoded(&reply),
            S1apPdu::SuccessfulOutcome(SuccessfulOutcome::S1SetupResponse(_))
        ));
        assert_eq!(ctx.find_enb(7).unwrap().enb_name.as_deref(), Some("enb"));
    }

    #[test]
    fn test_s1_setup_unknown_plmn() {
        let mut ctx = S1apContext::new();
        let mut proc = MngmtProc::new(MmeConfig::default());
        let mut reply = S1apReply::new();

        proc.handle_s1_setup_request(&mut ctx, &setup_request(7, [0x13, 0x00, 0x14], 7), 100, &mut reply)
            .unwrap();
        assert_eq!(failure_cause(&reply), Cause::Misc(misc_cause::UNKNOWN_PLMN));
        assert_eq!(ctx.enb_count(), 0);
    }

    #[test]
    fn test_s1_setup_unserved_tac() {
        let mut ctx = S1apContext::new();
        let mut proc = MngmtProc::new(MmeConfig::default());
        let mut reply = S1apReply::new();

        proc.handle_s1_setup_request(&mut ctx, &setup_request(7, PLMN, 99), 100, &mut reply)
            .unwrap();
        assert_eq!(failure_cause(&reply), Cause::Misc(misc_cause::UNSPECIFIED));
        assert_eq!(ctx.enb_count(), 0);
    }

    #[test]
    fn test_s1_setup_duplicate_from_other_association() {
        let mut ctx = S1apContext::new();
        let mut proc = MngmtProc::new(MmeConfig::default());
        let mut reply = S1apReply::new();

        proc.handle_s1_setup_request(&mut ctx, &setup_request(7, PLMN, 7), 100, &mut reply)
            .unwrap();
        reply.release();
        proc.handle_s1_setup_request(&mut ctx, &setup_request(7, PLMN, 7), 200, &mut reply)
            .unwrap();
        assert_eq!(failure_cause(&reply), Cause::Misc(misc_cause::UNSPECIFIED));
        assert_eq!(ctx.find_enb(7).unwrap().association_id, 100);
    }

    #[test]
    fn test_s1_setup_repeated_on_same_association() {
        let mut ctx = S1apContext::new();
        let mut proc = MngmtProc::new(MmeConfig::default());
        let mut reply = S1apReply::new();

        proc.handle_s1_setup_request(&mut ctx, &setup_request(7, PLMN, 7), 100, &mut reply)
            .unwrap();
        ctx.add_ue_ecm(UeEcmCtx::new(1, 1, 100)).unwrap();

        reply.release();
        proc.handle_s1_setup_request(&mut ctx, &setup_request(7, PLMN, 7), 100, &mut reply)
            .unwrap();
        assert!(matches!(
            decoded(&reply),
            S1apPdu::SuccessfulOutcome(SuccessfulOutcome::S1SetupResponse(_))
        ));
        assert!(ctx.find_ue_ecm(1).is_none());
        assert_eq!(ctx.enb_count(), 1);
        ctx.verify_indices().unwrap();
    }

    #[test]
    fn test_s1_setup_claiming_foreign_enb_keeps_current() {
        let mut ctx = S1apContext::new();
        let mut proc = MngmtProc::new(MmeConfig::default());
        let mut reply = S1apReply::new();

        proc.handle_s1_setup_request(&mut ctx, &setup_request(7, PLMN, 7), 100, &mut reply)
            .unwrap();
        ctx.add_ue_ecm(UeEcmCtx::new(1, 1, 100)).unwrap();
        reply.release();
        proc.handle_s1_setup_request(&mut ctx, &setup_request(8, PLMN, 7), 200, &mut reply)
            .unwrap();

        // Association 100 re-registers as eNB 8, owned by association 200
        reply.release();
        proc.handle_s1_setup_request(&mut ctx, &setup_request(8, PLMN, 7), 100, &mut reply)
            .unwrap();
        assert_eq!(failure_cause(&reply), Cause::Misc(misc_cause::UNSPECIFIED));

        assert_eq!(ctx.find_enb_by_association(100).map(|enb| enb.enb_id), Some(7));
        assert_eq!(ctx.find_enb(8).map(|enb| enb.association_id), Some(200));
        assert!(ctx.find_ue_ecm(1).is_some());
        assert_eq!(ctx.ue_ecm_ids_in_enb(7), vec![1]);
        ctx.verify_indices().unwrap();
    }

    fn initial_ue(enb_ue_s1ap_id: u32, s_tmsi: Option<STmsi>) -> InitialUeMessage {
        InitialUeMessage {
            enb_ue_s1ap_id,
            nas_pdu: vec![0x07, 0x41],
            tai: Tai { plmn_identity: PLMN, tac: 7 },
            eutran_cgi: EutranCgi { plmn_identity: PLMN, cell_identity: 1 },
            rrc_establishment_cause: RrcEstablishmentCause::MoSignalling,
            s_tmsi,
        }
    }

    fn ctx_with_enb() -> S1apContext {
        let mut ctx = S1apContext::new();
        ctx.add_enb(EnbCtx { enb_id: 7, ..Default::default() }, 100).unwrap();
        ctx
    }

    #[test]
    fn test_initial_ue_message_allocates_id() {
        let mut ctx = ctx_with_enb();
        let mut proc = NasTransportProc::new();
        let mut reply = S1apReply::new();

        proc.handle_initial_ue_message(&mut ctx, &initial_ue(10, None), 100, &mut reply).unwrap();
        proc.handle_initial_ue_message(&mut ctx, &initial_ue(11, None), 100, &mut reply).unwrap();
        assert!(!reply.is_requested());
        assert_eq!(ctx.ue_ecm_ids_in_enb(7), vec![1, 2]);
        assert_eq!(ctx.find_ue_ecm(2).unwrap().enb_ue_s1ap_id, 11);
        assert_eq!(ctx.pending_ue_emm_count(), 0);
    }

    #[test]
    fn test_initial_ue_message_with_known_s_tmsi() {
        let mut ctx = ctx_with_enb();
        let imsi = 1010123456789;
        ctx.add_ue_emm(UeEmmCtx::new(imsi));
        let m_tmsi = ctx.allocate_temporary_id(imsi).unwrap();

        let mut proc = NasTransportProc::new();
        let mut reply = S1apReply::new();
        let s_tmsi = STmsi { mmec: 0x1a, m_tmsi };
        proc.handle_initial_ue_message(&mut ctx, &initial_ue(10, Some(s_tmsi)), 100, &mut reply)
            .unwrap();

        assert_eq!(ctx.find_ue_ecm(1).unwrap().imsi, Some(imsi));
        assert_eq!(ctx.take_pending_ue_emm(1).unwrap().imsi, imsi);
    }

    #[test]
    fn test_initial_ue_message_without_enb() {
        let mut ctx = S1apContext::new();
        let mut proc = NasTransportProc::new();
        let mut reply = S1apReply::new();
        let err = proc
            .handle_initial_ue_message(&mut ctx, &initial_ue(10, None), 100, &mut reply)
            .unwrap_err();
        assert!(matches!(err, MmeError::UnknownEnb(100)));
        assert_eq!(ctx.ue_ecm_count(), 0);
    }

    #[test]
    fn test_uplink_nas_transport_unknown_ue() {
        let mut ctx = ctx_with_enb();
        let mut proc = NasTransportProc::new();
        let mut reply = S1apReply::new();
        let msg = UlNasTransport {
            mme_ue_s1ap_id: 42,
            enb_ue_s1ap_id: 1,
            nas_pdu: vec![0x07],
            eutran_cgi: EutranCgi::default(),
            tai: Tai::default(),
        };
        assert!(matches!(
            proc.handle_uplink_nas_transport(&mut ctx, &msg, 100, &mut reply),
            Err(MmeError::UnknownUe(42))
        ));
    }

    #[test]
    fn test_release_request_replies_and_removes() {
        let mut ctx = ctx_with_enb();
        ctx.add_ue_ecm(UeEcmCtx::new(1, 10, 100)).unwrap();
        let mut proc = CtxMngmtProc::new();
        let mut reply = S1apReply::new();
        let msg = UeContextReleaseRequest {
            mme_ue_s1ap_id: 1,
            enb_ue_s1ap_id: 10,
            cause: Cause::RadioNetwork(radio_network_cause::USER_INACTIVITY),
        };
        proc.handle_ue_context_release_request(&mut ctx, &msg, 100, &mut reply).unwrap();

        assert!(reply.is_requested());
        match decoded(&reply) {
            S1apPdu::InitiatingMessage(InitiatingMessage::UeContextReleaseCommand(cmd)) => {
                assert_eq!(cmd.ue_s1ap_ids, UeS1apIds::Pair { mme_ue_s1ap_id: 1, enb_ue_s1ap_id: 10 });
                assert_eq!(cmd.cause, msg.cause);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(ctx.find_ue_ecm(1).is_none());

        // Release Complete after the removal is harmless
        let complete = UeContextReleaseComplete { mme_ue_s1ap_id: 1, enb_ue_s1ap_id: 10 };
        proc.handle_ue_context_release_complete(&mut ctx, &complete, 100, &mut reply).unwrap();
    }

    #[test]
    fn test_release_request_from_other_association_rejected() {
        let mut ctx = ctx_with_enb();
        ctx.add_enb(EnbCtx { enb_id: 8, ..Default::default() }, 200).unwrap();
        ctx.add_ue_ecm(UeEcmCtx::new(1, 10, 100)).unwrap();
        let mut proc = CtxMngmtProc::new();
        let mut reply = S1apReply::new();

        let msg = UeContextReleaseRequest {
            mme_ue_s1ap_id: 1,
            enb_ue_s1ap_id: 10,
            cause: Cause::RadioNetwork(radio_network_cause::USER_INACTIVITY),
        };
        assert!(matches!(
            proc.handle_ue_context_release_request(&mut ctx, &msg, 200, &mut reply),
            Err(MmeError::UnknownUe(1))
        ));
        assert!(!reply.is_requested());
        assert!(ctx.find_ue_ecm(1).is_some());

        // Right association, wrong eNB-UE-S1AP-ID
        let msg = UeContextReleaseRequest { enb_ue_s1ap_id: 11, ..msg };
        assert!(matches!(
            proc.handle_ue_context_release_request(&mut ctx, &msg, 100, &mut reply),
            Err(MmeError::UnknownUe(1))
        ));
        assert!(!reply.is_requested());
        assert!(ctx.find_ue_ecm(1).is_some());

        // Release Complete from the other association leaves the UE alone
        let complete = UeContextReleaseComplete { mme_ue_s1ap_id: 1, enb_ue_s1ap_id: 10 };
        assert!(proc
            .handle_ue_context_release_complete(&mut ctx, &complete, 200, &mut reply)
            .is_err());
        assert!(ctx.find_ue_ecm(1).is_some());
        ctx.verify_indices().unwrap();
    }

    #[test]
    fn test_initial_context_setup_response_from_other_association_ignored() {
        let mut ctx = ctx_with_enb();
        ctx.add_enb(EnbCtx { enb_id: 8, ..Default::default() }, 200).unwrap();
        ctx.add_ue_ecm(UeEcmCtx::new(1, 10, 100)).unwrap();
        ctx.request_erab_setup(1, 5).unwrap();
        let imsi = 1010123456789;
        ctx.store_pending_ue_emm(1, UeEmmCtx::new(imsi));

        let rsp = InitialContextSetupResponse {
            mme_ue_s1ap_id: 1,
            enb_ue_s1ap_id: 10,
            erab_setup_list: vec![ErabSetupItem {
                erab_id: 5,
                transport_layer_address: vec![127, 0, 1, 1],
                gtp_teid: 7,
            }],
        };
        let mut proc = CtxMngmtProc::new();
        let mut reply = S1apReply::new();
        assert!(matches!(
            proc.handle_initial_context_setup_response(&mut ctx, &rsp, 200, &mut reply),
            Err(MmeError::UnknownUe(1))
        ));

        assert_eq!(ctx.erab_state(1, 5).unwrap(), ErabState::SetupRequested);
        assert_eq!(ctx.pending_ue_emm_count(), 1);
        assert!(ctx.find_ue_emm(imsi).is_none());
    }

    #[test]
    fn test_initial_context_setup_round() {
        let mut ctx = ctx_with_enb();
        ctx.add_ue_ecm(UeEcmCtx::new(1, 10, 100)).unwrap();
        let imsi = 1010123456789;
        let mut emm = UeEmmCtx::new(imsi);
        emm.state = EmmState::AttachPending;
        ctx.store_pending_ue_emm(1, emm);

        let params = InitialContextSetupParams {
            ue_ambr: UeAmbr { dl: 1000, ul: 1000 },
            erab_list: vec![ErabToBeSetupItem {
                erab_id: 5,
                erab_qos: ErabLevelQosParameters {
                    qci: 9,
                    arp: AllocationRetentionPriority {
                        priority_level: 15,
                        pre_emption_capability: false,
                        pre_emption_vulnerability: false,
                    },
                },
                transport_layer_address: vec![127, 0, 0, 2],
                gtp_teid: 1,
                nas_pdu: None,
            }],
            ue_security_capabilities: UeSecurityCapabilities::default(),
            security_key: [0; 32],
        };
        let request = initial_context_setup(&mut ctx, 1, &params).unwrap();
        assert_eq!(request.name(), "InitialContextSetupRequest");
        assert_eq!(ctx.erab_state(1, 5).unwrap(), ErabState::SetupRequested);

        let rsp = InitialContextSetupResponse {
            mme_ue_s1ap_id: 1,
            enb_ue_s1ap_id: 10,
            erab_setup_list: vec![
                ErabSetupItem { erab_id: 5, transport_layer_address: vec![127, 0, 1, 1], gtp_teid: 7 },
                // Never requested: left Inactive
                ErabSetupItem { erab_id: 6, transport_layer_address: vec![127, 0, 1, 1], gtp_teid: 8 },
            ],
        };
        let mut proc = CtxMngmtProc::new();
        let mut reply = S1apReply::new();
        proc.handle_initial_context_setup_response(&mut ctx, &rsp, 100, &mut reply).unwrap();

        assert!(!reply.is_requested());
        assert_eq!(ctx.erab_state(1, 5).unwrap(), ErabState::Active);
        assert_eq!(ctx.erab_state(1, 6).unwrap(), ErabState::Inactive);
        let fteid = ctx.find_ue_ecm(1).unwrap().erabs.get(5).unwrap().enb_fteid.unwrap();
        assert_eq!(fteid.teid, 7);
        assert_eq!(ctx.find_ue_emm(imsi).unwrap().state, EmmState::Registered);
        assert_eq!(ctx.find_ue_ecm(1).unwrap().imsi, Some(imsi));
        assert!(ctx.take_pending_ue_emm(1).is_none());
    }

    #[test]
    fn test_initial_context_setup_invalid_erab_leaves_table() {
        let mut ctx = ctx_with_enb();
        ctx.add_ue_ecm(UeEcmCtx::new(1, 10, 100)).unwrap();
        let item = ErabToBeSetupItem {
            erab_id: 5,
            erab_qos: ErabLevelQosParameters {
                qci: 9,
                arp: AllocationRetentionPriority {
                    priority_level: 1,
                    pre_emption_capability: false,
                    pre_emption_vulnerability: false,
                },
            },
            transport_layer_address: vec![127, 0, 0, 2],
            gtp_teid: 1,
            nas_pdu: None,
        };
        let mut bad = item.clone();
        bad.erab_id = 0;
        let params = InitialContextSetupParams {
            ue_ambr: UeAmbr::default(),
            erab_list: vec![item, bad],
            ue_security_capabilities: UeSecurityCapabilities::default(),
            security_key: [0; 32],
        };
        assert!(matches!(
            initial_context_setup(&mut ctx, 1, &params),
            Err(MmeError::InvalidBearerId(0))
        ));
        assert_eq!(ctx.erab_state(1, 5).unwrap(), ErabState::Inactive);
    }

    #[test]
    fn test_reply_release() {
        let mut reply = S1apReply::new();
        reply.set(&s1ap_build::build_setup_failure(Cause::Misc(0), None)).unwrap();
        assert!(reply.is_requested());
        assert!(!reply.as_bytes().is_empty());
        reply.release();
        assert!(!reply.is_requested());
        assert!(reply.as_bytes().is_empty());
    }
}
