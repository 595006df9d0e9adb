//! Property-Based Tests for the S1AP Codec

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use crate::pdu::{InitiatingMessage, S1apPdu, SuccessfulOutcome};
    use crate::types::*;

    // ========================================================================
    // Strategies for generating test data
    // ========================================================================

    fn arb_plmn() -> impl Strategy<Value = PlmnIdentity> {
        any::<[u8; 3]>()
    }

    fn arb_tai() -> impl Strategy<Value = Tai> {
        (arb_plmn(), any::<u16>()).prop_map(|(plmn_identity, tac)| Tai { plmn_identity, tac })
    }

    fn arb_cgi() -> impl Strategy<Value = EutranCgi> {
        (arb_plmn(), 0u32..(1 << 28))
            .prop_map(|(plmn_identity, cell_identity)| EutranCgi { plmn_identity, cell_identity })
    }

    fn arb_ul_nas_transport() -> impl Strategy<Value = UlNasTransport> {
        (
            any::<u32>(),
            any::<u32>(),
            prop::collection::vec(any::<u8>(), 0..512),
            arb_cgi(),
            arb_tai(),
        )
            .prop_map(|(mme_ue_s1ap_id, enb_ue_s1ap_id, nas_pdu, eutran_cgi, tai)| UlNasTransport {
                mme_ue_s1ap_id,
                enb_ue_s1ap_id,
                nas_pdu,
                eutran_cgi,
                tai,
            })
    }

    fn arb_erab_setup_item() -> impl Strategy<Value = ErabSetupItem> {
        (
            0u8..16,
            prop_oneof![
                prop::collection::vec(any::<u8>(), 4..=4),
                prop::collection::vec(any::<u8>(), 16..=16),
            ],
            any::<u32>(),
        )
            .prop_map(|(erab_id, transport_layer_address, gtp_teid)| ErabSetupItem {
                erab_id,
                transport_layer_address,
                gtp_teid,
            })
    }

    // ========================================================================
    // Codec properties
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Decoding arbitrary input returns a value or an error, never panics
        #[test]
        fn prop_decode_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = S1apPdu::decode(&data);
        }

        /// Any truncation of a valid PDU fails to decode
        #[test]
        fn prop_truncated_pdu_rejected(msg in arb_ul_nas_transport(), cut in 1usize..16) {
            let pdu = S1apPdu::InitiatingMessage(InitiatingMessage::UplinkNasTransport(msg));
            let bytes = pdu.to_bytes().unwrap();
            let cut = cut.min(bytes.len());
            prop_assert!(S1apPdu::decode(&bytes[..bytes.len() - cut]).is_err());
        }

        /// Uplink NAS Transport survives encode and decode
        #[test]
        fn prop_ul_nas_transport_preserved(msg in arb_ul_nas_transport()) {
            let pdu = S1apPdu::InitiatingMessage(InitiatingMessage::UplinkNasTransport(msg));
            let bytes = pdu.to_bytes().unwrap();
            prop_assert_eq!(S1apPdu::decode(&bytes).unwrap(), pdu);
        }

        /// Initial Context Setup Response keeps the E-RAB list order
        #[test]
        fn prop_ics_response_erab_order(
            mme_ue_s1ap_id in 1u32..0xffff_ffff,
            enb_ue_s1ap_id in any::<u32>(),
            erab_setup_list in prop::collection::vec(arb_erab_setup_item(), 0..16),
        ) {
            let ids: Vec<u8> = erab_setup_list.iter().map(|e| e.erab_id).collect();
            let pdu = S1apPdu::SuccessfulOutcome(SuccessfulOutcome::InitialContextSetupResponse(
                InitialContextSetupResponse { mme_ue_s1ap_id, enb_ue_s1ap_id, erab_setup_list },
            ));
            match S1apPdu::decode(&pdu.to_bytes().unwrap()).unwrap() {
                S1apPdu::SuccessfulOutcome(SuccessfulOutcome::InitialContextSetupResponse(m)) => {
                    let decoded: Vec<u8> = m.erab_setup_list.iter().map(|e| e.erab_id).collect();
                    prop_assert_eq!(decoded, ids);
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
