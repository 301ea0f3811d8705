//! # Endorsement Collection
//!
//! Folds per-endorser responses into one agreed payload.
//!
//! ## Agreement Rule
//!
//! - Responses whose status falls outside `[200, 400)` are ignored.
//! - Every remaining response must carry a byte-identical payload.
//! - Endorsements are de-duplicated by endorser identity, first wins.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::domain::{EndorsedPayload, FabricError, TransactionProposalResponse};

/// Whether a response status counts as a successful endorsement.
pub fn is_successful_status(status: i32) -> bool {
    (200..400).contains(&status)
}

/// Apply the agreement rule to responses in target order.
///
/// Empty slots, from endorsers that failed, are skipped.
pub fn collect_endorsements(
    responses: &[Option<TransactionProposalResponse>],
) -> Result<EndorsedPayload, FabricError> {
    let mut baseline: Option<&[u8]> = None;
    let mut endorsements = Vec::new();
    let mut endorsers_used: HashSet<&[u8]> = HashSet::new();

    for response in responses.iter().flatten() {
        if !is_successful_status(response.response_status()) {
            continue;
        }

        let payload = response.proposal_response.payload.as_slice();
        match baseline {
            None => baseline = Some(payload),
            Some(expected) if expected != payload => {
                return Err(FabricError::EndorsementMismatch {
                    got: STANDARD.encode(payload),
                    baseline: STANDARD.encode(expected),
                });
            }
            Some(_) => {}
        }

        if let Some(endorsement) = response.proposal_response.endorsement.as_ref() {
            if endorsers_used.insert(endorsement.endorser.as_slice()) {
                endorsements.push(endorsement.clone());
            }
        }
    }

    let payload = baseline.ok_or(FabricError::NoProposalResponses)?;
    if payload.is_empty() {
        return Err(FabricError::NoPayload);
    }
    if endorsements.is_empty() {
        return Err(FabricError::NoEndorsements);
    }

    Ok(EndorsedPayload {
        payload: payload.to_vec(),
        endorsements,
    })
}
