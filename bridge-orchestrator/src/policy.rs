//! Sponsorship Policy
//!
//! Decides per step whether gas sponsorship applies. The decision is total: every
//! input yields a definite answer, with "no sponsor" as the safe default.
//!
//! | source  | destination | Approval / Burn          | Mint                          |
//! |---------|-------------|--------------------------|-------------------------------|
//! | Hub     | non-Hub     | never                    | iff destination capable       |
//! | non-Hub | Hub         | iff source capable       | never                         |
//! | non-Hub | non-Hub     | iff source capable       | iff destination capable       |
//!
//! A same-network Transfer is hosted on the source and follows the same rule: never
//! on the hub, otherwise iff the chain is capable.

use crate::chains::ChainDescriptor;
use crate::classifier::StepKind;

/// Outcome of the policy for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorshipDecision {
    pub sponsor: bool,
    /// Chain hosting the step; the sponsored operation is submitted there
    pub target_chain: ChainDescriptor,
}

/// Chain a step of `kind` executes on: the destination for Mint, the source otherwise.
pub fn hosting_chain<'a>(
    source: &'a ChainDescriptor,
    destination: &'a ChainDescriptor,
    kind: StepKind,
) -> &'a ChainDescriptor {
    match kind {
        StepKind::Mint => destination,
        StepKind::Approval | StepKind::Burn | StepKind::Transfer | StepKind::Unknown => source,
    }
}

/// Stateless sponsorship decision table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SponsorshipPolicy;

impl SponsorshipPolicy {
    pub fn decide(
        &self,
        source: &ChainDescriptor,
        destination: &ChainDescriptor,
        kind: StepKind,
        sponsorship_requested: bool,
    ) -> SponsorshipDecision {
        let target = hosting_chain(source, destination, kind);
        let sponsor = sponsorship_requested
            && kind != StepKind::Unknown
            && !target.is_hub()
            && target.sponsorship_capable;
        SponsorshipDecision {
            sponsor,
            target_chain: target.clone(),
        }
    }
}
