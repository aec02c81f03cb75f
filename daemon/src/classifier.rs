//! Turns a captured frame of a focused game into a raw phase label.
//!
//! The profile itself comes from [`ProfileRegistry::find`](crate::profile::ProfileRegistry::find).

use crate::capture::Frame;
use crate::matcher::any_group_matches;
use crate::phase::Phase;
use crate::profile::GameProfile;

/// First phase (in declared order) with a matching signature group, else [`Phase::Unknown`].
pub fn classify_phase(profile: &GameProfile, frame: &Frame, tolerance: u8) -> Phase {
    profile
        .phases
        .iter()
        .find(|signature| any_group_matches(frame, &signature.groups, tolerance))
        .map(|signature| signature.phase.clone())
        .unwrap_or(Phase::Unknown)
}
