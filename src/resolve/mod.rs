//! Cross-rank ownership resolution of located sources.
//!
//! Elements on partition boundaries are replicated, so a source near a
//! boundary can be contained on several ranks. All ranks exchange their
//! containment flags in one all-gather; a rank gives up a source whenever a
//! strictly lower rank also contains it. Afterwards every source is kept by
//! at most one rank, the lowest one that found it.

use crate::algs::communicator::{CommTag, Communicator};
use crate::config::{SourceConfig, UnclaimedPolicy};
use crate::source_error::SourceError;

/// Outcome of [`clean_doubles`] on this rank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Sources this rank released to a lower rank.
    pub cleaned: usize,
    /// Sources contained on no rank at all.
    pub unclaimed: Vec<usize>,
}

/// Release every locally contained source that a lower rank also contains.
///
/// This is a collective: every rank of `comm` must call it with the same
/// number of sources. On a single rank it is the identity and communicates
/// nothing.
pub fn clean_doubles<C>(
    comm: &C,
    contained: &mut [bool],
    config: &SourceConfig,
) -> Result<ResolveReport, SourceError>
where
    C: Communicator + ?Sized,
{
    let num_sources = contained.len();
    let mut report = ResolveReport::default();
    if comm.size() <= 1 {
        report.unclaimed = (0..num_sources).filter(|&s| !contained[s]).collect();
        apply_unclaimed_policy(&report, config, comm.rank())?;
        return Ok(report);
    }

    let local: Vec<u8> = contained.iter().map(|&c| u8::from(c)).collect();
    let global = comm.all_gather(CommTag::new(config.containment_tag), &local)?;
    report.cleaned = resolve_from_gathered(&global, comm.rank(), contained);
    report.unclaimed = unclaimed_sources(&global, num_sources);

    if report.cleaned > 0 {
        log::info!(
            "Cleaned {} double occurring sources on rank {}.",
            report.cleaned,
            comm.rank()
        );
    }
    apply_unclaimed_policy(&report, config, comm.rank())?;
    Ok(report)
}

/// Apply the lowest-rank-wins rule given every rank's flags.
///
/// `global` holds one block of `contained.len()` flags per rank, in rank
/// order. Returns the number of flags cleared on `my_rank`.
pub fn resolve_from_gathered(global: &[u8], my_rank: usize, contained: &mut [bool]) -> usize {
    let n = contained.len();
    let mut cleaned = 0;
    for (source, flag) in contained.iter_mut().enumerate() {
        if !*flag {
            continue;
        }
        if (0..my_rank).any(|rank| global[rank * n + source] != 0) {
            *flag = false;
            cleaned += 1;
        }
    }
    cleaned
}

/// Sources no rank contains, in increasing order.
pub fn unclaimed_sources(global: &[u8], num_sources: usize) -> Vec<usize> {
    if num_sources == 0 {
        return Vec::new();
    }
    let mut claimed = vec![false; num_sources];
    for block in global.chunks_exact(num_sources) {
        for (slot, &flag) in claimed.iter_mut().zip(block) {
            *slot |= flag != 0;
        }
    }
    claimed
        .iter()
        .enumerate()
        .filter_map(|(s, &c)| (!c).then_some(s))
        .collect()
}

fn apply_unclaimed_policy(
    report: &ResolveReport,
    config: &SourceConfig,
    rank: usize,
) -> Result<(), SourceError> {
    let Some(&first) = report.unclaimed.first() else {
        return Ok(());
    };
    let count = report.unclaimed.len();
    match config.unclaimed {
        UnclaimedPolicy::Ignore => {
            log::debug!("{count} point source(s) are outside the domain and were dropped");
            Ok(())
        }
        UnclaimedPolicy::Warn => {
            if rank == 0 {
                log::warn!(
                    "{count} point source(s) are outside the domain and were dropped (first: {first})"
                );
            }
            Ok(())
        }
        UnclaimedPolicy::Error => Err(SourceError::UnclaimedSources { count, first }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn lowest_rank_keeps_shared_source() {
        // 3 ranks, 3 sources; source 1 claimed by ranks 1 and 2, source 2 by 0 and 2.
        let global = [
            1, 0, 1, // rank 0
            0, 1, 0, // rank 1
            0, 1, 1, // rank 2
        ];
        let mut r0 = [true, false, true];
        let mut r1 = [false, true, false];
        let mut r2 = [false, true, true];
        assert_eq!(resolve_from_gathered(&global, 0, &mut r0), 0);
        assert_eq!(resolve_from_gathered(&global, 1, &mut r1), 0);
        assert_eq!(resolve_from_gathered(&global, 2, &mut r2), 2);
        assert_eq!(r0, [true, false, true]);
        assert_eq!(r1, [false, true, false]);
        assert_eq!(r2, [false, false, false]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let global = [1, 1, 1, 1];
        let once = {
            let mut c = [true, true];
            resolve_from_gathered(&global, 1, &mut c);
            c
        };
        let twice = {
            let mut c = [true, true];
            resolve_from_gathered(&global, 1, &mut c);
            c
        };
        assert_eq!(once, twice);
        assert_eq!(once, [false, false]);
    }

    #[test]
    fn unclaimed_are_found_across_ranks() {
        let global = [1, 0, 0, 0, 0, 1];
        assert_eq!(unclaimed_sources(&global, 3), vec![1]);
        assert!(unclaimed_sources(&[], 0).is_empty());
    }

    #[test]
    fn single_rank_is_identity() {
        let mut contained = [true, false, true];
        let report = clean_doubles(&NoComm, &mut contained, &SourceConfig::default()).unwrap();
        assert_eq!(contained, [true, false, true]);
        assert_eq!(report.cleaned, 0);
        assert_eq!(report.unclaimed, vec![1]);
    }

    #[test]
    fn unclaimed_policy_error_fails() {
        let cfg = SourceConfig {
            unclaimed: UnclaimedPolicy::Error,
            ..SourceConfig::default()
        };
        let mut contained = [false, true, false];
        let err = clean_doubles(&NoComm, &mut contained, &cfg).unwrap_err();
        assert_eq!(err, SourceError::UnclaimedSources { count: 2, first: 0 });
    }
}
