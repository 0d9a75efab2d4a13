mod util;
use util::*;

use serial_test::serial;
use source_sieve::algs::communicator::Communicator;
use source_sieve::config::{SourceConfig, UnclaimedPolicy};
use source_sieve::locate::find_mesh_ids;
use source_sieve::mesh::TetMesh;
use source_sieve::resolve::clean_doubles;
use source_sieve::SourceError;

/// Rank `r` of `size` holds cubes `r..r + 2` of a `size + 1` x 1 x 1 row, so
/// neighbouring ranks share one cube (six tetrahedra).
fn overlapping_partition(rank: usize) -> TetMesh {
    let local = box_mesh([2, 1, 1]);
    let shifted = local
        .vertices()
        .iter()
        .map(|v| [v[0] + rank as f64, v[1], v[2]])
        .collect();
    TetMesh::new(shifted, local.elements().to_vec()).unwrap()
}

fn sources() -> Vec<[f64; 3]> {
    vec![
        [0.5, 0.3, 0.6],  // rank 0 only
        [1.5, 0.3, 0.6],  // ranks 0 and 1
        [2.5, 0.6, 0.3],  // ranks 1 and 2
        [3.5, 0.2, 0.7],  // rank 2 only
        [1.0, 0.25, 0.5], // face between cubes, ranks 0 and 1
        [9.0, 0.5, 0.5],  // nowhere
    ]
}

#[test]
#[serial]
fn lowest_rank_keeps_each_source() {
    let results = run_ranks(3, |comm| {
        let mesh = overlapping_partition(comm.rank());
        let mut c = find_mesh_ids(&mesh, &sources()).unwrap();
        let before = c.contained.clone();
        let report = clean_doubles(&comm, &mut c.contained, &SourceConfig::default()).unwrap();
        (before, c.contained, report)
    });

    let owners: Vec<Vec<usize>> = (0..sources().len())
        .map(|s| (0..3).filter(|&r| results[r].1[s]).collect())
        .collect();
    assert_eq!(owners, vec![vec![0], vec![0], vec![1], vec![2], vec![0], vec![]]);

    for (rank, (before, after, report)) in results.iter().enumerate() {
        let dropped = before.iter().zip(after).filter(|(b, a)| **b && !**a).count();
        assert_eq!(report.cleaned, dropped, "rank {rank}");
        assert_eq!(report.unclaimed, vec![5]);
    }
    assert_eq!(results[0].2.cleaned, 0);
    assert_eq!(results[1].2.cleaned, 2);
    assert_eq!(results[2].2.cleaned, 1);
}

#[test]
#[serial]
fn resolution_is_repeatable() {
    let run = || {
        run_ranks(2, |comm| {
            let mesh = overlapping_partition(comm.rank());
            let mut c = find_mesh_ids(&mesh, &sources()).unwrap();
            clean_doubles(&comm, &mut c.contained, &SourceConfig::default()).unwrap();
            c.contained
        })
    };
    assert_eq!(run(), run());
}

#[test]
#[serial]
fn unclaimed_policy_error_fails_on_every_rank() {
    let config = SourceConfig {
        unclaimed: UnclaimedPolicy::Error,
        ..SourceConfig::default()
    };
    let results = run_ranks(2, |comm| {
        let mesh = overlapping_partition(comm.rank());
        let mut c = find_mesh_ids(&mesh, &sources()).unwrap();
        clean_doubles(&comm, &mut c.contained, &config)
    });
    for r in results {
        assert_eq!(r.unwrap_err(), SourceError::UnclaimedSources { count: 2, first: 3 });
    }
}
