#![allow(dead_code)]
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use source_sieve::{
    algs::communicator::RayonComm,
    mesh::{ClusterLayout, Material, TetMesh},
    source::FsrmCatalog,
};

/// Two-rank Rayon comms (ranks 0 and 1).
pub fn rayons() -> (RayonComm, RayonComm) {
    (RayonComm::new(0, 2), RayonComm::new(1, 2))
}

/// Run `f(comm)` on `size` in-process ranks, one thread each; results in rank order.
pub fn run_ranks<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(RayonComm) -> T + Sync,
{
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..size)
            .map(|rank| {
                let f = &f;
                s.spawn(move || f(RayonComm::new(rank, size)))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}

/// Unit-edge structured box of `n` cubes per axis.
pub fn box_mesh(n: [usize; 3]) -> TetMesh {
    TetMesh::structured_box(n, 1.0).unwrap()
}

/// One homogeneous material per element.
pub fn materials(mesh: &TetMesh) -> Vec<Material> {
    vec![
        Material {
            rho: 2700.0,
            mu: 3.2e10,
            lambda: 3.3e10,
        };
        mesh.num_elements()
    ]
}

/// Single all-interior cluster over the whole mesh.
pub fn flat_layout(mesh: &TetMesh) -> ClusterLayout {
    ClusterLayout::single_cluster(mesh.num_elements())
}

/// Random points strictly inside random elements, with their element.
pub fn interior_points(mesh: &TetMesh, n: usize, seed: u64) -> Vec<([f64; 3], usize)> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let elem = rng.gen_range(0..mesh.num_elements());
            let v = mesh.element_vertices(elem).unwrap();
            // Barycentric weights bounded away from the faces.
            let mut w = [0.0f64; 4];
            for wi in &mut w {
                *wi = rng.gen_range(0.1..1.0);
            }
            let sum: f64 = w.iter().sum();
            let mut x = [0.0; 3];
            for (wi, p) in w.iter().zip(v) {
                for d in 0..3 {
                    x[d] += wi / sum * p[d];
                }
            }
            (x, elem)
        })
        .collect()
}

/// FSRM catalog with identity moment tensor and a triangular time history.
pub fn fsrm_catalog(centres: Vec<[f64; 3]>) -> FsrmCatalog {
    let n = centres.len();
    FsrmCatalog {
        moment_tensor: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        strikes: (0..n).map(|i| 0.1 * i as f64).collect(),
        dips: vec![0.5; n],
        rakes: vec![-0.25; n],
        onsets: (0..n).map(|i| i as f64).collect(),
        areas: vec![2.0; n],
        timestep: 0.5,
        num_samples: 3,
        time_histories: (0..n).flat_map(|_| [0.0, 1.0, 0.0]).collect(),
        centres,
    }
}
