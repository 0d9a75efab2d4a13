use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use source_sieve::cluster::map_sources_to_clusters;
use source_sieve::config::CopyReplicaPolicy;
use source_sieve::locate::find_mesh_ids;
use source_sieve::mesh::{ClusterLayout, TetMesh};

fn random_centres(n: usize, extent: f64, seed: u64) -> Vec<[f64; 3]> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            [
                rng.gen_range(0.0..extent),
                rng.gen_range(0.0..extent),
                rng.gen_range(0.0..extent),
            ]
        })
        .collect()
}

fn bench_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_mesh_ids");
    for &cubes in &[4usize, 8, 16] {
        let mesh = TetMesh::structured_box([cubes; 3], 1.0).unwrap();
        let centres = random_centres(256, cubes as f64, 42);
        group.bench_with_input(
            BenchmarkId::from_parameter(mesh.num_elements()),
            &(mesh, centres),
            |b, (mesh, centres)| b.iter(|| find_mesh_ids(mesh, centres).unwrap()),
        );
    }
    group.finish();
}

fn bench_cluster_mapping(c: &mut Criterion) {
    let num_elements = 100_000;
    let layout = ClusterLayout::single_cluster(num_elements);
    let mut rng = SmallRng::seed_from_u64(7);
    let mesh_ids: Vec<usize> = (0..50_000).map(|_| rng.gen_range(0..num_elements)).collect();
    c.bench_function("map_sources_to_clusters", |b| {
        b.iter(|| map_sources_to_clusters(&mesh_ids, &layout, CopyReplicaPolicy::FirstReplica).unwrap())
    });
}

criterion_group!(benches, bench_locate, bench_cluster_mapping);
criterion_main!(benches);
