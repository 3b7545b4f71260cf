use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use swarmfs::dht::MemoryDht;
use swarmfs::persistence::{DataStrategyKind, PathStrategyKind, Strategies};
use swarmfs::tree::PathTree;

fn build_tree(depth: usize, fanout: usize) -> (PathTree, String) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let strategies = Strategies::new(
            Arc::new(MemoryDht::new()),
            DataStrategyKind::Direct,
            PathStrategyKind::Direct,
            None,
            None,
        );
        let tree = PathTree::open(strategies).await;

        let mut parent = tree.root();
        let mut deep_path = String::new();
        for level in 0..depth {
            for sibling in 0..fanout {
                tree.create_directory(parent, &format!("sib{sibling}"))
                    .await
                    .unwrap();
            }
            let name = format!("level{level}");
            parent = tree.create_directory(parent, &name).await.unwrap();
            deep_path.push('/');
            deep_path.push_str(&name);
        }
        tree.create_file(parent, "leaf.txt", None).await.unwrap();
        deep_path.push_str("/leaf.txt");
        (tree, deep_path)
    })
}

fn bench_find(c: &mut Criterion) {
    let (tree, deep_path) = build_tree(8, 16);

    c.bench_function("find_deep_path", |b| {
        b.iter(|| tree.find(black_box(&deep_path)));
    });

    c.bench_function("find_missing_path", |b| {
        b.iter(|| tree.find(black_box("/level0/level1/absent")));
    });
}

criterion_group!(benches, bench_find);
criterion_main!(benches);
