// Expansion and pruning benchmarks on synthetic reply trees
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand::rngs::StdRng;
use threadgraph_core::{
    expand, prune, AtomNode, Graph, Metrics, Participants, Post, ReplyIndex, TextConfig,
};

/// Random reply tree: every post answers one of the earlier posts
fn generate_thread(size: usize, seed: u64) -> Vec<Post> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut posts = vec![Post::new("0").with_text("Root claim of the thread")];

    for i in 1..size {
        // bias towards recent posts so the tree gets some depth
        let lower = i.saturating_sub(20);
        let parent = rng.random_range(lower..i);
        let metrics = Metrics::new(rng.random_range(0..50), rng.random_range(0..5), 0, 0);

        posts.push(
            Post::new(i.to_string())
                .with_text(format!("@user{} reply number {} https://t.co/x{}", parent, i, i))
                .replying_to(parent.to_string())
                .with_metrics(metrics)
                .with_language("en"),
        );
    }

    posts
}

fn build(posts: &[Post], config: &TextConfig) -> Graph {
    let mut graph = Graph::new();
    let root = graph.add_node(AtomNode::new("0", "Root claim of the thread")).unwrap();
    graph.set_major_claim(root).unwrap();

    let index = ReplyIndex::build(posts);
    expand(&mut graph, root, &index, &Participants::new(), config, None).unwrap();
    graph
}

fn benchmark_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand");
    let mut config = TextConfig::default();
    config.interactions.min = 5;

    for size in [100, 1000, 10000].iter() {
        let posts = generate_thread(*size, 42);
        group.bench_with_input(BenchmarkId::new("thread", size), &posts, |b, posts| {
            b.iter(|| black_box(build(posts, &config)));
        });
    }

    group.finish();
}

fn benchmark_prune(c: &mut Criterion) {
    let mut group = c.benchmark_group("prune");
    let config = TextConfig::default();

    for size in [100, 1000, 10000].iter() {
        let graph = build(&generate_thread(*size, 7), &config);
        group.bench_with_input(BenchmarkId::new("min1_max4", size), &graph, |b, graph| {
            b.iter(|| {
                let mut graph = graph.clone();
                black_box(prune(&mut graph, 1, Some(4)).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_expand, benchmark_prune);
criterion_main!(benches);
