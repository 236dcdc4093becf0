//! Serialization throughput for snapshot blobs

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use storyloom_checkpoint::{JsonSerializer, PendingTask, SerializerProtocol, Snapshot};

fn sample_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::initial(
        json!({
            "job_id": "job-bench",
            "prompt": "a mouse finds cheese",
            "story_text": "Once upon a time ".repeat(64),
            "image_urls": (0..8).map(|i| format!("img://scene-{}", i)).collect::<Vec<_>>(),
            "guardrail_violations": [],
        }),
        (0..8)
            .map(|i| PendingTask::unit("generate_single_image", i, json!({"_index": i})))
            .collect(),
    );
    for i in 0..16 {
        snapshot.completed.insert(format!("node-{}", i));
    }
    snapshot
}

fn bench_serializers(c: &mut Criterion) {
    let snapshot = sample_snapshot();
    let json = JsonSerializer::new();

    c.bench_function("json_dumps", |b| {
        b.iter(|| json.dumps(&snapshot).unwrap());
    });

    let json_bytes = json.dumps(&snapshot).unwrap();
    c.bench_function("json_loads", |b| {
        b.iter(|| json.loads::<Snapshot>(&json_bytes).unwrap());
    });
}

criterion_group!(benches, bench_serializers);
criterion_main!(benches);
