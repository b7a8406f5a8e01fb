//! Buffer pool micro-benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use framepool::buffer::replacer::LruKReplacer;
use framepool::{BufferPoolManager, FrameId, MemoryDiskManager};

fn bench_replacer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_k_replacer");

    for &num_frames in &[64usize, 1024] {
        group.bench_with_input(
            BenchmarkId::new("record_access", num_frames),
            &num_frames,
            |b, &n| {
                let replacer = LruKReplacer::new(n, 2);
                let mut i = 0;
                b.iter(|| {
                    replacer.record_access(FrameId::from(i % n));
                    i += 1;
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("evict", num_frames), &num_frames, |b, &n| {
            let replacer = LruKReplacer::new(n, 2);
            for i in 0..n {
                replacer.record_access(FrameId::from(i));
                replacer.set_evictable(FrameId::from(i), true);
            }
            b.iter(|| {
                let victim = replacer.evict().unwrap();
                replacer.record_access(victim);
                replacer.set_evictable(victim, true);
                black_box(victim);
            });
        });
    }

    group.finish();
}

fn bench_buffer_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_pool");

    group.bench_function("fetch_read_hit", |b| {
        let bpm = BufferPoolManager::new(64, 2, MemoryDiskManager::new()).unwrap();
        let page_ids: Vec<_> = (0..32).map(|_| bpm.new_page().unwrap()).collect();
        let mut i = 0;
        b.iter(|| {
            let guard = bpm.fetch_page_read(page_ids[i % page_ids.len()]).unwrap();
            black_box(guard.as_slice()[0]);
            i += 1;
        });
    });

    group.bench_function("fetch_write_miss", |b| {
        // Twice as many pages as frames, visited round-robin: every fetch evicts.
        let bpm = BufferPoolManager::new(16, 2, MemoryDiskManager::new()).unwrap();
        let page_ids: Vec<_> = (0..32).map(|_| bpm.new_page().unwrap()).collect();
        let mut i = 0;
        b.iter(|| {
            let mut guard = bpm.fetch_page_write(page_ids[i % page_ids.len()]).unwrap();
            guard.as_mut_slice()[0] = i as u8;
            i += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_replacer, bench_buffer_pool);
criterion_main!(benches);
