use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use longscribe::chunking::{Segmenter, SegmenterConfig};
use longscribe::pipeline::{ChunkResult, Stitcher};
use longscribe::stt::{ChunkOutput, TimedText};
use std::hint::black_box;

const RATE: u32 = 16000;
const WORDS_PER_SECOND: usize = 3;

/// Chunk results for `seconds` of speech at a steady word rate.
fn synthetic_chunks(seconds: usize, timed: bool) -> Vec<ChunkResult> {
    let segmenter = Segmenter::new(SegmenterConfig::default(), RATE).unwrap();
    let windows = segmenter.plan(seconds * RATE as usize);
    let step = 1.0 / WORDS_PER_SECOND as f64;

    windows
        .into_iter()
        .map(|window| {
            let start_s = window.start_s(RATE);
            let n = (window.duration_s(RATE) * WORDS_PER_SECOND as f64) as usize;
            let first = (start_s * WORDS_PER_SECOND as f64).round() as usize;
            let spans: Vec<TimedText> = (0..n)
                .map(|k| {
                    TimedText::new(
                        k as f64 * step,
                        (k + 1) as f64 * step,
                        format!("token{}", first + k),
                    )
                })
                .collect();
            let output = if timed {
                ChunkOutput::from_timestamps(spans)
            } else {
                ChunkOutput::from_text(
                    spans
                        .into_iter()
                        .map(|s| s.text)
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            };
            ChunkResult::new(window, output)
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let stitcher = Stitcher::new(RATE);

    let mut group = c.benchmark_group("stitch");
    for minutes in [5usize, 60] {
        for timed in [false, true] {
            let chunks = synthetic_chunks(minutes * 60, timed);
            let label = if timed { "timed" } else { "text" };
            group.bench_with_input(
                BenchmarkId::new(label, format!("{}min", minutes)),
                &chunks,
                |b, chunks| {
                    b.iter(|| stitcher.stitch(black_box(chunks), timed, (minutes * 60) as f64))
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
