//! Benchmarks for the Catalog Store's fingerprinting and version-grouping helpers (§4.G).
//!
//! Run with: cargo bench --bench dedup_merger

use std::collections::HashMap;

use catalog_core::models::{Episode, IncomingVideo, Video, VideoId};
use catalog_core::service::CatalogStore;
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn sample_incoming(name: &str) -> IncomingVideo {
    IncomingVideo {
        source_name: "demo".to_string(),
        name: name.to_string(),
        year: "2010".to_string(),
        area: "美国".to_string(),
        directors: vec!["马丁·斯科塞斯".to_string()],
        actors: vec!["莱昂纳多·迪卡普里奥".to_string(), "马克·鲁弗洛".to_string()],
        synopsis: "一名联邦警探调查阿什克利夫岛上一座精神病院的失踪案件。".to_string(),
        ..Default::default()
    }
}

fn sample_video(name: &str, episode_count: usize) -> Video {
    let now = Utc::now();
    let episodes: Vec<Episode> = (1..=episode_count)
        .map(|i| Episode { label: format!("第{i}集"), url: format!("https://cdn.example.com/{name}/{i}.m3u8") })
        .collect();
    let mut play_urls = HashMap::new();
    play_urls.insert("m3u8".to_string(), episodes);

    Video {
        id: VideoId::from_fingerprint(name),
        name: name.to_string(),
        year: "2010".to_string(),
        area: "美国".to_string(),
        language: "英语".to_string(),
        actors: vec!["莱昂纳多·迪卡普里奥".to_string()],
        directors: vec!["马丁·斯科塞斯".to_string()],
        synopsis: "一名联邦警探调查阿什克利夫岛上一座精神病院的失踪案件。".to_string(),
        tags: vec!["悬疑".to_string(), "惊悚".to_string()],
        cover_url: "https://cdn.example.com/cover.jpg".to_string(),
        thumb_url: String::new(),
        remarks: String::new(),
        rating: 8.1,
        type_id: 1,
        sub_type_id: None,
        source_names: vec!["demo".to_string()],
        source_priority: 10,
        quality_score: 0,
        is_valid: true,
        play_urls,
        preview_episode_index: None,
        preview_url: None,
        shorts_category: None,
        created_at: now,
        updated_at: now,
    }
}

/// `fingerprint` runs on every ingested video, so it needs to stay cheap even for
/// long director/actor lists.
fn bench_fingerprint(c: &mut Criterion) {
    let incoming = sample_incoming("禁闭岛");
    c.bench_function("fingerprint", |b| {
        b.iter(|| black_box(CatalogStore::fingerprint(black_box(&incoming))));
    });
}

/// `extract_meta` is called once per title during the version-grouping housekeeping
/// pass; benchmark across a range of suffix-token counts.
fn bench_extract_meta(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_meta");
    let titles = [
        ("no_tokens", "禁闭岛"),
        ("one_token", "禁闭岛(国语)"),
        ("many_tokens", "禁闭岛 国语 中字 1080p 蓝光 HD"),
    ];
    for (label, title) in titles {
        group.bench_with_input(BenchmarkId::from_parameter(label), &title, |b, title| {
            b.iter(|| black_box(CatalogStore::extract_meta(black_box(title))));
        });
    }
    group.finish();
}

/// `compute_quality_score` runs once per ingest and once per merge; benchmark across
/// a range of episode-list sizes since it scans play URLs for a playable route.
fn bench_quality_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_quality_score");
    for episode_count in [0usize, 12, 60] {
        let video = sample_video("禁闭岛", episode_count);
        group.bench_with_input(BenchmarkId::from_parameter(episode_count), &video, |b, video| {
            b.iter(|| black_box(video.compute_quality_score()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fingerprint, bench_extract_meta, bench_quality_score);
criterion_main!(benches);
