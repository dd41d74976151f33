//! Prometheus metrics for the tile service.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use storage::{ReindexReport, ResourceCacheStats};

/// Register metric descriptions with the installed recorder.
pub fn describe() {
    describe_counter!("tile_requests_total", "Tile requests by outcome");
    describe_histogram!(
        "tile_render_duration_seconds",
        "Time from request parse to encoded tile"
    );
    describe_counter!("reindex_runs_total", "Indexing sweeps by result");
    describe_gauge!("reindex_last_updated_files", "Files re-extracted by the last sweep");
    describe_gauge!("reindex_last_failed_files", "Files skipped by the last sweep");
    describe_gauge!("resource_cache_entries", "Open grid handles");
    describe_gauge!("resource_cache_hit_rate_percent", "Grid handle cache hit rate in percent");
}

/// Record one finished tile request.
pub fn record_tile_request(outcome: &'static str, elapsed: Duration) {
    counter!("tile_requests_total", "outcome" => outcome).increment(1);
    histogram!("tile_render_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_reindex(report: &ReindexReport) {
    counter!("reindex_runs_total", "result" => "ok").increment(1);
    gauge!("reindex_last_updated_files").set(report.updated as f64);
    gauge!("reindex_last_failed_files").set(report.failed as f64);
}

pub fn record_reindex_failure() {
    counter!("reindex_runs_total", "result" => "error").increment(1);
}

pub fn record_cache_stats(stats: &ResourceCacheStats) {
    gauge!("resource_cache_entries").set(stats.entries as f64);
    gauge!("resource_cache_hit_rate_percent").set(stats.hit_rate());
    gauge!("resource_cache_hits_total").set(stats.hits as f64);
    gauge!("resource_cache_misses_total").set(stats.misses as f64);
    gauge!("resource_cache_evictions_total").set(stats.evictions as f64);
}
