/// Benchmark CLI binary for the pre-ranking pipeline.
///
/// Drives full sessions over a deterministic synthetic world: generate
/// candidates → ingest → update per cycle, then report per-cycle latency.
/// CI integration via --max-mean-ms (exit code threshold) and a JSON report
/// written to --output for cross-run comparison.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use georank::candidate::{Candidate, FeatureId, ShardId, TokenMatch, TokenRange};
use georank::config::Config;
use georank::editor::NoEdits;
use georank::estimator::DistanceEstimator;
use georank::geo::{Point, Rect};
use georank::logging;
use georank::prerank::{Params, PreRanker};
use georank::ranker::Ranker;
use georank::source::{CenterTable, DataSource, RankTable, RankTableKind, ShardReader};

#[derive(Parser)]
#[command(name = "georank-benchmark", about = "Synthetic workload benchmark for georank")]
struct Cli {
    /// Candidates generated per update cycle
    #[arg(long, default_value_t = 2000)]
    candidates: usize,

    /// Update cycles per session
    #[arg(long, default_value_t = 8)]
    cycles: usize,

    /// Number of synthetic map shards
    #[arg(long, default_value_t = 8)]
    shards: u32,

    /// RNG seed for the synthetic world (can also be set via GEORANK_BENCH_SEED)
    #[arg(long, env = "GEORANK_BENCH_SEED", default_value_t = 42)]
    seed: u64,

    /// Run a viewport-scoped session (containment filter + nearby sweep)
    #[arg(long)]
    viewport: bool,

    /// Run a categorical session (single specialized selection order)
    #[arg(long)]
    categorical: bool,

    /// Override the per-cycle batch cap from config
    #[arg(long)]
    batch_size: Option<usize>,

    /// Path for the JSON report
    #[arg(long)]
    output: Option<PathBuf>,

    /// Maximum mean cycle latency to pass (CI threshold, in milliseconds)
    #[arg(long)]
    max_mean_ms: Option<u64>,
}

/// Low-bias 32-bit mixer; the only randomness source of the synthetic world.
fn mix(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15).wrapping_add(1))
    }

    fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }
}

struct SyntheticRanks {
    salt: u32,
}

impl RankTable for SyntheticRanks {
    fn get(&self, index: u32) -> u8 {
        (mix(index ^ self.salt) % 256) as u8
    }
}

struct SyntheticCenters {
    area: Rect,
    salt: u32,
}

impl CenterTable for SyntheticCenters {
    fn get(&mut self, index: u32) -> Option<Point> {
        // Roughly 2% of features have no stored center, exercising the
        // estimator fallback.
        if mix(index ^ self.salt ^ 0x00c0_ffee) % 50 == 0 {
            return None;
        }
        let fx = f64::from(mix(index ^ self.salt)) / f64::from(u32::MAX);
        let fy = f64::from(mix(index ^ self.salt ^ 0x5eed_0000)) / f64::from(u32::MAX);
        Some(Point::new(
            self.area.min.x + fx * (self.area.max.x - self.area.min.x),
            self.area.min.y + fy * (self.area.max.y - self.area.min.y),
        ))
    }
}

struct SyntheticShard {
    area: Rect,
    salt: u32,
}

impl ShardReader for SyntheticShard {
    fn rank_table(&self, kind: RankTableKind) -> Option<Box<dyn RankTable>> {
        let salt = match kind {
            RankTableKind::SearchRank => self.salt,
            RankTableKind::Popularity => self.salt ^ 0x0bad_5eed,
        };
        Some(Box::new(SyntheticRanks { salt }))
    }

    fn center_table(&self) -> Option<Box<dyn CenterTable>> {
        Some(Box::new(SyntheticCenters {
            area: self.area,
            salt: self.salt,
        }))
    }
}

struct SyntheticSource {
    world: Rect,
    shard_count: u32,
}

impl SyntheticSource {
    /// Each shard owns one vertical strip of the world.
    fn shard_area(&self, shard: u32) -> Rect {
        let width = (self.world.max.x - self.world.min.x) / f64::from(self.shard_count.max(1));
        let min_x = self.world.min.x + width * f64::from(shard);
        Rect::new(
            Point::new(min_x, self.world.min.y),
            Point::new(min_x + width, self.world.max.y),
        )
    }
}

impl DataSource for SyntheticSource {
    fn shard(&self, id: ShardId) -> Option<Arc<dyn ShardReader>> {
        if id.0 >= self.shard_count {
            return None;
        }
        Some(Arc::new(SyntheticShard {
            area: self.shard_area(id.0),
            salt: id.0.wrapping_mul(0x9e37_79b1),
        }))
    }
}

/// Hash-derived stand-in distances for features without a stored center.
struct RoughEstimator;

impl DistanceEstimator for RoughEstimator {
    fn set_reference(&mut self, _pivot: Point, _scale: i32) {}

    fn distance_to(&mut self, id: FeatureId) -> f64 {
        let h = mix(id.index ^ id.shard.0.rotate_left(16));
        f64::from(h) / f64::from(u32::MAX) * 50_000.0
    }

    fn clear(&mut self) {}
}

/// Counts candidates delivered downstream, to cross-check the session total.
struct SinkRanker {
    received: Arc<AtomicUsize>,
}

impl Ranker for SinkRanker {
    fn add_batch(&mut self, batch: Vec<Candidate>) {
        self.received.fetch_add(batch.len(), Ordering::Relaxed);
    }

    fn notify_update_boundary(&mut self, last_update: bool) {
        tracing::trace!(last_update, "Cycle boundary");
    }

    fn on_session_finished(&mut self, cancelled: bool) {
        tracing::debug!(cancelled, "Ranker saw session end");
    }
}

const NUM_QUERY_TOKENS: usize = 3;

fn generate_batch(rng: &mut Lcg, count: usize, shard_count: u32) -> Vec<Candidate> {
    (0..count)
        .map(|_| {
            let shard = ShardId(rng.next_u32() % shard_count.max(1));
            let index = rng.next_u32() % 100_000;
            let matched = 1 + rng.next_u32() as usize % NUM_QUERY_TOKENS;
            let innermost = 1 + rng.next_u32() as usize % matched;
            let tokens = TokenMatch {
                innermost: TokenRange::new(0, innermost),
                matched_count: matched,
                all_tokens_matched: matched == NUM_QUERY_TOKENS,
            };
            let exact = rng.next_u32() % 10 == 0;
            let relaxed = rng.next_u32() % 8 == 0;
            Candidate::new(FeatureId::new(shard, index), tokens, exact, relaxed)
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct BenchmarkReport {
    candidates_per_cycle: usize,
    cycles: usize,
    shards: u32,
    seed: u64,
    viewport_search: bool,
    categorical_request: bool,
    batch_size: usize,
    total_ingested: usize,
    total_sent: usize,
    ranker_received: usize,
    mean_cycle_ms: u64,
    p95_cycle_ms: u64,
}

fn latency_stats(latencies: &mut Vec<u64>) -> (u64, u64) {
    if latencies.is_empty() {
        return (0, 0);
    }
    let mean = latencies.iter().sum::<u64>() / latencies.len() as u64;
    latencies.sort_unstable();
    let idx = ((0.95 * latencies.len() as f64).ceil() as usize).saturating_sub(1);
    let p95 = latencies[idx.min(latencies.len() - 1)];
    (mean, p95)
}

fn main() -> Result<(), anyhow::Error> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load config and initialize logging (stderr only; stdout carries the report)
    let config = Config::load()?;
    logging::init_logging(&config);

    // 3. Build the synthetic world. The world is wider than the viewport so
    // viewport sessions actually drop off-screen candidates.
    let viewport = Rect::new(
        Point::from_lat_lon(52.48, 13.33),
        Point::from_lat_lon(52.56, 13.47),
    );
    let world = Rect::new(
        Point::from_lat_lon(52.45, 13.28),
        Point::from_lat_lon(52.59, 13.52),
    );
    let source = Arc::new(SyntheticSource {
        world,
        shard_count: cli.shards,
    });
    let received = Arc::new(AtomicUsize::new(0));

    let batch_size = cli.batch_size.unwrap_or(config.pipeline.batch_size);
    let eps = Point::new(
        (viewport.max.x - viewport.min.x) / 60.0,
        (viewport.max.y - viewport.min.y) / 60.0,
    );
    let params = Params {
        viewport,
        position: Some(viewport.center()),
        pivot: viewport.center(),
        num_query_tokens: NUM_QUERY_TOKENS,
        batch_size,
        limit: usize::MAX, // the session cap must not bind in a throughput run
        min_distance_between_results: eps,
        categorical_request: cli.categorical,
        viewport_search: cli.viewport,
        ..Params::default()
    };

    // 4. Assemble the pipeline
    let mut preranker = PreRanker::new(
        source,
        Arc::new(NoEdits),
        Box::new(RoughEstimator),
        Box::new(SinkRanker {
            received: Arc::clone(&received),
        }),
    );
    preranker.init(params);

    println!("=== georank benchmark ===");
    println!("Cycles:            {}", cli.cycles);
    println!("Candidates/cycle:  {}", cli.candidates);
    println!("Shards:            {}", cli.shards);
    println!("Batch size:        {}", batch_size);
    println!("Viewport search:   {}", cli.viewport);
    println!("Categorical:       {}", cli.categorical);
    println!("Seed:              {}", cli.seed);
    println!();

    // 5. Run the session, one timed ingest+update per cycle
    let mut rng = Lcg::new(cli.seed);
    let mut latencies: Vec<u64> = Vec::with_capacity(cli.cycles);
    let mut total_ingested = 0usize;

    let pb = ProgressBar::new(cli.cycles as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{pos}/{len}] {msg} [{elapsed_precise} / {eta_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for cycle in 0..cli.cycles {
        let batch = generate_batch(&mut rng, cli.candidates, cli.shards);
        total_ingested += batch.len();
        pb.set_message(format!("cycle {}", cycle + 1));

        let start = Instant::now();
        preranker.ingest(batch)?;
        preranker.update(cycle + 1 == cli.cycles)?;
        latencies.push(start.elapsed().as_millis() as u64);

        pb.inc(1);
    }
    pb.finish_with_message("done");
    preranker.finish(false)?;

    // 6. Aggregate and report
    let (mean_cycle_ms, p95_cycle_ms) = latency_stats(&mut latencies);
    let report = BenchmarkReport {
        candidates_per_cycle: cli.candidates,
        cycles: cli.cycles,
        shards: cli.shards,
        seed: cli.seed,
        viewport_search: cli.viewport,
        categorical_request: cli.categorical,
        batch_size,
        total_ingested,
        total_sent: preranker.num_sent_results(),
        ranker_received: received.load(Ordering::Relaxed),
        mean_cycle_ms,
        p95_cycle_ms,
    };

    println!();
    println!("Ingested:  {}", report.total_ingested);
    println!("Sent:      {}", report.total_sent);
    println!("Received:  {}", report.ranker_received);
    println!("Latency: mean={}ms, p95={}ms", report.mean_cycle_ms, report.p95_cycle_ms);

    if let Some(path) = &cli.output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Report saved");
    }

    // 7. CI threshold check
    if let Some(threshold) = cli.max_mean_ms {
        if mean_cycle_ms > threshold {
            eprintln!("FAIL: mean cycle latency {}ms > threshold {}ms", mean_cycle_ms, threshold);
            std::process::exit(1);
        }
        println!("PASS: mean cycle latency {}ms <= threshold {}ms", mean_cycle_ms, threshold);
    }

    Ok(())
}
