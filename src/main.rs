//! Headless progression simulator.
//!
//! ```text
//! learnquest-sim [--config progression.ron] [--catalog catalog.ron]
//!                [--data ./learnquest-data] [--character demo] [--sessions 12]
//! ```
//!
//! Plays a scripted run of challenges, reviews and sessions against a file
//! gateway and prints the events the UI would render.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use learnquest_core::catalog::Catalog;
use learnquest_core::clock::{Clock, FixedClock, SystemClock};
use learnquest_core::config::ProgressionConfig;
use learnquest_core::constants::SECONDS_PER_DAY;
use learnquest_core::difficulty::SessionMetrics;
use learnquest_core::logging::init_tracing;
use learnquest_core::persistence::FileGateway;
use learnquest_core::LearningEngine;

const TOPICS: [&str; 3] = ["fractions", "photosynthesis", "world_capitals"];

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_arg(args: &[String], flag: &str) -> Option<u32> {
    parse_str_arg(args, flag).and_then(|v| v.parse().ok())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let config = match parse_str_arg(&args, "--config") {
        Some(path) => ProgressionConfig::load(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => ProgressionConfig::default(),
    };
    init_tracing(&config.logging);

    let catalog = match parse_str_arg(&args, "--catalog") {
        Some(path) => {
            Catalog::load(&path).with_context(|| format!("loading catalog from {path}"))?
        }
        None => Catalog::default(),
    };
    let data_dir = parse_str_arg(&args, "--data").unwrap_or_else(|| "learnquest-data".into());
    let character = parse_str_arg(&args, "--character").unwrap_or_else(|| "demo".into());
    let sessions = parse_arg(&args, "--sessions").unwrap_or(12);

    let gateway = Arc::new(
        FileGateway::new(&data_dir).with_context(|| format!("opening data dir {data_dir}"))?,
    );
    let clock = Arc::new(FixedClock::new(SystemClock.now()));
    let mut engine = LearningEngine::open(&character, catalog, &config, gateway, clock.clone())
        .context("opening learning engine")?;

    println!("=== LearnQuest Progression Simulator ===");
    println!("  Character: {}", character);
    println!("  Data dir:  {}", data_dir);
    println!("  Sessions:  {}", sessions);
    println!();

    for i in 0..sessions {
        let topic = TOPICS[i as usize % TOPICS.len()];
        let accuracy = 0.55 + 0.05 * (i % 10) as f64;
        let score = 100 + 40 * i as u64;
        let multiplayer = i % 4 == 3;

        let xp = engine.on_game_complete(score, 45 + 10 * (i as u64 % 4), accuracy, multiplayer)?;
        let quality = (accuracy * 5.0).round() as u8;
        let review = engine.record_review_result(topic, quality)?;
        let params = engine.complete_session(
            topic,
            &SessionMetrics {
                accuracy_rate: accuracy,
                average_time_per_card_ms: 1500.0 + 250.0 * (i % 5) as f64,
                streak_performance: (i % 10) as f64,
                focus_level: 0.6 + 0.04 * (i % 10) as f64,
                cognitive_load: 0.5,
            },
        )?;

        println!(
            "  [{:>2}] {:<15} xp: {:>4}  next review: {:>2}d  difficulty: {}  hints: {}",
            i + 1,
            topic,
            xp,
            review.interval_days,
            params.difficulty,
            params.hint_count
        );
        for event in engine.drain_events() {
            println!("       -> {}", serde_json::to_string(&event)?);
        }

        // try to spend points on whatever is available
        let available: Vec<String> = engine
            .progression()
            .available_skills()
            .iter()
            .map(|n| n.id.clone())
            .collect();
        for skill in available {
            if engine.unlock_skill(&skill)? {
                println!("       -> unlocked {}", skill);
            }
        }

        clock.advance(SECONDS_PER_DAY / 2);
    }

    let c = engine.progression().character();
    println!();
    println!("=== Summary ===");
    println!("  Level:       {} ({}/{} xp)", c.level, c.experience, c.experience_to_next);
    println!("  Total XP:    {}", c.total_experience);
    println!("  Skill pts:   {}", c.skill_points);
    println!("  Skills:      {:?}", c.unlocked_skill_ids);
    println!(
        "  Achievements: {}/{}",
        engine.progression().achievements().completed_count(),
        engine.progression().achievements().achievements().len()
    );
    println!("  Due reviews: {}", engine.due_topics().len());
    info!(character = %character, level = c.level, "simulation finished");
    Ok(())
}
