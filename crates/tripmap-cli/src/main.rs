// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::path::PathBuf;
use tripmap_core::capability::Container;
use tripmap_core::config::MapConfig;
use tripmap_core::layering::{MarkerGlyph, PaneKind};
use tripmap_core::lifecycle::InitOutcome;
use tripmap_core::viewport::HeadlessProvider;
use tripmap_core::{compute_segments, Itinerary, MapLifecycle};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Map config file (defaults to the per-user config)
    #[arg(short, long, env = "TRIPMAP_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the curved route segments between consecutive stops
    Segments {
        file: PathBuf,
        /// Emit JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Lay the itinerary out on a headless map and print what would be drawn
    Plan {
        file: PathBuf,
        /// Only map the stops of this day
        #[arg(short, long)]
        day: Option<u32>,
        #[arg(long, default_value_t = 800)]
        width: u32,
        #[arg(long, default_value_t = 600)]
        height: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    let config = match &cli.config {
        Some(path) => MapConfig::load_from(path)?,
        None => MapConfig::load(),
    };

    match cli.command {
        Commands::Segments { file, json } => {
            let itinerary = Itinerary::load(&file)?;
            let stops = itinerary.mappable_stops();
            let segments = compute_segments(&stops);

            if json {
                println!("{}", serde_json::to_string_pretty(&segments)?);
                return Ok(());
            }

            let skipped = itinerary.items.len() - stops.len();
            println!(
                "{} stops, {} segments ({} items without coordinates)",
                stops.len(),
                segments.len(),
                skipped
            );
            for (pair, segment) in stops.windows(2).zip(&segments) {
                let headings: Vec<String> = segment
                    .arrows
                    .iter()
                    .map(|a| format!("{:.0}°", a.heading))
                    .collect();
                println!(
                    "  {} -> {}  control=({:.5}, {:.5}) arrows=[{}]",
                    pair[0].name,
                    pair[1].name,
                    segment.control.lat,
                    segment.control.lng,
                    headings.join(", ")
                );
            }
        }
        Commands::Plan {
            file,
            day,
            width,
            height,
        } => {
            let itinerary = Itinerary::load(&file)?;
            let stops = match day {
                Some(day) => itinerary.stops_for_day(day),
                None => itinerary.mappable_stops(),
            };

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .context("Failed to start runtime")?;

            let container = Container::new("plan", width, height);
            let map = MapLifecycle::new(HeadlessProvider::new(), container, config);
            let outcome = runtime.block_on(map.initialize(stops));

            match outcome {
                InitOutcome::Ready => {}
                InitOutcome::Skipped => {
                    println!("Nothing to map.");
                    return Ok(());
                }
                other => {
                    let reason = map.last_error().unwrap_or_default();
                    anyhow::bail!("Map did not become ready ({:?}) {}", other, reason);
                }
            }

            if let Some(title) = &itinerary.title {
                println!("{}", title);
            }
            map.with_widget(|vp| {
                let view = vp.view();
                println!(
                    "View: center=({:.5}, {:.5}) zoom={}",
                    view.center.lat, view.center.lng, view.zoom
                );
                for pane in vp.panes() {
                    println!(
                        "Pane {} z={} markers={}",
                        pane.name,
                        pane.z_index,
                        vp.markers_in(pane.kind).count()
                    );
                }
                println!("Paths: {}", vp.polylines().len());
                for marker in vp.markers_in(PaneKind::Markers) {
                    let title = marker.popup.as_ref().map(|p| p.title.as_str());
                    if let MarkerGlyph::Numbered { label, color } = &marker.spec.glyph {
                        println!("  {:>2} {} {}", label, color, title.unwrap_or(""));
                    }
                }
                println!("Tiles:");
                for url in vp.tile_urls() {
                    println!("  {}", url);
                }
            });
            map.dispose();
        }
    }

    Ok(())
}
