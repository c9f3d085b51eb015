use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use itertools::Itertools;
use rayon::prelude::*;
use rootcause::prelude::*;
use tracing_subscriber::EnvFilter;

use mizread::data::probe_theater;
use mizread::mission::{BriefingUpdate, MissionDetails, ParseOptions, ParseStatus, update_briefings};
use mizread::projection::{self, dcs_to_latlon};

/// Reads mission details out of DCS World `.miz` archives
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the theater of every mission archive
    Probe {
        /// Directories are searched for `.miz` files
        #[clap(required = true)]
        paths: Vec<PathBuf>,

        /// Search directories recursively
        #[clap(short, long)]
        recursive: bool,
    },
    /// Print a mission summary
    Show {
        file: PathBuf,

        /// Print the full mission model as JSON
        #[clap(long)]
        json: bool,

        /// Skip briefing and kneeboard images
        #[clap(long)]
        no_images: bool,
    },
    /// Convert mission coordinates to latitude and longitude
    Latlon {
        theater: String,
        #[clap(allow_hyphen_values = true)]
        x: f64,
        #[clap(allow_hyphen_values = true)]
        y: f64,
    },
    /// Replace briefing texts stored in the mission dictionary
    Update {
        file: PathBuf,

        #[clap(long)]
        sortie: Option<String>,

        #[clap(long)]
        situation: Option<String>,

        #[clap(long)]
        blue_task: Option<String>,

        #[clap(long)]
        red_task: Option<String>,

        #[clap(long)]
        neutrals_task: Option<String>,
    },
}

fn expand_paths(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, Report> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.is_dir() {
            out.push(path.clone());
            continue;
        }

        let pattern = if recursive {
            path.join("**").join("*.miz")
        } else {
            path.join("*.miz")
        };
        let pattern = pattern.to_string_lossy();
        let entries = glob::glob(&pattern).map_err(|e| rootcause::report!("Invalid search pattern {pattern}: {e}"))?;
        for entry in entries {
            match entry {
                Ok(found) => out.push(found),
                Err(e) => tracing::warn!("skipping {}: {e}", e.path().display()),
            }
        }
    }
    Ok(out)
}

fn run_probe(paths: &[PathBuf], recursive: bool) -> Result<(), Report> {
    let files = expand_paths(paths, recursive)?;
    if files.is_empty() {
        bail!("No mission archives found");
    }

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .map_err(|e| rootcause::report!("Invalid progress template: {e}"))?,
    );
    let results: Vec<(PathBuf, String)> = files
        .into_par_iter()
        .progress_with(bar.clone())
        .map(|path| {
            let theater = probe_theater(&path);
            (path, theater)
        })
        .collect();
    bar.finish_and_clear();

    for (path, theater) in &results {
        println!("{theater}\t{}", path.display());
    }

    let counts = results.iter().map(|(_, theater)| theater.as_str()).counts();
    let summary = counts
        .iter()
        .sorted_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)))
        .map(|(theater, count)| format!("{theater}: {count}"))
        .join(", ");
    eprintln!("{} files ({summary})", results.len());
    Ok(())
}

fn print_summary(details: &MissionDetails) {
    println!("Sortie:     {}", details.sortie);
    println!("Theater:    {}", details.theater);
    println!("Start:      {} {}", details.date, details.start_time);

    let weather = &details.weather;
    println!(
        "Weather:    {:.0} mmHg, {:.0} C, wind {:.0}@{:.0} m/s",
        weather.qnh, weather.temperature, weather.at_ground.dir, weather.at_ground.speed
    );
    if !details.required_modules.is_empty() {
        println!("Modules:    {}", details.required_modules.iter().join(", "));
    }

    println!();
    println!("{}", details.briefing.situation);
    for (label, task) in [
        ("Blue task", &details.briefing.blue_task),
        ("Red task", &details.briefing.red_task),
        ("Neutrals task", &details.briefing.neutrals_task),
    ] {
        if !task.is_empty() {
            println!();
            println!("{label}:");
            println!("{task}");
        }
    }

    println!();
    println!("{}", details.debug_info());
    let by_coalition = details.groups.iter().map(|g| g.coalition()).counts();
    for (coalition, count) in by_coalition.iter().sorted_by_key(|(c, _)| c.key()) {
        println!("  {coalition}: {count} groups");
    }

    let players = details.player_slots().collect_vec();
    if !players.is_empty() {
        println!();
        println!("Player slots:");
        for slot in players {
            let position = dcs_to_latlon(&details.theater, slot.x, slot.y);
            println!(
                "  [{}] {} / {} ({}) at {:.4}, {:.4}",
                slot.coalition, slot.group_name, slot.unit_name, slot.unit_type, position.lat, position.lon
            );
        }
    }

    let images = details.images.iter().chain(&details.kneeboard_images).collect_vec();
    if !images.is_empty() {
        println!();
        println!("Images:");
        for image in images {
            println!("  {} ({}, {}x{})", image.name, image.format, image.width, image.height);
        }
    }

    if !details.diagnostics.is_empty() {
        println!();
        println!("{} fields could not be read:", details.diagnostics.len());
        for diagnostic in &details.diagnostics {
            println!("  {diagnostic}");
        }
    }
}

fn run_show(file: &Path, json: bool, no_images: bool) -> Result<(), Report> {
    let options = ParseOptions::builder()
        .images(!no_images)
        .kneeboard(!no_images)
        .build();
    let details = mizread::parse_mission_with(file, &options);
    if let ParseStatus::Failed(message) = &details.status {
        bail!("Failed to read {}: {message}", file.display());
    }

    if json {
        let text = serde_json::to_string_pretty(&details)
            .map_err(|e| rootcause::report!("Failed to serialize mission: {e}"))?;
        println!("{text}");
    } else {
        print_summary(&details);
    }
    Ok(())
}

fn run_latlon(theater: &str, x: f64, y: f64) {
    let known = projection::known_theaters();
    if !known.iter().any(|name| name.eq_ignore_ascii_case(theater)) {
        eprintln!(
            "Unknown theater {theater:?}, using {}. Known theaters: {}",
            projection::DEFAULT_THEATER,
            known.join(", ")
        );
    }
    let position = dcs_to_latlon(theater, x, y);
    println!("{:.6}, {:.6}", position.lat, position.lon);
}

fn run_update(file: &Path, update: BriefingUpdate) -> Result<(), Report> {
    if update.is_empty() {
        bail!("Nothing to update: pass at least one briefing field");
    }
    let report = update_briefings(file, &update)
        .map_err(|e| rootcause::report!("Failed to update {}: {e}", file.display()))?;

    for field in &report.updated {
        println!("updated {field}");
    }
    for (field, reason) in &report.skipped {
        println!("skipped {field}: {reason}");
    }
    if !report.changed() {
        eprintln!("{} was left unchanged", file.display());
    }
    Ok(())
}

fn main() -> Result<(), Report> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Probe { paths, recursive } => run_probe(&paths, recursive),
        Commands::Show {
            file,
            json,
            no_images,
        } => run_show(&file, json, no_images),
        Commands::Latlon { theater, x, y } => {
            run_latlon(&theater, x, y);
            Ok(())
        }
        Commands::Update {
            file,
            sortie,
            situation,
            blue_task,
            red_task,
            neutrals_task,
        } => {
            let update = BriefingUpdate::builder()
                .maybe_sortie(sortie)
                .maybe_situation(situation)
                .maybe_blue_task(blue_task)
                .maybe_red_task(red_task)
                .maybe_neutrals_task(neutrals_task)
                .build();
            run_update(&file, update)
        }
    }
}
