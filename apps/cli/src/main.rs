// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: run the terrain analysis over a JSON scene
//!
//! Projects the scene's boundary onto its terrain, derives retaining-wall
//! curves and commits them into the scene host. The written JSON holds the
//! analysis report and the walls that were created.
//!
//! Usage:
//!   sitegrade <scene.json> [options]

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use sitegrade_processing::{
    analyze, commit_walls, parse_strategy, AnalysisReport, Scene, SceneHost, SceneOutput,
};

struct Options {
    scene_path: PathBuf,
    output_path: Option<PathBuf>,
    commit: bool,
    strategy: Option<String>,
    classify_terrain: bool,
    subdivisions: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,sitegrade_geometry=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return Ok(());
    }
    let options = parse_args(&args)?;

    let json = fs::read_to_string(&options.scene_path)
        .with_context(|| format!("Cannot read scene '{}'", options.scene_path.display()))?;
    let mut scene = Scene::from_json_str(&json)
        .with_context(|| format!("Invalid scene '{}'", options.scene_path.display()))?;

    let mut config = scene.config.clone().apply_env();
    if let Some(raw) = &options.strategy {
        config.strategy = match parse_strategy(raw) {
            Some(strategy) => strategy,
            None => bail!("Unknown strategy '{}', expected angle or adaptive", raw),
        };
    }
    if let Some(subdivisions) = options.subdivisions {
        config.subdivision_level = subdivisions;
    }
    config.classify_terrain |= options.classify_terrain;
    scene.config = config;

    tracing::info!(
        scene = %options.scene_path.display(),
        terrain = %scene.terrain,
        subdivision_level = scene.config.subdivision_level,
        strategy = ?scene.config.strategy,
        "Starting terrain analysis"
    );

    let request = scene.request();
    let config = scene.config.clone();
    let mut host = SceneHost::new(scene);

    let report = analyze(&host, &request, &config).context("Terrain analysis failed")?;

    if options.commit {
        let ids = commit_walls(&mut host, &report, &config.wall_spec())
            .context("Could not commit retaining walls")?;
        eprintln!("Created {} retaining walls", ids.len());
    }

    print_summary(&report);

    let output = SceneOutput::new(report, &host);
    let rendered = serde_json::to_string_pretty(&output).context("Cannot serialize report")?;
    match &options.output_path {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Cannot write report '{}'", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options {
        scene_path: PathBuf::from(&args[1]),
        output_path: None,
        commit: true,
        strategy: None,
        classify_terrain: false,
        subdivisions: None,
    };

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" => {
                options.output_path = Some(PathBuf::from(value(args, &mut i, "--output")?));
            }
            "--strategy" => {
                options.strategy = Some(value(args, &mut i, "--strategy")?.to_string());
            }
            "--subdivisions" => {
                let raw = value(args, &mut i, "--subdivisions")?;
                options.subdivisions = Some(
                    raw.parse()
                        .with_context(|| format!("Invalid subdivisions value '{}'", raw))?,
                );
            }
            "--no-commit" => options.commit = false,
            "--classify-terrain" => options.classify_terrain = true,
            other => {
                print_usage();
                bail!("Unknown option: {}", other);
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Value following the flag at `args[*i]`
fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    match args.get(*i) {
        Some(v) => Ok(v.as_str()),
        None => bail!("Missing value for {}", flag),
    }
}

fn print_summary(report: &AnalysisReport) {
    let stats = &report.stats;
    eprintln!("=== Terrain Analysis ===");
    eprintln!("  Terrain faces:   {}", stats.terrain_faces);
    eprintln!(
        "  Boundary points: {} ({} without terrain)",
        stats.boundary_points, stats.gaps
    );
    eprintln!("  Wall segments:   {}", stats.segments);
    eprintln!("  Wall curves:     {}", stats.walls);
    match &report.worst_case {
        Some(worst) => eprintln!(
            "  Worst case:      point {} at {:.2} m, {:.2} m above platform",
            worst.index, worst.distance, worst.height_delta
        ),
        None => eprintln!("  Worst case:      none"),
    }
    if let Some(features) = &report.terrain_features {
        eprintln!(
            "  Terrain:         {} peaks, {} valleys",
            features.peaks.len(),
            features.valleys.len()
        );
    }
}

fn print_usage() {
    eprintln!("Usage: sitegrade <scene.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --output <path>      Write the JSON report to a file instead of stdout");
    eprintln!("  --strategy <name>        Segmentation strategy: angle (default) or adaptive");
    eprintln!("  --subdivisions <n>       Override the boundary subdivision level");
    eprintln!("  --no-commit              Analyze only, do not create walls");
    eprintln!("  --classify-terrain       Report terrain peaks and valleys");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG                 Log filter (default: info)");
    eprintln!("  SITEGRADE_*              Configuration overrides, e.g. SITEGRADE_WALL_HEIGHT=4");
}
