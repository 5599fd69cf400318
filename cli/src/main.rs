use clap::{Parser, Subcommand, ValueEnum};
use perfgrid_common::db::core::Side;
use perfgrid_common::db::footprint::{Placement, Rotation};
use perfgrid_common::db::indices::ComponentId;
use perfgrid_common::db::parser::project::{self, Project};
use perfgrid_common::geom::coord::GridPos;
use perfgrid_common::geom::point::Point;
use perfgrid_common::util::config::Config;
use perfgrid_common::util::{check, generator, logger, visualization};
use perfgrid_placer::wirelength::total_hpwl;
use perfgrid_router::connect::{ConnectMode, plan_connection};
use perfgrid_router::net_group::same_net;
use perfgrid_router::repair::{MoveRequest, plan_transform};
use perfgrid_router::utils::conversion::GridConverter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Auto,
    Wire,
    Bridge,
}

impl From<ModeArg> for ConnectMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Auto => ConnectMode::Auto,
            ModeArg::Wire => ConnectMode::Wire,
            ModeArg::Bridge => ConnectMode::Bridge,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Top,
    Bottom,
}

impl From<SideArg> for Side {
    fn from(s: SideArg) -> Self {
        match s {
            SideArg::Top => Side::Top,
            SideArg::Bottom => Side::Bottom,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Place every unplaced component.
    Place,
    /// Autoroute the net-list of the placed board.
    Route,
    /// Place, then route.
    Flow,
    /// Move, rotate or mirror a component and repair its wiring.
    Move {
        component: String,
        col: i32,
        row: i32,
        #[arg(long, default_value_t = 0)]
        rotation: i32,
        #[arg(long)]
        mirrored: bool,
    },
    /// Join two grid points with a bridge or a routed wire.
    Connect {
        from_col: i32,
        from_row: i32,
        to_col: i32,
        to_row: i32,
        #[arg(long, value_enum, default_value = "auto")]
        mode: ModeArg,
        #[arg(long, value_enum, default_value = "top")]
        side: SideArg,
    },
    /// List the net under a canvas position given in pixels.
    Net { x: f64, y: f64 },
    Generate {
        #[arg(long, default_value_t = 20)]
        components: usize,
        #[arg(long, default_value_t = 16)]
        nets: usize,
        #[arg(long, default_value_t = 0.30)]
        utilization: f64,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(long, default_value = "inputs/board.toml")]
        output: String,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str).map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    let command = args.command.unwrap_or(Commands::Flow);

    match command {
        Commands::Generate {
            components,
            nets,
            utilization,
            seed,
            output,
        } => {
            let safe_util = utilization.clamp(0.05, 0.9);
            if (safe_util - utilization).abs() > f64::EPSILON {
                log::warn!(
                    "Requested utilization {:.2} is unsafe. Clamped to {:.2}",
                    utilization,
                    safe_util
                );
            }
            prepare_output_dir(&output)?;
            generator::generate_random_project(&output, components, nets, safe_util, seed)?;
            log::info!("Generated: {}", output);
        }
        Commands::Place => {
            let mut project = load(&config.input.project_file)?;
            run_placement(&config, &mut project)?;
            finish(&config, &project)?;
        }
        Commands::Route => {
            if !Path::new(&config.input.output_file).exists() {
                return Err(anyhow::anyhow!(
                    "Placed board missing: '{}'. Did you run 'place'?",
                    config.input.output_file
                ));
            }
            let mut project = load(&config.input.output_file)?;
            run_routing(&config, &mut project)?;
            finish(&config, &project)?;
        }
        Commands::Flow => {
            let mut project = load(&config.input.project_file)?;
            run_placement(&config, &mut project)?;
            run_routing(&config, &mut project)?;
            finish(&config, &project)?;
        }
        Commands::Move {
            component,
            col,
            row,
            rotation,
            mirrored,
        } => {
            let mut project = load_latest(&config)?;
            let rotation = Rotation::from_degrees(rotation)
                .ok_or_else(|| anyhow::anyhow!("Rotation must be 0, 90, 180 or 270, got {}", rotation))?;
            let id = project.db.component_by_name(&component)?.id;
            let request = MoveRequest {
                component: id,
                placement: Placement::at(GridPos::new(col, row)).rotated(rotation).mirrored(mirrored),
            };
            run_move(&config, &mut project, request)?;
            finish(&config, &project)?;
        }
        Commands::Connect {
            from_col,
            from_row,
            to_col,
            to_row,
            mode,
            side,
        } => {
            let mut project = load_latest(&config)?;
            let (a, b) = (GridPos::new(from_col, from_row), GridPos::new(to_col, to_row));
            let outcome = plan_connection(
                &project.db,
                &project.library,
                a,
                b,
                mode.into(),
                side.into(),
                &config.routing,
            )?;
            for warning in &outcome.warnings {
                log::warn!("{:?}", warning);
            }
            log::info!(
                "Adding {} {:?}: {:?}",
                if outcome.connection.is_bridge() { "bridge" } else { "wire" },
                outcome.connection.id(),
                outcome.connection.points()
            );
            project.db.apply(&[outcome.mutation()])?;
            finish(&config, &project)?;
        }
        Commands::Net { x, y } => {
            let project = load_latest(&config)?;
            show_net(&config, &project, Point::new(x, y));
        }
    }

    Ok(())
}

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent()
        && !parent.exists()
        && !parent.as_os_str().is_empty()
    {
        log::info!("Creating output directory: {:?}", parent);
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn load(path: &str) -> anyhow::Result<Project> {
    log::info!("Parsing project: {}", path);
    project::parse(path).map_err(|e| anyhow::anyhow!("Invalid project file '{}': {}", path, e))
}

/// The output board when one exists, the input project otherwise.
fn load_latest(config: &Config) -> anyhow::Result<Project> {
    if Path::new(&config.input.output_file).exists() {
        load(&config.input.output_file)
    } else {
        load(&config.input.project_file)
    }
}

/// Verifies, saves and optionally renders the board.
fn finish(config: &Config, project: &Project) -> anyhow::Result<()> {
    check::run_placement_check(&project.db, &project.library).map_err(|e| anyhow::anyhow!(e))?;
    check::run_connection_check(&project.db).map_err(|e| anyhow::anyhow!(e))?;

    let output = &config.input.output_file;
    prepare_output_dir(output)?;
    log::info!("Writing board to {}", output);
    project::save(project, output)?;

    if config.input.render_png {
        let png = Path::new(output).with_extension("png");
        let png = png.to_string_lossy();
        log::info!("Rendering {}", png);
        visualization::draw_board(&project.db, &project.library, &png, 12);
    }
    Ok(())
}

fn run_placement(config: &Config, project: &mut Project) -> anyhow::Result<()> {
    let unplaced: Vec<ComponentId> = project
        .db
        .components
        .iter()
        .filter(|c| c.placement.is_none())
        .map(|c| c.id)
        .collect();
    if unplaced.is_empty() {
        log::info!("Every component is already placed.");
        return Ok(());
    }

    let result = perfgrid_placer::layout(
        &project.db,
        &project.library,
        &project.netlist,
        &unplaced,
        config.placement.mode,
        &config.placement,
    )?;
    project.db.apply(&result.mutations())?;

    for id in &result.failed {
        log::warn!("Unplaced: {}", project.db.component(*id)?.name);
    }
    log::info!(
        "Estimated wirelength (HPWL): {}",
        total_hpwl(&project.db, &project.library, &project.netlist)?
    );
    Ok(())
}

fn run_routing(config: &Config, project: &mut Project) -> anyhow::Result<()> {
    let result = perfgrid_router::route(
        &project.db,
        &project.library,
        &project.netlist,
        &config.autoroute,
        &config.routing,
    )?;
    project.db.apply(&result.mutations)?;

    if !result.failed_nets.is_empty() {
        log::warn!("Failed nets: {}", result.failed_nets.join(", "));
    }
    Ok(())
}

fn run_move(config: &Config, project: &mut Project, request: MoveRequest) -> anyhow::Result<()> {
    let plan = plan_transform(
        &project.db,
        &project.library,
        &[request],
        &config.routing,
        &config.repair,
    )?;
    if plan.is_empty() {
        log::info!("Nothing changed.");
        return Ok(());
    }
    project.db.apply(&plan.mutations)?;

    let report = &plan.report;
    log::info!(
        "Repair: {} rerouted, {} synthesized, {} removed",
        report.rerouted.len(),
        report.synthesized.len(),
        report.removed.len()
    );
    if !report.is_clean() {
        log::warn!(
            "Repair left {} L-route fallback(s) and {} unresolved path(s): {:?}",
            report.fallbacks.len(),
            report.unresolved.len(),
            report.unresolved
        );
    }
    Ok(())
}

fn show_net(config: &Config, project: &Project, pixel: Point<f64>) {
    let db = &project.db;
    let converter = GridConverter::new(config.input.pixel_pitch, db.width, db.height);
    let seed = converter.to_grid_space(pixel);
    let group = same_net(&[seed], &db.connections, &db.labels, config.routing.net_epsilon);

    if group.connections.is_empty() {
        log::info!(
            "No connection ends near ({:.2}, {:.2}); nearest hole is {}",
            seed.x,
            seed.y,
            converter.to_grid(pixel)
        );
        return;
    }
    let names: Vec<&str> = group.names.iter().map(String::as_str).collect();
    log::info!(
        "Net [{}]: {} connection(s), {} point(s)",
        names.join(", "),
        group.connections.len(),
        group.points.len()
    );
    for id in &group.connections {
        if let Some(conn) = db.connection(*id) {
            log::info!("  {:?}: {:?}", id, conn.points());
        }
    }
}
