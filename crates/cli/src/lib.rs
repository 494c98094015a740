use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use takeoff_core::{
    export_quantities_csv, measurement, parse_scale_ratio, Calibration, CalibrationProgress, Color,
    CsvExportConfig, EditorConfig, EditorSession, Fill, Material, PdfLoadTask, Point, Tool,
};
use takeoff_pdf::LopdfRasterizer;
use takeoff_storage::{Project, Storage, StorageError};
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "takeoff-cli")]
#[command(about = "Takeoff CLI")]
pub struct Cli {
    /// Directory holding the saved config and projects (defaults to the platform data dir).
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render page 1 to a PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Raster scale (defaults to the configured render scale).
        #[arg(long)]
        scale: Option<f64>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Convert a drawing scale ratio like 1:50 to a scale factor.
    Scale {
        #[arg(value_name = "RATIO")]
        ratio: String,
    },
    /// Compute a scale factor from two points and a known length.
    Calibrate {
        #[arg(long, value_parser = parse_point_arg)]
        from: Point,
        #[arg(long, value_parser = parse_point_arg)]
        to: Point,
        /// Real-world length between the two points.
        #[arg(long)]
        length: String,
        /// Unit of the length (defaults to the configured unit).
        #[arg(long)]
        unit: Option<String>,
    },
    /// Measure the distance between two points.
    Measure {
        #[arg(long, value_parser = parse_point_arg)]
        from: Point,
        #[arg(long, value_parser = parse_point_arg)]
        to: Point,
        /// Real-world units per pixel.
        #[arg(long, default_value_t = 1.0)]
        scale_factor: f64,
        #[arg(long, default_value = "px")]
        unit: String,
    },
    /// Apply a JSON script of editing actions to a fresh session.
    Replay {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
        /// PDF whose first page is loaded as the backdrop before replaying.
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Write the resulting scene JSON here.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write a quantity schedule CSV here.
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Save the result as a named project in the data dir.
        #[arg(long, value_name = "NAME")]
        save_project: Option<String>,
    },
    /// Print the effective configuration (saved config plus environment overrides).
    Config {
        /// Persist the effective configuration to the data dir.
        #[arg(long)]
        save: bool,
    },
    /// List saved projects.
    Projects,
    /// Export a saved project as scene JSON and optionally a quantity CSV.
    Export {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

/// One step of a replay script
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ScriptAction {
    SetTool { tool: Tool },
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    PointerLeave,
    FinishPolyline,
    /// A calibration click; `length` answers the prompt on the second point
    Calibrate { x: f64, y: f64, length: Option<String> },
    SetScale { ratio: String },
    Measure { from: [f64; 2], to: [f64; 2] },
    PlaceText { x: f64, y: f64, text: String },
    Select { x: f64, y: f64 },
    ClearSelection,
    DeleteSelected,
    SetStrokeColor { color: String },
    SetFill { color: Option<String> },
    ApplyMaterial { material: String },
    Rotate {
        angle: f64,
        #[serde(default)]
        snap: bool,
    },
    Undo,
    Redo,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    version: String,
    page_count: u32,
    first_page_size_pt: PageSizeOutput,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct ScaleOutput {
    ratio: String,
    scale_factor: f64,
}

#[derive(Debug, Serialize)]
struct CalibrateOutput {
    pixel_distance: f64,
    real_length: f64,
    scale_factor: f64,
    unit: String,
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    actions: usize,
    shapes: usize,
    history_len: usize,
    history_index: Option<usize>,
    scale_factor: f64,
    unit: String,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let data_dir = cli.data_dir.as_deref();

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Render { file, scale, output } => {
            run_render(data_dir, &file, scale, output.as_deref())
        }
        Commands::Scale { ratio } => run_scale(&ratio),
        Commands::Calibrate { from, to, length, unit } => {
            run_calibrate(data_dir, from, to, &length, unit)
        }
        Commands::Measure { from, to, scale_factor, unit } => {
            run_measure(data_dir, from, to, scale_factor, &unit)
        }
        Commands::Replay { script, pdf, output, csv, save_project } => run_replay(
            data_dir,
            &script,
            pdf.as_deref(),
            output.as_deref(),
            csv.as_deref(),
            save_project.as_deref(),
        ),
        Commands::Config { save } => run_config(data_dir, save),
        Commands::Projects => run_projects(data_dir),
        Commands::Export { name, output, csv } => {
            run_export(data_dir, &name, output.as_deref(), csv.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Install a stderr log subscriber filtered by `RUST_LOG` (default `warn`)
pub fn init_logging() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    // A second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init();
}

fn run_info(file: &Path) -> Result<()> {
    let bytes = read_pdf(file)?;
    let info = takeoff_pdf::inspect(&bytes).context("failed to open PDF")?;

    let payload = InfoOutput {
        path: file.display().to_string(),
        version: info.version,
        page_count: info.page_count,
        first_page_size_pt: PageSizeOutput {
            width: info.first_page.width_pt,
            height: info.first_page.height_pt,
        },
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    Ok(())
}

fn run_render(
    data_dir: Option<&Path>,
    file: &Path,
    scale: Option<f64>,
    output: Option<&Path>,
) -> Result<()> {
    let bytes = read_pdf(file)?;
    let scale = match scale {
        Some(scale) => scale,
        None => load_config(data_dir)?.render_scale,
    };
    if !(scale.is_finite() && scale > 0.0) {
        anyhow::bail!("--scale must be a positive number");
    }

    let image = takeoff_pdf::render_first_page(&bytes, scale).context("failed to render page")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

fn run_scale(ratio: &str) -> Result<()> {
    let scale_factor = parse_scale_ratio(ratio).context("invalid scale ratio")?;
    let payload = ScaleOutput { ratio: ratio.trim().to_string(), scale_factor };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_calibrate(
    data_dir: Option<&Path>,
    from: Point,
    to: Point,
    length: &str,
    unit: Option<String>,
) -> Result<()> {
    let unit = match unit {
        Some(unit) => unit,
        None => load_config(data_dir)?.default_unit,
    };

    let mut calibration = Calibration::new();
    calibration.begin(unit);
    calibration.add_point(from, |_| String::new()).context("calibration failed")?;
    let progress =
        calibration.add_point(to, |_| length.to_string()).context("calibration failed")?;

    let CalibrationProgress::Calibrated { pixel_distance, real_length, scale_factor } = progress
    else {
        anyhow::bail!("calibration did not complete");
    };

    let payload = CalibrateOutput {
        pixel_distance,
        real_length,
        scale_factor,
        unit: calibration.unit().to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_measure(
    data_dir: Option<&Path>,
    from: Point,
    to: Point,
    scale_factor: f64,
    unit: &str,
) -> Result<()> {
    let config = load_config(data_dir)?;
    let mut session = EditorSession::new(config);
    session.set_scale_factor(scale_factor, unit).context("invalid scale factor")?;

    let id = session.measure(from, to)?;
    let label = session
        .scene()
        .get(id)
        .and_then(|shape| measurement::measurement_label(shape.kind()))
        .context("measurement was not recorded")?;

    println!("{label}");
    Ok(())
}

fn run_replay(
    data_dir: Option<&Path>,
    script: &Path,
    pdf: Option<&Path>,
    output: Option<&Path>,
    csv: Option<&Path>,
    save_project: Option<&str>,
) -> Result<()> {
    let text = fs::read_to_string(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;
    let actions: Vec<ScriptAction> =
        serde_json::from_str(&text).context("failed to parse replay script")?;

    let config = load_config(data_dir)?;
    let render_scale = config.render_scale;
    let mut session = EditorSession::new(config);

    if let Some(pdf) = pdf {
        let bytes = read_pdf(pdf)?;
        let file_name = pdf.file_name().and_then(|name| name.to_str()).unwrap_or_default();
        let rasterizer = Arc::new(LopdfRasterizer::new());
        let task = PdfLoadTask::spawn(file_name, bytes, rasterizer, render_scale)
            .context("failed to open PDF")?;
        let raster = task.wait().context("failed to render page")?;
        info!(width = raster.width, height = raster.height, "page attached");
        session.attach_page(&raster);
    }

    for (index, action) in actions.iter().enumerate() {
        apply_action(&mut session, action)
            .with_context(|| format!("action {} ({action:?}) failed", index + 1))?;
    }

    if let Some(output) = output {
        write_file(output, session.export_json()?.as_bytes())?;
    }
    if let Some(csv) = csv {
        write_quantities(csv, &session)?;
    }
    if let Some(name) = save_project {
        let storage = open_storage(data_dir)?;
        let project = Project::new(session.scene(), session.calibration());
        storage
            .save_project(name, &project)
            .with_context(|| format!("failed to save project {name}"))?;
    }

    let payload = ReplayOutput {
        actions: actions.len(),
        shapes: session.scene().len(),
        history_len: session.history().len(),
        history_index: session.history().index(),
        scale_factor: session.calibration().scale_factor(),
        unit: session.calibration().unit().to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn apply_action(session: &mut EditorSession, action: &ScriptAction) -> Result<()> {
    debug!(?action, "replaying");
    match action {
        ScriptAction::SetTool { tool } => session.set_tool(*tool),
        ScriptAction::PointerDown { x, y } => {
            session.pointer_down(Point::new(*x, *y));
        }
        ScriptAction::PointerMove { x, y } => session.pointer_move(Point::new(*x, *y)),
        ScriptAction::PointerUp { x, y } => {
            session.pointer_up(Point::new(*x, *y));
        }
        ScriptAction::PointerLeave => session.pointer_leave(),
        ScriptAction::FinishPolyline => {
            session.finish_polyline();
        }
        ScriptAction::Calibrate { x, y, length } => {
            let answer = length.clone().unwrap_or_default();
            session.calibrate(Point::new(*x, *y), |_| answer)?;
        }
        ScriptAction::SetScale { ratio } => session.set_scale_ratio(ratio)?,
        ScriptAction::Measure { from, to } => {
            session.measure(Point::new(from[0], from[1]), Point::new(to[0], to[1]))?;
        }
        ScriptAction::PlaceText { x, y, text } => {
            session.place_text(Point::new(*x, *y), text)?;
        }
        ScriptAction::Select { x, y } => {
            session.select_at(Point::new(*x, *y));
        }
        ScriptAction::ClearSelection => session.clear_selection(),
        ScriptAction::DeleteSelected => {
            session.delete_selected()?;
        }
        ScriptAction::SetStrokeColor { color } => session.set_stroke_color(parse_color(color)?)?,
        ScriptAction::SetFill { color } => {
            let fill = match color {
                Some(color) => Fill::Solid { color: parse_color(color)? },
                None => Fill::None,
            };
            session.set_fill(fill)?;
        }
        ScriptAction::ApplyMaterial { material } => {
            let material = Material::from_key(material)
                .with_context(|| format!("unknown material {material:?}"))?;
            session.apply_material(material)?;
        }
        ScriptAction::Rotate { angle, snap } => {
            session.rotate_selected(*angle, *snap)?;
        }
        ScriptAction::Undo => {
            session.undo();
        }
        ScriptAction::Redo => {
            session.redo();
        }
    }
    Ok(())
}

fn run_config(data_dir: Option<&Path>, save: bool) -> Result<()> {
    let storage = open_storage(data_dir)?;
    let config = storage
        .load_config()
        .context("failed to load saved config")?
        .with_env_overrides()
        .context("invalid configuration override")?;

    if save {
        storage.save_config(&config).context("failed to save config")?;
    }

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_projects(data_dir: Option<&Path>) -> Result<()> {
    for name in open_storage(data_dir)?.list_projects()? {
        println!("{name}");
    }
    Ok(())
}

fn run_export(
    data_dir: Option<&Path>,
    name: &str,
    output: Option<&Path>,
    csv: Option<&Path>,
) -> Result<()> {
    let project = open_storage(data_dir)?
        .load_project(name)
        .with_context(|| format!("failed to load project {name}"))?;

    let mut session = EditorSession::new(load_config(data_dir)?);
    session.import_json(&project.scene.to_json()?)?;
    session.set_scale_factor(project.scale_factor, &project.unit)?;

    let json = session.export_json()?;
    match output {
        Some(output) => write_file(output, json.as_bytes())?,
        None => println!("{json}"),
    }
    if let Some(csv) = csv {
        write_quantities(csv, &session)?;
    }
    Ok(())
}

fn open_storage(data_dir: Option<&Path>) -> Result<Storage> {
    match data_dir {
        Some(dir) => Ok(Storage::with_root(dir)),
        None => Storage::from_default_project().context("failed to locate data directory"),
    }
}

/// Saved config with environment overrides, or plain defaults plus overrides
/// when no data dir can be resolved
fn load_config(data_dir: Option<&Path>) -> Result<EditorConfig> {
    let base = match open_storage(data_dir) {
        Ok(storage) => storage.load_config().context("failed to load saved config")?,
        Err(error) => match error.downcast_ref::<StorageError>() {
            Some(StorageError::NoDataDirectory) => EditorConfig::default(),
            _ => return Err(error),
        },
    };
    base.with_env_overrides().context("invalid configuration override")
}

fn write_quantities(path: &Path, session: &EditorSession) -> Result<()> {
    let mut bytes = Vec::new();
    export_quantities_csv(
        &mut bytes,
        session.scene(),
        session.calibration(),
        &CsvExportConfig::default(),
    )
    .context("failed to export quantities")?;
    write_file(path, &bytes)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    ensure_file_exists(path)?;
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path.to_string_lossy();
    takeoff_core::ensure_pdf(&name, &bytes)?;
    Ok(bytes)
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-1.png"))
}

fn parse_point_arg(value: &str) -> Result<Point, String> {
    let (x, y) = value.split_once(',').ok_or_else(|| format!("expected x,y but got {value:?}"))?;
    let coordinate = |text: &str| {
        text.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid coordinate {text:?}"))
    };
    Ok(Point::new(coordinate(x)?, coordinate(y)?))
}

fn parse_color(value: &str) -> Result<Color> {
    Color::from_hex(value).with_context(|| format!("invalid color {value:?}, expected #rrggbb"))
}
