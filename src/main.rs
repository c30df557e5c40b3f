use clap::{Parser, ValueEnum};
use kurbo::Affine;
use std::fmt::Write as _;
use std::path::PathBuf;
use vectorize::{PathSet, Settings, TracingConfig, TurnPolicy};

#[derive(Parser)]
#[command(name = "vectorize", about = "Bitmap image to closed line/bezier outlines")]
struct Cli {
    /// Input image path (PNG, JPEG, BMP, GIF, TIFF)
    #[arg(short, long)]
    input: PathBuf,

    /// Output SVG path (summary only if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file: read before tracing, updated after a successful run
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Brightness threshold (0.0–1.0). 0 keeps everything darker than white.
    #[arg(long)]
    threshold: Option<f64>,

    /// How to resolve pixels that touch only at a corner
    #[arg(long, value_enum)]
    turn_policy: Option<PolicyArg>,

    /// Seed for the random turn policy
    #[arg(long)]
    seed: Option<u64>,

    /// Filter speckles of up to this size in pixels (0–100)
    #[arg(long)]
    filter_size: Option<u32>,

    /// Corner rounding threshold (0.0–1.34). 0 = polygon, 1.34 = no corners.
    #[arg(long)]
    corner_rounding: Option<f64>,

    /// Keep every smooth segment instead of merging runs of curves
    #[arg(long)]
    no_optimizing: bool,

    /// Curve merging tolerance in pixels (0.0–1.0]
    #[arg(long)]
    tolerance: Option<f64>,

    /// Do not add the image frame as a border rectangle
    #[arg(long)]
    no_border: bool,

    /// Scale factor applied to the SVG output
    #[arg(long, default_value = "1.0")]
    scale: f64,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Black,
    White,
    Left,
    Right,
    Minority,
    Majority,
    Random,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let stored = match &cli.settings {
        Some(path) if path.exists() => Settings::load(path)?,
        _ => Settings::default(),
    };
    let config = apply_flags(stored.to_config()?, &cli);
    let include_border = !cli.no_border && stored.include_border();

    let image = image::open(&cli.input)?.to_rgba8();
    tracing::info!("Input       {} ({}x{} px)", cli.input.display(), image.width(), image.height());

    let mut paths = vectorize::trace(&image, &config)?;
    if include_border {
        paths = paths.with_border(image.width(), image.height());
    }

    if let Some(out) = &cli.output {
        let svg = to_svg(&paths, image.width(), image.height(), cli.scale, include_border)?;
        std::fs::write(out, svg)?;
        tracing::info!("Output      {}", out.display());
    }

    if let Some(path) = &cli.settings {
        Settings::from_config(&config, include_border).save(path)?;
    }
    Ok(())
}

/// Command-line flags override stored settings.
fn apply_flags(mut config: TracingConfig, cli: &Cli) -> TracingConfig {
    if let Some(t) = cli.threshold {
        config.threshold = t;
    }
    let seed = cli.seed.or(match config.turn_policy {
        TurnPolicy::Random { seed } => Some(seed),
        _ => None,
    });
    if let Some(policy) = cli.turn_policy {
        config.turn_policy = match policy {
            PolicyArg::Black => TurnPolicy::Black,
            PolicyArg::White => TurnPolicy::White,
            PolicyArg::Left => TurnPolicy::Left,
            PolicyArg::Right => TurnPolicy::Right,
            PolicyArg::Minority => TurnPolicy::Minority,
            PolicyArg::Majority => TurnPolicy::Majority,
            PolicyArg::Random => TurnPolicy::Random { seed: seed.unwrap_or(0) },
        };
    } else if let (TurnPolicy::Random { .. }, Some(seed)) = (config.turn_policy, cli.seed) {
        config.turn_policy = TurnPolicy::Random { seed };
    }
    if let Some(size) = cli.filter_size {
        config.speckle_area_min = size;
    }
    if let Some(alpha) = cli.corner_rounding {
        config.corner_threshold = alpha;
    }
    if cli.no_optimizing {
        config.curve_optimizing = false;
    }
    if let Some(tol) = cli.tolerance {
        config.opt_tolerance = tol;
    }
    config
}

/// One filled compound path for the traced outlines (non-zero winding),
/// plus the border as an unfilled rectangle when present.
fn to_svg(
    paths: &PathSet,
    width: u32,
    height: u32,
    scale: f64,
    has_border: bool,
) -> Result<String, std::fmt::Error> {
    let transform = Affine::scale(scale);
    let bez = paths.to_bezpaths(transform);
    let (outlines, border) = if has_border && !bez.is_empty() {
        (&bez[1..], Some(&bez[0]))
    } else {
        (&bez[..], None)
    };

    let mut svg = String::new();
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width as f64 * scale,
        h = height as f64 * scale,
    )?;
    if let Some(border) = border {
        writeln!(svg, r#"  <path d="{}" fill="none" stroke="black"/>"#, border.to_svg())?;
    }
    let d: Vec<String> = outlines.iter().map(|p| p.to_svg()).collect();
    writeln!(svg, r#"  <path d="{}" fill="black" fill-rule="nonzero"/>"#, d.join(" "))?;
    writeln!(svg, "</svg>")?;
    Ok(svg)
}
