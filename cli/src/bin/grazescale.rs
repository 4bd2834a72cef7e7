use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use grazescale::{
    Analysis, LivestockAnalyzer, LivestockDetector, PrecomputedMaskDetector, Species,
};
use grazescale_cli::{CliConfig, CliError};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure the animal in a photo and print the result as JSON
    Analyze {
        /// Path to the photo
        #[arg(short, long)]
        image: PathBuf,
        /// Real-world area of the reference object; enables cm and weight fields
        #[arg(short, long)]
        reference_area: Option<f64>,
        /// TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Precomputed segmentation mask (same size as the photo)
        #[arg(long)]
        mask: Option<PathBuf>,
        /// Species label for the precomputed mask
        #[arg(long, default_value = "cow")]
        species: String,
        /// Confidence attached to the precomputed mask
        #[arg(long, default_value = "1.0")]
        confidence: f32,
        /// YOLOv8-seg ONNX model (overrides the config's [model] path)
        #[arg(long)]
        model: Option<PathBuf>,
        /// Minimum detection confidence (overrides the config value)
        #[arg(long)]
        confidence_threshold: Option<f32>,
        /// Also write the measured outline as GeoJSON
        #[arg(long)]
        outline: Option<PathBuf>,
        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },
    /// Print the JSON schema of the analysis output
    Schema {
        /// Print the configuration file schema instead
        #[arg(long)]
        config: bool,
    },
    /// List the species the analyzer accepts
    Species,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            image,
            reference_area,
            config,
            mask,
            species,
            confidence,
            model,
            confidence_threshold,
            outline,
            pretty,
        } => {
            let mut config = match config {
                Some(path) => CliConfig::from_file(&path)?,
                None => CliConfig::default(),
            };
            if let Some(threshold) = confidence_threshold {
                config.analyzer.confidence_threshold = threshold;
            }
            let reference = config.reference_area(reference_area)?;

            let detector = build_detector(&config, mask.as_deref(), &species, confidence, model)?;
            let analyzer = LivestockAnalyzer::from_config(detector, &config.analyzer);

            info!(path = %image.display(), calibrated = reference.is_some(), "analyzing photo");
            let report = analyzer.analyze_file_detailed(&image, reference)?;
            if let Some(path) = outline {
                report.save_geojson(&path)?;
                info!(path = %path.display(), "wrote outline");
            }
            print_json(&report.analysis, pretty)?;
        }
        Commands::Schema { config } => {
            let schema = if config {
                serde_json::to_value(schemars::schema_for!(CliConfig))?
            } else {
                serde_json::to_value(Analysis::schema())?
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::Species => {
            for name in Species::names() {
                let species = Species::parse(name)?;
                println!("{name}\t(COCO class {})", species.coco_class());
            }
        }
    }

    Ok(())
}

fn build_detector(
    config: &CliConfig,
    mask: Option<&Path>,
    species: &str,
    confidence: f32,
    model: Option<PathBuf>,
) -> Result<Box<dyn LivestockDetector>, CliError> {
    if let Some(mask) = mask {
        let species = Species::parse(species)?;
        info!(path = %mask.display(), %species, "using precomputed mask");
        return Ok(Box::new(PrecomputedMaskDetector::from_path(mask, species, confidence)?));
    }

    let model_config = match model {
        Some(path) => {
            let mut model_config = config.analyzer.model.clone().unwrap_or_else(|| grazescale::ModelConfig {
                path: path.clone(),
                inference: Default::default(),
            });
            model_config.path = path;
            Some(model_config)
        }
        None => config.analyzer.model.clone(),
    };

    match model_config {
        #[cfg(feature = "onnx")]
        Some(model_config) => Ok(Box::new(grazescale::YoloSegDetector::new(
            &model_config.path,
            model_config.inference,
        )?)),
        #[cfg(not(feature = "onnx"))]
        Some(model_config) => {
            tracing::warn!(path = %model_config.path.display(), "built without the `onnx` feature, model ignored");
            Err(CliError::NoDetector)
        }
        None => Err(CliError::NoDetector),
    }
}

fn print_json(analysis: &Analysis, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(analysis)?
    } else {
        serde_json::to_string(analysis)?
    };
    println!("{output}");
    Ok(())
}
