use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use photomark::{
    Config, ExportFormat, ExportSpec, FontResolver, Session, TemplateStore, WatermarkKind,
    startup_checks, template::TemplateRecord,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watermark and export images using the last session settings
    Apply {
        /// JPEG or PNG images to process
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Load a saved template before applying overrides
        #[arg(short, long)]
        template: Option<String>,

        /// Use a text watermark with this text
        #[arg(long, conflicts_with = "overlay")]
        text: Option<String>,

        /// Use an image watermark from this file
        #[arg(long)]
        overlay: Option<PathBuf>,

        #[arg(short, long)]
        format: Option<ExportFormat>,

        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,

        /// Write into this directory instead of next to each source
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Manage saved templates
    #[command(subcommand)]
    Template(TemplateCommands),

    /// Show which font file a family name resolves to
    Font {
        family: String,

        #[arg(long, default_value_t = 36)]
        size: u32,

        #[arg(long)]
        bold: bool,

        #[arg(long)]
        italic: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// List all templates
    List,
    /// Print a template's settings
    Show { name: String },
    /// Save the current session settings as a template
    Save { name: String },
    /// Delete a template
    Delete { name: String },
    /// Rename a template
    Rename { old_name: String, new_name: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set up logging first
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = if cli.config.exists() {
        let config_content = std::fs::read_to_string(&cli.config)?;
        toml_edit::de::from_str::<Config>(&config_content)?
    } else {
        info!("Config file not found at {:?}, using defaults", cli.config);
        Config::default()
    };

    match startup_checks::perform_startup_checks(&config) {
        Ok(()) => info!("All startup checks passed"),
        Err(errors) => {
            for error in &errors {
                tracing::warn!("Startup check failed: {}", error);
            }
            if errors.iter().any(|e| e.is_critical()) {
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            }
        }
    }

    match cli.command {
        Commands::Apply {
            images,
            template,
            text,
            overlay,
            format,
            quality,
            out_dir,
        } => run_apply(
            &config,
            ApplyOptions {
                images,
                template,
                text,
                overlay,
                format,
                quality,
                out_dir,
            },
        ),
        Commands::Template(cmd) => handle_template_command(&config, cmd),
        Commands::Font {
            family,
            size,
            bold,
            italic,
        } => {
            let mut resolver = FontResolver::from_config(&config.fonts);
            let handle = resolver.resolve(&family, size, bold, italic);
            match handle.source() {
                Some(path) => println!("{} -> {}", family, path.display()),
                None => println!("{} -> built-in font", family),
            }
            Ok(())
        }
    }
}

struct ApplyOptions {
    images: Vec<PathBuf>,
    template: Option<String>,
    text: Option<String>,
    overlay: Option<PathBuf>,
    format: Option<ExportFormat>,
    quality: Option<u8>,
    out_dir: Option<PathBuf>,
}

fn run_apply(config: &Config, options: ApplyOptions) -> Result<(), Box<dyn std::error::Error>> {
    let now = Instant::now();
    let mut session = Session::from_config(config);

    if let Some(name) = &options.template {
        session.apply_template(name, now)?;
    }

    let mut watermark = session.watermark().clone();
    if let Some(text) = options.text {
        watermark.kind = WatermarkKind::Text;
        watermark.text = text;
    }
    if let Some(overlay) = options.overlay {
        watermark.kind = WatermarkKind::Image;
        watermark.overlay.path = Some(overlay);
    }
    if let Err(e) = session.set_watermark(watermark, now) {
        eprintln!("Warning: could not save session settings: {}", e);
    }

    let export = ExportSpec {
        format: options.format.unwrap_or(session.export_spec().format),
        quality: options.quality.unwrap_or(session.export_spec().quality),
        ..session.export_spec().clone()
    };
    if let Err(e) = session.set_export(export) {
        eprintln!("Warning: could not save session settings: {}", e);
    }

    let rejected = session.add_images(options.images, now);
    for path in &rejected {
        eprintln!("Skipping {}: not a supported image format", path.display());
    }

    let mut failures = 0;
    for path in session.images().to_vec() {
        let result = match &options.out_dir {
            Some(dir) => session.export_to(&path, dir),
            None => session.export(&path),
        };
        match result {
            Ok(output) => println!("{} -> {}", path.display(), output.display()),
            Err(e) => {
                eprintln!("Failed to export {}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    session.shutdown()?;

    if failures > 0 || !rejected.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn handle_template_command(
    config: &Config,
    cmd: TemplateCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = TemplateStore::from_config(&config.storage);

    match cmd {
        TemplateCommands::List => {
            let names = store.list()?;
            if names.is_empty() {
                println!("No templates saved");
            } else {
                println!("Templates:");
                for name in names {
                    println!("  {}", name);
                }
            }
        }
        TemplateCommands::Show { name } => {
            let (watermark, export) = store.load(&name)?;
            let record = TemplateRecord::from_specs(&name, &watermark, &export);
            print!("{}", toml_edit::ser::to_document(&record)?);
        }
        TemplateCommands::Save { name } => {
            let settings = store.load_session();
            store.save(&name, &settings.watermark, &settings.export)?;
            println!("Saved template '{}'", name);
        }
        TemplateCommands::Delete { name } => {
            store.delete(&name)?;
            println!("Deleted template '{}'", name);
        }
        TemplateCommands::Rename { old_name, new_name } => {
            store.rename(&old_name, &new_name)?;
            println!("Renamed template '{}' to '{}'", old_name, new_name);
        }
    }

    Ok(())
}
