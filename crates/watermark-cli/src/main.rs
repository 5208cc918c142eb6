//! Command-line interface for batch text watermarking

mod io;
mod storage;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use watermark_core::{
    init, version, AnchorPreset, AppConfig, BatchExporter, Compositor, ConfigManager, ConfigStore,
    EditorSession, FontChain, Position, Rgb, SpecDelta,
};

use crate::io::{discover_images, FileImageSink, FileImageSource, SUPPORTED_EXTENSIONS};
use crate::storage::JsonTemplateFile;

#[derive(Parser)]
#[command(name = "watermark")]
#[command(about = "Batch text watermarking with per-image settings and templates")]
#[command(version = version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Template file path (overrides the configured one)
    #[arg(long, global = true)]
    templates: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watermark an image or every image in a folder
    Apply {
        /// Input image or folder
        #[arg(short, long)]
        input: PathBuf,

        /// Output folder
        #[arg(short, long)]
        output: PathBuf,

        /// Start from a saved template
        #[arg(short, long)]
        template: Option<String>,

        /// Place the text at a named anchor (e.g. bottom-right)
        #[arg(short, long)]
        anchor: Option<AnchorPreset>,

        /// Suffix appended to output file names
        #[arg(long, allow_hyphen_values = true)]
        suffix: Option<String>,

        /// JPEG quality (1-100)
        #[arg(short, long)]
        quality: Option<u8>,

        #[command(flatten)]
        spec: SpecArgs,
    },

    /// Render the downscaled preview of a single image
    Preview {
        /// Input image
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the preview frame
        #[arg(short, long)]
        output: PathBuf,

        /// Start from a saved template
        #[arg(short, long)]
        template: Option<String>,

        /// Place the text at a named anchor (e.g. bottom-right)
        #[arg(short, long)]
        anchor: Option<AnchorPreset>,

        /// Preview viewport as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        viewport: Option<(u32, u32)>,

        #[command(flatten)]
        spec: SpecArgs,
    },

    /// Manage saved templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Show version, configuration and font information
    Info,
}

#[derive(Subcommand)]
enum TemplateAction {
    /// Save the configured default spec, with overrides, as a template
    Save {
        name: String,

        #[command(flatten)]
        spec: SpecArgs,
    },
    /// List saved templates
    List,
    /// Print a template as JSON
    Show { name: String },
    /// Delete a template
    Delete { name: String },
}

/// Watermark settings that override the configured or template values
#[derive(Args, Debug, Default, Clone)]
struct SpecArgs {
    /// Watermark text
    #[arg(long)]
    text: Option<String>,

    /// Font size in pixels
    #[arg(long)]
    font_size: Option<u32>,

    /// Text color as #RRGGBB
    #[arg(long)]
    color: Option<Rgb>,

    /// Opacity in percent (0-100)
    #[arg(long)]
    opacity: Option<u8>,

    /// Top-left of the text as X,Y in original image pixels
    #[arg(long, value_parser = parse_position)]
    position: Option<Position>,

    /// Rotation in degrees, counter-clockwise (-180..180)
    #[arg(long, allow_hyphen_values = true)]
    rotation: Option<i32>,
}

impl SpecArgs {
    fn deltas(&self) -> Vec<SpecDelta> {
        let mut deltas = Vec::new();
        if let Some(text) = &self.text {
            deltas.push(SpecDelta::SetText(text.clone()));
        }
        if let Some(size) = self.font_size {
            deltas.push(SpecDelta::SetFontSize(size));
        }
        if let Some(color) = self.color {
            deltas.push(SpecDelta::SetColor(color));
        }
        if let Some(opacity) = self.opacity {
            deltas.push(SpecDelta::SetOpacity(opacity));
        }
        if let Some(position) = self.position {
            deltas.push(SpecDelta::SetPosition(position));
        }
        if let Some(rotation) = self.rotation {
            deltas.push(SpecDelta::SetRotation(rotation));
        }
        deltas
    }
}

fn parse_position(value: &str) -> std::result::Result<Position, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", value))?;
    let x = x.trim().parse().map_err(|e| format!("invalid x: {}", e))?;
    let y = y.trim().parse().map_err(|e| format!("invalid y: {}", e))?;
    Ok(Position::new(x, y))
}

fn parse_size(value: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT but got '{}'", value))?;
    let w = w.trim().parse().map_err(|e| format!("invalid width: {}", e))?;
    let h = h.trim().parse().map_err(|e| format!("invalid height: {}", e))?;
    Ok((w, h))
}

/// Everything a command needs from configuration
struct CommandContext {
    config: AppConfig,
    config_path: PathBuf,
    templates_file: PathBuf,
}

impl CommandContext {
    fn load(cli: &Cli) -> Result<Self> {
        let manager = match &cli.config {
            Some(path) => ConfigManager::with_path(path.clone()),
            None => ConfigManager::new(),
        }
        .context("Failed to load configuration")?;

        let config = manager.config().clone();
        let templates_file = cli
            .templates
            .clone()
            .unwrap_or_else(|| config.storage.templates_file.clone());

        Ok(Self {
            config,
            config_path: manager.config_path().clone(),
            templates_file,
        })
    }

    fn store(&self) -> Result<ConfigStore> {
        let storage = JsonTemplateFile::open(&self.templates_file).with_context(|| {
            format!("Failed to open template file {}", self.templates_file.display())
        })?;
        Ok(ConfigStore::with_storage(
            self.config.watermark.clone(),
            Box::new(storage),
        ))
    }

    fn compositor(&self) -> Compositor {
        Compositor::new(FontChain::from_config(&self.config.fonts))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CommandContext::load(&cli)?;

    let level = if cli.verbose {
        "debug"
    } else {
        context.config.logging.level.as_str()
    };
    init(level)?;

    info!("Watermark CLI v{} starting", version());

    match cli.command {
        Commands::Apply {
            input,
            output,
            template,
            anchor,
            suffix,
            quality,
            spec,
        } => {
            run_apply(&context, &input, output, template, anchor, suffix, quality, &spec).await
        }

        Commands::Preview {
            input,
            output,
            template,
            anchor,
            viewport,
            spec,
        } => run_preview(&context, &input, &output, template, anchor, viewport, &spec),

        Commands::Template { action } => run_template(&context, action),

        Commands::Info => {
            println!("Watermark v{}", version());
            println!("Batch text watermarking tool");
            println!("\nConfiguration:");
            println!("  Config file: {}", context.config_path.display());
            println!("  Template file: {}", context.templates_file.display());
            println!(
                "  Preview viewport: {}x{}",
                context.config.preview.viewport_width, context.config.preview.viewport_height
            );
            println!("  JPEG quality: {}", context.config.export.jpeg_quality);
            println!("\nFonts:");
            let compositor = context.compositor();
            for name in compositor.fonts().provider_names() {
                println!("  Provider: {}", name);
            }
            println!(
                "  Default size resolves to: {}",
                compositor
                    .fonts()
                    .resolve(context.config.watermark.font_size_px)
                    .describe()
            );
            println!("\nSupported formats: {}", SUPPORTED_EXTENSIONS.join(", "));
            println!("Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
            Ok(())
        }
    }
}

/// Build a session holding `paths`, with template, overrides and anchor
/// applied to every image
fn prepare_session(
    context: &CommandContext,
    paths: &[PathBuf],
    template: Option<&str>,
    anchor: Option<AnchorPreset>,
    spec: &SpecArgs,
) -> Result<EditorSession> {
    let mut session = EditorSession::new(context.store()?, context.compositor());

    let images = paths.iter().map(|path| {
        let (width, height) = image::image_dimensions(path).unwrap_or_else(|e| {
            warn!("Could not read dimensions of {}: {}", path.display(), e);
            (0, 0)
        });
        (path.clone(), width, height)
    });
    let ids = session.import(images);

    if let Some(name) = template {
        session
            .apply_template_to_all(name)
            .with_context(|| format!("Failed to apply template '{}'", name))?;
    }

    let deltas = spec.deltas();
    for id in ids {
        session.select(id)?;
        for delta in &deltas {
            session.apply(delta.clone())?;
        }
        if let Some(anchor) = anchor {
            session.place_at_anchor(anchor)?;
        }
    }
    Ok(session)
}

#[allow(clippy::too_many_arguments)]
async fn run_apply(
    context: &CommandContext,
    input: &Path,
    output: PathBuf,
    template: Option<String>,
    anchor: Option<AnchorPreset>,
    suffix: Option<String>,
    quality: Option<u8>,
    spec: &SpecArgs,
) -> Result<()> {
    let paths = discover_images(input)
        .with_context(|| format!("Failed to read input {}", input.display()))?;
    if paths.is_empty() {
        bail!("No supported images found in {}", input.display());
    }

    let session = prepare_session(context, &paths, template.as_deref(), anchor, spec)?;
    let (batch, mut store, compositor) = session.into_parts();

    let suffix = suffix.unwrap_or_else(|| context.config.export.suffix.clone());
    let quality = quality.unwrap_or(context.config.export.jpeg_quality);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current image");
            interrupt.cancel();
        }
    });

    info!("Exporting {} images to {}", batch.len(), output.display());
    let summary = tokio::task::spawn_blocking(move || {
        let exporter = BatchExporter::with_cancellation(compositor, cancel);
        let mut source = FileImageSource;
        let mut sink = FileImageSink::new(output, suffix, quality);
        exporter.run(&batch, &mut store, &mut source, &mut sink, |progress| {
            println!("Exporting: {}/{}", progress.completed, progress.total);
        })
    })
    .await
    .context("Export task failed")?;

    for failure in &summary.failures {
        eprintln!("Failed: {} ({})", failure.source.display(), failure.error);
    }
    if summary.cancelled {
        println!(
            "Export cancelled: {} of {} images written",
            summary.succeeded, summary.total
        );
    } else {
        println!(
            "Export complete: {}/{} images succeeded",
            summary.succeeded, summary.total
        );
    }

    if !summary.failures.is_empty() {
        bail!("{} of {} images failed", summary.failures.len(), summary.total);
    }
    Ok(())
}

fn run_preview(
    context: &CommandContext,
    input: &Path,
    output: &Path,
    template: Option<String>,
    anchor: Option<AnchorPreset>,
    viewport: Option<(u32, u32)>,
    spec: &SpecArgs,
) -> Result<()> {
    let full = image::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let paths = [input.to_path_buf()];
    let mut session = prepare_session(context, &paths, template.as_deref(), anchor, spec)?;

    let (width, height) = viewport.unwrap_or((
        context.config.preview.viewport_width,
        context.config.preview.viewport_height,
    ));
    session.set_viewport(width, height);

    let Some(frame) = session.preview(&full)? else {
        bail!("Viewport {}x{} is too small to preview", width, height);
    };
    frame
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("{}", session.status_line());
    println!(
        "Preview {}x{} written to {}",
        frame.width(),
        frame.height(),
        output.display()
    );
    Ok(())
}

fn run_template(context: &CommandContext, action: TemplateAction) -> Result<()> {
    let mut store = context.store()?;

    match action {
        TemplateAction::Save { name, spec } => {
            let mut template = store.default_config();
            for delta in spec.deltas() {
                template = delta.apply(&template)?;
            }
            store.save_template(&name, &template)?;
            println!("Saved template '{}'", name.trim());
        }
        TemplateAction::List => {
            let names = store.list_templates();
            if names.is_empty() {
                println!("No templates saved");
            }
            for name in names {
                println!("{}", name);
            }
        }
        TemplateAction::Show { name } => {
            let Some(template) = store.template(&name) else {
                bail!("Template not found: {}", name);
            };
            let value = watermark_core::template::encode_spec(&template)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        TemplateAction::Delete { name } => {
            store.delete_template(&name)?;
            println!("Deleted template '{}'", name.trim());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["watermark", "info"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_apply_arguments() {
        let cli = Cli::try_parse_from([
            "watermark",
            "apply",
            "-i",
            "photos",
            "-o",
            "out",
            "--anchor",
            "bottom-right",
            "--text",
            "© 2024",
            "--color",
            "#00ff00",
            "--position",
            "10,20",
            "--rotation",
            "-45",
        ])
        .unwrap();

        let Commands::Apply { anchor, spec, .. } = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(anchor, Some(AnchorPreset::BottomRight));
        assert_eq!(
            spec.deltas(),
            vec![
                SpecDelta::SetText("© 2024".to_string()),
                SpecDelta::SetColor(Rgb::new(0, 255, 0)),
                SpecDelta::SetPosition(Position::new(10, 20)),
                SpecDelta::SetRotation(-45),
            ]
        );
    }

    #[test]
    fn test_value_parsers() {
        assert_eq!(parse_position("3, 4").unwrap(), Position::new(3, 4));
        assert!(parse_position("3").is_err());
        assert_eq!(parse_size("600x400").unwrap(), (600, 400));
        assert!(parse_size("600").is_err());
    }

    #[test]
    fn test_suffix_may_start_with_hyphen() {
        let cli = Cli::try_parse_from([
            "watermark", "apply", "-i", "a", "-o", "b", "--suffix", "-wm",
        ])
        .unwrap();

        let Commands::Apply { suffix, .. } = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(suffix.as_deref(), Some("-wm"));
    }

    #[test]
    fn test_bad_anchor_rejected() {
        let cli = Cli::try_parse_from(["watermark", "apply", "-i", "a", "-o", "b", "-a", "middle"]);
        assert!(cli.is_err());
    }
}
