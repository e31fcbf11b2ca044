use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use pdf_async_runtime::{Action, PdfCommand, PdfUpdate, ThumbnailSize, Worker, WorkbenchState};
use pdf_pages::{
    CompressionQuality, CropMargins, Engine, ImagePageOptions, NumberPosition, Operation, Orientation,
    OutcomeDetail, PageNumberOptions, PageSize, RasterFormat, RasterOptions, RotationAngle, SourceFile,
    WatermarkOptions, WatermarkPosition, format_file_size,
};
use std::path::{Path, PathBuf};

mod logger;

#[derive(Parser)]
#[command(name = "pdft", about = "PDF page tools CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory for output files
    #[arg(short, long, global = true, default_value = ".")]
    output_dir: PathBuf,

    /// Write the operation as a JSON job file instead of running it
    #[arg(long, global = true)]
    save_job: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine PDFs in the given order
    Merge {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,
    },

    /// One output per range, e.g. "1-3, 5, 8-10"
    SplitRanges { input: PathBuf, ranges: String },

    /// Copy the listed pages into a single file
    Extract { input: PathBuf, pages: String },

    /// Chunks of N pages
    SplitEvery {
        input: PathBuf,
        #[arg(short)]
        n: usize,
    },

    /// N files of near-equal length
    SplitInto {
        input: PathBuf,
        #[arg(short)]
        n: usize,
    },

    /// One file per page
    SplitAll { input: PathBuf },

    /// Rotate pages clockwise, on top of their current rotation
    Rotate {
        input: PathBuf,

        /// 90, 180, 270 or 360
        #[arg(long, default_value = "90")]
        angle: i64,

        /// Pages to rotate (default: all)
        #[arg(long)]
        pages: Option<String>,
    },

    /// Stamp translucent text on every page
    Watermark {
        input: PathBuf,

        #[arg(long)]
        text: String,

        #[arg(long, default_value = "0.3")]
        opacity: f32,

        /// Hex color
        #[arg(long, default_value = "#8B5CF6")]
        color: String,

        /// Font size in points (default: 8% of the shorter page side)
        #[arg(long)]
        font_size: Option<f32>,

        #[arg(long, default_value = "diagonal", value_enum)]
        position: WatermarkPositionArg,
    },

    /// Remove pages
    DeletePages { input: PathBuf, pages: String },

    /// Rebuild with pages in the given order, e.g. "3, 1-2"
    Reorder { input: PathBuf, order: String },

    /// Add page numbers
    Number {
        input: PathBuf,

        #[arg(long, default_value = "bottom-center", value_enum)]
        position: NumberPositionArg,

        /// Number printed on the first page
        #[arg(long, default_value = "1")]
        start: usize,

        #[arg(long, default_value = "12")]
        font_size: f32,

        /// Distance from the page edge in points
        #[arg(long, default_value = "30")]
        margin: f32,
    },

    /// Encrypt with a password (128-bit RC4)
    Protect {
        input: PathBuf,
        #[arg(long)]
        password: String,
    },

    /// One page per image
    ImagesToPdf {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        #[arg(long, default_value = "fit", value_enum)]
        page_size: PageSizeArg,

        #[arg(long, default_value = "portrait", value_enum)]
        orientation: OrientationArg,
    },

    /// Render each page to an image
    ToImages {
        input: PathBuf,

        #[arg(long, default_value = "png", value_enum)]
        format: RasterFormatArg,

        #[arg(long, default_value = "150")]
        dpi: f32,
    },

    /// Shrink the visible area by margins in points
    Crop {
        input: PathBuf,
        #[arg(long, default_value = "0")]
        left: f32,
        #[arg(long, default_value = "0")]
        bottom: f32,
        #[arg(long, default_value = "0")]
        right: f32,
        #[arg(long, default_value = "0")]
        top: f32,
    },

    /// Re-serialize with unused objects pruned and streams compressed
    Compress {
        input: PathBuf,
        #[arg(long, default_value = "medium", value_enum)]
        quality: QualityArg,
    },

    /// Page count, size and metadata
    Info { input: PathBuf },

    /// Run a JSON job file against the inputs
    Run {
        #[arg(long)]
        job: PathBuf,

        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
    },

    /// Load files into a collection and render their previews
    Thumbnails {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        #[arg(long, default_value = "medium", value_enum)]
        size: SizeArg,

        /// Write each preview as <name>_thumb.jpg into the output directory
        #[arg(long)]
        save: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum WatermarkPositionArg {
    Center,
    Diagonal,
}

#[derive(Clone, Copy, ValueEnum)]
enum NumberPositionArg {
    BottomCenter,
    BottomLeft,
    BottomRight,
    TopCenter,
    TopLeft,
    TopRight,
}

#[derive(Clone, Copy, ValueEnum)]
enum PageSizeArg {
    Fit,
    A4,
    Letter,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrientationArg {
    Portrait,
    Landscape,
}

#[derive(Clone, Copy, ValueEnum)]
enum RasterFormatArg {
    Png,
    Jpg,
}

#[derive(Clone, Copy, ValueEnum)]
enum QualityArg {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, ValueEnum)]
enum SizeArg {
    Small,
    Medium,
    Large,
}

impl From<WatermarkPositionArg> for WatermarkPosition {
    fn from(arg: WatermarkPositionArg) -> Self {
        match arg {
            WatermarkPositionArg::Center => Self::Center,
            WatermarkPositionArg::Diagonal => Self::Diagonal,
        }
    }
}

impl From<NumberPositionArg> for NumberPosition {
    fn from(arg: NumberPositionArg) -> Self {
        match arg {
            NumberPositionArg::BottomCenter => Self::BottomCenter,
            NumberPositionArg::BottomLeft => Self::BottomLeft,
            NumberPositionArg::BottomRight => Self::BottomRight,
            NumberPositionArg::TopCenter => Self::TopCenter,
            NumberPositionArg::TopLeft => Self::TopLeft,
            NumberPositionArg::TopRight => Self::TopRight,
        }
    }
}

impl From<PageSizeArg> for PageSize {
    fn from(arg: PageSizeArg) -> Self {
        match arg {
            PageSizeArg::Fit => Self::Fit,
            PageSizeArg::A4 => Self::A4,
            PageSizeArg::Letter => Self::Letter,
        }
    }
}

impl From<OrientationArg> for Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Portrait => Self::Portrait,
            OrientationArg::Landscape => Self::Landscape,
        }
    }
}

impl From<RasterFormatArg> for RasterFormat {
    fn from(arg: RasterFormatArg) -> Self {
        match arg {
            RasterFormatArg::Png => Self::Png,
            RasterFormatArg::Jpg => Self::Jpg,
        }
    }
}

impl From<QualityArg> for CompressionQuality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Low => Self::Low,
            QualityArg::Medium => Self::Medium,
            QualityArg::High => Self::High,
        }
    }
}

impl From<SizeArg> for ThumbnailSize {
    fn from(arg: SizeArg) -> Self {
        match arg {
            SizeArg::Small => Self::Small,
            SizeArg::Medium => Self::Medium,
            SizeArg::Large => Self::Large,
        }
    }
}

/// Translate a subcommand into an operation plus its input paths
async fn into_operation(command: Commands) -> Result<(Operation, Vec<PathBuf>)> {
    let job = match command {
        Commands::Merge { inputs } => (Operation::Merge, inputs),
        Commands::SplitRanges { input, ranges } => (Operation::SplitRanges { ranges }, vec![input]),
        Commands::Extract { input, pages } => (Operation::Extract { pages }, vec![input]),
        Commands::SplitEvery { input, n } => (Operation::SplitEvery { n }, vec![input]),
        Commands::SplitInto { input, n } => (Operation::SplitInto { n }, vec![input]),
        Commands::SplitAll { input } => (Operation::SplitAll, vec![input]),
        Commands::Rotate { input, angle, pages } => (
            Operation::Rotate {
                angle: RotationAngle::from_degrees(angle)?,
                pages,
            },
            vec![input],
        ),
        Commands::Watermark {
            input,
            text,
            opacity,
            color,
            font_size,
            position,
        } => (
            Operation::Watermark(WatermarkOptions {
                text,
                opacity,
                color,
                font_size,
                position: position.into(),
            }),
            vec![input],
        ),
        Commands::DeletePages { input, pages } => (Operation::DeletePages { pages }, vec![input]),
        Commands::Reorder { input, order } => (Operation::Reorder { order }, vec![input]),
        Commands::Number {
            input,
            position,
            start,
            font_size,
            margin,
        } => (
            Operation::AddPageNumbers(PageNumberOptions {
                position: position.into(),
                start_number: start,
                font_size,
                margin,
            }),
            vec![input],
        ),
        Commands::Protect { input, password } => (Operation::Protect { password }, vec![input]),
        Commands::ImagesToPdf {
            inputs,
            page_size,
            orientation,
        } => (
            Operation::ImagesToPdf(ImagePageOptions {
                page_size: page_size.into(),
                orientation: orientation.into(),
            }),
            inputs,
        ),
        Commands::ToImages { input, format, dpi } => (
            Operation::PdfToImages(RasterOptions {
                format: format.into(),
                dpi,
            }),
            vec![input],
        ),
        Commands::Crop {
            input,
            left,
            bottom,
            right,
            top,
        } => (
            Operation::Crop(CropMargins {
                left,
                bottom,
                right,
                top,
            }),
            vec![input],
        ),
        Commands::Compress { input, quality } => (
            Operation::Compress {
                quality: quality.into(),
            },
            vec![input],
        ),
        Commands::Info { input } => (Operation::Info, vec![input]),
        Commands::Run { job, inputs } => {
            let operation = Operation::load(&job)
                .await
                .with_context(|| format!("Failed to load job {}", job.display()))?;
            (operation, inputs)
        }
        Commands::Thumbnails { .. } => bail!("Thumbnails is not a document operation"),
    };
    Ok(job)
}

fn build_engine() -> Engine {
    #[cfg(feature = "pdfium")]
    {
        Engine::new().with_rasterizer(std::sync::Arc::new(pdf_pages::PdfiumRasterizer::default()))
    }
    #[cfg(not(feature = "pdfium"))]
    {
        Engine::new()
    }
}

async fn run_operation(operation: Operation, inputs: Vec<PathBuf>, output_dir: &Path) -> Result<()> {
    let mut sources = Vec::with_capacity(inputs.len());
    for path in &inputs {
        let source = SourceFile::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        sources.push(source);
    }

    let name = operation.name();
    let outcome = build_engine().execute_async(operation, sources).await?;

    if !outcome.files.is_empty() {
        tokio::fs::create_dir_all(output_dir).await?;
    }
    for file in &outcome.files {
        let path = file.save_into(output_dir).await?;
        println!("{} → {}", name, path.display());
    }

    match outcome.detail {
        OutcomeDetail::None => {}
        OutcomeDetail::Deleted(count) => println!("Removed {} page(s)", count),
        OutcomeDetail::Compression(stats) => println!(
            "{} → {} ({:.1}% smaller)",
            format_file_size(stats.original_size as u64),
            format_file_size(stats.compressed_size as u64),
            stats.reduction_percent
        ),
        OutcomeDetail::Skipped(skipped) => {
            for asset in skipped {
                log::warn!("Skipped {}: {}", asset.name, asset.reason);
            }
        }
        OutcomeDetail::Info(info) => {
            println!("Pages: {}", info.page_count);
            println!("Size: {}", format_file_size(info.file_size as u64));
            for (label, value) in [
                ("Title", info.title),
                ("Author", info.author),
                ("Subject", info.subject),
                ("Creator", info.creator),
                ("Producer", info.producer),
            ] {
                if let Some(value) = value {
                    println!("{}: {}", label, value);
                }
            }
        }
    }
    Ok(())
}

async fn run_thumbnails(inputs: Vec<PathBuf>, size: ThumbnailSize, save: bool, output_dir: &Path) -> Result<()> {
    let (worker, mut updates) = Worker::spawn(build_engine());
    worker.send(PdfCommand::Workbench(Action::SetThumbnailSize(size)))?;
    worker.send(PdfCommand::AddFiles { paths: inputs })?;
    drop(worker);

    let mut last_state: Option<WorkbenchState> = None;
    while let Some(update) = updates.recv().await {
        match update {
            PdfUpdate::StateChanged { state, .. } => last_state = Some(state),
            PdfUpdate::Progress { current, total, .. } => log::info!("Rendered {}/{}", current, total),
            PdfUpdate::Error { message } => log::error!("{}", message),
            _ => {}
        }
    }

    let Some(state) = last_state else {
        bail!("No files could be loaded");
    };
    if save {
        tokio::fs::create_dir_all(output_dir).await?;
    }
    for entry in &state.files {
        match (&entry.thumbnail, &entry.error) {
            (Some(thumbnail), _) => {
                println!(
                    "{}\t{}\t{} page(s)\t{}x{}",
                    entry.name,
                    format_file_size(entry.size as u64),
                    entry.page_count,
                    thumbnail.width,
                    thumbnail.height
                );
                if save {
                    let path = output_dir.join(format!("{}_thumb.jpg", pdf_pages::base_name(&entry.name)));
                    tokio::fs::write(&path, thumbnail.jpeg.as_slice()).await?;
                }
            }
            (None, Some(error)) => println!("{}\terror: {}", entry.name, error),
            (None, None) => println!("{}\tpending", entry.name),
        }
    }
    println!(
        "{} file(s), {} page(s), {}",
        state.files.len(),
        state.total_pages(),
        format_file_size(state.total_size() as u64)
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::CliLogger::from_verbosity(cli.verbose).init()?;

    if let Commands::Thumbnails { inputs, size, save } = cli.command {
        return run_thumbnails(inputs, size.into(), save, &cli.output_dir).await;
    }

    let (operation, inputs) = into_operation(cli.command).await?;
    if let Some(job) = cli.save_job {
        operation.save(&job).await?;
        println!("Saved {} job → {}", operation.name(), job.display());
        return Ok(());
    }
    run_operation(operation, inputs, &cli.output_dir).await
}
