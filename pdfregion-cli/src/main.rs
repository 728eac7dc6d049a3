use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use pdfregion_core::config::project_dirs;
use pdfregion_core::{
    open_document, write_json, write_xlsx, AppConfig, Command, DocumentProvider, DocumentSet,
    ExportFormat, PointerPos, Session,
};
use pdfregion_render::PdfiumProvider;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "pdfregion",
    version,
    about = "Extract the text under rectangular regions of PDF pages"
)]
struct Args {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the pdfium shared library
    #[arg(long, global = true)]
    pdfium: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// List PDFs (folders are expanded) with their page counts
    Info {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Render one page to PNG at the selection coordinate scale
    Render {
        file: PathBuf,
        /// Page to render (0-based)
        #[arg(short, long, default_value_t = 0)]
        page: usize,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the text under one or more regions of a document
    Extract {
        file: PathBuf,
        /// Region as PAGE:X1,Y1,X2,Y2 in rendered-page pixels (page is 0-based)
        #[arg(short = 's', long = "select", required = true)]
        selections: Vec<RegionArg>,
    },
    /// Mark regions on a template, copy them to every PDF in a folder and
    /// export the extracted text as a table
    Export {
        folder: PathBuf,
        /// Document the regions are drawn on
        #[arg(short, long)]
        template: PathBuf,
        /// Region as PAGE:X1,Y1,X2,Y2 in rendered-page pixels (page is 0-based)
        #[arg(short = 's', long = "select", required = true)]
        selections: Vec<RegionArg>,
        /// Output file; `-` writes JSON to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        format: Option<ExportFormat>,
        /// Only export the template's own regions
        #[arg(long)]
        no_sync: bool,
    },
}

/// A region given on the command line, replayed as a pointer drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RegionArg {
    page: usize,
    from: PointerPos,
    to: PointerPos,
}

impl FromStr for RegionArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (page, coords) = s
            .split_once(':')
            .ok_or_else(|| format!("expected PAGE:X1,Y1,X2,Y2, got `{s}`"))?;
        let page = page
            .trim()
            .parse()
            .map_err(|_| format!("invalid page `{page}`"))?;
        let values = coords
            .split(',')
            .map(|v| v.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| format!("invalid coordinates `{coords}`"))?;
        let &[x1, y1, x2, y2] = values.as_slice() else {
            return Err(format!("expected four coordinates, got {}", values.len()));
        };
        Ok(Self {
            page,
            from: PointerPos::new(x1, y1),
            to: PointerPos::new(x2, y2),
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let dirs =
        project_dirs().ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&dirs, &config.log_filter)?;

    let library = args.pdfium.as_deref().or(config.pdfium_library.as_deref());
    let provider = PdfiumProvider::new(library)?;

    match args.command {
        CliCommand::Info { paths } => run_info(&provider, &paths),
        CliCommand::Render { file, page, output } => run_render(&provider, &file, page, &output),
        CliCommand::Extract { file, selections } => run_extract(&provider, &file, &selections),
        CliCommand::Export {
            folder,
            template,
            selections,
            output,
            format,
            no_sync,
        } => {
            let format = format.unwrap_or(config.export_format);
            let output = output.unwrap_or_else(|| default_output(format));
            run_export(
                &provider,
                &folder,
                &template,
                &selections,
                &output,
                format,
                !no_sync,
            )
        }
    }
}

fn run_info(provider: &PdfiumProvider, paths: &[PathBuf]) -> Result<()> {
    let mut documents = DocumentSet::new();
    for path in paths {
        if path.is_dir() {
            let mut folder = DocumentSet::new();
            folder.load_folder(path)?;
            documents.add_files(folder.paths().map(Path::to_path_buf));
        } else {
            documents.add_files([path.clone()]);
        }
    }

    let mut stdout = io::stdout().lock();
    for doc in documents.iter() {
        match open_document(provider, &doc.path) {
            Ok(backend) => {
                let info = backend.info();
                let title = info.metadata.title.as_deref().unwrap_or("-");
                writeln!(
                    stdout,
                    "{}\t{} pages\t{}\t{}",
                    doc.name,
                    info.page_count(),
                    title,
                    doc.path.display()
                )?;
            }
            Err(err) => writeln!(stdout, "{}\tunreadable: {}", doc.name, err)?,
        }
    }
    Ok(())
}

fn run_render(provider: &PdfiumProvider, file: &Path, page: usize, output: &Path) -> Result<()> {
    let backend = open_document(provider, file)?;
    let rendered = backend.render_page(page)?;
    let (width, height) = (rendered.width, rendered.height);
    let image = image::RgbaImage::from_raw(width, height, rendered.pixels)
        .ok_or_else(|| anyhow!("renderer returned a truncated bitmap"))?;
    image
        .save(output)
        .with_context(|| format!("failed to write {:?}", output))?;
    info!(width, height, output = %output.display(), "rendered page");
    Ok(())
}

fn run_extract(provider: &PdfiumProvider, file: &Path, regions: &[RegionArg]) -> Result<()> {
    let mut session = Session::new();
    session.apply(
        provider,
        Command::AddFiles {
            paths: vec![file.to_path_buf()],
        },
    )?;
    let index = session
        .documents()
        .position(file)
        .ok_or_else(|| anyhow!("{:?} is not a PDF", file))?;
    session.apply(provider, Command::ActivateDocument { index })?;
    draw_regions(&mut session, provider, regions)?;

    let preview = session.preview(provider)?;
    if preview.is_empty() {
        eprintln!("no text found under the given regions");
    } else {
        println!("{preview}");
    }
    Ok(())
}

fn run_export(
    provider: &PdfiumProvider,
    folder: &Path,
    template: &Path,
    regions: &[RegionArg],
    output: &Path,
    format: ExportFormat,
    sync: bool,
) -> Result<()> {
    check_output(output, format)?;
    let folder = folder
        .canonicalize()
        .with_context(|| format!("failed to resolve folder {:?}", folder))?;
    let template = template
        .canonicalize()
        .with_context(|| format!("failed to resolve template {:?}", template))?;

    let mut session = Session::new();
    session.apply(provider, Command::LoadFolder { path: folder })?;
    session.apply(
        provider,
        Command::AddFiles {
            paths: vec![template.clone()],
        },
    )?;
    let index = session
        .documents()
        .position(&template)
        .ok_or_else(|| anyhow!("template {:?} is not a PDF", template))?;
    session.apply(provider, Command::ActivateDocument { index })?;
    draw_regions(&mut session, provider, regions)?;

    if sync {
        if let Some(report) = session.sync(provider) {
            for skipped in &report.skipped {
                eprintln!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            info!(
                appended = report.total_appended(),
                dropped = report.dropped,
                "regions copied to folder"
            );
        }
    }

    let report = session.export(provider);
    for skipped in &report.skipped {
        eprintln!("not exported {}: {}", skipped.path.display(), skipped.reason);
    }
    if report.failed_selections > 0 {
        warn!(
            count = report.failed_selections,
            "some regions could not be read and were left empty"
        );
    }
    if report.table.is_empty() {
        eprintln!("nothing to export");
        return Ok(());
    }

    match format {
        ExportFormat::Xlsx => write_xlsx(&report.table, output)?,
        ExportFormat::Json if output == Path::new("-") => {
            write_json(&report.table, io::stdout().lock())?;
            println!();
        }
        ExportFormat::Json => {
            let file = File::create(output)
                .with_context(|| format!("failed to create {:?}", output))?;
            let mut writer = BufWriter::new(file);
            write_json(&report.table, &mut writer)?;
            writer.flush()?;
        }
    }
    if output != Path::new("-") {
        eprintln!(
            "exported {} documents to {}",
            report.table.rows().len(),
            output.display()
        );
    }
    Ok(())
}

/// Replays each region as press/move/release on its page of the active
/// document. The display surface is never resized here, so pointer positions
/// are page pixels.
fn draw_regions<P>(session: &mut Session, provider: &P, regions: &[RegionArg]) -> Result<()>
where
    P: DocumentProvider + ?Sized,
{
    for region in regions {
        session.apply(provider, Command::GotoPage { page: region.page })?;
        if session.current_page() != Some(region.page) {
            bail!(
                "page {} does not exist in {:?}",
                region.page,
                session.active().map(|info| &info.path)
            );
        }
        session.apply(provider, Command::PointerPressed { pos: region.from })?;
        session.apply(provider, Command::PointerMoved { pos: region.to })?;
        session.apply(provider, Command::PointerReleased { pos: region.to })?;
    }
    session.take_events();
    Ok(())
}

/// Only JSON can be streamed; `-` is rejected for workbooks.
fn check_output(output: &Path, format: ExportFormat) -> Result<()> {
    if output == Path::new("-") && format != ExportFormat::Json {
        bail!("cannot write {} to stdout; pass a file with --output", format);
    }
    Ok(())
}

fn default_output(format: ExportFormat) -> PathBuf {
    PathBuf::from(format!("selections.{}", format.extension()))
}

fn init_logging(project_dirs: &ProjectDirs, default_filter: &str) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "pdfregion.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
