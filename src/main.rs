use clap::{Parser, Subcommand};
use picture_gen::config::{self, Config, effective_threads};
use picture_gen::generator::{VariantGenerator, delete_stale};
use picture_gen::imaging::{Quality, RustBackend};
use picture_gen::output::{self, ResolutionRecord};
use picture_gen::planner::{BreakpointPlanner, PlanError, find_sources, plan_sources};
use picture_gen::reconcile::{Reconciliation, desired_for_all, existing_outputs, reconcile};
use picture_gen::remote::{RemoteLister, RemoteSource, S3ObjectStore, create_s3_client};
use picture_gen::resolver::VariantResolver;
use picture_gen::source::{LocalSource, VariantLayout, VariantSource};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error>;

#[derive(Parser)]
#[command(name = "picture-gen")]
#[command(version)]
#[command(about = "Responsive image variants for static sites")]
#[command(long_about = "\
Responsive image variants for static sites

Every image below the static directory gets a ladder of resized copies,
written next to each other in a directory named after the image and a
hash of its contents:

  static/
  ├── img/dawn.jpg                      # Source (1000px wide)
  └── generated/
      └── dawn.1a2b3c4/
          ├── 400.jpg  400.webp
          ├── 600.jpg  600.webp
          ├── 800.jpg  800.webp
          └── 1000.jpg 1000.webp        # Native width is always included

'generate' creates what is missing and deletes what no source needs any
more. 'resolve' reports which variants exist for an image, from the local
tree or from an S3-compatible bucket, ready for <picture> srcset markup.

Run 'picture-gen gen-config' to generate a documented picture-gen.toml.")]
struct Cli {
    /// Config file
    #[arg(long, default_value = "picture-gen.toml", global = true)]
    config: PathBuf,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the variants available for source images
    Resolve {
        /// Source image paths
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Print JSON instead of srcset lines
        #[arg(long)]
        json: bool,
    },
    /// Show which variants would be created and deleted
    Plan,
    /// Generate missing variants and delete stale ones
    Generate {
        /// Leave stale variants in place
        #[arg(long)]
        keep_stale: bool,
    },
    /// Print a stock picture-gen.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, BoxError> {
    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
        Command::Resolve { images, json } => {
            let config = config::load_config(&cli.config)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(resolve_images(&config, images, json))
        }
        Command::Plan => {
            let config = config::load_config(&cli.config)?;
            let generator = build_generator(&config)?;
            let (sources, plan) = plan_variants(&config, &RustBackend::new(), &generator)?;
            output::print_plan(sources, &plan, &config.output_dir);
            Ok(ExitCode::SUCCESS)
        }
        Command::Generate { keep_stale } => {
            let config = config::load_config(&cli.config)?;
            generate(&config, keep_stale)
        }
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "picture_gen=debug"
    } else {
        "picture_gen=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_generator(config: &Config) -> Result<VariantGenerator, BoxError> {
    let threads = effective_threads(&config.processing);
    Ok(VariantGenerator::new(
        threads,
        Quality::new(config.formats.quality),
    )?)
}

/// Find, plan and reconcile every source image.
fn plan_variants(
    config: &Config,
    backend: &RustBackend,
    generator: &VariantGenerator,
) -> Result<(usize, Reconciliation), BoxError> {
    let layout = VariantLayout::from_config(config);
    let sources = find_sources(&layout)?;
    let planner = BreakpointPlanner::from_config(config);

    let planned = match generator.install(|| plan_sources(backend, &planner, &sources)) {
        Ok(planned) => planned,
        Err(PlanError::Sources(failures)) => {
            for failure in &failures {
                eprintln!("{}: {}", failure.path.display(), failure.message);
            }
            return Err(PlanError::Sources(failures).into());
        }
        Err(e) => return Err(e.into()),
    };

    let desired = desired_for_all(&planned, &layout.output_dir, config.formats.webp);
    let existing = existing_outputs(&layout.output_dir)?;
    let plan = reconcile(desired, &existing);
    info!(
        sources = planned.len(),
        create = plan.to_create.len(),
        delete = plan.to_delete.len(),
        "planned"
    );
    Ok((planned.len(), plan))
}

fn generate(config: &Config, keep_stale: bool) -> Result<ExitCode, BoxError> {
    let backend = RustBackend::new();
    let generator = build_generator(config)?;
    let (_, plan) = plan_variants(config, &backend, &generator)?;

    let output_dir = config.output_dir.clone();
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn({
        let output_dir = output_dir.clone();
        move || {
            for event in rx {
                for line in output::format_generation_event(&event, &output_dir) {
                    println!("{}", line);
                }
            }
        }
    });
    let mut report = generator.run(&backend, &plan.to_create, Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;

    if keep_stale {
        info!(stale = plan.to_delete.len(), "keeping stale variants");
    } else {
        report.deleted = delete_stale(&output_dir, &plan.to_delete)?;
    }

    output::print_report(&report, &output_dir);
    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Resolve every image concurrently through one shared resolver.
async fn resolve_images(
    config: &Config,
    images: Vec<PathBuf>,
    json: bool,
) -> Result<ExitCode, BoxError> {
    let layout = VariantLayout::from_config(config);
    let source: Box<dyn VariantSource> = if config.remote.enabled {
        let client =
            create_s3_client(config.remote.endpoint.as_deref(), &config.remote.region).await;
        let store = S3ObjectStore::new(client, &config.remote.bucket);
        let lister = RemoteLister::new(store, config.remote.max_parallel_requests);
        Box::new(RemoteSource::new(lister, &config.remote.prefix))
    } else {
        Box::new(LocalSource::new(&layout.output_dir))
    };
    let resolver = Arc::new(VariantResolver::new(source, layout));

    let mut tasks = JoinSet::new();
    for (index, image) in images.into_iter().enumerate() {
        let resolver = Arc::clone(&resolver);
        tasks.spawn(async move {
            let result = resolver.resolve(&image).await;
            (index, image, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        results.push(joined?);
    }
    results.sort_by_key(|(index, _, _)| *index);

    if json {
        let records: Vec<ResolutionRecord> = results
            .iter()
            .map(|(_, image, result)| ResolutionRecord::new(image, result))
            .collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for (_, image, result) in &results {
            output::print_resolution(image, result);
        }
    }

    let failed = results.iter().filter(|(_, _, r)| r.is_err()).count();
    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
