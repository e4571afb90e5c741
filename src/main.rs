use anyhow::Context;
use clap::{Parser, Subcommand};
use film_uploader::archive::{extract_models_from_path, ModelGroup};
use film_uploader::config::{self, CatalogSettings, ConnectionArgs};
use film_uploader::report;
use film_uploader::upload::{UploadMode, Uploader};
use indicatif::{ProgressBar, ProgressStyle};
use log_error::LogError;
use shopify_admin::memory::InMemoryShop;
use shopify_admin::{AdminApi, ShopifyClient};
use std::env;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Creates products from a zip of model image folders")]
struct Cli {
    /// YAML file with title prefix, description and default collections
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the models found in an archive without calling the API
    Preview { archive: PathBuf },
    /// Create one product per model found in an archive
    Upload {
        archive: PathBuf,
        /// Shop domain, e.g. my-store.myshopify.com
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        api_version: Option<String>,
        /// Id or handle of a product to copy attributes from
        #[arg(long, value_name = "ID_OR_HANDLE")]
        duplicate_from: Option<String>,
        /// Attach to the default collections instead of the source product's
        #[arg(long, requires = "duplicate_from")]
        no_copy_collections: bool,
        /// Write results to a CSV file
        #[arg(long)]
        report: Option<PathBuf>,
        /// Run against an empty in-memory shop
        #[arg(long)]
        dry_run: bool,
    },
}

fn print_models(models: &[ModelGroup]) {
    println!("{} model(s) found", models.len());
    for model in models {
        println!("Model: {} ({} images)", model.name, model.images.len());
        for image in &model.images {
            println!("  {}. {}", image.position, image.filename);
        }
        for warning in &model.warnings {
            println!("  warning: {warning}");
        }
    }
}

fn progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos:>7}/{len:7} {msg}");
    match style {
        Ok(style) => pb.set_style(style.progress_chars("=-")),
        Err(err) => log::warn!("Unable to initialize progress bar: {err}"),
    }
    pb
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();
    config::load_env_file()?;

    let cli = Cli::parse();
    let settings = CatalogSettings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Preview { archive } => {
            let models = extract_models_from_path(&archive).await?;
            print_models(&models);
        }
        Command::Upload {
            archive,
            domain,
            token,
            api_version,
            duplicate_from,
            no_copy_collections,
            report: report_path,
            dry_run,
        } => {
            let models = extract_models_from_path(&archive).await?;
            print_models(&models);
            if models.is_empty() {
                log::warn!("No models found in {archive:?}");
                return Ok(());
            }

            let api: Box<dyn AdminApi> = if dry_run {
                log::info!("Dry run: using an in-memory shop");
                Box::new(InMemoryShop::new())
            } else {
                let cfg = config::shopify_config(ConnectionArgs {
                    domain,
                    token,
                    api_version,
                })?;
                log::info!("Uploading to {}", cfg.base_url());
                Box::new(ShopifyClient::new(&cfg).context("Unable to build Shopify client")?)
            };
            let mode = match duplicate_from {
                Some(source) => UploadMode::Duplicate {
                    source,
                    copy_collections: !no_copy_collections,
                },
                None => UploadMode::Plain,
            };

            let pb = progress_bar(models.len());
            let outcomes = Uploader::new(api.as_ref(), &settings, mode)
                .run(&models, |done, total| {
                    pb.set_position(done as u64);
                    pb.set_message(format!("{done}/{total} done"));
                })
                .await?;
            pb.finish_and_clear();

            let records = report::records(&outcomes);
            println!("{}", report::render_table(&records));
            if let Some(path) = report_path {
                report::write_csv(&path, &records)
                    .with_context(|| format!("Unable to write report to {path:?}"))
                    .log_error("Unable to write report");
            }
        }
    }
    Ok(())
}
