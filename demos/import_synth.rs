use clap::Parser;
use std::path::PathBuf;
use synth_import::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "import_synth", about = "Download a synth and save its images")]
struct Cli {
    /// Collection id, or a viewer url with a `cid` parameter
    synth: String,

    /// Directory the images are saved to
    #[arg(short, long, default_value = "synth_images")]
    output: PathBuf,

    /// JSON file with importer settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    no_points: bool,

    #[arg(long)]
    no_cameras: bool,

    /// Only import these coordinate systems
    #[arg(long, value_delimiter = ',')]
    coordinate_systems: Option<Vec<i32>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ImporterConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ImporterConfig::default(),
    };

    let mut settings = ImportSettings::new(
        ImportSource::Remote(cli.synth.clone()),
        !cli.no_points,
        !cli.no_cameras,
    );
    if let Some(ids) = cli.coordinate_systems {
        settings = settings.with_coordinate_systems(ids);
    }

    let client = HybridClient::new(ReqwestClient::new());
    let importer = SynthImporter::new(client, config);
    let handle = importer.start(settings, &cli.output);

    let mut status = handle.subscribe();
    let watcher = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if current.total > 0 {
                println!("{} {}/{}", current.progress, current.completed, current.total);
            } else {
                println!("{}", current.progress);
            }
            if current.state.is_terminal() {
                break;
            }
        }
    });

    let result = handle.finish().await;
    let _ = watcher.await;

    match result {
        Ok(synth) => {
            println!(
                "Imported {} coordinate systems, {} points, {} cameras, {} images",
                synth.coordinate_systems.len(),
                synth.total_points(),
                synth.cameras().count(),
                synth.images.values().filter(|image| image.local_path.is_some()).count(),
            );
            Ok(())
        }
        Err(error) => {
            eprintln!("{} ({error})", error.code());
            Err(error.into())
        }
    }
}
