// src/bin/fetch_oras.rs

use std::env;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ora_backend::{
    build_loader,
    config::AppConfig,
    http_client,
    services::{
        filter_store::available_trait_values,
        persistence::{FileStatePort, StatePort},
        profiles::{export_file_name, ProfileBook},
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,ora_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Usage: cargo run --bin fetch_oras -- vitalik.eth [export.json]
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <address-or-ens> [export.json]", args[0]);
        std::process::exit(1);
    }

    let config = AppConfig::from_env()?;
    let client = http_client(&config)?;
    let loader = build_loader(&config, client)?;

    println!("Resolving {}...", args[1]);
    let resolved = loader.resolve(&args[1]).await?;
    println!("Address: {} ({})", resolved.address, resolved.source_label);

    let collection = loader.load_all(&resolved.address).await?;
    let report = collection.report;

    println!(
        "Found {} {} (complete: {}, degraded: {}, dropped: {})",
        collection.oras.len(),
        config.collection.name,
        report.complete,
        report.degraded,
        report.dropped
    );

    for ora in &collection.oras {
        println!("  #{:<8} {}", ora.display_id, ora.name);
    }

    let facets = available_trait_values(&collection.oras);
    if !facets.is_empty() {
        println!("Traits:");
        for (name, values) in &facets {
            println!("  {}: {}", name, values.join(", "));
        }
    }

    // Export is opt-in: any second argument, "-" picks the dated default name
    if let Some(target) = args.get(2) {
        let port: Arc<dyn StatePort> = Arc::new(FileStatePort::new(&config.state_dir)?);
        let book = ProfileBook::open(port, config.collection.clone())?;

        let path = if target == "-" {
            export_file_name(&config.collection.slug, chrono::Utc::now().date_naive())
        } else {
            target.clone()
        };

        let export = book.export(&collection.oras)?;
        std::fs::write(&path, export)?;
        println!("Wrote profile export to {}", path);
    }

    Ok(())
}
