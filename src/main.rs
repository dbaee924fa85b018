//! Layer-Sync Replay.
//!
//! Spielt ein Szenario (Katalog, Layer, Commands) gegen die In-Memory-Engine
//! ab und protokolliert die resultierenden Draw-Order-Stacks.
//!
//! Aufruf: `layer-sync-replay <szenario.json> [optionen.toml]`

use std::path::{Path, PathBuf};

use anyhow::Context;
use indexmap::IndexMap;
use layer_sync::core::{Layer, WmtsDetail};
use layer_sync::render::LoadError;
use layer_sync::{
    AnyLayer, LayerCommand, LayerService, MemoryFactory, MemoryViewer, StackTarget,
    StaticCatalog, SyncOptions,
};
use serde::Deserialize;

/// Inhalt einer Szenario-Datei.
#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    catalog: Vec<Layer<WmtsDetail>>,
    layers: Vec<AnyLayer>,
    /// Textinhalte je Adresse (z.B. Erdbeben-Kataloge)
    #[serde(default)]
    payloads: IndexMap<String, String>,
    /// Adressen, deren Laden fehlschlägt
    #[serde(default)]
    failures: Vec<String>,
    commands: Vec<LayerCommand>,
}

fn main() -> anyhow::Result<()> {
    // Logger initialisieren
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Layer-Sync Replay v{} startet...", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let scenario_path = args
        .next()
        .map(PathBuf::from)
        .context("Aufruf: layer-sync-replay <szenario.json> [optionen.toml]")?;
    let options_path = args.next().map(PathBuf::from).unwrap_or_else(SyncOptions::config_path);

    let options = SyncOptions::load_from_file(&options_path);
    let scenario = load_scenario(&scenario_path)?;
    replay(scenario, options)
}

fn load_scenario(path: &Path) -> anyhow::Result<Scenario> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Szenario nicht lesbar: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Szenario fehlerhaft: {}", path.display()))
}

fn replay(scenario: Scenario, options: SyncOptions) -> anyhow::Result<()> {
    let catalog: StaticCatalog = scenario.catalog.into_iter().collect();

    let mut factory = scenario
        .payloads
        .into_iter()
        .fold(MemoryFactory::new(), |factory, (location, text)| {
            factory.with_payload(location, text)
        });
    for location in scenario.failures {
        let error = LoadError::NotFound {
            location: location.clone(),
        };
        factory.fail(location, error);
    }

    let mut service = LayerService::new(MemoryViewer::new(), factory, catalog, options);
    for layer in scenario.layers {
        service.register(layer)?;
    }

    for (step, command) in scenario.commands.into_iter().enumerate() {
        log::info!("[{}] {} '{}'", step, command_name(&command), command.layer_id());
        if let Err(e) = service.handle_command(command) {
            log::warn!("[{}] Command fehlgeschlagen: {:#}", step, e);
            continue;
        }

        let report = pollster::block_on(service.settle());
        for (layer, error) in &report.failures {
            log::warn!("[{}] Layer '{}': {}", step, layer, error);
        }
    }

    log_stacks(&service);
    Ok(())
}

fn command_name(command: &LayerCommand) -> &'static str {
    match command {
        LayerCommand::Register { .. } => "register",
        LayerCommand::Activate { .. } => "activate",
        LayerCommand::Deactivate { .. } => "deactivate",
        LayerCommand::Update { .. } => "update",
        LayerCommand::Move { .. } => "move",
        LayerCommand::ZoomIntoView { .. } => "zoomIntoView",
        LayerCommand::MoveToTop { .. } => "moveToTop",
    }
}

fn log_stacks(service: &LayerService<MemoryViewer, MemoryFactory>) {
    let viewer = service.viewer();
    for target in [
        StackTarget::Imagery,
        StackTarget::Primitives,
        StackTarget::DataSources,
    ] {
        let items = viewer.items(target);
        log::info!("{} (unten → oben): {:?}", target, items);
        for id in items {
            if let Some(resource) = viewer.resource(id) {
                log::info!(
                    "  {} {} alpha={:.2} show={}",
                    id,
                    resource.request.location(),
                    resource.alpha,
                    resource.show
                );
            }
        }
    }

    let globe = viewer.globe();
    log::info!(
        "Globus-Transluzenz: {} (alpha {:.2})",
        globe.enabled,
        globe.alpha
    );
    log::info!(
        "Aktive Layer (oben zuerst): {:?}",
        service.active_layer_ids()
    );
    log::info!("Statistik: {:?}", viewer.stats());
}
