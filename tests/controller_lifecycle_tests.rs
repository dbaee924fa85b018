use std::collections::VecDeque;

use indexmap::IndexMap;
use layer_sync::app::controllers::{BackgroundKind, Tiles3dKind};
use layer_sync::app::{
    ControllerState, FinishedLoad, LayerKind, LoadOutcome, PendingLoad, TicketCounter,
};
use layer_sync::core::{BackgroundDetail, BackgroundVariant, Tiles3dDetail, WmtsDetail, WmtsProvider};
use layer_sync::render::LoadedResource;
use layer_sync::{
    Layer, LayerController, LayerError, LayerId, LayerSource, MemoryFactory, MemoryViewer,
    ResourceFactory, StackTarget, StaticCatalog, SyncContext, SyncFailure, SyncOptions,
};

/// Controller ohne Layer-Service: Ladevorgänge laufen direkt über die Factory.
struct Harness {
    viewer: MemoryViewer,
    factory: MemoryFactory,
    catalog: StaticCatalog,
    options: SyncOptions,
    tickets: TicketCounter,
}

impl Harness {
    fn new() -> Self {
        Self {
            viewer: MemoryViewer::new(),
            factory: MemoryFactory::new(),
            catalog: StaticCatalog::new(),
            options: SyncOptions::default(),
            tickets: TicketCounter::new(),
        }
    }

    fn ctx(&mut self) -> SyncContext<'_> {
        SyncContext {
            viewer: &mut self.viewer,
            catalog: &self.catalog,
            options: &self.options,
            tickets: &mut self.tickets,
        }
    }

    fn add<K: LayerKind>(&mut self, controller: &mut LayerController<K>) -> Vec<PendingLoad> {
        controller
            .add(&mut self.ctx())
            .expect("add sollte gelingen")
    }

    fn update<K: LayerKind>(
        &mut self,
        controller: &mut LayerController<K>,
        layer: Layer<K::Detail>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        controller.update(layer, &mut self.ctx())
    }

    fn remove<K: LayerKind>(&mut self, controller: &mut LayerController<K>) {
        controller.remove(&mut self.ctx());
    }

    /// Schließt alle Ladevorgänge samt Folge-Ladevorgängen ab.
    fn run<K: LayerKind>(
        &mut self,
        controller: &mut LayerController<K>,
        loads: Vec<PendingLoad>,
    ) -> Vec<LoadOutcome> {
        let mut queue: VecDeque<PendingLoad> = loads.into();
        let mut outcomes = Vec::new();
        while let Some(load) = queue.pop_front() {
            let result = pollster::block_on(self.factory.create(&load.request));
            let finished = FinishedLoad {
                ticket: load.ticket,
                result,
            };
            let completion = controller
                .complete(&load.path, finished, &mut self.ctx())
                .expect("complete sollte gelingen");
            outcomes.push(completion.outcome);
            queue.extend(completion.follow_up);
        }
        outcomes
    }
}

fn tiles(url: &str) -> Layer<Tiles3dDetail> {
    Layer::new(
        "buildings",
        Tiles3dDetail {
            source: LayerSource::url(url),
            is_partially_transparent: false,
            order_of_properties: Vec::new(),
        },
    )
}

fn raster(id: &str) -> Layer<WmtsDetail> {
    Layer::new(
        id,
        WmtsDetail {
            provider: WmtsProvider::Wmts,
            max_level: Some(18),
            times: None,
            format: "image/png".into(),
            credit: String::new(),
        },
    )
}

fn background(children: &[&str]) -> Layer<BackgroundDetail> {
    let children = children.iter().copied().map(LayerId::from).collect();
    Layer::new(
        "background",
        BackgroundDetail {
            image_path: "images/background.png".into(),
            has_alpha_channel: false,
            variants: IndexMap::from([("standard".to_string(), BackgroundVariant { children })]),
            active_variant: "standard".into(),
        },
    )
}

// ── Lebenszyklus ────────────────────────────────────────────────────

#[test]
fn test_add_twice_loads_once() {
    let mut harness = Harness::new();
    let mut controller =
        LayerController::<Tiles3dKind>::new(tiles("https://a/tileset.json")).expect("Controller");

    let loads = harness.add(&mut controller);
    assert_eq!(loads.len(), 1);
    assert!(harness.add(&mut controller).is_empty());

    assert_eq!(controller.state(), ControllerState::Live);
    assert_eq!(controller.stats().reloads, 1);
}

#[test]
fn test_remove_twice_releases_resource_once() {
    let mut harness = Harness::new();
    let mut controller =
        LayerController::<Tiles3dKind>::new(tiles("https://a/tileset.json")).expect("Controller");
    let loads = harness.add(&mut controller);
    harness.run(&mut controller, loads);
    assert_eq!(harness.viewer.live_count(), 1);

    harness.remove(&mut controller);
    harness.remove(&mut controller);

    assert_eq!(controller.state(), ControllerState::Removed);
    assert_eq!(controller.stats().removals, 1);
    assert_eq!(harness.viewer.stats().destroyed, 1);
    assert_eq!(harness.viewer.stats().double_releases, 0);
    assert!(harness.viewer.items(StackTarget::Primitives).is_empty());
}

#[test]
fn test_update_after_remove_is_rejected() {
    let mut harness = Harness::new();
    let mut controller =
        LayerController::<Tiles3dKind>::new(tiles("https://a/tileset.json")).expect("Controller");
    harness.add(&mut controller);
    harness.remove(&mut controller);

    let result = harness.update(&mut controller, tiles("https://b/tileset.json"));
    assert!(matches!(
        result,
        Err(SyncFailure {
            error: LayerError::Removed { .. },
            ..
        })
    ));

    let mut ctx = harness.ctx();
    assert!(matches!(
        controller.add(&mut ctx),
        Err(LayerError::Removed { .. })
    ));
}

#[test]
fn test_update_before_add_only_records_values() {
    let mut harness = Harness::new();
    let mut controller =
        LayerController::<Tiles3dKind>::new(tiles("https://a/tileset.json")).expect("Controller");

    let loads = harness
        .update(&mut controller, tiles("https://b/tileset.json"))
        .expect("Update vor add sollte gelingen");
    assert!(loads.is_empty());
    assert_eq!(controller.stats().reloads, 0);

    let loads = harness.add(&mut controller);
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].request.location(), "https://b/tileset.json");
}

#[test]
fn test_result_after_remove_is_discarded() {
    let mut harness = Harness::new();
    let mut controller =
        LayerController::<Tiles3dKind>::new(tiles("https://a/tileset.json")).expect("Controller");
    let loads = harness.add(&mut controller);
    harness.remove(&mut controller);

    let outcomes = harness.run(&mut controller, loads);

    assert_eq!(outcomes, vec![LoadOutcome::Discarded]);
    assert_eq!(harness.viewer.stats().discarded, 1);
    assert_eq!(harness.viewer.live_count(), 0);
}

#[test]
fn test_reaction_during_load_is_applied_on_attach() {
    let mut harness = Harness::new();
    let mut controller =
        LayerController::<Tiles3dKind>::new(tiles("https://a/tileset.json")).expect("Controller");
    let loads = harness.add(&mut controller);

    let mut faded = tiles("https://a/tileset.json");
    faded.opacity = 0.3;
    let extra = harness
        .update(&mut controller, faded)
        .expect("Deckkraft-Update sollte gelingen");
    assert!(extra.is_empty());
    assert_eq!(controller.stats().reactions, 1);

    harness.run(&mut controller, loads);
    let resource = controller.kind().resource().expect("Ressource eingehängt");
    assert_eq!(harness.viewer.resource(resource).expect("lebt").alpha, 0.3);
}

#[test]
fn test_result_for_unknown_path_is_rejected() {
    let mut harness = Harness::new();
    let mut controller =
        LayerController::<Tiles3dKind>::new(tiles("https://a/tileset.json")).expect("Controller");
    let mut loads = harness.add(&mut controller);
    let load = loads.pop().expect("Ladevorgang");

    let finished = FinishedLoad {
        ticket: load.ticket,
        result: Ok(LoadedResource::new(load.request.clone())),
    };
    let result = controller.complete(&["band".to_string()], finished, &mut harness.ctx());

    assert!(matches!(result, Err(LayerError::UnknownPath { .. })));
    assert_eq!(harness.viewer.stats().discarded, 1);
    assert_eq!(harness.viewer.live_count(), 0);
}

// ── Change-Detection auf Listen ─────────────────────────────────────

#[test]
fn test_reordered_children_of_equal_length_trigger_reload() {
    let mut harness = Harness::new();
    harness.catalog = ["a", "b"].into_iter().map(raster).collect();
    let mut controller =
        LayerController::<BackgroundKind>::new(background(&["a", "b"])).expect("Controller");
    let loads = harness.add(&mut controller);
    harness.run(&mut controller, loads);

    let same = harness
        .update(&mut controller, background(&["a", "b"]))
        .expect("Update sollte gelingen");
    assert!(same.is_empty());
    assert_eq!(controller.stats().reloads, 1);

    let swapped = harness
        .update(&mut controller, background(&["b", "a"]))
        .expect("Update sollte gelingen");
    assert_eq!(swapped.len(), 2);
    assert_eq!(controller.stats().reloads, 2);

    harness.run(&mut controller, swapped);
    assert_eq!(
        controller.kind().child_ids(),
        vec![LayerId::from("b"), LayerId::from("a")]
    );
    let locations: Vec<String> = harness
        .viewer
        .items(StackTarget::Imagery)
        .into_iter()
        .map(|id| harness.viewer.resource(id).expect("lebt").request.location())
        .collect();
    assert!(locations[0].contains("/b/"));
    assert!(locations[1].contains("/a/"));
}

#[test]
fn test_failed_reload_is_retried_on_next_update() {
    let mut harness = Harness::new();
    harness.catalog = ["a"].into_iter().map(raster).collect();
    let mut controller =
        LayerController::<BackgroundKind>::new(background(&["a"])).expect("Controller");
    let loads = harness.add(&mut controller);
    harness.run(&mut controller, loads);

    let result = harness.update(&mut controller, background(&["a", "late"]));
    assert!(matches!(
        result,
        Err(SyncFailure {
            error: LayerError::UnknownChild { .. },
            ..
        })
    ));
    assert_eq!(controller.kind().child_ids(), vec![LayerId::from("a")]);

    // Gleicher Layer, aber das Kind ist inzwischen im Katalog
    harness.catalog.insert(raster("late"));
    let loads = harness
        .update(&mut controller, background(&["a", "late"]))
        .expect("Erneuter Versuch sollte gelingen");
    assert_eq!(loads.len(), 2);

    harness.run(&mut controller, loads);
    assert_eq!(harness.viewer.items(StackTarget::Imagery).len(), 2);
}

#[test]
fn test_reactions_run_even_if_reload_fails() {
    let mut harness = Harness::new();
    harness.catalog = ["a"].into_iter().map(raster).collect();
    let mut controller =
        LayerController::<BackgroundKind>::new(background(&["a"])).expect("Controller");
    let loads = harness.add(&mut controller);
    harness.run(&mut controller, loads);

    let mut faded = background(&["a", "late"]);
    faded.opacity = 0.5;
    let failure = harness
        .update(&mut controller, faded.clone())
        .expect_err("Unbekanntes Kind sollte abgelehnt werden");
    assert!(matches!(failure.error, LayerError::UnknownChild { .. }));
    assert!(failure.loads.is_empty());
    assert_eq!(controller.stats().reactions, 1);
    assert_eq!(harness.viewer.globe().alpha, 0.5);

    // Gleiche Werte: keine neue Reaktion, aber erneuter Reload-Versuch
    harness.catalog.insert(raster("late"));
    let loads = harness
        .update(&mut controller, faded)
        .expect("Erneuter Versuch sollte gelingen");
    assert_eq!(loads.len(), 2);
    assert_eq!(controller.stats().reactions, 1);
    assert_eq!(harness.viewer.globe().alpha, 0.5);
}
