use indexmap::IndexMap;
use layer_sync::app::ChildMode;
use layer_sync::core::{
    BackgroundDetail, BackgroundVariant, DetailChange, TiffBand, TiffBandDisplay, TiffDetail,
    Tiles3dDetail, WmtsDetail, WmtsProvider,
};
use layer_sync::render::{FlyTarget, LoadedResource, ResourceId};
use layer_sync::{
    AnyLayer, Layer, LayerDetail, LayerError, LayerId, LayerService, LayerSource, LayerUpdate,
    MemoryFactory, MemoryViewer, SettleReport, StackTarget, StaticCatalog, SyncOptions,
};

type Service = LayerService<MemoryViewer, MemoryFactory>;

fn raster(id: &str) -> Layer<WmtsDetail> {
    Layer::new(
        id,
        WmtsDetail {
            provider: WmtsProvider::Wmts,
            max_level: None,
            times: None,
            format: "image/jpeg".into(),
            credit: "swisstopo".into(),
        },
    )
}

fn catalog() -> StaticCatalog {
    ["ch.swisstopo.pixelkarte-farbe", "ch.swisstopo.swissimage", "ch.swisstopo.pixelkarte-grau"]
        .into_iter()
        .map(raster)
        .collect()
}

fn variant(children: &[&str]) -> BackgroundVariant {
    BackgroundVariant {
        children: children.iter().copied().map(LayerId::from).collect(),
    }
}

fn background() -> AnyLayer {
    let variants = IndexMap::from([
        (
            "farbe".to_string(),
            variant(&["ch.swisstopo.pixelkarte-farbe", "ch.swisstopo.swissimage"]),
        ),
        (
            "grau".to_string(),
            variant(&["ch.swisstopo.pixelkarte-grau"]),
        ),
        (
            "defekt".to_string(),
            variant(&["ch.swisstopo.pixelkarte-farbe", "ch.swisstopo.fehlt"]),
        ),
    ]);
    Layer::new(
        "background",
        LayerDetail::Background(BackgroundDetail {
            image_path: "images/background.png".into(),
            has_alpha_channel: false,
            variants,
            active_variant: "farbe".into(),
        }),
    )
}

fn overlay() -> AnyLayer {
    raster("ch.bafu.gewaesserschutz").upcast()
}

fn band(index: u32, name: &str) -> TiffBand {
    TiffBand {
        index,
        name: name.into(),
        unit: None,
        display: Some(TiffBandDisplay {
            bounds: (0.0, 200.0),
            no_data: None,
            steps: Vec::new(),
            color_map: "viridis".into(),
            is_discrete: false,
        }),
    }
}

fn tiff_detail(url: &str, terrain: Option<LayerSource>) -> TiffDetail {
    TiffDetail {
        url: url.into(),
        cell_size: 25.0,
        bands: vec![band(1, "temperature"), band(2, "conductivity")],
        band_index: 0,
        terrain,
    }
}

fn tiff(terrain: Option<LayerSource>) -> AnyLayer {
    Layer::new(
        "geothermal",
        LayerDetail::Tiff(tiff_detail("https://data.example.ch/geothermal.tif", terrain)),
    )
}

fn buildings() -> AnyLayer {
    Layer::new(
        "buildings",
        LayerDetail::Tiles3d(Tiles3dDetail {
            source: LayerSource::url("https://data.example.ch/buildings/tileset.json"),
            is_partially_transparent: false,
            order_of_properties: Vec::new(),
        }),
    )
}

fn replace_detail(detail: LayerDetail) -> LayerUpdate {
    LayerUpdate::detail(DetailChange::Replace { detail })
}

fn service_with(layers: Vec<AnyLayer>) -> Service {
    let mut service = LayerService::new(
        MemoryViewer::new(),
        MemoryFactory::new(),
        catalog(),
        SyncOptions::default(),
    );
    for layer in layers {
        service
            .register(layer)
            .expect("Registrierung sollte gelingen");
    }
    service
}

fn settle(service: &mut Service) -> SettleReport {
    pollster::block_on(service.settle())
}

fn activate(service: &mut Service, id: &str) -> LayerId {
    let id = LayerId::from(id);
    service
        .activate(&id)
        .expect("Aktivierung sollte gelingen");
    id
}

fn location(service: &Service, id: ResourceId) -> String {
    service
        .viewer()
        .resource(id)
        .expect("Ressource sollte leben")
        .request
        .location()
}

/// Orte der Ressourcen eines Stacks, unterste zuerst.
fn locations(service: &Service, target: StackTarget) -> Vec<String> {
    service
        .viewer()
        .items(target)
        .into_iter()
        .map(|id| location(service, id))
        .collect()
}

fn imagery_locations(service: &Service) -> Vec<String> {
    locations(service, StackTarget::Imagery)
}

fn child_ids(service: &Service) -> Vec<LayerId> {
    service
        .controller(&LayerId::from("background"))
        .and_then(|controller| controller.as_background())
        .expect("Hintergrund sollte aktiv sein")
        .kind()
        .child_ids()
}

fn select_variant(service: &mut Service, id: &str) -> anyhow::Result<()> {
    service.update(
        &LayerId::from("background"),
        &LayerUpdate::detail(DetailChange::Variant { id: id.into() }),
    )
}

// ── Hintergrund ─────────────────────────────────────────────────────

#[test]
fn test_background_attaches_children_bottom_up() {
    let mut service = service_with(vec![background()]);
    activate(&mut service, "background");

    let report = settle(&mut service);
    assert!(report.is_clean());
    assert_eq!(report.attached, 2);

    let locations = imagery_locations(&service);
    assert_eq!(locations.len(), 2);
    assert!(locations[0].contains("ch.swisstopo.pixelkarte-farbe"));
    assert!(locations[1].contains("ch.swisstopo.swissimage"));
    assert_eq!(
        child_ids(&service),
        vec![
            LayerId::from("ch.swisstopo.pixelkarte-farbe"),
            LayerId::from("ch.swisstopo.swissimage"),
        ]
    );
}

#[test]
fn test_variant_switch_replaces_all_children() {
    let mut service = service_with(vec![background()]);
    activate(&mut service, "background");
    settle(&mut service);

    select_variant(&mut service, "grau").expect("Variantenwechsel sollte gelingen");
    let report = settle(&mut service);
    assert_eq!(report.attached, 1);

    let locations = imagery_locations(&service);
    assert_eq!(locations.len(), 1);
    assert!(locations[0].contains("ch.swisstopo.pixelkarte-grau"));
    assert_eq!(child_ids(&service), vec![LayerId::from("ch.swisstopo.pixelkarte-grau")]);
    assert_eq!(service.viewer().stats().destroyed, 2);
    assert_eq!(service.viewer().stats().double_releases, 0);
}

#[test]
fn test_variant_switch_stays_below_foreign_imagery() {
    let mut service = service_with(vec![overlay(), background()]);
    activate(&mut service, "ch.bafu.gewaesserschutz");
    activate(&mut service, "background");
    settle(&mut service);

    let locations = imagery_locations(&service);
    assert_eq!(locations.len(), 3);
    assert!(locations[0].contains("pixelkarte-farbe"));
    assert!(locations[1].contains("swissimage"));
    assert!(locations[2].contains("gewaesserschutz"));

    select_variant(&mut service, "grau").expect("Variantenwechsel sollte gelingen");
    settle(&mut service);

    let locations = imagery_locations(&service);
    assert_eq!(locations.len(), 2);
    assert!(locations[0].contains("pixelkarte-grau"));
    assert!(locations[1].contains("gewaesserschutz"));
}

#[test]
fn test_variant_switch_after_move_to_top_stays_on_top() {
    let mut service = service_with(vec![overlay(), background()]);
    activate(&mut service, "ch.bafu.gewaesserschutz");
    let background_id = activate(&mut service, "background");
    settle(&mut service);

    service
        .move_to_top(&background_id)
        .expect("Nach oben verschieben sollte gelingen");
    let locations = imagery_locations(&service);
    assert!(locations[0].contains("gewaesserschutz"));
    assert!(locations[1].contains("pixelkarte-farbe"));
    assert!(locations[2].contains("swissimage"));

    select_variant(&mut service, "grau").expect("Variantenwechsel sollte gelingen");
    settle(&mut service);

    let locations = imagery_locations(&service);
    assert_eq!(locations.len(), 2);
    assert!(locations[0].contains("gewaesserschutz"));
    assert!(locations[1].contains("pixelkarte-grau"));
}

#[test]
fn test_unknown_child_keeps_previous_children() {
    let mut service = service_with(vec![background()]);
    activate(&mut service, "background");
    settle(&mut service);

    let error = select_variant(&mut service, "defekt")
        .expect_err("Unbekanntes Kind sollte abgelehnt werden");
    match error.downcast_ref::<LayerError>() {
        Some(LayerError::UnknownChild { child, .. }) => {
            assert_eq!(child, &LayerId::from("ch.swisstopo.fehlt"))
        }
        other => panic!("Unerwarteter Fehler: {other:?}"),
    }

    assert_eq!(service.pending_count(), 0);
    assert_eq!(imagery_locations(&service).len(), 2);
    assert_eq!(child_ids(&service).len(), 2);
    assert_eq!(service.viewer().stats().destroyed, 0);
}

#[test]
fn test_variant_switch_survives_reload_of_layer_below() {
    let mut service = service_with(vec![
        background(),
        overlay(),
        raster("ch.bav.schienennetz").upcast(),
    ]);
    activate(&mut service, "background");
    let overlay_id = activate(&mut service, "ch.bafu.gewaesserschutz");
    activate(&mut service, "ch.bav.schienennetz");
    settle(&mut service);

    // Gewässerschutz unter den Hintergrund schieben
    service
        .move_layer(&overlay_id, 1)
        .expect("Verschieben sollte gelingen");
    let locations = imagery_locations(&service);
    assert!(locations[0].contains("gewaesserschutz"));
    assert!(locations[1].contains("pixelkarte-farbe"));
    assert!(locations[2].contains("swissimage"));
    assert!(locations[3].contains("schienennetz"));

    select_variant(&mut service, "grau").expect("Variantenwechsel sollte gelingen");
    let mut detail = raster("ch.bafu.gewaesserschutz").detail;
    detail.format = "image/png".into();
    service
        .update(&overlay_id, &replace_detail(LayerDetail::Wmts(detail)))
        .expect("Format-Wechsel sollte gelingen");

    // Der Anker (alter Gewässerschutz) ist weg, bevor das Kind ankommt
    let loads = service.drain_pending();
    assert_eq!(loads.len(), 2);
    for load in loads.into_iter().rev() {
        let result = Ok(LoadedResource::new(load.request.clone()));
        service
            .finish(load, result)
            .expect("Ergebnis sollte eingehängt werden");
    }

    let locations = imagery_locations(&service);
    assert_eq!(locations.len(), 3);
    assert!(locations[0].contains("gewaesserschutz"));
    assert!(locations[1].contains("pixelkarte-grau"));
    assert!(locations[2].contains("schienennetz"));
}

#[test]
fn test_failed_variant_switch_still_applies_opacity() {
    let mut service = service_with(vec![background()]);
    let id = activate(&mut service, "background");
    settle(&mut service);

    let patch = LayerUpdate {
        opacity: Some(0.5),
        detail: Some(DetailChange::Variant {
            id: "defekt".into(),
        }),
        ..LayerUpdate::default()
    };
    let error = service
        .update(&id, &patch)
        .expect_err("Unbekanntes Kind sollte abgelehnt werden");
    assert!(matches!(
        error.downcast_ref::<LayerError>(),
        Some(LayerError::UnknownChild { .. })
    ));

    // Alte Kinder bleiben, die Deckkraft wirkt trotzdem
    assert_eq!(service.layer(&id).expect("registriert").opacity, 0.5);
    let globe = service.viewer().globe();
    assert!(globe.enabled);
    assert_eq!(globe.alpha, 0.5);
    assert_eq!(imagery_locations(&service).len(), 2);
    assert_eq!(service.pending_count(), 0);
}

#[test]
fn test_background_opacity_drives_globe_translucency() {
    let mut service = service_with(vec![background()]);
    let id = activate(&mut service, "background");
    settle(&mut service);
    assert!(!service.viewer().globe().enabled);

    service
        .update(&id, &LayerUpdate::opacity(0.5))
        .expect("Deckkraft-Update sollte gelingen");
    let globe = service.viewer().globe();
    assert!(globe.enabled);
    assert_eq!(globe.alpha, 0.5);

    // Kinder bleiben voll sichtbar
    for child in service.viewer().items(StackTarget::Imagery) {
        assert_eq!(service.viewer().resource(child).expect("lebt").alpha, 1.0);
    }

    service
        .update(&id, &LayerUpdate::visibility(false))
        .expect("Sichtbarkeits-Update sollte gelingen");
    let globe = service.viewer().globe();
    assert!(globe.enabled);
    assert_eq!(globe.alpha, 0.0);

    service
        .update(&id, &LayerUpdate::opacity(1.0))
        .expect("Deckkraft-Update sollte gelingen");
    assert!(!service.viewer().globe().enabled);
    assert_eq!(service.pending_count(), 0);
}

#[test]
fn test_zoom_background_flies_to_default_view() {
    let mut service = service_with(vec![background()]);
    let id = activate(&mut service, "background");
    settle(&mut service);

    service
        .zoom_into_view(&id)
        .expect("Zoom sollte gelingen");

    let expected = FlyTarget::View(service.options().default_view);
    assert_eq!(service.viewer().flights().last(), Some(&expected));
}

#[test]
fn test_deactivate_background_releases_all_children() {
    let mut service = service_with(vec![background()]);
    let id = activate(&mut service, "background");
    settle(&mut service);

    service
        .deactivate(&id)
        .expect("Deaktivierung sollte gelingen");

    assert_eq!(service.viewer().live_count(), 0);
    assert!(service.viewer().items(StackTarget::Imagery).is_empty());
    assert_eq!(service.viewer().stats().double_releases, 0);
}

// ── TIFF ────────────────────────────────────────────────────────────

fn tiff_terrain(service: &Service) -> ResourceId {
    let items = service.viewer().items(StackTarget::Primitives);
    assert_eq!(items.len(), 1, "genau ein Terrain erwartet");
    items[0]
}

#[test]
fn test_tiff_with_terrain_drapes_band_on_terrain() {
    let mut service = service_with(vec![tiff(Some(LayerSource::url(
        "https://data.example.ch/geothermal/terrain.json",
    )))]);
    let id = activate(&mut service, "geothermal");

    let report = settle(&mut service);
    assert!(report.is_clean());
    assert_eq!(report.attached, 2);

    let terrain = tiff_terrain(&service);
    let draped = service.viewer().items(StackTarget::Draped(terrain));
    assert_eq!(draped.len(), 1);
    assert!(location(&service, draped[0]).contains("bidx=1"));
    assert!(service.viewer().items(StackTarget::Imagery).is_empty());

    let controller = service
        .controller(&id)
        .and_then(|controller| controller.as_tiff())
        .expect("TIFF sollte aktiv sein");
    assert_eq!(controller.kind().band_mode(), Some(ChildMode::Embedded));
    assert_eq!(controller.resources(), vec![terrain, draped[0]]);
}

#[test]
fn test_tiff_band_change_reloads_only_band() {
    let mut service = service_with(vec![tiff(Some(LayerSource::url(
        "https://data.example.ch/geothermal/terrain.json",
    )))]);
    let id = activate(&mut service, "geothermal");
    settle(&mut service);
    let terrain = tiff_terrain(&service);
    let old_band = service.viewer().items(StackTarget::Draped(terrain))[0];

    service
        .update(&id, &LayerUpdate::detail(DetailChange::Band { index: 1 }))
        .expect("Band-Wechsel sollte gelingen");
    assert_eq!(service.pending_count(), 1);
    settle(&mut service);

    assert_eq!(tiff_terrain(&service), terrain);
    let draped = service.viewer().items(StackTarget::Draped(terrain));
    assert_eq!(draped.len(), 1);
    assert_ne!(draped[0], old_band);
    assert!(location(&service, draped[0]).contains("bidx=2"));
    assert!(!service.viewer().is_live(old_band));
}

#[test]
fn test_tiff_opacity_applies_to_terrain_only() {
    let mut service = service_with(vec![tiff(Some(LayerSource::url(
        "https://data.example.ch/geothermal/terrain.json",
    )))]);
    let id = activate(&mut service, "geothermal");
    settle(&mut service);

    service
        .update(&id, &LayerUpdate::opacity(0.4))
        .expect("Deckkraft-Update sollte gelingen");
    assert_eq!(service.pending_count(), 0);

    let terrain = tiff_terrain(&service);
    let band = service.viewer().items(StackTarget::Draped(terrain))[0];
    assert_eq!(service.viewer().resource(terrain).expect("lebt").alpha, 0.4);
    assert_eq!(service.viewer().resource(band).expect("lebt").alpha, 1.0);
}

#[test]
fn test_tiff_without_terrain_shows_band_as_imagery() {
    let mut service = service_with(vec![tiff(None)]);
    let id = activate(&mut service, "geothermal");

    let report = settle(&mut service);
    assert_eq!(report.attached, 1);
    assert!(service.viewer().items(StackTarget::Primitives).is_empty());

    let items = service.viewer().items(StackTarget::Imagery);
    assert_eq!(items.len(), 1);
    assert!(location(&service, items[0]).contains("bidx=1"));

    let controller = service
        .controller(&id)
        .and_then(|controller| controller.as_tiff())
        .expect("TIFF sollte aktiv sein");
    assert_eq!(controller.kind().band_mode(), Some(ChildMode::Standalone));

    service
        .update(&id, &LayerUpdate::opacity(0.4))
        .expect("Deckkraft-Update sollte gelingen");
    assert_eq!(service.viewer().resource(items[0]).expect("lebt").alpha, 0.4);
}

#[test]
fn test_tiff_reload_keeps_place_below_overlay() {
    let mut service = service_with(vec![tiff(None), overlay()]);
    let id = activate(&mut service, "geothermal");
    activate(&mut service, "ch.bafu.gewaesserschutz");
    settle(&mut service);

    let locations = imagery_locations(&service);
    assert!(locations[0].contains("geothermal.tif"));
    assert!(locations[1].contains("gewaesserschutz"));

    service
        .update(
            &id,
            &replace_detail(LayerDetail::Tiff(tiff_detail(
                "https://data.example.ch/other.tif",
                None,
            ))),
        )
        .expect("URL-Wechsel sollte gelingen");
    let report = settle(&mut service);
    assert!(report.is_clean());

    let locations = imagery_locations(&service);
    assert_eq!(locations.len(), 2);
    assert!(locations[0].contains("other.tif"));
    assert!(locations[1].contains("gewaesserschutz"));
}

#[test]
fn test_tiff_terrain_change_keeps_place_below_tileset() {
    let mut service = service_with(vec![
        tiff(Some(LayerSource::url(
            "https://data.example.ch/geothermal/terrain-a.json",
        ))),
        buildings(),
    ]);
    let id = activate(&mut service, "geothermal");
    activate(&mut service, "buildings");
    settle(&mut service);

    let primitives = locations(&service, StackTarget::Primitives);
    assert!(primitives[0].contains("terrain-a"));
    assert!(primitives[1].contains("buildings"));

    service
        .update(
            &id,
            &replace_detail(LayerDetail::Tiff(tiff_detail(
                "https://data.example.ch/geothermal.tif",
                Some(LayerSource::url(
                    "https://data.example.ch/geothermal/terrain-b.json",
                )),
            ))),
        )
        .expect("Terrain-Wechsel sollte gelingen");
    let report = settle(&mut service);
    assert!(report.is_clean());
    assert_eq!(report.attached, 2);

    let items = service.viewer().items(StackTarget::Primitives);
    let primitives = locations(&service, StackTarget::Primitives);
    assert_eq!(primitives.len(), 2);
    assert!(primitives[0].contains("terrain-b"));
    assert!(primitives[1].contains("buildings"));
    assert_eq!(service.viewer().items(StackTarget::Draped(items[0])).len(), 1);
}
