//! TIFF-Composite: aktives Band als COG-Imagery, optional auf eigenem Terrain.
//!
//! Ohne Terrain liegt das Band direkt im globalen Imagery-Stack und übernimmt
//! Deckkraft und Sichtbarkeit. Mit Terrain wird das Band erst nach dem
//! Terrain geladen und darauf drapiert; die Darstellung regelt dann das
//! Terrain.

use super::tiles3d::Tiles3dKind;
use super::wmts::WmtsKind;
use super::ChildMode;
use crate::app::controller::{
    LayerController, LayerError, LayerKind, SyncContext, SyncFailure,
};
use crate::app::load::{nest, Completion, FinishedLoad, LoadOutcome, PendingLoad};
use crate::core::{
    CogBandProvider, Layer, LayerSource, TiffDetail, Tiles3dDetail, WatchPass, WmtsDetail,
    WmtsProvider,
};
use crate::render::{draw_order, Anchor, Placement, ResourceId, StackTarget};

const TERRAIN: &str = "terrain";
const BAND: &str = "band";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffReaction {
    /// Deckkraft oder Sichtbarkeit
    Display,
    /// Aktives Band oder seine Darstellung
    Band,
}

#[derive(Debug)]
struct BandChild {
    mode: ChildMode,
    controller: LayerController<WmtsKind>,
}

#[derive(Debug, Default)]
pub struct TiffKind {
    terrain: Option<LayerController<Tiles3dKind>>,
    band: Option<BandChild>,
    /// Platz des Terrains im Primitives-Stack
    terrain_anchor: Option<Anchor>,
    /// Platz des Bandes im Imagery-Stack (nur ohne Terrain)
    imagery_anchor: Option<Anchor>,
}

/// Raster-Detail des aktiven Bandes.
pub fn band_detail(layer: &Layer<TiffDetail>) -> Result<WmtsDetail, LayerError> {
    let invalid = || LayerError::InvalidBand {
        layer: layer.id.clone(),
        index: layer.detail.band_index,
    };
    let band = layer.detail.active_band().ok_or_else(invalid)?;
    let display = band.display.as_ref().ok_or_else(invalid)?;

    Ok(WmtsDetail {
        provider: WmtsProvider::CogBand(CogBandProvider {
            url: layer.detail.url.clone(),
            band_index: band.index,
            color_map: display.color_map.clone(),
            rescale: (!display.is_discrete).then_some(display.bounds),
            no_data: display.no_data,
        }),
        max_level: None,
        times: None,
        format: "image/png".into(),
        credit: String::new(),
    })
}

fn band_layer(
    layer: &Layer<TiffDetail>,
    mode: ChildMode,
) -> Result<Layer<WmtsDetail>, LayerError> {
    Ok(mode.adjust(layer, layer.with_detail(band_detail(layer)?)))
}

fn terrain_layer(layer: &Layer<TiffDetail>, source: &LayerSource) -> Layer<Tiles3dDetail> {
    let detail = Tiles3dDetail {
        source: source.clone(),
        is_partially_transparent: true,
        order_of_properties: Vec::new(),
    };
    ChildMode::Standalone.adjust(layer, layer.with_detail(detail))
}

impl TiffKind {
    pub fn terrain(&self) -> Option<&LayerController<Tiles3dKind>> {
        self.terrain.as_ref()
    }

    pub fn band(&self) -> Option<&LayerController<WmtsKind>> {
        self.band.as_ref().map(|band| &band.controller)
    }

    pub fn band_mode(&self) -> Option<ChildMode> {
        self.band.as_ref().map(|band| band.mode)
    }

    fn start_band(
        &mut self,
        layer: &Layer<TiffDetail>,
        mode: ChildMode,
        kind: WmtsKind,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, LayerError> {
        let mut controller = LayerController::with_kind(band_layer(layer, mode)?, kind)?;
        let loads = nest(controller.add(ctx)?, &layer.id, BAND);
        log::debug!(
            "TIFF '{}': Band {} gestartet ({:?}, {})",
            layer.id,
            layer.detail.band_index,
            mode,
            controller.kind().target()
        );
        self.band = Some(BandChild { mode, controller });
        Ok(loads)
    }

    fn sync_band(
        &mut self,
        layer: &Layer<TiffDetail>,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        let Some(band) = self.band.as_mut() else {
            return Ok(Vec::new());
        };
        let child = band_layer(layer, band.mode)?;
        let started = band
            .controller
            .update(child, ctx)
            .map_err(|failure| failure.nested(&layer.id, BAND))?;
        Ok(nest(started, &layer.id, BAND))
    }

    /// Merkt sich vor einem Reload, wo die Kinder in ihren Stacks liegen.
    fn record_anchors(&mut self, ctx: &SyncContext<'_>) {
        let below = |target: StackTarget, group: Vec<ResourceId>| {
            ctx.viewer
                .stack(target)
                .and_then(|stack| draw_order::anchor_below(stack, &group))
        };
        if let Some(anchor) = self
            .terrain
            .as_ref()
            .and_then(|terrain| below(StackTarget::Primitives, terrain.resources()))
        {
            self.terrain_anchor = Some(anchor);
        }
        if let Some(anchor) = self
            .band
            .as_ref()
            .filter(|band| band.controller.kind().target() == StackTarget::Imagery)
            .and_then(|band| below(StackTarget::Imagery, band.controller.resources()))
        {
            self.imagery_anchor = Some(anchor);
        }
    }

    fn remove_children(&mut self, ctx: &mut SyncContext<'_>) {
        // Band zuerst, es kann auf dem Terrain liegen.
        if let Some(mut band) = self.band.take() {
            band.controller.remove(ctx);
        }
        if let Some(mut terrain) = self.terrain.take() {
            terrain.remove(ctx);
        }
    }
}

impl LayerKind for TiffKind {
    type Detail = TiffDetail;
    type Reaction = TiffReaction;

    fn register(layer: &Layer<TiffDetail>, pass: &mut WatchPass<'_, TiffReaction>) {
        let band = band_detail(layer).ok().map(|detail| detail.provider);
        pass.watch("url", layer.detail.url.as_str());
        pass.watch("terrain", layer.detail.terrain.as_ref());
        pass.react("band", band, TiffReaction::Band);
        pass.react("opacity", layer.opacity, TiffReaction::Display);
        pass.react("visible", layer.is_visible, TiffReaction::Display);
    }

    fn add_to_viewer(
        &mut self,
        layer: &Layer<TiffDetail>,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, LayerError> {
        if layer.detail.bands.is_empty() {
            return Err(LayerError::EmptyComposite {
                layer: layer.id.clone(),
            });
        }
        band_detail(layer)?;
        self.record_anchors(ctx);
        self.remove_children(ctx);

        match &layer.detail.terrain {
            Some(source) => {
                let mut kind = Tiles3dKind::default();
                kind.set_placement(Placement::anchored_or_top(self.terrain_anchor));
                let mut terrain = LayerController::with_kind(terrain_layer(layer, source), kind)?;
                let loads = nest(terrain.add(ctx)?, &layer.id, TERRAIN);
                self.terrain = Some(terrain);
                Ok(loads)
            }
            None => {
                let mut kind = WmtsKind::default();
                kind.set_placement(Placement::anchored_or_top(self.imagery_anchor));
                self.start_band(layer, ChildMode::Standalone, kind, ctx)
            }
        }
    }

    fn complete(
        &mut self,
        layer: &Layer<TiffDetail>,
        path: &[String],
        load: FinishedLoad,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Completion, LayerError> {
        let unknown_path = || LayerError::UnknownPath {
            layer: layer.id.clone(),
            path: path.to_vec(),
        };
        let Some((key, rest)) = path.split_first() else {
            ctx.discard(load);
            return Err(unknown_path());
        };

        match key.as_str() {
            TERRAIN => {
                let Some(terrain) = self.terrain.as_mut() else {
                    ctx.discard(load);
                    return Ok(Completion::discarded());
                };
                let mut completion = terrain.complete(rest, load, ctx)?;
                if let LoadOutcome::Attached { resource, .. } = completion.outcome {
                    if self.band.is_none() {
                        completion.follow_up = self.start_band(
                            layer,
                            ChildMode::Embedded,
                            WmtsKind::draped(resource),
                            ctx,
                        )?;
                    }
                }
                Ok(completion)
            }
            BAND => match self.band.as_mut() {
                Some(band) => band.controller.complete(rest, load, ctx),
                None => {
                    ctx.discard(load);
                    Ok(Completion::discarded())
                }
            },
            _ => {
                ctx.discard(load);
                Err(unknown_path())
            }
        }
    }

    fn react(
        &mut self,
        layer: &Layer<TiffDetail>,
        reaction: TiffReaction,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        let mut loads = Vec::new();
        if reaction == TiffReaction::Display {
            if let (Some(terrain), Some(source)) = (self.terrain.as_mut(), &layer.detail.terrain) {
                let child = terrain_layer(layer, source);
                let started = terrain
                    .update(child, ctx)
                    .map_err(|failure| failure.nested(&layer.id, TERRAIN))?;
                loads.extend(nest(started, &layer.id, TERRAIN));
            }
        }
        match self.sync_band(layer, ctx) {
            Ok(started) => loads.extend(started),
            Err(failure) => {
                loads.extend(failure.loads);
                return Err(SyncFailure {
                    error: failure.error,
                    loads,
                });
            }
        }
        Ok(loads)
    }

    fn remove_from_viewer(&mut self, ctx: &mut SyncContext<'_>) {
        self.remove_children(ctx);
    }

    fn zoom_into_view(&self, _layer: &Layer<TiffDetail>, ctx: &mut SyncContext<'_>) {
        match (&self.terrain, &self.band) {
            (Some(terrain), _) => terrain.zoom_into_view(ctx),
            (None, Some(band)) => band.controller.zoom_into_view(ctx),
            (None, None) => {}
        }
    }

    fn move_to_top(&self, ctx: &mut SyncContext<'_>) {
        match (&self.terrain, &self.band) {
            (Some(terrain), _) => terrain.move_to_top(ctx),
            (None, Some(band)) => band.controller.move_to_top(ctx),
            (None, None) => {}
        }
    }

    fn resources(&self) -> Vec<ResourceId> {
        let terrain = self.terrain.iter().flat_map(|terrain| terrain.resources());
        let band = self.band.iter().flat_map(|band| band.controller.resources());
        terrain.chain(band).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TiffBand, TiffBandDisplay};

    fn tiff(is_discrete: bool) -> Layer<TiffDetail> {
        Layer::new(
            "tiff_geothermal",
            TiffDetail {
                url: "https://data/geothermal.tif".into(),
                cell_size: 25.0,
                bands: vec![
                    TiffBand {
                        index: 1,
                        name: "temperature".into(),
                        unit: None,
                        display: Some(TiffBandDisplay {
                            bounds: (10.0, 150.0),
                            no_data: Some(-9999.0),
                            steps: Vec::new(),
                            color_map: "turbo".into(),
                            is_discrete,
                        }),
                    },
                    TiffBand {
                        index: 2,
                        name: "raw".into(),
                        unit: None,
                        display: None,
                    },
                ],
                band_index: 0,
                terrain: None,
            },
        )
    }

    #[test]
    fn continuous_band_is_rescaled() {
        let detail = band_detail(&tiff(false)).expect("Band gültig");
        let WmtsProvider::CogBand(cog) = detail.provider else {
            panic!("COG-Band erwartet");
        };
        assert_eq!(cog.band_index, 1);
        assert_eq!(cog.rescale, Some((10.0, 150.0)));
        assert_eq!(cog.no_data, Some(-9999.0));
    }

    #[test]
    fn discrete_band_is_not_rescaled() {
        let detail = band_detail(&tiff(true)).expect("Band gültig");
        let WmtsProvider::CogBand(cog) = detail.provider else {
            panic!("COG-Band erwartet");
        };
        assert_eq!(cog.rescale, None);
    }

    #[test]
    fn band_without_display_is_invalid() {
        let mut layer = tiff(false);
        layer.detail.band_index = 1;
        let err = band_detail(&layer).expect_err("Band ohne Darstellung");
        assert!(matches!(err, LayerError::InvalidBand { index: 1, .. }));
    }

    #[test]
    fn terrain_child_is_partially_transparent_and_standalone() {
        let mut layer = tiff(false);
        layer.opacity = 0.3;
        let terrain = terrain_layer(&layer, &LayerSource::url("https://terrain/tileset.json"));
        assert!(terrain.detail.is_partially_transparent);
        assert_eq!(terrain.opacity, 0.3);
        assert_eq!(terrain.id, layer.id);
    }
}
