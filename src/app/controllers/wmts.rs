//! Controller für Raster-Layer (WMTS, WMS, COG-Bänder).

use super::leaf::LeafResource;
use crate::app::controller::{LayerError, LayerKind, SyncContext, SyncFailure};
use crate::app::load::{Completion, FinishedLoad, PendingLoad};
use crate::core::{Layer, WatchPass, WmtsDetail, WmtsProvider};
use crate::render::{
    ImageryProvider, Placement, ResourceId, ResourceRequest, StackTarget,
};
use crate::shared::SyncOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmtsReaction {
    Opacity,
    Visibility,
}

/// Eine Imagery, global oder auf ein Tileset drapiert.
#[derive(Debug, Clone)]
pub struct WmtsKind {
    leaf: LeafResource,
}

impl Default for WmtsKind {
    fn default() -> Self {
        Self {
            leaf: LeafResource::new(StackTarget::Imagery),
        }
    }
}

impl WmtsKind {
    /// Imagery auf der drapierten Liste eines Tilesets.
    pub fn draped(tileset: ResourceId) -> Self {
        Self {
            leaf: LeafResource::new(StackTarget::Draped(tileset)),
        }
    }

    pub fn resource(&self) -> Option<ResourceId> {
        self.leaf.resource()
    }

    pub fn target(&self) -> StackTarget {
        self.leaf.target()
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.leaf.set_placement(placement);
    }

    fn apply_display(&self, layer: &Layer<WmtsDetail>, ctx: &mut SyncContext<'_>) {
        if let Some(id) = self.leaf.resource() {
            ctx.viewer.set_alpha(id, layer.effective_opacity());
            ctx.viewer.set_pickable(id, layer.is_visible);
        }
    }
}

/// Baut den Imagery-Auftrag für einen Raster-Layer.
pub fn imagery_request(layer: &Layer<WmtsDetail>, options: &SyncOptions) -> ResourceRequest {
    let detail = &layer.detail;
    let provider = match &detail.provider {
        WmtsProvider::Wmts => ImageryProvider::UrlTemplate {
            url: options.wmts_url(
                layer.id.as_str(),
                &detail.format,
                detail.times.as_ref().map(|times| times.current.as_str()),
            ),
        },
        WmtsProvider::Wms => ImageryProvider::Wms {
            url: options.wms_url_template.clone(),
            layers: layer.id.to_string(),
            format: detail.format.clone(),
            subdomains: options.wms_subdomains.clone(),
        },
        WmtsProvider::CogBand(cog) => ImageryProvider::UrlTemplate {
            url: options.cog_tiles_url(
                &cog.url,
                cog.band_index,
                &cog.color_map,
                cog.rescale,
                cog.no_data,
            ),
        },
    };
    ResourceRequest::Imagery {
        provider,
        max_level: detail.max_level,
        credit: detail.credit.clone(),
    }
}

impl LayerKind for WmtsKind {
    type Detail = WmtsDetail;
    type Reaction = WmtsReaction;

    fn register(layer: &Layer<WmtsDetail>, pass: &mut WatchPass<'_, WmtsReaction>) {
        let detail = &layer.detail;
        pass.watch("id", layer.id.as_str());
        pass.watch("provider", &detail.provider);
        pass.watch("max_level", detail.max_level);
        pass.watch("credit", detail.credit.as_str());
        pass.watch("format", detail.format.as_str());
        pass.watch(
            "time",
            detail.times.as_ref().map(|times| times.current.as_str()),
        );
        pass.react("opacity", layer.opacity, WmtsReaction::Opacity);
        pass.react("visible", layer.is_visible, WmtsReaction::Visibility);
    }

    fn add_to_viewer(
        &mut self,
        layer: &Layer<WmtsDetail>,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, LayerError> {
        let request = imagery_request(layer, ctx.options);
        Ok(vec![self.leaf.start(&layer.id, request, ctx)])
    }

    fn complete(
        &mut self,
        layer: &Layer<WmtsDetail>,
        path: &[String],
        load: FinishedLoad,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Completion, LayerError> {
        match self.leaf.accept(&layer.id, path, load, ctx)? {
            Some((resource, index)) => {
                self.apply_display(layer, ctx);
                Ok(Completion::attached(resource, index))
            }
            None => Ok(Completion::discarded()),
        }
    }

    fn react(
        &mut self,
        layer: &Layer<WmtsDetail>,
        reaction: WmtsReaction,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        let Some(id) = self.leaf.resource() else {
            return Ok(Vec::new());
        };
        match reaction {
            WmtsReaction::Opacity => ctx.viewer.set_alpha(id, layer.effective_opacity()),
            WmtsReaction::Visibility => self.apply_display(layer, ctx),
        }
        Ok(Vec::new())
    }

    fn remove_from_viewer(&mut self, ctx: &mut SyncContext<'_>) {
        self.leaf.release(ctx);
    }

    fn zoom_into_view(&self, _layer: &Layer<WmtsDetail>, ctx: &mut SyncContext<'_>) {
        self.leaf.fly_to(ctx);
    }

    fn move_to_top(&self, ctx: &mut SyncContext<'_>) {
        self.leaf.raise_to_top(ctx);
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.leaf.resources()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CogBandProvider, WmtsTimes};

    fn layer(provider: WmtsProvider) -> Layer<WmtsDetail> {
        Layer::new(
            "ch.swisstopo.geologie",
            WmtsDetail {
                provider,
                max_level: Some(18),
                times: None,
                format: "image/png".into(),
                credit: "swisstopo".into(),
            },
        )
    }

    #[test]
    fn wmts_request_uses_current_time_step() {
        let mut layer = layer(WmtsProvider::Wmts);
        layer.detail.times = Some(WmtsTimes {
            current: "2020".into(),
            all: vec!["2019".into(), "2020".into()],
        });
        let request = imagery_request(&layer, &SyncOptions::default());
        let ResourceRequest::Imagery { provider, .. } = request else {
            panic!("Imagery erwartet");
        };
        let ImageryProvider::UrlTemplate { url } = provider else {
            panic!("URL-Template erwartet");
        };
        assert!(url.contains("/ch.swisstopo.geologie/default/2020/"));
        assert!(url.ends_with(".png"));
    }

    #[test]
    fn wms_request_carries_layer_id_and_subdomains() {
        let request = imagery_request(&layer(WmtsProvider::Wms), &SyncOptions::default());
        let ResourceRequest::Imagery {
            provider: ImageryProvider::Wms {
                layers, subdomains, ..
            },
            max_level,
            ..
        } = request
        else {
            panic!("WMS erwartet");
        };
        assert_eq!(layers, "ch.swisstopo.geologie");
        assert_eq!(subdomains, "0123");
        assert_eq!(max_level, Some(18));
    }

    #[test]
    fn cog_band_request_goes_through_titiler() {
        let provider = WmtsProvider::CogBand(CogBandProvider {
            url: "https://data/x.tif".into(),
            band_index: 2,
            color_map: "viridis".into(),
            rescale: Some((0.0, 10.0)),
            no_data: None,
        });
        let request = imagery_request(&layer(provider), &SyncOptions::default());
        assert!(request.location().contains("bidx=2&colormap_name=viridis&rescale=0,10"));
    }
}
