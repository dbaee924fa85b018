//! Controller für Voxel-Layer mit Shader-basierter Filterung.
//!
//! Der Shader identifiziert jedes Mapping über den Index seines Schlüssels
//! in der sortierten Schlüsselliste. Schlüssel müssen daher eindeutig sein.

use indexmap::IndexMap;

use super::leaf::LeafResource;
use crate::app::controller::{LayerError, LayerKind, SyncContext, SyncFailure};
use crate::app::load::{Completion, FinishedLoad, PendingLoad};
use crate::core::{Layer, VoxelDetail, VoxelMapping, WatchPass, WatchValue, Watchable};
use crate::render::{ResourceId, ResourceRequest, StackTarget, UniformValue, VoxelShader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxelReaction {
    Opacity,
    Visibility,
    FilterOperator,
    /// Freigeschaltete Einträge, Wertebereiche oder Undefined-Flags
    Mappings,
}

#[derive(Debug, Clone)]
pub struct VoxelKind {
    leaf: LeafResource,
    known_keys: Vec<String>,
}

impl Default for VoxelKind {
    fn default() -> Self {
        Self {
            leaf: LeafResource::new(StackTarget::Primitives),
            known_keys: Vec::new(),
        }
    }
}

impl VoxelKind {
    /// Sortierte Mapping-Schlüssel des zuletzt gestarteten Ladevorgangs.
    pub fn known_keys(&self) -> &[String] {
        &self.known_keys
    }

    fn apply_uniforms(
        &self,
        id: ResourceId,
        uniforms: impl IntoIterator<Item = (String, UniformValue)>,
        ctx: &mut SyncContext<'_>,
    ) {
        for (name, value) in uniforms {
            ctx.viewer.set_uniform(id, &name, value);
        }
    }
}

/// Sortierte, eindeutige Mapping-Schlüssel.
pub fn known_keys(layer: &Layer<VoxelDetail>) -> Result<Vec<String>, LayerError> {
    let mut keys: Vec<String> = layer
        .detail
        .mappings
        .iter()
        .map(|mapping| mapping.key().to_string())
        .collect();
    keys.sort();

    if let Some(pair) = keys.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(LayerError::DuplicateMappingKey {
            layer: layer.id.clone(),
            key: pair[0].clone(),
        });
    }
    Ok(keys)
}

/// Uniforms aller Mappings, adressiert über den Schlüssel-Index.
pub fn mapping_uniforms(
    layer: &Layer<VoxelDetail>,
    known_keys: &[String],
) -> Vec<(String, UniformValue)> {
    let mut uniforms = Vec::new();
    for mapping in &layer.detail.mappings {
        let Some(i) = known_keys.iter().position(|key| key == mapping.key()) else {
            continue;
        };
        match mapping {
            VoxelMapping::Item { items, .. } => uniforms.push((
                format!("u_mapping{}_enabledItemFlags", i),
                UniformValue::Flags(items.iter().map(|item| item.is_enabled).collect()),
            )),
            VoxelMapping::Range {
                enabled_range,
                is_undefined_always_enabled,
                ..
            } => {
                uniforms.push((
                    format!("u_mapping{}_enabledRange_min", i),
                    UniformValue::Float(enabled_range.0),
                ));
                uniforms.push((
                    format!("u_mapping{}_enabledRange_max", i),
                    UniformValue::Float(enabled_range.1),
                ));
                uniforms.push((
                    format!("u_mapping{}_isUndefinedAlwaysEnabled", i),
                    UniformValue::Bool(*is_undefined_always_enabled),
                ));
            }
        }
    }
    uniforms
}

/// Zustand aller Mappings als ein Watch-Wert.
fn mapping_state(layer: &Layer<VoxelDetail>) -> WatchValue {
    WatchValue::Seq(
        layer
            .detail
            .mappings
            .iter()
            .map(|mapping| match mapping {
                VoxelMapping::Item { items, .. } => items
                    .iter()
                    .map(|item| item.is_enabled)
                    .collect::<Vec<_>>()
                    .watch_value(),
                VoxelMapping::Range {
                    enabled_range,
                    is_undefined_always_enabled,
                    ..
                } => WatchValue::Seq(vec![
                    enabled_range.watch_value(),
                    is_undefined_always_enabled.watch_value(),
                ]),
            })
            .collect(),
    )
}

fn build_shader(
    layer: &Layer<VoxelDetail>,
    known_keys: &[String],
) -> Result<VoxelShader, LayerError> {
    let display_index = known_keys
        .iter()
        .position(|key| *key == layer.detail.data_key)
        .ok_or_else(|| LayerError::MissingMapping {
            layer: layer.id.clone(),
            key: layer.detail.data_key.clone(),
        })?;

    let mut uniforms = IndexMap::new();
    uniforms.insert(
        "u_alpha".to_string(),
        UniformValue::Float(f64::from(layer.opacity)),
    );
    uniforms.insert(
        "u_filterOperator".to_string(),
        UniformValue::Int(layer.detail.filter_operator.shader_index()),
    );
    uniforms.insert(
        "u_displayKeyIndex".to_string(),
        UniformValue::Int(display_index as i32),
    );
    uniforms.extend(mapping_uniforms(layer, known_keys));

    Ok(VoxelShader {
        known_keys: known_keys.to_vec(),
        no_data: layer.detail.values.no_data,
        undefined: layer.detail.values.undefined,
        uniforms,
    })
}

impl LayerKind for VoxelKind {
    type Detail = VoxelDetail;
    type Reaction = VoxelReaction;

    fn register(layer: &Layer<VoxelDetail>, pass: &mut WatchPass<'_, VoxelReaction>) {
        let detail = &layer.detail;
        let mut keys: Vec<&str> = detail.mappings.iter().map(VoxelMapping::key).collect();
        keys.sort_unstable();

        pass.watch("source", &detail.source);
        pass.watch("data_key", detail.data_key.as_str());
        pass.watch("mapping_keys", keys);
        pass.watch("values", (detail.values.no_data, detail.values.undefined));
        pass.react("opacity", layer.opacity, VoxelReaction::Opacity);
        pass.react("visible", layer.is_visible, VoxelReaction::Visibility);
        pass.react(
            "filter_operator",
            detail.filter_operator.shader_index(),
            VoxelReaction::FilterOperator,
        );
        pass.react("mappings", mapping_state(layer), VoxelReaction::Mappings);
    }

    fn add_to_viewer(
        &mut self,
        layer: &Layer<VoxelDetail>,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, LayerError> {
        let keys = known_keys(layer)?;
        let shader = build_shader(layer, &keys)?;
        self.known_keys = keys;

        let request = ResourceRequest::Voxel {
            locator: layer.detail.source.resolve(),
            shader,
        };
        Ok(vec![self.leaf.start(&layer.id, request, ctx)])
    }

    fn complete(
        &mut self,
        layer: &Layer<VoxelDetail>,
        path: &[String],
        load: FinishedLoad,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Completion, LayerError> {
        let Some((resource, index)) = self.leaf.accept(&layer.id, path, load, ctx)? else {
            return Ok(Completion::discarded());
        };
        ctx.viewer.set_show(resource, layer.is_visible);
        ctx.viewer.set_uniform(
            resource,
            "u_alpha",
            UniformValue::Float(f64::from(layer.opacity)),
        );
        ctx.viewer.set_uniform(
            resource,
            "u_filterOperator",
            UniformValue::Int(layer.detail.filter_operator.shader_index()),
        );
        self.apply_uniforms(resource, mapping_uniforms(layer, &self.known_keys), ctx);
        Ok(Completion::attached(resource, index))
    }

    fn react(
        &mut self,
        layer: &Layer<VoxelDetail>,
        reaction: VoxelReaction,
        ctx: &mut SyncContext<'_>,
    ) -> Result<Vec<PendingLoad>, SyncFailure> {
        let Some(id) = self.leaf.resource() else {
            return Ok(Vec::new());
        };
        match reaction {
            VoxelReaction::Opacity => ctx.viewer.set_uniform(
                id,
                "u_alpha",
                UniformValue::Float(f64::from(layer.opacity)),
            ),
            VoxelReaction::Visibility => ctx.viewer.set_show(id, layer.is_visible),
            VoxelReaction::FilterOperator => ctx.viewer.set_uniform(
                id,
                "u_filterOperator",
                UniformValue::Int(layer.detail.filter_operator.shader_index()),
            ),
            VoxelReaction::Mappings => {
                self.apply_uniforms(id, mapping_uniforms(layer, &self.known_keys), ctx)
            }
        }
        Ok(Vec::new())
    }

    fn remove_from_viewer(&mut self, ctx: &mut SyncContext<'_>) {
        self.leaf.release(ctx);
    }

    fn zoom_into_view(&self, _layer: &Layer<VoxelDetail>, ctx: &mut SyncContext<'_>) {
        self.leaf.fly_to(ctx);
    }

    fn move_to_top(&self, ctx: &mut SyncContext<'_>) {
        self.leaf.raise_to_top(ctx);
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.leaf.resources()
    }
}
