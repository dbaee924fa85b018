//! In-Memory-Render-Engine für Tests und das Replay-Binary.
//!
//! Bildet Stacks, Ressourcen-Eigenschaften und Freigaben nach und zählt
//! alle Lebenszyklus-Ereignisse mit.

use indexmap::IndexMap;

use super::types::{
    FlyTarget, LoadError, LoadFuture, LoadedResource, ResourceId, ResourceRequest, StackTarget,
    UniformValue,
};
use super::viewer::{DrawStack, ResourceFactory, Viewer};
use crate::core::parse_catalog;

/// Stack mit Zählern für Einfüge- und Entfernungs-Operationen.
#[derive(Debug, Clone, Default)]
pub struct MemoryStack {
    items: Vec<ResourceId>,
    adds: usize,
    removes: usize,
}

impl MemoryStack {
    pub fn items(&self) -> &[ResourceId] {
        &self.items
    }

    pub fn adds(&self) -> usize {
        self.adds
    }

    pub fn removes(&self) -> usize {
        self.removes
    }
}

impl DrawStack for MemoryStack {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Option<ResourceId> {
        DrawStack::get(&self.items, index)
    }

    fn index_of(&self, id: ResourceId) -> Option<usize> {
        self.items.index_of(id)
    }

    fn add_top(&mut self, id: ResourceId) {
        self.adds += 1;
        self.items.add_top(id);
    }

    fn add_at(&mut self, id: ResourceId, index: usize) {
        self.adds += 1;
        self.items.add_at(id, index);
    }

    fn remove(&mut self, id: ResourceId) -> bool {
        let removed = DrawStack::remove(&mut self.items, id);
        if removed {
            self.removes += 1;
        }
        removed
    }

    fn raise_to_top(&mut self, id: ResourceId) -> bool {
        self.items.raise_to_top(id)
    }
}

/// Zustand einer lebenden Ressource.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryResource {
    pub request: ResourceRequest,
    pub entity_count: usize,
    pub alpha: f32,
    pub show: bool,
    pub pickable: bool,
    pub uniforms: IndexMap<String, UniformValue>,
}

/// Lebenszyklus-Zähler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerStats {
    pub instantiated: usize,
    pub destroyed: usize,
    /// Verworfene Ladeergebnisse
    pub discarded: usize,
    /// Freigaben bereits freigegebener oder unbekannter Ressourcen
    pub double_releases: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobeTranslucency {
    pub enabled: bool,
    pub alpha: f32,
}

impl Default for GlobeTranslucency {
    fn default() -> Self {
        Self {
            enabled: false,
            alpha: 1.0,
        }
    }
}

/// Render-Engine ohne GPU.
#[derive(Debug, Default)]
pub struct MemoryViewer {
    next_id: u64,
    resources: IndexMap<ResourceId, MemoryResource>,
    imagery: MemoryStack,
    primitives: MemoryStack,
    data_sources: MemoryStack,
    draped: IndexMap<ResourceId, MemoryStack>,
    globe: GlobeTranslucency,
    flights: Vec<FlyTarget>,
    stats: ViewerStats,
}

impl MemoryViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(&self, id: ResourceId) -> Option<&MemoryResource> {
        self.resources.get(&id)
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.resources.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.resources.len()
    }

    /// Ressourcen eines Stacks, unterste zuerst.
    pub fn items(&self, target: StackTarget) -> Vec<ResourceId> {
        self.memory_stack(target)
            .map(|stack| stack.items().to_vec())
            .unwrap_or_default()
    }

    pub fn memory_stack(&self, target: StackTarget) -> Option<&MemoryStack> {
        match target {
            StackTarget::Imagery => Some(&self.imagery),
            StackTarget::Primitives => Some(&self.primitives),
            StackTarget::DataSources => Some(&self.data_sources),
            StackTarget::Draped(id) => self.draped.get(&id),
        }
    }

    pub fn globe(&self) -> GlobeTranslucency {
        self.globe
    }

    pub fn flights(&self) -> &[FlyTarget] {
        &self.flights
    }

    pub fn stats(&self) -> ViewerStats {
        self.stats
    }

    /// Legt eine Ressource direkt an, ohne Factory (z.B. fremde Layer).
    pub fn spawn(&mut self, target: StackTarget, request: ResourceRequest) -> ResourceId {
        let id = self.instantiate(LoadedResource::new(request));
        if let Some(stack) = self.stack_mut(target) {
            stack.add_top(id);
        }
        id
    }
}

impl Viewer for MemoryViewer {
    fn instantiate(&mut self, loaded: LoadedResource) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        if matches!(loaded.request, ResourceRequest::Tileset { .. }) {
            self.draped.insert(id, MemoryStack::default());
        }
        self.resources.insert(
            id,
            MemoryResource {
                request: loaded.request,
                entity_count: loaded.entity_count,
                alpha: 1.0,
                show: true,
                pickable: true,
                uniforms: IndexMap::new(),
            },
        );
        self.stats.instantiated += 1;
        id
    }

    fn discard(&mut self, loaded: LoadedResource) {
        log::debug!("Ladeergebnis verworfen: {}", loaded.request.location());
        self.stats.discarded += 1;
    }

    fn destroy(&mut self, id: ResourceId) {
        if self.resources.shift_remove(&id).is_none() {
            log::warn!("{} wurde bereits freigegeben", id);
            self.stats.double_releases += 1;
            return;
        }
        if let Some(draped) = self.draped.shift_remove(&id) {
            if !draped.items().is_empty() {
                log::warn!("{} mit {} drapierten Imageries freigegeben", id, draped.len());
            }
        }
        self.stats.destroyed += 1;
    }

    fn stack(&self, target: StackTarget) -> Option<&dyn DrawStack> {
        self.memory_stack(target).map(|stack| stack as &dyn DrawStack)
    }

    fn stack_mut(&mut self, target: StackTarget) -> Option<&mut dyn DrawStack> {
        let stack = match target {
            StackTarget::Imagery => Some(&mut self.imagery),
            StackTarget::Primitives => Some(&mut self.primitives),
            StackTarget::DataSources => Some(&mut self.data_sources),
            StackTarget::Draped(id) => self.draped.get_mut(&id),
        };
        stack.map(|stack| stack as &mut dyn DrawStack)
    }

    fn set_alpha(&mut self, id: ResourceId, alpha: f32) {
        if let Some(resource) = self.resources.get_mut(&id) {
            resource.alpha = alpha;
        }
    }

    fn set_show(&mut self, id: ResourceId, show: bool) {
        if let Some(resource) = self.resources.get_mut(&id) {
            resource.show = show;
        }
    }

    fn set_pickable(&mut self, id: ResourceId, pickable: bool) {
        if let Some(resource) = self.resources.get_mut(&id) {
            resource.pickable = pickable;
        }
    }

    fn set_uniform(&mut self, id: ResourceId, name: &str, value: UniformValue) {
        if let Some(resource) = self.resources.get_mut(&id) {
            resource.uniforms.insert(name.to_string(), value);
        }
    }

    fn set_globe_translucency(&mut self, enabled: bool, alpha: f32) {
        self.globe = GlobeTranslucency { enabled, alpha };
    }

    fn fly_to(&mut self, target: FlyTarget) {
        self.flights.push(target);
    }
}

/// Resource-Factory mit vorgegebenen Inhalten und Fehlern.
#[derive(Debug, Default)]
pub struct MemoryFactory {
    payloads: IndexMap<String, String>,
    failures: IndexMap<String, LoadError>,
    requests: Vec<ResourceRequest>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hinterlegt Textinhalt (z.B. Erdbeben-Katalog) für eine Adresse.
    pub fn with_payload(mut self, location: impl Into<String>, text: impl Into<String>) -> Self {
        self.payloads.insert(location.into(), text.into());
        self
    }

    /// Jede Anfrage an `location` schlägt mit `error` fehl.
    pub fn fail(&mut self, location: impl Into<String>, error: LoadError) {
        self.failures.insert(location.into(), error);
    }

    pub fn heal(&mut self, location: &str) {
        self.failures.shift_remove(location);
    }

    /// Alle bisher gestellten Anfragen.
    pub fn requests(&self) -> &[ResourceRequest] {
        &self.requests
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    fn load(&self, request: &ResourceRequest) -> Result<LoadedResource, LoadError> {
        let location = request.location();
        if let Some(error) = self.failures.get(&location) {
            return Err(error.clone());
        }

        let mut loaded = LoadedResource::new(request.clone());
        if let ResourceRequest::Events { .. } = request {
            if let Some(text) = self.payloads.get(&location) {
                let events = parse_catalog(text).map_err(|e| LoadError::Parse {
                    location: location.clone(),
                    message: e.to_string(),
                })?;
                loaded.entity_count = events.len();
            }
        }
        Ok(loaded)
    }
}

impl ResourceFactory for MemoryFactory {
    fn create(&mut self, request: &ResourceRequest) -> LoadFuture {
        self.requests.push(request.clone());
        let result = self.load(request);
        Box::pin(std::future::ready(result))
    }
}
