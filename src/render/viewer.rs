//! Schnittstellen, die die Host-Render-Engine bereitstellen muss.

use super::types::{
    FlyTarget, LoadFuture, LoadedResource, ResourceId, ResourceRequest, StackTarget, UniformValue,
};

/// Ein Draw-Order-Container (unterstes Element bei Index 0).
pub trait DrawStack {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<ResourceId>;

    fn index_of(&self, id: ResourceId) -> Option<usize>;

    /// Fügt oben ein.
    fn add_top(&mut self, id: ResourceId);

    /// Fügt an `index` ein; größere Indizes landen oben.
    fn add_at(&mut self, id: ResourceId, index: usize);

    /// Entfernt die Ressource; `false`, wenn sie nicht enthalten war.
    fn remove(&mut self, id: ResourceId) -> bool;

    /// Verschiebt die Ressource nach oben; `false`, wenn sie fehlt.
    fn raise_to_top(&mut self, id: ResourceId) -> bool;
}

impl DrawStack for Vec<ResourceId> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<ResourceId> {
        self.as_slice().get(index).copied()
    }

    fn index_of(&self, id: ResourceId) -> Option<usize> {
        self.iter().position(|&item| item == id)
    }

    fn add_top(&mut self, id: ResourceId) {
        self.push(id);
    }

    fn add_at(&mut self, id: ResourceId, index: usize) {
        let index = index.min(self.as_slice().len());
        self.insert(index, id);
    }

    fn remove(&mut self, id: ResourceId) -> bool {
        match self.index_of(id) {
            Some(index) => {
                Vec::remove(self, index);
                true
            }
            None => false,
        }
    }

    fn raise_to_top(&mut self, id: ResourceId) -> bool {
        match self.index_of(id) {
            Some(index) => {
                let item = Vec::remove(self, index);
                self.push(item);
                true
            }
            None => false,
        }
    }
}

/// Die Render-Engine aus Sicht der Controller.
///
/// Ressourcen gehören dem Controller, der sie per [`Viewer::instantiate`]
/// erzeugt hat; er gibt sie genau einmal per [`Viewer::destroy`] frei.
pub trait Viewer {
    /// Macht eine geladene Ressource lebendig (noch in keinem Stack).
    fn instantiate(&mut self, loaded: LoadedResource) -> ResourceId;

    /// Gibt ein nicht mehr benötigtes Ladeergebnis frei.
    fn discard(&mut self, loaded: LoadedResource);

    /// Gibt eine lebende Ressource frei.
    fn destroy(&mut self, id: ResourceId);

    fn stack(&self, target: StackTarget) -> Option<&dyn DrawStack>;

    fn stack_mut(&mut self, target: StackTarget) -> Option<&mut dyn DrawStack>;

    fn set_alpha(&mut self, id: ResourceId, alpha: f32);

    fn set_show(&mut self, id: ResourceId, show: bool);

    /// Schaltet Feature-Picking einer Imagery.
    fn set_pickable(&mut self, id: ResourceId, pickable: bool);

    fn set_uniform(&mut self, id: ResourceId, name: &str, value: UniformValue);

    /// Transluzenz des Globus (betrifft alle Imageries).
    fn set_globe_translucency(&mut self, enabled: bool, alpha: f32);

    fn fly_to(&mut self, target: FlyTarget);
}

/// Asynchrone Ressourcen-Erzeugung (Netzwerk, Parsing).
pub trait ResourceFactory {
    fn create(&mut self, request: &ResourceRequest) -> LoadFuture;
}
