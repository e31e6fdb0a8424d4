//! Stacked display regions.
//!
//! Each playback session renders into its own region, and the ad service draws
//! its UI into another. Regions are ordered bottom to top and never share
//! backing surfaces.

use std::fmt;

/// Opaque handle to a display region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(u64);

impl RegionId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    ContentSurface,
    AdSurface,
    /// Ad-service UI (skip button, countdown, click-through).
    AdUi,
}

impl RegionKind {
    pub fn is_video_surface(&self) -> bool {
        matches!(self, RegionKind::ContentSurface | RegionKind::AdSurface)
    }
}

struct Region {
    id: RegionId,
    kind: RegionKind,
    name: String,
    visible: bool,
}

/// Lightweight snapshot of region state for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    pub id: RegionId,
    pub kind: RegionKind,
    pub name: String,
    pub visible: bool,
    pub z_index: usize,
}

/// Ordered stack of display regions, index 0 at the bottom.
pub struct SurfaceStack {
    regions: Vec<Region>,
    next_id: u64,
}

impl Default for SurfaceStack {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceStack {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            next_id: 1,
        }
    }

    /// Add a visible region on top of the stack.
    pub fn add_region(&mut self, kind: RegionKind, name: impl Into<String>) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;
        let name = name.into();
        log::debug!("Adding {kind:?} region '{name}' as {id}");
        self.regions.push(Region {
            id,
            kind,
            name,
            visible: true,
        });
        id
    }

    /// Returns false if the region was not in the stack.
    pub fn remove_region(&mut self, id: RegionId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let region = self.regions.remove(index);
        log::debug!("Removed region '{}' ({id})", region.name);
        true
    }

    pub fn raise_to_top(&mut self, id: RegionId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let region = self.regions.remove(index);
        self.regions.push(region);
        true
    }

    pub fn lower_to_bottom(&mut self, id: RegionId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let region = self.regions.remove(index);
        self.regions.insert(0, region);
        true
    }

    pub fn set_visible(&mut self, id: RegionId, visible: bool) -> bool {
        match self.regions.iter_mut().find(|r| r.id == id) {
            Some(region) => {
                region.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn is_visible(&self, id: RegionId) -> bool {
        self.regions.iter().any(|r| r.id == id && r.visible)
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn z_index(&self, id: RegionId) -> Option<usize> {
        self.index_of(id)
    }

    pub fn kind(&self, id: RegionId) -> Option<RegionKind> {
        self.regions.iter().find(|r| r.id == id).map(|r| r.kind)
    }

    /// Topmost visible video surface, i.e. the one the viewer sees.
    pub fn top_visible_surface(&self) -> Option<RegionId> {
        self.regions
            .iter()
            .rev()
            .find(|r| r.visible && r.kind.is_video_surface())
            .map(|r| r.id)
    }

    pub fn visible_surface_count(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| r.visible && r.kind.is_video_surface())
            .count()
    }

    pub fn region_infos(&self) -> Vec<RegionInfo> {
        self.regions
            .iter()
            .enumerate()
            .map(|(z_index, r)| RegionInfo {
                id: r.id,
                kind: r.kind,
                name: r.name.clone(),
                visible: r.visible,
                z_index,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn index_of(&self, id: RegionId) -> Option<usize> {
        self.regions.iter().position(|r| r.id == id)
    }
}
