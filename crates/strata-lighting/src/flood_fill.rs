//! Breadth-first light propagation and removal.
//!
//! Light spreads from a cell to its six face neighbors, losing one intensity
//! level per hop, and only into cells that transmit light. Removal walks
//! outwards zeroing every cell that was lit by the removed source, collects
//! the brighter cells it meets as seeds, and only then re-propagates from
//! those seeds.

use std::collections::VecDeque;

use glam::IVec3;
use strata_voxel::{Face, LIGHT_NONE, Light, intensity, with_intensity};

/// World-space access to light values and light transmission.
///
/// Implementations use interior mutability so that flood fill can run while
/// other readers hold shared references.
pub trait LightVolume {
    /// Returns the light stored at `pos`.
    fn light(&self, pos: IVec3) -> Light;

    /// Stores `light` at `pos`.
    fn set_light(&self, pos: IVec3, light: Light);

    /// Returns `true` if light may enter the cell at `pos`.
    fn is_transmissive(&self, pos: IVec3) -> bool;
}

/// Sets the light at `pos` and floods it outwards.
pub fn add_light<V: LightVolume + ?Sized>(volume: &V, pos: IVec3, light: Light) {
    volume.set_light(pos, light);
    let mut frontier = VecDeque::from([pos]);
    propagate(volume, &mut frontier);
}

/// Removes the light at `pos` and everything that depended on it, then
/// relights the vacated area from any other sources bordering it.
pub fn remove_light<V: LightVolume + ?Sized>(volume: &V, pos: IVec3) {
    let old = volume.light(pos);
    volume.set_light(pos, LIGHT_NONE);

    let mut removal: VecDeque<(IVec3, Light)> = VecDeque::from([(pos, old)]);
    let mut frontier: VecDeque<IVec3> = VecDeque::new();

    while let Some((cell, light)) = removal.pop_front() {
        let level = intensity(light);
        for face in Face::ALL {
            let neighbor = cell + face.normal();
            let neighbor_light = volume.light(neighbor);
            let neighbor_level = intensity(neighbor_light);
            if neighbor_level == 0 {
                continue;
            }
            if neighbor_level < level {
                volume.set_light(neighbor, LIGHT_NONE);
                removal.push_back((neighbor, neighbor_light));
            } else {
                frontier.push_back(neighbor);
            }
        }
    }

    // Seeds only become valid once every dependent cell has been cleared.
    propagate(volume, &mut frontier);
}

/// Drains `frontier`, spreading each cell's light to dimmer neighbors.
pub fn propagate<V: LightVolume + ?Sized>(volume: &V, frontier: &mut VecDeque<IVec3>) {
    while let Some(cell) = frontier.pop_front() {
        let light = volume.light(cell);
        let level = intensity(light);
        if level < 2 {
            continue;
        }
        for face in Face::ALL {
            let neighbor = cell + face.normal();
            if !volume.is_transmissive(neighbor) {
                continue;
            }
            if intensity(volume.light(neighbor)) <= level - 2 {
                volume.set_light(neighbor, with_intensity(light, level - 1));
                frontier.push_back(neighbor);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
