//! Flat per-primitive flux records for visualization collaborators.

use crate::scene::Scene;

/// Tallies of one primitive in one band, laid out for raw byte upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FluxRecord {
    /// Index of the polygon in the scene description
    pub primitive: u32,
    pub band: u32,
    pub absorbed: f64,
    pub incident_front: f64,
    pub incident_back: f64,
    pub direct_hits: u64,
}

impl FluxRecord {
    /// One record per primitive and band, primitive-major.
    pub fn from_scene(scene: &Scene) -> Vec<FluxRecord> {
        let mut records = Vec::with_capacity(scene.primitive_count() * scene.bands());
        for primitive in &scene.primitives {
            for (band, acc) in primitive.accumulators.iter().enumerate() {
                records.push(FluxRecord {
                    primitive: primitive.source_index as u32,
                    band: band as u32,
                    absorbed: acc.absorbed,
                    incident_front: acc.incident_front,
                    incident_back: acc.incident_back,
                    direct_hits: acc.direct_hits,
                });
            }
        }
        records
    }
}

/// View records as bytes.
pub fn as_bytes(records: &[FluxRecord]) -> &[u8] {
    bytemuck::cast_slice(records)
}
