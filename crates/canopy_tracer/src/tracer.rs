//! Path tracing state machine.
//!
//! A path alternates between finding the closest hit and resolving it:
//! roulette, tallying flux into the hit primitive, choosing reflection or
//! transmission and drawing the next direction. The loop is iterative so
//! the stack stays flat at any depth.

use canopy_core::{BandOptics, ReflectanceModel, RunConfig, RussianRoulette, Scene};

use crate::grid::Grid;
use crate::intersect::is_intersection;
use crate::ray::Ray;
use crate::reflectance::scatter;
use crate::sampler::UniformSource;

/// Tracing options taken from the run configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSettings {
    pub max_depth: u32,
    pub russian_roulette: RussianRoulette,
    pub first_hit_only: bool,
    pub one_ray_per_spectrum: bool,
    pub reflectance_model: ReflectanceModel,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self::from(&RunConfig::default())
    }
}

impl From<&RunConfig> for TraceSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            russian_roulette: config.russian_roulette,
            first_hit_only: config.first_hit_only,
            one_ray_per_spectrum: config.one_ray_per_spectrum,
            reflectance_model: config.reflectance_model,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// Looking for the next hit
    Tracing,
    /// Hit resolved; the ray holds the next segment
    Continue,
    Terminated,
}

/// Closest intersection of a ray segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub primitive: usize,
    pub distance: f64,
}

/// Pick reflection (`false`) or transmission (`true`) for a ray carrying
/// `intensity`, and rescale the bands in `bands` for the chosen branch.
///
/// The branch is drawn with probability proportional to the summed
/// intensity-weighted reflectance or transmittance; every band is divided
/// by that aggregate probability. Returns `None` when nothing is scattered.
pub fn choose_branch(
    intensity: &mut [f64],
    bands: &[usize],
    optics: &[BandOptics],
    u: f64,
) -> Option<bool> {
    let mut reflected = 0.0;
    let mut transmitted = 0.0;
    for &b in bands {
        reflected += intensity[b] * optics[b].reflectance;
        transmitted += intensity[b] * optics[b].transmittance;
    }
    let total = reflected + transmitted;
    if total <= 0.0 {
        return None;
    }

    let p_reflect = reflected / total;
    let transmit = u >= p_reflect;
    let p = if transmit { 1.0 - p_reflect } else { p_reflect };
    for &b in bands {
        let weight = if transmit {
            optics[b].transmittance
        } else {
            optics[b].reflectance
        };
        intensity[b] *= weight / p;
    }
    Some(transmit)
}

/// Band whose lobe shapes the next direction, drawn in proportion to
/// `intensity × reflectance` (or transmittance).
fn representative_band(
    intensity: &[f64],
    bands: &[usize],
    optics: &[BandOptics],
    transmit: bool,
    u: f64,
) -> usize {
    let weight = |b: usize| {
        let o = &optics[b];
        intensity[b] * if transmit { o.transmittance } else { o.reflectance }
    };
    let total: f64 = bands.iter().map(|&b| weight(b)).sum();
    let target = u * total;
    let mut running = 0.0;
    for &b in bands {
        running += weight(b);
        if target < running {
            return b;
        }
    }
    bands[bands.len() - 1]
}

pub struct Tracer<'a> {
    scene: &'a mut Scene,
    grid: &'a Grid,
    settings: TraceSettings,
    /// Last signature handed to a ray segment
    signature: u64,
    all_bands: Vec<usize>,
}

impl<'a> Tracer<'a> {
    pub fn new(scene: &'a mut Scene, grid: &'a Grid, settings: TraceSettings) -> Self {
        // Continue after stamps left by earlier runs on the same scene
        let signature = scene.primitives.iter().map(|p| p.signature).max().unwrap_or(0);
        let all_bands = (0..scene.bands()).collect();
        Self {
            scene,
            grid,
            settings,
            signature,
            all_bands,
        }
    }

    pub fn settings(&self) -> &TraceSettings {
        &self.settings
    }

    /// Trace a source ray in the configured spectral mode.
    ///
    /// One ray carries every band, or each band follows its own path from
    /// the same start. Returns the number of surfaces hit.
    pub fn trace<S: UniformSource + ?Sized>(&mut self, ray: &Ray, source: &mut S) -> u32 {
        if self.settings.one_ray_per_spectrum {
            let bands = std::mem::take(&mut self.all_bands);
            let mut path = ray.clone();
            let hits = self.trace_path(&mut path, &bands, source);
            self.all_bands = bands;
            return hits;
        }

        let mut hits = 0;
        for band in 0..self.scene.bands() {
            let mut path = ray.clone();
            hits += self.trace_path(&mut path, &[band], source);
        }
        hits
    }

    /// Follow `ray` until it leaves the scene or terminates, tallying the
    /// given bands. Returns the number of surfaces hit.
    pub fn trace_path<S: UniformSource + ?Sized>(
        &mut self,
        ray: &mut Ray,
        bands: &[usize],
        source: &mut S,
    ) -> u32 {
        let mut hits = 0;
        let mut state = PathState::Tracing;
        while state != PathState::Terminated {
            state = match state {
                PathState::Tracing => match self.closest_hit(ray) {
                    Some(hit) => {
                        hits += 1;
                        self.resolve(ray, hit, bands, source)
                    }
                    None => PathState::Terminated,
                },
                PathState::Continue => PathState::Tracing,
                PathState::Terminated => PathState::Terminated,
            };
        }
        hits
    }

    /// Nearest primitive along `ray`, walking the grid cell by cell.
    pub fn closest_hit(&mut self, ray: &mut Ray) -> Option<Hit> {
        self.signature += 1;
        ray.signature = self.signature;
        if let Some(origin) = ray.origin_primitive {
            self.scene.primitives[origin].signature = ray.signature;
        }

        if !self.grid.find_box_intersection(ray) {
            return None;
        }
        let (mut cell, mut walker) = self.grid.find_first_cell(ray);

        let mut best = f64::INFINITY;
        let mut hit = None;
        loop {
            for &index in self.grid.cell(cell) {
                let index = index as usize;
                if let Some(t) = is_intersection(&mut self.scene.primitives[index], ray, best) {
                    best = t;
                    hit = Some(index);
                }
            }
            // Nothing in later cells can be closer
            if best <= walker.exit_distance() {
                break;
            }
            match self.grid.find_next_cell(&mut walker) {
                Some(next) => cell = next,
                None => break,
            }
        }

        hit.map(|primitive| Hit {
            primitive,
            distance: best,
        })
    }

    fn resolve<S: UniformSource + ?Sized>(
        &mut self,
        ray: &mut Ray,
        hit: Hit,
        bands: &[usize],
        source: &mut S,
    ) -> PathState {
        let roulette = self.settings.russian_roulette;
        if roulette.threshold > 0.0 && ray.mean_intensity(bands) <= roulette.threshold {
            if source.next_uniform() >= roulette.survival {
                return PathState::Terminated;
            }
            for &b in bands {
                ray.intensity[b] /= roulette.survival;
            }
        }

        let direction = ray.direction();
        let scene = &mut *self.scene;
        let band_count = scene.bands();
        let primitive = &mut scene.primitives[hit.primitive];
        let material = &scene.materials[primitive.material_for(direction)];
        let optics: Vec<BandOptics> = (0..band_count).map(|b| material.band(b)).collect();

        if !self.settings.first_hit_only || ray.depth == 0 {
            let front = primitive.is_front_hit(direction);
            let cosine = primitive.normal.dot(direction).abs();
            for &b in bands {
                let flux = ray.intensity[b];
                let tally = &mut primitive.accumulators[b];
                tally.absorbed += flux * optics[b].absorptance();
                if front {
                    tally.incident_front += flux;
                } else {
                    tally.incident_back += flux;
                }
                if ray.depth == 0 {
                    tally.direct_hits += 1;
                }
                tally.record_cosine(cosine);
            }
        }

        ray.depth += 1;
        if ray.depth > self.settings.max_depth {
            return PathState::Terminated;
        }

        // Lobe choice weighs the intensities from before the branch scaling
        let arriving = if bands.len() > 1 {
            ray.intensity.clone()
        } else {
            Vec::new()
        };
        let transmit = match choose_branch(&mut ray.intensity, bands, &optics, source.next_uniform()) {
            Some(transmit) => transmit,
            None => return PathState::Terminated,
        };
        let band = if bands.len() == 1 {
            bands[0]
        } else {
            representative_band(&arriving, bands, &optics, transmit, source.next_uniform())
        };
        let exponent = if transmit {
            optics[band].transmission_exponent
        } else {
            optics[band].specular_exponent
        };

        let normal = primitive.normal;
        let u1 = source.next_uniform();
        let u2 = source.next_uniform();
        let outgoing = scatter(
            self.settings.reflectance_model,
            direction,
            normal,
            exponent,
            transmit,
            u1,
            u2,
        );

        let point = ray.at(hit.distance);
        ray.redirect(point, outgoing, Some(hit.primitive));
        PathState::Continue
    }
}
