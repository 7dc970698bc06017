//! Simulation runner.
//!
//! Owns the scene behind one mutex. A run holds the lock for the whole
//! rebuild, trace and statistics pass, so a reader sees either the state
//! before the run or after it.

use std::f64::consts::{PI, TAU};
use std::sync::{Arc, Mutex, MutexGuard};

use canopy_core::{
    DirectionalLight, FluxRecord, LightModel, ReturnType, RunConfig, Scene, SceneDescription,
    SkyTable,
};
use canopy_math::{DQuat, DVec3, Frame};
use canopy_qmc::{RngStreamFactory, Statistics, Variable};

use crate::error::{TraceError, TraceResult};
use crate::grid::{Grid, GRID_EPSILON};
use crate::ray::Ray;
use crate::sampler::{QmcSampler, UniformSource};
use crate::sky::SkyModel;
use crate::tracer::{TraceSettings, Tracer};

/// Distance past the bounding sphere at which source disks sit, relative
/// to its radius.
const SOURCE_MARGIN: f64 = 1e-3;

/// Statistics of one return value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryBandResult {
    pub return_type: ReturnType,
    pub mean: f64,
    pub variance: f64,
    /// Half width of the confidence interval around `mean`
    pub half_width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub query: usize,
    pub area: f64,
    pub bands: Vec<QueryBandResult>,
    /// Correlation of the first two bands across blocks
    pub band_correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub queries: Vec<QueryResult>,
    pub blocks: usize,
    pub rays_traced: u64,
    pub surface_hits: u64,
    /// Primitive-band tallies cut back to the available energy
    pub clamp_count: u64,
}

/// Everything a run mutates.
pub struct SimulationState {
    pub scene: Scene,
    pub grid: Option<Grid>,
    pub sky: Option<SkyModel>,
    pub result: Option<SimulationResult>,
}

enum Emitter<'a> {
    Directional {
        lights: &'a [DirectionalLight],
        cdf: Vec<f64>,
    },
    Sky {
        model: &'a SkyModel,
        rotation: DQuat,
    },
}

/// Turns path coordinates into source rays leaving a disk that covers the
/// scene's bounding sphere.
pub struct SourceRays<'a> {
    emitter: Emitter<'a>,
    center: DVec3,
    radius: f64,
    intensity: Vec<f64>,
}

impl<'a> SourceRays<'a> {
    /// Rays for `points` paths per block with unit source irradiance split
    /// over the bands by `band_weights` (summing to 1).
    fn new(emitter: Emitter<'a>, grid: &Grid, band_weights: &[f64], points: u64) -> Self {
        let sphere = grid.bounding_sphere();
        let radius = sphere.radius.max(GRID_EPSILON);
        let disk_flux = PI * radius * radius / points as f64;
        Self {
            emitter,
            center: sphere.center,
            radius,
            intensity: band_weights.iter().map(|w| w * disk_flux).collect(),
        }
    }

    pub fn directional(
        lights: &'a [DirectionalLight],
        grid: &Grid,
        band_weights: &[f64],
        points: u64,
    ) -> Self {
        let mut running = 0.0;
        let cdf = lights
            .iter()
            .map(|l| {
                running += l.weight;
                running
            })
            .collect();
        Self::new(Emitter::Directional { lights, cdf }, grid, band_weights, points)
    }

    /// Sky directions are sampled around +Y and turned to the scene's `up`.
    pub fn sky(model: &'a SkyModel, up: DVec3, grid: &Grid, band_weights: &[f64], points: u64) -> Self {
        let rotation = DQuat::from_rotation_arc(DVec3::Y, up.normalize());
        Self::new(Emitter::Sky { model, rotation }, grid, band_weights, points)
    }

    /// Next source ray, drawing its coordinates from `source`.
    pub fn generate<S: UniformSource + ?Sized>(&self, source: &mut S) -> Ray {
        let (toward_light, u_axis, v_axis) = match &self.emitter {
            Emitter::Directional { lights, cdf } => {
                let index = if lights.len() == 1 {
                    0
                } else {
                    let u = source.next_uniform() * cdf[cdf.len() - 1];
                    cdf.partition_point(|&c| c <= u).min(lights.len() - 1)
                };
                let d = lights[index].direction;
                let frame = Frame::from_w(d);
                (d, frame.u, frame.v)
            }
            Emitter::Sky { model, rotation } => {
                let sample = model.sample(source.next_uniform(), source.next_uniform());
                (
                    *rotation * sample.direction,
                    *rotation * sample.u_axis,
                    *rotation * sample.v_axis,
                )
            }
        };

        let r = self.radius * source.next_uniform().sqrt();
        let phi = TAU * source.next_uniform();
        let distance = self.radius * (1.0 + SOURCE_MARGIN) + GRID_EPSILON;
        let origin = self.center
            + toward_light * distance
            + u_axis * (r * phi.cos())
            + v_axis * (r * phi.sin());

        Ray::new(origin, -toward_light, self.intensity.clone())
    }
}

/// Cap each primitive's absorbed flux at the energy its area can receive
/// in each band. Returns the number of tallies capped.
pub fn clamp_absorbed(scene: &mut Scene, band_weights: &[f64]) -> u64 {
    let mut clamped = 0;
    for primitive in scene.primitives.iter_mut() {
        let area = primitive.area;
        for (tally, weight) in primitive.accumulators.iter_mut().zip(band_weights) {
            let available = area * weight;
            if tally.absorbed > available {
                tally.absorbed = available;
                clamped += 1;
            }
        }
    }
    clamped
}

/// Return value of every query and band, query-major.
pub fn query_values(scene: &Scene, return_types: &[ReturnType], areas: &[f64]) -> Vec<f64> {
    let bands = return_types.len();
    let mut absorbed = vec![0.0; areas.len() * bands];
    let mut front = vec![0.0; areas.len() * bands];
    let mut back = vec![0.0; areas.len() * bands];
    let mut hits = vec![0u64; areas.len() * bands];

    for primitive in &scene.primitives {
        let Some(query) = primitive.query else {
            continue;
        };
        for (band, tally) in primitive.accumulators.iter().enumerate().take(bands) {
            let slot = query * bands + band;
            absorbed[slot] += tally.absorbed;
            front[slot] += tally.incident_front;
            back[slot] += tally.incident_back;
            hits[slot] += tally.hits;
        }
    }

    let per_area = |value: f64, area: f64| if area > 0.0 { value / area } else { 0.0 };
    (0..areas.len() * bands)
        .map(|slot| {
            let area = areas[slot / bands];
            match return_types[slot % bands] {
                ReturnType::AbsorbedFlux => absorbed[slot],
                ReturnType::AbsorbedIrradiance => per_area(absorbed[slot], area),
                ReturnType::IncidentUpper => per_area(front[slot], area),
                ReturnType::IncidentLower => per_area(back[slot], area),
                ReturnType::IntersectionCount => hits[slot] as f64,
            }
        })
        .collect()
}

pub struct Simulation {
    config: RunConfig,
    lights: Vec<DirectionalLight>,
    state: Arc<Mutex<SimulationState>>,
}

impl Simulation {
    /// Validate `config`, build the scene and prepare the light model.
    /// Every configuration error surfaces here, before any tracing.
    pub fn new(description: &SceneDescription, config: RunConfig) -> TraceResult<Self> {
        config.validate()?;
        let scene = description.build(config.spectrum_bands)?;

        let (lights, sky) = match &description.light {
            LightModel::Directional(lights) => (LightModel::normalized_lights(lights)?, None),
            LightModel::Sky(params) => (Vec::new(), Some(SkyModel::from_parameters(params)?)),
        };

        Ok(Self {
            config,
            lights,
            state: Arc::new(Mutex::new(SimulationState {
                scene,
                grid: None,
                sky,
                result: None,
            })),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Shared handle for collaborators that read between runs.
    pub fn state(&self) -> Arc<Mutex<SimulationState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> TraceResult<MutexGuard<'_, SimulationState>> {
        self.state.lock().map_err(|_| TraceError::Poisoned)
    }

    /// Rebuild the grid, trace every block and gather statistics.
    pub fn run(&self) -> TraceResult<SimulationResult> {
        let config = &self.config;
        let mut guard = self.lock()?;
        let SimulationState {
            scene,
            grid: grid_slot,
            sky,
            result: result_slot,
        } = &mut *guard;

        let grid = Grid::build(config.grid_resolution, scene)?;
        let mut factory = match config.seed {
            Some(seed) => RngStreamFactory::from_u64(seed),
            None => RngStreamFactory::new(),
        };
        let mut sampler = QmcSampler::new(config, &mut factory)?;

        let bands = scene.bands();
        let weights = config.normalized_band_weights();
        let areas: Vec<f64> = (0..scene.query_count()).map(|q| scene.query_area(q)).collect();
        let mut stats = Statistics::new(areas.len() * bands);
        let mut pairs = Statistics::new(areas.len());

        let sources = match sky.as_ref() {
            Some(model) => SourceRays::sky(model, scene.up, &grid, &weights, config.points),
            None => SourceRays::directional(&self.lights, &grid, &weights, config.points),
        };
        let settings = TraceSettings::from(config);

        log::info!(
            "Starting run: {} points x {} blocks, {} (dimension {}, {:?} shift), {} bands, {} queries",
            config.points,
            config.blocks,
            sampler.method_name(),
            sampler.dimension(),
            config.randomization,
            bands,
            areas.len()
        );

        let mut rays_traced = 0u64;
        let mut surface_hits = 0u64;
        let mut clamp_count = 0u64;
        for block in 0..config.blocks {
            scene.reset_accumulators();
            sampler.begin_block(block)?;

            let mut tracer = Tracer::new(scene, &grid, settings);
            for _ in 0..config.points {
                sampler.next_path()?;
                let ray = sources.generate(&mut sampler);
                surface_hits += tracer.trace(&ray, &mut sampler) as u64;
                rays_traced += 1;
            }

            clamp_count += clamp_absorbed(scene, &weights);
            let values = query_values(scene, &config.return_types, &areas);
            for (slot, &value) in values.iter().enumerate() {
                stats.update(slot, value)?;
            }
            if bands >= 2 {
                for query in 0..areas.len() {
                    pairs.update2(query, values[query * bands], values[query * bands + 1])?;
                }
            }
            log::debug!("Block {} done", block);
        }

        let mut queries = Vec::with_capacity(areas.len());
        for (query, &area) in areas.iter().enumerate() {
            let mut band_results = Vec::with_capacity(bands);
            for band in 0..bands {
                let slot = query * bands + band;
                let interval = stats.confidence_interval(slot, Variable::First, config.confidence_level)?;
                band_results.push(QueryBandResult {
                    return_type: config.return_types[band],
                    mean: interval.mean,
                    variance: stats.variance(slot, Variable::First)?,
                    half_width: interval.half_width,
                });
            }
            let band_correlation = if bands >= 2 {
                Some(pairs.correlation(query)?)
            } else {
                None
            };
            queries.push(QueryResult {
                query,
                area,
                bands: band_results,
                band_correlation,
            });
        }

        if clamp_count > 0 {
            log::warn!(
                "Absorbed flux clamped {} times; the scene is under-sampled",
                clamp_count
            );
        }
        log::info!(
            "Run finished: {} rays, {} surface hits, {} clamps",
            rays_traced,
            surface_hits,
            clamp_count
        );

        let result = SimulationResult {
            queries,
            blocks: config.blocks,
            rays_traced,
            surface_hits,
            clamp_count,
        };
        *grid_slot = Some(grid);
        *result_slot = Some(result.clone());
        Ok(result)
    }

    /// Per-primitive tallies of the last block traced.
    pub fn snapshot_flux(&self) -> TraceResult<Vec<FluxRecord>> {
        Ok(FluxRecord::from_scene(&self.lock()?.scene))
    }

    /// Normalized sky table, when the light model is a sky.
    pub fn sky_table(&self) -> TraceResult<Option<SkyTable>> {
        Ok(self.lock()?.sky.as_ref().map(|sky| sky.table().clone()))
    }

    /// Result of the last completed run.
    pub fn last_result(&self) -> TraceResult<Option<SimulationResult>> {
        Ok(self.lock()?.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::{ConfigError, Material, Polygon, RussianRoulette, SkyParameters};
    use canopy_qmc::{QmcMethod, RandomizationMethod};

    /// Upward triangle of area 0.5 at the origin.
    fn leaf_scene(light: LightModel) -> SceneDescription {
        SceneDescription {
            polygons: vec![Polygon::new(
                vec![
                    DVec3::new(0.0, 0.0, 0.0),
                    DVec3::new(0.0, 0.0, 1.0),
                    DVec3::new(1.0, 0.0, 0.0),
                ],
                0,
                Some(0),
            )],
            materials: vec![Material::absorber("leaf")],
            up: DVec3::Y,
            light,
        }
    }

    fn direct_config(method: QmcMethod) -> RunConfig {
        RunConfig {
            method,
            randomization: RandomizationMethod::Additive,
            blocks: 8,
            points: 1024,
            max_depth: 0,
            russian_roulette: RussianRoulette::disabled(),
            return_types: vec![ReturnType::AbsorbedIrradiance],
            grid_resolution: [4, 4, 4],
            seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn test_overhead_light_gives_unit_irradiance() {
        let sim = Simulation::new(&leaf_scene(LightModel::default()), direct_config(QmcMethod::Sobol)).unwrap();
        let result = sim.run().unwrap();

        assert_eq!(result.rays_traced, 8 * 1024);
        assert_eq!(result.clamp_count, 0);
        let band = result.queries[0].bands[0];
        assert!((band.mean - 1.0).abs() < 0.02, "mean {}", band.mean);
        assert!(band.half_width < 0.05);
        assert!((result.queries[0].area - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_low_discrepancy_beats_monte_carlo() {
        let run = |method| {
            let config = RunConfig {
                points: 4096,
                ..direct_config(method)
            };
            let sim = Simulation::new(&leaf_scene(LightModel::default()), config).unwrap();
            sim.run().unwrap().queries[0].bands[0]
        };
        let sobol = run(QmcMethod::Sobol);
        let monte_carlo = run(QmcMethod::MonteCarlo);

        assert!((monte_carlo.mean - 1.0).abs() < 0.1);
        assert!(sobol.variance < monte_carlo.variance / 4.0);
    }

    /// Block variance of the overhead-light estimate at `points` per block.
    fn block_variance(method: QmcMethod, points: u64) -> f64 {
        let config = RunConfig {
            points,
            blocks: 64,
            ..direct_config(method)
        };
        let sim = Simulation::new(&leaf_scene(LightModel::default()), config).unwrap();
        sim.run().unwrap().queries[0].bands[0].variance
    }

    #[test]
    fn test_variance_falls_faster_for_low_discrepancy() {
        // Quadrupling the points: about 4x less variance for Monte Carlo,
        // 8x to 16x for shifted lattices and nets (the tally is an indicator).
        let monte_carlo = block_variance(QmcMethod::MonteCarlo, 1024) / block_variance(QmcMethod::MonteCarlo, 4096);
        assert!(monte_carlo > 1.8 && monte_carlo < 9.0, "monte carlo ratio {}", monte_carlo);

        for method in [QmcMethod::Sobol, QmcMethod::Korobov { multiplier: None }] {
            let coarse = block_variance(method.clone(), 1024);
            let fine = block_variance(method.clone(), 4096);
            assert!(fine > 0.0);
            let ratio = coarse / fine;
            assert!(ratio > 5.0, "{:?} ratio {}", method, ratio);
            assert!(ratio > monte_carlo, "{:?} ratio {} vs monte carlo {}", method, ratio, monte_carlo);
        }
    }

    #[test]
    fn test_runs_are_reproducible() {
        let config = RunConfig {
            max_depth: 4,
            ..direct_config(QmcMethod::Korobov { multiplier: None })
        };
        let first = Simulation::new(&leaf_scene(LightModel::default()), config.clone())
            .unwrap()
            .run()
            .unwrap();
        let second = Simulation::new(&leaf_scene(LightModel::default()), config)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_two_bands_report_correlation() {
        let config = RunConfig {
            spectrum_bands: 2,
            band_weights: vec![1.0, 3.0],
            return_types: vec![ReturnType::AbsorbedFlux, ReturnType::IntersectionCount],
            ..direct_config(QmcMethod::Sobol)
        };
        let sim = Simulation::new(&leaf_scene(LightModel::default()), config).unwrap();
        let result = sim.run().unwrap();
        let query = &result.queries[0];

        // A quarter of the unit irradiance lands in band 0
        assert!((query.bands[0].mean - 0.125).abs() < 0.01);
        assert!(query.bands[1].mean > 0.0);
        let correlation = query.band_correlation.unwrap();
        assert!((-1.0..=1.0).contains(&correlation));
    }

    #[test]
    fn test_snapshot_and_sky_table() {
        let sim = Simulation::new(&leaf_scene(LightModel::default()), direct_config(QmcMethod::Sobol)).unwrap();
        assert!(sim.last_result().unwrap().is_none());
        sim.run().unwrap();

        let flux = sim.snapshot_flux().unwrap();
        assert_eq!(flux.len(), 1);
        assert!(flux[0].absorbed > 0.0);
        assert!(flux[0].direct_hits > 0);
        assert!(sim.sky_table().unwrap().is_none());
        assert!(sim.last_result().unwrap().is_some());
        assert!(sim.state().lock().unwrap().grid.is_some());
    }

    #[test]
    fn test_sky_run_is_bounded() {
        let sky = LightModel::Sky(SkyParameters {
            azimuth_samples: 24,
            altitude_samples: 6,
            ..Default::default()
        });
        let sim = Simulation::new(&leaf_scene(sky), direct_config(QmcMethod::Sobol)).unwrap();
        let table = sim.sky_table().unwrap().unwrap();
        assert!((table.total() - 1.0).abs() < 1e-9);

        let mean = sim.run().unwrap().queries[0].bands[0].mean;
        // Slanted light delivers less than unit irradiance to a flat leaf
        assert!(mean > 0.0 && mean < 1.0, "mean {}", mean);
    }

    #[test]
    fn test_clamp_absorbed() {
        let mut scene = leaf_scene(LightModel::default()).build(2).unwrap();
        scene.primitives[0].accumulators[0].absorbed = 0.4;
        scene.primitives[0].accumulators[1].absorbed = 0.4;

        // Area 0.5 with weights 0.5 / 0.5 allows 0.25 per band
        assert_eq!(clamp_absorbed(&mut scene, &[0.5, 0.5]), 2);
        assert_eq!(scene.primitives[0].accumulators[0].absorbed, 0.25);
        assert_eq!(clamp_absorbed(&mut scene, &[0.9, 0.9]), 0);
    }

    #[test]
    fn test_query_values_per_return_type() {
        let mut scene = leaf_scene(LightModel::default()).build(1).unwrap();
        let tally = &mut scene.primitives[0].accumulators[0];
        tally.absorbed = 0.2;
        tally.incident_front = 0.3;
        tally.incident_back = 0.1;
        tally.hits = 4;

        let value = |rt| query_values(&scene, &[rt], &[0.5])[0];
        assert_eq!(value(ReturnType::AbsorbedFlux), 0.2);
        assert_eq!(value(ReturnType::AbsorbedIrradiance), 0.4);
        assert_eq!(value(ReturnType::IncidentUpper), 0.6);
        assert_eq!(value(ReturnType::IncidentLower), 0.2);
        assert_eq!(value(ReturnType::IntersectionCount), 4.0);
    }

    #[test]
    fn test_configuration_errors_stop_before_tracing() {
        let bad = RunConfig {
            blocks: 0,
            ..Default::default()
        };
        assert!(matches!(
            Simulation::new(&leaf_scene(LightModel::default()), bad),
            Err(TraceError::Config(ConfigError::Zero(_)))
        ));

        let dark = LightModel::Directional(vec![DirectionalLight::new(DVec3::Y, 0.0)]);
        assert!(matches!(
            Simulation::new(&leaf_scene(dark), RunConfig::default()),
            Err(TraceError::Config(ConfigError::NoLights))
        ));

        let sobol_too_wide = RunConfig {
            dimension: 1000,
            ..Default::default()
        };
        let sim = Simulation::new(&leaf_scene(LightModel::default()), sobol_too_wide).unwrap();
        assert!(matches!(sim.run(), Err(TraceError::Qmc(_))));
    }
}
