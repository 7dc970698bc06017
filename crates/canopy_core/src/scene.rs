//! Scene representation for light transport.
//!
//! A [`SceneDescription`] is what collaborators hand in: polygons, materials,
//! an up vector and a light model. [`SceneDescription::build`] turns it into
//! a [`Scene`] of [`Primitive`]s with precomputed planes, canonical normals
//! and per-band flux accumulators.

use canopy_math::{dominant_axis, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::{SceneError, SceneResult};
use crate::light::LightModel;

/// Primitives with less area than this are skipped.
pub const MIN_AREA: f64 = 1e-12;

/// Largest off-plane distance of a quad's fourth vertex, relative to its
/// longest diagonal.
pub const PLANAR_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Triangle,
    Quad,
}

impl PrimitiveKind {
    pub fn vertex_count(self) -> usize {
        match self {
            PrimitiveKind::Triangle => 3,
            PrimitiveKind::Quad => 4,
        }
    }
}

/// Optical properties of one side of a surface, one entry per spectral band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(default)]
    pub name: String,

    pub reflectance: Vec<f64>,

    pub transmittance: Vec<f64>,

    /// Phong exponent of the reflected lobe
    #[serde(default)]
    pub specular_exponent: Vec<f64>,

    /// Phong exponent of the transmitted lobe
    #[serde(default)]
    pub transmission_exponent: Vec<f64>,

    /// Carried for collaborators; transport does not refract
    #[serde(default)]
    pub refractive_index: Vec<f64>,
}

/// One band of a [`Material`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandOptics {
    pub reflectance: f64,
    pub transmittance: f64,
    pub specular_exponent: f64,
    pub transmission_exponent: f64,
}

impl BandOptics {
    pub fn absorptance(&self) -> f64 {
        (1.0 - self.reflectance - self.transmittance).max(0.0)
    }
}

impl Material {
    /// Material with the same reflectance and transmittance in every band.
    pub fn new(name: impl Into<String>, reflectance: f64, transmittance: f64) -> Self {
        Self {
            name: name.into(),
            reflectance: vec![reflectance],
            transmittance: vec![transmittance],
            specular_exponent: Vec::new(),
            transmission_exponent: Vec::new(),
            refractive_index: Vec::new(),
        }
    }

    /// Black body: absorbs everything.
    pub fn absorber(name: impl Into<String>) -> Self {
        Self::new(name, 0.0, 0.0)
    }

    pub fn band(&self, band: usize) -> BandOptics {
        BandOptics {
            reflectance: self.reflectance[band],
            transmittance: self.transmittance[band],
            specular_exponent: self.specular_exponent[band],
            transmission_exponent: self.transmission_exponent[band],
        }
    }

    /// Broadcast single values to `bands` entries, fill defaults and repair
    /// reflectance/transmittance pairs that are out of range.
    fn conform(&mut self, bands: usize) -> SceneResult<()> {
        if self.reflectance.is_empty() {
            return Err(SceneError::MaterialBands {
                name: self.name.clone(),
                property: "reflectance",
                expected: bands,
                found: 0,
            });
        }

        let name = self.name.clone();
        let fit = |values: &mut Vec<f64>, property: &'static str, default: f64| -> SceneResult<()> {
            match values.len() {
                0 => *values = vec![default; bands],
                1 => *values = vec![values[0]; bands],
                n if n == bands => {}
                found => {
                    return Err(SceneError::MaterialBands {
                        name: name.clone(),
                        property,
                        expected: bands,
                        found,
                    })
                }
            }
            Ok(())
        };

        fit(&mut self.reflectance, "reflectance", 0.0)?;
        fit(&mut self.transmittance, "transmittance", 0.0)?;
        fit(&mut self.specular_exponent, "specular_exponent", 1.0)?;
        fit(&mut self.transmission_exponent, "transmission_exponent", 1.0)?;
        fit(&mut self.refractive_index, "refractive_index", 1.0)?;

        for b in 0..bands {
            let r = self.reflectance[b].max(0.0);
            let t = self.transmittance[b].max(0.0);
            let sum = r + t;
            if sum > 1.0 {
                log::warn!(
                    "Material '{}' band {}: reflectance + transmittance = {:.4} > 1, rescaling",
                    self.name,
                    b,
                    sum
                );
                self.reflectance[b] = r / sum;
                self.transmittance[b] = t / sum;
            } else {
                self.reflectance[b] = r;
                self.transmittance[b] = t;
            }
        }
        Ok(())
    }
}

/// Per-band flux tallies of one primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandAccumulator {
    pub absorbed: f64,
    /// Flux arriving on the side the normal points to
    pub incident_front: f64,
    /// Flux arriving on the opposite side
    pub incident_back: f64,
    /// Hits at path depth 0
    pub direct_hits: u64,
    /// All recorded hits
    pub hits: u64,
    /// Running mean of the incidence cosine over `hits`
    pub average_cosine: f64,
}

impl BandAccumulator {
    pub fn record_cosine(&mut self, cosine: f64) {
        self.hits += 1;
        self.average_cosine += (cosine - self.average_cosine) / self.hits as f64;
    }
}

/// A planar triangle or quad ready for intersection.
#[derive(Debug, Clone)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    vertices: [DVec3; 4],
    /// Unit normal, flipped so it never points against the scene's up vector
    pub normal: DVec3,
    /// Plane offset: `normal.dot(p) == plane_d` for points on the plane
    pub plane_d: f64,
    /// Coordinate axis dropped when projecting to 2-D
    pub projection_axis: usize,
    pub area: f64,
    /// Id of the last ray path that tested this primitive
    pub signature: u64,
    pub front_material: usize,
    pub back_material: usize,
    pub query: Option<usize>,
    /// Index of the polygon this came from in the description
    pub source_index: usize,
    pub accumulators: Vec<BandAccumulator>,
}

impl Primitive {
    pub fn new(
        vertices: &[DVec3],
        front_material: usize,
        back_material: usize,
        query: Option<usize>,
        up: DVec3,
        bands: usize,
    ) -> SceneResult<Self> {
        let kind = match vertices.len() {
            3 => PrimitiveKind::Triangle,
            4 => PrimitiveKind::Quad,
            count => return Err(SceneError::BadVertexCount { polygon: 0, count }),
        };

        let mut v = [DVec3::ZERO; 4];
        v[..vertices.len()].copy_from_slice(vertices);

        // Cross product of the diagonals spans twice the area of a planar quad
        let raw = match kind {
            PrimitiveKind::Triangle => (v[1] - v[0]).cross(v[2] - v[0]),
            PrimitiveKind::Quad => (v[2] - v[0]).cross(v[3] - v[1]),
        };
        let length = raw.length();
        let area = 0.5 * length;

        let mut normal = if length > 0.0 { raw / length } else { up.normalize_or_zero() };
        if normal.dot(up) < 0.0 {
            normal = -normal;
        }

        Ok(Self {
            kind,
            vertices: v,
            normal,
            plane_d: normal.dot(v[0]),
            projection_axis: dominant_axis(normal),
            area,
            signature: 0,
            front_material,
            back_material,
            query,
            source_index: 0,
            accumulators: vec![BandAccumulator::default(); bands],
        })
    }

    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices[..self.kind.vertex_count()]
    }

    /// The primitive as triangles; quads split along the 0-2 diagonal.
    pub fn triangles(&self) -> impl Iterator<Item = [DVec3; 3]> + '_ {
        let v = &self.vertices;
        let count = match self.kind {
            PrimitiveKind::Triangle => 1,
            PrimitiveKind::Quad => 2,
        };
        (0..count).map(move |i| [v[0], v[i + 1], v[i + 2]])
    }

    pub fn is_degenerate(&self) -> bool {
        self.area < MIN_AREA
    }

    /// False for a quad whose fourth vertex leaves the plane of the first
    /// three. Such quads are still traced as two triangles sharing the
    /// averaged normal.
    pub fn is_planar(&self) -> bool {
        if self.kind == PrimitiveKind::Triangle {
            return true;
        }
        let v = &self.vertices;
        let Some(n) = (v[1] - v[0]).cross(v[2] - v[0]).try_normalize() else {
            return true;
        };
        let span = (v[2] - v[0]).length().max((v[3] - v[1]).length());
        n.dot(v[3] - v[0]).abs() <= PLANAR_TOLERANCE * span
    }

    /// Material index for a ray arriving along `direction`.
    pub fn material_for(&self, direction: DVec3) -> usize {
        if self.is_front_hit(direction) {
            self.front_material
        } else {
            self.back_material
        }
    }

    /// True when a ray travelling along `direction` strikes the side the
    /// normal points to.
    #[inline]
    pub fn is_front_hit(&self, direction: DVec3) -> bool {
        -self.normal.dot(direction) >= 0.0
    }

    pub fn reset_accumulators(&mut self) {
        self.accumulators
            .iter_mut()
            .for_each(|a| *a = BandAccumulator::default());
    }
}

/// A polygon as supplied by a collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<DVec3>,

    #[serde(default)]
    pub front_material: usize,

    #[serde(default)]
    pub back_material: usize,

    /// Query this polygon's returns are summed into
    #[serde(default)]
    pub query: Option<usize>,
}

impl Polygon {
    pub fn new(vertices: Vec<DVec3>, material: usize, query: Option<usize>) -> Self {
        Self {
            vertices,
            front_material: material,
            back_material: material,
            query,
        }
    }
}

fn default_up() -> DVec3 {
    DVec3::Y
}

/// Everything the core needs to know about the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    pub polygons: Vec<Polygon>,

    pub materials: Vec<Material>,

    #[serde(default = "default_up")]
    pub up: DVec3,

    #[serde(default)]
    pub light: LightModel,
}

impl SceneDescription {
    /// Build primitives with `bands` spectral accumulators each.
    pub fn build(&self, bands: usize) -> SceneResult<Scene> {
        if bands == 0 {
            return Err(SceneError::EmptySpectrum);
        }
        if self.up.length_squared() == 0.0 {
            return Err(SceneError::ZeroUp);
        }
        let up = self.up.normalize();

        let mut materials = self.materials.clone();
        for material in materials.iter_mut() {
            material.conform(bands)?;
        }

        let mut primitives = Vec::with_capacity(self.polygons.len());
        let mut skipped = 0;
        for (index, polygon) in self.polygons.iter().enumerate() {
            for material in [polygon.front_material, polygon.back_material] {
                if material >= materials.len() {
                    return Err(SceneError::UnknownMaterial {
                        polygon: index,
                        material,
                    });
                }
            }

            let mut primitive = Primitive::new(
                &polygon.vertices,
                polygon.front_material,
                polygon.back_material,
                polygon.query,
                up,
                bands,
            )
            .map_err(|e| match e {
                SceneError::BadVertexCount { count, .. } => SceneError::BadVertexCount {
                    polygon: index,
                    count,
                },
                other => other,
            })?;

            if primitive.is_degenerate() {
                log::warn!("Polygon {} has zero area, skipping", index);
                skipped += 1;
                continue;
            }
            if !primitive.is_planar() {
                log::warn!("Polygon {} is a non-planar quad, split along its 0-2 diagonal", index);
            }
            primitive.source_index = index;
            primitives.push(primitive);
        }

        let query_count = primitives
            .iter()
            .filter_map(|p| p.query)
            .max()
            .map_or(0, |q| q + 1);

        log::info!(
            "Built scene: {} primitives ({} skipped), {} materials, {} queries, {} bands",
            primitives.len(),
            skipped,
            materials.len(),
            query_count,
            bands
        );

        Ok(Scene {
            primitives,
            materials,
            up,
            bands,
            query_count,
        })
    }
}

/// Primitives and materials of one simulation.
#[derive(Debug, Clone)]
pub struct Scene {
    pub primitives: Vec<Primitive>,
    pub materials: Vec<Material>,
    pub up: DVec3,
    bands: usize,
    query_count: usize,
}

impl Scene {
    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn query_count(&self) -> usize {
        self.query_count
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// Summed area of the primitives assigned to `query`.
    pub fn query_area(&self, query: usize) -> f64 {
        self.primitives
            .iter()
            .filter(|p| p.query == Some(query))
            .map(|p| p.area)
            .sum()
    }

    pub fn reset_accumulators(&mut self) {
        self.primitives
            .iter_mut()
            .for_each(Primitive::reset_accumulators);
    }
}
