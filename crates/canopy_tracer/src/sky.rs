//! Sky radiance model with importance sampling.
//!
//! The sky is a table of intensity per (azimuth, altitude) bin, either read
//! from a file or integrated over the growth period from the Perez/Preetham
//! clear-sky luminance and the CIE overcast sky. Each bin holds radiance
//! times solid angle, so sampling a bin in proportion to its value and
//! launching rays from a disk perpendicular to that direction reproduces the
//! sky's flux.
//!
//! Directions use a Y-up frame: azimuth 0 points along +Z (north) and
//! increases toward +X (east).

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use canopy_core::{read_sky_file, SkyParameters, SkyTable};
use canopy_math::{DVec3, Frame};

use crate::error::{TraceError, TraceResult};

/// A sampled sky direction with two axes spanning the plane across it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkySample {
    /// Unit direction toward the sky
    pub direction: DVec3,
    pub u_axis: DVec3,
    pub v_axis: DVec3,
}

/// Unit vector toward the sky at `azimuth` and `altitude` (radians).
pub fn sky_direction(azimuth: f64, altitude: f64) -> DVec3 {
    let (sin_alt, cos_alt) = altitude.sin_cos();
    let (sin_az, cos_az) = azimuth.sin_cos();
    DVec3::new(cos_alt * sin_az, sin_alt, cos_alt * cos_az)
}

/// Solar declination in radians.
pub fn solar_declination(julian_day: u32) -> f64 {
    0.4093 * (TAU * (julian_day as f64 - 81.0) / 368.0).sin()
}

/// Local solar time in hours from local standard time.
pub fn solar_time(julian_day: u32, standard_hour: f64, longitude: f64, meridian: f64) -> f64 {
    let j = julian_day as f64;
    let equation_of_time = 0.170 * (2.0 * TAU * (j - 80.0) / 373.0).sin()
        - 0.129 * (TAU * (j - 8.0) / 355.0).sin();
    standard_hour + equation_of_time + (longitude - meridian) / 15.0
}

/// Sun altitude and azimuth (radians) at a solar time.
pub fn solar_position(julian_day: u32, solar_hour: f64, latitude: f64) -> (f64, f64) {
    let delta = solar_declination(julian_day);
    let phi = latitude.to_radians();
    let omega = PI * (solar_hour - 12.0) / 12.0;

    let sin_alt = phi.sin() * delta.sin() + phi.cos() * delta.cos() * omega.cos();
    let altitude = sin_alt.clamp(-1.0, 1.0).asin();
    let azimuth = (-delta.cos() * omega.sin())
        .atan2(phi.cos() * delta.sin() - phi.sin() * delta.cos() * omega.cos())
        .rem_euclid(TAU);
    (altitude, azimuth)
}

/// Perez luminance distribution coefficients for turbidity `t`.
fn perez_coefficients(t: f64) -> [f64; 5] {
    [
        0.1787 * t - 1.4630,
        -0.3554 * t + 0.4275,
        -0.0227 * t + 5.3251,
        0.1206 * t - 2.5771,
        -0.0670 * t + 0.3703,
    ]
}

fn perez(c: &[f64; 5], theta: f64, gamma: f64) -> f64 {
    let cos_theta = theta.cos().max(1e-3);
    (1.0 + c[0] * (c[1] / cos_theta).exp())
        * (1.0 + c[2] * (c[3] * gamma).exp() + c[4] * gamma.cos().powi(2))
}

/// Clear-sky zenith luminance (kcd/m^2) for sun zenith angle `theta_s`.
fn clear_zenith_luminance(turbidity: f64, theta_s: f64) -> f64 {
    let chi = (4.0 / 9.0 - turbidity / 120.0) * (PI - 2.0 * theta_s);
    ((4.0453 * turbidity - 4.9710) * chi.tan() - 0.2155 * turbidity + 2.4192).max(0.0)
}

/// Overcast zenith luminance (kcd/m^2) for sun altitude `alt_s`.
fn overcast_zenith_luminance(alt_s: f64) -> f64 {
    0.123 + 8.6 * alt_s.sin()
}

#[derive(Debug, Clone)]
pub struct SkyModel {
    table: SkyTable,
    /// Cumulative share of each azimuth row
    azimuth_cdf: Vec<f64>,
    /// Cumulative share within each row, row-major like the table
    altitude_cdf: Vec<f64>,
}

impl SkyModel {
    /// Table from the parameters' sky file, or integrated from the sky
    /// formulas otherwise.
    pub fn from_parameters(params: &SkyParameters) -> TraceResult<Self> {
        if let Some(path) = &params.sky_file {
            return Self::from_table(read_sky_file(path)?);
        }
        if params.azimuth_samples == 0 || params.altitude_samples == 0 {
            return Err(TraceError::EmptySky);
        }

        let mut table = SkyTable::new(params.azimuth_samples, params.altitude_samples);
        let coefficients = perez_coefficients(params.turbidity);
        let clear = params.clear_fraction.clamp(0.0, 1.0);
        let step = params.hour_step.max(1e-3);
        let bin_area = table.azimuth_step() * table.altitude_step();
        let meridian = params.meridian();

        let mut sun_steps = 0;
        let mut hour = params.start_hour + 0.5 * step;
        while hour < params.end_hour {
            let solar_hour = solar_time(params.julian_day, hour, params.longitude, meridian);
            let (sun_alt, sun_az) = solar_position(params.julian_day, solar_hour, params.latitude);
            hour += step;
            if sun_alt <= 0.0 {
                continue;
            }
            sun_steps += 1;

            let sun = sky_direction(sun_az, sun_alt);
            let theta_s = FRAC_PI_2 - sun_alt;
            let clear_zenith = clear_zenith_luminance(params.turbidity, theta_s);
            let clear_norm = perez(&coefficients, 0.0, theta_s);
            let overcast_zenith = overcast_zenith_luminance(sun_alt);

            for a in 0..table.azimuth_samples() {
                let azimuth = table.azimuth_center(a);
                for h in 0..table.altitude_samples() {
                    let altitude = table.altitude_center(h);
                    let theta = FRAC_PI_2 - altitude;
                    let gamma = sky_direction(azimuth, altitude)
                        .dot(sun)
                        .clamp(-1.0, 1.0)
                        .acos();

                    let clear_luminance =
                        clear_zenith * perez(&coefficients, theta, gamma) / clear_norm;
                    let overcast_luminance = overcast_zenith * (1.0 + 2.0 * theta.cos()) / 3.0;
                    let luminance = clear * clear_luminance + (1.0 - clear) * overcast_luminance;

                    let weight = luminance * altitude.cos() * bin_area * step;
                    table.set(a, h, table.get(a, h) + weight);
                }
            }
        }

        log::info!(
            "Sky table {}x{} from {} daylight steps (day {}, lat {:.2}, turbidity {:.2}, clear {:.2})",
            table.azimuth_samples(),
            table.altitude_samples(),
            sun_steps,
            params.julian_day,
            params.latitude,
            params.turbidity,
            clear
        );
        Self::from_table(table)
    }

    /// Normalize `table` and build its sampling distributions.
    pub fn from_table(mut table: SkyTable) -> TraceResult<Self> {
        if !(table.total() > 0.0) {
            return Err(TraceError::EmptySky);
        }
        table.normalize();

        let n_az = table.azimuth_samples();
        let n_alt = table.altitude_samples();
        let mut azimuth_cdf = Vec::with_capacity(n_az);
        let mut altitude_cdf = Vec::with_capacity(n_az * n_alt);

        let mut running = 0.0;
        for a in 0..n_az {
            let row = table.row(a);
            let row_total: f64 = row.iter().sum();
            running += row_total;
            azimuth_cdf.push(running);

            let mut within = 0.0;
            for (h, &v) in row.iter().enumerate() {
                if row_total > 0.0 {
                    within += v / row_total;
                } else {
                    within = (h + 1) as f64 / n_alt as f64;
                }
                altitude_cdf.push(within);
            }
        }
        // Guard the last entries against rounding below 1
        if let Some(last) = azimuth_cdf.last_mut() {
            *last = 1.0;
        }
        for a in 0..n_az {
            altitude_cdf[a * n_alt + n_alt - 1] = 1.0;
        }

        Ok(Self {
            table,
            azimuth_cdf,
            altitude_cdf,
        })
    }

    /// Normalized table, for display.
    pub fn table(&self) -> &SkyTable {
        &self.table
    }

    /// Draw a direction in proportion to sky flux.
    pub fn sample(&self, u1: f64, u2: f64) -> SkySample {
        let n_alt = self.table.altitude_samples();
        let (a, fa) = search_cdf(&self.azimuth_cdf, u1);
        let (h, fh) = search_cdf(&self.altitude_cdf[a * n_alt..(a + 1) * n_alt], u2);

        let azimuth = (a as f64 + fa) * self.table.azimuth_step();
        let altitude = (h as f64 + fh) * self.table.altitude_step();
        let direction = sky_direction(azimuth, altitude);
        let frame = Frame::from_w(direction);
        SkySample {
            direction,
            u_axis: frame.u,
            v_axis: frame.v,
        }
    }

    /// Normalized table value of the bin holding `direction`; zero below the
    /// horizon.
    pub fn intensity(&self, direction: DVec3) -> f64 {
        let d = direction.normalize_or_zero();
        if d.y < 0.0 {
            return 0.0;
        }
        let altitude = d.y.clamp(-1.0, 1.0).asin();
        let azimuth = d.x.atan2(d.z);
        let (a, h) = self.table.bin(azimuth, altitude);
        self.table.get(a, h)
    }
}

/// Bucket holding `u` in a cumulative table and the position within it.
fn search_cdf(cdf: &[f64], u: f64) -> (usize, f64) {
    let index = cdf.partition_point(|&c| c <= u).min(cdf.len() - 1);
    let low = if index == 0 { 0.0 } else { cdf[index - 1] };
    let width = cdf[index] - low;
    let fraction = if width > 0.0 { (u - low) / width } else { 0.5 };
    (index, fraction.clamp(0.0, 1.0))
}
