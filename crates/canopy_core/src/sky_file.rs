//! Sky-intensity tables and their text file format.
//!
//! The file is whitespace separated: a header with the azimuth and altitude
//! sample counts, then one `azimuth altitude intensity` triple (angles in
//! degrees) per table cell. Each triple is placed in the cell its angles
//! fall in, so the triples may come in any order.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::path::Path;

use crate::error::{SkyFileError, SkyFileResult};

/// Sky intensity binned by azimuth (full circle) and altitude (horizon to
/// zenith), stored azimuth-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyTable {
    azimuth_samples: usize,
    altitude_samples: usize,
    values: Vec<f64>,
}

impl SkyTable {
    pub fn new(azimuth_samples: usize, altitude_samples: usize) -> Self {
        Self {
            azimuth_samples,
            altitude_samples,
            values: vec![0.0; azimuth_samples * altitude_samples],
        }
    }

    pub fn azimuth_samples(&self) -> usize {
        self.azimuth_samples
    }

    pub fn altitude_samples(&self) -> usize {
        self.altitude_samples
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn get(&self, azimuth: usize, altitude: usize) -> f64 {
        self.values[azimuth * self.altitude_samples + altitude]
    }

    #[inline]
    pub fn set(&mut self, azimuth: usize, altitude: usize, value: f64) {
        self.values[azimuth * self.altitude_samples + altitude] = value;
    }

    /// One azimuth row, indexed by altitude.
    pub fn row(&self, azimuth: usize) -> &[f64] {
        let start = azimuth * self.altitude_samples;
        &self.values[start..start + self.altitude_samples]
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Angular width of an azimuth bin in radians.
    pub fn azimuth_step(&self) -> f64 {
        TAU / self.azimuth_samples as f64
    }

    /// Angular height of an altitude bin in radians.
    pub fn altitude_step(&self) -> f64 {
        FRAC_PI_2 / self.altitude_samples as f64
    }

    /// Bin center azimuth in radians.
    pub fn azimuth_center(&self, azimuth: usize) -> f64 {
        (azimuth as f64 + 0.5) * self.azimuth_step()
    }

    /// Bin center altitude in radians.
    pub fn altitude_center(&self, altitude: usize) -> f64 {
        (altitude as f64 + 0.5) * self.altitude_step()
    }

    /// Bin holding the given angles (radians); azimuth wraps, altitude clamps.
    pub fn bin(&self, azimuth: f64, altitude: f64) -> (usize, usize) {
        let a = azimuth.rem_euclid(TAU) / self.azimuth_step();
        let h = altitude.clamp(0.0, FRAC_PI_2) / self.altitude_step();
        (
            (a as usize).min(self.azimuth_samples - 1),
            (h as usize).min(self.altitude_samples - 1),
        )
    }

    /// Scale all values to sum to 1; a zero table is left untouched.
    pub fn normalize(&mut self) {
        let total = self.total();
        if total > 0.0 {
            self.values.iter_mut().for_each(|v| *v /= total);
        }
    }
}

/// Parse a sky table from file contents.
pub fn parse_sky_table(text: &str) -> SkyFileResult<SkyTable> {
    let mut tokens = text.split_whitespace();

    let mut header = |what: &str| -> SkyFileResult<usize> {
        let token = tokens
            .next()
            .ok_or_else(|| SkyFileError::Header(format!("missing {}", what)))?;
        match token.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(SkyFileError::Header(format!("bad {} '{}'", what, token))),
        }
    };
    let azimuth_samples = header("azimuth sample count")?;
    let altitude_samples = header("altitude sample count")?;

    let mut table = SkyTable::new(azimuth_samples, altitude_samples);
    let expected = azimuth_samples * altitude_samples;
    let numbers: Vec<&str> = tokens.collect();
    if numbers.len() % 3 != 0 {
        return Err(SkyFileError::Entry {
            index: numbers.len() / 3,
            message: "incomplete triple".into(),
        });
    }
    if numbers.len() / 3 != expected {
        return Err(SkyFileError::Count {
            expected,
            found: numbers.len() / 3,
        });
    }

    for (index, triple) in numbers.chunks(3).enumerate() {
        let mut parsed = [0.0f64; 3];
        for (slot, token) in parsed.iter_mut().zip(triple) {
            *slot = token.parse().map_err(|_| SkyFileError::Entry {
                index,
                message: format!("invalid number '{}'", token),
            })?;
        }
        let [azimuth, altitude, intensity] = parsed;

        if !(0.0..=90.0).contains(&altitude) {
            return Err(SkyFileError::Entry {
                index,
                message: format!("altitude {} outside [0, 90]", altitude),
            });
        }
        if intensity < 0.0 || !intensity.is_finite() {
            return Err(SkyFileError::Entry {
                index,
                message: format!("invalid intensity {}", intensity),
            });
        }

        let (a, h) = table.bin(azimuth.to_radians(), altitude.to_radians());
        table.set(a, h, intensity);
    }

    Ok(table)
}

/// Read a sky-intensity file.
pub fn read_sky_file(path: impl AsRef<Path>) -> SkyFileResult<SkyTable> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let table = parse_sky_table(&text)?;
    log::info!(
        "Read sky table {}: {} x {} samples",
        path.display(),
        table.azimuth_samples(),
        table.altitude_samples()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        let text = "2 2\n\
                    90 22.5 1.0\n\
                    90 67.5 2.0\n\
                    270 22.5 3.0\n\
                    270 67.5 4.0\n";
        let table = parse_sky_table(text).unwrap();
        assert_eq!(table.azimuth_samples(), 2);
        assert_eq!(table.altitude_samples(), 2);
        assert_eq!(table.row(0), &[1.0, 2.0]);
        assert_eq!(table.row(1), &[3.0, 4.0]);
        assert_eq!(table.total(), 10.0);
    }

    #[test]
    fn test_entries_in_any_order() {
        let text = "2 1  270 45 5   90 45 7";
        let table = parse_sky_table(text).unwrap();
        assert_eq!(table.get(0, 0), 7.0);
        assert_eq!(table.get(1, 0), 5.0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_sky_table(""), Err(SkyFileError::Header(_))));
        assert!(matches!(parse_sky_table("0 3"), Err(SkyFileError::Header(_))));
        assert!(matches!(
            parse_sky_table("1 2  0 10 1.0"),
            Err(SkyFileError::Count { expected: 2, found: 1 })
        ));
        assert!(matches!(
            parse_sky_table("1 1  0 10"),
            Err(SkyFileError::Entry { .. })
        ));
        assert!(matches!(
            parse_sky_table("1 1  0 10 abc"),
            Err(SkyFileError::Entry { index: 0, .. })
        ));
        assert!(matches!(
            parse_sky_table("1 1  0 95 1.0"),
            Err(SkyFileError::Entry { .. })
        ));
    }

    #[test]
    fn test_bins_and_normalize() {
        let mut table = SkyTable::new(4, 3);
        assert_eq!(table.bin(0.1, 0.1), (0, 0));
        assert_eq!(table.bin(-0.1, FRAC_PI_2), (3, 2));
        assert!((table.azimuth_center(0) - TAU / 8.0).abs() < 1e-12);

        table.set(1, 1, 3.0);
        table.set(2, 0, 1.0);
        table.normalize();
        assert_eq!(table.get(1, 1), 0.75);
        assert_eq!(table.total(), 1.0);
    }

    #[test]
    fn test_read_missing_file() {
        assert!(matches!(
            read_sky_file("/nonexistent/sky.txt"),
            Err(SkyFileError::Io(_))
        ));
    }
}
