//! Spectral index catalogue
//!
//! Each entry is a pure per-pixel formula over reflectance at fixed
//! wavelengths. `R(n)` below is reflectance at `n` nm. Every denominator has
//! [`INDEX_EPSILON`] added; this avoids infinities for a single zero band but
//! not `0/0`-style cancellations.

/// Added to every denominator
pub const INDEX_EPSILON: f32 = 1e-6;

/// Wavelengths referenced by at least one index, ascending
pub const REQUIRED_WAVELENGTHS: [u32; 21] = [
    420, 430, 440, 450, 500, 510, 530, 550, 570, 670, 680, 700, 710, 720, 730, 740, 750, 800,
    840, 900, 970,
];

/// Reflectance of one pixel at every required wavelength
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    values: [f32; REQUIRED_WAVELENGTHS.len()],
}

impl Pixel {
    pub fn new(values: [f32; REQUIRED_WAVELENGTHS.len()]) -> Self {
        Self { values }
    }

    /// Builds a pixel from `(wavelength, reflectance)` pairs; unlisted bands are NaN.
    pub fn from_pairs(pairs: &[(u32, f32)]) -> Self {
        let mut values = [f32::NAN; REQUIRED_WAVELENGTHS.len()];
        for &(wavelength, value) in pairs {
            if let Ok(i) = REQUIRED_WAVELENGTHS.binary_search(&wavelength) {
                values[i] = value;
            }
        }
        Self { values }
    }

    /// Reflectance at `wavelength`, NaN if it is not a required band.
    pub fn r(&self, wavelength: u32) -> f32 {
        REQUIRED_WAVELENGTHS
            .binary_search(&wavelength)
            .map_or(f32::NAN, |i| self.values[i])
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f32; REQUIRED_WAVELENGTHS.len()] {
        &mut self.values
    }
}

pub struct SpectralIndex {
    pub name: &'static str,
    pub formula: fn(&Pixel) -> f32,
    /// Display range for indices bounded by construction; `None` means auto
    pub fixed_range: Option<(f32, f32)>,
}

impl SpectralIndex {
    pub fn evaluate(&self, pixel: &Pixel) -> f32 {
        (self.formula)(pixel)
    }
}

impl std::fmt::Debug for SpectralIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralIndex")
            .field("name", &self.name)
            .field("fixed_range", &self.fixed_range)
            .finish()
    }
}

fn inv(a: f32) -> f32 {
    1.0 / (a + INDEX_EPSILON)
}

fn ratio(a: f32, b: f32) -> f32 {
    a / (b + INDEX_EPSILON)
}

fn normalized_difference(a: f32, b: f32) -> f32 {
    (a - b) / (a + b + INDEX_EPSILON)
}

const UNIT_RANGE: Option<(f32, f32)> = Some((-1.0, 1.0));

pub static CATALOGUE: [SpectralIndex; 19] = [
    SpectralIndex {
        name: "ARI1",
        formula: |p| inv(p.r(550)) - inv(p.r(700)),
        fixed_range: None,
    },
    SpectralIndex {
        name: "ARI2",
        formula: |p| p.r(800) * (inv(p.r(550)) - inv(p.r(700))),
        fixed_range: None,
    },
    SpectralIndex {
        name: "CARI",
        formula: |p| ratio(p.r(720), p.r(510)) - 1.0,
        fixed_range: None,
    },
    SpectralIndex {
        name: "CRI1",
        formula: |p| inv(p.r(510)) - inv(p.r(550)),
        fixed_range: None,
    },
    SpectralIndex {
        name: "CRI2",
        formula: |p| inv(p.r(510)) - inv(p.r(700)),
        fixed_range: None,
    },
    SpectralIndex {
        name: "CI_rededge",
        formula: |p| ratio(p.r(840), p.r(720)) - 1.0,
        fixed_range: None,
    },
    SpectralIndex {
        name: "GM1",
        formula: |p| ratio(p.r(750), p.r(550)),
        fixed_range: None,
    },
    SpectralIndex {
        name: "GM2",
        formula: |p| ratio(p.r(750), p.r(700)),
        fixed_range: None,
    },
    SpectralIndex {
        name: "NPCI",
        formula: |p| normalized_difference(p.r(680), p.r(430)),
        fixed_range: UNIT_RANGE,
    },
    SpectralIndex {
        name: "NPQI",
        formula: |p| normalized_difference(p.r(420), p.r(440)),
        fixed_range: UNIT_RANGE,
    },
    SpectralIndex {
        name: "NDVI",
        formula: |p| normalized_difference(p.r(800), p.r(670)),
        fixed_range: UNIT_RANGE,
    },
    SpectralIndex {
        name: "PRI",
        formula: |p| normalized_difference(p.r(530), p.r(570)),
        fixed_range: UNIT_RANGE,
    },
    SpectralIndex {
        name: "PSRI",
        formula: |p| (p.r(680) - p.r(500)) / (p.r(750) + INDEX_EPSILON),
        fixed_range: None,
    },
    SpectralIndex {
        name: "RENDVI",
        formula: |p| normalized_difference(p.r(750), p.r(710)),
        fixed_range: UNIT_RANGE,
    },
    SpectralIndex {
        name: "SRPI",
        formula: |p| ratio(p.r(430), p.r(680)),
        fixed_range: None,
    },
    SpectralIndex {
        name: "SIPI",
        formula: |p| (p.r(800) - p.r(450)) / (p.r(800) - p.r(680) + INDEX_EPSILON),
        fixed_range: None,
    },
    SpectralIndex {
        name: "VREI1",
        formula: |p| ratio(p.r(740), p.r(720)),
        fixed_range: None,
    },
    SpectralIndex {
        name: "VREI2",
        formula: |p| (p.r(730) - p.r(750)) / (p.r(720) + p.r(730) + INDEX_EPSILON),
        fixed_range: None,
    },
    SpectralIndex {
        name: "WBI",
        formula: |p| ratio(p.r(970), p.r(900)),
        fixed_range: None,
    },
];

pub fn find_index(name: &str) -> Option<&'static SpectralIndex> {
    CATALOGUE.iter().find(|index| index.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn eval(name: &str, pairs: &[(u32, f32)]) -> f32 {
        find_index(name).unwrap().evaluate(&Pixel::from_pairs(pairs))
    }

    #[test]
    fn test_required_wavelengths_cover_catalogue() {
        assert!(REQUIRED_WAVELENGTHS.windows(2).all(|w| w[0] < w[1]));

        // Every formula must be finite when all required bands are present.
        let pixel = Pixel::new([100.0; REQUIRED_WAVELENGTHS.len()]);
        for index in &CATALOGUE {
            assert!(index.evaluate(&pixel).is_finite(), "{} not finite", index.name);
        }
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<&str> = CATALOGUE.iter().map(|i| i.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CATALOGUE.len());
    }

    #[test]
    fn test_formulas_against_literal_bands() {
        let e = INDEX_EPSILON;
        let cases: Vec<(&str, Vec<(u32, f32)>, f32)> = vec![
            ("ARI1", vec![(550, 50.0), (700, 100.0)], 1.0 / (50.0 + e) - 1.0 / (100.0 + e)),
            (
                "ARI2",
                vec![(550, 50.0), (700, 100.0), (800, 200.0)],
                200.0 * (1.0 / (50.0 + e) - 1.0 / (100.0 + e)),
            ),
            ("CARI", vec![(720, 150.0), (510, 50.0)], 150.0 / (50.0 + e) - 1.0),
            ("CRI1", vec![(510, 25.0), (550, 50.0)], 1.0 / (25.0 + e) - 1.0 / (50.0 + e)),
            ("CRI2", vec![(510, 25.0), (700, 100.0)], 1.0 / (25.0 + e) - 1.0 / (100.0 + e)),
            ("CI_rededge", vec![(840, 180.0), (720, 60.0)], 180.0 / (60.0 + e) - 1.0),
            ("GM1", vec![(750, 100.0), (550, 50.0)], 2.0),
            ("GM2", vec![(750, 100.0), (700, 40.0)], 2.5),
            ("NPCI", vec![(680, 60.0), (430, 20.0)], 40.0 / (80.0 + e)),
            ("NPQI", vec![(420, 20.0), (440, 60.0)], -40.0 / (80.0 + e)),
            ("NDVI", vec![(800, 200.0), (670, 50.0)], 150.0 / (250.0 + e)),
            ("PRI", vec![(530, 90.0), (570, 110.0)], -20.0 / (200.0 + e)),
            ("PSRI", vec![(680, 60.0), (500, 20.0), (750, 80.0)], 40.0 / (80.0 + e)),
            ("RENDVI", vec![(750, 120.0), (710, 80.0)], 40.0 / (200.0 + e)),
            ("SRPI", vec![(430, 30.0), (680, 60.0)], 0.5),
            ("SIPI", vec![(800, 200.0), (450, 40.0), (680, 40.0)], 1.0),
            ("VREI1", vec![(740, 90.0), (720, 60.0)], 1.5),
            ("VREI2", vec![(730, 70.0), (750, 100.0), (720, 80.0)], -30.0 / (150.0 + e)),
            ("WBI", vec![(970, 45.0), (900, 90.0)], 0.5),
        ];

        assert_eq!(cases.len(), CATALOGUE.len());
        for (name, bands, expected) in cases {
            assert_relative_eq!(eval(name, &bands), expected, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_ndvi_example() {
        let ndvi = eval("NDVI", &[(800, 200.0), (670, 50.0)]);
        assert_relative_eq!(ndvi, 150.0 / (250.0 + INDEX_EPSILON), max_relative = 1e-6);
        assert_relative_eq!(ndvi, 0.6, epsilon = 1e-5);
    }

    #[test]
    fn test_fixed_ranges_are_normalized_differences() {
        let fixed: Vec<&str> = CATALOGUE
            .iter()
            .filter(|i| i.fixed_range == Some((-1.0, 1.0)))
            .map(|i| i.name)
            .collect();
        assert_eq!(fixed, vec!["NPCI", "NPQI", "NDVI", "PRI", "RENDVI"]);
    }

    #[test]
    fn test_epsilon_prevents_infinity_on_zero_band() {
        let value = eval("GM1", &[(750, 10.0), (550, 0.0)]);
        assert!(value.is_finite());
        assert_relative_eq!(value, 10.0 / INDEX_EPSILON, max_relative = 1e-5);
    }
}
