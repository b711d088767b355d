//! Built-in color maps, stored as GIMP v1.2 gradient text

use super::gimp_gradient::{gradient_to_rgba, parse_gimp_gradient};
use super::transfer_function::PredefinedMap;
use super::ClutError;
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

pub const GREY_GRADIENT: &str = "GIMP Gradient
1
0.000000 0.500000 1.000000 0.000000 0.000000 0.000000 0.000000 1.000000 1.000000 1.000000 1.000000 0 0
";

pub const TEMPERATURE_GRADIENT: &str = "GIMP Gradient
3
0.000000 0.166667 0.333333 0.000000 0.000000 0.300000 0.000000 0.000000 0.200000 1.000000 0.350000 0 0
0.333333 0.500000 0.666667 0.000000 0.200000 1.000000 0.350000 1.000000 0.900000 0.000000 0.700000 0 0
0.666667 0.833333 1.000000 1.000000 0.900000 0.000000 0.700000 1.000000 0.000000 0.000000 1.000000 0 0
";

pub const PHYSICS_GRADIENT: &str = "GIMP Gradient
4
0.000000 0.125000 0.250000 0.000000 0.000000 0.000000 0.000000 0.500000 0.000000 0.600000 0.250000 0 0
0.250000 0.375000 0.500000 0.500000 0.000000 0.600000 0.250000 0.000000 0.400000 1.000000 0.500000 0 0
0.500000 0.625000 0.750000 0.000000 0.400000 1.000000 0.500000 0.000000 1.000000 0.300000 0.750000 0 0
0.750000 0.875000 1.000000 0.000000 1.000000 0.300000 0.750000 1.000000 1.000000 0.000000 1.000000 0 0
";

pub const STANDARD_GRADIENT: &str = "GIMP Gradient
4
0.000000 0.125000 0.250000 0.000000 0.000000 1.000000 0.000000 0.000000 1.000000 1.000000 0.250000 0 0
0.250000 0.375000 0.500000 0.000000 1.000000 1.000000 0.250000 0.000000 1.000000 0.000000 0.500000 0 0
0.500000 0.625000 0.750000 0.000000 1.000000 0.000000 0.500000 1.000000 1.000000 0.000000 0.750000 0 0
0.750000 0.875000 1.000000 1.000000 1.000000 0.000000 0.750000 1.000000 0.000000 0.000000 1.000000 0 0
";

pub const GLOW_GRADIENT: &str = "GIMP Gradient
3
0.000000 0.200000 0.400000 0.000000 0.000000 0.000000 0.000000 0.700000 0.000000 0.000000 0.300000 0 0
0.400000 0.550000 0.700000 0.700000 0.000000 0.000000 0.300000 1.000000 0.600000 0.000000 0.650000 0 0
0.700000 0.850000 1.000000 1.000000 0.600000 0.000000 0.650000 1.000000 1.000000 1.000000 1.000000 0 0
";

pub const BLUE_RED_GRADIENT: &str = "GIMP Gradient
2
0.000000 0.250000 0.500000 0.000000 0.000000 1.000000 1.000000 1.000000 1.000000 1.000000 0.000000 0 0
0.500000 0.750000 1.000000 1.000000 1.000000 1.000000 0.000000 1.000000 0.000000 0.000000 1.000000 0 0
";

pub const SEISMIC_GRADIENT: &str = "GIMP Gradient
4
0.000000 0.150000 0.300000 0.000000 0.000000 0.300000 1.000000 0.000000 0.000000 1.000000 0.600000 0 0
0.300000 0.400000 0.500000 0.000000 0.000000 1.000000 0.600000 1.000000 1.000000 1.000000 0.000000 0 0
0.500000 0.600000 0.700000 1.000000 1.000000 1.000000 0.000000 1.000000 0.000000 0.000000 0.600000 0 0
0.700000 0.850000 1.000000 1.000000 0.000000 0.000000 0.600000 0.400000 0.000000 0.000000 1.000000 0 0
";

fn gradient_text(map: PredefinedMap) -> Option<&'static str> {
    match map {
        PredefinedMap::None => None,
        PredefinedMap::Grey => Some(GREY_GRADIENT),
        PredefinedMap::Temperature => Some(TEMPERATURE_GRADIENT),
        PredefinedMap::Physics => Some(PHYSICS_GRADIENT),
        PredefinedMap::Standard => Some(STANDARD_GRADIENT),
        PredefinedMap::Glow => Some(GLOW_GRADIENT),
        PredefinedMap::BlueRed => Some(BLUE_RED_GRADIENT),
        PredefinedMap::Seismic => Some(SEISMIC_GRADIENT),
    }
}

fn build_predefined_tables() -> FxHashMap<PredefinedMap, Vec<u8>> {
    let mut tables = FxHashMap::default();
    for map in PredefinedMap::ALL {
        let Some(text) = gradient_text(map) else {
            continue;
        };
        match parse_gimp_gradient(text).and_then(|g| gradient_to_rgba(&g)) {
            Ok(rgba) => {
                tables.insert(map, rgba);
            }
            Err(e) => log::error!("[predefined_gradients] {:?} failed to convert: {}", map, e),
        }
    }
    tables
}

lazy_static! {
    static ref PREDEFINED_TABLES: FxHashMap<PredefinedMap, Vec<u8>> = build_predefined_tables();
}

/// 256 RGBA entries for a built-in map; `None` for `PredefinedMap::None`
pub fn predefined_rgba(map: PredefinedMap) -> Result<Option<&'static [u8]>, ClutError> {
    if map == PredefinedMap::None {
        return Ok(None);
    }
    PREDEFINED_TABLES
        .get(&map)
        .map(|t| Some(t.as_slice()))
        .ok_or_else(|| ClutError::Gradient(format!("{:?} gradient unavailable", map)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_gradients_convert() {
        for map in PredefinedMap::ALL {
            let table = predefined_rgba(map).expect("built-in gradients are well formed");
            match map {
                PredefinedMap::None => assert!(table.is_none()),
                _ => assert_eq!(table.map(|t| t.len()), Some(1024)),
            }
        }
    }

    #[test]
    fn test_grey_is_monotonic() {
        let table = predefined_rgba(PredefinedMap::Grey)
            .expect("grey converts")
            .expect("grey has a table");
        let lum: Vec<u8> = table.chunks_exact(4).map(|c| c[0]).collect();
        assert_eq!(lum[0], 0);
        assert!(lum.windows(2).all(|w| w[0] <= w[1]));
        assert!(lum[255] >= 250);
    }
}
