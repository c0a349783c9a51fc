// tolerances

pub const DEFAULT_TOLERANCE: f64 = 1E-3;
pub const DEFAULT_SYMPREC: f64 = 1E-3;

// search limits

pub const MAX_MAGNETIC_ATOMS: usize = 63;
pub const LARGE_SEARCH_THRESHOLD: usize = 20;
pub const SAMPLING_SUGGEST_THRESHOLD: usize = 25;

pub const MAX_SAMPLES: u64 = 1_000_000;
pub const SAMPLE_BATCH_SIZE: u64 = 10_000;
pub const SAMPLE_TARGET_FOUND: usize = 100;

pub const PROGRESS_INTERVAL_MAX: u64 = 100_000;
pub const PREVIEW_LIMIT: usize = 50;

// console output

pub const OUT_WIDTH1: usize = 28;
pub const OUT_WIDTH2: usize = 18;

// element tables

pub const PERIODIC_TABLE: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

// 3d, 4d and 5d transition metals, lanthanides and actinides

pub const MAGNETIC_ELEMENTS: [&str; 59] = [
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", //
    "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", //
    "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", //
    "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", //
    "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr",
];

/// Atomic number of `symbol`; unknown symbols map to hydrogen.
pub fn atomic_number(symbol: &str) -> u32 {
    PERIODIC_TABLE
        .iter()
        .position(|s| *s == symbol)
        .map(|i| i as u32 + 1)
        .unwrap_or(1)
}

pub fn is_known_element(symbol: &str) -> bool {
    PERIODIC_TABLE.iter().any(|s| *s == symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_number() {
        assert_eq!(atomic_number("H"), 1);
        assert_eq!(atomic_number("Fe"), 26);
        assert_eq!(atomic_number("Og"), 118);
        assert_eq!(atomic_number("Xx"), 1);
    }

    #[test]
    fn test_magnetic_elements_are_known() {
        for symbol in MAGNETIC_ELEMENTS.iter() {
            assert!(is_known_element(symbol), "{}", symbol);
        }
    }
}
