use amconsts::MAGNETIC_ELEMENTS;
use itertools::Itertools;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpinState {
    Up,
    Down,
    None,
}

impl SpinState {
    pub fn letter(self) -> char {
        match self {
            SpinState::Up => 'u',
            SpinState::Down => 'd',
            SpinState::None => 'n',
        }
    }

    pub fn arrow(self, unicode: bool) -> &'static str {
        match (self, unicode) {
            (SpinState::Up, true) => "↑",
            (SpinState::Down, true) => "↓",
            (SpinState::None, true) => "—",
            (SpinState::Up, false) => "^",
            (SpinState::Down, false) => "v",
            (SpinState::None, false) => "-",
        }
    }

    pub fn flipped(self) -> SpinState {
        match self {
            SpinState::Up => SpinState::Down,
            SpinState::Down => SpinState::Up,
            SpinState::None => SpinState::None,
        }
    }

    pub fn is_polarized(self) -> bool {
        self != SpinState::None
    }

    /// Both carry a moment and the moments are antiparallel.
    pub fn is_opposite(self, other: SpinState) -> bool {
        self.is_polarized() && other == self.flipped()
    }
}

impl fmt::Display for SpinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for SpinState {
    type Err = SpinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "u" => Ok(SpinState::Up),
            "d" => Ok(SpinState::Down),
            "n" => Ok(SpinState::None),
            _ => Err(SpinError::InvalidSpin(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpinError {
    #[error("Invalid spin type: {0}")]
    InvalidSpin(String),

    #[error("Wrong number of spins: got {got} instead of {expected}")]
    WrongCount { got: usize, expected: usize },

    #[error("Number of up spins should equal number of down spins: got {up} up and {down} down spins!")]
    Unbalanced { up: usize, down: usize },
}

/// Parses one line of spin letters for `n` atoms.
///
/// An empty line or a lone `nn` marks every atom as non-magnetic, as does a
/// balanced line with no polarized entry.
pub fn parse_spin_line(line: &str, n: usize) -> Result<Vec<SpinState>, SpinError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    if tokens.is_empty() || (tokens.len() == 1 && tokens[0].eq_ignore_ascii_case("nn")) {
        return Ok(vec![SpinState::None; n]);
    }

    if tokens.len() != n {
        return Err(SpinError::WrongCount {
            got: tokens.len(),
            expected: n,
        });
    }

    let spins = tokens
        .iter()
        .map(|t| t.parse::<SpinState>())
        .collect::<Result<Vec<SpinState>, SpinError>>()?;

    check_balance(&spins)?;

    Ok(spins)
}

pub fn count_spins(spins: &[SpinState]) -> (usize, usize) {
    let up = spins.iter().filter(|s| **s == SpinState::Up).count();
    let down = spins.iter().filter(|s| **s == SpinState::Down).count();

    (up, down)
}

pub fn check_balance(spins: &[SpinState]) -> Result<(), SpinError> {
    let (up, down) = count_spins(spins);

    if up != down {
        return Err(SpinError::Unbalanced { up, down });
    }

    Ok(())
}

pub fn flip_all(spins: &[SpinState]) -> Vec<SpinState> {
    spins.iter().map(|s| s.flipped()).collect()
}

/// `u d n ...`
pub fn spin_string(spins: &[SpinState]) -> String {
    spins.iter().map(|s| s.letter()).join(" ")
}

/// Spins of a search candidate: bit `i` of `id` set means magnetic site `i`
/// points down. Atoms outside `magnetic_indices` carry no moment.
pub fn decode_candidate(id: u64, magnetic_indices: &[usize], natoms: usize) -> Vec<SpinState> {
    let mut spins = vec![SpinState::None; natoms];

    for (bit, iat) in magnetic_indices.iter().enumerate() {
        spins[*iat] = if (id >> bit) & 1 == 0 {
            SpinState::Up
        } else {
            SpinState::Down
        };
    }

    spins
}

/// One accepted configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub id: u64,
    pub spins: Vec<SpinState>,
}

impl SearchResult {
    pub fn new(id: u64, spins: Vec<SpinState>) -> Self {
        SearchResult { id, spins }
    }
}

/// Which elements may carry a moment during a configuration search.
#[derive(Debug, Clone)]
pub struct MagneticElements {
    symbols: HashSet<String>,
}

impl Default for MagneticElements {
    fn default() -> Self {
        MagneticElements::from_symbols(MAGNETIC_ELEMENTS.iter().copied())
    }
}

impl MagneticElements {
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MagneticElements {
            symbols: symbols.into_iter().map(|s| s.into()).collect(),
        }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    /// Indices of atoms whose element is in the table, in atom order.
    pub fn magnetic_indices<S: AsRef<str>>(&self, symbols: &[S]) -> Vec<usize> {
        symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| self.contains(s.as_ref()))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spin_state() {
        assert_eq!("u".parse::<SpinState>(), Ok(SpinState::Up));
        assert_eq!("D".parse::<SpinState>(), Ok(SpinState::Down));
        assert_eq!("N".parse::<SpinState>(), Ok(SpinState::None));
        assert_eq!(
            "x".parse::<SpinState>(),
            Err(SpinError::InvalidSpin("x".to_string()))
        );
    }

    #[test]
    fn test_parse_spin_line() {
        assert_eq!(
            parse_spin_line("u D n", 3).unwrap(),
            vec![SpinState::Up, SpinState::Down, SpinState::None]
        );
        assert_eq!(parse_spin_line("", 2).unwrap(), vec![SpinState::None; 2]);
        assert_eq!(parse_spin_line("  NN ", 4).unwrap(), vec![SpinState::None; 4]);
        assert_eq!(parse_spin_line("n n", 2).unwrap(), vec![SpinState::None; 2]);

        assert_eq!(
            parse_spin_line("u d", 3),
            Err(SpinError::WrongCount { got: 2, expected: 3 })
        );
        assert_eq!(
            parse_spin_line("u u d", 3),
            Err(SpinError::Unbalanced { up: 2, down: 1 })
        );
    }

    #[test]
    fn test_unbalanced_message() {
        let msg = SpinError::Unbalanced { up: 2, down: 0 }.to_string();
        assert_eq!(
            msg,
            "Number of up spins should equal number of down spins: got 2 up and 0 down spins!"
        );
    }

    #[test]
    fn test_decode_candidate() {
        let magnetic = vec![0, 2, 3];

        assert_eq!(
            decode_candidate(0, &magnetic, 5),
            vec![SpinState::Up, SpinState::None, SpinState::Up, SpinState::Up, SpinState::None]
        );
        assert_eq!(
            decode_candidate(0b101, &magnetic, 5),
            vec![SpinState::Down, SpinState::None, SpinState::Up, SpinState::Down, SpinState::None]
        );
    }

    #[test]
    fn test_flip_and_render() {
        let spins = vec![SpinState::Up, SpinState::Down, SpinState::None];

        assert_eq!(spin_string(&spins), "u d n");
        assert_eq!(spin_string(&flip_all(&spins)), "d u n");
        assert!(SpinState::Up.is_opposite(SpinState::Down));
        assert!(!SpinState::None.is_opposite(SpinState::None));
        assert_eq!(SpinState::Down.arrow(false), "v");
    }

    #[test]
    fn test_magnetic_elements() {
        let table = MagneticElements::default();

        assert!(table.contains("Fe"));
        assert!(table.contains("Gd"));
        assert!(!table.contains("O"));

        let symbols = ["Mn", "F", "F", "Mn"];
        assert_eq!(table.magnetic_indices(&symbols), vec![0, 3]);

        let custom = MagneticElements::from_symbols(vec!["O"]);
        assert_eq!(custom.magnetic_indices(&symbols), Vec::<usize>::new());
    }
}
