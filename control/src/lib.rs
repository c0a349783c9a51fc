use amconsts::*;
use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    str::FromStr,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected 'key = value', found '{text}'")]
    Syntax { line: usize, text: String },

    #[error("unknown parameter : {0}")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Exhaustive,
    Sampling,
}

impl FromStr for SearchMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exhaustive" | "all" => Ok(SearchMode::Exhaustive),
            "sampling" | "sample" => Ok(SearchMode::Sampling),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Exhaustive => write!(f, "exhaustive"),
            SearchMode::Sampling => write!(f, "sampling"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Cpu,
    Accelerator,
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(BackendKind::Cpu),
            "accelerator" | "gpu" => Ok(BackendKind::Accelerator),
            _ => Err(()),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cpu => write!(f, "cpu"),
            BackendKind::Accelerator => write!(f, "accelerator"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Control {
    tolerance: f64,
    symprec: f64,

    search_mode: SearchMode,
    backend: BackendKind,
    num_threads: usize, // 0: one per available core

    large_threshold: usize,    // confirm exhaustive searches above this many magnetic atoms
    sampling_threshold: usize, // offer sampling above this many

    max_samples: u64,
    batch_size: u64,
    target_found: usize,
    max_seconds: f64, // 0: no limit

    preview_limit: usize,
    unicode: bool,
    seed: Option<u64>,
    output_dir: String,
}

impl Default for Control {
    fn default() -> Self {
        Control {
            tolerance: DEFAULT_TOLERANCE,
            symprec: DEFAULT_SYMPREC,
            search_mode: SearchMode::Exhaustive,
            backend: BackendKind::Cpu,
            num_threads: 0,
            large_threshold: LARGE_SEARCH_THRESHOLD,
            sampling_threshold: SAMPLING_SUGGEST_THRESHOLD,
            max_samples: MAX_SAMPLES,
            batch_size: SAMPLE_BATCH_SIZE,
            target_found: SAMPLE_TARGET_FOUND,
            max_seconds: 0.0,
            preview_limit: PREVIEW_LIMIT,
            unicode: true,
            seed: None,
            output_dir: ".".to_string(),
        }
    }
}

impl Control {
    pub fn new() -> Control {
        Control::default()
    }

    pub fn get_tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn get_symprec(&self) -> f64 {
        self.symprec
    }

    pub fn get_search_mode(&self) -> SearchMode {
        self.search_mode
    }

    pub fn get_backend(&self) -> BackendKind {
        self.backend
    }

    pub fn get_num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn get_large_threshold(&self) -> usize {
        self.large_threshold
    }

    pub fn get_sampling_threshold(&self) -> usize {
        self.sampling_threshold
    }

    pub fn get_max_samples(&self) -> u64 {
        self.max_samples
    }

    pub fn get_batch_size(&self) -> u64 {
        self.batch_size
    }

    pub fn get_target_found(&self) -> usize {
        self.target_found
    }

    pub fn get_max_seconds(&self) -> f64 {
        self.max_seconds
    }

    pub fn get_preview_limit(&self) -> usize {
        self.preview_limit
    }

    pub fn get_unicode(&self) -> bool {
        self.unicode
    }

    pub fn get_seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn get_output_dir(&self) -> &str {
        &self.output_dir
    }

    // command-line flags override values read from in.ctrl

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    pub fn set_symprec(&mut self, symprec: f64) {
        self.symprec = symprec;
    }

    pub fn set_search_mode(&mut self, mode: SearchMode) {
        self.search_mode = mode;
    }

    pub fn set_backend(&mut self, backend: BackendKind) {
        self.backend = backend;
    }

    pub fn set_num_threads(&mut self, n: usize) {
        self.num_threads = n;
    }

    pub fn set_unicode(&mut self, unicode: bool) {
        self.unicode = unicode;
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    pub fn set_max_samples(&mut self, n: u64) {
        self.max_samples = n;
    }

    /// Unicode arrows unless `AMCHECK_USE_UNICODE` is set to `0` or `false`.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("AMCHECK_USE_UNICODE") {
            let v = v.trim().to_lowercase();
            self.unicode = !(v == "0" || v == "false" || v == "no");
        }
    }

    pub fn read_file(&mut self, inpfile: &str) -> Result<(), ControlError> {
        let file = File::open(inpfile).map_err(|source| ControlError::Io {
            path: inpfile.to_string(),
            source,
        })?;

        let lines = BufReader::new(file)
            .lines()
            .collect::<Result<Vec<String>, _>>()
            .map_err(|source| ControlError::Io {
                path: inpfile.to_string(),
                source,
            })?;

        self.parse_lines(&lines)
    }

    pub fn parse_str(&mut self, text: &str) -> Result<(), ControlError> {
        let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();

        self.parse_lines(&lines)
    }

    fn parse_lines(&mut self, lines: &[String]) -> Result<(), ControlError> {
        for (iline, line) in lines.iter().enumerate() {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line.as_str(),
            };

            if line.trim().is_empty() {
                continue;
            }

            let s: Vec<&str> = line.splitn(2, '=').map(|x| x.trim()).collect();

            if s.len() != 2 {
                return Err(ControlError::Syntax {
                    line: iline + 1,
                    text: line.trim().to_string(),
                });
            }

            let (key, value) = (s[0], s[1]);

            match key {
                "tolerance" => self.tolerance = parse_value(key, value)?,
                "symprec" => self.symprec = parse_value(key, value)?,
                "search_mode" => self.search_mode = parse_value(key, value)?,
                "backend" => self.backend = parse_value(key, value)?,
                "num_threads" => self.num_threads = parse_value(key, value)?,
                "large_threshold" => self.large_threshold = parse_value(key, value)?,
                "sampling_threshold" => self.sampling_threshold = parse_value(key, value)?,
                "max_samples" => self.max_samples = parse_value(key, value)?,
                "batch_size" => self.batch_size = parse_value(key, value)?,
                "target_found" => self.target_found = parse_value(key, value)?,
                "max_seconds" => self.max_seconds = parse_value(key, value)?,
                "preview_limit" => self.preview_limit = parse_value(key, value)?,
                "unicode" => self.unicode = parse_value(key, value)?,
                "seed" => self.seed = Some(parse_value(key, value)?),
                "output_dir" => self.output_dir = value.to_string(),
                _ => return Err(ControlError::UnknownKey(key.to_string())),
            }
        }

        self.validate()
    }

    /// Rejects values no search can run with.
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.tolerance <= 0.0 {
            return Err(invalid("tolerance", self.tolerance));
        }
        if self.symprec <= 0.0 {
            return Err(invalid("symprec", self.symprec));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", self.batch_size));
        }

        Ok(())
    }

    pub fn display(&self) {
        println!("   {:-^88}", " control parameters ");
        println!();

        println!(
            "   {:<width1$} = {:>width2$.3E}",
            "tolerance",
            self.get_tolerance(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$.3E}",
            "symprec",
            self.get_symprec(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "search_mode",
            self.get_search_mode().to_string(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "backend",
            self.get_backend().to_string(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "num_threads",
            self.get_num_threads(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );

        if self.search_mode == SearchMode::Sampling {
            println!(
                "   {:<width1$} = {:>width2$}",
                "max_samples",
                self.get_max_samples(),
                width1 = OUT_WIDTH1,
                width2 = OUT_WIDTH2
            );
            println!(
                "   {:<width1$} = {:>width2$}",
                "batch_size",
                self.get_batch_size(),
                width1 = OUT_WIDTH1,
                width2 = OUT_WIDTH2
            );
            println!(
                "   {:<width1$} = {:>width2$}",
                "target_found",
                self.get_target_found(),
                width1 = OUT_WIDTH1,
                width2 = OUT_WIDTH2
            );
            println!(
                "   {:<width1$} = {:>width2$} s",
                "max_seconds",
                self.get_max_seconds(),
                width1 = OUT_WIDTH1,
                width2 = OUT_WIDTH2
            );
        }

        println!();
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ControlError> {
    value.parse::<T>().map_err(|_| ControlError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn invalid<T: fmt::Display>(key: &str, value: T) -> ControlError {
    ControlError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let control = Control::new();

        assert_eq!(control.get_tolerance(), 1.0E-3);
        assert_eq!(control.get_search_mode(), SearchMode::Exhaustive);
        assert_eq!(control.get_backend(), BackendKind::Cpu);
        assert_eq!(control.get_large_threshold(), 20);
        assert_eq!(control.get_sampling_threshold(), 25);
        assert_eq!(control.get_max_samples(), 1_000_000);
        assert_eq!(control.get_batch_size(), 10_000);
        assert_eq!(control.get_target_found(), 100);
        assert_eq!(control.get_preview_limit(), 50);
        assert_eq!(control.get_seed(), None);
        assert!(control.get_unicode());
    }

    #[test]
    fn test_parse_ctrl() {
        let text = "
# search settings
tolerance    = 1.0E-4
search_mode  = sampling   # random draws
backend      = GPU
num_threads  = 4
max_samples  = 5000
seed         = 42
unicode      = false
output_dir   = out
";
        let mut control = Control::new();
        control.parse_str(text).unwrap();

        assert_eq!(control.get_tolerance(), 1.0E-4);
        assert_eq!(control.get_search_mode(), SearchMode::Sampling);
        assert_eq!(control.get_backend(), BackendKind::Accelerator);
        assert_eq!(control.get_num_threads(), 4);
        assert_eq!(control.get_max_samples(), 5000);
        assert_eq!(control.get_seed(), Some(42));
        assert!(!control.get_unicode());
        assert_eq!(control.get_output_dir(), "out");
    }

    #[test]
    fn test_unknown_key() {
        let mut control = Control::new();
        let err = control.parse_str("ecut_wfc = 400").unwrap_err();

        assert!(matches!(err, ControlError::UnknownKey(ref k) if k == "ecut_wfc"));
        assert_eq!(err.to_string(), "unknown parameter : ecut_wfc");
    }

    #[test]
    fn test_invalid_values() {
        let mut control = Control::new();

        assert!(matches!(
            control.parse_str("num_threads = many"),
            Err(ControlError::InvalidValue { .. })
        ));
        assert!(matches!(
            Control::new().parse_str("tolerance = -1"),
            Err(ControlError::InvalidValue { .. })
        ));
        assert!(matches!(
            Control::new().parse_str("\n\ntolerance 1e-3"),
            Err(ControlError::Syntax { line: 3, .. })
        ));
    }

    #[test]
    fn test_validate_overrides() {
        let mut control = Control::new();
        control.set_symprec(0.0);

        assert!(matches!(
            control.validate(),
            Err(ControlError::InvalidValue { ref key, .. }) if key == "symprec"
        ));
    }

    #[test]
    fn test_missing_file() {
        let mut control = Control::new();

        assert!(matches!(
            control.read_file("/nonexistent/in.ctrl"),
            Err(ControlError::Io { .. })
        ));
    }
}
