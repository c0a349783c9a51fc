use amconsts::*;
use crystal::CrystalStructure;
use itertools::Itertools;
use log::info;
use spin::{spin_string, SearchResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use utility::{datetime_string, output_base_name, timestamp_string};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Totals shown in the report header and the console summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub method: String,
    pub backend: String,
    pub total_tested: u64,
    pub accepted: usize,
    pub tolerance: f64,
    pub exhaustive: bool,
    pub generated_at: u64,
}

impl ReportSummary {
    /// Sampling runs keep their own file name and title even at full coverage.
    pub fn is_sampled(&self) -> bool {
        self.method == "sampling"
    }

    /// Accepted fraction in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total_tested == 0 {
            0.0
        } else {
            100.0 * self.accepted as f64 / self.total_tested as f64
        }
    }
}

pub fn report_file_name(input_path: &str, sampled: bool, unix_seconds: u64) -> String {
    let kind = if sampled {
        "amcheck_sampled_results"
    } else {
        "amcheck_results"
    };

    format!(
        "{}_{}_{}.txt",
        output_base_name(input_path),
        kind,
        timestamp_string(unix_seconds)
    )
}

pub fn report_path(output_dir: &str, input_path: &str, summary: &ReportSummary) -> PathBuf {
    Path::new(output_dir).join(report_file_name(
        input_path,
        summary.is_sampled(),
        summary.generated_at,
    ))
}

/// `Config #      12: u d n | Fe(↑) Fe(↓) O(—)`
pub fn format_config_line(symbols: &[&str], result: &SearchResult, unicode: bool) -> String {
    let detail = symbols
        .iter()
        .zip(result.spins.iter())
        .map(|(sym, s)| format!("{}({})", sym, s.arrow(unicode)))
        .join(" ");

    format!(
        "Config #{:>8}: {} | {}",
        result.id,
        spin_string(&result.spins),
        detail
    )
}

pub fn format_header(structure: &CrystalStructure, summary: &ReportSummary, unicode: bool) -> String {
    let mut lines = Vec::new();

    if summary.is_sampled() {
        lines.push("# amcheck - Sampled Altermagnetic Spin Configurations".to_string());
    } else {
        lines.push("# amcheck - Altermagnetic Spin Configurations".to_string());
    }

    lines.push(format!(
        "# Generated on: {} ({})",
        datetime_string(summary.generated_at),
        summary.generated_at
    ));
    lines.push(format!("# Structure: {} atoms", structure.get_n_atoms()));
    lines.push(format!("# Search method: {}", summary.method));
    lines.push(format!("# Backend: {}", summary.backend));
    lines.push(format!(
        "# Total configurations tested: {}",
        summary.total_tested
    ));
    lines.push(format!(
        "# Altermagnetic configurations found: {}",
        summary.accepted
    ));
    lines.push(format!("# Tolerance: {}", summary.tolerance));
    lines.push(format!("# Success rate: {:.2}%", summary.success_rate()));

    if !summary.exhaustive {
        lines.push(
            "# NOTE: random sample only, configurations not listed here may still be altermagnetic"
                .to_string(),
        );
    }

    lines.push("#".to_string());
    lines.push("# Atomic structure:".to_string());

    for (i, at) in structure.get_atoms().iter().enumerate() {
        let p = at.get_position();
        lines.push(format!(
            "# Atom {:>2}: {:>2} at ({:>9.6}, {:>9.6}, {:>9.6})",
            i + 1,
            at.get_symbol(),
            p.x,
            p.y,
            p.z
        ));
    }

    lines.push("#".to_string());
    lines.push("# Format: ConfigID | Spin_Pattern | Detailed_Assignment".to_string());
    lines.push("#         u = up, d = down, n = none".to_string());

    lines.push(format!(
        "#         {} = spin up, {} = spin down, {} = non-magnetic",
        spin::SpinState::Up.arrow(unicode),
        spin::SpinState::Down.arrow(unicode),
        spin::SpinState::None.arrow(unicode)
    ));
    lines.push("#".to_string());

    let mut out = lines.join("\n");
    out.push_str("\n\n");

    out
}

pub fn format_report(
    structure: &CrystalStructure,
    summary: &ReportSummary,
    results: &[SearchResult],
    unicode: bool,
) -> String {
    let symbols = structure.get_chemical_symbols();

    let mut out = format_header(structure, summary, unicode);

    for r in results.iter() {
        out.push_str(&format_config_line(&symbols, r, unicode));
        out.push('\n');
    }

    out
}

pub fn write_report(
    path: &Path,
    structure: &CrystalStructure,
    summary: &ReportSummary,
    results: &[SearchResult],
    unicode: bool,
) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut f = fs::File::create(path).map_err(io_err)?;
    f.write_all(format_report(structure, summary, results, unicode).as_bytes())
        .map_err(io_err)?;

    info!("{} configurations written to {}", results.len(), path.display());

    Ok(())
}

/// Lines shown on the console: the first `limit` results and a count of the rest.
pub fn preview_lines(
    symbols: &[&str],
    results: &[SearchResult],
    limit: usize,
    unicode: bool,
) -> Vec<String> {
    let mut lines: Vec<String> = results
        .iter()
        .take(limit)
        .map(|r| format_config_line(symbols, r, unicode))
        .collect();

    if results.len() > limit {
        lines.push(format!("... and {} more", results.len() - limit));
    }

    lines
}

pub fn print_preview(
    structure: &CrystalStructure,
    results: &[SearchResult],
    limit: usize,
    unicode: bool,
) {
    let symbols = structure.get_chemical_symbols();

    println!(
        "   {:-^88}",
        format!(" first {} configurations ", limit.min(results.len()))
    );
    println!();

    for line in preview_lines(&symbols, results, limit, unicode) {
        println!("   {}", line);
    }

    println!();
}

pub fn print_summary(summary: &ReportSummary, saved_to: Option<&Path>) {
    println!("   {:-^88}", " summary ");
    println!();

    println!(
        "   {:<width1$} = {:>width2$}",
        "search_method",
        summary.method,
        width1 = OUT_WIDTH1,
        width2 = OUT_WIDTH2
    );
    println!(
        "   {:<width1$} = {:>width2$}",
        "backend",
        summary.backend,
        width1 = OUT_WIDTH1,
        width2 = OUT_WIDTH2
    );
    println!(
        "   {:<width1$} = {:>width2$}",
        "configurations_tested",
        summary.total_tested,
        width1 = OUT_WIDTH1,
        width2 = OUT_WIDTH2
    );
    println!(
        "   {:<width1$} = {:>width2$}",
        "altermagnetic_found",
        summary.accepted,
        width1 = OUT_WIDTH1,
        width2 = OUT_WIDTH2
    );
    println!(
        "   {:<width1$} = {:>width2$.2} %",
        "success_rate",
        summary.success_rate(),
        width1 = OUT_WIDTH1,
        width2 = OUT_WIDTH2
    );

    if let Some(path) = saved_to {
        println!(
            "   {:<width1$} = {:>width2$}",
            "results_file",
            path.display().to_string(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};
    use spin::SpinState::{Down, None as N, Up};

    fn pair_structure() -> CrystalStructure {
        CrystalStructure::from_symbols(
            Matrix3::identity() * 3.0,
            &["Fe", "Fe", "O"],
            &[
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.5, 0.5, 0.5),
                Vector3::new(0.25, 0.25, 0.25),
            ],
        )
        .unwrap()
    }

    fn summary(exhaustive: bool) -> ReportSummary {
        ReportSummary {
            method: if exhaustive { "exhaustive" } else { "sampling" }.to_string(),
            backend: "cpu".to_string(),
            total_tested: 4,
            accepted: 1,
            tolerance: 1.0e-3,
            exhaustive,
            generated_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            report_file_name("/tmp/MnF2.vasp", false, 1_700_000_000),
            "MnF2_amcheck_results_20231114_221320.txt"
        );
        assert_eq!(
            report_file_name("POSCAR", true, 1_700_000_000),
            "structure_amcheck_sampled_results_20231114_221320.txt"
        );

        let p = report_path("out", "NiO.cif", &summary(true));
        assert_eq!(p, Path::new("out").join("NiO_amcheck_results_20231114_221320.txt"));
    }

    #[test]
    fn test_config_line() {
        let r = SearchResult::new(2, vec![Down, Up, N]);

        assert_eq!(
            format_config_line(&["Fe", "Fe", "O"], &r, true),
            "Config #       2: d u n | Fe(↓) Fe(↑) O(—)"
        );
        assert_eq!(
            format_config_line(&["Fe", "Fe", "O"], &r, false),
            "Config #       2: d u n | Fe(v) Fe(^) O(-)"
        );
    }

    #[test]
    fn test_header() {
        let header = format_header(&pair_structure(), &summary(true), true);

        assert!(header.starts_with("# amcheck - Altermagnetic Spin Configurations\n"));
        assert!(header.contains("# Generated on: 2023-11-14 22:13:20 UTC (1700000000)\n"));
        assert!(header.contains("# Structure: 3 atoms\n"));
        assert!(header.contains("# Success rate: 25.00%\n"));
        assert!(header.contains("# Atom  2: Fe at ( 0.500000,  0.500000,  0.500000)\n"));
        assert!(header.contains("↑ = spin up"));
        assert!(!header.contains("NOTE"));
        assert!(header.ends_with("#\n\n"));

        let sampled = format_header(&pair_structure(), &summary(false), false);
        assert!(sampled.starts_with("# amcheck - Sampled"));
        assert!(sampled.contains("# NOTE: random sample only"));
        assert!(sampled.contains("^ = spin up, v = spin down, - = non-magnetic"));
    }

    #[test]
    fn test_full_coverage_sample_keeps_sampled_naming() {
        let full = ReportSummary {
            exhaustive: true,
            ..summary(false)
        };

        let p = report_path("out", "MnF2.vasp", &full);
        assert_eq!(
            p,
            Path::new("out").join("MnF2_amcheck_sampled_results_20231114_221320.txt")
        );

        let header = format_header(&pair_structure(), &full, true);
        assert!(header.starts_with("# amcheck - Sampled Altermagnetic Spin Configurations\n"));
        assert!(header.contains("# Search method: sampling\n"));
        assert!(!header.contains("NOTE"));
    }

    #[test]
    fn test_preview_truncates() {
        let results: Vec<SearchResult> = (0..5)
            .map(|id| SearchResult::new(id, vec![Up, Down, N]))
            .collect();
        let symbols = ["Fe", "Fe", "O"];

        let lines = preview_lines(&symbols, &results, 3, false);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "... and 2 more");

        assert_eq!(preview_lines(&symbols, &results, 50, false).len(), 5);
    }

    #[test]
    fn test_write_report() {
        let structure = pair_structure();
        let results = vec![SearchResult::new(1, vec![Down, Up, N])];

        let mut path = std::env::temp_dir();
        path.push(format!("amcheck_report_{}.txt", std::process::id()));

        write_report(&path, &structure, &summary(true), &results, true).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(text.ends_with("Config #       1: d u n | Fe(↓) Fe(↑) O(—)\n"));

        let bad = Path::new("/nonexistent/dir/report.txt");
        assert!(matches!(
            write_report(bad, &structure, &summary(true), &results, true),
            Err(ReportError::Io { .. })
        ));
    }
}
