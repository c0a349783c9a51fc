use nalgebra::Vector3;
use std::ops::Range;
use std::path::Path;

const STRUCTURE_EXTENSIONS: [&str; 5] = [".vasp", ".poscar", ".POSCAR", ".cif", ".xyz"];

/// Reduces one fractional coordinate into the unit cell.
///
/// The coordinate is taken modulo 1 and shifted into `[0, 1)`; a value that
/// ends up within `tol` of 1 is folded to `1 - x` so that points sitting just
/// below a cell boundary compare as near-zero.
pub fn wrap_coordinate(x: f64, tol: f64) -> f64 {
    let mut w = x % 1.0;

    if w < 0.0 {
        w += 1.0;
    }

    if (1.0 - w).abs() < tol {
        w = 1.0 - w;
    }

    w
}

pub fn wrap_to_cell(v: &Vector3<f64>, tol: f64) -> Vector3<f64> {
    v.map(|x| wrap_coordinate(x, tol))
}

pub fn norm3(v: &Vector3<f64>) -> f64 {
    (v.x * v.x + v.y * v.y + v.z * v.z).sqrt()
}

/// Length of the in-cell image of a fractional difference vector.
pub fn cell_distance(v: &Vector3<f64>, tol: f64) -> f64 {
    norm3(&wrap_to_cell(v, tol))
}

/// Splits `[0, total)` into `nparts` contiguous ranges of near-equal size.
///
/// The first `total % nparts` ranges carry one extra element. Ranges may be
/// empty when `total < nparts`.
pub fn get_chunks(total: u64, nparts: usize) -> Vec<Range<u64>> {
    let nparts = nparts.max(1) as u64;

    let base = total / nparts;
    let rem = total % nparts;

    let mut chunks = Vec::with_capacity(nparts as usize);

    let mut start = 0;
    for ipart in 0..nparts {
        let len = if ipart < rem { base + 1 } else { base };

        chunks.push(start..start + len);

        start += len;
    }

    chunks
}

/// Base name used for result files derived from a structure path.
pub fn output_base_name(path: &str) -> String {
    let file_name = Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut base = file_name.as_str();

    if let Some(ext) = STRUCTURE_EXTENSIONS.iter().find(|ext| base.ends_with(*ext)) {
        base = &base[..base.len() - ext.len()];
    }

    if base.is_empty() || base == "POSCAR" {
        "structure".to_string()
    } else {
        base.to_string()
    }
}

/// Formats seconds since the unix epoch as `YYYYmmdd_HHMMSS` (UTC).
pub fn timestamp_string(unix_seconds: u64) -> String {
    let (year, month, day, hour, minute, second) = civil_time(unix_seconds);

    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        year, month, day, hour, minute, second
    )
}

/// Formats seconds since the unix epoch as `YYYY-mm-dd HH:MM:SS UTC`.
pub fn datetime_string(unix_seconds: u64) -> String {
    let (year, month, day, hour, minute, second) = civil_time(unix_seconds);

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        year, month, day, hour, minute, second
    )
}

pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// days-from-civil inverse, valid for the proleptic Gregorian calendar

fn civil_time(unix_seconds: u64) -> (i64, u32, u32, u32, u32, u32) {
    let days = (unix_seconds / 86400) as i64;
    let secs = unix_seconds % 86400;

    let z = days + 719468;
    let era = z.div_euclid(146097);
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };

    (
        year,
        month,
        day,
        (secs / 3600) as u32,
        ((secs % 3600) / 60) as u32,
        (secs % 60) as u32,
    )
}

#[test]
fn test_wrap_coordinate() {
    let tol = 1.0e-3;

    assert!((wrap_coordinate(1.25, tol) - 0.25).abs() < 1.0e-12);
    assert!((wrap_coordinate(-0.25, tol) - 0.75).abs() < 1.0e-12);
    assert!((wrap_coordinate(-1.0, tol)).abs() < 1.0e-12);

    // just below a boundary folds to a small value
    assert!((wrap_coordinate(0.9999, tol) - 1.0e-4).abs() < 1.0e-12);
    assert!((wrap_coordinate(-1.0e-5, tol) - 1.0e-5).abs() < 1.0e-12);
}

#[test]
fn test_wrap_to_cell_exact_modulo() {
    let v = Vector3::new(2.5, -0.5, 0.9999);
    let w = wrap_to_cell(&v, 0.0);

    assert!((w.x - 0.5).abs() < 1.0e-12);
    assert!((w.y - 0.5).abs() < 1.0e-12);
    assert!((w.z - 0.9999).abs() < 1.0e-12);
}

#[test]
fn test_wrap_to_cell_idempotent() {
    let tol = 1.0e-3;

    let samples = [
        Vector3::new(0.1, 0.2, 0.3),
        Vector3::new(-3.7, 12.25, 0.99995),
        Vector3::new(1.0, -1.0, 0.0004),
        Vector3::new(-0.0002, 5.5, -7.125),
    ];

    for v in samples.iter() {
        let once = wrap_to_cell(v, tol);
        let twice = wrap_to_cell(&once, tol);

        for i in 0..3 {
            assert!((once[i] - twice[i]).abs() <= tol, "{:?} {:?}", once, twice);
        }
    }
}

#[test]
fn test_cell_distance() {
    let tol = 1.0e-3;

    assert!(cell_distance(&Vector3::new(1.0, -2.0, 3.0), tol) < tol);
    assert!(cell_distance(&Vector3::new(0.9999, 0.0, -1.0001), tol) < tol);
    assert!(cell_distance(&Vector3::new(0.5, 0.0, 0.0), tol) > 0.4);
}

#[test]
fn test_get_chunks() {
    let chunks = get_chunks(31, 5);

    assert_eq!(chunks.len(), 5);
    assert_eq!(chunks[0], 0..7);
    assert_eq!(chunks[1], 7..13);
    assert_eq!(chunks[4], 25..31);

    let lens: Vec<u64> = chunks.iter().map(|r| r.end - r.start).collect();
    assert_eq!(lens, vec![7, 6, 6, 6, 6]);
}

#[test]
fn test_get_chunks_covers_range() {
    for total in [0u64, 1, 3, 16, 1000, 1 << 20].iter() {
        for nparts in 1..9 {
            let chunks = get_chunks(*total, nparts);

            assert_eq!(chunks.len(), nparts);
            assert_eq!(chunks[0].start, 0);
            assert_eq!(chunks.last().unwrap().end, *total);

            for w in chunks.windows(2) {
                assert_eq!(w[0].end, w[1].start);
            }
        }
    }
}

#[test]
fn test_output_base_name() {
    assert_eq!(output_base_name("data/MnTe.vasp"), "MnTe");
    assert_eq!(output_base_name("/tmp/RuO2.POSCAR"), "RuO2");
    assert_eq!(output_base_name("CrSb.cif"), "CrSb");
    assert_eq!(output_base_name("run/POSCAR"), "structure");
    assert_eq!(output_base_name(""), "structure");
    assert_eq!(output_base_name("MnF2"), "MnF2");
}

#[test]
fn test_timestamp_string() {
    assert_eq!(timestamp_string(0), "19700101_000000");
    assert_eq!(timestamp_string(951782400), "20000229_000000");
    assert_eq!(timestamp_string(1700000000), "20231114_221320");
    assert_eq!(datetime_string(1700000000), "2023-11-14 22:13:20 UTC");
}
