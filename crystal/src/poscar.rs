use crate::{Atom, CrystalError, CrystalStructure};
use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use std::fs;
use std::io::Write;

/// Path of the auxiliary structure file written next to an input file.
pub fn aux_poscar_path(input: &str) -> String {
    format!("{}_amcheck.vasp", input)
}

impl CrystalStructure {
    pub fn read_poscar(path: &str) -> Result<CrystalStructure, CrystalError> {
        let text = fs::read_to_string(path).map_err(|source| CrystalError::Io {
            path: path.to_string(),
            source,
        })?;

        CrystalStructure::parse_poscar(&text)
    }

    // POSCAR layout:
    // line 1: comment (species names for files without a names line)
    // line 2: scale factor, negative values give the cell volume
    // line 3-5: lattice vectors
    // line 6: element names (optional in old files)
    // line 7: counts per element
    // optional "Selective dynamics" line
    // coordinate mode line (Direct or Cartesian), then one position per atom
    pub fn parse_poscar(text: &str) -> Result<CrystalStructure, CrystalError> {
        let lines: Vec<&str> = text.lines().collect();

        let comment = line_at(&lines, 0)?;
        let scale = parse_floats(line_at(&lines, 1)?, 1, 1)?[0];

        let mut cell = Matrix3::<f64>::zeros();
        for irow in 0..3 {
            let v = parse_floats(line_at(&lines, 2 + irow)?, 3, 3 + irow)?;
            for icol in 0..3 {
                cell[(irow, icol)] = v[icol];
            }
        }

        let factor = if scale < 0.0 {
            let volume = cell.determinant().abs();
            if volume <= 0.0 {
                return Err(CrystalError::Parse {
                    line: 3,
                    msg: "lattice vectors are linearly dependent".to_string(),
                });
            }
            (scale.abs() / volume).cbrt()
        } else {
            scale
        };
        cell *= factor;

        let mut iline = 5;

        let first: Vec<&str> = line_at(&lines, iline)?.split_whitespace().collect();
        let has_names = first.first().map_or(false, |t| t.parse::<usize>().is_err());

        let names: Vec<String> = if has_names {
            iline += 1;
            first.iter().map(|s| s.to_string()).collect()
        } else {
            comment.split_whitespace().map(|s| s.to_string()).collect()
        };

        let counts: Vec<usize> = line_at(&lines, iline)?
            .split_whitespace()
            .map(|t| {
                t.parse::<usize>().map_err(|_| CrystalError::Parse {
                    line: iline + 1,
                    msg: format!("invalid atom count '{}'", t),
                })
            })
            .collect::<Result<Vec<usize>, CrystalError>>()?;
        iline += 1;

        if names.len() < counts.len() {
            return Err(CrystalError::Parse {
                line: iline,
                msg: format!("{} counts but {} element names", counts.len(), names.len()),
            });
        }

        if line_at(&lines, iline)?
            .trim_start()
            .starts_with(|c: char| c == 'S' || c == 's')
        {
            iline += 1;
        }

        let mode = line_at(&lines, iline)?.trim_start().chars().next().unwrap_or('D');
        let cartesian = matches!(mode, 'C' | 'c' | 'K' | 'k');
        iline += 1;

        let to_frac = if cartesian {
            cell.transpose().try_inverse().ok_or(CrystalError::Parse {
                line: 3,
                msg: "singular lattice".to_string(),
            })?
        } else {
            Matrix3::identity()
        };
        let coord_scale = if cartesian { factor } else { 1.0 };

        let mut atoms = Vec::new();

        for (name, count) in names.iter().zip(counts.iter()) {
            for _ in 0..*count {
                let v = parse_floats(line_at(&lines, iline)?, 3, iline + 1)?;
                let p = Vector3::new(v[0], v[1], v[2]) * coord_scale;

                atoms.push(Atom::new(name, to_frac * p));
                iline += 1;
            }
        }

        if atoms.is_empty() {
            return Err(CrystalError::Empty);
        }

        Ok(CrystalStructure::new(cell, atoms))
    }

    /// POSCAR text with atoms grouped by element in first-appearance order.
    pub fn to_poscar_string(&self, comment: &str) -> String {
        let mut out = String::new();

        out.push_str(comment);
        out.push('\n');
        out.push_str("1.0\n");

        for row in self.get_cell().row_iter() {
            out.push_str(&format!("  {:.6}  {:.6}  {:.6}\n", row[0], row[1], row[2]));
        }

        let species = self.get_unique_species();

        out.push_str(&species.iter().join(" "));
        out.push('\n');

        let counts = species
            .iter()
            .map(|sp| self.get_atoms().iter().filter(|at| at.get_symbol() == sp).count())
            .join(" ");
        out.push_str(&counts);
        out.push('\n');

        out.push_str("Direct\n");

        for sp in species.iter() {
            for at in self.get_atoms().iter().filter(|at| at.get_symbol() == sp) {
                let p = at.get_position();
                out.push_str(&format!("  {:.6}  {:.6}  {:.6}\n", p.x, p.y, p.z));
            }
        }

        out
    }

    pub fn write_poscar(&self, path: &str) -> Result<(), CrystalError> {
        let io_err = |source| CrystalError::Io {
            path: path.to_string(),
            source,
        };

        let mut f = fs::File::create(path).map_err(io_err)?;
        f.write_all(self.to_poscar_string("Generated by amcheck").as_bytes())
            .map_err(io_err)?;

        Ok(())
    }
}

fn line_at<'a>(lines: &[&'a str], i: usize) -> Result<&'a str, CrystalError> {
    lines.get(i).copied().ok_or(CrystalError::Parse {
        line: i + 1,
        msg: "unexpected end of file".to_string(),
    })
}

fn parse_floats(line: &str, n: usize, line_no: usize) -> Result<Vec<f64>, CrystalError> {
    let v: Vec<f64> = line
        .split_whitespace()
        .take(n)
        .map(|t| {
            t.parse::<f64>().map_err(|_| CrystalError::Parse {
                line: line_no,
                msg: format!("invalid number '{}'", t),
            })
        })
        .collect::<Result<Vec<f64>, CrystalError>>()?;

    if v.len() < n {
        return Err(CrystalError::Parse {
            line: line_no,
            msg: format!("expected {} numbers, got {}", n, v.len()),
        });
    }

    Ok(v)
}
