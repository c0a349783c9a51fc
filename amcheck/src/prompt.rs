use crystal::CrystalStructure;
use spin::{parse_spin_line, MagneticElements, SpinState};
use spinsearch::Confirm;
use std::io::{BufRead, Write};

/// Questions on the console, answered line by line from `input`.
pub struct Prompter<R> {
    input: R,
}

impl<R: BufRead> Prompter<R> {
    pub fn new(input: R) -> Prompter<R> {
        Prompter { input }
    }

    // end of input reads as an empty answer
    fn ask(&mut self, question: &str) -> String {
        println!("   {}", question);
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if self.input.read_line(&mut line).is_err() {
            line.clear();
        }

        line.trim().to_string()
    }

    /// Spins for every orbit with more than one atom.
    ///
    /// Elements outside `elements` are asked too, with a note. A line that
    /// cannot be parsed leaves its orbit non-magnetic.
    pub fn assign_spins(
        &mut self,
        crystal: &CrystalStructure,
        elements: &MagneticElements,
    ) -> Vec<SpinState> {
        let mut spins = vec![SpinState::None; crystal.get_n_atoms()];

        for orbit in crystal.get_orbits() {
            let symbol = crystal.get_atom(orbit.atom_indices[0]).get_symbol();

            println!();
            println!("   orbit of {} atoms at positions:", symbol);

            for (k, iat) in orbit.atom_indices.iter().enumerate() {
                let p = crystal.get_atom(*iat).get_position();
                println!(
                    "   {:>4} ({:>2}) {:12.6} {:12.6} {:12.6}",
                    iat + 1,
                    k + 1,
                    p.x,
                    p.y,
                    p.z
                );
            }

            if orbit.atom_indices.len() == 1 {
                println!("   only one atom in the orbit: skipping");
                continue;
            }

            if !elements.contains(symbol) {
                println!("   note: {} is not in the magnetic element table", symbol);
            }

            let line = self.ask("type spin (u, U, d, D, n, N, nn or NN) for each of them (space separated):");

            match parse_spin_line(&line, orbit.atom_indices.len()) {
                Ok(orbit_spins) => {
                    for (iat, s) in orbit.atom_indices.iter().zip(orbit_spins) {
                        spins[*iat] = s;
                    }
                }
                Err(err) => {
                    eprintln!("   Error: {}", err);
                    println!("   setting all atoms in this orbit as non-magnetic");
                }
            }
        }

        spins
    }
}

impl<R: BufRead> Confirm for Prompter<R> {
    fn confirm(&mut self, question: &str, default_yes: bool) -> bool {
        let hint = if default_yes { "(Y/n)" } else { "(y/N)" };
        let answer = self.ask(&format!("{} {}", question, hint)).to_lowercase();

        match answer.as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default_yes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};
    use std::io::Cursor;
    use symops::SymOp;

    fn fe_o() -> CrystalStructure {
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(0.25, 0.25, 0.25),
            Vector3::new(0.75, 0.75, 0.75),
            Vector3::new(0.1, 0.2, 0.3),
        ];

        CrystalStructure::from_symbols(
            Matrix3::identity() * 4.0,
            &["Fe", "Fe", "O", "O", "Ni"],
            &positions,
        )
        .unwrap()
        .with_symmetry(vec![SymOp::identity()], vec![0, 0, 2, 2, 4])
        .unwrap()
    }

    #[test]
    fn test_assign_spins() {
        let crystal = fe_o();
        let mut prompter = Prompter::new(Cursor::new("u D\nn N\n"));

        let spins = prompter.assign_spins(&crystal, &MagneticElements::default());

        assert_eq!(
            spins,
            vec![
                SpinState::Up,
                SpinState::Down,
                SpinState::None,
                SpinState::None,
                SpinState::None
            ]
        );
    }

    #[test]
    fn test_orbit_outside_element_table_is_asked() {
        let crystal = fe_o();
        let mut prompter = Prompter::new(Cursor::new("n n\nu d\n"));

        let spins = prompter.assign_spins(&crystal, &MagneticElements::default());

        assert_eq!(
            spins,
            vec![
                SpinState::None,
                SpinState::None,
                SpinState::Up,
                SpinState::Down,
                SpinState::None
            ]
        );

        let o2 = CrystalStructure::from_symbols(
            Matrix3::identity() * 3.0,
            &["O", "O"],
            &[Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.5, 0.5, 0.5)],
        )
        .unwrap()
        .with_symmetry(vec![SymOp::identity()], vec![0, 0])
        .unwrap();
        let mut prompter = Prompter::new(Cursor::new("u d\n"));

        assert_eq!(
            prompter.assign_spins(&o2, &MagneticElements::default()),
            vec![SpinState::Up, SpinState::Down]
        );
    }

    #[test]
    fn test_bad_line_leaves_orbit_non_magnetic() {
        let crystal = fe_o();

        for input in ["u u\n", "u d n\n", "x y\n", ""].iter() {
            let mut prompter = Prompter::new(Cursor::new(*input));
            let spins = prompter.assign_spins(&crystal, &MagneticElements::default());

            assert_eq!(spins, vec![SpinState::None; 5], "{:?}", input);
        }

        // the next orbit is still asked after a bad line
        let mut prompter = Prompter::new(Cursor::new("x y\nd u\n"));
        let spins = prompter.assign_spins(&crystal, &MagneticElements::default());

        assert_eq!(spins[..2], [SpinState::None, SpinState::None]);
        assert_eq!(spins[2..4], [SpinState::Down, SpinState::Up]);
    }

    #[test]
    fn test_confirm_defaults() {
        let mut prompter = Prompter::new(Cursor::new("y\n\nN\nwhatever\n"));

        assert!(prompter.confirm("continue?", false));
        assert!(!prompter.confirm("continue?", false));
        assert!(!prompter.confirm("sample?", true));
        assert!(prompter.confirm("sample?", true));
    }
}
