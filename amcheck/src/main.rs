use altermag::{analyze_structure, AltermagError};
use clap::Parser;
use control::{BackendKind, Control, ControlError, SearchMode};
use crystal::{aux_poscar_path, CrystalError, CrystalStructure};
use env_logger::Env;
use log::{debug, info, warn};
use report::{print_preview, print_summary, report_path, write_report, ReportSummary};
use spin::{parse_spin_line, MagneticElements, SpinError};
use spinsearch::*;
use std::io::BufRead;
use thiserror::Error;
use utility::unix_now;

mod prompt;

use prompt::Prompter;

#[derive(Parser, Debug)]
#[command(name = "amcheck")]
#[command(about = "Checks whether collinear spin arrangements of a crystal are altermagnetic")]
#[command(version)]
struct Cli {
    /// Structure files in VASP POSCAR format
    #[arg(required = true, value_name = "FILES")]
    files: Vec<String>,

    /// Debug output, including per-orbit traces
    #[arg(short, long)]
    verbose: bool,

    /// Tolerance of the symmetry detection
    #[arg(short, long)]
    symprec: Option<f64>,

    /// Tolerance for position comparison
    #[arg(short, long)]
    tolerance: Option<f64>,

    /// Enumerate every spin configuration of the magnetic atoms
    #[arg(short = 'a', long = "search-all")]
    search_all: bool,

    /// Random sampling instead of the exhaustive enumeration
    #[arg(long)]
    sample: bool,

    /// Use the bit-parallel accelerator backend
    #[arg(long, conflicts_with = "cpu")]
    gpu: bool,

    /// Use the exact cpu backend
    #[arg(long)]
    cpu: bool,

    /// Worker threads (0: all available cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Spins for every atom, e.g. "u d n n n n"
    #[arg(long, value_name = "SPINS", conflicts_with = "search_all")]
    spins: Option<String>,

    /// Control file with key = value parameters
    #[arg(long, value_name = "in.ctrl")]
    ctrl: Option<String>,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long)]
    yes: bool,

    /// Seed of the sampling generator
    #[arg(long)]
    seed: Option<u64>,

    /// Upper bound on sampled configurations
    #[arg(long)]
    max_samples: Option<u64>,

    /// Plain ASCII spin arrows
    #[arg(long)]
    ascii: bool,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Crystal(#[from] CrystalError),

    #[error(transparent)]
    Spin(#[from] SpinError),

    #[error(transparent)]
    Altermag(#[from] AltermagError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let control = match build_control(&cli) {
        Ok(control) => control,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
    };

    control.display();

    let elements = MagneticElements::default();
    let stdin = std::io::stdin();
    let mut prompter = Prompter::new(stdin.lock());

    for file in cli.files.iter() {
        println!();
        println!("   {:=^88}", format!(" {} ", file));
        println!();

        let result = if wants_search(&cli, &control) {
            if cli.yes {
                search_file(file, &control, &elements, &mut AlwaysConfirm)
            } else {
                search_file(file, &control, &elements, &mut prompter)
            }
        } else {
            check_file(file, &cli, &control, &elements, &mut prompter)
        };

        if let Err(err) = result {
            eprintln!("ERROR: {}", err);
        }
    }
}

// `search_mode = sampling` in the control file searches without `-a`
fn wants_search(cli: &Cli, control: &Control) -> bool {
    cli.search_all || cli.sample || control.get_search_mode() == SearchMode::Sampling
}

// file values first, then the environment, then the command line
fn build_control(cli: &Cli) -> Result<Control, ControlError> {
    let mut control = Control::new();

    if let Some(ctrl) = &cli.ctrl {
        control.read_file(ctrl)?;
    }

    control.apply_env();

    if let Some(tolerance) = cli.tolerance {
        control.set_tolerance(tolerance);
    }
    if let Some(symprec) = cli.symprec {
        control.set_symprec(symprec);
    }
    if cli.sample {
        control.set_search_mode(SearchMode::Sampling);
    }
    if cli.gpu {
        control.set_backend(BackendKind::Accelerator);
    }
    if cli.cpu {
        control.set_backend(BackendKind::Cpu);
    }
    if let Some(n) = cli.threads {
        control.set_num_threads(n);
    }
    if cli.seed.is_some() {
        control.set_seed(cli.seed);
    }
    if let Some(n) = cli.max_samples {
        control.set_max_samples(n);
    }
    if cli.ascii {
        control.set_unicode(false);
    }

    control.validate()?;

    Ok(control)
}

fn load_structure(file: &str, control: &Control) -> Result<CrystalStructure, AppError> {
    let mut crystal = CrystalStructure::read_poscar(file)?;

    crystal.display();

    let class = crystal.analyze_symmetry(control.get_symprec())?;

    crystal.display_symmetry(&class);

    Ok(crystal)
}

fn check_file<R: BufRead>(
    file: &str,
    cli: &Cli,
    control: &Control,
    elements: &MagneticElements,
    prompter: &mut Prompter<R>,
) -> Result<(), AppError> {
    let mut crystal = load_structure(file, control)?;

    let aux = aux_poscar_path(file);
    match crystal.write_poscar(&aux) {
        Ok(()) => info!("structure with detected symmetry written to {}", aux),
        Err(err) => warn!("{}", err),
    }

    let spins = match &cli.spins {
        Some(line) => parse_spin_line(line, crystal.get_n_atoms())?,
        None => prompter.assign_spins(&crystal, elements),
    };

    crystal.set_spins(&spins)?;

    let analysis = analyze_structure(&crystal, &spins, control.get_tolerance())?;

    analysis.display(&spins);

    if analysis.altermagnet {
        println!("   {:-^88}", " RESULT: ALTERMAGNET! ");
    } else {
        println!("   {:-^88}", " RESULT: NOT ALTERMAGNET ");
    }

    Ok(())
}

fn search_file(
    file: &str,
    control: &Control,
    elements: &MagneticElements,
    confirm: &mut dyn Confirm,
) -> Result<(), AppError> {
    let crystal = load_structure(file, control)?;
    let ctx = SearchContext::new(&crystal, elements, control.get_tolerance())?;

    ctx.display();

    let plan = match control.get_search_mode() {
        SearchMode::Sampling => SearchPlan::Sampling,
        SearchMode::Exhaustive => plan_search(
            ctx.get_n_magnetic(),
            control.get_large_threshold(),
            control.get_sampling_threshold(),
            confirm,
        ),
    };

    debug!("search plan: {:?}", plan);

    let options = SamplingOptions {
        max_samples: control.get_max_samples(),
        batch_size: control.get_batch_size(),
        target_found: control.get_target_found(),
        max_seconds: control.get_max_seconds(),
        seed: control.get_seed(),
    };

    let total = match plan {
        SearchPlan::Exhaustive => ctx.get_n_candidates(),
        SearchPlan::Sampling => options.max_samples.min(ctx.get_n_candidates()),
        SearchPlan::Cancelled => return Ok(()),
    };

    let selection = select_backend(
        control.get_backend(),
        &ctx,
        control.get_num_threads(),
        AcceleratorOptions::default(),
    );

    let symbols: Vec<String> = crystal
        .get_chemical_symbols()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let (tx, reporter) = ProgressReporter::spawn(symbols, control.get_unicode());
    let progress = Progress::with_channel(total, tx);

    let outcome = match plan {
        SearchPlan::Sampling => run_sampling(&ctx, &selection, &options, &progress),
        _ => run_exhaustive(&ctx, &selection, &progress),
    };

    // closes the channel so the reporter can drain and exit
    drop(progress);
    reporter.join();

    let outcome = outcome?;

    outcome.display();

    let summary = ReportSummary {
        method: outcome.method.to_string(),
        backend: outcome.backend.clone(),
        total_tested: outcome.total_tested,
        accepted: outcome.get_n_accepted(),
        tolerance: control.get_tolerance(),
        exhaustive: outcome.exhaustive,
        generated_at: unix_now(),
    };

    let path = report_path(control.get_output_dir(), file, &summary);

    let saved = match write_report(
        &path,
        &crystal,
        &summary,
        &outcome.results,
        control.get_unicode(),
    ) {
        Ok(()) => Some(path.as_path()),
        Err(err) => {
            eprintln!("ERROR: {}", err);
            None
        }
    };

    if !outcome.results.is_empty() {
        print_preview(
            &crystal,
            &outcome.results,
            control.get_preview_limit(),
            control.get_unicode(),
        );
    }

    print_summary(&summary, saved);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_routing() {
        let cli = Cli::try_parse_from(["amcheck", "POSCAR"]).unwrap();
        let mut control = build_control(&cli).unwrap();

        assert!(!wants_search(&cli, &control));

        control.set_search_mode(SearchMode::Sampling);
        assert!(wants_search(&cli, &control));

        let cli = Cli::try_parse_from(["amcheck", "-a", "POSCAR"]).unwrap();
        assert!(wants_search(&cli, &build_control(&cli).unwrap()));

        let cli = Cli::try_parse_from(["amcheck", "--sample", "POSCAR"]).unwrap();
        let control = build_control(&cli).unwrap();
        assert!(wants_search(&cli, &control));
        assert_eq!(control.get_search_mode(), SearchMode::Sampling);
    }

    #[test]
    fn test_ctrl_file_sampling_searches() {
        let mut path = std::env::temp_dir();
        path.push(format!("amcheck_ctrl_{}.ctrl", std::process::id()));
        std::fs::write(&path, "search_mode = sampling\n").unwrap();

        let ctrl = path.display().to_string();
        let cli = Cli::try_parse_from(["amcheck", "--ctrl", ctrl.as_str(), "POSCAR"]).unwrap();
        let control = build_control(&cli);
        std::fs::remove_file(&path).ok();

        assert!(wants_search(&cli, &control.unwrap()));
    }
}
