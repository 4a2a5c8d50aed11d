mod os_signal_termination;
mod result;

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap::ValueEnum;
use log::error;
use log::info;
use log::warn;
use log::LevelFilter;
use result::StationPackError;
use result::StationPackResult;
use stationpack_solver::cache::ContainmentCache;
use stationpack_solver::data::ChannelSpecificConstraintManager;
use stationpack_solver::data::DomainStationManager;
use stationpack_solver::grouping::ComponentOrder;
use stationpack_solver::sat::backend::CdclBackend;
use stationpack_solver::sat::backend::ExternalProcessBackend;
use stationpack_solver::sat::backend::SatSolver;
use stationpack_solver::solvers::certifiers::NeighbourhoodOptions;
use stationpack_solver::solvers::InstanceSolver;
use stationpack_solver::solvers::PipelineOptions;
use stationpack_solver::solvers::SolverPipeline;
use stationpack_solver::termination::Composite;
use stationpack_solver::termination::TimeBudget;
use stationpack_solver::StationPackingInstance;
use stationpack_solver::NAME_KEY;

#[derive(Debug, Parser)]
#[command(
    help_template = "\
{before-help}{name} {version}
Authors: {author}
About: {about}

{usage-heading}\n{tab}{usage}

{all-args}{after-help}
",
    author,
    version,
    about,
    arg_required_else_help = true
)]
struct Args {
    /// The instances to solve, each a JSON file of the form
    /// `{"domains":{"3":[3,4,5]},"previousAssignment":{"3":3},"metadata":{"NAME":"SAMPLE"}}`.
    ///
    /// The instances are solved one after the other by the same pipeline, so proofs found for
    /// earlier instances are reused for later ones.
    #[arg(required = true, verbatim_doc_comment)]
    instance_paths: Vec<PathBuf>,

    /// The station domain file. Every line holds `label,stationId,channel,channel,...`.
    #[arg(long)]
    domains: PathBuf,

    /// The interference file. Every line holds
    /// `KEY,lowChannel,highChannel,subjectStationId,targetStationId,...` where KEY is one of
    /// `CO`, `ADJ+1` or `ADJ+2`.
    #[arg(long, verbatim_doc_comment)]
    interference: PathBuf,

    /// The time limit in milliseconds for every instance.
    ///
    /// When no limit is given, the solver runs until the instance is settled or a SIGINT/SIGTERM
    /// is received.
    #[arg(short = 't', long = "time-limit")]
    time_limit: Option<u64>,

    /// The seed from which all randomness is derived.
    #[arg(short = 'r', long = "random-seed", default_value_t = 42)]
    random_seed: u64,

    /// The SAT solver which decides the encoded components.
    #[arg(long, value_enum, default_value_t)]
    backend: BackendKind,

    /// The executable used by the `external` backend. It receives DIMACS on its standard input and
    /// is expected to print competition style output.
    #[arg(long = "external-solver")]
    external_solver: Option<PathBuf>,

    /// An argument passed to the external solver. May be repeated; `{seed}` is replaced by the
    /// seed of the call.
    #[arg(long = "external-arg", allow_hyphen_values = true)]
    external_args: Vec<String>,

    /// The order in which independent components are solved.
    #[arg(long = "component-order", value_enum, default_value_t)]
    component_order: ComponentOrder,

    /// Do not store or look up proofs in the containment cache.
    #[arg(long = "no-cache")]
    no_cache: bool,

    /// Do not set underconstrained stations aside before solving.
    #[arg(long = "no-underconstrained")]
    no_underconstrained: bool,

    /// Enables log message output from the solver.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum BackendKind {
    /// The in-process CDCL solver.
    #[default]
    Cdcl,
    /// A solver executable which reads DIMACS from its standard input.
    External,
    /// A native solver linked through the IPASIR interface.
    Ipasir,
}

fn configure_logging(verbose: bool) {
    let level_filter = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .format(move |buf, record| writeln!(buf, "c {}", record.args()))
        .filter_level(level_filter)
        .target(env_logger::Target::Stderr)
        .init();
    info!("Logging successfully configured");
}

fn create_backend(args: &Args) -> StationPackResult<Arc<dyn SatSolver>> {
    match args.backend {
        BackendKind::Cdcl => Ok(Arc::new(CdclBackend::default())),
        BackendKind::External => {
            let program = args
                .external_solver
                .as_ref()
                .ok_or(StationPackError::MissingExternalSolver)?;

            Ok(Arc::new(
                ExternalProcessBackend::new(program).with_args(args.external_args.iter()),
            ))
        }
        #[cfg(feature = "ipasir")]
        BackendKind::Ipasir => Ok(Arc::new(
            stationpack_solver::sat::backend::IpasirBackend::new(),
        )),
        #[cfg(not(feature = "ipasir"))]
        BackendKind::Ipasir => Err(StationPackError::BackendUnavailable("ipasir")),
    }
}

fn read_instance(path: &Path) -> StationPackResult<StationPackingInstance> {
    let instance: StationPackingInstance = serde_json::from_reader(File::open(path)?)?;

    if instance.metadata().contains_key(NAME_KEY) {
        return Ok(instance);
    }

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(instance.with_metadata(NAME_KEY, name))
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(e) => {
            error!("Execution failed, error: {e}");
            std::process::exit(1);
        }
    }
}

fn run() -> StationPackResult<()> {
    let args = Args::parse();

    configure_logging(args.verbose);

    if stationpack_solver::asserts::STATIONPACK_ASSERT_LEVEL_DEFINITION
        >= stationpack_solver::asserts::STATIONPACK_ASSERT_MODERATE
    {
        warn!(
            "Potential performance degradation: the assert level is set to {}, meaning many debug asserts are active which may result in performance degradation.",
            stationpack_solver::asserts::STATIONPACK_ASSERT_LEVEL_DEFINITION
        );
    }

    let stations = Arc::new(DomainStationManager::from_csv(File::open(&args.domains)?)?);
    let constraints = Arc::new(ChannelSpecificConstraintManager::from_csv(
        File::open(&args.interference)?,
        stations.as_ref(),
    )?);

    let options = PipelineOptions {
        component_order: args.component_order,
        remove_underconstrained: !args.no_underconstrained,
        ..Default::default()
    };

    let mut builder = SolverPipeline::builder(stations, constraints, create_backend(&args)?)
        .with_options(options)
        .with_default_certifiers(NeighbourhoodOptions::default());
    if !args.no_cache {
        builder = builder.with_cache(Arc::new(ContainmentCache::new()));
    }
    let pipeline = builder.build();

    let signal = os_signal_termination::install()?;
    let time_limit = args.time_limit.map(Duration::from_millis);

    let mut stdout = std::io::stdout().lock();

    for path in args.instance_paths.iter() {
        if signal.is_cancelled() {
            warn!("Received a termination signal, skipping the remaining instances");
            break;
        }

        let instance = read_instance(path)?;

        let termination = Composite::new()
            .with(&signal)
            .with(time_limit.map(TimeBudget::starting_now));

        let result = pipeline.solve(&instance, &termination, args.random_seed)?;

        serde_json::to_writer(&mut stdout, &result)?;
        writeln!(stdout)?;
        stdout.flush()?;
    }

    pipeline.notify_shutdown();

    if let Some(cache) = pipeline.cache() {
        info!(
            "Cache: {} SAT and {} UNSAT entries, {} hits, {} misses",
            cache.num_sat(),
            cache.num_unsat(),
            cache.num_hits(),
            cache.num_misses()
        );
    }

    Ok(())
}
