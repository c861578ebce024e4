use admissions_tracker::config::AppConfig;
use admissions_tracker::error::AppError;
use admissions_tracker::telemetry;
use admissions_tracker::workflows::admissions::report::{
    applicant_summary, at_risk, destinations, offers, OffersScope,
};
use admissions_tracker::workflows::admissions::{
    AdmissionsImporter, ApplicantStore, Datastore, SnapshotOutcome, SubjectCatalog, TracingSink,
};
use admissions_tracker::workflows::feeds::predictions::read_prediction_rows;
use admissions_tracker::workflows::feeds::sims::read_identity_records;
use admissions_tracker::workflows::feeds::status::discover_snapshots;
use admissions_tracker::workflows::feeds::{exam_files, FeedError, FeedLines};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "admissions-tracker",
    about = "Track post-18 applications, exam results and destinations from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Absorb status snapshots not yet in the applicant datastore
    ImportSnapshots,
    /// Read A-level subject definitions from the exam board basedata files
    ImportBasedata,
    /// Read exam results against the saved subject basedata
    ImportResults,
    /// Attach student information system identifiers to tracked applicants
    ImportSims(FileArgs),
    /// Attach marksheet predictions to applicants by UPN
    ImportPredictions(FileArgs),
    /// Map a basedata unit to the subject name used on marksheets
    MapSubject(MapSubjectArgs),
    /// Print the destinations report for the current snapshot as JSON
    Destinations,
    /// Print per-applicant choice counts and status as JSON
    Summary,
    /// Print held offers, or changes since the previous snapshot, as JSON
    Offers(OffersArgs),
    /// Print applicants whose firm or insurance offers look out of reach as JSON
    AtRisk,
}

#[derive(Args, Debug)]
struct FileArgs {
    /// CSV extract to read
    #[arg(long)]
    file: PathBuf,
}

#[derive(Args, Debug)]
struct OffersArgs {
    /// Only list choices that changed since the previous snapshot
    #[arg(long)]
    updates: bool,
}

impl OffersArgs {
    fn scope(&self) -> OffersScope {
        if self.updates {
            OffersScope::Updates
        } else {
            OffersScope::AllOffers
        }
    }
}

#[derive(Args, Debug)]
struct MapSubjectArgs {
    /// Basedata unit code
    #[arg(long)]
    unit: String,
    /// Subject name as it appears in marksheet headings
    #[arg(long)]
    sims: String,
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let datastore = Datastore::new(&config.paths.data_dir, config.tenant.licence_token());
    let sink = TracingSink;
    let importer = AdmissionsImporter::new(&config.tenant, &sink);
    info!(?config.environment, command = ?cli.command, "admissions tracker starting");

    match cli.command {
        Command::ImportSnapshots => {
            let mut store = datastore.load_applicants()?.unwrap_or_default();
            let files: Vec<_> =
                discover_snapshots(&config.paths.snapshot_dir, &config.paths.snapshot_prefix)?
                    .into_iter()
                    .filter(|file| !store.contains_date(file.date))
                    .collect();
            if files.is_empty() {
                println!("No new snapshots in {}", config.paths.snapshot_dir.display());
                return Ok(());
            }

            for outcome in importer.import_snapshots(&mut store, &files)? {
                match outcome {
                    SnapshotOutcome::Absorbed {
                        date,
                        students,
                        choices,
                    } => println!("- {date}: {students} applicants, {choices} choices"),
                    SnapshotOutcome::AlreadyPresent(date) => println!("- {date}: already held"),
                }
            }
            save_applicants(&datastore, &store)
        }
        Command::ImportBasedata => {
            let mut catalog = datastore.load_subjects()?.unwrap_or_default();
            let lines = exam_lines(&config.paths.exams_dir, 'O')?;
            let kept = importer.import_basedata(&mut catalog, lines)?;
            let path = datastore.save_subjects(&catalog)?;
            println!(
                "Kept {kept} A level units ({} in total), saved to {}",
                catalog.len(),
                path.display()
            );
            Ok(())
        }
        Command::ImportResults => {
            let mut store = load_applicants(&datastore)?;
            let catalog = datastore.load_subjects()?.unwrap_or_default();
            let lines = exam_lines(&config.paths.exams_dir, 'R')?;
            let added = importer.import_results(&mut store, &catalog, lines)?;
            println!("Added {added} results");
            save_applicants(&datastore, &store)
        }
        Command::ImportSims(args) => {
            let mut store = load_applicants(&datastore)?;
            let records = read_identity_records(open_extract(&args.file)?)?;
            let updated = importer.import_identities(&mut store, &records)?;
            println!("Updated {updated} of {} rows", records.len());
            save_applicants(&datastore, &store)
        }
        Command::ImportPredictions(args) => {
            let mut store = load_applicants(&datastore)?;
            let pattern = config.paths.prediction_pattern()?;
            let rows = read_prediction_rows(open_extract(&args.file)?, &pattern)?;
            let changed = importer.import_predictions(&mut store, &rows)?;
            println!("Added or changed {changed} predictions");
            save_applicants(&datastore, &store)
        }
        Command::MapSubject(args) => {
            let mut catalog: SubjectCatalog = datastore
                .load_subjects()?
                .ok_or(AppError::NothingLoaded("subject basedata"))?;
            if !catalog.map_sims_name(&args.unit, &args.sims) {
                return Err(AppError::UnknownSubject(args.unit));
            }
            datastore.save_subjects(&catalog)?;
            println!("Unit {} maps to '{}'", args.unit, args.sims);
            Ok(())
        }
        Command::Destinations => {
            let store = load_applicants(&datastore)?;
            let report = destinations(&store).ok_or(AppError::NothingLoaded("snapshot"))?;
            print_json(&report)
        }
        Command::Summary => {
            let store = load_applicants(&datastore)?;
            let report =
                applicant_summary(&store, &sink).ok_or(AppError::NothingLoaded("snapshot"))?;
            print_json(&report)
        }
        Command::Offers(args) => {
            let store = load_applicants(&datastore)?;
            let report =
                offers(&store, args.scope()).ok_or(AppError::NothingLoaded("snapshot"))?;
            print_json(&report)
        }
        Command::AtRisk => {
            let store = load_applicants(&datastore)?;
            let report = at_risk(&store).ok_or(AppError::NothingLoaded("snapshot"))?;
            print_json(&report)
        }
    }
}

fn load_applicants(datastore: &Datastore) -> Result<ApplicantStore, AppError> {
    datastore
        .load_applicants()?
        .ok_or(AppError::NothingLoaded("applicant data"))
}

fn save_applicants(datastore: &Datastore, store: &ApplicantStore) -> Result<(), AppError> {
    let path = datastore.save_applicants(store)?;
    println!("Saved {} applicants to {}", store.len(), path.display());
    Ok(())
}

fn exam_lines(dir: &Path, initial: char) -> Result<FeedLines, FeedError> {
    exam_files(dir, initial).map(FeedLines::new)
}

fn open_extract(path: &Path) -> Result<BufReader<File>, FeedError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| FeedError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}
