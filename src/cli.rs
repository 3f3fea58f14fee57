use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use rusqlite::Connection;
use serde::Serialize;

use crate::camelot::{self, CamelotCode};
use crate::config::{self, MatchConfig};
use crate::db::{self, SqliteTrackStore};
use crate::index::{MetadataFallback, NoFallback};
use crate::session::MatchSession;
use crate::store::{self, SqliteSimilarityStore};
use crate::tags::{self, TagFallback};
use crate::tools::MixwheelServer;

#[derive(Parser)]
#[command(name = "mixwheel", version, about = "Harmonic next-track matching")]
struct Cli {
    /// Matching config (TOML). Defaults to MIXWHEEL_CONFIG or the user config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Do not re-read file tags for tracks stored without BPM or key
    #[arg(long, global = true)]
    no_tag_fallback: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server on stdio (default)
    Serve,
    /// Print ranked matches for a track, or for a bare tempo and key
    Match(MatchArgs),
    /// Read tags from audio files and upsert them into the library
    Import(ImportArgs),
    /// Load similarity values from a JSONL file
    ImportSimilarity(ImportSimilarityArgs),
    /// Print library and collection statistics
    Stats,
}

#[derive(clap::Args)]
struct MatchArgs {
    /// Reference track: id, title, file path, or file name
    track: Option<String>,
    /// Reference tempo, used with --code when no track is given
    #[arg(long)]
    bpm: Option<f64>,
    /// Reference Camelot code or key, used with --bpm
    #[arg(long)]
    code: Option<String>,
    /// Maximum results per bucket
    #[arg(long)]
    max_results: Option<usize>,
}

#[derive(clap::Args)]
struct ImportArgs {
    /// Directory to scan for audio files
    dir: PathBuf,
    /// Only scan the top-level directory
    #[arg(long)]
    no_recursive: bool,
    /// Glob filter on file names, e.g. "*.flac"
    #[arg(long)]
    glob: Option<String>,
}

#[derive(clap::Args)]
struct ImportSimilarityArgs {
    /// JSONL file of {"reference_id", "candidate_id", "value"} lines
    file: PathBuf,
}

#[derive(Debug, PartialEq)]
enum MatchTarget {
    Track(String),
    Tempo(f64, CamelotCode),
}

fn match_target(args: &MatchArgs) -> Result<MatchTarget, String> {
    match (&args.track, args.bpm, &args.code) {
        (Some(track), None, None) => Ok(MatchTarget::Track(track.clone())),
        (None, Some(bpm), Some(code)) => {
            if !bpm.is_finite() || bpm <= 0.0 {
                return Err(format!("--bpm must be a positive number (got {bpm})"));
            }
            let code = camelot::key_to_camelot(code)
                .ok_or_else(|| format!("Unrecognized Camelot code or key: '{code}'"))?;
            Ok(MatchTarget::Tempo(bpm, code))
        }
        (Some(_), _, _) => Err("Give either a track or --bpm with --code, not both".to_string()),
        _ => Err("Give a track, or both --bpm and --code".to_string()),
    }
}

fn path_str(path: &Path) -> Result<&str, String> {
    path.to_str()
        .ok_or_else(|| format!("Invalid path encoding: {}", path.display()))
}

fn metadata_fallback(no_tag_fallback: bool) -> Box<dyn MetadataFallback> {
    if no_tag_fallback {
        Box::new(NoFallback)
    } else {
        Box::new(TagFallback)
    }
}

fn open_session(
    config_path: Option<&Path>,
    fallback: Box<dyn MetadataFallback>,
) -> Result<MatchSession, Box<dyn std::error::Error>> {
    let config = MatchConfig::resolve(config_path)?;
    let db_path = config::resolve_db_path();
    let store_path = config::resolve_store_path();
    tracing::info!(
        db = %db_path.display(),
        store = %store_path.display(),
        "opening stores"
    );
    let tracks = SqliteTrackStore::open(path_str(&db_path)?)?;
    let similarity = SqliteSimilarityStore::open(path_str(&store_path)?)?;
    Ok(MatchSession::open(
        Box::new(tracks),
        Box::new(similarity),
        fallback,
        config,
    )?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let fallback = metadata_fallback(cli.no_tag_fallback);
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config_path, fallback).await,
        Command::Match(args) => run_match(config_path, fallback, args),
        Command::Import(args) => run_import(args),
        Command::ImportSimilarity(args) => run_import_similarity(args),
        Command::Stats => run_stats(config_path, fallback),
    }
}

async fn serve(
    config_path: Option<&Path>,
    fallback: Box<dyn MetadataFallback>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(config_path, fallback)?;
    let stats = session.snapshot()?.stats().clone();
    tracing::info!(
        tracks = stats.track_count,
        indexed = stats.indexed_count,
        "serving on stdio"
    );
    let server = MixwheelServer::new(Arc::new(session));
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

fn run_match(
    config_path: Option<&Path>,
    fallback: Box<dyn MetadataFallback>,
    args: MatchArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = match_target(&args)?;
    if args.max_results == Some(0) {
        return Err("--max-results must be at least 1".into());
    }
    let session = open_session(config_path, fallback)?;
    let mut policy = session.config().results;
    if let Some(max) = args.max_results {
        policy.max_results = max;
    }
    let report = match target {
        MatchTarget::Track(track) if args.max_results.is_none() => session.find_matches(&track)?,
        MatchTarget::Track(track) => session.find_matches_with(&track, &policy)?,
        MatchTarget::Tempo(bpm, code) => session.find_matches_for_tempo(bpm, code, &policy)?,
    };
    print_json(&report)
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct ImportOutcome {
    scanned: usize,
    imported: usize,
    failed: usize,
}

fn import_directory(
    conn: &Connection,
    dir: &Path,
    recursive: bool,
    glob: Option<&str>,
) -> Result<ImportOutcome, Box<dyn std::error::Error>> {
    let files = tags::scan_audio_directory(dir, recursive, glob)?;
    let mut outcome = ImportOutcome {
        scanned: files.len(),
        ..Default::default()
    };
    let total = files.len();
    for (i, path) in files.iter().enumerate() {
        let idx = i + 1;
        let label = path.display();
        let track = match tags::track_from_file(path) {
            Ok(track) => track,
            Err(e) => {
                tracing::warn!(path = %label, "tag read failed: {e}");
                eprintln!("[{idx}/{total}] FAIL {label}: {e}");
                outcome.failed += 1;
                continue;
            }
        };
        let id = db::upsert_track(conn, &track)?;
        tracing::debug!(track_id = id, path = %label, "track upserted");
        if !track.is_matchable() {
            eprintln!("[{idx}/{total}] {label} (incomplete tags)");
        }
        outcome.imported += 1;
    }
    Ok(outcome)
}

fn run_import(args: ImportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let tracks = SqliteTrackStore::open(path_str(&config::resolve_db_path())?)?;
    let outcome = {
        let conn = tracks.conn()?;
        import_directory(&conn, &args.dir, !args.no_recursive, args.glob.as_deref())?
    };
    let elapsed = start.elapsed().as_secs_f64();
    eprintln!(
        "\nDone: {} imported, {} failed of {} scanned ({elapsed:.1}s)",
        outcome.imported, outcome.failed, outcome.scanned
    );
    print_json(&outcome)
}

fn run_import_similarity(args: ImportSimilarityArgs) -> Result<(), Box<dyn std::error::Error>> {
    let similarity = SqliteSimilarityStore::open(path_str(&config::resolve_store_path())?)?;
    let reader = BufReader::new(File::open(&args.file)?);
    let conn = similarity.conn()?;
    let summary = store::import_similarity_jsonl(&conn, reader)?;
    print_json(&summary)
}

#[derive(Debug, Serialize)]
struct StatsOutput {
    library: crate::types::LibrarySummary,
    collection: crate::index::CollectionStats,
    skipped: usize,
    similarity_rows: i64,
}

fn run_stats(
    config_path: Option<&Path>,
    fallback: Box<dyn MetadataFallback>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = MatchConfig::resolve(config_path)?;
    let tracks = SqliteTrackStore::open(path_str(&config::resolve_db_path())?)?;
    let similarity = SqliteSimilarityStore::open(path_str(&config::resolve_store_path())?)?;
    let library = tracks.summary()?;
    let similarity_rows = {
        let conn = similarity.conn()?;
        store::count_similarity(&conn)?
    };
    let session = MatchSession::open(
        Box::new(tracks),
        Box::new(similarity),
        fallback,
        config,
    )?;
    let collection = session.snapshot()?;
    print_json(&StatsOutput {
        library,
        collection: collection.stats().clone(),
        skipped: collection.report().skipped.len(),
        similarity_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_args(track: Option<&str>, bpm: Option<f64>, code: Option<&str>) -> MatchArgs {
        MatchArgs {
            track: track.map(String::from),
            bpm,
            code: code.map(String::from),
            max_results: None,
        }
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["mixwheel"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from([
            "mixwheel", "match", "--bpm", "128", "--code", "8A", "--config", "/tmp/c.toml",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/c.toml")));
        match cli.command {
            Some(Command::Match(args)) => {
                assert_eq!(args.bpm, Some(128.0));
                assert_eq!(args.code.as_deref(), Some("8A"));
            }
            _ => panic!("expected match subcommand"),
        }

        let cli = Cli::try_parse_from(["mixwheel", "import", "/music", "--no-recursive"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Import(ref a)) if a.no_recursive));
    }

    #[test]
    fn match_target_prefers_explicit_forms() {
        assert_eq!(
            match_target(&match_args(Some("Xtal"), None, None)).unwrap(),
            MatchTarget::Track("Xtal".into())
        );
        assert_eq!(
            match_target(&match_args(None, Some(124.0), Some("Am"))).unwrap(),
            MatchTarget::Tempo(124.0, "08A".parse().unwrap())
        );
        assert!(match_target(&match_args(None, Some(124.0), None)).is_err());
        assert!(match_target(&match_args(None, Some(-1.0), Some("8A"))).is_err());
        assert!(match_target(&match_args(None, Some(124.0), Some("13Z"))).is_err());
        assert!(match_target(&match_args(Some("Xtal"), Some(124.0), Some("8A"))).is_err());
    }

    #[test]
    fn no_tag_fallback_leaves_incomplete_tracks_alone() {
        let cli = Cli::try_parse_from(["mixwheel", "stats", "--no-tag-fallback"]).unwrap();
        assert!(cli.no_tag_fallback);

        let untagged = crate::types::Track::new(5, "Untagged");
        let meta = metadata_fallback(true).regenerate(&untagged).unwrap();
        assert_eq!(meta, crate::types::TrackMetadata::default());
        assert!(metadata_fallback(false).regenerate(&untagged).is_err());
    }

    #[test]
    fn import_counts_unreadable_files_as_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.mp3"), b"not audio").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        let conn = db::open_test();

        let outcome = import_directory(&conn, dir.path(), true, None).unwrap();
        assert_eq!(
            outcome,
            ImportOutcome {
                scanned: 1,
                imported: 0,
                failed: 1,
            }
        );
        assert!(db::load_all_tracks(&conn).unwrap().is_empty());
    }

    #[test]
    fn import_rejects_missing_directory() {
        let conn = db::open_test();
        assert!(import_directory(&conn, Path::new("/definitely/not/here"), true, None).is_err());
    }
}
