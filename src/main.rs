use anyhow::{bail, Result};
use std::path::PathBuf;

use reminisce::config::Config;
use reminisce::logging;
use reminisce::scheduler::Trigger;
use reminisce::services::Services;

#[derive(Debug, PartialEq)]
enum Command {
    Cluster,
    Trigger(Trigger),
    Status,
    Clear,
}

#[derive(Debug)]
struct Args {
    command: Command,
    patient: String,
    config_path: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut command = None;
    let mut patient = None;
    let mut config_path = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("reminisce {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                i += 1;
                match args.get(i) {
                    Some(path) => config_path = Some(PathBuf::from(path)),
                    None => bail!("--config requires a path argument"),
                }
            }
            "--patient" | "-p" => {
                i += 1;
                match args.get(i) {
                    Some(id) => patient = Some(id.clone()),
                    None => bail!("--patient requires an id"),
                }
            }
            "cluster" if command.is_none() => command = Some(Command::Cluster),
            "status" if command.is_none() => command = Some(Command::Status),
            "clear" if command.is_none() => command = Some(Command::Clear),
            "trigger" if command.is_none() => {
                i += 1;
                let kind = args.get(i).map(String::as_str).unwrap_or_default();
                match Trigger::from_str(kind) {
                    Some(trigger) => command = Some(Command::Trigger(trigger)),
                    None => bail!("trigger needs one of signup, login, midnight, background"),
                }
            }
            other => bail!("Unknown argument: {}", other),
        }
        i += 1;
    }

    let Some(command) = command else {
        bail!("No command given");
    };
    let Some(patient) = patient.filter(|p| !p.trim().is_empty()) else {
        bail!("--patient is required");
    };

    Ok(Args {
        command,
        patient,
        config_path,
    })
}

fn print_help() {
    println!(
        r#"reminisce - photo memory clustering and daily narrated videos

USAGE:
    reminisce <COMMAND> --patient ID [OPTIONS]

COMMANDS:
    cluster             Scan the photo library and rebuild clusters
    trigger KIND        Run a generation trigger (signup, login, midnight, background)
    status              Show clusters, today's counters and videos
    clear               Remove clusters, videos and counters

OPTIONS:
    --patient, -p ID    Patient to act on
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    REMINISCE_CONFIG    Path to config file (overrides default location)
    REMINISCE_LOG       Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/reminisce/config.toml

See also: reminisce-daemon --help"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let _ = logging::init_stderr();

    let config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    let services = Services::build(config)?;

    match args.command {
        Command::Cluster => {
            let summary = services.rebuild_clusters(&args.patient).await?;
            println!(
                "{} clusters from {} photos ({} with a location)",
                summary.total_clusters, summary.total_photos, summary.clusters_with_location
            );
            for (bucket, count) in &summary.time_of_day {
                println!("  {:<10} {}", bucket, count);
            }
        }
        Command::Trigger(trigger) => {
            let report = services.scheduler.handle(&args.patient, trigger).await;
            println!(
                "{} for {}: {} owed, {} generated, {} failed",
                report.trigger,
                report.patient_id,
                report.owed,
                report.generated.len(),
                report.failed.len()
            );
            if report.pool_reset {
                println!("  every cluster was used today; pool reset for the next batch");
            }
            if let Some(error) = report.error {
                println!("  {}", error);
            }
        }
        Command::Status => {
            let status = services.status(&args.patient).await?;
            match status.summary {
                Some(summary) => println!(
                    "Clusters: {} ({} photos, {} with a location)",
                    summary.total_clusters, summary.total_photos, summary.clusters_with_location
                ),
                None => println!("Clusters: none; run `reminisce cluster` first"),
            }
            println!(
                "Today ({}): {}/{} videos, {} clusters used",
                status.daily.last_reset_date,
                status.daily.videos_generated_today,
                services.config.generation.max_videos_per_day,
                status.daily.clusters_used_today.len()
            );
            for video in &status.videos {
                println!(
                    "  {} {} {}s {} photos{} {}",
                    video.id,
                    video.trigger.as_str(),
                    video.duration_secs,
                    video.photo_count,
                    if video.has_narration { " narrated" } else { "" },
                    video.video_url
                );
            }
            if !status.failures.is_empty() {
                println!("Failures: {}", status.failures.len());
                for failure in status.failures.iter().rev().take(5) {
                    println!("  {} at {}: {}", failure.cluster_id, failure.stage, failure.error);
                }
            }
        }
        Command::Clear => {
            let removed = services.clear_patient(&args.patient).await?;
            println!("Cleared {} videos for {}", removed, args.patient);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_trigger() {
        let parsed = parse_args(&args(&["trigger", "login", "--patient", "p1", "-c", "/tmp/c.toml"])).unwrap();
        assert_eq!(parsed.command, Command::Trigger(Trigger::Login));
        assert_eq!(parsed.patient, "p1");
        assert_eq!(parsed.config_path, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_args(&args(&["status"])).is_err());
        assert!(parse_args(&args(&["--patient", "p1"])).is_err());
        assert!(parse_args(&args(&["trigger", "weekly", "-p", "p1"])).is_err());
        assert!(parse_args(&args(&["cluster", "status", "-p", "p1"])).is_err());
        assert!(parse_args(&args(&["cluster", "-p"])).is_err());
    }
}
