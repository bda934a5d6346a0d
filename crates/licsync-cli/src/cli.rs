//! Command-line definition

use clap::{value_parser, Arg, ArgAction, Command};
use licsync_core::LicenseType;
use std::path::PathBuf;

fn subscription_arg() -> Arg {
    Arg::new("subscription")
        .long("subscription")
        .required(true)
        .value_name("ID")
        .help("Subscription that owns the server records")
}

fn output_dir_arg() -> Arg {
    Arg::new("output-dir")
        .long("output-dir")
        .default_value(".")
        .value_parser(value_parser!(PathBuf))
        .help("Directory for the report file (created if missing)")
}

fn resource_group_arg() -> Arg {
    Arg::new("resource-group")
        .long("resource-group")
        .value_name("RG")
        .help("Restrict to one resource group")
}

fn dry_run_arg() -> Arg {
    Arg::new("dry-run")
        .long("dry-run")
        .action(ArgAction::SetTrue)
        .help("Report what would change without writing anything")
}

fn input_arg() -> Arg {
    Arg::new("input")
        .long("input")
        .value_name("CSV")
        .value_parser(value_parser!(PathBuf))
        .help("CSV with ServerName, ResourceGroup and MachineName columns")
}

fn retry_from_arg() -> Arg {
    Arg::new("retry-from")
        .long("retry-from")
        .value_name("REPORT")
        .value_parser(value_parser!(PathBuf))
        .help("Only process records that did not complete in a previous report")
}

/// Build the `licsync` command tree
#[must_use]
pub fn build_cli() -> Command {
    Command::new("licsync")
        .version(licsync_core::VERSION)
        .about("Reconcile and convert license settings of registered database servers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug-level logging (RUST_LOG takes precedence)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("TOML")
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .global(true)
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Records processed concurrently (default 1)"),
        )
        .arg(
            Arg::new("delay-ms")
                .long("delay-ms")
                .global(true)
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Pause before each record's first call"),
        )
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .global(true)
                .value_name("JSON")
                .value_parser(value_parser!(PathBuf))
                .help("Use an offline inventory snapshot instead of the REST API"),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert server records to a target license mode")
                .arg(subscription_arg())
                .arg(input_arg().required_unless_present("retry-from"))
                .arg(output_dir_arg())
                .arg(
                    Arg::new("target-license")
                        .long("target-license")
                        .default_value("PAYG")
                        .value_parser(|s: &str| s.parse::<LicenseType>())
                        .help("License mode to apply (Paid or PAYG)"),
                )
                .arg(
                    Arg::new("enable-physical-core-license")
                        .long("enable-physical-core-license")
                        .action(ArgAction::SetTrue)
                        .help("Also apply the physical-core license flag"),
                )
                .arg(dry_run_arg())
                .arg(retry_from_arg()),
        )
        .subcommand(
            Command::new("reconcile")
                .about("Find server records whose host registration is missing")
                .arg(subscription_arg())
                .arg(input_arg())
                .arg(resource_group_arg())
                .arg(
                    Arg::new("delete-orphans")
                        .long("delete-orphans")
                        .action(ArgAction::SetTrue)
                        .help("Delete records classified as orphaned"),
                )
                .arg(dry_run_arg())
                .arg(output_dir_arg())
                .arg(retry_from_arg()),
        )
        .subcommand(
            Command::new("inventory")
                .about("List server records into an input-compatible CSV")
                .arg(subscription_arg())
                .arg(resource_group_arg())
                .arg(output_dir_arg()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn convert_requires_input_or_retry_report() {
        let err = build_cli()
            .try_get_matches_from(["licsync", "convert", "--subscription", "s"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let matches = build_cli()
            .try_get_matches_from([
                "licsync",
                "convert",
                "--subscription",
                "s",
                "--retry-from",
                "old.csv",
            ])
            .unwrap();
        assert!(matches.subcommand_matches("convert").is_some());
    }

    #[test]
    fn target_license_is_validated() {
        let err = build_cli()
            .try_get_matches_from([
                "licsync",
                "convert",
                "--subscription",
                "s",
                "--input",
                "in.csv",
                "--target-license",
                "Free",
            ])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from([
                "licsync",
                "reconcile",
                "--subscription",
                "s",
                "--workers",
                "4",
                "--verbose",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(args.get_one::<usize>("workers"), Some(&4));
        assert!(matches.get_flag("verbose"));
    }
}
