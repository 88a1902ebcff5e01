use crate::CLAP_STYLING;
use clap::{Arg, arg, command};
use crxaudit_client::DEFAULT_BASE_URL;
use std::path::PathBuf;
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("crxaudit")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("crxaudit")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress headers and progress bars")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("submit")
                .about("Submit every extension in the catalog to CRXcavator for scanning")
                .arg(catalog_arg())
                .arg(workers_arg())
                .args(service_args()),
        )
        .subcommand(
            command!("fetch")
                .about(
                    "Fetch and normalize the latest report for every extension in the catalog, \
                writing resumable CSV batches.",
                )
                .arg(catalog_arg())
                .arg(workers_arg())
                .arg(
                    arg!(-b --"batch-size" <COUNT>)
                        .required(false)
                        .help("Number of extensions per dump file")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10000"),
                )
                .arg(
                    arg!(-o --"output-dir" <PATH>)
                        .required(false)
                        .help("Directory the dump{N}.csv files are written to")
                        .default_value("~/csvs"),
                )
                .arg(submit_missing_arg())
                .args(service_args()),
        )
        .subcommand(
            command!("lookup")
                .about("Print the normalized report of one or more extensions as JSON")
                .arg(
                    arg!(<ID> ... "Extension ids to look up")
                        .required(true)
                        .num_args(1..),
                )
                .arg(submit_missing_arg())
                .args(service_args()),
        )
}

fn catalog_arg() -> Arg {
    arg!(-c --"catalog" <PATH>)
        .required(true)
        .help("Sitemap JSON array of store URLs, or a newline-delimited id list")
        .value_parser(clap::value_parser!(PathBuf))
}

fn workers_arg() -> Arg {
    arg!(-t --"workers" <NUM_WORKERS>)
        .required(false)
        .help("The number of async workers in the pool.")
        .value_parser(clap::value_parser!(usize))
        .default_value("25")
}

fn submit_missing_arg() -> Arg {
    arg!(--"submit-missing")
        .required(false)
        .help("Resubmit extensions that have no report yet")
        .action(clap::ArgAction::SetTrue)
}

/// Flags every subcommand that talks to the service accepts.
fn service_args() -> Vec<Arg> {
    vec![
        arg!(-k --"api-key-file" <PATH>)
            .required(false)
            .help("File holding the CRXcavator API key")
            .default_value("apikey.txt"),
        arg!(--"base-url" <URL>)
            .required(false)
            .help("Root of the CRXcavator API")
            .value_parser(clap::value_parser!(Url))
            .default_value(DEFAULT_BASE_URL),
        arg!(-l --"log-file" <PATH>)
            .required(false)
            .help("Append-only log of failed requests")
            .default_value("/tmp/chrome_extensions.log"),
        arg!(--"max-attempts" <COUNT>)
            .required(false)
            .help("Attempts per request on connection errors (0 retries forever)")
            .value_parser(clap::value_parser!(u32))
            .default_value("5"),
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Request timeout in seconds")
            .value_parser(clap::value_parser!(u64))
            .default_value("30"),
        arg!(--"no-progress")
            .required(false)
            .help("Do not draw progress bars")
            .action(clap::ArgAction::SetTrue),
    ]
}
