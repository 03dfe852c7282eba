// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: package UID
fn uid_arg() -> Arg {
    Arg::new("uid").required(true).help("Package UID")
}

/// Common argument: hardware name
fn hardware_arg() -> Arg {
    Arg::new("name").required(true).help("Hardware name")
}

fn package_command() -> Command {
    Command::new("package")
        .about("Local package management and server transactions")
        .subcommand_required(true)
        .subcommand(
            Command::new("new")
                .about("Start a new package in the current directory")
                .arg(Arg::new("product").required(true).help("Product UID (64 hex characters)"))
                .arg(
                    Arg::new("sets")
                        .long("sets")
                        .default_value("2")
                        .help("Number of installation sets (1 or 2)"),
                ),
        )
        .subcommand(Command::new("show").about("Show the local package"))
        .subcommand(
            Command::new("version")
                .about("Set the package version")
                .arg(Arg::new("version").required(true)),
        )
        .subcommand(
            Command::new("add")
                .about("Add an object to every installation set")
                .arg(Arg::new("file").required(true).help("File to install"))
                .arg(
                    Arg::new("mode")
                        .short('m')
                        .long("mode")
                        .required(true)
                        .help("Installation mode (copy, flash, imxkobs, raw, tarball, ubifs)"),
                )
                .arg(
                    Arg::new("option")
                        .short('o')
                        .long("option")
                        .action(ArgAction::Append)
                        .help("Object option as key=value; repeat a key once per installation set"),
                ),
        )
        .subcommand(
            Command::new("edit")
                .about("Change one option of an object")
                .arg(Arg::new("index").required(true))
                .arg(Arg::new("option").required(true))
                .arg(Arg::new("value").required(true))
                .arg(Arg::new("set").long("set").help("Installation set for per-set options")),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an object from every installation set")
                .arg(Arg::new("index").required(true)),
        )
        .subcommand(Command::new("metadata").about("Print the package metadata"))
        .subcommand(
            Command::new("export")
                .about("Write the package template, without version, to a file")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("archive")
                .about("Write a signed package archive")
                .arg(Arg::new("output").short('o').long("output").help("Output file"))
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite an existing archive"),
                ),
        )
        .subcommand(Command::new("push").about("Upload the package to the server"))
        .subcommand(
            Command::new("pull")
                .about("Download a package and its objects into the current directory")
                .arg(uid_arg())
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Replace an existing local package"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show the processing status of a pushed package")
                .arg(uid_arg()),
        )
}

fn hardware_command() -> Command {
    Command::new("hardware")
        .about("Supported hardware of the local package")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Add a hardware name, replacing its revisions")
                .arg(hardware_arg())
                .arg(
                    Arg::new("revision")
                        .short('r')
                        .long("revision")
                        .action(ArgAction::Append)
                        .help("Hardware revision"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove a hardware name and its revisions")
                .arg(hardware_arg()),
        )
        .subcommand(
            Command::new("add-revision")
                .about("Add a revision to a supported hardware")
                .arg(hardware_arg())
                .arg(Arg::new("revision").required(true)),
        )
        .subcommand(
            Command::new("remove-revision")
                .about("Remove a revision from a supported hardware")
                .arg(hardware_arg())
                .arg(Arg::new("revision").required(true)),
        )
}

fn config_command() -> Command {
    Command::new("config")
        .about("Global configuration")
        .subcommand_required(true)
        .subcommand(
            Command::new("init")
                .about("Store the server credentials")
                .arg(Arg::new("access_id").long("access-id").required(true))
                .arg(Arg::new("access_secret").long("access-secret").required(true)),
        )
        .subcommand(
            Command::new("set")
                .about("Set a value, addressed as section.key")
                .arg(Arg::new("key").required(true))
                .arg(Arg::new("value").required(true)),
        )
        .subcommand(
            Command::new("get")
                .about("Print a value, addressed as section.key")
                .arg(Arg::new("key").required(true)),
        )
        .subcommand(
            Command::new("set-private-key")
                .about("Set the private key used to sign packages")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(Command::new("cleanup").about("Remove the global configuration file"))
}

fn build_cli() -> Command {
    Command::new("uhu")
        .version(env!("CARGO_PKG_VERSION"))
        .author("uhu Contributors")
        .about("Prepare, sign, push and pull UpdateHub firmware update packages")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log progress and protocol details"),
        )
        .subcommand(package_command())
        .subcommand(hardware_command())
        .subcommand(config_command())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("uhu.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
