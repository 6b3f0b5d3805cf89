//! Build script: render the `drover(1)` manual page into
//! `target/generated-man/<target>/<profile>` for release packaging.

use std::{env, path::PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;
use drover_build_util::{manual_date_from_env, out_dir_for_target_profile, write_man_page};

#[path = "src/cli.rs"]
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-env-changed=TARGET");
    println!("cargo:rerun-if-env-changed=PROFILE");

    let cmd = cli::Cli::command();
    let binary_name = cmd.get_name().to_owned();
    let version = env::var("CARGO_PKG_VERSION")
        .map_err(|_| "CARGO_PKG_VERSION must be set by Cargo to render the manual page")?;

    let mut warnings = Vec::new();
    let date = manual_date_from_env(&mut warnings);
    for warning in warnings {
        println!("cargo:warning={warning}");
    }

    let mut page = Vec::new();
    Man::new(cmd)
        .section("1")
        .source(format!("{binary_name} {version}"))
        .date(date)
        .render(&mut page)?;
    let page_name = format!("{binary_name}.1");

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown-target".into());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown-profile".into());
    let out_dir = env::var_os("OUT_DIR").map(PathBuf::from);
    let man_dir = out_dir_for_target_profile(&target, &profile, out_dir.as_deref());
    write_man_page(&page, &man_dir, &page_name)?;

    if let Some(out_dir) = out_dir
        && let Err(error) = write_man_page(&page, &out_dir, &page_name)
    {
        println!(
            "cargo:warning=Failed to stage manual page in OUT_DIR ({}): {error}",
            out_dir.display()
        );
    }

    Ok(())
}
