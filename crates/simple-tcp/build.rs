//! Build script: stamps the reported build version and renders the man page
//! from the same clap command the binary parses.

use std::env;
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap_mangen::Man;
use time::OffsetDateTime;
use time::format_description::well_known::Iso8601;

const EPOCH_DATE: &str = "1970-01-01";

/// Release date stamped into the page, taken from `SOURCE_DATE_EPOCH`.
fn release_date() -> String {
    let Ok(raw) = env::var("SOURCE_DATE_EPOCH") else {
        return EPOCH_DATE.to_owned();
    };
    let formatted = raw
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .and_then(|moment| moment.format(&Iso8601::DATE).ok());
    formatted.unwrap_or_else(|| {
        println!("cargo:warning=ignoring unusable SOURCE_DATE_EPOCH '{raw}'");
        EPOCH_DATE.to_owned()
    })
}

fn render_man_page(binary: &str, version: &str, date: String) -> io::Result<Vec<u8>> {
    let man = Man::new(simple_tcp_config::command())
        .section("1")
        .source(format!("{binary} {version}"))
        .manual("Game Server Samples")
        .date(date);
    let mut page = Vec::new();
    man.render(&mut page)?;
    Ok(page)
}

/// `target/generated-man/<target>/<profile>`, found by walking up from
/// `OUT_DIR` (`target/<profile>/build/<crate>-<hash>/out`).
fn packaging_dir(out_dir: &Path) -> PathBuf {
    let target_root = out_dir
        .ancestors()
        .nth(4)
        .map_or_else(|| PathBuf::from("target"), Path::to_path_buf);
    let triple = env::var("TARGET").unwrap_or_else(|_| "unknown-target".to_owned());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown-profile".to_owned());
    target_root.join("generated-man").join(triple).join(profile)
}

fn install_page(dir: &Path, name: &str, contents: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let staged = dir.join(format!("{name}.tmp"));
    fs::write(&staged, contents)?;
    fs::rename(&staged, dir.join(name))
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=../simple-tcp-config/src/cli.rs");
    for variable in ["BUILD_VERSION", "SOURCE_DATE_EPOCH", "TARGET", "PROFILE"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    let package_version = env::var("CARGO_PKG_VERSION")?;
    let version = env::var("BUILD_VERSION")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or(package_version);
    println!("cargo:rustc-env=SIMPLE_TCP_VERSION={version}");

    let binary = env::var("CARGO_PKG_NAME").unwrap_or_else(|_| "simple-tcp".to_owned());
    let page = render_man_page(&binary, &version, release_date())?;
    let name = format!("{binary}.1");
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR is not set")?);

    install_page(&out_dir, &name, &page)?;
    if let Err(error) = install_page(&packaging_dir(&out_dir), &name, &page) {
        println!("cargo:warning=failed to stage man page for packaging: {error}");
    }
    Ok(())
}
