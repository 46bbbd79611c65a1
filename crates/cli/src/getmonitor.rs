// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `warden getmonitor`: unpacks the auxiliary guest-injection binaries
//! bundle (the "monitor" in `original_source/core/cuckoo/private/machinery`
//! terms) into the working directory. The binaries themselves — the actual
//! in-guest hooking/injection code — are out of scope here; this only
//! places whatever a bundle contains where the rest of the control plane
//! expects to find it.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use warden_core::Paths;
use zip::ZipArchive;

use crate::exit_error::ExitError;

#[derive(Args)]
pub struct GetmonitorArgs {
    /// Path to the monitor bundle zip file
    zip_path: PathBuf,
}

pub fn getmonitor(paths: &Paths, args: GetmonitorArgs) -> Result<(), ExitError> {
    let file = fs::File::open(&args.zip_path).map_err(|e| ExitError::new(1, format!("{}: {e}", args.zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExitError::new(1, format!("invalid monitor bundle: {e}")))?;

    let dest_dir = paths.cwd().join("monitor");
    fs::create_dir_all(&dest_dir).map_err(|e| ExitError::new(1, e.to_string()))?;

    let mut extracted = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| ExitError::new(1, e.to_string()))?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            continue;
        };
        let out_path = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| ExitError::new(1, e.to_string()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExitError::new(1, e.to_string()))?;
        }
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).map_err(|e| ExitError::new(1, e.to_string()))?;
        fs::write(&out_path, contents).map_err(|e| ExitError::new(1, e.to_string()))?;
        extracted += 1;
    }

    println!("unpacked {extracted} file(s) into {}", dest_dir.display());
    Ok(())
}
