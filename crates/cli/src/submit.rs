// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `warden submit`: writes a submitted target's analysis record to disk and
//! wakes the running state controller via `TrackNew` (§4.5), mirroring
//! `original_source/core/cuckoo/apps.py`'s `submit` entry point — hash the
//! file, copy it into the binary store, then hand the analysis id to the
//! control plane rather than running identification inline.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Datelike;
use clap::Args;
use sha2::{Digest, Sha256};
use warden_core::{Analysis, AnalysisId, Paths, Settings, SystemClock, Target};
use warden_wire::{StateControllerRequest, StateControllerResponse, UnixSockClient};

use crate::exit_error::ExitError;

const CONNECT_RETRIES: u32 = 10;
const CONNECT_DELAY: Duration = Duration::from_millis(100);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Args)]
pub struct SubmitArgs {
    /// File paths to submit for analysis
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Platform selection as `platform[,os_version]`, repeatable
    #[arg(long = "platform", value_name = "PLATFORM[,VERSION]")]
    platforms: Vec<String>,

    /// Analysis timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u32,

    /// Queue priority (must be >= 1)
    #[arg(long, default_value_t = 1)]
    priority: u32,
}

fn parse_platform(spec: &str) -> warden_core::settings::PlatformSelection {
    match spec.split_once(',') {
        Some((platform, version)) => warden_core::settings::PlatformSelection::new(platform, version),
        None => warden_core::settings::PlatformSelection::new(spec, ""),
    }
}

fn hash_file(path: &std::path::Path) -> Result<(String, Vec<u8>), ExitError> {
    let bytes = std::fs::read(path).map_err(|e| ExitError::new(1, format!("{}: {e}", path.display())))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok((format!("{:x}", hasher.finalize()), bytes))
}

fn new_analysis_id() -> AnalysisId {
    let now = chrono::Utc::now();
    AnalysisId::new(now.year(), now.month(), now.day(), &AnalysisId::random_suffix())
}

async fn notify_state_controller(paths: &Paths, analysis_id: &AnalysisId) -> Result<(), ExitError> {
    let mut client = UnixSockClient::connect(paths.socket("statecontroller"), CONNECT_RETRIES, CONNECT_DELAY)
        .await
        .map_err(|e| ExitError::new(1, format!("daemon unreachable: {e}")))?;
    let resp: StateControllerResponse = client
        .request(&StateControllerRequest::TrackNew { analysis_id: analysis_id.to_string() }, Some(REQUEST_TIMEOUT))
        .await
        .map_err(|e| ExitError::new(1, format!("failed to notify the daemon: {e}")))?;
    if !resp.success {
        return Err(ExitError::new(1, resp.reason.unwrap_or_else(|| "track_new rejected".into())));
    }
    Ok(())
}

pub async fn submit(paths: &Paths, args: SubmitArgs) -> Result<(), ExitError> {
    let mut settings = Settings::default();
    settings.timeout = args.timeout;
    settings.platforms = args.platforms.iter().map(|s| parse_platform(s)).collect();

    for path in &args.paths {
        let (sha256, bytes) = hash_file(path)?;
        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| sha256.clone());

        let blob_path = paths.binary_blob(&sha256);
        if let Some(parent) = blob_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ExitError::new(1, e.to_string()))?;
        }
        std::fs::write(&blob_path, &bytes).map_err(|e| ExitError::new(1, e.to_string()))?;

        let target = Target::File { path: blob_path.to_string_lossy().into_owned(), sha256, filename, media_type: None };
        let analysis_id = new_analysis_id();
        let analysis = Analysis::new(analysis_id.clone(), &SystemClock, settings.clone(), target, args.priority)
            .map_err(|e| ExitError::new(1, e.to_string()))?;

        let analysis_dir = paths.analysis_dir(&analysis_id);
        std::fs::create_dir_all(&analysis_dir).map_err(|e| ExitError::new(1, e.to_string()))?;
        warden_storage::write_analysis(paths, &analysis).map_err(|e| ExitError::new(1, e.to_string()))?;

        notify_state_controller(paths, &analysis_id).await?;
        println!("{} submitted as {}", path.display(), analysis_id);
    }
    Ok(())
}
