//! Vigil frame replay
//!
//! Usage: `vigil [CONFIG] [FRAMES_DIR]`. Every sub-directory of `FRAMES_DIR`
//! is one device; its image files, in name order, are that device's frames.

use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use flume::{bounded, Sender};
use tracing::{debug, error, info, warn};

use vigil::capture::{decode_frame, Frame};
use vigil::{utils, Config, FrameService, VigilError};

/// Replay cadence per device (~30fps)
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

struct Ingest {
    device_id: String,
    sequence_index: i64,
    frame: Frame,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let frames_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("frames"));

    let config = Config::load(config_path.as_deref())?;
    utils::init_tracing(&config.log.filter);
    info!("Vigil launching...");
    debug!(?config, "loaded configuration");

    let devices = discover_devices(&frames_dir).await?;
    if devices.is_empty() {
        return Err(eyre!("no device directories under {}", frames_dir.display()));
    }

    let service = FrameService::new(&config);
    let (tx, rx) = bounded::<Ingest>(config.buffer.capacity);

    // Spawn one producer per device
    for (device_id, files) in devices {
        info!(%device_id, frames = files.len(), "starting producer");
        tokio::spawn(produce(device_id, files, tx.clone()));
    }
    drop(tx);

    let ingest_service = service.clone();
    let mut ingest = tokio::spawn(async move {
        while let Ok(msg) = rx.recv_async().await {
            match ingest_service.ingest(&msg.device_id, msg.sequence_index, msg.frame) {
                Ok(()) => {}
                Err(VigilError::Full { .. }) => {} // logged by the buffer
                Err(e) => error!(device_id = %msg.device_id, "ingest failed: {e}"),
            }
        }
    });

    let mut tick = tokio::time::interval(config.buffer.window() / 2);
    loop {
        tokio::select! {
            _ = tick.tick() => assemble_all(&service).await,
            res = &mut ingest => {
                res?;
                info!("all producers finished");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    assemble_all(&service).await;

    info!("Vigil shutting down");
    Ok(())
}

/// Device id → sorted frame files
async fn discover_devices(root: &Path) -> Result<Vec<(String, Vec<PathBuf>)>> {
    let mut devices = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let mut files = Vec::new();
        let mut frames = tokio::fs::read_dir(entry.path()).await?;
        while let Some(frame) = frames.next_entry().await? {
            if frame.file_type().await?.is_file() {
                files.push(frame.path());
            }
        }
        files.sort();
        devices.push((entry.file_name().to_string_lossy().into_owned(), files));
    }
    devices.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(devices)
}

async fn produce(device_id: String, files: Vec<PathBuf>, tx: Sender<Ingest>) {
    for (sequence_index, path) in files.into_iter().enumerate() {
        let frame = match load_frame(&path).await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%device_id, path = %path.display(), "skipping frame: {e}");
                continue;
            }
        };
        let msg = Ingest {
            device_id: device_id.clone(),
            sequence_index: sequence_index as i64,
            frame,
        };
        if let Err(e) = tx.send_async(msg).await {
            error!("Failed to send frame: {}", e);
            break;
        }
        tokio::time::sleep(FRAME_INTERVAL).await;
    }
}

async fn load_frame(path: &Path) -> Result<Frame> {
    let bytes = tokio::fs::read(path).await?;
    let frame = tokio::task::spawn_blocking(move || decode_frame(&bytes)).await??;
    Ok(frame)
}

async fn assemble_all(service: &FrameService) {
    for device_id in service.registry().device_ids() {
        let worker = service.clone();
        let id = device_id.clone();
        match tokio::task::spawn_blocking(move || worker.retrieve(&id)).await {
            Ok(Ok(sequence)) => info!(
                %device_id,
                shape = ?sequence.shape(),
                source = sequence.source_frames,
                synthesized = sequence.synthesized_frames,
                padding = sequence.padding_frames,
                "sequence ready"
            ),
            Ok(Err(VigilError::InsufficientData { available, required, .. })) => {
                debug!(%device_id, available, required, "waiting for frames")
            }
            Ok(Err(e)) => warn!(%device_id, code = e.code(), "assembly failed: {e}"),
            Err(e) => error!(%device_id, "assembly task panicked: {e}"),
        }
    }
}
