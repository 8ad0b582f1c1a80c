use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbImage};
use vigil::pipeline::ManualClock;
use vigil::{AssembledSequence, Config, Frame, FrameService, PixelFormat, VigilError};

fn small_config() -> Config {
    let mut config = Config::default();
    config.sequence.width = 8;
    config.sequence.height = 8;
    config
}

fn jpeg_data_url() -> String {
    let img = RgbImage::from_pixel(100, 100, image::Rgb([255, 0, 0]));
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Jpeg).unwrap();
    format!("data:image/jpeg;base64,{}", STANDARD.encode(out.into_inner()))
}

fn rgb(value: u8) -> Frame {
    Frame::filled(16, 16, PixelFormat::Rgb24, value)
}

#[test]
fn encoded_frame_is_buffered() {
    let service = FrameService::new(&small_config());
    service.ingest_encoded("test_device", 1, &jpeg_data_url()).unwrap();
    assert_eq!(service.registry().get("test_device").unwrap().size(), 1);

    let seq = service.retrieve("test_device").unwrap();
    assert_eq!(seq.shape(), &[1, 48, 8, 8, 3]);
    assert_eq!(seq.padding_frames, 47);
}

#[test]
fn bad_payload_creates_no_buffer() {
    let service = FrameService::new(&small_config());
    let err = service
        .ingest_encoded("test_device_invalid", 2, "it-is-not-base64-encoding-form")
        .unwrap_err();
    assert_eq!((err.status_code(), err.code()), (422, "invalid_base64"));
    assert!(service.registry().is_empty());
}

#[test]
fn full_buffer_surfaces_rate_limit() {
    let service = FrameService::new(&small_config());
    for idx in 0..48 {
        service.ingest("dev_full_queue", idx, rgb(1)).unwrap();
    }
    let err = service.ingest("dev_full_queue", 0, rgb(1)).unwrap_err();
    assert_eq!((err.status_code(), err.code()), (429, "queue_full"));
}

#[test]
fn unknown_device_is_not_found() {
    let service = FrameService::new(&small_config());
    let err = service.retrieve("nobody").unwrap_err();
    assert!(matches!(err, VigilError::NotFound { .. }));
    assert!(service.registry().is_empty());
}

#[test]
fn threshold_gates_assembly() {
    let mut config = small_config();
    config.service.min_frames = 43;
    let service = FrameService::new(&config);
    for idx in 0..10 {
        service.ingest("pi-1", idx, rgb(3)).unwrap();
    }
    match service.retrieve("pi-1") {
        Err(VigilError::InsufficientData { available, required, .. }) => {
            assert_eq!((available, required), (10, 43));
        }
        other => panic!("expected InsufficientData, got {other:?}"),
    }
}

#[test]
fn expired_frames_leave_nothing_to_assemble() {
    let clock = ManualClock::new();
    let service = FrameService::with_clock(&small_config(), Arc::new(clock.clone()));
    service.ingest("pi-1", 0, rgb(3)).unwrap();
    clock.advance(Duration::from_secs(2));
    assert!(matches!(
        service.retrieve("pi-1"),
        Err(VigilError::InsufficientData { available: 0, .. })
    ));
}

#[test]
fn malformed_assembly_keeps_buffer_intact() {
    let service = FrameService::new(&small_config());
    service.ingest("pi-1", 0, rgb(3)).unwrap();
    service
        .ingest("pi-1", 1, Frame::filled(16, 16, PixelFormat::Gray8, 3))
        .unwrap();
    let err = service.retrieve("pi-1").unwrap_err();
    assert!(matches!(err, VigilError::MalformedInput(_)));
    assert_eq!(service.registry().get("pi-1").unwrap().size(), 2);
}

#[test]
fn diagnosis_thresholds_probability() {
    let service = FrameService::new(&small_config());
    service.ingest("pi-1", 0, rgb(3)).unwrap();

    let drowsy = |_: &AssembledSequence| -> vigil::Result<f32> { Ok(0.2) };
    let alert = |_: &AssembledSequence| -> vigil::Result<f32> { Ok(0.9) };
    assert!(service.diagnose("pi-1", &drowsy).unwrap().is_drowsy);
    assert!(!service.diagnose("pi-1", &alert).unwrap().is_drowsy);

    let broken = |_: &AssembledSequence| -> vigil::Result<f32> {
        Err(VigilError::Inference("model not loaded".into()))
    };
    let err = service.diagnose("pi-1", &broken).unwrap_err();
    assert_eq!((err.status_code(), err.code()), (500, "prediction_error"));

    let nan = |_: &AssembledSequence| -> vigil::Result<f32> { Ok(f32::NAN) };
    assert!(matches!(service.diagnose("pi-1", &nan), Err(VigilError::Inference(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_producers_share_one_buffer() {
    let service = FrameService::new(&small_config());
    let mut tasks = Vec::new();
    for producer in 0..8i64 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            let mut accepted = 0usize;
            for i in 0..10 {
                if service.ingest("pi-async", producer * 10 + i, rgb(5)).is_ok() {
                    accepted += 1;
                }
                tokio::task::yield_now().await;
            }
            accepted
        }));
    }
    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap();
    }
    assert_eq!(total, 48);

    let seq = service.retrieve("pi-async").unwrap();
    assert_eq!(seq.len(), 48);
}
