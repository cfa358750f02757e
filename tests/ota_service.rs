use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use fbglink::{
    CommandCode, DownlinkCommand, DownlinkPush, FirmwareFile, OtaConfig, OtaError, OtaService,
    OtaState, RecordingDownlink, TransmitOutcome, UPDATE_PORT,
};

const DEVICE: &str = "70b3d57ed0001234";

fn firmware(len: usize) -> FirmwareFile {
    let bytes = (0..len).map(|index| (index % 251) as u8).collect();
    FirmwareFile::named("main.py", bytes)
}

fn service(downlink: &Arc<RecordingDownlink>, delay: Duration) -> OtaService {
    OtaService::new(
        Arc::clone(downlink) as Arc<dyn DownlinkPush>,
        OtaConfig::builder().chunk_delay(delay).build(),
    )
}

#[tokio::test(start_paused = true)]
async fn full_update_pushes_start_then_paced_chunks() -> anyhow::Result<()> {
    let downlink = Arc::new(RecordingDownlink::default());
    let service = service(&downlink, Duration::from_secs(2));
    let session = service.upload(firmware(120), Some(50))?;
    let id = session.id().clone();
    let began = Instant::now();

    service.start(&id, DEVICE).await?;
    let outcome = service.send_chunks(&id, DEVICE).await?;

    assert_eq!(TransmitOutcome::Completed { chunks_sent: 3 }, outcome);
    assert_eq!(OtaState::Completed, session.state());
    assert_eq!(
        vec![
            CommandCode::Start,
            CommandCode::Chunk,
            CommandCode::Chunk,
            CommandCode::Chunk
        ],
        downlink.command_codes()
    );

    let pushes = downlink.pushes();
    let start = pushes[0].frame();
    assert_eq!(UPDATE_PORT, start.port());
    assert!(start.confirmed());
    assert_eq!(35, start.payload().len());
    assert_eq!(&[0x00, 0x03], &start.payload()[1..3]);
    assert_eq!(
        Sha256::digest(session.firmware()).as_slice(),
        &start.payload()[3..]
    );
    assert!(pushes[1..].iter().all(|push| !push.frame().confirmed()));

    let offsets: Vec<Duration> = pushes[1..].iter().map(|push| push.at() - began).collect();
    assert_eq!(
        vec![
            Duration::ZERO,
            Duration::from_secs(2),
            Duration::from_secs(4)
        ],
        offsets
    );

    let summary = service.summary(&id)?;
    assert_eq!(Some(DEVICE), summary.device_id());
    assert!(summary.completed_at().is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn chunk_payloads_reassemble_the_file() -> anyhow::Result<()> {
    let downlink = Arc::new(RecordingDownlink::default());
    let service = service(&downlink, Duration::from_millis(10));
    let file = firmware(1000);
    let original = file.bytes().to_vec();
    let session = service.upload(file, Some(7))?;

    service.send_chunks(session.id(), DEVICE).await?;

    let mut reassembled = Vec::new();
    for push in downlink.pushes() {
        if let Some(DownlinkCommand::Chunk { bytes, .. }) = push.command() {
            reassembled.extend_from_slice(bytes);
        }
    }
    assert_eq!(143, session.chunk_count());
    assert_eq!(original, reassembled);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn abort_during_paced_send_stops_before_next_chunk() -> anyhow::Result<()> {
    let downlink = Arc::new(RecordingDownlink::default());
    let service = service(&downlink, Duration::from_secs(2));
    let session = service.upload(firmware(200), Some(50))?;
    let id = session.id().clone();
    service.start(&id, DEVICE).await?;

    let send = service.spawn_send_chunks(id.clone(), DEVICE.to_string());
    tokio::time::sleep(Duration::from_millis(2500)).await;
    service.abort(DEVICE, Some(&id)).await?;
    let outcome = send.await??;

    assert_eq!(TransmitOutcome::Cancelled { chunks_sent: 2 }, outcome);
    assert_eq!(OtaState::Aborted, session.state());
    assert_eq!(vec![0, 1], downlink.chunk_indices());
    assert_eq!(Some(&CommandCode::Abort), downlink.command_codes().last());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn push_failure_at_chunk_k_moves_session_to_error() -> anyhow::Result<()> {
    let downlink = Arc::new(RecordingDownlink::builder().fail_at_chunk(2).build());
    let service = service(&downlink, Duration::from_secs(1));
    let session = service.upload(firmware(250), Some(50))?;

    let result = service.send_chunks(session.id(), DEVICE).await;

    assert_matches!(result, Err(OtaError::ChunkTransmission { index: 2, .. }));
    assert_eq!(OtaState::Error, session.state());
    assert_eq!(Some(2), session.failed_chunk());
    assert_eq!(vec![0, 1, 2], downlink.chunk_indices());
    assert!(service.summary(session.id())?.last_error().is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn errored_session_can_restart_from_chunk_zero() -> anyhow::Result<()> {
    let downlink = Arc::new(RecordingDownlink::builder().fail_at_push(1).build());
    let service = service(&downlink, Duration::ZERO);
    let session = service.upload(firmware(100), Some(50))?;
    let id = session.id().clone();

    assert_matches!(
        service.send_chunks(&id, DEVICE).await,
        Err(OtaError::ChunkTransmission { index: 1, .. })
    );
    service.start(&id, DEVICE).await?;
    service.send_chunks(&id, DEVICE).await?;

    assert_eq!(OtaState::Completed, session.state());
    assert_eq!(vec![0, 1, 0, 1], downlink.chunk_indices());
    Ok(())
}

#[tokio::test]
async fn concurrent_send_is_refused_while_one_is_running() -> anyhow::Result<()> {
    let downlink = Arc::new(
        RecordingDownlink::builder()
            .latency(Duration::from_millis(20))
            .build(),
    );
    let service = service(&downlink, Duration::from_millis(20));
    let session = service.upload(firmware(150), Some(50))?;
    let id = session.id().clone();

    let first = service.spawn_send_chunks(id.clone(), DEVICE.to_string());
    while session.state() != OtaState::Sending {
        tokio::task::yield_now().await;
    }
    let second = service.send_chunks(&id, DEVICE).await;

    assert_matches!(
        second,
        Err(OtaError::InvalidState {
            state: OtaState::Sending,
            ..
        })
    );
    assert_matches!(first.await?, Ok(TransmitOutcome::Completed { chunks_sent: 3 }));
    assert_eq!(vec![0, 1, 2], downlink.chunk_indices());
    Ok(())
}

#[tokio::test]
async fn list_delete_and_health_track_sessions() -> anyhow::Result<()> {
    let downlink = Arc::new(RecordingDownlink::default());
    let service = service(&downlink, Duration::ZERO);
    let first = service.upload(firmware(10), None)?;
    let second = service.upload(firmware(20), None)?;

    assert_eq!(2, service.list().len());
    assert_eq!(2, service.health().active_sessions());

    let removed = service.delete(first.id())?;
    assert_eq!(first.id(), removed.session_id());
    assert_matches!(
        service.session(first.id()),
        Err(OtaError::SessionNotFound { .. })
    );
    let remaining: Vec<_> = service
        .list()
        .iter()
        .map(|summary| summary.session_id().clone())
        .collect();
    assert_eq!(vec![second.id().clone()], remaining);
    Ok(())
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let downlink = Arc::new(RecordingDownlink::default());
    let service = service(&downlink, Duration::ZERO);
    let missing = fbglink::SessionId::new("session-0-99");

    assert_matches!(
        service.start(&missing, DEVICE).await,
        Err(OtaError::SessionNotFound { .. })
    );
    assert_matches!(
        service.send_chunks(&missing, DEVICE).await,
        Err(OtaError::SessionNotFound { .. })
    );
    assert!(downlink.pushes().is_empty());
}
