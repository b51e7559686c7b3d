//! Facade tests covering the full learn -> store -> generate flow.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use irbridge_core::types::{EntityKind, SignalKind};
use irbridge_core::Error;
use irbridge_learn::{CaptureHandle, HubClient, HubError, LearnConfig, SessionPhase, SignalEvent};
use irbridge_service::{BridgeService, ServiceConfig};
use irbridge_storage::DeviceStore;

/// Hub double that answers each await with the next scripted event.
struct QueueHub {
    events: Mutex<VecDeque<SignalEvent>>,
}

impl QueueHub {
    fn new(events: Vec<SignalEvent>) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(events.into()),
        })
    }
}

#[async_trait]
impl HubClient for QueueHub {
    async fn begin_capture(
        &self,
        _hub_reference: &str,
        _signal_kind: SignalKind,
    ) -> Result<CaptureHandle, HubError> {
        Ok(CaptureHandle("h".into()))
    }

    async fn await_signal(
        &self,
        _handle: &CaptureHandle,
        deadline: Duration,
    ) -> Result<SignalEvent, HubError> {
        let next = self.events.lock().pop_front();
        match next {
            Some(event) => Ok(event),
            None => {
                tokio::time::sleep(deadline).await;
                Err(HubError::Timeout)
            }
        }
    }

    async fn cancel(&self, _handle: &CaptureHandle) -> Result<(), HubError> {
        Ok(())
    }
}

fn fast_learn() -> LearnConfig {
    LearnConfig {
        prepare_deadline: Duration::from_millis(100),
        ir_deadline: Duration::from_millis(100),
        rf_deadline: Duration::from_millis(100),
        prepare_retries: 1,
        prepare_retry_delay: Duration::from_millis(1),
    }
}

fn service(dir: &tempfile::TempDir, hub: Arc<QueueHub>, auto: bool) -> BridgeService {
    let store = Arc::new(DeviceStore::open(dir.path().join("devices.json")));
    let config = ServiceConfig {
        output_file: dir.path().join("entities.yaml"),
        auto_generate: auto,
    };
    BridgeService::with_learn_config(store, hub, config, fast_learn())
}

#[tokio::test]
async fn learn_then_generate_full_flow() {
    let dir = tempfile::tempdir().unwrap();
    let hub = QueueHub::new(vec![
        SignalEvent::Code { code: "on".into() },
        SignalEvent::Code { code: "off".into() },
        SignalEvent::Code { code: "lo".into() },
        SignalEvent::Code { code: "md".into() },
        SignalEvent::Code { code: "hi".into() },
    ]);
    let svc = service(&dir, hub, false);

    svc.create_device("Bedroom Fan", EntityKind::Fan, Some("rm4".into()))
        .await
        .unwrap();

    for name in ["turn_on", "turn_off", "speed_low", "speed_medium", "speed_high"] {
        let id = svc.learn("bedroom_fan", name, SignalKind::Ir).await.unwrap();
        let status = svc.wait_learn(&id).await.unwrap();
        assert_eq!(status.phase, SessionPhase::Succeeded, "learning {name}");
    }

    let report = svc.regenerate_entities().await.unwrap();
    assert_eq!(report.entity_count, 1);
    assert!(report.no_capability_devices.is_empty());

    let yaml = std::fs::read_to_string(dir.path().join("entities.yaml")).unwrap();
    assert!(yaml.contains("bedroom_fan:"));
    assert!(!yaml.contains("fan.bedroom_fan"));
    assert!(yaml.contains("bedroom_fan_speed:"));
    assert!(yaml.contains("speed_1"));

    // Regeneration over an unchanged store is byte-identical.
    svc.regenerate_entities().await.unwrap();
    let again = std::fs::read_to_string(dir.path().join("entities.yaml")).unwrap();
    assert_eq!(yaml, again);
}

#[tokio::test]
async fn duplicate_device_name_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(&dir, QueueHub::new(vec![]), false);

    svc.create_device("Tony's Office Light", EntityKind::Light, None)
        .await
        .unwrap();
    let err = svc
        .create_device("tonys office light", EntityKind::Light, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateId(_)));
}

#[tokio::test]
async fn learn_normalizes_command_names() {
    let dir = tempfile::tempdir().unwrap();
    let hub = QueueHub::new(vec![SignalEvent::Code { code: "x".into() }]);
    let svc = service(&dir, hub, false);

    svc.create_device("TV", EntityKind::MediaPlayer, Some("rm4".into()))
        .await
        .unwrap();
    let id = svc.learn("tv", "Turn On", SignalKind::Ir).await.unwrap();
    svc.wait_learn(&id).await.unwrap();

    let commands = svc.list_commands("tv").await.unwrap();
    assert_eq!(commands[0].name, "turn_on");
}

#[tokio::test]
async fn auto_generate_tracks_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(&dir, QueueHub::new(vec![]), true);

    svc.create_device("Desk Fan", EntityKind::Fan, None).await.unwrap();
    let yaml = std::fs::read_to_string(dir.path().join("entities.yaml")).unwrap();
    assert!(yaml.contains("desk_fan:"));

    svc.delete_device("desk_fan").await.unwrap();
    let yaml = std::fs::read_to_string(dir.path().join("entities.yaml")).unwrap();
    assert!(!yaml.contains("desk_fan:"));
}

#[tokio::test]
async fn delete_command_and_status_queries() {
    let dir = tempfile::tempdir().unwrap();
    let hub = QueueHub::new(vec![SignalEvent::Code { code: "x".into() }]);
    let svc = service(&dir, hub, false);

    svc.create_device("TV", EntityKind::MediaPlayer, Some("rm4".into()))
        .await
        .unwrap();
    let id = svc.learn("tv", "mute", SignalKind::Ir).await.unwrap();
    let status = svc.wait_learn(&id).await.unwrap();
    assert_eq!(status.phase, SessionPhase::Succeeded);

    // Terminal sessions stay queryable.
    let queried = svc.learning_status(&id).unwrap();
    assert!(queried.is_terminal());

    svc.delete_command("tv", "mute").await.unwrap();
    assert!(svc.list_commands("tv").await.unwrap().is_empty());
}
