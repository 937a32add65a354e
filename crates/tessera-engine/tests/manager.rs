mod common;

use std::thread;
use std::time::Duration;

use common::{framework, framework_with};
use tessera_engine::{AlgorithmEvent, FrameworkConfig, ManagerError};

#[test]
fn managed_instances_are_retrievable_until_removed() {
    let framework = framework();
    let manager = framework.algorithm_manager();
    let (id, foo) = framework.create_algorithm("Foo", Some(1)).unwrap();
    assert_eq!(manager.len(), 1);
    assert_eq!(foo.lock().version(), 1);

    let again = manager.get(id).unwrap();
    assert!(again.lock().execute().unwrap());
    assert!(foo.lock().is_executed());

    manager.remove(id).unwrap();
    assert!(manager.get(id).is_none());
    assert!(matches!(manager.remove(id), Err(ManagerError::NotFound(_))));
}

#[test]
fn failed_creation_is_not_retained() {
    let framework = framework();
    assert!(framework.create_algorithm("Nope", None).is_err());
    assert!(framework.algorithm_manager().is_empty());
}

#[test]
fn oldest_idle_instances_are_dropped_past_the_cap() {
    let framework = framework_with(FrameworkConfig {
        workers: 1,
        max_retained_algorithms: 2,
        ..FrameworkConfig::default()
    });
    let manager = framework.algorithm_manager();
    let (first, held) = framework.create_algorithm("Foo", None).unwrap();
    let guard = held.lock();
    let (second, _) = framework.create_algorithm("Foo", None).unwrap();
    let (third, _) = framework.create_algorithm("Foo", None).unwrap();

    assert_eq!(manager.ids(), vec![first, third]);
    assert!(manager.get(second).is_none());
    drop(guard);
}

#[test]
fn clear_reports_every_finalize_failure() {
    let framework = framework();
    framework.create_algorithm("Stubborn", None).unwrap();
    framework.create_algorithm("Foo", None).unwrap();
    framework.create_algorithm("Stubborn", None).unwrap();

    match framework.algorithm_manager().clear() {
        Err(ManagerError::Cleanup {
            failed,
            total,
            messages,
        }) => {
            assert_eq!((failed, total), (2, 3));
            assert!(messages.iter().all(|message| message.contains("device busy")));
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert!(framework.algorithm_manager().is_empty());
    assert!(framework.algorithm_manager().clear().is_ok());
}

#[test]
fn shutdown_clears_the_data_service_even_on_failure() {
    let framework = framework();
    framework
        .data_service()
        .add("ws", common::numbers(&[1.0]))
        .unwrap();
    framework.create_algorithm("Stubborn", None).unwrap();
    assert!(framework.shutdown().is_err());
    assert!(framework.data_service().is_empty());
}

#[test]
fn cancel_all_reaches_running_instances() {
    let framework = framework();
    let (_, waits) = framework.create_algorithm("AwaitsCancel", None).unwrap();
    let events = {
        let mut waits = waits.lock();
        waits.set_property_value("OutputWorkspace", "out").unwrap();
        waits.subscribe()
    };

    thread::scope(|scope| {
        let worker = scope.spawn(|| waits.lock().execute());
        loop {
            match events.recv_timeout(Duration::from_secs(10)) {
                Ok(AlgorithmEvent::Started { .. }) => break,
                Ok(_) => continue,
                Err(err) => panic!("no start event: {err}"),
            }
        }
        assert_eq!(framework.algorithm_manager().running().len(), 1);
        framework.algorithm_manager().cancel_all();
        assert!(!worker.join().unwrap().unwrap());
    });
    assert!(!framework.data_service().contains("out"));
    assert!(events.try_iter().any(|event| matches!(
        event,
        AlgorithmEvent::Finished { success: false, .. }
    )));
}

#[test]
fn cancel_all_is_honoured_by_idle_instances() {
    let framework = framework();
    let (_, foo) = framework.create_algorithm("Foo", None).unwrap();
    framework.algorithm_manager().cancel_all();
    let mut foo = foo.lock();
    assert!(!foo.execute().unwrap());
    assert!(foo.execute().unwrap());
}
