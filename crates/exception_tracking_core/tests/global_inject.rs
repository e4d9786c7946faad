use exception_tracking_core::host::memory::{InMemoryHost, StaticHttpContext};
use exception_tracking_core::inject::global_state;
use exception_tracking_core::{
    force_inject, inject, ExceptionContext, ExceptionFilter, GateState, HostException,
    InMemoryTelemetry, TelemetryClient,
};
use std::sync::Arc;
use std::thread;

// The process-wide gate is shared by every test in this binary, so this file
// holds a single test.
#[test]
fn process_gate_admits_one_run_and_force_inject_bypasses_it() {
    let first_host = InMemoryHost::compatible().expect("first host");
    let second_host = InMemoryHost::compatible().expect("second host");
    let telemetry = Arc::new(InMemoryTelemetry::new());
    let client: Arc<dyn TelemetryClient> = telemetry.clone();
    assert_eq!(global_state(), GateState::Uninitialized);

    let handles = (0..4)
        .map(|_| {
            let catalog = first_host.catalog();
            let client = Arc::clone(&client);
            thread::spawn(move || inject(catalog, client))
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().expect("inject thread");
    }

    assert_eq!(global_state(), GateState::Initialized);
    assert_eq!(first_host.global_filters().len(), 1);
    assert_eq!(first_host.exception_loggers().len(), 1);

    inject(second_host.catalog(), Arc::clone(&client));
    assert!(second_host.global_filters().is_empty());

    force_inject(second_host.catalog(), Arc::clone(&client));
    force_inject(second_host.catalog(), Arc::clone(&client));
    assert_eq!(second_host.global_filters().len(), 1);
    assert_eq!(second_host.exception_loggers().len(), 1);

    let exception = HostException::shared("InvalidOperation", "boom");
    let filter = second_host.global_filters().entries().remove(0);
    filter.on_exception(Some(&mut ExceptionContext::new(
        Some(StaticHttpContext::shared(true)),
        Some(Arc::clone(&exception)),
    )));
    assert_eq!(telemetry.len(), 1);
    assert!(telemetry.records()[0].is_for(&exception));
}
