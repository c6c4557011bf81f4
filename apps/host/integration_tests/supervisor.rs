use crate::helpers::{Run, ScriptedServer, event_lines};

use lighttpd_host::supervisor::{Supervisor, SupervisorOptions, SupervisorOutcome};

use server_core::{InstanceRegistry, LaunchRequest, NativeServer};

use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{sleep, timeout};

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

fn options(max_restarts: u32, pretty: bool) -> SupervisorOptions {
    SupervisorOptions {
        max_restarts,
        restart_initial_delay: Duration::from_millis(10),
        restart_max_delay: Duration::from_millis(50),
        pretty,
    }
}

fn supervisor(
    server: &Arc<ScriptedServer>,
    options: SupervisorOptions,
) -> Supervisor<Vec<u8>> {
    Supervisor::new(
        Arc::clone(server) as Arc<dyn NativeServer>,
        LaunchRequest::new("/srv/lighttpd.conf", "/srv/error.log"),
        options,
        Vec::new(),
    )
    .with_registry(Arc::new(InstanceRegistry::new()))
}

/// **VALUE**: A crash is followed by a restart on a fresh handle with a new id.
///
/// **WHY THIS MATTERS**: Handles are single-use; reusing one, or reusing its id,
/// would make the event stream ambiguous for consumers.
///
/// **BUG THIS CATCHES**: Would catch restarts reusing the crashed handle or the
/// supervisor exiting on the first crash despite restarts being allowed.
#[tokio::test]
async fn given_crash_with_restart_left_when_running_then_restarts_with_new_id() {
    // GIVEN: A server that crashes once, then exits cleanly
    let server = Arc::new(ScriptedServer::new([Run::Exit(3), Run::Exit(0)]));
    let mut supervisor = supervisor(&server, options(1, false));

    // WHEN: Supervising
    let outcome = timeout(RUN_TIMEOUT, supervisor.run(pending()))
        .await
        .unwrap()
        .unwrap();

    // THEN: Two runs with ids 1 and 2, ending terminated
    assert_eq!(outcome, SupervisorOutcome::Terminated);
    assert_eq!(supervisor.restarts(), 1);
    assert_eq!(server.launches(), 2);
    assert_eq!(
        event_lines(supervisor.output()),
        vec![
            (1, String::from("LAUNCHED")),
            (1, String::from("CRASHED")),
            (2, String::from("LAUNCHED")),
            (2, String::from("TERMINATED")),
        ]
    );
}

/// **VALUE**: Once restarts run out, the last crash ends supervision with failure.
#[tokio::test]
async fn given_restarts_exhausted_when_server_crashes_again_then_crashed_outcome() {
    // GIVEN: A server that always crashes, one restart allowed
    let server = Arc::new(ScriptedServer::new([Run::Exit(3), Run::Exit(4)]));
    let mut supervisor = supervisor(&server, options(1, false));

    // WHEN: Supervising
    let outcome = timeout(RUN_TIMEOUT, supervisor.run(pending()))
        .await
        .unwrap()
        .unwrap();

    // THEN: Final crash reported with the last status
    match outcome {
        SupervisorOutcome::Crashed { ref message } => assert!(message.contains('4'), "{message}"),
        SupervisorOutcome::Terminated => panic!("expected a crash outcome"),
    }
    assert!(!outcome.is_success());
    assert_eq!(server.launches(), 2);
}

/// **VALUE**: With no restarts configured, the first crash is final.
#[tokio::test]
async fn given_no_restarts_when_server_crashes_then_supervision_ends() {
    let server = Arc::new(ScriptedServer::new([Run::Exit(9)]));
    let mut supervisor = supervisor(&server, options(0, false));

    let outcome = timeout(RUN_TIMEOUT, supervisor.run(pending()))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(outcome, SupervisorOutcome::Crashed { .. }));
    assert_eq!(supervisor.restarts(), 0);
    assert_eq!(server.launches(), 1);
}

/// **VALUE**: A shutdown request stops the server gracefully and exits successfully.
///
/// **WHY THIS MATTERS**: This is the Ctrl-C path; it must not be mistaken for a
/// crash and trigger a restart.
#[tokio::test]
async fn given_running_server_when_shutdown_resolves_then_graceful_stop_and_terminated() {
    // GIVEN: A server that runs until stopped, restarts allowed
    let server = Arc::new(ScriptedServer::new([Run::UntilShutdown]));
    let mut supervisor = supervisor(&server, options(5, false));

    // WHEN: Shutdown resolves shortly after start
    let outcome = timeout(
        RUN_TIMEOUT,
        supervisor.run(sleep(Duration::from_millis(100))),
    )
    .await
    .unwrap()
    .unwrap();

    // THEN: Terminated, no restarts, stop went to the native server or cancelled the start
    assert_eq!(outcome, SupervisorOutcome::Terminated);
    assert_eq!(supervisor.restarts(), 0);
    assert!(server.launches() <= 1);
    let signals = event_lines(supervisor.output());
    assert_eq!(signals.last(), Some(&(1, String::from("TERMINATED"))));
}

/// **VALUE**: `--pretty` output is still one parseable JSON document per event.
#[tokio::test]
async fn given_pretty_option_when_events_written_then_indented_json() {
    // GIVEN: A server that exits cleanly
    let server = Arc::new(ScriptedServer::new([Run::Exit(0)]));
    let mut supervisor = supervisor(&server, options(0, true));

    // WHEN: Supervising
    timeout(RUN_TIMEOUT, supervisor.run(pending()))
        .await
        .unwrap()
        .unwrap();

    // THEN: Indented documents, in order
    let output = String::from_utf8(supervisor.output().clone()).unwrap();
    assert!(output.contains("\n  \"server_id\": 1"), "{output}");
    let documents: Vec<serde_json::Value> = serde_json::Deserializer::from_str(&output)
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["signal"], "LAUNCHED");
    assert_eq!(documents[1]["signal"], "TERMINATED");
}

/// **VALUE**: Supervision shares a single-threaded runtime without starving it.
///
/// **WHY THIS MATTERS**: Embedders may drive the supervisor from a current-thread
/// runtime next to their own tasks; waiting on a server thread must happen off
/// that thread.
///
/// **BUG THIS CATCHES**: Would catch the server-thread join running on the async
/// task itself, which stalls every other task on the runtime for its duration.
#[tokio::test(flavor = "current_thread")]
async fn given_current_thread_runtime_when_server_restarts_then_other_tasks_keep_running() {
    // GIVEN: A ticking task next to a server that crashes once, then exits cleanly
    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = tokio::spawn({
        let ticks = Arc::clone(&ticks);
        async move {
            loop {
                sleep(Duration::from_millis(1)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        }
    });
    let server = Arc::new(ScriptedServer::new([Run::Exit(3), Run::Exit(0)]));
    let mut supervisor = supervisor(&server, options(1, false));

    // WHEN: Supervising on the same runtime
    let outcome = timeout(RUN_TIMEOUT, supervisor.run(pending()))
        .await
        .unwrap()
        .unwrap();
    ticker.abort();

    // THEN: Both runs were joined and the ticker made progress meanwhile
    assert_eq!(outcome, SupervisorOutcome::Terminated);
    assert_eq!(server.launches(), 2);
    assert!(ticks.load(Ordering::SeqCst) > 0);
}
