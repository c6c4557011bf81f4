// Unit tests for supervisor options and outcomes

use crate::supervisor::{DEFAULT_RESTART_INITIAL_DELAY, SupervisorOptions, SupervisorOutcome};

use server_core::config::HostConfig;

use std::time::Duration;

/// **VALUE**: Config values reach the supervisor as durations.
#[test]
fn given_config_when_building_options_then_values_converted() {
    // GIVEN: Custom supervisor section
    let mut config = HostConfig::default();
    config.supervisor.max_restarts = 2;
    config.supervisor.restart_backoff_max_secs = 7;

    // WHEN: Building options
    let options = SupervisorOptions::from_config(&config, true);

    // THEN: Converted
    assert_eq!(options.max_restarts, 2);
    assert_eq!(options.restart_max_delay, Duration::from_secs(7));
    assert_eq!(options.restart_initial_delay, DEFAULT_RESTART_INITIAL_DELAY);
    assert!(options.pretty);
}

/// **VALUE**: Only a terminated server counts as success.
///
/// **WHY THIS MATTERS**: Service managers restart or alert on the exit code.
#[test]
fn given_outcomes_when_checking_success_then_only_terminated_succeeds() {
    assert!(SupervisorOutcome::Terminated.is_success());
    assert!(
        !SupervisorOutcome::Crashed {
            message: String::from("Native server exited with status 1"),
        }
        .is_success()
    );
}
