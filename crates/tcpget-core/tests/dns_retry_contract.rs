//! Contract: host name resolution is bounded
//!
//! Every attempt is covered by a watchdog. A resolver failure and a watchdog
//! expiry each count as one failed attempt, and after `max_tries` failures
//! the controller reports `None` exactly once and stops issuing lookups.

mod common;

use std::net::Ipv4Addr;

use common::{Call, Harness, Outcome, REPLY, WATCHDOG, hostname_config, literal_config};
use tcpget_core::{AcquisitionConfig, DnsConfig, EndpointConfig, Error, Event, LifecycleState, TimerId};

const ANSWER: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);

fn dns(max_tries: u16) -> DnsConfig {
    DnsConfig {
        max_tries,
        ..DnsConfig::default()
    }
}

#[test]
fn literal_address_resolves_without_lookup() {
    let mut h = Harness::new(literal_config());
    h.resolve();

    assert_eq!(h.log.resolves(), 0);
    assert_eq!(h.log.arms(WATCHDOG), 0);
    assert_eq!(h.observed.resolved(), vec![Some(Ipv4Addr::new(192, 168, 1, 50))]);
    assert_eq!(h.controller.state(), LifecycleState::DnsResolved);
    assert_eq!(h.controller.host(), "192.168.1.50");
}

#[test]
fn successful_answer_caches_address() {
    let mut h = Harness::new(hostname_config());
    h.resolve();

    assert_eq!(
        h.log.calls(),
        vec![
            Call::Arm(TimerId::DnsWatchdog(1), DnsConfig::default().watchdog(), false),
            Call::Resolve("sensor.example.com".to_string()),
        ]
    );
    assert_eq!(h.controller.state(), LifecycleState::ResolvingDns);

    h.event(Event::DnsAnswer(Some(ANSWER)));

    assert_eq!(h.controller.resolved_address(), Some(ANSWER));
    assert_eq!(h.controller.state(), LifecycleState::DnsResolved);
    assert_eq!(h.controller.dns_retry_count(), 0);
    assert_eq!(h.log.disarms(WATCHDOG), 1);
    assert_eq!(h.observed.resolved(), vec![Some(ANSWER)]);
}

#[test]
fn watchdog_expiry_retries_until_max_tries() {
    let mut h = Harness::new(hostname_config());
    h.resolve();

    for attempt in 1..5u16 {
        h.expire_watchdog();
        assert_eq!(h.controller.dns_retry_count(), attempt);
        assert_eq!(h.controller.state(), LifecycleState::ResolvingDns);
        assert!(h.observed.resolved().is_empty());
    }
    assert_eq!(h.log.resolves(), 5);

    h.expire_watchdog();

    assert_eq!(h.controller.dns_retry_count(), 5);
    assert_eq!(h.controller.state(), LifecycleState::Error);
    assert_eq!(h.observed.resolved(), vec![None]);
    assert_eq!(h.log.resolves(), 5, "no lookup after the last attempt");
    assert_eq!(h.controller.resolved_address(), None);
}

#[test]
fn resolver_failures_count_as_attempts() {
    let config = hostname_config().with_dns(dns(3));
    let mut h = Harness::new(config);
    h.resolve();

    h.event(Event::DnsAnswer(None));
    h.event(Event::DnsAnswer(None));
    assert_eq!(h.controller.dns_retry_count(), 2);
    assert_eq!(h.log.resolves(), 3);

    h.event(Event::DnsAnswer(None));
    assert_eq!(h.controller.state(), LifecycleState::Error);
    assert_eq!(h.observed.resolved(), vec![None]);
    assert_eq!(h.log.resolves(), 3);
}

#[test]
fn mixed_failures_share_one_counter() {
    let config = hostname_config().with_dns(dns(2));
    let mut h = Harness::new(config);
    h.resolve();

    h.event(Event::DnsAnswer(None));
    h.expire_watchdog();

    assert_eq!(h.controller.state(), LifecycleState::Error);
    assert_eq!(h.controller.dns_retry_count(), 2);
    assert_eq!(h.observed.resolved(), vec![None]);
}

#[test]
fn answer_before_watchdog_wins() {
    let mut h = Harness::new(hostname_config());
    h.resolve();

    h.event(Event::DnsAnswer(Some(ANSWER)));
    // expiry already queued behind the answer
    h.expire_watchdog();

    assert_eq!(h.controller.state(), LifecycleState::DnsResolved);
    assert_eq!(h.controller.dns_retry_count(), 0);
    assert_eq!(h.log.resolves(), 1);
    assert_eq!(h.observed.resolved(), vec![Some(ANSWER)]);
}

#[test]
fn watchdog_of_failed_attempt_is_ignored() {
    let mut h = Harness::new(hostname_config());
    h.resolve();
    let first_attempt = h.log.last_watchdog();

    h.event(Event::DnsAnswer(None));
    // expiry of the same attempt, queued behind its answer
    h.event(Event::TimerFired(first_attempt));

    assert_eq!(h.controller.dns_retry_count(), 1);
    assert_eq!(h.log.resolves(), 2);
    assert_eq!(h.controller.state(), LifecycleState::ResolvingDns);
    assert_ne!(h.log.last_watchdog(), first_attempt);
}

#[test]
fn stale_watchdogs_never_exhaust_early() {
    let config = hostname_config().with_dns(dns(3));
    let mut h = Harness::new(config);
    h.resolve();

    for attempt in 1..3u16 {
        let watchdog = h.log.last_watchdog();
        h.event(Event::DnsAnswer(None));
        h.event(Event::TimerFired(watchdog));
        assert_eq!(h.controller.dns_retry_count(), attempt);
        assert_eq!(h.controller.state(), LifecycleState::ResolvingDns);
    }
    assert!(h.observed.resolved().is_empty());

    h.event(Event::DnsAnswer(None));
    assert_eq!(h.controller.state(), LifecycleState::Error);
    assert_eq!(h.controller.dns_retry_count(), 3);
    assert_eq!(h.log.resolves(), 3);
    assert_eq!(h.observed.resolved(), vec![None]);
}

#[test]
fn resolution_refused_while_acquiring() {
    let mut h = Harness::started(literal_config());
    let conn = h.log.last_connection();
    h.event(Event::Connected(conn));

    let err = h.controller.resolve_host_name(|_| {}).unwrap_err();
    assert!(matches!(err, Error::AlreadyRunning));

    // the open cycle is unaffected
    h.event(Event::Sent(conn));
    h.receive(conn, REPLY);
    assert_eq!(h.log.arms(TimerId::ReplyTimeout), 1);
    assert_eq!(h.log.disconnects(), 1);
    let outcomes = h.observed.outcomes();
    assert!(matches!(outcomes.as_slice(), [Outcome::Complete(_)]));
    assert_eq!(h.controller.state(), LifecycleState::ReplyReceived);

    // still refused until the connection is gone and acquisition stopped
    h.controller.stop_data_acquisition();
    assert!(h.controller.resolve_host_name(|_| {}).is_err());
    h.event(Event::Disconnected(conn));
    assert!(h.controller.resolve_host_name(|_| {}).is_ok());
}

#[test]
fn late_answer_after_exhaustion_is_ignored() {
    let config = hostname_config().with_dns(dns(1));
    let mut h = Harness::new(config);
    h.resolve();

    h.expire_watchdog();
    h.event(Event::DnsAnswer(Some(ANSWER)));

    assert_eq!(h.controller.state(), LifecycleState::Error);
    assert_eq!(h.controller.resolved_address(), None);
    assert_eq!(h.observed.resolved(), vec![None]);
}

#[test]
fn start_before_resolution_is_refused() {
    let mut h = Harness::new(hostname_config());

    let err = h.controller.start_data_acquisition().unwrap_err();
    assert!(matches!(err, Error::NotResolved));
    assert_eq!(h.log.connects(), 0);
    assert_eq!(h.log.arms(TimerId::Acquisition), 0);
}

#[test]
fn exhausted_lookup_falls_back_to_literal_address() {
    let endpoint = EndpointConfig::with_hostname("sensor.example.com", 80, "/data", 10_000)
        .with_fallback_address("10.1.2.3");
    let config = AcquisitionConfig::new(endpoint).with_dns(dns(1)).with_auto_start(true);
    let mut h = Harness::new(config);
    h.resolve();

    h.expire_watchdog();

    assert_eq!(h.observed.resolved(), vec![None]);
    assert_eq!(h.controller.resolved_address(), Some(Ipv4Addr::new(10, 1, 2, 3)));
    assert!(h.controller.is_acquiring());
    assert_eq!(h.log.connects(), 1);
}

#[test]
fn literal_address_can_be_supplied_after_failure() {
    let config = hostname_config().with_dns(dns(1));
    let mut h = Harness::new(config);
    h.resolve();
    h.expire_watchdog();
    assert_eq!(h.controller.state(), LifecycleState::Error);

    h.controller.use_literal_address(Ipv4Addr::new(10, 9, 8, 7));

    assert_eq!(h.controller.state(), LifecycleState::DnsResolved);
    assert!(h.controller.start_data_acquisition().is_ok());
    assert_eq!(h.log.connects(), 1);
}

#[test]
fn auto_start_connects_on_answer() {
    let config = hostname_config().with_auto_start(true);
    let mut h = Harness::new(config);
    h.resolve();
    assert_eq!(h.log.connects(), 0);

    h.event(Event::DnsAnswer(Some(ANSWER)));

    assert!(h.controller.is_acquiring());
    assert_eq!(h.log.connects(), 1);
    assert_eq!(h.controller.state(), LifecycleState::Connecting);
}

#[test]
fn reresolving_resets_retry_count() {
    let mut h = Harness::new(hostname_config());
    h.resolve();
    h.expire_watchdog();
    h.expire_watchdog();
    assert_eq!(h.controller.dns_retry_count(), 2);

    h.resolve();
    assert_eq!(h.controller.dns_retry_count(), 0);
    assert_eq!(h.controller.state(), LifecycleState::ResolvingDns);
}
