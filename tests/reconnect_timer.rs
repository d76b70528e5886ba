#![allow(missing_docs)]
//! Embassy-time reconnect timer, alone and driving a station.

mod common;

use std::cell::Cell;
use std::net::Ipv4Addr;

use common::{MockDriver, MockEvents};
use embassy_futures::block_on;
use embassy_futures::join::join;
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Timer};
use link_envoy::config::RetryPolicy;
use link_envoy::platform::TimerService;
use link_envoy::station::{LinkStatus, ReconnectTimer, Station, StationEvent};
use link_envoy::Error;

/// Poll `timer.run` for `window`, counting expiries.
fn fires_within(timer: &ReconnectTimer, window: Duration) -> usize {
    let fired = Cell::new(0);
    let outcome = block_on(select(
        timer.run(|| fired.set(fired.get() + 1)),
        Timer::after(window),
    ));
    assert!(matches!(outcome, Either::Second(())));
    fired.get()
}

#[test]
fn fires_once_after_delay() {
    let timer = ReconnectTimer::new();
    timer.arm(Duration::from_millis(10));
    assert!(timer.is_pending());

    assert_eq!(fires_within(&timer, Duration::from_millis(100)), 1);
    assert!(!timer.is_pending());
}

#[test]
fn cancel_before_expiry_suppresses_fire() {
    let timer = ReconnectTimer::new();
    timer.arm(Duration::from_millis(10));
    timer.cancel();
    assert!(!timer.is_pending());

    assert_eq!(fires_within(&timer, Duration::from_millis(60)), 0);
}

#[test]
fn rearm_replaces_outstanding_delay() {
    let timer = ReconnectTimer::new();
    timer.arm(Duration::from_secs(60));
    timer.arm(Duration::from_millis(10));

    assert_eq!(fires_within(&timer, Duration::from_millis(100)), 1);
}

#[test]
fn rearm_while_counting_down_fires_only_the_new_delay() {
    let timer = ReconnectTimer::new();
    timer.arm(Duration::from_millis(10));
    let fired = Cell::new(0);

    let (outcome, ()) = block_on(join(
        select(
            timer.run(|| fired.set(fired.get() + 1)),
            Timer::after(Duration::from_millis(100)),
        ),
        async {
            Timer::after(Duration::from_millis(5)).await;
            timer.arm(Duration::from_millis(40));
            Timer::after(Duration::from_millis(15)).await;
            // The first delay has elapsed, the replacement has not.
            assert_eq!(fired.get(), 0);
            assert!(timer.is_pending());
        },
    ));

    assert!(matches!(outcome, Either::Second(())));
    assert_eq!(fired.get(), 1);
    assert!(!timer.is_pending());
}

#[test]
fn arm_from_the_expiry_callback_fires_again() {
    let timer = ReconnectTimer::new();
    timer.arm(Duration::from_millis(10));
    let fired = Cell::new(0);

    let outcome = block_on(select(
        timer.run(|| {
            fired.set(fired.get() + 1);
            if fired.get() == 1 {
                timer.arm(Duration::from_millis(10));
            }
        }),
        Timer::after(Duration::from_millis(100)),
    ));

    assert!(matches!(outcome, Either::Second(())));
    assert_eq!(fired.get(), 2);
    assert!(!timer.is_pending());
}

#[test]
fn idle_timer_never_fires() {
    let timer = ReconnectTimer::new();
    assert_eq!(fires_within(&timer, Duration::from_millis(30)), 0);
}

fn failed_station<'a>(
    driver: &'a MockDriver,
    events: &'a MockEvents,
) -> Station<&'a MockDriver, &'a MockEvents, ReconnectTimer> {
    let station = Station::new(driver, events, ReconnectTimer::new());
    let (result, ()) = block_on(join(
        station.start(
            "net",
            "pw12345",
            None,
            RetryPolicy::new(3, Duration::from_millis(10)),
        ),
        async {
            station.handle_event(StationEvent::Started);
            for _ in 0..4 {
                station.handle_event(StationEvent::Disconnected { reason: 201 });
            }
        },
    ));
    assert_eq!(result, Err(Error::LinkRetriesExhausted));
    assert!(station.timer().is_pending());
    station
}

#[test]
fn station_reconnects_when_timer_fires() {
    let (driver, events) = (MockDriver::default(), MockEvents::default());
    let station = failed_station(&driver, &events);
    let connects = driver.connect_count();

    block_on(select(
        station.run_reconnect_timer(),
        Timer::after(Duration::from_millis(100)),
    ));

    assert_eq!(station.status(), LinkStatus::Connecting);
    assert_eq!(driver.connect_count(), connects + 1);

    station.handle_event(StationEvent::GotIp {
        address: Ipv4Addr::new(10, 0, 0, 7),
    });
    assert_eq!(station.status(), LinkStatus::Connected);
}

#[test]
fn stop_with_pending_timer_prevents_reconnect() {
    let (driver, events) = (MockDriver::default(), MockEvents::default());
    let station = failed_station(&driver, &events);
    let connects = driver.connect_count();

    station.stop();
    assert!(!station.timer().is_pending());

    block_on(select(
        station.run_reconnect_timer(),
        Timer::after(Duration::from_millis(60)),
    ));

    assert_eq!(driver.connect_count(), connects);
    assert_eq!(station.status(), LinkStatus::Off);
}
