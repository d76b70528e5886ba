//! Bounded-count reachability probe (ping) with aggregated statistics.
//!
//! [`EchoProbe::run`] resolves the target, hands an [`EchoConfig`] to the platform's
//! [`EchoDriver`] and waits until the session reports its end (or, with
//! [`ProbeConfig::abort_on_timeout`], the first timeout). The platform reports each reply,
//! timeout and the end of the run to a [`ProbeSession`], which keeps the counters.

use core::net::IpAddr;

use embassy_futures::select::{Either, select};
use embassy_time::Duration;
use portable_atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::config::{ConfigError, ProbeConfig};
use crate::platform::{
    EchoConfig, EchoDriver, EchoReport, EchoSink, NetStack, ProbeSample, preferred_address,
};
use crate::sync_gate::{Outcome, OutcomeSet, SyncGate};
use crate::{Error, Result};

/// Loss percentage for `transmitted` requests and `received` replies, truncated.
///
/// Nothing transmitted counts as total loss. `received` above `transmitted` counts as no
/// loss.
#[must_use]
pub fn loss_percent(transmitted: u32, received: u32) -> u32 {
    let lost = u64::from(transmitted.saturating_sub(received));
    lost.saturating_mul(100)
        .checked_div(u64::from(transmitted))
        .map_or(100, |percent| u32::try_from(percent).unwrap_or(100))
}

/// Outcome bits a probe run waits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub enum ProbeOutcome {
    /// A request timed out.
    Timeout,
    /// The platform reported the end of the run.
    End,
}

impl Outcome for ProbeOutcome {
    fn bit(self) -> u32 {
        match self {
            Self::Timeout => 1 << 0,
            Self::End => 1 << 1,
        }
    }
}

/// Result of a completed probe run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(log_defmt, derive(defmt::Format))]
pub struct ProbeStats {
    /// Address that was probed.
    pub target: IpAddr,
    /// Requests sent.
    pub transmitted: u32,
    /// Replies received.
    pub received: u32,
    /// Truncated loss percentage.
    pub loss_percent: u32,
    /// Total session time as reported by the platform.
    pub duration: Duration,
    /// Fastest reply, if any.
    pub rtt_min: Option<Duration>,
    /// Mean reply time, if any.
    pub rtt_avg: Option<Duration>,
    /// Slowest reply, if any.
    pub rtt_max: Option<Duration>,
}

// ============================================================================
// Session
// ============================================================================

/// Per-run bookkeeping fed by the platform's echo callbacks.
///
/// Samples beyond the requested count, and anything after the end report, are ignored.
pub struct ProbeSession {
    target: IpAddr,
    requested: u32,
    transmitted: AtomicU32,
    received: AtomicU32,
    elapsed_ms: AtomicU64,
    rtt_total_us: AtomicU64,
    rtt_min_us: AtomicU64,
    rtt_max_us: AtomicU64,
    terminated: AtomicBool,
    gate: SyncGate<ProbeOutcome>,
}

impl ProbeSession {
    /// A fresh session for `requested` echo requests to `target`.
    #[must_use]
    pub const fn new(target: IpAddr, requested: u32) -> Self {
        Self {
            target,
            requested,
            transmitted: AtomicU32::new(0),
            received: AtomicU32::new(0),
            elapsed_ms: AtomicU64::new(0),
            rtt_total_us: AtomicU64::new(0),
            rtt_min_us: AtomicU64::new(u64::MAX),
            rtt_max_us: AtomicU64::new(0),
            terminated: AtomicBool::new(false),
            gate: SyncGate::new(),
        }
    }

    /// Whether the end report has been seen.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Wait for the run to finish. With `abort_on_timeout`, a timeout also finishes it.
    pub async fn wait(&self, abort_on_timeout: bool) -> OutcomeSet<ProbeOutcome> {
        let interest = if abort_on_timeout {
            OutcomeSet::of(&[ProbeOutcome::Timeout, ProbeOutcome::End])
        } else {
            OutcomeSet::of(&[ProbeOutcome::End])
        };
        self.gate.wait(interest, true).await
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> ProbeStats {
        let transmitted = self.transmitted.load(Ordering::Acquire);
        let received = self.received.load(Ordering::Acquire);
        let (rtt_min, rtt_avg, rtt_max) = if received == 0 {
            (None, None, None)
        } else {
            let total = self.rtt_total_us.load(Ordering::Acquire);
            (
                Some(Duration::from_micros(self.rtt_min_us.load(Ordering::Acquire))),
                total
                    .checked_div(u64::from(received))
                    .map(Duration::from_micros),
                Some(Duration::from_micros(self.rtt_max_us.load(Ordering::Acquire))),
            )
        };
        ProbeStats {
            target: self.target,
            transmitted,
            received,
            loss_percent: loss_percent(transmitted, received),
            duration: Duration::from_millis(self.elapsed_ms.load(Ordering::Acquire)),
            rtt_min,
            rtt_avg,
            rtt_max,
        }
    }

    /// Claim one of the requested slots, or `false` if the run is over or full.
    fn admit(&self) -> bool {
        if self.is_terminated() {
            return false;
        }
        self.transmitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |sent| {
                (sent < self.requested).then(|| sent.saturating_add(1))
            })
            .is_ok()
    }
}

impl EchoSink for ProbeSession {
    fn on_reply(&self, sample: ProbeSample) {
        if !self.admit() {
            debug!("Probe: extra reply seq={} ignored", sample.sequence);
            return;
        }
        self.received.fetch_add(1, Ordering::AcqRel);

        let rtt_us = sample.round_trip.map_or(0, |rtt| rtt.as_micros());
        self.rtt_total_us.fetch_add(rtt_us, Ordering::AcqRel);
        self.rtt_min_us.fetch_min(rtt_us, Ordering::AcqRel);
        self.rtt_max_us.fetch_max(rtt_us, Ordering::AcqRel);

        info!(
            "Probe: {} bytes from {} icmp_seq={} ttl={} time={} ms",
            sample.size,
            sample.source,
            sample.sequence,
            sample.ttl.unwrap_or(0),
            rtt_us / 1000
        );
    }

    fn on_timeout(&self, sample: ProbeSample) {
        if !self.admit() {
            debug!("Probe: extra timeout seq={} ignored", sample.sequence);
            return;
        }
        warn!(
            "Probe: from {} icmp_seq={} timeout",
            sample.source, sample.sequence
        );
        self.gate.signal(ProbeOutcome::Timeout);
    }

    fn on_end(&self, report: EchoReport) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }

        let transmitted = report.transmitted.min(self.requested);
        let received = report.received.min(transmitted);
        self.transmitted.store(transmitted, Ordering::Release);
        self.received.store(received, Ordering::Release);
        self.elapsed_ms
            .store(report.duration.as_millis(), Ordering::Release);

        info!(
            "Probe: {} packets transmitted, {} received, {}% packet loss, time {} ms",
            transmitted,
            received,
            loss_percent(transmitted, received),
            report.duration.as_millis()
        );
        self.gate.signal(ProbeOutcome::End);
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Runs probe sessions over a network stack and an echo service.
pub struct EchoProbe<N, E> {
    net: N,
    echo: E,
}

impl<N: NetStack, E: EchoDriver> EchoProbe<N, E> {
    /// A runner over the given collaborators.
    #[must_use]
    pub const fn new(net: N, echo: E) -> Self {
        Self { net, echo }
    }

    /// Probe `target` (a host name, a literal address, or empty for the default gateway).
    ///
    /// # Errors
    ///
    /// * [`Error::Configuration`] for a zero request count;
    /// * [`Error::Resolution`] if the target cannot be turned into an address (no session is
    ///   created);
    /// * [`Error::PlatformSetup`] if the platform cannot run the session;
    /// * [`Error::ProbeIncomplete`] if the run woke on a timeout instead of its end report.
    pub async fn run(&self, target: &str, config: &ProbeConfig) -> Result<ProbeStats> {
        if config.count == 0 {
            return Err(ConfigError::ZeroProbeCount.into());
        }

        let address = resolve_target(&self.net, target).await?;
        info!(
            "Probe: {} requests to {} every {} ms",
            config.count,
            address,
            config.interval.as_millis()
        );

        let echo_config = EchoConfig {
            target: address,
            count: config.count,
            interval: config.interval,
            timeout: config.timeout,
            payload_size: config.payload_size,
            priority: config.priority,
        };
        let session = ProbeSession::new(address, config.count);

        let seen = match select(
            self.echo.run_session(&echo_config, &session),
            session.wait(config.abort_on_timeout),
        )
        .await
        {
            Either::First(Ok(())) => {
                // The driver finished; its end report (if any) is already in the gate.
                session.gate.peek()
            }
            Either::First(Err(err)) => {
                error!("Probe: session failed: {}", err);
                return Err(Error::PlatformSetup(err));
            }
            Either::Second(seen) => seen,
        };

        if seen.contains(ProbeOutcome::End) {
            Ok(session.stats())
        } else {
            warn!("Probe: run to {} did not complete", address);
            Err(Error::ProbeIncomplete)
        }
    }
}

/// Turn a probe target into an address.
///
/// Empty means the default gateway; a literal address is used as-is; anything else is looked
/// up, preferring IPv4.
///
/// # Errors
///
/// [`Error::Resolution`] when there is no gateway, the lookup fails, or it returns nothing.
pub async fn resolve_target<N: NetStack>(net: &N, target: &str) -> Result<IpAddr> {
    if target.is_empty() {
        return net.default_gateway().map(IpAddr::V4).ok_or_else(|| {
            warn!("Probe: no default gateway");
            Error::Resolution
        });
    }

    if let Ok(address) = target.parse::<IpAddr>() {
        return Ok(address);
    }

    let addresses = net.resolve(target).await.map_err(|err| {
        warn!("Probe: lookup of {} failed: {}", target, err);
        Error::Resolution
    })?;

    preferred_address(&addresses).ok_or_else(|| {
        warn!("Probe: {} has no address", target);
        Error::Resolution
    })
}
