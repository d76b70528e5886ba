//! Simulated platform shared by the integration tests.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::rc::Rc;

use embassy_futures::yield_now;
use embassy_time::Duration;
use link_envoy::config::StaticIp;
use link_envoy::platform::{
    EchoConfig, EchoDriver, EchoReport, EchoSink, EventChannel, EventKind, InterfaceMode,
    MAX_RESOLVED_ADDRESSES, NetStack, PlatformError, ProbeSample, RadioConfig, TimerService,
    WifiDriver,
};

// ============================================================================
// Shared call log
// ============================================================================

/// One call into the simulated radio, event channel or timer, in program order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformCall {
    Driver(DriverCall),
    Register(EventKind),
    Unregister(EventKind),
    Arm(Duration),
    Cancel,
}

/// Call log shared by the mocks that [`platform`] hands out.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<PlatformCall>>>);

impl Journal {
    fn record(&self, call: PlatformCall) {
        self.0.borrow_mut().push(call);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Entries recorded at or after position `mark`.
    pub fn since(&self, mark: usize) -> Vec<PlatformCall> {
        self.0.borrow().get(mark..).unwrap_or_default().to_vec()
    }
}

/// A radio, event channel and timer writing into one [`Journal`].
pub fn platform() -> (MockDriver, MockEvents, MockTimer) {
    let journal = Journal::default();
    (
        MockDriver {
            journal: journal.clone(),
            ..MockDriver::default()
        },
        MockEvents {
            journal: journal.clone(),
            ..MockEvents::default()
        },
        MockTimer {
            journal,
            ..MockTimer::default()
        },
    )
}

// ============================================================================
// Radio driver
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverCall {
    Init(InterfaceMode),
    SetStaticIp(InterfaceMode, StaticIp),
    Configure(RadioConfig),
    Start,
    Connect,
    Stop,
    Deinit,
}

#[derive(Default)]
pub struct MockDriver {
    pub calls: RefCell<Vec<DriverCall>>,
    pub fail_init: Cell<Option<PlatformError>>,
    pub fail_start: Cell<Option<PlatformError>>,
    pub journal: Journal,
    initialized: Cell<bool>,
}

impl MockDriver {
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.borrow().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.count(&DriverCall::Connect)
    }

    pub fn count(&self, call: &DriverCall) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }

    pub fn configured(&self) -> Option<RadioConfig> {
        self.calls.borrow().iter().find_map(|call| match call {
            DriverCall::Configure(config) => Some(config.clone()),
            _ => None,
        })
    }

    fn record(&self, call: DriverCall) {
        self.journal.record(PlatformCall::Driver(call.clone()));
        self.calls.borrow_mut().push(call);
    }
}

impl WifiDriver for MockDriver {
    fn init(&self, mode: InterfaceMode) -> Result<(), PlatformError> {
        self.record(DriverCall::Init(mode));
        if let Some(err) = self.fail_init.get() {
            return Err(err);
        }
        self.initialized.set(true);
        Ok(())
    }

    fn set_static_ip(
        &self,
        mode: InterfaceMode,
        static_ip: &StaticIp,
    ) -> Result<(), PlatformError> {
        self.record(DriverCall::SetStaticIp(mode, *static_ip));
        Ok(())
    }

    fn configure(&self, config: &RadioConfig) -> Result<(), PlatformError> {
        self.record(DriverCall::Configure(config.clone()));
        Ok(())
    }

    fn start(&self) -> Result<(), PlatformError> {
        self.record(DriverCall::Start);
        match self.fail_start.get() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn connect(&self) -> Result<(), PlatformError> {
        self.record(DriverCall::Connect);
        Ok(())
    }

    fn stop(&self) -> Result<(), PlatformError> {
        self.record(DriverCall::Stop);
        if self.initialized.get() {
            Ok(())
        } else {
            Err(PlatformError::NotInitialized)
        }
    }

    fn deinit(&self) -> Result<(), PlatformError> {
        self.record(DriverCall::Deinit);
        self.initialized.set(false);
        Ok(())
    }
}

// ============================================================================
// Event channel
// ============================================================================

#[derive(Default)]
pub struct MockEvents {
    pub registered: RefCell<Vec<EventKind>>,
    pub unregister_calls: Cell<usize>,
    pub fail_register: Cell<Option<EventKind>>,
    pub journal: Journal,
}

impl MockEvents {
    pub fn registered(&self) -> Vec<EventKind> {
        self.registered.borrow().clone()
    }
}

impl EventChannel for MockEvents {
    fn register(&self, kind: EventKind) -> Result<(), PlatformError> {
        if self.fail_register.get() == Some(kind) {
            return Err(PlatformError::EventRegistration);
        }
        self.journal.record(PlatformCall::Register(kind));
        self.registered.borrow_mut().push(kind);
        Ok(())
    }

    fn unregister(&self, kind: EventKind) -> Result<(), PlatformError> {
        self.journal.record(PlatformCall::Unregister(kind));
        self.unregister_calls.set(self.unregister_calls.get() + 1);
        self.registered.borrow_mut().retain(|registered| *registered != kind);
        Ok(())
    }
}

// ============================================================================
// Timer
// ============================================================================

#[derive(Default)]
pub struct MockTimer {
    pub armed: RefCell<Vec<Duration>>,
    pub cancels: Cell<usize>,
    pub pending: Cell<Option<Duration>>,
    pub journal: Journal,
}

impl TimerService for MockTimer {
    fn arm(&self, delay: Duration) {
        self.journal.record(PlatformCall::Arm(delay));
        self.armed.borrow_mut().push(delay);
        self.pending.set(Some(delay));
    }

    fn cancel(&self) {
        self.journal.record(PlatformCall::Cancel);
        self.cancels.set(self.cancels.get() + 1);
        self.pending.set(None);
    }
}

// ============================================================================
// Network stack
// ============================================================================

#[derive(Default)]
pub struct MockNet {
    pub gateway: Option<Ipv4Addr>,
    pub answers: Vec<IpAddr>,
    pub lookups: RefCell<Vec<String>>,
    pub udp_replies: RefCell<VecDeque<Result<Vec<u8>, PlatformError>>>,
    pub exchanges: RefCell<Vec<(IpAddr, u16, Vec<u8>)>>,
}

impl MockNet {
    pub fn with_gateway(gateway: Ipv4Addr) -> Self {
        Self {
            gateway: Some(gateway),
            ..Self::default()
        }
    }

    pub fn with_answers(answers: &[IpAddr]) -> Self {
        Self {
            answers: answers.to_vec(),
            ..Self::default()
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }
}

impl NetStack for MockNet {
    async fn resolve(
        &self,
        host: &str,
    ) -> Result<heapless::Vec<IpAddr, MAX_RESOLVED_ADDRESSES>, PlatformError> {
        self.lookups.borrow_mut().push(host.to_owned());
        if self.answers.is_empty() {
            return Err(PlatformError::Lookup);
        }
        let mut found = heapless::Vec::new();
        for answer in self.answers.iter().take(MAX_RESOLVED_ADDRESSES) {
            let _ = found.push(*answer);
        }
        Ok(found)
    }

    fn default_gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    async fn udp_exchange(
        &self,
        server: IpAddr,
        port: u16,
        request: &[u8],
        response: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, PlatformError> {
        self.exchanges
            .borrow_mut()
            .push((server, port, request.to_vec()));
        let reply = self
            .udp_replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(PlatformError::Timeout))?;
        let len = reply.len().min(response.len());
        response[..len].copy_from_slice(&reply[..len]);
        Ok(len)
    }
}

// ============================================================================
// Echo service
// ============================================================================

#[derive(Clone, Copy, Debug)]
pub enum EchoStep {
    Reply { ttl: u8, rtt_ms: u64 },
    Timeout,
    End {
        transmitted: u32,
        received: u32,
        duration_ms: u64,
    },
}

#[derive(Default)]
pub struct MockEcho {
    pub steps: Vec<EchoStep>,
    pub fail: Option<PlatformError>,
    pub sessions: RefCell<Vec<EchoConfig>>,
}

impl MockEcho {
    pub fn new(steps: &[EchoStep]) -> Self {
        Self {
            steps: steps.to_vec(),
            ..Self::default()
        }
    }

    pub fn sessions(&self) -> Vec<EchoConfig> {
        self.sessions.borrow().clone()
    }
}

impl EchoDriver for MockEcho {
    async fn run_session(
        &self,
        config: &EchoConfig,
        sink: &dyn EchoSink,
    ) -> Result<(), PlatformError> {
        if let Some(err) = self.fail {
            return Err(err);
        }
        self.sessions.borrow_mut().push(*config);

        let mut sequence = 0u16;
        for step in &self.steps {
            match *step {
                EchoStep::Reply { ttl, rtt_ms } => {
                    sequence += 1;
                    sink.on_reply(ProbeSample {
                        sequence,
                        round_trip: Some(Duration::from_millis(rtt_ms)),
                        ttl: Some(ttl),
                        source: config.target,
                        size: config.payload_size,
                    });
                }
                EchoStep::Timeout => {
                    sequence += 1;
                    sink.on_timeout(ProbeSample {
                        sequence,
                        round_trip: None,
                        ttl: None,
                        source: config.target,
                        size: 0,
                    });
                }
                EchoStep::End {
                    transmitted,
                    received,
                    duration_ms,
                } => sink.on_end(EchoReport {
                    transmitted,
                    received,
                    duration: Duration::from_millis(duration_ms),
                }),
            }
            // Give the waiting side a chance to observe each callback.
            yield_now().await;
        }
        Ok(())
    }
}
