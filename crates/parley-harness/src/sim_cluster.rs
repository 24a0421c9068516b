//! Simulated cluster of messengers around one relay server.
//!
//! `SimCluster` plays the driver role for every messenger: it executes their
//! [`ClientAction`]s against the in-process [`SimServer`], and feeds routed
//! frames back in as wire text so the codec is exercised on every hop. All
//! messengers share one [`SimEnv`], so time moves for everyone at once.

use std::time::Duration;

use parley_client::{ClientAction, ClientConfig, Messenger, Participant};
use parley_core::env::Environment;
use parley_proto::Frame;
use tracing::{trace, warn};

use crate::{
    EventRecorder, SimEnv,
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot},
    sim_server::{Outbound, SessionId, SimServer},
};

/// Upper bound on action rounds per [`SimCluster::pump`].
const MAX_PUMP_ROUNDS: usize = 1_000;

/// One simulated client.
pub struct SimClient {
    /// The messenger under test.
    pub messenger: Messenger<SimEnv>,
    /// Every event the messenger emitted.
    pub recorder: EventRecorder,
    /// Frames the messenger put on the wire.
    pub sent: Vec<Frame>,
}

/// Messengers, a relay server, and a shared virtual clock.
pub struct SimCluster {
    env: SimEnv,
    config: ClientConfig,
    server: SimServer,
    clients: Vec<SimClient>,
    reachable: bool,
    invariants: Option<InvariantRegistry>,
}

impl SimCluster {
    /// Empty cluster with default client configuration.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, ClientConfig::default())
    }

    /// Empty cluster whose clients use `config`.
    pub fn with_config(seed: u64, config: ClientConfig) -> Self {
        Self {
            env: SimEnv::with_seed(seed),
            config,
            server: SimServer::new(),
            clients: Vec::new(),
            reachable: true,
            invariants: None,
        }
    }

    /// Check invariants after every pump.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Add a client acting as `identity` and let it connect.
    pub fn add_client(&mut self, identity: Participant) -> SessionId {
        let session = self.clients.len();
        self.server.register(session, identity.user_id.clone());

        let recorder = EventRecorder::new();
        let mut messenger = Messenger::new(self.env.clone(), self.config.clone(), identity);
        messenger.set_event_handlers(recorder.handlers());

        self.clients.push(SimClient { messenger, recorder, sent: Vec::new() });
        self.pump();
        session
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Relay server.
    pub fn server(&self) -> &SimServer {
        &self.server
    }

    /// Client by session.
    pub fn client(&self, session: SessionId) -> &SimClient {
        &self.clients[session]
    }

    /// Messenger by session.
    pub fn messenger(&self, session: SessionId) -> &Messenger<SimEnv> {
        &self.clients[session].messenger
    }

    /// Event recorder by session.
    pub fn recorder(&self, session: SessionId) -> &EventRecorder {
        &self.clients[session].recorder
    }

    /// Drain the frames a client sent.
    pub fn take_sent(&mut self, session: SessionId) -> Vec<Frame> {
        std::mem::take(&mut self.clients[session].sent)
    }

    /// Run `f` against a messenger, then deliver whatever it produced.
    pub fn with<R>(&mut self, session: SessionId, f: impl FnOnce(&mut Messenger<SimEnv>) -> R) -> R {
        let result = f(&mut self.clients[session].messenger);
        self.pump();
        result
    }

    /// Make the server reachable or not. Connect attempts fail while it is
    /// unreachable; open sessions are unaffected.
    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    /// Drop a client's socket as if the network failed.
    pub fn drop_connection(&mut self, session: SessionId, reason: &str) {
        let out = self.server.disconnect(session, self.env.wall_clock_millis());
        self.deliver(out);
        self.clients[session].messenger.handle_closed(reason);
        self.pump();
    }

    /// Advance virtual time and tick every messenger.
    pub fn advance(&mut self, duration: Duration) {
        self.env.advance(duration);
        for client in &mut self.clients {
            client.messenger.tick();
        }
        self.pump();
    }

    /// Advance virtual time in `step` increments until `total` has passed.
    pub fn run_for(&mut self, total: Duration, step: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            let step = step.min(total - elapsed);
            self.advance(step);
            elapsed += step;
        }
    }

    /// Execute queued actions until every messenger is quiet.
    pub fn pump(&mut self) {
        for _ in 0..MAX_PUMP_ROUNDS {
            let mut progressed = false;
            for session in 0..self.clients.len() {
                let actions = self.clients[session].messenger.take_actions();
                progressed |= !actions.is_empty();
                for action in actions {
                    self.execute(session, action);
                }
            }
            if !progressed {
                self.check_invariants("after pump");
                return;
            }
        }
        warn!(rounds = MAX_PUMP_ROUNDS, "cluster did not settle");
    }

    /// Capture every client's observable state.
    pub fn snapshot(&self) -> SystemSnapshot {
        let mut snapshot = SystemSnapshot::empty();
        for (id, client) in self.clients.iter().enumerate() {
            snapshot.add_client(ClientSnapshot::capture(id, &client.messenger));
        }
        snapshot
    }

    /// Assert the registered invariants, if any.
    pub fn check_invariants(&self, context: &str) {
        if let Some(registry) = &self.invariants {
            registry.assert_all(&self.snapshot(), context);
        }
    }

    fn execute(&mut self, session: SessionId, action: ClientAction) {
        match action {
            ClientAction::Connect => {
                if self.reachable {
                    let out = self.server.connect(session);
                    self.clients[session].messenger.handle_opened();
                    self.deliver(out);
                } else {
                    self.clients[session].messenger.handle_connect_failed("server unreachable");
                }
            },
            ClientAction::Send(frame) => {
                self.clients[session].sent.push(frame.clone());
                let Some(frame) = roundtrip(&frame) else {
                    return;
                };
                let out = self.server.route(session, &frame);
                self.deliver(out);
            },
            ClientAction::Disconnect { .. } => {
                let out = self.server.disconnect(session, self.env.wall_clock_millis());
                self.deliver(out);
            },
        }
    }

    fn deliver(&mut self, out: Vec<Outbound>) {
        for Outbound { to, frame } in out {
            trace!(to, frame_type = %frame.frame_type(), "delivering");
            match frame.encode() {
                Ok(text) => self.clients[to].messenger.handle_text(&text),
                Err(e) => warn!(error = %e, "failed to encode routed frame"),
            }
        }
    }
}

/// Encode and decode a frame as the wire would.
fn roundtrip(frame: &Frame) -> Option<Frame> {
    let decoded = frame.encode().and_then(|text| Frame::decode(&text));
    match decoded {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "frame did not survive the wire");
            None
        },
    }
}
