/*!
 * Action Scheduler
 *
 * Single-threaded cooperative scheduler: fires every actor once per round
 * and parks on the network wake-up signal when a round moved nothing.
 */

use super::port::TokenFifo;
use super::wake::WakeSignal;
use crate::core::config::TeleportConfig;
use crate::core::limits::IDLE_POLL_INTERVAL;
use crate::teleport::{Direction, Endpoint, EndpointClass, EndpointContext, PortBinding};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Index of an actor inside its scheduler
pub type ActorId = usize;

struct ScheduledActor {
    endpoint: Endpoint,
    port: TokenFifo,
}

/// Cooperative scheduler for teleport endpoints
pub struct ActionScheduler {
    actors: Vec<ScheduledActor>,
    wake: Arc<WakeSignal>,
    config: TeleportConfig,
}

impl Default for ActionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionScheduler {
    pub fn new() -> Self {
        Self::with_config(TeleportConfig::default())
    }

    /// Scheduler whose endpoints are built with `config`
    pub fn with_config(config: TeleportConfig) -> Self {
        Self {
            actors: Vec::new(),
            wake: Arc::new(WakeSignal::new()),
            config,
        }
    }

    /// Signal network threads use to wake this scheduler
    ///
    /// Drivers feeding ports from other threads can `notify()` it too.
    pub fn wake_signal(&self) -> Arc<WakeSignal> {
        Arc::clone(&self.wake)
    }

    /// Instantiate `class` and bind it to `port`
    pub fn spawn(
        &mut self,
        class: &Arc<EndpointClass>,
        instance_name: impl Into<String>,
        port: TokenFifo,
    ) -> ActorId {
        assert_eq!(
            port.token_size(),
            class.token_size(),
            "port token size does not match class {}",
            class.name()
        );
        let ctx = EndpointContext::new(self.wake.clone()).with_config(self.config.clone());
        let endpoint = class.instantiate(instance_name, ctx);
        debug!(instance = %endpoint.instance_name(), class = %class.name(), "Actor spawned");

        self.actors.push(ScheduledActor { endpoint, port });
        self.actors.len() - 1
    }

    pub fn endpoint(&self, id: ActorId) -> &Endpoint {
        &self.actors[id].endpoint
    }

    /// The port bound to actor `id`
    pub fn port(&self, id: ActorId) -> &TokenFifo {
        &self.actors[id].port
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Fire every actor once; returns how many tokens moved
    pub fn run_once(&mut self) -> usize {
        let mut transfers = 0;
        for actor in &mut self.actors {
            let binding = match actor.endpoint.direction() {
                Direction::Receiver => PortBinding::Output(&mut actor.port),
                Direction::Sender => PortBinding::Input(&mut actor.port),
            };
            if actor.endpoint.fire(binding).is_transferred() {
                transfers += 1;
            }
        }
        transfers
    }

    /// Keep firing until `done` holds or `timeout` elapses
    ///
    /// Idle rounds park on the wake signal (at most [`IDLE_POLL_INTERVAL`]
    /// at a time). Returns whether `done` was satisfied.
    pub fn run_until<F>(&mut self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut(&Self) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let seen = self.wake.generation();
            let transfers = self.run_once();
            if done(self) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if transfers == 0 {
                self.wake
                    .wait_for(seen, IDLE_POLL_INTERVAL.min(deadline - now));
            }
        }
    }

    /// Tear the network down, newest actor first
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        while let Some(actor) = self.actors.pop() {
            debug!(instance = %actor.endpoint.instance_name(), "Destroying actor");
            drop(actor);
        }
    }
}

impl Drop for ActionScheduler {
    fn drop(&mut self) {
        self.teardown();
    }
}
