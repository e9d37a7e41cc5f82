//! Auto-registration (secondary -> primary)
//!
//! Runs once at startup. Attempts the handshake a fixed number of times,
//! waiting `base`, `2 * base`, `4 * base`, ... between attempts, then gives
//! up without taking the process down. Manual registration stays possible.

use skiff_client::NodeClient;
use skiff_core::backoff::registration_delay;
use skiff_core::dto::node::{RegisterNode, RegistrationState};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Registrar {
    /// Client for the primary, carrying the registration token
    primary: NodeClient,
    request: RegisterNode,
    attempts: u32,
    backoff: Duration,
    state: watch::Sender<RegistrationState>,
}

impl Registrar {
    pub fn new(
        primary: NodeClient,
        request: RegisterNode,
        attempts: u32,
        backoff: Duration,
        state: watch::Sender<RegistrationState>,
    ) -> Self {
        Self {
            primary,
            request,
            attempts,
            backoff,
            state,
        }
    }

    /// Register, retrying with exponential backoff
    ///
    /// Returns `Registered`, `GaveUp` after exactly `attempts` calls, or
    /// `Pending` when interrupted by shutdown.
    pub async fn run(&self, shutdown: &CancellationToken) -> RegistrationState {
        self.state.send_replace(RegistrationState::Pending);

        for attempt in 1..=self.attempts {
            match self.primary.register_node(&self.request).await {
                Ok(node) => {
                    info!(
                        "Registered with primary {} as {} after {} attempt(s)",
                        self.primary.base_url(),
                        node.id,
                        attempt
                    );
                    self.state.send_replace(RegistrationState::Registered);
                    return RegistrationState::Registered;
                }
                Err(e) if attempt < self.attempts => {
                    let delay = registration_delay(self.backoff, attempt);
                    warn!(
                        "Registration attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, self.attempts, e, delay
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.cancelled() => return RegistrationState::Pending,
                    }
                }
                Err(e) => {
                    error!(
                        "Registration failed after {} attempts: {}. Continuing unregistered",
                        self.attempts, e
                    );
                }
            }
        }

        let outcome = RegistrationState::GaveUp {
            attempts: self.attempts,
        };
        self.state.send_replace(outcome);
        outcome
    }
}
