//! A connected station: one shared transport and the services built on it.

use crate::config::{StationConfig, StationIdentity};
use gn_02_transport::{ConnectError, QueryExecutor, Transport};
use gn_04_capacity::{CapacityService, SessionService};
use std::sync::Arc;
use tracing::info;

pub struct Station {
    identity: StationIdentity,
    transport: Transport,
    capacity: CapacityService,
    sessions: SessionService,
}

impl Station {
    pub async fn connect(config: &StationConfig) -> Result<Self, ConnectError> {
        let transport = Transport::connect(&config.server, config.transport.clone()).await?;
        info!(
            station = %config.station.name,
            server = %config.server.address(),
            "Station connected"
        );
        Ok(Self::from_transport(transport, config))
    }

    pub fn from_transport(transport: Transport, config: &StationConfig) -> Self {
        let executor: Arc<dyn QueryExecutor> = Arc::new(transport.clone());
        Self {
            identity: config.station.clone(),
            capacity: CapacityService::new(executor.clone(), config.guard.clone()),
            sessions: SessionService::new(executor),
            transport,
        }
    }

    pub fn identity(&self) -> &StationIdentity {
        &self.identity
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn capacity(&self) -> &CapacityService {
        &self.capacity
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    /// Send DISCONNECT and cancel anything still in flight.
    pub async fn shutdown(self) {
        let stats = self.transport.stats();
        self.transport.disconnect().await;
        info!(
            station = %self.identity.name,
            completed = stats.completed,
            timeouts = stats.timeouts,
            "Station disconnected"
        );
    }
}
