//! Channel connection registry
//!
//! Gateway-backed view of the connection instances a principal holds.
//! Repeated provisioning can leave several instances of the same kind
//! behind, so the registry never assumes uniqueness: it labels the oldest
//! instance as primary and the rest as orphans, and offers cleanup.
//!
//! Disconnects come in two strengths. Soft keeps the stored credentials
//! and only flips the state flag, so the channel can be re-enabled without
//! re-provisioning. Hard deletes the row and requires an explicit
//! confirmation token from the caller.

use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use relay_core::{
    ChannelConnection, ChannelKind, Collection, ConnectionId, ConnectionState, DomainError, Filter,
    Order, PrincipalId, ProviderConfig, ProviderDispatch, ProviderVariant,
};

use crate::records::ConnectionRecord;

/// Role of one connection instance within its channel kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRole {
    /// Oldest instance of its kind; the one the channel routes through
    Primary,
    /// Superseded duplicate, kept visible until cleaned up
    Orphan,
}

/// One connection instance with its computed role
#[derive(Debug, Clone)]
pub struct LabeledConnection {
    pub connection: ChannelConnection,
    pub role: InstanceRole,
}

/// Aggregated view of one channel kind for a principal
#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
    pub state: ConnectionState,
    pub instances: Vec<LabeledConnection>,
}

/// Caller acknowledgement for destructive deletes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardDeleteConfirmation {
    Confirmed,
    Declined,
}

/// Gateway-backed connection registry
pub struct ConnectionRegistry {
    gateway: Arc<dyn relay_core::StoreGateway>,
    dispatch: Arc<dyn ProviderDispatch>,
}

impl ConnectionRegistry {
    /// Create a registry over the given gateway and provider dispatcher
    pub fn new(
        gateway: Arc<dyn relay_core::StoreGateway>,
        dispatch: Arc<dyn ProviderDispatch>,
    ) -> Self {
        Self { gateway, dispatch }
    }

    // =========================================================================
    // Provisioning
    // =========================================================================

    /// Provision a new connection instance in the `Connecting` state.
    /// Existing instances of the same kind are left untouched; the labeling
    /// in `channel_state` surfaces the resulting duplicates.
    #[instrument(skip(self), fields(owner = %owner, variant = %variant))]
    pub async fn provision(
        &self,
        owner: PrincipalId,
        variant: ProviderVariant,
    ) -> Result<ChannelConnection, DomainError> {
        let connection = ChannelConnection::provision(variant, owner);
        self.gateway
            .insert(Collection::Connections, ConnectionRecord::to_row(&connection))
            .await?;
        info!(connection_id = %connection.id, "Connection provisioned");
        Ok(connection)
    }

    /// Apply externally issued credentials to a connection.
    ///
    /// The state flag moves to `Connected` only when the configuration is
    /// complete for its variant; a partial config stays `Connecting`, and
    /// the composite predicate keeps the instance from reporting live.
    #[instrument(skip(self, config), fields(connection_id = %connection_id))]
    pub async fn apply_config(
        &self,
        principal: PrincipalId,
        connection_id: ConnectionId,
        config: ProviderConfig,
    ) -> Result<ChannelConnection, DomainError> {
        let mut connection = self.fetch_owned(principal, connection_id).await?;
        if config.variant() != connection.variant {
            return Err(DomainError::Validation(format!(
                "config shape {} does not match connection variant {}",
                config.variant(),
                connection.variant
            )));
        }

        connection.config = config;
        connection.state = if connection.config.is_complete() {
            ConnectionState::Connected
        } else {
            ConnectionState::Connecting
        };

        self.gateway
            .update(
                Collection::Connections,
                Filter::field("id", json!(connection_id)),
                json!({
                    "config": serde_json::to_value(&connection.config)
                        .unwrap_or(serde_json::Value::Null),
                    "state": connection.state,
                }),
            )
            .await?;
        info!(state = ?connection.state, "Connection config applied");
        Ok(connection)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Aggregated state of one channel kind, with every instance labeled.
    ///
    /// No instances yields `Disconnected` with an empty list. The snapshot
    /// reports `Connected` only if some instance satisfies the composite
    /// predicate; otherwise it reports the primary's effective state, so a
    /// flag-only "connected" row shows up as `Error`, never as live.
    pub async fn channel_state(
        &self,
        principal: PrincipalId,
        kind: ChannelKind,
    ) -> Result<ChannelSnapshot, DomainError> {
        let mut connections = self.instances_of(principal, kind).await?;
        if connections.is_empty() {
            return Ok(ChannelSnapshot {
                state: ConnectionState::Disconnected,
                instances: Vec::new(),
            });
        }

        // Primary is the oldest instance; ties break on id so the labeling
        // is stable across reads
        connections.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_uuid().cmp(&b.id.as_uuid()))
        });

        let state = if connections.iter().any(ChannelConnection::is_connected) {
            ConnectionState::Connected
        } else {
            connections[0].effective_state()
        };

        let instances = connections
            .into_iter()
            .enumerate()
            .map(|(index, connection)| LabeledConnection {
                connection,
                role: if index == 0 {
                    InstanceRole::Primary
                } else {
                    InstanceRole::Orphan
                },
            })
            .collect();

        Ok(ChannelSnapshot { state, instances })
    }

    // =========================================================================
    // Cleanup and disconnect
    // =========================================================================

    /// Delete every orphan instance of a kind, keeping the primary.
    /// Returns the number of rows removed.
    #[instrument(skip(self), fields(principal = %principal, kind = %kind))]
    pub async fn cleanup_orphans(
        &self,
        principal: PrincipalId,
        kind: ChannelKind,
    ) -> Result<usize, DomainError> {
        let snapshot = self.channel_state(principal, kind).await?;
        let mut removed = 0;
        for labeled in &snapshot.instances {
            if labeled.role == InstanceRole::Orphan {
                self.gateway
                    .delete(
                        Collection::Connections,
                        Filter::field("id", json!(labeled.connection.id)),
                    )
                    .await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(count = removed, "Orphan connections cleaned up");
        }
        Ok(removed)
    }

    /// Soft-disconnect one instance: tear the provider session down where
    /// the variant supports it, then flip the state flag. Credentials are
    /// retained so the channel can be re-enabled later.
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn disconnect_soft(
        &self,
        principal: PrincipalId,
        connection_id: ConnectionId,
    ) -> Result<(), DomainError> {
        let connection = self.fetch_owned(principal, connection_id).await?;
        self.teardown_best_effort(&connection).await;
        self.gateway
            .update(
                Collection::Connections,
                Filter::field("id", json!(connection_id)),
                json!({ "state": ConnectionState::Disconnected }),
            )
            .await?;
        info!("Connection soft-disconnected");
        Ok(())
    }

    /// Soft-disconnect every instance of a kind, duplicates included.
    /// Returns the number of instances disconnected.
    pub async fn disconnect_all_soft(
        &self,
        principal: PrincipalId,
        kind: ChannelKind,
    ) -> Result<usize, DomainError> {
        let connections = self.instances_of(principal, kind).await?;
        let mut count = 0;
        for connection in &connections {
            self.teardown_best_effort(connection).await;
            self.gateway
                .update(
                    Collection::Connections,
                    Filter::field("id", json!(connection.id)),
                    json!({ "state": ConnectionState::Disconnected }),
                )
                .await?;
            count += 1;
        }
        info!(kind = %kind, count, "Channel soft-disconnected");
        Ok(count)
    }

    /// Hard-disconnect one instance: tear the provider session down where
    /// supported, then delete the stored row and its credentials. Requires
    /// an explicit confirmation token.
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn disconnect_hard(
        &self,
        principal: PrincipalId,
        connection_id: ConnectionId,
        confirmation: HardDeleteConfirmation,
    ) -> Result<(), DomainError> {
        if confirmation != HardDeleteConfirmation::Confirmed {
            return Err(DomainError::HardDeleteNotConfirmed);
        }
        let connection = self.fetch_owned(principal, connection_id).await?;
        self.teardown_best_effort(&connection).await;
        self.gateway
            .delete(
                Collection::Connections,
                Filter::field("id", json!(connection_id)),
            )
            .await?;
        info!("Connection hard-deleted");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn fetch_owned(
        &self,
        principal: PrincipalId,
        connection_id: ConnectionId,
    ) -> Result<ChannelConnection, DomainError> {
        let rows = self
            .gateway
            .select(
                Collection::Connections,
                Filter::field("id", json!(connection_id)),
                None,
            )
            .await?;
        let row = rows
            .first()
            .ok_or(DomainError::ConnectionNotFound(connection_id))?;
        let connection = ConnectionRecord::from_row(row)?;
        if connection.owner != principal {
            return Err(DomainError::NotConnectionOwner(connection_id));
        }
        Ok(connection)
    }

    async fn instances_of(
        &self,
        principal: PrincipalId,
        kind: ChannelKind,
    ) -> Result<Vec<ChannelConnection>, DomainError> {
        let rows = self
            .gateway
            .select(
                Collection::Connections,
                Filter::field("owner", json!(principal)).and("channel", json!(kind)),
                Some(Order::asc("created_at")),
            )
            .await?;
        let mut connections = Vec::with_capacity(rows.len());
        for row in &rows {
            match ConnectionRecord::from_row(row) {
                Ok(connection) => connections.push(connection),
                Err(e) => warn!(error = %e, "Skipping malformed connection row"),
            }
        }
        Ok(connections)
    }

    /// Teardown failures never block a disconnect; the stored state change
    /// is the source of truth.
    async fn teardown_best_effort(&self, connection: &ChannelConnection) {
        if !connection.config.supports_teardown() {
            return;
        }
        if let Err(e) = self.dispatch.teardown(connection).await {
            warn!(
                connection_id = %connection.id,
                error = %e,
                "Provider teardown failed, continuing disconnect"
            );
        }
    }
}
