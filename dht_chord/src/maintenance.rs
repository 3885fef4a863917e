use crate::state::{ChordNode, S};
use dht_client::send_request;
use dht_types::{NodeHandle, Request, Response};
use std::sync::Arc;
use std::time::Duration;
use task_manager::TaskManager;
use tokio::time::interval;

impl ChordNode {
    /// `update_successors` (spec §4.6, every 0.5 s): classic Chord stabilize
    /// - ask the first successor for its predecessor and adopt it if it lies
    /// strictly between us and that successor - plus successor-list repair:
    /// refill our tail from the successor's own list, or promote the next
    /// live entry and restore from backup if the first successor died.
    #[tracing::instrument(skip(self))]
    pub async fn update_successors(self: &Arc<Self>) {
        let Some(successor0) = self.first_successor().await else {
            return;
        };
        if successor0.id == self.id {
            return;
        }

        match send_request(successor0.addr, &Request::GetStatus, self.rpc_timeout).await {
            Ok(Response::Status { predecessor, successors, .. }) => {
                if let Some(candidate) = predecessor {
                    if candidate.id != self.id && candidate.id.in_ring_range(self.id, successor0.id, false, false) {
                        self.set_first_successor(candidate).await;
                        self.data.set_backup_target(Some(candidate)).await;
                        if let Err(error) =
                            send_request(candidate.addr, &Request::SetPredecessor { predecessor: Some(self.handle()) }, self.rpc_timeout).await
                        {
                            tracing::debug!(peer = %candidate.id, %error, "could not notify adopted successor, will retry next tick");
                        }
                    }
                }
                let mut refilled: Vec<NodeHandle> = vec![self.first_successor().await.unwrap_or(successor0)];
                refilled.extend(successors.into_iter().filter(|s| s.id != self.id));
                refilled.truncate(S);
                *self.successors.lock().await = refilled;
            }
            Ok(other) => {
                tracing::warn!(peer = %successor0.id, response = ?other, "unexpected status response during stabilize");
            }
            Err(error) => {
                tracing::warn!(peer = %successor0.id, %error, "successor unreachable, promoting next live entry");
                if let Err(error) = self.handle_successor_failure(successor0).await {
                    tracing::error!(%error, "no live successor left to promote");
                }
            }
        }
    }

    /// `update_finger_table` (spec §4.6, every 1.5 s): recompute every
    /// finger, jumping forward on dead entries - delegated to
    /// `refresh_finger_table`, which already tolerates unreachable hops by
    /// leaving that slot for the next tick.
    #[tracing::instrument(skip(self))]
    pub async fn update_finger_table(self: &Arc<Self>) {
        self.refresh_finger_table().await;
    }

    /// Spawns both recurring maintenance ticks onto `task_manager`. Each
    /// loop exits at its next tick once `running` is cleared or the manager
    /// cancels, per the spec's "exits its timers at the next tick" rule.
    pub async fn spawn_maintenance(self: &Arc<Self>, task_manager: &TaskManager) {
        let successors_node = self.clone();
        task_manager
            .spawn_task_loop(
                move |guard| async move {
                    let mut ticker = interval(Duration::from_millis(500));
                    loop {
                        tokio::select! {
                            _ = guard.is_cancelled() => break,
                            _ = ticker.tick() => {
                                if !successors_node.is_running() {
                                    break;
                                }
                                successors_node.update_successors().await;
                            }
                        }
                    }
                },
                format!("chord-update-successors-{}", self.id),
            )
            .await;

        let fingers_node = self.clone();
        task_manager
            .spawn_task_loop(
                move |guard| async move {
                    let mut ticker = interval(Duration::from_millis(1500));
                    loop {
                        tokio::select! {
                            _ = guard.is_cancelled() => break,
                            _ = ticker.tick() => {
                                if !fingers_node.is_running() {
                                    break;
                                }
                                fingers_node.update_finger_table().await;
                            }
                        }
                    }
                },
                format!("chord-update-fingers-{}", self.id),
            )
            .await;
    }
}
