//! Live server counters.

use std::sync::Arc;

use serde::Serialize;

use crate::server::ServerState;

/// A point-in-time view of server load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    /// Matches that have started and not yet finished.
    pub active_matches: usize,
    /// Sessions queued for an opponent.
    pub waiting_sessions: usize,
    /// Sessions with an open connection, playing or not.
    pub connected_sessions: usize,
}

/// Read-only access to a running server's counters.
#[derive(Clone)]
pub struct StatsHandle {
    state: Arc<ServerState>,
}

impl StatsHandle {
    pub(crate) fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// Takes a snapshot. Finished matches are reaped first, so they never
    /// count as active.
    pub async fn snapshot(&self) -> ServerStats {
        let connected_sessions = self.state.sessions.lock().await.len();
        let mut matchmaker = self.state.matchmaker.lock().await;
        ServerStats {
            active_matches: matchmaker.active_match_count(),
            waiting_sessions: matchmaker.waiting_count(),
            connected_sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_stats_json_shape() {
        let stats = ServerStats {
            active_matches: 2,
            waiting_sessions: 1,
            connected_sessions: 5,
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "active_matches": 2,
                "waiting_sessions": 1,
                "connected_sessions": 5
            })
        );
    }
}
