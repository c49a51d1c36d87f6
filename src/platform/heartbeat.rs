use super::shutdown::{ShutdownHandle, ShutdownReason};
use crate::ports::HeartbeatPayload;
use crate::transport::runtime_events::RuntimeEventClient;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Running heartbeat loop. Dropping it does not stop the loop; call
/// [`HeartbeatTask::stop`].
#[derive(Debug)]
pub struct HeartbeatTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl HeartbeatTask {
    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(error) = self.handle.await {
            tracing::warn!(error = %error, "heartbeat task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Send a heartbeat every `interval`, first one after one full interval.
///
/// Transient delivery failures are logged and retried on the next tick. A
/// fatal one (rejected token, missing token) stops the loop and, when a
/// shutdown handle is given, requests a fatal shutdown.
pub fn start_heartbeat<F>(
    client: RuntimeEventClient,
    interval: Duration,
    payload: F,
    shutdown: Option<ShutdownHandle>,
) -> HeartbeatTask
where
    F: Fn() -> HeartbeatPayload + Send + Sync + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let body = payload();
            let status = body.status;
            match client.heartbeat(body).await {
                Ok(()) => tracing::debug!(status = %status, "heartbeat sent"),
                Err(error) if error.is_fatal() => {
                    tracing::error!(error = %error, "heartbeat stopped");
                    if let Some(shutdown) = &shutdown {
                        shutdown.request(ShutdownReason::Fatal(format!("heartbeat: {error}")));
                    }
                    break;
                }
                Err(error) => tracing::warn!(error = %error, "heartbeat delivery failed"),
            }
        }
    });

    HeartbeatTask { cancel, handle }
}
