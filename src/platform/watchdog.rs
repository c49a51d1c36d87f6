use super::shutdown::{ShutdownHandle, ShutdownReason};
use crate::core::isolation;
use crate::error::TransportError;
use crate::ports::{WatchdogError, WatchdogPayload, WatchdogStatus};
use crate::transport::runtime_events::RuntimeEventClient;
use std::panic::PanicHookInfo;
use std::sync::Arc;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

/// Reports crashes to the monitoring endpoint and, with `auto_exit`,
/// asks the host to shut down afterwards.
#[derive(Debug)]
pub struct Watchdog {
    client: RuntimeEventClient,
    auto_exit: bool,
    shutdown: Option<ShutdownHandle>,
}

impl Watchdog {
    pub fn new(client: RuntimeEventClient, auto_exit: bool, shutdown: Option<ShutdownHandle>) -> Self {
        Self {
            client,
            auto_exit,
            shutdown,
        }
    }

    /// Report a crash. The shutdown request (when `auto_exit`) is issued
    /// whether or not delivery succeeded.
    pub async fn report_crash(&self, error: &anyhow::Error) -> Result<(), TransportError> {
        let payload = WatchdogPayload {
            status: WatchdogStatus::Crashed,
            error: WatchdogError {
                message: error.to_string(),
                stack: Some(format!("{error:?}")),
                name: Some("Error".to_string()),
            },
        };
        self.report(payload).await
    }

    async fn report(&self, payload: WatchdogPayload) -> Result<(), TransportError> {
        let message = payload.error.message.clone();
        let delivered = self.client.watchdog(payload).await;
        if let Err(error) = &delivered {
            tracing::warn!(error = %error, "crash report not delivered");
        }

        if self.auto_exit
            && let Some(shutdown) = &self.shutdown
        {
            shutdown.request(ShutdownReason::Fatal(message));
        }
        delivered
    }

    /// Chain a panic hook that reports panics from threads with a tokio
    /// runtime. Panics contained by plugin or handler isolation are soft
    /// failures and are not reported. Restore the previous hook with
    /// [`PanicHookGuard::uninstall`].
    pub fn install_panic_hook(self: &Arc<Self>) -> PanicHookGuard {
        let previous: Arc<PanicHook> = Arc::new(std::panic::take_hook());
        let chained = Arc::clone(&previous);
        let watchdog = Arc::clone(self);

        std::panic::set_hook(Box::new(move |info| {
            chained(info);
            if isolation::is_isolated() {
                return;
            }

            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                return;
            };
            let payload = panic_payload(info);
            let watchdog = Arc::clone(&watchdog);
            runtime.spawn(async move {
                let _ = watchdog.report(payload).await;
            });
        }));

        PanicHookGuard { previous }
    }
}

#[must_use = "dropping the guard keeps the hook installed"]
pub struct PanicHookGuard {
    previous: Arc<PanicHook>,
}

impl PanicHookGuard {
    pub fn uninstall(self) {
        let previous = self.previous;
        // Discard our hook, then hand control back to the one we wrapped.
        drop(std::panic::take_hook());
        std::panic::set_hook(Box::new(move |info| previous(info)));
    }
}

impl std::fmt::Debug for PanicHookGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanicHookGuard").finish_non_exhaustive()
    }
}

fn panic_payload(info: &PanicHookInfo<'_>) -> WatchdogPayload {
    WatchdogPayload {
        status: WatchdogStatus::Crashed,
        error: WatchdogError {
            message: panic_message(info.payload()),
            stack: info.location().map(ToString::to_string),
            name: Some("panic".to_string()),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}
