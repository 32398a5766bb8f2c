//! One authenticated session to the host.
//!
//! A handle owns exactly one session token. Expired sessions are
//! re-established transparently, up to a bounded retry count, after which
//! `SessionUnavailable` is surfaced. All other transport failures become
//! `RemoteOperation` errors with the host's detail text attached.

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{Result, XenError};
use crate::remote::transport::{RemoteTransport, TransportFailure};

use std::sync::Arc;

/// Login credentials kept for transparent re-establishment.
#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

/// An authenticated session handle to the hypervisor host.
///
/// Handles are owned by the [`SessionPool`](crate::remote::SessionPool) and
/// loaned out one caller at a time; the lock around the token only guards
/// the re-login path.
pub struct RemoteHandle {
    transport: Arc<dyn RemoteTransport>,
    credentials: Credentials,
    session: RwLock<String>,
    relogin_limit: u32,
}

impl RemoteHandle {
    /// Log in and wrap the resulting session.
    pub async fn connect(
        transport: Arc<dyn RemoteTransport>,
        username: &str,
        password: &str,
        relogin_limit: u32,
    ) -> Result<Self> {
        let session = transport
            .login(username, password)
            .await
            .map_err(|failure| {
                warn!(error = %failure, "initial login failed");
                XenError::SessionUnavailable { attempts: 1 }
            })?;
        debug!("session established");
        Ok(Self {
            transport,
            credentials: Credentials {
                username: username.to_string(),
                password: password.to_string(),
            },
            session: RwLock::new(session),
            relogin_limit,
        })
    }

    /// Invoke `class.method(args...)` under this handle's session.
    ///
    /// An expired session is re-established and the call retried, up to the
    /// configured bound. Any other failure is surfaced as
    /// [`XenError::RemoteOperation`].
    pub async fn invoke(&self, class: &str, method: &str, args: &[Value]) -> Result<Value> {
        let mut attempts: u32 = 0;
        loop {
            let session = self.session.read().await.clone();
            match self.transport.call(&session, class, method, args).await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.is_session_expired() => {
                    if attempts >= self.relogin_limit {
                        warn!(class, method, attempts, "session retries exhausted");
                        return Err(XenError::SessionUnavailable { attempts });
                    }
                    attempts += 1;
                    debug!(class, method, attempt = attempts, "session expired, re-establishing");
                    self.relogin(&session, attempts).await?;
                }
                Err(failure) => {
                    return Err(XenError::RemoteOperation {
                        class: class.to_string(),
                        method: method.to_string(),
                        details: failure.detail_text(),
                    });
                }
            }
        }
    }

    /// Replace the session token, unless another path already did.
    async fn relogin(&self, stale: &str, attempts: u32) -> Result<()> {
        let mut guard = self.session.write().await;
        if *guard != stale {
            // Someone else refreshed the token while we waited for the lock.
            return Ok(());
        }
        match self
            .transport
            .login(&self.credentials.username, &self.credentials.password)
            .await
        {
            Ok(fresh) => {
                *guard = fresh;
                Ok(())
            }
            Err(failure) => {
                warn!(error = %failure, attempts, "re-login failed");
                Err(XenError::SessionUnavailable { attempts })
            }
        }
    }

    /// Release the session on the host. Best effort; used at pool shutdown.
    pub async fn logout(&self) -> std::result::Result<(), TransportFailure> {
        let session = self.session.read().await.clone();
        self.transport.logout(&session).await
    }
}
