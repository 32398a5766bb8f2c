//! Authorization decisions and grant/revoke mutations.
//!
//! Every check reads the object's metadata once, fresh — decisions are
//! never cached, so a revocation takes effect on the very next check.
//! Grant/revoke is a read-modify-write of the whole metadata map against
//! one object; concurrent writers on the same object are last-write-wins,
//! an accepted limitation of the metadata side-channel.

use tracing::{debug, info, warn};

use crate::acl::entry::{access_path, ActionSet};
use crate::acl::subject::Identity;
use crate::config::AclConfig;
use crate::error::{Result, XenError};
use crate::object::ObjectProxy;

/// The access-control engine.
///
/// Stateless apart from its path configuration; clone freely.
#[derive(Debug, Clone)]
pub struct AclEngine {
    prefix: String,
}

impl AclEngine {
    /// Engine with the default metadata prefix.
    pub fn new() -> Self {
        Self::from_config(&AclConfig::default())
    }

    /// Engine with the configured metadata prefix.
    pub fn from_config(config: &AclConfig) -> Self {
        Self {
            prefix: config.access_prefix.clone(),
        }
    }

    /// Whether `subject` may perform `action` on the proxied object.
    ///
    /// Absent metadata falls back to the class's empty-metadata policy.
    /// Metadata that cannot be read denies — the engine never fails open.
    pub async fn check_access(
        &self,
        object: &ObjectProxy<'_>,
        subject: &dyn Identity,
        action: &str,
    ) -> Result<bool> {
        let class = object.class();
        let data = match object.get_xenstore_data().await {
            Ok(data) => data,
            Err(err) => {
                warn!(class = %class, error = %err, "permission metadata unreadable, denying");
                return Ok(false);
            }
        };

        if data.is_empty() {
            let default = class.allow_empty_acl();
            debug!(class = %class, default, "no permission metadata, applying class policy");
            return Ok(default);
        }

        let direct = access_path(&self.prefix, subject.realm(), false, subject.id());
        if let Some(raw) = data.get(&direct) {
            if ActionSet::parse(raw).allows(action) {
                info!(subject = subject.id(), action, class = %class, "access granted");
                return Ok(true);
            }
        }

        for group in subject.groups() {
            let path = access_path(&self.prefix, subject.realm(), true, group);
            if let Some(raw) = data.get(&path) {
                if ActionSet::parse(raw).allows(action) {
                    info!(
                        subject = subject.id(),
                        group, action, class = %class,
                        "access granted via group"
                    );
                    return Ok(true);
                }
            }
        }

        debug!(subject = subject.id(), action, class = %class, "access denied");
        Ok(false)
    }

    /// Like [`check_access`](Self::check_access), but a denial fails with
    /// [`XenError::Unauthorized`].
    pub async fn ensure_access(
        &self,
        object: &ObjectProxy<'_>,
        subject: &dyn Identity,
        action: &str,
    ) -> Result<()> {
        if self.check_access(object, subject, action).await? {
            Ok(())
        } else {
            Err(XenError::Unauthorized {
                subject: subject.id().to_string(),
                action: action.to_string(),
                class: object.class().api_name().to_string(),
            })
        }
    }

    /// Grant or revoke `action` for exactly one of `user` / `group`.
    ///
    /// Idempotent: granting an already-granted action or revoking an absent
    /// one writes nothing back. `force` bypasses the acting subject's own
    /// permission check; it exists for privileged internal flows (object
    /// creation seeds its initial entries before any user could hold them).
    #[allow(clippy::too_many_arguments)]
    pub async fn manage_actions(
        &self,
        object: &ObjectProxy<'_>,
        actor: &dyn Identity,
        action: &str,
        user: Option<&str>,
        group: Option<&str>,
        revoke: bool,
        force: bool,
    ) -> Result<()> {
        let (target, is_group) = match (user, group) {
            (Some(user), None) => (user, false),
            (None, Some(group)) => (group, true),
            _ => {
                return Err(XenError::InvalidArgument(
                    "specify exactly one of user or group".into(),
                ));
            }
        };

        if !force {
            self.ensure_access(object, actor, action).await?;
        }

        let path = access_path(&self.prefix, actor.realm(), is_group, target);
        let mut data = object.get_xenstore_data().await?;
        let mut actions = data
            .get(&path)
            .map(|raw| ActionSet::parse(raw))
            .unwrap_or_default();

        let changed = if revoke {
            actions.revoke(action)
        } else {
            actions.grant(action)
        };
        if !changed {
            debug!(subject = target, action, revoke, "permission entry already in desired state");
            return Ok(());
        }

        data.insert(path, actions.serialize());
        object.set_xenstore_data(&data).await?;
        info!(
            subject = target,
            is_group,
            action,
            revoke,
            class = %object.class(),
            "permission entry updated"
        );
        Ok(())
    }
}

impl Default for AclEngine {
    fn default() -> Self {
        Self::new()
    }
}
