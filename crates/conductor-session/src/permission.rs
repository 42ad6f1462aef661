//! Permission check (§4.10 step 1): allow-list/block-list for users, roles,
//! and channels, DM gating, and a maintenance-mode short-circuit. Scoped to
//! exactly what the config surface exposes — there's no per-capability
//! budget or approval queue here, unlike a richer RBAC system.

use conductor_core::config::AccessControlConfig;

/// One inbound request's identity, as the transport adapter sees it.
pub struct RequestIdentity<'a> {
    pub user_id: &'a str,
    pub role_ids: &'a [String],
    pub channel_id: &'a str,
    pub is_dm: bool,
}

/// Result of a permission check. Callers pattern-match rather than treat
/// this as an error so "maintenance mode" and "blocked user" can carry
/// distinct user-facing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionCheck {
    Allowed,
    Denied { reason: String },
}

impl PermissionCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionCheck::Allowed)
    }
}

/// Evaluate `identity` against `config`. Precedence: maintenance mode >
/// DM gating > block-lists > allow-lists. Block-lists always win over
/// allow-lists; an empty allow-list means "everyone/everything allowed".
pub fn check(identity: &RequestIdentity<'_>, config: &AccessControlConfig) -> PermissionCheck {
    if config.maintenance_mode {
        return PermissionCheck::Denied {
            reason: "the assistant is in maintenance mode".to_string(),
        };
    }

    if identity.is_dm && !config.allow_dms {
        return PermissionCheck::Denied {
            reason: "direct messages are disabled".to_string(),
        };
    }

    if config.blocked_users.iter().any(|u| u == identity.user_id) {
        return PermissionCheck::Denied {
            reason: "user is blocked".to_string(),
        };
    }
    if config.blocked_channels.iter().any(|c| c == identity.channel_id) {
        return PermissionCheck::Denied {
            reason: "channel is blocked".to_string(),
        };
    }
    if identity
        .role_ids
        .iter()
        .any(|r| config.blocked_roles.contains(r))
    {
        return PermissionCheck::Denied {
            reason: "role is blocked".to_string(),
        };
    }

    if !config.allowed_users.is_empty() && !config.allowed_users.iter().any(|u| u == identity.user_id) {
        return PermissionCheck::Denied {
            reason: "user is not on the allow-list".to_string(),
        };
    }
    if !config.allowed_channels.is_empty()
        && !config.allowed_channels.iter().any(|c| c == identity.channel_id)
    {
        return PermissionCheck::Denied {
            reason: "channel is not on the allow-list".to_string(),
        };
    }
    if !config.allowed_roles.is_empty()
        && !identity.role_ids.iter().any(|r| config.allowed_roles.contains(r))
    {
        return PermissionCheck::Denied {
            reason: "role is not on the allow-list".to_string(),
        };
    }

    PermissionCheck::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity<'a>(user: &'a str, channel: &'a str, roles: &'a [String]) -> RequestIdentity<'a> {
        RequestIdentity {
            user_id: user,
            role_ids: roles,
            channel_id: channel,
            is_dm: false,
        }
    }

    #[test]
    fn maintenance_mode_denies_everything() {
        let mut cfg = AccessControlConfig::default();
        cfg.maintenance_mode = true;
        let id = identity("u1", "c1", &[]);
        assert_eq!(
            check(&id, &cfg),
            PermissionCheck::Denied {
                reason: "the assistant is in maintenance mode".to_string()
            }
        );
    }

    #[test]
    fn dm_denied_when_dms_disabled() {
        let mut cfg = AccessControlConfig::default();
        cfg.allow_dms = false;
        let mut id = identity("u1", "c1", &[]);
        id.is_dm = true;
        assert!(!check(&id, &cfg).is_allowed());
    }

    #[test]
    fn block_list_wins_over_allow_list() {
        let mut cfg = AccessControlConfig::default();
        cfg.allowed_users = vec!["u1".to_string()];
        cfg.blocked_users = vec!["u1".to_string()];
        let id = identity("u1", "c1", &[]);
        assert!(!check(&id, &cfg).is_allowed());
    }

    #[test]
    fn empty_allow_list_allows_everyone() {
        let cfg = AccessControlConfig::default();
        let id = identity("anyone", "anywhere", &[]);
        assert_eq!(check(&id, &cfg), PermissionCheck::Allowed);
    }

    #[test]
    fn non_empty_allow_list_rejects_unlisted_user() {
        let mut cfg = AccessControlConfig::default();
        cfg.allowed_users = vec!["u1".to_string()];
        let id = identity("u2", "c1", &[]);
        assert!(!check(&id, &cfg).is_allowed());
    }

    #[test]
    fn role_allow_list_accepts_any_matching_role() {
        let mut cfg = AccessControlConfig::default();
        cfg.allowed_roles = vec!["mod".to_string()];
        let roles = vec!["member".to_string(), "mod".to_string()];
        let id = identity("u1", "c1", &roles);
        assert!(check(&id, &cfg).is_allowed());
    }
}
