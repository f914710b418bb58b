//! Role names and the allowed-role lists operations are declared with.

use std::fmt;

/// Request header carrying the caller's roles, set by the upstream AAA proxy.
pub const ROLE_HEADER: &str = "X-Forwarded-User-Roles";

pub const SYSTEM: &str = "system";
pub const SKYLIGHT_ADMIN: &str = "skylight-admin";
pub const TENANT_ADMIN: &str = "tenant-admin";
pub const TENANT_CONTRIBUTOR: &str = "tenant-contributor";
pub const TENANT_USER: &str = "tenant-user";
pub const UNKNOWN: &str = "unknown";

/// Platform administrators only.
pub const SKYLIGHT_ADMIN_ONLY: &[&str] = &[SYSTEM, SKYLIGHT_ADMIN];
/// Platform and tenant administrators.
pub const SKYLIGHT_AND_TENANT_ADMIN: &[&str] = &[SYSTEM, SKYLIGHT_ADMIN, TENANT_ADMIN];
/// Administrators plus tenant contributors.
pub const ADMIN_AND_CONTRIBUTOR: &[&str] =
    &[SYSTEM, SKYLIGHT_ADMIN, TENANT_ADMIN, TENANT_CONTRIBUTOR];
/// Every authenticated role.
pub const ALL_ROLES: &[&str] = &[SYSTEM, SKYLIGHT_ADMIN, TENANT_ADMIN, TENANT_USER];

/// The caller's roles as read from [`ROLE_HEADER`].
///
/// The header may carry one role or a comma-separated list. A single-role
/// header admits exactly what a whole-value match would. An absent or blank
/// header parses to no roles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleHeader {
    raw: String,
    roles: Vec<String>,
}

impl RoleHeader {
    pub fn parse(value: &str) -> Self {
        let roles = value
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            raw: value.trim().to_string(),
            roles,
        }
    }

    /// A header naming a single role.
    pub fn single(role: &str) -> Self {
        Self::parse(role)
    }

    /// No header at all.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles().any(|r| r == role)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl fmt::Display for RoleHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            f.write_str(UNKNOWN)
        } else {
            f.write_str(&self.raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_lists_always_start_with_system() {
        for list in [
            SKYLIGHT_ADMIN_ONLY,
            SKYLIGHT_AND_TENANT_ADMIN,
            ADMIN_AND_CONTRIBUTOR,
            ALL_ROLES,
        ] {
            assert_eq!(list[0], SYSTEM);
        }
    }

    #[test]
    fn tenant_user_is_only_in_all_roles() {
        assert!(ALL_ROLES.contains(&TENANT_USER));
        assert!(!SKYLIGHT_AND_TENANT_ADMIN.contains(&TENANT_USER));
        assert!(!ADMIN_AND_CONTRIBUTOR.contains(&TENANT_USER));
    }

    #[test]
    fn role_sets_have_their_documented_members() {
        assert_eq!(SKYLIGHT_ADMIN_ONLY, &[SYSTEM, SKYLIGHT_ADMIN]);
        assert_eq!(SKYLIGHT_AND_TENANT_ADMIN, &[SYSTEM, SKYLIGHT_ADMIN, TENANT_ADMIN]);
        assert_eq!(
            ADMIN_AND_CONTRIBUTOR,
            &[SYSTEM, SKYLIGHT_ADMIN, TENANT_ADMIN, TENANT_CONTRIBUTOR]
        );
        assert_eq!(ALL_ROLES, &[SYSTEM, SKYLIGHT_ADMIN, TENANT_ADMIN, TENANT_USER]);
        assert!(!ALL_ROLES.contains(&TENANT_CONTRIBUTOR));
    }

    #[test]
    fn header_parses_comma_separated_roles() {
        let h = RoleHeader::parse(" tenant-user , tenant-admin,,");
        let roles: Vec<&str> = h.roles().collect();
        assert_eq!(roles, vec![TENANT_USER, TENANT_ADMIN]);
        assert!(h.contains(TENANT_ADMIN));
        assert!(!h.contains(SYSTEM));
    }

    #[test]
    fn blank_header_has_no_roles() {
        assert!(RoleHeader::parse("   ").is_empty());
        assert!(RoleHeader::absent().is_empty());
        assert_eq!(RoleHeader::absent().to_string(), UNKNOWN);
    }
}
