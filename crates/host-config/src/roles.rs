use std::fmt;

use bitflags::bitflags;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Role {
    NoAccess,
    ReadOnly,
    Transfer,
    Rule,
    Host,
    Limit,
    System,
    LogControl,
    Unknown,
    Partner,
    ConfigAdmin,
    FullAdmin,
}

pub static ALL_ROLES: &[Role] = &[
    Role::NoAccess,
    Role::ReadOnly,
    Role::Transfer,
    Role::Rule,
    Role::Host,
    Role::Limit,
    Role::System,
    Role::LogControl,
    Role::Unknown,
    Role::Partner,
    Role::ConfigAdmin,
    Role::FullAdmin,
];

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::NoAccess => "NOACCESS",
            Role::ReadOnly => "READONLY",
            Role::Transfer => "TRANSFER",
            Role::Rule => "RULE",
            Role::Host => "HOST",
            Role::Limit => "LIMIT",
            Role::System => "SYSTEM",
            Role::LogControl => "LOGCONTROL",
            Role::Unknown => "UNKNOWN",
            Role::Partner => "PARTNER",
            Role::ConfigAdmin => "CONFIGADMIN",
            Role::FullAdmin => "FULLADMIN",
        }
    }

    pub fn parse(token: &str) -> Option<Role> {
        let token = token.trim();
        ALL_ROLES
            .iter()
            .copied()
            .find(|role| role.name().eq_ignore_ascii_case(token))
    }

    pub fn mask(self) -> RoleSet {
        match self {
            Role::NoAccess => RoleSet::NOACCESS,
            Role::ReadOnly => RoleSet::READONLY,
            Role::Transfer => RoleSet::TRANSFER,
            Role::Rule => RoleSet::RULE,
            Role::Host => RoleSet::HOST,
            Role::Limit => RoleSet::LIMIT,
            Role::System => RoleSet::SYSTEM,
            Role::LogControl => RoleSet::LOGCONTROL,
            Role::Unknown => RoleSet::UNKNOWN,
            Role::Partner => RoleSet::PARTNER,
            Role::ConfigAdmin => RoleSet::CONFIGADMIN,
            Role::FullAdmin => RoleSet::FULLADMIN,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    // the empty set is NOACCESS
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct RoleSet: u32 {
        const READONLY = 0b0000_0001;
        const TRANSFER = 0b0000_0010;
        const RULE = 0b0000_0100;
        const HOST = 0b0000_1000;
        const LIMIT = 0b0001_0000;
        const SYSTEM = 0b0010_0000;
        const LOGCONTROL = 0b0100_0000;
        const UNKNOWN = 0b1000_0000;
        const PARTNER = Self::READONLY.bits() | Self::TRANSFER.bits();
        const CONFIGADMIN = Self::PARTNER.bits() | Self::RULE.bits() | Self::HOST.bits();
        const FULLADMIN = Self::CONFIGADMIN.bits()
            | Self::LIMIT.bits()
            | Self::SYSTEM.bits()
            | Self::LOGCONTROL.bits();
    }
}

impl RoleSet {
    pub const NOACCESS: RoleSet = RoleSet::empty();

    // NOACCESS anywhere in the token list wins over every other token.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> RoleSet {
        let roles: Vec<Role> = tokens
            .iter()
            .filter_map(|token| Role::parse(token.as_ref()))
            .collect();
        if roles.contains(&Role::NoAccess) {
            return RoleSet::NOACCESS;
        }
        roles
            .into_iter()
            .fold(RoleSet::empty(), |set, role| set | role.mask())
    }

    pub fn is_no_access(self) -> bool {
        self.is_empty()
    }

    pub fn has(self, role: Role) -> bool {
        match role {
            Role::NoAccess => self.is_no_access(),
            other => self.contains(other.mask()),
        }
    }
}
