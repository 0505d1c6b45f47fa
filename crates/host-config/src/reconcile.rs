use std::collections::HashMap;

use tracing::warn;

use crate::codec::{
    canonicalize, decode_aliases, decode_business, decode_roles, encode_aliases, encode_business,
    encode_roles, release_aliases, BusinessSet, CodecError, GroupMap,
};
use crate::roles::RoleSet;

pub trait PolicySection {
    type State: Clone + Default;

    const NAME: &'static str;

    fn decode(text: &str) -> Result<Self::State, CodecError>;
    fn encode(state: &Self::State) -> String;
    fn merge(existing: Self::State, delta: Self::State) -> Self::State;
    fn is_empty(state: &Self::State) -> bool;
}

pub struct Business;
pub struct Aliases;
pub struct Roles;

impl PolicySection for Business {
    type State = BusinessSet;

    const NAME: &'static str = "business";

    fn decode(text: &str) -> Result<BusinessSet, CodecError> {
        decode_business(text)
    }

    fn encode(state: &BusinessSet) -> String {
        encode_business(state)
    }

    fn merge(mut existing: BusinessSet, delta: BusinessSet) -> BusinessSet {
        existing.extend(delta);
        existing
    }

    fn is_empty(state: &BusinessSet) -> bool {
        state.is_empty()
    }
}

impl PolicySection for Aliases {
    type State = GroupMap;

    const NAME: &'static str = "aliases";

    fn decode(text: &str) -> Result<GroupMap, CodecError> {
        decode_aliases(text)
    }

    fn encode(state: &GroupMap) -> String {
        encode_aliases(state)
    }

    fn merge(mut existing: GroupMap, delta: GroupMap) -> GroupMap {
        for (canonical, aliases) in &delta {
            release_aliases(&mut existing, canonical, aliases);
        }
        merge_groups(existing, delta)
    }

    fn is_empty(state: &GroupMap) -> bool {
        state.is_empty()
    }
}

impl PolicySection for Roles {
    type State = GroupMap;

    const NAME: &'static str = "roles";

    fn decode(text: &str) -> Result<GroupMap, CodecError> {
        decode_roles(text)
    }

    fn encode(state: &GroupMap) -> String {
        encode_roles(state)
    }

    fn merge(existing: GroupMap, delta: GroupMap) -> GroupMap {
        merge_groups(existing, delta)
    }

    fn is_empty(state: &GroupMap) -> bool {
        state.is_empty()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reconciled<T> {
    pub text: String,
    pub state: T,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reconciliation<T> {
    Changed(Reconciled<T>),
    Unchanged,
    Malformed,
}

// existing items keep their position, new items are appended once
pub fn merge_groups(mut existing: GroupMap, delta: GroupMap) -> GroupMap {
    for (key, items) in delta {
        let group = existing.entry(key).or_default();
        for item in items {
            if !group.contains(&item) {
                group.push(item);
            }
        }
    }
    existing
}

pub fn merge<S: PolicySection>(existing: S::State, delta: S::State, purge: bool) -> S::State {
    if purge {
        delta
    } else {
        S::merge(existing, delta)
    }
}

pub fn reconcile<S: PolicySection>(
    current: &str,
    delta: &str,
    purge: bool,
) -> Reconciliation<S::State> {
    let delta_state = match S::decode(delta) {
        Ok(state) => state,
        Err(err) => {
            warn!(section = S::NAME, error = %err, "ignoring malformed update");
            return Reconciliation::Malformed;
        }
    };
    if S::is_empty(&delta_state) && !purge {
        return Reconciliation::Unchanged;
    }
    let existing = if purge {
        S::State::default()
    } else {
        match S::decode(current) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    section = S::NAME,
                    error = %err,
                    "stored document unreadable, refusing to merge"
                );
                return Reconciliation::Malformed;
            }
        }
    };
    let state = merge::<S>(existing, delta_state, purge);
    let text = canonicalize(&S::encode(&state));
    Reconciliation::Changed(Reconciled { text, state })
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AliasIndex {
    pub forward: HashMap<String, String>,
    pub reverse: HashMap<String, Vec<String>>,
}

// Decoded documents never share an alias between groups. A hand-built map
// that does is resolved in canonical-id order, the greatest id keeping it.
pub fn expand_aliases(groups: &GroupMap) -> AliasIndex {
    let mut index = AliasIndex::default();
    for (canonical, aliases) in groups {
        for alias in aliases {
            if let Some(previous) = index.forward.insert(alias.clone(), canonical.clone()) {
                if &previous != canonical {
                    warn!(
                        alias = %alias,
                        previous = %previous,
                        canonical = %canonical,
                        "alias declared for several hosts, keeping the last"
                    );
                }
            }
        }
    }
    for (canonical, aliases) in groups {
        let owned: Vec<String> = aliases
            .iter()
            .filter(|alias| index.forward.get(*alias) == Some(canonical))
            .cloned()
            .collect();
        if !owned.is_empty() {
            index.reverse.insert(canonical.clone(), owned);
        }
    }
    index
}

pub fn expand_roles(groups: &GroupMap) -> HashMap<String, RoleSet> {
    groups
        .iter()
        .map(|(host_id, tokens)| (host_id.clone(), RoleSet::from_tokens(tokens)))
        .collect()
}
