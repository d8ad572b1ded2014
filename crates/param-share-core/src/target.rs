//! Target specifiers and target sets
//!
//! Tag keys double as addresses: a 12-digit account id, an organization
//! root (`r-...`) or an organizational unit (`ou-...`). `TargetSpecifier::classify`
//! is the single place where a key is interpreted.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A 12-digit cloud account identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub const LEN: usize = 12;

    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == Self::LEN && raw.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("not a 12-digit account id: {s}"))
    }
}

impl TryFrom<String> for AccountId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

/// What a tag key addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpecifier {
    /// Share with exactly this account.
    Account(AccountId),
    /// Every account in the organization. Carries the (lowercased) root id.
    OrgRoot(String),
    /// Every account under this organizational unit (lowercased).
    OrgUnit(String),
    /// Not an address; the raw key is kept for reporting.
    Invalid(String),
}

impl TargetSpecifier {
    pub fn classify(key: &str) -> Self {
        if let Some(account) = AccountId::parse(key) {
            return Self::Account(account);
        }

        let lowered = key.to_ascii_lowercase();
        if lowered.starts_with("ou-") {
            Self::OrgUnit(lowered)
        } else if lowered.starts_with("r-") {
            Self::OrgRoot(lowered)
        } else {
            Self::Invalid(key.to_string())
        }
    }
}

/// Deduplicated replication targets. Never contains the source account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    accounts: BTreeSet<AccountId>,
}

impl TargetSet {
    pub fn new<I>(source: &AccountId, accounts: I) -> Self
    where
        I: IntoIterator<Item = AccountId>,
    {
        let accounts = accounts
            .into_iter()
            .filter(|account| account != source)
            .collect();
        Self { accounts }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn contains(&self, account: &AccountId) -> bool {
        self.accounts.contains(account)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountId> {
        self.accounts.iter()
    }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a AccountId;
    type IntoIter = std::collections::btree_set::Iter<'a, AccountId>;

    fn into_iter(self) -> Self::IntoIter {
        self.accounts.iter()
    }
}

impl fmt::Display for TargetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.accounts.iter().map(AccountId::as_str).collect();
        write!(f, "[{}]", ids.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(id: &str) -> AccountId {
        AccountId::parse(id).unwrap()
    }

    #[test]
    fn account_id_requires_twelve_digits() {
        assert!(AccountId::parse("112233445566").is_some());
        assert!(AccountId::parse("012233445566").is_some());
        assert!(AccountId::parse("11223344556").is_none());
        assert!(AccountId::parse("1122334455667").is_none());
        assert!(AccountId::parse("11223344556a").is_none());
        assert!(AccountId::parse("+12233445566").is_none());
    }

    #[test]
    fn classify_account() {
        assert_eq!(
            TargetSpecifier::classify("112233445566"),
            TargetSpecifier::Account(acct("112233445566"))
        );
    }

    #[test]
    fn classify_root_and_unit_case_insensitively() {
        assert_eq!(
            TargetSpecifier::classify("r-ab12"),
            TargetSpecifier::OrgRoot("r-ab12".into())
        );
        assert_eq!(
            TargetSpecifier::classify("OU-AB12-CD34EF"),
            TargetSpecifier::OrgUnit("ou-ab12-cd34ef".into())
        );
    }

    #[test]
    fn classify_invalid_keeps_raw_key() {
        assert_eq!(
            TargetSpecifier::classify("Team"),
            TargetSpecifier::Invalid("Team".into())
        );
        assert_eq!(
            TargetSpecifier::classify("1234"),
            TargetSpecifier::Invalid("1234".into())
        );
    }

    #[test]
    fn target_set_drops_source_and_duplicates() {
        let source = acct("999999999999");
        let set = TargetSet::new(
            &source,
            vec![
                acct("111111111111"),
                acct("999999999999"),
                acct("111111111111"),
                acct("222222222222"),
            ],
        );
        assert_eq!(set.len(), 2);
        assert!(!set.contains(&source));
        assert_eq!(set.to_string(), "[111111111111, 222222222222]");
    }

    #[test]
    fn account_id_serde_rejects_garbage() {
        let ok: AccountId = serde_json::from_str("\"112233445566\"").unwrap();
        assert_eq!(ok.as_str(), "112233445566");
        assert!(serde_json::from_str::<AccountId>("\"abc\"").is_err());
    }
}
