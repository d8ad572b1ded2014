//! Account listing backed by AWS Organizations.
//!
//! Listing is lazy: each page is requested when the previous one has been
//! consumed. A unit is walked depth-first, child units first, so accounts of
//! nested units are part of the unit's listing.

use aws_sdk_organizations::operation::list_accounts_for_parent::ListAccountsForParentError;
use aws_sdk_organizations::operation::list_organizational_units_for_parent::ListOrganizationalUnitsForParentError;
use aws_sdk_organizations::types::Account;
use aws_sdk_organizations::Client;
use futures::stream::{self, StreamExt};
use param_share_core::ports::{AccountPage, AccountPages, OrgHierarchy, ProviderResult};
use param_share_core::{AccountId, ProviderError};
use tracing::debug;

use crate::sdk::provider_error;

#[derive(Debug, Clone)]
pub struct OrganizationsHierarchy {
    client: Client,
}

impl OrganizationsHierarchy {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl OrgHierarchy for OrganizationsHierarchy {
    fn list_all_accounts(&self) -> AccountPages<'_> {
        let client = self.client.clone();
        stream::unfold(Some(None), move |token: Option<Option<String>>| {
            let client = client.clone();
            async move {
                let Some(token) = token else {
                    return None;
                };
                let page = client
                    .list_accounts()
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| provider_error("list accounts", e, |_| None))
                    .and_then(|out| {
                        let ids = account_ids(out.accounts())?;
                        Ok((ids, out.next_token().map(str::to_string)))
                    });
                match page {
                    Ok((ids, Some(next))) => Some((Ok(ids), Some(Some(next)))),
                    Ok((ids, None)) => Some((Ok(ids), None)),
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
        .boxed()
    }

    fn list_accounts_under_unit<'a>(&'a self, unit_id: &'a str) -> AccountPages<'a> {
        let walk = UnitWalk {
            client: self.client.clone(),
            pending: vec![unit_id.to_string()],
            current: None,
        };
        stream::unfold(walk, UnitWalk::step).boxed()
    }
}

/// Depth-first walk over a unit and its descendants.
struct UnitWalk {
    client: Client,
    /// Units whose accounts have not been listed yet.
    pending: Vec<String>,
    /// Unit being listed and its continuation token.
    current: Option<(String, Option<String>)>,
}

impl UnitWalk {
    async fn step(mut self) -> Option<(AccountPage, Self)> {
        loop {
            if let Some((unit, token)) = self.current.take() {
                return match self.accounts_page(&unit, token).await {
                    Ok((ids, next)) => {
                        if next.is_some() {
                            self.current = Some((unit, next));
                        }
                        Some((Ok(ids), self))
                    }
                    Err(e) => Some((Err(e), self.stop())),
                };
            }

            let unit = self.pending.pop()?;
            match self.child_units(&unit).await {
                Ok(children) => {
                    debug!(unit = %unit, children = children.len(), "listed child units");
                    self.pending.extend(children);
                    self.current = Some((unit, None));
                }
                Err(e) => return Some((Err(e), self.stop())),
            }
        }
    }

    /// Yield nothing after an error.
    fn stop(mut self) -> Self {
        self.pending.clear();
        self.current = None;
        self
    }

    async fn accounts_page(
        &self,
        unit: &str,
        token: Option<String>,
    ) -> ProviderResult<(Vec<AccountId>, Option<String>)> {
        let out = self
            .client
            .list_accounts_for_parent()
            .parent_id(unit)
            .set_next_token(token)
            .send()
            .await
            .map_err(|e| {
                provider_error(format!("list accounts for {unit}"), e, |err| match err {
                    ListAccountsForParentError::InvalidInputException(_) => {
                        Some(ProviderError::InvalidInput(unit.to_string()))
                    }
                    ListAccountsForParentError::ParentNotFoundException(_) => {
                        Some(ProviderError::NotFound(unit.to_string()))
                    }
                    _ => None,
                })
            })?;
        Ok((
            account_ids(out.accounts())?,
            out.next_token().map(str::to_string),
        ))
    }

    async fn child_units(&self, unit: &str) -> ProviderResult<Vec<String>> {
        let mut children = Vec::new();
        let mut token = None;
        loop {
            let out = self
                .client
                .list_organizational_units_for_parent()
                .parent_id(unit)
                .set_next_token(token)
                .send()
                .await
                .map_err(|e| {
                    provider_error(format!("list units under {unit}"), e, |err| match err {
                        ListOrganizationalUnitsForParentError::InvalidInputException(_) => {
                            Some(ProviderError::InvalidInput(unit.to_string()))
                        }
                        ListOrganizationalUnitsForParentError::ParentNotFoundException(_) => {
                            Some(ProviderError::NotFound(unit.to_string()))
                        }
                        _ => None,
                    })
                })?;

            children.extend(
                out.organizational_units()
                    .iter()
                    .filter_map(|ou| ou.id())
                    .map(str::to_string),
            );

            match out.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => return Ok(children),
            }
        }
    }
}

fn account_ids(accounts: &[Account]) -> ProviderResult<Vec<AccountId>> {
    accounts.iter().map(|a| parse_account_id(a.id())).collect()
}

fn parse_account_id(id: Option<&str>) -> ProviderResult<AccountId> {
    let id = id.ok_or_else(|| ProviderError::unexpected("account without id"))?;
    AccountId::parse(id)
        .ok_or_else(|| ProviderError::unexpected(format!("malformed account id {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_account_ids() {
        assert_eq!(
            parse_account_id(Some("012345678901")).unwrap().as_str(),
            "012345678901"
        );
        assert!(matches!(
            parse_account_id(Some("12345")),
            Err(ProviderError::Unexpected(_))
        ));
        assert!(matches!(
            parse_account_id(None),
            Err(ProviderError::Unexpected(_))
        ));
    }
}
