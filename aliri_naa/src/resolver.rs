//! Resolution of the account a request is made for

use crate::{
    account::{AccountFilter, AccountInfo},
    bridge::dto::AccountContext,
    request::ValidRequest,
    storage::AuthStorage,
};

/// Determines which account, if any, a request should be served for
///
/// An account on the request wins. Otherwise the account the host reported
/// is looked up in storage. Finding neither is not an error: it only means
/// the cache cannot answer.
pub fn resolve_account(
    request: &ValidRequest,
    account_context: Option<&AccountContext>,
    storage: &dyn AuthStorage,
) -> Option<AccountInfo> {
    if let Some(account) = request.account() {
        return Some(account.clone());
    }

    let context = account_context?;
    let account =
        storage.get_account(&AccountFilter::by_home_account_id(context.home_account_id.clone()));

    if account.is_none() {
        tracing::debug!(
            home_account_id = %context.home_account_id,
            "host reported an account that is not in storage"
        );
    }

    account
}
