//! Persisting freshly acquired tokens

use crate::{
    account::AccountEntity, error::AuthError, request::ValidRequest,
    result::AuthenticationResult, storage::AuthStorage,
};

/// Writes a result's account and tokens to storage
///
/// Tokens are written first, so a rejected write leaves both the tokens and
/// the account records as they were. Hydrating the same result twice leaves
/// storage as a single hydration would.
pub async fn hydrate_cache(
    storage: &dyn AuthStorage,
    result: &AuthenticationResult,
    request: &ValidRequest,
) -> Result<(), AuthError> {
    storage.hydrate_cache(result, request).await?;

    let entity = AccountEntity::from_account_info(
        result.account(),
        result.cloud_graph_host_name(),
        result.ms_graph_host(),
    );
    storage.set_account(entity);

    tracing::trace!(
        correlation_id = %request.correlation_id(),
        home_account_id = %result.account().home_account_id,
        "cache hydrated"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::AccountFilter,
        request::{AuthRequest, TokenRequest},
        storage::InMemoryStorage,
        test_util::{self, FailingStorage, SequentialGuids},
        ClientId,
    };

    fn request() -> ValidRequest {
        TokenRequest::SsoSilent(AuthRequest::new("User.Read".parse().unwrap()))
            .into_valid(&SequentialGuids::default())
    }

    #[tokio::test]
    async fn account_and_tokens_are_stored() {
        let storage = InMemoryStorage::new(ClientId::from_static("client"));
        let account = test_util::account("a");
        let result = test_util::bridge_result(&account, "User.Read", 5_000);

        hydrate_cache(&storage, &result, &request()).await.unwrap();

        let stored = storage.get_all_accounts(&AccountFilter::default());
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].home_account_id, account.home_account_id);
        assert_eq!(storage.access_tokens_for(&account).len(), 1);
    }

    #[tokio::test]
    async fn rejected_token_write_stores_no_account() {
        let storage = FailingStorage::default();
        let account = test_util::account("a");
        let result = test_util::bridge_result(&account, "User.Read", 5_000);

        let err = hydrate_cache(&storage, &result, &request()).await.unwrap_err();

        assert!(matches!(err, AuthError::Storage(_)));
        assert!(storage.get_all_accounts(&AccountFilter::default()).is_empty());
    }
}
