use pool_contracts::SubscriptionMask;
use pool_contracts::client::{ClientError, STORAGE_MASKS};
use zfs_pool_console::views::StoragePage;
use zfs_pool_console::Console;

pub fn should_skip(error: &ClientError) -> bool {
    matches!(
        error,
        ClientError::ServiceNotAvailable | ClientError::Connection(_)
    )
}

pub fn skip_or_panic<T>(result: std::result::Result<T, ClientError>, context: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) if should_skip(&error) => {
            eprintln!("SKIP {}: {}", context, error);
            None
        }
        Err(error) => panic!("{}: {}", context, error),
    }
}

/// Subscription count of each storage mask, in `STORAGE_MASKS` order
pub fn storage_mask_counts<M>(console: &Console<M>) -> Vec<usize>
where
    M: pool_contracts::ZfsMiddleware,
{
    STORAGE_MASKS
        .into_iter()
        .map(|mask| console.subscriptions().count(&SubscriptionMask::from(mask)))
        .collect()
}

pub fn pool_names(page: &StoragePage) -> Vec<&str> {
    page.pools.iter().map(|pool| pool.name.as_str()).collect()
}
