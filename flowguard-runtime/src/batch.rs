//! Grouped processing with bounded concurrency.
//!
//! Items are split into contiguous groups of `group_size`. Groups run one
//! after another; within a group at most `concurrency` items are in flight.
//! Results come back in input order.

use flowguard_core::BatchConfig;
use futures::stream::{self, StreamExt, TryStreamExt};
use metrics::counter;
use std::future::Future;
use tokio::time::sleep;
use tracing::debug;

/// Run `processor` over every item, group by group.
///
/// The first failure aborts the whole batch: in-flight items of the current
/// group are dropped and later groups never start.
pub async fn batch<I, R, E, F, Fut>(
    items: Vec<I>,
    config: &BatchConfig,
    mut processor: F,
) -> Result<Vec<R>, E>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let group_size = config.group_size.max(1);
    let limit = config.effective_concurrency();
    let delay = config.inter_group_delay();

    let mut results = Vec::with_capacity(items.len());
    let mut remaining = items.into_iter().peekable();
    let mut group_index = 0usize;

    while remaining.peek().is_some() {
        if group_index > 0 && !delay.is_zero() {
            sleep(delay).await;
        }

        let group: Vec<I> = remaining.by_ref().take(group_size).collect();
        debug!("Processing batch group {} ({} items)", group_index, group.len());

        let mut outputs: Vec<(usize, R)> = stream::iter(group.into_iter().enumerate())
            .map(|(index, item)| {
                let task = processor(item);
                async move { task.await.map(|output| (index, output)) }
            })
            .buffer_unordered(limit)
            .try_collect()
            .await?;

        outputs.sort_unstable_by_key(|(index, _)| *index);
        results.extend(outputs.into_iter().map(|(_, output)| output));

        counter!("flowguard_batch_groups_total").increment(1);
        group_index += 1;
    }

    Ok(results)
}
