use std::sync::Arc;

use futures::{
    future,
    stream::{self, BoxStream, StreamExt, TryStreamExt},
};
use thiserror::Error;

use crate::{
    provider::{retry, Provider, ProviderError, RetryPolicy},
    types::{Instance, InstanceSelector},
};

/// A failure to resolve the set of instances. This is fatal for the command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("--project and --instance cannot be used together")]
    ConflictingFilters,
    #[error("listing instances for {selector} failed: {source}")]
    Provider {
        selector: InstanceSelector,
        #[source]
        source: ProviderError,
    },
}

/// Builds the selector from the optional `--project` and `--instance` flags.
pub fn selector(project: Option<&str>, instance_id: Option<&str>) -> Result<InstanceSelector, QueryError> {
    match (project, instance_id) {
        (Some(_), Some(_)) => Err(QueryError::ConflictingFilters),
        (None, Some(id)) => Ok(InstanceSelector::Id(id.to_string())),
        (Some(project), None) => Ok(InstanceSelector::Project(project.to_string())),
        (None, None) => Ok(InstanceSelector::All),
    }
}

enum Cursor {
    First,
    Next(String),
    Done,
}

/// Returns the instances matching `project` or `instance_id` as a lazy
/// stream. Pages are requested from the provider one at a time as the stream
/// is consumed.
pub fn find_instances(
    provider: Arc<dyn Provider>,
    retry_policy: RetryPolicy,
    project: Option<&str>,
    instance_id: Option<&str>,
) -> Result<BoxStream<'static, Result<Instance, QueryError>>, QueryError> {
    let selector = selector(project, instance_id)?;
    Ok(stream_instances(provider, retry_policy, selector))
}

/// Streams every instance the selector matches, following page tokens.
pub fn stream_instances(
    provider: Arc<dyn Provider>,
    retry_policy: RetryPolicy,
    selector: InstanceSelector,
) -> BoxStream<'static, Result<Instance, QueryError>> {
    let filter = selector.clone();

    stream::try_unfold(Cursor::First, move |cursor| {
        let provider = provider.clone();
        let retry_policy = retry_policy.clone();
        let selector = selector.clone();

        async move {
            let token = match cursor {
                Cursor::First => None,
                Cursor::Next(token) => Some(token),
                Cursor::Done => return Ok(None),
            };

            log::debug!("listing instances for {} (page token {:?})", selector, token);
            let page = retry(&retry_policy, || provider.list_instances(&selector, token.clone()))
                .await
                .map_err(|source| QueryError::Provider {
                    selector: selector.clone(),
                    source,
                })?;

            let next = match page.next_page {
                Some(token) if !token.is_empty() => Cursor::Next(token),
                _ => Cursor::Done,
            };

            Ok::<_, QueryError>(Some((
                stream::iter(page.items.into_iter().map(Ok::<Instance, QueryError>)),
                next,
            )))
        }
    })
    .try_flatten()
    // The provider is asked to filter, but we only trust what we can check.
    .try_filter(move |instance| future::ready(filter.matches(instance)))
    .boxed()
}
