//! Waiting on a stream of object versions for a condition to hold.

use std::{future::Future, time::Duration};

use futures::{pin_mut, Stream, StreamExt as _};

use crate::error::{Error, Result};

/// Resolves to the first object satisfying `condition`.
///
/// Without a `timeout` this waits for as long as the stream stays open.
/// `cancel` completing aborts the wait with [`Error::Cancelled`]. The
/// stream is dropped on return, which stops any underlying watch.
pub async fn until_condition<K, S, F, C>(
    objects: S,
    condition: F,
    timeout: Option<Duration>,
    cancel: C,
) -> Result<K>
where
    S: Stream<Item = Result<K>>,
    F: Fn(&K) -> bool,
    C: Future<Output = ()>,
{
    let wait = async {
        pin_mut!(objects);
        while let Some(object) = objects.next().await {
            let object = object?;
            if condition(&object) {
                return Ok(object);
            }
        }
        Err(Error::WatchClosed)
    };

    let wait = async {
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait)
                .await
                .map_err(|_| Error::Timeout(timeout))?,
            None => wait.await,
        }
    };

    tokio::select! {
        result = wait => result,
        _ = cancel => Err(Error::Cancelled),
    }
}

/// Completes on Ctrl-C. Never completes if the handler can't be installed.
pub async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        futures::future::pending::<()>().await;
    }
}
