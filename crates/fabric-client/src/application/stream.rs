//! # Stream Draining
//!
//! One request, many replies: a reader task turns the server's messages
//! into results and errors on two channels, and the caller drains both
//! until the stream ends.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::domain::{ClientCode, FabricError, Group, StatusError};
use crate::ports::ResponseStream;

/// What a single server message means for the exchange.
pub(crate) enum Reply<R> {
    /// A result; the last one received is returned
    Result(R),
    /// A failure reported by the server
    Error(FabricError),
    /// Nothing to record
    Ignore,
}

/// Aborts the reader when the exchange ends early.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Read `stream` to its end, classifying each message with `classify`.
///
/// Returns the last result when no error was seen, the error when exactly
/// one was seen, and [`FabricError::Multiple`] otherwise.
pub(crate) async fn drain<T, R, F>(
    stream: ResponseStream<T>,
    target: &str,
    classify: F,
) -> Result<R, FabricError>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Reply<R> + Send + 'static,
{
    let (results_tx, mut results) = mpsc::unbounded_channel();
    let (errors_tx, mut errors) = mpsc::unbounded_channel();

    let reader = tokio::spawn(async move {
        let mut stream = stream;
        while let Some(message) = stream.next().await {
            match message {
                Ok(message) => match classify(message) {
                    Reply::Result(result) => {
                        let _ = results_tx.send(result);
                    }
                    Reply::Error(err) => {
                        let _ = errors_tx.send(err);
                    }
                    Reply::Ignore => {}
                },
                Err(err) => {
                    let _ = errors_tx.send(recv_failed(err));
                    break;
                }
            }
        }
    });
    let _guard = AbortOnDrop(reader);

    let mut last = None;
    let mut collected = Vec::new();
    loop {
        tokio::select! {
            Some(result) = results.recv() => last = Some(result),
            Some(err) = errors.recv() => collected.push(err),
            else => break,
        }
    }

    match (collected.len(), last) {
        (0, Some(result)) => Ok(result),
        (0, None) => {
            debug!(orderer = %target, "stream closed without a reply");
            Err(StatusError::new(
                Group::OrdererClient,
                ClientCode::Unknown,
                format!("{target} : stream closed without a reply"),
            )
            .into())
        }
        (1, _) => {
            let err = collected.remove(0);
            error!(orderer = %target, error = %err, "ordering service exchange failed");
            Err(err)
        }
        _ => {
            error!(orderer = %target, errors = collected.len(), "ordering service exchange failed");
            Err(FabricError::Multiple(collected))
        }
    }
}

fn recv_failed(err: FabricError) -> FabricError {
    match err {
        FabricError::Status(status) => StatusError::new(
            status.group,
            status.code,
            format!("recv from ordering service failed: {}", status.message),
        )
        .into(),
        other => other,
    }
}
