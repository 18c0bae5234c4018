//! Batched submission of RNG calls against a paused node.

use futures::future::try_join_all;
use log::{debug, trace, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::node::RngNode;
use crate::sampler::{RngFunctions, SampleRequest, SampleResult, SamplerCall};

/// Largest number of calls submitted for a single block
pub const MAX_BATCH_SIZE: usize = 1000;

/// Runs `batch_size` identical draws and returns one result per draw.
///
/// Mining is paused while the calls are submitted concurrently so they can
/// share a block, then resumed and one block is forced. Receipts are awaited
/// jointly.
/// The order of the returned results is not tied to submission order.
///
/// An unsupported bit width or batch size fails before any RPC is issued.
pub async fn execute_batch<N: RngNode>(
    node: &N,
    functions: &RngFunctions,
    request: &SampleRequest,
    batch_size: usize,
) -> HarnessResult<Vec<SampleResult>> {
    check_batch_size(batch_size)?;

    let call = functions.resolve(request)?;
    let kind = call.kind();

    node.pause_mining().await?;

    let pending = match submit_all(node, &call, batch_size).await {
        Ok(pending) => pending,
        Err(e) => {
            // Leave the node mining even though the batch is lost
            if let Err(resume_err) = node.resume_mining().await {
                warn!("Failed to resume mining after a submission error: {}", resume_err);
            }
            return Err(e);
        }
    };

    node.resume_mining().await?;
    node.mine_block().await?;

    if log::log_enabled!(log::Level::Debug) {
        debug!(
            "Submitted {} call(s) to {}, awaiting receipts",
            pending.len(),
            call.function()
        );
    }

    let receipts = try_join_all(pending.into_iter().map(|p| node.confirm(p))).await?;

    Ok(receipts
        .iter()
        .map(|events| SampleResult::from_events(events, kind))
        .collect())
}

/// Rejects batch sizes outside `1..=MAX_BATCH_SIZE`.
pub fn check_batch_size(batch_size: usize) -> HarnessResult<()> {
    if batch_size == 0 {
        return Err(HarnessError::InvalidBatchSize);
    }
    if batch_size > MAX_BATCH_SIZE {
        return Err(HarnessError::BatchSizeTooLarge {
            batch_size,
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

// Issues every call without waiting for the previous one to be accepted
async fn submit_all<N: RngNode>(
    node: &N,
    call: &SamplerCall,
    batch_size: usize,
) -> HarnessResult<Vec<N::Pending>> {
    if log::log_enabled!(log::Level::Trace) {
        trace!("submitting {} call(s) to {}", batch_size, call.function());
    }
    try_join_all((0..batch_size).map(|_| node.submit(call))).await
}
