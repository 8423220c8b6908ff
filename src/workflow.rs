//! Drives each due item through the posting lifecycle:
//! Candidate → Locked(Posting) → Posted | Failed.
use anyhow::{anyhow, Error, Result};
use chrono::NaiveDateTime;
use tracing::{error, info, instrument, warn};

use crate::asana::TaskSource;
use crate::config::Fields;
use crate::model::{
    ApprovalStatus, ItemOutcome, PublishConfirmation, RunReport, RunSummary, WorkItem,
};
use crate::schedule;
use crate::social::SocialRouter;

/// One polling cycle: fetch approved candidates, narrow to the items
/// that are due at `now`, and walk each through the state machine.
///
/// Only the initial fetch can fail the run; every later error is
/// contained at item granularity. The "Posting" status acts as a
/// cooperative lock against an overlapping run re-selecting an item.
/// The lock is advisory only: two runs that both fetch before either
/// locks can still double-post.
#[instrument(skip_all)]
pub async fn run_once(
    source: &dyn TaskSource,
    publisher: &SocialRouter,
    fields: &Fields,
    now: NaiveDateTime,
) -> Result<RunSummary> {
    let candidates = source.fetch_approved_candidates().await?;
    let mut summary = RunSummary {
        candidates: candidates.len(),
        ..Default::default()
    };

    let due = schedule::filter_due(candidates, &fields.date, &fields.time, now);
    summary.due = due.len();
    info!(
        candidates = summary.candidates,
        due = summary.due,
        "narrowed batch to due items"
    );

    for item in &due {
        match process_item(source, publisher, fields, item).await {
            ItemOutcome::Posted => summary.posted += 1,
            ItemOutcome::Failed => summary.failed += 1,
            ItemOutcome::Abandoned => summary.abandoned += 1,
        }
    }

    info!(
        posted = summary.posted,
        failed = summary.failed,
        abandoned = summary.abandoned,
        "run complete"
    );
    Ok(summary)
}

/// Entry-point wrapper mirroring the scheduled-trigger contract:
/// 200 with a summary message, or 500 when the candidate fetch failed
/// and nothing was processed.
pub async fn execute(
    source: &dyn TaskSource,
    publisher: &SocialRouter,
    fields: &Fields,
    now: NaiveDateTime,
) -> RunReport {
    match run_once(source, publisher, fields, now).await {
        Ok(summary) => RunReport {
            status: 200,
            message: format!(
                "processed {} item(s): {} posted, {} failed, {} abandoned",
                summary.due, summary.posted, summary.failed, summary.abandoned
            ),
        },
        Err(err) => {
            error!(?err, "run aborted: could not fetch candidates");
            RunReport {
                status: 500,
                message: format!("failed to fetch candidates: {err:#}"),
            }
        }
    }
}

async fn process_item(
    source: &dyn TaskSource,
    publisher: &SocialRouter,
    fields: &Fields,
    item: &WorkItem,
) -> ItemOutcome {
    // Lock first: once the status leaves Granted, the candidate search
    // of a later run no longer selects this item. If the lock itself
    // can't be taken, the item is untouched and stays for the next run.
    if let Err(err) = source.set_status(&item.gid, ApprovalStatus::Posting).await {
        warn!(gid = %item.gid, ?err, "could not lock item; leaving it for the next run");
        return ItemOutcome::Abandoned;
    }

    match publish_item(publisher, fields, item).await {
        Ok(confirmation) => {
            info!(
                gid = %item.gid,
                platform = %confirmation.platform,
                post_id = confirmation.post_id.as_deref().unwrap_or("unknown"),
                "item published"
            );
            finalize_posted(source, item).await
        }
        Err(err) => {
            warn!(gid = %item.gid, ?err, "publish failed; recording failure on the tracker");
            record_failure(source, item, &err).await
        }
    }
}

async fn publish_item(
    publisher: &SocialRouter,
    fields: &Fields,
    item: &WorkItem,
) -> Result<PublishConfirmation> {
    let platform = item
        .field_value(&fields.platform)
        .ok_or_else(|| anyhow!("no target platform set on task"))?;
    let media_url = item.field_value(&fields.media);
    publisher.publish(platform, &item.notes, media_url).await
}

async fn finalize_posted(source: &dyn TaskSource, item: &WorkItem) -> ItemOutcome {
    if let Err(err) = source.set_status(&item.gid, ApprovalStatus::Posted).await {
        // The content is live but the tracker still reads Posting;
        // nothing more can be recorded, so a human has to reconcile.
        error!(gid = %item.gid, ?err, "published but could not record Posted status");
        return ItemOutcome::Abandoned;
    }
    if let Err(err) = source.mark_complete(&item.gid).await {
        error!(gid = %item.gid, ?err, "posted but could not mark item complete; needs manual follow-up");
    }
    ItemOutcome::Posted
}

async fn record_failure(source: &dyn TaskSource, item: &WorkItem, cause: &Error) -> ItemOutcome {
    let status = source
        .set_status(&item.gid, ApprovalStatus::PostingFailed)
        .await;
    let comment = source.add_error_comment(&item.gid, &cause.to_string()).await;
    if let Err(err) = status.and(comment) {
        error!(gid = %item.gid, ?err, "could not record failure on the tracker; item left in Posting state");
        return ItemOutcome::Abandoned;
    }
    ItemOutcome::Failed
}
