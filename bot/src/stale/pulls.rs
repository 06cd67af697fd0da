use chrono::{DateTime, Utc};
use shared::{natural_delta, Item};
use tracing::{info, instrument, warn};

use crate::messages::MsgCategory;

use super::{
    common::{last_committed_at, last_labeled_at},
    Action, Context,
};

/// Decides what to do with an open pull request.
///
/// Staleness is measured from the last commit, so pushing new commits resets
/// the clock and invalidates earlier warnings. Once labeled stale, a warning
/// is only valid if it was posted after the most recent labeling.
#[instrument(skip(context, item, now), fields(pr = item.number))]
pub async fn decide(context: &Context, item: &Item, now: DateTime<Utc>) -> anyhow::Result<Action> {
    let labels = &context.config.labels;
    let thresholds = &context.config.thresholds;
    info!(
        "Checking {} with labels {:?}",
        item.number,
        item.sorted_labels()
    );

    if !item.is_open() {
        info!("-> OK PR {} is already closed", item.number);
        return Ok(Action::NoOp);
    }

    let is_stale = item.has_label(&labels.stale);
    if item.has_label(&labels.keep_open) {
        info!(
            "-> PROTECTED by {}, skipping and removing \"{}\" label if it exists",
            labels.keep_open, labels.stale
        );
        return Ok(if is_stale {
            Action::RemoveStale
        } else {
            Action::NoOp
        });
    }

    let commits = context.repository.commits(item.number).await?;
    let Some(last_committed) = last_committed_at(&commits) else {
        warn!("-> LAST COMMIT NOT FOUND for PR {}, skipping", item.number);
        return Ok(Action::NoOp);
    };
    let since_commit = now - last_committed;

    let comments = context.repository.comments(item.number, None).await?;
    let last_warned = context.last_warned_at(&comments, MsgCategory::PrCloseWarning, None);

    // Staleness can come from the bot or from a human, so it's handled first
    if is_stale {
        let timeline = context.repository.timeline(item.number).await?;
        let Some(last_labeled) = last_labeled_at(&timeline, &labels.stale) else {
            warn!(
                "-> {} exists on PR {} but cannot find when it was added, skipping",
                labels.stale, item.number
            );
            return Ok(Action::NoOp);
        };

        return Ok(match last_warned {
            Some(warned_at) if warned_at >= last_labeled => {
                let since_warning = now - warned_at;
                if since_warning > thresholds.close {
                    info!(
                        "-> CLOSING PR {}, {} since last warning",
                        item.number,
                        natural_delta(since_warning)
                    );
                    Action::Close
                } else {
                    info!(
                        "-> OK PR {} (already warned), labeled on {last_labeled}, warned on {warned_at}",
                        item.number
                    );
                    Action::NoOp
                }
            }
            Some(warned_at) => {
                info!(
                    "-> WARNING PR {}, labeled on {last_labeled}, warning issued on {warned_at} no longer applicable",
                    item.number
                );
                Action::Warn {
                    pasttime: natural_delta(since_commit),
                }
            }
            None => {
                info!(
                    "-> WARNING PR {}, labeled on {last_labeled}, no warning ever issued",
                    item.number
                );
                Action::Warn {
                    pasttime: natural_delta(since_commit),
                }
            }
        });
    }

    if since_commit <= thresholds.warn {
        info!(
            "-> OK PR {} (not stale), last commit was {last_committed}",
            item.number
        );
        return Ok(Action::NoOp);
    }

    info!(
        "-> MARK PR {} as stale with \"{}\" label, last commit was {last_committed}",
        item.number, labels.stale
    );
    let warning = match last_warned {
        Some(warned_at) if warned_at >= last_committed => {
            info!(
                "-> OK PR {} (already warned), {} since last warning",
                item.number,
                natural_delta(now - warned_at)
            );
            None
        }
        Some(warned_at) => {
            info!(
                "-> WARNING PR {}, warning issued on {warned_at} no longer applicable",
                item.number
            );
            Some(natural_delta(since_commit))
        }
        None => {
            info!("-> WARNING PR {}, no warning ever issued", item.number);
            Some(natural_delta(since_commit))
        }
    };
    Ok(Action::MarkStale { warning })
}
