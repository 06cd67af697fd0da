use chrono::{DateTime, Utc};
use shared::{natural_delta, natural_time, Item};
use tracing::{info, instrument};

use crate::messages::MsgCategory;

use super::{common::last_labeled_at, Action, Context};

/// Decides what to do with an issue the maintainers labeled as stale.
///
/// The stale clock starts at the most recent labeling. Warnings posted before
/// that labeling belong to an older cycle and are ignored.
#[instrument(skip(context, item, now), fields(issue = item.number))]
pub async fn decide(context: &Context, item: &Item, now: DateTime<Utc>) -> anyhow::Result<Action> {
    let labels = &context.config.labels;
    let thresholds = &context.config.thresholds;
    let all_labels = item.sorted_labels();

    if item.is_pull_request {
        info!("Skipping {} because it is a pull request", item.number);
        return Ok(Action::NoOp);
    }

    if !item.is_open() {
        info!("Skipping {}, it is already closed", item.number);
        return Ok(Action::NoOp);
    }

    if !item.has_label(&labels.stale) {
        info!(
            "Skipping {}, {} not found in {all_labels:?}",
            item.number, labels.stale
        );
        return Ok(Action::NoOp);
    }

    if item.has_label(&labels.keep_open) {
        info!(
            "Skipping {} due to \"{}\" label, removing \"{}\" label",
            item.number, labels.keep_open, labels.stale
        );
        return Ok(Action::RemoveStale);
    }

    let timeline = context.repository.timeline(item.number).await?;
    let last_labeled = last_labeled_at(&timeline, &labels.stale);
    info!(
        "Checking issue {} marked stale on {last_labeled:?} with labels {all_labels:?}",
        item.number
    );
    // Unknown labeling time counts from the epoch, so the issue is overdue right away
    let labeled_at = last_labeled.unwrap_or_else(|| DateTime::from_timestamp_nanos(0));
    let since_label = now - labeled_at;

    let comments = context
        .repository
        .comments(item.number, last_labeled)
        .await?;
    let since_warning = context
        .last_warned_at(&comments, MsgCategory::IssueCloseWarning, Some(labeled_at))
        .map(|warned_at| now - warned_at);

    match since_warning {
        // Even if the bot closed this before, a relabeled issue deserves to be closed again.
        // Maintainers should use the keep-open label to prevent that.
        Some(since_warning) if since_warning > thresholds.close => {
            info!(
                "-> CLOSING issue {}, {} since last warning",
                item.number,
                natural_delta(since_warning)
            );
            Ok(Action::Close)
        }
        None if since_label > thresholds.warn => {
            info!(
                "-> WARNING issue {}, {} since stale",
                item.number,
                natural_delta(since_label)
            );
            Ok(Action::Warn {
                pasttime: natural_time(since_label),
            })
        }
        Some(_) if since_label > thresholds.warn => {
            info!(
                "-> OK issue {} (already warned), {} since stale",
                item.number,
                natural_delta(since_label)
            );
            Ok(Action::NoOp)
        }
        _ => {
            info!(
                "-> OK issue {}, {} since last warning, {} since stale",
                item.number,
                since_warning.map_or_else(|| "no warning".to_string(), natural_delta),
                natural_delta(since_label)
            );
            Ok(Action::NoOp)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeDelta;
    use shared::ItemKind;

    use crate::{
        api::mock::{MockRepository, Write, BOT_LOGIN},
        stale::{
            common::tests::{at, context, marked, pipeline_config, CLOSED_BY_BOT, KEEP_OPEN, STALE},
            run_at, RunSummary,
        },
    };

    use super::*;

    fn close() -> TimeDelta {
        TimeDelta::days(7)
    }

    fn setup() -> (Arc<MockRepository>, Context) {
        let repository = Arc::new(MockRepository::new(at(0)));
        let context = context(repository.clone(), pipeline_config(TimeDelta::zero(), close()));
        (repository, context)
    }

    #[tokio::test]
    async fn keep_open_only_removes_stale_label() {
        let (repository, context) = setup();
        repository.add_item(ItemKind::Issue, 1, &[STALE, KEEP_OPEN]);
        repository.add_labeled_event(1, STALE, at(0));

        let summary = run_at(&context, ItemKind::Issue, at(1_000_000)).await.unwrap();

        assert_eq!(
            repository.writes(),
            vec![Write::RemoveLabel(1, STALE.to_string())]
        );
        assert_eq!(summary.unlabeled, 1);
        assert!(repository.item(1).is_open());
    }

    #[tokio::test]
    async fn first_warning_is_posted_once() {
        let (repository, context) = setup();
        repository.add_item(ItemKind::Issue, 1, &[STALE]);
        repository.add_labeled_event(1, STALE, at(0));
        repository.set_clock(at(3 * 86_400));

        run_at(&context, ItemKind::Issue, at(3 * 86_400)).await.unwrap();

        let writes = repository.writes();
        assert_eq!(writes.len(), 1);
        let Write::Comment(1, body) = &writes[0] else {
            panic!("expected a warning comment, got {writes:?}");
        };
        assert!(body.contains("labeled as **Close?** approximately 3 days ago"));
        assert!(body.contains("I will close this issue in a week"));
        assert!(repository.item(1).is_open());

        // The next run sees its own warning and waits
        repository.clear_writes();
        let summary = run_at(&context, ItemKind::Issue, at(4 * 86_400)).await.unwrap();
        assert!(repository.writes().is_empty());
        assert_eq!(summary, RunSummary { processed: 1, ..Default::default() });
    }

    #[tokio::test]
    async fn expired_warning_closes_issue_once() {
        let (repository, context) = setup();
        repository.add_item(ItemKind::Issue, 1, &[STALE]);
        repository.add_labeled_event(1, STALE, at(0));
        repository.add_comment(1, BOT_LOGIN, &marked(MsgCategory::IssueCloseWarning), at(10));

        let now = at(10) + close() + TimeDelta::seconds(1);
        let summary = run_at(&context, ItemKind::Issue, now).await.unwrap();

        let writes = repository.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0], Write::AddLabel(1, CLOSED_BY_BOT.to_string()));
        assert!(
            matches!(&writes[1], Write::Comment(1, body) if body.starts_with("I'm going to close this issue"))
        );
        assert_eq!(writes[2], Write::Close(1));
        assert_eq!(summary.closed, 1);
        assert!(!repository.item(1).is_open());

        // Rerunning with the same `now` doesn't touch the closed issue again
        repository.clear_writes();
        let summary = run_at(&context, ItemKind::Issue, now).await.unwrap();
        assert!(repository.writes().is_empty());
        assert_eq!(summary.processed, 0);

        let item = repository.item(1);
        assert_eq!(decide(&context, &item, now).await.unwrap(), Action::NoOp);
    }

    #[tokio::test]
    async fn warning_from_previous_labeling_is_ignored() {
        let (repository, context) = setup();
        repository.add_item(ItemKind::Issue, 1, &[STALE]);
        repository.add_labeled_event(1, STALE, at(20));
        repository.add_labeled_event(1, STALE, at(100));
        repository.add_comment(1, BOT_LOGIN, &marked(MsgCategory::IssueCloseWarning), at(50));

        let now = at(100) + close() + TimeDelta::seconds(1);
        let item = repository.item(1);
        let action = decide(&context, &item, now).await.unwrap();

        assert!(matches!(action, Action::Warn { .. }));
    }

    #[tokio::test]
    async fn waits_until_warn_threshold() {
        let repository = Arc::new(MockRepository::new(at(0)));
        let context = context(
            repository.clone(),
            pipeline_config(TimeDelta::days(2), close()),
        );
        repository.add_item(ItemKind::Issue, 1, &[STALE]);
        repository.add_labeled_event(1, STALE, at(0));

        let item = repository.item(1);
        assert_eq!(
            decide(&context, &item, at(86_400)).await.unwrap(),
            Action::NoOp
        );
        assert!(matches!(
            decide(&context, &item, at(3 * 86_400)).await.unwrap(),
            Action::Warn { .. }
        ));
    }

    #[tokio::test]
    async fn missing_labeling_event_counts_from_epoch() {
        let (repository, context) = setup();
        repository.add_item(ItemKind::Issue, 1, &[STALE]);

        let item = repository.item(1);
        let action = decide(&context, &item, at(0)).await.unwrap();

        let Action::Warn { pasttime } = action else {
            panic!("expected a warning, got {action:?}");
        };
        assert!(pasttime.ends_with("years ago"));
    }

    #[tokio::test]
    async fn pull_requests_in_issue_listing_are_skipped() {
        let (repository, context) = setup();
        repository.add_item(ItemKind::PullRequest, 2, &[STALE]);
        repository.add_labeled_event(2, STALE, at(0));

        let summary = run_at(&context, ItemKind::Issue, at(1_000_000)).await.unwrap();

        assert_eq!(summary.processed, 1);
        assert!(repository.writes().is_empty());
    }

    #[tokio::test]
    async fn failing_issue_does_not_abort_the_run() {
        let (repository, context) = setup();
        repository.add_item(ItemKind::Issue, 1, &[STALE]);
        repository.add_item(ItemKind::Issue, 2, &[STALE]);
        repository.fail_reads(1);
        repository.add_labeled_event(2, STALE, at(0));

        let summary = run_at(&context, ItemKind::Issue, at(1_000)).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.warned, 1);
        assert!(matches!(repository.writes().as_slice(), [Write::Comment(2, _)]));
    }

    #[tokio::test]
    async fn max_items_caps_the_run() {
        let repository = Arc::new(MockRepository::new(at(0)));
        let mut config = pipeline_config(TimeDelta::zero(), close());
        config.max_items = Some(2);
        let context = context(repository.clone(), config);
        for number in 1..=3 {
            repository.add_item(ItemKind::Issue, number, &[STALE]);
            repository.add_labeled_event(number, STALE, at(0));
        }

        let summary = run_at(&context, ItemKind::Issue, at(1_000)).await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.warned, 2);
    }

    #[tokio::test]
    async fn dry_run_decides_the_same_without_writes() {
        let repository = Arc::new(MockRepository::new(at(0)));
        let mut config = pipeline_config(TimeDelta::zero(), close());
        config.dry_run = true;
        let context = context(repository.clone(), config);

        repository.add_item(ItemKind::Issue, 1, &[STALE, KEEP_OPEN]);
        repository.add_item(ItemKind::Issue, 2, &[STALE]);
        repository.add_labeled_event(2, STALE, at(0));
        repository.add_item(ItemKind::Issue, 3, &[STALE]);
        repository.add_labeled_event(3, STALE, at(0));
        repository.add_comment(3, BOT_LOGIN, &marked(MsgCategory::IssueCloseWarning), at(1));

        let now = at(1) + close() + TimeDelta::seconds(1);
        let summary = run_at(&context, ItemKind::Issue, now).await.unwrap();

        assert!(repository.writes().is_empty());
        assert_eq!(context.prometheus.write_requests(), 0);
        assert_eq!(
            summary,
            RunSummary {
                processed: 3,
                unlabeled: 1,
                warned: 1,
                closed: 1,
                ..Default::default()
            }
        );
    }
}
