//! Member reports and their review by administrators.
//!
//! A report starts `pending` and is closed exactly once, either `resolved`
//! or `rejected`:
//!
//! ```text
//! pending --resolve--> resolved
//! pending --reject---> rejected
//! ```
//!
//! Repeating the action that closed a report changes nothing. Switching a
//! closed report to the other outcome is refused, as is deleting a report
//! that is still pending.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Report, ReportListing, ReportReason, ReportStatus};
use crate::session::Session;
use crate::store::{NewReport, ReportTransition, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Resolve,
    Reject,
}

impl ModerationAction {
    pub fn target(self) -> ReportStatus {
        match self {
            ModerationAction::Resolve => ReportStatus::Resolved,
            ModerationAction::Reject => ReportStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move the report to this status.
    Apply(ReportStatus),
    /// Already in the requested status.
    Unchanged,
}

/// The transition table. `id` is only used to build the error.
pub fn next_step(id: Uuid, current: ReportStatus, action: ModerationAction) -> Result<Step> {
    let target = action.target();
    match current {
        ReportStatus::Pending => Ok(Step::Apply(target)),
        status if status == target => Ok(Step::Unchanged),
        status => Err(Error::InvalidState {
            id,
            status,
            reason: "a closed report cannot change outcome",
        }),
    }
}

pub async fn file_report<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    reported_id: Uuid,
    reason: ReportReason,
    details: Option<&str>,
) -> Result<Uuid> {
    if session.actor_id == reported_id {
        warn!(actor = %session.actor_id, "rejected self-report");
        return Err(Error::SelfReport);
    }
    if store.get_profile(reported_id).await?.is_none() {
        return Err(Error::profile_not_found(reported_id));
    }

    let report = store
        .insert_report(NewReport {
            reporter_id: session.actor_id,
            reported_id,
            reason,
            details: details
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        })
        .await?;
    info!(report = %report.id, reporter = %session.actor_id, reported = %reported_id, %reason, "report filed");
    Ok(report.id)
}

async fn load_report<S: Store + ?Sized>(store: &S, report_id: Uuid) -> Result<Report> {
    store
        .get_report(report_id)
        .await?
        .ok_or_else(|| Error::report_not_found(report_id))
}

async fn review<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    report_id: Uuid,
    action: ModerationAction,
) -> Result<Report> {
    session.require_admin()?;
    let mut report = load_report(store, report_id).await?;

    let to = match next_step(report.id, report.status, action)? {
        Step::Apply(to) => to,
        Step::Unchanged => return Ok(report),
    };

    let transition = ReportTransition {
        report_id,
        from: report.status,
        to,
        resolver_id: session.actor_id,
        at: Utc::now(),
    };
    if !store.transition_report(transition).await? {
        // Another administrator closed it between our read and the update.
        let current = load_report(store, report_id).await?;
        return match next_step(current.id, current.status, action)? {
            Step::Unchanged => Ok(current),
            Step::Apply(_) => Err(Error::InvalidState {
                id: report_id,
                status: current.status,
                reason: "report changed while it was being reviewed",
            }),
        };
    }

    report.status = to;
    report.resolver_id = Some(transition.resolver_id);
    report.resolved_at = Some(transition.at);
    info!(report = %report_id, admin = %session.actor_id, status = %to, "report closed");
    Ok(report)
}

pub async fn resolve_report<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    report_id: Uuid,
) -> Result<Report> {
    review(store, session, report_id, ModerationAction::Resolve).await
}

pub async fn reject_report<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    report_id: Uuid,
) -> Result<Report> {
    review(store, session, report_id, ModerationAction::Reject).await
}

/// Removes a closed report. Pending reports are kept for the audit trail.
pub async fn delete_report<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    report_id: Uuid,
) -> Result<()> {
    session.require_admin()?;
    let report = load_report(store, report_id).await?;
    if report.status == ReportStatus::Pending {
        return Err(Error::InvalidState {
            id: report_id,
            status: report.status,
            reason: "only resolved or rejected reports can be deleted",
        });
    }

    if !store.delete_closed_report(report_id).await? {
        return Err(Error::report_not_found(report_id));
    }
    info!(report = %report_id, admin = %session.actor_id, "report deleted");
    Ok(())
}

/// The admin queue, newest first.
pub async fn list_reports<S: Store + ?Sized>(
    store: &S,
    session: &Session,
) -> Result<Vec<ReportListing>> {
    session.require_admin()?;
    Ok(store.list_reports().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::{Profile, Role};

    struct Fixture {
        store: MemoryStore,
        reporter: Session,
        reported: Profile,
        admin: Session,
    }

    async fn fixture() -> Fixture {
        let reporter = Profile::new(Role::Team, "Iron Owls", "Bahia");
        let reported = Profile::new(Role::Mentor, "Spam Bot", "Narnia");
        let mut admin = Profile::new(Role::Mentor, "Kiara Patel", "Acre");
        admin.is_admin = true;
        let store =
            MemoryStore::with_profiles(&[reporter.clone(), reported.clone(), admin.clone()])
                .await;
        Fixture {
            store,
            reporter: Session::for_profile(&reporter),
            reported,
            admin: Session::for_profile(&admin),
        }
    }

    async fn filed(fx: &Fixture) -> Uuid {
        file_report(
            &fx.store,
            &fx.reporter,
            fx.reported.id,
            ReportReason::Spam,
            Some("posts ads"),
        )
        .await
        .unwrap()
    }

    #[test]
    fn transition_table() {
        let id = Uuid::new_v4();
        use ModerationAction::*;
        use ReportStatus::*;

        assert_eq!(next_step(id, Pending, Resolve).unwrap(), Step::Apply(Resolved));
        assert_eq!(next_step(id, Pending, Reject).unwrap(), Step::Apply(Rejected));
        assert_eq!(next_step(id, Resolved, Resolve).unwrap(), Step::Unchanged);
        assert_eq!(next_step(id, Rejected, Reject).unwrap(), Step::Unchanged);
        assert!(matches!(
            next_step(id, Resolved, Reject),
            Err(Error::InvalidState { status: Resolved, .. })
        ));
        assert!(matches!(
            next_step(id, Rejected, Resolve),
            Err(Error::InvalidState { status: Rejected, .. })
        ));
    }

    #[tokio::test]
    async fn self_report_is_rejected_before_the_store() {
        let fx = fixture().await;
        let err = file_report(
            &fx.store,
            &fx.reporter,
            fx.reporter.actor_id,
            ReportReason::Spam,
            Some(""),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::SelfReport));
        assert!(list_reports(&fx.store, &fx.admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_reports_are_pending() {
        let fx = fixture().await;
        let id = file_report(&fx.store, &fx.reporter, fx.reported.id, ReportReason::Other, Some("  "))
            .await
            .unwrap();

        let report = fx.store.get_report(id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.reason, ReportReason::Other);
        assert_eq!(report.details, None);
        assert_eq!(report.resolver_id, None);
    }

    #[tokio::test]
    async fn reporting_a_missing_profile_is_not_found() {
        let fx = fixture().await;
        let err = file_report(&fx.store, &fx.reporter, Uuid::new_v4(), ReportReason::Abuse, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "profile", .. }));
    }

    #[tokio::test]
    async fn resolve_stamps_the_admin() {
        let fx = fixture().await;
        let id = filed(&fx).await;

        let report = resolve_report(&fx.store, &fx.admin, id).await.unwrap();
        assert_eq!(report.status, ReportStatus::Resolved);
        assert_eq!(report.resolver_id, Some(fx.admin.actor_id));
        assert!(report.resolved_at.is_some());

        let stored = fx.store.get_report(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Resolved);
        assert_eq!(stored.resolved_at, report.resolved_at);
    }

    #[tokio::test]
    async fn repeating_the_same_outcome_keeps_the_first_stamp() {
        let fx = fixture().await;
        let id = filed(&fx).await;

        let first = reject_report(&fx.store, &fx.admin, id).await.unwrap();
        let again = reject_report(&fx.store, &fx.admin, id).await.unwrap();
        assert_eq!(again.status, ReportStatus::Rejected);
        assert_eq!(again.resolved_at, first.resolved_at);
    }

    #[tokio::test]
    async fn resolve_then_reject_is_refused() {
        let fx = fixture().await;
        let id = filed(&fx).await;

        resolve_report(&fx.store, &fx.admin, id).await.unwrap();
        let err = reject_report(&fx.store, &fx.admin, id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));

        let stored = fx.store.get_report(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Resolved);
    }

    #[tokio::test]
    async fn pending_reports_cannot_be_deleted() {
        let fx = fixture().await;
        let id = filed(&fx).await;

        let err = delete_report(&fx.store, &fx.admin, id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { status: ReportStatus::Pending, .. }));
        assert!(fx.store.get_report(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn closed_reports_can_be_deleted() {
        let fx = fixture().await;
        let resolved = filed(&fx).await;
        let rejected = filed(&fx).await;

        resolve_report(&fx.store, &fx.admin, resolved).await.unwrap();
        reject_report(&fx.store, &fx.admin, rejected).await.unwrap();

        delete_report(&fx.store, &fx.admin, resolved).await.unwrap();
        delete_report(&fx.store, &fx.admin, rejected).await.unwrap();
        assert!(list_reports(&fx.store, &fx.admin).await.unwrap().is_empty());

        let err = delete_report(&fx.store, &fx.admin, resolved).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "report", .. }));
    }

    #[tokio::test]
    async fn review_requires_an_administrator() {
        let fx = fixture().await;
        let id = filed(&fx).await;

        for result in [
            resolve_report(&fx.store, &fx.reporter, id).await.map(|_| ()),
            reject_report(&fx.store, &fx.reporter, id).await.map(|_| ()),
            delete_report(&fx.store, &fx.reporter, id).await,
            list_reports(&fx.store, &fx.reporter).await.map(|_| ()),
        ] {
            assert!(matches!(result, Err(Error::Forbidden(_))));
        }
        let stored = fx.store.get_report(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Pending);
    }

    #[tokio::test]
    async fn listing_joins_display_names() {
        let fx = fixture().await;
        filed(&fx).await;

        let listings = list_reports(&fx.store, &fx.admin).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].reporter_name.as_deref(), Some("Iron Owls"));
        assert_eq!(listings[0].reported_name.as_deref(), Some("Spam Bot"));
    }
}
