use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use atelier_core::{CoreError, CoreResult, NotificationDispatcher, OrderStatus, Page, PageRequest};
use atelier_policy::{refund_amount, resolve_refund, CancellationReason, PolicyStore, RuleSource};
use atelier_shared::{BuyerNotification, NotificationKind};

use crate::cancellation::{
    AdminResponse, CancellationRequest, CancellationStatus, CancellationView, Decision,
    RefundDetails, RefundStatus,
};
use crate::manager::{OrderLifecycle, StatusActor};
use crate::models::Order;
use crate::repository::{CancellationRepository, OrderRepository};

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitCancellation {
    pub reason: CancellationReason,
    pub details: Option<String>,
}

/// What the buyer is told right after submitting.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmissionReceipt {
    pub request_id: Uuid,
    pub order_id: Uuid,
    pub status: CancellationStatus,
    pub refund_percentage: u8,
    pub rule_source: RuleSource,
    pub expected_refund_amt: i64,
    pub response_time_hours: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Adjudication {
    pub decision: Decision,
    pub comment: Option<String>,
    /// Replaces the percentage proposed at submission. Approvals only.
    pub refund_percentage: Option<u8>,
}

/// Buyer-initiated cancellation requests and their admin adjudication.
pub struct CancellationWorkflow {
    orders: Arc<dyn OrderRepository>,
    requests: Arc<dyn CancellationRepository>,
    policies: Arc<PolicyStore>,
    lifecycle: Arc<OrderLifecycle>,
    notifier: NotificationDispatcher,
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

impl CancellationWorkflow {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        requests: Arc<dyn CancellationRepository>,
        policies: Arc<PolicyStore>,
        lifecycle: Arc<OrderLifecycle>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            orders,
            requests,
            policies,
            lifecycle,
            notifier,
        }
    }

    /// Files a cancellation request for one of the buyer's orders.
    ///
    /// The refund percentage is resolved from the active policy now and kept on the
    /// request as the proposal an admin later confirms or overrides.
    pub async fn submit(
        &self,
        owner_id: &str,
        order_id: Uuid,
        input: SubmitCancellation,
    ) -> CoreResult<SubmissionReceipt> {
        let details = non_blank(input.details);
        if input.reason == CancellationReason::Other && details.is_none() {
            return Err(CoreError::ValidationError(
                "details are required when the reason is OTHER".to_string(),
            ));
        }

        let order = self.owned_order(owner_id, order_id).await?;
        let policy = self.policies.get_active().await?;
        if !policy.allows_reason(input.reason) {
            return Err(CoreError::ValidationError(format!(
                "cancellation reason {:?} is not accepted",
                input.reason
            )));
        }

        let now = Utc::now();
        let resolution = resolve_refund(&policy, order.order_status, order.order_date, now)?;
        let expected_refund_amt = refund_amount(order.total_amt, resolution.refund_percentage);

        let request = CancellationRequest {
            id: Uuid::new_v4(),
            order_id: order.id,
            owner_id: owner_id.to_string(),
            reason: input.reason,
            details,
            status: CancellationStatus::Pending,
            proposed_refund_percentage: resolution.refund_percentage,
            rule_source: resolution.source,
            expected_refund_amt,
            admin_response: None,
            refund_details: None,
            created_at: now,
            updated_at: now,
        };
        self.requests.insert_active(&request).await?;

        tracing::info!(
            request_id = %request.id,
            order_id = %order.id,
            refund_percentage = resolution.refund_percentage,
            rule_source = resolution.source.as_str(),
            "Cancellation request submitted"
        );

        self.notifier
            .dispatch(BuyerNotification::new(
                owner_id,
                order.id,
                NotificationKind::CancellationRequested {
                    order_number: order.order_number.clone(),
                    request_id: request.id,
                    expected_refund_amt,
                    refund_percentage: resolution.refund_percentage,
                    response_time_hours: policy.response_time_hours,
                },
            ))
            .await;

        Ok(SubmissionReceipt {
            request_id: request.id,
            order_id: order.id,
            status: request.status,
            refund_percentage: resolution.refund_percentage,
            rule_source: resolution.source,
            expected_refund_amt,
            response_time_hours: policy.response_time_hours,
        })
    }

    /// Resolves a pending request exactly once.
    ///
    /// The request is claimed first with a write conditional on `PENDING`; a second
    /// adjudication loses that write and gets `ConflictError`. An approval then cancels the
    /// order. If that fails the claimed request is closed as `PROCESSED` with a failed
    /// refund and the order error is returned.
    pub async fn adjudicate(
        &self,
        request_id: Uuid,
        admin_id: &str,
        input: Adjudication,
    ) -> CoreResult<CancellationRequest> {
        if let Some(pct) = input.refund_percentage {
            if pct > 100 {
                return Err(CoreError::ValidationError(format!(
                    "refund_percentage must be between 0 and 100, got {}",
                    pct
                )));
            }
        }

        let request = self
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("cancellation request {}", request_id)))?;
        if request.status != CancellationStatus::Pending {
            return Err(already_resolved(&request));
        }
        let order = self
            .orders
            .get(request.order_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("order {}", request.order_id)))?;

        let now = Utc::now();
        let comment = non_blank(input.comment);
        match input.decision {
            Decision::Approved => self.approve(request, &order, admin_id, comment, input.refund_percentage, now).await,
            Decision::Rejected => self.reject(request, &order, admin_id, comment, now).await,
        }
    }

    async fn approve(
        &self,
        request: CancellationRequest,
        order: &Order,
        admin_id: &str,
        comment: Option<String>,
        override_pct: Option<u8>,
        now: DateTime<Utc>,
    ) -> CoreResult<CancellationRequest> {
        let refund_percentage = override_pct.unwrap_or(request.proposed_refund_percentage);
        let refund_amt = refund_amount(order.total_amt, refund_percentage);

        let mut approved = request.advanced(CancellationStatus::Approved, now)?;
        approved.admin_response = Some(AdminResponse {
            admin_id: admin_id.to_string(),
            decided_at: now,
            comment: comment.clone(),
            refund_amt,
            refund_percentage,
        });
        approved.refund_details = Some(RefundDetails {
            refund_status: RefundStatus::Processing,
            refund_amt,
            failure_reason: None,
            updated_at: now,
        });
        self.claim(&approved, CancellationStatus::Pending).await?;

        let actor = StatusActor::CancellationApproval {
            request_id: approved.id,
        };
        if let Err(e) = self
            .lifecycle
            .advance_status(order.id, OrderStatus::Cancelled, actor)
            .await
        {
            self.mark_refund_failed(&approved, &e).await;
            return Err(e);
        }
        tracing::info!(
            request_id = %approved.id,
            order_id = %order.id,
            admin_id = %admin_id,
            refund_percentage,
            refund_amt,
            "Cancellation request approved"
        );

        self.notifier
            .dispatch(BuyerNotification::new(
                approved.owner_id.clone(),
                order.id,
                NotificationKind::CancellationApproved {
                    order_number: order.order_number.clone(),
                    request_id: approved.id,
                    refund_amt,
                    refund_percentage,
                    comment,
                },
            ))
            .await;

        Ok(approved)
    }

    async fn reject(
        &self,
        request: CancellationRequest,
        order: &Order,
        admin_id: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<CancellationRequest> {
        let mut rejected = request.advanced(CancellationStatus::Rejected, now)?;
        rejected.admin_response = Some(AdminResponse {
            admin_id: admin_id.to_string(),
            decided_at: now,
            comment: comment.clone(),
            refund_amt: 0,
            refund_percentage: 0,
        });
        self.claim(&rejected, CancellationStatus::Pending).await?;

        tracing::info!(
            request_id = %rejected.id,
            order_id = %order.id,
            admin_id = %admin_id,
            "Cancellation request rejected"
        );

        self.notifier
            .dispatch(BuyerNotification::new(
                rejected.owner_id.clone(),
                order.id,
                NotificationKind::CancellationRejected {
                    order_number: order.order_number.clone(),
                    request_id: rejected.id,
                    comment,
                },
            ))
            .await;

        Ok(rejected)
    }

    /// Closes an approved request once the external refund has gone through.
    pub async fn complete_refund(&self, request_id: Uuid, admin_id: &str) -> CoreResult<CancellationRequest> {
        let request = self
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("cancellation request {}", request_id)))?;
        if request.status == CancellationStatus::Processed {
            return Err(already_resolved(&request));
        }

        let refund_status = request.refund_details.as_ref().map(|r| r.refund_status);
        if refund_status != Some(RefundStatus::Processing) {
            return Err(CoreError::StateError(format!(
                "refund for request {} is not in progress",
                request_id
            )));
        }

        let mut processed = request.advanced(CancellationStatus::Processed, Utc::now())?;
        if let Some(refund) = processed.refund_details.as_mut() {
            refund.refund_status = RefundStatus::Completed;
            refund.updated_at = processed.updated_at;
        }
        self.claim(&processed, CancellationStatus::Approved).await?;

        tracing::info!(request_id = %request_id, admin_id = %admin_id, "Refund completed");
        Ok(processed)
    }

    /// The buyer's own requests, newest first, each with its order summary.
    pub async fn list_own(&self, owner_id: &str) -> CoreResult<Vec<CancellationView>> {
        let requests = self.requests.list_for_owner(owner_id).await?;
        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            let order = self.orders.get(request.order_id).await?.map(|o| o.summary());
            views.push(CancellationView { request, order });
        }
        Ok(views)
    }

    pub async fn list_all(
        &self,
        status: Option<CancellationStatus>,
        page: PageRequest,
    ) -> CoreResult<Page<CancellationRequest>> {
        let page = page.normalized();
        let (items, total) = self.requests.list(status, page).await?;
        Ok(Page::new(items, page, total))
    }

    async fn owned_order(&self, owner_id: &str, order_id: Uuid) -> CoreResult<Order> {
        match self.orders.get(order_id).await? {
            Some(order) if order.owner_id == owner_id => Ok(order),
            _ => Err(CoreError::NotFoundError(format!("order {}", order_id))),
        }
    }

    async fn claim(&self, request: &CancellationRequest, expected: CancellationStatus) -> CoreResult<()> {
        if self.requests.replace_if_status(request, expected).await? {
            Ok(())
        } else {
            Err(CoreError::ConflictError(format!(
                "cancellation request {} was resolved concurrently",
                request.id
            )))
        }
    }

    async fn mark_refund_failed(&self, claimed: &CancellationRequest, cause: &CoreError) {
        tracing::error!(
            request_id = %claimed.id,
            order_id = %claimed.order_id,
            "Order could not be cancelled after approval: {}",
            cause
        );

        let mut failed = match claimed.advanced(CancellationStatus::Processed, Utc::now()) {
            Ok(failed) => failed,
            Err(e) => {
                tracing::error!(request_id = %claimed.id, "Cannot close approved request: {}", e);
                return;
            }
        };
        if let Some(refund) = failed.refund_details.as_mut() {
            refund.refund_status = RefundStatus::Failed;
            refund.failure_reason = Some(cause.to_string());
            refund.updated_at = failed.updated_at;
        }

        match self
            .requests
            .replace_if_status(&failed, CancellationStatus::Approved)
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::error!(request_id = %claimed.id, "Approved request changed before it could be closed"),
            Err(e) => tracing::error!(request_id = %claimed.id, "Failed to close approved request: {}", e),
        }
    }
}

fn already_resolved(request: &CancellationRequest) -> CoreError {
    CoreError::ConflictError(format!(
        "cancellation request {} is already {}",
        request.id, request.status
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use atelier_core::notify::RecordingNotifier;
    use atelier_core::PaymentStatus;
    use crate::memory::InMemoryOrderStore;
    use async_trait::async_trait;
    use atelier_policy::{CancellationPolicy, StatusRule, TimeRule};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ladder_policy() -> CancellationPolicy {
        let mut policy = CancellationPolicy::with_defaults();
        policy.refund_percentage = 5;
        policy.time_based_rules = vec![
            TimeRule { time_frame_hours: 1, refund_percentage: 10 },
            TimeRule { time_frame_hours: 24, refund_percentage: 8 },
        ];
        policy.status_based_rules = vec![];
        policy
    }

    fn changed_mind() -> SubmitCancellation {
        SubmitCancellation {
            reason: CancellationReason::ChangedMind,
            details: None,
        }
    }

    fn decision(decision: Decision) -> Adjudication {
        Adjudication {
            decision,
            comment: None,
            refund_percentage: None,
        }
    }

    fn fulfillment() -> StatusActor {
        StatusActor::Fulfillment {
            admin_id: "admin-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recent_order_gets_time_rule() {
        let h = fixtures::harness_with(ladder_policy(), Arc::new(RecordingNotifier::new()));
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now() - Duration::minutes(30)).await;

        let receipt = h.workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();

        assert_eq!(receipt.refund_percentage, 10);
        assert_eq!(receipt.rule_source, RuleSource::TimeRule);
        assert_eq!(receipt.expected_refund_amt, 1_000);
        assert_eq!(receipt.status, CancellationStatus::Pending);

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0].kind {
            NotificationKind::CancellationRequested {
                expected_refund_amt,
                response_time_hours,
                ..
            } => {
                assert_eq!(*expected_refund_amt, 1_000);
                assert_eq!(*response_time_hours, 48);
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_rule_wins_over_time_rule() {
        let mut policy = ladder_policy();
        policy.status_based_rules.push(StatusRule {
            order_status: OrderStatus::OrderPlaced,
            can_cancel: true,
            refund_percentage: 7,
        });
        let h = fixtures::harness_with(policy, Arc::new(RecordingNotifier::new()));
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now() - Duration::minutes(30)).await;

        let receipt = h.workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();

        assert_eq!(receipt.refund_percentage, 7);
        assert_eq!(receipt.rule_source, RuleSource::StatusRule);
    }

    #[tokio::test]
    async fn test_out_for_delivery_cannot_be_cancelled() {
        let h = fixtures::harness();
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;
        h.lifecycle.advance_status(order.id, OrderStatus::Processing, fulfillment()).await.unwrap();
        h.lifecycle.advance_status(order.id, OrderStatus::OutForDelivery, fulfillment()).await.unwrap();

        let result = h.workflow.submit("acct-1", order.id, changed_mind()).await;
        assert!(matches!(result, Err(CoreError::StateError(_))));
    }

    #[tokio::test]
    async fn test_submission_preconditions() {
        let h = fixtures::harness();
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;

        let foreign = h.workflow.submit("acct-2", order.id, changed_mind()).await;
        assert!(matches!(foreign, Err(CoreError::NotFoundError(_))));

        let other_without_details = h
            .workflow
            .submit(
                "acct-1",
                order.id,
                SubmitCancellation {
                    reason: CancellationReason::Other,
                    details: Some("   ".to_string()),
                },
            )
            .await;
        assert!(matches!(other_without_details, Err(CoreError::ValidationError(_))));

        h.workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();
        let duplicate = h.workflow.submit("acct-1", order.id, changed_mind()).await;
        assert!(matches!(duplicate, Err(CoreError::ConflictError(_))));
    }

    #[tokio::test]
    async fn test_reason_must_be_allowed() {
        let mut policy = CancellationPolicy::with_defaults();
        policy.allowed_reasons = vec![CancellationReason::DuplicateOrder];
        let h = fixtures::harness_with(policy, Arc::new(RecordingNotifier::new()));
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;

        let result = h.workflow.submit("acct-1", order.id, changed_mind()).await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_leave_one_active_request() {
        let h = fixtures::harness();
        let order_id = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await.id;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let workflow = h.workflow.clone();
            handles.push(tokio::spawn(async move {
                workflow.submit("acct-1", order_id, changed_mind()).await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(e) => assert!(matches!(e, CoreError::ConflictError(_))),
            }
        }
        assert_eq!(accepted, 1);

        let active = h
            .workflow
            .list_all(None, PageRequest::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .filter(|r| r.order_id == order_id && r.status.is_active())
            .count();
        assert_eq!(active, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_adjudications_have_one_winner() {
        let h = fixtures::harness();
        let order_id = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await.id;
        let request_id = h.workflow.submit("acct-1", order_id, changed_mind()).await.unwrap().request_id;

        let approve = {
            let workflow = h.workflow.clone();
            tokio::spawn(async move {
                workflow.adjudicate(request_id, "admin-1", decision(Decision::Approved)).await
            })
        };
        let reject = {
            let workflow = h.workflow.clone();
            tokio::spawn(async move {
                workflow.adjudicate(request_id, "admin-2", decision(Decision::Rejected)).await
            })
        };
        let results = [approve.await.unwrap(), reject.await.unwrap()];

        let winners: Vec<&CancellationRequest> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(CoreError::ConflictError(_)))));

        let order = h.lifecycle.get_for_owner("acct-1", order_id).await.unwrap();
        match winners[0].status {
            CancellationStatus::Approved => assert_eq!(order.order_status, OrderStatus::Cancelled),
            CancellationStatus::Rejected => assert_eq!(order.order_status, OrderStatus::OrderPlaced),
            other => panic!("unexpected winning status {}", other),
        }
    }

    #[tokio::test]
    async fn test_override_replaces_proposed_percentage() {
        let mut policy = ladder_policy();
        policy.status_based_rules.push(StatusRule {
            order_status: OrderStatus::OrderPlaced,
            can_cancel: true,
            refund_percentage: 7,
        });
        let h = fixtures::harness_with(policy, Arc::new(RecordingNotifier::new()));
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;
        let receipt = h.workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();
        assert_eq!(receipt.refund_percentage, 7);

        let approved = h
            .workflow
            .adjudicate(
                receipt.request_id,
                "admin-1",
                Adjudication {
                    decision: Decision::Approved,
                    comment: Some("Goodwill".to_string()),
                    refund_percentage: Some(15),
                },
            )
            .await
            .unwrap();

        let response = approved.admin_response.unwrap();
        assert_eq!(response.refund_percentage, 15);
        assert_eq!(response.refund_amt, 1_500);
        assert_eq!(response.comment.as_deref(), Some("Goodwill"));
        let refund = approved.refund_details.unwrap();
        assert_eq!(refund.refund_status, RefundStatus::Processing);
        assert_eq!(refund.refund_amt, 1_500);

        let order = h.lifecycle.get_for_owner("acct-1", order.id).await.unwrap();
        assert_eq!(order.order_status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Voided);
    }

    #[tokio::test]
    async fn test_out_of_range_override_rejected() {
        let h = fixtures::harness();
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;
        let receipt = h.workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();

        let result = h
            .workflow
            .adjudicate(
                receipt.request_id,
                "admin-1",
                Adjudication {
                    decision: Decision::Approved,
                    comment: None,
                    refund_percentage: Some(120),
                },
            )
            .await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_second_adjudication_changes_nothing() {
        let h = fixtures::harness();
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;
        let receipt = h.workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();

        let first = h
            .workflow
            .adjudicate(receipt.request_id, "admin-1", decision(Decision::Rejected))
            .await
            .unwrap();
        let second = h
            .workflow
            .adjudicate(receipt.request_id, "admin-2", decision(Decision::Approved))
            .await;
        assert!(matches!(second, Err(CoreError::ConflictError(_))));

        let listed = h.workflow.list_own("acct-1").await.unwrap();
        assert_eq!(listed[0].request.admin_response, first.admin_response);
        let order = h.lifecycle.get_for_owner("acct-1", order.id).await.unwrap();
        assert_eq!(order.order_status, OrderStatus::OrderPlaced);
    }

    #[tokio::test]
    async fn test_rejected_request_allows_resubmission() {
        let h = fixtures::harness();
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;
        let receipt = h.workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();
        h.workflow
            .adjudicate(receipt.request_id, "admin-1", decision(Decision::Rejected))
            .await
            .unwrap();

        let again = h.workflow.submit("acct-1", order.id, changed_mind()).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_failed_order_cancellation_closes_request() {
        let h = fixtures::harness();
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;
        h.lifecycle.advance_status(order.id, OrderStatus::Processing, fulfillment()).await.unwrap();
        let receipt = h.workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();
        assert_eq!(receipt.refund_percentage, 50);

        h.lifecycle.advance_status(order.id, OrderStatus::OutForDelivery, fulfillment()).await.unwrap();
        h.lifecycle.advance_status(order.id, OrderStatus::Delivered, fulfillment()).await.unwrap();

        let result = h
            .workflow
            .adjudicate(receipt.request_id, "admin-1", decision(Decision::Approved))
            .await;
        assert!(matches!(result, Err(CoreError::StateError(_))));

        let closed = &h.workflow.list_own("acct-1").await.unwrap()[0].request;
        assert_eq!(closed.status, CancellationStatus::Processed);
        let refund = closed.refund_details.as_ref().unwrap();
        assert_eq!(refund.refund_status, RefundStatus::Failed);
        assert!(refund.failure_reason.is_some());

        let order = h.lifecycle.get_for_owner("acct-1", order.id).await.unwrap();
        assert_eq!(order.order_status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_refund_completion() {
        let h = fixtures::harness();
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;
        let receipt = h.workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();

        let early = h.workflow.complete_refund(receipt.request_id, "admin-1").await;
        assert!(matches!(early, Err(CoreError::StateError(_))));

        h.workflow
            .adjudicate(receipt.request_id, "admin-1", decision(Decision::Approved))
            .await
            .unwrap();
        let done = h.workflow.complete_refund(receipt.request_id, "admin-1").await.unwrap();
        assert_eq!(done.status, CancellationStatus::Processed);
        assert_eq!(done.refund_details.unwrap().refund_status, RefundStatus::Completed);

        let twice = h.workflow.complete_refund(receipt.request_id, "admin-1").await;
        assert!(matches!(twice, Err(CoreError::ConflictError(_))));
    }

    /// Forwards to the in-memory store but refuses every conditional write after the first.
    struct OneWriteRequests {
        store: Arc<InMemoryOrderStore>,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl CancellationRepository for OneWriteRequests {
        async fn insert_active(&self, request: &CancellationRequest) -> CoreResult<()> {
            self.store.insert_active(request).await
        }

        async fn get(&self, id: Uuid) -> CoreResult<Option<CancellationRequest>> {
            CancellationRepository::get(self.store.as_ref(), id).await
        }

        async fn replace_if_status(
            &self,
            request: &CancellationRequest,
            expected: CancellationStatus,
        ) -> CoreResult<bool> {
            if self.writes.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(CoreError::internal("request store unavailable"));
            }
            self.store.replace_if_status(request, expected).await
        }

        async fn list_for_owner(&self, owner_id: &str) -> CoreResult<Vec<CancellationRequest>> {
            CancellationRepository::list_for_owner(self.store.as_ref(), owner_id).await
        }

        async fn list(
            &self,
            status: Option<CancellationStatus>,
            page: PageRequest,
        ) -> CoreResult<(Vec<CancellationRequest>, u64)> {
            self.store.list(status, page).await
        }
    }

    #[tokio::test]
    async fn test_approval_needs_a_single_request_write() {
        let h = fixtures::harness();
        let requests = Arc::new(OneWriteRequests {
            store: h.store.clone(),
            writes: AtomicUsize::new(0),
        });
        let workflow = CancellationWorkflow::new(
            h.store.clone(),
            requests,
            h.policies.clone(),
            h.lifecycle.clone(),
            NotificationDispatcher::new(h.notifier.clone()),
        );
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;
        let receipt = workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();

        let approved = workflow
            .adjudicate(receipt.request_id, "admin-1", decision(Decision::Approved))
            .await
            .unwrap();
        assert_eq!(approved.refund_details.unwrap().refund_status, RefundStatus::Processing);

        let stored = CancellationRepository::get(h.store.as_ref(), receipt.request_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, CancellationStatus::Approved);
        assert_eq!(stored.refund_details.unwrap().refund_status, RefundStatus::Processing);

        let order = h.lifecycle.get_for_owner("acct-1", order.id).await.unwrap();
        assert_eq!(order.order_status, OrderStatus::Cancelled);

        let done = h.workflow.complete_refund(receipt.request_id, "admin-1").await.unwrap();
        assert_eq!(done.refund_details.unwrap().refund_status, RefundStatus::Completed);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_undo_transitions() {
        let h = fixtures::harness_with(CancellationPolicy::with_defaults(), Arc::new(RecordingNotifier::failing()));
        let order = fixtures::placed_order(&h.store, "acct-1", 10_000, Utc::now()).await;

        let receipt = h.workflow.submit("acct-1", order.id, changed_mind()).await.unwrap();
        let approved = h
            .workflow
            .adjudicate(receipt.request_id, "admin-1", decision(Decision::Approved))
            .await
            .unwrap();

        assert_eq!(approved.status, CancellationStatus::Approved);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_listings() {
        let h = fixtures::harness();
        let now = Utc::now();
        let first = fixtures::placed_order(&h.store, "acct-1", 10_000, now).await;
        let second = fixtures::placed_order(&h.store, "acct-1", 20_000, now).await;
        let foreign = fixtures::placed_order(&h.store, "acct-2", 30_000, now).await;

        let r1 = h.workflow.submit("acct-1", first.id, changed_mind()).await.unwrap();
        h.workflow.submit("acct-1", second.id, changed_mind()).await.unwrap();
        h.workflow.submit("acct-2", foreign.id, changed_mind()).await.unwrap();
        h.workflow
            .adjudicate(r1.request_id, "admin-1", decision(Decision::Rejected))
            .await
            .unwrap();

        let own = h.workflow.list_own("acct-1").await.unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|v| v.order.is_some()));

        let pending = h
            .workflow
            .list_all(Some(CancellationStatus::Pending), PageRequest::new(1, 1))
            .await
            .unwrap();
        assert_eq!(pending.total, 2);
        assert_eq!(pending.items.len(), 1);
        assert_eq!(pending.total_pages, 2);
    }
}
