//! In-memory stand-ins for the external collaborators.
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use mkt_common::Money;

use crate::traits::{
    ChargeRequest,
    ChargeStatus,
    NotificationAck,
    NotificationService,
    NotificationServiceError,
    PaymentMetadata,
    PaymentProcessor,
    ProcessorCharge,
    ProcessorError,
};

/// What the scripted processor does on one `create_charge` call.
#[derive(Debug, Clone)]
pub enum ChargeScript {
    /// Returns a pending charge, which then confirms successfully
    Succeed,
    /// Confirms with the given amount instead of the requested one
    SucceedWithAmount(Money),
    Decline(String),
    Fail(ProcessorError),
    /// Sleeps before succeeding
    Delay(Duration),
}

#[derive(Debug, Default)]
struct ProcessorState {
    script: VecDeque<ChargeScript>,
    charges: Vec<ChargeRequest>,
    refunds: Vec<(String, Money)>,
    fail_refunds: bool,
}

/// A payment processor that follows a script, and succeeds once the script runs out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProcessor {
    state: Arc<Mutex<ProcessorState>>,
    calls: Arc<AtomicU32>,
}

impl ScriptedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script<I: IntoIterator<Item = ChargeScript>>(script: I) -> Self {
        let result = Self::default();
        result.push_script(script);
        result
    }

    pub fn push_script<I: IntoIterator<Item = ChargeScript>>(&self, script: I) {
        self.state.lock().expect("poisoned").script.extend(script);
    }

    pub fn fail_refunds(&self) {
        self.state.lock().expect("poisoned").fail_refunds = true;
    }

    /// Number of `create_charge` calls, including failed ones.
    pub fn charge_calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// The charges that went through, with the amount the processor actually charged.
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.state.lock().expect("poisoned").charges.clone()
    }

    pub fn refunds(&self) -> Vec<(String, Money)> {
        self.state.lock().expect("poisoned").refunds.clone()
    }

    fn charge_id(metadata: &PaymentMetadata) -> String {
        format!("ch_{}", metadata.checkout_id)
    }
}

impl PaymentProcessor for ScriptedProcessor {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProcessorCharge, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.state.lock().expect("poisoned").script.pop_front().unwrap_or(ChargeScript::Succeed);
        let mut amount = request.amount;
        match next {
            ChargeScript::Succeed => {},
            ChargeScript::SucceedWithAmount(a) => amount = a,
            ChargeScript::Decline(reason) => {
                return Ok(ProcessorCharge {
                    id: Self::charge_id(&request.metadata),
                    amount,
                    currency: request.currency.clone(),
                    status: ChargeStatus::Declined,
                    decline_reason: Some(reason),
                })
            },
            ChargeScript::Fail(e) => return Err(e),
            ChargeScript::Delay(d) => tokio::time::sleep(d).await,
        }
        let mut state = self.state.lock().expect("poisoned");
        state.charges.push(ChargeRequest { amount, ..request.clone() });
        Ok(ProcessorCharge {
            id: Self::charge_id(&request.metadata),
            amount,
            currency: request.currency.clone(),
            status: ChargeStatus::Pending,
            decline_reason: None,
        })
    }

    async fn confirm_charge(&self, charge_id: &str, metadata: &PaymentMetadata) -> Result<ProcessorCharge, ProcessorError> {
        let state = self.state.lock().expect("poisoned");
        let charge = state
            .charges
            .iter()
            .rev()
            .find(|c| c.metadata.checkout_id == metadata.checkout_id)
            .ok_or_else(|| ProcessorError::Invalid(format!("unknown charge {charge_id}")))?;
        Ok(ProcessorCharge {
            id: charge_id.to_string(),
            amount: charge.amount,
            currency: charge.currency.clone(),
            status: ChargeStatus::Succeeded,
            decline_reason: None,
        })
    }

    async fn refund_charge(&self, reference: &str, amount: Money, _: &PaymentMetadata) -> Result<(), ProcessorError> {
        let mut state = self.state.lock().expect("poisoned");
        if state.fail_refunds {
            return Err(ProcessorError::Invalid("refunds are disabled".into()));
        }
        state.refunds.push((reference.to_string(), amount));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub to: String,
    pub template: String,
    pub data: serde_json::Value,
}

/// Records every notification it is asked to send. Can be told to fail the next few sends.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    failures: Arc<Mutex<VecDeque<NotificationServiceError>>>,
    attempts: Arc<AtomicU32>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next<I: IntoIterator<Item = NotificationServiceError>>(&self, failures: I) {
        self.failures.lock().expect("poisoned").extend(failures);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().expect("poisoned").clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl NotificationService for RecordingNotifier {
    async fn send(
        &self,
        to: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<NotificationAck, NotificationServiceError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.failures.lock().expect("poisoned").pop_front() {
            return Err(e);
        }
        let mut sent = self.sent.lock().expect("poisoned");
        sent.push(SentNotification { to: to.to_string(), template: template.to_string(), data: data.clone() });
        Ok(NotificationAck { message_id: format!("msg-{n}") })
    }
}
