//! Beanstream (TD Canada Trust Online Mart) gateway adapter.
//!
//! The adapter owns the merchant credentials and a blocking [`Transport`];
//! every operation builds a fresh field set, encodes it for the target
//! transport, performs one POST and classifies the decoded response. No
//! state is shared between calls, so one configured adapter can be used from
//! multiple threads as long as the transport is.
//!
//! Only the merchant id is required. Capture, void and credit additionally
//! need the username/password pair enabled on the merchant account, and the
//! recurring-management operations need the recurring pass code.

pub mod transformers;


use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use error_stack::ResultExt;
use masking::Secret;
use once_cell::sync::OnceCell;

use crate::errors::{ConnectorError, CustomResult};
use crate::transport::Transport;
use crate::types::{
    AuthorizationToken, CreditCard, MinorUnit, PaymentInstrument, RecurringAccount,
    RecurringSchedule, ReportQuery, Response, TransactionOptions,
};
use transformers as beanstream;

use transformers::{FieldSet, RecurringOperation, RequestBuilder, TransactionType};

const TRANSACTION_URL: &str = "https://www.beanstream.com/scripts/process_transaction.asp";
const RECURRING_URL: &str = "https://www.beanstream.com/scripts/recurring_billing.asp";
const REPORT_URL: &str = "https://www.beanstream.com/scripts/report_download.asp";

/// Endpoint set, one URL per transport. Defaults to the production
/// endpoints; overridable for sandbox accounts.
#[derive(Debug, Clone)]
pub struct BeanstreamUrls {
    pub transaction: String,
    pub recurring: String,
    pub report: String,
}

impl Default for BeanstreamUrls {
    fn default() -> Self {
        Self {
            transaction: TRANSACTION_URL.to_string(),
            recurring: RECURRING_URL.to_string(),
            report: REPORT_URL.to_string(),
        }
    }
}

/// Per-instance credential configuration, established at construction and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct BeanstreamConfig {
    pub merchant_id: String,
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    /// Recurring-management API pass code.
    pub pass_code: Option<Secret<String>>,
    /// Marks every produced [`Response`] as a test response regardless of
    /// what the gateway reports.
    pub test_mode: bool,
    pub urls: BeanstreamUrls,
}

impl BeanstreamConfig {
    pub fn new(merchant_id: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            username: None,
            password: None,
            pass_code: None,
            test_mode: false,
            urls: BeanstreamUrls::default(),
        }
    }
}

/// The gateway adapter. See the module docs for the credential requirements
/// of each operation family.
pub struct Beanstream {
    config: BeanstreamConfig,
    transport: Arc<dyn Transport>,
    interac: OnceCell<BeanstreamInterac>,
}

impl fmt::Debug for Beanstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Beanstream")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Beanstream {
    pub fn new(config: BeanstreamConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            interac: OnceCell::new(),
        }
    }

    /// Pre-authorize an amount on a card (`PA`). The returned authorization
    /// token targets the later capture.
    pub fn authorize(
        &self,
        amount: MinorUnit,
        card: &CreditCard,
        options: &TransactionOptions,
    ) -> CustomResult<Response, ConnectorError> {
        let fields = RequestBuilder::new()
            .amount(amount)?
            .invoice(options)?
            .credit_card(card)
            .addresses(options)
            .transaction_type(TransactionType::PreAuth)
            .build();
        self.commit(fields)
    }

    /// One-step purchase (`P`, or `D` for a bank instrument).
    pub fn purchase(
        &self,
        amount: MinorUnit,
        instrument: &PaymentInstrument,
        options: &TransactionOptions,
    ) -> CustomResult<Response, ConnectorError> {
        let fields = RequestBuilder::new()
            .amount(amount)?
            .invoice(options)?
            .instrument(instrument)
            .addresses(options)
            .transaction_type(TransactionType::purchase_for(instrument))
            .build();
        self.commit(fields)
    }

    /// Complete a prior pre-authorization (`PAC`). The authorization string
    /// must be a token returned by [`Self::authorize`].
    pub fn capture(
        &self,
        amount: MinorUnit,
        authorization: &str,
    ) -> CustomResult<Response, ConnectorError> {
        let token = AuthorizationToken::try_from(authorization)?;
        let fields = RequestBuilder::new()
            .amount(amount)?
            .reference(&token.reference)
            .transaction_type(TransactionType::PreAuthCompletion)
            .build();
        self.commit(fields)
    }

    /// Reverse a prior transaction for its original amount (`VP`/`VR`).
    pub fn void(&self, authorization: &str) -> CustomResult<Response, ConnectorError> {
        let token = AuthorizationToken::try_from(authorization)?;
        let fields = RequestBuilder::new()
            .reference(&token.reference)
            .original_amount(&token.amount)
            .transaction_type(TransactionType::void_for(&token.trn_type))
            .build();
        self.commit(fields)
    }

    /// Return funds against a prior transaction (`R`/`C`).
    pub fn credit(
        &self,
        amount: MinorUnit,
        authorization: &str,
    ) -> CustomResult<Response, ConnectorError> {
        let token = AuthorizationToken::try_from(authorization)?;
        let fields = RequestBuilder::new()
            .reference(&token.reference)
            .transaction_type(TransactionType::credit_for(&token.trn_type))
            .amount(amount)?
            .build();
        self.commit(fields)
    }

    /// Create a recurring-billing account: a card purchase flagged as
    /// recurring, with the billing cadence attached.
    pub fn recurring(
        &self,
        amount: MinorUnit,
        card: &CreditCard,
        options: &TransactionOptions,
        schedule: &RecurringSchedule,
    ) -> CustomResult<Response, ConnectorError> {
        let fields = RequestBuilder::new()
            .amount(amount)?
            .invoice(options)?
            .credit_card(card)
            .addresses(options)
            .transaction_type(TransactionType::Purchase)
            .recurring_schedule(schedule)?
            .build();
        self.commit(fields)
    }

    /// Update an existing recurring-billing account (operation `M`). Goes
    /// through the recurring management transport; no transaction code is
    /// sent.
    pub fn update_recurring(
        &self,
        amount: MinorUnit,
        card: &CreditCard,
        options: &TransactionOptions,
        account: &RecurringAccount,
    ) -> CustomResult<Response, ConnectorError> {
        let fields = RequestBuilder::new()
            .recurring_amount(amount)?
            .apply_tax1(account.apply_tax1)
            .credit_card(card)
            .addresses(options)
            .recurring_operation(RecurringOperation::Update)
            .build();
        self.recurring_commit(fields, &account.account_id)
    }

    /// Cancel an existing recurring-billing account (operation `C`).
    pub fn cancel_recurring(
        &self,
        account: &RecurringAccount,
    ) -> CustomResult<Response, ConnectorError> {
        let fields = RequestBuilder::new()
            .recurring_operation(RecurringOperation::Cancel)
            .build();
        self.recurring_commit(fields, &account.account_id)
    }

    /// Fetch and classify the historical transaction report, one [`Response`]
    /// per row in row order.
    pub fn transaction_report(
        &self,
        query: &ReportQuery,
    ) -> CustomResult<Vec<Response>, ConnectorError> {
        let fields = RequestBuilder::new().report_query(query).build();
        let body = beanstream::encode_report_request(fields, &self.config);
        let raw = self
            .transport
            .post(&self.config.urls.report, &body)
            .change_context(ConnectorError::TransportFailure)?;
        let rows = beanstream::parse_report_response(&raw);
        tracing::debug!(rows = rows.len(), "decoded transaction report");
        Ok(rows
            .into_iter()
            .map(|row| beanstream::build_report_row_response(row, self.config.test_mode))
            .collect())
    }

    /// Report over the current UTC date.
    pub fn today_report(&self) -> CustomResult<Vec<Response>, ConnectorError> {
        let today = time::OffsetDateTime::now_utc().date();
        self.transaction_report(&ReportQuery::for_date_range(today, today))
    }

    /// Normalize an already-decoded recurring webhook notification through
    /// the transaction classifier. Performs no network call.
    pub fn recurring_response_notification(&self, params: HashMap<String, String>) -> Response {
        beanstream::build_transaction_response(params, self.config.test_mode)
    }

    /// Interac Online variant of this gateway, created on first use and
    /// cached for the adapter's lifetime. Shares credentials and transport.
    pub fn interac(&self) -> &BeanstreamInterac {
        self.interac.get_or_init(|| {
            BeanstreamInterac::new(self.config.clone(), Arc::clone(&self.transport))
        })
    }

    fn commit(&self, fields: FieldSet) -> CustomResult<Response, ConnectorError> {
        commit(&self.config, self.transport.as_ref(), fields)
    }

    fn recurring_commit(
        &self,
        fields: FieldSet,
        account_id: &str,
    ) -> CustomResult<Response, ConnectorError> {
        let body = beanstream::encode_recurring_request(fields, &self.config, account_id);
        tracing::debug!(url = %self.config.urls.recurring, "posting recurring management request");
        let raw = self
            .transport
            .post(&self.config.urls.recurring, &body)
            .change_context(ConnectorError::TransportFailure)?;
        let params = beanstream::parse_recurring_response(&raw)?;
        Ok(beanstream::build_recurring_response(
            params,
            self.config.test_mode,
        ))
    }
}

/// Interac Online sub-adapter. The purchase marks the payment method as
/// Interac; the gateway answers with the fields that drive the bank
/// redirect, carried verbatim in [`Response::params`].
pub struct BeanstreamInterac {
    config: BeanstreamConfig,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for BeanstreamInterac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanstreamInterac")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BeanstreamInterac {
    pub fn new(config: BeanstreamConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Interac Online purchase: a card-less `P` transaction with the payment
    /// method forced to `IO`.
    pub fn purchase(
        &self,
        amount: MinorUnit,
        options: &TransactionOptions,
    ) -> CustomResult<Response, ConnectorError> {
        let fields = RequestBuilder::new()
            .amount(amount)?
            .invoice(options)?
            .addresses(options)
            .transaction_type(TransactionType::Purchase)
            .payment_method_interac()
            .build();
        commit(&self.config, self.transport.as_ref(), fields)
    }
}

fn commit(
    config: &BeanstreamConfig,
    transport: &dyn Transport,
    fields: FieldSet,
) -> CustomResult<Response, ConnectorError> {
    let body = beanstream::encode_transaction_request(fields, config);
    tracing::debug!(url = %config.urls.transaction, "posting transaction request");
    let raw = transport
        .post(&config.urls.transaction, &body)
        .change_context(ConnectorError::TransportFailure)?;
    let params = beanstream::parse_form_response(&raw);
    Ok(beanstream::build_transaction_response(
        params,
        config.test_mode,
    ))
}
