//! Domain types shared by the connector: amounts, payment instruments,
//! addresses, operation options and the normalized gateway response.

use std::collections::HashMap;
use std::fmt;

use error_stack::report;
use masking::Secret;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::errors::{ConnectorError, CustomResult};

/// Amount in minor units (cents). All public operations take amounts in this
/// form; conversion to the gateway's decimal string happens in the request
/// builders.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Serialize, Deserialize)]
pub struct MinorUnit(i64);

impl MinorUnit {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get_amount_as_i64(self) -> i64 {
        self.0
    }

    /// Major-denomination string with two decimal places. The gateway settles
    /// in CAD and USD, which are both two-decimal currencies.
    fn to_major_unit_as_string(self) -> CustomResult<StringMajorUnit, ConnectorError> {
        let amount_decimal = Decimal::from_i64(self.0)
            .ok_or_else(|| report!(ConnectorError::AmountConversionFailed))?;
        let major = amount_decimal / Decimal::from(100);
        Ok(StringMajorUnit::new(format!("{major:.2}")))
    }
}

impl fmt::Display for MinorUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Amount formatted the way the gateway expects it on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMajorUnit(String);

impl StringMajorUnit {
    fn new(value: String) -> Self {
        Self(value)
    }

    pub fn get_amount_as_string(&self) -> &str {
        &self.0
    }
}

/// Conversion from the caller's minor units into the connector's wire amount
/// representation.
pub trait AmountConvertor {
    type Output;
    fn convert(&self, amount: MinorUnit) -> CustomResult<Self::Output, ConnectorError>;
}

/// The gateway takes two-decimal major-unit strings (`1000` minor → `"10.00"`).
#[derive(Default, Debug, Clone, Copy)]
pub struct StringMajorUnitForConnector;

impl AmountConvertor for StringMajorUnitForConnector {
    type Output = StringMajorUnit;

    fn convert(&self, amount: MinorUnit) -> CustomResult<Self::Output, ConnectorError> {
        amount.to_major_unit_as_string()
    }
}

/// Credit card instrument. Expiry is stored as calendar values and sent
/// two-digit on the wire.
#[derive(Debug, Clone)]
pub struct CreditCard {
    pub name: Secret<String>,
    pub number: Secret<String>,
    pub expiry_month: u8,
    pub expiry_year: u16,
    pub cvd: Option<Secret<String>>,
}

impl CreditCard {
    pub(crate) fn expiry_month_two_digit(&self) -> String {
        format!("{:02}", self.expiry_month)
    }

    pub(crate) fn expiry_year_two_digit(&self) -> String {
        format!("{:02}", self.expiry_year % 100)
    }
}

/// Bank (EFT) instrument. Institution and transit numbers identify Canadian
/// accounts, the routing number identifies US accounts; the gateway accepts
/// whichever set applies.
#[derive(Debug, Clone)]
pub struct Check {
    pub institution_number: Option<String>,
    pub transit_number: Option<String>,
    pub routing_number: Option<Secret<String>>,
    pub account_number: Secret<String>,
}

/// The two instrument kinds understood by the transaction transport.
#[derive(Debug, Clone)]
pub enum PaymentInstrument {
    Card(CreditCard),
    Check(Check),
}

/// Billing or shipping address. Values are copied into the outgoing field
/// set after country normalization; blank entries are dropped at encoding.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub shipping_method: Option<String>,
    pub delivery_estimate: Option<String>,
}

/// Per-transaction invoice and address options.
#[derive(Default, Debug, Clone)]
pub struct TransactionOptions {
    pub order_id: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub billing_address: Option<Address>,
    pub shipping_address: Option<Address>,
    pub subtotal: Option<MinorUnit>,
    pub shipping: Option<MinorUnit>,
    pub tax1: Option<MinorUnit>,
    pub tax2: Option<MinorUnit>,
    /// Free-form merchant reference, sent as `ref1`.
    pub custom: Option<String>,
}

/// Billing period units accepted by the recurring sub-protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurringPeriod {
    Days,
    Weeks,
    Months,
    Years,
}

impl RecurringPeriod {
    pub(crate) fn code(self) -> &'static str {
        match self {
            Self::Days => "D",
            Self::Weeks => "W",
            Self::Months => "M",
            Self::Years => "Y",
        }
    }
}

/// Schedule for a recurring-billing creation. The expiry sent to the gateway
/// is `start_date` advanced by `occurrences` months, clamped to month end.
#[derive(Debug, Clone)]
pub struct RecurringSchedule {
    pub period: RecurringPeriod,
    pub increment: u32,
    pub start_date: Date,
    pub occurrences: u32,
    pub end_of_month: Option<u8>,
    pub apply_tax1: Option<bool>,
}

/// Targets an existing recurring-billing account for update/cancel.
#[derive(Default, Debug, Clone)]
pub struct RecurringAccount {
    pub account_id: String,
    pub apply_tax1: Option<bool>,
}

/// Search parameters for the historical transaction report.
#[derive(Debug, Clone)]
pub struct ReportQuery {
    pub start_date: Date,
    pub end_date: Date,
    pub status: Option<String>,
    pub card_type: Option<String>,
    pub trans_types: Option<String>,
    pub reference: Option<String>,
    pub batch_number: Option<String>,
    pub range: Option<String>,
    pub id_start: Option<String>,
    pub id_end: Option<String>,
}

impl ReportQuery {
    pub fn for_date_range(start_date: Date, end_date: Date) -> Self {
        Self {
            start_date,
            end_date,
            status: None,
            card_type: None,
            trans_types: None,
            reference: None,
            batch_number: None,
            range: None,
            id_start: None,
            id_end: None,
        }
    }
}

/// Composite token returned from synchronous transactions and consumed by
/// capture/void/credit: `reference;amount;transaction-code`. Composing and
/// parsing round-trip losslessly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationToken {
    pub reference: String,
    pub amount: String,
    pub trn_type: String,
}

impl fmt::Display for AuthorizationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{}", self.reference, self.amount, self.trn_type)
    }
}

impl TryFrom<&str> for AuthorizationToken {
    type Error = error_stack::Report<ConnectorError>;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let parts: Vec<&str> = value.split(';').collect();
        match parts.as_slice() {
            [reference, amount, trn_type] => Ok(Self {
                reference: (*reference).to_string(),
                amount: (*amount).to_string(),
                trn_type: (*trn_type).to_string(),
            }),
            _ => Err(report!(ConnectorError::InvalidAuthorizationToken)
                .attach_printable(format!("got {} `;`-separated parts", parts.len()))),
        }
    }
}

/// Card-verification classification derived from the gateway's CVD result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvvResult {
    pub code: String,
    pub message: Option<String>,
}

impl CvvResult {
    pub(crate) fn new(code: &str) -> Self {
        let message = match code {
            "D" => Some("Suspicious transaction"),
            "I" => Some("Failed data validation check"),
            "M" => Some("Match"),
            "N" => Some("No Match"),
            "P" => Some("Not Processed"),
            "S" => Some("Should have been present"),
            "U" => Some("Issuer unable to process request"),
            "X" => Some("Card does not support verification"),
            _ => None,
        };
        Self {
            code: code.to_string(),
            message: message.map(str::to_string),
        }
    }
}

/// Address-verification classification. Codes outside the gateway's fixed
/// table are passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvsResult {
    pub code: String,
}

/// Normalized result of one gateway exchange (or of one report row).
/// Immutable once built; `params` carries the full decoded response keyed by
/// wire field name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub message: Option<String>,
    pub params: HashMap<String, String>,
    pub test: bool,
    pub authorization: Option<String>,
    pub cvv_result: Option<CvvResult>,
    pub avs_result: Option<AvsResult>,
}

impl Response {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
