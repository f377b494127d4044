//! Translation layer between the abstract operation set and the gateway's
//! three wire transports: field-set assembly, form encoding, and the form /
//! XML / TSV response decoders with their result classification.

use std::collections::HashMap;

use error_stack::report;
use masking::PeekInterface;
use quick_xml::events::Event;
use quick_xml::Reader;
use url::form_urlencoded;

use crate::connectors::beanstream::BeanstreamConfig;
use crate::errors::{ConnectorError, CustomResult};
use crate::types::{
    Address, AmountConvertor, AuthorizationToken, AvsResult, Check, CreditCard, CvvResult,
    MinorUnit, PaymentInstrument, RecurringSchedule, ReportQuery, Response,
    StringMajorUnitForConnector, TransactionOptions,
};
use crate::utils;

/// Province placeholder the gateway requires for addresses outside US/CA.
const NON_DOMESTIC_PROVINCE: &str = "--";
/// Postal-code placeholder for non-domestic addresses with no postal code.
const NON_DOMESTIC_POSTAL_CODE: &str = "000000";

// ============================================================================
// Transaction codes
// ============================================================================

/// Wire transaction codes understood by the processing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum TransactionType {
    #[strum(serialize = "P")]
    Purchase,
    #[strum(serialize = "PA")]
    PreAuth,
    #[strum(serialize = "PAC")]
    PreAuthCompletion,
    #[strum(serialize = "R")]
    Credit,
    #[strum(serialize = "VP")]
    VoidPurchase,
    #[strum(serialize = "VR")]
    VoidCredit,
    #[strum(serialize = "D")]
    CheckPurchase,
    #[strum(serialize = "C")]
    CheckCredit,
}

impl TransactionType {
    /// Purchase-family code for the given instrument kind.
    pub fn purchase_for(instrument: &PaymentInstrument) -> Self {
        match instrument {
            PaymentInstrument::Card(_) => Self::Purchase,
            PaymentInstrument::Check(_) => Self::CheckPurchase,
        }
    }

    /// Void code for a transaction whose original code was recovered from an
    /// authorization token: credits are voided with `VR`, everything else
    /// with `VP`.
    pub fn void_for(original: &str) -> Self {
        if matches!(original.parse(), Ok(Self::Credit)) {
            Self::VoidCredit
        } else {
            Self::VoidPurchase
        }
    }

    /// Credit code for a transaction whose original code was recovered from
    /// an authorization token: check purchases are returned with `C`, card
    /// transactions with `R`.
    pub fn credit_for(original: &str) -> Self {
        if matches!(original.parse(), Ok(Self::CheckPurchase)) {
            Self::CheckCredit
        } else {
            Self::Credit
        }
    }
}

/// Operation codes of the recurring-billing management sub-protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RecurringOperation {
    #[strum(serialize = "M")]
    Update,
    #[strum(serialize = "C")]
    Cancel,
}

// ============================================================================
// Verification-code tables
// ============================================================================

/// CVD result table. Codes outside the table yield no CVV classification.
pub(crate) fn cvd_code(raw: &str) -> Option<&'static str> {
    match raw {
        "1" => Some("M"),
        "2" => Some("N"),
        "3" => Some("I"),
        "4" => Some("S"),
        "5" => Some("U"),
        "6" => Some("P"),
        _ => None,
    }
}

/// AVS result table. Codes outside the table are passed through verbatim by
/// the classifier.
pub(crate) fn avs_code(raw: &str) -> Option<&'static str> {
    match raw {
        "0" => Some("R"),
        "5" | "9" => Some("I"),
        _ => None,
    }
}

// ============================================================================
// Outgoing field sets
// ============================================================================

/// Ordered set of outgoing wire fields. Inserting a blank value is a no-op,
/// so an empty parameter can never reach the wire.
#[derive(Default, Debug, Clone)]
pub struct FieldSet {
    entries: Vec<(&'static str, String)>,
}

impl FieldSet {
    pub(crate) fn insert(&mut self, key: &'static str, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.entries.push((key, value));
        }
    }

    pub(crate) fn insert_opt(&mut self, key: &'static str, value: Option<String>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(entry_key, _)| *entry_key == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `application/x-www-form-urlencoded` body in insertion order.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.entries {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

/// Assembles the outgoing field set for one operation. Each step fills only
/// its own fields and never inspects what another step added; the adapter
/// composes the steps each operation needs.
#[derive(Default, Debug)]
pub struct RequestBuilder {
    fields: FieldSet,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `trnAmount` from the caller's minor units.
    pub fn amount(mut self, amount: MinorUnit) -> CustomResult<Self, ConnectorError> {
        let major = StringMajorUnitForConnector.convert(amount)?;
        self.fields.insert("trnAmount", major.get_amount_as_string());
        Ok(self)
    }

    /// `trnAmount` taken verbatim from a recovered authorization token, so a
    /// void reverses exactly the amount that was originally sent.
    pub fn original_amount(mut self, amount: &str) -> Self {
        self.fields.insert("trnAmount", amount);
        self
    }

    /// `adjId`, the transaction being adjusted by capture/void/credit.
    pub fn reference(mut self, reference: &str) -> Self {
        self.fields.insert("adjId", reference);
        self
    }

    pub fn transaction_type(mut self, trn_type: TransactionType) -> Self {
        self.fields.insert("trnType", trn_type.to_string());
        self
    }

    /// Invoice fields: order number, comments, price breakdown and the
    /// free-form `ref1` reference.
    pub fn invoice(mut self, options: &TransactionOptions) -> CustomResult<Self, ConnectorError> {
        self.fields
            .insert_opt("trnOrderNumber", options.order_id.clone());
        self.fields
            .insert_opt("trnComments", options.description.clone());
        let prices = [
            ("ordItemPrice", options.subtotal),
            ("ordShippingPrice", options.shipping),
            ("ordTax1Price", options.tax1),
            ("ordTax2Price", options.tax2),
        ];
        for (key, price) in prices {
            if let Some(amount) = price {
                let major = StringMajorUnitForConnector.convert(amount)?;
                self.fields.insert(key, major.get_amount_as_string());
            }
        }
        self.fields.insert_opt("ref1", options.custom.clone());
        Ok(self)
    }

    /// Card or bank fields depending on the instrument kind.
    pub fn instrument(self, instrument: &PaymentInstrument) -> Self {
        match instrument {
            PaymentInstrument::Card(card) => self.credit_card(card),
            PaymentInstrument::Check(check) => self.check(check),
        }
    }

    pub fn credit_card(mut self, card: &CreditCard) -> Self {
        self.fields.insert("trnCardOwner", card.name.peek().clone());
        self.fields
            .insert("trnCardNumber", card.number.peek().clone());
        self.fields
            .insert("trnExpMonth", card.expiry_month_two_digit());
        self.fields.insert("trnExpYear", card.expiry_year_two_digit());
        if let Some(cvd) = &card.cvd {
            self.fields.insert("trnCardCvd", cvd.peek().clone());
        }
        self
    }

    fn check(mut self, check: &Check) -> Self {
        self.fields
            .insert_opt("institutionNumber", check.institution_number.clone());
        self.fields
            .insert_opt("transitNumber", check.transit_number.clone());
        if let Some(routing) = &check.routing_number {
            self.fields.insert("routingNumber", routing.peek().clone());
        }
        self.fields
            .insert("accountNumber", check.account_number.peek().clone());
        self
    }

    /// Billing and shipping address fields, normalized per the country rules
    /// before anything is copied into the field set.
    pub fn addresses(mut self, options: &TransactionOptions) -> Self {
        if let Some(billing) = &options.billing_address {
            let mut billing = billing.clone();
            normalize_address(&mut billing);
            self.fields.insert_opt("ordName", billing.name);
            self.fields
                .insert_opt("ordEmailAddress", options.email.clone());
            self.fields.insert_opt("ordPhoneNumber", billing.phone);
            self.fields.insert_opt("ordAddress1", billing.address1);
            self.fields.insert_opt("ordAddress2", billing.address2);
            self.fields.insert_opt("ordCity", billing.city);
            self.fields.insert_opt("ordProvince", billing.province);
            self.fields.insert_opt("ordPostalCode", billing.postal_code);
            self.fields.insert_opt("ordCountry", billing.country);
        }
        if let Some(shipping) = &options.shipping_address {
            let mut shipping = shipping.clone();
            normalize_address(&mut shipping);
            self.fields.insert_opt("shipName", shipping.name);
            self.fields
                .insert_opt("shipEmailAddress", options.email.clone());
            self.fields.insert_opt("shipPhoneNumber", shipping.phone);
            self.fields.insert_opt("shipAddress1", shipping.address1);
            self.fields.insert_opt("shipAddress2", shipping.address2);
            self.fields.insert_opt("shipCity", shipping.city);
            self.fields.insert_opt("shipProvince", shipping.province);
            self.fields.insert_opt("shipPostalCode", shipping.postal_code);
            self.fields.insert_opt("shipCountry", shipping.country);
            self.fields
                .insert_opt("shippingMethod", shipping.shipping_method);
            self.fields
                .insert_opt("deliveryEstimate", shipping.delivery_estimate);
        }
        self
    }

    /// Recurring-creation fields: the recurring flag, billing cadence, first
    /// billing date and the computed expiry.
    pub fn recurring_schedule(
        mut self,
        schedule: &RecurringSchedule,
    ) -> CustomResult<Self, ConnectorError> {
        self.fields.insert("trnRecurring", "1");
        self.fields
            .insert("rbBillingPeriod", schedule.period.code());
        self.fields
            .insert("rbBillingIncrement", schedule.increment.to_string());
        self.fields
            .insert("rbFirstBilling", utils::format_mmddyyyy(schedule.start_date));
        let expiry = utils::advance_months(schedule.start_date, schedule.occurrences)?;
        self.fields.insert("rbExpiry", utils::format_mmddyyyy(expiry));
        if let Some(end_of_month) = schedule.end_of_month {
            self.fields.insert("rbEndMonth", end_of_month.to_string());
        }
        self = self.apply_tax1(schedule.apply_tax1);
        Ok(self)
    }

    /// `amount`, the recurring sub-protocol's name for the billing amount.
    pub fn recurring_amount(mut self, amount: MinorUnit) -> CustomResult<Self, ConnectorError> {
        let major = StringMajorUnitForConnector.convert(amount)?;
        self.fields.insert("amount", major.get_amount_as_string());
        Ok(self)
    }

    pub fn apply_tax1(mut self, flag: Option<bool>) -> Self {
        if let Some(apply) = flag {
            self.fields
                .insert("rbApplyTax1", if apply { "1" } else { "0" });
        }
        self
    }

    pub fn recurring_operation(mut self, operation: RecurringOperation) -> Self {
        self.fields.insert("operationType", operation.to_string());
        self
    }

    /// `paymentMethod=IO`, the Interac Online marker.
    pub fn payment_method_interac(mut self) -> Self {
        self.fields.insert("paymentMethod", "IO");
        self
    }

    /// Report filter fields; the date range is split into the per-component
    /// fields the report endpoint expects.
    pub fn report_query(mut self, query: &ReportQuery) -> Self {
        self.fields
            .insert("rptStartYear", query.start_date.year().to_string());
        self.fields.insert(
            "rptStartMonth",
            u8::from(query.start_date.month()).to_string(),
        );
        self.fields
            .insert("rptStartDay", query.start_date.day().to_string());
        self.fields
            .insert("rptEndYear", query.end_date.year().to_string());
        self.fields
            .insert("rptEndMonth", u8::from(query.end_date.month()).to_string());
        self.fields
            .insert("rptEndDay", query.end_date.day().to_string());
        self.fields.insert_opt("rptStatus", query.status.clone());
        self.fields.insert_opt("rptCardType", query.card_type.clone());
        self.fields
            .insert_opt("rptTransTypes", query.trans_types.clone());
        self.fields.insert_opt("rptRef", query.reference.clone());
        self.fields
            .insert_opt("rptBatchNumber", query.batch_number.clone());
        self.fields.insert_opt("rptRange", query.range.clone());
        self.fields.insert_opt("rptIdStart", query.id_start.clone());
        self.fields.insert_opt("rptIdEnd", query.id_end.clone());
        self
    }

    pub fn build(self) -> FieldSet {
        self.fields
    }
}

/// Country-conditional address rules. Only US and CA addresses reach the
/// gateway unmodified; everywhere else the province must be the `--`
/// placeholder and an absent postal code becomes `000000`. A postal code the
/// caller supplied as an empty string is left alone.
pub(crate) fn normalize_address(address: &mut Address) {
    let domestic = matches!(address.country.as_deref(), Some("US") | Some("CA"));
    if domestic {
        return;
    }
    address.province = Some(NON_DOMESTIC_PROVINCE.to_string());
    if address.postal_code.is_none() {
        address.postal_code = Some(NON_DOMESTIC_POSTAL_CODE.to_string());
    }
}

// ============================================================================
// Transport-fixed field injection
// ============================================================================

/// Fixed fields of the transaction transport, injected after the operation
/// fields and before the body is serialized.
pub(crate) fn encode_transaction_request(mut fields: FieldSet, config: &BeanstreamConfig) -> String {
    fields.insert("requestType", "BACKEND");
    fields.insert("merchant_id", config.merchant_id.clone());
    if let Some(username) = &config.username {
        fields.insert("username", username.clone());
    }
    if let Some(password) = &config.password {
        fields.insert("password", password.peek().clone());
    }
    fields.insert("vbvEnabled", "0");
    fields.insert("scEnabled", "0");
    fields.encode()
}

/// Fixed fields of the report transport: the report credential set, the
/// "no file" flag and the protocol version.
pub(crate) fn encode_report_request(mut fields: FieldSet, config: &BeanstreamConfig) -> String {
    fields.insert("requestType", "BACKEND");
    fields.insert("loginCompany", config.merchant_id.clone());
    if let Some(username) = &config.username {
        fields.insert("loginUser", username.clone());
    }
    if let Some(password) = &config.password {
        fields.insert("loginPass", password.peek().clone());
    }
    fields.insert("vbvEnabled", "0");
    fields.insert("scEnabled", "0");
    fields.insert("rptNoFile", "0");
    fields.insert("rptVersion", "1.6");
    fields.encode()
}

/// Fixed fields of the recurring-billing management transport.
pub(crate) fn encode_recurring_request(
    mut fields: FieldSet,
    config: &BeanstreamConfig,
    account_id: &str,
) -> String {
    fields.insert("serviceVersion", "1.0");
    fields.insert("merchantId", config.merchant_id.clone());
    if let Some(pass_code) = &config.pass_code {
        fields.insert("passCode", pass_code.peek().clone());
    }
    fields.insert("rbAccountId", account_id);
    fields.encode()
}

// ============================================================================
// Response decoders
// ============================================================================

/// Decode a `key=value` transaction response body into a flat map, cleaning
/// the embedded markup out of any message text.
pub(crate) fn parse_form_response(body: &str) -> HashMap<String, String> {
    let mut params: HashMap<String, String> = form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();
    if let Some(message) = params.get("messageText") {
        let cleaned = clean_message_text(message);
        params.insert("messageText".to_string(), cleaned);
    }
    params
}

/// The gateway embeds list-item and line-break markup in `messageText`;
/// strip the markers and fold breaks into sentence separators.
fn clean_message_text(message: &str) -> String {
    message
        .replace("<LI>", "")
        .replace(".<br>", ". ")
        .replace("<br>", ". ")
        .trim()
        .to_string()
}

/// Flatten the recurring transport's XML response into a map keyed by the
/// snake_cased leaf-element name. Non-leaf elements are recursed through;
/// duplicate leaf names across branches overwrite earlier values (last write
/// wins), mirroring the gateway's flat response model.
pub(crate) fn parse_recurring_response(
    body: &str,
) -> CustomResult<HashMap<String, String>, ConnectorError> {
    let mut reader = Reader::from_str(body);
    let mut params = HashMap::new();
    // (element name, accumulated text, has child elements)
    let mut stack: Vec<(String, String, bool)> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if let Some(parent) = stack.last_mut() {
                    parent.2 = true;
                }
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push((name, String::new(), false));
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|source| {
                            report!(ConnectorError::ResponseDeserializationFailed)
                                .attach_printable(source.to_string())
                        })?;
                    top.1.push_str(&unescaped);
                }
            }
            Ok(Event::End(_)) => {
                if let Some((name, text, has_children)) = stack.pop() {
                    if !has_children {
                        params.insert(snake_case(&name), text);
                    }
                }
            }
            Ok(Event::Empty(empty)) => {
                if let Some(parent) = stack.last_mut() {
                    parent.2 = true;
                }
                let name = String::from_utf8_lossy(empty.local_name().as_ref()).into_owned();
                params.insert(snake_case(&name), String::new());
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(source) => {
                return Err(report!(ConnectorError::ResponseDeserializationFailed)
                    .attach_printable(source.to_string()));
            }
        }
    }
    Ok(params)
}

/// camelCase wire names become snake_case map keys (`rbAccountId` →
/// `rb_account_id`), matching how callers address the recurring fields.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (index, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index != 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Decode the report transport's tab-separated body. The first row names the
/// columns positionally; every following non-empty row becomes one map.
pub(crate) fn parse_report_response(body: &str) -> Vec<HashMap<String, String>> {
    let mut lines = body.lines();
    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let header: Vec<&str> = header_line.split('\t').collect();
    lines
        .filter(|line| !line.is_empty())
        .map(|line| {
            header
                .iter()
                .zip(line.split('\t'))
                .map(|(key, value)| ((*key).to_string(), value.to_string()))
                .collect()
        })
        .collect()
}

// ============================================================================
// Result classification
// ============================================================================

/// Classify a decoded transaction (or webhook notification) response.
pub(crate) fn build_transaction_response(
    params: HashMap<String, String>,
    test_mode: bool,
) -> Response {
    let success = params.get("responseType").map(String::as_str) == Some("R")
        || params.get("trnApproved").map(String::as_str) == Some("1");
    let message = params.get("messageText").cloned();
    let test = test_mode || params.get("authCode").map(String::as_str) == Some("TEST");
    let authorization = AuthorizationToken {
        reference: params.get("trnId").cloned().unwrap_or_default(),
        amount: params.get("trnAmount").cloned().unwrap_or_default(),
        trn_type: params.get("trnType").cloned().unwrap_or_default(),
    };
    let cvv_result = params
        .get("cvdId")
        .and_then(|raw| cvd_code(raw))
        .map(CvvResult::new);
    let avs_result = avs_result_from(params.get("avsId"));
    Response {
        success,
        message,
        test,
        authorization: Some(authorization.to_string()),
        cvv_result,
        avs_result,
        params,
    }
}

/// Classify a decoded recurring-management response. The authorization is
/// the recurring account id alone, not a composite token.
pub(crate) fn build_recurring_response(
    params: HashMap<String, String>,
    test_mode: bool,
) -> Response {
    let success = params.get("code").map(String::as_str) == Some("1");
    let message = params.get("message").cloned();
    let test = test_mode || params.get("authCode").map(String::as_str) == Some("TEST");
    let authorization = params.get("account_id").cloned();
    let cvv_result = params
        .get("cvdId")
        .and_then(|raw| cvd_code(raw))
        .map(CvvResult::new);
    let avs_result = avs_result_from(params.get("avsId"));
    Response {
        success,
        message,
        test,
        authorization,
        cvv_result,
        avs_result,
        params,
    }
}

/// Classify one historical report row.
pub(crate) fn build_report_row_response(
    row: HashMap<String, String>,
    test_mode: bool,
) -> Response {
    let success = row.get("trn_response").map(String::as_str) == Some("1");
    let message = Some(report_message(row.get("trn_response").map(String::as_str)));
    let test = test_mode || row.get("authCode").map(String::as_str) == Some("TEST");
    let authorization = AuthorizationToken {
        reference: row.get("trn_id").cloned().unwrap_or_default(),
        amount: row.get("trn_amount").cloned().unwrap_or_default(),
        trn_type: row.get("trn_type").cloned().unwrap_or_default(),
    };
    let cvv_result = row
        .get("cvd_response")
        .and_then(|raw| cvd_code(raw))
        .map(CvvResult::new);
    let avs_result = avs_result_from(row.get("avs_response"));
    Response {
        success,
        message,
        test,
        authorization: Some(authorization.to_string()),
        cvv_result,
        avs_result,
        params: row,
    }
}

/// The report's numeric response code maps to a fixed message set; codes
/// outside the set are surfaced in a diagnostic rather than failing the row.
fn report_message(code: Option<&str>) -> String {
    match code {
        Some("0") => "In Process".to_string(),
        Some("1") => "Approved".to_string(),
        Some("2") => "Declined".to_string(),
        Some("3") => "Not Processed".to_string(),
        other => format!(
            "Unknown transaction response code: {}",
            other.unwrap_or_default()
        ),
    }
}

fn avs_result_from(raw: Option<&String>) -> Option<AvsResult> {
    raw.map(|code| AvsResult {
        code: avs_code(code)
            .map(str::to_string)
            .unwrap_or_else(|| code.clone()),
    })
}
