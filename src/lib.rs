//! Connector for the Beanstream payment gateway (also sold as the TD Canada
//! Trust Online Mart gateway).
//!
//! The gateway speaks three proprietary transports: form-encoded key/value
//! exchanges for one-off transactions, an XML channel for recurring-billing
//! management, and tab-separated batch downloads for historical transaction
//! reports. This crate maps the abstract operation set (authorize, purchase,
//! capture, void, credit, recurring management, reporting) onto those
//! transports and normalizes every answer into one [`types::Response`]
//! shape.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use beanstream_connector::transport::ReqwestTransport;
//! use beanstream_connector::types::{CreditCard, MinorUnit, TransactionOptions};
//! use beanstream_connector::{Beanstream, BeanstreamConfig};
//! use masking::Secret;
//!
//! let transport = Arc::new(ReqwestTransport::new().expect("client"));
//! let mut config = BeanstreamConfig::new("100200000");
//! config.username = Some("xiaobozz".to_string());
//! config.password = Some(Secret::new("password".to_string()));
//! let gateway = Beanstream::new(config, transport);
//!
//! let card = CreditCard {
//!     name: Secret::new("xiaobo zzz".to_string()),
//!     number: Secret::new("4030000010001234".to_string()),
//!     expiry_month: 8,
//!     expiry_year: 2011,
//!     cvd: Some(Secret::new("137".to_string())),
//! };
//! let response = gateway
//!     .authorize(MinorUnit::new(2000), &card, &TransactionOptions::default())
//!     .expect("gateway exchange");
//! println!("approved: {} ({:?})", response.success, response.authorization);
//! ```

pub mod connectors;
pub mod errors;
pub mod transport;
pub mod types;
pub(crate) mod utils;

pub use connectors::beanstream::{Beanstream, BeanstreamConfig, BeanstreamInterac, BeanstreamUrls};
