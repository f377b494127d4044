pub mod beanstream;

pub use self::beanstream::{Beanstream, BeanstreamInterac};
