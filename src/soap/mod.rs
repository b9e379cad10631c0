/*!
SOAP 1.1 action invocation: envelope encode/decode plus the HTTP client that drives a control URL.
*/

pub mod client;
pub mod envelope;

pub use client::{SoapClient, SoapClientOptions};
pub use envelope::ActionResponse;
