#![allow(dead_code)]

pub mod certs;
pub mod mock_sources;

pub use certs::{certificate_with_validity, self_signed, TestCa};
pub use mock_sources::{MockCertificateSource, RecordedEvent, RecordingEventHandler};
