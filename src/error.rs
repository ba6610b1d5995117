//! Error taxonomy for the simulator core.

use thiserror::Error;

/// Errors raised by the simulator core.
///
/// Construction and configuration errors (`MissingParameter`,
/// `InvalidAlgorithmSpec`) are fatal and surface synchronously.
/// Delivery errors abort the current communicate phase under
/// [`DeliveryPolicy::Strict`](crate::network::DeliveryPolicy) and are
/// logged and dropped under `Lenient`.
#[derive(Debug, Error)]
pub enum SimError {
    /// An algorithm was constructed without one of its required parameters.
    #[error("missing required parameter `{0}`")]
    MissingParameter(String),

    /// The algorithm queue entry or its parameters are malformed.
    #[error("invalid algorithm spec: {0}")]
    InvalidAlgorithmSpec(String),

    /// A message could not be delivered under the current routing policy.
    #[error("undeliverable message `{header}`: {reason}")]
    UndeliverableMessage { header: String, reason: String },

    /// A node's status has no entry in the algorithm's status table.
    /// This is a programming error in the plugin.
    #[error("algorithm `{algorithm}` has no handler for status `{status}`")]
    UnknownStatus { algorithm: String, status: String },

    /// The placement retry budget was exhausted, or an explicit position
    /// was not free space.
    #[error("no free position found in environment")]
    NoFreeSpace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::MissingParameter("dataKey".into());
        assert_eq!(err.to_string(), "missing required parameter `dataKey`");

        let err = SimError::UnknownStatus {
            algorithm: "flooding-update".into(),
            status: "BOGUS".into(),
        };
        assert!(err.to_string().contains("BOGUS"));
    }
}
