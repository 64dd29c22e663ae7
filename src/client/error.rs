use super::transport::TransportError;

/// Errors that can occur while setting up or closing a connection
///
/// Publishing and subscribing never fail; their outcome is reported through
/// [`PublishHandle`](super::completion::PublishHandle)s and connection state.
#[derive(Debug, thiserror::Error)]
pub enum MqttConnectionError {
	/// Invalid configuration parameter values
	#[error("Invalid configuration value: {0}")]
	ConfigurationValue(String),

	/// The connection needs a Tokio runtime to drive its event loop
	#[error("No Tokio runtime available to drive the MQTT event loop")]
	NoRuntime,

	/// The underlying transport refused a request
	#[error("Transport error: {0}")]
	Transport(#[from] TransportError),
}
