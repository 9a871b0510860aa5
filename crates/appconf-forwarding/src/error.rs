use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForwardingError {
    #[error("Configuration has {0} destinations. Exactly one must be defined.")]
    DestinationCount(usize),
    #[error("log forwarding configuration must be a mapping of destination to settings")]
    Malformed,
    #[error("settings for destination '{0}' must be a mapping")]
    MalformedSettings(String),
    #[error(
        "Required secrets are missing in environment variables: {}. Make sure these variables are set in .env file",
        .0.join(", ")
    )]
    MissingSecrets(Vec<String>),
}
