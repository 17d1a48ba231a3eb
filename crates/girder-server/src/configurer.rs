//! Server configurer extension point.
//!
//! A [`ServerConfigurer`] is a function applied to the [`ServerBuilder`]
//! exactly once per assembly, in registration order, before the server is
//! finalized. Configurers install codecs, security interceptors, or
//! resource limits without the factory knowing about any of them
//! individually.
//!
//! Composition is sequential and deliberately naive: there is no conflict
//! detection, and the last configurer to touch a builder field wins.
//!
//! [`ServerBuilder`]: crate::factory::ServerBuilder

use thiserror::Error;

use crate::factory::ServerBuilder;

/// Error raised by a configurer during assembly.
///
/// Any configurer failure aborts the build; partial builder state is
/// discarded.
#[derive(Error, Debug)]
#[error("configurer failed: {message}")]
pub struct ConfigurerError {
    message: String,
}

impl ConfigurerError {
    /// Creates a configurer error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A capability applied to the server builder before construction.
pub type ServerConfigurer = Box<dyn Fn(&mut ServerBuilder) -> Result<(), ConfigurerError> + Send + Sync>;

/// Wraps a closure as a [`ServerConfigurer`].
///
/// # Example
///
/// ```
/// use girder_server::configurer::server_configurer;
///
/// let configurer = server_configurer(|builder| {
///     builder.set_max_concurrent_calls(128);
///     Ok(())
/// });
/// ```
pub fn server_configurer<F>(f: F) -> ServerConfigurer
where
    F: Fn(&mut ServerBuilder) -> Result<(), ConfigurerError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Configurer that installs compression codecs by name.
pub fn compression_configurer<I, S>(codecs: I) -> ServerConfigurer
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let codecs: Vec<String> = codecs.into_iter().map(Into::into).collect();
    Box::new(move |builder| {
        for codec in &codecs {
            builder.add_compressor(codec.clone());
        }
        Ok(())
    })
}

/// Configurer that installs decompression codecs by name.
pub fn decompression_configurer<I, S>(codecs: I) -> ServerConfigurer
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let codecs: Vec<String> = codecs.into_iter().map(Into::into).collect();
    Box::new(move |builder| {
        for codec in &codecs {
            builder.add_decompressor(codec.clone());
        }
        Ok(())
    })
}

/// Configurer that caps concurrently executing calls.
pub fn call_limit_configurer(max: usize) -> ServerConfigurer {
    Box::new(move |builder| {
        builder.set_max_concurrent_calls(max);
        Ok(())
    })
}
