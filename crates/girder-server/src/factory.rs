//! Server assembly.
//!
//! A [`ServerFactory`] turns the assembly-time collaborators (discovered
//! services, the sorted interceptor registry, and the configurer hooks)
//! into an inert [`Server`]. Assembly is fail-fast: a duplicate service
//! name, a failing configurer, or an unparseable address all abort the
//! build before any handle exists. Binding the port happens later, when
//! the lifecycle starts the server.

use std::sync::Arc;

use girder_core::ServiceHandler;
use girder_interceptor::{InterceptorEntry, InterceptorRegistry};
use indexmap::IndexMap;
use thiserror::Error;

use crate::config::ServerProperties;
use crate::configurer::{ConfigurerError, ServerConfigurer};
use crate::discover::{DiscoveryError, ServiceDiscoverer};
use crate::server::{Binding, Server, WireProtocol};

/// Errors raised while assembling a server.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Two discovered services share a name.
    #[error("duplicate service name: {name}")]
    DuplicateService {
        /// The conflicting service name.
        name: String,
    },

    /// A configurer hook failed.
    #[error(transparent)]
    Configuration(#[from] ConfigurerError),

    /// Service discovery failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The configured bind address cannot be parsed.
    #[error("invalid bind address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),
}

/// Mutable assembly state exposed to configurer hooks.
///
/// The factory creates one builder per assembly, runs every configurer
/// against it, then folds the result into the server.
#[derive(Debug)]
pub struct ServerBuilder {
    properties: ServerProperties,
    compressors: Vec<String>,
    decompressors: Vec<String>,
    interceptors: Vec<InterceptorEntry>,
    max_concurrent_calls: Option<usize>,
}

impl ServerBuilder {
    /// Creates a builder seeded with the factory's properties.
    #[must_use]
    pub fn new(properties: ServerProperties) -> Self {
        let max_concurrent_calls = properties.max_concurrent_calls();
        Self {
            properties,
            compressors: Vec::new(),
            decompressors: Vec::new(),
            interceptors: Vec::new(),
            max_concurrent_calls,
        }
    }

    /// Installs a compression codec by name.
    pub fn add_compressor(&mut self, codec: impl Into<String>) {
        self.compressors.push(codec.into());
    }

    /// Installs a decompression codec by name.
    pub fn add_decompressor(&mut self, codec: impl Into<String>) {
        self.decompressors.push(codec.into());
    }

    /// Contributes an interceptor entry on top of the registry's.
    pub fn add_interceptor_entry(&mut self, entry: InterceptorEntry) {
        self.interceptors.push(entry);
    }

    /// Overrides the concurrent call cap.
    pub fn set_max_concurrent_calls(&mut self, max: usize) {
        self.max_concurrent_calls = Some(max);
    }

    /// Returns the installed compression codec names.
    #[must_use]
    pub fn compressors(&self) -> &[String] {
        &self.compressors
    }

    /// Returns the installed decompression codec names.
    #[must_use]
    pub fn decompressors(&self) -> &[String] {
        &self.decompressors
    }

    /// Returns the effective concurrent call cap.
    #[must_use]
    pub fn max_concurrent_calls(&self) -> Option<usize> {
        self.max_concurrent_calls
    }

    fn finish(self) -> (ServerProperties, Vec<String>, Vec<String>, Vec<InterceptorEntry>) {
        let properties = ServerProperties::builder()
            .address(self.properties.address())
            .grace_period(self.properties.grace_period())
            .max_concurrent_calls(self.max_concurrent_calls)
            .build();
        (properties, self.compressors, self.decompressors, self.interceptors)
    }
}

/// Assembles servers from the discovery, interceptor, and configurer
/// collaborators.
pub trait ServerFactory: Send + Sync {
    /// Builds an inert server.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] when assembly cannot complete; no server
    /// handle exists in that case.
    fn create_server(
        &self,
        discoverer: &dyn ServiceDiscoverer,
        registry: &InterceptorRegistry,
        configurers: &[ServerConfigurer],
    ) -> Result<Server, BuildError>;
}

fn assemble(
    properties: ServerProperties,
    binding: Binding,
    discoverer: &dyn ServiceDiscoverer,
    registry: &InterceptorRegistry,
    configurers: &[ServerConfigurer],
) -> Result<Server, BuildError> {
    let mut builder = ServerBuilder::new(properties);
    for configurer in configurers {
        configurer(&mut builder)?;
    }

    let mut services: IndexMap<String, Arc<dyn ServiceHandler>> = IndexMap::new();
    for definition in discoverer.find_services()? {
        let name = definition.name().to_string();
        if services.insert(name.clone(), definition.handler()).is_some() {
            return Err(BuildError::DuplicateService { name });
        }
        tracing::debug!(service = %name, "service registered");
    }

    let (properties, compressors, decompressors, contributed) = builder.finish();

    // Re-register everything so registry entries and configurer
    // contributions share one (order, sequence) space.
    let mut merged = InterceptorRegistry::new();
    merged.add_all(registry.sorted());
    merged.add_all(contributed);
    let interceptors = merged.sorted();

    tracing::info!(
        services = services.len(),
        interceptors = interceptors.len(),
        "server assembled"
    );

    Ok(Server::new(
        properties,
        services,
        interceptors,
        compressors,
        decompressors,
        binding,
    ))
}

/// Factory for TCP-exposed servers.
///
/// The wire protocol is injected; the factory validates the bind address
/// up front but leaves the actual bind to server start.
pub struct TcpServerFactory {
    properties: ServerProperties,
    wire: Arc<dyn WireProtocol>,
}

impl TcpServerFactory {
    /// Creates a factory from properties and a wire protocol.
    #[must_use]
    pub fn new(properties: ServerProperties, wire: Arc<dyn WireProtocol>) -> Self {
        Self { properties, wire }
    }
}

impl ServerFactory for TcpServerFactory {
    fn create_server(
        &self,
        discoverer: &dyn ServiceDiscoverer,
        registry: &InterceptorRegistry,
        configurers: &[ServerConfigurer],
    ) -> Result<Server, BuildError> {
        self.properties.socket_addr()?;
        assemble(
            self.properties.clone(),
            Binding::Tcp {
                wire: Arc::clone(&self.wire),
            },
            discoverer,
            registry,
            configurers,
        )
    }
}

/// Factory for in-process servers.
///
/// No listener is ever bound; calls enter through [`Server::dispatcher`].
/// Useful for tests and embedded hosts.
pub struct InProcessServerFactory {
    properties: ServerProperties,
}

impl InProcessServerFactory {
    /// Creates a factory from properties.
    #[must_use]
    pub fn new(properties: ServerProperties) -> Self {
        Self { properties }
    }
}

impl ServerFactory for InProcessServerFactory {
    fn create_server(
        &self,
        discoverer: &dyn ServiceDiscoverer,
        registry: &InterceptorRegistry,
        configurers: &[ServerConfigurer],
    ) -> Result<Server, BuildError> {
        assemble(
            self.properties.clone(),
            Binding::InProcess,
            discoverer,
            registry,
            configurers,
        )
    }
}
