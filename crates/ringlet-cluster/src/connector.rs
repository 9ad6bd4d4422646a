//! Backend link contracts: [`Connector`] and [`Dialer`].

use std::sync::Arc;

use crate::error::DialError;

/// One live link to a backend server.
///
/// Identity is the address: a cluster tracks at most one connector per
/// address. Implementations decide what "ready" means for their protocol.
pub trait Connector: Send + Sync {
    /// Address this connector is linked to.
    fn address(&self) -> &str;

    /// Whether the link can currently serve requests.
    fn ready(&self) -> bool;

    /// Release the link. Called at most once by the cluster that owns it.
    fn close(&self);
}

/// Opens connectors for addresses.
///
/// Dialing may take as long as the network does; clusters only dial from
/// background retry tasks or from their own `add`, never from lookups.
#[async_trait::async_trait]
pub trait Dialer: Send + Sync {
    /// Open a connector to `address`. `opt` is an opaque per-address option
    /// string passed through from `add`.
    async fn dial(&self, address: &str, opt: &str) -> Result<Arc<dyn Connector>, DialError>;
}

/// Plain functions and closures can dial synchronously.
#[async_trait::async_trait]
impl<F> Dialer for F
where
    F: Fn(&str, &str) -> Result<Arc<dyn Connector>, DialError> + Send + Sync,
{
    async fn dial(&self, address: &str, opt: &str) -> Result<Arc<dyn Connector>, DialError> {
        self(address, opt)
    }
}
