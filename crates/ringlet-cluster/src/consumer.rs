//! What membership sources feed into.
//!
//! A directory watcher reports four kinds of change: membership
//! (add/remove), and optional value, status and report updates. Every
//! consumer handles membership; the optional kinds are capabilities a
//! consumer advertises through the probe methods on
//! [`MembershipConsumer`]. Sources probe once and drop updates of kinds
//! the consumer does not support.

use std::sync::Arc;

use crate::Cluster;
use crate::error::ClusterError;
use crate::static_list::StaticList;

/// Receives membership changes from a directory source.
#[async_trait::async_trait]
pub trait MembershipConsumer: Send + Sync {
    /// A member appeared. `value` is whatever the directory stores for it.
    async fn add_member(&self, address: &str, value: &str) -> Result<(), ClusterError>;

    /// A member disappeared.
    async fn remove_member(&self, address: &str) -> Result<(), ClusterError>;

    /// This consumer as a [`ValueConsumer`], if it supports value updates.
    fn value_updates(self: Arc<Self>) -> Option<Arc<dyn ValueConsumer>> {
        None
    }

    /// This consumer as a [`StatusConsumer`], if it supports status updates.
    fn status_updates(self: Arc<Self>) -> Option<Arc<dyn StatusConsumer>> {
        None
    }

    /// This consumer as a [`ReportConsumer`], if it supports report updates.
    fn report_updates(self: Arc<Self>) -> Option<Arc<dyn ReportConsumer>> {
        None
    }
}

/// Accepts changes to a member's stored value.
#[async_trait::async_trait]
pub trait ValueConsumer: Send + Sync {
    async fn set_value(&self, address: &str, value: &str);
}

/// Accepts changes to a member's status.
#[async_trait::async_trait]
pub trait StatusConsumer: Send + Sync {
    async fn set_status(&self, address: &str, status: &str);
}

/// Accepts changes to a member's load report.
#[async_trait::async_trait]
pub trait ReportConsumer: Send + Sync {
    async fn set_report(&self, address: &str, report: &str);
}

/// A cluster dials each new member with the directory value as its option.
#[async_trait::async_trait]
impl<C> MembershipConsumer for C
where
    C: Cluster + ?Sized,
{
    async fn add_member(&self, address: &str, value: &str) -> Result<(), ClusterError> {
        self.add(address, value).await
    }

    async fn remove_member(&self, address: &str) -> Result<(), ClusterError> {
        self.del(address).await
    }
}

#[async_trait::async_trait]
impl MembershipConsumer for StaticList {
    async fn add_member(&self, address: &str, _value: &str) -> Result<(), ClusterError> {
        self.add(address).await
    }

    async fn remove_member(&self, address: &str) -> Result<(), ClusterError> {
        self.del(address).await
    }
}
