//! Mock admin API for unit tests.

use async_trait::async_trait;
use mockall::mock;

use crate::error::Result;

use super::api::AdminApi;
use super::types::{Resource, ResourceKind};

mock! {
    pub Admin {}

    #[async_trait]
    impl AdminApi for Admin {
        async fn get_by_name(&self, kind: ResourceKind, name: &str) -> Result<Option<Resource>>;
        async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>>;
        async fn create(&self, payload: &Resource) -> Result<Resource>;
        async fn patch(&self, name: &str, payload: &Resource) -> Result<Resource>;
    }
}
