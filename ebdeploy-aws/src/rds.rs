use crate::classify::{missing, sdk_error};
use async_trait::async_trait;
use aws_sdk_rds::Client;
use aws_sdk_rds::types::DbInstance;
use ebdeploy_core::{DatabaseProvider, DatabaseRequest, InstanceDescription, InstanceStatus, Result};
use tracing::debug;

/// RDS-backed database provider
pub struct RdsDatabase {
    client: Client,
}

impl RdsDatabase {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Convert an SDK instance into the workflow's view of it
pub fn describe(instance: &DbInstance) -> Result<InstanceDescription> {
    let identifier = instance
        .db_instance_identifier()
        .ok_or_else(|| missing("rds", "DBInstanceIdentifier"))?;
    let endpoint = instance.endpoint();

    Ok(InstanceDescription {
        identifier: identifier.to_string(),
        engine: instance.engine().unwrap_or_default().to_string(),
        username: instance.master_username().unwrap_or_default().to_string(),
        status: InstanceStatus::from_provider(instance.db_instance_status().unwrap_or_default()),
        host: endpoint.and_then(|e| e.address()).map(str::to_string),
        port: endpoint
            .and_then(|e| e.port())
            .and_then(|port| u16::try_from(port).ok()),
        security_group_id: instance
            .vpc_security_groups()
            .first()
            .and_then(|group| group.vpc_security_group_id())
            .map(str::to_string),
    })
}

#[async_trait]
impl DatabaseProvider for RdsDatabase {
    async fn create_instance(&self, request: &DatabaseRequest) -> Result<InstanceDescription> {
        let output = self
            .client
            .create_db_instance()
            .db_instance_identifier(&request.identifier)
            .allocated_storage(request.allocated_storage_gb)
            .db_instance_class(&request.instance_class)
            .engine(&request.engine)
            .master_username(&request.username)
            .master_user_password(&request.password)
            .send()
            .await
            .map_err(sdk_error("rds"))?;

        let instance = output
            .db_instance()
            .ok_or_else(|| missing("rds", "DBInstance"))?;
        debug!(identifier = %request.identifier, "DB instance create submitted");
        describe(instance)
    }

    async fn describe_instance(&self, identifier: &str) -> Result<InstanceDescription> {
        let output = self
            .client
            .describe_db_instances()
            .db_instance_identifier(identifier)
            .send()
            .await
            .map_err(sdk_error("rds"))?;

        let instance = output
            .db_instances()
            .first()
            .ok_or_else(|| missing("rds", "DBInstances"))?;
        describe(instance)
    }

    async fn list_instances(&self) -> Result<Vec<InstanceDescription>> {
        let instances: Vec<DbInstance> = self
            .client
            .describe_db_instances()
            .into_paginator()
            .items()
            .send()
            .collect::<std::result::Result<Vec<_>, _>>()
            .await
            .map_err(sdk_error("rds"))?;

        instances.iter().map(describe).collect()
    }
}
