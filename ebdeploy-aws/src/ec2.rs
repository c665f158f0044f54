use crate::classify::sdk_error;
use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{Filter, IpPermission, UserIdGroupPair};
use ebdeploy_core::network::ENVIRONMENT_NAME_TAG;
use ebdeploy_core::{NetworkProvider, Result, SecurityGroup, SecurityGroupLink};

/// EC2-backed network provider
pub struct Ec2Network {
    client: Client,
}

impl Ec2Network {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn ingress_permission(link: &SecurityGroupLink) -> IpPermission {
    IpPermission::builder()
        .ip_protocol(&link.protocol)
        .from_port(i32::from(link.port))
        .to_port(i32::from(link.port))
        .user_id_group_pairs(UserIdGroupPair::builder().group_id(&link.source_group).build())
        .build()
}

#[async_trait]
impl NetworkProvider for Ec2Network {
    async fn find_security_groups(&self, environment: &str) -> Result<Vec<SecurityGroup>> {
        let filter = Filter::builder()
            .name(format!("tag:{}", ENVIRONMENT_NAME_TAG))
            .values(environment)
            .build();

        let output = self
            .client
            .describe_security_groups()
            .filters(filter)
            .send()
            .await
            .map_err(sdk_error("ec2"))?;

        Ok(output
            .security_groups()
            .iter()
            .filter_map(|group| {
                Some(SecurityGroup {
                    id: group.group_id()?.to_string(),
                    description: group.description().unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    async fn authorize_ingress(&self, link: &SecurityGroupLink) -> Result<()> {
        self.client
            .authorize_security_group_ingress()
            .group_id(&link.destination_group)
            .ip_permissions(ingress_permission(link))
            .send()
            .await
            .map_err(sdk_error("ec2"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingress_permission_from_link() {
        let permission = ingress_permission(&SecurityGroupLink::tcp("sg-env", "sg-rds", 5432));

        assert_eq!(permission.ip_protocol(), Some("tcp"));
        assert_eq!(permission.from_port(), Some(5432));
        assert_eq!(permission.to_port(), Some(5432));
        assert_eq!(
            permission.user_id_group_pairs()[0].group_id(),
            Some("sg-env")
        );
    }
}
