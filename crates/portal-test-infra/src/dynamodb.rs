use crate::Result;
use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_dynamodb::Client;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const DYNAMODB_PORT: u16 = 8000;

#[derive(Debug, Clone, TypedBuilder)]
pub struct DynamoDbLocalConfig {
    #[builder(default = "2.5.2".to_string(), setter(into))]
    tag: String,
    #[builder(default = "us-east-2".to_string(), setter(into))]
    region: String,
}

impl Default for DynamoDbLocalConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Test fixture for a disposable, in-memory DynamoDB Local server.
pub struct DynamoDbLocal {
    container: ContainerAsync<GenericImage>,
    config: DynamoDbLocalConfig,
}

impl DynamoDbLocal {
    /// Starts a DynamoDB Local container suitable for integration tests.
    pub async fn new(config: DynamoDbLocalConfig) -> Result<Self> {
        let container = GenericImage::new("amazon/dynamodb-local", config.tag.as_str())
            .with_exposed_port(DYNAMODB_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Initializing DynamoDB Local"))
            .start()
            .await?;

        Ok(Self { container, config })
    }

    pub async fn host(&self) -> Result<String> {
        Ok(self.container.get_host().await?.to_string())
    }

    pub async fn port(&self) -> Result<u16> {
        Ok(self.container.get_host_port_ipv4(DYNAMODB_PORT).await?)
    }

    pub async fn endpoint(&self) -> Result<String> {
        let host = self.host().await?;
        let port = self.port().await?;
        Ok(format!("http://{host}:{port}"))
    }

    /// Returns a client pointed at the container with static credentials.
    pub async fn client(&self) -> Result<Client> {
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()))
            .endpoint_url(self.endpoint().await?)
            .credentials_provider(Credentials::new(
                "local",
                "local",
                None,
                None,
                "portal-test-infra",
            ))
            .build();

        Ok(Client::from_conf(config))
    }

    /// Returns the underlying container reference.
    pub fn container(&self) -> &ContainerAsync<GenericImage> {
        &self.container
    }
}
