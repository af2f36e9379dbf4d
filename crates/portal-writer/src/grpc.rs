use crate::service::{CreateLinkParams, LinkWriter, UpdateLinkParams};
use portal_proto_schema::v1 as proto;
use portal_proto_schema::v1::links_service_server::LinksService;
use portal_proto_schema::v1::{field_update, non_empty};
use tonic::{Request, Response, Status};

const SERVED_BY_READER: &str = "this operation is served by the read service";

/// gRPC front of the write path.
///
/// Lookups and listings belong to the read service and are answered with
/// `UNIMPLEMENTED`.
pub struct WriterGrpcServer<W> {
    writer: W,
}

impl<W: LinkWriter> WriterGrpcServer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn render(&self, link: &portal_core::Link) -> Option<proto::Link> {
        Some(proto::Link::from_record(link, self.writer.base_url()))
    }
}

#[tonic::async_trait]
impl<W: LinkWriter> LinksService for WriterGrpcServer<W> {
    async fn create_link(
        &self,
        request: Request<proto::CreateLinkRequest>,
    ) -> Result<Response<proto::CreateLinkResponse>, Status> {
        let request = request.into_inner();
        let link = self
            .writer
            .create_link(CreateLinkParams {
                original_url: request.original_url,
                customer_id: request.customer_id,
                custom_slug: non_empty(request.custom_slug),
                expiration_date: non_empty(request.expiration_date),
            })
            .await?;

        Ok(Response::new(proto::CreateLinkResponse {
            link: self.render(&link),
        }))
    }

    async fn get_link(
        &self,
        _request: Request<proto::GetLinkRequest>,
    ) -> Result<Response<proto::GetLinkResponse>, Status> {
        Err(Status::unimplemented(SERVED_BY_READER))
    }

    async fn get_customer_links(
        &self,
        _request: Request<proto::GetCustomerLinksRequest>,
    ) -> Result<Response<proto::GetCustomerLinksResponse>, Status> {
        Err(Status::unimplemented(SERVED_BY_READER))
    }

    async fn update_link(
        &self,
        request: Request<proto::UpdateLinkRequest>,
    ) -> Result<Response<proto::UpdateLinkResponse>, Status> {
        let request = request.into_inner();
        let link = self
            .writer
            .update_link(UpdateLinkParams {
                id: request.id,
                customer_id: request.customer_id,
                original_url: request.original_url,
                custom_slug: field_update(request.custom_slug),
                expiration_date: field_update(request.expiration_date),
            })
            .await?;

        Ok(Response::new(proto::UpdateLinkResponse {
            link: self.render(&link),
        }))
    }

    async fn delete_link(
        &self,
        request: Request<proto::DeleteLinkRequest>,
    ) -> Result<Response<proto::DeleteLinkResponse>, Status> {
        let request = request.into_inner();
        self.writer
            .delete_link(&request.id, &request.customer_id)
            .await?;

        Ok(Response::new(proto::DeleteLinkResponse { success: true }))
    }

    async fn update_link_clicks(
        &self,
        request: Request<proto::UpdateLinkClicksRequest>,
    ) -> Result<Response<proto::UpdateLinkClicksResponse>, Status> {
        let request = request.into_inner();
        let link = self.writer.increment_clicks(&request.id).await?;

        Ok(Response::new(proto::UpdateLinkClicksResponse {
            link: self.render(&link),
        }))
    }
}
