use crate::error::ReaderError;
use crate::query::{ListLinksParams, ListQuery};
use crate::service::LinkReader;
use portal_core::ReadConsistency;
use portal_proto_schema::v1 as proto;
use portal_proto_schema::v1::get_link_request::Lookup;
use portal_proto_schema::v1::links_service_server::LinksService;
use portal_proto_schema::v1::non_empty;
use tonic::{Request, Response, Status};

const SERVED_BY_WRITER: &str = "this operation is served by the write service";

/// gRPC front of the read path.
///
/// Mutations belong to the write service and are answered with
/// `UNIMPLEMENTED`.
pub struct ReaderGrpcServer<Rd> {
    reader: Rd,
}

impl<Rd: LinkReader> ReaderGrpcServer<Rd> {
    pub fn new(reader: Rd) -> Self {
        Self { reader }
    }

    fn render(&self, link: &portal_core::Link) -> proto::Link {
        proto::Link::from_record(link, self.reader.base_url())
    }
}

#[tonic::async_trait]
impl<Rd: LinkReader> LinksService for ReaderGrpcServer<Rd> {
    async fn create_link(
        &self,
        _request: Request<proto::CreateLinkRequest>,
    ) -> Result<Response<proto::CreateLinkResponse>, Status> {
        Err(Status::unimplemented(SERVED_BY_WRITER))
    }

    async fn get_link(
        &self,
        request: Request<proto::GetLinkRequest>,
    ) -> Result<Response<proto::GetLinkResponse>, Status> {
        let request = request.into_inner();
        let consistency = if request.consistent_read {
            ReadConsistency::Strong
        } else {
            ReadConsistency::Eventual
        };

        let link = match request.lookup {
            Some(Lookup::ShortUrl(input)) => {
                self.reader.get_by_short_code(&input, consistency).await?
            }
            Some(Lookup::Id(id)) => self.reader.get_by_id(&id).await?,
            Some(Lookup::CustomSlug(slug)) => self.reader.get_by_custom_slug(&slug).await?,
            None => {
                return Err(ReaderError::InvalidArgument(
                    "one of short_url, id or custom_slug is required".to_string(),
                )
                .into())
            }
        };

        Ok(Response::new(proto::GetLinkResponse {
            link: Some(self.render(&link)),
        }))
    }

    async fn get_customer_links(
        &self,
        request: Request<proto::GetCustomerLinksRequest>,
    ) -> Result<Response<proto::GetCustomerLinksResponse>, Status> {
        let request = request.into_inner();
        let query = ListQuery::try_from(ListLinksParams {
            customer_id: request.customer_id,
            limit: request.limit,
            cursor: non_empty(request.cursor),
            offset: request.offset,
            search: non_empty(request.search),
            status: non_empty(request.status),
            slug_type: non_empty(request.slug_type),
            sort_by: non_empty(request.sort_by),
            sort_direction: non_empty(request.sort_direction),
        })?;

        let page = self.reader.list_by_customer(query).await?;

        Ok(Response::new(proto::GetCustomerLinksResponse {
            links: page.links.iter().map(|link| self.render(link)).collect(),
            next_cursor: page.next_cursor,
            scanned_count: page.scanned_count,
        }))
    }

    async fn update_link(
        &self,
        _request: Request<proto::UpdateLinkRequest>,
    ) -> Result<Response<proto::UpdateLinkResponse>, Status> {
        Err(Status::unimplemented(SERVED_BY_WRITER))
    }

    async fn delete_link(
        &self,
        _request: Request<proto::DeleteLinkRequest>,
    ) -> Result<Response<proto::DeleteLinkResponse>, Status> {
        Err(Status::unimplemented(SERVED_BY_WRITER))
    }

    async fn update_link_clicks(
        &self,
        _request: Request<proto::UpdateLinkClicksRequest>,
    ) -> Result<Response<proto::UpdateLinkClicksResponse>, Status> {
        Err(Status::unimplemented(SERVED_BY_WRITER))
    }
}
