mod link;

pub mod links {
    pub mod v1 {
        tonic::include_proto!("links.v1");
    }
}

pub mod v1 {
    pub use crate::link::v1::*;
    pub use crate::links::v1::*;
}
