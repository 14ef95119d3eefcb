pub(crate) mod create;
pub(crate) mod get;
pub(crate) mod delete;
pub(crate) mod id;

pub(crate) use create::create;
pub(crate) use get::get;
pub(crate) use delete::delete;
pub(crate) use id::id;

use axum::response::Response;
use serde::Deserialize;

use crate::api::server::{bad_request, required_param};
use crate::models::images::ImageReference;

#[derive(Deserialize, Debug, Default)]
pub(crate) struct ImageQuery {
    #[serde(rename = "image-name")]
    pub(crate) image_name: Option<String>,
}

impl ImageQuery {
    pub(crate) fn reference(&self) -> Result<ImageReference, Response> {
        parse_reference(required_param(&self.image_name, "image-name")?)
    }
}

pub(crate) fn parse_reference(value: &str) -> Result<ImageReference, Response> {
    value.parse().map_err(bad_request)
}
