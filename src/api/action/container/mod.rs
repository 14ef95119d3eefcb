pub(crate) mod create;
pub(crate) mod get;
pub(crate) mod start;
pub(crate) mod stop;
pub(crate) mod stop_by_image;
pub(crate) mod delete;
pub(crate) mod exists;
pub(crate) mod ip;

pub(crate) use create::create;
pub(crate) use get::get;
pub(crate) use start::start;
pub(crate) use stop::stop;
pub(crate) use stop_by_image::stop_by_image;
pub(crate) use delete::delete;
pub(crate) use exists::exists;
pub(crate) use ip::ip;

use serde::Deserialize;

#[derive(Deserialize, Debug, Default)]
pub(crate) struct ContainerQuery {
    pub(crate) id: Option<String>,
    pub(crate) network: Option<String>,
}

impl ContainerQuery {
    pub(crate) fn network(&self) -> Option<&str> {
        self.network.as_deref().filter(|network| !network.is_empty())
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct ContainerInput {
    pub(crate) id: Option<String>,
}
