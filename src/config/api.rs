use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct Api {
    pub(crate) port: u16,
    pub(crate) scheme: String
}

impl Default for Api {
    fn default() -> Self {
        Api {
            port: 8080,
            scheme: "http".to_string(),
        }
    }
}
