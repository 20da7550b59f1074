use std::env;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub port: u16,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or_else(|| {
                tracing::warn!("PORT not set or invalid, using default 6969");
                6969
            });

        Self { port }
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
