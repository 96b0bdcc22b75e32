use std::sync::Arc;

use log::{debug, Logger};

use crate::backend::Backend;
use crate::config::Config;
use crate::errors::ConfigError;
use crate::file::ObjectUrls;
use crate::identity::Session;
use crate::media::{make_probe, MediaProbe};
use crate::queries::Queries;
use crate::registry::Registry;
use crate::urls::Urls;

/// Everything the view models share, built once at startup.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub session: Session,
    pub probe: Arc<dyn MediaProbe>,
    pub urls: Arc<Urls>,
    pub config: Config,
    pub registry: Registry,
    pub object_urls: ObjectUrls,
    pub queries: Queries,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        session: Session,
        backend: Arc<dyn Backend>,
        probe: Arc<dyn MediaProbe>,
        urls: Arc<Urls>,
        config: Config,
    ) -> Self {
        let registry = Registry::new();
        let queries = Queries::new(
            logger.clone(),
            backend,
            session.clone(),
            registry.clone(),
            urls.clone(),
        );

        Self {
            logger,
            session,
            probe,
            urls,
            config,
            registry,
            object_urls: ObjectUrls::new(),
            queries,
        }
    }

    /// Builds an environment from `.env` and `CLIENT_*` variables, with
    /// the JSON logger and an `ffprobe`-backed probe.
    pub fn from_env(session: Session, backend: Arc<dyn Backend>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let logger = Arc::new(log::initialize_logger());
        let config = Config::from_env()?;
        let urls = Arc::new(Urls::from_env());
        let probe = make_probe(None).ok_or(ConfigError::MissingFfprobe)?;

        debug!(logger, "Environment ready"; "media" => %urls.media(), "ffprobe" => ?probe);

        Ok(Self::new(logger, session, backend, Arc::new(probe), urls, config))
    }
}
