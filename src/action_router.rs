use crate::ingest::processor_enums::{IngestProcessorInput, IngestProcessorOutput};
use crate::utils::app_config::AppConfig;
use crate::utils::traits::ActionProcessor;
use anyhow::Result;

pub enum ActionRouterInput {
    Ingest(IngestProcessorInput),
}

#[derive(Debug)]
pub enum ActionRouterOutput {
    Ingest(IngestProcessorOutput),
}

impl ActionRouterInput {
    pub async fn process(&self, app_config: AppConfig) -> Result<ActionRouterOutput> {
        match self {
            ActionRouterInput::Ingest(processor) => {
                let mut config = app_config.aggregators().clone();

                let res = processor.process(&mut app_config.clone(), &mut config).await?;

                Ok(ActionRouterOutput::Ingest(res))
            }
        }
    }
}
