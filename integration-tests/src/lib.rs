/// In-process stand-in for the `/objects` resource.
pub mod stub;

use restful_objects_contract::config::SuiteConfig;
use restful_objects_contract::objects::client::ObjectsClient;
use restful_objects_contract::LogLevel;

/// Client pointed at `base_url` with a short timeout.
pub fn client_for(base_url: &str) -> Result<ObjectsClient, String> {
    client_with_timeout(base_url, 5)
}

pub fn client_with_timeout(base_url: &str, timeout_secs: u64) -> Result<ObjectsClient, String> {
    let config = SuiteConfig {
        base_url: base_url.to_string(),
        timeout_secs,
        log_level: LogLevel::Debug,
        ..SuiteConfig::default()
    };
    ObjectsClient::new(&config).map_err(|e| e.to_string())
}
